//! CPU capability sets and the "is at least as capable as" partial order.
//!
//! A [`FeatureSet`] names the CPU capability flags a piece of machine code
//! requires (or a host provides). Sets are ordered by inclusion: a host set
//! satisfies a required set iff it is a superset of it. The empty set is the
//! universal baseline, satisfied by every host.

use std::{collections::BTreeSet, fmt, str::FromStr};

use serde::{Deserialize, Serialize};

use crate::error::{UniError, UniResult};

/// An ordered collection of named CPU capability flags.
///
/// Flags are canonically lowercase (`"avx2"`, `"avx512f"`, `"neon"`). Backing
/// storage is an ordered set so iteration and serialization are deterministic.
#[derive(Debug, Default, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct FeatureSet {
    flags: BTreeSet<String>,
}

impl FeatureSet {
    /// The universal baseline: no flags required.
    pub fn empty() -> Self {
        FeatureSet::default()
    }

    pub fn is_empty(&self) -> bool {
        self.flags.is_empty()
    }

    /// Number of flags in the set. Monotonic in set size; used by the
    /// dispatch resolver only as a tie-break criterion, never for
    /// correctness.
    pub fn specificity(&self) -> usize {
        self.flags.len()
    }

    pub fn contains(&self, flag: &str) -> bool {
        self.flags.contains(flag)
    }

    /// Insert a flag, normalizing it to lowercase.
    pub fn insert(&mut self, flag: impl AsRef<str>) {
        self.flags.insert(flag.as_ref().trim().to_ascii_lowercase());
    }

    /// True iff every flag in `required` is present in `self`, i.e. this set
    /// (the host) is at least as capable as `required`.
    pub fn satisfies(&self, required: &FeatureSet) -> bool {
        required.flags.is_subset(&self.flags)
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.flags.iter().map(String::as_str)
    }
}

impl<S: AsRef<str>> FromIterator<S> for FeatureSet {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        let mut set = FeatureSet::empty();
        for flag in iter {
            set.insert(flag);
        }
        set
    }
}

impl fmt::Display for FeatureSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut first = true;
        for flag in &self.flags {
            if !first {
                write!(f, ",")?;
            }
            write!(f, "{}", flag)?;
            first = false;
        }
        Ok(())
    }
}

impl FromStr for FeatureSet {
    type Err = UniError;

    /// Parse a comma-separated flag list (`"avx,avx2,fma"`). The empty string
    /// parses to the baseline.
    fn from_str(text: &str) -> UniResult<Self> {
        let mut set = FeatureSet::empty();
        if text.trim().is_empty() {
            return Ok(set);
        }
        for token in text.split(',') {
            let token = token.trim();
            if token.is_empty() {
                return Err(UniError::FeatureParse {
                    text: text.to_string(),
                    reason: "empty flag name".to_string(),
                });
            }
            if !token
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '.' || c == '_')
            {
                return Err(UniError::FeatureParse {
                    text: text.to_string(),
                    reason: format!("invalid flag name '{}'", token),
                });
            }
            set.insert(token);
        }
        Ok(set)
    }
}
