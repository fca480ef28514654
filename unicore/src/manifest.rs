//! Export manifests: the mapping from exported names to signatures to
//! CPU-feature variants, plus the embedded IR payload and artifact identity.

use std::{collections::BTreeMap, fmt};

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
    error::{UniError, UniResult},
    features::FeatureSet,
    signature::Signature,
};

/// Globally unique token naming one build of one library's logical symbol
/// set. Two artifacts are interchangeable as the same compiled unit iff their
/// identities are equal; specialization carries the identity forward
/// unchanged.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Identity(Uuid);

impl Identity {
    pub fn fresh() -> Self {
        Identity(Uuid::new_v4())
    }

    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl fmt::Display for Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// One compiled implementation of one (exported name, signature) pair.
///
/// The resolved address and callable binding of a selected variant are *not*
/// part of this record: load-time resolution lives in the runtime's resolved
/// table, leaving manifests immutable once packaged.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Variant {
    /// Compiled symbol name to look up in the native image.
    pub symbol: String,

    /// CPU features this implementation requires; empty for the baseline.
    pub required_features: FeatureSet,

    /// Opaque module/source reference, if the build tool recorded one.
    pub provenance: Option<String>,
}

/// All variants for one (exported name, signature) pair, in insertion order.
///
/// Insertion order is load-bearing: the dispatch resolver breaks specificity
/// ties in favor of the first-inserted variant, and that order survives
/// serialization.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct VariantGroup {
    variants: Vec<Variant>,
}

impl VariantGroup {
    pub fn variants(&self) -> &[Variant] {
        &self.variants
    }

    /// The variant requiring no CPU features, if present.
    pub fn baseline(&self) -> Option<&Variant> {
        self.variants.iter().find(|v| v.required_features.is_empty())
    }

    pub fn contains_features(&self, features: &FeatureSet) -> bool {
        self.variants
            .iter()
            .any(|v| &v.required_features == features)
    }

    pub fn len(&self) -> usize {
        self.variants.len()
    }

    pub fn is_empty(&self) -> bool {
        self.variants.is_empty()
    }
}

/// Build-time description of everything an artifact exports, plus the
/// embedded IR payload and the artifact identity.
///
/// A manifest is mutable while being built and frozen by [`finalize`]; every
/// mutation afterwards fails with [`UniError::FrozenManifest`]. A fresh
/// identity is stamped at construction and kept by `finalize(None)`; the
/// specialization path passes the original identity through instead.
///
/// [`finalize`]: ExportManifest::finalize
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExportManifest {
    identity: Identity,
    is_specialized: bool,
    exports: BTreeMap<String, BTreeMap<Signature, VariantGroup>>,
    ir_payload: Vec<u8>,
    #[serde(skip)]
    frozen: bool,
}

impl Default for ExportManifest {
    fn default() -> Self {
        ExportManifest::new()
    }
}

impl ExportManifest {
    pub fn new() -> Self {
        ExportManifest {
            identity: Identity::fresh(),
            is_specialized: false,
            exports: BTreeMap::new(),
            ir_payload: Vec::new(),
            frozen: false,
        }
    }

    pub fn identity(&self) -> Identity {
        self.identity
    }

    pub fn is_specialized(&self) -> bool {
        self.is_specialized
    }

    pub fn is_frozen(&self) -> bool {
        self.frozen
    }

    /// Embedded IR payload; empty until `finalize` attaches one.
    pub fn ir_payload(&self) -> &[u8] {
        &self.ir_payload
    }

    pub fn exports(&self) -> &BTreeMap<String, BTreeMap<Signature, VariantGroup>> {
        &self.exports
    }

    pub fn group(&self, name: &str, signature: &Signature) -> Option<&VariantGroup> {
        self.exports.get(name)?.get(signature)
    }

    /// Iterate over every (exported name, signature, variant group) triple.
    pub fn groups(&self) -> impl Iterator<Item = (&str, &Signature, &VariantGroup)> {
        self.exports.iter().flat_map(|(name, signatures)| {
            signatures
                .iter()
                .map(move |(signature, group)| (name.as_str(), signature, group))
        })
    }

    /// Number of (exported name, signature) pairs.
    pub fn export_count(&self) -> usize {
        self.exports.values().map(BTreeMap::len).sum()
    }

    /// Insert a variant for `(name, signature)`, creating the group as
    /// needed. Fails with [`UniError::DuplicateVariant`] if a variant with
    /// the same required features already exists in the group, and with
    /// [`UniError::FrozenManifest`] after finalization.
    pub fn add_variant(
        &mut self,
        name: impl Into<String>,
        signature: Signature,
        symbol: impl Into<String>,
        required_features: FeatureSet,
        provenance: Option<String>,
    ) -> UniResult<&Variant> {
        if self.frozen {
            return Err(UniError::FrozenManifest);
        }

        let name = name.into();
        let group = self
            .exports
            .entry(name.clone())
            .or_default()
            .entry(signature.clone())
            .or_default();

        if group.contains_features(&required_features) {
            return Err(UniError::DuplicateVariant {
                name,
                signature,
                features: required_features,
            });
        }

        group.variants.push(Variant {
            symbol: symbol.into(),
            required_features,
            provenance,
        });
        Ok(group
            .variants
            .last()
            .unwrap_or_else(|| unreachable!("variant was just pushed")))
    }

    /// Mark this manifest as describing a specialized artifact. Only the
    /// specialization engine sets this; fails once frozen.
    pub fn set_specialized(&mut self, specialized: bool) -> UniResult<()> {
        if self.frozen {
            return Err(UniError::FrozenManifest);
        }
        self.is_specialized = specialized;
        Ok(())
    }

    /// Attach the embedded IR payload, settle the identity, validate the
    /// baseline invariant, and freeze the manifest.
    ///
    /// Passing `Some(identity)` carries an existing identity forward (the
    /// specialization case); `None` keeps the fresh identity stamped at
    /// construction. Every variant group must contain its baseline by now;
    /// a violation fails with [`UniError::MissingBaseline`] and leaves the
    /// manifest unfrozen and unfinalized.
    pub fn finalize(&mut self, ir_payload: Vec<u8>, identity: Option<Identity>) -> UniResult<()> {
        if self.frozen {
            return Err(UniError::FrozenManifest);
        }

        for (name, signature, group) in self.groups() {
            if group.baseline().is_none() {
                return Err(UniError::MissingBaseline {
                    name: name.to_string(),
                    signature: signature.clone(),
                });
            }
        }

        if let Some(identity) = identity {
            self.identity = identity;
        }
        self.ir_payload = ir_payload;
        self.frozen = true;
        Ok(())
    }

    /// Restore the frozen marker on a manifest that went through
    /// serialization (the marker itself is not a persisted field).
    pub(crate) fn mark_frozen(&mut self) {
        self.frozen = true;
    }
}
