//! Load-time selection and binding of exported variants.

use std::collections::BTreeMap;

use log::trace;
use unicore::{
    features::FeatureSet,
    manifest::{ExportManifest, Variant, VariantGroup},
    signature::Signature,
};

use crate::{
    binding::Binding,
    error::{LoadError, LoadResult},
    loader::LoadedImage,
};

/// One bound export in a resolved table.
#[derive(Debug, Clone)]
pub struct ResolvedExport {
    /// Features the selected variant required (not the full host set).
    pub required_features: FeatureSet,
    pub binding: Binding,
}

/// Immutable result of dispatch resolution: for every (exported name,
/// signature) pair, the binding of the variant selected for the host.
///
/// Owned by the load manager for the lifetime of the loaded artifact; safe to
/// read from any number of threads without locking.
#[derive(Debug, Default)]
pub struct ResolvedTable {
    entries: BTreeMap<String, BTreeMap<Signature, ResolvedExport>>,
    host: FeatureSet,
}

impl ResolvedTable {
    pub fn get(&self, name: &str, signature: &Signature) -> Option<&ResolvedExport> {
        self.entries.get(name)?.get(signature)
    }

    /// Host feature set this table was resolved against.
    pub fn host_features(&self) -> &FeatureSet {
        &self.host
    }

    pub fn exports(&self) -> impl Iterator<Item = (&str, &Signature, &ResolvedExport)> {
        self.entries.iter().flat_map(|(name, signatures)| {
            signatures
                .iter()
                .map(move |(signature, export)| (name.as_str(), signature, export))
        })
    }

    pub fn len(&self) -> usize {
        self.entries.values().map(BTreeMap::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Select the most specific variant satisfied by `host`.
///
/// Ties in specificity go to the first-inserted variant: the scan only
/// replaces the current best on a strictly greater specificity. The baseline
/// guarantees a selection for any host; `None` here means the group violates
/// the baseline invariant.
pub fn select_variant<'a>(group: &'a VariantGroup, host: &FeatureSet) -> Option<&'a Variant> {
    let mut best: Option<&Variant> = None;
    for variant in group.variants() {
        if !host.satisfies(&variant.required_features) {
            continue;
        }
        match best {
            Some(current)
                if variant.required_features.specificity()
                    <= current.required_features.specificity() => {}
            _ => best = Some(variant),
        }
    }
    best
}

/// Resolve every variant group of `manifest` against `host` and bind the
/// selected symbols through `image`.
///
/// Fails with [`LoadError::MissingSymbol`] when the image lacks a symbol the
/// manifest promises (the artifact is malformed), and with
/// [`LoadError::UnsupportedFeature`] when a group has no satisfied variant
/// (unreachable for artifacts whose baseline invariant holds).
pub fn bind(
    manifest: &ExportManifest,
    image: &dyn LoadedImage,
    host: &FeatureSet,
) -> LoadResult<ResolvedTable> {
    let mut entries: BTreeMap<String, BTreeMap<Signature, ResolvedExport>> = BTreeMap::new();

    for (name, signature, group) in manifest.groups() {
        let variant =
            select_variant(group, host).ok_or_else(|| LoadError::UnsupportedFeature {
                name: name.to_string(),
                signature: signature.clone(),
                host: host.clone(),
            })?;

        let address =
            image
                .symbol_address(&variant.symbol)
                .ok_or_else(|| LoadError::MissingSymbol {
                    symbol: variant.symbol.clone(),
                    name: name.to_string(),
                })?;

        trace!(
            "export '{}' `{}` -> symbol '{}' (features [{}]) at {:#x}",
            name, signature, variant.symbol, variant.required_features, address
        );

        entries.entry(name.to_string()).or_default().insert(
            signature.clone(),
            ResolvedExport {
                required_features: variant.required_features.clone(),
                binding: Binding::new(variant.symbol.clone(), signature.clone(), address),
            },
        );
    }

    Ok(ResolvedTable {
        entries,
        host: host.clone(),
    })
}

#[cfg(test)]
mod tests {
    use unicore::manifest::ExportManifest;

    use super::*;

    fn sig(text: &str) -> Signature {
        text.parse().unwrap()
    }

    fn fs(text: &str) -> FeatureSet {
        text.parse().unwrap()
    }

    fn group_of(symbol_features: &[(&str, &str)]) -> VariantGroup {
        let mut manifest = ExportManifest::new();
        for (symbol, features) in symbol_features {
            manifest
                .add_variant("f", sig("i64(i64)"), *symbol, fs(features), None)
                .unwrap();
        }
        manifest.group("f", &sig("i64(i64)")).unwrap().clone()
    }

    #[test]
    fn selects_most_specific_satisfied_variant() {
        let group = group_of(&[("base", ""), ("avx2", "avx2"), ("avx512", "avx2,avx512f")]);

        let selected = select_variant(&group, &fs("avx2,avx512f,fma")).unwrap();
        assert_eq!(selected.symbol, "avx512");

        let selected = select_variant(&group, &fs("avx2")).unwrap();
        assert_eq!(selected.symbol, "avx2");
    }

    #[test]
    fn baseline_is_selected_for_an_empty_host() {
        let group = group_of(&[("base", ""), ("avx2", "avx2")]);
        let selected = select_variant(&group, &FeatureSet::empty()).unwrap();
        assert_eq!(selected.symbol, "base");
    }

    #[test]
    fn specificity_ties_go_to_the_first_inserted() {
        let group = group_of(&[("base", ""), ("fma_first", "fma"), ("avx_second", "avx")]);
        let selected = select_variant(&group, &fs("avx,fma")).unwrap();
        assert_eq!(
            selected.symbol, "fma_first",
            "first-inserted variant must win specificity ties"
        );
    }

    #[test]
    fn unsatisfied_variants_are_ignored() {
        let group = group_of(&[("base", ""), ("avx512", "avx512f")]);
        let selected = select_variant(&group, &fs("avx2")).unwrap();
        assert_eq!(selected.symbol, "base");
    }

    #[test]
    fn a_group_violating_the_baseline_invariant_yields_no_selection() {
        // Only reachable from hand-edited containers; finalize rejects it.
        assert!(select_variant(&VariantGroup::default(), &fs("avx2")).is_none());
    }
}
