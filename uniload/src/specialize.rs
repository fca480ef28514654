//! Re-specialization of packaged artifacts for an exact target.
//!
//! Specialization is out-of-band and potentially slow: it extracts the
//! embedded IR from an artifact, drives the code-generation backend for the
//! resolved target, and produces a *new* artifact carrying the original
//! identity. It never mutates its input and never touches the bindings of a
//! live process; the output only matters to a later load.

use std::path::{Path, PathBuf};

use log::info;
use unicore::{
    artifact::Artifact,
    features::FeatureSet,
    magic::specialized_path,
    manifest::ExportManifest,
};

use crate::{
    backend::{CodegenBackend, SymbolRequest},
    cpu::{TargetSpec, resolve_target},
    error::{LoadError, LoadResult},
};

/// Options for a specialization request. `target_cpu` mirrors the
/// caller-facing surface (`"host"` by default); an explicit `features` set
/// wins over it.
#[derive(Debug, Clone, Default)]
pub struct SpecializeOptions {
    pub target_cpu: TargetSpec,
    pub features: Option<FeatureSet>,
}

/// The original exported-name/signature/symbol table of `manifest`, in
/// manifest order.
pub fn symbol_table(manifest: &ExportManifest) -> Vec<SymbolRequest> {
    let mut symbols = Vec::new();
    for (name, signature, group) in manifest.groups() {
        for variant in group.variants() {
            symbols.push(SymbolRequest {
                export: name.to_string(),
                signature: signature.clone(),
                symbol: variant.symbol.clone(),
                required_features: variant.required_features.clone(),
            });
        }
    }
    symbols
}

/// Recompile `artifact`'s embedded IR for the resolved target and return a
/// new artifact carrying the same identity, marked as specialized.
///
/// Backend failure surfaces as [`LoadError::Recompilation`] and leaves the
/// input artifact untouched and fully usable.
pub fn specialize(
    artifact: &Artifact,
    backend: &dyn CodegenBackend,
    options: &SpecializeOptions,
) -> LoadResult<Artifact> {
    let manifest = artifact.manifest();
    let identity = manifest.identity();

    if manifest.ir_payload().is_empty() {
        return Err(LoadError::MissingIr { identity });
    }

    let target = match &options.features {
        Some(features) => features.clone(),
        None => resolve_target(&options.target_cpu),
    };
    info!("specializing artifact {} for features [{}]", identity, target);

    let symbols = symbol_table(manifest);
    let image = backend
        .compile(manifest.ir_payload(), &target, &symbols)
        .map_err(|source| LoadError::Recompilation { source, identity })?;

    // Rebuild the manifest: same exports, same symbol names, same IR, the
    // identity carried forward unchanged.
    let mut specialized = ExportManifest::new();
    for (name, signature, group) in manifest.groups() {
        for variant in group.variants() {
            specialized.add_variant(
                name,
                signature.clone(),
                variant.symbol.clone(),
                variant.required_features.clone(),
                variant.provenance.clone(),
            )?;
        }
    }
    specialized.set_specialized(true)?;
    specialized.finalize(manifest.ir_payload().to_vec(), Some(identity))?;

    Ok(Artifact::new(specialized, image)?)
}

/// [`specialize`], then publish the result at the conventional specialized
/// location derived from `original_path`. The artifact write is atomic: a
/// failed or abandoned run never leaves a partial artifact behind.
pub fn specialize_to_disk(
    artifact: &Artifact,
    backend: &dyn CodegenBackend,
    options: &SpecializeOptions,
    original_path: &Path,
) -> LoadResult<PathBuf> {
    let specialized = specialize(artifact, backend, options)?;
    let path = specialized_path(original_path);
    specialized.write_to(&path)?;
    Ok(path)
}
