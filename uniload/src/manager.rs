//! Orchestrates artifact loading: container decoding, host probing, dispatch
//! resolution, and adoption of identity-matched specialized artifacts.

use std::{
    fs,
    path::{Path, PathBuf},
    sync::Arc,
};

use dashmap::DashMap;
use log::{info, trace, warn};
use parking_lot::Mutex;
use strum::Display;
use unicore::{
    artifact::Artifact,
    features::FeatureSet,
    magic::{ENV_CACHE_PATH, logical_name, specialized_path},
    manifest::{ExportManifest, Identity},
};

use crate::{
    backend::CodegenBackend,
    cpu::detect_host,
    error::LoadResult,
    loader::{DynamicImageLoader, ImageLoader, LoadedImage},
    resolver::{ResolvedTable, bind},
    specialize::{SpecializeOptions, specialize_to_disk},
};

/// Load-state of one artifact within this process.
///
/// `Resolved` is terminal when no specialized counterpart is discoverable;
/// `SpecializedLoaded` and `RevertedToGeneric` are always terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
pub enum LoadState {
    Unloaded,
    GenericLoaded,
    Resolved,
    SpecializedCandidate,
    SpecializedLoaded,
    RevertedToGeneric,
}

/// One artifact loaded into this process.
///
/// The resolved table is immutable for the lifetime of this value and safe
/// to share across threads without locking.
pub struct LoadedArtifact {
    name: String,
    /// Path of the generic container this artifact was loaded from; the
    /// specialized counterpart location is derived from it.
    path: PathBuf,
    state: LoadState,
    /// Decoded contents actually serving calls (generic or specialized).
    artifact: Artifact,
    table: ResolvedTable,
    /// Bindings in `table` point into this image.
    ///
    /// SAFETY: Drop order ensures the table is dropped before the image it
    /// points into. DO NOT CHANGE THE ORDER OF FIELDS!
    _image: Box<dyn LoadedImage>,
}

impl LoadedArtifact {
    /// Logical name, derived from the container file stem.
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn identity(&self) -> Identity {
        self.artifact.manifest().identity()
    }

    pub fn state(&self) -> LoadState {
        self.state
    }

    /// True when this process is serving the specialized artifact.
    pub fn is_specialized(&self) -> bool {
        self.artifact.manifest().is_specialized()
    }

    pub fn manifest(&self) -> &ExportManifest {
        self.artifact.manifest()
    }

    pub fn table(&self) -> &ResolvedTable {
        &self.table
    }

    /// Embedded IR payload of the artifact serving calls.
    pub fn ir_payload(&self) -> &[u8] {
        self.artifact.manifest().ir_payload()
    }

    /// Re-specialize this artifact for `options` and publish the result at
    /// the conventional location derived from the original container path.
    ///
    /// Out-of-band: the current process keeps its bindings; the new artifact
    /// is discovered by the next process to load this logical name.
    pub fn specialize(
        &self,
        backend: &dyn CodegenBackend,
        options: &SpecializeOptions,
    ) -> LoadResult<PathBuf> {
        specialize_to_disk(&self.artifact, backend, options, &self.path)
    }
}

/// Options for constructing a [`LoadManager`].
#[derive(Debug, Clone, Default)]
pub struct LoadManagerOptions {
    /// Directory used to materialize embedded native images before the host
    /// loader maps them. Defaults to [`default_cache_dir`].
    pub cache_dir: Option<PathBuf>,
}

/// Default cache directory for materialized images.
pub fn default_cache_dir() -> PathBuf {
    // Check if the environment variable is set
    if let Ok(cache_path) = std::env::var(ENV_CACHE_PATH) {
        return cache_path.into();
    }

    // Fallback to default paths based on OS
    let mut path = PathBuf::new();

    #[cfg(target_os = "windows")]
    {
        if let Ok(local_appdata) = std::env::var("LOCALAPPDATA") {
            path.push(local_appdata);
        }

        // Fallback to current directory if LOCALAPPDATA is not set
        path.push("unilib");
    }
    #[cfg(any(target_os = "linux", target_os = "macos"))]
    {
        if let Ok(xdg_cache_home) = std::env::var("XDG_CACHE_HOME") {
            path.push(xdg_cache_home);
        } else if let Ok(home) = std::env::var("HOME") {
            path.push(home);
            path.push(".cache");
        } else {
            // Fallback to current directory if HOME is not set
        }

        path.push("unilib");
    }

    path
}

/// Loads artifacts and owns the process-scoped registry of resolved tables.
///
/// First-time loads are serialized per logical name: the per-name lock is
/// held across the whole state-machine run, so no thread ever observes a
/// partially resolved table. Repeat loads return the cached artifact.
pub struct LoadManager {
    loader: Box<dyn ImageLoader>,
    cache_dir: PathBuf,
    loaded: DashMap<String, Arc<LoadedArtifact>>,
    locks: DashMap<String, Arc<Mutex<()>>>,
}

impl Default for LoadManager {
    fn default() -> Self {
        LoadManager::new()
    }
}

impl LoadManager {
    /// Manager backed by the platform dynamic loader.
    pub fn new() -> Self {
        LoadManager::with_loader(Box::new(DynamicImageLoader), LoadManagerOptions::default())
    }

    pub fn with_loader(loader: Box<dyn ImageLoader>, options: LoadManagerOptions) -> Self {
        LoadManager {
            loader,
            cache_dir: options.cache_dir.unwrap_or_else(default_cache_dir),
            loaded: DashMap::new(),
            locks: DashMap::new(),
        }
    }

    /// Load the artifact at `path`, or return the already-loaded artifact
    /// for its logical name.
    pub fn load(&self, path: &Path) -> LoadResult<Arc<LoadedArtifact>> {
        let name = logical_name(path);

        // Scope the shard guard: only the per-name mutex is held across the
        // state-machine run.
        let lock = {
            let entry = self.locks.entry(name.clone()).or_default();
            Arc::clone(entry.value())
        };
        let _guard = lock.lock();

        if let Some(existing) = self.loaded.get(&name) {
            return Ok(Arc::clone(existing.value()));
        }

        let loaded = Arc::new(self.run_state_machine(&name, path)?);
        self.loaded.insert(name, loaded.clone());
        Ok(loaded)
    }

    /// Already-loaded artifact for a logical name, if any.
    pub fn get(&self, name: &str) -> Option<Arc<LoadedArtifact>> {
        self.loaded.get(name).map(|entry| Arc::clone(entry.value()))
    }

    fn run_state_machine(&self, name: &str, path: &Path) -> LoadResult<LoadedArtifact> {
        let host = detect_host();

        let generic = Artifact::read_from(path)?;
        let image = self.open_image(name, &generic)?;
        trace!("opened generic image for '{}' ({})", name, generic.manifest().identity());

        let table = bind(generic.manifest(), image.as_ref(), &host)?;
        info!(
            "resolved artifact '{}' ({}) with {} exports against host [{}]",
            name,
            generic.manifest().identity(),
            table.len(),
            host
        );

        let candidate_path = specialized_path(path);
        if !candidate_path.exists() {
            return Ok(LoadedArtifact {
                name: name.to_string(),
                path: path.to_path_buf(),
                state: LoadState::Resolved,
                artifact: generic,
                table,
                _image: image,
            });
        }

        // SpecializedCandidate: a counterpart exists but is not yet trusted.
        let state = match self.adopt_candidate(name, &candidate_path, &generic, &host) {
            Ok(Some((artifact, candidate_table, candidate_image))) => {
                info!(
                    "loaded specialized artifact for '{}' in place of the generic artifact",
                    name
                );
                return Ok(LoadedArtifact {
                    name: name.to_string(),
                    path: path.to_path_buf(),
                    state: LoadState::SpecializedLoaded,
                    artifact,
                    table: candidate_table,
                    _image: candidate_image,
                });
            }
            Ok(None) => LoadState::RevertedToGeneric,
            Err(err) => {
                warn!(
                    "specialized artifact {} could not be loaded ({}); falling back to the generic artifact",
                    candidate_path.display(),
                    err
                );
                LoadState::RevertedToGeneric
            }
        };

        Ok(LoadedArtifact {
            name: name.to_string(),
            path: path.to_path_buf(),
            state,
            artifact: generic,
            table,
            _image: image,
        })
    }

    /// Try to adopt the specialized counterpart. `Ok(None)` means the
    /// candidate is stale (identity mismatch, warned here exactly once per
    /// load); `Err` means the candidate could not be decoded or bound.
    #[allow(clippy::type_complexity)]
    fn adopt_candidate(
        &self,
        name: &str,
        candidate_path: &Path,
        generic: &Artifact,
        host: &FeatureSet,
    ) -> LoadResult<Option<(Artifact, ResolvedTable, Box<dyn LoadedImage>)>> {
        let candidate = Artifact::read_from(candidate_path)?;

        let generic_identity = generic.manifest().identity();
        let candidate_identity = candidate.manifest().identity();
        if candidate_identity != generic_identity {
            warn!(
                "identity {} of specialized artifact '{}' does not match identity {} of '{}'; \
                 specialization will not be used",
                candidate_identity,
                candidate_path.display(),
                generic_identity,
                name
            );
            return Ok(None);
        }

        let stem = logical_name(candidate_path);
        let image = self.open_image(&stem, &candidate)?;
        let table = bind(candidate.manifest(), image.as_ref(), host)?;
        Ok(Some((candidate, table, image)))
    }

    /// Materialize an artifact's embedded image bytes under the cache
    /// directory and open them through the image loader.
    fn open_image(&self, stem: &str, artifact: &Artifact) -> LoadResult<Box<dyn LoadedImage>> {
        fs::create_dir_all(&self.cache_dir)?;
        let image_path = self
            .cache_dir
            .join(stem)
            .with_extension(std::env::consts::DLL_EXTENSION);
        fs::write(&image_path, artifact.image())?;
        self.loader.open(&image_path)
    }
}
