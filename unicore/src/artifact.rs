//! Artifact assembly and persistence.
//!
//! The packager's job: take a finalized export manifest and the compiled
//! native image, and produce one distributable container file.

use std::{
    fs,
    path::Path,
};

use log::info;

use crate::{
    container::ArtifactPayload,
    error::{UniError, UniResult},
    manifest::ExportManifest,
};

/// The embedded IR + compiled code + export manifest, addressable as one
/// loadable unit.
///
/// Created by the packager at build time; loaded read-only by the runtime's
/// load manager; a specialized artifact is created from a loaded artifact's
/// IR and is itself subsequently loadable.
#[derive(Debug, Clone, PartialEq)]
pub struct Artifact {
    manifest: ExportManifest,
    image: Vec<u8>,
}

impl Artifact {
    /// Assemble an artifact from a finalized manifest and compiled image
    /// bytes. Fails with [`UniError::UnfinalizedManifest`] when the manifest
    /// has not been through `finalize`.
    pub fn new(manifest: ExportManifest, image: Vec<u8>) -> UniResult<Self> {
        if !manifest.is_frozen() {
            return Err(UniError::UnfinalizedManifest);
        }
        Ok(Artifact { manifest, image })
    }

    pub fn manifest(&self) -> &ExportManifest {
        &self.manifest
    }

    /// Compiled native image bytes, materialized to disk by the load manager
    /// before the host loader maps them.
    pub fn image(&self) -> &[u8] {
        &self.image
    }

    pub fn encode(&self) -> UniResult<Vec<u8>> {
        ArtifactPayload {
            manifest: self.manifest.clone(),
            image: self.image.clone(),
        }
        .encode()
    }

    pub fn decode(bytes: &[u8]) -> UniResult<Self> {
        let payload = ArtifactPayload::decode(bytes)?;
        Ok(Artifact {
            manifest: payload.manifest,
            image: payload.image,
        })
    }

    /// Write the encoded container to `path`, creating parent directories as
    /// needed. The write goes through a sibling temporary file and a rename,
    /// so a failed or abandoned write never publishes a partial artifact.
    pub fn write_to(&self, path: &Path) -> UniResult<()> {
        let bytes = self.encode()?;

        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }

        let mut tmp = path.as_os_str().to_owned();
        tmp.push(".tmp");
        let tmp = Path::new(&tmp);
        fs::write(tmp, &bytes)?;
        fs::rename(tmp, path)?;

        info!(
            "wrote artifact {} ({} bytes) to {}",
            self.manifest.identity(),
            bytes.len(),
            path.display()
        );
        Ok(())
    }

    pub fn read_from(path: &Path) -> UniResult<Self> {
        let bytes = fs::read(path)?;
        Artifact::decode(&bytes)
    }
}
