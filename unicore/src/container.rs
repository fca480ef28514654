//! Persisted artifact container format.
//!
//! Two CBOR layers: an outer wrapper carrying magic bytes and an exact
//! version requirement, and an inner payload carrying the manifest and the
//! compiled native image. The outer layer must stay stable across versions;
//! no change may break the ability to recognize (and reject) containers
//! written by other versions.

use log::trace;
use semver::{Comparator, Op, Version, VersionReq};
use serde::{Deserialize, Serialize};

use crate::{
    error::{UniError, UniResult},
    manifest::ExportManifest,
};

/// Inner payload of a packaged artifact: the manifest (exports, identity,
/// specialized flag, IR bytes) plus the compiled native image.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArtifactPayload {
    pub manifest: ExportManifest,
    pub image: Vec<u8>,
}

/// Outer artifact container wrapper.
///
/// See [`ArtifactContainer::MAGIC_BYTES`] for the magic bytes identifying
/// container files. The `version_req` is an exact requirement derived from
/// the writing crate's version; decoding fails when it does not match the
/// reading crate's version.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArtifactContainer {
    pub magic: [u8; 8],
    pub version_req: VersionReq,
    pub data: Vec<u8>,
}

impl ArtifactContainer {
    /// Magic bytes used to identify artifact container files.
    pub const MAGIC_BYTES: [u8; 8] = *b"\0UNILIB\0";
}

fn crate_version() -> Version {
    // CARGO_PKG_VERSION is always valid semver.
    Version::parse(env!("CARGO_PKG_VERSION")).expect("crate version is valid semver")
}

fn exact_version_req(version: &Version) -> VersionReq {
    VersionReq {
        comparators: vec![Comparator {
            op: Op::Exact,
            major: version.major,
            minor: Some(version.minor),
            patch: Some(version.patch),
            pre: version.pre.clone(),
        }],
    }
}

impl ArtifactPayload {
    /// Serialize into container bytes suitable for writing to disk.
    pub fn encode(&self) -> UniResult<Vec<u8>> {
        let data =
            serde_cbor::to_vec(self).map_err(|source| UniError::Encode { source })?;

        let container = ArtifactContainer {
            magic: ArtifactContainer::MAGIC_BYTES,
            version_req: exact_version_req(&crate_version()),
            data,
        };

        trace!(
            "encoding artifact container for {} ({} payload bytes, version requirement {})",
            self.manifest.identity(),
            container.data.len(),
            container.version_req
        );

        serde_cbor::to_vec(&container).map_err(|source| UniError::Encode { source })
    }

    /// Parse container bytes, checking magic and version compatibility.
    pub fn decode(bytes: &[u8]) -> UniResult<Self> {
        trace!("decoding artifact container ({} bytes)", bytes.len());

        let container: ArtifactContainer =
            serde_cbor::from_slice(bytes).map_err(|source| UniError::Decode { source })?;

        if container.magic != ArtifactContainer::MAGIC_BYTES {
            return Err(UniError::BadMagic);
        }

        let version = crate_version();
        if !container.version_req.matches(&version) {
            return Err(UniError::IncompatibleVersion {
                version,
                req: container.version_req,
            });
        }

        let mut payload: ArtifactPayload = serde_cbor::from_slice(&container.data)
            .map_err(|source| UniError::Decode { source })?;

        // Anything read back from disk went through finalize at build time.
        payload.manifest.mark_frozen();
        Ok(payload)
    }
}
