use thiserror::Error;

use crate::{features::FeatureSet, signature::Signature};

#[derive(Debug, Error)]
pub enum UniError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error(
        "duplicate variant for export '{name}' with signature `{signature}` and features [{features}]"
    )]
    DuplicateVariant {
        name: String,
        signature: Signature,
        features: FeatureSet,
    },

    #[error("manifest is frozen; no further mutation is allowed after finalization")]
    FrozenManifest,

    #[error("manifest must be finalized before packaging")]
    UnfinalizedManifest,

    #[error("export '{name}' with signature `{signature}` has no baseline variant")]
    MissingBaseline { name: String, signature: Signature },

    #[error("failed to parse signature '{text}': {reason}")]
    SignatureParse { text: String, reason: String },

    #[error("failed to parse feature set '{text}': {reason}")]
    FeatureParse { text: String, reason: String },

    #[error("failed to encode artifact container: {source}")]
    Encode { source: serde_cbor::Error },

    #[error("failed to decode artifact container: {source}")]
    Decode { source: serde_cbor::Error },

    #[error("invalid magic bytes in artifact container")]
    BadMagic,

    #[error("incompatible artifact container version: required {req}, found {version}")]
    IncompatibleVersion {
        version: semver::Version,
        req: semver::VersionReq,
    },
}

pub type UniResult<T> = Result<T, UniError>;
