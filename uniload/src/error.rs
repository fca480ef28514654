use thiserror::Error;
use unicore::{error::UniError, features::FeatureSet, manifest::Identity, signature::Signature};

use crate::backend::BackendError;

#[derive(Debug, Error)]
pub enum LoadError {
    #[error(transparent)]
    Core(#[from] UniError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to open native image '{path}': {source}")]
    OpenImage {
        source: libloading::Error,
        path: String,
    },

    #[error("no native image registered for '{path}'")]
    ImageNotFound { path: String },

    #[error("native image lacks symbol '{symbol}' promised for export '{name}'")]
    MissingSymbol { symbol: String, name: String },

    #[error(
        "no variant of export '{name}' with signature `{signature}` is satisfied by host features [{host}]"
    )]
    UnsupportedFeature {
        name: String,
        signature: Signature,
        host: FeatureSet,
    },

    #[error("binding for symbol '{symbol}' has signature `{expected}`, requested `{requested}`")]
    SignatureMismatch {
        symbol: String,
        expected: Signature,
        requested: Signature,
    },

    #[error("artifact {identity} carries no IR payload and cannot be specialized")]
    MissingIr { identity: Identity },

    #[error("recompilation of artifact {identity} failed: {source}")]
    Recompilation {
        source: BackendError,
        identity: Identity,
    },
}

pub type LoadResult<T> = Result<T, LoadError>;
