//! External code-generation collaborator contract.

use thiserror::Error;
use unicore::{features::FeatureSet, signature::Signature};

/// One entry of the symbol table handed to the backend: the original
/// exported-name/signature/symbol-name triple plus the features the variant
/// was declared with.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SymbolRequest {
    pub export: String,
    pub signature: Signature,
    pub symbol: String,
    pub required_features: FeatureSet,
}

/// Failure reported by a code-generation backend.
#[derive(Debug, Error)]
#[error("{message}")]
pub struct BackendError {
    pub message: String,
}

impl BackendError {
    pub fn new(message: impl Into<String>) -> Self {
        BackendError {
            message: message.into(),
        }
    }
}

/// Turns embedded IR into a native image for an exact target.
///
/// Implementations must emit every requested symbol name unchanged: the
/// regenerated artifact is rebound by the same dispatch resolver, against the
/// same manifest symbol table, as the artifact it replaces.
pub trait CodegenBackend: Send + Sync {
    fn compile(
        &self,
        ir: &[u8],
        target: &FeatureSet,
        symbols: &[SymbolRequest],
    ) -> Result<Vec<u8>, BackendError>;
}
