//! In-memory fixtures for exercising the runtime without the platform
//! loader or a real code-generation backend.

use std::{
    collections::BTreeMap,
    path::{Path, PathBuf},
    sync::atomic::{AtomicUsize, Ordering},
};

use dashmap::DashMap;
use parking_lot::Mutex;
use unicore::features::FeatureSet;

use crate::{
    backend::{BackendError, CodegenBackend, SymbolRequest},
    error::{LoadError, LoadResult},
    loader::{ImageLoader, LoadedImage},
};

/// A fake native image: a symbol table mapping compiled names to addresses.
#[derive(Debug, Clone, Default)]
pub struct MemoryImage {
    symbols: BTreeMap<String, usize>,
}

impl MemoryImage {
    pub fn new() -> Self {
        MemoryImage::default()
    }

    pub fn with_symbols<I, S>(symbols: I) -> Self
    where
        I: IntoIterator<Item = (S, usize)>,
        S: Into<String>,
    {
        let mut image = MemoryImage::new();
        for (symbol, address) in symbols {
            image.insert(symbol, address);
        }
        image
    }

    pub fn insert(&mut self, symbol: impl Into<String>, address: usize) {
        self.symbols.insert(symbol.into(), address);
    }
}

impl LoadedImage for MemoryImage {
    fn symbol_address(&self, symbol: &str) -> Option<usize> {
        self.symbols.get(symbol).copied()
    }
}

/// [`ImageLoader`] serving pre-registered [`MemoryImage`]s, keyed by the
/// file stem of the opened path (which is how the load manager names
/// materialized images).
#[derive(Debug, Default)]
pub struct MemoryImageLoader {
    images: DashMap<String, MemoryImage>,
}

impl MemoryImageLoader {
    pub fn new() -> Self {
        MemoryImageLoader::default()
    }

    pub fn register(&self, stem: impl Into<String>, image: MemoryImage) {
        self.images.insert(stem.into(), image);
    }
}

impl ImageLoader for MemoryImageLoader {
    fn open(&self, path: &Path) -> LoadResult<Box<dyn LoadedImage>> {
        let stem = path
            .file_stem()
            .map(|stem| stem.to_string_lossy().into_owned())
            .unwrap_or_default();
        self.images
            .get(&stem)
            .map(|image| Box::new(image.clone()) as Box<dyn LoadedImage>)
            .ok_or_else(|| LoadError::ImageNotFound {
                path: path.display().to_string(),
            })
    }
}

/// Recorded arguments of one [`CodegenBackend::compile`] call.
#[derive(Debug, Clone)]
pub struct CompileRequest {
    pub ir: Vec<u8>,
    pub target: FeatureSet,
    pub symbols: Vec<SymbolRequest>,
}

/// Backend that records every request and returns a canned image (or a
/// canned failure).
#[derive(Debug, Default)]
pub struct StubBackend {
    image: Vec<u8>,
    fail_with: Option<String>,
    requests: Mutex<Vec<CompileRequest>>,
}

impl StubBackend {
    pub fn returning(image: impl Into<Vec<u8>>) -> Self {
        StubBackend {
            image: image.into(),
            ..StubBackend::default()
        }
    }

    pub fn failing(message: impl Into<String>) -> Self {
        StubBackend {
            fail_with: Some(message.into()),
            ..StubBackend::default()
        }
    }

    pub fn requests(&self) -> Vec<CompileRequest> {
        self.requests.lock().clone()
    }
}

impl CodegenBackend for StubBackend {
    fn compile(
        &self,
        ir: &[u8],
        target: &FeatureSet,
        symbols: &[SymbolRequest],
    ) -> Result<Vec<u8>, BackendError> {
        self.requests.lock().push(CompileRequest {
            ir: ir.to_vec(),
            target: target.clone(),
            symbols: symbols.to_vec(),
        });
        match &self.fail_with {
            Some(message) => Err(BackendError::new(message.clone())),
            None => Ok(self.image.clone()),
        }
    }
}

/// A fresh scratch directory under the system temp dir, unique per call.
pub fn scratch_dir(tag: &str) -> PathBuf {
    static COUNTER: AtomicUsize = AtomicUsize::new(0);
    let dir = std::env::temp_dir().join(format!(
        "unilib-test-{}-{}-{}",
        std::process::id(),
        tag,
        COUNTER.fetch_add(1, Ordering::SeqCst)
    ));
    std::fs::create_dir_all(&dir).expect("scratch dir should be creatable");
    dir
}
