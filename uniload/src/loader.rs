//! Host loader contract and the dynamic-library implementation.
//!
//! The runtime never talks to the platform loader directly; it goes through
//! [`ImageLoader`]/[`LoadedImage`], so tests can substitute an in-memory
//! image and the dispatch logic stays platform-agnostic.

use std::path::Path;

use libloading::Library;

use crate::error::{LoadError, LoadResult};

/// A native image mapped into the process.
///
/// Addresses handed out by [`symbol_address`] are valid only while the image
/// is alive; the load manager keeps the image handle alongside the resolved
/// table and drops it last. Dropping the image closes it.
///
/// [`symbol_address`]: LoadedImage::symbol_address
pub trait LoadedImage: Send + Sync {
    /// Resolve a compiled symbol name to its in-memory address.
    fn symbol_address(&self, symbol: &str) -> Option<usize>;
}

/// Opens loadable images on behalf of the load manager.
pub trait ImageLoader: Send + Sync {
    fn open(&self, path: &Path) -> LoadResult<Box<dyn LoadedImage>>;
}

/// Native image opened through the platform dynamic loader.
pub struct DynamicImage {
    library: Library,
}

impl LoadedImage for DynamicImage {
    fn symbol_address(&self, symbol: &str) -> Option<usize> {
        // The generic parameter only fixes the size of the looked-up value;
        // typed reinterpretation happens later in the binding layer.
        let f = unsafe {
            self.library
                .get::<unsafe extern "C" fn()>(symbol.as_bytes())
                .ok()?
        };
        Some(*f as usize)
    }
}

/// [`ImageLoader`] backed by the platform dynamic loader (`dlopen` family).
#[derive(Debug, Clone, Copy, Default)]
pub struct DynamicImageLoader;

impl ImageLoader for DynamicImageLoader {
    fn open(&self, path: &Path) -> LoadResult<Box<dyn LoadedImage>> {
        let library = unsafe { Library::new(path) }.map_err(|source| LoadError::OpenImage {
            source,
            path: path.display().to_string(),
        })?;
        Ok(Box::new(DynamicImage { library }))
    }
}
