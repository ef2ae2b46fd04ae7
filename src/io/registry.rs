//! Image Registry for caching opened image handles.
//!
//! The registry provides:
//! - LRU caching of opened image handles so a file is opened once per build
//! - A single seam between composition code and the [`ImageOpener`] backend
//!
//! Probing a group's representative file and later instantiating its images
//! both go through the registry, so the backend sees each path only once.
//!
//! # Example
//!
//! ```ignore
//! use microview::io::{ImageRegistry, LocalImageOpener};
//!
//! let registry = ImageRegistry::new(LocalImageOpener::new());
//!
//! // Opens and caches on first access
//! let handle = registry.get_image("/data/cells.ome.zarr").await?;
//! println!("{:?}", handle.dimensions());
//! ```

use std::num::NonZeroUsize;
use std::sync::Arc;

use lru::LruCache;
use tokio::sync::RwLock;
use tracing::debug;

use crate::error::IoError;

use super::opener::{ImageHandle, ImageOpener};

// =============================================================================
// Configuration
// =============================================================================

/// Default capacity for the handle cache (number of images).
pub const DEFAULT_IMAGE_CACHE_CAPACITY: usize = 256;

// =============================================================================
// ImageRegistry
// =============================================================================

/// Registry for opening and caching image handles.
pub struct ImageRegistry<O: ImageOpener> {
    /// The backend used to open images
    opener: O,

    /// Cached handles indexed by path
    cache: RwLock<LruCache<String, Arc<ImageHandle>>>,
}

impl<O: ImageOpener> ImageRegistry<O> {
    /// Create a new ImageRegistry with the default capacity.
    pub fn new(opener: O) -> Self {
        Self::with_capacity(opener, DEFAULT_IMAGE_CACHE_CAPACITY)
    }

    /// Create a new ImageRegistry holding at most `capacity` handles.
    ///
    /// A capacity of zero is treated as one.
    pub fn with_capacity(opener: O, capacity: usize) -> Self {
        let capacity = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN);
        Self {
            opener,
            cache: RwLock::new(LruCache::new(capacity)),
        }
    }

    /// The backend behind this registry.
    pub fn opener(&self) -> &O {
        &self.opener
    }

    /// Get an image handle, opening it if not already cached.
    pub async fn get_image(&self, path: &str) -> Result<Arc<ImageHandle>, IoError> {
        {
            let mut cache = self.cache.write().await;
            if let Some(handle) = cache.get(path) {
                return Ok(handle.clone());
            }
        }

        debug!("Opening image {}", path);
        let handle = Arc::new(self.opener.open(path).await?);

        let mut cache = self.cache.write().await;
        cache.put(path.to_string(), handle.clone());
        Ok(handle)
    }

    /// Remove an image from the cache.
    pub async fn invalidate(&self, path: &str) {
        let mut cache = self.cache.write().await;
        cache.pop(path);
    }

    /// Clear all cached images.
    pub async fn clear(&self) {
        let mut cache = self.cache.write().await;
        cache.clear();
    }

    /// Get the number of cached images.
    pub async fn cached_count(&self) -> usize {
        let cache = self.cache.read().await;
        cache.len()
    }
}

// =============================================================================
// Tests
// =============================================================================
