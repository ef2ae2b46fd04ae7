//! Test utilities for integration tests.
//!
//! This module provides a mock image backend and helpers for laying out
//! placeholder image files and annotation tables in temporary directories.

use async_trait::async_trait;
use std::collections::HashMap;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use microview::error::IoError;
use microview::format::detect_format;
use microview::io::{ImageHandle, ImageOpener, VoxelSize};

/// Shape served for paths without a preconfigured handle.
pub const DEFAULT_SHAPE: [u64; 3] = [64, 48, 1];

// =============================================================================
// Mock Image Opener
// =============================================================================

/// An image opener that serves preconfigured handles and counts every open.
///
/// Paths without a preconfigured handle open as a single-level image of
/// [`DEFAULT_SHAPE`] in the format detected from the path.
#[derive(Clone, Default)]
pub struct MockImageOpener {
    handles: HashMap<String, ImageHandle>,
    open_count: Arc<AtomicUsize>,
}

impl MockImageOpener {
    pub fn new() -> Self {
        Self::default()
    }

    /// Serve `handle` for its own path.
    pub fn with_handle(mut self, handle: ImageHandle) -> Self {
        self.handles.insert(handle.path.clone(), handle);
        self
    }

    /// Serve an image of `shape` for `path`.
    pub fn with_shape(self, path: &str, shape: [u64; 3]) -> Self {
        let format = detect_format(path).unwrap_or(microview::ImageDataFormat::OmeZarr);
        self.with_handle(ImageHandle::simple(path, format, shape, VoxelSize::pixel()))
    }

    pub fn open_count(&self) -> usize {
        self.open_count.load(Ordering::SeqCst)
    }

    /// Shared counter, readable after the opener moved into a registry.
    pub fn counter(&self) -> Arc<AtomicUsize> {
        Arc::clone(&self.open_count)
    }
}

#[async_trait]
impl ImageOpener for MockImageOpener {
    async fn open(&self, path: &str) -> Result<ImageHandle, IoError> {
        self.open_count.fetch_add(1, Ordering::SeqCst);

        if let Some(handle) = self.handles.get(path) {
            return Ok(handle.clone());
        }
        let format = detect_format(path)?;
        Ok(ImageHandle::simple(path, format, DEFAULT_SHAPE, VoxelSize::pixel()))
    }
}

// =============================================================================
// Filesystem Helpers
// =============================================================================

/// Create empty placeholder files (or directories for `.zarr`/`.n5` names).
pub fn touch_images(dir: &Path, names: &[&str]) {
    for name in names {
        let path = dir.join(name);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).unwrap();
        }
        if name.ends_with(".zarr") || name.ends_with(".n5") {
            std::fs::create_dir_all(&path).unwrap();
        } else {
            std::fs::write(&path, b"").unwrap();
        }
    }
}

/// Write a tab-separated table with a header row.
pub fn write_tsv(path: &Path, header: &[&str], rows: &[Vec<&str>]) {
    let mut text = header.join("\t");
    text.push('\n');
    for row in rows {
        text.push_str(&row.join("\t"));
        text.push('\n');
    }
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).unwrap();
    }
    std::fs::write(path, text).unwrap();
}

/// Absolute path of `name` inside `dir` as a string.
pub fn path_in(dir: &Path, name: &str) -> String {
    dir.join(name).to_string_lossy().into_owned()
}
