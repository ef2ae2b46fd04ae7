//! Image backend seam.
//!
//! - [`ImageOpener`]: async trait implemented by image I/O backends
//! - [`LocalImageOpener`]: OME-Zarr and raster metadata from local disk
//! - [`ImageRegistry`]: LRU cache of opened handles in front of an opener

mod local;
mod opener;
mod registry;

pub use local::LocalImageOpener;
pub use opener::{ImageHandle, ImageOpener, LevelInfo, PixelSource, SourcePair, VoxelSize};
pub use registry::{ImageRegistry, DEFAULT_IMAGE_CACHE_CAPACITY};
