//! Image storage formats.
//!
//! - [`detect`]: classify an image path by suffix
//! - [`zarr`]: parse OME-Zarr multiscale metadata

pub mod detect;
pub mod zarr;

pub use detect::{detect_format, is_image_path, ImageDataFormat};
