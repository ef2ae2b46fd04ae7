//! Format detection for image files.
//!
//! Images are classified by path suffix, the same way dataset files key their
//! storage locations. Detection is purely lexical: nothing is read from disk.
//!
//! Unsupported suffixes return an error that callers surface as "unsupported
//! format".

use serde::{Deserialize, Serialize};

use crate::error::IoError;

// =============================================================================
// ImageDataFormat
// =============================================================================

/// Storage format of a multi-resolution image.
///
/// The serialized names are the keys used in a data source's `imageData` map.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum ImageDataFormat {
    /// OME-Zarr (NGFF) multiscale image
    #[serde(rename = "ome.zarr")]
    OmeZarr,

    /// N5 container with BigDataViewer layout
    #[serde(rename = "bdv.n5")]
    N5,

    /// BigDataViewer XML pointing at HDF5 or N5 data
    #[serde(rename = "bdv.xml")]
    BdvXml,

    /// BigDataViewer HDF5
    #[serde(rename = "bdv.hdf5")]
    Hdf5,

    /// TIFF (single file, possibly multi-page)
    #[serde(rename = "tiff")]
    Tiff,

    /// Plain 2-D raster (PNG, JPEG)
    #[serde(rename = "image2d")]
    Image2D,
}

impl ImageDataFormat {
    /// Get a human-readable name for the format.
    pub const fn name(&self) -> &'static str {
        match self {
            ImageDataFormat::OmeZarr => "OME-Zarr",
            ImageDataFormat::N5 => "N5",
            ImageDataFormat::BdvXml => "BigDataViewer XML",
            ImageDataFormat::Hdf5 => "HDF5",
            ImageDataFormat::Tiff => "TIFF",
            ImageDataFormat::Image2D => "2D raster image",
        }
    }

    /// Whether this format is a directory-based container.
    pub const fn is_container(&self) -> bool {
        matches!(self, ImageDataFormat::OmeZarr | ImageDataFormat::N5)
    }
}

impl std::fmt::Display for ImageDataFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

// =============================================================================
// Format Detection
// =============================================================================

/// Suffixes recognised per format, checked in order.
///
/// `.ome.zarr` must come before anything that could match a shorter suffix.
const SUFFIXES: &[(&str, ImageDataFormat)] = &[
    (".ome.zarr", ImageDataFormat::OmeZarr),
    (".zarr", ImageDataFormat::OmeZarr),
    (".n5", ImageDataFormat::N5),
    (".xml", ImageDataFormat::BdvXml),
    (".h5", ImageDataFormat::Hdf5),
    (".hdf5", ImageDataFormat::Hdf5),
    (".ome.tif", ImageDataFormat::Tiff),
    (".ome.tiff", ImageDataFormat::Tiff),
    (".tif", ImageDataFormat::Tiff),
    (".tiff", ImageDataFormat::Tiff),
    (".png", ImageDataFormat::Image2D),
    (".jpg", ImageDataFormat::Image2D),
    (".jpeg", ImageDataFormat::Image2D),
];

/// Detect the format of an image from its path.
///
/// Trailing path separators are ignored, so `data/img.ome.zarr/` is an
/// OME-Zarr container.
///
/// # Returns
/// * `Ok(ImageDataFormat)` - The detected format
/// * `Err(IoError::UnsupportedFormat)` - Suffix not recognised
pub fn detect_format(path: &str) -> Result<ImageDataFormat, IoError> {
    let trimmed = path.trim_end_matches(['/', '\\']);
    let lower = trimmed.to_lowercase();

    SUFFIXES
        .iter()
        .find(|(suffix, _)| lower.ends_with(suffix))
        .map(|(_, format)| *format)
        .ok_or_else(|| IoError::UnsupportedFormat {
            reason: format!("unrecognised image file suffix: {}", trimmed),
        })
}

/// Whether the path has a suffix recognised by [`detect_format`].
pub fn is_image_path(path: &str) -> bool {
    detect_format(path).is_ok()
}

// =============================================================================
// Tests
// =============================================================================
