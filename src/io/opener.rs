//! ImageOpener trait for format-agnostic image access.
//!
//! This module defines the narrow contract between the composition engine and
//! whatever multi-resolution I/O backend actually reads pixels. The engine only
//! ever needs an image's geometry and calibration; pixel access stays inside the
//! backend and the renderer.
//!
//! # Usage
//!
//! The trait is implemented by:
//! - [`crate::io::LocalImageOpener`] for OME-Zarr containers and 2-D rasters on disk
//! - test doubles serving preconfigured [`ImageHandle`]s

use async_trait::async_trait;

use crate::error::{IoError, ProbeError};
use crate::format::ImageDataFormat;
use crate::transform::AffineTransform3D;

// =============================================================================
// Level Information
// =============================================================================

/// Information about a single resolution level.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LevelInfo {
    /// Shape in voxels, x/y/z order
    pub shape: [u64; 3],

    /// Downsample factor relative to level 0, x/y/z order
    ///
    /// Level 0 has downsample `[1.0, 1.0, 1.0]`.
    pub downsample: [f64; 3],
}

impl LevelInfo {
    /// Full-resolution level of the given shape.
    pub fn full_resolution(shape: [u64; 3]) -> Self {
        Self {
            shape,
            downsample: [1.0; 3],
        }
    }
}

/// Physical size of a voxel.
#[derive(Debug, Clone, PartialEq)]
pub struct VoxelSize {
    /// Size along x, y, z
    pub size: [f64; 3],

    /// Unit of `size`, e.g. "micrometer" or "pixel"
    pub unit: String,
}

impl VoxelSize {
    pub fn new(size: [f64; 3], unit: impl Into<String>) -> Self {
        Self {
            size,
            unit: unit.into(),
        }
    }

    /// Unit-less voxel size of one pixel per axis.
    pub fn pixel() -> Self {
        Self::new([1.0; 3], "pixel")
    }

    /// The calibration transform scaling voxel indices to physical units.
    pub fn calibration(&self) -> AffineTransform3D {
        AffineTransform3D::scaling(self.size[0], self.size[1], self.size[2])
    }
}

// =============================================================================
// Image Handle
// =============================================================================

/// An opened multi-resolution image.
///
/// This is the snapshot of everything the backend reports about one file: its
/// format, pyramid, calibration and channel/time extent.
#[derive(Debug, Clone, PartialEq)]
pub struct ImageHandle {
    /// Path the image was opened from
    pub path: String,

    /// Storage format
    pub format: ImageDataFormat,

    /// Resolution levels, highest resolution first
    pub levels: Vec<LevelInfo>,

    /// Voxel size of level 0
    pub voxel_size: VoxelSize,

    /// Number of channels
    pub num_channels: u32,

    /// Number of timepoints, when the backend can tell
    pub num_time_points: Option<u32>,

    /// Display color per channel, when stored with the image
    pub channel_colors: Vec<Option<String>>,

    /// Contrast limits per channel, when stored with the image
    pub contrast_limits: Vec<Option<[f64; 2]>>,
}

impl ImageHandle {
    /// A single-level, single-channel, single-timepoint image.
    pub fn simple(
        path: impl Into<String>,
        format: ImageDataFormat,
        shape: [u64; 3],
        voxel_size: VoxelSize,
    ) -> Self {
        Self {
            path: path.into(),
            format,
            levels: vec![LevelInfo::full_resolution(shape)],
            voxel_size,
            num_channels: 1,
            num_time_points: Some(1),
            channel_colors: Vec::new(),
            contrast_limits: Vec::new(),
        }
    }

    /// Number of resolution levels.
    pub fn level_count(&self) -> usize {
        self.levels.len()
    }

    /// Shape of level 0, or `None` if the image has no levels.
    pub fn dimensions(&self) -> Option<[u64; 3]> {
        self.levels.first().map(|l| l.shape)
    }

    /// Number of z-slices of level 0 (1 for 2-D images).
    pub fn num_z_slices(&self) -> u32 {
        self.dimensions().map(|s| s[2].max(1) as u32).unwrap_or(1)
    }

    /// Create the full-precision and volatile views of one channel.
    ///
    /// Both share the same calibration; the volatile view is what a renderer
    /// shows while full-precision data is still loading.
    pub fn source_pair(&self, name: &str, channel: u32) -> Result<SourcePair, ProbeError> {
        if self.levels.is_empty() {
            return Err(ProbeError::NoLevels(self.path.clone()));
        }
        if channel >= self.num_channels.max(1) {
            return Err(ProbeError::ChannelOutOfRange {
                path: self.path.clone(),
                channel,
                num_channels: self.num_channels,
            });
        }

        let source = PixelSource {
            name: name.to_string(),
            channel,
            levels: self.levels.clone(),
            calibration: self.voxel_size.calibration(),
            unit: self.voxel_size.unit.clone(),
            volatile: false,
        };
        let volatile = PixelSource {
            volatile: true,
            ..source.clone()
        };

        Ok(SourcePair { source, volatile })
    }
}

// =============================================================================
// Source Pair
// =============================================================================

/// One channel of an image as seen by a renderer.
#[derive(Debug, Clone, PartialEq)]
pub struct PixelSource {
    pub name: String,
    pub channel: u32,
    pub levels: Vec<LevelInfo>,

    /// Native voxel-to-physical transform of level 0
    pub calibration: AffineTransform3D,

    pub unit: String,

    /// Whether this is the reduced-precision variant
    pub volatile: bool,
}

impl PixelSource {
    /// Voxel-to-physical transform of a level, including its downsampling.
    pub fn source_transform(&self, level: usize) -> Option<AffineTransform3D> {
        let info = self.levels.get(level)?;
        let d = info.downsample;
        Some(
            self.calibration
                .after(&AffineTransform3D::scaling(d[0], d[1], d[2])),
        )
    }

    /// Physical bounding box of level 0 as `(min, max)` in the native frame.
    ///
    /// Voxels are treated as unit cells, so a 2-D image still has the
    /// thickness of one z-voxel.
    pub fn physical_extent(&self) -> Option<([f64; 3], [f64; 3])> {
        let shape = self.levels.first()?.shape;
        let corner = [
            shape[0].max(1) as f64,
            shape[1].max(1) as f64,
            shape[2].max(1) as f64,
        ];
        let a = self.calibration.apply([0.0; 3]);
        let b = self.calibration.apply(corner);
        Some((
            [a[0].min(b[0]), a[1].min(b[1]), a[2].min(b[2])],
            [a[0].max(b[0]), a[1].max(b[1]), a[2].max(b[2])],
        ))
    }
}

/// Full-precision source plus its volatile counterpart.
#[derive(Debug, Clone, PartialEq)]
pub struct SourcePair {
    pub source: PixelSource,
    pub volatile: PixelSource,
}

// =============================================================================
// ImageOpener Trait
// =============================================================================

/// Backend that opens images by path.
///
/// This abstraction allows the composition engine to work with different
/// storage backends (local OME-Zarr, remote stores, test doubles) without
/// being tied to a specific implementation.
#[async_trait]
pub trait ImageOpener: Send + Sync {
    /// Open the image at `path` and report its geometry.
    async fn open(&self, path: &str) -> Result<ImageHandle, IoError>;
}

// =============================================================================
// Tests
// =============================================================================
