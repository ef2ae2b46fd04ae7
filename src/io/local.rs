//! Local filesystem image backend.
//!
//! Reads OME-Zarr multiscale metadata directly from disk and falls back to the
//! `image` crate's header decoding for 2-D rasters. Pixel data is never read.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tracing::debug;

use crate::error::IoError;
use crate::format::zarr::{
    parse_array_shape, parse_zarr_json, parse_zattrs, spatial_unit, AxisIndices,
    ZarrAttributes, ZARRAY_FILE, ZARR_JSON_FILE, ZATTRS_FILE,
};
use crate::format::{detect_format, ImageDataFormat};

use super::opener::{ImageHandle, ImageOpener, LevelInfo, VoxelSize};

/// Unit reported when a multiscale carries no spatial unit.
const DEFAULT_UNIT: &str = "pixel";

/// Image opener for files on the local filesystem.
#[derive(Debug, Clone, Copy, Default)]
pub struct LocalImageOpener;

impl LocalImageOpener {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl ImageOpener for LocalImageOpener {
    async fn open(&self, path: &str) -> Result<ImageHandle, IoError> {
        let format = detect_format(path)?;
        debug!("Opening {} as {}", path, format);

        match format {
            ImageDataFormat::OmeZarr => open_ome_zarr(path).await,
            ImageDataFormat::Tiff | ImageDataFormat::Image2D => open_raster(path, format).await,
            other => Err(IoError::UnsupportedFormat {
                reason: format!("{} is not readable by the local backend", other.name()),
            }),
        }
    }
}

// =============================================================================
// OME-Zarr
// =============================================================================

async fn read_to_string(path: &Path) -> Result<String, IoError> {
    let display = path.display().to_string();
    tokio::fs::read_to_string(path)
        .await
        .map_err(|e| IoError::from_std(display, e))
}

async fn read_attributes(root: &Path) -> Result<(ZarrAttributes, bool), IoError> {
    let zattrs = root.join(ZATTRS_FILE);
    if tokio::fs::try_exists(&zattrs).await.unwrap_or(false) {
        let json = read_to_string(&zattrs).await?;
        let attrs = parse_zattrs(&json).map_err(|message| IoError::Parse {
            path: zattrs.display().to_string(),
            message,
        })?;
        return Ok((attrs, false));
    }

    let zarr_json = root.join(ZARR_JSON_FILE);
    let json = read_to_string(&zarr_json).await?;
    let attrs = parse_zarr_json(&json).map_err(|message| IoError::Parse {
        path: zarr_json.display().to_string(),
        message,
    })?;
    Ok((attrs, true))
}

async fn read_level_shape(root: &Path, level: &str, v3: bool) -> Result<Vec<u64>, IoError> {
    let file: PathBuf = root
        .join(level)
        .join(if v3 { ZARR_JSON_FILE } else { ZARRAY_FILE });
    let json = read_to_string(&file).await?;
    parse_array_shape(&json).map_err(|message| IoError::Parse {
        path: file.display().to_string(),
        message,
    })
}

async fn open_ome_zarr(path: &str) -> Result<ImageHandle, IoError> {
    let root = Path::new(path);
    let (attrs, v3) = read_attributes(root).await?;

    let multiscale = attrs.multiscales.first().ok_or_else(|| IoError::Parse {
        path: path.to_string(),
        message: "no multiscales entry".to_string(),
    })?;

    let mut shapes = Vec::with_capacity(multiscale.datasets.len());
    for level in &multiscale.datasets {
        shapes.push(read_level_shape(root, &level.path, v3).await?);
    }

    let num_dims = shapes.first().map(|s| s.len()).unwrap_or(0);
    let axes = AxisIndices::from_axes(&multiscale.axes, num_dims);
    let spatial = axes.spatial();

    let base_scale = multiscale
        .datasets
        .first()
        .map(|l| l.scale(num_dims))
        .unwrap_or_else(|| vec![1.0; num_dims]);

    let pick = |values: &[f64], axis: Option<usize>| -> f64 {
        axis.and_then(|i| values.get(i).copied()).unwrap_or(1.0)
    };

    let levels = multiscale
        .datasets
        .iter()
        .zip(&shapes)
        .map(|(level, shape)| {
            let scale = level.scale(num_dims);
            let mut xyz = [1u64; 3];
            let mut downsample = [1.0; 3];
            for (d, axis) in spatial.iter().enumerate() {
                if let Some(i) = axis {
                    xyz[d] = shape.get(*i).copied().unwrap_or(1);
                }
                downsample[d] = pick(&scale[..], *axis) / pick(&base_scale[..], *axis);
            }
            LevelInfo {
                shape: xyz,
                downsample,
            }
        })
        .collect();

    let voxel_size = VoxelSize::new(
        [
            pick(&base_scale[..], spatial[0]),
            pick(&base_scale[..], spatial[1]),
            pick(&base_scale[..], spatial[2]),
        ],
        spatial_unit(&multiscale.axes).unwrap_or_else(|| DEFAULT_UNIT.to_string()),
    );

    let base_shape = shapes.first().cloned().unwrap_or_default();
    let num_channels = axes
        .c
        .and_then(|i| base_shape.get(i).copied())
        .unwrap_or(1) as u32;
    let num_time_points = Some(
        axes.t
            .and_then(|i| base_shape.get(i).copied())
            .unwrap_or(1) as u32,
    );

    let omero = attrs.omero.clone().unwrap_or_default();
    let channel_colors = omero.channels.iter().map(|c| c.color.clone()).collect();
    let contrast_limits = omero
        .channels
        .iter()
        .map(|c| c.window.map(|w| [w.start, w.end]))
        .collect();

    Ok(ImageHandle {
        path: path.to_string(),
        format: ImageDataFormat::OmeZarr,
        levels,
        voxel_size,
        num_channels,
        num_time_points,
        channel_colors,
        contrast_limits,
    })
}

// =============================================================================
// 2-D Rasters
// =============================================================================

async fn open_raster(path: &str, format: ImageDataFormat) -> Result<ImageHandle, IoError> {
    let owned = path.to_string();
    let (width, height) = tokio::task::spawn_blocking(move || {
        image::ImageReader::open(&owned)
            .map_err(|e| IoError::from_std(&owned, e))?
            .with_guessed_format()
            .map_err(|e| IoError::from_std(&owned, e))?
            .into_dimensions()
            .map_err(|e| IoError::Parse {
                path: owned.clone(),
                message: e.to_string(),
            })
    })
    .await
    .map_err(|e| IoError::Read {
        path: path.to_string(),
        message: e.to_string(),
    })??;

    Ok(ImageHandle::simple(
        path,
        format,
        [width as u64, height as u64, 1],
        VoxelSize::pixel(),
    ))
}

// =============================================================================
// Tests
// =============================================================================
