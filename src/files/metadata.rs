//! Metadata probe.
//!
//! Reads the geometry and display hints of one representative image per
//! group. Every member of the group is assumed to look like it.

use tracing::debug;

use crate::error::ProbeError;
use crate::io::{ImageOpener, ImageRegistry};

/// Display color used when the image carries none.
pub const DEFAULT_COLOR: &str = "white";

/// Facts about a group, read from its representative image.
#[derive(Debug, Clone, PartialEq)]
pub struct ImageMetadata {
    /// Level-0 shape, x/y/z
    pub shape: [u64; 3],
    pub voxel_size: [f64; 3],
    pub unit: String,
    pub num_channels: u32,

    /// `None` when the backend cannot tell
    pub num_time_points: Option<u32>,
    pub num_z_slices: u32,
    pub color: String,
    pub contrast_limits: Option<[f64; 2]>,
}

/// Open `path` through the registry and extract the metadata of `channel`.
///
/// # Errors
/// * `ProbeError::Open` - the backend could not open the image
/// * `ProbeError::NoLevels` - the image has no resolution levels
/// * `ProbeError::ChannelOutOfRange` - `channel` does not exist
pub async fn probe_metadata<O: ImageOpener>(
    registry: &ImageRegistry<O>,
    path: &str,
    channel: Option<u32>,
) -> Result<ImageMetadata, ProbeError> {
    let handle = registry
        .get_image(path)
        .await
        .map_err(|source| ProbeError::Open {
            path: path.to_string(),
            source,
        })?;

    let channel = channel.unwrap_or(0);
    // validates levels and channel
    handle.source_pair(path, channel)?;

    let shape = handle
        .dimensions()
        .ok_or_else(|| ProbeError::NoLevels(path.to_string()))?;
    let index = channel as usize;

    let metadata = ImageMetadata {
        shape,
        voxel_size: handle.voxel_size.size,
        unit: handle.voxel_size.unit.clone(),
        num_channels: handle.num_channels,
        num_time_points: handle.num_time_points,
        num_z_slices: handle.num_z_slices(),
        color: handle
            .channel_colors
            .get(index)
            .cloned()
            .flatten()
            .unwrap_or_else(|| DEFAULT_COLOR.to_string()),
        contrast_limits: handle.contrast_limits.get(index).copied().flatten(),
    };

    debug!(
        "Probed {}: shape {:?}, {} z-slice(s), {:?} timepoint(s)",
        path, metadata.shape, metadata.num_z_slices, metadata.num_time_points
    );

    Ok(metadata)
}

// =============================================================================
// Tests
// =============================================================================
