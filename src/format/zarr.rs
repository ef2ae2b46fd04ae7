//! OME-Zarr multiscale metadata.
//!
//! Supports the two on-disk layouts of NGFF metadata:
//!
//! - v0.4: `.zattrs` with a top-level `multiscales` array, arrays described by
//!   `<level>/.zarray`
//! - v0.5: `zarr.json` with `attributes.ome.multiscales`, arrays described by
//!   `<level>/zarr.json`
//!
//! Only the metadata needed to calibrate an image is interpreted: axes,
//! per-level scale transformations, level shapes and the optional `omero`
//! rendering hints.

use serde::Deserialize;

// =============================================================================
// Raw Metadata
// =============================================================================

/// One named axis of a multiscale image.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Axis {
    pub name: String,

    #[serde(rename = "type", default)]
    pub kind: Option<String>,

    #[serde(default)]
    pub unit: Option<String>,
}

/// Coordinate transformation attached to a multiscale level.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum CoordinateTransformation {
    Scale { scale: Vec<f64> },
    Translation { translation: Vec<f64> },
    Identity,
}

/// One resolution level of a multiscale image.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct MultiscaleLevel {
    pub path: String,

    #[serde(rename = "coordinateTransformations", default)]
    pub coordinate_transformations: Vec<CoordinateTransformation>,
}

impl MultiscaleLevel {
    /// Scale of this level, one entry per axis (1.0 when absent).
    pub fn scale(&self, num_axes: usize) -> Vec<f64> {
        self.coordinate_transformations
            .iter()
            .find_map(|t| match t {
                CoordinateTransformation::Scale { scale } => Some(scale.clone()),
                _ => None,
            })
            .unwrap_or_else(|| vec![1.0; num_axes])
    }
}

/// A multiscale image description.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Multiscale {
    #[serde(default)]
    pub name: Option<String>,

    #[serde(default)]
    pub axes: Vec<Axis>,

    pub datasets: Vec<MultiscaleLevel>,
}

/// Rendering window of a channel.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
pub struct OmeroWindow {
    pub start: f64,
    pub end: f64,
}

/// Rendering hints of a channel.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct OmeroChannel {
    #[serde(default)]
    pub color: Option<String>,

    #[serde(default)]
    pub window: Option<OmeroWindow>,
}

/// Optional `omero` block.
#[derive(Debug, Clone, PartialEq, Default, Deserialize)]
pub struct Omero {
    #[serde(default)]
    pub channels: Vec<OmeroChannel>,
}

/// Group attributes of an OME-Zarr image.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ZarrAttributes {
    pub multiscales: Vec<Multiscale>,

    #[serde(default)]
    pub omero: Option<Omero>,
}

#[derive(Deserialize)]
struct ZarrV3Group {
    attributes: ZarrV3Attributes,
}

#[derive(Deserialize)]
struct ZarrV3Attributes {
    ome: ZarrAttributes,
}

#[derive(Deserialize)]
struct ZarrArray {
    shape: Vec<u64>,
}

// =============================================================================
// Parsing
// =============================================================================

/// File holding group attributes in the v0.4 layout.
pub const ZATTRS_FILE: &str = ".zattrs";

/// File holding array metadata in the v0.4 layout.
pub const ZARRAY_FILE: &str = ".zarray";

/// File holding group or array metadata in the v0.5 layout.
pub const ZARR_JSON_FILE: &str = "zarr.json";

/// Parse v0.4 `.zattrs` content.
pub fn parse_zattrs(json: &str) -> Result<ZarrAttributes, String> {
    serde_json::from_str(json).map_err(|e| e.to_string())
}

/// Parse v0.5 group `zarr.json` content.
pub fn parse_zarr_json(json: &str) -> Result<ZarrAttributes, String> {
    serde_json::from_str::<ZarrV3Group>(json)
        .map(|group| group.attributes.ome)
        .map_err(|e| e.to_string())
}

/// Parse the shape out of `.zarray` or array `zarr.json` content.
pub fn parse_array_shape(json: &str) -> Result<Vec<u64>, String> {
    serde_json::from_str::<ZarrArray>(json)
        .map(|array| array.shape)
        .map_err(|e| e.to_string())
}

// =============================================================================
// Axis Mapping
// =============================================================================

/// Positions of the t/c/z/y/x axes within an array of N dimensions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct AxisIndices {
    pub t: Option<usize>,
    pub c: Option<usize>,
    pub z: Option<usize>,
    pub y: Option<usize>,
    pub x: Option<usize>,
}

impl AxisIndices {
    /// Derive axis positions from named axes.
    ///
    /// Without axis metadata (NGFF < 0.4), the trailing dimensions are taken
    /// to be `t, c, z, y, x` aligned from the right.
    pub fn from_axes(axes: &[Axis], num_dims: usize) -> Self {
        if axes.is_empty() {
            let fallback = ["t", "c", "z", "y", "x"];
            let names: Vec<Axis> = fallback[5 - num_dims.min(5)..]
                .iter()
                .map(|n| Axis {
                    name: (*n).to_string(),
                    kind: None,
                    unit: None,
                })
                .collect();
            return Self::from_axes(&names, num_dims);
        }

        let mut indices = AxisIndices::default();
        for (i, axis) in axes.iter().enumerate() {
            match axis.name.to_lowercase().as_str() {
                "t" => indices.t = Some(i),
                "c" => indices.c = Some(i),
                "z" => indices.z = Some(i),
                "y" => indices.y = Some(i),
                "x" => indices.x = Some(i),
                _ => {}
            }
        }
        indices
    }

    /// Spatial positions in x, y, z order.
    pub fn spatial(&self) -> [Option<usize>; 3] {
        [self.x, self.y, self.z]
    }
}

/// Spatial unit of the multiscale, taken from the first space axis carrying one.
pub fn spatial_unit(axes: &[Axis]) -> Option<String> {
    axes.iter()
        .filter(|a| {
            a.kind.as_deref() == Some("space")
                || matches!(a.name.to_lowercase().as_str(), "x" | "y" | "z")
        })
        .find_map(|a| a.unit.clone())
}

// =============================================================================
// Tests
// =============================================================================
