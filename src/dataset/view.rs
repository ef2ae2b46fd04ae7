//! Views: displays, transformations and a viewer pose.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::transform::AffineTransform3D;

/// Default opacity of segmentation displays.
pub const SEGMENTATION_OPACITY: f64 = 0.5;

/// Default lookup table of label and region displays.
pub const DEFAULT_LUT: &str = "glasbey";

fn default_opacity() -> f64 {
    1.0
}

fn default_visible() -> bool {
    true
}

fn default_lut() -> String {
    DEFAULT_LUT.to_string()
}

// =============================================================================
// Displays
// =============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImageDisplay {
    pub name: String,
    pub sources: Vec<String>,
    pub color: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub contrast_limits: Option<[f64; 2]>,
    #[serde(default = "default_opacity")]
    pub opacity: f64,
    #[serde(default = "default_visible")]
    pub visible: bool,
}

impl ImageDisplay {
    pub fn new(
        name: impl Into<String>,
        sources: Vec<String>,
        color: impl Into<String>,
        contrast_limits: Option<[f64; 2]>,
    ) -> Self {
        Self {
            name: name.into(),
            sources,
            color: color.into(),
            contrast_limits,
            opacity: 1.0,
            visible: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SegmentationDisplay {
    pub name: String,
    pub sources: Vec<String>,
    pub opacity: f64,
    #[serde(default = "default_lut")]
    pub lut: String,
    #[serde(default)]
    pub show_table: bool,
    #[serde(default = "default_visible")]
    pub visible: bool,
}

impl SegmentationDisplay {
    pub fn new(name: impl Into<String>, sources: Vec<String>, show_table: bool) -> Self {
        Self {
            name: name.into(),
            sources,
            opacity: SEGMENTATION_OPACITY,
            lut: default_lut(),
            show_table,
            visible: true,
        }
    }
}

/// Annotated regions, each bound to the sources it covers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegionDisplay {
    pub name: String,
    /// Region id → sources, in region table order
    pub sources: IndexMap<String, Vec<String>>,
    pub table_source: String,
    pub show_as_boundaries: bool,
    pub boundary_thickness: f64,
    pub boundary_thickness_is_relative: bool,
    pub relative_dilation: f64,
    pub opacity: f64,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub timepoints: Vec<u32>,
    #[serde(default = "default_lut")]
    pub lut: String,
    #[serde(default = "default_visible")]
    pub visible: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Display {
    ImageDisplay(ImageDisplay),
    SegmentationDisplay(SegmentationDisplay),
    RegionDisplay(RegionDisplay),
}

impl Display {
    pub fn name(&self) -> &str {
        match self {
            Display::ImageDisplay(d) => &d.name,
            Display::SegmentationDisplay(d) => &d.name,
            Display::RegionDisplay(d) => &d.name,
        }
    }

    /// Sources shown by this display; region displays list every bound
    /// source once per region.
    pub fn sources(&self) -> Vec<&str> {
        match self {
            Display::ImageDisplay(d) => d.sources.iter().map(String::as_str).collect(),
            Display::SegmentationDisplay(d) => d.sources.iter().map(String::as_str).collect(),
            Display::RegionDisplay(d) => d
                .sources
                .values()
                .flat_map(|s| s.iter().map(String::as_str))
                .collect(),
        }
    }
}

// =============================================================================
// Transformations
// =============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AffineTransformation {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    pub parameters: AffineTransform3D,
    pub sources: Vec<String>,
}

/// Lays out separate sources on a grid; positions are automatic when absent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GridTransformation {
    pub sources: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub positions: Option<Vec<[i64; 2]>>,
}

/// Fuses sources into one composite source named `merged_grid_source_name`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MergedGridTransformation {
    pub merged_grid_source_name: String,
    pub sources: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub positions: Option<Vec<[i64; 2]>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata_source: Option<String>,
    #[serde(default)]
    pub lazy_load_tables: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Transformation {
    Affine(AffineTransformation),
    Grid(GridTransformation),
    MergedGrid(MergedGridTransformation),
}

impl Transformation {
    pub fn sources(&self) -> &[String] {
        match self {
            Transformation::Affine(t) => &t.sources,
            Transformation::Grid(t) => &t.sources,
            Transformation::MergedGrid(t) => &t.sources,
        }
    }
}

// =============================================================================
// Viewer Transform
// =============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ViewerTransform {
    /// Zoom so that the named source fills the window
    ImageZoom { source: String, timepoint: u32 },
    Affine {
        affine: AffineTransform3D,
        timepoint: u32,
    },
    Position { position: [f64; 3], timepoint: u32 },
}

// =============================================================================
// View
// =============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct View {
    /// Key of the view in its dataset
    #[serde(skip)]
    pub name: String,
    pub ui_selection_group: String,
    pub is_exclusive: bool,
    #[serde(default)]
    pub source_displays: Vec<Display>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub source_transforms: Vec<Transformation>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub viewer_transform: Option<ViewerTransform>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl View {
    pub fn new(name: impl Into<String>, ui_selection_group: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ui_selection_group: ui_selection_group.into(),
            is_exclusive: false,
            source_displays: Vec::new(),
            source_transforms: Vec::new(),
            viewer_transform: None,
            description: None,
        }
    }

    pub fn region_display(&self) -> Option<&RegionDisplay> {
        self.source_displays.iter().find_map(|d| match d {
            Display::RegionDisplay(r) => Some(r),
            _ => None,
        })
    }
}

// =============================================================================
// Tests
// =============================================================================
