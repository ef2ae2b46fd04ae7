//! Persisted dataset model.
//!
//! The serde layout follows the `dataset.json` shape of MoBIE projects:
//! camelCase keys, externally tagged source variants and a top-level `is2D`.

use std::path::Path;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::error::DatasetError;
use crate::files::Table;
use crate::format::ImageDataFormat;

use super::view::View;

// =============================================================================
// Storage Location
// =============================================================================

/// Where a source's data lives: exactly one of a path relative to the
/// dataset directory or an absolute path, plus an optional channel.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "RawStorageLocation", into = "RawStorageLocation")]
pub struct StorageLocation {
    path: LocationPath,
    channel: Option<u32>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum LocationPath {
    Relative(String),
    Absolute(String),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawStorageLocation {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    relative_path: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    absolute_path: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    channel: Option<u32>,
}

impl TryFrom<RawStorageLocation> for StorageLocation {
    type Error = String;

    fn try_from(raw: RawStorageLocation) -> Result<Self, Self::Error> {
        let path = match (raw.relative_path, raw.absolute_path) {
            (Some(relative), None) => LocationPath::Relative(relative),
            (None, Some(absolute)) => LocationPath::Absolute(absolute),
            (Some(_), Some(_)) => {
                return Err("storage location sets both relativePath and absolutePath".into())
            }
            (None, None) => {
                return Err("storage location needs relativePath or absolutePath".into())
            }
        };
        Ok(Self {
            path,
            channel: raw.channel,
        })
    }
}

impl From<StorageLocation> for RawStorageLocation {
    fn from(location: StorageLocation) -> Self {
        let (relative_path, absolute_path) = match location.path {
            LocationPath::Relative(p) => (Some(p), None),
            LocationPath::Absolute(p) => (None, Some(p)),
        };
        Self {
            relative_path,
            absolute_path,
            channel: location.channel,
        }
    }
}

impl StorageLocation {
    pub fn relative(path: impl Into<String>, channel: Option<u32>) -> Self {
        Self {
            path: LocationPath::Relative(path.into()),
            channel,
        }
    }

    pub fn absolute(path: impl Into<String>, channel: Option<u32>) -> Self {
        Self {
            path: LocationPath::Absolute(path.into()),
            channel,
        }
    }

    pub fn relative_path(&self) -> Option<&str> {
        match &self.path {
            LocationPath::Relative(p) => Some(p),
            LocationPath::Absolute(_) => None,
        }
    }

    pub fn absolute_path(&self) -> Option<&str> {
        match &self.path {
            LocationPath::Absolute(p) => Some(p),
            LocationPath::Relative(_) => None,
        }
    }

    pub fn channel(&self) -> Option<u32> {
        self.channel
    }

    /// Filesystem path, relative paths taken against `dataset_dir`.
    pub fn resolve(&self, dataset_dir: Option<&Path>) -> String {
        match (&self.path, dataset_dir) {
            (LocationPath::Absolute(p), _) => p.clone(),
            (LocationPath::Relative(p), Some(dir)) => dir.join(p).to_string_lossy().into_owned(),
            (LocationPath::Relative(p), None) => p.clone(),
        }
    }
}

// =============================================================================
// Data Sources
// =============================================================================

/// Table storage formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TableDataFormat {
    Tsv,
    Csv,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImageDataSource {
    pub image_data: IndexMap<ImageDataFormat, StorageLocation>,
}

impl ImageDataSource {
    pub fn new(format: ImageDataFormat, location: StorageLocation) -> Self {
        let mut image_data = IndexMap::new();
        image_data.insert(format, location);
        Self { image_data }
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SegmentationDataSource {
    pub image_data: IndexMap<ImageDataFormat, StorageLocation>,
    #[serde(default, skip_serializing_if = "IndexMap::is_empty")]
    pub table_data: IndexMap<TableDataFormat, StorageLocation>,
}

impl SegmentationDataSource {
    pub fn new(format: ImageDataFormat, location: StorageLocation) -> Self {
        let mut image_data = IndexMap::new();
        image_data.insert(format, location);
        Self {
            image_data,
            table_data: IndexMap::new(),
        }
    }

    pub fn with_table(mut self, format: TableDataFormat, location: StorageLocation) -> Self {
        self.table_data.insert(format, location);
        self
    }
}

/// A region table. Before being written into a project the table is only
/// held in memory and `table_data` is empty.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegionTableSource {
    #[serde(default)]
    pub table_data: IndexMap<TableDataFormat, StorageLocation>,
    #[serde(skip)]
    pub table: Option<Table>,
}

impl RegionTableSource {
    pub fn in_memory(table: Table) -> Self {
        Self {
            table_data: IndexMap::new(),
            table: Some(table),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum DataSource {
    Image(ImageDataSource),
    Segmentation(SegmentationDataSource),
    Regions(RegionTableSource),
}

impl DataSource {
    /// Image locations of image and segmentation sources.
    pub fn image_data(&self) -> Option<&IndexMap<ImageDataFormat, StorageLocation>> {
        match self {
            DataSource::Image(s) => Some(&s.image_data),
            DataSource::Segmentation(s) => Some(&s.image_data),
            DataSource::Regions(_) => None,
        }
    }

    pub fn image_data_mut(&mut self) -> Option<&mut IndexMap<ImageDataFormat, StorageLocation>> {
        match self {
            DataSource::Image(s) => Some(&mut s.image_data),
            DataSource::Segmentation(s) => Some(&mut s.image_data),
            DataSource::Regions(_) => None,
        }
    }
}

// =============================================================================
// Dataset
// =============================================================================

/// Sources and views of one project dataset.
///
/// A dataset starts 2-D and becomes 3-D as soon as a source with more than
/// one z-slice is added; it never goes back. A dataset can additionally be
/// locked, after which adding a 3-D source fails instead.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Dataset {
    #[serde(rename = "is2D")]
    is_2d: bool,
    #[serde(default)]
    sources: IndexMap<String, DataSource>,
    #[serde(default)]
    views: IndexMap<String, View>,
    #[serde(skip)]
    locked: bool,
}

impl Default for Dataset {
    fn default() -> Self {
        Self::new()
    }
}

impl Dataset {
    /// An empty, unlocked 2-D dataset.
    pub fn new() -> Self {
        Self {
            is_2d: true,
            sources: IndexMap::new(),
            views: IndexMap::new(),
            locked: false,
        }
    }

    /// An empty 3-D dataset.
    pub fn new_3d() -> Self {
        Self {
            is_2d: false,
            ..Self::new()
        }
    }

    /// An empty 2-D dataset that rejects 3-D sources.
    pub fn locked_2d() -> Self {
        Self {
            locked: true,
            ..Self::new()
        }
    }

    pub fn is_2d(&self) -> bool {
        self.is_2d
    }

    pub fn is_locked(&self) -> bool {
        self.locked
    }

    pub fn lock(&mut self) {
        self.locked = true;
    }

    /// Fail if a source with `num_z_slices` could not be added.
    pub fn check_dimensionality(
        &self,
        source_name: &str,
        num_z_slices: u32,
    ) -> Result<(), DatasetError> {
        if num_z_slices > 1 && self.is_2d && self.locked {
            return Err(DatasetError::DimensionalityConflict {
                source_name: source_name.to_string(),
                num_z_slices,
            });
        }
        Ok(())
    }

    /// Record that a source with `num_z_slices` is part of the dataset.
    pub fn update_dimensionality(
        &mut self,
        source_name: &str,
        num_z_slices: u32,
    ) -> Result<(), DatasetError> {
        self.check_dimensionality(source_name, num_z_slices)?;
        if num_z_slices > 1 {
            self.is_2d = false;
        }
        Ok(())
    }

    pub fn sources(&self) -> &IndexMap<String, DataSource> {
        &self.sources
    }

    pub fn sources_mut(&mut self) -> impl Iterator<Item = (&String, &mut DataSource)> {
        self.sources.iter_mut()
    }

    pub fn source(&self, name: &str) -> Option<&DataSource> {
        self.sources.get(name)
    }

    pub fn contains_source(&self, name: &str) -> bool {
        self.sources.contains_key(name)
    }

    /// Register a source under a name not used yet.
    pub fn add_source(
        &mut self,
        name: impl Into<String>,
        source: DataSource,
    ) -> Result<(), DatasetError> {
        let name = name.into();
        if self.sources.contains_key(&name) {
            return Err(DatasetError::DuplicateSource(name));
        }
        self.sources.insert(name, source);
        Ok(())
    }

    pub fn views(&self) -> &IndexMap<String, View> {
        &self.views
    }

    pub fn view(&self, name: &str) -> Option<&View> {
        self.views.get(name)
    }

    /// Add or replace a view, keyed by its name.
    pub fn add_view(&mut self, view: View) {
        self.views.insert(view.name.clone(), view);
    }

    /// Move all sources and views of `other` into this dataset.
    ///
    /// Nothing is changed if a source name collides or `other` is 3-D while
    /// this dataset is locked to 2-D.
    pub fn merge(&mut self, other: Dataset) -> Result<(), DatasetError> {
        if !other.is_2d {
            let name = other.sources.keys().next().cloned().unwrap_or_default();
            self.check_dimensionality(&name, 2)?;
        }
        if let Some(name) = other.sources.keys().find(|n| self.sources.contains_key(*n)) {
            return Err(DatasetError::DuplicateSource(name.clone()));
        }

        if !other.is_2d {
            self.is_2d = false;
        }
        self.sources.extend(other.sources);
        for (_, view) in other.views {
            self.add_view(view);
        }
        Ok(())
    }

    pub fn to_json(&self) -> Result<String, DatasetError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Parse a dataset file.
    ///
    /// A dataset file declaring `is2D` is locked to 2-D.
    pub fn from_json(json: &str) -> Result<Self, DatasetError> {
        let mut dataset: Dataset = serde_json::from_str(json)?;
        for (name, view) in dataset.views.iter_mut() {
            view.name = name.clone();
        }
        dataset.locked = dataset.is_2d;
        Ok(dataset)
    }
}

// =============================================================================
// Tests
// =============================================================================
