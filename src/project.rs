//! Writing datasets into a project directory.
//!
//! Layout of a project:
//!
//! ```text
//! <root>/project.json
//! <root>/<dataset>/dataset.json
//! <root>/<dataset>/images/<name>.<ext>          (copied images)
//! <root>/<dataset>/tables/<name>/default.tsv    (region and segment tables)
//! ```
//!
//! Images are either linked or copied. A linked image inside the project is
//! stored with a path relative to the dataset directory, a linked image
//! outside the project with its absolute path. Copied images always live
//! under `images/` and are stored relative.

use std::path::{Component, Path, PathBuf};
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};
use walkdir::WalkDir;

use crate::dataset::view::{Display, ImageDisplay, SegmentationDisplay, View};
use crate::dataset::{
    DataSource, Dataset, ImageDataSource, SegmentationDataSource, StorageLocation,
    TableDataFormat,
};
use crate::error::{DatasetError, IoError};
use crate::files::metadata::DEFAULT_COLOR;
use crate::format::ImageDataFormat;

pub const PROJECT_FILE: &str = "project.json";
pub const DATASET_FILE: &str = "dataset.json";
pub const IMAGES_DIR: &str = "images";
pub const TABLES_DIR: &str = "tables";
pub const DEFAULT_TABLE_FILE: &str = "default.tsv";

/// Version written to new `project.json` files.
pub const SPEC_VERSION: &str = "0.3.0";

// =============================================================================
// Add Method
// =============================================================================

/// How an image enters a project.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AddMethod {
    /// Reference the image where it is
    #[default]
    Link,
    /// Copy the image into the dataset's `images/` directory
    Copy,
}

impl FromStr for AddMethod {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "link" => Ok(AddMethod::Link),
            "copy" => Ok(AddMethod::Copy),
            _ => Err(format!("Unknown add method '{}': expected link or copy", s)),
        }
    }
}

// =============================================================================
// Project Metadata
// =============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectMetadata {
    pub spec_version: String,
    #[serde(default)]
    pub datasets: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_dataset: Option<String>,
}

impl Default for ProjectMetadata {
    fn default() -> Self {
        Self {
            spec_version: SPEC_VERSION.to_string(),
            datasets: Vec::new(),
            default_dataset: None,
        }
    }
}

/// One image to add with [`ProjectWriter::add_image`].
#[derive(Debug, Clone, PartialEq)]
pub struct ImageEntry {
    pub name: String,
    pub path: String,
    pub format: ImageDataFormat,
    pub channel: Option<u32>,
    pub num_z_slices: u32,
    /// Label image; `label_table` is copied next to it when set
    pub segmentation: bool,
    pub label_table: Option<PathBuf>,
}

// =============================================================================
// Project Writer
// =============================================================================

pub struct ProjectWriter {
    root: PathBuf,
}

impl ProjectWriter {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        let root = root.into();
        let root = std::path::absolute(&root).unwrap_or(root);
        Self { root }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn dataset_dir(&self, dataset: &str) -> PathBuf {
        self.root.join(dataset)
    }

    /// Read `project.json`, or a fresh one if the project is new.
    pub async fn read_project(&self) -> Result<ProjectMetadata, DatasetError> {
        let path = self.root.join(PROJECT_FILE);
        match read_string(&path).await {
            Ok(json) => Ok(serde_json::from_str(&json)?),
            Err(IoError::NotFound(_)) => Ok(ProjectMetadata::default()),
            Err(e) => Err(e.into()),
        }
    }

    async fn register_dataset(&self, dataset: &str) -> Result<(), DatasetError> {
        let mut project = self.read_project().await?;
        if project.datasets.iter().any(|d| d == dataset) {
            return Ok(());
        }
        project.datasets.push(dataset.to_string());
        if project.default_dataset.is_none() {
            project.default_dataset = Some(dataset.to_string());
        }
        write_string(
            &self.root.join(PROJECT_FILE),
            &serde_json::to_string_pretty(&project)?,
        )
        .await?;
        Ok(())
    }

    pub async fn load_dataset(&self, dataset: &str) -> Result<Dataset, DatasetError> {
        let json = read_string(&self.dataset_dir(dataset).join(DATASET_FILE)).await?;
        Dataset::from_json(&json)
    }

    /// Create an empty dataset, or load it if it exists.
    ///
    /// A dataset created as 2-D rejects 3-D images.
    pub async fn create_dataset(&self, dataset: &str, is_2d: bool) -> Result<Dataset, DatasetError> {
        match self.load_dataset(dataset).await {
            Ok(existing) => return Ok(existing),
            Err(DatasetError::Io(IoError::NotFound(_))) => {}
            Err(e) => return Err(e),
        }

        let mut created = if is_2d {
            Dataset::locked_2d()
        } else {
            Dataset::new_3d()
        };
        self.write_dataset(dataset, &mut created).await?;
        info!("Created dataset '{}' in {}", dataset, self.root.display());
        Ok(created)
    }

    /// Write `dataset.json` plus every region table that is only held in
    /// memory, and register the dataset in `project.json`.
    pub async fn write_dataset(&self, dataset: &str, data: &mut Dataset) -> Result<(), DatasetError> {
        let dir = self.dataset_dir(dataset);

        for (name, source) in data.sources_mut() {
            if let DataSource::Regions(regions) = source {
                if !regions.table_data.is_empty() {
                    continue;
                }
                if let Some(table) = &regions.table {
                    let relative = format!("{}/{}", TABLES_DIR, name);
                    table
                        .write(&dir.join(&relative).join(DEFAULT_TABLE_FILE))
                        .await?;
                    regions
                        .table_data
                        .insert(TableDataFormat::Tsv, StorageLocation::relative(relative, None));
                }
            }
        }

        write_string(&dir.join(DATASET_FILE), &data.to_json()?).await?;
        self.register_dataset(dataset).await?;
        debug!("Wrote {}", dir.join(DATASET_FILE).display());
        Ok(())
    }

    /// Add one image with its own view to an existing dataset.
    ///
    /// The dataset file is left untouched on any error, including a 3-D image
    /// added to a 2-D dataset.
    pub async fn add_image(
        &self,
        dataset: &str,
        entry: &ImageEntry,
        method: AddMethod,
        ui_selection_group: &str,
    ) -> Result<(), DatasetError> {
        let mut data = self.load_dataset(dataset).await?;
        data.check_dimensionality(&entry.name, entry.num_z_slices)?;
        if data.contains_source(&entry.name) {
            return Err(DatasetError::DuplicateSource(entry.name.clone()));
        }

        let location = self
            .place_image(dataset, &entry.name, &entry.path, entry.format, entry.channel, method)
            .await?;

        let (source, display) = if entry.segmentation {
            let mut source = SegmentationDataSource::new(entry.format, location);
            if let Some(table) = &entry.label_table {
                let relative = format!("{}/{}", TABLES_DIR, entry.name);
                let target = self
                    .dataset_dir(dataset)
                    .join(&relative)
                    .join(DEFAULT_TABLE_FILE);
                copy_recursive(table, &target).await?;
                source = source.with_table(TableDataFormat::Tsv, StorageLocation::relative(relative, None));
            }
            let display = Display::SegmentationDisplay(SegmentationDisplay::new(
                &entry.name,
                vec![entry.name.clone()],
                entry.label_table.is_some(),
            ));
            (DataSource::Segmentation(source), display)
        } else {
            let display = Display::ImageDisplay(ImageDisplay::new(
                &entry.name,
                vec![entry.name.clone()],
                DEFAULT_COLOR,
                None,
            ));
            (
                DataSource::Image(ImageDataSource::new(entry.format, location)),
                display,
            )
        };

        data.update_dimensionality(&entry.name, entry.num_z_slices)?;
        data.add_source(&entry.name, source)?;
        let mut view = View::new(&entry.name, ui_selection_group);
        view.source_displays.push(display);
        data.add_view(view);

        self.write_dataset(dataset, &mut data).await?;
        info!("Added '{}' to dataset '{}' ({:?})", entry.name, dataset, method);
        Ok(())
    }

    /// Merge a built dataset into the project dataset, placing every image
    /// with `method`.
    ///
    /// A missing project dataset is created from `built`'s dimensionality.
    pub async fn add_dataset(
        &self,
        dataset: &str,
        mut built: Dataset,
        method: AddMethod,
    ) -> Result<(), DatasetError> {
        let mut data = match self.load_dataset(dataset).await {
            Ok(existing) => existing,
            Err(DatasetError::Io(IoError::NotFound(_))) => {
                if built.is_2d() {
                    Dataset::new()
                } else {
                    Dataset::new_3d()
                }
            }
            Err(e) => return Err(e),
        };

        // fail before touching any file
        data.clone().merge(built.clone())?;

        let mut relocations = Vec::new();
        for (name, source) in built.sources() {
            if let Some(image_data) = source.image_data() {
                for (format, location) in image_data {
                    if let Some(path) = location.absolute_path() {
                        let placed = self
                            .place_image(dataset, name, path, *format, location.channel(), method)
                            .await?;
                        relocations.push((name.clone(), *format, placed));
                    }
                }
            }
        }
        for (name, source) in built.sources_mut() {
            if let Some(image_data) = source.image_data_mut() {
                for (relocated, format, placed) in &relocations {
                    if relocated == name {
                        image_data.insert(*format, placed.clone());
                    }
                }
            }
        }

        data.merge(built)?;
        self.write_dataset(dataset, &mut data).await
    }

    /// Link or copy an image and return its storage location.
    async fn place_image(
        &self,
        dataset: &str,
        name: &str,
        path: &str,
        format: ImageDataFormat,
        channel: Option<u32>,
        method: AddMethod,
    ) -> Result<StorageLocation, DatasetError> {
        let source = Path::new(path);
        let source = std::path::absolute(source).unwrap_or_else(|_| source.to_path_buf());
        let dataset_dir = self.dataset_dir(dataset);

        match method {
            AddMethod::Link => {
                if source.starts_with(&self.root) {
                    let relative = relative_to(&source, &dataset_dir);
                    Ok(StorageLocation::relative(
                        relative.to_string_lossy().into_owned(),
                        channel,
                    ))
                } else {
                    Ok(StorageLocation::absolute(
                        source.to_string_lossy().into_owned(),
                        channel,
                    ))
                }
            }
            AddMethod::Copy => {
                let relative = format!("{}/{}.{}", IMAGES_DIR, name, extension_for(format, &source));
                copy_recursive(&source, &dataset_dir.join(&relative)).await?;
                debug!("Copied {} to {}", source.display(), relative);
                Ok(StorageLocation::relative(relative, channel))
            }
        }
    }
}

/// File extension of a copied image.
fn extension_for(format: ImageDataFormat, source: &Path) -> String {
    match format {
        ImageDataFormat::OmeZarr => "ome.zarr".to_string(),
        ImageDataFormat::N5 => "n5".to_string(),
        _ => source
            .extension()
            .map(|e| e.to_string_lossy().into_owned())
            .unwrap_or_default(),
    }
}

/// `path` relative to `base`; both must be absolute.
fn relative_to(path: &Path, base: &Path) -> PathBuf {
    let path: Vec<Component> = path.components().collect();
    let base: Vec<Component> = base.components().collect();
    let common = path
        .iter()
        .zip(&base)
        .take_while(|(a, b)| a == b)
        .count();

    let mut relative = PathBuf::new();
    for _ in common..base.len() {
        relative.push("..");
    }
    for component in &path[common..] {
        relative.push(component.as_os_str());
    }
    relative
}

async fn read_string(path: &Path) -> Result<String, IoError> {
    let display = path.display().to_string();
    tokio::fs::read_to_string(path)
        .await
        .map_err(|e| IoError::from_std(display, e))
}

async fn write_string(path: &Path, content: &str) -> Result<(), IoError> {
    let to_write_error = |e: std::io::Error| IoError::Write {
        path: path.display().to_string(),
        message: e.to_string(),
    };
    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent)
            .await
            .map_err(to_write_error)?;
    }
    tokio::fs::write(path, content).await.map_err(to_write_error)
}

/// Copy a file, or a directory tree such as an OME-Zarr container.
async fn copy_recursive(source: &Path, target: &Path) -> Result<(), IoError> {
    let to_write_error = |e: std::io::Error| IoError::Write {
        path: target.display().to_string(),
        message: e.to_string(),
    };

    let metadata = tokio::fs::metadata(source)
        .await
        .map_err(|e| IoError::from_std(source.display().to_string(), e))?;

    if metadata.is_file() {
        if let Some(parent) = target.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(to_write_error)?;
        }
        tokio::fs::copy(source, target)
            .await
            .map_err(to_write_error)?;
        return Ok(());
    }

    for entry in WalkDir::new(source) {
        let entry = entry.map_err(|e| IoError::Read {
            path: source.display().to_string(),
            message: e.to_string(),
        })?;
        let Ok(relative) = entry.path().strip_prefix(source) else {
            continue;
        };
        let destination = target.join(relative);
        if entry.file_type().is_dir() {
            tokio::fs::create_dir_all(&destination)
                .await
                .map_err(to_write_error)?;
        } else {
            tokio::fs::copy(entry.path(), &destination)
                .await
                .map_err(to_write_error)?;
        }
    }
    Ok(())
}

// =============================================================================
// Tests
// =============================================================================
