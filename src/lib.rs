//! # microview
//!
//! Compose multi-resolution microscopy images, label maps and annotation
//! tables into renderable, serializable dataset views.
//!
//! Images are discovered in groups, either from a file name pattern or from
//! an image column of an annotation table. Each group becomes a set of data
//! sources plus the displays and grid transformations that lay it out; a
//! region table ties every image to one row of tabular data.
//!
//! ## Architecture
//!
//! - [`io`] - image backend seam and handle cache
//! - [`mod@format`] - format detection and OME-Zarr metadata
//! - [`files`] - pattern and table discovery, metadata probe, region tables
//! - [`transform`] - affine transforms, masks and grid placement
//! - [`image`] - transformable images bound to a pixel source
//! - [`dataset`] - dataset model, view composition and materialization
//! - [`project`] - writing datasets into a project directory
//! - [`config`] - CLI and configuration types
//!
//! ## Example
//!
//! ```rust,no_run
//! use microview::{build_dataset, FileSources, GroupOptions, ImageRegistry, LocalImageOpener, SourceGroup};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let registry = ImageRegistry::new(LocalImageOpener::new());
//!     let options = GroupOptions::default().with_root("/data/plate1");
//!     let group = SourceGroup::from_pattern(&registry, "plate1", r".*\.ome\.zarr", &options).await?;
//!
//!     let regions = group.region_table().cloned().ok_or("no region table")?;
//!     let dataset = build_dataset(&[FileSources::from(group)], &regions)?;
//!     println!("{}", dataset.to_json()?);
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod dataset;
pub mod error;
pub mod files;
pub mod format;
pub mod image;
pub mod io;
pub mod project;
pub mod transform;

// Re-export commonly used types
pub use config::{Cli, Command, FilesConfig, InfoConfig, TableConfig};
pub use dataset::{
    add_file_sources, build_dataset, compose_view, materialize_view, BuildContext, DataSource,
    Dataset, Display, StorageLocation, Transformation, View, ViewerTransform, VIEW_NAME,
};
pub use error::{
    ComposeError, DatasetError, IoError, ProbeError, ResolveError, SourceError, TableError,
};
pub use files::{
    probe_metadata, FileSources, GridType, GroupOptions, ImageMetadata, LabelGroup, PathMapping,
    SourceGroup, Table,
};
pub use format::{detect_format, ImageDataFormat};
pub use image::TransformableImage;
pub use io::{ImageHandle, ImageOpener, ImageRegistry, LocalImageOpener};
pub use project::{AddMethod, ImageEntry, ProjectWriter};
pub use transform::{AffineTransform3D, RealMask};
