//! Datasets and views.
//!
//! - [`model`]: persisted dataset, data sources and storage locations
//! - [`view`]: displays, transformations and viewer transforms
//! - [`grid`]: per-group grid composition
//! - [`regions`]: binding sources to region table rows
//! - [`assemble`]: building a dataset from source groups
//! - [`materialize`]: opening and placing the images of a view

pub mod assemble;
pub mod context;
pub mod grid;
pub mod materialize;
pub mod model;
pub mod regions;
pub mod view;

pub use assemble::{add_file_sources, build_dataset, compose_view, UI_SELECTION_GROUP, VIEW_NAME};
pub use context::BuildContext;
pub use grid::{compose_group, GroupComposition};
pub use materialize::materialize_view;
pub use model::{
    DataSource, Dataset, ImageDataSource, RegionTableSource, SegmentationDataSource,
    StorageLocation, TableDataFormat,
};
pub use regions::{bind_regions, region_display};
pub use view::{
    AffineTransformation, Display, GridTransformation, ImageDisplay, MergedGridTransformation,
    RegionDisplay, SegmentationDisplay, Transformation, View, ViewerTransform,
};
