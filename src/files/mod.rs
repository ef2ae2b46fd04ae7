//! Source discovery.
//!
//! - [`path`]: pattern expansion, image naming, path mapping
//! - [`table`]: annotation and region tables
//! - [`metadata`]: probing a group's representative image
//! - [`segments`]: segment table conventions and timepoint correction
//! - [`sources`]: image and label groups

pub mod metadata;
pub mod path;
pub mod segments;
pub mod sources;
pub mod table;

pub use metadata::{probe_metadata, ImageMetadata};
pub use path::{image_name, resolve_pattern, PathMapping};
pub use segments::{correct_timepoints, SegmentTableFormat, TimepointCorrection};
pub use sources::{FileSources, GridType, GroupOptions, LabelGroup, SourceGroup, TableConvention};
pub use table::Table;
