//! Source groups.
//!
//! A [`SourceGroup`] is the ordered set of images discovered together, either
//! from a file name pattern or from one column of an annotation table. Its
//! insertion order is the row order of the group's region table and must not
//! change after construction.

use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use indexmap::IndexMap;
use tracing::{debug, info, warn};

use crate::error::{ComposeError, SourceError, TableError};
use crate::io::{ImageOpener, ImageRegistry};
use crate::transform::AffineTransform3D;

use super::metadata::{probe_metadata, ImageMetadata};
use super::path::{
    absolute_path, apply_path_mapping, combine_path, image_name, resolve_pattern, PathMapping,
};
use super::segments::correct_timepoints;
use super::table::{Table, REGION_ID, SOURCE_PATH};

/// Marker in the image column of object tables.
const OBJECT_IMAGE_MARKER: &str = "_IMG";

/// Prefix of CellProfiler file name columns.
const FILE_NAME_PREFIX: &str = "FileName_";

/// Prefix of CellProfiler folder columns.
const PATH_NAME_PREFIX: &str = "PathName_";

/// Per-row rotation in degrees, in object tables.
const ROTATION_COLUMN: &str = "Rotation_NUM";

// =============================================================================
// Grid Type
// =============================================================================

/// How a multi-member group is laid out in a view.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum GridType {
    /// Members fused into one seamless composite image
    Stitched,
    /// Members kept separate, each placed by its own transform
    #[default]
    Transformed,
}

impl GridType {
    pub const fn as_str(&self) -> &'static str {
        match self {
            GridType::Stitched => "Stitched",
            GridType::Transformed => "Transformed",
        }
    }
}

impl FromStr for GridType {
    type Err = ComposeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "stitched" => Ok(GridType::Stitched),
            "transformed" => Ok(GridType::Transformed),
            _ => Err(ComposeError::UnsupportedGridType(s.to_string())),
        }
    }
}

impl fmt::Display for GridType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// =============================================================================
// Group Options
// =============================================================================

/// Settings shared by both ways of building a group.
#[derive(Debug, Clone, Default)]
pub struct GroupOptions {
    /// Directory relative paths are resolved against
    pub root: Option<PathBuf>,

    /// Channel to read; also suffixes every image name
    pub channel: Option<u32>,

    /// Substitution applied to every resolved path of a table-based group
    pub path_mapping: Option<PathMapping>,

    pub grid_type: GridType,
}

impl GroupOptions {
    pub fn with_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.root = Some(root.into());
        self
    }

    pub fn with_channel(mut self, channel: u32) -> Self {
        self.channel = Some(channel);
        self
    }

    pub fn with_path_mapping(mut self, mapping: PathMapping) -> Self {
        self.path_mapping = Some(mapping);
        self
    }

    pub fn with_grid_type(mut self, grid_type: GridType) -> Self {
        self.grid_type = grid_type;
        self
    }
}

// =============================================================================
// Table Conventions
// =============================================================================

/// Layout of the image column of an annotation table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TableConvention {
    /// Object table: file name column plus folder column, optional rotation
    Object { folder_column: String, rotation: bool },
    /// CellProfiler: `FileName_<x>` with a matching `PathName_<x>`
    CellProfiler { folder_column: String },
    /// The column holds a path, absolute or relative to the root
    Default,
}

impl TableConvention {
    /// Pick the convention for `column`, in order of precedence.
    pub fn detect(table: &Table, column: &str) -> Self {
        if column.contains(OBJECT_IMAGE_MARKER) {
            return TableConvention::Object {
                folder_column: column.replace(FILE_NAME_PREFIX, PATH_NAME_PREFIX),
                rotation: table.contains_column(ROTATION_COLUMN),
            };
        }

        if let Some(suffix) = column.strip_prefix(FILE_NAME_PREFIX) {
            let folder_column = format!("{}{}", PATH_NAME_PREFIX, suffix);
            if table.contains_column(&folder_column) {
                return TableConvention::CellProfiler { folder_column };
            }
        }

        TableConvention::Default
    }
}

// =============================================================================
// Source Group
// =============================================================================

/// Ordered members under construction.
#[derive(Default)]
struct Members {
    name_to_path: IndexMap<String, String>,
    name_to_raw_path: IndexMap<String, String>,
    name_to_transform: IndexMap<String, AffineTransform3D>,
}

impl Members {
    /// Insert a member and report whether the name is new.
    ///
    /// A repeated name keeps its position but takes the latest path.
    fn insert(&mut self, group: &str, name: String, path: String, raw_path: String) -> bool {
        if let Some(existing) = self.name_to_path.get(&name) {
            if *existing != path {
                warn!(
                    "Image name '{}' occurs twice in group '{}', replacing {} with {}",
                    name, group, existing, path
                );
            }
        }
        self.name_to_raw_path.insert(name.clone(), raw_path);
        self.name_to_path.insert(name, path).is_none()
    }
}

/// Images discovered together and composed with one grid policy.
#[derive(Debug, Clone, PartialEq)]
pub struct SourceGroup {
    name: String,
    name_to_path: IndexMap<String, String>,
    name_to_raw_path: IndexMap<String, String>,
    name_to_transform: IndexMap<String, AffineTransform3D>,
    channel_index: Option<u32>,
    grid_type: GridType,
    metadata: ImageMetadata,
    metadata_source: String,
    region_table: Option<Table>,
}

impl SourceGroup {
    /// Group from already resolved paths.
    ///
    /// The first entry is the metadata source. Returns `None` when
    /// `name_to_path` is empty.
    pub fn new(
        name: impl Into<String>,
        name_to_path: IndexMap<String, String>,
        channel_index: Option<u32>,
        grid_type: GridType,
        metadata: ImageMetadata,
    ) -> Option<Self> {
        let metadata_source = name_to_path.keys().next()?.clone();
        Some(Self {
            name: name.into(),
            name_to_raw_path: name_to_path.clone(),
            name_to_path,
            name_to_transform: IndexMap::new(),
            channel_index,
            grid_type,
            metadata,
            metadata_source,
            region_table: None,
        })
    }

    /// Attach per-image transforms; names not in the group are ignored.
    pub fn with_transforms(mut self, transforms: IndexMap<String, AffineTransform3D>) -> Self {
        for (name, transform) in transforms {
            if self.name_to_path.contains_key(&name) {
                self.name_to_transform.insert(name, transform);
            }
        }
        self
    }

    pub fn with_region_table(mut self, table: Table) -> Self {
        self.region_table = Some(table);
        self
    }

    /// Build a group from every file matching `pattern`.
    ///
    /// Metadata is read from the first match. The group gets a two-column
    /// region table (`region_id`, `source_path`) in discovery order.
    pub async fn from_pattern<O: ImageOpener>(
        registry: &ImageRegistry<O>,
        name: &str,
        pattern: &str,
        options: &GroupOptions,
    ) -> Result<Self, SourceError> {
        let paths = resolve_pattern(pattern, options.root.as_deref(), options.channel)?;

        let mut members = Members::default();
        for path in paths {
            let file_name = file_name_of(&path);
            let image = image_name(&file_name, options.channel);
            members.insert(name, image, path.clone(), path);
        }

        let (metadata_source, representative) = first_member(&members, name, pattern)?;
        let metadata = probe_metadata(registry, &representative, options.channel).await?;

        let region_table = Table::from_columns(
            format!("{}_table", name),
            vec![
                (
                    REGION_ID.to_string(),
                    members.name_to_path.keys().cloned().collect(),
                ),
                (
                    SOURCE_PATH.to_string(),
                    members.name_to_path.values().cloned().collect(),
                ),
            ],
        )?;

        info!(
            "Group '{}': {} image(s) from pattern {}",
            name,
            members.name_to_path.len(),
            pattern
        );

        Ok(Self {
            name: name.to_string(),
            name_to_path: members.name_to_path,
            name_to_raw_path: members.name_to_raw_path,
            name_to_transform: members.name_to_transform,
            channel_index: options.channel,
            grid_type: options.grid_type,
            metadata,
            metadata_source,
            region_table: Some(region_table),
        })
    }

    /// Build a group from the image column of an annotation table.
    ///
    /// Rows are taken in order. Several rows may name the same image, as in
    /// segment tables; the group's region table keeps the first row of each
    /// image, so it has one row per member in member order. A `region_id`
    /// column of image names is appended when the table has none.
    pub async fn from_table<O: ImageOpener>(
        registry: &ImageRegistry<O>,
        name: &str,
        table: &Table,
        column: &str,
        options: &GroupOptions,
    ) -> Result<Self, SourceError> {
        if !table.contains_column(column) {
            return Err(TableError::MissingColumn {
                table: table.name().to_string(),
                column: column.to_string(),
            }
            .into());
        }

        let convention = TableConvention::detect(table, column);
        debug!("Group '{}': column '{}' read as {:?}", name, column, convention);

        let root = options.root.as_deref();
        let mut members = Members::default();
        let mut member_rows = Vec::new();

        for row in 0..table.row_count() {
            let value = table.get_string(row, column)?;
            let (path, transform) = match &convention {
                TableConvention::Object {
                    folder_column,
                    rotation,
                } => {
                    let folder = table.get_string(row, folder_column)?;
                    let path = join_in_root(root, folder, value);
                    let transform = if *rotation {
                        let degrees = table.get_f64(row, ROTATION_COLUMN)?;
                        Some(AffineTransform3D::rotation(2, degrees.to_radians()))
                    } else {
                        None
                    };
                    (path, transform)
                }
                TableConvention::CellProfiler { folder_column } => {
                    let folder = table.get_string(row, folder_column)?;
                    (join_in_root(root, folder, value), None)
                }
                TableConvention::Default => (absolute_path(root, value), None),
            };

            let path = apply_path_mapping(options.path_mapping.as_ref(), path);
            let image = image_name(&file_name_of(value), options.channel);

            if members.insert(name, image.clone(), path, value.to_string()) {
                member_rows.push(row);
            }
            match transform {
                Some(transform) => {
                    members.name_to_transform.insert(image, transform);
                }
                None => {
                    members.name_to_transform.shift_remove(&image);
                }
            }
        }

        let (mut metadata_source, representative) = first_member(&members, name, column)?;
        let mut metadata = probe_metadata(registry, &representative, options.channel).await?;

        if let Some(correction) = correct_timepoints(table, column, &members.name_to_raw_path) {
            metadata.num_time_points = Some(correction.num_time_points);
            if let Some(source) = correction.metadata_source {
                metadata_source = source;
            }
        }

        let mut region_table = table.select_rows(&member_rows)?;
        if !region_table.contains_column(REGION_ID) {
            region_table.add_column(REGION_ID, members.name_to_path.keys().cloned().collect())?;
        }

        info!(
            "Group '{}': {} image(s) from table {}",
            name,
            members.name_to_path.len(),
            table.name()
        );

        Ok(Self {
            name: name.to_string(),
            name_to_path: members.name_to_path,
            name_to_raw_path: members.name_to_raw_path,
            name_to_transform: members.name_to_transform,
            channel_index: options.channel,
            grid_type: options.grid_type,
            metadata,
            metadata_source,
            region_table: Some(region_table),
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Image names in insertion order.
    pub fn sources(&self) -> Vec<&str> {
        self.name_to_path.keys().map(String::as_str).collect()
    }

    pub fn len(&self) -> usize {
        self.name_to_path.len()
    }

    pub fn is_empty(&self) -> bool {
        self.name_to_path.is_empty()
    }

    pub fn name_to_path(&self) -> &IndexMap<String, String> {
        &self.name_to_path
    }

    pub fn path(&self, source: &str) -> Option<&str> {
        self.name_to_path.get(source).map(String::as_str)
    }

    /// Path as written in the table or pattern, before resolution.
    pub fn raw_path(&self, source: &str) -> Option<&str> {
        self.name_to_raw_path.get(source).map(String::as_str)
    }

    pub fn transform(&self, source: &str) -> Option<&AffineTransform3D> {
        self.name_to_transform.get(source)
    }

    pub fn channel_index(&self) -> Option<u32> {
        self.channel_index
    }

    /// Channel to read, 0 when none was given.
    pub fn channel(&self) -> u32 {
        self.channel_index.unwrap_or(0)
    }

    pub fn grid_type(&self) -> GridType {
        self.grid_type
    }

    pub fn metadata(&self) -> &ImageMetadata {
        &self.metadata
    }

    /// Name of the image the metadata describes.
    pub fn metadata_source(&self) -> &str {
        &self.metadata_source
    }

    pub fn region_table(&self) -> Option<&Table> {
        self.region_table.as_ref()
    }

    pub fn first_source(&self) -> Option<&str> {
        self.name_to_path.keys().next().map(String::as_str)
    }
}

fn file_name_of(path: &str) -> String {
    let trimmed = path.trim_end_matches(['/', '\\']);
    Path::new(trimmed)
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| trimmed.to_string())
}

fn join_in_root(root: Option<&Path>, folder: &str, file: &str) -> String {
    let root = root.map(|r| r.to_string_lossy().into_owned()).unwrap_or_default();
    absolute_path(None, &combine_path([root.as_str(), folder, file]))
}

fn first_member(
    members: &Members,
    group: &str,
    column: &str,
) -> Result<(String, String), SourceError> {
    members
        .name_to_path
        .first()
        .map(|(name, path)| (name.clone(), path.clone()))
        .ok_or_else(|| SourceError::Empty {
            group: group.to_string(),
            column: column.to_string(),
        })
}

// =============================================================================
// Label Groups
// =============================================================================

/// A group of label images, optionally with one segment table per image.
#[derive(Debug, Clone, PartialEq)]
pub struct LabelGroup {
    group: SourceGroup,
    label_tables: IndexMap<String, String>,
}

impl LabelGroup {
    pub fn new(group: SourceGroup) -> Self {
        Self {
            group,
            label_tables: IndexMap::new(),
        }
    }

    /// Attach segment tables by image name; unknown names are ignored.
    pub fn with_label_tables(mut self, tables: IndexMap<String, String>) -> Self {
        for (name, path) in tables {
            if self.group.path(&name).is_some() {
                self.label_tables.insert(name, path);
            }
        }
        self
    }

    /// Attach segment tables matching `pattern`.
    ///
    /// A table belongs to the first image whose name, without its channel
    /// suffix, prefixes the table's file name.
    pub fn with_label_table_pattern(
        self,
        pattern: &str,
        root: Option<&Path>,
    ) -> Result<Self, SourceError> {
        let table_paths = resolve_pattern(pattern, root, None)?;
        let suffix = self.group.channel_index().map(|c| format!("_c{}", c));

        let mut tables = IndexMap::new();
        for image in self.group.sources() {
            let base = match &suffix {
                Some(s) => image.strip_suffix(s.as_str()).unwrap_or(image),
                None => image,
            };
            if let Some(path) = table_paths
                .iter()
                .find(|p| file_name_of(p).starts_with(base))
            {
                tables.insert(image.to_string(), path.clone());
            }
        }
        debug!(
            "Group '{}': {} of {} label table(s) matched",
            self.group.name(),
            tables.len(),
            self.group.len()
        );

        Ok(self.with_label_tables(tables))
    }

    pub fn group(&self) -> &SourceGroup {
        &self.group
    }

    pub fn label_table(&self, image: &str) -> Option<&str> {
        self.label_tables.get(image).map(String::as_str)
    }

    pub fn num_label_tables(&self) -> usize {
        self.label_tables.len()
    }
}

/// Image or label group, matched at every composition decision.
#[derive(Debug, Clone, PartialEq)]
pub enum FileSources {
    Images(SourceGroup),
    Labels(LabelGroup),
}

impl FileSources {
    pub fn group(&self) -> &SourceGroup {
        match self {
            FileSources::Images(group) => group,
            FileSources::Labels(labels) => labels.group(),
        }
    }

    pub fn is_labels(&self) -> bool {
        matches!(self, FileSources::Labels(_))
    }
}

impl From<SourceGroup> for FileSources {
    fn from(group: SourceGroup) -> Self {
        FileSources::Images(group)
    }
}

impl From<LabelGroup> for FileSources {
    fn from(labels: LabelGroup) -> Self {
        FileSources::Labels(labels)
    }
}

// =============================================================================
// Tests
// =============================================================================
