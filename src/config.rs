//! Command-line configuration for microview.
//!
//! Three subcommands:
//! - `files`: build a dataset from file name patterns
//! - `table`: build a dataset from the image columns of an annotation table
//! - `info`: print the metadata of a single image
//!
//! # Environment Variables
//!
//! - `MICROVIEW_ROOT` - Directory relative paths are resolved against
//! - `MICROVIEW_GRID` - Grid type of multi-image groups (default: Transformed)
//! - `MICROVIEW_PROJECT` - Project directory to write the dataset into
//! - `MICROVIEW_DATASET` - Dataset name inside the project
//! - `MICROVIEW_CACHE_IMAGES` - Max opened images to cache (default: 256)

use std::path::PathBuf;
use std::str::FromStr;

use clap::{Args, Parser, Subcommand};

use crate::files::{GridType, PathMapping};
use crate::io::DEFAULT_IMAGE_CACHE_CAPACITY;
use crate::project::AddMethod;

// =============================================================================
// Default Values
// =============================================================================

/// Default grid type.
pub const DEFAULT_GRID: &str = "Transformed";

/// Group name of unnamed image patterns.
pub const DEFAULT_IMAGE_GROUP: &str = "images";

/// Group name of unnamed label patterns.
pub const DEFAULT_LABEL_GROUP: &str = "labels";

// =============================================================================
// Group Arguments
// =============================================================================

/// A `VALUE[=NAME]` argument: a pattern or table column, optionally naming
/// the group built from it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GroupArg {
    pub value: String,
    pub name: Option<String>,
}

impl FromStr for GroupArg {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (value, name) = match s.split_once('=') {
            Some((value, name)) => (value, Some(name.trim().to_string())),
            None => (s, None),
        };
        if value.trim().is_empty() {
            return Err(format!("Empty value in '{}'", s));
        }
        if name.as_deref() == Some("") {
            return Err(format!("Empty group name in '{}'", s));
        }
        Ok(Self {
            value: value.trim().to_string(),
            name,
        })
    }
}

impl GroupArg {
    /// Group name, or `fallback` when none was given.
    pub fn name_or(&self, fallback: &str) -> String {
        self.name.clone().unwrap_or_else(|| fallback.to_string())
    }
}

// =============================================================================
// CLI Arguments
// =============================================================================

/// microview - compose microscopy images, label maps and annotation tables
/// into dataset views.
#[derive(Parser, Debug, Clone)]
#[command(name = "microview")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

impl Cli {
    pub fn into_command(self) -> Command {
        self.command
    }
}

#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Build a dataset from file name patterns
    Files(FilesConfig),

    /// Build a dataset from an annotation table
    Table(TableConfig),

    /// Print the metadata of one image
    Info(InfoConfig),
}

/// Options shared by both build commands.
#[derive(Args, Debug, Clone)]
pub struct BuildArgs {
    /// Directory relative paths are resolved against.
    #[arg(long, env = "MICROVIEW_ROOT")]
    pub root: Option<PathBuf>,

    /// Grid type of multi-image groups: Stitched or Transformed.
    #[arg(long, default_value = DEFAULT_GRID, env = "MICROVIEW_GRID")]
    pub grid: String,

    /// Write the dataset JSON here instead of stdout.
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// Project directory to add the dataset to.
    #[arg(long, env = "MICROVIEW_PROJECT")]
    pub project: Option<PathBuf>,

    /// Dataset name inside the project.
    #[arg(long, env = "MICROVIEW_DATASET")]
    pub dataset: Option<String>,

    /// Copy images into the project instead of linking them.
    #[arg(long, default_value_t = false)]
    pub copy: bool,

    /// Maximum number of opened images to cache.
    #[arg(long, default_value_t = DEFAULT_IMAGE_CACHE_CAPACITY, env = "MICROVIEW_CACHE_IMAGES")]
    pub cache_images: usize,

    /// Enable verbose logging (debug level).
    #[arg(short, long, default_value_t = false)]
    pub verbose: bool,
}

impl BuildArgs {
    pub fn validate(&self) -> Result<(), String> {
        self.grid_type()?;

        match (&self.project, &self.dataset) {
            (Some(_), None) => {
                return Err(
                    "--project needs a dataset name. Set --dataset or MICROVIEW_DATASET".to_string(),
                )
            }
            (None, Some(_)) => {
                return Err(
                    "--dataset needs a project. Set --project or MICROVIEW_PROJECT".to_string(),
                )
            }
            _ => {}
        }
        if self.project.is_some() && self.output.is_some() {
            return Err("--output and --project cannot be combined".to_string());
        }
        if self.copy && self.project.is_none() {
            return Err("--copy only applies with --project".to_string());
        }
        if self.cache_images == 0 {
            return Err("cache_images must be greater than 0".to_string());
        }
        Ok(())
    }

    pub fn grid_type(&self) -> Result<GridType, String> {
        self.grid.parse::<GridType>().map_err(|e| e.to_string())
    }

    pub fn add_method(&self) -> AddMethod {
        if self.copy {
            AddMethod::Copy
        } else {
            AddMethod::Link
        }
    }
}

/// Build a dataset from file name patterns.
///
/// Each pattern is a regular expression on file names, optionally preceded by
/// a literal directory, e.g. `images/plate_.*\.ome\.zarr`.
#[derive(Args, Debug, Clone)]
pub struct FilesConfig {
    /// Image pattern, optionally with a group name: PATTERN[=NAME].
    #[arg(long = "image")]
    pub images: Vec<GroupArg>,

    /// Label image pattern, optionally with a group name: PATTERN[=NAME].
    #[arg(long = "label")]
    pub labels: Vec<GroupArg>,

    /// Pattern of segment tables matched to label images by name prefix.
    #[arg(long)]
    pub label_tables: Option<String>,

    /// Channel to read; suffixes every image name with `_c<channel>`.
    #[arg(long)]
    pub channel: Option<u32>,

    #[command(flatten)]
    pub build: BuildArgs,
}

impl FilesConfig {
    pub fn validate(&self) -> Result<(), String> {
        if self.images.is_empty() && self.labels.is_empty() {
            return Err("At least one --image or --label pattern is required".to_string());
        }
        if self.label_tables.is_some() && self.labels.is_empty() {
            return Err("--label-tables needs at least one --label pattern".to_string());
        }
        self.build.validate()
    }
}

/// Build a dataset from an annotation table.
#[derive(Args, Debug, Clone)]
pub struct TableConfig {
    /// Annotation table (TSV, or CSV by extension).
    #[arg(long)]
    pub table: PathBuf,

    /// Image column, optionally with a group name: COLUMN[=NAME].
    #[arg(long = "image")]
    pub images: Vec<GroupArg>,

    /// Label image column, optionally with a group name: COLUMN[=NAME].
    #[arg(long = "label")]
    pub labels: Vec<GroupArg>,

    /// Channel to read; suffixes every image name with `_c<channel>`.
    #[arg(long)]
    pub channel: Option<u32>,

    /// Path substitution applied to every table path: FROM,TO.
    #[arg(long)]
    pub path_mapping: Option<PathMapping>,

    #[command(flatten)]
    pub build: BuildArgs,
}

impl TableConfig {
    pub fn validate(&self) -> Result<(), String> {
        if self.images.is_empty() && self.labels.is_empty() {
            return Err("At least one --image or --label column is required".to_string());
        }
        self.build.validate()
    }
}

/// Print the metadata of one image.
#[derive(Args, Debug, Clone)]
pub struct InfoConfig {
    /// Image path.
    pub path: String,

    /// Channel to describe.
    #[arg(long)]
    pub channel: Option<u32>,

    /// Enable verbose logging (debug level).
    #[arg(short, long, default_value_t = false)]
    pub verbose: bool,
}

// =============================================================================
// Tests
// =============================================================================
