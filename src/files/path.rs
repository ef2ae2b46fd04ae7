//! File discovery and path rewriting.
//!
//! A file pattern is a directory plus a regular expression over file names,
//! e.g. `/data/plate1/.*_DAPI\.tif`. Only the last path component is a
//! regex; everything before it is taken literally. The token `{c}` in the
//! pattern is replaced by the channel index when one is given.

use std::path::{Path, PathBuf};
use std::str::FromStr;

use regex::Regex;
use walkdir::WalkDir;

use crate::error::{IoError, ResolveError};

/// Placeholder for the channel index inside a file pattern.
pub const CHANNEL_TOKEN: &str = "{c}";

// =============================================================================
// Path Mapping
// =============================================================================

/// Literal substring substitution for relocating paths between machines.
///
/// Parsed from `"from,to"`, e.g. `"/g/,/Volumes/"`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathMapping {
    pub from: String,
    pub to: String,
}

impl PathMapping {
    pub fn new(from: impl Into<String>, to: impl Into<String>) -> Self {
        Self {
            from: from.into(),
            to: to.into(),
        }
    }

    /// Replace every occurrence of `from` with `to`.
    pub fn apply(&self, path: &str) -> String {
        path.replace(&self.from, &self.to)
    }
}

impl FromStr for PathMapping {
    type Err = ResolveError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.split_once(',') {
            Some((from, to)) if !from.is_empty() => Ok(Self::new(from, to)),
            _ => Err(ResolveError::InvalidPathMapping(s.to_string())),
        }
    }
}

/// Apply an optional mapping to a path.
pub fn apply_path_mapping(mapping: Option<&PathMapping>, path: String) -> String {
    match mapping {
        Some(mapping) => mapping.apply(&path),
        None => path,
    }
}

// =============================================================================
// Names and Paths
// =============================================================================

/// Derive the logical image name from a file name.
///
/// The last extension is removed; `_c<channel>` is appended when a channel
/// is given so that channels of one acquisition do not collide.
pub fn image_name(file_name: &str, channel: Option<u32>) -> String {
    let file_name = file_name.trim_end_matches(['/', '\\']);
    let base = Path::new(file_name)
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| file_name.to_string());
    let stem = match base.rfind('.') {
        Some(dot) if dot > 0 => base[..dot].to_string(),
        _ => base,
    };

    match channel {
        Some(c) => format!("{}_c{}", stem, c),
        None => stem,
    }
}

/// Join path components with platform semantics.
///
/// An absolute component discards everything before it.
pub fn combine_path<I, S>(parts: I) -> String
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut path = PathBuf::new();
    for part in parts {
        let part = part.as_ref();
        if !part.is_empty() {
            path.push(part);
        }
    }
    path.to_string_lossy().into_owned()
}

/// Make `path` absolute: relative paths are taken against `root`, or the
/// working directory when there is no root.
pub fn absolute_path(root: Option<&Path>, path: &str) -> String {
    let candidate = Path::new(path);
    if candidate.is_absolute() {
        return path.to_string();
    }
    let joined = match root {
        Some(root) => root.join(candidate),
        None => candidate.to_path_buf(),
    };
    std::path::absolute(&joined)
        .unwrap_or(joined)
        .to_string_lossy()
        .into_owned()
}

// =============================================================================
// Pattern Resolution
// =============================================================================

/// Split a pattern into its literal directory and file name regex.
fn split_pattern(pattern: &str) -> (Option<&str>, &str) {
    match pattern.rfind(['/', '\\']) {
        Some(0) => (Some("/"), &pattern[1..]),
        Some(i) => (Some(&pattern[..i]), &pattern[i + 1..]),
        None => (None, pattern),
    }
}

/// Expand a file pattern into the sorted list of matching paths.
///
/// Matching entries may be files or directories (OME-Zarr and N5 images are
/// directories). The regex must match the whole file name.
///
/// # Errors
/// * `ResolveError::InvalidPattern` - file name part is not a valid regex
/// * `ResolveError::NoMatch` - nothing matched
/// * `ResolveError::Io` - the directory could not be listed
pub fn resolve_pattern(
    pattern: &str,
    root: Option<&Path>,
    channel: Option<u32>,
) -> Result<Vec<String>, ResolveError> {
    let pattern = match channel {
        Some(c) => pattern.replace(CHANNEL_TOKEN, &c.to_string()),
        None => pattern.to_string(),
    };

    let (dir, name_pattern) = split_pattern(&pattern);
    let dir = match (root, dir) {
        (Some(root), Some(dir)) => root.join(dir),
        (Some(root), None) => root.to_path_buf(),
        (None, Some(dir)) => PathBuf::from(dir),
        (None, None) => PathBuf::from("."),
    };

    let regex = Regex::new(&format!("^(?:{})$", name_pattern)).map_err(|e| {
        ResolveError::InvalidPattern {
            pattern: pattern.clone(),
            message: e.to_string(),
        }
    })?;

    let mut paths = Vec::new();
    for entry in WalkDir::new(&dir)
        .min_depth(1)
        .max_depth(1)
        .sort_by_file_name()
    {
        let entry = entry.map_err(|e| {
            let path = dir.display().to_string();
            match e.into_io_error() {
                Some(io) => IoError::from_std(path, io),
                None => IoError::Read {
                    path,
                    message: "filesystem loop".to_string(),
                },
            }
        })?;

        let file_name = entry.file_name().to_string_lossy();
        if regex.is_match(&file_name) {
            paths.push(absolute_path(None, &entry.path().to_string_lossy()));
        }
    }
    paths.dedup();

    if paths.is_empty() {
        return Err(ResolveError::NoMatch {
            pattern: name_pattern.to_string(),
            directory: dir.display().to_string(),
        });
    }

    Ok(paths)
}

// =============================================================================
// Tests
// =============================================================================
