//! Segment table conventions and the timepoint correction.
//!
//! Object tables written by common segmentation tools are recognized by their
//! column names. When such a table has a time column the number of timepoints
//! of a group is the span of that column, which may differ from what the
//! representative image reports.

use indexmap::IndexMap;
use tracing::{debug, info};

use crate::error::TableError;

use super::table::Table;

// =============================================================================
// Column Conventions
// =============================================================================

/// Known segment table layouts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SegmentTableFormat {
    /// `label_id`, `timepoint`
    MoBIE,
    /// `label`, `frame`
    SkImage,
    /// `ObjectNumber`, no time column
    CellProfiler,
}

impl SegmentTableFormat {
    /// Detect the layout from column names.
    pub fn detect(columns: &[String]) -> Option<Self> {
        let has = |name: &str| columns.iter().any(|c| c == name);
        if has("label_id") {
            Some(Self::MoBIE)
        } else if has("label") {
            Some(Self::SkImage)
        } else if has("ObjectNumber") {
            Some(Self::CellProfiler)
        } else {
            None
        }
    }

    pub fn label_column(&self) -> &'static str {
        match self {
            Self::MoBIE => "label_id",
            Self::SkImage => "label",
            Self::CellProfiler => "ObjectNumber",
        }
    }

    pub fn time_point_column(&self) -> Option<&'static str> {
        match self {
            Self::MoBIE => Some("timepoint"),
            Self::SkImage => Some("frame"),
            Self::CellProfiler => None,
        }
    }
}

// =============================================================================
// Timepoint Correction
// =============================================================================

/// Result of a successful timepoint correction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TimepointCorrection {
    /// `max - min + 1` over the time column
    pub num_time_points: u32,

    /// Image of the first row at the latest timepoint, if it could be found
    pub metadata_source: Option<String>,
}

/// Derive the timepoint count of a table-based group from its time column.
///
/// `name_to_raw_path` maps image names to the unresolved value of
/// `path_column`. Returns `None` if the table is not a segment table, has no
/// time column, or the column cannot be read.
pub fn correct_timepoints(
    table: &Table,
    path_column: &str,
    name_to_raw_path: &IndexMap<String, String>,
) -> Option<TimepointCorrection> {
    let format = match SegmentTableFormat::detect(table.column_names()) {
        Some(format) => format,
        None => {
            debug!("Table {} is not a segment table", table.name());
            return None;
        }
    };
    let time_column = format.time_point_column()?;
    if !table.contains_column(time_column) {
        return None;
    }

    match timepoint_span(table, time_column) {
        Ok((num_time_points, latest_row)) => {
            info!(
                "Detected {} timepoint(s) for {}",
                num_time_points,
                table.name()
            );
            let metadata_source = table
                .get_string(latest_row, path_column)
                .ok()
                .and_then(|path| {
                    name_to_raw_path
                        .iter()
                        .find(|(_, raw)| raw.as_str() == path)
                        .map(|(name, _)| name.clone())
                });
            if metadata_source.is_none() {
                debug!(
                    "No image for the latest timepoint in {}, keeping metadata source",
                    table.name()
                );
            }
            Some(TimepointCorrection {
                num_time_points,
                metadata_source,
            })
        }
        Err(e) => {
            debug!("Skipping timepoint correction for {}: {}", table.name(), e);
            None
        }
    }
}

/// Span of the time column and the first row reaching its maximum.
fn timepoint_span(table: &Table, time_column: &str) -> Result<(u32, usize), TableError> {
    let (min, max) = table.min_max(time_column)?;
    let latest_row = table
        .rows_where_equal(time_column, max)?
        .first()
        .copied()
        .ok_or_else(|| TableError::Empty(table.name().to_string()))?;
    Ok(((max - min + 1.0) as u32, latest_row))
}

// =============================================================================
// Tests
// =============================================================================
