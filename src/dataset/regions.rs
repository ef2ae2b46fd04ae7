//! Binding sources to region table rows.
//!
//! Member `i` of every group belongs to the region in row `i` of the region
//! table. The correspondence is positional only; names are never compared.

use indexmap::IndexMap;

use crate::error::ComposeError;
use crate::files::table::{Table, REGION_ID};
use crate::files::FileSources;

use super::view::{RegionDisplay, DEFAULT_LUT};

/// Boundary thickness of region outlines, relative to the region size.
pub const REGION_BOUNDARY_THICKNESS: f64 = 0.05;

/// Timepoints a region display covers when the group cannot tell.
pub const FALLBACK_TIME_POINTS: u32 = 1000;

/// Region id → member sources, in table row order.
pub fn bind_regions(
    groups: &[FileSources],
    table: &Table,
) -> Result<IndexMap<String, Vec<String>>, ComposeError> {
    let mut regions: IndexMap<String, Vec<String>> = IndexMap::new();

    for sources in groups {
        let group = sources.group();
        for (row, member) in group.sources().into_iter().enumerate() {
            if row >= table.row_count() {
                return Err(ComposeError::MissingRegionRow {
                    table: table.name().to_string(),
                    group: group.name().to_string(),
                    row,
                });
            }
            let region = table.get_string(row, REGION_ID)?;
            regions
                .entry(region.to_string())
                .or_default()
                .push(member.to_string());
        }
    }

    Ok(regions)
}

/// Region display over bound regions with outline defaults.
pub fn region_display(
    table_source: &str,
    regions: IndexMap<String, Vec<String>>,
    num_time_points: Option<u32>,
) -> RegionDisplay {
    let num_time_points = num_time_points.unwrap_or(FALLBACK_TIME_POINTS);
    RegionDisplay {
        name: table_source.to_string(),
        sources: regions,
        table_source: table_source.to_string(),
        show_as_boundaries: true,
        boundary_thickness: REGION_BOUNDARY_THICKNESS,
        boundary_thickness_is_relative: true,
        relative_dilation: 2.0 * REGION_BOUNDARY_THICKNESS,
        opacity: 1.0,
        timepoints: (0..num_time_points).collect(),
        lut: DEFAULT_LUT.to_string(),
        visible: true,
    }
}

// =============================================================================
// Tests
// =============================================================================
