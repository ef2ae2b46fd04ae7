//! Grid composition of source groups.
//!
//! Every group turns into exactly one display. Multi-member groups also
//! contribute transformations that place their members:
//!
//! - `Stitched`: one `mergedGrid` fusing the members into a composite named
//!   after the group; the display shows the composite
//! - `Transformed`: an `affine` per member with a stored transform, then a
//!   `grid` laying the members out; the display shows the members

use crate::error::ComposeError;
use crate::files::table::{Table, COLUMN_INDEX, ROW_INDEX};
use crate::files::{FileSources, GridType, SourceGroup};

use super::view::{
    AffineTransformation, Display, GridTransformation, ImageDisplay, MergedGridTransformation,
    SegmentationDisplay, Transformation,
};

/// Display and transformations contributed by one group.
#[derive(Debug, Clone, PartialEq)]
pub struct GroupComposition {
    pub display: Display,
    pub transformations: Vec<Transformation>,
}

/// Tile positions `(column, row)` for every table row, if the table has
/// both index columns.
pub fn tile_positions(table: &Table) -> Result<Option<Vec<[i64; 2]>>, ComposeError> {
    if !(table.contains_column(ROW_INDEX) && table.contains_column(COLUMN_INDEX)) {
        return Ok(None);
    }
    let positions = (0..table.row_count())
        .map(|row| -> Result<[i64; 2], ComposeError> {
            Ok([
                table.get_i64(row, COLUMN_INDEX)?,
                table.get_i64(row, ROW_INDEX)?,
            ])
        })
        .collect::<Result<Vec<_>, _>>()?;
    Ok(Some(positions))
}

fn display_for(sources: &FileSources, name: &str, members: Vec<String>) -> Display {
    match sources {
        FileSources::Images(group) => {
            let metadata = group.metadata();
            Display::ImageDisplay(ImageDisplay::new(
                name,
                members,
                metadata.color.clone(),
                metadata.contrast_limits,
            ))
        }
        FileSources::Labels(labels) => Display::SegmentationDisplay(SegmentationDisplay::new(
            name,
            members,
            labels.num_label_tables() > 0,
        )),
    }
}

fn member_names(group: &SourceGroup) -> Vec<String> {
    group.sources().into_iter().map(str::to_string).collect()
}

/// Compose one group against the region table.
pub fn compose_group(
    sources: &FileSources,
    region_table: &Table,
) -> Result<GroupComposition, ComposeError> {
    let group = sources.group();
    let members = member_names(group);

    if members.len() == 1 {
        let source = members[0].clone();
        return Ok(GroupComposition {
            display: display_for(sources, &source, members),
            transformations: Vec::new(),
        });
    }

    match group.grid_type() {
        GridType::Stitched => {
            let grid = MergedGridTransformation {
                merged_grid_source_name: group.name().to_string(),
                sources: members,
                positions: tile_positions(region_table)?,
                metadata_source: Some(group.metadata_source().to_string()),
                lazy_load_tables: false,
            };
            let display = display_for(sources, group.name(), vec![group.name().to_string()]);
            Ok(GroupComposition {
                display,
                transformations: vec![Transformation::MergedGrid(grid)],
            })
        }
        GridType::Transformed => {
            let mut transformations: Vec<Transformation> = members
                .iter()
                .filter_map(|member| {
                    group.transform(member).map(|t| {
                        Transformation::Affine(AffineTransformation {
                            name: Some(member.clone()),
                            parameters: *t,
                            sources: vec![member.clone()],
                        })
                    })
                })
                .collect();
            transformations.push(Transformation::Grid(GridTransformation {
                sources: members.clone(),
                positions: None,
            }));

            Ok(GroupComposition {
                display: display_for(sources, group.name(), members),
                transformations,
            })
        }
    }
}

// =============================================================================
// Tests
// =============================================================================
