//! Dataset assembly.
//!
//! Folds source groups and a region table into a [`Dataset`]: one data source
//! per image, the region table as a table source, and a single view showing
//! everything. All checks run before the dataset is touched, so a failed
//! build leaves it unchanged.

use std::collections::HashSet;

use tracing::info;

use crate::error::{ComposeError, DatasetError};
use crate::files::{FileSources, Table};
use crate::format::detect_format;

use super::grid::compose_group;
use super::model::{
    DataSource, Dataset, ImageDataSource, RegionTableSource, SegmentationDataSource,
    StorageLocation, TableDataFormat,
};
use super::regions::{bind_regions, region_display};
use super::view::{Display, View, ViewerTransform};

/// Name of the view built over all groups.
pub const VIEW_NAME: &str = "all images";

/// UI selection group of that view.
pub const UI_SELECTION_GROUP: &str = "data";

/// Build a new dataset from `groups`.
pub fn build_dataset(groups: &[FileSources], region_table: &Table) -> Result<Dataset, DatasetError> {
    let mut dataset = Dataset::new();
    add_file_sources(&mut dataset, groups, region_table)?;
    Ok(dataset)
}

/// Add the sources of `groups` and their view to an existing dataset.
///
/// # Errors
/// * `DatasetError::DimensionalityConflict` - a group is 3-D and the dataset
///   is locked to 2-D
/// * `DatasetError::DuplicateSource` - a name is already taken
/// * `DatasetError::Compose` - no groups, or the region table does not cover
///   every member
/// * `DatasetError::Io` - the format of a group cannot be detected
pub fn add_file_sources(
    dataset: &mut Dataset,
    groups: &[FileSources],
    region_table: &Table,
) -> Result<(), DatasetError> {
    if groups.is_empty() {
        return Err(ComposeError::NoSources.into());
    }

    for sources in groups {
        let group = sources.group();
        dataset.check_dimensionality(group.name(), group.metadata().num_z_slices)?;
    }

    let data_sources = data_sources(groups, region_table)?;
    let mut seen = HashSet::new();
    for (name, _) in &data_sources {
        if dataset.contains_source(name) || !seen.insert(name.as_str()) {
            return Err(DatasetError::DuplicateSource(name.clone()));
        }
    }

    let view = compose_view(groups, region_table)?;

    for sources in groups {
        let group = sources.group();
        dataset.update_dimensionality(group.name(), group.metadata().num_z_slices)?;
    }
    for (name, source) in data_sources {
        dataset.add_source(name, source)?;
    }
    info!(
        "Added {} group(s) to dataset, view '{}' with {} display(s)",
        groups.len(),
        view.name,
        view.source_displays.len()
    );
    dataset.add_view(view);

    Ok(())
}

/// One data source per member plus the region table.
fn data_sources(
    groups: &[FileSources],
    region_table: &Table,
) -> Result<Vec<(String, DataSource)>, DatasetError> {
    let mut result = Vec::new();

    for sources in groups {
        let group = sources.group();
        let first_path = group
            .first_source()
            .and_then(|name| group.path(name))
            .ok_or(ComposeError::NoSources)?;
        let format = detect_format(first_path)?;
        info!("{} file type: {}", group.name(), format);

        for (name, path) in group.name_to_path() {
            let location = StorageLocation::absolute(path.clone(), Some(group.channel()));
            let source = match sources {
                FileSources::Images(_) => DataSource::Image(ImageDataSource::new(format, location)),
                FileSources::Labels(labels) => {
                    let mut segmentation = SegmentationDataSource::new(format, location);
                    if let Some(table) = labels.label_table(name) {
                        segmentation = segmentation
                            .with_table(TableDataFormat::Tsv, StorageLocation::absolute(table, None));
                    }
                    DataSource::Segmentation(segmentation)
                }
            };
            result.push((name.clone(), source));
        }
    }

    result.push((
        region_table.name().to_string(),
        DataSource::Regions(RegionTableSource::in_memory(region_table.clone())),
    ));

    Ok(result)
}

/// The view over all groups; the region display comes last.
pub fn compose_view(groups: &[FileSources], region_table: &Table) -> Result<View, ComposeError> {
    let first = groups.first().ok_or(ComposeError::NoSources)?.group();
    let regions = bind_regions(groups, region_table)?;

    let mut view = View::new(VIEW_NAME, UI_SELECTION_GROUP);
    for sources in groups {
        let composition = compose_group(sources, region_table)?;
        view.source_displays.push(composition.display);
        view.source_transforms.extend(composition.transformations);
    }

    view.source_displays.push(Display::RegionDisplay(region_display(
        region_table.name(),
        regions,
        first.metadata().num_time_points,
    )));
    view.viewer_transform = first.first_source().map(|source| ViewerTransform::ImageZoom {
        source: source.to_string(),
        timepoint: 0,
    });

    Ok(view)
}

// =============================================================================
// Tests
// =============================================================================
