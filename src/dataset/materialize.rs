//! Turning a view into placed images.
//!
//! Every image or segmentation source a view references is opened and bound,
//! then the view's transformations are applied in order. Grid layouts place
//! each member in its own cell of a regular grid sized by the largest member.

use std::path::Path;

use indexmap::IndexMap;
use tracing::debug;

use crate::error::DatasetError;
use crate::image::TransformableImage;
use crate::io::{ImageOpener, ImageRegistry};
use crate::transform::grid::{auto_grid_positions, cell_size, cell_translation};
use crate::transform::AffineTransform3D;

use super::context::BuildContext;
use super::model::{DataSource, Dataset};
use super::view::{Display, Transformation};

/// Open and place every image of `view_name`.
///
/// Relative storage locations are resolved against `dataset_dir`. Applied
/// transforms are recorded in `context`.
pub async fn materialize_view<O: ImageOpener>(
    registry: &ImageRegistry<O>,
    dataset: &Dataset,
    view_name: &str,
    dataset_dir: Option<&Path>,
    context: &mut BuildContext,
) -> Result<IndexMap<String, TransformableImage>, DatasetError> {
    let view = dataset
        .view(view_name)
        .ok_or_else(|| DatasetError::UnknownView(view_name.to_string()))?;

    let composites: Vec<&str> = view
        .source_transforms
        .iter()
        .filter_map(|t| match t {
            Transformation::MergedGrid(grid) => Some(grid.merged_grid_source_name.as_str()),
            _ => None,
        })
        .collect();

    let mut referenced: Vec<&str> = Vec::new();
    for display in &view.source_displays {
        if !matches!(display, Display::RegionDisplay(_)) {
            referenced.extend(display.sources());
        }
    }
    for transformation in &view.source_transforms {
        referenced.extend(transformation.sources().iter().map(String::as_str));
    }

    let mut images = IndexMap::new();
    for name in referenced {
        if images.contains_key(name) || composites.contains(&name) {
            continue;
        }
        let source = dataset
            .source(name)
            .ok_or_else(|| DatasetError::UnknownSource(name.to_string()))?;
        let location = match source {
            DataSource::Regions(_) => continue,
            other => other
                .image_data()
                .and_then(|data| data.values().next())
                .ok_or_else(|| DatasetError::MissingImageData(name.to_string()))?,
        };

        let mut image = TransformableImage::new(
            name,
            location.resolve(dataset_dir),
            location.channel().unwrap_or(0),
        );
        image.open(registry).await?;
        images.insert(name.to_string(), image);
    }

    for transformation in &view.source_transforms {
        match transformation {
            Transformation::Affine(affine) => {
                for name in &affine.sources {
                    let image = images
                        .get_mut(name)
                        .ok_or_else(|| DatasetError::UnknownSource(name.clone()))?;
                    image.apply_transform(&affine.parameters);
                    context.record(name, affine.parameters);
                }
            }
            Transformation::Grid(grid) => {
                lay_out(&mut images, &grid.sources, grid.positions.as_deref(), context)?;
            }
            Transformation::MergedGrid(grid) => {
                lay_out(&mut images, &grid.sources, grid.positions.as_deref(), context)?;
            }
        }
    }

    debug!("Materialized {} image(s) for view '{}'", images.len(), view_name);
    Ok(images)
}

/// Translate each source into its grid cell.
fn lay_out(
    images: &mut IndexMap<String, TransformableImage>,
    sources: &[String],
    positions: Option<&[[i64; 2]]>,
    context: &mut BuildContext,
) -> Result<(), DatasetError> {
    let auto = auto_grid_positions(sources.len());

    let mut bounds = Vec::with_capacity(sources.len());
    for name in sources {
        let image = images
            .get_mut(name)
            .ok_or_else(|| DatasetError::UnknownSource(name.clone()))?;
        bounds.push(image.mask().map(|m| m.bounds()).unwrap_or(([0.0; 3], [0.0; 3])));
    }

    let extents: Vec<[f64; 3]> = bounds
        .iter()
        .map(|(min, max)| [max[0] - min[0], max[1] - min[1], max[2] - min[2]])
        .collect();
    let cell = cell_size(&extents);

    for (i, name) in sources.iter().enumerate() {
        let position = positions
            .and_then(|p| p.get(i).copied())
            .unwrap_or(auto[i]);
        let translation: AffineTransform3D = cell_translation(position, cell, bounds[i].0);
        if let Some(image) = images.get_mut(name) {
            image.apply_transform(&translation);
            context.record(name, translation);
        }
    }
    Ok(())
}

// =============================================================================
// Tests
// =============================================================================
