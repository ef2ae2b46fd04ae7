//! Dataset assembly, dimensionality, persistence and view materialization.

use std::path::Path;

use microview::dataset::{
    add_file_sources, build_dataset, materialize_view, BuildContext, DataSource, Dataset, Display,
    VIEW_NAME,
};
use microview::error::DatasetError;
use microview::files::{FileSources, GridType, GroupOptions, LabelGroup, SourceGroup};
use microview::image::TransformableImage;
use microview::io::{ImageRegistry, VoxelSize};
use microview::transform::AffineTransform3D;
use microview::ImageDataFormat;

use super::test_utils::{path_in, touch_images, MockImageOpener, DEFAULT_SHAPE};

async fn pattern_group(
    registry: &ImageRegistry<MockImageOpener>,
    root: &Path,
    name: &str,
    pattern: &str,
    grid_type: GridType,
) -> SourceGroup {
    let options = GroupOptions::default()
        .with_root(root)
        .with_grid_type(grid_type);
    SourceGroup::from_pattern(registry, name, pattern, &options)
        .await
        .unwrap()
}

// =============================================================================
// Assembly
// =============================================================================

#[tokio::test]
async fn test_build_dataset_from_images_and_labels() {
    let dir = tempfile::tempdir().unwrap();
    touch_images(dir.path(), &["raw/a.tif", "raw/b.tif", "seg/a_seg.tif", "seg/b_seg.tif"]);

    let registry = ImageRegistry::new(MockImageOpener::new());
    let raw = pattern_group(&registry, dir.path(), "raw", r"raw/.*\.tif", GridType::Stitched).await;
    let seg = pattern_group(&registry, dir.path(), "seg", r"seg/.*\.tif", GridType::Stitched).await;
    let regions = raw.region_table().unwrap().clone();

    let groups = vec![FileSources::from(raw), FileSources::from(LabelGroup::new(seg))];
    let dataset = build_dataset(&groups, &regions).unwrap();

    assert!(dataset.is_2d());
    assert_eq!(
        dataset.sources().keys().collect::<Vec<_>>(),
        vec!["a", "b", "a_seg", "b_seg", "raw_table"]
    );
    match dataset.source("a_seg").unwrap() {
        DataSource::Segmentation(source) => {
            let location = &source.image_data[&ImageDataFormat::Tiff];
            assert_eq!(
                location.absolute_path(),
                Some(path_in(dir.path(), "seg/a_seg.tif").as_str())
            );
        }
        other => panic!("expected a segmentation source, got {:?}", other),
    }

    let view = dataset.view(VIEW_NAME).unwrap();
    assert_eq!(view.source_displays.len(), 3);
    let region = view.region_display().unwrap();
    assert_eq!(region.table_source, "raw_table");
    assert_eq!(region.sources["a"], vec!["a", "a_seg"]);
    assert_eq!(region.sources["b"], vec!["b", "b_seg"]);
}

#[tokio::test]
async fn test_dataset_never_returns_to_2d() {
    let dir = tempfile::tempdir().unwrap();
    touch_images(dir.path(), &["stack.tif", "flat.tif"]);

    let opener = MockImageOpener::new().with_shape(&path_in(dir.path(), "stack.tif"), [64, 64, 12]);
    let registry = ImageRegistry::new(opener);
    let stack = pattern_group(&registry, dir.path(), "stack", r"stack\.tif", GridType::Transformed).await;
    let flat = pattern_group(&registry, dir.path(), "flat", r"flat\.tif", GridType::Transformed).await;

    let mut dataset = Dataset::new();
    let regions = stack.region_table().unwrap().clone();
    add_file_sources(&mut dataset, &[FileSources::from(stack)], &regions).unwrap();
    assert!(!dataset.is_2d());

    let regions = flat.region_table().unwrap().clone();
    add_file_sources(&mut dataset, &[FileSources::from(flat)], &regions).unwrap();
    assert!(!dataset.is_2d());
    assert!(dataset.contains_source("flat"));
}

#[tokio::test]
async fn test_locked_dataset_rejects_3d_group_untouched() {
    let dir = tempfile::tempdir().unwrap();
    touch_images(dir.path(), &["stack.tif"]);

    let opener = MockImageOpener::new().with_shape(&path_in(dir.path(), "stack.tif"), [64, 64, 12]);
    let registry = ImageRegistry::new(opener);
    let stack = pattern_group(&registry, dir.path(), "stack", r".*\.tif", GridType::Transformed).await;
    let regions = stack.region_table().unwrap().clone();

    let mut dataset = Dataset::locked_2d();
    let before = dataset.clone();
    let err = add_file_sources(&mut dataset, &[FileSources::from(stack)], &regions).unwrap_err();

    assert!(matches!(
        err,
        DatasetError::DimensionalityConflict { num_z_slices: 12, .. }
    ));
    assert_eq!(dataset, before);
}

#[tokio::test]
async fn test_dataset_json_round_trip_locks_2d() {
    let dir = tempfile::tempdir().unwrap();
    touch_images(dir.path(), &["a.tif", "b.tif"]);

    let registry = ImageRegistry::new(MockImageOpener::new());
    let group = pattern_group(&registry, dir.path(), "g", r".*\.tif", GridType::Stitched).await;
    let regions = group.region_table().unwrap().clone();
    let dataset = build_dataset(&[FileSources::from(group)], &regions).unwrap();

    let json: serde_json::Value = serde_json::from_str(&dataset.to_json().unwrap()).unwrap();
    let view = &json["views"][VIEW_NAME];
    assert_eq!(view["uiSelectionGroup"], "data");
    assert_eq!(
        view["sourceTransforms"][0]["mergedGrid"]["mergedGridSourceName"],
        "g"
    );

    let parsed = Dataset::from_json(&dataset.to_json().unwrap()).unwrap();
    assert!(parsed.is_locked());
    assert_eq!(parsed.views().keys().collect::<Vec<_>>(), vec![VIEW_NAME]);
    assert_eq!(parsed.view(VIEW_NAME).unwrap().name, VIEW_NAME);
}

// =============================================================================
// Transformable Images
// =============================================================================

#[tokio::test]
async fn test_identity_is_idempotent() {
    let registry = ImageRegistry::new(MockImageOpener::new());
    let mut image = TransformableImage::new("a", "/data/a.tif", 0);
    image.apply_transform(&AffineTransform3D::translation(3.0, 0.0, 0.0));
    image.open(&registry).await.unwrap();

    let mask = image.mask().unwrap();
    let transform = image.transform();

    image.apply_transform(&AffineTransform3D::identity());
    assert_eq!(image.transform(), transform);
    assert_eq!(image.cached_mask(), Some(&mask));
}

#[tokio::test]
async fn test_transforms_accumulate_by_composition() {
    let registry = ImageRegistry::new(MockImageOpener::new());
    let a = AffineTransform3D::scaling(2.0, 0.5, 1.0);
    let b = AffineTransform3D::rotation(2, 0.3).after(&AffineTransform3D::translation(4.0, -1.0, 0.0));

    let mut stepwise = TransformableImage::new("s", "/data/s.tif", 0);
    stepwise.open(&registry).await.unwrap();
    stepwise.mask().unwrap();
    stepwise.apply_transform(&a);
    stepwise.apply_transform(&b);

    let mut once = TransformableImage::new("o", "/data/o.tif", 0);
    once.open(&registry).await.unwrap();
    once.mask().unwrap();
    once.apply_transform(&b.after(&a));

    assert!(stepwise.transform().approx_eq(&once.transform(), 1e-12));
    let (s_min, s_max) = stepwise.mask().unwrap().bounds();
    let (o_min, o_max) = once.mask().unwrap().bounds();
    for d in 0..3 {
        assert!((s_min[d] - o_min[d]).abs() < 1e-9);
        assert!((s_max[d] - o_max[d]).abs() < 1e-9);
    }
}

#[tokio::test]
async fn test_voxel_size_override() {
    let registry = ImageRegistry::new(MockImageOpener::new());
    let mut image = TransformableImage::new("a", "/data/a.tif", 0)
        .with_voxel_size(VoxelSize::new([0.5, 0.5, 2.0], "micrometer"));
    image.open(&registry).await.unwrap();

    let (min, max) = image.mask().unwrap().bounds();
    assert_eq!(min, [0.0; 3]);
    assert!((max[0] - DEFAULT_SHAPE[0] as f64 * 0.5).abs() < 1e-9);
    assert!((max[2] - 2.0).abs() < 1e-9);
    assert_eq!(image.source_pair().unwrap().source.unit, "micrometer");
}

// =============================================================================
// Materialization
// =============================================================================

#[tokio::test]
async fn test_materialize_transformed_group() {
    let dir = tempfile::tempdir().unwrap();
    touch_images(dir.path(), &["a.tif", "b.tif", "c.tif", "d.tif"]);

    let registry = ImageRegistry::new(MockImageOpener::new());
    let group = pattern_group(&registry, dir.path(), "g", r".*\.tif", GridType::Transformed).await;
    let regions = group.region_table().unwrap().clone();
    let dataset = build_dataset(&[FileSources::from(group)], &regions).unwrap();

    let mut context = BuildContext::new();
    let mut images = materialize_view(&registry, &dataset, VIEW_NAME, None, &mut context)
        .await
        .unwrap();

    assert_eq!(images.len(), 4);
    assert_eq!(context.len(), 4);

    // 2x2 grid of 64x48 cells
    let expected = [("a", 0.0, 0.0), ("b", 64.0, 0.0), ("c", 0.0, 48.0), ("d", 64.0, 48.0)];
    for (name, x, y) in expected {
        let (min, _) = images.get_mut(name).unwrap().mask().unwrap().bounds();
        assert!((min[0] - x).abs() < 1e-9, "{} x = {}", name, min[0]);
        assert!((min[1] - y).abs() < 1e-9, "{} y = {}", name, min[1]);
        assert!(context
            .accumulated(name)
            .approx_eq(&images[name].transform(), 1e-12));
    }

    let view = dataset.view(VIEW_NAME).unwrap();
    assert!(matches!(view.source_displays[0], Display::ImageDisplay(_)));
}
