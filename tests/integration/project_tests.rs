//! Writing images and built datasets into a project directory.

use microview::dataset::{build_dataset, DataSource, TableDataFormat, VIEW_NAME};
use microview::error::DatasetError;
use microview::files::{FileSources, GridType, GroupOptions, SourceGroup};
use microview::io::ImageRegistry;
use microview::project::{
    AddMethod, ImageEntry, ProjectWriter, DATASET_FILE, DEFAULT_TABLE_FILE, PROJECT_FILE,
};
use microview::ImageDataFormat;

use super::test_utils::{path_in, touch_images, write_tsv, MockImageOpener};

fn entry(name: &str, path: String, num_z_slices: u32) -> ImageEntry {
    ImageEntry {
        name: name.to_string(),
        path,
        format: ImageDataFormat::OmeZarr,
        channel: None,
        num_z_slices,
        segmentation: false,
        label_table: None,
    }
}

fn location(dataset: &microview::Dataset, name: &str) -> microview::StorageLocation {
    dataset
        .source(name)
        .and_then(|s| s.image_data())
        .and_then(|data| data.values().next())
        .cloned()
        .unwrap()
}

#[tokio::test]
async fn test_link_inside_project_is_relative() {
    let project = tempfile::tempdir().unwrap();
    touch_images(project.path(), &["other/images/a.ome.zarr"]);

    let writer = ProjectWriter::new(project.path());
    writer.create_dataset("test", false).await.unwrap();
    writer
        .add_image(
            "test",
            &entry("a", path_in(project.path(), "other/images/a.ome.zarr"), 1),
            AddMethod::Link,
            "images",
        )
        .await
        .unwrap();

    let dataset = writer.load_dataset("test").await.unwrap();
    let location = location(&dataset, "a");
    assert_eq!(location.relative_path(), Some("../other/images/a.ome.zarr"));
    assert_eq!(location.absolute_path(), None);

    let view = dataset.view("a").unwrap();
    assert_eq!(view.ui_selection_group, "images");
    assert_eq!(view.source_displays[0].sources(), vec!["a"]);
}

#[tokio::test]
async fn test_link_outside_project_is_absolute() {
    let project = tempfile::tempdir().unwrap();
    let outside = tempfile::tempdir().unwrap();
    touch_images(outside.path(), &["b.ome.zarr"]);

    let writer = ProjectWriter::new(project.path());
    writer.create_dataset("test", false).await.unwrap();
    let path = path_in(outside.path(), "b.ome.zarr");
    writer
        .add_image("test", &entry("b", path.clone(), 1), AddMethod::Link, "images")
        .await
        .unwrap();

    let dataset = writer.load_dataset("test").await.unwrap();
    let location = location(&dataset, "b");
    assert_eq!(location.absolute_path(), Some(path.as_str()));
    assert_eq!(location.relative_path(), None);
}

#[tokio::test]
async fn test_copy_places_image_under_dataset() {
    let project = tempfile::tempdir().unwrap();
    let outside = tempfile::tempdir().unwrap();
    touch_images(outside.path(), &["raw.ome.zarr", "raw.ome.zarr/0/.zarray"]);
    std::fs::write(outside.path().join("raw.ome.zarr").join(".zattrs"), "{}").unwrap();

    let writer = ProjectWriter::new(project.path());
    writer.create_dataset("test", false).await.unwrap();
    writer
        .add_image(
            "test",
            &entry("c", path_in(outside.path(), "raw.ome.zarr"), 1),
            AddMethod::Copy,
            "images",
        )
        .await
        .unwrap();

    let copied = project.path().join("test").join("images").join("c.ome.zarr");
    assert!(copied.join(".zattrs").is_file());
    assert!(copied.join("0").join(".zarray").is_file());

    let dataset = writer.load_dataset("test").await.unwrap();
    assert_eq!(location(&dataset, "c").relative_path(), Some("images/c.ome.zarr"));
}

#[tokio::test]
async fn test_3d_image_rejected_by_2d_dataset() {
    let project = tempfile::tempdir().unwrap();
    touch_images(project.path(), &["stack.ome.zarr"]);

    let writer = ProjectWriter::new(project.path());
    writer.create_dataset("flat", true).await.unwrap();
    let dataset_file = project.path().join("flat").join(DATASET_FILE);
    let before = std::fs::read_to_string(&dataset_file).unwrap();

    let err = writer
        .add_image(
            "flat",
            &entry("stack", path_in(project.path(), "stack.ome.zarr"), 20),
            AddMethod::Copy,
            "images",
        )
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        DatasetError::DimensionalityConflict { num_z_slices: 20, .. }
    ));
    assert_eq!(std::fs::read_to_string(&dataset_file).unwrap(), before);
    assert!(!project.path().join("flat").join("images").exists());
}

#[tokio::test]
async fn test_segmentation_with_table() {
    let project = tempfile::tempdir().unwrap();
    let outside = tempfile::tempdir().unwrap();
    touch_images(outside.path(), &["seg.ome.zarr"]);
    let table = outside.path().join("seg.tsv");
    write_tsv(&table, &["label_id", "anchor_x"], &[vec!["1", "3.5"]]);

    let writer = ProjectWriter::new(project.path());
    writer.create_dataset("test", false).await.unwrap();
    let mut seg = entry("seg", path_in(outside.path(), "seg.ome.zarr"), 1);
    seg.segmentation = true;
    seg.label_table = Some(table);
    writer
        .add_image("test", &seg, AddMethod::Link, "segmentations")
        .await
        .unwrap();

    let written = project
        .path()
        .join("test")
        .join("tables")
        .join("seg")
        .join(DEFAULT_TABLE_FILE);
    assert!(written.is_file());

    let dataset = writer.load_dataset("test").await.unwrap();
    match dataset.source("seg").unwrap() {
        DataSource::Segmentation(source) => {
            assert_eq!(
                source.table_data[&TableDataFormat::Tsv].relative_path(),
                Some("tables/seg")
            );
        }
        other => panic!("expected a segmentation source, got {:?}", other),
    }
}

#[tokio::test]
async fn test_add_built_dataset_writes_region_table() {
    let project = tempfile::tempdir().unwrap();
    let data = tempfile::tempdir().unwrap();
    touch_images(data.path(), &["a.tif", "b.tif"]);

    let registry = ImageRegistry::new(MockImageOpener::new());
    let options = GroupOptions::default()
        .with_root(data.path())
        .with_grid_type(GridType::Stitched);
    let group = SourceGroup::from_pattern(&registry, "plate", r".*\.tif", &options)
        .await
        .unwrap();
    let regions = group.region_table().unwrap().clone();
    let built = build_dataset(&[FileSources::from(group)], &regions).unwrap();

    let writer = ProjectWriter::new(project.path());
    writer
        .add_dataset("plate1", built, AddMethod::Copy)
        .await
        .unwrap();

    let dataset_dir = project.path().join("plate1");
    assert!(dataset_dir.join("images").join("a.tif").is_file());
    assert!(dataset_dir
        .join("tables")
        .join("plate_table")
        .join(DEFAULT_TABLE_FILE)
        .is_file());

    let dataset = writer.load_dataset("plate1").await.unwrap();
    assert_eq!(location(&dataset, "b").relative_path(), Some("images/b.tif"));
    match dataset.source("plate_table").unwrap() {
        DataSource::Regions(source) => {
            assert_eq!(
                source.table_data[&TableDataFormat::Tsv].relative_path(),
                Some("tables/plate_table")
            );
        }
        other => panic!("expected a region source, got {:?}", other),
    }
    assert!(dataset.view(VIEW_NAME).is_some());

    let project_json = std::fs::read_to_string(project.path().join(PROJECT_FILE)).unwrap();
    let metadata: serde_json::Value = serde_json::from_str(&project_json).unwrap();
    assert_eq!(metadata["datasets"], serde_json::json!(["plate1"]));
}

#[tokio::test]
async fn test_add_built_dataset_twice_fails_on_duplicates() {
    let project = tempfile::tempdir().unwrap();
    let data = tempfile::tempdir().unwrap();
    touch_images(data.path(), &["a.tif"]);

    let registry = ImageRegistry::new(MockImageOpener::new());
    let options = GroupOptions::default().with_root(data.path());
    let group = SourceGroup::from_pattern(&registry, "g", r".*\.tif", &options)
        .await
        .unwrap();
    let regions = group.region_table().unwrap().clone();
    let built = build_dataset(&[FileSources::from(group)], &regions).unwrap();

    let writer = ProjectWriter::new(project.path());
    writer
        .add_dataset("d", built.clone(), AddMethod::Link)
        .await
        .unwrap();
    let err = writer
        .add_dataset("d", built, AddMethod::Link)
        .await
        .unwrap_err();
    assert!(matches!(err, DatasetError::DuplicateSource(_)));
}
