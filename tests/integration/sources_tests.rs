//! Source group construction from patterns and annotation tables.

use std::collections::HashSet;
use std::sync::atomic::Ordering;

use microview::error::{ResolveError, SourceError, TableError};
use microview::files::table::{REGION_ID, SOURCE_PATH};
use microview::files::{FileSources, GridType, GroupOptions, LabelGroup, PathMapping, SourceGroup, Table};
use microview::io::{ImageHandle, ImageRegistry, VoxelSize};
use microview::ImageDataFormat;

use super::test_utils::{path_in, touch_images, write_tsv, MockImageOpener};

// =============================================================================
// Pattern Groups
// =============================================================================

#[tokio::test]
async fn test_pattern_group_has_one_unique_name_per_file() {
    let dir = tempfile::tempdir().unwrap();
    touch_images(
        dir.path(),
        &["well_A1.tif", "well_A2.tif", "well_B1.tif", "notes.txt", "well_B2.png"],
    );

    let registry = ImageRegistry::new(MockImageOpener::new());
    let options = GroupOptions::default().with_root(dir.path());
    let group = SourceGroup::from_pattern(&registry, "plate", r"well_.*\.tif", &options)
        .await
        .unwrap();

    assert_eq!(group.len(), 3);
    let names: HashSet<&str> = group.sources().into_iter().collect();
    assert_eq!(names.len(), 3);
    assert_eq!(group.sources(), vec!["well_A1", "well_A2", "well_B1"]);
    assert_eq!(group.path("well_A2"), Some(path_in(dir.path(), "well_A2.tif").as_str()));
    assert_eq!(group.metadata_source(), "well_A1");
    assert_eq!(group.grid_type(), GridType::Transformed);
}

#[tokio::test]
async fn test_channel_suffix_on_every_name() {
    let dir = tempfile::tempdir().unwrap();
    touch_images(dir.path(), &["a.ome.zarr", "b.ome.zarr"]);

    let handle = |name: &str| {
        let mut handle = ImageHandle::simple(
            path_in(dir.path(), name),
            ImageDataFormat::OmeZarr,
            [32, 32, 1],
            VoxelSize::pixel(),
        );
        handle.num_channels = 3;
        handle
    };
    let opener = MockImageOpener::new()
        .with_handle(handle("a.ome.zarr"))
        .with_handle(handle("b.ome.zarr"));
    let registry = ImageRegistry::new(opener);

    let with_channel = GroupOptions::default().with_root(dir.path()).with_channel(2);
    let group = SourceGroup::from_pattern(&registry, "g", r".*\.ome\.zarr", &with_channel)
        .await
        .unwrap();
    assert!(group.sources().iter().all(|n| n.ends_with("_c2")));
    assert_eq!(group.channel(), 2);

    let without = GroupOptions::default().with_root(dir.path());
    let group = SourceGroup::from_pattern(&registry, "g", r".*\.ome\.zarr", &without)
        .await
        .unwrap();
    assert!(group.sources().iter().all(|n| !n.contains("_c")));
    assert_eq!(group.channel_index(), None);
}

#[tokio::test]
async fn test_pattern_group_region_table_follows_discovery_order() {
    let dir = tempfile::tempdir().unwrap();
    touch_images(dir.path(), &["c.tif", "a.tif", "b.tif"]);

    let registry = ImageRegistry::new(MockImageOpener::new());
    let options = GroupOptions::default().with_root(dir.path());
    let group = SourceGroup::from_pattern(&registry, "g", r".*\.tif", &options)
        .await
        .unwrap();

    let table = group.region_table().unwrap();
    assert_eq!(table.name(), "g_table");
    assert_eq!(table.column_names(), &[REGION_ID.to_string(), SOURCE_PATH.to_string()]);
    assert_eq!(table.string_column(REGION_ID).unwrap(), group.sources());
    assert_eq!(
        table.get_string(1, SOURCE_PATH).unwrap(),
        path_in(dir.path(), "b.tif")
    );
}

#[tokio::test]
async fn test_pattern_without_match_fails() {
    let dir = tempfile::tempdir().unwrap();
    touch_images(dir.path(), &["a.tif"]);

    let registry = ImageRegistry::new(MockImageOpener::new());
    let options = GroupOptions::default().with_root(dir.path());
    let err = SourceGroup::from_pattern(&registry, "g", r".*\.ome\.zarr", &options)
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        SourceError::Resolve(ResolveError::NoMatch { .. })
    ));
}

#[tokio::test]
async fn test_metadata_probed_once_from_first_member() {
    let dir = tempfile::tempdir().unwrap();
    touch_images(dir.path(), &["t1.tif", "t2.tif", "t3.tif"]);

    let opener = MockImageOpener::new();
    let opens = opener.counter();
    let registry = ImageRegistry::new(opener);
    let options = GroupOptions::default().with_root(dir.path());

    SourceGroup::from_pattern(&registry, "g", r"t.\.tif", &options)
        .await
        .unwrap();
    SourceGroup::from_pattern(&registry, "g", r"t.\.tif", &options)
        .await
        .unwrap();

    // second build hits the registry cache
    assert_eq!(opens.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_heterogeneous_members_are_not_validated() {
    // Only the first member is probed, so a group of mixed shapes reports the
    // first member's geometry for everyone.
    let dir = tempfile::tempdir().unwrap();
    touch_images(dir.path(), &["a.tif", "b.tif"]);

    let opener = MockImageOpener::new()
        .with_shape(&path_in(dir.path(), "a.tif"), [10, 10, 1])
        .with_shape(&path_in(dir.path(), "b.tif"), [500, 400, 30]);
    let registry = ImageRegistry::new(opener);
    let options = GroupOptions::default().with_root(dir.path());

    let group = SourceGroup::from_pattern(&registry, "mixed", r".*\.tif", &options)
        .await
        .unwrap();
    assert_eq!(group.len(), 2);
    assert_eq!(group.metadata().shape, [10, 10, 1]);
    assert_eq!(group.metadata().num_z_slices, 1);
}

#[tokio::test]
async fn test_label_group_with_tables() {
    let dir = tempfile::tempdir().unwrap();
    touch_images(
        dir.path(),
        &["seg/a.tif", "seg/b.tif", "tables/a.tsv", "tables/b.tsv"],
    );

    let registry = ImageRegistry::new(MockImageOpener::new());
    let options = GroupOptions::default().with_root(dir.path());
    let group = SourceGroup::from_pattern(&registry, "seg", r"seg/.*\.tif", &options)
        .await
        .unwrap();
    let labels = LabelGroup::new(group)
        .with_label_table_pattern(r"tables/.*\.tsv", Some(dir.path()))
        .unwrap();

    assert_eq!(labels.num_label_tables(), 2);
    assert_eq!(
        labels.label_table("b"),
        Some(path_in(dir.path(), "tables/b.tsv").as_str())
    );
    assert!(FileSources::from(labels).is_labels());
}

// =============================================================================
// Table Groups
// =============================================================================

#[tokio::test]
async fn test_path_mapping_applied_to_table_paths() {
    let table = Table::parse("t", "image\n/g/data/x.tif\n/g/data/y.tif\n", '\t').unwrap();

    let registry = ImageRegistry::new(MockImageOpener::new());
    let mapping: PathMapping = "/g/,/Volumes/".parse().unwrap();
    let options = GroupOptions::default().with_path_mapping(mapping);

    let group = SourceGroup::from_table(&registry, "g", &table, "image", &options)
        .await
        .unwrap();
    assert_eq!(group.path("x"), Some("/Volumes/data/x.tif"));
    assert_eq!(group.raw_path("x"), Some("/g/data/x.tif"));
}

#[tokio::test]
async fn test_cellprofiler_columns_join_root_folder_and_file() {
    let table = Table::parse(
        "cp",
        "FileName_DNA\tPathName_DNA\nimg1.tif\tsub\nimg2.tif\tsub\n",
        '\t',
    )
    .unwrap();

    let registry = ImageRegistry::new(MockImageOpener::new());
    let options = GroupOptions::default().with_root("/data");
    let group = SourceGroup::from_table(&registry, "dna", &table, "FileName_DNA", &options)
        .await
        .unwrap();

    assert_eq!(group.sources(), vec!["img1", "img2"]);
    assert_eq!(group.path("img1"), Some("/data/sub/img1.tif"));
}

#[tokio::test]
async fn test_object_table_rotation_becomes_transform() {
    let table = Table::parse(
        "objects",
        "FileName_cell_IMG\tPathName_cell_IMG\tRotation_NUM\na.tif\t/data\t90\nb.tif\t/data\t0\n",
        '\t',
    )
    .unwrap();

    let registry = ImageRegistry::new(MockImageOpener::new());
    let group = SourceGroup::from_table(
        &registry,
        "cells",
        &table,
        "FileName_cell_IMG",
        &GroupOptions::default(),
    )
    .await
    .unwrap();

    assert_eq!(group.path("a"), Some("/data/a.tif"));
    let rotated = group.transform("a").unwrap().apply([1.0, 0.0, 0.0]);
    assert!(rotated[0].abs() < 1e-9);
    assert!((rotated[1] - 1.0).abs() < 1e-9);
    assert!(group.transform("b").unwrap().is_identity());
}

#[tokio::test]
async fn test_timepoints_from_segment_table() {
    let dir = tempfile::tempdir().unwrap();
    let table_path = dir.path().join("tracks.tsv");
    write_tsv(
        &table_path,
        &["label_id", "timepoint", "image"],
        &[
            vec!["1", "3", "/data/t3.tif"],
            vec!["1", "4", "/data/t4.tif"],
            vec!["2", "5", "/data/t5.tif"],
            vec!["2", "7", "/data/t7.tif"],
            vec!["3", "6", "/data/t6.tif"],
        ],
    );
    let table = Table::read(&table_path).await.unwrap();

    let registry = ImageRegistry::new(MockImageOpener::new());
    let group = SourceGroup::from_table(&registry, "tracks", &table, "image", &GroupOptions::default())
        .await
        .unwrap();

    assert_eq!(group.metadata().num_time_points, Some(5));
    assert_eq!(group.metadata_source(), "t7");
    assert_eq!(group.path(group.metadata_source()), Some("/data/t7.tif"));
}

#[tokio::test]
async fn test_plain_table_keeps_probed_timepoints() {
    let table = Table::parse("t", "image\ttimepoint\n/data/a.tif\t3\n/data/b.tif\t9\n", '\t').unwrap();

    let registry = ImageRegistry::new(MockImageOpener::new());
    let group = SourceGroup::from_table(&registry, "g", &table, "image", &GroupOptions::default())
        .await
        .unwrap();

    // no label column, so the table is not read as a segment table
    assert_eq!(group.metadata().num_time_points, Some(1));
    assert_eq!(group.metadata_source(), "a");
}

#[tokio::test]
async fn test_table_region_table_gets_region_ids() {
    let table = Table::parse("t", "image\tscore\n/data/a.tif\t1\n/data/b.tif\t2\n", '\t').unwrap();

    let registry = ImageRegistry::new(MockImageOpener::new());
    let group = SourceGroup::from_table(&registry, "g", &table, "image", &GroupOptions::default())
        .await
        .unwrap();

    let regions = group.region_table().unwrap();
    assert_eq!(regions.string_column(REGION_ID).unwrap(), vec!["a", "b"]);
    assert_eq!(regions.string_column("score").unwrap(), vec!["1", "2"]);
}

#[tokio::test]
async fn test_missing_table_column() {
    let table = Table::parse("t", "image\n/data/a.tif\n", '\t').unwrap();
    let registry = ImageRegistry::new(MockImageOpener::new());

    let err = SourceGroup::from_table(&registry, "g", &table, "nope", &GroupOptions::default())
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        SourceError::Table(TableError::MissingColumn { .. })
    ));
}
