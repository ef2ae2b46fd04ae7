//! Grid composition and region binding over groups built end to end.

use microview::dataset::grid::tile_positions;
use microview::dataset::{bind_regions, compose_group, compose_view, Display, Transformation};
use microview::error::ComposeError;
use microview::files::table::REGION_ID;
use microview::files::{FileSources, GridType, GroupOptions, LabelGroup, SourceGroup, Table};
use microview::io::ImageRegistry;

use super::test_utils::{touch_images, MockImageOpener};

async fn table_group(table: &Table, grid_type: GridType) -> SourceGroup {
    let registry = ImageRegistry::new(MockImageOpener::new());
    let options = GroupOptions::default().with_grid_type(grid_type);
    SourceGroup::from_table(&registry, "plate", table, "image", &options)
        .await
        .unwrap()
}

fn tile_table() -> Table {
    Table::parse(
        "tiles",
        "image\trow_index\tcolumn_index\n\
         /data/t00.tif\t0\t0\n\
         /data/t01.tif\t0\t1\n\
         /data/t10.tif\t1\t0\n\
         /data/t11.tif\t1\t1\n",
        '\t',
    )
    .unwrap()
}

#[tokio::test]
async fn test_stitched_group_positions_in_row_order() {
    let table = tile_table();
    let group = table_group(&table, GridType::Stitched).await;
    let regions = group.region_table().unwrap().clone();

    let composition = compose_group(&FileSources::from(group), &regions).unwrap();

    assert_eq!(composition.transformations.len(), 1);
    match &composition.transformations[0] {
        Transformation::MergedGrid(grid) => {
            assert_eq!(grid.merged_grid_source_name, "plate");
            assert_eq!(
                grid.positions,
                Some(vec![[0, 0], [1, 0], [0, 1], [1, 1]])
            );
            assert_eq!(grid.sources, vec!["t00", "t01", "t10", "t11"]);
            assert_eq!(grid.metadata_source.as_deref(), Some("t00"));
        }
        other => panic!("expected a merged grid, got {:?}", other),
    }
    assert_eq!(composition.display.sources(), vec!["plate"]);
}

#[tokio::test]
async fn test_transformed_group_keeps_members_separate() {
    let table = tile_table();
    let group = table_group(&table, GridType::Transformed).await;
    let regions = group.region_table().unwrap().clone();

    let composition = compose_group(&FileSources::from(group), &regions).unwrap();

    assert_eq!(composition.display.name(), "plate");
    assert_eq!(composition.display.sources().len(), 4);
    match composition.transformations.as_slice() {
        [Transformation::Grid(grid)] => {
            assert_eq!(grid.sources.len(), 4);
            assert_eq!(grid.positions, None);
        }
        other => panic!("expected one grid, got {:?}", other),
    }
}

#[tokio::test]
async fn test_single_file_group_is_a_plain_display() {
    let dir = tempfile::tempdir().unwrap();
    touch_images(dir.path(), &["only.tif"]);

    let registry = ImageRegistry::new(MockImageOpener::new());
    let options = GroupOptions::default()
        .with_root(dir.path())
        .with_grid_type(GridType::Stitched);
    let group = SourceGroup::from_pattern(&registry, "single", r".*\.tif", &options)
        .await
        .unwrap();
    let regions = group.region_table().unwrap().clone();

    let composition = compose_group(&FileSources::from(group), &regions).unwrap();
    assert!(composition.transformations.is_empty());
    assert!(matches!(composition.display, Display::ImageDisplay(_)));
    assert_eq!(composition.display.name(), "only");
    assert_eq!(composition.display.sources(), vec!["only"]);
}

#[tokio::test]
async fn test_region_binding_follows_row_order() {
    let images = Table::parse(
        "regions",
        "image\tregion_id\n/data/m0.tif\tr0\n/data/m1.tif\tr1\n/data/m2.tif\tr2\n",
        '\t',
    )
    .unwrap();
    let labels = Table::parse(
        "labels",
        "image\n/data/seg0.tif\n/data/seg1.tif\n/data/seg2.tif\n",
        '\t',
    )
    .unwrap();

    let registry = ImageRegistry::new(MockImageOpener::new());
    let options = GroupOptions::default();
    let image_group = SourceGroup::from_table(&registry, "raw", &images, "image", &options)
        .await
        .unwrap();
    let label_group = SourceGroup::from_table(&registry, "seg", &labels, "image", &options)
        .await
        .unwrap();

    let groups = vec![
        FileSources::from(image_group),
        FileSources::from(LabelGroup::new(label_group)),
    ];
    let regions = bind_regions(&groups, &images).unwrap();

    assert_eq!(regions.keys().collect::<Vec<_>>(), vec!["r0", "r1", "r2"]);
    for i in 0..3 {
        let region = format!("r{}", i);
        assert_eq!(
            regions[region.as_str()],
            vec![format!("m{}", i), format!("seg{}", i)]
        );
    }
}

#[tokio::test]
async fn test_short_region_table_fails() {
    let table = tile_table();
    let group = table_group(&table, GridType::Transformed).await;
    let short = Table::from_columns(
        "short",
        vec![(REGION_ID.to_string(), vec!["r0".to_string(), "r1".to_string()])],
    )
    .unwrap();

    let err = compose_view(&[FileSources::from(group)], &short).unwrap_err();
    assert!(matches!(
        err,
        ComposeError::MissingRegionRow { row: 2, .. }
    ));
}

#[test]
fn test_positions_need_both_index_columns() {
    let table = Table::parse("t", "image\trow_index\na\t0\n", '\t').unwrap();
    assert_eq!(tile_positions(&table).unwrap(), None);

    let table = Table::parse("t", "row_index\tcolumn_index\n0\tx\n", '\t').unwrap();
    assert!(tile_positions(&table).is_err());
}

#[tokio::test]
async fn test_segment_table_binds_one_region_per_image() {
    let table = Table::parse(
        "segments",
        "label_id\ttimepoint\timage\n\
         1\t0\t/data/a.tif\n\
         2\t1\t/data/a.tif\n\
         3\t0\t/data/b.tif\n",
        '\t',
    )
    .unwrap();

    let registry = ImageRegistry::new(MockImageOpener::new());
    let group = SourceGroup::from_table(&registry, "seg", &table, "image", &GroupOptions::default())
        .await
        .unwrap();
    assert_eq!(group.sources(), vec!["a", "b"]);

    let regions = group.region_table().unwrap().clone();
    assert_eq!(regions.row_count(), 2);
    assert_eq!(regions.string_column(REGION_ID).unwrap(), vec!["a", "b"]);
    assert_eq!(regions.string_column("label_id").unwrap(), vec!["1", "3"]);

    let groups = vec![FileSources::from(LabelGroup::new(group))];
    let bound = bind_regions(&groups, &regions).unwrap();
    assert_eq!(bound.keys().collect::<Vec<_>>(), vec!["a", "b"]);
    assert_eq!(bound["a"], vec!["a"]);
    assert_eq!(bound["b"], vec!["b"]);
}

#[tokio::test]
async fn test_repeated_tile_rows_give_one_position_per_member() {
    let table = Table::parse(
        "tiles",
        "image\trow_index\tcolumn_index\n\
         /data/t00.tif\t0\t0\n\
         /data/t00.tif\t0\t0\n\
         /data/t01.tif\t0\t1\n\
         /data/t01.tif\t0\t1\n",
        '\t',
    )
    .unwrap();
    let group = table_group(&table, GridType::Stitched).await;
    let regions = group.region_table().unwrap().clone();

    let composition = compose_group(&FileSources::from(group), &regions).unwrap();
    match &composition.transformations[0] {
        Transformation::MergedGrid(grid) => {
            assert_eq!(grid.sources, vec!["t00", "t01"]);
            assert_eq!(grid.positions, Some(vec![[0, 0], [1, 0]]));
        }
        other => panic!("expected a merged grid, got {:?}", other),
    }
}

#[tokio::test]
async fn test_quoted_cellprofiler_folder_with_comma() {
    let table = Table::parse(
        "cp",
        "FileName_DNA,PathName_DNA\nimg1.tif,\"/data/plate 1,run 2\"\nimg2.tif,\"/data/plate 1,run 2\"\n",
        ',',
    )
    .unwrap();

    let registry = ImageRegistry::new(MockImageOpener::new());
    let group = SourceGroup::from_table(&registry, "dna", &table, "FileName_DNA", &GroupOptions::default())
        .await
        .unwrap();
    assert_eq!(group.path("img1"), Some("/data/plate 1,run 2/img1.tif"));
}
