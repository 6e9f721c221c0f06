use std::sync::Arc;

use approx::assert_abs_diff_eq;
use dose_volume::image_cache::{DensityColourMap, ImageCache, cache_all_images};
use dose_volume::{
    Axis, CoordinateGrid, DoseComparison, DoseVolume, Volume, VolumeField, ViewerConfig,
    ViewerState, VolumeData, VolumeLoader,
};

fn dose_on(grid: CoordinateGrid, value: impl Fn([f64; 3]) -> f64) -> DoseVolume {
    let [xs, ys, zs] = grid.voxel_centers();
    let mut values = Vec::with_capacity(grid.voxel_total());
    for z in &zs {
        for y in &ys {
            for x in &xs {
                values.push(value([*x, *y, *z]));
            }
        }
    }
    let max_dose = values.iter().cloned().fold(0.0, f64::max);
    let field = VolumeField::from_flat(grid.voxel_counts(), values).unwrap();
    DoseVolume {
        volume: Volume::new(grid, field).unwrap(),
        max_dose,
        error: None,
    }
}

fn grid_a() -> CoordinateGrid {
    CoordinateGrid::new(
        vec![0.0, 1.0, 2.0, 3.0, 4.0],
        vec![0.0, 1.0, 2.0, 3.0],
        vec![0.0, 1.0, 2.0],
    )
    .unwrap()
}

#[test]
fn identical_volumes_differ_by_nothing() {
    let shape = |[x, y, z]: [f64; 3]| 1.0 + x * y + z;
    let a = dose_on(grid_a(), shape);
    let b = dose_on(grid_a(), shape);

    let comparison = DoseComparison::compare(&a, &b).unwrap();
    assert!(!comparison.was_resampled());
    assert!(
        comparison
            .volume()
            .field()
            .iter()
            .all(|difference| *difference == Some(0.0))
    );
}

#[test]
fn mismatched_grids_are_resampled_onto_the_first() {
    let a = dose_on(grid_a(), |[x, y, z]| x + y + z);
    let finer = CoordinateGrid::new(
        (0..=8).map(|n| 0.5 * n as f64).collect(),
        (0..=6).map(|n| 0.5 * n as f64).collect(),
        (0..=4).map(|n| 0.5 * n as f64).collect(),
    )
    .unwrap();
    let b = dose_on(finer, |[x, y, z]| 2.0 * (x + y + z));

    let mut comparison = DoseComparison::compare(&a, &b).unwrap();
    assert!(comparison.was_resampled());
    assert_eq!(comparison.volume().dim(), a.volume.dim());
    assert_eq!(comparison.volume().grid(), a.grid());

    // b is linear, so resampling at a's center (1.5, 1.5, 0.5) is exact
    let value = comparison.get_data_at_voxel_coords([1, 1, 0]).unwrap();
    assert_abs_diff_eq!(value, 3.5 / 7.5 - 7.0 / 16.5, epsilon = 1e-12);

    // b's centers span 0.25..3.75 and cover every center of a
    assert!(
        comparison
            .volume()
            .field()
            .iter()
            .all(|difference| difference.is_some())
    );

    let slice = comparison.get_slice(Axis::Xz, 0.5);
    assert_eq!((slice.x_voxels, slice.y_voxels), (4, 2));
}

#[test]
fn renormalizing_rescales_the_second_volume() {
    let a = dose_on(grid_a(), |_| 2.0);
    let b = dose_on(grid_a(), |_| 4.0);
    let mut comparison = DoseComparison::compare(&a, &b).unwrap();

    comparison.renormalize(0.25).unwrap();
    assert!(
        comparison
            .volume()
            .field()
            .iter()
            .all(|difference| *difference == Some(0.75))
    );
}

fn sparse_dose(values: serde_json::Value) -> DoseVolume {
    let data: VolumeData = serde_json::from_value(serde_json::json!({
        "voxelNumber": { "x": 3, "y": 1, "z": 1 },
        "voxelArr": { "x": [0.0, 1.0, 2.0, 3.0], "y": [0.0, 1.0], "z": [0.0, 1.0] },
        "voxelSize": { "x": 1.0, "y": 1.0, "z": 1.0 },
        "dose": values
    }))
    .unwrap();
    VolumeLoader::load_dose(data).unwrap()
}

#[test]
fn voxels_without_dose_in_both_volumes_stay_blank() {
    let a = sparse_dose(serde_json::json!([null, 2.0, 1.0]));
    let b = sparse_dose(serde_json::json!([0.0, 4.0, null]));
    let mut comparison = DoseComparison::compare(&a, &b).unwrap();
    assert!(!comparison.was_resampled());

    assert_eq!(comparison.get_data_at_voxel_coords([0, 0, 0]), None);
    assert_abs_diff_eq!(comparison.get_data_at_voxel_coords([1, 0, 0]).unwrap(), 0.0);
    // only one side missing counts as zero dose
    assert_abs_diff_eq!(comparison.get_data_at_voxel_coords([2, 0, 0]).unwrap(), 0.5);

    comparison.renormalize(0.5).unwrap();
    assert_eq!(comparison.get_data_at_voxel_coords([0, 0, 0]), None);
    assert_abs_diff_eq!(comparison.get_data_at_voxel_coords([1, 0, 0]).unwrap(), 0.5);
}

#[test]
fn resampled_comparison_keeps_undosed_regions_blank() {
    // no dose below x = 1 in either volume
    let a = dose_on(grid_a(), |[x, y, z]| if x < 1.0 { 0.0 } else { x + y + z });
    let finer = CoordinateGrid::new(
        (0..=8).map(|n| 0.5 * n as f64).collect(),
        (0..=6).map(|n| 0.5 * n as f64).collect(),
        (0..=4).map(|n| 0.5 * n as f64).collect(),
    )
    .unwrap();
    let b = dose_on(finer, |[x, y, z]| if x < 1.0 { 0.0 } else { 2.0 * (x + y + z) });

    let comparison = DoseComparison::compare(&a, &b).unwrap();
    assert!(comparison.was_resampled());
    let (nx, ny, nz) = comparison.volume().dim();
    for k in 0..nz {
        for j in 0..ny {
            for i in 0..nx {
                let value = comparison.get_data_at_voxel_coords([i, j, k]);
                assert_eq!(value.is_none(), i == 0, "voxel ({i}, {j}, {k})");
            }
        }
    }
    let value = comparison.get_data_at_voxel_coords([1, 1, 0]).unwrap();
    assert_abs_diff_eq!(value, 3.5 / 7.5 - 7.0 / 16.5, epsilon = 1e-12);
}

fn density_record(values: Vec<f64>) -> VolumeData {
    serde_json::from_value(serde_json::json!({
        "voxelNumber": { "x": 2, "y": 3, "z": 4 },
        "voxelArr": {
            "x": [0.0, 1.0, 2.0],
            "y": [0.0, 1.0, 2.0, 3.0],
            "z": [0.0, 1.0, 2.0, 3.0, 4.0]
        },
        "voxelSize": { "x": 1.0, "y": 1.0, "z": 1.0 },
        "density": values
    }))
    .unwrap()
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn density_images_are_cached_per_axis() {
    let field = Arc::new(
        VolumeField::from_flat((2, 3, 4), (0..24).map(f64::from).collect()).unwrap(),
    );
    let colour_map = DensityColourMap::new(0.0, 23.0);
    let results = cache_all_images(field, colour_map, 1).await;
    assert_eq!(results.len(), 3);

    let mut cache = ImageCache::new(1);
    for cached in results {
        let expected = match cached.axis {
            Axis::Xy => 4,
            Axis::Yz => 2,
            Axis::Xz => 3,
        };
        assert_eq!(cached.images.len(), expected);
        assert!(cache.accept(cached));
    }
    assert!(cache.is_complete());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn viewer_state_drops_images_of_replaced_density() {
    let mut state = ViewerState::new(ViewerConfig::default());
    state
        .load_density(density_record((0..24).map(f64::from).collect()))
        .unwrap();
    let stale = state.spawn_image_caching().unwrap();

    state.load_density(density_record(vec![1.0; 24])).unwrap();
    for handle in stale {
        let cached = handle.await.unwrap().unwrap();
        assert!(!state.accept_images(cached));
    }

    state.cache_density_images().await;
    assert!(state.image_cache().is_complete());
    let image = state.density_image(Axis::Xy, 0.5).unwrap();
    assert_eq!(image.dimensions(), (2, 3));
}

#[test]
fn caching_can_be_switched_off() {
    let config: ViewerConfig = serde_json::from_str(r#"{ "cacheImages": false }"#).unwrap();
    let mut state = ViewerState::new(config);
    state
        .load_density(density_record(vec![1.0; 24]))
        .unwrap();
    assert!(state.spawn_image_caching().is_none());
    // rendered on demand instead
    assert!(state.density_image(Axis::Yz, 1.5).is_some());
}
