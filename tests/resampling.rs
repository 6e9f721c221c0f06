use approx::assert_abs_diff_eq;
use dose_volume::{CoordinateGrid, Dim, Interpolator, VolumeField};

/// Boundaries whose voxel centers are exactly `centers`.
fn around(centers: &[f64]) -> Vec<f64> {
    let mut boundaries = vec![centers[0] - 0.5];
    boundaries.extend(centers.windows(2).map(|pair| (pair[0] + pair[1]) / 2.0));
    boundaries.push(centers[centers.len() - 1] + 0.5);
    boundaries
}

fn sum_field(grid: &CoordinateGrid) -> VolumeField<f64> {
    let [xs, ys, zs] = grid.voxel_centers();
    let (xs, ys) = (&xs, &ys);
    let values = zs
        .iter()
        .flat_map(|z| {
            ys.iter()
                .flat_map(move |y| xs.iter().map(move |x| x + y + z))
        })
        .collect();
    VolumeField::from_flat(grid.voxel_counts(), values).unwrap()
}

#[test]
fn resampling_onto_own_grid_is_exact() {
    let grid = CoordinateGrid::new(
        vec![0.0, 1.0, 3.0, 4.0],
        vec![0.0, 2.0, 3.0],
        vec![-1.0, 0.0, 0.5, 2.0],
    )
    .unwrap();
    let values = (0..grid.voxel_total()).map(|a| (a * a) as f64 - 7.5).collect();
    let source = VolumeField::from_flat(grid.voxel_counts(), values).unwrap();

    let resampled = Interpolator::resample(&grid, &source, &grid);
    assert_eq!(resampled.dim(), source.dim());
    for (original, sampled) in source.iter().zip(resampled.iter()) {
        assert_eq!(Some(*original), *sampled);
    }
}

#[test]
fn linear_field_is_reproduced_between_centers() {
    let centers = [0.0, 1.0, 2.0, 3.0];
    let source_grid = CoordinateGrid::new(around(&centers), around(&centers), around(&centers))
        .unwrap();
    assert_eq!(source_grid.axis(Dim::X).centers(), centers.to_vec());
    let source = sum_field(&source_grid);

    // one target voxel centered on (1.5, 1.0, 2.25)
    let target_grid =
        CoordinateGrid::new(vec![1.0, 2.0], vec![0.5, 1.5], vec![2.0, 2.5]).unwrap();
    let resampled = Interpolator::resample(&source_grid, &source, &target_grid);
    assert_abs_diff_eq!(
        resampled.get([0, 0, 0]).flatten().unwrap(),
        4.75,
        epsilon = 1e-12
    );

    // a finer grid inside the source coverage
    let fine = CoordinateGrid::new(
        (0..=6).map(|n| 0.25 + 0.4 * n as f64).collect(),
        vec![0.5, 1.7, 2.9],
        vec![0.0, 3.0],
    )
    .unwrap();
    let resampled = Interpolator::resample(&source_grid, &source, &fine);
    let expected = sum_field(&fine);
    for (want, got) in expected.iter().zip(resampled.iter()) {
        assert_abs_diff_eq!(got.unwrap(), *want, epsilon = 1e-9);
    }
}

#[test]
fn targets_outside_source_centers_are_undefined() {
    let centers = [0.0, 1.0, 2.0];
    let source_grid = CoordinateGrid::new(around(&centers), around(&centers), around(&centers))
        .unwrap();
    let source = sum_field(&source_grid);

    // x centers at -0.25 and 1.0
    let target_grid =
        CoordinateGrid::new(vec![-0.5, 0.0, 2.0], vec![0.5, 1.5], vec![0.5, 1.5]).unwrap();
    let resampled = Interpolator::resample(&source_grid, &source, &target_grid);
    assert_eq!(resampled.get([0, 0, 0]), Some(None));
    assert_abs_diff_eq!(resampled.get([1, 0, 0]).flatten().unwrap(), 3.0, epsilon = 1e-12);
}
