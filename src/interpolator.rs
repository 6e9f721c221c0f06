use log::debug;
use ndarray::{Array3, ArrayView3};
use rayon::prelude::*;

use crate::enums::Dim;
use crate::field::{FieldValue, VolumeField};
use crate::grid::CoordinateGrid;

/// Two neighbouring source samples along one dimension and the fractional
/// offset of the target between them.
#[derive(Debug, Clone, Copy, PartialEq)]
struct Bracket {
    lower: usize,
    upper: usize,
    offset: f64,
}

/// Finds target positions between the voxel centers of one source
/// dimension.
struct AxisLocator {
    ascending: Vec<f64>,
    reversed: bool,
}

impl AxisLocator {
    fn new(centers: Vec<f64>) -> Self {
        let reversed = centers.len() > 1 && centers[1] < centers[0];
        let mut ascending = centers;
        if reversed {
            ascending.reverse();
        }
        Self {
            ascending,
            reversed,
        }
    }

    /// `None` when `pos` lies outside the span of the centers.
    fn locate(&self, pos: f64) -> Option<Bracket> {
        let centers = &self.ascending;
        let count = centers.len();
        let (first, last) = (*centers.first()?, *centers.last()?);
        if !(pos >= first && pos <= last) {
            return None;
        }
        if count == 1 {
            return Some(Bracket {
                lower: 0,
                upper: 0,
                offset: 0.0,
            });
        }

        // largest center <= pos, leaving room for the next one
        let lower = (centers.partition_point(|c| *c <= pos) - 1).min(count - 2);
        let upper = lower + 1;
        let offset = (pos - centers[lower]) / (centers[upper] - centers[lower]);

        if self.reversed {
            Some(Bracket {
                lower: count - 1 - lower,
                upper: count - 1 - upper,
                offset,
            })
        } else {
            Some(Bracket {
                lower,
                upper,
                offset,
            })
        }
    }
}

pub struct Interpolator;

impl Interpolator {
    /// Combines the eight corners of a cell, indexed `corners[x][y][z]`,
    /// along x, then y, then z.
    #[inline]
    pub fn trilinear(corners: [[[f64; 2]; 2]; 2], (xd, yd, zd): (f64, f64, f64)) -> f64 {
        let lerp = |a: f64, b: f64, t: f64| a * (1.0 - t) + b * t;

        let c00 = lerp(corners[0][0][0], corners[1][0][0], xd);
        let c01 = lerp(corners[0][0][1], corners[1][0][1], xd);
        let c10 = lerp(corners[0][1][0], corners[1][1][0], xd);
        let c11 = lerp(corners[0][1][1], corners[1][1][1], xd);

        let c0 = lerp(c00, c10, yd);
        let c1 = lerp(c01, c11, yd);

        lerp(c0, c1, zd)
    }

    /// Resamples `source`, defined at the voxel centers of `source_grid`,
    /// onto the voxel centers of `target_grid`.
    ///
    /// Targets outside the span of the source centers, or whose cell has an
    /// undefined corner, are left `None` rather than extrapolated.
    pub fn resample<T: FieldValue>(
        source_grid: &CoordinateGrid,
        source: &VolumeField<T>,
        target_grid: &CoordinateGrid,
    ) -> VolumeField<Option<f64>> {
        let brackets = |dim: Dim| -> Vec<Option<Bracket>> {
            let locator = AxisLocator::new(source_grid.axis(dim).centers());
            target_grid
                .axis(dim)
                .centers()
                .into_iter()
                .map(|pos| locator.locate(pos))
                .collect()
        };
        let (x_brackets, y_brackets, z_brackets) = (brackets(Dim::X), brackets(Dim::Y), brackets(Dim::Z));
        let (nx, ny, nz) = target_grid.voxel_counts();
        debug!(
            "resampling {:?} voxels onto {:?}",
            source.dim(),
            (nx, ny, nz)
        );

        let data = source.view();
        let values: Vec<Option<f64>> = (0..nz)
            .into_par_iter()
            .flat_map_iter(|zi| {
                let data = data.clone();
                let (x_brackets, y_brackets) = (&x_brackets, &y_brackets);
                let z = z_brackets[zi];
                (0..ny).flat_map(move |yi| {
                    let data = data.clone();
                    let y = y_brackets[yi];
                    (0..nx).map(move |xi| {
                        let (x, y, z) = (x_brackets[xi]?, y?, z?);
                        Self::interpolate_cell(&data, x, y, z)
                    })
                })
            })
            .collect();

        match Array3::from_shape_vec((nz, ny, nx), values) {
            Ok(array) => VolumeField::from_array(array),
            // the iteration above yields exactly nx * ny * nz values
            Err(_) => VolumeField::from_elem((nx, ny, nz), None),
        }
    }

    fn interpolate_cell<T: FieldValue>(
        data: &ArrayView3<'_, T>,
        x: Bracket,
        y: Bracket,
        z: Bracket,
    ) -> Option<f64> {
        let mut corners = [[[0.0; 2]; 2]; 2];
        for (a, i) in [x.lower, x.upper].into_iter().enumerate() {
            for (b, j) in [y.lower, y.upper].into_iter().enumerate() {
                for (c, k) in [z.lower, z.upper].into_iter().enumerate() {
                    corners[a][b][c] = data.get((k, j, i))?.sample()?;
                }
            }
        }
        Some(Self::trilinear(corners, (x.offset, y.offset, z.offset)))
    }
}
