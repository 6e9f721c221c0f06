//! World ↔ voxel mapping over non-uniform voxel boundaries.

use crate::enums::{Axis, Dim};

use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum GridError {
    #[error("{dim} grid needs at least 2 boundaries, got {len}")]
    TooFewBoundaries { dim: Dim, len: usize },

    #[error("{dim} grid boundaries are not strictly monotonic at index {index}")]
    NotMonotonic { dim: Dim, index: usize },

    #[error("{dim} grid boundary {index} is not finite")]
    NonFinite { dim: Dim, index: usize },
}

/// Voxel boundaries along one dimension.
///
/// Boundaries are kept in the order they were supplied, which is the order
/// voxels are stored in. Decreasing grids are binned on an ascending copy
/// and the bin is mirrored back into storage order.
#[derive(Debug, Clone, PartialEq)]
pub struct AxisGrid {
    boundaries: Vec<f64>,
    ascending: Vec<f64>,
    reversed: bool,
}

impl AxisGrid {
    pub fn new(dim: Dim, boundaries: Vec<f64>) -> Result<Self, GridError> {
        if boundaries.len() < 2 {
            return Err(GridError::TooFewBoundaries {
                dim,
                len: boundaries.len(),
            });
        }
        if let Some(index) = boundaries.iter().position(|b| !b.is_finite()) {
            return Err(GridError::NonFinite { dim, index });
        }

        let reversed = boundaries[1] < boundaries[0];
        let monotonic = |pair: &[f64]| {
            if reversed {
                pair[1] < pair[0]
            } else {
                pair[1] > pair[0]
            }
        };
        if let Some(index) = boundaries.windows(2).position(|pair| !monotonic(pair)) {
            return Err(GridError::NotMonotonic {
                dim,
                index: index + 1,
            });
        }

        let mut ascending = boundaries.clone();
        if reversed {
            ascending.reverse();
        }

        Ok(Self {
            boundaries,
            ascending,
            reversed,
        })
    }

    /// Builds a grid of `count` voxels of equal `size` starting at `origin`.
    pub fn uniform(dim: Dim, origin: f64, size: f64, count: usize) -> Result<Self, GridError> {
        let boundaries = (0..=count).map(|i| origin + size * i as f64).collect();
        Self::new(dim, boundaries)
    }

    #[inline]
    pub fn voxel_count(&self) -> usize {
        self.boundaries.len() - 1
    }

    pub fn boundaries(&self) -> &[f64] {
        &self.boundaries
    }

    #[inline]
    pub fn first(&self) -> f64 {
        self.boundaries[0]
    }

    #[inline]
    pub fn last(&self) -> f64 {
        self.boundaries[self.boundaries.len() - 1]
    }

    #[inline]
    pub fn min(&self) -> f64 {
        self.ascending[0]
    }

    #[inline]
    pub fn max(&self) -> f64 {
        self.ascending[self.ascending.len() - 1]
    }

    /// Extent of the grid in cm.
    pub fn length(&self) -> f64 {
        self.max() - self.min()
    }

    pub fn is_reversed(&self) -> bool {
        self.reversed
    }

    /// Voxel center positions in storage order.
    pub fn centers(&self) -> Vec<f64> {
        self.boundaries
            .windows(2)
            .map(|pair| pair[0] + (pair[1] - pair[0]) / 2.0)
            .collect()
    }

    /// Width of voxel `index`.
    pub fn voxel_size(&self, index: usize) -> Option<f64> {
        let lower = self.boundaries.get(index)?;
        let upper = self.boundaries.get(index + 1)?;
        Some((upper - lower).abs())
    }

    pub fn contains(&self, pos: f64) -> bool {
        pos >= self.min() && pos <= self.max()
    }

    /// Bins `pos` into `[0, voxel_count - 1]`, using the interior
    /// boundaries as breakpoints. Positions off the grid land in the
    /// nearest edge voxel.
    pub fn voxel_index(&self, pos: f64) -> usize {
        let interior = &self.ascending[1..self.ascending.len() - 1];
        let bin = interior.partition_point(|threshold| *threshold <= pos);
        if self.reversed {
            self.voxel_count() - 1 - bin
        } else {
            bin
        }
    }

    /// Maps `pos` linearly from `[first, last]` onto `[0, voxel_count - 1]`,
    /// rounds it and clamps it to a valid voxel index.
    pub fn slice_index(&self, pos: f64) -> usize {
        let last_slice = (self.voxel_count() - 1) as f64;
        let scaled = (pos - self.first()) / (self.last() - self.first()) * last_slice;
        // NaN saturates to 0 on the cast
        scaled.round().clamp(0.0, last_slice) as usize
    }

    /// Same voxel count and the same first and last boundary.
    pub fn same_extent(&self, other: &AxisGrid) -> bool {
        self.boundaries.len() == other.boundaries.len()
            && self.first() == other.first()
            && self.last() == other.last()
    }
}

/// The three boundary grids of a volume.
#[derive(Debug, Clone, PartialEq)]
pub struct CoordinateGrid {
    axes: [AxisGrid; 3],
}

impl CoordinateGrid {
    pub fn new(x: Vec<f64>, y: Vec<f64>, z: Vec<f64>) -> Result<Self, GridError> {
        Ok(Self {
            axes: [
                AxisGrid::new(Dim::X, x)?,
                AxisGrid::new(Dim::Y, y)?,
                AxisGrid::new(Dim::Z, z)?,
            ],
        })
    }

    pub fn from_axes(x: AxisGrid, y: AxisGrid, z: AxisGrid) -> Self {
        Self { axes: [x, y, z] }
    }

    #[inline]
    pub fn axis(&self, dim: Dim) -> &AxisGrid {
        &self.axes[dim.index()]
    }

    /// Voxel counts as `(nx, ny, nz)`.
    pub fn voxel_counts(&self) -> (usize, usize, usize) {
        (
            self.axes[0].voxel_count(),
            self.axes[1].voxel_count(),
            self.axes[2].voxel_count(),
        )
    }

    pub fn voxel_total(&self) -> usize {
        let (nx, ny, nz) = self.voxel_counts();
        nx * ny * nz
    }

    /// Flat address of voxel `(i, j, k)`, x varying fastest.
    #[inline]
    pub fn address(&self, [i, j, k]: [usize; 3]) -> usize {
        let (nx, ny, _) = self.voxel_counts();
        i + nx * (j + k * ny)
    }

    pub fn world_to_voxel_index(&self, dim: Dim, pos: f64) -> usize {
        self.axis(dim).voxel_index(pos)
    }

    pub fn world_to_voxel_coords(&self, [x, y, z]: [f64; 3]) -> [usize; 3] {
        [
            self.axes[0].voxel_index(x),
            self.axes[1].voxel_index(y),
            self.axes[2].voxel_index(z),
        ]
    }

    /// Index of the slice of `axis` nearest to the world position `pos`
    /// along the axis' orthogonal dimension.
    pub fn slice_index_for_position(&self, axis: Axis, pos: f64) -> usize {
        self.axis(axis.orthogonal()).slice_index(pos)
    }

    /// Total slices available along the orthogonal dimension of `axis`.
    pub fn slice_count(&self, axis: Axis) -> usize {
        self.axis(axis.orthogonal()).voxel_count()
    }

    pub fn contains(&self, [x, y, z]: [f64; 3]) -> bool {
        self.axes[0].contains(x) && self.axes[1].contains(y) && self.axes[2].contains(z)
    }

    pub fn voxel_centers(&self) -> [Vec<f64>; 3] {
        [
            self.axes[0].centers(),
            self.axes[1].centers(),
            self.axes[2].centers(),
        ]
    }

    /// Whether two grids can be combined voxel by voxel.
    pub fn same_extent(&self, other: &CoordinateGrid) -> bool {
        self.axes
            .iter()
            .zip(other.axes.iter())
            .all(|(a, b)| a.same_extent(b))
    }
}

/// Splits `[lo, hi]` into `count` equal bins and returns the bin holding
/// `value`, clamped to `[0, count - 1]`.
pub fn quantize(value: f64, lo: f64, hi: f64, count: usize) -> usize {
    if count <= 1 || hi <= lo {
        return 0;
    }
    let bin = ((value - lo) / (hi - lo) * count as f64).floor();
    bin.clamp(0.0, (count - 1) as f64) as usize
}
