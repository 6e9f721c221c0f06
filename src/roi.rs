//! Region-of-interest contours and their voxel masks.
//!
//! Each ROI gets its own grid: a fixed in-plane pitch over the bounding box
//! of its contour points, and one z layer per contoured slice. Polygons are
//! filled onto that grid with an even-odd scanline fill.

use log::{debug, warn};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::enums::{Axis, Dim};
use crate::field::{Slice, VolumeField};
use crate::grid::quantize;
use crate::slicer::extract_slice;

pub const DEFAULT_PITCH: f64 = 0.2;
/// Finest accepted in-plane pitch in cm.
pub const MIN_PITCH: f64 = 0.01;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum RoiError {
    #[error("ROI pitch must be a finite value of at least 0.01 cm, got {pitch}")]
    InvalidPitch { pitch: f64 },
}

/// The closed polygons drawn on one axial slice, vertices in cm.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContourSlice {
    pub z: f64,
    pub polygons: Vec<Vec<[f64; 2]>>,
}

/// An ROI as read from a structure set.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoiData {
    pub label: String,
    /// RGB display colour.
    pub colour: [u8; 3],
    pub contours: Vec<ContourSlice>,
}

/// Voxel centers of an ROI mask.
#[derive(Debug, Clone, PartialEq)]
pub struct RoiGrid {
    centers: [Vec<f64>; 3],
    pitch: [f64; 3],
}

impl RoiGrid {
    pub fn centers(&self, dim: Dim) -> &[f64] {
        &self.centers[dim.index()]
    }

    pub fn pitch(&self, dim: Dim) -> f64 {
        self.pitch[dim.index()]
    }

    /// Voxel counts as `(nx, ny, nz)`.
    pub fn voxel_counts(&self) -> (usize, usize, usize) {
        (
            self.centers[0].len(),
            self.centers[1].len(),
            self.centers[2].len(),
        )
    }

    /// Covered interval along `dim`: half a pitch beyond the outer centers.
    pub fn domain(&self, dim: Dim) -> (f64, f64) {
        let centers = self.centers(dim);
        let half = self.pitch(dim) / 2.0;
        match (centers.first(), centers.last()) {
            (Some(first), Some(last)) => (first - half, last + half),
            _ => (0.0, 0.0),
        }
    }

    pub fn index_for_position(&self, dim: Dim, pos: f64) -> usize {
        let (lo, hi) = self.domain(dim);
        quantize(pos, lo, hi, self.centers(dim).len())
    }

    /// World position of voxel `[i, j, k]`.
    pub fn position(&self, [i, j, k]: [usize; 3]) -> Option<[f64; 3]> {
        Some([
            *self.centers[0].get(i)?,
            *self.centers[1].get(j)?,
            *self.centers[2].get(k)?,
        ])
    }
}

/// A rasterized ROI.
#[derive(Debug, Clone)]
pub struct RoiOutline {
    pub label: String,
    pub colour: [u8; 3],
    /// Contours sorted by z, one entry per distinct z.
    pub contours: Vec<ContourSlice>,
    pub grid: RoiGrid,
    /// 1 inside the ROI, 0 outside.
    pub mask: VolumeField<u8>,
}

impl RoiOutline {
    /// Number of voxels inside the ROI.
    pub fn voxel_count(&self) -> usize {
        self.mask.iter().filter(|v| **v == 1).count()
    }
}

#[derive(Debug, Clone, Copy)]
struct Edge {
    x0: f64,
    y0: f64,
    x1: f64,
    y1: f64,
}

impl Edge {
    /// Half-open in y so a vertex shared by two edges is crossed once.
    #[inline]
    fn spans(&self, y: f64) -> bool {
        (y >= self.y0 && y < self.y1) || (y >= self.y1 && y < self.y0)
    }

    #[inline]
    fn x_at(&self, y: f64) -> f64 {
        self.x0 + (y - self.y0) * (self.x1 - self.x0) / (self.y1 - self.y0)
    }
}

#[derive(Debug, Clone, Copy)]
pub struct RoiRasterizer {
    pitch: f64,
}

impl Default for RoiRasterizer {
    fn default() -> Self {
        Self {
            pitch: DEFAULT_PITCH,
        }
    }
}

impl RoiRasterizer {
    pub fn new(pitch: f64) -> Result<Self, RoiError> {
        if !(pitch.is_finite() && pitch >= MIN_PITCH) {
            return Err(RoiError::InvalidPitch { pitch });
        }
        Ok(Self { pitch })
    }

    pub fn pitch(&self) -> f64 {
        self.pitch
    }

    /// Builds the grid and mask of one ROI. Returns `None` when the ROI has
    /// no contour points.
    pub fn rasterize(&self, roi: &RoiData) -> Option<RoiOutline> {
        let contours = Self::merge_by_z(&roi.contours);
        let grid = self.build_grid(&contours)?;
        let (nx, ny, nz) = grid.voxel_counts();

        let layers: Vec<Vec<u8>> = contours
            .par_iter()
            .map(|contour| {
                let mut layer = vec![0u8; nx * ny];
                for polygon in &contour.polygons {
                    Self::fill_polygon(&mut layer, polygon, &grid);
                }
                layer
            })
            .collect();

        let mask = VolumeField::from_flat((nx, ny, nz), layers.concat()).ok()?;
        debug!(
            "rasterized ROI {} onto {nx}x{ny}x{nz} voxels",
            roi.label
        );
        Some(RoiOutline {
            label: roi.label.clone(),
            colour: roi.colour,
            contours,
            grid,
            mask,
        })
    }

    fn merge_by_z(contours: &[ContourSlice]) -> Vec<ContourSlice> {
        let mut sorted: Vec<&ContourSlice> = contours.iter().collect();
        sorted.sort_by(|a, b| a.z.total_cmp(&b.z));

        let mut merged: Vec<ContourSlice> = Vec::with_capacity(sorted.len());
        for contour in sorted {
            match merged.last_mut() {
                Some(last) if last.z == contour.z => {
                    last.polygons.extend(contour.polygons.iter().cloned())
                }
                _ => merged.push(contour.clone()),
            }
        }
        merged
    }

    fn build_grid(&self, contours: &[ContourSlice]) -> Option<RoiGrid> {
        let points = contours
            .iter()
            .flat_map(|contour| contour.polygons.iter().flatten());
        let (mut x_min, mut x_max) = (f64::INFINITY, f64::NEG_INFINITY);
        let (mut y_min, mut y_max) = (f64::INFINITY, f64::NEG_INFINITY);
        for [x, y] in points {
            x_min = x_min.min(*x);
            x_max = x_max.max(*x);
            y_min = y_min.min(*y);
            y_max = y_max.max(*y);
        }
        if !(x_min <= x_max && y_min <= y_max) {
            return None;
        }

        let z: Vec<f64> = contours.iter().map(|contour| contour.z).collect();
        let z_pitch = match (z.first(), z.last()) {
            (Some(first), Some(last)) => (last - first) / z.len() as f64,
            _ => return None,
        };

        Some(RoiGrid {
            centers: [
                self.snapped_centers(x_min, x_max),
                self.snapped_centers(y_min, y_max),
                z,
            ],
            pitch: [self.pitch, self.pitch, z_pitch],
        })
    }

    /// Centers at exact multiples of the pitch covering `[min, max]`.
    fn snapped_centers(&self, min: f64, max: f64) -> Vec<f64> {
        let divider = 1.0 / self.pitch;
        let start = (min * divider).floor() / divider;
        let end = (max * divider).ceil() / divider;
        let items = ((end - start) / self.pitch).round() as usize;
        (0..=items).map(|n| start + self.pitch * n as f64).collect()
    }

    /// Even-odd scanline fill of one polygon into a `nx * ny` layer.
    /// Voxels already set stay set.
    fn fill_polygon(layer: &mut [u8], polygon: &[[f64; 2]], grid: &RoiGrid) {
        if polygon.len() < 3 {
            warn!("skipping contour with {} points", polygon.len());
            return;
        }

        let edges: Vec<Edge> = polygon
            .iter()
            .zip(polygon.iter().cycle().skip(1))
            .map(|(start, end)| Edge {
                x0: start[0],
                y0: start[1],
                x1: end[0],
                y1: end[1],
            })
            .collect();

        let (y_min, y_max) = polygon
            .iter()
            .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), p| {
                (lo.min(p[1]), hi.max(p[1]))
            });

        let nx = grid.centers(Dim::X).len();
        let (x_lo, x_hi) = grid.domain(Dim::X);
        let mut crossings = Vec::new();

        for (j, &y) in grid.centers(Dim::Y).iter().enumerate() {
            if y < y_min || y > y_max {
                continue;
            }

            crossings.clear();
            crossings.extend(edges.iter().filter(|e| e.spans(y)).map(|e| e.x_at(y)));
            crossings.sort_by(|a, b| a.total_cmp(b));

            for pair in crossings.chunks_exact(2) {
                let start = quantize(pair[0], x_lo, x_hi, nx);
                let end = quantize(pair[1], x_lo, x_hi, nx);
                for i in start..=end {
                    layer[i + nx * j] = 1;
                }
            }
        }
    }
}

/// A 2D cut through one ROI mask.
#[derive(Debug, Clone)]
pub struct RoiSlice {
    pub label: String,
    pub colour: [u8; 3],
    pub slice: Slice<u8>,
    /// First and last voxel center along the horizontal dimension.
    pub x_range: (f64, f64),
    /// First and last voxel center along the vertical dimension.
    pub y_range: (f64, f64),
}

/// All rasterized ROIs of a structure set.
#[derive(Debug, Clone, Default)]
pub struct StructureSet {
    pub outlines: Vec<RoiOutline>,
}

impl StructureSet {
    /// Rasterizes every ROI that has contour data.
    pub fn new(rois: &[RoiData], rasterizer: &RoiRasterizer) -> Self {
        let outlines = rois
            .iter()
            .filter_map(|roi| rasterizer.rasterize(roi))
            .collect();
        Self { outlines }
    }

    /// The mask slice of every ROI whose extent strictly contains
    /// `slice_pos` along the orthogonal dimension of `axis`.
    pub fn slices(&self, axis: Axis, slice_pos: f64) -> Vec<RoiSlice> {
        let (horizontal, vertical, orthogonal) = axis.dims();
        let range = |centers: &[f64]| match (centers.first(), centers.last()) {
            (Some(first), Some(last)) => (*first, *last),
            _ => (0.0, 0.0),
        };

        self.outlines
            .iter()
            .filter(|outline| {
                let (lo, hi) = outline.grid.domain(orthogonal);
                slice_pos > lo && slice_pos < hi
            })
            .map(|outline| {
                let index = outline.grid.index_for_position(orthogonal, slice_pos);
                RoiSlice {
                    label: outline.label.clone(),
                    colour: outline.colour,
                    slice: extract_slice(&outline.mask, axis, index),
                    x_range: range(outline.grid.centers(horizontal)),
                    y_range: range(outline.grid.centers(vertical)),
                }
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    fn roi(contours: Vec<ContourSlice>) -> RoiData {
        RoiData {
            label: "PTV".into(),
            colour: [255, 0, 0],
            contours,
        }
    }

    fn square(x: f64, y: f64, side: f64) -> Vec<[f64; 2]> {
        vec![[x, y], [x + side, y], [x + side, y + side], [x, y + side]]
    }

    #[test]
    fn pitch_must_be_finite_and_positive() {
        for pitch in [0.0, -0.2, f64::NAN, f64::INFINITY, 1e-9] {
            assert!(
                matches!(RoiRasterizer::new(pitch), Err(RoiError::InvalidPitch { .. })),
                "{pitch}"
            );
        }
        assert_eq!(RoiRasterizer::new(0.5).map(|r| r.pitch()), Ok(0.5));
    }

    #[test]
    fn grid_snaps_to_pitch_and_uses_contour_z() {
        let data = roi(vec![
            ContourSlice {
                z: 1.0,
                polygons: vec![square(0.05, 0.1, 0.5)],
            },
            ContourSlice {
                z: 0.5,
                polygons: vec![square(0.0, 0.0, 0.3)],
            },
        ]);
        let outline = RoiRasterizer::default().rasterize(&data).unwrap();

        let x = outline.grid.centers(Dim::X);
        assert_eq!(x.len(), 4);
        assert_abs_diff_eq!(x[0], 0.0);
        assert_abs_diff_eq!(x[3], 0.6, epsilon = 1e-12);
        assert_eq!(outline.grid.centers(Dim::Z), &[0.5, 1.0]);
        assert_eq!(outline.contours[0].z, 0.5);
    }

    #[test]
    fn contours_on_the_same_z_are_merged() {
        let data = roi(vec![
            ContourSlice {
                z: 0.0,
                polygons: vec![square(0.0, 0.0, 0.4)],
            },
            ContourSlice {
                z: 0.0,
                polygons: vec![square(1.0, 0.0, 0.4)],
            },
        ]);
        let outline = RoiRasterizer::default().rasterize(&data).unwrap();
        assert_eq!(outline.contours.len(), 1);
        assert_eq!(outline.contours[0].polygons.len(), 2);
        assert_eq!(outline.mask.dim().2, 1);
    }

    #[test]
    fn disjoint_polygons_leave_a_gap() {
        let data = roi(vec![ContourSlice {
            z: 0.0,
            polygons: vec![square(0.0, 0.0, 0.4), square(1.0, 0.0, 0.4)],
        }]);
        let outline = RoiRasterizer::default().rasterize(&data).unwrap();
        // x centers 0.0 ..= 1.4, y centers 0.0 ..= 0.4
        for j in 0..2 {
            for i in 0..3 {
                assert_eq!(outline.mask.get([i, j, 0]), Some(1), "left ({i}, {j})");
            }
            for i in 5..8 {
                assert_eq!(outline.mask.get([i, j, 0]), Some(1), "right ({i}, {j})");
            }
            assert_eq!(outline.mask.get([4, j, 0]), Some(0), "gap row {j}");
        }
    }

    #[test]
    fn nested_polygons_union() {
        let data = roi(vec![ContourSlice {
            z: 0.0,
            polygons: vec![square(0.0, 0.0, 1.0), square(0.4, 0.4, 0.2)],
        }]);
        let outline = RoiRasterizer::default().rasterize(&data).unwrap();
        assert_eq!(outline.mask.get([2, 2, 0]), Some(1));
    }

    #[test]
    fn degenerate_polygons_fill_nothing() {
        let data = roi(vec![ContourSlice {
            z: 0.0,
            polygons: vec![vec![[0.0, 0.0], [1.0, 1.0]]],
        }]);
        let outline = RoiRasterizer::default().rasterize(&data).unwrap();
        assert_eq!(outline.voxel_count(), 0);
    }

    #[test]
    fn roi_without_points_is_skipped() {
        let set = StructureSet::new(&[roi(vec![])], &RoiRasterizer::default());
        assert!(set.outlines.is_empty());
    }

    #[test]
    fn slices_only_include_rois_at_the_position() {
        let data = roi(vec![
            ContourSlice {
                z: 0.0,
                polygons: vec![square(0.0, 0.0, 1.0)],
            },
            ContourSlice {
                z: 1.0,
                polygons: vec![square(0.0, 0.0, 1.0)],
            },
        ]);
        let set = StructureSet::new(&[data], &RoiRasterizer::default());

        let slices = set.slices(Axis::Xy, 0.9);
        assert_eq!(slices.len(), 1);
        assert_eq!(slices[0].slice.slice_index, 1);
        assert_eq!((slices[0].slice.x_voxels, slices[0].slice.y_voxels), (6, 6));
        assert_eq!(slices[0].x_range, (0.0, 1.0));

        assert!(set.slices(Axis::Xy, 3.0).is_empty());
        assert_eq!(set.slices(Axis::Yz, 0.5).len(), 1);
    }
}
