//! Mapping between world coordinates, plot pixels and slice voxels.

use serde::Serialize;

use crate::enums::Axis;
use crate::grid::{CoordinateGrid, quantize};

/// A continuous linear map from `domain` onto `range`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct LinearScale {
    pub domain: (f64, f64),
    pub range: (f64, f64),
}

impl LinearScale {
    pub fn new(domain: (f64, f64), range: (f64, f64)) -> Self {
        Self { domain, range }
    }

    #[inline]
    pub fn apply(&self, value: f64) -> f64 {
        let (d0, d1) = self.domain;
        let (r0, r1) = self.range;
        if d1 == d0 {
            return (r0 + r1) / 2.0;
        }
        r0 + (value - d0) / (d1 - d0) * (r1 - r0)
    }

    #[inline]
    pub fn invert(&self, value: f64) -> f64 {
        Self::new(self.range, self.domain).apply(value)
    }
}

/// Pixel rectangle a slice is drawn into.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct DrawRect {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

/// Screen geometry of one slice axis in a `width` x `height` pixel plot.
///
/// World lengths keep their aspect ratio. In the xy plane y grows
/// downwards, in the other planes the vertical dimension grows upwards.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SliceGeometry {
    pub axis: Axis,
    pub x_voxels: usize,
    pub y_voxels: usize,
    /// Horizontal in-plane world coordinate to pixels.
    pub x_scale: LinearScale,
    /// Vertical in-plane world coordinate to pixels.
    pub y_scale: LinearScale,
    /// Pixel positions of the first and last horizontal boundary.
    x_range: (f64, f64),
    /// Pixel positions of the first and last vertical boundary.
    y_range: (f64, f64),
}

impl SliceGeometry {
    /// With `snap_to_pixels` the drawn rectangle is rounded to whole pixels,
    /// which dose plots use so contours line up with the image.
    pub fn new(
        grid: &CoordinateGrid,
        axis: Axis,
        width: f64,
        height: f64,
        snap_to_pixels: bool,
    ) -> Self {
        let (dim_x, dim_y, _) = axis.dims();
        let (gx, gy) = (grid.axis(dim_x), grid.axis(dim_y));
        let (x_len, y_len) = (gx.length(), gy.length());
        let y_down = axis == Axis::Xy;

        let (x_domain, y_domain) = if x_len > y_len {
            let y_domain = if y_down {
                (gy.last(), gy.last() - x_len)
            } else {
                (gy.last() - x_len, gy.last())
            };
            ((gx.first(), gx.last()), y_domain)
        } else {
            let y_domain = if y_down {
                (gy.last(), gy.first())
            } else {
                (gy.first(), gy.last())
            };
            ((gx.first(), gx.first() + y_len), y_domain)
        };

        let x_scale = LinearScale::new(x_domain, (0.0, width));
        let y_scale = LinearScale::new(y_domain, (height, 0.0));

        let snap = |v: f64| if snap_to_pixels { v.round() } else { v };
        let x_range = (snap(x_scale.apply(gx.first())), snap(x_scale.apply(gx.last())));
        let y_range = (snap(y_scale.apply(gy.first())), snap(y_scale.apply(gy.last())));

        Self {
            axis,
            x_voxels: gx.voxel_count(),
            y_voxels: gy.voxel_count(),
            x_scale,
            y_scale,
            x_range,
            y_range,
        }
    }

    pub fn world_to_pixel(&self, [x, y]: [f64; 2]) -> [f64; 2] {
        [self.x_scale.apply(x), self.y_scale.apply(y)]
    }

    pub fn pixel_to_world(&self, [px, py]: [f64; 2]) -> [f64; 2] {
        [self.x_scale.invert(px), self.y_scale.invert(py)]
    }

    /// In-plane voxel under a pixel. Pixels outside the drawn rectangle
    /// land on the nearest edge voxel.
    pub fn pixel_to_voxel(&self, [px, py]: [f64; 2]) -> [usize; 2] {
        let (x_lo, x_hi) = min_max(self.x_range);
        let (y_lo, y_hi) = min_max(self.y_range);
        let i = quantize(px, x_lo, x_hi, self.x_voxels);
        let row = quantize(py, y_lo, y_hi, self.y_voxels);
        let j = match self.axis {
            Axis::Xy => row,
            Axis::Yz | Axis::Xz => self.y_voxels - 1 - row,
        };
        [i, j]
    }

    /// Pixel position of a fractional voxel coordinate, where `0` is the
    /// first boundary and `x_voxels` the last.
    pub fn voxel_to_pixel(&self, [vx, vy]: [f64; 2]) -> [f64; 2] {
        let x = LinearScale::new((0.0, self.x_voxels as f64), self.x_range);
        let y = LinearScale::new((0.0, self.y_voxels as f64), self.y_range);
        [x.apply(vx), y.apply(vy)]
    }

    pub fn draw_rect(&self) -> DrawRect {
        let (x_lo, x_hi) = min_max(self.x_range);
        let (y_lo, y_hi) = min_max(self.y_range);
        DrawRect {
            x: x_lo,
            y: y_lo,
            width: x_hi - x_lo,
            height: y_hi - y_lo,
        }
    }
}

fn min_max((a, b): (f64, f64)) -> (f64, f64) {
    if a <= b { (a, b) } else { (b, a) }
}
