use std::collections::HashMap;
use std::sync::Arc;

use log::debug;
use ndarray::s;

use crate::enums::Axis;
use crate::field::{Slice, VolumeField};

/// Cuts the plane `slice_index` of `axis` out of `field`.
///
/// The in-plane indices `(i, j)` read the source address
/// - xy: `i + nx * (j + index * ny)`
/// - yz: `index + nx * (i + j * ny)`
/// - xz: `i + nx * (index + j * ny)`
///
/// and land at `i + x_voxels * j`. An index past the last slice is clamped
/// to it, so callers always get a slice.
pub fn extract_slice<T: Copy>(field: &VolumeField<T>, axis: Axis, slice_index: usize) -> Slice<T> {
    let (nx, ny, nz) = field.dim();
    let data = field.view();

    let (slice_index, plane) = match axis {
        Axis::Xy => {
            let index = slice_index.min(nz.saturating_sub(1));
            (index, data.slice(s![index, .., ..]))
        }
        Axis::Yz => {
            let index = slice_index.min(nx.saturating_sub(1));
            (index, data.slice(s![.., .., index]))
        }
        Axis::Xz => {
            let index = slice_index.min(ny.saturating_sub(1));
            (index, data.slice(s![.., index, ..]))
        }
    };

    // rows run along the vertical in-plane dimension
    let (y_voxels, x_voxels) = plane.dim();
    Slice {
        axis,
        slice_index,
        x_voxels,
        y_voxels,
        data: plane.iter().copied().collect(),
    }
}

/// Memoized slices of one field, keyed by `(axis, slice index)`.
///
/// The cache does not watch its field; whoever changes the field clears it.
#[derive(Debug)]
pub struct SliceCache<T> {
    slices: HashMap<(Axis, usize), Arc<Slice<T>>>,
}

impl<T> Default for SliceCache<T> {
    fn default() -> Self {
        Self {
            slices: HashMap::new(),
        }
    }
}

impl<T: Copy> SliceCache<T> {
    pub fn get_or_extract(
        &mut self,
        field: &VolumeField<T>,
        axis: Axis,
        slice_index: usize,
    ) -> Arc<Slice<T>> {
        self.slices
            .entry((axis, slice_index))
            .or_insert_with(|| {
                debug!("slice cache miss for {axis} slice {slice_index}");
                Arc::new(extract_slice(field, axis, slice_index))
            })
            .clone()
    }

    pub fn contains(&self, axis: Axis, slice_index: usize) -> bool {
        self.slices.contains_key(&(axis, slice_index))
    }

    pub fn len(&self) -> usize {
        self.slices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slices.is_empty()
    }

    pub fn clear(&mut self) {
        self.slices.clear();
    }
}
