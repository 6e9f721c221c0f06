use ndarray::{Array3, ArrayView2, ArrayView3, ShapeError};

/// A value stored in a [`VolumeField`] that can be read as a dose or
/// density sample. `None` means "no data", which is distinct from zero.
pub trait FieldValue: Copy + Send + Sync + 'static {
    fn sample(self) -> Option<f64>;
}

impl FieldValue for f64 {
    #[inline]
    fn sample(self) -> Option<f64> {
        Some(self)
    }
}

impl FieldValue for Option<f64> {
    #[inline]
    fn sample(self) -> Option<f64> {
        self
    }
}

impl FieldValue for u8 {
    #[inline]
    fn sample(self) -> Option<f64> {
        Some(f64::from(self))
    }
}

/// A scalar volume stored as `(nz, ny, nx)`, so the flat standard-layout
/// order is `i + nx * (j + k * ny)`.
#[derive(Debug, Clone, PartialEq)]
pub struct VolumeField<T> {
    data: Array3<T>,
}

impl<T: Copy> VolumeField<T> {
    /// Wraps a flat array of `nx * ny * nz` values.
    pub fn from_flat(
        (nx, ny, nz): (usize, usize, usize),
        values: Vec<T>,
    ) -> Result<Self, ShapeError> {
        let data = Array3::from_shape_vec((nz, ny, nx), values)?;
        Ok(Self { data })
    }

    pub fn from_elem((nx, ny, nz): (usize, usize, usize), value: T) -> Self {
        Self {
            data: Array3::from_elem((nz, ny, nx), value),
        }
    }

    pub fn from_array(data: Array3<T>) -> Self {
        Self { data }
    }

    /// Voxel counts as `(nx, ny, nz)`.
    pub fn dim(&self) -> (usize, usize, usize) {
        let (nz, ny, nx) = self.data.dim();
        (nx, ny, nz)
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// The underlying array, indexed `[[k, j, i]]`.
    pub fn view(&self) -> ArrayView3<'_, T> {
        self.data.view()
    }

    pub fn array_mut(&mut self) -> &mut Array3<T> {
        &mut self.data
    }

    #[inline]
    pub fn get(&self, [i, j, k]: [usize; 3]) -> Option<T> {
        self.data.get((k, j, i)).copied()
    }

    /// Value at a flat address.
    pub fn at_address(&self, address: usize) -> Option<T> {
        let (nx, ny, _) = self.dim();
        if nx == 0 || ny == 0 {
            return None;
        }
        let i = address % nx;
        let j = (address / nx) % ny;
        let k = address / (nx * ny);
        self.get([i, j, k])
    }

    /// Converts a flat address into `[i, j, k]`.
    pub fn coords_of(&self, address: usize) -> [usize; 3] {
        let (nx, ny, _) = self.dim();
        let k = address / (nx * ny);
        let rest = address - k * nx * ny;
        [rest % nx, rest / nx, k]
    }

    pub fn iter(&self) -> impl Iterator<Item = &T> {
        self.data.iter()
    }

    pub fn map<U, F>(&self, f: F) -> VolumeField<U>
    where
        F: FnMut(&T) -> U,
    {
        VolumeField {
            data: self.data.map(f),
        }
    }

    pub fn to_vec(&self) -> Vec<T> {
        self.data.iter().copied().collect()
    }
}

impl<T: FieldValue> VolumeField<T> {
    /// Largest defined sample, if any.
    pub fn max_sample(&self) -> Option<f64> {
        self.data
            .iter()
            .filter_map(|v| v.sample())
            .fold(None, |max, v| Some(max.map_or(v, |m: f64| m.max(v))))
    }
}

/// A 2D cut through a [`VolumeField`], addressed `i + x_voxels * j`.
#[derive(Debug, Clone, PartialEq)]
pub struct Slice<T> {
    pub axis: crate::enums::Axis,
    /// Index of the slice along the orthogonal dimension.
    pub slice_index: usize,
    pub x_voxels: usize,
    pub y_voxels: usize,
    pub data: Vec<T>,
}

impl<T: Copy> Slice<T> {
    #[inline]
    pub fn get(&self, i: usize, j: usize) -> Option<T> {
        if i >= self.x_voxels || j >= self.y_voxels {
            return None;
        }
        self.data.get(i + self.x_voxels * j).copied()
    }

    /// The slice as a `(y_voxels, x_voxels)` array.
    pub fn view(&self) -> Result<ArrayView2<'_, T>, ShapeError> {
        ArrayView2::from_shape((self.y_voxels, self.x_voxels), &self.data)
    }
}
