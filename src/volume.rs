use std::sync::Arc;

use serde::Serialize;
use thiserror::Error;

use crate::enums::{Axis, Dim};
use crate::field::{FieldValue, Slice, VolumeField};
use crate::grid::{CoordinateGrid, GridError};
use crate::image_cache::DensityColourMap;
use crate::slicer::SliceCache;

#[derive(Debug, Error)]
pub enum VolumeError {
    #[error("Invalid voxel grid: {0}")]
    Grid(#[from] GridError),

    #[error("{dim} declares {declared} voxels but has {boundaries} boundaries")]
    VoxelCountMismatch {
        dim: Dim,
        declared: usize,
        boundaries: usize,
    },

    #[error("Volume data has no {0} array")]
    MissingField(&'static str),

    #[error("Field has {actual} values, grid needs {expected}")]
    FieldLength { expected: usize, actual: usize },

    #[error("Error array has {actual} values, dose needs {expected}")]
    ErrorLength { expected: usize, actual: usize },

    #[error("Maximum must be positive, got {value}")]
    NonPositiveMaximum { value: f64 },
}

/// A scalar field on its coordinate grid, with memoized slices.
#[derive(Debug)]
pub struct Volume<T> {
    grid: CoordinateGrid,
    field: Arc<VolumeField<T>>,
    slice_cache: SliceCache<T>,
}

impl<T: Copy> Volume<T> {
    pub fn new(grid: CoordinateGrid, field: VolumeField<T>) -> Result<Self, VolumeError> {
        Self::check_field(&grid, &field)?;
        Ok(Self {
            grid,
            field: Arc::new(field),
            slice_cache: SliceCache::default(),
        })
    }

    fn check_field(grid: &CoordinateGrid, field: &VolumeField<T>) -> Result<(), VolumeError> {
        if field.dim() != grid.voxel_counts() {
            return Err(VolumeError::FieldLength {
                expected: grid.voxel_total(),
                actual: field.len(),
            });
        }
        Ok(())
    }

    pub fn grid(&self) -> &CoordinateGrid {
        &self.grid
    }

    pub fn field(&self) -> &VolumeField<T> {
        &self.field
    }

    /// A handle to the field that outlives borrows of the volume.
    pub fn shared_field(&self) -> Arc<VolumeField<T>> {
        Arc::clone(&self.field)
    }

    /// Voxel counts as `(nx, ny, nz)`.
    pub fn dim(&self) -> (usize, usize, usize) {
        self.grid.voxel_counts()
    }

    /// Swaps in new data on the same grid and drops every cached slice.
    pub fn replace_field(&mut self, field: VolumeField<T>) -> Result<(), VolumeError> {
        Self::check_field(&self.grid, &field)?;
        self.field = Arc::new(field);
        self.slice_cache.clear();
        Ok(())
    }

    /// The slice of `axis` nearest to the world position `slice_pos`.
    pub fn get_slice(&mut self, axis: Axis, slice_pos: f64) -> Arc<Slice<T>> {
        let index = self.grid.slice_index_for_position(axis, slice_pos);
        self.get_slice_at_index(axis, index)
    }

    pub fn get_slice_at_index(&mut self, axis: Axis, index: usize) -> Arc<Slice<T>> {
        self.slice_cache.get_or_extract(&self.field, axis, index)
    }

    pub fn slice_cache(&self) -> &SliceCache<T> {
        &self.slice_cache
    }

    pub fn clear_cache(&mut self) {
        self.slice_cache.clear();
    }

    pub fn get_data_at_voxel_coords(&self, coords: [usize; 3]) -> Option<T> {
        self.field.get(coords)
    }

    pub fn world_to_voxel_coords(&self, coords: [f64; 3]) -> [usize; 3] {
        self.grid.world_to_voxel_coords(coords)
    }

    /// Value of the voxel nearest to `coords`; positions off the grid read
    /// the edge voxel.
    pub fn get_data_at_world_position(&self, coords: [f64; 3]) -> Option<T> {
        self.get_data_at_voxel_coords(self.world_to_voxel_coords(coords))
    }
}

impl<T: FieldValue> Volume<T> {
    /// Like [`Volume::get_data_at_world_position`] but `None` for positions
    /// outside the grid.
    pub fn sample_at_world_position(&self, coords: [f64; 3]) -> Option<f64> {
        if !self.grid.contains(coords) {
            return None;
        }
        self.get_data_at_world_position(coords)?.sample()
    }
}

/// Per-voxel material of a phantom. Material numbers are 1-based indices
/// into `names`.
#[derive(Debug, Clone)]
pub struct MaterialMap {
    pub names: Vec<String>,
    pub indices: VolumeField<u8>,
}

/// A density volume (egsphant or CT).
#[derive(Debug)]
pub struct DensityVolume {
    pub volume: Volume<f64>,
    pub min_density: f64,
    pub max_density: f64,
    pub materials: Option<MaterialMap>,
}

impl DensityVolume {
    pub fn get_slice(&mut self, axis: Axis, slice_pos: f64) -> Arc<Slice<f64>> {
        self.volume.get_slice(axis, slice_pos)
    }

    pub fn get_data_at_voxel_coords(&self, coords: [usize; 3]) -> Option<f64> {
        self.volume.get_data_at_voxel_coords(coords)
    }

    pub fn get_data_at_world_position(&self, coords: [f64; 3]) -> Option<f64> {
        self.volume.get_data_at_world_position(coords)
    }

    pub fn colour_map(&self) -> DensityColourMap {
        DensityColourMap::new(self.min_density, self.max_density)
    }

    /// Material name at `coords`, if the volume carries materials.
    pub fn material_at_voxel_coords(&self, coords: [usize; 3]) -> Option<&str> {
        let materials = self.materials.as_ref()?;
        let number = usize::from(materials.indices.get(coords)?);
        materials
            .names
            .get(number.checked_sub(1)?)
            .map(String::as_str)
    }
}

/// One point of a dose profile.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ProfilePoint {
    pub position: f64,
    pub value: f64,
    pub error: f64,
}

/// A dose volume (3ddose or RT dose).
#[derive(Debug)]
pub struct DoseVolume {
    pub volume: Volume<f64>,
    pub max_dose: f64,
    pub error: Option<VolumeField<f64>>,
}

impl DoseVolume {
    pub fn grid(&self) -> &CoordinateGrid {
        self.volume.grid()
    }

    pub fn get_slice(&mut self, axis: Axis, slice_pos: f64) -> Arc<Slice<f64>> {
        self.volume.get_slice(axis, slice_pos)
    }

    pub fn get_data_at_voxel_coords(&self, coords: [usize; 3]) -> Option<f64> {
        self.volume.get_data_at_voxel_coords(coords)
    }

    pub fn get_data_at_world_position(&self, coords: [f64; 3]) -> Option<f64> {
        self.volume.get_data_at_world_position(coords)
    }

    /// Dose at `coords`, or `None` outside the dose grid.
    pub fn sample_at_world_position(&self, coords: [f64; 3]) -> Option<f64> {
        self.volume.sample_at_world_position(coords)
    }

    /// Relative error at `coords`, 0 when the volume has no error data.
    pub fn error_at_voxel_coords(&self, coords: [usize; 3]) -> f64 {
        self.error
            .as_ref()
            .and_then(|error| error.get(coords))
            .unwrap_or(0.0)
    }

    /// Dose along `dim` through the voxel line fixed by `fixed`, the voxel
    /// coordinates of the two other dimensions in x, y, z order.
    pub fn profile(&self, dim: Dim, fixed: [usize; 2]) -> Vec<ProfilePoint> {
        let [a, b] = fixed;
        self.grid()
            .axis(dim)
            .centers()
            .into_iter()
            .enumerate()
            .map(|(n, position)| {
                let coords = match dim {
                    Dim::X => [n, a, b],
                    Dim::Y => [a, n, b],
                    Dim::Z => [a, b, n],
                };
                ProfilePoint {
                    position,
                    value: self.get_data_at_voxel_coords(coords).unwrap_or(0.0),
                    error: self.error_at_voxel_coords(coords),
                }
            })
            .collect()
    }
}
