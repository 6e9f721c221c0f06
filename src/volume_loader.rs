use crate::{
    enums::Dim,
    field::VolumeField,
    grid::{AxisGrid, CoordinateGrid},
    volume::{DensityVolume, DoseVolume, MaterialMap, Volume, VolumeError},
};

use log::{debug, warn};
use serde::{Deserialize, Serialize};

/// One value per dimension.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Xyz<T> {
    pub x: T,
    pub y: T,
    pub z: T,
}

impl<T> Xyz<T> {
    pub fn get(&self, dim: Dim) -> &T {
        match dim {
            Dim::X => &self.x,
            Dim::Y => &self.y,
            Dim::Z => &self.z,
        }
    }
}

/// A parsed egsphant, 3ddose or DICOM volume, as handed over by a file
/// parser. Flat arrays are ordered x fastest, then y, then z.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VolumeData {
    pub voxel_number: Xyz<usize>,
    /// Voxel boundaries in cm, `voxel_number + 1` per dimension.
    pub voxel_arr: Xyz<Vec<f64>>,
    /// Nominal voxel size in cm. Only checked against the boundaries, which
    /// stay authoritative.
    pub voxel_size: Xyz<f64>,
    #[serde(default)]
    pub density: Option<Vec<f64>>,
    /// `null` entries are voxels without scored dose and load as zero.
    #[serde(default)]
    pub dose: Option<Vec<Option<f64>>>,
    #[serde(default)]
    pub max_dose: Option<f64>,
    #[serde(default)]
    pub max_density: Option<f64>,
    #[serde(default)]
    pub min_density: Option<f64>,
    #[serde(default)]
    pub error: Option<Vec<f64>>,
    #[serde(default)]
    pub material_list: Option<Vec<String>>,
    /// 1-based material numbers, same order as `density`.
    #[serde(default)]
    pub material: Option<Vec<u8>>,
}

pub struct VolumeLoader;

impl VolumeLoader {
    /// Build a density volume
    ///
    /// # Errors
    ///
    /// Returns error if the grid is degenerate, voxel counts disagree with
    /// the boundaries or the density array has the wrong length
    pub fn load_density(data: VolumeData) -> Result<DensityVolume, VolumeError> {
        let grid = Self::build_grid(&data)?;
        let density = data.density.ok_or(VolumeError::MissingField("density"))?;
        let field = Self::build_field(&grid, density)?;

        let (min, max) = Self::extrema(&field);
        let min_density = data.min_density.unwrap_or(min);
        let max_density = data.max_density.unwrap_or(max);

        let materials = match (data.material_list, data.material) {
            (Some(names), Some(numbers)) => Some(MaterialMap {
                names,
                indices: Self::build_field(&grid, numbers)?,
            }),
            _ => None,
        };

        debug!(
            "loaded density volume {:?}, range [{min_density}, {max_density}]",
            grid.voxel_counts()
        );
        Ok(DensityVolume {
            volume: Volume::new(grid, field)?,
            min_density,
            max_density,
            materials,
        })
    }

    /// Build a dose volume
    ///
    /// # Errors
    ///
    /// As [`VolumeLoader::load_density`], and also if the maximum dose is
    /// not positive or the error array has the wrong length
    pub fn load_dose(data: VolumeData) -> Result<DoseVolume, VolumeError> {
        let grid = Self::build_grid(&data)?;
        let dose = data.dose.ok_or(VolumeError::MissingField("dose"))?;
        let dose: Vec<f64> = dose.into_iter().map(|v| v.unwrap_or(0.0)).collect();
        let field = Self::build_field(&grid, dose)?;

        let max_dose = data.max_dose.unwrap_or(Self::extrema(&field).1);
        if !(max_dose > 0.0) {
            return Err(VolumeError::NonPositiveMaximum { value: max_dose });
        }

        let error = data
            .error
            .map(|error| {
                let expected = grid.voxel_total();
                if error.len() != expected {
                    return Err(VolumeError::ErrorLength {
                        expected,
                        actual: error.len(),
                    });
                }
                Self::build_field(&grid, error)
            })
            .transpose()?;

        debug!(
            "loaded dose volume {:?}, max dose {max_dose}",
            grid.voxel_counts()
        );
        Ok(DoseVolume {
            volume: Volume::new(grid, field)?,
            max_dose,
            error,
        })
    }

    fn build_grid(data: &VolumeData) -> Result<CoordinateGrid, VolumeError> {
        let axis = |dim: Dim| -> Result<AxisGrid, VolumeError> {
            let boundaries = data.voxel_arr.get(dim).clone();
            let declared = *data.voxel_number.get(dim);
            let axis = AxisGrid::new(dim, boundaries)?;
            if axis.voxel_count() != declared {
                return Err(VolumeError::VoxelCountMismatch {
                    dim,
                    declared,
                    boundaries: axis.boundaries().len(),
                });
            }
            Ok(axis)
        };

        let grid = CoordinateGrid::from_axes(axis(Dim::X)?, axis(Dim::Y)?, axis(Dim::Z)?);
        for dim in Self::voxel_size_mismatches(data, &grid) {
            warn!(
                "{dim} voxel size {} differs from the mean boundary spacing {}",
                data.voxel_size.get(dim),
                Self::mean_spacing(&grid, dim)
            );
        }
        Ok(grid)
    }

    fn mean_spacing(grid: &CoordinateGrid, dim: Dim) -> f64 {
        let axis = grid.axis(dim);
        axis.length() / axis.voxel_count() as f64
    }

    /// Dimensions whose declared voxel size disagrees with the boundaries by
    /// more than 1%.
    fn voxel_size_mismatches(data: &VolumeData, grid: &CoordinateGrid) -> Vec<Dim> {
        Dim::ALL
            .into_iter()
            .filter(|dim| {
                let declared = data.voxel_size.get(*dim).abs();
                let spacing = Self::mean_spacing(grid, *dim);
                (declared - spacing).abs() > 0.01 * spacing
            })
            .collect()
    }

    fn build_field<T: Copy>(
        grid: &CoordinateGrid,
        values: Vec<T>,
    ) -> Result<VolumeField<T>, VolumeError> {
        let expected = grid.voxel_total();
        let actual = values.len();
        VolumeField::from_flat(grid.voxel_counts(), values)
            .map_err(|_| VolumeError::FieldLength { expected, actual })
    }

    fn extrema(field: &VolumeField<f64>) -> (f64, f64) {
        field
            .iter()
            .fold((f64::INFINITY, f64::NEG_INFINITY), |(min, max), &v| {
                (min.min(v), max.max(v))
            })
    }
}
