//! Relative dose difference between two dose volumes.

use std::sync::Arc;

use log::debug;
use ndarray::Zip;

use crate::enums::Axis;
use crate::field::{Slice, VolumeField};
use crate::interpolator::Interpolator;
use crate::volume::{DoseVolume, Volume, VolumeError};

/// `a - b * factor`, where a missing side counts as zero unless both are
/// missing.
#[inline]
fn subtract(a: Option<f64>, b: Option<f64>, factor: f64) -> Option<f64> {
    match (a, b) {
        (None, None) => None,
        (a, b) => Some(a.unwrap_or(0.0) - b.unwrap_or(0.0) * factor),
    }
}

/// Zero dose means no dose was scored there, so it reads as no data.
#[inline]
fn normalize(value: Option<f64>, max: f64) -> Option<f64> {
    value.filter(|v| *v != 0.0).map(|v| v / max)
}

fn maximum(dose: &DoseVolume) -> Result<f64, VolumeError> {
    let max = dose.max_dose;
    if !(max > 0.0) {
        return Err(VolumeError::NonPositiveMaximum { value: max });
    }
    Ok(max)
}

/// The difference of two dose volumes, each normalized to its own maximum,
/// on the grid of the first.
#[derive(Debug)]
pub struct DoseComparison {
    volume: Volume<Option<f64>>,
    reference: VolumeField<Option<f64>>,
    compared: VolumeField<Option<f64>>,
    error: Option<VolumeField<f64>>,
    factor: f64,
    resampled: bool,
}

impl DoseComparison {
    /// Compares `a` with `b`. When the grids differ, `b` is resampled onto
    /// the voxel centers of `a` first.
    ///
    /// Voxels without dose in either volume stay `None`.
    pub fn compare(a: &DoseVolume, b: &DoseVolume) -> Result<Self, VolumeError> {
        let (max_a, max_b) = (maximum(a)?, maximum(b)?);
        let reference = a.volume.field().map(|v| normalize(Some(*v), max_a));
        let resampled = !a.grid().same_extent(b.grid());

        let (compared, error) = if resampled {
            debug!("dose grids differ, resampling second volume");
            let compared = Interpolator::resample(b.grid(), b.volume.field(), a.grid())
                .map(|v| normalize(*v, max_b));
            (compared, None)
        } else {
            debug!("dose grids match, comparing voxel by voxel");
            let compared = b.volume.field().map(|v| normalize(Some(*v), max_b));
            (compared, Self::combined_error(a, b))
        };

        let difference = Self::difference(&reference, &compared, 1.0);
        Ok(Self {
            volume: Volume::new(a.grid().clone(), difference)?,
            reference,
            compared,
            error,
            factor: 1.0,
            resampled,
        })
    }

    /// Quadrature sum of the per-voxel errors, if either volume has them.
    fn combined_error(a: &DoseVolume, b: &DoseVolume) -> Option<VolumeField<f64>> {
        match (&a.error, &b.error) {
            (None, None) => None,
            (Some(error), None) | (None, Some(error)) => Some(error.clone()),
            (Some(ea), Some(eb)) => {
                let combined = Zip::from(ea.view())
                    .and(eb.view())
                    .map_collect(|ea, eb| ea.hypot(*eb));
                Some(VolumeField::from_array(combined))
            }
        }
    }

    fn difference(
        reference: &VolumeField<Option<f64>>,
        compared: &VolumeField<Option<f64>>,
        factor: f64,
    ) -> VolumeField<Option<f64>> {
        let difference = Zip::from(reference.view())
            .and(compared.view())
            .par_map_collect(|a, b| subtract(*a, *b, factor));
        VolumeField::from_array(difference)
    }

    /// Recomputes the difference with the second volume scaled by `factor`,
    /// reusing the resampled data. Cached slices are dropped.
    pub fn renormalize(&mut self, factor: f64) -> Result<(), VolumeError> {
        let difference = Self::difference(&self.reference, &self.compared, factor);
        self.volume.replace_field(difference)?;
        self.factor = factor;
        Ok(())
    }

    pub fn factor(&self) -> f64 {
        self.factor
    }

    /// Whether the second volume had to be resampled.
    pub fn was_resampled(&self) -> bool {
        self.resampled
    }

    pub fn volume(&self) -> &Volume<Option<f64>> {
        &self.volume
    }

    pub fn get_slice(&mut self, axis: Axis, slice_pos: f64) -> Arc<Slice<Option<f64>>> {
        self.volume.get_slice(axis, slice_pos)
    }

    /// The difference at `coords`; `None` where neither volume has data.
    pub fn get_data_at_voxel_coords(&self, coords: [usize; 3]) -> Option<f64> {
        self.volume.get_data_at_voxel_coords(coords).flatten()
    }

    pub fn error_at_voxel_coords(&self, coords: [usize; 3]) -> f64 {
        self.error
            .as_ref()
            .and_then(|error| error.get(coords))
            .unwrap_or(0.0)
    }
}
