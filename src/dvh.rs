//! Cumulative dose-volume histograms of rasterized ROIs.

use log::debug;
use rayon::prelude::*;
use serde::Serialize;

use crate::roi::RoiOutline;
use crate::volume::DoseVolume;

pub const DEFAULT_BINS: usize = 250;

/// Fraction of the ROI volume receiving at least `dose`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct DvhPoint {
    pub dose: f64,
    pub volume: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DoseVolumeHistogram {
    pub label: String,
    pub colour: [u8; 3],
    pub max_dose: f64,
    /// Number of ROI voxels sampled.
    pub voxel_count: usize,
    /// Non-increasing in `volume`, ascending in `dose`.
    pub points: Vec<DvhPoint>,
}

impl DoseVolumeHistogram {
    /// The same curve with every dose scaled by `factor`.
    pub fn renormalized(&self, factor: f64) -> Self {
        Self {
            max_dose: self.max_dose * factor,
            points: self
                .points
                .iter()
                .map(|p| DvhPoint {
                    dose: p.dose * factor,
                    volume: p.volume,
                })
                .collect(),
            ..self.clone()
        }
    }

    /// Volume fraction at the highest threshold not above `dose`.
    pub fn volume_at_dose(&self, dose: f64) -> f64 {
        let index = self.points.partition_point(|p| p.dose <= dose);
        match index {
            0 => 1.0,
            n => self.points[n - 1].volume,
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct DvhCalculator {
    n_bins: usize,
}

impl Default for DvhCalculator {
    fn default() -> Self {
        Self {
            n_bins: DEFAULT_BINS,
        }
    }
}

impl DvhCalculator {
    pub fn new(n_bins: usize) -> Self {
        Self { n_bins }
    }

    /// One histogram per ROI, in the order of `outlines`.
    pub fn compute_histograms(
        &self,
        outlines: &[RoiOutline],
        dose: &DoseVolume,
    ) -> Vec<DoseVolumeHistogram> {
        outlines
            .par_iter()
            .map(|outline| self.compute_histogram(outline, dose))
            .collect()
    }

    /// Samples the dose at the center of every voxel inside the ROI mask.
    /// Voxels outside the dose grid count as zero dose.
    pub fn compute_histogram(&self, outline: &RoiOutline, dose: &DoseVolume) -> DoseVolumeHistogram {
        let max_dose = dose.max_dose;
        let mut counts = vec![0usize; self.n_bins];
        let mut total = 0usize;

        for (address, _) in outline.mask.iter().enumerate().filter(|(_, v)| **v == 1) {
            let coords = outline.mask.coords_of(address);
            let Some(position) = outline.grid.position(coords) else {
                continue;
            };
            let value = dose.sample_at_world_position(position).unwrap_or(0.0);
            if let Some(bin) = self.bin_of(value, max_dose) {
                counts[bin] += 1;
            }
            total += 1;
        }

        debug!(
            "DVH for {}: {total} voxels in {} bins",
            outline.label, self.n_bins
        );
        DoseVolumeHistogram {
            label: outline.label.clone(),
            colour: outline.colour,
            max_dose,
            voxel_count: total,
            points: Self::cumulative(&counts, total, max_dose),
        }
    }

    fn bin_of(&self, value: f64, max_dose: f64) -> Option<usize> {
        if self.n_bins == 0 {
            return None;
        }
        if !(max_dose > 0.0) {
            return Some(0);
        }
        let bin = (value / max_dose * self.n_bins as f64).floor();
        Some(bin.clamp(0.0, (self.n_bins - 1) as f64) as usize)
    }

    /// Turns bin counts into "volume receiving at least this dose" fractions.
    fn cumulative(counts: &[usize], total: usize, max_dose: f64) -> Vec<DvhPoint> {
        let n_bins = counts.len();
        let mut running = 0usize;
        let mut from_top: Vec<usize> = counts
            .iter()
            .rev()
            .map(|count| {
                running += count;
                running
            })
            .collect();
        from_top.reverse();

        from_top
            .into_iter()
            .enumerate()
            .map(|(i, sum)| DvhPoint {
                dose: max_dose * i as f64 / n_bins as f64,
                volume: if total == 0 {
                    0.0
                } else {
                    sum as f64 / total as f64
                },
            })
            .collect()
    }
}
