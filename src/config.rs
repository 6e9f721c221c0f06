use serde::{Deserialize, Serialize};

use crate::dvh::{DEFAULT_BINS, DvhCalculator};
use crate::roi::{DEFAULT_PITCH, RoiError, RoiRasterizer};

/// Tunables of the viewer core. Missing fields take their defaults.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ViewerConfig {
    /// In-plane ROI mask voxel size in cm.
    pub roi_pitch: f64,
    pub dvh_bins: usize,
    /// Precompute density slice images in the background.
    pub cache_images: bool,
}

impl Default for ViewerConfig {
    fn default() -> Self {
        Self {
            roi_pitch: DEFAULT_PITCH,
            dvh_bins: DEFAULT_BINS,
            cache_images: true,
        }
    }
}

impl ViewerConfig {
    /// # Errors
    ///
    /// Returns error if `roi_pitch` is not finite or below
    /// [`MIN_PITCH`](crate::roi::MIN_PITCH)
    pub fn rasterizer(&self) -> Result<RoiRasterizer, RoiError> {
        RoiRasterizer::new(self.roi_pitch)
    }

    pub fn dvh_calculator(&self) -> DvhCalculator {
        DvhCalculator::new(self.dvh_bins)
    }
}
