//! Everything the viewer has loaded, owned in one place and handed to
//! whichever component needs the current volumes.

use image::GrayImage;
use log::debug;
use thiserror::Error;
use tokio::task::JoinHandle;

use crate::comparison::DoseComparison;
use crate::config::ViewerConfig;
use crate::dvh::DoseVolumeHistogram;
use crate::enums::{Axis, Dim};
use crate::image_cache::{CachedAxis, ImageCache, cache_all_images, spawn_image_caching};
use crate::roi::{RoiData, RoiError, RoiSlice, StructureSet};
use crate::screen::SliceGeometry;
use crate::volume::{DensityVolume, DoseVolume, ProfilePoint, VolumeError};
use crate::volume_loader::{VolumeData, VolumeLoader};

#[derive(Debug, Error)]
pub enum ViewerError {
    #[error("No dose volume at index {0}")]
    NoDose(usize),

    #[error(transparent)]
    Volume(#[from] VolumeError),

    #[error(transparent)]
    Roi(#[from] RoiError),
}

#[derive(Debug, Default)]
pub struct ViewerState {
    pub config: ViewerConfig,
    density: Option<DensityVolume>,
    doses: Vec<DoseVolume>,
    structure_set: Option<StructureSet>,
    comparison: Option<DoseComparison>,
    /// Bumped on every density load; tags background image results.
    generation: u64,
    image_cache: ImageCache,
}

impl ViewerState {
    pub fn new(config: ViewerConfig) -> Self {
        Self {
            config,
            ..Self::default()
        }
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Replaces the density volume. Images cached for the previous one are
    /// dropped and late results for it will be refused.
    pub fn load_density(&mut self, data: VolumeData) -> Result<&DensityVolume, ViewerError> {
        let density = VolumeLoader::load_density(data)?;
        self.generation += 1;
        self.image_cache.reset(self.generation);
        debug!("density volume loaded, generation {}", self.generation);
        Ok(&*self.density.insert(density))
    }

    pub fn density(&self) -> Option<&DensityVolume> {
        self.density.as_ref()
    }

    pub fn density_mut(&mut self) -> Option<&mut DensityVolume> {
        self.density.as_mut()
    }

    /// Starts background image caching for the current density volume.
    /// Returns `None` when caching is switched off or nothing is loaded.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn spawn_image_caching(&self) -> Option<Vec<JoinHandle<Option<CachedAxis>>>> {
        if !self.config.cache_images {
            return None;
        }
        let density = self.density.as_ref()?;
        Some(spawn_image_caching(
            density.volume.shared_field(),
            density.colour_map(),
            self.generation,
        ))
    }

    /// Stores a finished background result, unless it is stale.
    pub fn accept_images(&mut self, cached: CachedAxis) -> bool {
        self.image_cache.accept(cached)
    }

    /// Caches the images of every axis and waits for them.
    pub async fn cache_density_images(&mut self) {
        if !self.config.cache_images {
            return;
        }
        let Some(density) = self.density.as_ref() else {
            return;
        };
        let results = cache_all_images(
            density.volume.shared_field(),
            density.colour_map(),
            self.generation,
        )
        .await;
        for cached in results {
            self.image_cache.accept(cached);
        }
    }

    pub fn image_cache(&self) -> &ImageCache {
        &self.image_cache
    }

    /// The density image at `slice_pos`, from the cache when available.
    pub fn density_image(&self, axis: Axis, slice_pos: f64) -> Option<GrayImage> {
        let density = self.density.as_ref()?;
        let index = density
            .volume
            .grid()
            .slice_index_for_position(axis, slice_pos);
        self.image_cache
            .get_or_render(density.volume.field(), axis, index, &density.colour_map())
    }

    /// Loads a dose volume and returns its index.
    pub fn add_dose(&mut self, data: VolumeData) -> Result<usize, ViewerError> {
        self.doses.push(VolumeLoader::load_dose(data)?);
        Ok(self.doses.len() - 1)
    }

    /// Removes a dose volume. Any comparison is dropped since it may have
    /// been built from it.
    pub fn remove_dose(&mut self, index: usize) -> Option<DoseVolume> {
        if index >= self.doses.len() {
            return None;
        }
        self.comparison = None;
        Some(self.doses.remove(index))
    }

    pub fn doses(&self) -> &[DoseVolume] {
        &self.doses
    }

    pub fn dose(&self, index: usize) -> Result<&DoseVolume, ViewerError> {
        self.doses.get(index).ok_or(ViewerError::NoDose(index))
    }

    pub fn dose_mut(&mut self, index: usize) -> Result<&mut DoseVolume, ViewerError> {
        self.doses.get_mut(index).ok_or(ViewerError::NoDose(index))
    }

    pub fn dose_profile(
        &self,
        index: usize,
        dim: Dim,
        fixed: [usize; 2],
    ) -> Result<Vec<ProfilePoint>, ViewerError> {
        Ok(self.dose(index)?.profile(dim, fixed))
    }

    /// Rasterizes `rois` with the configured pitch, replacing any previous
    /// structure set. Returns the number of ROIs with a mask.
    /// Rasterizes `rois` and returns how many had contour data.
    pub fn load_structure_set(&mut self, rois: &[RoiData]) -> Result<usize, ViewerError> {
        let structure_set = StructureSet::new(rois, &self.config.rasterizer()?);
        let count = structure_set.outlines.len();
        self.structure_set = Some(structure_set);
        Ok(count)
    }

    pub fn structure_set(&self) -> Option<&StructureSet> {
        self.structure_set.as_ref()
    }

    pub fn roi_slices(&self, axis: Axis, slice_pos: f64) -> Vec<RoiSlice> {
        self.structure_set
            .as_ref()
            .map(|set| set.slices(axis, slice_pos))
            .unwrap_or_default()
    }

    /// DVHs of every ROI against dose volume `index`, empty without a
    /// structure set.
    pub fn histograms(&self, index: usize) -> Result<Vec<DoseVolumeHistogram>, ViewerError> {
        let dose = self.dose(index)?;
        Ok(self
            .structure_set
            .as_ref()
            .map(|set| {
                self.config
                    .dvh_calculator()
                    .compute_histograms(&set.outlines, dose)
            })
            .unwrap_or_default())
    }

    /// Compares dose `a` against dose `b` and keeps the result.
    pub fn compare(&mut self, a: usize, b: usize) -> Result<&mut DoseComparison, ViewerError> {
        let comparison = DoseComparison::compare(self.dose(a)?, self.dose(b)?)?;
        Ok(self.comparison.insert(comparison))
    }

    pub fn comparison(&self) -> Option<&DoseComparison> {
        self.comparison.as_ref()
    }

    pub fn comparison_mut(&mut self) -> Option<&mut DoseComparison> {
        self.comparison.as_mut()
    }

    /// Plot geometry of the density volume.
    pub fn density_geometry(&self, axis: Axis, width: f64, height: f64) -> Option<SliceGeometry> {
        let density = self.density.as_ref()?;
        Some(SliceGeometry::new(
            density.volume.grid(),
            axis,
            width,
            height,
            false,
        ))
    }

    /// Plot geometry of dose volume `index`, snapped to whole pixels.
    pub fn dose_geometry(
        &self,
        index: usize,
        axis: Axis,
        width: f64,
        height: f64,
    ) -> Result<SliceGeometry, ViewerError> {
        let dose = self.dose(index)?;
        Ok(SliceGeometry::new(dose.grid(), axis, width, height, true))
    }
}
