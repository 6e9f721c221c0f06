//! Greyscale density slice images and their background precomputation.
//!
//! Images of every slice along one axis are built by a blocking task per
//! axis. The tasks share nothing but the read-only field; each result is
//! tagged with the volume generation it was built for so a result that
//! arrives after the volume was replaced can be dropped.

use std::collections::HashMap;
use std::sync::Arc;

use futures::future::join_all;
use image::{GrayImage, ImageBuffer, imageops};
use log::{debug, warn};
use rayon::prelude::*;
use tokio::task::JoinHandle;
use web_time::Instant;

use crate::enums::Axis;
use crate::field::{Slice, VolumeField};
use crate::slicer::extract_slice;

#[inline]
fn signed_sqrt(value: f64) -> f64 {
    value.signum() * value.abs().sqrt()
}

/// Square-root scale from `[min, max]` density onto grey levels `[0, 255]`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DensityColourMap {
    min: f64,
    max: f64,
}

impl DensityColourMap {
    pub fn new(min: f64, max: f64) -> Self {
        Self { min, max }
    }

    pub fn range(&self) -> (f64, f64) {
        (self.min, self.max)
    }

    #[inline]
    pub fn to_grey(&self, density: f64) -> u8 {
        let (lo, hi) = (signed_sqrt(self.min), signed_sqrt(self.max));
        if hi == lo {
            return 0;
        }
        let t = (signed_sqrt(density) - lo) / (hi - lo);
        (t * 255.0).round().clamp(0.0, 255.0) as u8
    }

    /// The density a grey level stands for.
    pub fn invert(&self, grey: u8) -> f64 {
        let (lo, hi) = (signed_sqrt(self.min), signed_sqrt(self.max));
        let s = lo + f64::from(grey) / 255.0 * (hi - lo);
        s.signum() * s * s
    }

    /// Re-windows an image rendered with this map onto `window`.
    pub fn remap(&self, image: &GrayImage, window: &DensityColourMap) -> GrayImage {
        let lut: Vec<u8> = (0..=255u8)
            .map(|grey| window.to_grey(self.invert(grey)))
            .collect();
        let mut remapped = image.clone();
        for pixel in remapped.pixels_mut() {
            pixel.0[0] = lut[usize::from(pixel.0[0])];
        }
        remapped
    }
}

/// Renders a density slice. Planes other than xy are flipped so the
/// vertical dimension points up.
pub fn slice_to_image(slice: &Slice<f64>, colour_map: &DensityColourMap) -> Option<GrayImage> {
    let pixel_data: Vec<u8> = slice
        .data
        .par_iter()
        .map(|&v| colour_map.to_grey(v))
        .collect();
    let mut image: GrayImage =
        ImageBuffer::from_raw(slice.x_voxels as u32, slice.y_voxels as u32, pixel_data)?;
    if slice.axis != Axis::Xy {
        imageops::flip_vertical_in_place(&mut image);
    }
    Some(image)
}

/// Every slice image along `axis`, in slice order, or `None` when a slice
/// could not be rendered.
pub fn build_axis_images(
    field: &VolumeField<f64>,
    axis: Axis,
    colour_map: &DensityColourMap,
) -> Option<Vec<GrayImage>> {
    let (nx, ny, nz) = field.dim();
    let count = match axis {
        Axis::Xy => nz,
        Axis::Yz => nx,
        Axis::Xz => ny,
    };
    let rendered = (0..count)
        .into_par_iter()
        .map(|index| slice_to_image(&extract_slice(field, axis, index), colour_map))
        .collect();
    complete_axis(axis, rendered)
}

fn complete_axis(axis: Axis, rendered: Vec<Option<GrayImage>>) -> Option<Vec<GrayImage>> {
    let failed = rendered.iter().filter(|image| image.is_none()).count();
    if failed > 0 {
        warn!(
            "{failed} of {} {axis} slice images failed to render",
            rendered.len()
        );
        return None;
    }
    rendered.into_iter().collect()
}

/// The images of one axis, built for volume generation `generation`.
#[derive(Debug, Clone)]
pub struct CachedAxis {
    pub generation: u64,
    pub axis: Axis,
    pub images: Vec<GrayImage>,
}

/// Starts one blocking task per axis. A task yields `None` when its axis
/// could not be rendered.
///
/// Must be called from within a Tokio runtime.
pub fn spawn_image_caching(
    field: Arc<VolumeField<f64>>,
    colour_map: DensityColourMap,
    generation: u64,
) -> Vec<JoinHandle<Option<CachedAxis>>> {
    Axis::ALL
        .into_iter()
        .map(|axis| {
            let field = Arc::clone(&field);
            tokio::task::spawn_blocking(move || {
                let start = Instant::now();
                let images = build_axis_images(&field, axis, &colour_map)?;
                debug!(
                    "cached {} {axis} images in {:?}",
                    images.len(),
                    start.elapsed()
                );
                Some(CachedAxis {
                    generation,
                    axis,
                    images,
                })
            })
        })
        .collect()
}

/// Runs [`spawn_image_caching`] and waits for every axis. Axes that failed
/// are left out.
pub async fn cache_all_images(
    field: Arc<VolumeField<f64>>,
    colour_map: DensityColourMap,
    generation: u64,
) -> Vec<CachedAxis> {
    join_all(spawn_image_caching(field, colour_map, generation))
        .await
        .into_iter()
        .filter_map(|result| match result {
            Ok(cached) => cached,
            Err(err) => {
                warn!("image caching task failed: {err}");
                None
            }
        })
        .collect()
}

/// Slice images of the current density volume, keyed by axis.
#[derive(Debug, Default)]
pub struct ImageCache {
    generation: u64,
    axes: HashMap<Axis, Vec<GrayImage>>,
}

impl ImageCache {
    pub fn new(generation: u64) -> Self {
        Self {
            generation,
            axes: HashMap::new(),
        }
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Forgets every image and starts waiting for `generation`.
    pub fn reset(&mut self, generation: u64) {
        self.generation = generation;
        self.axes.clear();
    }

    /// Stores a finished axis. Returns `false` and drops it when it was
    /// built for another generation.
    pub fn accept(&mut self, cached: CachedAxis) -> bool {
        if cached.generation != self.generation {
            warn!(
                "discarding {} images of generation {} (current {})",
                cached.axis, cached.generation, self.generation
            );
            return false;
        }
        self.axes.insert(cached.axis, cached.images);
        true
    }

    pub fn get(&self, axis: Axis, index: usize) -> Option<&GrayImage> {
        self.axes.get(&axis)?.get(index)
    }

    pub fn is_complete(&self) -> bool {
        Axis::ALL.iter().all(|axis| self.axes.contains_key(axis))
    }

    /// The cached image, or one rendered now when its axis is not cached.
    pub fn get_or_render(
        &self,
        field: &VolumeField<f64>,
        axis: Axis,
        index: usize,
        colour_map: &DensityColourMap,
    ) -> Option<GrayImage> {
        match self.get(axis, index) {
            Some(image) => Some(image.clone()),
            None => slice_to_image(&extract_slice(field, axis, index), colour_map),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn field() -> Arc<VolumeField<f64>> {
        // x = 2, y = 3, z = 4
        Arc::new(VolumeField::from_flat((2, 3, 4), (0..24).map(f64::from).collect()).unwrap())
    }

    #[test]
    fn colour_map_is_square_root_scaled() {
        let map = DensityColourMap::new(0.0, 4.0);
        assert_eq!(map.to_grey(0.0), 0);
        assert_eq!(map.to_grey(1.0), 128);
        assert_eq!(map.to_grey(4.0), 255);
        assert_eq!(map.to_grey(9.0), 255);
        assert!((map.invert(255) - 4.0).abs() < 1e-12);
    }

    #[test]
    fn remap_narrows_window() {
        let map = DensityColourMap::new(0.0, 4.0);
        let image = GrayImage::from_raw(2, 1, vec![map.to_grey(1.0), 255]).unwrap();
        let remapped = map.remap(&image, &DensityColourMap::new(0.0, 1.0));
        assert_eq!(remapped.as_raw(), &vec![255, 255]);
    }

    #[test]
    fn non_axial_images_are_flipped() {
        let map = DensityColourMap::new(0.0, 23.0);
        let slice = extract_slice(&field(), Axis::Xz, 0);
        let image = slice_to_image(&slice, &map).unwrap();
        assert_eq!(image.dimensions(), (2, 4));
        // top row holds the highest z
        assert_eq!(image.get_pixel(0, 0).0[0], map.to_grey(18.0));
        assert_eq!(image.get_pixel(0, 3).0[0], map.to_grey(0.0));
    }

    #[test]
    fn stale_results_are_discarded() {
        let mut cache = ImageCache::new(2);
        let stale = CachedAxis {
            generation: 1,
            axis: Axis::Xy,
            images: vec![],
        };
        assert!(!cache.accept(stale));
        assert!(cache.get(Axis::Xy, 0).is_none());
    }

    #[test]
    fn axis_with_a_failed_slice_is_not_cached() {
        let map = DensityColourMap::new(0.0, 23.0);
        let good = slice_to_image(&extract_slice(&field(), Axis::Xy, 0), &map);
        let short = Slice {
            axis: Axis::Xy,
            slice_index: 1,
            x_voxels: 2,
            y_voxels: 3,
            data: vec![1.0; 5],
        };
        let bad = slice_to_image(&short, &map);
        assert!(bad.is_none());

        assert!(complete_axis(Axis::Xy, vec![good.clone(), bad]).is_none());
        assert_eq!(complete_axis(Axis::Xy, vec![good]).map(|images| images.len()), Some(1));
        assert_eq!(build_axis_images(&field(), Axis::Yz, &map).map(|images| images.len()), Some(2));
    }

    #[tokio::test]
    async fn caches_every_axis_in_background() {
        let map = DensityColourMap::new(0.0, 23.0);
        let mut cache = ImageCache::new(7);
        for cached in cache_all_images(field(), map, 7).await {
            assert!(cache.accept(cached));
        }
        assert!(cache.is_complete());
        assert_eq!(cache.get(Axis::Xy, 3).map(|i| i.dimensions()), Some((2, 3)));
        assert_eq!(cache.get(Axis::Yz, 1).map(|i| i.dimensions()), Some((3, 4)));
        assert!(cache.get(Axis::Xz, 3).is_none());

        let rendered = cache.get_or_render(&field(), Axis::Xz, 2, &map).unwrap();
        assert_eq!(Some(&rendered), cache.get(Axis::Xz, 2));
    }
}
