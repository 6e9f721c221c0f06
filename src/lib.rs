//! # Dose-volume library
//!
//! This crate is the data core of a radiotherapy dose viewer. It takes
//! already parsed density and dose records (egsphant, 3ddose or DICOM
//! volumes flattened into a [`VolumeData`]) and turns them into volumes on
//! possibly non-uniform voxel grids that can be:
//!  - sliced along the three orthogonal planes (xy, yz and xz)
//!  - queried by voxel index or by world position in cm
//!  - trilinearly resampled onto another grid
//!  - compared with each other as a relative dose difference
//!
//! Region-of-interest contours from a structure set are rasterized into
//! voxel masks, from which cumulative dose-volume histograms are computed.
//! Density slices can be rendered to greyscale images, optionally
//! precomputed per axis on the Tokio blocking pool.
//!
//! Heavy loops (resampling, DVH per ROI, image conversion) run in parallel
//! using rayon.
//!
//! Files are not read here and nothing is drawn: parsing and rendering are
//! left to the caller.
//!
//! # Examples
//!
//! ## Slicing a dose volume
//!
//! Load a dose record exported as JSON, then read the axial slice through
//! the isocenter and the dose profile along x through its middle.
//!
//! ```no_run
//! # use dose_volume::{Axis, Dim, VolumeData, VolumeLoader};
//! let json = std::fs::read_to_string("dose.json").expect("should have read dose record");
//! let data: VolumeData = serde_json::from_str(&json).expect("should have parsed dose record");
//! let mut dose = VolumeLoader::load_dose(data).expect("should have built dose volume");
//!
//! let slice = dose.get_slice(Axis::Xy, 0.0);
//! println!("{} x {} voxels", slice.x_voxels, slice.y_voxels);
//!
//! let (_, ny, nz) = dose.volume.dim();
//! for point in dose.profile(Dim::X, [ny / 2, nz / 2]) {
//!     println!("{:.2} cm: {:.3} Gy", point.position, point.value);
//! }
//! ```
//!
//! ## Dose-volume histograms
//!
//! ```no_run
//! # use dose_volume::{RoiData, ViewerConfig, ViewerState, VolumeData};
//! # fn run(dose: VolumeData, rois: Vec<RoiData>) -> Result<(), dose_volume::ViewerError> {
//! let mut state = ViewerState::new(ViewerConfig::default());
//! let index = state.add_dose(dose)?;
//! state.load_structure_set(&rois)?;
//! for dvh in state.histograms(index)? {
//!     println!("{}: {:.1}% at 95% of max", dvh.label, 100.0 * dvh.volume_at_dose(0.95 * dvh.max_dose));
//! }
//! # Ok(())
//! # }
//! ```

pub mod app_state;
pub mod comparison;
pub mod config;
pub mod dvh;
pub mod enums;
pub mod field;
pub mod grid;
pub mod image_cache;
mod interpolator;
pub mod roi;
pub mod screen;
mod slicer;
pub mod volume;
pub mod volume_loader;

pub use app_state::{ViewerError, ViewerState};
pub use comparison::DoseComparison;
pub use config::ViewerConfig;
pub use dvh::{DoseVolumeHistogram, DvhCalculator, DvhPoint};
pub use enums::{Axis, Dim};
pub use field::{FieldValue, Slice, VolumeField};
pub use grid::{AxisGrid, CoordinateGrid, GridError};
pub use image_cache::{DensityColourMap, ImageCache};
pub use interpolator::Interpolator;
pub use roi::{ContourSlice, RoiData, RoiError, RoiOutline, RoiRasterizer, StructureSet};
pub use screen::SliceGeometry;
pub use slicer::{SliceCache, extract_slice};
pub use volume::{DensityVolume, DoseVolume, Volume, VolumeError};
pub use volume_loader::{VolumeData, VolumeLoader, Xyz};
