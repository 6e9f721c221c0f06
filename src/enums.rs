use serde::{Deserialize, Serialize};

/// A world or voxel dimension.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Dim {
    X,
    Y,
    Z,
}

impl Dim {
    pub const ALL: [Dim; 3] = [Dim::X, Dim::Y, Dim::Z];

    #[inline]
    pub fn index(self) -> usize {
        match self {
            Dim::X => 0,
            Dim::Y => 1,
            Dim::Z => 2,
        }
    }
}

impl std::fmt::Display for Dim {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Dim::X => "x",
            Dim::Y => "y",
            Dim::Z => "z",
        };
        f.write_str(name)
    }
}

/// The plane of a slice, named after its two in-plane dimensions.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Axis {
    /// Axial plane, sliced along z.
    Xy,
    /// Sagittal plane, sliced along x.
    Yz,
    /// Coronal plane, sliced along y.
    Xz,
}

impl Axis {
    pub const ALL: [Axis; 3] = [Axis::Xy, Axis::Yz, Axis::Xz];

    /// Returns `(horizontal, vertical, orthogonal)` dimensions of the plane.
    pub fn dims(self) -> (Dim, Dim, Dim) {
        match self {
            Axis::Xy => (Dim::X, Dim::Y, Dim::Z),
            Axis::Yz => (Dim::Y, Dim::Z, Dim::X),
            Axis::Xz => (Dim::X, Dim::Z, Dim::Y),
        }
    }

    /// The dimension a slice position is measured along.
    #[inline]
    pub fn orthogonal(self) -> Dim {
        self.dims().2
    }
}

impl std::fmt::Display for Axis {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Axis::Xy => "xy",
            Axis::Yz => "yz",
            Axis::Xz => "xz",
        };
        f.write_str(name)
    }
}
