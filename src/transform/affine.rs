//! 3-D affine transforms.
//!
//! An [`AffineTransform3D`] is a 3×3 linear part plus a translation, stored as a
//! homogeneous 4×4 matrix. The persisted form is the 12 row-major numbers of the
//! upper 3×4 block, which is how dataset files describe affine transformations.

use nalgebra::{Matrix4, Point3, Rotation3, Vector3};
use serde::{Deserialize, Serialize};

/// Tolerance used by [`AffineTransform3D::is_identity`].
pub const IDENTITY_EPSILON: f64 = 1e-12;

/// An affine transform in 3-D.
///
/// Composition follows the "pre-concatenate" convention: `a.pre_concatenate(&b)`
/// turns `a` into `b ∘ a`, i.e. `b` is applied after `a`, in the world frame.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(from = "[f64; 12]", into = "[f64; 12]")]
pub struct AffineTransform3D {
    matrix: Matrix4<f64>,
}

impl Default for AffineTransform3D {
    fn default() -> Self {
        Self::identity()
    }
}

impl AffineTransform3D {
    /// The identity transform.
    pub fn identity() -> Self {
        Self {
            matrix: Matrix4::identity(),
        }
    }

    /// Create a transform from the 12 row-major values of the 3×4 block.
    pub fn from_row_major(values: [f64; 12]) -> Self {
        let mut matrix = Matrix4::identity();
        for row in 0..3 {
            for col in 0..4 {
                matrix[(row, col)] = values[row * 4 + col];
            }
        }
        Self { matrix }
    }

    /// The 12 row-major values of the 3×4 block.
    pub fn to_row_major(&self) -> [f64; 12] {
        let mut values = [0.0; 12];
        for row in 0..3 {
            for col in 0..4 {
                values[row * 4 + col] = self.matrix[(row, col)];
            }
        }
        values
    }

    /// A pure scaling transform.
    pub fn scaling(sx: f64, sy: f64, sz: f64) -> Self {
        Self {
            matrix: Matrix4::new_nonuniform_scaling(&Vector3::new(sx, sy, sz)),
        }
    }

    /// A pure translation.
    pub fn translation(tx: f64, ty: f64, tz: f64) -> Self {
        Self {
            matrix: Matrix4::new_translation(&Vector3::new(tx, ty, tz)),
        }
    }

    /// A rotation by `radians` about the given axis (0 = x, 1 = y, 2 = z).
    ///
    /// Axes above 2 are clamped to z.
    pub fn rotation(axis: usize, radians: f64) -> Self {
        let axis = match axis {
            0 => Vector3::x_axis(),
            1 => Vector3::y_axis(),
            _ => Vector3::z_axis(),
        };
        Self {
            matrix: Rotation3::from_axis_angle(&axis, radians).to_homogeneous(),
        }
    }

    /// The underlying homogeneous matrix.
    pub fn matrix(&self) -> &Matrix4<f64> {
        &self.matrix
    }

    /// Replace `self` with `other ∘ self`.
    pub fn pre_concatenate(&mut self, other: &AffineTransform3D) -> &mut Self {
        self.matrix = other.matrix * self.matrix;
        self
    }

    /// Replace `self` with `self ∘ other`.
    pub fn concatenate(&mut self, other: &AffineTransform3D) -> &mut Self {
        self.matrix *= other.matrix;
        self
    }

    /// Return `self ∘ first`: apply `first`, then `self`.
    pub fn after(&self, first: &AffineTransform3D) -> AffineTransform3D {
        Self {
            matrix: self.matrix * first.matrix,
        }
    }

    /// The inverse transform, or `None` if the linear part is singular.
    pub fn inverse(&self) -> Option<AffineTransform3D> {
        self.matrix.try_inverse().map(|matrix| Self { matrix })
    }

    /// Apply the transform to a point.
    pub fn apply(&self, point: [f64; 3]) -> [f64; 3] {
        let p = self
            .matrix
            .transform_point(&Point3::new(point[0], point[1], point[2]));
        [p.x, p.y, p.z]
    }

    /// Per-axis scale factors (column norms of the linear part).
    pub fn scale_factors(&self) -> [f64; 3] {
        let mut factors = [0.0; 3];
        for (col, factor) in factors.iter_mut().enumerate() {
            *factor = self.matrix.fixed_view::<3, 1>(0, col).norm();
        }
        factors
    }

    /// Whether this transform is the identity within [`IDENTITY_EPSILON`].
    pub fn is_identity(&self) -> bool {
        self.approx_eq(&Self::identity(), IDENTITY_EPSILON)
    }

    /// Element-wise comparison with tolerance.
    pub fn approx_eq(&self, other: &AffineTransform3D, epsilon: f64) -> bool {
        self.matrix
            .iter()
            .zip(other.matrix.iter())
            .all(|(a, b)| (a - b).abs() <= epsilon)
    }
}

impl From<[f64; 12]> for AffineTransform3D {
    fn from(values: [f64; 12]) -> Self {
        Self::from_row_major(values)
    }
}

impl From<AffineTransform3D> for [f64; 12] {
    fn from(transform: AffineTransform3D) -> Self {
        transform.to_row_major()
    }
}

impl std::fmt::Display for AffineTransform3D {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let values = self.to_row_major();
        write!(f, "3d-affine: (")?;
        for (i, v) in values.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{}", v)?;
        }
        write!(f, ")")
    }
}

// =============================================================================
// Tests
// =============================================================================
