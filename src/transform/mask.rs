//! Real-valued spatial masks.
//!
//! A [`RealMask`] is an axis-aligned box in its own local frame, placed in the
//! world by a local-to-world affine. Transforming a mask never re-samples it; the
//! placement transform is updated instead, so repeated transforms accumulate
//! without loss.

use super::affine::AffineTransform3D;

/// A box-shaped region of real space, possibly rotated or sheared.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RealMask {
    min: [f64; 3],
    max: [f64; 3],
    local_to_world: AffineTransform3D,
}

impl RealMask {
    /// An axis-aligned box in world coordinates.
    pub fn from_interval(min: [f64; 3], max: [f64; 3]) -> Self {
        Self {
            min,
            max,
            local_to_world: AffineTransform3D::identity(),
        }
    }

    /// A box given in local coordinates, placed in the world by `local_to_world`.
    pub fn with_placement(min: [f64; 3], max: [f64; 3], local_to_world: AffineTransform3D) -> Self {
        Self {
            min,
            max,
            local_to_world,
        }
    }

    /// Minimum corner in the local frame.
    pub fn local_min(&self) -> [f64; 3] {
        self.min
    }

    /// Maximum corner in the local frame.
    pub fn local_max(&self) -> [f64; 3] {
        self.max
    }

    /// Transform mapping the local frame into world coordinates.
    pub fn placement(&self) -> &AffineTransform3D {
        &self.local_to_world
    }

    /// Pull the mask back through `transform`.
    ///
    /// The result contains `p` iff this mask contains `transform(p)`, so passing
    /// the inverse of a movement moves the mask along with it. Returns `None`
    /// if `transform` is singular.
    pub fn transform(&self, transform: &AffineTransform3D) -> Option<RealMask> {
        let inverse = transform.inverse()?;
        Some(Self {
            min: self.min,
            max: self.max,
            local_to_world: inverse.after(&self.local_to_world),
        })
    }

    /// Whether the world point lies inside the mask (boundary inclusive).
    pub fn contains(&self, point: [f64; 3]) -> bool {
        let Some(world_to_local) = self.local_to_world.inverse() else {
            return false;
        };
        let local = world_to_local.apply(point);
        (0..3).all(|d| local[d] >= self.min[d] - 1e-9 && local[d] <= self.max[d] + 1e-9)
    }

    /// Axis-aligned world bounding box as `(min, max)`.
    pub fn bounds(&self) -> ([f64; 3], [f64; 3]) {
        let mut min = [f64::INFINITY; 3];
        let mut max = [f64::NEG_INFINITY; 3];
        for corner in 0..8 {
            let local = [
                if corner & 1 == 0 { self.min[0] } else { self.max[0] },
                if corner & 2 == 0 { self.min[1] } else { self.max[1] },
                if corner & 4 == 0 { self.min[2] } else { self.max[2] },
            ];
            let world = self.local_to_world.apply(local);
            for d in 0..3 {
                min[d] = min[d].min(world[d]);
                max[d] = max[d].max(world[d]);
            }
        }
        (min, max)
    }

    /// Extent of the world bounding box along each axis.
    pub fn extent(&self) -> [f64; 3] {
        let (min, max) = self.bounds();
        [max[0] - min[0], max[1] - min[1], max[2] - min[2]]
    }

    /// Compare two masks by their world bounds and placement.
    pub fn approx_eq(&self, other: &RealMask, epsilon: f64) -> bool {
        let close = |a: [f64; 3], b: [f64; 3]| (0..3).all(|d| (a[d] - b[d]).abs() <= epsilon);
        close(self.min, other.min)
            && close(self.max, other.max)
            && self.local_to_world.approx_eq(&other.local_to_world, epsilon)
    }
}
