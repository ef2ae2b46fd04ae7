//! Spatial transforms and masks.
//!
//! - [`AffineTransform3D`]: accumulating affine transforms (nalgebra-backed)
//! - [`RealMask`]: transformable spatial extent of an image
//! - [`grid`]: placement of separate images on a regular grid

mod affine;
pub mod grid;
mod mask;

pub use affine::{AffineTransform3D, IDENTITY_EPSILON};
pub use mask::RealMask;
