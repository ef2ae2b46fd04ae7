//! Images as seen by a view: a source pair plus an accumulated transform.

mod transformable;

pub use transformable::{ImageListener, ImageState, TransformableImage};
