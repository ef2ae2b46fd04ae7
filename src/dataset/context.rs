//! Per-build record of which transforms were applied to which source.
//!
//! One context is created per build and passed to whatever needs the reverse
//! lookup from a source to its placement.

use indexmap::IndexMap;

use crate::transform::AffineTransform3D;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct BuildContext {
    applied: IndexMap<String, Vec<AffineTransform3D>>,
}

impl BuildContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, source: &str, transform: AffineTransform3D) {
        self.applied
            .entry(source.to_string())
            .or_default()
            .push(transform);
    }

    /// Transforms applied to `source`, in application order.
    pub fn transforms(&self, source: &str) -> &[AffineTransform3D] {
        self.applied.get(source).map(Vec::as_slice).unwrap_or(&[])
    }

    /// All transforms of `source` composed into one.
    pub fn accumulated(&self, source: &str) -> AffineTransform3D {
        self.transforms(source)
            .iter()
            .fold(AffineTransform3D::identity(), |acc, t| t.after(&acc))
    }

    pub fn sources(&self) -> impl Iterator<Item = &str> {
        self.applied.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.applied.len()
    }

    pub fn is_empty(&self) -> bool {
        self.applied.is_empty()
    }
}
