//! Images with an accumulating spatial transform.
//!
//! A [`TransformableImage`] starts out [`ImageState::Pending`]: it knows its
//! path but has no pixel source yet, and transforms applied to it are
//! collected. Binding opens the source pair and carries the collected
//! transform over. In both states a new transform `T` is pre-concatenated,
//! so it acts in the world frame after everything applied before.
//!
//! The spatial mask is derived lazily from the bound source's physical extent.
//! Once cached it is moved along with every later transform instead of being
//! recomputed.

use std::fmt;
use std::sync::Arc;

use tracing::{debug, warn};

use crate::error::ProbeError;
use crate::io::{ImageHandle, ImageOpener, ImageRegistry, SourcePair, VoxelSize};
use crate::transform::{AffineTransform3D, RealMask};

/// Observer notified synchronously after every applied transform.
pub trait ImageListener: Send + Sync {
    fn transformed(&self, image: &str, transform: &AffineTransform3D);
}

/// Binding state of an image.
#[derive(Debug, Clone, PartialEq)]
pub enum ImageState {
    /// Not opened yet; holds the transform to apply at bind time
    Pending(AffineTransform3D),
    /// Source pair opened and seen through `transform`
    Bound {
        pair: SourcePair,
        transform: AffineTransform3D,
    },
}

impl ImageState {
    pub fn transform(&self) -> &AffineTransform3D {
        match self {
            ImageState::Pending(transform) => transform,
            ImageState::Bound { transform, .. } => transform,
        }
    }

    fn transform_mut(&mut self) -> &mut AffineTransform3D {
        match self {
            ImageState::Pending(transform) => transform,
            ImageState::Bound { transform, .. } => transform,
        }
    }
}

pub struct TransformableImage {
    name: String,
    path: String,
    channel: u32,
    voxel_size: Option<VoxelSize>,
    state: ImageState,
    mask: Option<RealMask>,
    listeners: Vec<Arc<dyn ImageListener>>,
}

impl fmt::Debug for TransformableImage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TransformableImage")
            .field("name", &self.name)
            .field("path", &self.path)
            .field("channel", &self.channel)
            .field("state", &self.state)
            .field("mask", &self.mask)
            .field("listeners", &self.listeners.len())
            .finish()
    }
}

impl TransformableImage {
    pub fn new(name: impl Into<String>, path: impl Into<String>, channel: u32) -> Self {
        Self {
            name: name.into(),
            path: path.into(),
            channel,
            voxel_size: None,
            state: ImageState::Pending(AffineTransform3D::identity()),
            mask: None,
            listeners: Vec::new(),
        }
    }

    /// Replace the native voxel size when the image is bound.
    pub fn with_voxel_size(mut self, voxel_size: VoxelSize) -> Self {
        self.voxel_size = Some(voxel_size);
        self
    }

    pub fn add_listener(&mut self, listener: Arc<dyn ImageListener>) {
        self.listeners.push(listener);
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn channel(&self) -> u32 {
        self.channel
    }

    pub fn state(&self) -> &ImageState {
        &self.state
    }

    pub fn is_bound(&self) -> bool {
        matches!(self.state, ImageState::Bound { .. })
    }

    /// The accumulated transform, in either state.
    pub fn transform(&self) -> AffineTransform3D {
        *self.state.transform()
    }

    pub fn source_pair(&self) -> Option<&SourcePair> {
        match &self.state {
            ImageState::Bound { pair, .. } => Some(pair),
            ImageState::Pending(_) => None,
        }
    }

    /// Voxel-to-world transform of a resolution level.
    pub fn source_transform(&self, level: usize) -> Option<AffineTransform3D> {
        let pair = self.source_pair()?;
        let native = pair.source.source_transform(level)?;
        Some(self.transform().after(&native))
    }

    /// Create the source pair from an opened handle.
    ///
    /// Transforms collected while pending carry over. Binding again replaces
    /// the source pair but keeps the transform.
    pub fn bind(&mut self, handle: &ImageHandle) -> Result<(), ProbeError> {
        let mut pair = handle.source_pair(&self.name, self.channel)?;
        if let Some(voxel_size) = &self.voxel_size {
            let calibration = voxel_size.calibration();
            pair.source.calibration = calibration;
            pair.source.unit = voxel_size.unit.clone();
            pair.volatile.calibration = calibration;
            pair.volatile.unit = voxel_size.unit.clone();
        }

        let transform = self.transform();
        debug!("Binding {} with transform {}", self.name, transform);
        self.state = ImageState::Bound { pair, transform };
        Ok(())
    }

    /// Open the image through `registry` and bind it.
    pub async fn open<O: ImageOpener>(
        &mut self,
        registry: &ImageRegistry<O>,
    ) -> Result<(), ProbeError> {
        let handle = registry
            .get_image(&self.path)
            .await
            .map_err(|source| ProbeError::Open {
                path: self.path.clone(),
                source,
            })?;
        self.bind(&handle)
    }

    /// Apply `transform` after everything applied so far.
    pub fn apply_transform(&mut self, transform: &AffineTransform3D) {
        if !transform.is_identity() {
            self.state.transform_mut().pre_concatenate(transform);

            if let Some(mask) = self.mask.take() {
                self.mask = transform.inverse().and_then(|inv| mask.transform(&inv));
                if self.mask.is_none() {
                    warn!(
                        "Singular transform applied to {}, dropping its mask",
                        self.name
                    );
                }
            }
        }

        let current = self.transform();
        for listener in &self.listeners {
            listener.transformed(&self.name, &current);
        }
    }

    /// The spatial mask, derived from the bound source on first request.
    ///
    /// Returns `None` while pending and no mask was set.
    pub fn mask(&mut self) -> Option<RealMask> {
        if self.mask.is_none() {
            let (min, max) = self.source_pair()?.source.physical_extent()?;
            self.mask = Some(RealMask::with_placement(min, max, self.transform()));
        }
        self.mask
    }

    /// The cached mask without deriving one.
    pub fn cached_mask(&self) -> Option<&RealMask> {
        self.mask.as_ref()
    }

    pub fn set_mask(&mut self, mask: RealMask) {
        self.mask = Some(mask);
    }
}

// =============================================================================
// Tests
// =============================================================================
