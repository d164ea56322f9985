//! Surface compositor primitive consumed by the stacking registry.

use std::sync::Arc;

use crate::stacking::StackingKey;

/// Arguments for creating a compositor surface.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct SurfaceSpec {
    pub name: Option<String>,
    pub width: i32,
    pub height: i32,
    pub format: i32,
    pub flags: u32,
}

impl SurfaceSpec {
    pub fn new(name: impl Into<String>, width: i32, height: i32) -> Self {
        Self {
            name: Some(name.into()),
            width,
            height,
            ..Default::default()
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CompositorError {
    #[error("out of compositor resources")]
    ResourceExhausted,
    #[error("compositor rejected the request: {0}")]
    Rejected(String),
}

/// The underlying surface compositor.
///
/// Surfaces are opaque handles. The stacking registry keeps one clone of every handle it creates
/// for re-stamping and hands another one to the caller for content operations.
pub trait Compositor {
    type Session;
    type Surface: Clone;

    fn create_surface(
        &self,
        session: &Self::Session,
        spec: &SurfaceSpec,
    ) -> Result<Self::Surface, CompositorError>;

    fn set_stacking_key(
        &self,
        surface: &Self::Surface,
        key: StackingKey,
    ) -> Result<(), CompositorError>;

    fn destroy(&self, surface: &Self::Surface);

    fn release(&self, surface: &Self::Surface);
}

impl<T: Compositor + ?Sized> Compositor for Arc<T> {
    type Session = T::Session;
    type Surface = T::Surface;

    fn create_surface(
        &self,
        session: &Self::Session,
        spec: &SurfaceSpec,
    ) -> Result<Self::Surface, CompositorError> {
        (**self).create_surface(session, spec)
    }

    fn set_stacking_key(
        &self,
        surface: &Self::Surface,
        key: StackingKey,
    ) -> Result<(), CompositorError> {
        (**self).set_stacking_key(surface, key)
    }

    fn destroy(&self, surface: &Self::Surface) {
        (**self).destroy(surface)
    }

    fn release(&self, surface: &Self::Surface) {
        (**self).release(surface)
    }
}
