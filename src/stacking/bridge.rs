use std::sync::Arc;

use super::SurfaceStackingRegistry;
use crate::compositor::Compositor;
use crate::container::ContainerId;
use crate::focus::ContainerFocusListener;

/// Focus listener that restacks a registry when its container gains or loses focus.
///
/// Events that leave the local focus state unchanged are ignored, unless an earlier sweep left
/// surfaces behind, in which case the sweep is retried.
pub struct FocusBridge<C: Compositor> {
    registry: Arc<SurfaceStackingRegistry<C>>,
}

impl<C: Compositor> FocusBridge<C> {
    pub fn new(registry: Arc<SurfaceStackingRegistry<C>>) -> Self {
        Self { registry }
    }

    pub fn registry(&self) -> &Arc<SurfaceStackingRegistry<C>> {
        &self.registry
    }
}

impl<C> ContainerFocusListener for FocusBridge<C>
where
    C: Compositor + Send + Sync,
    C::Surface: Send,
{
    fn container_focus_changed(&self, focused: ContainerId) {
        let local = focused == self.registry.container();
        if !self.registry.needs_sweep(local) {
            return;
        }

        let res = if local {
            self.registry.request_container_focus()
        } else {
            self.registry.release_container_focus()
        };

        if let Err(err) = res {
            warn!("error restacking container {}: {err}", self.registry.container());
        }
    }
}
