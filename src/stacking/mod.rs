//! Z-order arbitration between containers.
//!
//! Every surface of this container gets a single global stacking key:
//!
//! ```text
//! key = base_layer + container_id * container_span + (focused ? focus_bonus : 0)
//! ```
//!
//! The span keeps the containers apart from each other, and the bonus lifts the whole focused
//! container above all unfocused ones. Focus changes only flip the bonus term, so the order of
//! surfaces within a container never changes.
//!
//! The [`SurfaceStackingRegistry`] owns the live surfaces and re-stamps all of them whenever the
//! container gains or loses focus. Every registry operation is serialized by one lock, so a
//! surface created during a focus change is never stamped with a stale focus state.

use std::collections::HashMap;
use std::fmt;
use std::sync::Mutex;

use crate::compositor::{Compositor, CompositorError, SurfaceSpec};
use crate::container::ContainerId;
use crate::utils::id::IdCounter;

mod bridge;
pub use bridge::FocusBridge;


/// Flat z-order value understood by the compositor. Higher draws on top.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct StackingKey(pub i32);

impl StackingKey {
    pub fn get(self) -> i32 {
        self.0
    }
}

impl fmt::Display for StackingKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.0, f)
    }
}

static SURFACE_ID_COUNTER: IdCounter = IdCounter::new();

/// Process-unique id of a tracked surface.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SurfaceId(u64);

impl SurfaceId {
    fn next() -> Self {
        Self(SURFACE_ID_COUNTER.next())
    }

    pub fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for SurfaceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.0, f)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum PolicyError {
    #[error("container span must be positive, got {0}")]
    NonPositiveSpan(i32),
    #[error("focus bonus {bonus} does not dominate a single container span of {span}")]
    BonusTooSmall { bonus: i32, span: i32 },
    #[error("focus bonus {bonus} leaves no room for a container span of {span}")]
    BonusTooLarge { bonus: i32, span: i32 },
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StackingError {
    #[error(transparent)]
    Compositor(#[from] CompositorError),
    #[error(transparent)]
    Policy(#[from] PolicyError),
    #[error("surface {0} is not tracked by this registry")]
    UnknownSurface(SurfaceId),
    #[error("base layer {layer} is outside of 0..{span}")]
    LayerOutOfRange { layer: i32, span: i32 },
    #[error("container {id} is outside of 0..={max}")]
    ContainerOutOfRange { id: ContainerId, max: i32 },
}

/// Compositor failures of a single focus sweep.
///
/// The sweep keeps going past failing surfaces. Each failed surface keeps its previous stacking
/// key, and is retried by the next sweep.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("failed to restack {} surface(s)", .failures.len())]
pub struct SweepError {
    /// Failed surfaces, sorted by id.
    pub failures: Vec<(SurfaceId, CompositorError)>,
}

/// Encoding constants for stacking keys.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StackingPolicy {
    container_span: i32,
    focus_bonus: i32,
    max_container_id: i32,
}

impl StackingPolicy {
    /// Validates the constants and derives the largest usable container id.
    ///
    /// The id bound is the largest one for which the focused container still dominates every
    /// unfocused one, and the highest focused key still fits in an `i32`.
    pub fn new(container_span: i32, focus_bonus: i32) -> Result<Self, PolicyError> {
        if container_span <= 0 {
            return Err(PolicyError::NonPositiveSpan(container_span));
        }

        let span = i64::from(container_span);
        let bonus = i64::from(focus_bonus);

        // (max + 1) * span <= bonus
        let dominance_limit = bonus / span - 1;
        if bonus <= 0 || dominance_limit < 0 {
            return Err(PolicyError::BonusTooSmall {
                bonus: focus_bonus,
                span: container_span,
            });
        }

        // (max + 1) * span + bonus - 1 <= i32::MAX
        let overflow_limit = (i64::from(i32::MAX) - bonus + 1) / span - 1;
        if overflow_limit < 0 {
            return Err(PolicyError::BonusTooLarge {
                bonus: focus_bonus,
                span: container_span,
            });
        }

        Ok(Self {
            container_span,
            focus_bonus,
            max_container_id: dominance_limit.min(overflow_limit) as i32,
        })
    }

    pub fn from_config(config: &stratum_config::Stacking) -> Result<Self, PolicyError> {
        Self::new(config.container_span, config.focus_bonus)
    }

    pub fn container_span(&self) -> i32 {
        self.container_span
    }

    pub fn focus_bonus(&self) -> i32 {
        self.focus_bonus
    }

    pub fn max_container_id(&self) -> i32 {
        self.max_container_id
    }

    pub fn check_container(&self, id: ContainerId) -> Result<(), StackingError> {
        if (0..=self.max_container_id).contains(&id.get()) {
            Ok(())
        } else {
            Err(StackingError::ContainerOutOfRange {
                id,
                max: self.max_container_id,
            })
        }
    }

    pub fn check_layer(&self, layer: i32) -> Result<(), StackingError> {
        if (0..self.container_span).contains(&layer) {
            Ok(())
        } else {
            Err(StackingError::LayerOutOfRange {
                layer,
                span: self.container_span,
            })
        }
    }

    /// Returns the offset added to every base layer of `container`.
    pub fn container_offset(
        &self,
        container: ContainerId,
        focused: bool,
    ) -> Result<i32, StackingError> {
        self.check_container(container)?;
        Ok(self.offset(container, focused))
    }

    pub fn stacking_key(
        &self,
        container: ContainerId,
        focused: bool,
        base_layer: i32,
    ) -> Result<StackingKey, StackingError> {
        self.check_container(container)?;
        self.check_layer(base_layer)?;
        Ok(self.encode(container, focused, base_layer))
    }

    fn offset(&self, container: ContainerId, focused: bool) -> i32 {
        let bonus = if focused { self.focus_bonus } else { 0 };
        container.get() * self.container_span + bonus
    }

    // Both inputs must have been checked against the bounds.
    fn encode(&self, container: ContainerId, focused: bool, base_layer: i32) -> StackingKey {
        StackingKey(base_layer + self.offset(container, focused))
    }
}

impl Default for StackingPolicy {
    fn default() -> Self {
        let config = stratum_config::Stacking::default();
        Self::new(config.container_span, config.focus_bonus).unwrap()
    }
}

/// Caller side of a tracked surface.
///
/// Gives access to the compositor surface for content operations. Destroying or releasing the
/// surface consumes the handle, so it cannot be done twice.
#[derive(Debug)]
pub struct TrackedSurfaceHandle<S> {
    id: SurfaceId,
    surface: S,
}

impl<S> TrackedSurfaceHandle<S> {
    pub fn id(&self) -> SurfaceId {
        self.id
    }

    pub fn surface(&self) -> &S {
        &self.surface
    }
}

/// Diagnostic view of a tracked surface.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SurfaceInfo {
    pub id: SurfaceId,
    pub name: String,
    pub base_layer: i32,
    pub stacking_key: StackingKey,
}

struct TrackedSurface<S> {
    surface: S,
    name: String,
    base_layer: i32,
    /// Last key successfully written to the compositor.
    stacking_key: StackingKey,
}

impl<S> TrackedSurface<S> {
    fn info(&self, id: SurfaceId) -> SurfaceInfo {
        SurfaceInfo {
            id,
            name: self.name.clone(),
            base_layer: self.base_layer,
            stacking_key: self.stacking_key,
        }
    }
}

struct RegistryState<S> {
    focused: bool,
    /// Some surfaces failed to pick up the current focus state.
    stale: bool,
    surfaces: HashMap<SurfaceId, TrackedSurface<S>>,
}

/// Live surfaces of one container, stamped with keys for the current focus state.
pub struct SurfaceStackingRegistry<C: Compositor> {
    compositor: C,
    policy: StackingPolicy,
    container: ContainerId,
    trace_surfaces: bool,
    state: Mutex<RegistryState<C::Surface>>,
}

impl<C: Compositor> SurfaceStackingRegistry<C> {
    pub fn new(
        compositor: C,
        policy: StackingPolicy,
        container: ContainerId,
        focused: bool,
    ) -> Result<Self, StackingError> {
        policy.check_container(container)?;

        Ok(Self {
            compositor,
            policy,
            container,
            trace_surfaces: false,
            state: Mutex::new(RegistryState {
                focused,
                stale: false,
                surfaces: HashMap::new(),
            }),
        })
    }

    pub fn from_config(
        compositor: C,
        config: &stratum_config::Config,
        container: ContainerId,
        focused: bool,
    ) -> Result<Self, StackingError> {
        let policy = StackingPolicy::from_config(&config.stacking)?;
        let registry = Self::new(compositor, policy, container, focused)?;
        Ok(registry.with_surface_trace(config.debug.trace_surfaces))
    }

    /// Enables per-surface trace logging during focus sweeps.
    pub fn with_surface_trace(mut self, trace_surfaces: bool) -> Self {
        self.trace_surfaces = trace_surfaces;
        self
    }

    pub fn compositor(&self) -> &C {
        &self.compositor
    }

    pub fn container(&self) -> ContainerId {
        self.container
    }

    pub fn policy(&self) -> &StackingPolicy {
        &self.policy
    }

    pub fn is_focused(&self) -> bool {
        self.state.lock().unwrap().focused
    }

    /// Returns whether a sweep to `focused` would change anything.
    ///
    /// This is the case when the focus state differs, or when an earlier sweep left some
    /// surfaces behind.
    pub fn needs_sweep(&self, focused: bool) -> bool {
        let state = self.state.lock().unwrap();
        state.focused != focused || state.stale
    }

    pub fn len(&self) -> usize {
        self.state.lock().unwrap().surfaces.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn surface_info(&self, handle: &TrackedSurfaceHandle<C::Surface>) -> Option<SurfaceInfo> {
        let state = self.state.lock().unwrap();
        state
            .surfaces
            .get(&handle.id)
            .map(|tracked| tracked.info(handle.id))
    }

    /// Returns all tracked surfaces, sorted by id.
    pub fn snapshot(&self) -> Vec<SurfaceInfo> {
        let state = self.state.lock().unwrap();
        let mut infos: Vec<_> = state
            .surfaces
            .iter()
            .map(|(id, tracked)| tracked.info(*id))
            .collect();
        infos.sort_by_key(|info| info.id);
        infos
    }

    /// Creates a compositor surface stamped for the current focus state and starts tracking it.
    ///
    /// On failure nothing stays registered, and a surface the compositor already created is
    /// destroyed again.
    pub fn create_surface(
        &self,
        session: &C::Session,
        spec: &SurfaceSpec,
        base_layer: i32,
    ) -> Result<TrackedSurfaceHandle<C::Surface>, StackingError> {
        let _span = tracy_client::span!("SurfaceStackingRegistry::create_surface");

        self.policy.check_layer(base_layer)?;

        let mut state = self.state.lock().unwrap();
        let key = self.policy.encode(self.container, state.focused, base_layer);

        let surface = self.compositor.create_surface(session, spec)?;
        if let Err(err) = self.compositor.set_stacking_key(&surface, key) {
            self.compositor.destroy(&surface);
            return Err(err.into());
        }

        let id = SurfaceId::next();
        let name = spec.name.clone().unwrap_or_else(|| String::from("Not named"));
        if self.trace_surfaces {
            trace!("surface {id} {name:?}: created at layer {base_layer}, key {key}");
        }

        state.surfaces.insert(
            id,
            TrackedSurface {
                surface: surface.clone(),
                name,
                base_layer,
                stacking_key: key,
            },
        );

        Ok(TrackedSurfaceHandle { id, surface })
    }

    /// Moves a surface to a new base layer, keeping it in the current focus state.
    ///
    /// On compositor failure the surface keeps its previous layer and key.
    pub fn set_base_layer(
        &self,
        handle: &TrackedSurfaceHandle<C::Surface>,
        base_layer: i32,
    ) -> Result<StackingKey, StackingError> {
        self.policy.check_layer(base_layer)?;

        let mut state = self.state.lock().unwrap();
        let focused = state.focused;
        let tracked = state
            .surfaces
            .get_mut(&handle.id)
            .ok_or(StackingError::UnknownSurface(handle.id))?;

        let key = self.policy.encode(self.container, focused, base_layer);
        self.compositor.set_stacking_key(&tracked.surface, key)?;

        if self.trace_surfaces {
            trace!(
                "surface {} {:?}: layer {} -> {base_layer}, key {key}",
                handle.id,
                tracked.name,
                tracked.base_layer,
            );
        }

        tracked.base_layer = base_layer;
        tracked.stacking_key = key;
        Ok(key)
    }

    pub fn destroy_surface(
        &self,
        handle: TrackedSurfaceHandle<C::Surface>,
    ) -> Result<(), StackingError> {
        let mut state = self.state.lock().unwrap();
        let tracked = Self::untrack(&mut state, &handle)?;
        self.compositor.destroy(&tracked.surface);
        Ok(())
    }

    pub fn release_surface(
        &self,
        handle: TrackedSurfaceHandle<C::Surface>,
    ) -> Result<(), StackingError> {
        let mut state = self.state.lock().unwrap();
        let tracked = Self::untrack(&mut state, &handle)?;
        self.compositor.release(&tracked.surface);
        Ok(())
    }

    fn untrack(
        state: &mut RegistryState<C::Surface>,
        handle: &TrackedSurfaceHandle<C::Surface>,
    ) -> Result<TrackedSurface<C::Surface>, StackingError> {
        state
            .surfaces
            .remove(&handle.id)
            .ok_or(StackingError::UnknownSurface(handle.id))
    }

    /// Lifts every surface of this container above all unfocused containers.
    pub fn request_container_focus(&self) -> Result<(), SweepError> {
        self.sweep(true)
    }

    /// Drops every surface of this container back to the unfocused encoding.
    pub fn release_container_focus(&self) -> Result<(), SweepError> {
        self.sweep(false)
    }

    fn sweep(&self, focused: bool) -> Result<(), SweepError> {
        let _span = tracy_client::span!("SurfaceStackingRegistry::sweep");

        let mut state = self.state.lock().unwrap();
        state.focused = focused;

        let mut failures = Vec::new();
        for (id, tracked) in &mut state.surfaces {
            let key = self.policy.encode(self.container, focused, tracked.base_layer);

            match self.compositor.set_stacking_key(&tracked.surface, key) {
                Ok(()) => {
                    if self.trace_surfaces {
                        trace!(
                            "surface {id} {:?}: key {} -> {key}",
                            tracked.name,
                            tracked.stacking_key,
                        );
                    }
                    tracked.stacking_key = key;
                }
                Err(err) => {
                    warn!("error restacking surface {id} {:?}: {err}", tracked.name);
                    failures.push((*id, err));
                }
            }
        }

        state.stale = !failures.is_empty();
        debug!(
            "container {}: {} focus, restacked {} of {} surfaces",
            self.container,
            if focused { "requested" } else { "released" },
            state.surfaces.len() - failures.len(),
            state.surfaces.len(),
        );

        if failures.is_empty() {
            Ok(())
        } else {
            failures.sort_by_key(|(id, _)| *id);
            Err(SweepError { failures })
        }
    }

    #[cfg(test)]
    fn verify_invariants(&self) {
        let state = self.state.lock().unwrap();

        if !state.stale {
            for (id, tracked) in &state.surfaces {
                let expected = self
                    .policy
                    .encode(self.container, state.focused, tracked.base_layer);
                assert_eq!(
                    tracked.stacking_key, expected,
                    "surface {id} must be stamped for the current focus state"
                );
            }
        }

        for (id, tracked) in &state.surfaces {
            assert!(
                (0..self.policy.container_span).contains(&tracked.base_layer),
                "surface {id} base layer must be in range"
            );

            let key = tracked.stacking_key;
            let focused = self.policy.encode(self.container, true, tracked.base_layer);
            let unfocused = self.policy.encode(self.container, false, tracked.base_layer);
            assert!(
                key == focused || key == unfocused,
                "surface {id} key must encode its base layer"
            );
        }
    }
}

impl<C: Compositor> fmt::Debug for SurfaceStackingRegistry<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SurfaceStackingRegistry")
            .field("container", &self.container)
            .field("policy", &self.policy)
            .field("focused", &self.is_focused())
            .field("surfaces", &self.snapshot())
            .finish_non_exhaustive()
    }
}
