//! Tracking of which container currently owns the display focus.
//!
//! The [`FocusTracker`] keeps the process-wide belief about the focused container. It is fed by
//! an external event stream carrying container ids as decimal strings, and fans every accepted
//! event out to the subscribed [`ContainerFocusListener`]s.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use stratum_config::container::DEFAULT_FOCUS_EVENT;

use crate::container::{
    ActiveContainerFile, ActiveContainerSource, ContainerId, ContainerIdentity, PropertyFile,
};
use crate::uevent::UEvent;

/// Receives focus change notifications.
pub trait ContainerFocusListener: Send + Sync {
    /// Called with the newly focused container on every accepted focus event, including ones
    /// that report the already focused container.
    fn container_focus_changed(&self, focused: ContainerId);
}

impl<F> ContainerFocusListener for F
where
    F: Fn(ContainerId) + Send + Sync,
{
    fn container_focus_changed(&self, focused: ContainerId) {
        self(focused)
    }
}

/// Focused container together with whether it is the local one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FocusState {
    focused: ContainerId,
    local: bool,
}

impl FocusState {
    pub fn new(focused: ContainerId, identity: ContainerId) -> Self {
        Self {
            focused,
            local: focused == identity,
        }
    }

    pub fn focused_container(&self) -> ContainerId {
        self.focused
    }

    pub fn is_local_container_focused(&self) -> bool {
        self.local
    }

    // Both halves live in one word so readers never see them disagree.
    fn to_bits(self) -> u64 {
        u64::from(self.focused.0 as u32) | (u64::from(self.local) << 32)
    }

    fn from_bits(bits: u64) -> Self {
        Self {
            focused: ContainerId(bits as u32 as i32),
            local: bits & (1 << 32) != 0,
        }
    }
}

/// Set of focus listeners.
///
/// Listeners are compared by pointer, so the same `Arc` is only ever stored once.
#[derive(Default)]
pub struct ListenerSet {
    listeners: Mutex<Vec<Arc<dyn ContainerFocusListener>>>,
}

impl ListenerSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a listener. Returns `false` if it was already present.
    pub fn insert(&self, listener: Arc<dyn ContainerFocusListener>) -> bool {
        let mut listeners = self.listeners.lock().unwrap();
        if listeners.iter().any(|x| same_listener(x, &listener)) {
            return false;
        }

        listeners.push(listener);
        true
    }

    /// Removes a listener. Returns `false` if it was not present.
    pub fn remove<L: ContainerFocusListener + ?Sized>(&self, listener: &Arc<L>) -> bool {
        let mut listeners = self.listeners.lock().unwrap();
        let len = listeners.len();
        listeners.retain(|x| !same_listener(x, listener));
        listeners.len() != len
    }

    /// Returns a copy of the current listeners, to be notified without holding the lock.
    pub fn snapshot(&self) -> Vec<Arc<dyn ContainerFocusListener>> {
        self.listeners.lock().unwrap().clone()
    }

    pub fn len(&self) -> usize {
        self.listeners.lock().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl fmt::Debug for ListenerSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ListenerSet")
            .field("len", &self.len())
            .finish()
    }
}

fn same_listener<A: ?Sized, B: ?Sized>(a: &Arc<A>, b: &Arc<B>) -> bool {
    Arc::as_ptr(a).cast::<()>() == Arc::as_ptr(b).cast::<()>()
}

/// Process-wide belief about the focused container.
pub struct FocusTracker {
    identity: ContainerIdentity,
    oracle: Box<dyn ActiveContainerSource>,
    event_name: String,
    state: AtomicU64,
    listeners: ListenerSet,
    /// Serializes event delivery, so listeners see events in arrival order.
    delivery: Mutex<()>,
}

impl FocusTracker {
    /// Creates a tracker, taking the initial focused container from `oracle`.
    pub fn new(identity: ContainerIdentity, oracle: impl ActiveContainerSource + 'static) -> Self {
        let focused = oracle.current();
        let state = FocusState::new(focused, identity.get());
        debug!(
            "container {}: initially focused container is {focused}",
            identity.get()
        );

        Self {
            identity,
            oracle: Box::new(oracle),
            event_name: String::from(DEFAULT_FOCUS_EVENT),
            state: AtomicU64::new(state.to_bits()),
            listeners: ListenerSet::new(),
            delivery: Mutex::new(()),
        }
    }

    pub fn from_config(config: &stratum_config::Container) -> Self {
        let identity = ContainerIdentity::new(
            config.identity_property.clone(),
            PropertyFile::new(&config.property_file),
        );
        let oracle = ActiveContainerFile::new(&config.active_path);
        Self::new(identity, oracle).with_event_name(config.focus_event.clone())
    }

    /// Sets the name of the event carrying focus changes.
    pub fn with_event_name(mut self, name: impl Into<String>) -> Self {
        self.event_name = name.into();
        self
    }

    pub fn event_name(&self) -> &str {
        &self.event_name
    }

    pub fn state(&self) -> FocusState {
        FocusState::from_bits(self.state.load(Ordering::SeqCst))
    }

    pub fn is_local_container_focused(&self) -> bool {
        self.state().is_local_container_focused()
    }

    pub fn container_identity(&self) -> ContainerId {
        self.identity.get()
    }

    /// Reads the active container straight from the oracle.
    ///
    /// Returns [`ContainerId::NONE`] if the oracle cannot be read or parsed.
    pub fn current_focused_container_id(&self) -> ContainerId {
        self.oracle.current()
    }

    pub fn subscribe(&self, listener: Arc<dyn ContainerFocusListener>) {
        self.listeners.insert(listener);
    }

    pub fn unsubscribe<L: ContainerFocusListener + ?Sized>(&self, listener: &Arc<L>) {
        self.listeners.remove(listener);
    }

    pub fn listeners(&self) -> &ListenerSet {
        &self.listeners
    }

    /// Handles a focus event payload.
    ///
    /// Malformed tokens are dropped without touching the state or notifying anyone. Every
    /// well-formed token updates the state and notifies all listeners, even if the focused
    /// container did not change.
    ///
    /// Concurrent events are applied and delivered one at a time, in the order they take the
    /// delivery lock. Listeners may subscribe and unsubscribe from their callback, but must not
    /// feed events back into the tracker, as that deadlocks.
    pub fn on_external_focus_event(&self, token: &str) {
        let _span = tracy_client::span!("FocusTracker::on_external_focus_event");

        info!("{}: {token:?}", self.event_name);

        let focused = match token.parse::<ContainerId>() {
            Ok(id) => id,
            Err(err) => {
                warn!("ignoring malformed focus event {token:?}: {err}");
                return;
            }
        };

        let identity = self.container_identity();
        let _delivery = self.delivery.lock().unwrap();

        let new = FocusState::new(focused, identity);
        let old = FocusState::from_bits(self.state.swap(new.to_bits(), Ordering::SeqCst));

        if old.local != new.local {
            if new.local {
                debug!("container {identity} gained focus");
            } else {
                debug!("container {identity} lost focus to container {focused}");
            }
        }

        for listener in self.listeners.snapshot() {
            listener.container_focus_changed(focused);
        }
    }

    /// Handles a named event, reacting only to the focus event name.
    ///
    /// Returns whether the event was a focus event.
    pub fn handle_event(&self, name: &str, token: &str) -> bool {
        if name != self.event_name {
            return false;
        }

        self.on_external_focus_event(token);
        true
    }

    /// Handles a uevent, reacting only if it carries the focus event key.
    ///
    /// Returns whether the event was a focus event.
    pub fn handle_uevent(&self, event: &UEvent) -> bool {
        match event.get(&self.event_name) {
            Some(token) => {
                self.on_external_focus_event(token);
                true
            }
            None => false,
        }
    }
}

impl fmt::Debug for FocusTracker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FocusTracker")
            .field("identity", &self.identity)
            .field("event_name", &self.event_name)
            .field("state", &self.state())
            .field("listeners", &self.listeners)
            .finish_non_exhaustive()
    }
}
