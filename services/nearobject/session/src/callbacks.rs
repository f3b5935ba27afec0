//! Listener traits and the weak callback registry.

use crate::identity::DeviceIdentity;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use uwb_fira::{
    UwbDeviceState, UwbMacAddress, UwbRangingMeasurement, UwbSessionReasonCode, UwbSessionStatus,
    UwbStatus,
};

/// Session event listener. Every method defaults to a no-op.
pub trait UwbSessionEventCallbacks: Send + Sync {
    /// The session was torn down, by the host or the controller
    fn on_session_ended(&self, _session_id: u32, _reason: UwbSessionReasonCode) {}

    /// Ranging started
    fn on_ranging_started(&self, _session_id: u32) {}

    /// Ranging stopped
    fn on_ranging_stopped(&self, _session_id: u32) {}

    /// A ranging round produced new peer measurements
    fn on_peer_properties_changed(&self, _session_id: u32, _measurements: &[UwbRangingMeasurement]) {}

    /// Peers joined or left the session
    fn on_session_membership_changed(
        &self,
        _session_id: u32,
        _peers_added: &[UwbMacAddress],
        _peers_removed: &[UwbMacAddress],
    ) {
    }
}

/// Device event listener. Every method defaults to a no-op.
pub trait UwbDeviceEventCallbacks: Send + Sync {
    /// The device changed state
    fn on_device_state_changed(&self, _device: &DeviceIdentity, _state: UwbDeviceState) {}

    /// The controller reported a generic status
    fn on_status_changed(&self, _device: &DeviceIdentity, _status: UwbStatus) {}

    /// The controller reported a session state change
    fn on_session_status_changed(&self, _device: &DeviceIdentity, _status: &UwbSessionStatus) {}
}

/// Thread-safe fan-out to listeners held by weak reference.
///
/// The registry never keeps a listener alive. Listeners that have been
/// dropped are skipped and pruned on the next notification.
pub struct CallbackRegistry<L: ?Sized> {
    listeners: Mutex<Vec<Weak<L>>>,
}

impl<L: ?Sized> CallbackRegistry<L> {
    /// Create an empty registry
    pub fn new() -> Self {
        Self {
            listeners: Mutex::new(Vec::new()),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Vec<Weak<L>>> {
        self.listeners.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Subscribe `listener` without taking ownership of it
    pub fn register(&self, listener: &Arc<L>) {
        self.lock().push(Arc::downgrade(listener));
    }

    /// Unsubscribe `listener`; returns whether it was registered
    pub fn unregister(&self, listener: &Arc<L>) -> bool {
        let mut listeners = self.lock();
        let before = listeners.len();
        listeners.retain(|weak| !std::ptr::addr_eq(weak.as_ptr(), Arc::as_ptr(listener)));
        listeners.len() != before
    }

    /// Strong references to every live listener, pruning dead ones
    pub fn snapshot(&self) -> Vec<Arc<L>> {
        let mut listeners = self.lock();
        let live: Vec<Arc<L>> = listeners.iter().filter_map(Weak::upgrade).collect();
        listeners.retain(|weak| weak.strong_count() > 0);
        live
    }

    /// Invoke `f` on every live listener outside the registry lock.
    ///
    /// Returns the number of listeners notified.
    pub fn notify(&self, mut f: impl FnMut(&L)) -> usize {
        let live = self.snapshot();
        for listener in &live {
            f(listener);
        }
        live.len()
    }

    /// Number of registered listeners that are still alive
    pub fn live_count(&self) -> usize {
        self.lock().iter().filter(|w| w.strong_count() > 0).count()
    }
}

impl<L: ?Sized> Default for CallbackRegistry<L> {
    fn default() -> Self {
        Self::new()
    }
}

impl<L: ?Sized> std::fmt::Debug for CallbackRegistry<L> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CallbackRegistry")
            .field("live", &self.live_count())
            .finish()
    }
}
