//! Device manager: turns presence events into live [`UwbDevice`]s.

use crate::agent::{DiscoveryAgent, PresenceEvent};
use crate::error::DiscoveryError;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use tracing::{debug, error, info, warn};
use uwb_session::{
    CallbackRegistry, DeviceIdentity, RandomSessionIdGenerator, SimulatedDriver, UwbDevice,
    UwbDriver,
};

/// Creates the driver for a newly arrived device
pub trait DriverFactory: Send + Sync {
    /// Open a driver for `identity`
    fn create(&self, identity: &DeviceIdentity) -> Result<Arc<dyn UwbDriver>, DiscoveryError>;
}

/// Opens a [`SimulatedDriver`] for every simulator identity.
///
/// Host devices need a platform driver and are rejected.
#[derive(Debug, Default, Clone, Copy)]
pub struct SimulatedDriverFactory;

impl DriverFactory for SimulatedDriverFactory {
    fn create(&self, identity: &DeviceIdentity) -> Result<Arc<dyn UwbDriver>, DiscoveryError> {
        match identity {
            DeviceIdentity::Simulator { instance_id } => {
                Ok(Arc::new(SimulatedDriver::new(*instance_id)))
            }
            DeviceIdentity::Host { .. } => Err(DiscoveryError::Unsupported(identity.clone())),
        }
    }
}

/// Device manager event listener. Every method defaults to a no-op.
pub trait UwbDeviceManagerCallbacks: Send + Sync {
    /// A device arrived and was instantiated
    fn on_device_added(&self, _device: &Arc<UwbDevice>) {}

    /// A device departed and was released
    fn on_device_removed(&self, _identity: &DeviceIdentity) {}
}

/// Tracks the devices reported by a set of discovery agents
pub struct DeviceManager {
    factory: Arc<dyn DriverFactory>,
    auto_initialize: bool,
    devices: Mutex<Vec<Arc<UwbDevice>>>,
    agents: Mutex<Vec<Arc<DiscoveryAgent>>>,
    callbacks: CallbackRegistry<dyn UwbDeviceManagerCallbacks>,
}

impl DeviceManager {
    /// Create a manager. With `auto_initialize`, new devices are brought up
    /// before listeners hear about them.
    pub fn new(factory: Arc<dyn DriverFactory>, auto_initialize: bool) -> Arc<Self> {
        Arc::new(Self {
            factory,
            auto_initialize,
            devices: Mutex::new(Vec::new()),
            agents: Mutex::new(Vec::new()),
            callbacks: CallbackRegistry::new(),
        })
    }

    fn devices_lock(&self) -> MutexGuard<'_, Vec<Arc<UwbDevice>>> {
        self.devices.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn agents_lock(&self) -> MutexGuard<'_, Vec<Arc<DiscoveryAgent>>> {
        self.agents.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Subscribe to manager events. The registry keeps only a weak reference.
    pub fn register_callbacks(&self, callbacks: &Arc<dyn UwbDeviceManagerCallbacks>) {
        self.callbacks.register(callbacks);
    }

    /// Take over `agent`'s presence callback and track the devices it reports
    pub fn add_agent(self: &Arc<Self>, agent: Arc<DiscoveryAgent>) {
        let manager = Arc::downgrade(self);
        agent.register_presence_callback(Arc::new(move |event: PresenceEvent| {
            if let Some(manager) = manager.upgrade() {
                manager.on_presence(event);
            }
        }));
        debug!("Device manager subscribed to agent '{}'", agent.name());
        self.agents_lock().push(agent);
    }

    /// Agents the manager is subscribed to
    pub fn agents(&self) -> Vec<Arc<DiscoveryAgent>> {
        self.agents_lock().clone()
    }

    /// Start every agent
    pub fn start_discovery(&self) -> Result<(), DiscoveryError> {
        for agent in self.agents() {
            agent.start()?;
        }
        Ok(())
    }

    /// Stop every agent
    pub fn stop_discovery(&self) {
        for agent in self.agents() {
            agent.stop();
        }
    }

    /// Scan every agent once, returning the events observed
    pub async fn scan_all(&self) -> Vec<PresenceEvent> {
        let mut events = Vec::new();
        for agent in self.agents() {
            events.extend(agent.scan().await);
        }
        events
    }

    /// Weak references to every tracked device
    pub fn devices(&self) -> Vec<Weak<UwbDevice>> {
        self.devices_lock().iter().map(Arc::downgrade).collect()
    }

    /// The tracked device with `identity`
    pub fn find(&self, identity: &DeviceIdentity) -> Option<Arc<UwbDevice>> {
        self.devices_lock()
            .iter()
            .find(|device| device.identity() == identity)
            .cloned()
    }

    fn on_presence(&self, event: PresenceEvent) {
        match event {
            PresenceEvent::Arrived(identity) => {
                if self.find(&identity).is_some() {
                    debug!("Device {} already tracked", identity);
                    return;
                }
                // Opened outside the lock, so another agent may have added
                // the same device in the meantime
                let device = match self.open(&identity) {
                    Ok(device) => device,
                    Err(e) => {
                        error!("Failed to add device {}: {}", identity, e);
                        return;
                    }
                };
                let duplicate = {
                    let mut devices = self.devices_lock();
                    if devices.iter().any(|d| d.identity() == &identity) {
                        Some(device.clone())
                    } else {
                        devices.push(device.clone());
                        None
                    }
                };
                match duplicate {
                    Some(_) => debug!("Device {} added concurrently, discarding", identity),
                    None => {
                        info!("Device {} added", identity);
                        self.callbacks.notify(|l| l.on_device_added(&device));
                    }
                }
            }
            PresenceEvent::Departed(identity) => {
                // Released after the lock so teardown never runs under it
                let removed: Vec<Arc<UwbDevice>> = {
                    let mut devices = self.devices_lock();
                    let (gone, kept) = std::mem::take(&mut *devices)
                        .into_iter()
                        .partition(|device| device.identity() == &identity);
                    *devices = kept;
                    gone
                };
                if !removed.is_empty() {
                    drop(removed);
                    info!("Device {} removed", identity);
                    self.callbacks.notify(|l| l.on_device_removed(&identity));
                }
            }
        }
    }

    fn open(&self, identity: &DeviceIdentity) -> Result<Arc<UwbDevice>, DiscoveryError> {
        let driver = self.factory.create(identity)?;
        let device = UwbDevice::new(identity.clone(), driver, Box::new(RandomSessionIdGenerator))?;
        if self.auto_initialize {
            if let Err(status) = device.initialize() {
                warn!("Device {} failed to initialize: {}", identity, status);
                return Err(DiscoveryError::Status {
                    identity: identity.clone(),
                    status,
                });
            }
        }
        Ok(device)
    }
}

impl std::fmt::Debug for DeviceManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DeviceManager")
            .field("devices", &self.devices_lock().len())
            .field("agents", &self.agents_lock().len())
            .field("auto_initialize", &self.auto_initialize)
            .finish()
    }
}
