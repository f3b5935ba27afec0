//! Driver factory that keeps handles to the simulators it creates.

use dashmap::DashMap;
use std::sync::Arc;
use tracing::debug;
use uwb_discovery::{DiscoveryError, DriverFactory};
use uwb_session::{DeviceIdentity, SimulatedDriver, UwbDriver};

/// Opens simulator drivers and remembers them by instance, so the service
/// can drive ranging rounds on the devices discovery instantiated.
#[derive(Debug, Default)]
pub struct SimulatorFactory {
    drivers: DashMap<u32, Arc<SimulatedDriver>>,
}

impl SimulatorFactory {
    pub fn new() -> Self {
        Self::default()
    }

    /// The driver most recently opened for `instance_id`
    pub fn driver(&self, instance_id: u32) -> Option<Arc<SimulatedDriver>> {
        self.drivers.get(&instance_id).map(|entry| entry.value().clone())
    }

    /// The simulator behind `identity`, if it is one this factory opened
    pub fn driver_for(&self, identity: &DeviceIdentity) -> Option<Arc<SimulatedDriver>> {
        match identity {
            DeviceIdentity::Simulator { instance_id } => self.driver(*instance_id),
            DeviceIdentity::Host { .. } => None,
        }
    }
}

impl DriverFactory for SimulatorFactory {
    fn create(&self, identity: &DeviceIdentity) -> Result<Arc<dyn UwbDriver>, DiscoveryError> {
        let DeviceIdentity::Simulator { instance_id } = identity else {
            return Err(DiscoveryError::Unsupported(identity.clone()));
        };
        // A re-arrival gets a fresh controller with no sessions
        let driver = Arc::new(SimulatedDriver::new(*instance_id));
        self.drivers.insert(*instance_id, driver.clone());
        debug!("Opened simulator driver {}", instance_id);
        Ok(driver)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_factory_tracks_drivers() {
        let factory = SimulatorFactory::new();
        let identity = DeviceIdentity::simulator(3);
        factory.create(&identity).unwrap();
        assert!(factory.driver_for(&identity).is_some());
        assert!(factory.driver(4).is_none());
    }

    #[test]
    fn test_host_devices_rejected() {
        let factory = SimulatorFactory::new();
        let result = factory.create(&DeviceIdentity::host("/dev/uwb0"));
        assert!(matches!(result, Err(DiscoveryError::Unsupported(_))));
    }
}
