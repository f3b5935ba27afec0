//! UWB device discovery for nearobject.
//!
//! A [`DiscoveryAgent`] polls a [`DeviceProbe`] on the tokio runtime and
//! reports [`PresenceEvent`]s. A [`DeviceManager`] subscribes to agents and
//! keeps one [`uwb_session::UwbDevice`] per present device.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod agent;
pub mod error;
pub mod manager;
pub mod probe;

// Re-export main types
pub use agent::{DiscoveryAgent, PresenceCallback, PresenceEvent, DEFAULT_POLL_INTERVAL};
pub use error::DiscoveryError;
pub use manager::{DeviceManager, DriverFactory, SimulatedDriverFactory, UwbDeviceManagerCallbacks};
pub use probe::{DeviceProbe, DirectoryProbe, SimulatedProbe};
