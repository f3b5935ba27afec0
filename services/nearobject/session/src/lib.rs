//! UWB device and session lifecycle for nearobject.
//!
//! This crate models the controller side of FiRa ranging: a [`UwbDevice`]
//! wraps a [`UwbDriver`] and hands out [`UwbSession`]s, listeners subscribe
//! through non-owning [`CallbackRegistry`]s, and controller notifications are
//! dispatched on each device's [`TaskQueue`] thread.
//!
//! ## Features
//!
//! - **Device lifecycle**: `Ready -> Active -> Error`, with reset out of `Error`
//! - **Session lifecycle**: `Deinit -> Init -> Idle <-> Active`
//! - **Idempotent ranging**: start/stop are compare-and-swap transitions
//! - **Weak listeners**: dropping a listener silently unsubscribes it
//! - **Simulator**: an in-process [`SimulatedDriver`] for tests and demos
//!
//! ## Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use uwb_fira::{Channel, DeviceRole, UwbConfiguration};
//! use uwb_session::{RandomSessionIdGenerator, SimulatedDriver, UwbDevice};
//!
//! # fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let driver = Arc::new(SimulatedDriver::new(1));
//! let device = UwbDevice::new(driver.identity(), driver, Box::new(RandomSessionIdGenerator))?;
//! device.initialize()?;
//!
//! let session = device.create_session(None)?;
//! session.configure(&UwbConfiguration {
//!     device_role: Some(DeviceRole::Initiator),
//!     channel: Some(Channel::C9),
//!     ..Default::default()
//! })?;
//! session.start_ranging()?;
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod callbacks;
pub mod device;
pub mod driver;
pub mod error;
pub mod identity;
pub mod session;
pub mod session_id;
pub mod simulated;
pub mod task_queue;

// Re-export main types
pub use callbacks::{CallbackRegistry, UwbDeviceEventCallbacks, UwbSessionEventCallbacks};
pub use device::UwbDevice;
pub use driver::{MulticastAction, NotificationSink, UwbDeviceInfo, UwbDriver};
pub use error::TaskQueueError;
pub use identity::{DeviceIdentity, DeviceKind};
pub use session::UwbSession;
pub use session_id::{RandomSessionIdGenerator, SequentialSessionIdGenerator, SessionIdGenerator};
pub use simulated::{DriverCommand, SimulatedDriver};
pub use task_queue::TaskQueue;
