//! Discovery errors

use std::path::PathBuf;
use thiserror::Error;
use uwb_fira::UwbStatus;
use uwb_session::{DeviceIdentity, TaskQueueError};

/// Errors raised while discovering or instantiating devices
#[derive(Error, Debug)]
pub enum DiscoveryError {
    /// A device directory could not be listed
    #[error("failed to probe {path}: {source}")]
    Probe {
        /// Directory probed
        path: PathBuf,
        /// OS error
        #[source]
        source: std::io::Error,
    },

    /// The probe reported a failure of its own
    #[error("probe failed: {0}")]
    ProbeFailed(String),

    /// Polling needs a tokio runtime
    #[error("no tokio runtime available to run the discovery agent")]
    NoRuntime,

    /// No driver is available for the identity's kind
    #[error("no driver for device {0}")]
    Unsupported(DeviceIdentity),

    /// The device's event thread could not be started
    #[error(transparent)]
    Device(#[from] TaskQueueError),

    /// The controller rejected a command
    #[error("device {identity} returned {status}")]
    Status {
        /// Device that failed
        identity: DeviceIdentity,
        /// Controller status
        status: UwbStatus,
    },
}
