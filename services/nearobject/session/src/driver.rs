//! The seam between the lifecycle model and a UWB controller.

use std::sync::Arc;
use uwb_fira::{UwbCapability, UwbMacAddress, UwbNotificationData, UwbStatus, UwbVersion};
use uwb_tlv::TlvSimple;

/// Callback the driver invokes for every controller notification.
///
/// Drivers may call it from their own I/O thread.
pub type NotificationSink = Arc<dyn Fn(UwbNotificationData) + Send + Sync>;

/// Multicast list update operation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MulticastAction {
    /// Add controlees
    Add,
    /// Remove controlees
    Delete,
}

/// Controller identification
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct UwbDeviceInfo {
    /// UCI generic version
    pub uci_version: UwbVersion,
    /// MAC layer version
    pub mac_version: UwbVersion,
    /// PHY layer version
    pub phy_version: UwbVersion,
    /// Vendor-specific bytes
    pub vendor_specific: Vec<u8>,
}

/// Commands a UWB controller accepts.
///
/// Every call is synchronous and reports the controller's status on failure.
pub trait UwbDriver: Send + Sync + std::fmt::Debug {
    /// Bring the controller up
    fn initialize(&self) -> Result<(), UwbStatus>;

    /// Reset the controller. Sessions are dropped and it must be initialized again.
    fn reset(&self) -> Result<(), UwbStatus>;

    /// Controller identification
    fn device_info(&self) -> Result<UwbDeviceInfo, UwbStatus>;

    /// Controller capabilities
    fn capabilities(&self) -> Result<UwbCapability, UwbStatus>;

    /// Create a session with the given id
    fn session_init(&self, session_id: u32) -> Result<(), UwbStatus>;

    /// Destroy a session
    fn session_deinit(&self, session_id: u32) -> Result<(), UwbStatus>;

    /// Apply UCI application configuration to a session
    fn set_app_config(&self, session_id: u32, params: &[TlvSimple]) -> Result<(), UwbStatus>;

    /// Start ranging on a configured session
    fn start_ranging(&self, session_id: u32) -> Result<(), UwbStatus>;

    /// Stop ranging
    fn stop_ranging(&self, session_id: u32) -> Result<(), UwbStatus>;

    /// Add or remove controlees
    fn update_multicast_list(
        &self,
        session_id: u32,
        action: MulticastAction,
        controlees: &[UwbMacAddress],
    ) -> Result<(), UwbStatus>;

    /// Route notifications to `sink`, replacing any previous sink
    fn set_notification_sink(&self, sink: NotificationSink);
}
