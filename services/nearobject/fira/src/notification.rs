//! Notifications raised by a UWB controller.

use crate::mac_address::UwbMacAddress;
use crate::status::{UwbStatus, UwbStatusRanging};
use std::fmt;

fira_enum! {
    /// Device state reported by the controller
    pub enum UwbDeviceState {
        /// Initialized and idle
        Ready = 0x01,
        /// At least one session is ranging
        Active = 0x02,
        /// Unrecoverable fault; only a reset leaves this state
        Error = 0xFF,
    }
}

fira_enum! {
    /// Session state reported by the controller
    pub enum UwbSessionState {
        /// Session does not exist on the controller
        Deinit = 0x00,
        /// Created, not yet configured
        Init = 0x01,
        /// Ranging
        Active = 0x02,
        /// Configured, not ranging
        Idle = 0x03,
    }
}

fira_enum! {
    /// Why a session changed state
    #[allow(missing_docs)]
    pub enum UwbSessionReasonCode {
        StateChangeWithSessionManagementCommands = 0x00,
        MaxRangingRoundRetryCountReached = 0x01,
        MaxNumberOfMeasurementsReached = 0x02,
        ErrorSlotLengthNotSupported = 0x20,
        ErrorInsufficientSlotsPerRangingRound = 0x21,
        ErrorMacAddressModeNotSupported = 0x22,
        ErrorInvalidRangingInterval = 0x23,
        ErrorInvalidStsConfig = 0x24,
        ErrorInvalidRframeConfig = 0x25,
    }
}

fira_enum! {
    /// Outcome of a multicast list update for one controlee
    #[allow(missing_docs)]
    pub enum UwbStatusMulticast {
        OkMulticastListUpdate = 0x00,
        ErrorMulticastListFull = 0x01,
        ErrorKeyFetchFail = 0x02,
        ErrorSubSessionIdNotFound = 0x03,
    }
}

impl fmt::Display for UwbDeviceState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

impl fmt::Display for UwbSessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// Session state change
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UwbSessionStatus {
    /// Session the change applies to
    pub session_id: u32,
    /// New state
    pub state: UwbSessionState,
    /// Cause of the change
    pub reason: UwbSessionReasonCode,
}

/// Multicast list update result for one controlee
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UwbSessionUpdateMulticastListEntry {
    /// Controlee address
    pub controlee_mac: UwbMacAddress,
    /// Controlee sub-session
    pub sub_session_id: u32,
    /// Update outcome
    pub status: UwbStatusMulticast,
}

/// Result of a multicast list update
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UwbMulticastListStatus {
    /// Session whose list was updated
    pub session_id: u32,
    /// Remaining multicast list capacity
    pub remaining_size: u8,
    /// Per-controlee outcome
    pub statuses: Vec<UwbSessionUpdateMulticastListEntry>,
}

/// An angle of arrival in Q9.7 degrees with its figure of merit
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct UwbAngle {
    /// Signed Q9.7 fixed-point degrees
    pub value_q9_7: i16,
    /// Confidence, 0..=100
    pub figure_of_merit: u8,
}

impl UwbAngle {
    /// Angle in degrees
    pub fn degrees(&self) -> f32 {
        self.value_q9_7 as f32 / 128.0
    }
}

/// One two-way ranging measurement
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UwbRangingMeasurement {
    /// Peer the measurement was taken against
    pub peer_mac: UwbMacAddress,
    /// Measurement status; `None` on success
    pub status: Option<UwbStatusRanging>,
    /// Distance in centimeters
    pub distance_cm: u16,
    /// Azimuth angle of arrival
    pub aoa_azimuth: Option<UwbAngle>,
    /// Elevation angle of arrival
    pub aoa_elevation: Option<UwbAngle>,
    /// Whether the path was line of sight, when known
    pub line_of_sight: Option<bool>,
}

/// Measurements from one ranging round
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UwbRangingData {
    /// Round counter
    pub sequence_number: u32,
    /// Session the round belongs to
    pub session_id: u32,
    /// Current ranging interval in milliseconds
    pub ranging_interval_ms: u32,
    /// Per-peer results
    pub measurements: Vec<UwbRangingMeasurement>,
}

/// A notification from the controller
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UwbNotificationData {
    /// Generic status not tied to a command
    Status(UwbStatus),
    /// Device state change
    DeviceStatus(UwbDeviceState),
    /// Session state change
    SessionStatus(UwbSessionStatus),
    /// Multicast list update result
    SessionUpdateMulticastListStatus(UwbMulticastListStatus),
    /// Ranging round result
    RangingData(UwbRangingData),
}

impl UwbNotificationData {
    /// Session the notification concerns, if any
    pub fn session_id(&self) -> Option<u32> {
        match self {
            UwbNotificationData::SessionStatus(s) => Some(s.session_id),
            UwbNotificationData::SessionUpdateMulticastListStatus(s) => Some(s.session_id),
            UwbNotificationData::RangingData(d) => Some(d.session_id),
            UwbNotificationData::Status(_) | UwbNotificationData::DeviceStatus(_) => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_state_values() {
        assert_eq!(UwbDeviceState::try_from(0xFF), Ok(UwbDeviceState::Error));
        assert_eq!(UwbSessionState::try_from(0x03), Ok(UwbSessionState::Idle));
        assert_eq!(UwbSessionState::try_from(0x04), Err(0x04));
    }

    #[test]
    fn test_angle_degrees() {
        let angle = UwbAngle {
            value_q9_7: -45 * 128,
            figure_of_merit: 90,
        };
        assert_eq!(angle.degrees(), -45.0);
    }

    #[test]
    fn test_notification_session_id() {
        let data = UwbNotificationData::RangingData(UwbRangingData {
            sequence_number: 1,
            session_id: 42,
            ranging_interval_ms: 200,
            measurements: Vec::new(),
        });
        assert_eq!(data.session_id(), Some(42));
        assert_eq!(
            UwbNotificationData::DeviceStatus(UwbDeviceState::Ready).session_id(),
            None
        );
    }
}
