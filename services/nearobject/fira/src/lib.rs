//! FiRa OOB data objects, UCI status codes and notifications for nearobject.
//!
//! Every out-of-band aggregate maps onto a constructed BER-TLV whose children
//! carry one present field each, tagged with the field's parameter tag:
//!
//! | Aggregate                  | Tag    |
//! |----------------------------|--------|
//! | [`UwbSessionData`]         | `0xA1` |
//! | [`UwbConfiguration`]       | `0xA2` |
//! | [`UwbCapability`]          | `0xA3` |
//! | [`StaticRangingInfo`]      | `0xA4` |
//! | [`SecureRangingInfo`]      | `0xA5` |
//! | [`RegulatoryInformation`]  | `0xA6` |
//! | [`ControleePreference`]    | `0xA7` |
//!
//! Decoding ignores unknown child tags and fails hard on known tags whose
//! content does not match the declared type.

#![warn(missing_docs)]
#![warn(clippy::all)]

#[macro_use]
mod macros;

pub mod app_config;
pub mod capability;
pub mod codec;
pub mod configuration;
pub mod controlee_preference;
pub mod error;
pub mod mac_address;
pub mod notification;
pub mod regulatory;
pub mod secure_ranging;
pub mod session_data;
pub mod static_ranging;
pub mod status;
pub mod types;

// Re-export main types
pub use app_config::UciAppConfigParameter;
pub use capability::UwbCapability;
pub use codec::{decode_bitmask, encode_bitmask, BitIndexed};
pub use configuration::UwbConfiguration;
pub use controlee_preference::ControleePreference;
pub use error::FiraError;
pub use mac_address::{MacAddressError, UwbMacAddress};
pub use notification::{
    UwbAngle, UwbDeviceState, UwbMulticastListStatus, UwbNotificationData, UwbRangingData,
    UwbRangingMeasurement, UwbSessionReasonCode, UwbSessionState, UwbSessionStatus,
    UwbSessionUpdateMulticastListEntry, UwbStatusMulticast,
};
pub use regulatory::{ChannelPowerInfo, RegulatoryInformation};
pub use secure_ranging::SecureRangingInfo;
pub use session_data::UwbSessionData;
pub use static_ranging::StaticRangingInfo;
pub use status::{UwbStatus, UwbStatusGeneric, UwbStatusRanging, UwbStatusSession};
pub use types::*;
