//! Controlee preferences (`0xA7`).

use crate::codec::{
    child_tag, expect_tag, parse_data_object, put_bitmask, put_enum, read_bitmask, read_enum,
};
use crate::error::FiraError;
use crate::types::{Channel, DeviceRole, MultiNodeMode, RangingMethod, UpdateRate};
use bytes::Bytes;
use std::collections::BTreeSet;
use uwb_tlv::TlvBer;

fira_enum! {
    /// Parameter tags inside [`ControleePreference`]
    pub enum ParameterTag {
        /// Preferred device role
        DeviceRole = 0x80,
        /// Preferred ranging method
        RangingMethod = 0x81,
        /// Preferred multi-node mode
        MultiNodeMode = 0x82,
        /// Preferred channels (1-byte bitmask)
        PreferredChannels = 0x83,
        /// Preferred update rate
        UpdateRate = 0x84,
    }
}

/// What a controlee would like the controller to choose
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct ControleePreference {
    /// Preferred device role
    pub device_role: Option<DeviceRole>,
    /// Preferred ranging method
    pub ranging_method: Option<RangingMethod>,
    /// Preferred multi-node mode
    pub multi_node_mode: Option<MultiNodeMode>,
    /// Preferred channels; empty when no preference
    pub preferred_channels: BTreeSet<Channel>,
    /// Preferred update rate
    pub update_rate: Option<UpdateRate>,
}

impl ControleePreference {
    /// Top-level tag
    pub const TAG: u8 = 0xA7;

    /// Encode as a constructed data object
    pub fn to_data_object(&self) -> TlvBer {
        let mut children = Vec::new();
        if let Some(role) = self.device_role {
            children.push(put_enum(ParameterTag::DeviceRole, role));
        }
        if let Some(method) = self.ranging_method {
            children.push(put_enum(ParameterTag::RangingMethod, method));
        }
        if let Some(mode) = self.multi_node_mode {
            children.push(put_enum(ParameterTag::MultiNodeMode, mode));
        }
        if !self.preferred_channels.is_empty() {
            children.push(put_bitmask(
                ParameterTag::PreferredChannels,
                &self.preferred_channels,
                1,
            ));
        }
        if let Some(rate) = self.update_rate {
            children.push(put_enum(ParameterTag::UpdateRate, rate));
        }
        TlvBer::constructed(Self::TAG, children)
    }

    /// Decode from a data object
    pub fn from_data_object(tlv: &TlvBer) -> Result<Self, FiraError> {
        expect_tag(tlv, Self::TAG)?;

        let mut preference = Self::default();
        for child in tlv.children() {
            let Some(tag) = child_tag(child).and_then(|t| ParameterTag::try_from(t).ok()) else {
                continue;
            };
            let raw = u8::from(tag);
            match tag {
                ParameterTag::DeviceRole => preference.device_role = Some(read_enum(child, raw)?),
                ParameterTag::RangingMethod => {
                    preference.ranging_method = Some(read_enum(child, raw)?)
                }
                ParameterTag::MultiNodeMode => {
                    preference.multi_node_mode = Some(read_enum(child, raw)?)
                }
                ParameterTag::PreferredChannels => {
                    preference.preferred_channels = read_bitmask(child, raw, 1)?
                }
                ParameterTag::UpdateRate => preference.update_rate = Some(read_enum(child, raw)?),
            }
        }
        Ok(preference)
    }

    /// Encode to bytes
    pub fn to_bytes(&self) -> Bytes {
        self.to_data_object().to_bytes()
    }

    /// Decode from bytes holding exactly one data object
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, FiraError> {
        Self::from_data_object(&parse_data_object(bytes)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_round_trip() {
        let preference = ControleePreference {
            device_role: Some(DeviceRole::Responder),
            ranging_method: Some(RangingMethod::DsTwrDeferred),
            multi_node_mode: Some(MultiNodeMode::Unicast),
            preferred_channels: [Channel::C9, Channel::C5].into(),
            update_rate: Some(UpdateRate::UserInteractive),
        };
        let bytes = preference.to_bytes();
        assert_eq!(
            &bytes[..],
            &[
                0xA7, 0x0F, 0x80, 0x01, 0x00, 0x81, 0x01, 0x02, 0x82, 0x01, 0x00, 0x83, 0x01,
                0x09, 0x84, 0x01, 0x02
            ]
        );
        assert_eq!(ControleePreference::from_bytes(&bytes).unwrap(), preference);
    }

    #[test]
    fn test_out_of_range_enum_is_syntax_error() {
        let tlv = TlvBer::constructed(0xA7u8, vec![TlvBer::primitive(0x84u8, vec![0x07])]);
        assert!(matches!(
            ControleePreference::from_data_object(&tlv),
            Err(FiraError::Syntax { tag: 0x84, .. })
        ));
    }

    #[test]
    fn test_wrong_top_level_tag() {
        let tlv = TlvBer::constructed(0xA6u8, Vec::new());
        assert!(matches!(
            ControleePreference::from_data_object(&tlv),
            Err(FiraError::UnexpectedTag { .. })
        ));
    }
}
