//! Session data (`0xA1`), the top-level out-of-band message.

use crate::codec::{
    child_tag, expect_tag, parse_data_object, put_bool, put_u16, put_u32, read_bool, read_u16,
    read_u32,
};
use crate::configuration::UwbConfiguration;
use crate::error::FiraError;
use crate::regulatory::RegulatoryInformation;
use crate::secure_ranging::SecureRangingInfo;
use crate::static_ranging::StaticRangingInfo;
use crate::types::UwbVersion;
use bytes::Bytes;
use tracing::trace;
use uwb_tlv::TlvBer;

fira_enum! {
    /// Parameter tags inside [`UwbSessionData`]
    pub enum ParameterTag {
        /// Session data format version (2 bytes)
        SessionDataVersion = 0x80,
        /// Session id (4 bytes)
        SessionId = 0x81,
        /// Sub-session id (4 bytes)
        SubSessionId = 0x82,
        /// Nested [`UwbConfiguration`]
        Configuration = 0xA2,
        /// Nested [`StaticRangingInfo`]
        StaticRangingInfo = 0xA4,
        /// Nested [`SecureRangingInfo`]
        SecureRangingInfo = 0xA5,
        /// Nested [`RegulatoryInformation`]
        RegulatoryInformation = 0xA6,
        /// Whether a configuration is available (bool)
        ConfigurationAvailable = 0x87,
    }
}

/// Everything a controller sends a controlee to set up a session
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct UwbSessionData {
    /// Format version
    pub version: Option<UwbVersion>,
    /// Session id
    pub session_id: Option<u32>,
    /// Sub-session id
    pub sub_session_id: Option<u32>,
    /// Session configuration
    pub configuration: Option<UwbConfiguration>,
    /// Static STS key material
    pub static_ranging_info: Option<StaticRangingInfo>,
    /// Dynamic STS key material
    pub secure_ranging_info: Option<SecureRangingInfo>,
    /// Regulatory constraints
    pub regulatory_information: Option<RegulatoryInformation>,
    /// Whether the controller has a configuration ready
    pub configuration_available: Option<bool>,
}

impl UwbSessionData {
    /// Top-level tag
    pub const TAG: u8 = 0xA1;

    /// Encode as a constructed data object with nested aggregates
    pub fn to_data_object(&self) -> TlvBer {
        let mut children = Vec::new();
        if let Some(version) = self.version {
            children.push(put_u16(ParameterTag::SessionDataVersion, version.to_u16()));
        }
        if let Some(id) = self.session_id {
            children.push(put_u32(ParameterTag::SessionId, id));
        }
        if let Some(id) = self.sub_session_id {
            children.push(put_u32(ParameterTag::SubSessionId, id));
        }
        if let Some(config) = &self.configuration {
            children.push(config.to_data_object());
        }
        if let Some(info) = &self.static_ranging_info {
            children.push(info.to_data_object());
        }
        if let Some(info) = &self.secure_ranging_info {
            children.push(info.to_data_object());
        }
        if let Some(info) = &self.regulatory_information {
            children.push(info.to_data_object());
        }
        if let Some(available) = self.configuration_available {
            children.push(put_bool(ParameterTag::ConfigurationAvailable, available));
        }
        TlvBer::constructed(Self::TAG, children)
    }

    /// Decode from a data object; nested aggregates must decode cleanly
    pub fn from_data_object(tlv: &TlvBer) -> Result<Self, FiraError> {
        expect_tag(tlv, Self::TAG)?;

        let mut data = Self::default();
        for child in tlv.children() {
            let Some(tag) = child_tag(child).and_then(|t| ParameterTag::try_from(t).ok()) else {
                trace!(tag = %child.tag(), "skipping unknown session data parameter");
                continue;
            };
            let raw = u8::from(tag);
            match tag {
                ParameterTag::SessionDataVersion => {
                    data.version = Some(UwbVersion::from_u16(read_u16(child, raw)?))
                }
                ParameterTag::SessionId => data.session_id = Some(read_u32(child, raw)?),
                ParameterTag::SubSessionId => data.sub_session_id = Some(read_u32(child, raw)?),
                ParameterTag::Configuration => {
                    data.configuration = Some(UwbConfiguration::from_data_object(child)?)
                }
                ParameterTag::StaticRangingInfo => {
                    data.static_ranging_info = Some(StaticRangingInfo::from_data_object(child)?)
                }
                ParameterTag::SecureRangingInfo => {
                    data.secure_ranging_info = Some(SecureRangingInfo::from_data_object(child)?)
                }
                ParameterTag::RegulatoryInformation => {
                    data.regulatory_information =
                        Some(RegulatoryInformation::from_data_object(child)?)
                }
                ParameterTag::ConfigurationAvailable => {
                    data.configuration_available = Some(read_bool(child, raw)?)
                }
            }
        }
        Ok(data)
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
    use crate::types::{Channel, DeviceRole, RegulatoryInformationSource};
    use uwb_tlv::Tag;

    fn sample() -> UwbSessionData {
        UwbSessionData {
            version: Some(UwbVersion::new(1, 0)),
            session_id: Some(0x1234_5678),
            sub_session_id: None,
            configuration: Some(UwbConfiguration {
                device_role: Some(DeviceRole::Responder),
                channel: Some(Channel::C9),
                ..Default::default()
            }),
            static_ranging_info: Some(StaticRangingInfo {
                vendor_id: 0x0102,
                initialization_vector: [9, 8, 7, 6, 5, 4],
            }),
            secure_ranging_info: None,
            regulatory_information: Some(RegulatoryInformation {
                source: Some(RegulatoryInformationSource::UserDefined),
                country_code: Some(*b"DE"),
                ..Default::default()
            }),
            configuration_available: Some(true),
        }
    }

    #[test]
    fn test_equal_values_hash_alike() {
        let mut seen = std::collections::HashSet::new();
        assert!(seen.insert(sample()));
        assert!(!seen.insert(sample()));

        let mut other = sample();
        other.session_id = Some(1);
        assert!(seen.insert(other));
        assert_eq!(seen.len(), 2);
    }

    #[test]
    fn test_round_trip_with_nested_objects() {
        let data = sample();
        let bytes = data.to_bytes();
        assert_eq!(bytes[0], 0xA1);
        assert_eq!(UwbSessionData::from_bytes(&bytes).unwrap(), data);
    }

    #[test]
    fn test_nested_object_bytes_are_embedded_verbatim() {
        let data = sample();
        let nested = data.static_ranging_info.unwrap().to_bytes();
        let bytes = data.to_bytes();
        assert!(bytes.windows(nested.len()).any(|w| w == nested.as_ref()));
    }

    #[test]
    fn test_incomplete_nested_object_fails() {
        let tlv = TlvBer::constructed(
            0xA1u8,
            vec![TlvBer::constructed(0xA4u8, vec![TlvBer::primitive(0x80u8, vec![0, 1])])],
        );
        assert!(matches!(
            UwbSessionData::from_data_object(&tlv),
            Err(FiraError::Incomplete { .. })
        ));
    }

    #[test]
    fn test_trailing_bytes_rejected() {
        let mut bytes = sample().to_bytes().to_vec();
        bytes.push(0x00);
        assert_eq!(
            UwbSessionData::from_bytes(&bytes),
            Err(FiraError::TrailingBytes(1))
        );
    }

    #[test]
    fn test_wrong_top_level_tag() {
        let bytes = UwbConfiguration::default().to_bytes();
        assert_eq!(
            UwbSessionData::from_bytes(&bytes),
            Err(FiraError::UnexpectedTag {
                expected: Tag::from(0xA1u8),
                actual: Tag::from(0xA2u8),
            })
        );
    }
}
