//! Secure ranging information (`0xA5`).

use crate::codec::{child_tag, expect_tag, parse_data_object, put_bytes, read_bytes};
use crate::error::FiraError;
use bytes::Bytes;
use uwb_tlv::{Tag, TlvBer};

fira_enum! {
    /// Parameter tags inside [`SecureRangingInfo`]
    pub enum ParameterTag {
        /// UWB session key info
        UwbSessionKeyInfo = 0x80,
        /// Responder-specific sub-session key info
        ResponderSpecificSubSessionKeyInfo = 0x81,
        /// SUS additional parameters
        SusAdditionalParameters = 0x82,
    }
}

/// Key material for dynamic and provisioned STS.
///
/// All three parameters must be present in an encoded object.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct SecureRangingInfo {
    /// Session key info
    pub uwb_session_key_info: Vec<u8>,
    /// Responder-specific sub-session key info
    pub responder_specific_sub_session_key_info: Vec<u8>,
    /// SUS additional parameters
    pub sus_additional_parameters: Vec<u8>,
}

impl SecureRangingInfo {
    /// Top-level tag
    pub const TAG: u8 = 0xA5;

    /// Encode as a constructed data object
    pub fn to_data_object(&self) -> TlvBer {
        TlvBer::constructed(
            Self::TAG,
            vec![
                put_bytes(ParameterTag::UwbSessionKeyInfo, self.uwb_session_key_info.clone()),
                put_bytes(
                    ParameterTag::ResponderSpecificSubSessionKeyInfo,
                    self.responder_specific_sub_session_key_info.clone(),
                ),
                put_bytes(
                    ParameterTag::SusAdditionalParameters,
                    self.sus_additional_parameters.clone(),
                ),
            ],
        )
    }

    /// Decode from a data object, failing unless every parameter is present
    pub fn from_data_object(tlv: &TlvBer) -> Result<Self, FiraError> {
        expect_tag(tlv, Self::TAG)?;

        let mut session_key = None;
        let mut sub_session_key = None;
        let mut sus_parameters = None;
        for child in tlv.children() {
            let Some(tag) = child_tag(child).and_then(|t| ParameterTag::try_from(t).ok()) else {
                continue;
            };
            let value = read_bytes(child, tag.into())?;
            match tag {
                ParameterTag::UwbSessionKeyInfo => session_key = Some(value),
                ParameterTag::ResponderSpecificSubSessionKeyInfo => sub_session_key = Some(value),
                ParameterTag::SusAdditionalParameters => sus_parameters = Some(value),
            }
        }

        let found = [session_key.is_some(), sub_session_key.is_some(), sus_parameters.is_some()]
            .into_iter()
            .filter(|present| *present)
            .count();
        match (session_key, sub_session_key, sus_parameters) {
            (Some(a), Some(b), Some(c)) => Ok(Self {
                uwb_session_key_info: a,
                responder_specific_sub_session_key_info: b,
                sus_additional_parameters: c,
            }),
            _ => Err(FiraError::Incomplete {
                tag: Tag::from(Self::TAG),
                found,
                required: ParameterTag::ALL.len(),
            }),
        }
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

    fn sample() -> SecureRangingInfo {
        SecureRangingInfo {
            uwb_session_key_info: vec![0x11; 16],
            responder_specific_sub_session_key_info: vec![0x22; 16],
            sus_additional_parameters: vec![0x33, 0x44],
        }
    }

    #[test]
    fn test_round_trip() {
        let info = sample();
        assert_eq!(SecureRangingInfo::from_bytes(&info.to_bytes()).unwrap(), info);
    }

    #[test]
    fn test_two_of_three_tags_fails() {
        let info = sample();
        let partial = TlvBer::constructed(
            SecureRangingInfo::TAG,
            info.to_data_object().children()[..2].to_vec(),
        );
        assert_eq!(
            SecureRangingInfo::from_data_object(&partial),
            Err(FiraError::Incomplete {
                tag: Tag::from(0xA5u8),
                found: 2,
                required: 3
            })
        );
    }

    #[test]
    fn test_unknown_tag_ignored() {
        let info = sample();
        let mut children = info.to_data_object().children().to_vec();
        children.push(TlvBer::primitive([0x9Fu8, 0x01], vec![0xFF]));
        let tlv = TlvBer::constructed(SecureRangingInfo::TAG, children);
        assert_eq!(SecureRangingInfo::from_data_object(&tlv).unwrap(), info);
    }

    #[test]
    fn test_duplicate_tag_does_not_count_twice() {
        let child = put_bytes(0x80u8, vec![1]);
        let tlv = TlvBer::constructed(
            SecureRangingInfo::TAG,
            vec![child.clone(), child.clone(), child],
        );
        assert!(matches!(
            SecureRangingInfo::from_data_object(&tlv),
            Err(FiraError::Incomplete { found: 1, .. })
        ));
    }
}
