//! Static STS ranging information (`0xA4`).

use crate::codec::{child_tag, expect_tag, parse_data_object, put_bytes, put_u16, read_fixed, read_u16};
use crate::error::FiraError;
use bytes::Bytes;
use uwb_tlv::{Tag, TlvBer};

fira_enum! {
    /// Parameter tags inside [`StaticRangingInfo`]
    pub enum ParameterTag {
        /// Vendor id (2 bytes)
        VendorId = 0x80,
        /// Static STS initialization vector (6 bytes)
        InitializationVector = 0x81,
    }
}

/// Key material for static STS; both parameters are required
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct StaticRangingInfo {
    /// Vendor id mixed into the static STS
    pub vendor_id: u16,
    /// Static STS initialization vector
    pub initialization_vector: [u8; 6],
}

impl StaticRangingInfo {
    /// Top-level tag
    pub const TAG: u8 = 0xA4;

    /// Encode as a constructed data object
    pub fn to_data_object(&self) -> TlvBer {
        TlvBer::constructed(
            Self::TAG,
            vec![
                put_u16(ParameterTag::VendorId, self.vendor_id),
                put_bytes(ParameterTag::InitializationVector, self.initialization_vector),
            ],
        )
    }

    /// Decode from a data object
    pub fn from_data_object(tlv: &TlvBer) -> Result<Self, FiraError> {
        expect_tag(tlv, Self::TAG)?;

        let mut vendor_id = None;
        let mut initialization_vector = None;
        for child in tlv.children() {
            let Some(tag) = child_tag(child).and_then(|t| ParameterTag::try_from(t).ok()) else {
                continue;
            };
            match tag {
                ParameterTag::VendorId => vendor_id = Some(read_u16(child, tag.into())?),
                ParameterTag::InitializationVector => {
                    initialization_vector = Some(read_fixed::<6>(child, tag.into())?)
                }
            }
        }

        match (vendor_id, initialization_vector) {
            (Some(vendor_id), Some(initialization_vector)) => Ok(Self {
                vendor_id,
                initialization_vector,
            }),
            (v, iv) => Err(FiraError::Incomplete {
                tag: Tag::from(Self::TAG),
                found: v.is_some() as usize + iv.is_some() as usize,
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

    #[test]
    fn test_encoding() {
        let info = StaticRangingInfo {
            vendor_id: 0x0708,
            initialization_vector: [1, 2, 3, 4, 5, 6],
        };
        let bytes = info.to_bytes();
        assert_eq!(
            bytes.as_ref(),
            &[0xA4, 0x0C, 0x80, 0x02, 0x07, 0x08, 0x81, 0x06, 1, 2, 3, 4, 5, 6]
        );
        assert_eq!(StaticRangingInfo::from_bytes(&bytes).unwrap(), info);
    }

    #[test]
    fn test_missing_iv() {
        let tlv = TlvBer::constructed(0xA4u8, vec![put_u16(0x80u8, 1)]);
        assert_eq!(
            StaticRangingInfo::from_data_object(&tlv),
            Err(FiraError::Incomplete {
                tag: Tag::from(0xA4u8),
                found: 1,
                required: 2
            })
        );
    }

    #[test]
    fn test_wrong_iv_length() {
        let tlv = TlvBer::constructed(
            0xA4u8,
            vec![put_u16(0x80u8, 1), put_bytes(0x81u8, vec![0u8; 5])],
        );
        assert!(matches!(
            StaticRangingInfo::from_data_object(&tlv),
            Err(FiraError::Syntax { tag: 0x81, .. })
        ));
    }
}
