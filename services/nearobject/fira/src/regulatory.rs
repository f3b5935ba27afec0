//! Regulatory information (`0xA6`).

use crate::codec::{
    child_tag, expect_tag, parse_data_object, put_bool, put_bytes, put_enum, put_u32, read_bool,
    read_bytes, read_enum, read_fixed, read_u32,
};
use crate::error::FiraError;
use crate::types::RegulatoryInformationSource;
use bytes::Bytes;
use uwb_tlv::TlvBer;

fira_enum! {
    /// Parameter tags inside [`RegulatoryInformation`]
    pub enum ParameterTag {
        /// Information source (1 byte)
        InformationSource = 0x80,
        /// Outdoor use permitted (bool)
        OutdoorPermitted = 0x81,
        /// ISO 3166 alpha-2 country code (2 ASCII bytes)
        CountryCode = 0x82,
        /// Seconds since the Unix epoch (4 bytes)
        Timestamp = 0x83,
        /// Sequence of 3-byte channel power entries
        ChannelInfo = 0x84,
    }
}

/// Maximum transmit power for a contiguous run of channels
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ChannelPowerInfo {
    /// First channel number in the run
    pub first_channel: u8,
    /// Number of channels in the run
    pub number_of_channels: u8,
    /// Maximum transmit power in dBm
    pub max_tx_power_dbm: i8,
}

impl ChannelPowerInfo {
    const ENCODED_LEN: usize = 3;

    fn to_bytes(self) -> [u8; 3] {
        [
            self.first_channel,
            self.number_of_channels,
            self.max_tx_power_dbm as u8,
        ]
    }

    fn from_bytes(bytes: &[u8]) -> Self {
        Self {
            first_channel: bytes[0],
            number_of_channels: bytes[1],
            max_tx_power_dbm: bytes[2] as i8,
        }
    }
}

/// Regulatory constraints for the current location
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct RegulatoryInformation {
    /// Where the information came from
    pub source: Option<RegulatoryInformationSource>,
    /// Whether outdoor operation is permitted
    pub outdoor_permitted: Option<bool>,
    /// Two uppercase ASCII letters
    pub country_code: Option<[u8; 2]>,
    /// When the information was determined, in seconds since the epoch
    pub timestamp: Option<u32>,
    /// Per-channel power limits
    pub channel_info: Vec<ChannelPowerInfo>,
}

impl RegulatoryInformation {
    /// Top-level tag
    pub const TAG: u8 = 0xA6;

    /// Country code as a string, if present
    pub fn country_code_str(&self) -> Option<&str> {
        self.country_code
            .as_ref()
            .and_then(|c| std::str::from_utf8(c).ok())
    }

    /// Encode as a constructed data object
    pub fn to_data_object(&self) -> TlvBer {
        let mut children = Vec::new();
        if let Some(source) = self.source {
            children.push(put_enum(ParameterTag::InformationSource, source));
        }
        if let Some(outdoor) = self.outdoor_permitted {
            children.push(put_bool(ParameterTag::OutdoorPermitted, outdoor));
        }
        if let Some(code) = self.country_code {
            children.push(put_bytes(ParameterTag::CountryCode, code));
        }
        if let Some(timestamp) = self.timestamp {
            children.push(put_u32(ParameterTag::Timestamp, timestamp));
        }
        if !self.channel_info.is_empty() {
            let entries: Vec<u8> = self
                .channel_info
                .iter()
                .flat_map(|entry| entry.to_bytes())
                .collect();
            children.push(put_bytes(ParameterTag::ChannelInfo, entries));
        }
        TlvBer::constructed(Self::TAG, children)
    }

    /// Decode from a data object
    pub fn from_data_object(tlv: &TlvBer) -> Result<Self, FiraError> {
        expect_tag(tlv, Self::TAG)?;

        let mut info = Self::default();
        for child in tlv.children() {
            let Some(tag) = child_tag(child).and_then(|t| ParameterTag::try_from(t).ok()) else {
                continue;
            };
            let raw = u8::from(tag);
            match tag {
                ParameterTag::InformationSource => info.source = Some(read_enum(child, raw)?),
                ParameterTag::OutdoorPermitted => {
                    info.outdoor_permitted = Some(read_bool(child, raw)?)
                }
                ParameterTag::CountryCode => {
                    let code = read_fixed::<2>(child, raw)?;
                    if !code.iter().all(u8::is_ascii_uppercase) {
                        return Err(FiraError::syntax(
                            raw,
                            "country code is not uppercase ASCII letters",
                        ));
                    }
                    info.country_code = Some(code);
                }
                ParameterTag::Timestamp => info.timestamp = Some(read_u32(child, raw)?),
                ParameterTag::ChannelInfo => {
                    let value = read_bytes(child, raw)?;
                    if value.len() % ChannelPowerInfo::ENCODED_LEN != 0 {
                        return Err(FiraError::syntax(
                            raw,
                            format!("channel info length {} is not a multiple of 3", value.len()),
                        ));
                    }
                    info.channel_info = value
                        .chunks_exact(ChannelPowerInfo::ENCODED_LEN)
                        .map(ChannelPowerInfo::from_bytes)
                        .collect();
                }
            }
        }
        Ok(info)
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
