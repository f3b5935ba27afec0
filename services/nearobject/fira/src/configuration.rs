//! Session configuration (`0xA2`).
//!
//! Every parameter is optional. Absent parameters are omitted from the
//! encoded object and left to the controller's defaults.

use crate::codec::{
    child_tag, expect_tag, parse_data_object, put_bool, put_bytes, put_enum, put_u16, put_u32,
    put_u8, read_bool, read_bytes, read_enum, read_fixed, read_u16, read_u32, read_u8,
};
use crate::error::FiraError;
use crate::mac_address::UwbMacAddress;
use crate::types::{
    Channel, ConvolutionalCodeConstraintLength, DeviceRole, MacAddressMode, MacFcsType,
    MultiNodeMode, PrfMode, RangingMethod, RangingTimeStruct, ResultReportConfiguration,
    SchedulingMode, StsConfiguration, StsPacketConfiguration, UwbVersion,
};
use bytes::Bytes;
use uwb_tlv::TlvBer;

fira_enum! {
    /// Parameter tags inside [`UwbConfiguration`]
    #[allow(missing_docs)]
    pub enum ParameterTag {
        FiraPhyVersion = 0x80,
        DeviceRole = 0x81,
        RangingMethod = 0x82,
        StsConfig = 0x83,
        MultiNodeMode = 0x84,
        RangingTimeStruct = 0x85,
        ScheduledMode = 0x86,
        HoppingMode = 0x87,
        BlockStriding = 0x88,
        UwbInitiationTime = 0x89,
        ChannelNumber = 0x8A,
        RFrameConfig = 0x8B,
        CcConstraintLength = 0x8C,
        PrfMode = 0x8D,
        Sp0PhyParameterSet = 0x8E,
        Sp1PhyParameterSet = 0x8F,
        Sp3PhyParameterSet = 0x90,
        MaxRrRetry = 0x91,
        ConstraintLengthConvolutionalCodeHprf = 0x92,
        UwbTime0 = 0x93,
        ResultReportConfig = 0x94,
        MacAddressMode = 0x95,
        ControleeShortMacAddress = 0x96,
        ControllerMacAddress = 0x97,
        SlotsPerRangingRound = 0x98,
        MaxContentionPhaseLength = 0x99,
        SlotDuration = 0x9A,
        RangingInterval = 0x9B,
        KeyRotationRate = 0x9C,
        MacFcsType = 0x9D,
        MaxRangingRoundNumber = 0x9E,
    }
}

/// Ranging session configuration exchanged out of band
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct UwbConfiguration {
    /// FiRa PHY version
    pub fira_phy_version: Option<UwbVersion>,
    /// This device's role
    pub device_role: Option<DeviceRole>,
    /// Ranging method and report mode
    pub ranging_method: Option<RangingMethod>,
    /// STS keying
    pub sts_configuration: Option<StsConfiguration>,
    /// Unicast or multicast
    pub multi_node_mode: Option<MultiNodeMode>,
    /// Interval- or block-based timing
    pub ranging_time_struct: Option<RangingTimeStruct>,
    /// Contention- or time-scheduled access
    pub scheduling_mode: Option<SchedulingMode>,
    /// Round hopping
    pub hopping_mode: Option<bool>,
    /// Block striding
    pub block_striding: Option<bool>,
    /// Delay before the first ranging round, in milliseconds
    pub uwb_initiation_time_ms: Option<u32>,
    /// UWB channel
    pub channel: Option<Channel>,
    /// Ranging frame STS packet configuration
    pub rframe_config: Option<StsPacketConfiguration>,
    /// Convolutional code constraint length
    pub cc_constraint_length: Option<ConvolutionalCodeConstraintLength>,
    /// Pulse repetition frequency mode
    pub prf_mode: Option<PrfMode>,
    /// PHY parameter set for SP0 frames
    pub sp0_phy_parameter_set: Option<u8>,
    /// PHY parameter set for SP1 frames
    pub sp1_phy_parameter_set: Option<u8>,
    /// PHY parameter set for SP3 frames
    pub sp3_phy_parameter_set: Option<u8>,
    /// Ranging rounds to retry before stopping; 0 retries forever
    pub max_rr_retry: Option<u16>,
    /// Convolutional code constraint length for HPRF
    pub constraint_length_convolutional_code_hprf: Option<ConvolutionalCodeConstraintLength>,
    /// Whether UWB time 0 is used
    pub uwb_time0: Option<bool>,
    /// Measurements included in results
    pub result_report_config: Option<ResultReportConfiguration>,
    /// MAC address mode
    pub mac_address_mode: Option<MacAddressMode>,
    /// Controlee short address
    pub controlee_short_mac_address: Option<UwbMacAddress>,
    /// Controller address, short or extended
    pub controller_mac_address: Option<UwbMacAddress>,
    /// Slots per ranging round
    pub slots_per_ranging_round: Option<u8>,
    /// Contention phase length in slots
    pub max_contention_phase_length: Option<u8>,
    /// Slot duration in ranging time scale units
    pub slot_duration: Option<u16>,
    /// Ranging interval in milliseconds
    pub ranging_interval_ms: Option<u16>,
    /// Key rotation rate exponent
    pub key_rotation_rate: Option<u8>,
    /// Frame check sequence type
    pub mac_fcs_type: Option<MacFcsType>,
    /// Ranging rounds before the session stops
    pub max_ranging_round_number: Option<u16>,
}

impl UwbConfiguration {
    /// Top-level tag
    pub const TAG: u8 = 0xA2;

    /// Encode as a constructed data object, one child per present parameter
    pub fn to_data_object(&self) -> TlvBer {
        use ParameterTag as P;

        let mut children = Vec::new();
        if let Some(v) = self.fira_phy_version {
            children.push(put_u16(P::FiraPhyVersion, v.to_u16()));
        }
        if let Some(v) = self.device_role {
            children.push(put_enum(P::DeviceRole, v));
        }
        if let Some(v) = self.ranging_method {
            children.push(put_enum(P::RangingMethod, v));
        }
        if let Some(v) = self.sts_configuration {
            children.push(put_enum(P::StsConfig, v));
        }
        if let Some(v) = self.multi_node_mode {
            children.push(put_enum(P::MultiNodeMode, v));
        }
        if let Some(v) = self.ranging_time_struct {
            children.push(put_enum(P::RangingTimeStruct, v));
        }
        if let Some(v) = self.scheduling_mode {
            children.push(put_enum(P::ScheduledMode, v));
        }
        if let Some(v) = self.hopping_mode {
            children.push(put_bool(P::HoppingMode, v));
        }
        if let Some(v) = self.block_striding {
            children.push(put_bool(P::BlockStriding, v));
        }
        if let Some(v) = self.uwb_initiation_time_ms {
            children.push(put_u32(P::UwbInitiationTime, v));
        }
        if let Some(v) = self.channel {
            children.push(put_enum(P::ChannelNumber, v));
        }
        if let Some(v) = self.rframe_config {
            children.push(put_enum(P::RFrameConfig, v));
        }
        if let Some(v) = self.cc_constraint_length {
            children.push(put_enum(P::CcConstraintLength, v));
        }
        if let Some(v) = self.prf_mode {
            children.push(put_enum(P::PrfMode, v));
        }
        if let Some(v) = self.sp0_phy_parameter_set {
            children.push(put_u8(P::Sp0PhyParameterSet, v));
        }
        if let Some(v) = self.sp1_phy_parameter_set {
            children.push(put_u8(P::Sp1PhyParameterSet, v));
        }
        if let Some(v) = self.sp3_phy_parameter_set {
            children.push(put_u8(P::Sp3PhyParameterSet, v));
        }
        if let Some(v) = self.max_rr_retry {
            children.push(put_u16(P::MaxRrRetry, v));
        }
        if let Some(v) = self.constraint_length_convolutional_code_hprf {
            children.push(put_enum(P::ConstraintLengthConvolutionalCodeHprf, v));
        }
        if let Some(v) = self.uwb_time0 {
            children.push(put_bool(P::UwbTime0, v));
        }
        if let Some(v) = self.result_report_config {
            children.push(put_u8(P::ResultReportConfig, v.bits()));
        }
        if let Some(v) = self.mac_address_mode {
            children.push(put_enum(P::MacAddressMode, v));
        }
        if let Some(v) = self.controlee_short_mac_address {
            children.push(put_bytes(P::ControleeShortMacAddress, v.as_bytes()));
        }
        if let Some(v) = self.controller_mac_address {
            children.push(put_bytes(P::ControllerMacAddress, v.as_bytes()));
        }
        if let Some(v) = self.slots_per_ranging_round {
            children.push(put_u8(P::SlotsPerRangingRound, v));
        }
        if let Some(v) = self.max_contention_phase_length {
            children.push(put_u8(P::MaxContentionPhaseLength, v));
        }
        if let Some(v) = self.slot_duration {
            children.push(put_u16(P::SlotDuration, v));
        }
        if let Some(v) = self.ranging_interval_ms {
            children.push(put_u16(P::RangingInterval, v));
        }
        if let Some(v) = self.key_rotation_rate {
            children.push(put_u8(P::KeyRotationRate, v));
        }
        if let Some(v) = self.mac_fcs_type {
            children.push(put_enum(P::MacFcsType, v));
        }
        if let Some(v) = self.max_ranging_round_number {
            children.push(put_u16(P::MaxRangingRoundNumber, v));
        }
        TlvBer::constructed(Self::TAG, children)
    }

    /// Decode from a data object.
    ///
    /// Unknown parameters are skipped; a known parameter with a malformed
    /// value fails the whole object.
    pub fn from_data_object(tlv: &TlvBer) -> Result<Self, FiraError> {
        use ParameterTag as P;

        expect_tag(tlv, Self::TAG)?;

        let mut config = Self::default();
        for child in tlv.children() {
            let Some(tag) = child_tag(child).and_then(|t| P::try_from(t).ok()) else {
                continue;
            };
            let raw = u8::from(tag);
            match tag {
                P::FiraPhyVersion => {
                    config.fira_phy_version = Some(UwbVersion::from_u16(read_u16(child, raw)?))
                }
                P::DeviceRole => config.device_role = Some(read_enum(child, raw)?),
                P::RangingMethod => config.ranging_method = Some(read_enum(child, raw)?),
                P::StsConfig => config.sts_configuration = Some(read_enum(child, raw)?),
                P::MultiNodeMode => config.multi_node_mode = Some(read_enum(child, raw)?),
                P::RangingTimeStruct => config.ranging_time_struct = Some(read_enum(child, raw)?),
                P::ScheduledMode => config.scheduling_mode = Some(read_enum(child, raw)?),
                P::HoppingMode => config.hopping_mode = Some(read_bool(child, raw)?),
                P::BlockStriding => config.block_striding = Some(read_bool(child, raw)?),
                P::UwbInitiationTime => config.uwb_initiation_time_ms = Some(read_u32(child, raw)?),
                P::ChannelNumber => config.channel = Some(read_enum(child, raw)?),
                P::RFrameConfig => config.rframe_config = Some(read_enum(child, raw)?),
                P::CcConstraintLength => config.cc_constraint_length = Some(read_enum(child, raw)?),
                P::PrfMode => config.prf_mode = Some(read_enum(child, raw)?),
                P::Sp0PhyParameterSet => config.sp0_phy_parameter_set = Some(read_u8(child, raw)?),
                P::Sp1PhyParameterSet => config.sp1_phy_parameter_set = Some(read_u8(child, raw)?),
                P::Sp3PhyParameterSet => config.sp3_phy_parameter_set = Some(read_u8(child, raw)?),
                P::MaxRrRetry => config.max_rr_retry = Some(read_u16(child, raw)?),
                P::ConstraintLengthConvolutionalCodeHprf => {
                    config.constraint_length_convolutional_code_hprf = Some(read_enum(child, raw)?)
                }
                P::UwbTime0 => config.uwb_time0 = Some(read_bool(child, raw)?),
                P::ResultReportConfig => {
                    config.result_report_config = Some(ResultReportConfiguration::from_bits_truncate(
                        read_u8(child, raw)?,
                    ))
                }
                P::MacAddressMode => config.mac_address_mode = Some(read_enum(child, raw)?),
                P::ControleeShortMacAddress => {
                    config.controlee_short_mac_address =
                        Some(UwbMacAddress::Short(read_fixed::<2>(child, raw)?))
                }
                P::ControllerMacAddress => {
                    let bytes = read_bytes(child, raw)?;
                    let address = UwbMacAddress::try_from(bytes.as_slice())
                        .map_err(|e| FiraError::syntax(raw, e.to_string()))?;
                    config.controller_mac_address = Some(address);
                }
                P::SlotsPerRangingRound => {
                    config.slots_per_ranging_round = Some(read_u8(child, raw)?)
                }
                P::MaxContentionPhaseLength => {
                    config.max_contention_phase_length = Some(read_u8(child, raw)?)
                }
                P::SlotDuration => config.slot_duration = Some(read_u16(child, raw)?),
                P::RangingInterval => config.ranging_interval_ms = Some(read_u16(child, raw)?),
                P::KeyRotationRate => config.key_rotation_rate = Some(read_u8(child, raw)?),
                P::MacFcsType => config.mac_fcs_type = Some(read_enum(child, raw)?),
                P::MaxRangingRoundNumber => {
                    config.max_ranging_round_number = Some(read_u16(child, raw)?)
                }
            }
        }
        Ok(config)
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

    fn sample() -> UwbConfiguration {
        UwbConfiguration {
            fira_phy_version: Some(UwbVersion::new(1, 1)),
            device_role: Some(DeviceRole::Initiator),
            ranging_method: Some(RangingMethod::DsTwrDeferred),
            sts_configuration: Some(StsConfiguration::Static),
            multi_node_mode: Some(MultiNodeMode::Unicast),
            ranging_time_struct: Some(RangingTimeStruct::BlockBased),
            scheduling_mode: Some(SchedulingMode::Time),
            hopping_mode: Some(false),
            block_striding: Some(false),
            uwb_initiation_time_ms: Some(0),
            channel: Some(Channel::C9),
            rframe_config: Some(StsPacketConfiguration::Sp3),
            cc_constraint_length: Some(ConvolutionalCodeConstraintLength::K3),
            prf_mode: Some(PrfMode::Bprf),
            sp0_phy_parameter_set: Some(1),
            sp1_phy_parameter_set: Some(3),
            sp3_phy_parameter_set: Some(4),
            max_rr_retry: Some(0),
            constraint_length_convolutional_code_hprf: Some(ConvolutionalCodeConstraintLength::K7),
            uwb_time0: Some(true),
            result_report_config: Some(
                ResultReportConfiguration::TOF | ResultReportConfiguration::AOA_AZIMUTH,
            ),
            mac_address_mode: Some(MacAddressMode::Short),
            controlee_short_mac_address: Some(UwbMacAddress::Short([0x00, 0x01])),
            controller_mac_address: Some(UwbMacAddress::Extended([1, 2, 3, 4, 5, 6, 7, 8])),
            slots_per_ranging_round: Some(25),
            max_contention_phase_length: Some(0),
            slot_duration: Some(2400),
            ranging_interval_ms: Some(200),
            key_rotation_rate: Some(0),
            mac_fcs_type: Some(MacFcsType::Crc16),
            max_ranging_round_number: Some(0xFFFF),
        }
    }

    #[test]
    fn test_round_trip_every_parameter() {
        let config = sample();
        let tlv = config.to_data_object();
        assert_eq!(tlv.children().len(), ParameterTag::ALL.len());
        assert_eq!(UwbConfiguration::from_bytes(&config.to_bytes()).unwrap(), config);
    }

    #[test]
    fn test_empty_configuration() {
        let config = UwbConfiguration::default();
        assert_eq!(config.to_bytes().as_ref(), &[0xA2, 0x00]);
    }

    #[test]
    fn test_parameter_encoding() {
        let config = UwbConfiguration {
            channel: Some(Channel::C9),
            ranging_interval_ms: Some(200),
            ..Default::default()
        };
        assert_eq!(
            config.to_bytes().as_ref(),
            &[0xA2, 0x07, 0x8A, 0x01, 0x09, 0x9B, 0x02, 0x00, 0xC8]
        );
    }

    #[test]
    fn test_unknown_parameter_ignored() {
        let tlv = TlvBer::constructed(
            0xA2u8,
            vec![
                TlvBer::primitive([0x9Fu8, 0x40], vec![0xDE, 0xAD]),
                TlvBer::primitive(0x4Fu8, vec![0x01]),
                put_enum(0x8Au8, Channel::C5),
            ],
        );
        let config = UwbConfiguration::from_bytes(&tlv.to_bytes()).unwrap();
        assert_eq!(config.channel, Some(Channel::C5));
    }

    #[test]
    fn test_bad_controller_address_length() {
        let tlv = TlvBer::constructed(0xA2u8, vec![put_bytes(0x97u8, vec![1, 2, 3])]);
        assert!(matches!(
            UwbConfiguration::from_data_object(&tlv),
            Err(FiraError::Syntax { tag: 0x97, .. })
        ));
    }

    #[test]
    fn test_out_of_range_channel() {
        let tlv = TlvBer::constructed(0xA2u8, vec![put_u8(0x8Au8, 7)]);
        assert!(UwbConfiguration::from_data_object(&tlv).is_err());
    }
}
