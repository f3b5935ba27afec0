//! Mapping from OOB data objects to UCI application configuration parameters.
//!
//! UCI carries app-config parameters as simple TLVs with little-endian
//! multi-byte values, unlike the big-endian BER data objects.

use crate::configuration::UwbConfiguration;
use crate::mac_address::UwbMacAddress;
use crate::static_ranging::StaticRangingInfo;
use crate::types::DeviceRole;
use uwb_tlv::TlvSimple;

fira_enum! {
    /// UCI application configuration parameter ids
    #[allow(missing_docs)]
    pub enum UciAppConfigParameter {
        DeviceType = 0x00,
        RangingRoundUsage = 0x01,
        StsConfig = 0x02,
        MultiNodeMode = 0x03,
        ChannelNumber = 0x04,
        NumberOfControlees = 0x05,
        DeviceMacAddress = 0x06,
        DstMacAddress = 0x07,
        SlotDuration = 0x08,
        RangingInterval = 0x09,
        StsIndex = 0x0A,
        MacFcsType = 0x0B,
        RangingRoundControl = 0x0C,
        AoaResultReq = 0x0D,
        RangeDataNtfConfig = 0x0E,
        DeviceRole = 0x11,
        RFrameConfig = 0x12,
        PreambleCodeIndex = 0x14,
        SfdId = 0x15,
        PsduDataRate = 0x16,
        PreambleDuration = 0x17,
        RangingTimeStruct = 0x1A,
        SlotsPerRangingRound = 0x1B,
        ResponderSlotIndex = 0x1E,
        PrfMode = 0x1F,
        ScheduledMode = 0x22,
        KeyRotation = 0x23,
        KeyRotationRate = 0x24,
        SessionPriority = 0x25,
        MacAddressMode = 0x26,
        VendorId = 0x27,
        StaticStsIv = 0x28,
        NumberOfStsSegments = 0x29,
        MaxRrRetry = 0x2A,
        UwbInitiationTime = 0x2B,
        HoppingMode = 0x2C,
        BlockStrideLength = 0x2D,
        ResultReportConfig = 0x2E,
        InBandTerminationAttemptCount = 0x2F,
        SubSessionId = 0x30,
        MaxNumberOfMeasurements = 0x32,
    }
}

fn param_u8(id: UciAppConfigParameter, value: impl Into<u8>) -> TlvSimple {
    TlvSimple::from_u8(id.into(), value.into())
}

fn param_mac(id: UciAppConfigParameter, address: &UwbMacAddress) -> TlvSimple {
    match *address {
        UwbMacAddress::Short(bytes) => TlvSimple::from_u16_le(id.into(), u16::from_be_bytes(bytes)),
        UwbMacAddress::Extended(bytes) => {
            TlvSimple::from_u64_le(id.into(), u64::from_be_bytes(bytes))
        }
    }
}

impl UwbConfiguration {
    /// UCI app-config parameters for every present field that UCI can express.
    ///
    /// MAC addresses are assigned from this device's point of view: an
    /// initiator owns the controller address, a responder the controlee one.
    pub fn to_app_config_params(&self) -> Vec<TlvSimple> {
        use UciAppConfigParameter as U;

        let mut params = Vec::new();
        if let Some(v) = self.device_role {
            params.push(param_u8(U::DeviceRole, v));
        }
        if let Some(v) = self.ranging_method {
            params.push(param_u8(U::RangingRoundUsage, v));
        }
        if let Some(v) = self.sts_configuration {
            params.push(param_u8(U::StsConfig, v));
        }
        if let Some(v) = self.multi_node_mode {
            params.push(param_u8(U::MultiNodeMode, v));
        }
        if let Some(v) = self.channel {
            params.push(param_u8(U::ChannelNumber, v));
        }
        let (own, peer) = match self.device_role {
            Some(DeviceRole::Initiator) => (
                self.controller_mac_address,
                self.controlee_short_mac_address,
            ),
            Some(DeviceRole::Responder) => (
                self.controlee_short_mac_address,
                self.controller_mac_address,
            ),
            None => (None, None),
        };
        if let Some(address) = own {
            params.push(param_mac(U::DeviceMacAddress, &address));
        }
        if let Some(address) = peer {
            params.push(param_mac(U::DstMacAddress, &address));
            params.push(param_u8(U::NumberOfControlees, 1u8));
        }
        if let Some(v) = self.slot_duration {
            params.push(TlvSimple::from_u16_le(U::SlotDuration.into(), v));
        }
        if let Some(v) = self.ranging_interval_ms {
            params.push(TlvSimple::from_u32_le(U::RangingInterval.into(), v as u32));
        }
        if let Some(v) = self.mac_fcs_type {
            params.push(param_u8(U::MacFcsType, v));
        }
        if let Some(v) = self.rframe_config {
            params.push(param_u8(U::RFrameConfig, v));
        }
        if let Some(v) = self.ranging_time_struct {
            params.push(param_u8(U::RangingTimeStruct, v));
        }
        if let Some(v) = self.slots_per_ranging_round {
            params.push(param_u8(U::SlotsPerRangingRound, v));
        }
        if let Some(v) = self.prf_mode {
            params.push(param_u8(U::PrfMode, v));
        }
        if let Some(v) = self.scheduling_mode {
            params.push(param_u8(U::ScheduledMode, v));
        }
        if let Some(v) = self.key_rotation_rate {
            params.push(param_u8(U::KeyRotation, v != 0));
            params.push(param_u8(U::KeyRotationRate, v));
        }
        if let Some(v) = self.mac_address_mode {
            params.push(param_u8(U::MacAddressMode, v));
        }
        if let Some(v) = self.max_rr_retry {
            params.push(TlvSimple::from_u16_le(U::MaxRrRetry.into(), v));
        }
        if let Some(v) = self.uwb_initiation_time_ms {
            params.push(TlvSimple::from_u32_le(U::UwbInitiationTime.into(), v));
        }
        if let Some(v) = self.hopping_mode {
            params.push(param_u8(U::HoppingMode, v));
        }
        if let Some(v) = self.block_striding {
            params.push(param_u8(U::BlockStrideLength, v));
        }
        if let Some(v) = self.result_report_config {
            params.push(param_u8(U::ResultReportConfig, v.bits()));
        }
        if let Some(v) = self.max_ranging_round_number {
            params.push(TlvSimple::from_u16_le(U::MaxNumberOfMeasurements.into(), v));
        }
        params
    }
}

impl StaticRangingInfo {
    /// UCI app-config parameters carrying the static STS key material
    pub fn to_app_config_params(&self) -> Vec<TlvSimple> {
        let mut params = vec![TlvSimple::from_u16_le(
            UciAppConfigParameter::VendorId.into(),
            self.vendor_id,
        )];
        // a 6-byte value always fits a simple TLV
        params.extend(
            TlvSimple::new(
                UciAppConfigParameter::StaticStsIv.into(),
                self.initialization_vector.to_vec(),
            )
            .ok(),
        );
        params
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Channel, RangingMethod};

    #[test]
    fn test_app_config_params() {
        let config = UwbConfiguration {
            device_role: Some(DeviceRole::Initiator),
            ranging_method: Some(RangingMethod::DsTwrDeferred),
            channel: Some(Channel::C9),
            ranging_interval_ms: Some(200),
            controller_mac_address: Some(UwbMacAddress::Short([0x12, 0x34])),
            controlee_short_mac_address: Some(UwbMacAddress::Short([0x56, 0x78])),
            ..Default::default()
        };
        let params = config.to_app_config_params();
        let find = |id: UciAppConfigParameter| {
            params
                .iter()
                .find(|p| p.tag() == u8::from(id))
                .map(|p| p.value().to_vec())
        };

        assert_eq!(find(UciAppConfigParameter::DeviceRole), Some(vec![1]));
        assert_eq!(find(UciAppConfigParameter::RangingRoundUsage), Some(vec![2]));
        assert_eq!(find(UciAppConfigParameter::ChannelNumber), Some(vec![9]));
        assert_eq!(
            find(UciAppConfigParameter::RangingInterval),
            Some(vec![0xC8, 0, 0, 0])
        );
        assert_eq!(
            find(UciAppConfigParameter::DeviceMacAddress),
            Some(vec![0x34, 0x12])
        );
        assert_eq!(find(UciAppConfigParameter::DstMacAddress), Some(vec![0x78, 0x56]));
        assert_eq!(find(UciAppConfigParameter::StsConfig), None);
    }

    #[test]
    fn test_empty_configuration_has_no_params() {
        assert!(UwbConfiguration::default().to_app_config_params().is_empty());
    }

    #[test]
    fn test_static_ranging_params() {
        let info = StaticRangingInfo {
            vendor_id: 0x0708,
            initialization_vector: [1, 2, 3, 4, 5, 6],
        };
        let params = info.to_app_config_params();
        assert_eq!(params[0].value().as_ref(), &[0x08, 0x07]);
        assert_eq!(params[1].value().as_ref(), &[1, 2, 3, 4, 5, 6]);
    }
}
