//! Device capabilities (`0xA3`).

use crate::codec::{
    child_tag, expect_tag, parse_data_object, put_bitmask, put_bool, put_bytes, read_bitmask,
    read_bool, read_fixed, BitIndexed,
};
use crate::configuration::UwbConfiguration;
use crate::error::FiraError;
use crate::types::{
    AngleOfArrival, BprfParameterSet, Channel, ConvolutionalCodeConstraintLength, DeviceRole,
    HprfParameterSet, MultiNodeMode, RangingMethod, RangingTimeStruct, SchedulingMode,
    StsConfiguration, StsPacketConfiguration, UwbVersionRange,
};
use bytes::Bytes;
use std::collections::BTreeSet;
use uwb_tlv::TlvBer;

/// Width of the HPRF parameter set bitmap
const HPRF_BITMAP_WIDTH: usize = 5;

fira_enum! {
    /// Parameter tags inside [`UwbCapability`]
    #[allow(missing_docs)]
    pub enum ParameterTag {
        FiraPhyVersionRange = 0x80,
        FiraMacVersionRange = 0x81,
        DeviceRoles = 0x82,
        RangingMethod = 0x83,
        StsConfig = 0x84,
        MultiNodeMode = 0x85,
        RangingTimeStruct = 0x86,
        ScheduledMode = 0x87,
        HoppingMode = 0x88,
        BlockStriding = 0x89,
        UwbInitiationTime = 0x8A,
        Channels = 0x8B,
        RFrameConfig = 0x8C,
        CcConstraintLength = 0x8D,
        BprfParameterSets = 0x8E,
        HprfParameterSets = 0x8F,
        AoaSupport = 0x90,
        ExtendedMacAddress = 0x91,
    }
}

/// What a UWB controller supports.
///
/// Every parameter is optional: a controller advertises only what it reports,
/// and only advertised parameters are encoded.
#[allow(missing_docs)]
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct UwbCapability {
    /// Supported FiRa PHY versions
    pub fira_phy_version_range: Option<UwbVersionRange>,
    /// Supported FiRa MAC versions
    pub fira_mac_version_range: Option<UwbVersionRange>,
    pub device_roles: Option<BTreeSet<DeviceRole>>,
    pub ranging_methods: Option<BTreeSet<RangingMethod>>,
    pub sts_configurations: Option<BTreeSet<StsConfiguration>>,
    pub multi_node_modes: Option<BTreeSet<MultiNodeMode>>,
    pub ranging_time_structs: Option<BTreeSet<RangingTimeStruct>>,
    pub scheduling_modes: Option<BTreeSet<SchedulingMode>>,
    pub hopping_mode: Option<bool>,
    pub block_striding: Option<bool>,
    pub uwb_initiation_time: Option<bool>,
    pub channels: Option<BTreeSet<Channel>>,
    pub rframe_configs: Option<BTreeSet<StsPacketConfiguration>>,
    pub cc_constraint_lengths: Option<BTreeSet<ConvolutionalCodeConstraintLength>>,
    pub bprf_parameter_sets: Option<BTreeSet<BprfParameterSet>>,
    pub hprf_parameter_sets: Option<BTreeSet<HprfParameterSet>>,
    pub angles_of_arrival: Option<BTreeSet<AngleOfArrival>>,
    /// Whether 8-byte MAC addresses are supported
    pub extended_mac_address: Option<bool>,
}

impl UwbCapability {
    /// Top-level tag
    pub const TAG: u8 = 0xA3;

    /// Whether every parameter `config` sets is within these capabilities.
    ///
    /// Parameters the controller did not advertise are not checked.
    pub fn supports(&self, config: &UwbConfiguration) -> bool {
        fn allowed<T: Ord>(set: &Option<BTreeSet<T>>, value: &Option<T>) -> bool {
            match (set, value) {
                (Some(set), Some(value)) => set.contains(value),
                _ => true,
            }
        }
        fn enabled(flag: Option<bool>, requested: Option<bool>) -> bool {
            flag != Some(false) || requested != Some(true)
        }

        allowed(&self.device_roles, &config.device_role)
            && allowed(&self.ranging_methods, &config.ranging_method)
            && allowed(&self.sts_configurations, &config.sts_configuration)
            && allowed(&self.multi_node_modes, &config.multi_node_mode)
            && allowed(&self.ranging_time_structs, &config.ranging_time_struct)
            && allowed(&self.scheduling_modes, &config.scheduling_mode)
            && allowed(&self.channels, &config.channel)
            && allowed(&self.rframe_configs, &config.rframe_config)
            && enabled(self.hopping_mode, config.hopping_mode)
            && enabled(self.block_striding, config.block_striding)
            && enabled(
                self.extended_mac_address,
                config
                    .controller_mac_address
                    .as_ref()
                    .map(|address| !address.is_short()),
            )
    }

    /// Encode as a constructed data object holding the advertised parameters
    pub fn to_data_object(&self) -> TlvBer {
        use ParameterTag as P;

        fn bitmask<T: BitIndexed>(
            children: &mut Vec<TlvBer>,
            tag: ParameterTag,
            set: &Option<BTreeSet<T>>,
            width: usize,
        ) {
            if let Some(set) = set {
                children.push(put_bitmask(tag, set, width));
            }
        }
        fn flag(children: &mut Vec<TlvBer>, tag: ParameterTag, value: Option<bool>) {
            if let Some(value) = value {
                children.push(put_bool(tag, value));
            }
        }

        let mut children = Vec::new();
        if let Some(range) = self.fira_phy_version_range {
            children.push(put_bytes(P::FiraPhyVersionRange, range.to_bytes()));
        }
        if let Some(range) = self.fira_mac_version_range {
            children.push(put_bytes(P::FiraMacVersionRange, range.to_bytes()));
        }
        let c = &mut children;
        bitmask(c, P::DeviceRoles, &self.device_roles, 1);
        bitmask(c, P::RangingMethod, &self.ranging_methods, 1);
        bitmask(c, P::StsConfig, &self.sts_configurations, 1);
        bitmask(c, P::MultiNodeMode, &self.multi_node_modes, 1);
        bitmask(c, P::RangingTimeStruct, &self.ranging_time_structs, 1);
        bitmask(c, P::ScheduledMode, &self.scheduling_modes, 1);
        flag(c, P::HoppingMode, self.hopping_mode);
        flag(c, P::BlockStriding, self.block_striding);
        flag(c, P::UwbInitiationTime, self.uwb_initiation_time);
        bitmask(c, P::Channels, &self.channels, 1);
        bitmask(c, P::RFrameConfig, &self.rframe_configs, 1);
        bitmask(c, P::CcConstraintLength, &self.cc_constraint_lengths, 1);
        bitmask(c, P::BprfParameterSets, &self.bprf_parameter_sets, 1);
        bitmask(c, P::HprfParameterSets, &self.hprf_parameter_sets, HPRF_BITMAP_WIDTH);
        bitmask(c, P::AoaSupport, &self.angles_of_arrival, 1);
        flag(c, P::ExtendedMacAddress, self.extended_mac_address);
        TlvBer::constructed(Self::TAG, children)
    }

    /// Decode from a data object
    pub fn from_data_object(tlv: &TlvBer) -> Result<Self, FiraError> {
        use ParameterTag as P;

        expect_tag(tlv, Self::TAG)?;

        let mut cap = Self::default();
        for child in tlv.children() {
            let Some(tag) = child_tag(child).and_then(|t| P::try_from(t).ok()) else {
                continue;
            };
            let raw = u8::from(tag);
            match tag {
                P::FiraPhyVersionRange => {
                    cap.fira_phy_version_range =
                        Some(UwbVersionRange::from_bytes(read_fixed::<4>(child, raw)?))
                }
                P::FiraMacVersionRange => {
                    cap.fira_mac_version_range =
                        Some(UwbVersionRange::from_bytes(read_fixed::<4>(child, raw)?))
                }
                P::DeviceRoles => cap.device_roles = Some(read_bitmask(child, raw, 1)?),
                P::RangingMethod => cap.ranging_methods = Some(read_bitmask(child, raw, 1)?),
                P::StsConfig => cap.sts_configurations = Some(read_bitmask(child, raw, 1)?),
                P::MultiNodeMode => cap.multi_node_modes = Some(read_bitmask(child, raw, 1)?),
                P::RangingTimeStruct => {
                    cap.ranging_time_structs = Some(read_bitmask(child, raw, 1)?)
                }
                P::ScheduledMode => cap.scheduling_modes = Some(read_bitmask(child, raw, 1)?),
                P::HoppingMode => cap.hopping_mode = Some(read_bool(child, raw)?),
                P::BlockStriding => cap.block_striding = Some(read_bool(child, raw)?),
                P::UwbInitiationTime => cap.uwb_initiation_time = Some(read_bool(child, raw)?),
                P::Channels => cap.channels = Some(read_bitmask(child, raw, 1)?),
                P::RFrameConfig => cap.rframe_configs = Some(read_bitmask(child, raw, 1)?),
                P::CcConstraintLength => {
                    cap.cc_constraint_lengths = Some(read_bitmask(child, raw, 1)?)
                }
                P::BprfParameterSets => {
                    cap.bprf_parameter_sets = Some(read_bitmask(child, raw, 1)?)
                }
                P::HprfParameterSets => {
                    cap.hprf_parameter_sets = Some(read_bitmask(child, raw, HPRF_BITMAP_WIDTH)?)
                }
                P::AoaSupport => cap.angles_of_arrival = Some(read_bitmask(child, raw, 1)?),
                P::ExtendedMacAddress => cap.extended_mac_address = Some(read_bool(child, raw)?),
            }
        }
        Ok(cap)
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
