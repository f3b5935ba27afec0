//! FiRa enumerations and small value types shared by the data objects.

use crate::codec::BitIndexed;
use bitflags::bitflags;
use serde::{Deserialize, Serialize};
use std::fmt;

fira_enum! {
    /// Role of a device in a ranging exchange
    pub enum DeviceRole {
        /// Responds to ranging polls
        Responder = 0,
        /// Initiates ranging rounds
        Initiator = 1,
    }
}

fira_enum! {
    /// Ranging method combined with its measurement report mode
    pub enum RangingMethod {
        /// One-way ranging, uplink time difference of arrival
        OwrUlTdoa = 0,
        /// Single-sided two-way ranging, deferred reports
        SsTwrDeferred = 1,
        /// Double-sided two-way ranging, deferred reports
        DsTwrDeferred = 2,
        /// Single-sided two-way ranging, non-deferred reports
        SsTwrNonDeferred = 3,
        /// Double-sided two-way ranging, non-deferred reports
        DsTwrNonDeferred = 4,
        /// One-way ranging, downlink time difference of arrival
        OwrDlTdoa = 5,
    }
}

fira_enum! {
    /// How the scrambled timestamp sequence is keyed
    #[derive(Serialize, Deserialize)]
    pub enum StsConfiguration {
        /// Static STS
        Static = 0,
        /// Dynamic STS
        Dynamic = 1,
        /// Dynamic STS with a responder-specific sub-session key
        DynamicIndividualKey = 2,
        /// Provisioned STS
        Provisioned = 3,
        /// Provisioned STS with a responder-specific sub-session key
        ProvisionedIndividualKey = 4,
    }
}

fira_enum! {
    /// Number of peers in a session
    pub enum MultiNodeMode {
        /// One controller, one controlee
        Unicast = 0,
        /// One controller, many controlees
        OneToMany = 1,
        /// Many to many
        ManyToMany = 2,
    }
}

fira_enum! {
    #[allow(missing_docs)]
    pub enum RangingTimeStruct {
        IntervalBased = 0,
        BlockBased = 1,
    }
}

fira_enum! {
    #[allow(missing_docs)]
    pub enum SchedulingMode {
        Contention = 0,
        Time = 1,
    }
}

fira_enum! {
    /// UWB channel number
    #[allow(missing_docs)]
    pub enum Channel {
        C5 = 5,
        C6 = 6,
        C8 = 8,
        C9 = 9,
        C10 = 10,
        C12 = 12,
        C13 = 13,
        C14 = 14,
    }
}

impl BitIndexed for Channel {
    fn bit_index(self) -> u32 {
        Channel::ALL.iter().position(|c| *c == self).unwrap_or_default() as u32
    }

    fn from_bit_index(index: u32) -> Option<Self> {
        Channel::ALL.get(index as usize).copied()
    }
}

fira_enum! {
    /// STS packet configuration (SP0..SP3)
    #[allow(missing_docs)]
    pub enum StsPacketConfiguration {
        Sp0 = 0,
        Sp1 = 1,
        Sp2 = 2,
        Sp3 = 3,
    }
}

fira_enum! {
    /// Convolutional code constraint length
    #[allow(missing_docs)]
    pub enum ConvolutionalCodeConstraintLength {
        K3 = 0,
        K7 = 1,
    }
}

fira_enum! {
    /// Pulse repetition frequency mode
    pub enum PrfMode {
        /// Base PRF
        Bprf = 0,
        /// Higher PRF, base data rate
        HprfBase = 1,
        /// Higher PRF, high data rate
        HprfHighRate = 2,
    }
}

fira_enum! {
    /// Angle-of-arrival support
    #[allow(missing_docs)]
    pub enum AngleOfArrival {
        Azimuth90 = 0,
        Azimuth180 = 1,
        Elevation = 2,
        FomAoa = 3,
    }
}

fira_enum! {
    /// MAC addressing used in frames
    pub enum MacAddressMode {
        /// 2-byte addresses
        Short = 0,
        /// 8-byte addresses in the header, 2-byte addresses elsewhere
        ExtendedHeaderShort = 1,
        /// 8-byte addresses everywhere
        Extended = 2,
    }
}

fira_enum! {
    #[allow(missing_docs)]
    pub enum MacFcsType {
        Crc16 = 0,
        Crc32 = 1,
    }
}

fira_enum! {
    /// Where regulatory information came from
    #[allow(missing_docs)]
    pub enum RegulatoryInformationSource {
        UserDefined = 0,
        SatelliteNavigation = 1,
        CellularSystem = 2,
    }
}

fira_enum! {
    /// Ranging update rate a controlee prefers
    #[allow(missing_docs)]
    pub enum UpdateRate {
        Automatic = 0,
        Infrequent = 1,
        UserInteractive = 2,
    }
}

bit_indexed_by_value!(
    DeviceRole,
    RangingMethod,
    StsConfiguration,
    MultiNodeMode,
    RangingTimeStruct,
    SchedulingMode,
    StsPacketConfiguration,
    ConvolutionalCodeConstraintLength,
    AngleOfArrival,
);

bitflags! {
    /// Which measurements a ranging result reports
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct ResultReportConfiguration: u8 {
        /// Time of flight
        const TOF = 0x01;
        /// Azimuth angle of arrival
        const AOA_AZIMUTH = 0x02;
        /// Elevation angle of arrival
        const AOA_ELEVATION = 0x04;
        /// Figure of merit for angle of arrival
        const AOA_FOM = 0x08;
    }
}

/// BPRF PHY parameter set, numbered 1 through 6
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BprfParameterSet(u8);

impl BprfParameterSet {
    /// Highest defined set number
    pub const MAX: u8 = 6;

    /// Wrap a set number, rejecting out-of-range values
    pub fn new(number: u8) -> Option<Self> {
        (1..=Self::MAX).contains(&number).then_some(Self(number))
    }

    /// Set number
    pub fn number(self) -> u8 {
        self.0
    }
}

impl BitIndexed for BprfParameterSet {
    fn bit_index(self) -> u32 {
        (self.0 - 1) as u32
    }

    fn from_bit_index(index: u32) -> Option<Self> {
        index.checked_add(1).and_then(|i| u8::try_from(i).ok()).and_then(Self::new)
    }
}

/// HPRF PHY parameter set, numbered 1 through 35
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct HprfParameterSet(u8);

impl HprfParameterSet {
    /// Highest defined set number
    pub const MAX: u8 = 35;

    /// Wrap a set number, rejecting out-of-range values
    pub fn new(number: u8) -> Option<Self> {
        (1..=Self::MAX).contains(&number).then_some(Self(number))
    }

    /// Set number
    pub fn number(self) -> u8 {
        self.0
    }
}

impl BitIndexed for HprfParameterSet {
    fn bit_index(self) -> u32 {
        (self.0 - 1) as u32
    }

    fn from_bit_index(index: u32) -> Option<Self> {
        index.checked_add(1).and_then(|i| u8::try_from(i).ok()).and_then(Self::new)
    }
}

/// A `major.minor` protocol version, carried as two bytes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct UwbVersion {
    /// Major version
    pub major: u8,
    /// Minor version
    pub minor: u8,
}

impl UwbVersion {
    /// Create a version
    pub const fn new(major: u8, minor: u8) -> Self {
        Self { major, minor }
    }

    /// Wire encoding
    pub fn to_u16(self) -> u16 {
        u16::from_be_bytes([self.major, self.minor])
    }

    /// Inverse of [`UwbVersion::to_u16`]
    pub fn from_u16(value: u16) -> Self {
        let [major, minor] = value.to_be_bytes();
        Self { major, minor }
    }
}

impl fmt::Display for UwbVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.major, self.minor)
    }
}

/// Inclusive range of supported versions, carried as four bytes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct UwbVersionRange {
    /// Lowest supported version
    pub low: UwbVersion,
    /// Highest supported version
    pub high: UwbVersion,
}

impl UwbVersionRange {
    /// Whether `version` lies within the range
    pub fn contains(&self, version: UwbVersion) -> bool {
        self.low <= version && version <= self.high
    }

    /// Wire encoding
    pub fn to_bytes(self) -> [u8; 4] {
        [self.low.major, self.low.minor, self.high.major, self.high.minor]
    }

    /// Inverse of [`UwbVersionRange::to_bytes`]
    pub fn from_bytes(bytes: [u8; 4]) -> Self {
        Self {
            low: UwbVersion::new(bytes[0], bytes[1]),
            high: UwbVersion::new(bytes[2], bytes[3]),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_enum_wire_values() {
        assert_eq!(u8::from(RangingMethod::DsTwrNonDeferred), 4);
        assert_eq!(RangingMethod::try_from(5), Ok(RangingMethod::OwrDlTdoa));
        assert_eq!(RangingMethod::try_from(6), Err(6));
        assert_eq!(Channel::try_from(7), Err(7));
    }

    #[test]
    fn test_channel_bit_index() {
        assert_eq!(Channel::C5.bit_index(), 0);
        assert_eq!(Channel::C14.bit_index(), 7);
        assert_eq!(Channel::from_bit_index(3), Some(Channel::C9));
        assert_eq!(Channel::from_bit_index(8), None);
    }

    #[test]
    fn test_parameter_set_bounds() {
        assert!(BprfParameterSet::new(0).is_none());
        assert!(BprfParameterSet::new(7).is_none());
        assert_eq!(HprfParameterSet::new(35).map(|s| s.bit_index()), Some(34));
        assert_eq!(HprfParameterSet::from_bit_index(35), None);
    }

    #[test]
    fn test_version_range() {
        let range = UwbVersionRange::from_bytes([1, 0, 2, 1]);
        assert!(range.contains(UwbVersion::new(1, 5)));
        assert!(!range.contains(UwbVersion::new(2, 2)));
        assert_eq!(range.to_bytes(), [1, 0, 2, 1]);
        assert_eq!(UwbVersion::from_u16(0x0102).to_string(), "1.2");
    }

    #[test]
    fn test_sts_configuration_serde_name() {
        let json = serde_json::to_string(&StsConfiguration::DynamicIndividualKey).unwrap();
        assert_eq!(json, "\"DynamicIndividualKey\"");
    }
}
