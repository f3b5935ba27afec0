//! UWB MAC addresses.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Errors parsing a MAC address
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum MacAddressError {
    /// Address is neither 2 nor 8 bytes long
    #[error("invalid mac address length {0}, expected 2 or 8")]
    InvalidLength(usize),

    /// An octet is not two hex digits
    #[error("invalid mac address octet '{0}'")]
    InvalidOctet(String),
}

/// A short (2-byte) or extended (8-byte) UWB MAC address
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum UwbMacAddress {
    /// 2-byte address
    Short([u8; 2]),
    /// 8-byte address
    Extended([u8; 8]),
}

impl UwbMacAddress {
    /// Address bytes in wire order
    pub fn as_bytes(&self) -> &[u8] {
        match self {
            UwbMacAddress::Short(b) => b,
            UwbMacAddress::Extended(b) => b,
        }
    }

    /// Byte length of the address
    pub fn len(&self) -> usize {
        self.as_bytes().len()
    }

    /// Always false; addresses are never empty
    pub fn is_empty(&self) -> bool {
        false
    }

    /// Whether this is a short address
    pub fn is_short(&self) -> bool {
        matches!(self, UwbMacAddress::Short(_))
    }
}

impl TryFrom<&[u8]> for UwbMacAddress {
    type Error = MacAddressError;

    fn try_from(bytes: &[u8]) -> Result<Self, Self::Error> {
        if let Ok(short) = <[u8; 2]>::try_from(bytes) {
            Ok(UwbMacAddress::Short(short))
        } else if let Ok(extended) = <[u8; 8]>::try_from(bytes) {
            Ok(UwbMacAddress::Extended(extended))
        } else {
            Err(MacAddressError::InvalidLength(bytes.len()))
        }
    }
}

impl fmt::Display for UwbMacAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, b) in self.as_bytes().iter().enumerate() {
            if i > 0 {
                f.write_str(":")?;
            }
            write!(f, "{b:02X}")?;
        }
        Ok(())
    }
}

impl FromStr for UwbMacAddress {
    type Err = MacAddressError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let bytes = s
            .split(':')
            .map(|octet| {
                if octet.len() != 2 {
                    return Err(MacAddressError::InvalidOctet(octet.to_string()));
                }
                u8::from_str_radix(octet, 16)
                    .map_err(|_| MacAddressError::InvalidOctet(octet.to_string()))
            })
            .collect::<Result<Vec<u8>, _>>()?;
        UwbMacAddress::try_from(bytes.as_slice())
    }
}

impl Serialize for UwbMacAddress {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for UwbMacAddress {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}
