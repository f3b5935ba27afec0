//! UCI status codes.
//!
//! Status codes share one byte-wide space, partitioned into generic
//! (`0x00..=0x0A`), session (`0x11..=0x19`) and ranging (`0x20..=0x27`)
//! ranges. [`UwbStatus`] is the tagged union over the three.

use thiserror::Error;

fira_enum! {
    /// Generic command status
    pub enum UwbStatusGeneric {
        /// Success
        Ok = 0x00,
        /// Command rejected in the current state
        Rejected = 0x01,
        /// Command failed
        Failed = 0x02,
        /// Malformed command
        SyntaxError = 0x03,
        /// Unknown parameter id
        InvalidParameter = 0x04,
        /// Parameter value out of range
        InvalidRange = 0x05,
        /// Message size is invalid
        InvalidMessageSize = 0x06,
        /// Unknown group id
        UnknownGid = 0x07,
        /// Unknown opcode id
        UnknownOid = 0x08,
        /// Parameter is read-only
        ReadOnly = 0x09,
        /// Controller asks the host to retry
        CommandRetry = 0x0A,
    }
}

fira_enum! {
    /// Session management status
    pub enum UwbStatusSession {
        /// Session does not exist
        NotExist = 0x11,
        /// Session id already in use
        Duplicate = 0x12,
        /// Session is active
        Active = 0x13,
        /// No more sessions can be created
        MaxSessionsExceeded = 0x14,
        /// Session is not configured
        NotConfigured = 0x15,
        /// Other sessions are ranging
        ActiveSessionsOngoing = 0x16,
        /// Multicast list is full
        MulticastListFull = 0x17,
        /// Address is not in the multicast list
        AddressNotFound = 0x18,
        /// Address is already in the multicast list
        AddressAlreadyPresent = 0x19,
    }
}

fira_enum! {
    /// Per-measurement ranging status
    #[allow(missing_docs)]
    pub enum UwbStatusRanging {
        TxFailed = 0x20,
        RxTimeout = 0x21,
        RxPhyDecodingFailed = 0x22,
        RxPhyToaFailed = 0x23,
        RxPhyStsFailed = 0x24,
        RxMacDecodingFailed = 0x25,
        RxMacIeDecodingFailed = 0x26,
        RxMacIeMissing = 0x27,
    }
}

/// Any UCI status
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum UwbStatus {
    /// Generic status
    #[error("generic status {0:?}")]
    Generic(UwbStatusGeneric),
    /// Session status
    #[error("session status {0:?}")]
    Session(UwbStatusSession),
    /// Ranging status
    #[error("ranging status {0:?}")]
    Ranging(UwbStatusRanging),
}

impl UwbStatus {
    /// Success status
    pub const OK: UwbStatus = UwbStatus::Generic(UwbStatusGeneric::Ok);

    /// Whether this is the generic success status
    pub fn is_ok(&self) -> bool {
        *self == Self::OK
    }

    /// Whether the controller asked for the command to be retried
    pub fn is_retry(&self) -> bool {
        *self == UwbStatus::Generic(UwbStatusGeneric::CommandRetry)
    }
}

impl From<UwbStatusGeneric> for UwbStatus {
    fn from(status: UwbStatusGeneric) -> Self {
        UwbStatus::Generic(status)
    }
}

impl From<UwbStatusSession> for UwbStatus {
    fn from(status: UwbStatusSession) -> Self {
        UwbStatus::Session(status)
    }
}

impl From<UwbStatusRanging> for UwbStatus {
    fn from(status: UwbStatusRanging) -> Self {
        UwbStatus::Ranging(status)
    }
}

impl TryFrom<u8> for UwbStatus {
    type Error = u8;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0x00..=0x0A => UwbStatusGeneric::try_from(value).map(Self::Generic),
            0x11..=0x19 => UwbStatusSession::try_from(value).map(Self::Session),
            0x20..=0x27 => UwbStatusRanging::try_from(value).map(Self::Ranging),
            other => Err(other),
        }
    }
}

impl From<UwbStatus> for u8 {
    fn from(status: UwbStatus) -> u8 {
        match status {
            UwbStatus::Generic(s) => s.into(),
            UwbStatus::Session(s) => s.into(),
            UwbStatus::Ranging(s) => s.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classification() {
        assert_eq!(UwbStatus::try_from(0x00), Ok(UwbStatus::OK));
        assert_eq!(
            UwbStatus::try_from(0x15),
            Ok(UwbStatus::Session(UwbStatusSession::NotConfigured))
        );
        assert_eq!(
            UwbStatus::try_from(0x21),
            Ok(UwbStatus::Ranging(UwbStatusRanging::RxTimeout))
        );
        assert_eq!(UwbStatus::try_from(0x0B), Err(0x0B));
        assert_eq!(UwbStatus::try_from(0x10), Err(0x10));
        assert_eq!(UwbStatus::try_from(0x28), Err(0x28));
    }

    #[test]
    fn test_round_trip_all_codes() {
        for value in 0..=u8::MAX {
            if let Ok(status) = UwbStatus::try_from(value) {
                assert_eq!(u8::from(status), value);
            }
        }
    }

    #[test]
    fn test_predicates() {
        assert!(UwbStatus::OK.is_ok());
        assert!(UwbStatus::from(UwbStatusGeneric::CommandRetry).is_retry());
        assert!(!UwbStatus::from(UwbStatusSession::Duplicate).is_ok());
    }
}
