//! FiRa data object error types.

use crate::status::{UwbStatus, UwbStatusGeneric};
use thiserror::Error;
use uwb_tlv::{ParseStatus, Tag, TlvError};

/// Errors raised while encoding or decoding FiRa data objects
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FiraError {
    /// Underlying TLV codec error
    #[error("tlv error: {0}")]
    Tlv(#[from] TlvError),

    /// Top-level tag does not belong to the requested structure
    #[error("unexpected tag {actual}, expected {expected}")]
    UnexpectedTag {
        /// Tag of the structure being decoded
        expected: Tag,
        /// Tag found in the input
        actual: Tag,
    },

    /// A known parameter has content inconsistent with its declared type
    #[error("syntax error in parameter 0x{tag:02X}: {reason}")]
    Syntax {
        /// Offending parameter tag
        tag: u8,
        /// What was wrong with it
        reason: String,
    },

    /// A structure that requires every parameter is missing some
    #[error("incomplete data object {tag}: {found} of {required} required parameters present")]
    Incomplete {
        /// Structure tag
        tag: Tag,
        /// Distinct required parameters decoded
        found: usize,
        /// Required parameter count
        required: usize,
    },

    /// Bytes left over after the top-level data object
    #[error("{0} trailing bytes after data object")]
    TrailingBytes(usize),
}

impl FiraError {
    /// Build a syntax error for a parameter tag
    pub fn syntax(tag: impl Into<u8>, reason: impl Into<String>) -> Self {
        FiraError::Syntax {
            tag: tag.into(),
            reason: reason.into(),
        }
    }

    /// Coarse parse status for this error
    pub fn parse_status(&self) -> ParseStatus {
        match self {
            FiraError::Tlv(e) => e.status(),
            _ => ParseStatus::Failed,
        }
    }

    /// UCI status reported to callers for a rejected data object
    pub fn uwb_status(&self) -> UwbStatus {
        UwbStatus::Generic(UwbStatusGeneric::SyntaxError)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping() {
        let err = FiraError::syntax(0x80u8, "bad length");
        assert_eq!(err.parse_status(), ParseStatus::Failed);
        assert_eq!(err.uwb_status(), UwbStatus::Generic(UwbStatusGeneric::SyntaxError));
        assert_eq!(
            FiraError::from(TlvError::NotFound).parse_status(),
            ParseStatus::TlvNotFound
        );
    }
}
