//! BER tag handling.

use crate::error::TlvError;
use smallvec::SmallVec;
use std::fmt;

/// Bit in the first tag byte marking a constructed encoding
pub const CONSTRUCTED_BIT: u8 = 0x20;

/// Low bits of the first tag byte signalling that more tag bytes follow
pub const TAG_NUMBER_MASK: u8 = 0x1F;

/// Bit in subsequent tag bytes signalling that another tag byte follows
pub const TAG_CONTINUATION_BIT: u8 = 0x80;

/// A TLV tag of one or more bytes
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct Tag(SmallVec<[u8; 4]>);

impl Tag {
    /// Create a tag from raw bytes
    pub fn from_bytes(bytes: &[u8]) -> Self {
        Self(SmallVec::from_slice(bytes))
    }

    /// Raw tag bytes
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    /// Number of tag bytes
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether the tag has no bytes (only possible for a default tag)
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Whether the tag marks a constructed (child-bearing) TLV
    pub fn is_constructed(&self) -> bool {
        self.0
            .first()
            .map(|b| b & CONSTRUCTED_BIT != 0)
            .unwrap_or(false)
    }

    /// Whether the byte sequence is a single well-formed BER tag.
    ///
    /// Builders accept arbitrary tag bytes; only well-formed tags survive a
    /// decode of their own encoding.
    pub fn is_well_formed(&self) -> bool {
        match Tag::parse(&self.0) {
            Ok((_, consumed)) => consumed == self.0.len(),
            Err(_) => false,
        }
    }

    /// Parse one BER tag from the start of `data`, returning the tag and the
    /// number of bytes consumed.
    pub fn parse(data: &[u8]) -> Result<(Tag, usize), TlvError> {
        let first = *data.first().ok_or(TlvError::NotFound)?;
        if first == 0x00 || first == 0xFF {
            return Err(TlvError::NotFound);
        }

        if first & TAG_NUMBER_MASK != TAG_NUMBER_MASK {
            return Ok((Tag::from(first), 1));
        }

        let mut end = 1;
        loop {
            let byte = *data.get(end).ok_or(TlvError::IncompleteTag)?;
            end += 1;
            if byte & TAG_CONTINUATION_BIT == 0 {
                break;
            }
        }

        Ok((Tag::from_bytes(&data[..end]), end))
    }
}

impl From<u8> for Tag {
    fn from(value: u8) -> Self {
        let mut bytes = SmallVec::new();
        bytes.push(value);
        Self(bytes)
    }
}

impl From<&[u8]> for Tag {
    fn from(value: &[u8]) -> Self {
        Self::from_bytes(value)
    }
}

impl<const N: usize> From<[u8; N]> for Tag {
    fn from(value: [u8; N]) -> Self {
        Self::from_bytes(&value)
    }
}

impl fmt::Debug for Tag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Tag({})", self)
    }
}

impl fmt::Display for Tag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x")?;
        for byte in self.0.iter() {
            write!(f, "{:02X}", byte)?;
        }
        Ok(())
    }
}
