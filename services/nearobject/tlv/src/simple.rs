//! Simple TLVs as used by UCI application configuration parameters.
//!
//! Unlike BER, a simple TLV always has a one-byte tag and a one-byte length,
//! so values are limited to 255 bytes.

use crate::error::TlvError;
use bytes::{BufMut, Bytes, BytesMut};

/// Maximum value length representable in a simple TLV
pub const MAX_SIMPLE_VALUE_LEN: usize = u8::MAX as usize;

/// A flat TLV with a 1-byte tag and a 1-byte length
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TlvSimple {
    tag: u8,
    value: Bytes,
}

impl TlvSimple {
    /// Create a simple TLV, rejecting values longer than 255 bytes
    pub fn new(tag: u8, value: impl Into<Bytes>) -> Result<Self, TlvError> {
        let value = value.into();
        if value.len() > MAX_SIMPLE_VALUE_LEN {
            return Err(TlvError::ValueTooLong(value.len()));
        }
        Ok(Self { tag, value })
    }

    /// Create a simple TLV holding a single byte
    pub fn from_u8(tag: u8, value: u8) -> Self {
        Self {
            tag,
            value: Bytes::copy_from_slice(&[value]),
        }
    }

    /// Create a simple TLV holding a little-endian u16, as UCI does
    pub fn from_u16_le(tag: u8, value: u16) -> Self {
        Self {
            tag,
            value: Bytes::copy_from_slice(&value.to_le_bytes()),
        }
    }

    /// Create a simple TLV holding a little-endian u32, as UCI does
    pub fn from_u32_le(tag: u8, value: u32) -> Self {
        Self {
            tag,
            value: Bytes::copy_from_slice(&value.to_le_bytes()),
        }
    }

    /// Create a simple TLV holding a little-endian u64, as UCI does
    pub fn from_u64_le(tag: u8, value: u64) -> Self {
        Self {
            tag,
            value: Bytes::copy_from_slice(&value.to_le_bytes()),
        }
    }

    /// The tag byte
    pub fn tag(&self) -> u8 {
        self.tag
    }

    /// The raw value
    pub fn value(&self) -> &Bytes {
        &self.value
    }

    /// Encode into `buf`
    pub fn encode_into(&self, buf: &mut BytesMut) {
        buf.put_u8(self.tag);
        buf.put_u8(self.value.len() as u8);
        buf.put_slice(&self.value);
    }

    /// Encode to a contiguous buffer
    pub fn to_bytes(&self) -> Bytes {
        let mut buf = BytesMut::with_capacity(2 + self.value.len());
        self.encode_into(&mut buf);
        buf.freeze()
    }

    /// Parse one simple TLV from the start of `data`
    pub fn parse(data: &[u8]) -> Result<(TlvSimple, usize), TlvError> {
        let tag = *data.first().ok_or(TlvError::NotFound)?;
        let len = *data.get(1).ok_or(TlvError::MissingLength)? as usize;
        let available = data.len() - 2;
        if len > available {
            return Err(TlvError::Truncated {
                declared: len,
                available,
            });
        }
        Ok((
            TlvSimple {
                tag,
                value: Bytes::copy_from_slice(&data[2..2 + len]),
            },
            2 + len,
        ))
    }

    /// Parse a buffer of back-to-back simple TLVs
    pub fn parse_all(data: &[u8]) -> Result<Vec<TlvSimple>, TlvError> {
        let mut tlvs = Vec::new();
        let mut offset = 0;
        while offset < data.len() {
            let (tlv, consumed) = Self::parse(&data[offset..])?;
            tlvs.push(tlv);
            offset += consumed;
        }
        Ok(tlvs)
    }
}
