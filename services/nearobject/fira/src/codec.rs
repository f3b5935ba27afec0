//! Shared field codecs for FiRa data objects.
//!
//! Parameter values are big-endian. Bitmask fields map each member to a fixed
//! bit index and are carried as a fixed-width big-endian integer.

use crate::error::FiraError;
use std::collections::BTreeSet;
use uwb_tlv::{Tag, TlvBer, TlvError};

/// A value that occupies one bit of a capability bitmap
pub trait BitIndexed: Copy + Ord {
    /// Bit index (0 = least significant bit of the last byte)
    fn bit_index(self) -> u32;

    /// Inverse of [`BitIndexed::bit_index`]
    fn from_bit_index(index: u32) -> Option<Self>;
}

/// OR the members' bit masks into a big-endian bitmap of `width` bytes.
///
/// Members whose bit does not fit in `width` bytes are dropped.
pub fn encode_bitmask<T: BitIndexed>(members: &BTreeSet<T>, width: usize) -> Vec<u8> {
    let mut bitmap = vec![0u8; width];
    for index in members.iter().map(|m| m.bit_index() as usize) {
        if index < width * 8 {
            bitmap[width - 1 - index / 8] |= 1 << (index % 8);
        }
    }
    bitmap
}

/// Test each bit of a big-endian bitmap of any width; bits without a member
/// are ignored
pub fn decode_bitmask<T: BitIndexed>(bytes: &[u8]) -> BTreeSet<T> {
    let bits = bytes.len() * 8;
    (0..bits)
        .filter(|&index| bytes[bytes.len() - 1 - index / 8] & (1 << (index % 8)) != 0)
        .filter_map(|index| u32::try_from(index).ok().and_then(T::from_bit_index))
        .collect()
}

/// Fail unless `tlv` carries the structure's top-level tag
pub fn expect_tag(tlv: &TlvBer, tag: u8) -> Result<(), FiraError> {
    if tlv.tag().as_bytes() != [tag] {
        return Err(FiraError::UnexpectedTag {
            expected: Tag::from(tag),
            actual: tlv.tag().clone(),
        });
    }
    Ok(())
}

/// Parse exactly one data object from `bytes`
pub fn parse_data_object(bytes: &[u8]) -> Result<TlvBer, FiraError> {
    let (tlv, consumed) = TlvBer::parse(bytes)?;
    if consumed != bytes.len() {
        return Err(FiraError::TrailingBytes(bytes.len() - consumed));
    }
    Ok(tlv)
}

/// Single-byte tag of a child, or `None` for multi-byte tags
pub fn child_tag(child: &TlvBer) -> Option<u8> {
    match child.tag().as_bytes() {
        [tag] => Some(*tag),
        _ => None,
    }
}

fn length_error(tag: u8) -> impl FnOnce(TlvError) -> FiraError {
    move |e| FiraError::syntax(tag, e.to_string())
}

/// Raw bytes of a primitive parameter
pub fn read_bytes(child: &TlvBer, tag: u8) -> Result<Vec<u8>, FiraError> {
    child
        .value()
        .map(|v| v.to_vec())
        .ok_or_else(|| FiraError::syntax(tag, "expected a primitive value"))
}

/// Exactly `N` raw bytes
pub fn read_fixed<const N: usize>(child: &TlvBer, tag: u8) -> Result<[u8; N], FiraError> {
    child.fixed_value::<N>().map_err(length_error(tag))
}

/// One-byte value
pub fn read_u8(child: &TlvBer, tag: u8) -> Result<u8, FiraError> {
    child.value_u8().map_err(length_error(tag))
}

/// Big-endian u16
pub fn read_u16(child: &TlvBer, tag: u8) -> Result<u16, FiraError> {
    child.value_u16().map_err(length_error(tag))
}

/// Big-endian u32
pub fn read_u32(child: &TlvBer, tag: u8) -> Result<u32, FiraError> {
    child.value_u32().map_err(length_error(tag))
}

/// One-byte boolean; only 0 and 1 are accepted
pub fn read_bool(child: &TlvBer, tag: u8) -> Result<bool, FiraError> {
    match read_u8(child, tag)? {
        0 => Ok(false),
        1 => Ok(true),
        other => Err(FiraError::syntax(tag, format!("invalid boolean {other}"))),
    }
}

/// One-byte enumerated value
pub fn read_enum<T: TryFrom<u8, Error = u8>>(child: &TlvBer, tag: u8) -> Result<T, FiraError> {
    let raw = read_u8(child, tag)?;
    T::try_from(raw).map_err(|v| FiraError::syntax(tag, format!("unknown value 0x{v:02X}")))
}

/// Bitmap of exactly `width` bytes
pub fn read_bitmask<T: BitIndexed>(
    child: &TlvBer,
    tag: u8,
    width: usize,
) -> Result<BTreeSet<T>, FiraError> {
    let value = read_bytes(child, tag)?;
    if value.len() != width {
        return Err(FiraError::syntax(
            tag,
            format!("bitmap of {} bytes, expected {width}", value.len()),
        ));
    }
    Ok(decode_bitmask(&value))
}

/// Primitive parameter holding raw bytes
pub fn put_bytes(tag: impl Into<u8>, value: impl Into<Vec<u8>>) -> TlvBer {
    TlvBer::primitive(tag.into(), value.into())
}

/// Primitive parameter holding one byte
pub fn put_u8(tag: impl Into<u8>, value: u8) -> TlvBer {
    put_bytes(tag, vec![value])
}

/// Primitive parameter holding a big-endian u16
pub fn put_u16(tag: impl Into<u8>, value: u16) -> TlvBer {
    put_bytes(tag, value.to_be_bytes().to_vec())
}

/// Primitive parameter holding a big-endian u32
pub fn put_u32(tag: impl Into<u8>, value: u32) -> TlvBer {
    put_bytes(tag, value.to_be_bytes().to_vec())
}

/// Primitive parameter holding a boolean
pub fn put_bool(tag: impl Into<u8>, value: bool) -> TlvBer {
    put_u8(tag, value as u8)
}

/// Primitive parameter holding an enumerated value
pub fn put_enum<T: Into<u8>>(tag: impl Into<u8>, value: T) -> TlvBer {
    put_u8(tag, value.into())
}

/// Primitive parameter holding a bitmap of `width` bytes
pub fn put_bitmask<T: BitIndexed>(tag: impl Into<u8>, members: &BTreeSet<T>, width: usize) -> TlvBer {
    put_bytes(tag, encode_bitmask(members, width))
}
