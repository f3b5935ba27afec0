//! Zero-copy TLV views over borrowed input.

use crate::error::TlvError;
use crate::tag::Tag;

/// Maximum number of long-form length bytes accepted
pub const MAX_LENGTH_BYTES: usize = 4;

/// A TLV whose tag and value borrow from the parsed buffer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TlvView<'a> {
    /// Raw tag bytes
    pub tag: &'a [u8],
    /// Raw value bytes
    pub value: &'a [u8],
}

impl<'a> TlvView<'a> {
    /// Parse one TLV from the start of `data`.
    ///
    /// Returns the view and the total number of bytes consumed (tag, length
    /// and value).
    pub fn parse(data: &'a [u8]) -> Result<(TlvView<'a>, usize), TlvError> {
        let (_, tag_len) = Tag::parse(data)?;
        let (value_len, length_len) = decode_length(&data[tag_len..])?;

        let value_start = tag_len + length_len;
        let available = data.len() - value_start;
        if value_len > available {
            return Err(TlvError::Truncated {
                declared: value_len,
                available,
            });
        }

        let end = value_start + value_len;
        Ok((
            TlvView {
                tag: &data[..tag_len],
                value: &data[value_start..end],
            },
            end,
        ))
    }

    /// Whether the view's tag marks a constructed TLV
    pub fn is_constructed(&self) -> bool {
        Tag::from_bytes(self.tag).is_constructed()
    }

    /// Iterate over consecutive TLVs packed into this view's value
    pub fn children(&self) -> TlvIter<'a> {
        TlvIter::new(self.value)
    }
}

/// Iterator over a concatenation of TLVs
#[derive(Debug, Clone)]
pub struct TlvIter<'a> {
    data: &'a [u8],
    offset: usize,
    failed: bool,
}

impl<'a> TlvIter<'a> {
    /// Iterate TLVs packed back-to-back in `data`
    pub fn new(data: &'a [u8]) -> Self {
        Self {
            data,
            offset: 0,
            failed: false,
        }
    }
}

impl<'a> Iterator for TlvIter<'a> {
    type Item = Result<TlvView<'a>, TlvError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.failed || self.offset >= self.data.len() {
            return None;
        }

        match TlvView::parse(&self.data[self.offset..]) {
            Ok((view, consumed)) => {
                self.offset += consumed;
                Some(Ok(view))
            }
            Err(e) => {
                self.failed = true;
                Some(Err(TlvError::Child {
                    offset: self.offset,
                    source: Box::new(e),
                }))
            }
        }
    }
}

/// Decode a BER length field, returning the length and the number of bytes used
pub fn decode_length(data: &[u8]) -> Result<(usize, usize), TlvError> {
    let first = *data.first().ok_or(TlvError::MissingLength)?;
    if first & 0x80 == 0 {
        return Ok((first as usize, 1));
    }

    let count = (first & 0x7F) as usize;
    if count == 0 {
        return Err(TlvError::IndefiniteLength);
    }
    if count > MAX_LENGTH_BYTES {
        return Err(TlvError::LengthTooLarge(count));
    }
    if data.len() < 1 + count {
        return Err(TlvError::MissingLength);
    }

    let length = data[1..=count]
        .iter()
        .fold(0usize, |acc, b| (acc << 8) | *b as usize);
    Ok((length, 1 + count))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_borrows_input() {
        let data = [0x93, 0x01, 0x43, 0xFF];
        let (view, consumed) = TlvView::parse(&data).unwrap();
        assert_eq!(view.tag, &[0x93]);
        assert_eq!(view.value, &[0x43]);
        assert_eq!(consumed, 3);
        assert!(std::ptr::eq(view.value.as_ptr(), data[2..].as_ptr()));
    }

    #[test]
    fn test_long_form_length() {
        assert_eq!(decode_length(&[0x81, 0x80]).unwrap(), (128, 2));
        assert_eq!(decode_length(&[0x82, 0x01, 0x2C]).unwrap(), (300, 3));
        assert_eq!(decode_length(&[0x80]), Err(TlvError::IndefiniteLength));
        assert_eq!(decode_length(&[0x85, 0, 0, 0, 0, 1]), Err(TlvError::LengthTooLarge(5)));
        assert_eq!(decode_length(&[0x82, 0x01]), Err(TlvError::MissingLength));
    }

    #[test]
    fn test_truncated_value() {
        let err = TlvView::parse(&[0x80, 0x03, 0x01]).unwrap_err();
        assert_eq!(
            err,
            TlvError::Truncated {
                declared: 3,
                available: 1
            }
        );
    }

    #[test]
    fn test_children_iterator() {
        let data = [0xA4, 0x06, 0x80, 0x01, 0x01, 0x81, 0x01, 0x02];
        let (view, _) = TlvView::parse(&data).unwrap();
        assert!(view.is_constructed());

        let children: Vec<_> = view.children().collect::<Result<_, _>>().unwrap();
        assert_eq!(children.len(), 2);
        assert_eq!(children[1].tag, &[0x81]);
        assert_eq!(children[1].value, &[0x02]);
    }
}
