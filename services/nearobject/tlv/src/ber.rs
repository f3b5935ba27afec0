//! Owned BER-TLV trees and their builder.

use crate::error::TlvError;
use crate::tag::Tag;
use crate::view::{TlvIter, TlvView};
use bytes::{BufMut, Bytes, BytesMut};

/// Maximum depth of nested constructed TLVs accepted by the decoder and
/// produced by the builder
pub const MAX_NESTING_DEPTH: usize = 16;

/// Node content: raw bytes or an ordered list of children, never both
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
enum Content {
    Primitive(Bytes),
    Constructed(Vec<TlvBer>),
}

/// An owned BER-TLV node
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TlvBer {
    tag: Tag,
    content: Content,
}

impl TlvBer {
    /// Start building a new TLV
    pub fn builder() -> TlvBerBuilder {
        TlvBerBuilder::new()
    }

    /// Create a primitive node with a raw value
    pub fn primitive(tag: impl Into<Tag>, value: impl Into<Bytes>) -> Self {
        Self {
            tag: tag.into(),
            content: Content::Primitive(value.into()),
        }
    }

    /// Create a constructed node from already-built children
    pub fn constructed(tag: impl Into<Tag>, children: Vec<TlvBer>) -> Self {
        Self {
            tag: tag.into(),
            content: Content::Constructed(children),
        }
    }

    /// The node's tag
    pub fn tag(&self) -> &Tag {
        &self.tag
    }

    /// Whether the node holds children rather than a raw value
    pub fn is_constructed(&self) -> bool {
        matches!(self.content, Content::Constructed(_))
    }

    /// Raw value of a primitive node
    pub fn value(&self) -> Option<&Bytes> {
        match &self.content {
            Content::Primitive(value) => Some(value),
            Content::Constructed(_) => None,
        }
    }

    /// Children of a constructed node (empty for primitive nodes)
    pub fn children(&self) -> &[TlvBer] {
        match &self.content {
            Content::Primitive(_) => &[],
            Content::Constructed(children) => children,
        }
    }

    /// First direct child with the given tag
    pub fn find_child(&self, tag: &[u8]) -> Option<&TlvBer> {
        self.children().iter().find(|c| c.tag.as_bytes() == tag)
    }

    /// Length of the encoded value (excluding tag and length field)
    pub fn value_len(&self) -> usize {
        match &self.content {
            Content::Primitive(value) => value.len(),
            Content::Constructed(children) => children.iter().map(TlvBer::encoded_len).sum(),
        }
    }

    /// Total encoded length including tag and length field
    pub fn encoded_len(&self) -> usize {
        let value_len = self.value_len();
        self.tag.len() + length_field_len(value_len) + value_len
    }

    /// Encode this node into `buf`
    pub fn encode_into(&self, buf: &mut BytesMut) {
        buf.put_slice(self.tag.as_bytes());
        encode_length(self.value_len(), buf);
        match &self.content {
            Content::Primitive(value) => buf.put_slice(value),
            Content::Constructed(children) => {
                for child in children {
                    child.encode_into(buf);
                }
            }
        }
    }

    /// Encode this node to a contiguous buffer
    pub fn to_bytes(&self) -> Bytes {
        let mut buf = BytesMut::with_capacity(self.encoded_len());
        self.encode_into(&mut buf);
        buf.freeze()
    }

    /// Decode one TLV tree from the start of `data`.
    ///
    /// Returns the tree and the number of bytes consumed. Constructed tags are
    /// decoded recursively; any malformed child fails the whole parse.
    pub fn parse(data: &[u8]) -> Result<(TlvBer, usize), TlvError> {
        let (view, consumed) = TlvView::parse(data)?;
        let node = Self::from_view(view, 0)?;
        Ok((node, consumed))
    }

    /// Decode a buffer holding one or more back-to-back TLV trees
    pub fn parse_all(data: &[u8]) -> Result<Vec<TlvBer>, TlvError> {
        let mut nodes = Vec::new();
        let mut offset = 0;
        while offset < data.len() {
            let (node, consumed) = Self::parse(&data[offset..])?;
            nodes.push(node);
            offset += consumed;
        }
        Ok(nodes)
    }

    /// Levels of constructed nodes from this one down, 0 for a primitive
    fn constructed_depth(&self) -> usize {
        match &self.content {
            Content::Primitive(_) => 0,
            Content::Constructed(children) => {
                1 + children
                    .iter()
                    .map(TlvBer::constructed_depth)
                    .max()
                    .unwrap_or_default()
            }
        }
    }

    fn from_view(view: TlvView<'_>, depth: usize) -> Result<TlvBer, TlvError> {
        if !view.is_constructed() {
            return Ok(TlvBer::primitive(
                Tag::from_bytes(view.tag),
                Bytes::copy_from_slice(view.value),
            ));
        }

        if depth >= MAX_NESTING_DEPTH {
            return Err(TlvError::DepthExceeded);
        }

        let mut children = Vec::new();
        let mut offset = 0;
        for child in TlvIter::new(view.value) {
            let child = child?;
            let node = Self::from_view(child, depth + 1).map_err(|e| TlvError::Child {
                offset,
                source: Box::new(e),
            })?;
            offset += node.encoded_len();
            children.push(node);
        }

        Ok(TlvBer::constructed(Tag::from_bytes(view.tag), children))
    }

    /// Value as a single byte
    pub fn value_u8(&self) -> Result<u8, TlvError> {
        Ok(self.fixed_value::<1>()?[0])
    }

    /// Value as a big-endian u16
    pub fn value_u16(&self) -> Result<u16, TlvError> {
        Ok(u16::from_be_bytes(self.fixed_value::<2>()?))
    }

    /// Value as a big-endian u32
    pub fn value_u32(&self) -> Result<u32, TlvError> {
        Ok(u32::from_be_bytes(self.fixed_value::<4>()?))
    }

    /// Value as a big-endian u64
    pub fn value_u64(&self) -> Result<u64, TlvError> {
        Ok(u64::from_be_bytes(self.fixed_value::<8>()?))
    }

    /// Value as an array of exactly `N` bytes
    pub fn fixed_value<const N: usize>(&self) -> Result<[u8; N], TlvError> {
        let value: &[u8] = self.value().map(|v| &v[..]).unwrap_or_default();
        value.try_into().map_err(|_| TlvError::ValueLength {
            expected: N,
            actual: value.len(),
        })
    }
}

/// Incremental builder for [`TlvBer`] nodes.
///
/// The encoded length is only fixed when [`TlvBerBuilder::build`] consumes
/// the builder.
#[derive(Debug, Clone, Default)]
pub struct TlvBerBuilder {
    tag: Option<Tag>,
    value: Option<Bytes>,
    children: Vec<TlvBer>,
}

impl TlvBerBuilder {
    /// Create an empty builder
    pub fn new() -> Self {
        Self::default()
    }

    /// Set a single-byte tag
    pub fn set_tag(mut self, tag: u8) -> Self {
        self.tag = Some(Tag::from(tag));
        self
    }

    /// Set a tag of one or more bytes
    pub fn set_tag_bytes(mut self, tag: &[u8]) -> Self {
        self.tag = Some(Tag::from_bytes(tag));
        self
    }

    /// Set the raw value, discarding any children
    pub fn set_value(mut self, value: impl Into<Bytes>) -> Self {
        self.children.clear();
        self.value = Some(value.into());
        self
    }

    /// Set a one-byte value
    pub fn set_value_u8(self, value: u8) -> Self {
        self.set_value(vec![value])
    }

    /// Set a big-endian u16 value
    pub fn set_value_u16(self, value: u16) -> Self {
        self.set_value(value.to_be_bytes().to_vec())
    }

    /// Set a big-endian u32 value
    pub fn set_value_u32(self, value: u32) -> Self {
        self.set_value(value.to_be_bytes().to_vec())
    }

    /// Set a big-endian u64 value
    pub fn set_value_u64(self, value: u64) -> Self {
        self.set_value(value.to_be_bytes().to_vec())
    }

    /// Append a child, discarding any raw value
    pub fn add_child(mut self, child: TlvBer) -> Self {
        self.value = None;
        self.children.push(child);
        self
    }

    /// Append several children, discarding any raw value
    pub fn add_children(mut self, children: impl IntoIterator<Item = TlvBer>) -> Self {
        self.value = None;
        self.children.extend(children);
        self
    }

    /// Discard all accumulated state
    pub fn reset(self) -> Self {
        Self::new()
    }

    /// Consume the builder and produce the node
    pub fn build(self) -> Result<TlvBer, TlvError> {
        let tag = self.tag.ok_or(TlvError::MissingTag)?;

        if tag.is_constructed() {
            if self.value.as_ref().is_some_and(|v| !v.is_empty()) {
                return Err(TlvError::ConstructedWithValue);
            }
            let node = TlvBer::constructed(tag, self.children);
            if node.constructed_depth() > MAX_NESTING_DEPTH {
                return Err(TlvError::DepthExceeded);
            }
            return Ok(node);
        }

        if !self.children.is_empty() {
            return Err(TlvError::PrimitiveWithChildren);
        }
        Ok(TlvBer::primitive(tag, self.value.unwrap_or_default()))
    }
}

/// Number of bytes needed to encode a length field for `len`
fn length_field_len(len: usize) -> usize {
    if len <= 0x7F {
        1
    } else {
        1 + significant_bytes(len)
    }
}

fn significant_bytes(len: usize) -> usize {
    let bits = usize::BITS - len.leading_zeros();
    (bits as usize).div_ceil(8)
}

/// Encode a BER length field (short form up to 127, minimal long form beyond)
pub fn encode_length(len: usize, buf: &mut BytesMut) {
    if len <= 0x7F {
        buf.put_u8(len as u8);
        return;
    }

    let count = significant_bytes(len);
    buf.put_u8(0x80 | count as u8);
    let be = len.to_be_bytes();
    buf.put_slice(&be[be.len() - count..]);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ParseStatus;

    fn build_primitive(tag: &[u8], value: &[u8]) -> TlvBer {
        TlvBer::builder()
            .set_tag_bytes(tag)
            .set_value(value.to_vec())
            .build()
            .unwrap()
    }

    #[test]
    fn test_empty_value() {
        let tlv = TlvBer::builder().set_tag(0x93).build().unwrap();
        assert_eq!(tlv.to_bytes().as_ref(), &[0x93, 0x00]);
    }

    #[test]
    fn test_single_byte_value() {
        let tlv = TlvBer::builder()
            .set_tag(0x93)
            .set_value_u8(0x43)
            .build()
            .unwrap();
        assert_eq!(tlv.to_bytes().as_ref(), &[0x93, 0x01, 0x43]);
    }

    #[test]
    fn test_multi_byte_tag_and_value() {
        let tlv = build_primitive(&[0x93, 0x94], &[0x91, 0x92]);
        assert_eq!(tlv.to_bytes().as_ref(), &[0x93, 0x94, 0x02, 0x91, 0x92]);
    }

    #[test]
    fn test_nested_matches_child_bytes() {
        let child = build_primitive(&[0x93, 0x94], &[0x91, 0x92]);
        let child_bytes = child.to_bytes();

        let parent = TlvBer::builder()
            .set_tag_bytes(&[0xB3, 0x94])
            .add_child(child)
            .build()
            .unwrap();

        let mut expected = vec![0xB3, 0x94, child_bytes.len() as u8];
        expected.extend_from_slice(&child_bytes);
        assert_eq!(parent.to_bytes().as_ref(), expected.as_slice());
    }

    #[test]
    fn test_roundtrip_nested_tree() {
        let inner = TlvBer::builder()
            .set_tag(0xA4)
            .add_child(build_primitive(&[0x80], &[0x01, 0x02]))
            .add_child(build_primitive(&[0x81], &[0x03, 0x04, 0x05, 0x06, 0x07, 0x08]))
            .build()
            .unwrap();
        let outer = TlvBer::builder()
            .set_tag(0xA1)
            .add_child(build_primitive(&[0x80], &[0x01, 0x00]))
            .add_child(inner)
            .add_child(build_primitive(&[0x9F, 0x81, 0x01], &[0xEE]))
            .build()
            .unwrap();

        let bytes = outer.to_bytes();
        let (decoded, consumed) = TlvBer::parse(&bytes).unwrap();
        assert_eq!(consumed, bytes.len());
        assert_eq!(decoded, outer);
        assert_eq!(decoded.to_bytes(), bytes);
    }

    #[test]
    fn test_long_form_roundtrip() {
        for len in [127usize, 128, 300, 70_000] {
            let value: Vec<u8> = (0..len).map(|i| i as u8).collect();
            let tlv = build_primitive(&[0x80], &value);
            let bytes = tlv.to_bytes();
            assert_eq!(bytes.len(), tlv.encoded_len());
            let (decoded, _) = TlvBer::parse(&bytes).unwrap();
            assert_eq!(decoded.value().unwrap().len(), len);
        }

        let mut buf = BytesMut::new();
        encode_length(300, &mut buf);
        assert_eq!(buf.as_ref(), &[0x82, 0x01, 0x2C]);
    }

    #[test]
    fn test_value_and_children_are_exclusive() {
        let tlv = TlvBer::builder()
            .set_tag(0xA1)
            .set_value(vec![0x01])
            .add_child(build_primitive(&[0x80], &[0x02]))
            .build()
            .unwrap();
        assert!(tlv.value().is_none());
        assert_eq!(tlv.children().len(), 1);

        let tlv = TlvBer::builder()
            .set_tag(0x80)
            .add_child(build_primitive(&[0x81], &[0x02]))
            .set_value(vec![0x01])
            .build()
            .unwrap();
        assert!(tlv.children().is_empty());
        assert_eq!(tlv.value().unwrap().as_ref(), &[0x01]);
    }

    #[test]
    fn test_builder_errors() {
        assert_eq!(TlvBer::builder().build(), Err(TlvError::MissingTag));
        assert_eq!(
            TlvBer::builder()
                .set_tag(0x80)
                .add_child(build_primitive(&[0x81], &[0x02]))
                .build(),
            Err(TlvError::PrimitiveWithChildren)
        );
        assert_eq!(
            TlvBer::builder().set_tag(0xA1).set_value(vec![1]).build(),
            Err(TlvError::ConstructedWithValue)
        );
        let reset = TlvBer::builder().set_tag(0x80).set_value_u8(1).reset();
        assert_eq!(reset.build(), Err(TlvError::MissingTag));
    }

    #[test]
    fn test_parse_status_classification() {
        assert_eq!(
            TlvBer::parse(&[]).unwrap_err().status(),
            ParseStatus::TlvNotFound
        );
        assert_eq!(
            TlvBer::parse(&[0x80, 0x05, 0x01]).unwrap_err().status(),
            ParseStatus::Failed
        );
        assert_eq!(TlvBer::parse(&[0x80]).unwrap_err().status(), ParseStatus::Failed);

        // Constructed value whose child claims more bytes than remain
        let err = TlvBer::parse(&[0xA1, 0x03, 0x80, 0x05, 0x01]).unwrap_err();
        assert!(matches!(err, TlvError::Child { offset: 0, .. }));
        assert_eq!(err.status(), ParseStatus::Failed);
    }

    #[test]
    fn test_depth_limit() {
        let mut node = build_primitive(&[0x80], &[0x01]);
        for _ in 0..=MAX_NESTING_DEPTH {
            node = TlvBer::constructed(0xA0u8, vec![node]);
        }
        let err = TlvBer::parse(&node.to_bytes()).unwrap_err();
        assert_eq!(err.status(), ParseStatus::Failed);
    }

    #[test]
    fn test_builder_depth_matches_decoder() {
        let mut node = build_primitive(&[0x80], &[0x01]);
        for _ in 0..MAX_NESTING_DEPTH - 1 {
            node = TlvBer::constructed(0xA0u8, vec![node]);
        }
        let deepest = TlvBer::builder()
            .set_tag(0xA0u8)
            .add_child(node)
            .build()
            .unwrap();
        assert!(TlvBer::parse(&deepest.to_bytes()).is_ok());

        let err = TlvBer::builder()
            .set_tag(0xA0u8)
            .add_child(deepest)
            .build()
            .unwrap_err();
        assert!(matches!(err, TlvError::DepthExceeded));
    }

    #[test]
    fn test_parse_all_and_accessors() {
        let mut buf = BytesMut::new();
        TlvBer::primitive(0x80u8, vec![0x12, 0x34]).encode_into(&mut buf);
        TlvBer::primitive(0x81u8, vec![0, 0, 0, 7]).encode_into(&mut buf);

        let nodes = TlvBer::parse_all(&buf).unwrap();
        assert_eq!(nodes.len(), 2);
        assert_eq!(nodes[0].value_u16().unwrap(), 0x1234);
        assert_eq!(nodes[1].value_u32().unwrap(), 7);
        assert_eq!(
            nodes[1].value_u16(),
            Err(TlvError::ValueLength {
                expected: 2,
                actual: 4
            })
        );
    }

    #[test]
    fn test_find_child() {
        let parent = TlvBer::constructed(
            0xA6u8,
            vec![
                TlvBer::primitive(0x80u8, vec![0x01]),
                TlvBer::primitive(0x82u8, b"US".to_vec()),
            ],
        );
        assert_eq!(
            parent.find_child(&[0x82]).unwrap().value().unwrap().as_ref(),
            b"US"
        );
        assert!(parent.find_child(&[0x81]).is_none());
    }
}
