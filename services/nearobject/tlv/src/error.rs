//! TLV codec error types.

use thiserror::Error;

/// Coarse outcome of a TLV parse, as reported to protocol layers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ParseStatus {
    /// A valid TLV was consumed
    Succeeded,
    /// A tag was found but the length or value is malformed
    Failed,
    /// The input does not begin with a recognizable tag
    TlvNotFound,
    /// Anything else
    UnknownError,
}

/// TLV codec errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TlvError {
    /// Input is empty or starts with a padding byte
    #[error("no tlv found")]
    NotFound,

    /// Multi-byte tag runs past the end of the input
    #[error("incomplete tag")]
    IncompleteTag,

    /// Tag present but no length byte follows
    #[error("missing length field")]
    MissingLength,

    /// Indefinite length form (0x80) is not supported
    #[error("indefinite length not supported")]
    IndefiniteLength,

    /// Long-form length uses more bytes than supported
    #[error("length field too large: {0} bytes")]
    LengthTooLarge(usize),

    /// Declared value length exceeds the available input
    #[error("value truncated: declared {declared} bytes, {available} available")]
    Truncated {
        /// Declared value length
        declared: usize,
        /// Bytes actually available
        available: usize,
    },

    /// A child of a constructed TLV failed to decode
    #[error("malformed child at offset {offset}: {source}")]
    Child {
        /// Offset of the child within the parent value
        offset: usize,
        /// Underlying child error
        source: Box<TlvError>,
    },

    /// Constructed TLVs nested deeper than the decoder or builder allows
    #[error("nesting depth exceeded")]
    DepthExceeded,

    /// Builder was asked to build without a tag
    #[error("builder has no tag")]
    MissingTag,

    /// Children were added under a primitive tag
    #[error("primitive tag cannot carry children")]
    PrimitiveWithChildren,

    /// A raw value was set under a constructed tag
    #[error("constructed tag cannot carry a raw value")]
    ConstructedWithValue,

    /// Value does not fit the TLV's length field
    #[error("value too long: {0} bytes")]
    ValueTooLong(usize),

    /// A scalar accessor found a value of the wrong size
    #[error("unexpected value length: expected {expected}, got {actual}")]
    ValueLength {
        /// Expected length
        expected: usize,
        /// Actual length
        actual: usize,
    },
}

impl TlvError {
    /// Map this error onto the coarse parse status taxonomy
    pub fn status(&self) -> ParseStatus {
        match self {
            TlvError::NotFound | TlvError::IncompleteTag => ParseStatus::TlvNotFound,
            TlvError::MissingLength
            | TlvError::IndefiniteLength
            | TlvError::LengthTooLarge(_)
            | TlvError::Truncated { .. }
            | TlvError::Child { .. }
            | TlvError::DepthExceeded
            | TlvError::ValueLength { .. } => ParseStatus::Failed,
            TlvError::MissingTag
            | TlvError::PrimitiveWithChildren
            | TlvError::ConstructedWithValue
            | TlvError::ValueTooLong(_) => ParseStatus::UnknownError,
        }
    }
}
