//! BER-TLV and simple UCI TLV encoding/decoding for nearobject.
//!
//! This crate provides the low-level codec used for FiRa out-of-band data
//! objects (nested BER-TLV trees) and for UCI application configuration
//! parameters (flat 1-byte tag / 1-byte length TLVs).
//!
//! ## Features
//!
//! - **Multi-byte tags**: BER tag continuation for tags whose low five bits are set
//! - **Long-form lengths**: values larger than 127 bytes use `0x80 | n` + big-endian length
//! - **Zero-copy parsing**: [`TlvView`] borrows tag and value from the input buffer
//! - **Owned trees**: [`TlvBer`] nodes hold `Bytes` values and child lists
//!
//! ## Wire Format
//!
//! ```text
//! +--------------------+---------------------------------------------+
//! | tag (1..N bytes)   | bit 0x20 of byte 0 = constructed            |
//! +--------------------+---------------------------------------------+
//! | length (1..5 bytes)| <= 127: one byte; else 0x80|n, n BE bytes   |
//! +--------------------+---------------------------------------------+
//! | value              | raw bytes, or concatenated child TLVs       |
//! +--------------------+---------------------------------------------+
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod ber;
pub mod error;
pub mod simple;
pub mod tag;
pub mod view;

// Re-export main types
pub use ber::{encode_length, TlvBer, TlvBerBuilder, MAX_NESTING_DEPTH};
pub use error::{ParseStatus, TlvError};
pub use simple::TlvSimple;
pub use tag::Tag;
pub use view::TlvView;
