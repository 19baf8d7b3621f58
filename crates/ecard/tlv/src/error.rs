//! Error type for malformed BER-TLV input
//!
//! Every failure the codec can produce is a variant of [`Error`]. The parser never panics on
//! hostile input; truncation and overruns are reported with the offending sizes.

use crate::tag::Tag;

/// Malformed TLV structure
#[derive(Debug, Clone, Eq, PartialEq, thiserror::Error)]
pub enum Error {
    //
    // Tag related errors
    //
    /// Tag number does not fit into 64 bits
    #[error("Tag number needs {octets} continuation octets and does not fit into 64 bits")]
    TagNumberTooLarge {
        /// Number of base-128 continuation octets that were declared
        octets: usize,
    },

    /// Input ended inside a tag
    #[error("Not enough bytes in input to read TLV tag")]
    TruncatedTag,

    /// Encoded tag value given as an integer is not a valid BER tag
    #[error("Invalid encoded tag {0:#x}")]
    InvalidEncodedTag(u64),

    //
    // Length related errors
    //
    /// Input ended inside a length field
    #[error("Not enough bytes in input to read TLV length")]
    TruncatedLength,

    /// Long form length uses more octets than supported
    #[error("Length field uses {0} octets, at most 4 are supported")]
    LengthTooLarge(usize),

    /// Declared length exceeds the available input
    #[error("Declared length {declared} exceeds the {available} available bytes")]
    ValueOverrun {
        /// Length declared in the length field
        declared: usize,
        /// Bytes that were actually left in the input
        available: usize,
    },

    /// Indefinite length value without its end-of-contents marker
    #[error("Indefinite length value is not terminated by 00 00")]
    UnterminatedIndefiniteLength,

    //
    // Structure related errors
    //
    /// Input contained no TLV object at all
    #[error("No TLV object in input")]
    Empty,

    /// A required object was missing at the cursor position
    #[error("Expected tag {expected} but reached the end of the structure")]
    UnexpectedEnd {
        /// Tag that was expected
        expected: Tag,
    },

    /// The object at the cursor position has a different tag
    #[error("Expected tag {expected} but found {found}")]
    UnexpectedTag {
        /// Tag that was expected
        expected: Tag,
        /// Tag that was found instead
        found: Tag,
    },

    /// A mandatory child object is missing
    #[error("Missing child {child} in {parent}")]
    MissingChild {
        /// Tag of the enclosing object
        parent: Tag,
        /// Tag of the missing child
        child: Tag,
    },
}

/// Result type for TLV operations
pub type Result<T> = std::result::Result<T, Error>;
