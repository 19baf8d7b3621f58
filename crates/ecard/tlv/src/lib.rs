//! BER-TLV codec for eID card structures
//!
//! This crate parses and serializes the ASN.1 BER tag-length-value objects used by
//! card-verifiable certificates, certificate holder authorization templates and the
//! security structures read from an eID card.
//!
//! ## Overview
//!
//! - [`Tag`] handles the leading tag octet and the multi-octet tag number form
//! - [`Tlv`] is a parsed object with its children and a link to its next sibling
//! - [`Parser`] is a cursor with lookahead and tag matching over a sequence of objects
//!
//! Definite length input round-trips byte for byte through [`Tlv::from_bytes`] and
//! [`Tlv::to_bytes`] when it uses the shortest length encoding. Indefinite length objects are
//! accepted on input and always written back with a definite length.
#![cfg_attr(not(test), warn(unused_crate_dependencies))]
#![forbid(unsafe_code)]
#![warn(missing_docs, rustdoc::missing_crate_level_docs)]

pub use bytes::Bytes;

pub mod error;
mod length;
pub mod parser;
pub mod tag;
pub mod tlv;

pub use error::{Error, Result};
pub use parser::Parser;
pub use tag::{Tag, TagClass};
pub use tlv::Tlv;

/// Prelude module containing commonly used types
pub mod prelude {
    pub use crate::{Bytes, Error, Parser, Tag, TagClass, Tlv};
}
