//! BER tag encoding
//!
//! The leading tag octet carries the class in bits 7-6, the constructed flag in bit 5 and the tag
//! number in bits 4-0. Numbers of 31 and above use the `0x1F` escape followed by base-128
//! continuation octets, where the high bit of each octet signals that another one follows.

use std::fmt;

use crate::error::{Error, Result};

/// Class bits of a BER tag
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum TagClass {
    /// Universal class (`00`)
    Universal,
    /// Application class (`01`)
    Application,
    /// Context specific class (`10`)
    ContextSpecific,
    /// Private class (`11`)
    Private,
}

impl TagClass {
    /// Decode the class from the leading tag octet
    pub const fn from_leading_octet(octet: u8) -> Self {
        match octet >> 6 {
            0 => Self::Universal,
            1 => Self::Application,
            2 => Self::ContextSpecific,
            _ => Self::Private,
        }
    }

    /// Class bits positioned in the leading tag octet
    pub const fn leading_bits(self) -> u8 {
        match self {
            Self::Universal => 0x00,
            Self::Application => 0x40,
            Self::ContextSpecific => 0x80,
            Self::Private => 0xC0,
        }
    }
}

/// A BER tag: class, primitive/constructed flag and tag number
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Tag {
    class: TagClass,
    constructed: bool,
    number: u64,
}

impl Tag {
    /// Create a new tag
    pub const fn new(class: TagClass, constructed: bool, number: u64) -> Self {
        Self {
            class,
            constructed,
            number,
        }
    }

    /// Universal primitive tag, e.g. `06` for OBJECT IDENTIFIER
    pub const fn universal(number: u64) -> Self {
        Self::new(TagClass::Universal, false, number)
    }

    /// Application primitive tag
    pub const fn application(number: u64) -> Self {
        Self::new(TagClass::Application, false, number)
    }

    /// Application constructed tag
    pub const fn application_constructed(number: u64) -> Self {
        Self::new(TagClass::Application, true, number)
    }

    /// Context specific primitive tag
    pub const fn context(number: u64) -> Self {
        Self::new(TagClass::ContextSpecific, false, number)
    }

    /// Context specific constructed tag
    pub const fn context_constructed(number: u64) -> Self {
        Self::new(TagClass::ContextSpecific, true, number)
    }

    /// Tag class
    pub const fn class(&self) -> TagClass {
        self.class
    }

    /// Whether the constructed bit is set
    pub const fn is_constructed(&self) -> bool {
        self.constructed
    }

    /// Whether the constructed bit is clear
    pub const fn is_primitive(&self) -> bool {
        !self.constructed
    }

    /// Tag number without class and constructed flag
    pub const fn number(&self) -> u64 {
        self.number
    }

    /// Copy of this tag with the constructed flag replaced
    pub const fn with_constructed(self, constructed: bool) -> Self {
        Self {
            constructed,
            ..self
        }
    }

    /// Decode a tag from the start of `data`
    ///
    /// Returns the tag and the number of octets it occupied.
    pub fn parse(data: &[u8]) -> Result<(Self, usize)> {
        let first = *data.first().ok_or(Error::TruncatedTag)?;
        let class = TagClass::from_leading_octet(first);
        let constructed = first & 0x20 != 0;

        if first & 0x1F != 0x1F {
            return Ok((Self::new(class, constructed, u64::from(first & 0x1F)), 1));
        }

        let mut number: u64 = 0;
        let mut octets = 0;
        loop {
            let octet = *data.get(1 + octets).ok_or(Error::TruncatedTag)?;
            octets += 1;
            // another 7 bits would push the number past 64 bits
            if number >> 57 != 0 {
                return Err(Error::TagNumberTooLarge { octets });
            }
            number = (number << 7) | u64::from(octet & 0x7F);
            if octet & 0x80 == 0 {
                break;
            }
        }

        Ok((Self::new(class, constructed, number), 1 + octets))
    }

    /// Build a tag from its encoded numeric form, e.g. `0x7F21`
    pub fn from_encoded(encoded: u64) -> Result<Self> {
        let raw = encoded.to_be_bytes();
        let start = raw.iter().position(|b| *b != 0).unwrap_or(raw.len() - 1);
        let bytes = &raw[start..];

        let (tag, used) = Self::parse(bytes).map_err(|_| Error::InvalidEncodedTag(encoded))?;
        if used != bytes.len() {
            return Err(Error::InvalidEncodedTag(encoded));
        }
        Ok(tag)
    }

    /// Encode this tag to its BER octets
    pub fn to_bytes(&self) -> Vec<u8> {
        let leading = self.class.leading_bits() | if self.constructed { 0x20 } else { 0x00 };

        if self.number < 0x1F {
            return vec![leading | self.number as u8];
        }

        let mut groups = Vec::with_capacity(10);
        let mut remaining = self.number;
        loop {
            groups.push((remaining & 0x7F) as u8);
            remaining >>= 7;
            if remaining == 0 {
                break;
            }
        }

        let mut out = Vec::with_capacity(groups.len() + 1);
        out.push(leading | 0x1F);
        let last = groups.len() - 1;
        for (i, group) in groups.iter().rev().enumerate() {
            out.push(if i < last { group | 0x80 } else { *group });
        }
        out
    }
}

impl fmt::Display for Tag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", hex::encode_upper(self.to_bytes()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_single_octet_tags() {
        for number in 0..31u64 {
            let tag = Tag::new(TagClass::ContextSpecific, true, number);
            let bytes = tag.to_bytes();
            assert_eq!(bytes.len(), 1);
            assert_eq!(bytes[0], 0xA0 | number as u8);

            let (parsed, used) = Tag::parse(&bytes).unwrap();
            assert_eq!(used, 1);
            assert_eq!(parsed, tag);
        }
    }

    #[test]
    fn test_multi_octet_tags() {
        for number in [31u64, 32, 127, 128, 0x21, 0x4E, 16_383, 16_384, u64::MAX >> 1, u64::MAX] {
            let tag = Tag::new(TagClass::Application, false, number);
            let bytes = tag.to_bytes();
            assert_eq!(bytes[0] & 0x1F, 0x1F);
            assert!(bytes.len() > 1);

            let (parsed, used) = Tag::parse(&bytes).unwrap();
            assert_eq!(used, bytes.len());
            assert_eq!(parsed.number(), number);
        }
    }

    #[test]
    fn test_known_encodings() {
        let cvc = Tag::from_encoded(0x7F21).unwrap();
        assert_eq!(cvc.class(), TagClass::Application);
        assert!(cvc.is_constructed());
        assert_eq!(cvc.number(), 0x21);
        assert_eq!(cvc.to_bytes(), vec![0x7F, 0x21]);
        assert_eq!(cvc.to_string(), "7F21");

        let car = Tag::from_encoded(0x42).unwrap();
        assert_eq!(car, Tag::application(2));

        let sequence = Tag::from_encoded(0x30).unwrap();
        assert_eq!(sequence, Tag::new(TagClass::Universal, true, 16));
    }

    #[test]
    fn test_tag_number_too_large() {
        // 10 continuation octets carrying 70 bits
        let mut data = vec![0x1F];
        data.extend(std::iter::repeat_n(0xFF, 9));
        data.push(0x7F);
        assert!(matches!(
            Tag::parse(&data),
            Err(Error::TagNumberTooLarge { .. })
        ));
    }

    #[test]
    fn test_truncated_tag() {
        assert_eq!(Tag::parse(&[]), Err(Error::TruncatedTag));
        assert_eq!(Tag::parse(&[0x7F, 0x81]), Err(Error::TruncatedTag));
    }

    #[test]
    fn test_invalid_encoded_tag() {
        // continuation bit set on the last octet
        assert!(Tag::from_encoded(0x7F81).is_err());
        // trailing octet after a complete single octet tag
        assert!(Tag::from_encoded(0x4242).is_err());
    }
}
