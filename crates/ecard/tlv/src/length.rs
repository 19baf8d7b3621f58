//! BER length field handling

use crate::error::{Error, Result};

/// Decoded length field
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Length {
    /// Definite length in octets
    Definite(usize),
    /// Indefinite form (`80`), terminated by `00 00`
    Indefinite,
}

impl Length {
    /// Decode a length field from the start of `data`, returning it with its size in octets
    pub(crate) fn parse(data: &[u8]) -> Result<(Self, usize)> {
        let first = *data.first().ok_or(Error::TruncatedLength)?;

        if first & 0x80 == 0 {
            return Ok((Self::Definite(usize::from(first)), 1));
        }

        let octets = usize::from(first & 0x7F);
        if octets == 0 {
            return Ok((Self::Indefinite, 1));
        }
        if octets > 4 {
            return Err(Error::LengthTooLarge(octets));
        }

        let field = data.get(1..=octets).ok_or(Error::TruncatedLength)?;
        let length = field
            .iter()
            .fold(0usize, |acc, octet| (acc << 8) | usize::from(*octet));
        Ok((Self::Definite(length), 1 + octets))
    }
}

/// Append the shortest definite length encoding of `length` to `out`
pub(crate) fn encode(length: usize, out: &mut Vec<u8>) {
    if length <= 0x7F {
        out.push(length as u8);
        return;
    }

    let raw = length.to_be_bytes();
    let start = raw.iter().position(|b| *b != 0).unwrap_or(raw.len() - 1);
    out.push(0x80 | (raw.len() - start) as u8);
    out.extend_from_slice(&raw[start..]);
}

/// Offset of the first `00 00` end-of-contents pair in `data`
pub(crate) fn find_end_of_contents(data: &[u8]) -> Result<usize> {
    data.windows(2)
        .position(|pair| pair == [0x00, 0x00])
        .ok_or(Error::UnterminatedIndefiniteLength)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn encoded(length: usize) -> Vec<u8> {
        let mut out = Vec::new();
        encode(length, &mut out);
        out
    }

    #[test]
    fn test_short_and_long_form() {
        assert_eq!(encoded(0), vec![0x00]);
        assert_eq!(encoded(127), vec![0x7F]);
        assert_eq!(encoded(128), vec![0x81, 0x80]);
        assert_eq!(encoded(255), vec![0x81, 0xFF]);
        assert_eq!(encoded(256), vec![0x82, 0x01, 0x00]);
        assert_eq!(encoded(0x01_0000), vec![0x83, 0x01, 0x00, 0x00]);
    }

    #[test]
    fn test_parse_forms() {
        assert_eq!(Length::parse(&[0x05]).unwrap(), (Length::Definite(5), 1));
        assert_eq!(
            Length::parse(&[0x82, 0x01, 0x00]).unwrap(),
            (Length::Definite(256), 3)
        );
        assert_eq!(Length::parse(&[0x80]).unwrap(), (Length::Indefinite, 1));
    }

    #[test]
    fn test_parse_errors() {
        assert_eq!(Length::parse(&[]), Err(Error::TruncatedLength));
        assert_eq!(Length::parse(&[0x82, 0x01]), Err(Error::TruncatedLength));
        assert_eq!(
            Length::parse(&[0x85, 1, 2, 3, 4, 5]),
            Err(Error::LengthTooLarge(5))
        );
    }

    #[test]
    fn test_end_of_contents() {
        assert_eq!(find_end_of_contents(&[0x01, 0x02, 0x00, 0x00]), Ok(2));
        assert_eq!(find_end_of_contents(&[0x00, 0x00]), Ok(0));
        assert_eq!(
            find_end_of_contents(&[0x01, 0x00, 0x02]),
            Err(Error::UnterminatedIndefiniteLength)
        );
    }
}
