//! ASN.1 object identifiers used by TR-03110 structures
//!
//! Well known identifiers are kept as arc slices so they can be compared against decoded
//! values without allocating.

use std::fmt;
use std::str::FromStr;

use crate::error::{Error, Result};

/// bsi-de: 0.4.0.127.0.7
const BSI_DE: [u64; 6] = [0, 4, 0, 127, 0, 7];

macro_rules! bsi_oid {
    ($($arc:literal),+) => {
        &[BSI_DE[0], BSI_DE[1], BSI_DE[2], BSI_DE[3], BSI_DE[4], BSI_DE[5], $($arc),+]
    };
}

//
// Terminal types
//
/// Inspection system (`id-IS`)
pub const ID_IS: &[u64] = bsi_oid!(3, 1, 2, 1);
/// Authentication terminal (`id-AT`)
pub const ID_AT: &[u64] = bsi_oid!(3, 1, 2, 2);
/// Signature terminal (`id-ST`)
pub const ID_ST: &[u64] = bsi_oid!(3, 1, 2, 3);

//
// Certificate description
//
/// Certificate description extension (`id-description`)
pub const ID_DESCRIPTION: &[u64] = bsi_oid!(3, 1, 3, 1);
/// Terms of usage as plain text
pub const ID_PLAIN_FORMAT: &[u64] = bsi_oid!(3, 1, 3, 1, 1);
/// Terms of usage as HTML
pub const ID_HTML_FORMAT: &[u64] = bsi_oid!(3, 1, 3, 1, 2);
/// Terms of usage as PDF
pub const ID_PDF_FORMAT: &[u64] = bsi_oid!(3, 1, 3, 1, 3);

//
// Terminal authentication signature schemes
//
/// `id-TA-RSA-v1-5-SHA-1`
pub const ID_TA_RSA_V1_5_SHA_1: &[u64] = bsi_oid!(2, 2, 2, 1, 1);
/// `id-TA-RSA-v1-5-SHA-256`
pub const ID_TA_RSA_V1_5_SHA_256: &[u64] = bsi_oid!(2, 2, 2, 1, 2);
/// `id-TA-RSA-PSS-SHA-1`
pub const ID_TA_RSA_PSS_SHA_1: &[u64] = bsi_oid!(2, 2, 2, 1, 3);
/// `id-TA-RSA-PSS-SHA-256`
pub const ID_TA_RSA_PSS_SHA_256: &[u64] = bsi_oid!(2, 2, 2, 1, 4);
/// `id-TA-RSA-v1-5-SHA-512`
pub const ID_TA_RSA_V1_5_SHA_512: &[u64] = bsi_oid!(2, 2, 2, 1, 5);
/// `id-TA-RSA-PSS-SHA-512`
pub const ID_TA_RSA_PSS_SHA_512: &[u64] = bsi_oid!(2, 2, 2, 1, 6);
/// `id-TA-ECDSA-SHA-1`
pub const ID_TA_ECDSA_SHA_1: &[u64] = bsi_oid!(2, 2, 2, 2, 1);
/// `id-TA-ECDSA-SHA-224`
pub const ID_TA_ECDSA_SHA_224: &[u64] = bsi_oid!(2, 2, 2, 2, 2);
/// `id-TA-ECDSA-SHA-256`
pub const ID_TA_ECDSA_SHA_256: &[u64] = bsi_oid!(2, 2, 2, 2, 3);
/// `id-TA-ECDSA-SHA-384`
pub const ID_TA_ECDSA_SHA_384: &[u64] = bsi_oid!(2, 2, 2, 2, 4);
/// `id-TA-ECDSA-SHA-512`
pub const ID_TA_ECDSA_SHA_512: &[u64] = bsi_oid!(2, 2, 2, 2, 5);

//
// Hash functions
//
/// SHA-1
pub const ID_SHA1: &[u64] = &[1, 3, 14, 3, 2, 26];
/// SHA-224
pub const ID_SHA224: &[u64] = &[2, 16, 840, 1, 101, 3, 4, 2, 4];
/// SHA-256
pub const ID_SHA256: &[u64] = &[2, 16, 840, 1, 101, 3, 4, 2, 1];
/// SHA-384
pub const ID_SHA384: &[u64] = &[2, 16, 840, 1, 101, 3, 4, 2, 2];
/// SHA-512
pub const ID_SHA512: &[u64] = &[2, 16, 840, 1, 101, 3, 4, 2, 3];

/// Decoded object identifier
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ObjectIdentifier {
    arcs: Vec<u64>,
}

impl ObjectIdentifier {
    /// Build an identifier from its arcs
    pub fn from_arcs(arcs: &[u64]) -> Result<Self> {
        match arcs {
            [first, second, ..] if *first <= 2 && (*first == 2 || *second < 40) => Ok(Self {
                arcs: arcs.to_vec(),
            }),
            _ => Err(Error::InvalidOid(format!("{arcs:?}"))),
        }
    }

    /// Decode the value octets of a DER `OBJECT IDENTIFIER`
    pub fn from_der_value(value: &[u8]) -> Result<Self> {
        if value.is_empty() || value.last().is_some_and(|b| b & 0x80 != 0) {
            return Err(Error::InvalidOid(hex::encode(value)));
        }

        let mut subidentifiers = Vec::new();
        let mut current: u64 = 0;
        let mut started = false;
        for octet in value {
            if !started && *octet == 0x80 {
                // leading 0x80 is a non minimal encoding
                return Err(Error::InvalidOid(hex::encode(value)));
            }
            if current >> 57 != 0 {
                return Err(Error::InvalidOid(hex::encode(value)));
            }
            current = (current << 7) | u64::from(octet & 0x7F);
            started = octet & 0x80 != 0;
            if !started {
                subidentifiers.push(current);
                current = 0;
            }
        }

        let mut arcs = Vec::with_capacity(subidentifiers.len() + 1);
        let first = subidentifiers[0];
        match first {
            0..40 => arcs.extend([0, first]),
            40..80 => arcs.extend([1, first - 40]),
            _ => arcs.extend([2, first - 80]),
        }
        arcs.extend_from_slice(&subidentifiers[1..]);
        Ok(Self { arcs })
    }

    /// Encode as the value octets of a DER `OBJECT IDENTIFIER`
    pub fn to_der_value(&self) -> Vec<u8> {
        encode_arcs(&self.arcs)
    }

    /// Arcs of this identifier
    pub fn arcs(&self) -> &[u64] {
        &self.arcs
    }

    /// Whether this identifier starts with `prefix`
    pub fn starts_with(&self, prefix: &[u64]) -> bool {
        self.arcs.starts_with(prefix)
    }

    /// `urn:oid:` form used for protocol identifiers
    pub fn to_urn(&self) -> String {
        format!("urn:oid:{self}")
    }
}

/// DER value octets for a well known identifier given by its arcs
pub fn encode_arcs(arcs: &[u64]) -> Vec<u8> {
    let mut out = Vec::new();
    let (first, rest) = match arcs {
        [a, b, rest @ ..] => (a * 40 + b, rest),
        [a] => (a * 40, &[][..]),
        [] => return out,
    };
    for arc in std::iter::once(first).chain(rest.iter().copied()) {
        push_base128(arc, &mut out);
    }
    out
}

fn push_base128(mut arc: u64, out: &mut Vec<u8>) {
    let mut groups = [0u8; 10];
    let mut n = 0;
    loop {
        groups[n] = (arc & 0x7F) as u8;
        n += 1;
        arc >>= 7;
        if arc == 0 {
            break;
        }
    }
    for i in (0..n).rev() {
        let more = if i == 0 { 0x00 } else { 0x80 };
        out.push(groups[i] | more);
    }
}

impl PartialEq<[u64]> for ObjectIdentifier {
    fn eq(&self, other: &[u64]) -> bool {
        self.arcs == other
    }
}

impl PartialEq<&[u64]> for ObjectIdentifier {
    fn eq(&self, other: &&[u64]) -> bool {
        self.arcs == *other
    }
}

impl fmt::Display for ObjectIdentifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut first = true;
        for arc in &self.arcs {
            if !first {
                f.write_str(".")?;
            }
            first = false;
            write!(f, "{arc}")?;
        }
        Ok(())
    }
}

impl FromStr for ObjectIdentifier {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let dotted = s.strip_prefix("urn:oid:").unwrap_or(s);
        let arcs = dotted
            .split('.')
            .map(|arc| arc.parse::<u64>())
            .collect::<std::result::Result<Vec<_>, _>>()
            .map_err(|_| Error::InvalidOid(s.to_string()))?;
        Self::from_arcs(&arcs)
    }
}
