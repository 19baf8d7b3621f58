//! Card-verifiable certificate (TR-03110 Part 3, Appendix C)
//!
//! ```text
//! 7F21 CV certificate
//!   7F4E certificate body
//!     5F29 certificate profile identifier
//!     42   certification authority reference
//!     7F49 public key (OID first)
//!     5F20 certificate holder reference
//!     7F4C certificate holder authorization template
//!     5F25 certificate effective date
//!     5F24 certificate expiration date
//!     65   certificate extensions (optional)
//!   5F37 signature
//! ```

use std::fmt;

use bytes::Bytes;
use ecard_tlv::{Parser, Tag, Tlv};
use tracing::{debug, trace};

use crate::chat::{CHAT_TAG, Chat};
use crate::error::{Error, Result};
use crate::oid::{self, ObjectIdentifier};
use crate::signature::SignatureAlgorithm;

/// Tag of a CV certificate
pub const CVC_TAG: Tag = Tag::application_constructed(0x21);
const BODY_TAG: Tag = Tag::application_constructed(0x4E);
const PROFILE_IDENTIFIER_TAG: Tag = Tag::application(0x29);
const CAR_TAG: Tag = Tag::application(0x02);
const PUBLIC_KEY_TAG: Tag = Tag::application_constructed(0x49);
const CHR_TAG: Tag = Tag::application(0x20);
const EFFECTIVE_DATE_TAG: Tag = Tag::application(0x25);
const EXPIRATION_DATE_TAG: Tag = Tag::application(0x24);
const EXTENSIONS_TAG: Tag = Tag::application_constructed(0x05);
const DISCRETIONARY_TEMPLATE_TAG: Tag = Tag::application_constructed(0x13);
const SIGNATURE_TAG: Tag = Tag::application(0x37);
const OID_TAG: Tag = Tag::universal(6);

/// Certification authority or certificate holder reference
///
/// Country code, holder mnemonic and a five character sequence number, encoded as
/// ISO 8859-1 characters.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PublicKeyReference(Bytes);

impl PublicKeyReference {
    /// Wrap raw reference bytes
    pub fn new(raw: impl Into<Bytes>) -> Self {
        Self(raw.into())
    }

    /// Raw reference bytes
    pub const fn as_bytes(&self) -> &Bytes {
        &self.0
    }

    /// Two character country code
    pub fn country_code(&self) -> String {
        latin1(&self.0[..self.0.len().min(2)])
    }

    /// Holder mnemonic between the country code and the sequence number
    pub fn holder_mnemonic(&self) -> String {
        match self.0.len() {
            len @ 7.. => latin1(&self.0[2..len - 5]),
            _ => String::new(),
        }
    }

    /// Five character sequence number
    pub fn sequence_number(&self) -> String {
        match self.0.len() {
            len @ 7.. => latin1(&self.0[len - 5..]),
            _ => String::new(),
        }
    }
}

impl fmt::Display for PublicKeyReference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&latin1(&self.0))
    }
}

fn latin1(data: &[u8]) -> String {
    data.iter().map(|b| char::from(*b)).collect()
}

/// Certificate date, six unpacked BCD digits `YYMMDD` in the 21st century
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CvcDate {
    year: u16,
    month: u8,
    day: u8,
}

impl CvcDate {
    /// Build a date, checking month and day ranges
    pub fn new(year: u16, month: u8, day: u8) -> Result<Self> {
        if !(2000..=2099).contains(&year) || !(1..=12).contains(&month) || !(1..=31).contains(&day)
        {
            return Err(Error::InvalidDate);
        }
        Ok(Self { year, month, day })
    }

    /// Decode six unpacked BCD digits
    pub fn from_bytes(data: &[u8]) -> Result<Self> {
        let digits: [u8; 6] = data.try_into().map_err(|_| Error::InvalidDate)?;
        if digits.iter().any(|digit| *digit > 9) {
            return Err(Error::InvalidDate);
        }
        Self::new(
            2000 + u16::from(digits[0] * 10 + digits[1]),
            digits[2] * 10 + digits[3],
            digits[4] * 10 + digits[5],
        )
    }

    /// Encode as six unpacked BCD digits
    pub const fn to_bytes(self) -> [u8; 6] {
        let yy = (self.year % 100) as u8;
        [
            yy / 10,
            yy % 10,
            self.month / 10,
            self.month % 10,
            self.day / 10,
            self.day % 10,
        ]
    }

    /// Four digit year
    pub const fn year(self) -> u16 {
        self.year
    }

    /// Month, 1 to 12
    pub const fn month(self) -> u8 {
        self.month
    }

    /// Day of month
    pub const fn day(self) -> u8 {
        self.day
    }
}

impl fmt::Display for CvcDate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:04}-{:02}-{:02}", self.year, self.month, self.day)
    }
}

/// Public key of the certificate holder
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublicKey {
    oid: ObjectIdentifier,
    encoded: Tlv,
}

impl PublicKey {
    /// Terminal authentication algorithm OID
    pub const fn oid(&self) -> &ObjectIdentifier {
        &self.oid
    }

    /// Key parameters following the OID, e.g. modulus or public point
    pub fn parameters(&self) -> &[Tlv] {
        self.encoded.children().get(1..).unwrap_or_default()
    }

    /// The whole `7F49` object
    pub const fn encoded(&self) -> &Tlv {
        &self.encoded
    }
}

/// Card-verifiable certificate
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CardVerifiableCertificate {
    encoded: Bytes,
    profile_identifier: u8,
    car: PublicKeyReference,
    public_key: PublicKey,
    chr: PublicKeyReference,
    chat: Chat,
    effective_date: CvcDate,
    expiration_date: CvcDate,
    extensions: Vec<Tlv>,
    signature: Bytes,
}

impl CardVerifiableCertificate {
    /// Decode a `7F21` certificate
    pub fn from_bytes(data: &[u8]) -> Result<Self> {
        trace!(cvc = %hex::encode(data), "Decoding CV certificate");
        Self::try_from(&Tlv::from_bytes(data)?)
    }

    /// Encoded certificate
    pub const fn encoded(&self) -> &Bytes {
        &self.encoded
    }

    /// Certificate profile identifier
    pub const fn profile_identifier(&self) -> u8 {
        self.profile_identifier
    }

    /// Certification authority reference
    pub const fn car(&self) -> &PublicKeyReference {
        &self.car
    }

    /// Certificate holder reference
    pub const fn chr(&self) -> &PublicKeyReference {
        &self.chr
    }

    /// Holder public key
    pub const fn public_key(&self) -> &PublicKey {
        &self.public_key
    }

    /// Certificate holder authorization template
    pub const fn chat(&self) -> &Chat {
        &self.chat
    }

    /// First day of validity
    pub const fn effective_date(&self) -> CvcDate {
        self.effective_date
    }

    /// Last day of validity
    pub const fn expiration_date(&self) -> CvcDate {
        self.expiration_date
    }

    /// Whether `date` lies within the validity period
    pub fn is_valid_on(&self, date: CvcDate) -> bool {
        self.effective_date <= date && date <= self.expiration_date
    }

    /// Discretionary data templates of the extension object
    pub fn extensions(&self) -> &[Tlv] {
        &self.extensions
    }

    /// Signature over the certificate body
    pub const fn signature(&self) -> &Bytes {
        &self.signature
    }

    /// Signature scheme named by the public key OID
    pub fn signature_algorithm(&self) -> Result<SignatureAlgorithm> {
        SignatureAlgorithm::from_ta_oid(&self.public_key.oid)
    }

    /// Hash of the certificate description carried in the extensions, if any
    pub fn description_hash(&self) -> Option<&Bytes> {
        self.extensions.iter().find_map(|template| {
            let oid = template.find_child(OID_TAG)?;
            if ObjectIdentifier::from_der_value(oid.value()).ok()? != oid::ID_DESCRIPTION {
                return None;
            }
            template.find_child(Tag::context(0)).map(Tlv::value)
        })
    }

    /// Check that `description` is the certificate description this certificate was issued for
    ///
    /// The hash is computed with the hash function of the certificate's signature scheme.
    pub fn check_description(&self, description: &[u8]) -> Result<()> {
        let expected = self.description_hash().ok_or(Error::DescriptionMismatch)?;
        let hash = self
            .signature_algorithm()?
            .hash()
            .ok_or_else(|| Error::UnsupportedAlgorithm("Signature scheme has no hash.".into()))?;
        let actual = hash.digest(description)?;
        if actual.as_slice() != expected.as_ref() {
            debug!(
                expected = %hex::encode(expected),
                actual = %hex::encode(&actual),
                "Certificate description hash mismatch"
            );
            return Err(Error::DescriptionMismatch);
        }
        Ok(())
    }
}

impl TryFrom<&Tlv> for CardVerifiableCertificate {
    type Error = Error;

    fn try_from(tlv: &Tlv) -> Result<Self> {
        if tlv.tag() != CVC_TAG {
            return Err(Error::MalformedCertificate("not a CV certificate"));
        }

        let mut outer = Parser::children_of(tlv);
        let body = outer.expect(BODY_TAG)?;
        let signature = outer.expect(SIGNATURE_TAG)?.value().clone();

        let mut fields = Parser::children_of(&body);
        let profile_identifier = match fields.expect(PROFILE_IDENTIFIER_TAG)?.value().as_ref() {
            [cpi] => *cpi,
            _ => return Err(Error::MalformedCertificate("profile identifier is not one byte")),
        };
        let car = PublicKeyReference::new(fields.expect(CAR_TAG)?.value().clone());

        let key = fields.expect(PUBLIC_KEY_TAG)?;
        let key_oid = key
            .children()
            .first()
            .filter(|first| first.tag() == OID_TAG)
            .ok_or(Error::MalformedCertificate("public key does not start with an OID"))?;
        let public_key = PublicKey {
            oid: ObjectIdentifier::from_der_value(key_oid.value())?,
            encoded: key.clone(),
        };

        let chr = PublicKeyReference::new(fields.expect(CHR_TAG)?.value().clone());
        let chat = Chat::try_from(&fields.expect(CHAT_TAG)?)?;
        let effective_date = CvcDate::from_bytes(fields.expect(EFFECTIVE_DATE_TAG)?.value())?;
        let expiration_date = CvcDate::from_bytes(fields.expect(EXPIRATION_DATE_TAG)?.value())?;
        let extensions = fields
            .next_if(EXTENSIONS_TAG)
            .map(|ext| {
                ext.find_children(DISCRETIONARY_TEMPLATE_TAG)
                    .cloned()
                    .collect()
            })
            .unwrap_or_default();

        Ok(Self {
            encoded: Bytes::from(tlv.to_bytes(false)),
            profile_identifier,
            car,
            public_key,
            chr,
            chat,
            effective_date,
            expiration_date,
            extensions,
            signature,
        })
    }
}

impl fmt::Display for CardVerifiableCertificate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "CVC {} issued by {} ({}, valid {} to {})",
            self.chr,
            self.car,
            self.chat.role(),
            self.effective_date,
            self.expiration_date
        )
    }
}
