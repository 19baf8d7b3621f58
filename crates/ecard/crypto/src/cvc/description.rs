//! Certificate description of the eService (TR-03110 Part 4)
//!
//! ```text
//! CertificateDescription ::= SEQUENCE {
//!     descriptionType     OBJECT IDENTIFIER,
//!     issuerName          [1] UTF8String,
//!     issuerURL           [2] PrintableString OPTIONAL,
//!     subjectName         [3] UTF8String,
//!     subjectURL          [4] PrintableString OPTIONAL,
//!     termsOfUsage        [5] ANY DEFINED BY descriptionType,
//!     redirectURL         [6] PrintableString OPTIONAL,
//!     commCertificates    [7] SET OF OCTET STRING OPTIONAL
//! }
//! ```

use bytes::Bytes;
use ecard_tlv::{Parser, Tag, Tlv};
use sha2::{Digest, Sha256};
use tracing::warn;

use crate::error::{Error, Result};
use crate::oid::{self, ObjectIdentifier};

const SEQUENCE_TAG: Tag = Tag::new(ecard_tlv::TagClass::Universal, true, 16);
const OID_TAG: Tag = Tag::universal(6);

/// Terms of usage in the format named by the description type
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TermsOfUsage {
    /// Plain text
    Plain(String),
    /// HTML document
    Html(String),
    /// PDF document
    Pdf(Bytes),
}

impl TermsOfUsage {
    /// MIME type of the terms
    pub const fn mime_type(&self) -> &'static str {
        match self {
            Self::Plain(_) => "text/plain",
            Self::Html(_) => "text/html",
            Self::Pdf(_) => "application/pdf",
        }
    }

    /// Terms as raw bytes, UTF-8 for the text formats
    pub fn as_bytes(&self) -> &[u8] {
        match self {
            Self::Plain(text) | Self::Html(text) => text.as_bytes(),
            Self::Pdf(data) => data.as_ref(),
        }
    }
}

/// Decoded certificate description
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CertificateDescription {
    encoded: Bytes,
    description_type: ObjectIdentifier,
    issuer_name: Option<String>,
    issuer_url: Option<String>,
    subject_name: Option<String>,
    subject_url: Option<String>,
    terms_of_usage: Option<TermsOfUsage>,
    redirect_url: Option<String>,
    comm_certificates: Vec<Bytes>,
}

impl CertificateDescription {
    /// Decode an encoded description
    pub fn from_bytes(data: &[u8]) -> Result<Self> {
        let tlv = Tlv::from_bytes(data)?;
        if tlv.tag() != SEQUENCE_TAG {
            return Err(Error::MalformedDescription("not a SEQUENCE"));
        }

        let mut fields = Parser::children_of(&tlv);
        let description_type = ObjectIdentifier::from_der_value(fields.expect(OID_TAG)?.value())?;
        let mut description = Self {
            encoded: Bytes::copy_from_slice(data),
            description_type,
            issuer_name: None,
            issuer_url: None,
            subject_name: None,
            subject_url: None,
            terms_of_usage: None,
            redirect_url: None,
            comm_certificates: Vec::new(),
        };

        for field in fields {
            let tag = field.tag();
            if tag.class() != ecard_tlv::TagClass::ContextSpecific {
                return Err(Error::MalformedDescription("unknown object in description"));
            }
            let inner = field
                .children()
                .first()
                .ok_or(Error::MalformedDescription("empty tagged field"))?;
            match tag.number() {
                1 => description.issuer_name = Some(string(inner)?),
                2 => description.issuer_url = Some(string(inner)?),
                3 => description.subject_name = Some(string(inner)?),
                4 => description.subject_url = Some(string(inner)?),
                5 => description.terms_of_usage = description.parse_terms(inner)?,
                6 => description.redirect_url = Some(string(inner)?),
                7 => {
                    description.comm_certificates =
                        inner.children().iter().map(|hash| hash.value().clone()).collect();
                }
                _ => return Err(Error::MalformedDescription("unknown object in description")),
            }
        }

        Ok(description)
    }

    fn parse_terms(&self, inner: &Tlv) -> Result<Option<TermsOfUsage>> {
        let terms = match self.description_type.arcs() {
            t if t == oid::ID_PLAIN_FORMAT => TermsOfUsage::Plain(string(inner)?),
            t if t == oid::ID_HTML_FORMAT => TermsOfUsage::Html(string(inner)?),
            t if t == oid::ID_PDF_FORMAT => TermsOfUsage::Pdf(inner.value().clone()),
            _ => {
                warn!(
                    description_type = %self.description_type,
                    "Ignoring terms of usage of unknown format"
                );
                return Ok(None);
            }
        };
        Ok(Some(terms))
    }

    /// Encoded description as received
    pub const fn encoded(&self) -> &Bytes {
        &self.encoded
    }

    /// Description type, which names the terms of usage format
    pub const fn description_type(&self) -> &ObjectIdentifier {
        &self.description_type
    }

    /// Name of the certificate issuer
    pub fn issuer_name(&self) -> Option<&str> {
        self.issuer_name.as_deref()
    }

    /// URL of the certificate issuer
    pub fn issuer_url(&self) -> Option<&str> {
        self.issuer_url.as_deref()
    }

    /// Name of the eService provider
    pub fn subject_name(&self) -> Option<&str> {
        self.subject_name.as_deref()
    }

    /// URL of the eService provider
    pub fn subject_url(&self) -> Option<&str> {
        self.subject_url.as_deref()
    }

    /// Terms of usage
    pub const fn terms_of_usage(&self) -> Option<&TermsOfUsage> {
        self.terms_of_usage.as_ref()
    }

    /// Redirect URL
    pub fn redirect_url(&self) -> Option<&str> {
        self.redirect_url.as_deref()
    }

    /// SHA-256 hashes of the TLS certificates the eService may use
    pub fn comm_certificates(&self) -> &[Bytes] {
        &self.comm_certificates
    }

    /// Whether the SHA-256 hash of a DER encoded TLS certificate is listed
    pub fn contains_comm_certificate(&self, certificate: &[u8]) -> bool {
        let hash = Sha256::digest(certificate);
        self.comm_certificates
            .iter()
            .any(|known| known.as_ref() == hash.as_slice())
    }
}

fn string(tlv: &Tlv) -> Result<String> {
    String::from_utf8(tlv.value().to_vec())
        .map_err(|_| Error::MalformedDescription("string field is not valid UTF-8"))
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    fn tagged(number: u64, inner: Tlv) -> Tlv {
        Tlv::constructed(Tag::context_constructed(number), vec![inner])
    }

    fn utf8(text: &str) -> Tlv {
        Tlv::primitive(Tag::universal(12), text.as_bytes().to_vec())
    }

    /// Plain text description listing one communication certificate hash
    pub(crate) fn sample(comm_certificate: &[u8]) -> Vec<u8> {
        Tlv::constructed(
            SEQUENCE_TAG,
            vec![
                Tlv::primitive(OID_TAG, oid::encode_arcs(oid::ID_PLAIN_FORMAT)),
                tagged(1, utf8("D-Trust GmbH")),
                tagged(2, Tlv::primitive(Tag::universal(19), b"http://www.d-trust.net".to_vec())),
                tagged(3, utf8("Example eService")),
                tagged(4, Tlv::primitive(Tag::universal(19), b"https://eservice.example".to_vec())),
                tagged(5, utf8("Name, Anschrift und E-Mail-Adresse")),
                tagged(
                    7,
                    Tlv::constructed(
                        Tag::new(ecard_tlv::TagClass::Universal, true, 17),
                        vec![Tlv::primitive(
                            Tag::universal(4),
                            Sha256::digest(comm_certificate).to_vec(),
                        )],
                    ),
                ),
            ],
        )
        .to_bytes(false)
    }

    #[test]
    fn test_decode_plain_description() {
        let data = sample(b"tls certificate");
        let description = CertificateDescription::from_bytes(&data).unwrap();
        assert_eq!(description.description_type(), &oid::ID_PLAIN_FORMAT);
        assert_eq!(description.issuer_name(), Some("D-Trust GmbH"));
        assert_eq!(description.issuer_url(), Some("http://www.d-trust.net"));
        assert_eq!(description.subject_name(), Some("Example eService"));
        assert_eq!(description.subject_url(), Some("https://eservice.example"));
        assert!(description.redirect_url().is_none());

        let terms = description.terms_of_usage().unwrap();
        assert_eq!(terms.mime_type(), "text/plain");
        assert_eq!(terms.as_bytes(), "Name, Anschrift und E-Mail-Adresse".as_bytes());

        assert!(description.contains_comm_certificate(b"tls certificate"));
        assert!(!description.contains_comm_certificate(b"other certificate"));
        assert_eq!(description.encoded().as_ref(), data.as_slice());
    }

    #[test]
    fn test_pdf_terms() {
        let data = Tlv::constructed(
            SEQUENCE_TAG,
            vec![
                Tlv::primitive(OID_TAG, oid::encode_arcs(oid::ID_PDF_FORMAT)),
                tagged(5, Tlv::primitive(Tag::universal(4), b"%PDF-1.4".to_vec())),
            ],
        )
        .to_bytes(false);
        let description = CertificateDescription::from_bytes(&data).unwrap();
        assert_eq!(
            description.terms_of_usage(),
            Some(&TermsOfUsage::Pdf(Bytes::from_static(b"%PDF-1.4")))
        );
        assert!(description.comm_certificates().is_empty());
    }

    #[test]
    fn test_unknown_field_is_rejected() {
        let data = Tlv::constructed(
            SEQUENCE_TAG,
            vec![
                Tlv::primitive(OID_TAG, oid::encode_arcs(oid::ID_PLAIN_FORMAT)),
                tagged(9, utf8("?")),
            ],
        )
        .to_bytes(false);
        assert_eq!(
            CertificateDescription::from_bytes(&data),
            Err(Error::MalformedDescription("unknown object in description"))
        );
        assert!(CertificateDescription::from_bytes(&hex::decode("0400").unwrap()).is_err());
    }
}
