//! Authentication data carried by DIDAuthenticate requests and responses
//!
//! Protocol inputs and outputs travel as a protocol URI, root attributes and an ordered list
//! of named text elements. Binary content is hex encoded.

use bytes::Bytes;
use tracing::trace;

use crate::error::{Error, Result};

/// Named text element of authentication data
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthDataElement {
    /// Local element name
    pub name: String,
    /// Text content
    pub text: String,
    /// Element attributes in document order
    pub attributes: Vec<(String, String)>,
}

impl AuthDataElement {
    /// Element without attributes
    pub fn new(name: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            text: text.into(),
            attributes: Vec::new(),
        }
    }
}

/// Generic authentication data of a DID protocol
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DidAuthenticationData {
    /// Protocol URI
    pub protocol: String,
    /// Root attributes in document order
    pub attributes: Vec<(String, String)>,
    /// Elements in document order
    pub elements: Vec<AuthDataElement>,
}

impl DidAuthenticationData {
    /// Empty data for a protocol
    pub fn new(protocol: impl Into<String>) -> Self {
        Self {
            protocol: protocol.into(),
            ..Self::default()
        }
    }

    /// Append an element
    pub fn with_element(mut self, name: impl Into<String>, text: impl Into<String>) -> Self {
        self.elements.push(AuthDataElement::new(name, text));
        self
    }

    /// Append an element with hex encoded binary content
    pub fn with_bytes(self, name: impl Into<String>, data: &[u8]) -> Self {
        self.with_element(name, hex::encode_upper(data))
    }

    /// Append a root attribute
    pub fn with_attribute(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.attributes.push((name.into(), value.into()));
        self
    }
}

/// Read access to authentication data by element name
#[derive(Debug, Clone)]
pub struct AuthDataMap {
    data: DidAuthenticationData,
}

impl AuthDataMap {
    /// Wrap authentication data
    pub fn new(data: DidAuthenticationData) -> Self {
        trace!(protocol = %data.protocol, elements = data.elements.len(), "Reading authentication data");
        Self { data }
    }

    /// Protocol URI
    pub fn protocol(&self) -> &str {
        &self.data.protocol
    }

    /// Root attribute by name
    pub fn attribute(&self, name: &str) -> Option<&str> {
        self.data
            .attributes
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.as_str())
    }

    /// Whether an element with this name is present
    pub fn contains(&self, name: &str) -> bool {
        self.contents(name).next().is_some()
    }

    /// Number of elements with this name
    pub fn count(&self, name: &str) -> usize {
        self.contents(name).count()
    }

    /// Text of every element with this name, in document order
    pub fn contents<'a>(&'a self, name: &str) -> impl Iterator<Item = &'a str> {
        self.data
            .elements
            .iter()
            .filter(move |element| element.name == name)
            .map(|element| element.text.as_str())
    }

    /// Text of the first element with this name
    pub fn content_as_string(&self, name: &str) -> Option<&str> {
        self.data
            .elements
            .iter()
            .find(|element| element.name == name)
            .map(|element| element.text.as_str())
    }

    /// Hex decoded content of the first element with this name
    ///
    /// An absent element is `Ok(None)` and an empty one `Ok(Some(empty))`. Whitespace inside
    /// the text is ignored.
    pub fn content_as_bytes(&self, name: &str) -> Result<Option<Bytes>> {
        self.content_as_string(name)
            .map(|text| decode_hex(name, text))
            .transpose()
    }

    /// Hex decoded content of every element with this name
    pub fn contents_as_bytes(&self, name: &str) -> Result<Vec<Bytes>> {
        self.contents(name).map(|text| decode_hex(name, text)).collect()
    }

    /// Empty response for the same protocol
    pub fn response(&self) -> AuthDataResponse {
        AuthDataResponse::new(self.data.protocol.clone())
    }

    /// Underlying authentication data
    pub const fn data(&self) -> &DidAuthenticationData {
        &self.data
    }
}

fn decode_hex(name: &str, text: &str) -> Result<Bytes> {
    let compact: String = text.chars().filter(|c| !c.is_whitespace()).collect();
    hex::decode(compact).map(Bytes::from).map_err(|e| Error::InvalidHex {
        name: name.to_string(),
        reason: e.to_string(),
    })
}

/// Builder for response authentication data
///
/// Elements and attributes are kept in call order and every name may be used once.
#[derive(Debug, Clone)]
pub struct AuthDataResponse {
    data: DidAuthenticationData,
}

impl AuthDataResponse {
    /// Empty response for a protocol
    pub fn new(protocol: impl Into<String>) -> Self {
        Self {
            data: DidAuthenticationData::new(protocol),
        }
    }

    /// Append a text element
    pub fn add_element(&mut self, name: &str, text: impl Into<String>) -> Result<&mut Self> {
        if self.data.elements.iter().any(|element| element.name == name) {
            return Err(Error::DuplicateElement(name.to_string()));
        }
        self.data.elements.push(AuthDataElement::new(name, text));
        Ok(self)
    }

    /// Append an element with hex encoded binary content
    pub fn add_bytes(&mut self, name: &str, data: &[u8]) -> Result<&mut Self> {
        self.add_element(name, hex::encode_upper(data))
    }

    /// Append a root attribute
    pub fn add_attribute(&mut self, name: &str, value: impl Into<String>) -> Result<&mut Self> {
        if self.data.attributes.iter().any(|(key, _)| key == name) {
            return Err(Error::DuplicateElement(name.to_string()));
        }
        self.data.attributes.push((name.to_string(), value.into()));
        Ok(self)
    }

    /// Finished authentication data
    pub fn into_data(self) -> DidAuthenticationData {
        self.data
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> AuthDataMap {
        AuthDataMap::new(
            DidAuthenticationData::new("urn:oid:1.3.162.15480.3.0.14.2")
                .with_attribute("xsi:type", "iso:EAC1InputType")
                .with_element("Certificate", "7F21 00")
                .with_element("Certificate", "7f2100")
                .with_element("CertificateDescription", "")
                .with_element("TransactionInfo", "order 42")
                .with_element("RequiredCHAT", "7F4C0"),
        )
    }

    #[test]
    fn test_lookups() {
        let map = sample();
        assert_eq!(map.protocol(), "urn:oid:1.3.162.15480.3.0.14.2");
        assert_eq!(map.attribute("xsi:type"), Some("iso:EAC1InputType"));
        assert_eq!(map.count("Certificate"), 2);
        assert_eq!(map.content_as_string("TransactionInfo"), Some("order 42"));
        assert!(!map.contains("OptionalCHAT"));
    }

    #[test]
    fn test_content_outlives_lookup_name() {
        let map = sample();
        let text = {
            let name = String::from("TransactionInfo");
            map.content_as_string(&name)
        };
        assert_eq!(text, Some("order 42"));

        let certificates: Vec<&str> = {
            let name = String::from("Certificate");
            map.contents(&name).collect()
        };
        assert_eq!(certificates, ["7F21 00", "7f2100"]);
    }

    #[test]
    fn test_content_as_bytes() {
        let map = sample();
        assert_eq!(map.content_as_bytes("OptionalCHAT"), Ok(None));
        assert_eq!(map.content_as_bytes("CertificateDescription"), Ok(Some(Bytes::new())));
        assert_eq!(
            map.contents_as_bytes("Certificate").unwrap(),
            vec![Bytes::from_static(&[0x7F, 0x21, 0x00]); 2]
        );
        assert!(matches!(
            map.content_as_bytes("RequiredCHAT"),
            Err(Error::InvalidHex { name, .. }) if name == "RequiredCHAT"
        ));
    }

    #[test]
    fn test_response_order_and_duplicates() {
        let mut response = sample().response();
        response.add_bytes("EFCardAccess", &[0x31, 0x00]).unwrap();
        response.add_element("Challenge", "00").unwrap();
        response.add_attribute("xsi:type", "iso:EAC1OutputType").unwrap();
        assert_eq!(
            response.add_element("Challenge", "01").unwrap_err(),
            Error::DuplicateElement("Challenge".to_string())
        );
        assert!(response.add_attribute("xsi:type", "x").is_err());

        let data = response.into_data();
        let names: Vec<_> = data.elements.iter().map(|e| e.name.as_str()).collect();
        assert_eq!(names, ["EFCardAccess", "Challenge"]);
        assert_eq!(data.elements[0].text, "3100");
        assert_eq!(data.protocol, "urn:oid:1.3.162.15480.3.0.14.2");
    }
}
