//! First DIDAuthenticate round of Extended Access Control
//!
//! The eService sends its certificates, the certificate description and the CHATs it wants;
//! the client answers with what the card revealed during PACE and a challenge for Terminal
//! Authentication.

use bytes::Bytes;
use ecard_crypto::{
    CardVerifiableCertificate, CertificateChain, CertificateDescription, Chat,
    Error as CryptoError,
};
use ecard_sal::{AuthDataMap, DidAuthenticationData, Error as SalError, protocol_uri};
use tracing::debug;

use crate::error::Result;

/// Element names of the EAC1 input and output
pub mod element {
    /// CV certificate, repeated
    pub const CERTIFICATE: &str = "Certificate";
    /// Certificate description of the eService
    pub const CERTIFICATE_DESCRIPTION: &str = "CertificateDescription";
    /// Information about the eService
    pub const PROVIDER_INFO: &str = "ProviderInfo";
    /// Rights the eService requires
    pub const REQUIRED_CHAT: &str = "RequiredCHAT";
    /// Rights the eService would like
    pub const OPTIONAL_CHAT: &str = "OptionalCHAT";
    /// Auxiliary data for age and validity verification
    pub const AUTHENTICATED_AUXILIARY_DATA: &str = "AuthenticatedAuxiliaryData";
    /// Transaction information shown to the user
    pub const TRANSACTION_INFO: &str = "TransactionInfo";

    /// CHAT the user agreed to
    pub const CHAT: &str = "CertificateHolderAuthorizationTemplate";
    /// Trusted CVCA reference, current first
    pub const CAR: &str = "CertificationAuthorityReference";
    /// Content of EF.CardAccess
    pub const EF_CARD_ACCESS: &str = "EFCardAccess";
    /// Ephemeral card identifier
    pub const ID_PICC: &str = "IDPICC";
    /// Card challenge for Terminal Authentication
    pub const CHALLENGE: &str = "Challenge";
}

/// Parsed EAC1 input
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Eac1Input {
    chain: CertificateChain,
    terminal_certificate: CardVerifiableCertificate,
    certificate_description: CertificateDescription,
    provider_info: Option<String>,
    required_chat: Chat,
    optional_chat: Chat,
    authenticated_auxiliary_data: Option<Bytes>,
    transaction_info: Option<String>,
}

impl Eac1Input {
    /// Read and decode the input elements
    ///
    /// Exactly one certificate description is accepted. A missing required CHAT grants
    /// nothing; a missing optional CHAT defaults to the terminal certificate's CHAT.
    pub fn from_auth_data(map: &AuthDataMap) -> Result<Self> {
        let encoded = map.contents_as_bytes(element::CERTIFICATE)?;
        let chain = CertificateChain::from_encoded(encoded.iter().map(|cert| cert.as_ref()))?;
        let terminal_certificate = chain
            .terminal_certificate()
            .cloned()
            .ok_or_else(|| CryptoError::MalformedChain("No terminal certificate.".into()))?;

        let certificate_description = match map.count(element::CERTIFICATE_DESCRIPTION) {
            0 => {
                return Err(
                    SalError::MissingElement(element::CERTIFICATE_DESCRIPTION.into()).into(),
                );
            }
            1 => map
                .content_as_bytes(element::CERTIFICATE_DESCRIPTION)?
                .unwrap_or_default(),
            _ => {
                return Err(
                    SalError::DuplicateElement(element::CERTIFICATE_DESCRIPTION.into()).into(),
                );
            }
        };
        let certificate_description = CertificateDescription::from_bytes(&certificate_description)?;

        let required_chat = match map.content_as_bytes(element::REQUIRED_CHAT)? {
            Some(data) => Chat::from_bytes(&Chat::fixup(&data))?,
            None => Chat::default(),
        };
        let optional_chat = match map.content_as_bytes(element::OPTIONAL_CHAT)? {
            Some(data) => Chat::from_bytes(&Chat::fixup(&data))?,
            None => terminal_certificate.chat().clone(),
        };

        debug!(
            certificates = chain.len(),
            terminal = %terminal_certificate.chr(),
            required_chat = %required_chat,
            optional_chat = %optional_chat,
            "Parsed EAC1 input"
        );

        Ok(Self {
            chain,
            terminal_certificate,
            certificate_description,
            provider_info: map.content_as_string(element::PROVIDER_INFO).map(str::to_string),
            required_chat,
            optional_chat,
            authenticated_auxiliary_data: map
                .content_as_bytes(element::AUTHENTICATED_AUXILIARY_DATA)?,
            transaction_info: map.content_as_string(element::TRANSACTION_INFO).map(str::to_string),
        })
    }

    /// Certificates sent by the eService
    pub const fn chain(&self) -> &CertificateChain {
        &self.chain
    }

    /// Terminal certificate of the eService
    pub const fn terminal_certificate(&self) -> &CardVerifiableCertificate {
        &self.terminal_certificate
    }

    /// Decoded certificate description
    pub const fn certificate_description(&self) -> &CertificateDescription {
        &self.certificate_description
    }

    /// Provider information
    pub fn provider_info(&self) -> Option<&str> {
        self.provider_info.as_deref()
    }

    /// Rights the eService requires
    pub const fn required_chat(&self) -> &Chat {
        &self.required_chat
    }

    /// Rights the eService would like
    pub const fn optional_chat(&self) -> &Chat {
        &self.optional_chat
    }

    /// Restrict the optional CHAT to what the terminal certificate grants
    pub fn restrict_optional_chat(&mut self) {
        let terminal = self.terminal_certificate.chat().clone();
        self.optional_chat.restrict_access_rights(&terminal);
    }

    /// Auxiliary data
    pub const fn authenticated_auxiliary_data(&self) -> Option<&Bytes> {
        self.authenticated_auxiliary_data.as_ref()
    }

    /// Transaction information
    pub fn transaction_info(&self) -> Option<&str> {
        self.transaction_info.as_deref()
    }
}

/// EAC1 output
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Eac1Output {
    /// CHAT the user agreed to
    pub chat: Chat,
    /// Most recent trusted CVCA reference
    pub current_car: Option<Bytes>,
    /// Previous trusted CVCA reference
    pub previous_car: Option<Bytes>,
    /// Content of EF.CardAccess
    pub ef_card_access: Bytes,
    /// Ephemeral card identifier
    pub id_picc: Option<Bytes>,
    /// Card challenge
    pub challenge: Bytes,
}

impl Eac1Output {
    /// Output as authentication data
    ///
    /// The CAR element is repeated, the current reference first.
    pub fn to_auth_data(&self) -> DidAuthenticationData {
        let mut data = DidAuthenticationData::new(protocol_uri::EAC)
            .with_bytes(element::CHAT, &self.chat.to_bytes());
        for car in [&self.current_car, &self.previous_car].into_iter().flatten() {
            data = data.with_bytes(element::CAR, car);
        }
        data = data.with_bytes(element::EF_CARD_ACCESS, &self.ef_card_access);
        if let Some(id_picc) = &self.id_picc {
            data = data.with_bytes(element::ID_PICC, id_picc);
        }
        data.with_bytes(element::CHALLENGE, &self.challenge)
    }
}

#[cfg(test)]
mod tests {
    use ecard_crypto::{AccessRight, DataGroup};

    use super::*;
    use crate::error::Error;
    use crate::simulator::{CURRENT_CAR, PREVIOUS_CAR, SampleService, TERMINAL_CHR};

    fn read(number: u8) -> AccessRight {
        AccessRight::Read(DataGroup::new(number).unwrap())
    }

    fn parse(data: DidAuthenticationData) -> Result<Eac1Input> {
        Eac1Input::from_auth_data(&AuthDataMap::new(data))
    }

    #[test]
    fn test_parse_sample_input() {
        let service = SampleService {
            transaction_info: Some("Order 4711".to_string()),
            ..SampleService::default()
        };
        let input = parse(service.eac1_input().unwrap()).unwrap();

        assert_eq!(input.chain().len(), 2);
        assert_eq!(input.terminal_certificate().chr().to_string(), TERMINAL_CHR);
        assert_eq!(
            input.certificate_description().encoded().as_ref(),
            service.description().as_slice()
        );
        assert!(input.required_chat().has_right(read(4)));
        assert!(!input.required_chat().has_right(read(9)));
        assert!(input.optional_chat().has_right(read(9)));
        assert_eq!(input.transaction_info(), Some("Order 4711"));
        assert_eq!(input.provider_info(), None);
        assert_eq!(input.authenticated_auxiliary_data(), None);
    }

    #[test]
    fn test_chat_defaults() {
        let service = SampleService {
            required_chat: None,
            optional_chat: None,
            ..SampleService::default()
        };
        let input = parse(service.eac1_input().unwrap()).unwrap();
        assert!(input.required_chat().granted_rights().is_empty());
        assert_eq!(input.optional_chat(), &service.terminal_chat);
    }

    #[test]
    fn test_restrict_optional_chat() {
        let mut optional = SampleService::default().terminal_chat;
        optional.set_right(read(17), true);
        let service = SampleService {
            optional_chat: Some(optional),
            ..SampleService::default()
        };
        let mut input = parse(service.eac1_input().unwrap()).unwrap();
        assert!(input.optional_chat().has_right(read(17)));

        input.restrict_optional_chat();
        assert!(!input.optional_chat().has_right(read(17)));
        assert!(input.optional_chat().has_right(read(9)));
    }

    #[test]
    fn test_certificate_description_count() {
        let service = SampleService::default();
        let mut data = DidAuthenticationData::new(protocol_uri::EAC);
        for certificate in service.certificates().unwrap() {
            data = data.with_bytes(element::CERTIFICATE, &certificate);
        }
        assert_eq!(
            parse(data.clone()).unwrap_err(),
            Error::Sal(SalError::MissingElement(element::CERTIFICATE_DESCRIPTION.into()))
        );

        let description = service.description();
        let data = data
            .with_bytes(element::CERTIFICATE_DESCRIPTION, &description)
            .with_bytes(element::CERTIFICATE_DESCRIPTION, &description);
        assert_eq!(
            parse(data).unwrap_err(),
            Error::Sal(SalError::DuplicateElement(element::CERTIFICATE_DESCRIPTION.into()))
        );
    }

    #[test]
    fn test_terminal_certificate_required() {
        let service = SampleService::default();
        let certificates = service.certificates().unwrap();
        let data = DidAuthenticationData::new(protocol_uri::EAC)
            .with_bytes(element::CERTIFICATE, &certificates[0])
            .with_bytes(element::CERTIFICATE_DESCRIPTION, &service.description());
        assert!(matches!(
            parse(data).unwrap_err(),
            Error::Crypto(CryptoError::MalformedChain(_))
        ));
    }

    #[test]
    fn test_invalid_hex() {
        let data = DidAuthenticationData::new(protocol_uri::EAC)
            .with_element(element::CERTIFICATE, "7F21XY");
        assert!(matches!(parse(data).unwrap_err(), Error::Sal(_)));
    }

    #[test]
    fn test_output_elements() {
        let output = Eac1Output {
            chat: SampleService::default().terminal_chat,
            current_car: Some(Bytes::from_static(CURRENT_CAR.as_bytes())),
            previous_car: Some(Bytes::from_static(PREVIOUS_CAR.as_bytes())),
            ef_card_access: Bytes::from_static(&[0x31, 0x00]),
            id_picc: None,
            challenge: Bytes::from_static(&[0x01, 0x02, 0x03, 0x04, 0x05, 0x06, 0x07, 0x08]),
        };
        let map = AuthDataMap::new(output.to_auth_data());

        assert_eq!(map.protocol(), protocol_uri::EAC);
        let cars: Vec<_> = map.contents(element::CAR).collect();
        assert_eq!(
            cars,
            vec![hex::encode_upper(CURRENT_CAR), hex::encode_upper(PREVIOUS_CAR)]
        );
        assert_eq!(map.content_as_string(element::CHALLENGE), Some("0102030405060708"));
        assert_eq!(map.content_as_string(element::EF_CARD_ACCESS), Some("3100"));
        assert!(!map.contains(element::ID_PICC));
        assert_eq!(
            map.content_as_bytes(element::CHAT).unwrap().unwrap().as_ref(),
            output.chat.to_bytes().as_slice()
        );
    }
}
