//! EstablishChannel request and PACE output
//!
//! PACE itself runs in the reader or the middleware below the card I/O collaborator; this
//! module only shapes what goes in and reads what comes back.

use std::fmt;

use bytes::Bytes;
use derive_more::Display;
use ecard_sal::{
    AuthDataMap, AuthDataResponse, DidAuthenticationData, Error as SalError, ResultStatus,
    protocol_uri,
};
use zeroize::Zeroizing;

use crate::error::Result;

/// Element names of the PACE input and output
pub mod element {
    /// Password, omitted with a native pinpad
    pub const PIN: &str = "PIN";
    /// Password identifier
    pub const PIN_ID: &str = "PINID";
    /// Selected CHAT
    pub const CHAT: &str = "CHAT";
    /// Certificate description
    pub const CERTIFICATE_DESCRIPTION: &str = "CertificateDescription";
    /// EF.CardAccess read during PACE
    pub const EF_CARD_ACCESS: &str = "EFCardAccess";
    /// Most recent trusted CVCA reference
    pub const CURRENT_CAR: &str = "CurrentCAR";
    /// Previous trusted CVCA reference
    pub const PREVIOUS_CAR: &str = "PreviousCAR";
    /// Ephemeral card identifier
    pub const ID_PICC: &str = "IDPICC";
    /// Tries left after a failed run
    pub const RETRY_COUNTER: &str = "RetryCounter";
}

/// Password used for PACE
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display)]
pub enum PasswordId {
    /// Machine readable zone
    #[display("MRZ")]
    Mrz,
    /// Card access number
    #[display("CAN")]
    Can,
    /// eID PIN
    #[display("PIN")]
    Pin,
    /// PIN unblocking key
    #[display("PUK")]
    Puk,
}

impl PasswordId {
    /// Identifier byte
    pub const fn byte(self) -> u8 {
        match self {
            Self::Mrz => 1,
            Self::Can => 2,
            Self::Pin => 3,
            Self::Puk => 4,
        }
    }

    /// Password for an identifier byte
    pub const fn from_byte(byte: u8) -> Option<Self> {
        match byte {
            1 => Some(Self::Mrz),
            2 => Some(Self::Can),
            3 => Some(Self::Pin),
            4 => Some(Self::Puk),
            _ => None,
        }
    }

    /// Password of a PACE DID, e.g. `PIN`
    pub fn from_did_name(name: &str) -> Option<Self> {
        match name {
            "MRZ" => Some(Self::Mrz),
            "CAN" => Some(Self::Can),
            "PIN" => Some(Self::Pin),
            "PUK" => Some(Self::Puk),
            _ => None,
        }
    }
}

/// Request to run PACE in a slot
#[derive(Clone, PartialEq, Eq)]
pub struct EstablishChannel {
    /// Slot to run PACE in
    pub slot_handle: Bytes,
    /// Password identifier
    pub pin_id: PasswordId,
    /// Password, absent when the reader collects it
    pub pin: Option<Zeroizing<String>>,
    /// CHAT to present to the card
    pub chat: Option<Bytes>,
    /// Certificate description to present to the card
    pub certificate_description: Option<Bytes>,
    /// Read EF.CardAccess by short file identifier
    pub use_short_ef: bool,
}

impl EstablishChannel {
    /// Request without password, CHAT or description
    pub fn new(slot_handle: impl Into<Bytes>, pin_id: PasswordId) -> Self {
        Self {
            slot_handle: slot_handle.into(),
            pin_id,
            pin: None,
            chat: None,
            certificate_description: None,
            use_short_ef: false,
        }
    }

    /// Set the password
    pub fn with_pin(mut self, pin: Zeroizing<String>) -> Self {
        self.pin = Some(pin);
        self
    }

    /// Set the CHAT
    pub fn with_chat(mut self, chat: impl Into<Bytes>) -> Self {
        self.chat = Some(chat.into());
        self
    }

    /// Set the certificate description
    pub fn with_certificate_description(mut self, description: impl Into<Bytes>) -> Self {
        self.certificate_description = Some(description.into());
        self
    }

    /// Protocol URI of the request
    pub const fn protocol(&self) -> &'static str {
        protocol_uri::PACE
    }

    /// Request as authentication data
    pub fn to_auth_data(&self) -> DidAuthenticationData {
        let mut data = DidAuthenticationData::new(self.protocol())
            .with_element(element::PIN_ID, format!("{:02X}", self.pin_id.byte()));
        if let Some(chat) = &self.chat {
            data = data.with_bytes(element::CHAT, chat);
        }
        if let Some(description) = &self.certificate_description {
            data = data.with_bytes(element::CERTIFICATE_DESCRIPTION, description);
        }
        if let Some(pin) = &self.pin {
            data = data.with_element(element::PIN, pin.as_str());
        }
        data
    }
}

impl fmt::Debug for EstablishChannel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EstablishChannel")
            .field("slot_handle", &hex::encode_upper(&self.slot_handle))
            .field("pin_id", &self.pin_id)
            .field("pin", &self.pin.as_ref().map(|_| "<redacted>"))
            .field("chat", &self.chat.as_ref().map(hex::encode_upper))
            .field("use_short_ef", &self.use_short_ef)
            .finish_non_exhaustive()
    }
}

/// Answer to an EstablishChannel request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EstablishChannelResponse {
    /// Outcome of the PACE run
    pub result: ResultStatus,
    /// PACE output, on success
    pub data: Option<DidAuthenticationData>,
}

impl EstablishChannelResponse {
    /// Successful run with output
    pub const fn ok(data: DidAuthenticationData) -> Self {
        Self {
            result: ResultStatus::ok(),
            data: Some(data),
        }
    }

    /// Failed run with a minor code
    pub fn error(minor: &str, message: impl Into<String>) -> Self {
        Self {
            result: ResultStatus::error(minor, message),
            data: None,
        }
    }
}

/// Values the card revealed during PACE
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PaceOutput {
    /// Content of EF.CardAccess
    pub ef_card_access: Bytes,
    /// Most recent trusted CVCA reference
    pub current_car: Option<Bytes>,
    /// Previous trusted CVCA reference
    pub previous_car: Option<Bytes>,
    /// Ephemeral card identifier
    pub id_picc: Option<Bytes>,
    /// Tries left, when reported
    pub retry_counter: Option<u8>,
}

impl PaceOutput {
    /// Read the output elements
    pub fn from_auth_data(map: &AuthDataMap) -> Result<Self> {
        let ef_card_access = map
            .content_as_bytes(element::EF_CARD_ACCESS)?
            .ok_or_else(|| SalError::MissingElement(element::EF_CARD_ACCESS.to_string()))?;
        let retry_counter = map
            .content_as_string(element::RETRY_COUNTER)
            .and_then(|text| text.trim().parse().ok());
        Ok(Self {
            ef_card_access,
            current_car: map.content_as_bytes(element::CURRENT_CAR)?,
            previous_car: map.content_as_bytes(element::PREVIOUS_CAR)?,
            id_picc: map.content_as_bytes(element::ID_PICC)?,
            retry_counter,
        })
    }

    /// Output as authentication data
    pub fn to_auth_data(&self) -> Result<DidAuthenticationData> {
        let mut response = AuthDataResponse::new(protocol_uri::PACE);
        response.add_bytes(element::EF_CARD_ACCESS, &self.ef_card_access)?;
        if let Some(car) = &self.current_car {
            response.add_bytes(element::CURRENT_CAR, car)?;
        }
        if let Some(car) = &self.previous_car {
            response.add_bytes(element::PREVIOUS_CAR, car)?;
        }
        if let Some(id_picc) = &self.id_picc {
            response.add_bytes(element::ID_PICC, id_picc)?;
        }
        if let Some(counter) = self.retry_counter {
            response.add_element(element::RETRY_COUNTER, counter.to_string())?;
        }
        Ok(response.into_data())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_password_ids() {
        assert_eq!(PasswordId::Can.byte(), 2);
        assert_eq!(PasswordId::Pin.byte(), 3);
        assert_eq!(PasswordId::from_byte(4), Some(PasswordId::Puk));
        assert_eq!(PasswordId::from_byte(5), None);
        assert_eq!(PasswordId::from_did_name("CAN"), Some(PasswordId::Can));
        assert_eq!(PasswordId::from_did_name("eSign"), None);
    }

    #[test]
    fn test_establish_channel_elements() {
        let request = EstablishChannel::new(Bytes::from_static(&[0x01]), PasswordId::Pin)
            .with_pin(Zeroizing::new("123456".to_string()))
            .with_chat(hex::decode("7F4C0E").unwrap())
            .with_certificate_description(vec![0x30, 0x00]);
        assert!(!request.use_short_ef);

        let map = AuthDataMap::new(request.to_auth_data());
        assert_eq!(map.protocol(), protocol_uri::PACE);
        assert_eq!(map.content_as_string(element::PIN_ID), Some("03"));
        assert_eq!(map.content_as_string(element::CHAT), Some("7F4C0E"));
        assert_eq!(map.content_as_string(element::CERTIFICATE_DESCRIPTION), Some("3000"));
        assert_eq!(map.content_as_string(element::PIN), Some("123456"));
        assert!(!format!("{request:?}").contains("123456"));
    }

    #[test]
    fn test_native_entry_omits_pin() {
        let request = EstablishChannel::new(Bytes::from_static(&[0x01]), PasswordId::Can);
        let map = AuthDataMap::new(request.to_auth_data());
        assert!(!map.contains(element::PIN));
        assert!(!map.contains(element::CHAT));
        assert_eq!(map.content_as_string(element::PIN_ID), Some("02"));
    }

    #[test]
    fn test_pace_output() {
        let output = PaceOutput {
            ef_card_access: Bytes::from_static(&[0x31, 0x00]),
            current_car: Some(Bytes::from_static(b"DECVCAeID00102")),
            previous_car: None,
            id_picc: Some(Bytes::from_static(&[0xAA; 4])),
            retry_counter: Some(3),
        };
        let map = AuthDataMap::new(output.to_auth_data().unwrap());
        assert_eq!(PaceOutput::from_auth_data(&map).unwrap(), output);

        let missing = AuthDataMap::new(DidAuthenticationData::new(protocol_uri::PACE));
        assert_eq!(
            PaceOutput::from_auth_data(&missing),
            Err(SalError::MissingElement("EFCardAccess".to_string()).into())
        );
    }
}
