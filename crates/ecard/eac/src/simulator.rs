//! Simulated card, eService and user for demos and tests
//!
//! [`SimulatedCard`] answers the PIN status query and GET CHALLENGE and runs PACE by comparing
//! passwords, with the retry counter behavior of an eID card. [`SampleService`] produces a
//! consistent EAC1 input and [`ScriptedConsent`] answers wizard steps from a queue.

use std::collections::VecDeque;

use bytes::Bytes;
use ecard_crypto::oid::{self, encode_arcs};
use ecard_crypto::{AccessRight, Chat, DataGroup, HashAlgorithm, SpecialFunction, TerminalType};
use ecard_sal::{
    CardApplicationInfo, CardInfo, DidAuthenticationData, DidInfo, PaceMarker, SecurityCondition,
    ServiceAction, minor, protocol_uri,
};
use ecard_tlv::{Tag, TagClass, Tlv};
use parking_lot::Mutex;
use tracing::debug;

use crate::card::CardIo;
use crate::eac1::element;
use crate::error::{Error, Result};
use crate::pace::{EstablishChannel, EstablishChannelResponse, PaceOutput, PasswordId};
use crate::pin_state::PinState;
use crate::status::{GET_CHALLENGE_COMMAND, PIN_STATUS_COMMAND, StatusWord};
use crate::step::{Step, StepResult, UserConsent};

/// Trusted CVCA the simulated card reports after PACE
pub const CURRENT_CAR: &str = "DECVCAeID00102";
/// Previous CVCA the simulated card reports after PACE
pub const PREVIOUS_CAR: &str = "DECVCAeID00101";
/// Holder reference of the sample document verifier
pub const DV_CHR: &str = "DEDVeIDDTR101415";
/// Holder reference of the sample terminal
pub const TERMINAL_CHR: &str = "DEDEMOPAA00079";

/// Card type URI of the German eID card
pub const NPA_CARD_TYPE: &str = "http://bsi.bund.de/cif/npa.xml";
/// Identifier of the master file application
pub const ROOT_APPLICATION: &[u8] = &[0x3F, 0x00];

const EF_CARD_ACCESS: &[u8] = &[
    0x31, 0x14, 0x30, 0x12, 0x06, 0x0A, 0x04, 0x00, 0x7F, 0x00, 0x07, 0x02, 0x02, 0x04, 0x02,
    0x02, 0x02, 0x01, 0x02, 0x02, 0x01, 0x0D,
];

/// Card info of the eID card with the PACE DIDs `PIN` and `CAN` in the root application
pub fn card_info() -> CardInfo {
    let pace = |name: &str, length| DidInfo {
        name: name.to_string(),
        protocol: protocol_uri::PACE.to_string(),
        pace_marker: Some(PaceMarker {
            min_length: length,
            max_length: length,
        }),
        access: [(ServiceAction::DidAuthenticate, SecurityCondition::Always)].into(),
    };
    CardInfo {
        card_type: NPA_CARD_TYPE.to_string(),
        implicitly_selected_application: Bytes::from_static(ROOT_APPLICATION),
        applications: vec![CardApplicationInfo {
            identifier: Bytes::from_static(ROOT_APPLICATION),
            name: "MF".to_string(),
            access: [(ServiceAction::CardApplicationConnect, SecurityCondition::Always)].into(),
            dids: vec![pace("PIN", 6), pace("CAN", 6)],
            data_sets: Vec::new(),
        }],
    }
}

#[derive(Debug)]
struct CardModel {
    pin: String,
    can: String,
    pin_state: PinState,
    can_verified: bool,
    present: bool,
    challenges: u8,
    commands: Vec<Bytes>,
    requests: Vec<EstablishChannel>,
}

/// eID card in a reader slot
#[derive(Debug)]
pub struct SimulatedCard {
    slot_handle: Bytes,
    model: Mutex<CardModel>,
}

impl SimulatedCard {
    /// Card with full retry counter
    pub fn new(slot_handle: impl Into<Bytes>, pin: &str, can: &str) -> Self {
        Self {
            slot_handle: slot_handle.into(),
            model: Mutex::new(CardModel {
                pin: pin.to_string(),
                can: can.to_string(),
                pin_state: PinState::Rc3,
                can_verified: false,
                present: true,
                challenges: 0,
                commands: Vec::new(),
                requests: Vec::new(),
            }),
        }
    }

    /// Start from another retry counter position
    pub fn with_pin_state(self, state: PinState) -> Self {
        self.model.lock().pin_state = state;
        self
    }

    /// Slot the card sits in
    pub const fn slot_handle(&self) -> &Bytes {
        &self.slot_handle
    }

    /// Pull the card from the reader
    pub fn remove(&self) {
        self.model.lock().present = false;
    }

    /// Current retry counter position
    pub fn pin_state(&self) -> PinState {
        self.model.lock().pin_state
    }

    /// APDUs received so far
    pub fn commands(&self) -> Vec<Bytes> {
        self.model.lock().commands.clone()
    }

    /// EstablishChannel requests received so far
    pub fn requests(&self) -> Vec<EstablishChannel> {
        self.model.lock().requests.clone()
    }

    /// What the card reveals after a successful PACE run
    pub fn pace_output() -> PaceOutput {
        PaceOutput {
            ef_card_access: Bytes::from_static(EF_CARD_ACCESS),
            current_car: Some(Bytes::from_static(CURRENT_CAR.as_bytes())),
            previous_car: Some(Bytes::from_static(PREVIOUS_CAR.as_bytes())),
            id_picc: Some(Bytes::from_static(&[0x1D; 32])),
            retry_counter: Some(3),
        }
    }

    fn check_slot(&self, model: &CardModel, slot_handle: &[u8]) -> bool {
        model.present && self.slot_handle.as_ref() == slot_handle
    }
}

impl CardIo for SimulatedCard {
    fn do_transmit(&self, slot_handle: &[u8], command: &[u8]) -> Result<Bytes> {
        let mut model = self.model.lock();
        if !self.check_slot(&model, slot_handle) {
            return Err(Error::Transmission("No card in the slot.".to_string()));
        }
        model.commands.push(Bytes::copy_from_slice(command));

        let mut response = Vec::new();
        let status = if command == PIN_STATUS_COMMAND {
            model
                .pin_state
                .status_word()
                .unwrap_or(StatusWord::new(0x6F, 0x00))
        } else if command == GET_CHALLENGE_COMMAND {
            model.challenges = model.challenges.wrapping_add(1);
            response.extend((0..8).map(|i| model.challenges.wrapping_add(i)));
            StatusWord::new(0x90, 0x00)
        } else {
            StatusWord::new(0x6D, 0x00)
        };
        response.extend_from_slice(&[status.sw1, status.sw2]);
        Ok(Bytes::from(response))
    }

    fn establish_channel(&self, request: &EstablishChannel) -> Result<EstablishChannelResponse> {
        let mut model = self.model.lock();
        if !self.check_slot(&model, &request.slot_handle) {
            return Ok(EstablishChannelResponse::error(
                minor::ifdl::INVALID_SLOT_HANDLE,
                "No card in the slot.",
            ));
        }
        model.requests.push(request.clone());

        // a pinpad reader collects the right password
        let expected = match request.pin_id {
            PasswordId::Can => model.can.clone(),
            PasswordId::Pin => model.pin.clone(),
            PasswordId::Mrz | PasswordId::Puk => {
                return Ok(EstablishChannelResponse::error(
                    minor::ifdl::UNKNOWN_ERROR,
                    "Password not supported by the simulator.",
                ));
            }
        };
        let correct = request
            .pin
            .as_ref()
            .is_none_or(|given| given.as_str() == expected);
        debug!(pin_id = %request.pin_id, correct, state = %model.pin_state, "Simulated PACE");

        let response = match request.pin_id {
            PasswordId::Can if correct => {
                model.can_verified = true;
                EstablishChannelResponse::ok(Self::pace_output().to_auth_data()?)
            }
            PasswordId::Can => EstablishChannelResponse::error(
                minor::ifdl::AUTHENTICATION_FAILED,
                "The CAN is wrong.",
            ),
            _ => match model.pin_state {
                PinState::Blocked => {
                    EstablishChannelResponse::error(minor::ifdl::PASSWORD_BLOCKED, "PIN blocked.")
                }
                PinState::Deactivated => EstablishChannelResponse::error(
                    minor::ifdl::PASSWORD_DEACTIVATED,
                    "PIN deactivated.",
                ),
                PinState::Rc1 if !model.can_verified => EstablishChannelResponse::error(
                    minor::ifdl::PASSWORD_SUSPENDED,
                    "PIN suspended.",
                ),
                _ if correct => {
                    model.pin_state = PinState::Rc3;
                    model.can_verified = false;
                    EstablishChannelResponse::ok(Self::pace_output().to_auth_data()?)
                }
                PinState::Rc1 => {
                    model.pin_state = PinState::Blocked;
                    EstablishChannelResponse::error(minor::ifdl::PASSWORD_BLOCKED, "PIN blocked.")
                }
                PinState::Rc2 => {
                    model.pin_state = PinState::Rc1;
                    EstablishChannelResponse::error(minor::ifdl::PASSWORD_ERROR, "Wrong PIN.")
                }
                PinState::Rc3 | PinState::Unknown => {
                    model.pin_state = PinState::Rc2;
                    EstablishChannelResponse::error(minor::ifdl::PASSWORD_ERROR, "Wrong PIN.")
                }
            },
        };
        Ok(response)
    }
}

/// User answering steps from a script
///
/// Once the script is exhausted every step is cancelled.
pub struct ScriptedConsent {
    answers: Mutex<VecDeque<StepResult>>,
    shown: Mutex<Vec<Step>>,
    hook: Option<Box<dyn Fn(&Step) + Send + Sync>>,
}

impl ScriptedConsent {
    /// User giving these answers in order
    pub fn new(answers: impl IntoIterator<Item = StepResult>) -> Self {
        Self {
            answers: Mutex::new(answers.into_iter().collect()),
            shown: Mutex::new(Vec::new()),
            hook: None,
        }
    }

    /// Run `hook` whenever a step is shown, before it is answered
    pub fn with_hook(mut self, hook: impl Fn(&Step) + Send + Sync + 'static) -> Self {
        self.hook = Some(Box::new(hook));
        self
    }

    /// Steps shown so far
    pub fn shown(&self) -> Vec<Step> {
        self.shown.lock().clone()
    }

    /// Names of the steps shown so far
    pub fn shown_names(&self) -> Vec<&'static str> {
        self.shown.lock().iter().map(Step::name).collect()
    }
}

impl UserConsent for ScriptedConsent {
    fn show(&self, step: &Step) -> StepResult {
        self.shown.lock().push(step.clone());
        if let Some(hook) = &self.hook {
            hook(step);
        }
        self.answers
            .lock()
            .pop_front()
            .unwrap_or_else(StepResult::cancel)
    }
}

impl std::fmt::Debug for ScriptedConsent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ScriptedConsent")
            .field("remaining", &self.answers.lock().len())
            .field("shown", &self.shown.lock().len())
            .finish_non_exhaustive()
    }
}

/// eService with a document verifier and a terminal certificate
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SampleService {
    /// CHAT of the terminal certificate
    pub terminal_chat: Chat,
    /// Required CHAT, sent as a bare bitmap
    pub required_chat: Option<Chat>,
    /// Optional CHAT, sent fully encoded
    pub optional_chat: Option<Chat>,
    /// Put the hash of the description into the terminal certificate
    pub bind_description: bool,
    /// Transaction information
    pub transaction_info: Option<String>,
}

impl Default for SampleService {
    fn default() -> Self {
        let read = |number| DataGroup::new(number).map(AccessRight::Read);
        let mut terminal_chat = Chat::new(TerminalType::AuthenticationTerminal);
        let mut required_chat = terminal_chat.clone();
        let mut optional_chat = terminal_chat.clone();
        for right in [read(4), read(5), read(9)].into_iter().flatten() {
            terminal_chat.set_right(right, true);
        }
        terminal_chat.set_right(AccessRight::Special(SpecialFunction::AgeVerification), true);
        terminal_chat.set_right(
            AccessRight::Special(SpecialFunction::RestrictedIdentification),
            true,
        );

        for right in [read(4), read(5)].into_iter().flatten() {
            required_chat.set_right(right, true);
        }
        required_chat.set_right(
            AccessRight::Special(SpecialFunction::RestrictedIdentification),
            true,
        );
        if let Some(right) = read(9) {
            optional_chat.set_right(right, true);
        }
        optional_chat.set_right(AccessRight::Special(SpecialFunction::AgeVerification), true);

        Self {
            terminal_chat,
            required_chat: Some(required_chat),
            optional_chat: Some(optional_chat),
            bind_description: true,
            transaction_info: None,
        }
    }
}

impl SampleService {
    /// Plain text certificate description
    pub fn description(&self) -> Vec<u8> {
        let tagged = |number, inner| Tlv::constructed(Tag::context_constructed(number), vec![inner]);
        let utf8 = |text: &str| Tlv::primitive(Tag::universal(12), text.as_bytes().to_vec());
        let printable = |text: &str| Tlv::primitive(Tag::universal(19), text.as_bytes().to_vec());

        Tlv::constructed(
            Tag::new(TagClass::Universal, true, 16),
            vec![
                Tlv::primitive(Tag::universal(6), encode_arcs(oid::ID_PLAIN_FORMAT)),
                tagged(1, utf8("Governikus Test DVCA")),
                tagged(2, printable("http://www.governikus.de")),
                tagged(3, utf8("Demo eService")),
                tagged(4, printable("https://eservice.example")),
                tagged(5, utf8("Demo eService GmbH\r\nMusterstrasse 1\r\n12345 Berlin")),
            ],
        )
        .to_bytes(false)
    }

    /// Encoded DV and terminal certificates
    pub fn certificates(&self) -> Result<Vec<Vec<u8>>> {
        let mut dv_chat = self.terminal_chat.clone();
        dv_chat.set_role(ecard_crypto::Role::DvOfficial);
        let hash = if self.bind_description {
            Some(HashAlgorithm::Sha256.digest(&self.description())?)
        } else {
            None
        };
        Ok(vec![
            certificate(CURRENT_CAR, DV_CHR, &dv_chat, None),
            certificate(DV_CHR, TERMINAL_CHR, &self.terminal_chat, hash.as_deref()),
        ])
    }

    /// EAC1 input carrying the certificates, description and CHATs
    pub fn eac1_input(&self) -> Result<DidAuthenticationData> {
        let mut data = DidAuthenticationData::new(protocol_uri::EAC);
        for certificate in self.certificates()? {
            data = data.with_bytes(element::CERTIFICATE, &certificate);
        }
        data = data.with_bytes(element::CERTIFICATE_DESCRIPTION, &self.description());
        if let Some(chat) = &self.required_chat {
            data = data.with_bytes(element::REQUIRED_CHAT, chat.discretionary_data());
        }
        if let Some(chat) = &self.optional_chat {
            data = data.with_bytes(element::OPTIONAL_CHAT, &chat.to_bytes());
        }
        if let Some(info) = &self.transaction_info {
            data = data.with_element(element::TRANSACTION_INFO, info.as_str());
        }
        Ok(data)
    }
}

fn certificate(car: &str, chr: &str, chat: &Chat, description_hash: Option<&[u8]>) -> Vec<u8> {
    let mut body = vec![
        Tlv::primitive(Tag::application(0x29), vec![0x00]),
        Tlv::primitive(Tag::application(0x02), car.as_bytes().to_vec()),
        Tlv::constructed(
            Tag::application_constructed(0x49),
            vec![
                Tlv::primitive(Tag::universal(6), encode_arcs(oid::ID_TA_ECDSA_SHA_256)),
                Tlv::primitive(Tag::context(6), vec![0x04; 65]),
            ],
        ),
        Tlv::primitive(Tag::application(0x20), chr.as_bytes().to_vec()),
        chat.to_tlv(),
        Tlv::primitive(Tag::application(0x25), vec![2, 6, 0, 9, 0, 1]),
        Tlv::primitive(Tag::application(0x24), vec![2, 6, 1, 0, 0, 1]),
    ];
    if let Some(hash) = description_hash {
        body.push(Tlv::constructed(
            Tag::application_constructed(0x05),
            vec![Tlv::constructed(
                Tag::application_constructed(0x13),
                vec![
                    Tlv::primitive(Tag::universal(6), encode_arcs(oid::ID_DESCRIPTION)),
                    Tlv::primitive(Tag::context(0), hash.to_vec()),
                ],
            )],
        ));
    }
    Tlv::constructed(
        Tag::application_constructed(0x21),
        vec![
            Tlv::constructed(Tag::application_constructed(0x4E), body),
            Tlv::primitive(Tag::application(0x37), vec![0x5A; 64]),
        ],
    )
    .to_bytes(false)
}

#[cfg(test)]
mod tests {
    use ecard_crypto::CardVerifiableCertificate;
    use zeroize::Zeroizing;

    use super::*;

    const SLOT: &[u8] = &[0x01];

    fn pin_request(pin: &str) -> EstablishChannel {
        EstablishChannel::new(Bytes::from_static(SLOT), PasswordId::Pin)
            .with_pin(Zeroizing::new(pin.to_string()))
    }

    #[test]
    fn test_sample_certificates_decode() {
        let service = SampleService::default();
        let certificates = service.certificates().unwrap();
        let terminal = CardVerifiableCertificate::from_bytes(&certificates[1]).unwrap();
        assert_eq!(terminal.car().to_string(), DV_CHR);
        assert_eq!(terminal.chr().to_string(), TERMINAL_CHR);
        assert!(terminal.check_description(&service.description()).is_ok());
        assert_eq!(terminal.effective_date().to_string(), "2026-09-01");
    }

    #[test]
    fn test_pin_status_and_challenge() {
        let card = SimulatedCard::new(Bytes::from_static(SLOT), "123456", "500540")
            .with_pin_state(PinState::Rc2);
        assert_eq!(card.pin_status(SLOT).unwrap(), PinState::Rc2);
        assert_eq!(card.get_challenge(SLOT).unwrap().len(), 8);
        assert_eq!(card.commands().len(), 2);

        let unsupported = card.transmit(SLOT, &[0x00, 0xB0, 0x00, 0x00]).unwrap();
        assert_eq!(unsupported.status(), StatusWord::new(0x6D, 0x00));
        assert!(card.transmit(&[0x02], &PIN_STATUS_COMMAND).is_err());
    }

    #[test]
    fn test_simulated_retry_counter() {
        let card = SimulatedCard::new(Bytes::from_static(SLOT), "123456", "500540");
        let minor_of = |request: &EstablishChannel| {
            card.establish_channel(request).unwrap().result.minor.unwrap_or_default()
        };

        assert_eq!(minor_of(&pin_request("000000")), minor::ifdl::PASSWORD_ERROR);
        assert_eq!(minor_of(&pin_request("000000")), minor::ifdl::PASSWORD_ERROR);
        assert_eq!(card.pin_state(), PinState::Rc1);
        assert_eq!(minor_of(&pin_request("123456")), minor::ifdl::PASSWORD_SUSPENDED);

        let can = EstablishChannel::new(Bytes::from_static(SLOT), PasswordId::Can)
            .with_pin(Zeroizing::new("500540".to_string()));
        assert!(card.establish_channel(&can).unwrap().result.is_ok());
        assert_eq!(minor_of(&pin_request("000000")), minor::ifdl::PASSWORD_BLOCKED);
        assert_eq!(card.pin_state(), PinState::Blocked);
        assert_eq!(minor_of(&pin_request("123456")), minor::ifdl::PASSWORD_BLOCKED);
    }

    #[test]
    fn test_removed_card() {
        let card = SimulatedCard::new(Bytes::from_static(SLOT), "123456", "500540");
        card.remove();
        let response = card.establish_channel(&pin_request("123456")).unwrap();
        assert!(response.result.is_error(minor::ifdl::INVALID_SLOT_HANDLE));
        assert!(card.requests().is_empty());
    }

    #[test]
    fn test_scripted_consent() {
        let consent = ScriptedConsent::new([StepResult::ok()]);
        assert_eq!(consent.show(&Step::Processing), StepResult::ok());
        assert_eq!(consent.show(&Step::Processing), StepResult::cancel());
        assert_eq!(consent.shown_names(), vec!["processing", "processing"]);
    }
}
