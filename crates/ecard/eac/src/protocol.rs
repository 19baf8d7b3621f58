//! DIDAuthenticate step that runs PACE for EAC
//!
//! The protocol thread validates the eService request, hands the user interaction to the
//! [`EacWizard`] on a scoped UI thread and waits on a [`Promise`] for the PACE outcome. After
//! PACE it fetches the card challenge, records the authenticated DID and keeps an
//! [`EacSession`] on the card state entry for the following Terminal Authentication.

use std::any::Any;
use std::fmt;
use std::sync::Arc;
use std::thread;

use bytes::Bytes;
use ecard_crypto::{
    CertificateChain, CertificateDescription, Chat, Error as CryptoError, PublicKeyReference, Role,
};
use ecard_sal::{
    AuthDataMap, CardRemovedFilter, CardStateEntry, CardStateRegistry, ConnectionHandle,
    DidAuthenticationData, EventDispatcher, ProtocolKind, ProtocolState, ResultStatus,
    ServiceAction, minor,
};
use tracing::{debug, error, info, warn};

use crate::card::CardIo;
use crate::config::EacConfig;
use crate::eac1::{Eac1Input, Eac1Output};
use crate::error::Error;
use crate::pace::PaceOutput;
use crate::pin_state::PinState;
use crate::promise::Promise;
use crate::step::UserConsent;
use crate::wizard::{CancelToken, EacWizard, PaceOutcome, WizardResult};

/// Name of the thread the wizard runs on
pub const UI_THREAD_NAME: &str = "eac-gui";

/// State kept on the card state entry after PACE
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EacSession {
    chat: Chat,
    chain: CertificateChain,
    challenge: Bytes,
    pace_output: PaceOutput,
    certificate_description: CertificateDescription,
}

impl EacSession {
    /// CHAT the user agreed to
    pub const fn chat(&self) -> &Chat {
        &self.chat
    }

    /// Certificates below the current CAR of the card
    pub const fn chain(&self) -> &CertificateChain {
        &self.chain
    }

    /// Challenge for Terminal Authentication
    pub const fn challenge(&self) -> &Bytes {
        &self.challenge
    }

    /// Values the card revealed during PACE
    pub const fn pace_output(&self) -> &PaceOutput {
        &self.pace_output
    }

    /// Certificate description the user confirmed
    pub const fn certificate_description(&self) -> &CertificateDescription {
        &self.certificate_description
    }
}

impl ProtocolState for EacSession {
    fn as_any(&self) -> &dyn Any {
        self
    }
}

/// DIDAuthenticate request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DidAuthenticate {
    /// Connection the DID belongs to
    pub handle: ConnectionHandle,
    /// Name of the PACE DID, usually `PIN`
    pub did_name: String,
    /// EAC1 input
    pub data: DidAuthenticationData,
}

impl DidAuthenticate {
    /// Request for a DID with EAC1 input
    pub fn new(
        handle: ConnectionHandle,
        did_name: impl Into<String>,
        data: DidAuthenticationData,
    ) -> Self {
        Self {
            handle,
            did_name: did_name.into(),
            data,
        }
    }
}

/// DIDAuthenticate response
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DidAuthenticateResponse {
    /// Result of the request
    pub result: ResultStatus,
    /// EAC1 output on success
    pub data: Option<DidAuthenticationData>,
}

impl DidAuthenticateResponse {
    /// Whether the request succeeded
    pub fn is_ok(&self) -> bool {
        self.result.is_ok()
    }
}

/// Runs the PACE part of EAC for DIDAuthenticate requests
pub struct EacProtocol<'a> {
    config: EacConfig,
    card: &'a dyn CardIo,
    consent: &'a dyn UserConsent,
    events: Option<&'a EventDispatcher>,
}

impl<'a> EacProtocol<'a> {
    /// Protocol talking to `card` and asking the user through `consent`
    pub const fn new(
        config: EacConfig,
        card: &'a dyn CardIo,
        consent: &'a dyn UserConsent,
    ) -> Self {
        Self {
            config,
            card,
            consent,
            events: None,
        }
    }

    /// Cancel the wizard when the card is removed
    pub const fn with_event_dispatcher(mut self, events: &'a EventDispatcher) -> Self {
        self.events = Some(events);
        self
    }

    /// Configuration in use
    pub const fn config(&self) -> &EacConfig {
        &self.config
    }

    /// Handle a DIDAuthenticate request with EAC1 input
    ///
    /// Failures are reported in the result of the response, never as a panic.
    pub fn did_authenticate(
        &self,
        registry: &CardStateRegistry,
        request: &DidAuthenticate,
    ) -> DidAuthenticateResponse {
        info!(did = %request.did_name, handle = %request.handle, "DIDAuthenticate with EAC1 input");
        match self.authenticate(registry, request) {
            Ok(data) => {
                info!(did = %request.did_name, "EAC1 finished");
                DidAuthenticateResponse {
                    result: ResultStatus::ok(),
                    data: Some(data),
                }
            }
            Err(result) => {
                error!(did = %request.did_name, %result, "EAC1 failed");
                DidAuthenticateResponse { result, data: None }
            }
        }
    }

    fn authenticate(
        &self,
        registry: &CardStateRegistry,
        request: &DidAuthenticate,
    ) -> Result<DidAuthenticationData, ResultStatus> {
        let entry = registry.get_entry(&request.handle, true).ok_or_else(|| {
            ResultStatus::error(
                minor::sal::UNKNOWN_CONNECTION_HANDLE,
                "No card is connected under the given handle.",
            )
        })?;
        let application = resolve_application(&entry, &request.did_name)?;
        if !entry.check_did_security_condition(
            &application,
            &request.did_name,
            ServiceAction::DidAuthenticate,
        ) {
            return Err(ResultStatus::error(
                minor::sal::SECURITY_CONDITION_NOT_SATISFIED,
                format!("The security condition of DID {} is not satisfied.", request.did_name),
            ));
        }

        let input = self.validate_input(&request.data)?;
        let handle = entry.handle();
        let slot_handle = handle.slot_handle().cloned().ok_or_else(|| {
            ResultStatus::error(minor::ifdl::INVALID_SLOT_HANDLE, "The handle names no slot.")
        })?;

        let pin_state = self.card.pin_status(&slot_handle).map_err(internal_error)?;
        info!(%pin_state, "PIN status before PACE");
        if pin_state == PinState::Blocked {
            return Err(ResultStatus::error(minor::ifdl::PASSWORD_BLOCKED, "The PIN is blocked."));
        }

        let outcome = self.run_wizard(&handle, &input, &slot_handle, pin_state)?;

        let challenge = self.card.get_challenge(&slot_handle).map_err(internal_error)?;
        debug!(challenge = %hex::encode_upper(&challenge), "Card challenge");

        entry.add_authenticated(&request.did_name, &application);
        let chain = match &outcome.output.current_car {
            Some(car) => input.chain().chain_from_car(&PublicKeyReference::new(car.clone())),
            None => {
                warn!("The card reported no current CAR, keeping the whole chain");
                input.chain().clone()
            }
        };
        entry.set_protocol(
            ProtocolKind::Eac,
            Box::new(EacSession {
                chat: outcome.chat.clone(),
                chain,
                challenge: challenge.clone(),
                pace_output: outcome.output.clone(),
                certificate_description: input.certificate_description().clone(),
            }),
        );

        let PaceOutcome { chat, output } = outcome;
        Ok(Eac1Output {
            chat,
            current_car: output.current_car,
            previous_car: output.previous_car,
            ef_card_access: output.ef_card_access,
            id_picc: output.id_picc,
            challenge,
        }
        .to_auth_data())
    }

    /// Parse the EAC1 input and check the certificates and CHATs
    fn validate_input(&self, data: &DidAuthenticationData) -> Result<Eac1Input, ResultStatus> {
        let mut input = Eac1Input::from_auth_data(&AuthDataMap::new(data.clone()))
            .map_err(|e| incorrect_parameter(&e))?;

        if self.config.verify_chain {
            input.chain().verify().map_err(|e| validity_failed(&e))?;
        }
        let terminal = input.terminal_certificate();
        terminal
            .check_description(input.certificate_description().encoded())
            .map_err(|e| validity_failed(&e))?;

        let role = terminal.chat().role();
        if role != Role::AuthenticationTerminal {
            warn!(%role, "Terminal certificate is not for an authentication terminal");
            return Err(ResultStatus::error(
                minor::al::INCORRECT_PARAMETER,
                format!("The terminal certificate has role {role}."),
            ));
        }
        if self.config.enforce_chat && !input.required_chat().is_covered_by(terminal.chat()) {
            warn!(
                required = %input.required_chat(),
                terminal = %terminal.chat(),
                "Required CHAT exceeds the terminal certificate"
            );
            return Err(incorrect_parameter(&CryptoError::ChatNotCovered));
        }

        input.restrict_optional_chat();
        Ok(input)
    }

    /// Run the wizard on the UI thread and wait for its outcome
    fn run_wizard(
        &self,
        handle: &ConnectionHandle,
        input: &Eac1Input,
        slot_handle: &Bytes,
        pin_state: PinState,
    ) -> Result<PaceOutcome, ResultStatus> {
        let cancel = CancelToken::new();
        let subscription = self.events.and_then(|events| {
            let filter = CardRemovedFilter::for_handle(handle)?;
            Some((events, events.subscribe(filter, Arc::new(cancel.clone()))))
        });
        let promise = Promise::<WizardResult>::new();

        let result = thread::scope(|scope| {
            let ui = thread::Builder::new()
                .name(UI_THREAD_NAME.to_string())
                .spawn_scoped(scope, || {
                    let _guard = CancelOnDrop(&promise);
                    let mut wizard = EacWizard::new(
                        &self.config,
                        self.card,
                        self.consent,
                        input,
                        slot_handle.clone(),
                        pin_state,
                    )
                    .with_cancel_token(cancel.clone());
                    wizard.run_and_deliver(&promise)
                });
            match ui {
                Ok(ui) => {
                    let result = promise.deref();
                    // joined here so a panic in the wizard does not reach the caller
                    if ui.join().is_err() {
                        error!("The UI thread panicked");
                    }
                    result
                }
                Err(e) => {
                    error!(error = %e, "Could not start the UI thread");
                    promise.cancel();
                    promise.deref()
                }
            }
        });

        if let Some((events, id)) = subscription {
            events.unsubscribe(id);
        }

        match result {
            Ok(outcome) => outcome,
            Err(Error::Cancelled) => Err(ResultStatus::error(
                minor::sal::CANCELLATION_BY_USER,
                "The authentication was cancelled.",
            )),
            Err(e) => Err(internal_error(e)),
        }
    }
}

impl fmt::Debug for EacProtocol<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EacProtocol")
            .field("config", &self.config)
            .field("events", &self.events.is_some())
            .finish_non_exhaustive()
    }
}

/// Cancels a promise that is still pending when the UI thread ends
struct CancelOnDrop<'a, T: Clone>(&'a Promise<T>);

impl<T: Clone> Drop for CancelOnDrop<'_, T> {
    fn drop(&mut self) {
        if self.0.cancel() {
            warn!("UI thread ended without an outcome");
        }
    }
}

/// The selected application if it has the DID, else the first application that does
fn resolve_application(entry: &CardStateEntry, did_name: &str) -> Result<Bytes, ResultStatus> {
    entry
        .current_application()
        .filter(|app| app.did(did_name).is_some())
        .or_else(|| entry.card_info().application_for_did(did_name))
        .map(|app| app.identifier.clone())
        .ok_or_else(|| {
            ResultStatus::error(
                minor::al::INCORRECT_PARAMETER,
                format!("The card has no DID {did_name}."),
            )
        })
}

fn incorrect_parameter(e: &dyn fmt::Display) -> ResultStatus {
    ResultStatus::error(minor::al::INCORRECT_PARAMETER, e.to_string())
}

fn validity_failed(e: &dyn fmt::Display) -> ResultStatus {
    ResultStatus::error(minor::sal::DOCUMENT_VALIDITY_VERIFICATION_FAILED, e.to_string())
}

fn internal_error(e: Error) -> ResultStatus {
    match e.root() {
        Error::Failed(status) => status.clone(),
        _ => ResultStatus::error(minor::al::INTERNAL_ERROR, e.to_string()),
    }
}
