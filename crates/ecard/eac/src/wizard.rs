//! User consent wizard around PACE
//!
//! The wizard walks the user through CHAT selection, PIN or CAN entry and the confirmation of
//! the eService. PACE is run from the password steps; its outcome is handed to the waiting
//! protocol thread through a [`Promise`].
//!
//! ```text
//! Init -> ChatSelection -> PinStatusCheck -> CanEntry <-> PaceCanRetry
//!                                         -> PinEntry <-> PacePinRetry
//!                                         -> BlockedTerminal | DeactivatedTerminal
//! PinEntry -> CvcConfirm -> Processing -> Done
//! ```
//!
//! Every state can end in `Cancelled`.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use bytes::Bytes;
use derive_more::Display;
use ecard_crypto::{AccessRight, Chat};
use ecard_sal::{
    AuthDataMap, CardEvent, CardEventListener, DidAuthenticationData, ResultStatus, minor,
};
use tracing::{debug, error, info, warn};
use zeroize::Zeroizing;

use crate::card::CardIo;
use crate::config::EacConfig;
use crate::eac1::Eac1Input;
use crate::pace::{EstablishChannel, PaceOutput, PasswordId};
use crate::pin_state::{PinState, PinStatus};
use crate::promise::Promise;
use crate::step::{Step, StepActionResult, StepResult, StepStatus, UserConsent};

/// Position of the wizard
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display)]
pub enum EacState {
    /// Not started
    #[display("INIT")]
    Init,
    /// User picks the optional rights
    #[display("CHAT_SELECTION")]
    ChatSelection,
    /// Routing on the PIN retry counter
    #[display("PIN_STATUS_CHECK")]
    PinStatusCheck,
    /// User enters the CAN
    #[display("CAN_ENTRY")]
    CanEntry,
    /// User enters the CAN again after the card rejected it
    #[display("PACE_CAN_RETRY")]
    PaceCanRetry,
    /// User enters the PIN
    #[display("PIN_ENTRY")]
    PinEntry,
    /// User enters the PIN again after a wrong one
    #[display("PACE_PIN_RETRY")]
    PacePinRetry,
    /// The PIN is blocked
    #[display("BLOCKED_TERMINAL")]
    BlockedTerminal,
    /// The PIN is deactivated
    #[display("DEACTIVATED_TERMINAL")]
    DeactivatedTerminal,
    /// User confirms the eService
    #[display("CVC_CONFIRM")]
    CvcConfirm,
    /// Authentication in progress
    #[display("PROCESSING")]
    Processing,
    /// PACE succeeded and the user agreed
    #[display("DONE")]
    Done,
    /// The user or a card removal aborted the wizard
    #[display("CANCELLED")]
    Cancelled,
}

impl EacState {
    /// Whether the wizard stops in this state
    pub const fn is_final(self) -> bool {
        matches!(
            self,
            Self::Done | Self::Cancelled | Self::BlockedTerminal | Self::DeactivatedTerminal
        )
    }
}

/// Cooperative cancellation flag shared with event listeners
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    /// Token that is not cancelled
    pub fn new() -> Self {
        Self::default()
    }

    /// Request cancellation
    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    /// Whether cancellation was requested
    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

impl CardEventListener for CancelToken {
    fn on_event(&self, event: &CardEvent) {
        info!(handle = %event.handle(), "Card removed during PACE, cancelling");
        self.cancel();
    }
}

/// Result of a successful PACE run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PaceOutcome {
    /// CHAT the user agreed to
    pub chat: Chat,
    /// Values the card revealed
    pub output: PaceOutput,
}

/// Outcome of the wizard as delivered to the protocol thread
pub type WizardResult = std::result::Result<PaceOutcome, ResultStatus>;

/// Drives the user through the PACE steps
pub struct EacWizard<'a> {
    config: &'a EacConfig,
    card: &'a dyn CardIo,
    consent: &'a dyn UserConsent,
    input: &'a Eac1Input,
    slot_handle: Bytes,
    pin_status: PinStatus,
    cancel: CancelToken,
    state: EacState,
    selected_chat: Chat,
    wrong_can: bool,
    pin_failed: bool,
    outcome: Option<PaceOutcome>,
}

impl<'a> EacWizard<'a> {
    /// Wizard for the card in `slot_handle` with the PIN status read before
    pub fn new(
        config: &'a EacConfig,
        card: &'a dyn CardIo,
        consent: &'a dyn UserConsent,
        input: &'a Eac1Input,
        slot_handle: impl Into<Bytes>,
        pin_state: PinState,
    ) -> Self {
        Self {
            config,
            card,
            consent,
            input,
            slot_handle: slot_handle.into(),
            pin_status: PinStatus::new(pin_state),
            cancel: CancelToken::new(),
            state: EacState::Init,
            selected_chat: initial_selection(input.required_chat(), input.optional_chat()),
            wrong_can: false,
            pin_failed: false,
            outcome: None,
        }
    }

    /// Use a shared cancellation token
    pub fn with_cancel_token(mut self, cancel: CancelToken) -> Self {
        self.cancel = cancel;
        self
    }

    /// Current state
    pub const fn state(&self) -> EacState {
        self.state
    }

    /// PIN retry state as far as known
    pub const fn pin_status(&self) -> PinStatus {
        self.pin_status
    }

    /// CHAT currently selected
    pub const fn selected_chat(&self) -> &Chat {
        &self.selected_chat
    }

    /// Run the wizard and deliver its outcome
    ///
    /// A delivery into a promise that was already resolved is logged and dropped.
    pub fn run_and_deliver(&mut self, promise: &Promise<WizardResult>) -> EacState {
        let result = self.run();
        if let Err(e) = promise.deliver(result) {
            debug!(error = %e, "Wizard outcome was not delivered");
        }
        self.state
    }

    /// Run until a final state is reached
    pub fn run(&mut self) -> WizardResult {
        let mut replacement: Option<Step> = None;
        loop {
            // after PACE succeeded the outcome is delivered regardless of a late cancel
            let settled = matches!(
                self.state,
                EacState::Processing | EacState::Done | EacState::Cancelled
            );
            if self.cancel.is_cancelled() && !settled {
                info!(state = %self.state, "Wizard cancelled");
                self.enter(EacState::Cancelled);
            }

            match self.state {
                EacState::Init => self.enter(EacState::ChatSelection),
                EacState::PinStatusCheck => {
                    let next = self.route_pin_status();
                    self.enter(next);
                }
                EacState::Processing => {
                    // informational, PACE already succeeded
                    self.consent.show(&Step::Processing);
                    self.enter(EacState::Done);
                }
                EacState::Done => return self.finish(),
                EacState::Cancelled => {
                    return Err(ResultStatus::error(
                        minor::sal::CANCELLATION_BY_USER,
                        "The authentication was cancelled.",
                    ));
                }
                EacState::BlockedTerminal | EacState::DeactivatedTerminal => {
                    return Err(self.show_terminal_error());
                }
                state => {
                    let step = replacement.take().unwrap_or_else(|| self.step(state));
                    debug!(%state, step = step.name(), "Showing step");
                    let result = self.consent.show(&step);
                    if self.cancel.is_cancelled() {
                        continue;
                    }

                    let action = match (&step, result.status) {
                        (_, StepStatus::Cancel) => StepActionResult::Cancel,
                        (Step::Error { .. }, _) => StepActionResult::Repeat(None),
                        (_, StepStatus::Back) => self.back(state),
                        (_, StepStatus::Ok) => self.submit(state, result),
                    };
                    let next = self.transition(state, &action);
                    if let StepActionResult::Repeat(step) = action {
                        replacement = step;
                    }
                    self.enter(next);
                }
            }
        }
    }

    fn enter(&mut self, next: EacState) {
        if next != self.state {
            debug!(from = %self.state, to = %next, "Wizard transition");
        }
        self.state = next;
    }

    fn finish(&mut self) -> WizardResult {
        self.outcome.take().ok_or_else(|| {
            ResultStatus::error(minor::al::INTERNAL_ERROR, "PACE finished without output.")
        })
    }

    fn route_pin_status(&self) -> EacState {
        match self.pin_status.state() {
            PinState::Blocked => EacState::BlockedTerminal,
            PinState::Deactivated => EacState::DeactivatedTerminal,
            _ if self.pin_status.requires_can() => EacState::CanEntry,
            _ => EacState::PinEntry,
        }
    }

    fn transition(&self, state: EacState, action: &StepActionResult) -> EacState {
        use EacState::*;
        use StepActionResult as Action;

        match (state, action) {
            (_, Action::Cancel) => Cancelled,
            (ChatSelection, Action::Next) => PinStatusCheck,
            (CanEntry | PaceCanRetry, Action::Next) => PinEntry,
            (CanEntry | PaceCanRetry, Action::Back) => ChatSelection,
            (CanEntry | PaceCanRetry, Action::Repeat(_)) if self.wrong_can => PaceCanRetry,
            (PinEntry | PacePinRetry, Action::Next) => match self.pin_status.state() {
                PinState::Blocked => BlockedTerminal,
                PinState::Deactivated => DeactivatedTerminal,
                _ => CvcConfirm,
            },
            (PinEntry | PacePinRetry, Action::Back) if self.pin_status.requires_can() => CanEntry,
            (PinEntry | PacePinRetry, Action::Back) => ChatSelection,
            (PinEntry | PacePinRetry, Action::Repeat(_)) if self.pin_failed => PacePinRetry,
            (CvcConfirm, Action::Next) => Processing,
            (other, _) => other,
        }
    }

    //
    // Steps
    //

    fn step(&self, state: EacState) -> Step {
        let native = self.config.native_pin_entry;
        match state {
            EacState::ChatSelection => Step::ChatSelection {
                required: self.input.required_chat().clone(),
                optional: self.input.optional_chat().clone(),
                selected: self.selected_chat.clone(),
            },
            EacState::CanEntry | EacState::PaceCanRetry => Step::CanEntry {
                native,
                wrong_can: self.wrong_can,
                error: self.wrong_can.then(|| "The entered CAN was wrong.".to_string()),
            },
            EacState::PinEntry | EacState::PacePinRetry => self.pin_step(None),
            EacState::CvcConfirm => Step::CvcConfirm {
                holder: self.input.terminal_certificate().chr().to_string(),
                description: self.input.certificate_description().clone(),
                transaction_info: self.input.transaction_info().map(str::to_string),
            },
            _ => Step::Processing,
        }
    }

    fn pin_step(&self, error: Option<&str>) -> Step {
        let error = error
            .or(self.pin_failed.then_some("The entered PIN was wrong."))
            .map(str::to_string);
        Step::PinEntry {
            attempts: self.pin_status.attempts_remaining(),
            native: self.config.native_pin_entry,
            retry: self.pin_failed,
            error,
        }
    }

    fn show_terminal_error(&self) -> ResultStatus {
        let (title, message, code) = if self.state == EacState::BlockedTerminal {
            (
                "PIN blocked",
                "The PIN is blocked. It can be unblocked with the PUK.",
                minor::ifdl::PASSWORD_BLOCKED,
            )
        } else {
            (
                "PIN deactivated",
                "The online identification function of the card is deactivated.",
                minor::ifdl::PASSWORD_SUSPENDED,
            )
        };
        warn!(state = %self.state, minor = code, "Wizard ends with a terminal error");
        self.consent.show(&Step::terminal_error(title, message, code));
        ResultStatus::error(code, message)
    }

    //
    // Actions
    //

    fn back(&self, state: EacState) -> StepActionResult {
        match state {
            EacState::ChatSelection | EacState::CvcConfirm => StepActionResult::Repeat(None),
            _ => StepActionResult::Back,
        }
    }

    fn submit(&mut self, state: EacState, result: StepResult) -> StepActionResult {
        match state {
            EacState::ChatSelection => {
                self.apply_chat_selection(&result.rights);
                StepActionResult::Next
            }
            EacState::CanEntry | EacState::PaceCanRetry => self.submit_can(result.password),
            EacState::PinEntry | EacState::PacePinRetry => self.submit_pin(result.password),
            _ => StepActionResult::Next,
        }
    }

    /// Merge the user's toggles into the selected CHAT
    ///
    /// Required rights stay set and rights outside the optional CHAT are ignored.
    fn apply_chat_selection(&mut self, rights: &[(AccessRight, bool)]) {
        for &(right, selected) in rights {
            if self.input.required_chat().has_right(right) {
                continue;
            }
            if self.input.optional_chat().has_right(right) {
                self.selected_chat.set_right(right, selected);
            } else {
                debug!(%right, "Ignoring right outside the optional CHAT");
            }
        }
        info!(chat = %self.selected_chat, "CHAT selected");
    }

    fn submit_can(&mut self, password: Option<Zeroizing<String>>) -> StepActionResult {
        let mut request = EstablishChannel::new(self.slot_handle.clone(), PasswordId::Can);
        if !self.config.native_pin_entry {
            let can = password.unwrap_or_default();
            if can.chars().count() != 6 {
                debug!("CAN has the wrong length");
                return StepActionResult::Repeat(Some(Step::CanEntry {
                    native: false,
                    wrong_can: self.wrong_can,
                    error: Some("The CAN consists of 6 digits.".to_string()),
                }));
            }
            request = request.with_pin(can);
        }

        match self.establish_channel(&request) {
            Ok(_) => {
                info!("CAN verified, the last PIN try is unlocked");
                self.wrong_can = false;
                self.pin_status.can_verified();
                StepActionResult::Next
            }
            Err(status) if status.is_error(minor::ifdl::AUTHENTICATION_FAILED) => {
                warn!("The card rejected the CAN");
                self.wrong_can = true;
                StepActionResult::Repeat(None)
            }
            Err(status) => self.failure(status),
        }
    }

    fn submit_pin(&mut self, password: Option<Zeroizing<String>>) -> StepActionResult {
        let mut request = EstablishChannel::new(self.slot_handle.clone(), PasswordId::Pin)
            .with_chat(self.selected_chat.to_bytes())
            .with_certificate_description(self.input.certificate_description().encoded().clone());
        if !self.config.native_pin_entry {
            match password {
                Some(pin) if !pin.is_empty() => request = request.with_pin(pin),
                _ => {
                    debug!("Empty PIN");
                    let step = self.pin_step(Some("Please enter your PIN."));
                    return StepActionResult::Repeat(Some(step));
                }
            }
        }

        let status = match self.establish_channel(&request) {
            Ok(data) => return self.pace_succeeded(data),
            Err(status) => status,
        };
        match status.minor.as_deref() {
            Some(minor::ifdl::PASSWORD_ERROR) => {
                self.pin_failed = true;
                let state = self.pin_status.record_failure();
                warn!(%state, "Wrong PIN");
                if self.pin_status.requires_can() {
                    StepActionResult::Back
                } else {
                    StepActionResult::Repeat(None)
                }
            }
            Some(minor::ifdl::PASSWORD_SUSPENDED) => {
                warn!("PIN suspended, the CAN is required");
                self.pin_failed = true;
                self.pin_status.suspend();
                StepActionResult::Back
            }
            Some(minor::ifdl::PASSWORD_BLOCKED) => {
                self.pin_status.block();
                StepActionResult::Next
            }
            Some(minor::ifdl::PASSWORD_DEACTIVATED) => {
                self.pin_status.deactivate();
                StepActionResult::Next
            }
            _ => self.failure(status),
        }
    }

    fn pace_succeeded(&mut self, data: Option<DidAuthenticationData>) -> StepActionResult {
        let output = data
            .ok_or_else(|| "EstablishChannel returned no output.".to_string())
            .and_then(|data| {
                PaceOutput::from_auth_data(&AuthDataMap::new(data)).map_err(|e| e.to_string())
            });
        match output {
            Ok(output) => {
                info!("PACE with the PIN succeeded");
                self.pin_status = PinStatus::new(PinState::Rc3);
                self.outcome = Some(PaceOutcome {
                    chat: self.selected_chat.clone(),
                    output,
                });
                StepActionResult::Next
            }
            Err(message) => {
                error!(%message, "Unusable PACE output");
                StepActionResult::Repeat(Some(Step::error("Internal error", message)))
            }
        }
    }

    fn establish_channel(
        &self,
        request: &EstablishChannel,
    ) -> std::result::Result<Option<DidAuthenticationData>, ResultStatus> {
        debug!(pin_id = %request.pin_id, "Running PACE");
        match self.card.establish_channel(request) {
            Ok(response) if response.result.is_ok() => Ok(response.data),
            Ok(response) => Err(response.result),
            Err(e) => Err(ResultStatus::error(minor::al::INTERNAL_ERROR, e.to_string())),
        }
    }

    /// Failure that is not specific to the password
    fn failure(&self, status: ResultStatus) -> StepActionResult {
        match status.minor.as_deref() {
            Some(minor::ifdl::CANCELLATION_BY_USER | minor::sal::CANCELLATION_BY_USER) => {
                info!("PACE cancelled by the user");
                StepActionResult::Cancel
            }
            Some(minor::ifdl::INVALID_SLOT_HANDLE) => {
                warn!("Card removed during PACE");
                StepActionResult::Repeat(Some(Step::error(
                    "Card removed",
                    "The card was removed. Please insert it and try again.",
                )))
            }
            _ => {
                error!(%status, "PACE failed");
                StepActionResult::Repeat(Some(Step::error(
                    "Internal error",
                    status
                        .message
                        .unwrap_or_else(|| "The card could not be accessed.".to_string()),
                )))
            }
        }
    }
}

impl std::fmt::Debug for EacWizard<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EacWizard")
            .field("state", &self.state)
            .field("pin_status", &self.pin_status)
            .field("selected_chat", &self.selected_chat)
            .field("wrong_can", &self.wrong_can)
            .field("pin_failed", &self.pin_failed)
            .finish_non_exhaustive()
    }
}

fn initial_selection(required: &Chat, optional: &Chat) -> Chat {
    let mut selected = optional.clone();
    for right in required.granted_rights() {
        selected.set_right(right, true);
    }
    selected
}

#[cfg(test)]
mod tests {
    use ecard_crypto::{DataGroup, SpecialFunction};

    use super::*;
    use crate::simulator::{SampleService, ScriptedConsent, SimulatedCard};

    const SLOT: &[u8] = &[0x0A, 0x01];
    const PIN: &str = "123456";
    const CAN: &str = "500540";

    fn input() -> Eac1Input {
        let data = SampleService::default().eac1_input().unwrap();
        let mut input = Eac1Input::from_auth_data(&AuthDataMap::new(data)).unwrap();
        input.restrict_optional_chat();
        input
    }

    fn card(state: PinState) -> SimulatedCard {
        SimulatedCard::new(Bytes::from_static(SLOT), PIN, CAN).with_pin_state(state)
    }

    fn read(number: u8) -> AccessRight {
        AccessRight::Read(DataGroup::new(number).unwrap())
    }

    #[test]
    fn test_happy_path() {
        let config = EacConfig::default();
        let card = card(PinState::Rc3);
        let consent = ScriptedConsent::new([
            StepResult::ok(),
            StepResult::password(PIN),
            StepResult::ok(),
        ]);
        let input = input();
        let mut wizard = EacWizard::new(&config, &card, &consent, &input, SLOT, PinState::Rc3);

        let outcome = wizard.run().unwrap();
        assert_eq!(wizard.state(), EacState::Done);
        assert_eq!(
            consent.shown_names(),
            vec!["chat-selection", "pin-entry", "cvc-confirm", "processing"]
        );
        assert_eq!(outcome.output, SimulatedCard::pace_output());
        assert!(outcome.chat.has_right(read(4)));
        assert!(outcome.chat.has_right(read(9)));

        let requests = card.requests();
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0].pin_id, PasswordId::Pin);
        assert_eq!(requests[0].chat.as_deref(), Some(outcome.chat.to_bytes().as_slice()));
        assert!(requests[0].certificate_description.is_some());
    }

    #[test]
    fn test_chat_selection_is_bounded() {
        let config = EacConfig::default();
        let card = card(PinState::Rc3);
        let consent = ScriptedConsent::new([
            StepResult::ok()
                .with_right(read(9), false)
                .with_right(read(4), false)
                .with_right(read(17), true),
            StepResult::password(PIN),
            StepResult::ok(),
        ]);
        let input = input();
        let mut wizard = EacWizard::new(&config, &card, &consent, &input, SLOT, PinState::Rc3);

        let outcome = wizard.run().unwrap();
        assert!(!outcome.chat.has_right(read(9)));
        assert!(outcome.chat.has_right(read(4)));
        assert!(!outcome.chat.has_right(read(17)));
        assert!(outcome.chat.has_right(AccessRight::Special(SpecialFunction::AgeVerification)));
        assert_eq!(wizard.selected_chat(), &outcome.chat);
    }

    #[test]
    fn test_wrong_pins_lead_to_can() {
        let config = EacConfig::default();
        let card = card(PinState::Rc3);
        let consent = ScriptedConsent::new([
            StepResult::ok(),
            StepResult::password("000000"),
            StepResult::password("111111"),
            StepResult::password(CAN),
            StepResult::password(PIN),
            StepResult::ok(),
        ]);
        let input = input();
        let mut wizard = EacWizard::new(&config, &card, &consent, &input, SLOT, PinState::Rc3);

        assert!(wizard.run().is_ok());
        assert_eq!(
            consent.shown_names(),
            vec![
                "chat-selection",
                "pin-entry",
                "pin-entry",
                "can-entry",
                "pin-entry",
                "cvc-confirm",
                "processing"
            ]
        );
        let shown = consent.shown();
        assert!(matches!(
            shown[2],
            Step::PinEntry { attempts: Some(2), retry: true, .. }
        ));
        assert!(matches!(shown[3], Step::CanEntry { wrong_can: false, .. }));
        assert!(matches!(shown[4], Step::PinEntry { attempts: Some(1), .. }));
        assert_eq!(card.pin_state(), PinState::Rc3);
        assert_eq!(wizard.pin_status().state(), PinState::Rc3);
    }

    #[test]
    fn test_can_validation() {
        let config = EacConfig::default();
        let card = card(PinState::Rc1);
        let consent = ScriptedConsent::new([
            StepResult::ok(),
            StepResult::password("123"),
            StepResult::password("999999"),
            StepResult::password(CAN),
            StepResult::password(PIN),
            StepResult::ok(),
        ]);
        let input = input();
        let mut wizard = EacWizard::new(&config, &card, &consent, &input, SLOT, PinState::Rc1);

        assert!(wizard.run().is_ok());
        let shown = consent.shown();
        assert!(matches!(&shown[1], Step::CanEntry { wrong_can: false, error: None, .. }));
        assert!(matches!(&shown[2], Step::CanEntry { error: Some(_), .. }));
        assert!(matches!(&shown[3], Step::CanEntry { wrong_can: true, .. }));
        assert!(matches!(&shown[4], Step::PinEntry { .. }));

        // the short CAN never reached the card
        let pin_ids: Vec<_> = card.requests().iter().map(|request| request.pin_id).collect();
        assert_eq!(pin_ids, vec![PasswordId::Can, PasswordId::Can, PasswordId::Pin]);
        assert!(card.requests()[0].chat.is_none());
    }

    #[test]
    fn test_last_try_blocks() {
        let config = EacConfig::default();
        let card = card(PinState::Rc1);
        let consent = ScriptedConsent::new([
            StepResult::ok(),
            StepResult::password(CAN),
            StepResult::password("000000"),
            StepResult::ok(),
        ]);
        let input = input();
        let mut wizard = EacWizard::new(&config, &card, &consent, &input, SLOT, PinState::Rc1);

        let status = wizard.run().unwrap_err();
        assert!(status.is_error(minor::ifdl::PASSWORD_BLOCKED));
        assert_eq!(wizard.state(), EacState::BlockedTerminal);
        assert_eq!(card.pin_state(), PinState::Blocked);
        assert!(matches!(
            consent.shown().last(),
            Some(Step::Error { terminal: true, .. })
        ));
    }

    #[test]
    fn test_blocked_and_deactivated() {
        let config = EacConfig::default();
        let input = input();
        for (state, code, final_state) in [
            (PinState::Blocked, minor::ifdl::PASSWORD_BLOCKED, EacState::BlockedTerminal),
            (
                PinState::Deactivated,
                minor::ifdl::PASSWORD_SUSPENDED,
                EacState::DeactivatedTerminal,
            ),
        ] {
            let card = card(state);
            let consent = ScriptedConsent::new([StepResult::ok(), StepResult::ok()]);
            let mut wizard = EacWizard::new(&config, &card, &consent, &input, SLOT, state);

            let status = wizard.run().unwrap_err();
            assert!(status.is_error(code));
            assert_eq!(wizard.state(), final_state);
            assert_eq!(consent.shown_names(), vec!["chat-selection", "error"]);
            assert!(card.requests().is_empty());
        }
    }

    #[test]
    fn test_suspended_pin_routes_to_can() {
        let config = EacConfig::default();
        let card = card(PinState::Rc1);
        let consent = ScriptedConsent::new([
            StepResult::ok(),
            StepResult::password(PIN),
            StepResult::password(CAN),
            StepResult::password(PIN),
            StepResult::ok(),
        ]);
        let input = input();
        // the session believes the counter is full, the card knows better
        let mut wizard = EacWizard::new(&config, &card, &consent, &input, SLOT, PinState::Rc3);

        assert!(wizard.run().is_ok());
        assert_eq!(
            consent.shown_names(),
            vec!["chat-selection", "pin-entry", "can-entry", "pin-entry", "cvc-confirm", "processing"]
        );
    }

    #[test]
    fn test_empty_pin_repeats() {
        let config = EacConfig::default();
        let card = card(PinState::Rc3);
        let consent = ScriptedConsent::new([
            StepResult::ok(),
            StepResult::password(""),
            StepResult::password(PIN),
            StepResult::ok(),
        ]);
        let input = input();
        let mut wizard = EacWizard::new(&config, &card, &consent, &input, SLOT, PinState::Rc3);

        assert!(wizard.run().is_ok());
        assert!(matches!(
            &consent.shown()[2],
            Step::PinEntry { error: Some(_), retry: false, .. }
        ));
        assert_eq!(card.requests().len(), 1);
    }

    #[test]
    fn test_back_at_cvc_confirm_repeats() {
        let config = EacConfig::default();
        let card = card(PinState::Rc3);
        let consent = ScriptedConsent::new([
            StepResult::ok(),
            StepResult::password(PIN),
            StepResult::back(),
            StepResult::ok(),
        ]);
        let input = input();
        let mut wizard = EacWizard::new(&config, &card, &consent, &input, SLOT, PinState::Rc3);

        assert!(wizard.run().is_ok());
        assert_eq!(
            consent.shown_names(),
            vec!["chat-selection", "pin-entry", "cvc-confirm", "cvc-confirm", "processing"]
        );
    }

    #[test]
    fn test_user_cancel() {
        let config = EacConfig::default();
        let card = card(PinState::Rc3);
        let consent = ScriptedConsent::new([StepResult::ok(), StepResult::cancel()]);
        let input = input();
        let mut wizard = EacWizard::new(&config, &card, &consent, &input, SLOT, PinState::Rc3);

        let promise = Promise::new();
        assert_eq!(wizard.run_and_deliver(&promise), EacState::Cancelled);
        let status = promise.deref().unwrap().unwrap_err();
        assert!(status.is_error(minor::sal::CANCELLATION_BY_USER));
        assert!(card.requests().is_empty());
    }

    #[test]
    fn test_cancel_token() {
        let config = EacConfig::default();
        let card = card(PinState::Rc3);
        let token = CancelToken::new();
        let hook_token = token.clone();
        let consent = ScriptedConsent::new([StepResult::ok(), StepResult::password(PIN)])
            .with_hook(move |step| {
                if matches!(step, Step::PinEntry { .. }) {
                    hook_token.cancel();
                }
            });
        let input = input();
        let mut wizard = EacWizard::new(&config, &card, &consent, &input, SLOT, PinState::Rc3)
            .with_cancel_token(token);

        let status = wizard.run().unwrap_err();
        assert!(status.is_error(minor::sal::CANCELLATION_BY_USER));
        assert_eq!(wizard.state(), EacState::Cancelled);
        assert!(card.requests().is_empty());
    }

    #[test]
    fn test_cancel_after_pace_still_completes() {
        let config = EacConfig::default();
        let card = card(PinState::Rc3);
        let token = CancelToken::new();
        let hook_token = token.clone();
        let consent = ScriptedConsent::new([
            StepResult::ok(),
            StepResult::password(PIN),
            StepResult::ok(),
        ])
        .with_hook(move |step| {
            if matches!(step, Step::Processing) {
                hook_token.cancel();
            }
        });
        let input = input();
        let mut wizard = EacWizard::new(&config, &card, &consent, &input, SLOT, PinState::Rc3)
            .with_cancel_token(token.clone());

        assert!(wizard.run().is_ok());
        assert!(token.is_cancelled());
        assert_eq!(wizard.state(), EacState::Done);
        assert_eq!(card.requests().len(), 1);
    }

    #[test]
    fn test_removed_card_shows_error() {
        let config = EacConfig::default();
        let card = card(PinState::Rc3);
        card.remove();
        let consent = ScriptedConsent::new([
            StepResult::ok(),
            StepResult::password(PIN),
            StepResult::ok(),
        ]);
        let input = input();
        let mut wizard = EacWizard::new(&config, &card, &consent, &input, SLOT, PinState::Rc3);

        let status = wizard.run().unwrap_err();
        assert!(status.is_error(minor::sal::CANCELLATION_BY_USER));
        assert!(matches!(
            &consent.shown()[2],
            Step::Error { terminal: false, .. }
        ));
        assert_eq!(
            consent.shown_names(),
            vec!["chat-selection", "pin-entry", "error", "pin-entry"]
        );
    }

    #[test]
    fn test_native_pin_entry() {
        let config = EacConfig::new().with_native_pin_entry(true);
        let card = card(PinState::Rc3);
        let consent = ScriptedConsent::new([StepResult::ok(), StepResult::ok(), StepResult::ok()]);
        let input = input();
        let mut wizard = EacWizard::new(&config, &card, &consent, &input, SLOT, PinState::Rc3);

        assert!(wizard.run().is_ok());
        assert!(matches!(&consent.shown()[1], Step::PinEntry { native: true, .. }));
        assert!(card.requests()[0].pin.is_none());
    }
}
