//! Steps shown to the user and their results
//!
//! The user interface is a collaborator behind [`UserConsent`]. It gets one [`Step`] at a time
//! and answers with a [`StepResult`]; what happens next is decided by the wizard.

use derive_more::Display;
use ecard_crypto::{AccessRight, CertificateDescription, Chat};
use zeroize::Zeroizing;

/// Something the user has to see or answer
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Step {
    /// Pick the optional rights to grant
    ChatSelection {
        /// Rights that are always granted
        required: Chat,
        /// Rights the user may grant
        optional: Chat,
        /// Rights currently selected
        selected: Chat,
    },
    /// Enter the PIN
    PinEntry {
        /// Tries left, where known
        attempts: Option<u8>,
        /// The reader collects the PIN
        native: bool,
        /// The previous PIN was wrong
        retry: bool,
        /// Annotation for a repeated step
        error: Option<String>,
    },
    /// Enter the CAN to unlock the last PIN try
    CanEntry {
        /// The reader collects the CAN
        native: bool,
        /// The previous CAN was rejected by the card
        wrong_can: bool,
        /// Annotation for a repeated step
        error: Option<String>,
    },
    /// Confirm the eService and its certificate description
    CvcConfirm {
        /// Certificate holder of the terminal certificate
        holder: String,
        /// Certificate description of the eService
        description: CertificateDescription,
        /// Transaction information, if sent
        transaction_info: Option<String>,
    },
    /// Authentication in progress
    Processing,
    /// Something went wrong
    Error {
        /// Short title
        title: String,
        /// Explanation
        message: String,
        /// Result minor code
        minor: Option<String>,
        /// No further step follows
        terminal: bool,
    },
}

impl Step {
    /// Error step after which the current step is shown again
    pub fn error(title: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Error {
            title: title.into(),
            message: message.into(),
            minor: None,
            terminal: false,
        }
    }

    /// Error step that ends the wizard
    pub fn terminal_error(
        title: impl Into<String>,
        message: impl Into<String>,
        minor: &str,
    ) -> Self {
        Self::Error {
            title: title.into(),
            message: message.into(),
            minor: Some(minor.to_string()),
            terminal: true,
        }
    }

    /// Short name for logging
    pub const fn name(&self) -> &'static str {
        match self {
            Self::ChatSelection { .. } => "chat-selection",
            Self::PinEntry { .. } => "pin-entry",
            Self::CanEntry { .. } => "can-entry",
            Self::CvcConfirm { .. } => "cvc-confirm",
            Self::Processing => "processing",
            Self::Error { .. } => "error",
        }
    }
}

/// How the user left a step
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display)]
pub enum StepStatus {
    /// Continue
    #[display("OK")]
    Ok,
    /// Go to the previous step
    #[display("BACK")]
    Back,
    /// Abort the wizard
    #[display("CANCEL")]
    Cancel,
}

/// Answer of the user to a step
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StepResult {
    /// How the step was left
    pub status: StepStatus,
    /// Entered PIN or CAN
    pub password: Option<Zeroizing<String>>,
    /// Rights the user switched on or off
    pub rights: Vec<(AccessRight, bool)>,
}

impl StepResult {
    const fn with_status(status: StepStatus) -> Self {
        Self {
            status,
            password: None,
            rights: Vec::new(),
        }
    }

    /// Continue without values
    pub const fn ok() -> Self {
        Self::with_status(StepStatus::Ok)
    }

    /// Go back
    pub const fn back() -> Self {
        Self::with_status(StepStatus::Back)
    }

    /// Abort
    pub const fn cancel() -> Self {
        Self::with_status(StepStatus::Cancel)
    }

    /// Continue with a password
    pub fn password(password: &str) -> Self {
        Self {
            password: Some(Zeroizing::new(password.to_string())),
            ..Self::ok()
        }
    }

    /// Add a right toggle
    pub fn with_right(mut self, right: AccessRight, selected: bool) -> Self {
        self.rights.push((right, selected));
        self
    }
}

/// What the wizard does after a step
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StepActionResult {
    /// Go to the following step
    Next,
    /// Go to the previous step
    Back,
    /// Show the step again, or the given step in its place
    Repeat(Option<Step>),
    /// Abort the wizard
    Cancel,
}

/// User interface showing wizard steps
pub trait UserConsent: Send + Sync {
    /// Show a step and wait for the user
    fn show(&self, step: &Step) -> StepResult;
}
