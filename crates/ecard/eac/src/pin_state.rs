//! Retry counter of the eID PIN
//!
//! The card answers the PIN status query with a status word that encodes the number of tries
//! left. With one try left the PIN is suspended and the CAN has to be verified before the PIN
//! may be tried again.

use derive_more::Display;

use crate::status::{StatusWord, pin};

/// Retry counter position reported by the card
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display)]
pub enum PinState {
    /// Three tries left
    #[display("RC3")]
    Rc3,
    /// Two tries left
    #[display("RC2")]
    Rc2,
    /// One try left, after the CAN was verified
    #[display("RC1")]
    Rc1,
    /// No tries left
    #[display("BLOCKED")]
    Blocked,
    /// PIN was deactivated by the issuer
    #[display("DEACTIVATED")]
    Deactivated,
    /// The card gave an answer without a known meaning
    #[display("UNKNOWN")]
    Unknown,
}

impl PinState {
    /// Map the answer to the PIN status query
    pub const fn from_status_word(status: StatusWord) -> Self {
        match (status.sw1, status.sw2) {
            (0x90, 0x00) => Self::Rc3,
            (0x63, 0xC2) => Self::Rc2,
            (0x63, 0xC1) => Self::Rc1,
            (0x63, 0xC0) => Self::Blocked,
            (0x62, 0x83) => Self::Deactivated,
            _ => Self::Unknown,
        }
    }

    /// Status word the card uses for this state
    pub const fn status_word(self) -> Option<StatusWord> {
        match self {
            Self::Rc3 => Some(pin::RC3),
            Self::Rc2 => Some(pin::RC2),
            Self::Rc1 => Some(pin::RC1),
            Self::Blocked => Some(pin::BLOCKED),
            Self::Deactivated => Some(pin::DEACTIVATED),
            Self::Unknown => None,
        }
    }

    /// Number of tries left, where known
    pub const fn attempts(self) -> Option<u8> {
        match self {
            Self::Rc3 => Some(3),
            Self::Rc2 => Some(2),
            Self::Rc1 => Some(1),
            Self::Blocked => Some(0),
            Self::Deactivated | Self::Unknown => None,
        }
    }

    /// Whether no further PIN entry is possible
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Blocked | Self::Deactivated)
    }
}

/// PIN retry state of one session
///
/// The card is asked once; afterwards the state follows the outcome of each PACE run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PinStatus {
    state: PinState,
    requires_can: bool,
}

impl PinStatus {
    /// Status from the answer of the card
    pub const fn new(state: PinState) -> Self {
        Self {
            state,
            requires_can: matches!(state, PinState::Rc1),
        }
    }

    /// Current retry counter position
    pub const fn state(&self) -> PinState {
        self.state
    }

    /// Tries left, where known
    pub const fn attempts_remaining(&self) -> Option<u8> {
        self.state.attempts()
    }

    /// Whether the CAN has to be verified before the next PIN try
    pub const fn requires_can(&self) -> bool {
        self.requires_can
    }

    /// Record a wrong PIN
    ///
    /// The counter stops at RC1; blocking is only taken from the card.
    pub const fn record_failure(&mut self) -> PinState {
        self.state = match self.state {
            PinState::Rc3 => PinState::Rc2,
            PinState::Rc2 | PinState::Rc1 => PinState::Rc1,
            other => other,
        };
        if matches!(self.state, PinState::Rc1) {
            self.requires_can = true;
        }
        self.state
    }

    /// The card reported the PIN as suspended
    pub const fn suspend(&mut self) {
        self.state = PinState::Rc1;
        self.requires_can = true;
    }

    /// The card reported the PIN as blocked
    pub const fn block(&mut self) {
        self.state = PinState::Blocked;
        self.requires_can = false;
    }

    /// The card reported the PIN as deactivated
    pub const fn deactivate(&mut self) {
        self.state = PinState::Deactivated;
        self.requires_can = false;
    }

    /// PACE with the CAN succeeded, the last PIN try is unlocked
    pub const fn can_verified(&mut self) {
        self.requires_can = false;
    }
}
