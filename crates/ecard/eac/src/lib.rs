//! PACE and Extended Access Control for eID clients
//!
//! This crate runs the first DIDAuthenticate round of EAC: it checks the eService
//! certificates and CHATs, walks the user through a consent wizard, runs PACE through a card
//! collaborator and returns what the card revealed together with a challenge.
//!
//! ## Overview
//!
//! - [`EacProtocol`] handles a [`DidAuthenticate`] request against a card state registry
//! - [`EacWizard`] is the state machine behind the user interaction
//! - [`CardIo`] and [`UserConsent`] are the seams to the reader and to the user interface
//! - [`Promise`] hands the PACE outcome from the UI thread to the protocol thread
//! - [`simulator`] contains a simulated card, eService and user
#![cfg_attr(not(test), warn(unused_crate_dependencies))]
#![forbid(unsafe_code)]
#![warn(missing_docs, rustdoc::missing_crate_level_docs)]

pub mod card;
pub mod config;
pub mod eac1;
pub mod error;
pub mod pace;
pub mod pin_state;
pub mod promise;
pub mod protocol;
pub mod simulator;
pub mod status;
pub mod step;
pub mod wizard;

pub use card::CardIo;
pub use config::EacConfig;
pub use eac1::{Eac1Input, Eac1Output};
pub use error::{Error, Result, ResultExt};
pub use pace::{EstablishChannel, EstablishChannelResponse, PaceOutput, PasswordId};
pub use pin_state::{PinState, PinStatus};
pub use promise::Promise;
pub use protocol::{DidAuthenticate, DidAuthenticateResponse, EacProtocol, EacSession};
pub use status::{ResponseApdu, StatusWord};
pub use step::{Step, StepActionResult, StepResult, StepStatus, UserConsent};
pub use wizard::{CancelToken, EacState, EacWizard, PaceOutcome, WizardResult};

/// Prelude module containing commonly used types
pub mod prelude {
    pub use crate::{
        CardIo, DidAuthenticate, EacConfig, EacProtocol, EacState, Error, PinState, ResultExt,
        Step, StepResult, UserConsent,
    };
}
