//! Card I/O collaborator
//!
//! The protocol never talks to a reader directly. An implementation of [`CardIo`] carries
//! APDUs to the card in a slot and runs PACE, either in a pinpad reader or in software.

use std::sync::Arc;

use bytes::Bytes;
use tracing::{debug, trace};

use crate::error::Result;
use crate::pace::{EstablishChannel, EstablishChannelResponse};
use crate::pin_state::PinState;
use crate::status::{GET_CHALLENGE_COMMAND, PIN_STATUS_COMMAND, ResponseApdu};

/// Blocking access to the card in a reader slot
///
/// Calls have no timeout of their own; an implementation that can hang should enforce one.
pub trait CardIo: Send + Sync {
    /// Send a command APDU to the card in a slot and parse the answer
    fn transmit(&self, slot_handle: &[u8], command: &[u8]) -> Result<ResponseApdu> {
        trace!(
            slot = %hex::encode_upper(slot_handle),
            command = %hex::encode_upper(command),
            "Transmitting command"
        );
        let result = self
            .do_transmit(slot_handle, command)
            .and_then(|raw| ResponseApdu::from_bytes(&raw));
        match &result {
            Ok(response) => {
                trace!(response = %hex::encode_upper(response.to_bytes()), "Received response");
            }
            Err(e) => {
                debug!(error = %e, "Card error during transmission");
            }
        }
        result
    }

    /// Exchange raw bytes with the card
    ///
    /// This is the method that implementations provide; the answer includes the status word.
    fn do_transmit(&self, slot_handle: &[u8], command: &[u8]) -> Result<Bytes>;

    /// Run PACE in the slot named by the request
    fn establish_channel(&self, request: &EstablishChannel) -> Result<EstablishChannelResponse>;

    /// Ask the card for the retry counter of the PIN
    fn pin_status(&self, slot_handle: &[u8]) -> Result<PinState> {
        let response = self.transmit(slot_handle, &PIN_STATUS_COMMAND)?;
        let state = PinState::from_status_word(response.status());
        debug!(sw = %response.status(), %state, "PIN status");
        Ok(state)
    }

    /// Fetch a challenge from the card
    fn get_challenge(&self, slot_handle: &[u8]) -> Result<Bytes> {
        self.transmit(slot_handle, &GET_CHALLENGE_COMMAND)?
            .into_success_payload()
    }
}

impl<T: CardIo + ?Sized> CardIo for Arc<T> {
    fn do_transmit(&self, slot_handle: &[u8], command: &[u8]) -> Result<Bytes> {
        (**self).do_transmit(slot_handle, command)
    }

    fn establish_channel(&self, request: &EstablishChannel) -> Result<EstablishChannelResponse> {
        (**self).establish_channel(request)
    }
}
