//! Status words and APDUs exchanged during PACE and Terminal Authentication

use std::fmt;

use bytes::Bytes;
use tracing::{Level, trace};

use crate::error::{Error, Result};

/// Status Word (SW1-SW2) from an APDU response
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct StatusWord {
    /// First status byte (SW1)
    pub sw1: u8,
    /// Second status byte (SW2)
    pub sw2: u8,
}

impl StatusWord {
    /// Create a new status word
    pub const fn new(sw1: u8, sw2: u8) -> Self {
        Self { sw1, sw2 }
    }

    /// Create from a u16 value (SW1 | SW2)
    pub const fn from_u16(status: u16) -> Self {
        Self {
            sw1: (status >> 8) as u8,
            sw2: status as u8,
        }
    }

    /// Convert to a u16 value (SW1 | SW2)
    pub const fn to_u16(&self) -> u16 {
        ((self.sw1 as u16) << 8) | (self.sw2 as u16)
    }

    /// Check if this status word indicates success (90 00)
    pub const fn is_success(&self) -> bool {
        self.sw1 == 0x90 && self.sw2 == 0x00
    }

    /// Retry counter carried by a `63 CX` warning
    pub const fn retry_counter(&self) -> Option<u8> {
        if self.sw1 == 0x63 && self.sw2 & 0xF0 == 0xC0 {
            Some(self.sw2 & 0x0F)
        } else {
            None
        }
    }

    /// Get the appropriate tracing level for this status word
    pub const fn tracing_level(&self) -> Level {
        if self.is_success() {
            Level::DEBUG
        } else if self.sw1 == 0x62 || self.sw1 == 0x63 {
            Level::INFO
        } else {
            Level::WARN
        }
    }

    /// Get a description of this status word
    pub const fn description(&self) -> &'static str {
        match (self.sw1, self.sw2) {
            (0x90, 0x00) => "Success",
            (0x62, 0x83) => "Selected file invalidated",
            (0x63, 0xC0) => "Password blocked",
            (0x63, n) if (n & 0xF0) == 0xC0 => "Counter value",
            (0x67, 0x00) => "Wrong length",
            (0x69, 0x82) => "Security status not satisfied",
            (0x69, 0x83) => "Authentication method blocked",
            (0x69, 0x84) => "Referenced data invalidated",
            (0x69, 0x85) => "Conditions of use not satisfied",
            (0x6A, 0x80) => "Incorrect parameters in the data field",
            (0x6A, 0x88) => "Referenced data not found",
            (0x6D, 0x00) => "Instruction code not supported or invalid",
            (0x6E, 0x00) => "Class not supported",
            _ => "Unknown status word",
        }
    }
}

impl From<(u8, u8)> for StatusWord {
    fn from(tuple: (u8, u8)) -> Self {
        Self::new(tuple.0, tuple.1)
    }
}

impl From<u16> for StatusWord {
    fn from(status: u16) -> Self {
        Self::from_u16(status)
    }
}

impl fmt::Display for StatusWord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:02X} {:02X}", self.sw1, self.sw2)
    }
}

/// Status words of the PIN status query
pub mod pin {
    use super::StatusWord;

    /// PIN active, three tries left (90 00)
    pub const RC3: StatusWord = StatusWord::new(0x90, 0x00);
    /// PIN active, two tries left (63 C2)
    pub const RC2: StatusWord = StatusWord::new(0x63, 0xC2);
    /// PIN suspended, CAN required before the last try (63 C1)
    pub const RC1: StatusWord = StatusWord::new(0x63, 0xC1);
    /// PIN blocked (63 C0)
    pub const BLOCKED: StatusWord = StatusWord::new(0x63, 0xC0);
    /// PIN deactivated (62 83)
    pub const DEACTIVATED: StatusWord = StatusWord::new(0x62, 0x83);
}

/// MSE:Set AT selecting PACE with the PIN, used to read the PIN retry counter
pub const PIN_STATUS_COMMAND: [u8; 20] = [
    0x00, 0x22, 0xC1, 0xA4, 0x0F, 0x80, 0x0A, 0x04, 0x00, 0x7F, 0x00, 0x07, 0x02, 0x02, 0x04,
    0x02, 0x02, 0x83, 0x01, 0x03,
];

/// GET CHALLENGE for an eight byte nonce
pub const GET_CHALLENGE_COMMAND: [u8; 5] = [0x00, 0x84, 0x00, 0x00, 0x08];

/// Response APDU split into payload and status word
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResponseApdu {
    payload: Bytes,
    status: StatusWord,
}

impl ResponseApdu {
    /// Create a response from payload and status
    pub fn new(payload: impl Into<Bytes>, status: impl Into<StatusWord>) -> Self {
        Self {
            payload: payload.into(),
            status: status.into(),
        }
    }

    /// Parse response from raw bytes (including status word)
    pub fn from_bytes(data: &Bytes) -> Result<Self> {
        let split = data
            .len()
            .checked_sub(2)
            .ok_or(Error::ResponseTooShort(data.len()))?;
        let status = StatusWord::new(data[split], data[split + 1]);
        trace!(
            sw1 = format_args!("{:#04x}", status.sw1),
            sw2 = format_args!("{:#04x}", status.sw2),
            payload_len = split,
            "Parsed response APDU"
        );
        Ok(Self {
            payload: data.slice(..split),
            status,
        })
    }

    /// Response payload data
    pub const fn payload(&self) -> &Bytes {
        &self.payload
    }

    /// Status word
    pub const fn status(&self) -> StatusWord {
        self.status
    }

    /// Payload of a successful response
    pub fn into_success_payload(self) -> Result<Bytes> {
        if self.status.is_success() {
            Ok(self.payload)
        } else {
            Err(Error::UnexpectedStatus(self.status))
        }
    }

    /// Raw bytes including the status word
    pub fn to_bytes(&self) -> Bytes {
        let mut out = Vec::with_capacity(self.payload.len() + 2);
        out.extend_from_slice(&self.payload);
        out.extend_from_slice(&[self.status.sw1, self.status.sw2]);
        Bytes::from(out)
    }
}
