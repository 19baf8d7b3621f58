//! Utility functions and types for the eCard CLI

pub mod console;
pub mod display;

use anyhow::{Context, Result, bail};
use clap::ValueEnum;
use ecard_eac::PinState;

/// Retry counter positions a simulated card can start from
#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum PinStateArg {
    /// Three tries left
    Rc3,
    /// Two tries left
    Rc2,
    /// One try left, CAN required
    Rc1,
    /// PIN blocked
    Blocked,
    /// PIN deactivated
    Deactivated,
}

impl From<PinStateArg> for PinState {
    fn from(arg: PinStateArg) -> Self {
        match arg {
            PinStateArg::Rc3 => Self::Rc3,
            PinStateArg::Rc2 => Self::Rc2,
            PinStateArg::Rc1 => Self::Rc1,
            PinStateArg::Blocked => Self::Blocked,
            PinStateArg::Deactivated => Self::Deactivated,
        }
    }
}

/// Decode a hex argument, ignoring whitespace and colons
pub fn parse_hex(name: &str, input: &str) -> Result<Vec<u8>> {
    let compact: String = input
        .chars()
        .filter(|c| !c.is_whitespace() && *c != ':')
        .collect();
    if compact.is_empty() {
        bail!("{name} is empty");
    }
    hex::decode(&compact).with_context(|| format!("{name} is not valid hex"))
}

/// Parse a mechanism id given in decimal or with a `0x` prefix
pub fn parse_mechanism(input: &str) -> Result<u64> {
    let trimmed = input.trim();
    let parsed = match trimmed.strip_prefix("0x").or_else(|| trimmed.strip_prefix("0X")) {
        Some(digits) => u64::from_str_radix(digits, 16),
        None => trimmed.parse(),
    };
    parsed.with_context(|| format!("invalid mechanism id {input}"))
}
