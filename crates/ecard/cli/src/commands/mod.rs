//! Command handlers

mod algorithm;
mod decode;
mod simulate;

pub use algorithm::*;
pub use decode::*;
pub use simulate::*;
