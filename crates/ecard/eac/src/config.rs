//! Configuration options for the EAC protocol step

/// Configuration options for running PACE and EAC
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EacConfig {
    /// The reader collects the password on its own pinpad
    pub native_pin_entry: bool,

    /// Check the CHR to CAR links of the eService certificates
    pub verify_chain: bool,

    /// Reject requests whose required CHAT exceeds the terminal certificate
    pub enforce_chat: bool,
}

impl Default for EacConfig {
    fn default() -> Self {
        Self {
            native_pin_entry: false,
            verify_chain: true,
            enforce_chat: true,
        }
    }
}

impl EacConfig {
    /// Create a new default configuration
    pub fn new() -> Self {
        Self::default()
    }

    /// Set whether the reader collects the password
    pub const fn with_native_pin_entry(mut self, native: bool) -> Self {
        self.native_pin_entry = native;
        self
    }

    /// Set whether the certificate chain is checked
    pub const fn with_verify_chain(mut self, verify: bool) -> Self {
        self.verify_chain = verify;
        self
    }

    /// Set whether the required CHAT is checked against the terminal certificate
    pub const fn with_enforce_chat(mut self, enforce: bool) -> Self {
        self.enforce_chat = enforce;
        self
    }
}
