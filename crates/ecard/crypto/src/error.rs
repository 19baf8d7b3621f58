//! Error type for certificate, CHAT and algorithm handling

/// Result type for certificate and algorithm operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors raised while decoding certificates or resolving algorithms
#[derive(Debug, Clone, Eq, PartialEq, thiserror::Error)]
pub enum Error {
    /// Underlying TLV structure is malformed
    #[error(transparent)]
    Tlv(#[from] ecard_tlv::Error),

    //
    // Algorithm related errors
    //
    /// No registry entry for the requested algorithm
    #[error("{0}")]
    UnsupportedAlgorithm(String),

    /// Object identifier encoding is invalid
    #[error("Invalid object identifier: {0}")]
    InvalidOid(String),

    //
    // CHAT related errors
    //
    /// CHAT structure or discretionary data is malformed
    #[error("Malformed CHAT: {0}")]
    MalformedChat(&'static str),

    /// Access right name does not exist for the terminal type
    #[error("Unknown access right {0}")]
    UnknownRight(String),

    /// Requested rights exceed what the terminal is allowed to request
    #[error("Requested CHAT is not covered by the terminal certificate")]
    ChatNotCovered,

    //
    // Certificate related errors
    //
    /// Certificate structure is malformed
    #[error("Malformed certificate: {0}")]
    MalformedCertificate(&'static str),

    /// Date field is not six unpacked BCD digits
    #[error("Invalid certificate date")]
    InvalidDate,

    /// Certificates do not form a valid chain
    #[error("Malformed certificate chain: {0}")]
    MalformedChain(String),

    /// Certificate description is malformed
    #[error("Malformed certificate description: {0}")]
    MalformedDescription(&'static str),

    /// Certificate description hash does not match the terminal certificate
    #[error("Certificate description does not match the terminal certificate")]
    DescriptionMismatch,

    //
    // General errors
    //
    /// Context error with message and source error
    #[error("{context}: {source}")]
    Context {
        /// Contextual message
        context: String,
        /// Source error
        source: Box<Self>,
    },
}

impl Error {
    /// Create a new error with context information
    pub fn with_context<S: Into<String>>(self, context: S) -> Self {
        Self::Context {
            context: context.into(),
            source: Box::new(self),
        }
    }

    /// Innermost error, skipping any context wrappers
    pub fn root(&self) -> &Self {
        match self {
            Self::Context { source, .. } => source.root(),
            other => other,
        }
    }
}

/// Extension trait for results carrying this crate's [`Error`]
pub trait ResultExt<T> {
    /// Add context to an error
    fn context<S: Into<String>>(self, context: S) -> Result<T>;
}

impl<T> ResultExt<T> for Result<T> {
    fn context<S: Into<String>>(self, context: S) -> Self {
        self.map_err(|e| e.with_context(context))
    }
}
