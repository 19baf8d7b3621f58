//! Error type for the EAC protocol

use ecard_sal::ResultStatus;

use crate::status::StatusWord;

/// Result type for EAC operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors raised while running PACE and EAC
#[derive(Debug, Clone, Eq, PartialEq, thiserror::Error)]
pub enum Error {
    //
    // Errors from lower layers
    //
    /// Certificate, CHAT or algorithm error
    #[error(transparent)]
    Crypto(#[from] ecard_crypto::Error),

    /// Registry or authentication data error
    #[error(transparent)]
    Sal(#[from] ecard_sal::Error),

    //
    // Card communication errors
    //
    /// The card collaborator failed to exchange an APDU
    #[error("Transmission failed: {0}")]
    Transmission(String),

    /// The card answered with less than two status bytes
    #[error("Response too short ({0} bytes)")]
    ResponseTooShort(usize),

    /// The card answered with an unexpected status word
    #[error("Unexpected status word {0}")]
    UnexpectedStatus(StatusWord),

    /// A request failed with an eCard API result
    #[error("Request failed: {0}")]
    Failed(ResultStatus),

    //
    // Promise errors
    //
    /// A value was delivered to a promise that already has one
    #[error("Promise already delivered")]
    AlreadyDelivered,

    /// The promise was cancelled before a value was delivered
    #[error("Promise cancelled")]
    Cancelled,

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

    /// Innermost error below any context layers
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

impl<T, E: Into<Error>> ResultExt<T> for std::result::Result<T, E> {
    fn context<S: Into<String>>(self, context: S) -> Result<T> {
        self.map_err(|e| e.into().with_context(context))
    }
}
