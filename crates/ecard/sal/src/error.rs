//! Error type for the service access layer

/// Result type for service access layer operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors raised by the registry and the authentication data helpers
#[derive(Debug, Clone, Eq, PartialEq, thiserror::Error)]
pub enum Error {
    //
    // Registry related errors
    //
    /// No card state entry matches the connection handle
    #[error("Unknown connection handle")]
    UnknownConnectionHandle,

    /// Card application is not part of the card info
    #[error("Unknown card application {0}")]
    UnknownApplication(String),

    /// DID is not part of the card application
    #[error("Unknown DID {0}")]
    UnknownDid(String),

    //
    // Authentication data related errors
    //
    /// A mandatory element is missing
    #[error("Missing element {0}")]
    MissingElement(String),

    /// An element that may appear once was given several times
    #[error("Element {0} given more than once")]
    DuplicateElement(String),

    /// Element content is not valid hex
    #[error("Element {name} is not valid hex: {reason}")]
    InvalidHex {
        /// Element name
        name: String,
        /// Decoder message
        reason: String,
    },

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
