//! eCard API result codes
//!
//! Every protocol outcome is reported as a result major URI with an optional minor URI and
//! message.

use std::fmt;

macro_rules! major {
    ($suffix:literal) => {
        concat!("http://www.bsi.bund.de/ecard/api/1.1/resultmajor#", $suffix)
    };
}

macro_rules! minor {
    ($suffix:literal) => {
        concat!("http://www.bsi.bund.de/ecard/api/1.1/resultminor", $suffix)
    };
}

/// Result major codes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResultMajor {
    /// Success
    Ok,
    /// Failure, detailed by the minor code
    Error,
    /// Success with a warning
    Warning,
    /// Another request is expected in the same protocol run
    NextRequest,
}

impl ResultMajor {
    /// Major code for a URI
    pub fn from_uri(uri: &str) -> Option<Self> {
        [Self::Ok, Self::Error, Self::Warning, Self::NextRequest]
            .into_iter()
            .find(|major| major.uri() == uri)
    }

    /// Major URI
    pub const fn uri(&self) -> &'static str {
        match self {
            Self::Ok => major!("ok"),
            Self::Error => major!("error"),
            Self::Warning => major!("warning"),
            Self::NextRequest => major!("nextRequest"),
        }
    }
}

/// Result minor URIs
pub mod minor {
    /// Interface device layer
    pub mod ifdl {
        /// PIN has one try left and needs the CAN first
        pub const PASSWORD_SUSPENDED: &str = minor!("/ifdl/passwordSuspended");
        /// PIN is blocked
        pub const PASSWORD_BLOCKED: &str = minor!("/ifdl/passwordBlocked");
        /// Wrong PIN
        pub const PASSWORD_ERROR: &str = minor!("/ifdl/passwordError");
        /// PIN is deactivated
        pub const PASSWORD_DEACTIVATED: &str = minor!("/ifdl/passwordDeactivated");
        /// Authentication with the card failed
        pub const AUTHENTICATION_FAILED: &str = minor!("/ifdl/authenticationFailed");
        /// User cancelled at the reader
        pub const CANCELLATION_BY_USER: &str = minor!("/ifdl#cancellationByUser");
        /// Slot handle is no longer valid
        pub const INVALID_SLOT_HANDLE: &str = minor!("/ifdl/common#invalidSlotHandle");
        /// Reader timed out
        pub const TIMEOUT_ERROR: &str = minor!("/ifdl/common#timeoutError");
        /// Unspecified reader error
        pub const UNKNOWN_ERROR: &str = minor!("/ifdl/unknownError");
    }

    /// Service access layer
    pub mod sal {
        /// User cancelled in the client
        pub const CANCELLATION_BY_USER: &str = minor!("/sal#cancellationByUser");
        /// No card state entry for the connection handle
        pub const UNKNOWN_CONNECTION_HANDLE: &str = minor!("/sal#unknownConnectionHandle");
        /// Access condition not met
        pub const SECURITY_CONDITION_NOT_SATISFIED: &str =
            minor!("/sal#securityConditionNotSatisfied");
        /// Certificate description or chain could not be verified
        pub const DOCUMENT_VALIDITY_VERIFICATION_FAILED: &str =
            minor!("/sal/mEAC#DocumentValidityVerificationFailed");
        /// Protocol preconditions not met
        pub const PREREQUISITES_NOT_SATISFIED: &str = minor!("/sal#prerequisitesNotSatisfied");
    }

    /// Application layer
    pub mod al {
        /// Request parameter is invalid
        pub const INCORRECT_PARAMETER: &str = minor!("/al/common#incorrectParameter");
        /// Unexpected internal failure
        pub const INTERNAL_ERROR: &str = minor!("/al/common#internalError");
        /// Unspecified failure
        pub const UNKNOWN_ERROR: &str = minor!("/al/common#unknownError");
    }
}

/// Outcome of a request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResultStatus {
    /// Major code
    pub major: ResultMajor,
    /// Minor URI, for errors and warnings
    pub minor: Option<String>,
    /// Human readable message
    pub message: Option<String>,
}

impl ResultStatus {
    /// Successful result
    pub const fn ok() -> Self {
        Self {
            major: ResultMajor::Ok,
            minor: None,
            message: None,
        }
    }

    /// Error result with a minor code and message
    pub fn error(minor: &str, message: impl Into<String>) -> Self {
        Self {
            major: ResultMajor::Error,
            minor: Some(minor.to_string()),
            message: Some(message.into()),
        }
    }

    /// Whether the major code is ok
    pub fn is_ok(&self) -> bool {
        self.major == ResultMajor::Ok
    }

    /// Whether this is an error with the given minor code
    pub fn is_error(&self, minor: &str) -> bool {
        self.major == ResultMajor::Error && self.minor.as_deref() == Some(minor)
    }
}

impl fmt::Display for ResultMajor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.uri())
    }
}

impl Default for ResultStatus {
    fn default() -> Self {
        Self::ok()
    }
}

impl fmt::Display for ResultStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.major.uri())?;
        if let Some(minor) = &self.minor {
            write!(f, " {minor}")?;
        }
        if let Some(message) = &self.message {
            write!(f, ": {message}")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_uris() {
        assert_eq!(
            ResultMajor::Error.to_string(),
            "http://www.bsi.bund.de/ecard/api/1.1/resultmajor#error"
        );
        assert_eq!(
            ResultMajor::from_uri("http://www.bsi.bund.de/ecard/api/1.1/resultmajor#nextRequest"),
            Some(ResultMajor::NextRequest)
        );
        assert_eq!(ResultMajor::from_uri("urn:x"), None);
        assert_eq!(
            minor::ifdl::INVALID_SLOT_HANDLE,
            "http://www.bsi.bund.de/ecard/api/1.1/resultminor/ifdl/common#invalidSlotHandle"
        );
        assert_eq!(
            minor::sal::DOCUMENT_VALIDITY_VERIFICATION_FAILED,
            "http://www.bsi.bund.de/ecard/api/1.1/resultminor/sal/mEAC#DocumentValidityVerificationFailed"
        );
    }

    #[test]
    fn test_status() {
        let status = ResultStatus::error(minor::ifdl::PASSWORD_BLOCKED, "PIN blocked");
        assert!(status.is_error(minor::ifdl::PASSWORD_BLOCKED));
        assert!(!status.is_ok());
        assert!(status.to_string().ends_with("/ifdl/passwordBlocked: PIN blocked"));
        assert!(ResultStatus::default().is_ok());
    }
}
