//! Error types surfaced by session construction and dispatch.

use thiserror::Error;

/// Convenient result alias for client operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Failure classes for a single API call.
///
/// Exactly one variant exists per failure class, and nothing in this layer is
/// retried internally, so callers can match on the variant to drive their own
/// retry policy.
#[derive(Debug, Error)]
pub enum Error {
    /// A pooled client for a service could not be constructed.
    ///
    /// The pool is left without an entry for the service, so a later call
    /// attempts creation again.
    #[error("cannot create client for {service}: {reason}")]
    ClientSetup {
        /// Service the client was being created for.
        service: String,
        /// What went wrong during creation.
        reason: String,
    },

    /// An object filter string did not parse as a JSON object.
    ///
    /// Raised while the request envelope is assembled, before any network
    /// activity for the call.
    #[error("invalid object filter: {0}")]
    FilterEncoding(#[source] serde_json::Error),

    /// The HTTP exchange failed: connection error, elapsed timeout, or an
    /// error status on a response carrying no decodable XML-RPC payload.
    #[error("transport failure: {0}")]
    Transport(#[source] reqwest::Error),

    /// The endpoint answered with a declared XML-RPC fault.
    #[error("API fault {code}: {message}")]
    Fault {
        /// Fault code as reported by the endpoint.
        code: String,
        /// Human-readable fault description.
        message: String,
    },

    /// The response was not a well-formed method response, or its payload
    /// did not match the expected result shape.
    #[error("cannot decode response: {0}")]
    Decode(String),

    /// Session construction from the environment failed.
    #[error("configuration error: {0}")]
    Config(String),
}

impl Error {
    /// True when the failure was the configured per-call timeout elapsing.
    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Transport(e) if e.is_timeout())
    }

    /// Remote fault code, when the endpoint declared one.
    pub fn fault_code(&self) -> Option<&str> {
        match self {
            Self::Fault { code, .. } => Some(code),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fault_exposes_its_code() {
        let err = Error::Fault {
            code: "SoftLayer_Exception_ObjectNotFound".to_owned(),
            message: "no such object".to_owned(),
        };
        assert_eq!(err.fault_code(), Some("SoftLayer_Exception_ObjectNotFound"));
        assert!(!err.is_timeout());
    }

    #[test]
    fn non_fault_errors_have_no_code() {
        let err = Error::Decode("truncated document".to_owned());
        assert_eq!(err.fault_code(), None);
    }

    #[test]
    fn display_includes_context() {
        let err = Error::ClientSetup {
            service: "SoftLayer_Account".to_owned(),
            reason: "relative URL without a base".to_owned(),
        };
        let text = err.to_string();
        assert!(text.contains("SoftLayer_Account"));
        assert!(text.contains("relative URL"));

        let fault = Error::Fault {
            code: "SoftLayer_Exception_InvalidValue".to_owned(),
            message: "bad value".to_owned(),
        };
        assert_eq!(
            fault.to_string(),
            "API fault SoftLayer_Exception_InvalidValue: bad value"
        );
    }
}
