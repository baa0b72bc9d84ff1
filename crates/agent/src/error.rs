//! Errors reported back to the host.

use serde::Serialize;

use docscan_core::Error;

#[derive(Debug, thiserror::Error)]
pub enum HostError {
    /// The host sent a line that is not a valid event.
    #[error("INVALID_INPUT: {0}")]
    InvalidInput(String),

    #[error(transparent)]
    Agent(#[from] Error),
}

impl HostError {
    pub fn code(&self) -> &'static str {
        match self {
            HostError::InvalidInput(_) => "INVALID_INPUT",
            HostError::Agent(e) => e.code(),
        }
    }
}

impl From<serde_json::Error> for HostError {
    fn from(err: serde_json::Error) -> Self {
        HostError::InvalidInput(err.to_string())
    }
}

/// Error payload of a `{"reply":"error"}` line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ErrorReply {
    pub code: String,
    pub message: String,
}

impl From<HostError> for ErrorReply {
    fn from(err: HostError) -> Self {
        let message = match &err {
            HostError::InvalidInput(msg) => msg.clone(),
            HostError::Agent(e) => e.to_string(),
        };

        ErrorReply { code: err.code().to_string(), message }
    }
}

impl From<Error> for ErrorReply {
    fn from(err: Error) -> Self {
        HostError::from(err).into()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invalid_input_reply() {
        let reply = ErrorReply::from(HostError::InvalidInput("missing field `url`".into()));
        assert_eq!(reply.code, "INVALID_INPUT");
        assert_eq!(reply.message, "missing field `url`");
    }

    #[test]
    fn test_agent_error_keeps_its_code() {
        let err = Error::Precache { url: "http://localhost:8080/index.html".into(), reason: "status 404".into() };
        let reply = ErrorReply::from(err);
        assert_eq!(reply.code, "PRECACHE_FAILED");
        assert!(reply.message.contains("status 404"));
    }

    #[test]
    fn test_json_error_is_invalid_input() {
        let err = serde_json::from_str::<serde_json::Value>("{not json").unwrap_err();
        assert_eq!(HostError::from(err).code(), "INVALID_INPUT");
    }
}
