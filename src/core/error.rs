use std::error::Error as StdError;
use std::fmt;
use std::time::Duration;

/// Failures that terminate a chat turn or a session operation.
///
/// Tool backend failures are deliberately absent: they degrade to an empty
/// catalog or an inline `Error: ...` string and never stop a request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GatewayError {
    /// The addressed session does not exist.
    SessionNotFound(String),
    /// The addressed message does not exist in the session.
    MessageNotFound(String),
    /// The LLM port failed before or during streaming.
    Generation(String),
    /// The whole-request deadline elapsed.
    Timeout(Duration),
    /// The client went away or the request was cancelled explicitly.
    Cancelled,
}

impl fmt::Display for GatewayError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GatewayError::SessionNotFound(_) => write!(f, "Session not found"),
            GatewayError::MessageNotFound(_) => write!(f, "Message not found"),
            GatewayError::Generation(message) => write!(f, "{message}"),
            GatewayError::Timeout(limit)
                if limit.as_secs() == 0 || limit.subsec_millis() != 0 =>
            {
                write!(f, "Request timed out after {}ms", limit.as_millis())
            }
            GatewayError::Timeout(limit) => {
                write!(f, "Request timed out after {}s", limit.as_secs())
            }
            GatewayError::Cancelled => write!(f, "Request cancelled"),
        }
    }
}

impl StdError for GatewayError {}
