//! Wire-level errors for the stdio host.
//!
//! Agent failures already carry a `CODE: message` rendering; these cover
//! input the host cannot route at all.

use crate::protocol::Reply;

/// Wire-level errors for the stdio host.
#[derive(Debug, thiserror::Error)]
pub enum ProtocolError {
    /// The line is not JSON or does not fit the message shape.
    #[error("MALFORMED_MESSAGE: {0}")]
    Malformed(String),

    /// The message has no recognised `type`.
    #[error("UNKNOWN_MESSAGE: {0}")]
    UnknownType(String),

    /// The warm-up coordinator is gone.
    #[error("WARM_UP_STOPPED: warm-up coordinator is not running")]
    WarmUpStopped,
}

impl ProtocolError {
    pub fn code(&self) -> &'static str {
        match self {
            ProtocolError::Malformed(_) => "MALFORMED_MESSAGE",
            ProtocolError::UnknownType(_) => "UNKNOWN_MESSAGE",
            ProtocolError::WarmUpStopped => "WARM_UP_STOPPED",
        }
    }
}

impl From<serde_json::Error> for ProtocolError {
    fn from(err: serde_json::Error) -> Self {
        ProtocolError::Malformed(err.to_string())
    }
}

impl From<ProtocolError> for Reply {
    fn from(err: ProtocolError) -> Self {
        Reply::Rejected { id: None, code: err.code().to_string(), message: err.to_string() }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rejected_reply_carries_code() {
        let reply: Reply = ProtocolError::UnknownType("PING".into()).into();
        match reply {
            Reply::Rejected { code, message, .. } => {
                assert_eq!(code, "UNKNOWN_MESSAGE");
                assert_eq!(message, "UNKNOWN_MESSAGE: PING");
            }
            other => panic!("unexpected reply: {other:?}"),
        }
    }
}
