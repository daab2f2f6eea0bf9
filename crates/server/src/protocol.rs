//! JSON-lines message shapes.
//!
//! Every line on stdin is one JSON object tagged by `type`. Intercepted
//! requests, control messages and warm-up commands share the channel; the
//! `type` decides which component receives the message. Replies run
//! concurrently and may arrive out of order, so control and warm-up messages
//! may carry an `id` that acknowledgements and rejections echo back.

use std::collections::BTreeMap;

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use pictoh_client::{ControlMessage, LifecycleState, Served, Source, WarmUpCommand};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::ProtocolError;

/// An intercepted request from the foreground.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct FetchMessage {
    pub id: String,
    pub url: String,
    #[serde(default = "default_method")]
    pub method: String,
}

fn default_method() -> String {
    "GET".to_string()
}

/// A parsed inbound line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Inbound {
    Fetch(FetchMessage),
    Control { id: Option<String>, message: ControlMessage },
    WarmUp { id: Option<String>, command: WarmUpCommand },
}

fn id_of(value: &Value) -> Option<String> {
    value.get("id").and_then(Value::as_str).map(str::to_string)
}

/// The `id` of a line that could not be routed, when it has one.
pub fn peek_id(line: &str) -> Option<String> {
    serde_json::from_str::<Value>(line).ok().as_ref().and_then(id_of)
}

/// Parse one inbound line.
pub fn parse(line: &str) -> Result<Inbound, ProtocolError> {
    let value: Value = serde_json::from_str(line)?;
    let kind = value
        .get("type")
        .and_then(Value::as_str)
        .ok_or_else(|| ProtocolError::Malformed("missing \"type\"".to_string()))?;

    match kind {
        "FETCH" => Ok(Inbound::Fetch(serde_json::from_value(value)?)),
        "SKIP_WAITING" | "CACHE_URLS" | "CACHE_USER_PICTURE" => {
            Ok(Inbound::Control { id: id_of(&value), message: serde_json::from_value(value)? })
        }
        "START_DOWNLOADS" | "CANCEL" => Ok(Inbound::WarmUp { id: id_of(&value), command: serde_json::from_value(value)? }),
        other => Err(ProtocolError::UnknownType(other.to_string())),
    }
}

/// A reply written to stdout. Warm-up events are written as-is.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Reply {
    /// Sent once after start-up.
    #[serde(rename_all = "camelCase")]
    Ready { state: LifecycleState, first_launch: bool },
    Response {
        id: String,
        status: u16,
        headers: BTreeMap<String, String>,
        /// Base64 of the body bytes.
        body: String,
        source: Source,
    },
    FetchFailed { id: String, code: String, message: String },
    Ack {
        #[serde(skip_serializing_if = "Option::is_none")]
        id: Option<String>,
        message: String,
        stored: usize,
        failed: usize,
    },
    Rejected {
        #[serde(skip_serializing_if = "Option::is_none")]
        id: Option<String>,
        code: String,
        message: String,
    },
}

impl Reply {
    pub fn response(id: String, served: Served) -> Self {
        let Served { response, source } = served;
        Reply::Response {
            id,
            status: response.status,
            headers: response.headers,
            body: STANDARD.encode(&response.body),
            source,
        }
    }

    pub fn fetch_failed(id: String, err: &pictoh_core::Error) -> Self {
        Reply::FetchFailed { id, code: err.code().to_string(), message: err.to_string() }
    }

    pub fn rejected(id: Option<String>, err: &pictoh_core::Error) -> Self {
        Reply::Rejected { id, code: err.code().to_string(), message: err.to_string() }
    }

    /// Attach the id of the message an acknowledgement or rejection answers.
    pub fn with_id(mut self, reply_id: Option<String>) -> Self {
        if let Reply::Ack { id, .. } | Reply::Rejected { id, .. } = &mut self {
            *id = reply_id;
        }
        self
    }
}

/// Serialize a message as one output line (without the newline).
pub fn encode<T: Serialize>(message: &T) -> String {
    serde_json::to_string(message).unwrap_or_else(|e| {
        tracing::error!(error = %e, "cannot encode reply");
        format!(r#"{{"type":"REJECTED","code":"ENCODE_FAILED","message":"{e}"}}"#)
    })
}
