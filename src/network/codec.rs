//! Envelope codec for the gateway protocol.
//!
//! Every frame in both directions is a UTF-8 text frame holding
//! `{"command": "<name>", "data": <optional>}`.  The `data` member is passed
//! through untouched; its shape depends on the command and is checked by the
//! handler that consumes it.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{ClientError, DecodeError};

/// Outbound envelope.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Envelope {
    pub command: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

/// A decoded inbound frame.
#[derive(Debug, Clone, PartialEq)]
pub struct ParsedMessage {
    pub command: String,
    pub data: Option<Value>,
}

impl ParsedMessage {
    pub fn new(command: impl Into<String>, data: Option<Value>) -> Self {
        Self {
            command: command.into(),
            data,
        }
    }
}

pub fn encode<T: Serialize + ?Sized>(command: &str, data: Option<&T>) -> Result<String, ClientError> {
    let data = data
        .map(serde_json::to_value)
        .transpose()
        .map_err(|e| ClientError::Encode(e.to_string()))?;
    let envelope = Envelope {
        command: command.to_string(),
        data,
    };
    serde_json::to_string(&envelope).map_err(|e| ClientError::Encode(e.to_string()))
}

pub fn decode(raw: &str) -> Result<ParsedMessage, DecodeError> {
    let value: Value =
        serde_json::from_str(raw).map_err(|e| DecodeError::MalformedPayload(e.to_string()))?;

    let mut obj = match value {
        Value::Null => return Err(DecodeError::NullPayload),
        Value::Object(map) => map,
        _ => return Err(DecodeError::MissingCommand),
    };

    let command = match obj.remove("command") {
        Some(Value::String(command)) => command,
        _ => return Err(DecodeError::MissingCommand),
    };
    // An explicit `"data": null` is the same as no data at all.
    let data = obj.remove("data").filter(|d| !d.is_null());

    Ok(ParsedMessage { command, data })
}
