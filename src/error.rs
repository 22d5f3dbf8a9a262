//! Error types shared by the whole client.
//!
//! `ClientError` is what callers of the session see; every variant that can
//! come out of `Session::dispatch` is meant to be shown to the user.
//! `DecodeError` never leaves the receive path - it is logged and the frame
//! is dropped.

use std::fmt;

use thiserror::Error;

/// The two user-editable columns of an SPN row.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SpnField {
    Spn,
    Value,
}

impl fmt::Display for SpnField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SpnField::Spn => write!(f, "SPN"),
            SpnField::Value => write!(f, "value"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum ClientError {
    #[error("no websocket connection")]
    NotConnected,
    #[error("connection failed: {0}")]
    ConnectionFailed(String),
    #[error("row {row}: {field} is empty")]
    EmptyField { row: usize, field: SpnField },
    #[error("no frame selected")]
    NoFrameSelected,
    #[error("no SPN row at position {0}")]
    NoSuchRow(usize),
    #[error("SPN row {0} is waiting for a server reply")]
    RowBusy(usize),
    #[error("no frame at catalog position {0}")]
    NoSuchFrame(usize),
    #[error("invalid `{command}` payload: {reason}")]
    InvalidPayload { command: String, reason: String },
    #[error("failed to encode message: {0}")]
    Encode(String),
    #[error("websocket error: {0}")]
    Transport(String),
}

impl ClientError {
    pub fn invalid_payload(command: &str, reason: impl fmt::Display) -> Self {
        ClientError::InvalidPayload {
            command: command.to_string(),
            reason: reason.to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum DecodeError {
    #[error("malformed payload: {0}")]
    MalformedPayload(String),
    #[error("payload is null")]
    NullPayload,
    #[error("payload has no `command` field")]
    MissingCommand,
}

pub type ClientResult<T> = Result<T, ClientError>;
