//! JSON hub protocol spoken over the WebSocket channel.
//!
//! Wire format: every record is a JSON object terminated by the ASCII record
//! separator `0x1E`. One text frame may carry several records.
//!
//! ```text
//! client                                   hub
//!   │ {"protocol":"json","version":1}␞ ───►  │   handshake
//!   │ ◄─── {}␞  (or {"error":"..."}␞)        │
//!   │ {"type":1,"invocationId":"7",          │
//!   │  "target":"EditBlock","arguments":[…]}␞ ─►
//!   │ ◄─── {"type":3,"invocationId":"7","result":…}␞
//!   │ ◄─── {"type":1,"target":"BlockEdited","arguments":[…]}␞
//! ```
//!
//! Invocations without an `invocationId` are server pushes (events).

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Terminator of every protocol record.
pub const RECORD_SEPARATOR: char = '\u{1e}';

/// Hub protocol name sent during the handshake.
pub const PROTOCOL_NAME: &str = "json";

/// Hub protocol version sent during the handshake.
pub const PROTOCOL_VERSION: u32 = 1;

/// Numeric `type` discriminator of a hub record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum MessageType {
    Invocation = 1,
    StreamItem = 2,
    Completion = 3,
    StreamInvocation = 4,
    CancelInvocation = 5,
    Ping = 6,
    Close = 7,
}

impl MessageType {
    pub fn from_u8(value: u8) -> Option<Self> {
        match value {
            1 => Some(Self::Invocation),
            2 => Some(Self::StreamItem),
            3 => Some(Self::Completion),
            4 => Some(Self::StreamInvocation),
            5 => Some(Self::CancelInvocation),
            6 => Some(Self::Ping),
            7 => Some(Self::Close),
            _ => None,
        }
    }
}

/// A decoded hub record.
#[derive(Debug, Clone, PartialEq)]
pub enum HubMessage {
    /// Method call. From the hub these are pushed events (no id); from the
    /// client they always carry an id so a completion can be matched.
    Invocation {
        invocation_id: Option<String>,
        target: String,
        arguments: Vec<Value>,
    },
    /// Reply to a client invocation. `Err` carries the hub's error text.
    Completion {
        invocation_id: String,
        result: Result<Value, String>,
    },
    Ping,
    Close {
        error: Option<String>,
        allow_reconnect: bool,
    },
}

/// Flat serde view of a record; every message type is a subset of it.
#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawMessage {
    #[serde(rename = "type")]
    msg_type: u8,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    invocation_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    target: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    arguments: Option<Vec<Value>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    result: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    allow_reconnect: Option<bool>,
}

impl HubMessage {
    /// Build a client invocation expecting a completion.
    pub fn invocation(invocation_id: u64, target: &str, arguments: Vec<Value>) -> Self {
        Self::Invocation {
            invocation_id: Some(invocation_id.to_string()),
            target: target.to_string(),
            arguments,
        }
    }

    /// Build a server push (invocation without an id).
    pub fn event(target: &str, arguments: Vec<Value>) -> Self {
        Self::Invocation {
            invocation_id: None,
            target: target.to_string(),
            arguments,
        }
    }

    fn to_raw(&self) -> RawMessage {
        match self {
            Self::Invocation { invocation_id, target, arguments } => RawMessage {
                msg_type: MessageType::Invocation as u8,
                invocation_id: invocation_id.clone(),
                target: Some(target.clone()),
                arguments: Some(arguments.clone()),
                ..RawMessage::default()
            },
            Self::Completion { invocation_id, result } => {
                let (result, error) = match result {
                    Ok(Value::Null) => (None, None),
                    Ok(value) => (Some(value.clone()), None),
                    Err(e) => (None, Some(e.clone())),
                };
                RawMessage {
                    msg_type: MessageType::Completion as u8,
                    invocation_id: Some(invocation_id.clone()),
                    result,
                    error,
                    ..RawMessage::default()
                }
            }
            Self::Ping => RawMessage {
                msg_type: MessageType::Ping as u8,
                ..RawMessage::default()
            },
            Self::Close { error, allow_reconnect } => RawMessage {
                msg_type: MessageType::Close as u8,
                error: error.clone(),
                allow_reconnect: Some(*allow_reconnect),
                ..RawMessage::default()
            },
        }
    }

    /// Serialize to one terminated record.
    pub fn encode(&self) -> Result<String, ProtocolError> {
        let mut record = serde_json::to_string(&self.to_raw())
            .map_err(|e| ProtocolError::Serialization(e.to_string()))?;
        record.push(RECORD_SEPARATOR);
        Ok(record)
    }

    /// Parse a single record (without its terminator).
    pub fn decode(record: &str) -> Result<Self, ProtocolError> {
        let raw: RawMessage = serde_json::from_str(record)
            .map_err(|e| ProtocolError::Deserialization(e.to_string()))?;

        match MessageType::from_u8(raw.msg_type) {
            Some(MessageType::Invocation) => Ok(Self::Invocation {
                invocation_id: raw.invocation_id,
                target: raw.target.ok_or(ProtocolError::MissingField("target"))?,
                arguments: raw.arguments.unwrap_or_default(),
            }),
            Some(MessageType::Completion) => {
                let invocation_id = raw
                    .invocation_id
                    .ok_or(ProtocolError::MissingField("invocationId"))?;
                let result = match raw.error {
                    Some(e) => Err(e),
                    None => Ok(raw.result.unwrap_or(Value::Null)),
                };
                Ok(Self::Completion { invocation_id, result })
            }
            Some(MessageType::Ping) => Ok(Self::Ping),
            Some(MessageType::Close) => Ok(Self::Close {
                error: raw.error,
                allow_reconnect: raw.allow_reconnect.unwrap_or(false),
            }),
            _ => Err(ProtocolError::UnsupportedMessageType(raw.msg_type)),
        }
    }

    /// Decode every record in a text frame.
    pub fn decode_frame(frame: &str) -> Vec<Result<Self, ProtocolError>> {
        split_records(frame).map(Self::decode).collect()
    }
}

/// Split a frame into its records, dropping the empty tail after the last
/// separator.
pub fn split_records(frame: &str) -> impl Iterator<Item = &str> {
    frame
        .split(RECORD_SEPARATOR)
        .filter(|record| !record.trim().is_empty())
}

#[derive(Debug, Serialize, Deserialize)]
struct HandshakeRequest {
    protocol: String,
    version: u32,
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct HandshakeResponse {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

/// The record that opens every connection.
pub fn encode_handshake_request() -> String {
    let request = HandshakeRequest {
        protocol: PROTOCOL_NAME.to_string(),
        version: PROTOCOL_VERSION,
    };
    // A two-field struct of plain strings cannot fail to serialize.
    let mut record = serde_json::to_string(&request).unwrap_or_default();
    record.push(RECORD_SEPARATOR);
    record
}

/// Encode the hub's handshake answer. `None` means accepted.
pub fn encode_handshake_response(error: Option<&str>) -> String {
    let response = HandshakeResponse {
        error: error.map(str::to_string),
    };
    let mut record = serde_json::to_string(&response).unwrap_or_default();
    record.push(RECORD_SEPARATOR);
    record
}

/// Parse the client's handshake request, returning the protocol name and version.
pub fn decode_handshake_request(record: &str) -> Result<(String, u32), ProtocolError> {
    let request: HandshakeRequest = serde_json::from_str(record)
        .map_err(|e| ProtocolError::Deserialization(e.to_string()))?;
    Ok((request.protocol, request.version))
}

/// Parse the hub's handshake answer. `Ok(Err(msg))` is a well-formed rejection.
pub fn decode_handshake_response(record: &str) -> Result<Result<(), String>, ProtocolError> {
    let response: HandshakeResponse = serde_json::from_str(record)
        .map_err(|e| ProtocolError::Deserialization(e.to_string()))?;
    Ok(match response.error {
        Some(e) => Err(e),
        None => Ok(()),
    })
}

/// Wire-level errors.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ProtocolError {
    #[error("serialization error: {0}")]
    Serialization(String),
    #[error("deserialization error: {0}")]
    Deserialization(String),
    #[error("unsupported message type {0}")]
    UnsupportedMessageType(u8),
    #[error("missing field `{0}`")]
    MissingField(&'static str),
    #[error("invalid arguments for {target}: {reason}")]
    InvalidArguments { target: String, reason: String },
}
