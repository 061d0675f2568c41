//! Wire protocol of the EagleApi event socket
//!
//! Inbound messages are JSON objects tagged by `type`; outbound commands
//! are JSON objects tagged by `command` with an optional `data` body.

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

use crate::config::ListenOptions;
use crate::error::Result;

/// Messages pushed by the server
#[derive(Debug, Clone, PartialEq)]
pub enum ServerMessage {
    /// Full-state push for one or more collections
    Snapshot(SnapshotMessage),
    /// Answer to a PING command
    Pong,
    /// Server-side failure; always fatal to the session
    Error(ErrorMessage),
    /// Any other `type`, carried for logging
    Unknown(String),
}

/// Body of a SNAPSHOT message
#[derive(Debug, Clone, PartialEq, Default, Deserialize)]
pub struct SnapshotMessage {
    /// Snapshot deliveries still queued on the server; more than zero asks
    /// for an ACCEPT
    #[serde(default, deserialize_with = "null_as_default")]
    pub queue_count: u64,

    /// `{collection: {doc_id: document_or_null}}`
    #[serde(default)]
    pub data: Option<Value>,
}

/// Body of an ERROR message
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ErrorMessage {
    #[serde(default = "unknown_error_code", deserialize_with = "error_code_or_unknown")]
    pub error_code: String,

    #[serde(default, deserialize_with = "null_as_default")]
    pub error_message: String,
}

fn unknown_error_code() -> String {
    "UNKNOWN".to_string()
}

/// Explicit `null` reads the same as a missing field
fn null_as_default<'de, D, T>(deserializer: D) -> std::result::Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

fn error_code_or_unknown<'de, D>(deserializer: D) -> std::result::Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<String>::deserialize(deserializer)?.unwrap_or_else(unknown_error_code))
}

#[derive(Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
enum TaggedMessage {
    Snapshot(SnapshotMessage),
    Pong,
    Error(ErrorMessage),
}

impl ServerMessage {
    /// Parse a text frame
    ///
    /// Unknown `type` values parse successfully as `Unknown`; malformed JSON
    /// or a known type with an invalid body is an error.
    pub fn parse(text: &str) -> Result<Self> {
        let value: Value = serde_json::from_str(text)?;

        let message_type = value
            .get("type")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string();

        if !matches!(message_type.as_str(), "SNAPSHOT" | "PONG" | "ERROR") {
            return Ok(ServerMessage::Unknown(message_type));
        }

        Ok(match serde_json::from_value(value)? {
            TaggedMessage::Snapshot(snapshot) => ServerMessage::Snapshot(snapshot),
            TaggedMessage::Pong => ServerMessage::Pong,
            TaggedMessage::Error(error) => ServerMessage::Error(error),
        })
    }
}

/// Commands sent by the client
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "command", content = "data", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ClientCommand {
    /// Subscribe to an accommodation; sent once per connection
    Join(JoinData),
    /// Ready for the next queued snapshot
    Accept,
    /// Liveness probe
    Ping,
}

/// Body of a JOIN command
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct JoinData {
    pub accom_id: String,
    pub snapshot: Vec<String>,
    pub disable_event_changed_by_yourself: bool,
}

impl From<&ListenOptions> for JoinData {
    fn from(options: &ListenOptions) -> Self {
        Self {
            accom_id: options.accom_id.clone(),
            snapshot: options.snapshots.clone(),
            disable_event_changed_by_yourself: options.ignore_own_changes,
        }
    }
}

impl ClientCommand {
    /// Encode as a text frame
    pub fn to_text(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }

    /// Command name, for logging
    pub fn name(&self) -> &'static str {
        match self {
            ClientCommand::Join(_) => "JOIN",
            ClientCommand::Accept => "ACCEPT",
            ClientCommand::Ping => "PING",
        }
    }
}
