//! Error types for message decoding, aggregation and AsyncAGI commands

use std::time::Duration;

/// Errors produced by this crate.
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum AmiError {
    /// A line could not be decoded, or a plain key appeared twice.
    #[error("malformed message: {reason}\n raw content:\n{raw}")]
    MalformedMessage {
        /// What went wrong.
        reason: String,
        /// The raw block being decoded.
        raw: String,
    },

    /// The switch rejected the action, or the originating channel is gone.
    #[error("channel unavailable: {0}")]
    ChannelUnavailable(String),

    /// No table with that name was collected.
    #[error("no such table: {0}")]
    NoSuchTable(String),

    /// The `JSON` key is missing, empty or does not parse.
    #[error("no JSON payload found")]
    NoJsonPayload,

    /// No matching result event arrived before the deadline.
    #[error("AGI command {command_id} timed out after {timeout:?}")]
    CommandTimeout {
        /// Correlation id of the abandoned command.
        command_id: String,
        /// Deadline that expired.
        timeout: Duration,
    },

    /// TableStart/TableEnd events arrived out of order.
    #[error("table sequence violation: {0}")]
    TableSequence(String),

    /// AGI rejected the command (status 510 or 520).
    #[error("invalid AGI command: {0}")]
    InvalidCommand(String),

    /// The AGI result text could not be understood.
    #[error("invalid AGI result: {0}")]
    InvalidResult(String),

    /// `send` was called after `close`.
    #[error("AsyncAGI channel {0} is closed")]
    ChannelClosed(String),

    /// The event given does not have the expected type.
    #[error("unexpected event: expected {expected}, got {got}")]
    UnexpectedEvent {
        /// Required event name.
        expected: &'static str,
        /// Name of the event received.
        got: String,
    },

    /// An action could not be serialized.
    #[error("invalid action: {0}")]
    InvalidAction(String),

    /// The switch answered `Response: Error`.
    #[error("action failed: {0}")]
    ActionFailed(String),

    /// The transport went away while a reply was pending.
    #[error("connection closed")]
    ConnectionClosed,

    /// Events were dropped because an [`EventStream`](crate::EventStream) fell behind.
    #[error("event queue full, events dropped")]
    QueueFull,

    /// JSON decoding error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl AmiError {
    pub(crate) fn malformed(reason: impl Into<String>, raw: &str) -> Self {
        Self::MalformedMessage {
            reason: reason.into(),
            raw: raw.to_string(),
        }
    }

    /// `true` for errors caused by the far end hanging up.
    pub fn is_channel_down(&self) -> bool {
        matches!(self, Self::ChannelUnavailable(_) | Self::ChannelClosed(_))
    }
}

/// Result alias used throughout the crate.
pub type AmiResult<T> = Result<T, AmiError>;
