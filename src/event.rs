//! AMI event types and structures

use percent_encoding::percent_decode_str;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::AmiResult;
use crate::headers::MessageKey;
use crate::message::DecodedMessage;

/// Error returned when parsing an unknown event name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseEventTypeError(pub String);

impl fmt::Display for ParseEventTypeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unknown event type: {}", self.0)
    }
}

impl std::error::Error for ParseEventTypeError {}

define_wire_enum! {
    error_type: ParseEventTypeError,
    /// Event names this crate recognizes.
    ///
    /// Anything else decodes with [`AmiEvent::event_type()`] returning `None`,
    /// which [`ComplexResponse`](crate::ComplexResponse) treats as an
    /// unparsed event that is never attributed to a table.
    pub enum EventType {
        AsyncAgi => "AsyncAGI",
        AsyncAgiStart => "AsyncAGIStart",
        AsyncAgiExec => "AsyncAGIExec",
        AsyncAgiEnd => "AsyncAGIEnd",
        TableStart => "TableStart",
        TableEnd => "TableEnd",
        FullyBooted => "FullyBooted",
        Shutdown => "Shutdown",
        Reload => "Reload",
        Newchannel => "Newchannel",
        Newstate => "Newstate",
        Newexten => "Newexten",
        NewCallerid => "NewCallerid",
        Hangup => "Hangup",
        HangupRequest => "HangupRequest",
        DialBegin => "DialBegin",
        DialEnd => "DialEnd",
        BridgeEnter => "BridgeEnter",
        BridgeLeave => "BridgeLeave",
        VarSet => "VarSet",
        DtmfBegin => "DTMFBegin",
        DtmfEnd => "DTMFEnd",
        OriginateResponse => "OriginateResponse",
        PeerStatus => "PeerStatus",
        Cdr => "Cdr",
        UserEvent => "UserEvent",
        PeerEntry => "PeerEntry",
        PeerlistComplete => "PeerlistComplete",
        Status => "Status",
        StatusComplete => "StatusComplete",
        CoreShowChannel => "CoreShowChannel",
        CoreShowChannelsComplete => "CoreShowChannelsComplete",
        PresenceStateChange => "PresenceStateChange",
        PresenceStateListComplete => "PresenceStateListComplete",
        DeviceStateChange => "DeviceStateChange",
        DeviceStateListComplete => "DeviceStateListComplete",
        ExtensionStatus => "ExtensionStatus",
        ExtensionStateListComplete => "ExtensionStateListComplete",
        QueueParams => "QueueParams",
        QueueMember => "QueueMember",
        QueueStatusComplete => "QueueStatusComplete",
        RegistryEntry => "RegistryEntry",
        RegistrationsComplete => "RegistrationsComplete",
        ListDialplan => "ListDialplan",
        ShowDialPlanComplete => "ShowDialPlanComplete",
        BridgeListItem => "BridgeListItem",
        BridgeListComplete => "BridgeListComplete",
        ParkedCall => "ParkedCall",
        ParkedCallsComplete => "ParkedCallsComplete",
    }
}

/// Phase of an AsyncAGI session an event belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AsyncAgiPhase {
    /// Channel entered `AGI(agi:async)`.
    Start,
    /// Result of one AGI command.
    Exec,
    /// Channel left AsyncAGI (hangup or `ASYNCAGI BREAK`).
    End,
}

/// A decoded event with its catalog type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AmiEvent {
    event_type: Option<EventType>,
    message: DecodedMessage,
}

impl AmiEvent {
    /// Wrap a decoded message, resolving its `Event` name against the catalog.
    pub fn from_message(message: DecodedMessage) -> Self {
        let event_type = message
            .event_name()
            .and_then(EventType::parse_wire);
        Self {
            event_type,
            message,
        }
    }

    /// Decode a raw block straight into an event.
    pub fn decode(raw: &str) -> AmiResult<Self> {
        Ok(Self::from_message(DecodedMessage::decode(raw)?))
    }

    /// Catalog type, `None` for events this crate does not know.
    pub fn event_type(&self) -> Option<EventType> {
        self.event_type
    }

    /// Whether the event name is outside the catalog.
    pub fn is_unknown(&self) -> bool {
        self.event_type
            .is_none()
    }

    /// Check whether this event matches the given type.
    pub fn is_event_type(&self, event_type: EventType) -> bool {
        self.event_type == Some(event_type)
    }

    /// Raw `Event` value (empty string if absent).
    pub fn name(&self) -> &str {
        self.message
            .event_name()
            .unwrap_or("")
    }

    /// Look up a field (case-insensitive).
    pub fn key(&self, name: impl AsRef<str>) -> Option<&str> {
        self.message
            .key(name)
    }

    /// `EventList` value.
    pub fn event_list(&self) -> Option<&str> {
        self.message
            .event_list()
    }

    /// `ActionID` value.
    pub fn action_id(&self) -> Option<&str> {
        self.message
            .action_id()
    }

    /// `Channel` value.
    pub fn channel(&self) -> Option<&str> {
        self.message
            .channel()
    }

    /// `TableName` carried by `TableStart` and `TableEnd`.
    pub fn table_name(&self) -> Option<&str> {
        self.key(MessageKey::TableName)
    }

    /// `CommandID` of an AsyncAGI exec event.
    pub fn command_id(&self) -> Option<&str> {
        self.key(MessageKey::CommandId)
    }

    /// `Result` of an AsyncAGI exec event, percent-decoded.
    pub fn agi_result(&self) -> Option<String> {
        self.key(MessageKey::Result)
            .map(percent_decoded)
    }

    /// `Env` of an AsyncAGI start event, percent-decoded.
    pub fn agi_env(&self) -> Option<String> {
        self.key(MessageKey::Env)
            .map(percent_decoded)
    }

    /// AsyncAGI phase, covering both the `AsyncAGIExec` style and the older
    /// single `AsyncAGI` event with a `SubEvent` key.
    pub fn async_agi_phase(&self) -> Option<AsyncAgiPhase> {
        match self.event_type? {
            EventType::AsyncAgiStart => Some(AsyncAgiPhase::Start),
            EventType::AsyncAgiExec => Some(AsyncAgiPhase::Exec),
            EventType::AsyncAgiEnd => Some(AsyncAgiPhase::End),
            EventType::AsyncAgi => {
                let sub = self.key(MessageKey::SubEvent)?;
                if sub.eq_ignore_ascii_case("start") {
                    Some(AsyncAgiPhase::Start)
                } else if sub.eq_ignore_ascii_case("exec") {
                    Some(AsyncAgiPhase::Exec)
                } else if sub.eq_ignore_ascii_case("end") {
                    Some(AsyncAgiPhase::End)
                } else {
                    None
                }
            }
            _ => None,
        }
    }

    /// Underlying decoded message.
    pub fn message(&self) -> &DecodedMessage {
        &self.message
    }

    /// Consume into the decoded message.
    pub fn into_message(self) -> DecodedMessage {
        self.message
    }
}

fn percent_decoded(raw: &str) -> String {
    percent_decode_str(raw)
        .decode_utf8()
        .map(|s| s.into_owned())
        .unwrap_or_else(|_| raw.to_string())
}
