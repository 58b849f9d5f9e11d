//! Outbound actions and their immediate responses

use std::fmt;

use crate::{
    constants::EOL,
    error::{AmiError, AmiResult},
    headers::MessageKey,
    message::DecodedMessage,
};

/// Validate that a user-provided string contains no line breaks.
///
/// Actions are line-delimited; an embedded CR or LF would let a value inject
/// extra keys or a second action.
pub(crate) fn validate_no_newlines(s: &str, context: &str) -> AmiResult<()> {
    if s.contains('\n') || s.contains('\r') {
        return Err(AmiError::InvalidAction(format!(
            "{} must not contain newlines",
            context
        )));
    }
    Ok(())
}

/// An outbound manager action.
///
/// Keys are written in insertion order after the `Action:` line.
///
/// ```
/// use asterisk_ami_tokio::Action;
///
/// let action = Action::new("Ping")
///     .unwrap()
///     .with_action_id("42")
///     .unwrap();
/// assert_eq!(action.to_wire_format(), "Action: Ping\r\nActionID: 42\r\n\r\n");
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Action {
    name: String,
    fields: Vec<(String, String)>,
}

impl Action {
    /// Start an action with the given name.
    pub fn new(name: &str) -> AmiResult<Self> {
        validate_no_newlines(name, "action name")?;
        Ok(Self {
            name: name.to_string(),
            fields: Vec::new(),
        })
    }

    /// `AGI` action queueing `command` on an AsyncAGI channel.
    pub fn agi(channel: &str, command: &str, command_id: &str) -> AmiResult<Self> {
        Self::new("AGI")?
            .field(MessageKey::Channel, channel)?
            .field(MessageKey::Command, command)?
            .field(MessageKey::CommandId, command_id)
    }

    /// Add a key, replacing an earlier key of the same name (case-insensitive).
    pub fn field(mut self, key: impl AsRef<str>, value: &str) -> AmiResult<Self> {
        let key = key.as_ref();
        validate_no_newlines(key, "action key")?;
        validate_no_newlines(value, "action value")?;
        if key.contains(':') {
            return Err(AmiError::InvalidAction(format!(
                "action key '{}' must not contain ':'",
                key
            )));
        }
        match self
            .fields
            .iter_mut()
            .find(|(k, _)| k.eq_ignore_ascii_case(key))
        {
            Some(slot) => slot.1 = value.to_string(),
            None => self
                .fields
                .push((key.to_string(), value.to_string())),
        }
        Ok(self)
    }

    /// Set the `ActionID` used to correlate the response.
    pub fn with_action_id(self, action_id: &str) -> AmiResult<Self> {
        self.field(MessageKey::ActionId, action_id)
    }

    /// Action name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Look up a key (case-insensitive).
    pub fn get(&self, key: impl AsRef<str>) -> Option<&str> {
        let key = key.as_ref();
        self.fields
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(key))
            .map(|(_, v)| v.as_str())
    }

    /// `ActionID`, if set.
    pub fn action_id(&self) -> Option<&str> {
        self.get(MessageKey::ActionId)
    }

    /// Serialize to the CRLF wire format, terminated by an empty line.
    pub fn to_wire_format(&self) -> String {
        use std::fmt::Write;
        let mut result = String::new();
        let _ = write!(result, "{}: {}{}", MessageKey::Action, self.name, EOL);
        for (key, value) in &self.fields {
            let _ = write!(result, "{}: {}{}", key, value, EOL);
        }
        result.push_str(EOL);
        result
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_wire_format())
    }
}

/// `Response` classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[non_exhaustive]
pub enum ResponseStatus {
    /// `Response: Success`.
    Success,
    /// `Response: Error`.
    Error,
    /// `Response: Follows` (command output follows).
    Follows,
    /// `Response: Goodbye` (reply to `Logoff`).
    Goodbye,
    /// Any other or missing value.
    Other,
}

impl ResponseStatus {
    fn from_value(value: Option<&str>) -> Self {
        match value {
            Some(v) if v.eq_ignore_ascii_case("success") => Self::Success,
            Some(v) if v.eq_ignore_ascii_case("error") => Self::Error,
            Some(v) if v.eq_ignore_ascii_case("follows") => Self::Follows,
            Some(v) if v.eq_ignore_ascii_case("goodbye") => Self::Goodbye,
            _ => Self::Other,
        }
    }
}

/// Immediate reply to an action.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Response {
    message: DecodedMessage,
    status: ResponseStatus,
}

impl Response {
    /// `ResponseStatus` is derived from the `Response` key.
    pub fn new(message: DecodedMessage) -> Self {
        let status = ResponseStatus::from_value(message.key(MessageKey::Response));
        Self { message, status }
    }

    /// Decode a raw block into a response.
    pub fn decode(raw: &str) -> AmiResult<Self> {
        Ok(Self::new(DecodedMessage::decode(raw)?))
    }

    /// `true` unless the switch answered `Error` or something unrecognized.
    pub fn is_success(&self) -> bool {
        matches!(
            self.status,
            ResponseStatus::Success | ResponseStatus::Follows | ResponseStatus::Goodbye
        )
    }

    /// Classification of the `Response` key.
    pub fn status(&self) -> ResponseStatus {
        self.status
    }

    /// `Message` text (e.g. `Channel does not exist.`).
    pub fn message_text(&self) -> Option<&str> {
        self.message
            .key(MessageKey::Message)
    }

    /// `ActionID` echoed by the switch.
    pub fn action_id(&self) -> Option<&str> {
        self.message
            .action_id()
    }

    /// Look up a field (case-insensitive).
    pub fn key(&self, name: impl AsRef<str>) -> Option<&str> {
        self.message
            .key(name)
    }

    /// Whether this response opens an event list (`EventList: start`).
    pub fn starts_event_list(&self) -> bool {
        self.message
            .event_list()
            .is_some_and(|v| {
                v.to_lowercase()
                    .contains("start")
            })
    }

    /// Underlying decoded message.
    pub fn message(&self) -> &DecodedMessage {
        &self.message
    }

    /// Convert to result based on success status.
    ///
    /// ```
    /// # use asterisk_ami_tokio::Response;
    /// let resp = Response::decode("Response: Error\r\nMessage: Permission denied\r\n").unwrap();
    /// assert!(resp.into_result().is_err());
    /// ```
    pub fn into_result(self) -> AmiResult<Self> {
        if self.is_success() {
            Ok(self)
        } else {
            let text = self
                .message_text()
                .unwrap_or("error")
                .to_string();
            Err(AmiError::ActionFailed(text))
        }
    }
}
