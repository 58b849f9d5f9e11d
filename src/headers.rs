//! Typed names for well-known AMI message keys.

/// Error returned when parsing an unrecognized message key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseMessageKeyError(pub String);

impl std::fmt::Display for ParseMessageKeyError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "unknown message key: {}", self.0)
    }
}

impl std::error::Error for ParseMessageKeyError {}

define_wire_enum! {
    error_type: ParseMessageKeyError,
    /// Keys the decoder and correlator rely on.
    ///
    /// Decoded fields are stored lower-cased, so any spelling works with
    /// [`DecodedMessage::key()`](crate::DecodedMessage::key); this enum only
    /// fixes the canonical wire spelling used when building actions.
    pub enum MessageKey {
        Action => "Action",
        ActionId => "ActionID",
        Response => "Response",
        Message => "Message",
        Event => "Event",
        EventList => "EventList",
        ListItems => "ListItems",
        Channel => "Channel",
        ChannelState => "ChannelState",
        ChannelStateDesc => "ChannelStateDesc",
        Uniqueid => "Uniqueid",
        TableName => "TableName",
        Json => "JSON",
        Command => "Command",
        CommandId => "CommandID",
        SubEvent => "SubEvent",
        Result => "Result",
        Env => "Env",
        Privilege => "Privilege",
    }
}

impl MessageKey {
    /// Lower-cased spelling, as stored in [`DecodedMessage`](crate::DecodedMessage) fields.
    pub fn field_name(&self) -> String {
        self.as_str()
            .to_ascii_lowercase()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_uses_wire_spelling() {
        assert_eq!(MessageKey::ActionId.to_string(), "ActionID");
        assert_eq!(MessageKey::CommandId.to_string(), "CommandID");
        assert_eq!(MessageKey::Json.to_string(), "JSON");
    }

    #[test]
    fn field_name_is_lower_case() {
        assert_eq!(MessageKey::EventList.field_name(), "eventlist");
        assert_eq!(MessageKey::Json.field_name(), "json");
    }

    #[test]
    fn from_str_case_insensitive() {
        assert_eq!("actionid".parse::<MessageKey>(), Ok(MessageKey::ActionId));
        assert_eq!("ACTIONID".parse::<MessageKey>(), Ok(MessageKey::ActionId));
        assert_eq!(" EventList ".parse::<MessageKey>(), Ok(MessageKey::EventList));
    }

    #[test]
    fn from_str_unknown() {
        let err = "X-Not-A-Key"
            .parse::<MessageKey>()
            .unwrap_err();
        assert_eq!(err.to_string(), "unknown message key: X-Not-A-Key");
    }

    #[test]
    fn every_variant_parses_back() {
        for key in MessageKey::ALL {
            let wire = key.to_string();
            assert_eq!(wire.parse::<MessageKey>(), Ok(*key), "round-trip failed for {wire}");
        }
    }
}
