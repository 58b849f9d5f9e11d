//! Classification of decoded AMI blocks

use crate::{
    action::Response,
    error::AmiResult,
    event::AmiEvent,
    headers::MessageKey,
    message::DecodedMessage,
};

/// AMI message types
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageType {
    /// Reply to an action (`Response` key)
    Response,
    /// Asynchronous event (`Event` key)
    Event,
    /// Neither key present (e.g. the greeting banner or a stray block)
    Unknown,
}

impl MessageType {
    /// Classify by key presence. `Response` wins when both keys are present.
    pub fn of(message: &DecodedMessage) -> Self {
        if message
            .key(MessageKey::Response)
            .is_some()
        {
            MessageType::Response
        } else if message
            .key(MessageKey::Event)
            .is_some()
        {
            MessageType::Event
        } else {
            MessageType::Unknown
        }
    }
}

/// A decoded block, classified.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AmiMessage {
    /// Reply to an action
    Response(Response),
    /// Asynchronous event
    Event(AmiEvent),
    /// Anything else, kept as decoded
    Unknown(DecodedMessage),
}

impl AmiMessage {
    /// Decode and classify a raw block.
    ///
    /// ```
    /// use asterisk_ami_tokio::{AmiMessage, MessageType};
    ///
    /// let msg = AmiMessage::decode("Event: FullyBooted\r\nStatus: Fully Booted\r\n").unwrap();
    /// assert_eq!(msg.message_type(), MessageType::Event);
    /// ```
    pub fn decode(raw: &str) -> AmiResult<Self> {
        Ok(Self::from_message(DecodedMessage::decode(raw)?))
    }

    /// Classify an already decoded block.
    pub fn from_message(message: DecodedMessage) -> Self {
        match MessageType::of(&message) {
            MessageType::Response => AmiMessage::Response(Response::new(message)),
            MessageType::Event => AmiMessage::Event(AmiEvent::from_message(message)),
            MessageType::Unknown => AmiMessage::Unknown(message),
        }
    }

    /// Message type
    pub fn message_type(&self) -> MessageType {
        match self {
            AmiMessage::Response(_) => MessageType::Response,
            AmiMessage::Event(_) => MessageType::Event,
            AmiMessage::Unknown(_) => MessageType::Unknown,
        }
    }

    /// Underlying decoded block.
    pub fn message(&self) -> &DecodedMessage {
        match self {
            AmiMessage::Response(response) => response.message(),
            AmiMessage::Event(event) => event.message(),
            AmiMessage::Unknown(message) => message,
        }
    }

    /// `ActionID`, whatever the type.
    pub fn action_id(&self) -> Option<&str> {
        self.message()
            .action_id()
    }

    /// The event, if this is one.
    pub fn into_event(self) -> Option<AmiEvent> {
        match self {
            AmiMessage::Event(event) => Some(event),
            _ => None,
        }
    }

    /// The response, if this is one.
    pub fn into_response(self) -> Option<Response> {
        match self {
            AmiMessage::Response(response) => Some(response),
            _ => None,
        }
    }
}
