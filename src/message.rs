//! Decoding of raw AMI blocks into structured messages
//!
//! A block is a run of `Key: Value` lines. Three kinds of line are told
//! apart by their key:
//!
//! - `ChanVariable(<channel>): name=value` feeds the channel variable maps,
//! - `Variable(<channel>): name=value` feeds the status variable maps,
//! - anything else is a plain field.
//!
//! ```
//! use asterisk_ami_tokio::DecodedMessage;
//!
//! let raw = "Event: Newchannel\r\nChannel: SIP/100-0001\r\nChanVariable: lang=en\r\n";
//! let msg = DecodedMessage::decode(raw).unwrap();
//! assert_eq!(msg.key("event"), Some("Newchannel"));
//! assert_eq!(msg.channel_variable(None, "lang"), Some("en"));
//! ```

use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use tracing::trace;

use crate::channel::ChannelState;
use crate::constants::{CHANNEL_VARIABLE_PREFIX, DEFAULT_CHANNEL, STATUS_VARIABLE_PREFIX};
use crate::error::{AmiError, AmiResult};
use crate::headers::MessageKey;
use crate::variables::{VariableBuckets, VariableMap};

/// Classification of a single decoded line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LineKind<'a> {
    Plain,
    ChannelVariable { channel: &'a str },
    StatusVariable { channel: &'a str },
}

impl<'a> LineKind<'a> {
    /// `name` must already be lower-cased.
    fn classify(name: &'a str) -> Self {
        if name.starts_with(CHANNEL_VARIABLE_PREFIX) {
            LineKind::ChannelVariable {
                channel: qualifier(name).unwrap_or(DEFAULT_CHANNEL),
            }
        } else if name.starts_with(STATUS_VARIABLE_PREFIX) {
            LineKind::StatusVariable {
                channel: qualifier(name).unwrap_or(DEFAULT_CHANNEL),
            }
        } else {
            LineKind::Plain
        }
    }
}

/// Text between the first `(` and the next `)` of a key name.
fn qualifier(name: &str) -> Option<&str> {
    let open = name.find('(')?;
    let rest = &name[open + 1..];
    let close = rest.find(')')?;
    Some(&rest[..close])
}

/// Split `name=value`, keeping any further `=` in the value.
fn split_assignment(value: &str) -> (&str, &str) {
    match value.split_once('=') {
        Some((name, value)) => (name.trim(), value.trim()),
        None => (value.trim(), ""),
    }
}

/// A fully decoded AMI block.
///
/// Built in one step by [`decode`](Self::decode); nothing is exposed until
/// every line has been processed and the `default` variable buckets have been
/// bound to the message's own channel.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DecodedMessage {
    fields: HashMap<String, String>,
    channel_variables: VariableBuckets,
    status_variables: VariableBuckets,
    raw_content: String,
}

impl DecodedMessage {
    /// Decode a raw block.
    ///
    /// Lines are separated by CRLF; a bare LF is accepted as well. Fails with
    /// [`AmiError::MalformedMessage`] on a non-blank line without a colon, or
    /// when a plain key appears twice.
    pub fn decode(raw: &str) -> AmiResult<Self> {
        let mut fields: HashMap<String, String> = HashMap::new();
        let mut variable_keys: HashSet<String> = HashSet::new();
        let mut channel_variables = VariableBuckets::new();
        let mut status_variables = VariableBuckets::new();

        for line in raw.split('\n') {
            let line = line.trim_end_matches('\r');
            if line
                .trim()
                .is_empty()
            {
                continue;
            }

            let (name, value) = line
                .split_once(':')
                .ok_or_else(|| AmiError::malformed(format!("line without colon: '{line}'"), raw))?;
            let name = name
                .trim()
                .to_lowercase();
            let value = value.trim();

            let (alias, buckets, channel) = match LineKind::classify(&name) {
                LineKind::Plain => {
                    if fields.contains_key(&name) && !variable_keys.contains(&name) {
                        return Err(AmiError::malformed(format!("duplicate key '{name}'"), raw));
                    }
                    variable_keys.remove(&name);
                    fields.insert(name.clone(), value.to_string());
                    continue;
                }
                LineKind::ChannelVariable { channel } => {
                    (CHANNEL_VARIABLE_PREFIX, &mut channel_variables, channel)
                }
                LineKind::StatusVariable { channel } => {
                    (STATUS_VARIABLE_PREFIX, &mut status_variables, channel)
                }
            };

            let (var_name, var_value) = split_assignment(value);
            buckets.insert(channel, var_name, var_value);
            set_variable_field(&mut fields, &mut variable_keys, alias, var_name);
            set_variable_field(
                &mut fields,
                &mut variable_keys,
                &var_name.to_lowercase(),
                var_value,
            );
        }

        if let Some(channel) = fields.get(MessageKey::Channel.field_name().as_str()) {
            channel_variables.fold_default_into(channel);
            status_variables.fold_default_into(channel);
        }

        trace!("[DECODE] {} fields", fields.len());
        Ok(Self {
            fields,
            channel_variables,
            status_variables,
            raw_content: raw.to_string(),
        })
    }

    /// Look up a field (case-insensitive).
    pub fn key(&self, name: impl AsRef<str>) -> Option<&str> {
        self.fields
            .get(
                &name
                    .as_ref()
                    .to_lowercase(),
            )
            .map(|s| s.as_str())
    }

    /// All plain fields, keyed by lower-cased name.
    pub fn keys(&self) -> &HashMap<String, String> {
        &self.fields
    }

    /// `EventList` value: `start` on the response opening a list,
    /// `Complete` on the event closing it.
    pub fn event_list(&self) -> Option<&str> {
        self.key(MessageKey::EventList)
    }

    /// `Event` value, if this block is an event.
    pub fn event_name(&self) -> Option<&str> {
        self.key(MessageKey::Event)
    }

    /// `ActionID` value.
    pub fn action_id(&self) -> Option<&str> {
        self.key(MessageKey::ActionId)
    }

    /// `Channel` value.
    pub fn channel(&self) -> Option<&str> {
        self.key(MessageKey::Channel)
    }

    /// The block exactly as received.
    pub fn raw_content(&self) -> &str {
        &self.raw_content
    }

    /// Typed channel state from `ChannelState`, falling back to `ChannelStateDesc`.
    pub fn channel_state(&self) -> Option<ChannelState> {
        self.key(MessageKey::ChannelState)
            .and_then(|s| s.parse().ok())
            .or_else(|| {
                self.key(MessageKey::ChannelStateDesc)?
                    .parse()
                    .ok()
            })
    }

    /// Channel variables of every reported channel.
    pub fn all_channel_variables(&self) -> &VariableBuckets {
        &self.channel_variables
    }

    /// Channel variables of `channel`, or of this message's own channel when
    /// `None` (the `default` bucket if the message has no `Channel` key).
    pub fn channel_variables(&self, channel: Option<&str>) -> Option<&VariableMap> {
        self.channel_variables
            .get(self.resolve_channel(channel))
    }

    /// One channel variable; see [`channel_variables`](Self::channel_variables).
    pub fn channel_variable(&self, channel: Option<&str>, name: &str) -> Option<&str> {
        self.channel_variables
            .variable(self.resolve_channel(channel), name)
    }

    /// Status variables of every reported channel.
    pub fn all_status_variables(&self) -> &VariableBuckets {
        &self.status_variables
    }

    /// Status variables of `channel`; same channel resolution as
    /// [`channel_variables`](Self::channel_variables).
    pub fn status_variables(&self, channel: Option<&str>) -> Option<&VariableMap> {
        self.status_variables
            .get(self.resolve_channel(channel))
    }

    /// One status variable.
    pub fn status_variable(&self, channel: Option<&str>, name: &str) -> Option<&str> {
        self.status_variables
            .variable(self.resolve_channel(channel), name)
    }

    fn resolve_channel<'a>(&'a self, channel: Option<&'a str>) -> &'a str {
        channel
            .or_else(|| self.channel())
            .unwrap_or(DEFAULT_CHANNEL)
    }
}

/// Write a field derived from a variable line without clobbering a plain key.
fn set_variable_field(
    fields: &mut HashMap<String, String>,
    variable_keys: &mut HashSet<String>,
    name: &str,
    value: &str,
) {
    if fields.contains_key(name) && !variable_keys.contains(name) {
        return;
    }
    variable_keys.insert(name.to_string());
    fields.insert(name.to_string(), value.to_string());
}
