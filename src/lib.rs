//! Asterisk Manager Interface (AMI) message handling and AsyncAGI for Rust
//!
//! This crate decodes AMI message blocks, folds multi-event action replies
//! into a single response, and drives AsyncAGI sessions over the manager
//! connection.
//!
//! # Architecture
//!
//! The socket itself is not handled here. A connection implements
//! [`Transport`]: it sends [`Action`]s, returns their immediate [`Response`]
//! and dispatches every inbound event to its [`EventListeners`].
//! - [`DecodedMessage`]: one `Key: Value` block, with per-channel variables
//! - [`ComplexResponse`]: a response plus the event list it announced
//! - [`AsyncAgiChannel`]: send AGI commands and await their results
//!
//! # Examples
//!
//! ## Decoding
//!
//! ```rust
//! use asterisk_ami_tokio::DecodedMessage;
//!
//! let raw = "Event: Newchannel\r\n\
//!            Channel: SIP/100-00000001\r\n\
//!            ChanVariable(SIP/100-00000001): FOO=bar\r\n";
//! let msg = DecodedMessage::decode(raw).unwrap();
//! assert_eq!(msg.event_name(), Some("Newchannel"));
//! assert_eq!(msg.channel_variable(None, "foo"), Some("bar"));
//! ```
//!
//! ## Actions
//!
//! ```rust
//! use asterisk_ami_tokio::{Action, Response};
//!
//! let action = Action::new("Status").unwrap().with_action_id("7").unwrap();
//! assert!(action.to_wire_format().ends_with("\r\n\r\n"));
//!
//! let resp = Response::decode("Response: Success\r\nActionID: 7\r\nEventList: start\r\n").unwrap();
//! assert!(resp.starts_event_list());
//! ```
//!
//! ## Listing actions
//!
//! ```rust,no_run
//! use std::time::Duration;
//! use asterisk_ami_tokio::{collect_response, Action, AmiResult, Transport};
//!
//! async fn peers<T: Transport>(transport: &T) -> AmiResult<usize> {
//!     let action = Action::new("SIPpeers")?;
//!     let complex = collect_response(transport, action, Duration::from_secs(10)).await?;
//!     Ok(complex.events().len())
//! }
//! ```
//!
//! ## AGI results
//!
//! ```rust
//! use asterisk_ami_tokio::AgiResult;
//!
//! let r = AgiResult::parse("200 result=1 (dtmf)").unwrap();
//! assert_eq!(r.result_int(), Some(1));
//! ```

#[macro_use]
mod macros;

pub mod action;
pub mod agi;
pub mod async_agi;
pub mod channel;
pub mod constants;
pub mod error;
pub mod event;
pub mod headers;
pub mod message;
pub mod protocol;
pub mod response;
pub mod transport;
pub mod variables;

pub use action::{Action, Response, ResponseStatus};
pub use agi::{AgiCommand, AgiEnvironment, AgiResult};
pub use async_agi::{AgiChannelOptions, AsyncAgiChannel};
pub use channel::{ChannelState, ParseChannelStateError};
pub use error::{AmiError, AmiResult};
pub use event::{AmiEvent, AsyncAgiPhase, EventType, ParseEventTypeError};
pub use headers::{MessageKey, ParseMessageKeyError};
pub use message::DecodedMessage;
pub use protocol::{AmiMessage, MessageType};
pub use response::{ComplexResponse, Table};
pub use transport::{
    collect_response, EventListeners, EventStream, ListenerId, ListenerOptions, Transport,
};
pub use variables::{VariableBuckets, VariableMap};
