//! Protocol constants and configuration values

/// Line terminator used by the manager protocol.
pub const EOL: &str = "\r\n";

/// Key prefix for `ChanVariable(<channel>): name=value` lines.
pub const CHANNEL_VARIABLE_PREFIX: &str = "chanvariable";

/// Key prefix for `Variable(<channel>): name=value` lines.
pub const STATUS_VARIABLE_PREFIX: &str = "variable";

/// Bucket collecting variables not bound to a named channel.
pub const DEFAULT_CHANNEL: &str = "default";

/// Prefix stripped from AsyncAGI environment keys (`agi_channel` -> `channel`).
pub const AGI_ENV_PREFIX: &str = "agi_";

/// Command sent by [`AsyncAgiChannel::async_break`](crate::AsyncAgiChannel::async_break).
pub const ASYNCAGI_BREAK: &str = "ASYNCAGI BREAK";

/// Default wait for an AsyncAGI result, in milliseconds (30 seconds).
///
/// AGI commands such as `STREAM FILE` legitimately run for the length of a
/// prompt, so this is far above the typical action round-trip.
pub const DEFAULT_COMMAND_TIMEOUT_MS: u64 = 30_000;

/// Default capacity of an [`EventStream`](crate::EventStream) queue.
pub const MAX_EVENT_QUEUE_SIZE: usize = 1000;
