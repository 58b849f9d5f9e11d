//! AsyncAGI command channel
//!
//! An [`AsyncAgiChannel`] is opened from the `AsyncAGIStart` event a channel
//! emits when it enters `AGI(agi:async)`. Each [`send`](AsyncAgiChannel::send)
//! queues one AGI command through an `AGI` manager action and waits for the
//! `AsyncAGIExec` event carrying the same `CommandID`.
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use asterisk_ami_tokio::{AgiChannelOptions, AmiEvent, AmiResult, AsyncAgiChannel, Transport};
//!
//! async fn greet<T: Transport>(transport: Arc<T>, start: &AmiEvent) -> AmiResult<()> {
//!     let agi = AsyncAgiChannel::open(transport, start, AgiChannelOptions::default())?;
//!     agi.answer().await?;
//!     agi.stream_file("hello-world", "").await?;
//!     agi.hangup().await?;
//!     Ok(())
//! }
//! ```

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::sync::oneshot;
use tokio::time::timeout;
use tracing::{debug, trace, warn};

use crate::{
    action::Action,
    agi::{AgiCommand, AgiEnvironment, AgiResult},
    constants::DEFAULT_COMMAND_TIMEOUT_MS,
    error::{AmiError, AmiResult},
    event::{AmiEvent, AsyncAgiPhase},
    transport::{ListenerId, Transport},
};

/// Options for [`AsyncAgiChannel::open`].
#[derive(Debug, Clone)]
pub struct AgiChannelOptions {
    /// How long `send` waits for the result event. `None` waits forever.
    /// Default: 30 seconds.
    pub command_timeout: Option<Duration>,
}

impl Default for AgiChannelOptions {
    fn default() -> Self {
        Self {
            command_timeout: Some(Duration::from_millis(DEFAULT_COMMAND_TIMEOUT_MS)),
        }
    }
}

struct PendingCommand {
    command_id: String,
    reply: oneshot::Sender<AmiResult<String>>,
}

/// State shared between the channel and its event listener.
struct ChannelShared {
    channel: String,
    pending: Mutex<Option<PendingCommand>>,
}

impl ChannelShared {
    fn lock_pending(&self) -> MutexGuard<'_, Option<PendingCommand>> {
        self.pending
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    /// Clear the slot if it still belongs to `command_id`.
    fn clear_pending(&self, command_id: &str) {
        let mut pending = self.lock_pending();
        if pending
            .as_ref()
            .is_some_and(|p| p.command_id == command_id)
        {
            pending.take();
        }
    }

    fn handle_event(&self, event: &AmiEvent) {
        match event.async_agi_phase() {
            Some(AsyncAgiPhase::Exec) => {
                let Some(command_id) = event.command_id() else {
                    return;
                };
                let completed = {
                    let mut pending = self.lock_pending();
                    if pending
                        .as_ref()
                        .is_some_and(|p| p.command_id == command_id)
                    {
                        pending.take()
                    } else {
                        None
                    }
                };
                match completed {
                    Some(command) => {
                        let result = event
                            .agi_result()
                            .unwrap_or_default()
                            .trim()
                            .to_string();
                        trace!("[AGI] {} result for {}: {}", self.channel, command_id, result);
                        let _ = command
                            .reply
                            .send(Ok(result));
                    }
                    None => trace!("[AGI] {} ignoring result for {}", self.channel, command_id),
                }
            }
            Some(AsyncAgiPhase::End) if event.channel() == Some(self.channel.as_str()) => {
                let pending = self
                    .lock_pending()
                    .take();
                if let Some(command) = pending {
                    warn!(
                        "[AGI] {} ended while command {} was pending",
                        self.channel, command.command_id
                    );
                    let _ = command
                        .reply
                        .send(Err(AmiError::ChannelUnavailable(format!(
                            "AsyncAGI ended on {}",
                            self.channel
                        ))));
                }
            }
            _ => {}
        }
    }
}

/// Command channel to one AsyncAGI session.
///
/// Commands are serialized: a second `send` waits until the first one has its
/// result. Dropping the channel closes it.
pub struct AsyncAgiChannel<T: Transport> {
    transport: Arc<T>,
    shared: Arc<ChannelShared>,
    environment: AgiEnvironment,
    listener: ListenerId,
    send_lock: tokio::sync::Mutex<()>,
    /// Zero means no timeout.
    command_timeout_ms: AtomicU64,
    closed: AtomicBool,
}

impl<T: Transport> std::fmt::Debug for AsyncAgiChannel<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AsyncAgiChannel")
            .field("channel", &self.shared.channel)
            .field("closed", &self.is_closed())
            .finish()
    }
}

fn timeout_to_ms(timeout: Option<Duration>) -> u64 {
    match timeout {
        Some(d) => (d.as_millis() as u64).max(1),
        None => 0,
    }
}

impl<T: Transport> AsyncAgiChannel<T> {
    /// Open a channel from its `AsyncAGIStart` event.
    ///
    /// Fails with [`AmiError::UnexpectedEvent`] for any other event, and with
    /// [`AmiError::MalformedMessage`] when the event has no `Channel`.
    pub fn open(transport: Arc<T>, start: &AmiEvent, options: AgiChannelOptions) -> AmiResult<Self> {
        if start.async_agi_phase() != Some(AsyncAgiPhase::Start) {
            return Err(AmiError::UnexpectedEvent {
                expected: "AsyncAGIStart",
                got: start
                    .name()
                    .to_string(),
            });
        }
        let channel = start
            .channel()
            .ok_or_else(|| {
                AmiError::malformed(
                    "AsyncAGIStart without Channel",
                    start
                        .message()
                        .raw_content(),
                )
            })?
            .to_string();
        let environment = AgiEnvironment::parse(
            &start
                .agi_env()
                .unwrap_or_default(),
        );

        let shared = Arc::new(ChannelShared {
            channel,
            pending: Mutex::new(None),
        });
        let handler = shared.clone();
        let listener = transport
            .listeners()
            .register(move |event| handler.handle_event(event));
        debug!("[AGI] opened AsyncAGI channel {}", shared.channel);

        Ok(Self {
            transport,
            shared,
            environment,
            listener,
            send_lock: tokio::sync::Mutex::new(()),
            command_timeout_ms: AtomicU64::new(timeout_to_ms(options.command_timeout)),
            closed: AtomicBool::new(false),
        })
    }

    /// Originating channel name.
    pub fn channel(&self) -> &str {
        &self.shared.channel
    }

    /// Environment announced by the start event.
    pub fn environment(&self) -> &AgiEnvironment {
        &self.environment
    }

    /// Whether [`close`](Self::close) has run.
    pub fn is_closed(&self) -> bool {
        self.closed
            .load(Ordering::Acquire)
    }

    /// Change the result timeout. `None` waits forever.
    pub fn set_command_timeout(&self, timeout: Option<Duration>) {
        self.command_timeout_ms
            .store(timeout_to_ms(timeout), Ordering::Relaxed);
    }

    /// Current result timeout.
    pub fn command_timeout(&self) -> Option<Duration> {
        match self
            .command_timeout_ms
            .load(Ordering::Relaxed)
        {
            0 => None,
            ms => Some(Duration::from_millis(ms)),
        }
    }

    /// Send a raw AGI command line and wait for its result.
    ///
    /// Errors:
    /// - [`AmiError::ChannelClosed`] after [`close`](Self::close)
    /// - [`AmiError::ChannelUnavailable`] when the `AGI` action is rejected,
    ///   the session ends, or AGI answers 511
    /// - [`AmiError::CommandTimeout`] when no result arrives in time
    /// - [`AmiError::InvalidCommand`] for AGI status 510 or 520
    pub async fn send(&self, command: &str) -> AmiResult<AgiResult> {
        if self.is_closed() {
            return Err(AmiError::ChannelClosed(self.shared.channel.clone()));
        }

        // Held through the result, one command in flight per channel.
        let _guard = self
            .send_lock
            .lock()
            .await;

        let channel = self.shared.channel.as_str();
        let command_id = uuid::Uuid::new_v4().to_string();
        let action = Action::agi(channel, command, &command_id)?;

        // Slot goes in before the action so a fast result cannot be missed.
        let rx = self.install_pending(&command_id)?;

        debug!("[AGI] {} sending {} ({})", channel, command, command_id);
        let response = match self
            .transport
            .send_action(action)
            .await
        {
            Ok(response) => response,
            Err(e) => {
                self.shared
                    .clear_pending(&command_id);
                return Err(e);
            }
        };
        if !response.is_success() {
            self.shared
                .clear_pending(&command_id);
            let reason = response
                .message_text()
                .unwrap_or("AGI action rejected")
                .to_string();
            debug!("[AGI] {} action rejected: {}", channel, reason);
            return Err(AmiError::ChannelUnavailable(reason));
        }

        let timeout_ms = self
            .command_timeout_ms
            .load(Ordering::Relaxed);
        let outcome = if timeout_ms == 0 {
            rx.await
        } else {
            match timeout(Duration::from_millis(timeout_ms), rx).await {
                Ok(outcome) => outcome,
                Err(_) => {
                    self.shared
                        .clear_pending(&command_id);
                    warn!("[AGI] {} command {} timed out", channel, command_id);
                    return Err(AmiError::CommandTimeout {
                        command_id,
                        timeout: Duration::from_millis(timeout_ms),
                    });
                }
            }
        };

        let text = match outcome {
            Ok(result) => result?,
            Err(_) => return Err(AmiError::ChannelClosed(channel.to_string())),
        };
        AgiResult::parse(&text)
    }

    /// Install the pending slot for `command_id` unless the channel is closed.
    fn install_pending(&self, command_id: &str) -> AmiResult<oneshot::Receiver<AmiResult<String>>> {
        let mut pending = self
            .shared
            .lock_pending();
        if self.is_closed() {
            return Err(AmiError::ChannelClosed(self.shared.channel.clone()));
        }
        let (tx, rx) = oneshot::channel();
        *pending = Some(PendingCommand {
            command_id: command_id.to_string(),
            reply: tx,
        });
        Ok(rx)
    }

    /// Send a typed AGI command.
    pub async fn send_command(&self, command: &AgiCommand) -> AmiResult<AgiResult> {
        self.send(&command.to_wire_format()?)
            .await
    }

    /// `ASYNCAGI BREAK`: leave AsyncAGI and resume the dialplan.
    pub async fn async_break(&self) -> AmiResult<AgiResult> {
        self.send_command(&AgiCommand::AsyncBreak)
            .await
    }

    /// `ANSWER`
    pub async fn answer(&self) -> AmiResult<AgiResult> {
        self.send_command(&AgiCommand::Answer)
            .await
    }

    /// `HANGUP` the originating channel.
    pub async fn hangup(&self) -> AmiResult<AgiResult> {
        self.send_command(&AgiCommand::Hangup { channel: None })
            .await
    }

    /// `EXEC` a dialplan application.
    pub async fn exec(&self, application: &str, options: &str) -> AmiResult<AgiResult> {
        self.send_command(&AgiCommand::Exec {
            application: application.to_string(),
            options: options.to_string(),
        })
        .await
    }

    /// `GET VARIABLE`, `None` when the variable is not set.
    pub async fn get_variable(&self, name: &str) -> AmiResult<Option<String>> {
        let result = self
            .send_command(&AgiCommand::GetVariable {
                name: name.to_string(),
            })
            .await?;
        if result.result_int() == Some(1) {
            Ok(result
                .data()
                .map(str::to_string))
        } else {
            Ok(None)
        }
    }

    /// `SET VARIABLE`
    pub async fn set_variable(&self, name: &str, value: &str) -> AmiResult<AgiResult> {
        self.send_command(&AgiCommand::SetVariable {
            name: name.to_string(),
            value: value.to_string(),
        })
        .await
    }

    /// `STREAM FILE`, interruptible by any of `escape_digits`.
    pub async fn stream_file(&self, file: &str, escape_digits: &str) -> AmiResult<AgiResult> {
        self.send_command(&AgiCommand::StreamFile {
            file: file.to_string(),
            escape_digits: escape_digits.to_string(),
        })
        .await
    }

    /// `VERBOSE` message to the Asterisk console.
    pub async fn verbose(&self, message: &str, level: u8) -> AmiResult<AgiResult> {
        self.send_command(&AgiCommand::Verbose {
            message: message.to_string(),
            level,
        })
        .await
    }

    /// `NOOP`
    pub async fn noop(&self) -> AmiResult<AgiResult> {
        self.send_command(&AgiCommand::Noop)
            .await
    }

    /// Stop listening for events. Idempotent.
    ///
    /// A command still waiting for its result fails with
    /// [`AmiError::ChannelClosed`].
    pub fn close(&self) {
        {
            // Same lock as install_pending, so no slot survives a close.
            let mut pending = self
                .shared
                .lock_pending();
            if self
                .closed
                .swap(true, Ordering::AcqRel)
            {
                return;
            }
            pending.take();
        }
        self.transport
            .listeners()
            .unregister(self.listener);
        debug!("[AGI] closed AsyncAGI channel {}", self.shared.channel);
    }
}

impl<T: Transport> Drop for AsyncAgiChannel<T> {
    fn drop(&mut self) {
        self.close();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::action::Response;
    use crate::transport::EventListeners;
    use std::future::Future;

    const START: &str = "Event: AsyncAGIStart\r\n\
                         Channel: SIP/100-00000001\r\n\
                         Env: agi_request%3A%20async%0Aagi_channel%3A%20SIP%2F100-00000001%0Aagi_callerid%3A%20100%0A%0A\r\n";

    type Responder = Box<dyn Fn(&Action, &EventListeners) -> Response + Send + Sync>;

    struct MockTransport {
        listeners: EventListeners,
        sent: Mutex<Vec<Action>>,
        responder: Responder,
    }

    impl MockTransport {
        fn new<F>(responder: F) -> Arc<Self>
        where
            F: Fn(&Action, &EventListeners) -> Response + Send + Sync + 'static,
        {
            Arc::new(Self {
                listeners: EventListeners::new(),
                sent: Mutex::new(Vec::new()),
                responder: Box::new(responder),
            })
        }

        /// Accepts every action and answers with `result`.
        fn replying(result: &'static str) -> Arc<Self> {
            Self::new(move |action, listeners| {
                let id = action
                    .get("CommandID")
                    .unwrap();
                listeners
                    .dispatch_raw(&format!(
                        "Event: AsyncAGIExec\r\nChannel: SIP/100-00000001\r\nCommandID: {id}\r\nResult: {result}\r\n"
                    ))
                    .unwrap();
                success()
            })
        }
    }

    fn success() -> Response {
        Response::decode("Response: Success\r\nMessage: Added AGI command to queue\r\n").unwrap()
    }

    impl Transport for MockTransport {
        fn send_action(&self, action: Action) -> impl Future<Output = AmiResult<Response>> + Send {
            let response = (self.responder)(&action, &self.listeners);
            self.sent
                .lock()
                .unwrap()
                .push(action);
            std::future::ready(Ok(response))
        }

        fn listeners(&self) -> &EventListeners {
            &self.listeners
        }
    }

    fn open(transport: &Arc<MockTransport>) -> AsyncAgiChannel<MockTransport> {
        let start = AmiEvent::decode(START).unwrap();
        AsyncAgiChannel::open(transport.clone(), &start, AgiChannelOptions::default()).unwrap()
    }

    #[test]
    fn test_open_parses_environment() {
        let transport = MockTransport::replying("200%20result%3D0");
        let agi = open(&transport);
        assert_eq!(agi.channel(), "SIP/100-00000001");
        assert_eq!(agi.environment().request(), Some("async"));
        assert_eq!(agi.environment().caller_id(), Some("100"));
        assert_eq!(transport.listeners.len(), 1);
    }

    #[test]
    fn test_open_rejects_other_events() {
        let transport = MockTransport::replying("200");
        let event = AmiEvent::decode("Event: Hangup\r\nChannel: SIP/1\r\n").unwrap();
        let err = AsyncAgiChannel::open(transport, &event, AgiChannelOptions::default()).unwrap_err();
        assert!(matches!(err, AmiError::UnexpectedEvent { got, .. } if got == "Hangup"));
    }

    #[tokio::test]
    async fn test_send_returns_trimmed_result() {
        let transport = MockTransport::replying("%20200%20result%3D1%20(SIP%2F100)%0A");
        let agi = open(&transport);
        let result = agi
            .send("CHANNEL STATUS")
            .await
            .unwrap();
        assert_eq!(result.text(), "200 result=1 (SIP/100)");
        assert_eq!(result.data(), Some("SIP/100"));

        let sent = transport
            .sent
            .lock()
            .unwrap();
        assert_eq!(sent[0].name(), "AGI");
        assert_eq!(sent[0].get("Channel"), Some("SIP/100-00000001"));
        assert_eq!(sent[0].get("Command"), Some("CHANNEL STATUS"));
    }

    #[tokio::test]
    async fn test_command_ids_are_unique() {
        let transport = MockTransport::replying("200%20result%3D0");
        let agi = open(&transport);
        agi.noop()
            .await
            .unwrap();
        agi.noop()
            .await
            .unwrap();
        let sent = transport
            .sent
            .lock()
            .unwrap();
        assert_ne!(sent[0].get("CommandID"), sent[1].get("CommandID"));
    }

    #[tokio::test]
    async fn test_rejected_action_is_channel_unavailable() {
        let transport = MockTransport::new(|_, _| {
            Response::decode("Response: Error\r\nMessage: Channel does not exist.\r\n").unwrap()
        });
        let agi = open(&transport);
        let err = agi
            .answer()
            .await
            .unwrap_err();
        assert!(matches!(err, AmiError::ChannelUnavailable(msg) if msg == "Channel does not exist."));
        assert!(agi
            .shared
            .lock_pending()
            .is_none());
    }

    #[tokio::test]
    async fn test_unmatched_result_times_out() {
        let transport = MockTransport::new(|_, listeners| {
            listeners
                .dispatch_raw("Event: AsyncAGIExec\r\nCommandID: someone-else\r\nResult: 200%20result%3D1\r\n")
                .unwrap();
            success()
        });
        let agi = open(&transport);
        agi.set_command_timeout(Some(Duration::from_millis(50)));
        let err = agi
            .noop()
            .await
            .unwrap_err();
        assert!(matches!(err, AmiError::CommandTimeout { timeout, .. } if timeout == Duration::from_millis(50)));
        assert!(agi
            .shared
            .lock_pending()
            .is_none());
    }

    #[tokio::test]
    async fn test_session_end_fails_pending_command() {
        let transport = MockTransport::new(|_, listeners| {
            listeners
                .dispatch_raw("Event: AsyncAGIEnd\r\nChannel: SIP/100-00000001\r\n")
                .unwrap();
            success()
        });
        let agi = open(&transport);
        let err = agi
            .noop()
            .await
            .unwrap_err();
        assert!(matches!(err, AmiError::ChannelUnavailable(_)));
    }

    #[tokio::test]
    async fn test_dead_channel_status() {
        let transport = MockTransport::replying("511%20Command%20Not%20Permitted%20on%20a%20dead%20channel");
        let agi = open(&transport);
        let err = agi
            .answer()
            .await
            .unwrap_err();
        assert!(err.is_channel_down());
    }

    #[tokio::test]
    async fn test_get_variable() {
        let transport = MockTransport::replying("200%20result%3D1%20(bar)");
        let agi = open(&transport);
        assert_eq!(
            agi.get_variable("FOO")
                .await
                .unwrap()
                .as_deref(),
            Some("bar")
        );

        let transport = MockTransport::replying("200%20result%3D0");
        let agi = open(&transport);
        assert_eq!(
            agi.get_variable("FOO")
                .await
                .unwrap(),
            None
        );
    }

    #[tokio::test]
    async fn test_close_is_idempotent_and_blocks_send() {
        let transport = MockTransport::replying("200%20result%3D0");
        let agi = open(&transport);
        agi.close();
        agi.close();
        assert!(agi.is_closed());
        assert!(transport
            .listeners
            .is_empty());
        let err = agi
            .noop()
            .await
            .unwrap_err();
        assert!(matches!(err, AmiError::ChannelClosed(_)));
        assert!(transport
            .sent
            .lock()
            .unwrap()
            .is_empty());
    }

    #[test]
    fn test_no_slot_installed_after_close() {
        let transport = MockTransport::replying("200");
        let agi = open(&transport);
        agi.close();
        assert!(matches!(
            agi.install_pending("late"),
            Err(AmiError::ChannelClosed(_))
        ));
        assert!(agi
            .shared
            .lock_pending()
            .is_none());
    }

    #[tokio::test]
    async fn test_close_releases_installed_slot() {
        let transport = MockTransport::replying("200");
        let agi = open(&transport);
        let rx = agi
            .install_pending("cmd-1")
            .unwrap();
        agi.close();
        assert!(agi
            .shared
            .lock_pending()
            .is_none());
        assert!(rx.await.is_err());
    }

    #[test]
    fn test_drop_unregisters_listener() {
        let transport = MockTransport::replying("200");
        drop(open(&transport));
        assert!(transport
            .listeners
            .is_empty());
    }

    #[test]
    fn test_timeout_setting() {
        let transport = MockTransport::replying("200");
        let agi = open(&transport);
        assert_eq!(agi.command_timeout(), Some(Duration::from_secs(30)));
        agi.set_command_timeout(None);
        assert_eq!(agi.command_timeout(), None);
    }
}
