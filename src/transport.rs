//! Transport seam and event listener registry
//!
//! The socket side of a manager connection (framing, login, reconnects) lives
//! outside this crate. It plugs in through [`Transport`]: send an action and
//! get its immediate [`Response`], and expose the [`EventListeners`] registry
//! that every inbound event is dispatched to, in delivery order.

use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::task::{Context, Poll};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::timeout;
use tracing::{debug, trace, warn};

use crate::{
    action::{Action, Response},
    constants::MAX_EVENT_QUEUE_SIZE,
    error::{AmiError, AmiResult},
    event::AmiEvent,
    protocol::AmiMessage,
    response::ComplexResponse,
};

/// A manager connection as seen by this crate.
pub trait Transport: Send + Sync {
    /// Send an action and wait for its immediate `Response`.
    fn send_action(&self, action: Action) -> impl Future<Output = AmiResult<Response>> + Send;

    /// Registry receiving every inbound event of this connection.
    fn listeners(&self) -> &EventListeners;
}

/// Handle returned by [`EventListeners::register`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

type ListenerFn = Arc<dyn Fn(&AmiEvent) + Send + Sync>;

#[derive(Default)]
struct Registry {
    next_id: AtomicU64,
    listeners: Mutex<Vec<(ListenerId, ListenerFn)>>,
}

/// Listeners registered on one connection (Clone + Send, shared).
#[derive(Clone, Default)]
pub struct EventListeners {
    registry: Arc<Registry>,
}

impl std::fmt::Debug for EventListeners {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventListeners")
            .field("count", &self.len())
            .finish()
    }
}

impl EventListeners {
    /// Empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a callback invoked for every dispatched event.
    pub fn register<F>(&self, listener: F) -> ListenerId
    where
        F: Fn(&AmiEvent) + Send + Sync + 'static,
    {
        let id = ListenerId(
            self.registry
                .next_id
                .fetch_add(1, Ordering::Relaxed),
        );
        self.lock()
            .push((id, Arc::new(listener)));
        trace!("[LISTENER] registered {:?}", id);
        id
    }

    /// Remove a listener. Returns `false` if it was not registered.
    pub fn unregister(&self, id: ListenerId) -> bool {
        let mut listeners = self.lock();
        let before = listeners.len();
        listeners.retain(|(lid, _)| *lid != id);
        let removed = listeners.len() != before;
        if removed {
            trace!("[LISTENER] unregistered {:?}", id);
        }
        removed
    }

    /// Deliver `event` to every listener, in registration order.
    ///
    /// Listeners run outside the registry lock, so they may register or
    /// unregister listeners themselves.
    pub fn dispatch(&self, event: &AmiEvent) {
        let snapshot: Vec<ListenerFn> = self
            .lock()
            .iter()
            .map(|(_, f)| f.clone())
            .collect();
        trace!(
            "[DISPATCH] {} to {} listeners",
            event.name(),
            snapshot.len()
        );
        for listener in snapshot {
            listener(event);
        }
    }

    /// Decode a raw block and dispatch it.
    ///
    /// Action replies are not events and fail with
    /// [`AmiError::UnexpectedEvent`]; blocks with neither key are dispatched
    /// as unnamed events.
    pub fn dispatch_raw(&self, raw: &str) -> AmiResult<()> {
        let event = match AmiMessage::decode(raw)? {
            AmiMessage::Event(event) => event,
            AmiMessage::Unknown(message) => AmiEvent::from_message(message),
            AmiMessage::Response(_) => {
                return Err(AmiError::UnexpectedEvent {
                    expected: "Event",
                    got: "Response".to_string(),
                })
            }
        };
        self.dispatch(&event);
        Ok(())
    }

    /// Number of registered listeners.
    pub fn len(&self) -> usize {
        self.lock()
            .len()
    }

    /// Whether no listener is registered.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Register a queue-backed listener and return its receiving end.
    ///
    /// The listener is removed when the stream is dropped.
    pub fn subscribe(&self, options: ListenerOptions) -> EventStream {
        let (tx, rx) = mpsc::channel(
            options
                .event_queue_size
                .max(1),
        );
        let shared = Arc::new(StreamState::default());
        let state = shared.clone();
        let id = self.register(move |event| dispatch_event(&tx, &state, event));
        EventStream {
            rx,
            shared,
            listeners: self.clone(),
            id,
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Vec<(ListenerId, ListenerFn)>> {
        self.registry
            .listeners
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }
}

/// Options for queue-backed listeners.
#[derive(Debug, Clone)]
pub struct ListenerOptions {
    /// Capacity of the mpsc channel delivering events. Default: 1000.
    pub event_queue_size: usize,
}

impl Default for ListenerOptions {
    fn default() -> Self {
        Self {
            event_queue_size: MAX_EVENT_QUEUE_SIZE,
        }
    }
}

#[derive(Default)]
struct StreamState {
    /// Set when events have been dropped due to a full queue
    overflow: AtomicBool,
    /// Total count of dropped events
    dropped: AtomicU64,
}

/// Try to queue an event via try_send.
///
/// If the channel is full, drop the event, set the overflow flag and
/// increment the dropped counter. Before each delivery, a pending overflow is
/// reported first as `Err(AmiError::QueueFull)`.
fn dispatch_event(
    tx: &mpsc::Sender<AmiResult<AmiEvent>>,
    state: &StreamState,
    event: &AmiEvent,
) {
    if state
        .overflow
        .load(Ordering::Relaxed)
    {
        match tx.try_send(Err(AmiError::QueueFull)) {
            Ok(()) => state
                .overflow
                .store(false, Ordering::Relaxed),
            Err(mpsc::error::TrySendError::Closed(_)) => return,
            Err(mpsc::error::TrySendError::Full(_)) => {}
        }
    }

    match tx.try_send(Ok(event.clone())) {
        Ok(()) | Err(mpsc::error::TrySendError::Closed(_)) => {}
        Err(mpsc::error::TrySendError::Full(_)) => {
            state
                .overflow
                .store(true, Ordering::Relaxed);
            state
                .dropped
                .fetch_add(1, Ordering::Relaxed);
            warn!("Event queue full, dropping event");
        }
    }
}

/// Queue-backed listener (!Clone).
///
/// Events are delivered as `AmiResult<AmiEvent>`. An `Err(AmiError::QueueFull)`
/// reports that events were dropped because the consumer fell behind; see
/// [`dropped_event_count`](Self::dropped_event_count).
pub struct EventStream {
    rx: mpsc::Receiver<AmiResult<AmiEvent>>,
    shared: Arc<StreamState>,
    listeners: EventListeners,
    id: ListenerId,
}

impl std::fmt::Debug for EventStream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventStream")
            .field("id", &self.id)
            .field("dropped", &self.dropped_event_count())
            .finish()
    }
}

impl EventStream {
    /// Receive the next event, or `None` once the stream can never yield again.
    pub async fn recv(&mut self) -> Option<AmiResult<AmiEvent>> {
        self.rx
            .recv()
            .await
    }

    /// Number of events dropped due to a full queue.
    pub fn dropped_event_count(&self) -> u64 {
        self.shared
            .dropped
            .load(Ordering::Relaxed)
    }
}

impl Drop for EventStream {
    fn drop(&mut self) {
        self.listeners
            .unregister(self.id);
    }
}

impl futures_util::Stream for EventStream {
    type Item = AmiResult<AmiEvent>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.rx
            .poll_recv(cx)
    }
}

/// Send a listing action and collect its events into a [`ComplexResponse`].
///
/// An `ActionID` is generated when the action has none. Events are matched
/// by `ActionID` and folded until the response completes or `deadline`
/// expires ([`AmiError::CommandTimeout`]). A reply that does not open an event
/// list is returned as-is, already complete only if the switch said so.
pub async fn collect_response<T: Transport>(
    transport: &T,
    action: Action,
    deadline: Duration,
) -> AmiResult<ComplexResponse> {
    let action = match action.action_id() {
        Some(_) => action,
        None => action.with_action_id(
            &uuid::Uuid::new_v4()
                .to_string(),
        )?,
    };
    let action_id = action
        .action_id()
        .unwrap_or_default()
        .to_string();

    let mut events = transport
        .listeners()
        .subscribe(ListenerOptions::default());

    debug!("Sending list action {} ({})", action.name(), action_id);
    let response = transport
        .send_action(action)
        .await?
        .into_result()?;
    if !response.starts_event_list() {
        return Ok(ComplexResponse::new(response));
    }

    let mut complex = ComplexResponse::new(response);
    let collect = async {
        while !complex.is_complete() {
            match events
                .recv()
                .await
            {
                Some(Ok(event)) if complex.accepts(&event) => complex.add_event(event)?,
                Some(Ok(_)) => {}
                Some(Err(e)) => return Err(e),
                None => return Err(AmiError::ConnectionClosed),
            }
        }
        Ok::<(), AmiError>(())
    };
    match timeout(deadline, collect).await {
        Ok(result) => result?,
        Err(_) => {
            return Err(AmiError::CommandTimeout {
                command_id: action_id,
                timeout: deadline,
            })
        }
    }
    Ok(complex)
}
