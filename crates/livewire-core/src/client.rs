// ── Event stream client ──
//
// Owns the connection session: one background task that reserves,
// opens a transport, dispatches frames, and on any failure sleeps
// according to the reconnect policy before trying again. Listeners
// register against the client and survive reconnects.

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use futures_util::StreamExt;
use tokio::runtime::Handle;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio_stream::wrappers::WatchStream;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use livewire_api::{
    ChangeEvent, Error, EventEndpoints, EventTransport, FrameStream, Frame, MessageEvent,
    Protocol, ReservationClient, ReservationSource, SseTransport, TransportConfig,
    WebSocketTransport,
};

use crate::config::StreamConfig;
use crate::error::CoreError;
use crate::filter::ChangeFilter;
use crate::listeners::{ListenerId, Registry};
use crate::policy::select_protocol;
use crate::subscription::EventSubscription;

// ── StreamState ──────────────────────────────────────────────────

/// Lifecycle of the client, observable via [`EventStreamClient::state`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamState {
    /// Constructed, never started.
    Idle,
    /// Reserving and opening `protocol`. `attempt` counts from 1 and
    /// resets once a transport delivers.
    Starting { attempt: u32, protocol: Protocol },
    /// Transport open, frames flowing.
    Started { protocol: Protocol },
    /// Attempt failed; the next one begins after `retry_in`.
    Failed { attempt: u32, retry_in: Duration },
    /// Stopped for good.
    Unmounted,
}

impl StreamState {
    pub fn is_started(&self) -> bool {
        matches!(self, Self::Started { .. })
    }
}

// ── EventStreamClient ────────────────────────────────────────────

/// Reconnecting client for the backend change-notification stream.
///
/// Cheaply cloneable via `Arc<ClientInner>`. Nothing happens until
/// [`start()`](Self::start); [`stop()`](Self::stop) is final.
#[derive(Clone)]
pub struct EventStreamClient {
    inner: Arc<ClientInner>,
}

struct ClientInner {
    config: StreamConfig,
    reservations: Box<dyn ReservationSource>,
    websocket: Box<dyn EventTransport>,
    sse: Box<dyn EventTransport>,
    changes: Arc<Registry<ChangeEvent>>,
    messages: Arc<Registry<MessageEvent>>,
    state: watch::Sender<StreamState>,
    session: Mutex<Option<JoinHandle<()>>>,
    cancel: CancellationToken,
    preferred: Mutex<Option<Protocol>>,
    retries: AtomicU32,
}

impl EventStreamClient {
    /// Assemble a client from its collaborators. Does NOT connect.
    pub fn new(
        config: StreamConfig,
        reservations: Box<dyn ReservationSource>,
        websocket: Box<dyn EventTransport>,
        sse: Box<dyn EventTransport>,
    ) -> Self {
        debug_assert_eq!(websocket.protocol(), Protocol::WebSocket, "websocket slot");
        debug_assert_eq!(sse.protocol(), Protocol::Sse, "sse slot");
        let (state, _) = watch::channel(StreamState::Idle);

        Self {
            inner: Arc::new(ClientInner {
                config,
                reservations,
                websocket,
                sse,
                changes: Arc::new(Registry::new("change")),
                messages: Arc::new(Registry::new("message")),
                state,
                session: Mutex::new(None),
                cancel: CancellationToken::new(),
                preferred: Mutex::new(None),
                retries: AtomicU32::new(0),
            }),
        }
    }

    /// Build a client talking HTTP/WebSocket/SSE to `endpoints`.
    pub fn connect_to(
        endpoints: EventEndpoints,
        transport: &TransportConfig,
        config: StreamConfig,
    ) -> Result<Self, CoreError> {
        let reservations = ReservationClient::new(endpoints.clone(), transport)?;
        let websocket = WebSocketTransport::new(endpoints.clone(), transport.clone());
        let sse = SseTransport::new(endpoints, transport)?;

        Ok(Self::new(
            config,
            Box::new(reservations),
            Box::new(websocket),
            Box::new(sse),
        ))
    }

    // ── Lifecycle ────────────────────────────────────────────────

    /// Spawn the session task on the current Tokio runtime.
    ///
    /// Returns `false` without side effects when a session is already
    /// live, the client was stopped, or there is no runtime to spawn on.
    pub fn start(&self) -> bool {
        if self.inner.cancel.is_cancelled() {
            debug!("start() after stop(); ignoring");
            return false;
        }

        let mut session = self.inner.session.lock().expect("session lock poisoned");
        if session.as_ref().is_some_and(|task| !task.is_finished()) {
            debug!("event stream already running");
            return false;
        }

        let Ok(runtime) = Handle::try_current() else {
            warn!("start() outside a Tokio runtime; not connecting");
            return false;
        };

        let inner = Arc::clone(&self.inner);
        *session = Some(runtime.spawn(run_session(inner)));
        true
    }

    /// Tear down: cancel the session (closing any live transport and
    /// pending retry), drop every listener, and enter `Unmounted`.
    ///
    /// No listener is invoked once this returns. A callback already
    /// running on another thread is left to finish.
    pub fn stop(&self) {
        self.inner.cancel.cancel();

        if let Some(task) = self
            .inner
            .session
            .lock()
            .expect("session lock poisoned")
            .take()
        {
            task.abort();
        }

        self.inner.changes.clear();
        self.inner.messages.clear();
        self.inner.state.send_replace(StreamState::Unmounted);
        info!("event stream stopped");
    }

    /// Whether a session task is live.
    pub fn is_running(&self) -> bool {
        self.inner
            .session
            .lock()
            .expect("session lock poisoned")
            .as_ref()
            .is_some_and(|task| !task.is_finished())
    }

    // ── Observation ──────────────────────────────────────────────

    /// Subscribe to lifecycle changes.
    pub fn state(&self) -> watch::Receiver<StreamState> {
        self.inner.state.subscribe()
    }

    /// Lifecycle changes as a `Stream`, starting with the current state.
    pub fn state_stream(&self) -> WatchStream<StreamState> {
        WatchStream::new(self.state())
    }

    /// The protocol that most recently delivered a frame, if any.
    pub fn preferred_protocol(&self) -> Option<Protocol> {
        *self.inner.preferred.lock().expect("preferred lock poisoned")
    }

    /// Failures since the last delivering transport.
    pub fn retries(&self) -> u32 {
        self.inner.retries.load(Ordering::SeqCst)
    }

    /// Wait until a transport is open, returning its protocol.
    ///
    /// `None` waits indefinitely. Errors with [`CoreError::Unmounted`] if
    /// the client is (or gets) stopped first.
    pub async fn wait_started(&self, timeout: Option<Duration>) -> Result<Protocol, CoreError> {
        let mut rx = self.state();
        let wait = async {
            let state = rx
                .wait_for(|s| matches!(s, StreamState::Started { .. } | StreamState::Unmounted))
                .await
                .map_err(|_| CoreError::Unmounted)?;
            match *state {
                StreamState::Started { protocol } => Ok(protocol),
                _ => Err(CoreError::Unmounted),
            }
        };

        match timeout {
            Some(limit) => tokio::time::timeout(limit, wait)
                .await
                .map_err(|_| CoreError::Timeout {
                    timeout_secs: limit.as_secs(),
                })?,
            None => wait.await,
        }
    }

    // ── Listeners ────────────────────────────────────────────────

    pub fn register_change_listener<F>(&self, listener: F) -> ListenerId
    where
        F: Fn(&ChangeEvent) + Send + Sync + 'static,
    {
        self.inner.changes.register(listener)
    }

    /// Register a change listener that only sees events matching `filter`.
    pub fn register_filtered_change_listener<F>(
        &self,
        filter: ChangeFilter,
        listener: F,
    ) -> ListenerId
    where
        F: Fn(&ChangeEvent) + Send + Sync + 'static,
    {
        self.inner.changes.register(move |event: &ChangeEvent| {
            if filter.matches(event) {
                listener(event);
            }
        })
    }

    /// Returns `false` if `id` was not a registered change listener.
    pub fn unregister_change_listener(&self, id: ListenerId) -> bool {
        self.inner.changes.unregister(id)
    }

    pub fn register_message_listener<F>(&self, listener: F) -> ListenerId
    where
        F: Fn(&MessageEvent) + Send + Sync + 'static,
    {
        self.inner.messages.register(listener)
    }

    /// Returns `false` if `id` was not a registered message listener.
    pub fn unregister_message_listener(&self, id: ListenerId) -> bool {
        self.inner.messages.unregister(id)
    }

    pub fn change_listener_count(&self) -> usize {
        self.inner.changes.len()
    }

    pub fn message_listener_count(&self) -> usize {
        self.inner.messages.len()
    }

    /// Change events as a `Stream`. Unregisters on drop.
    pub fn subscribe_changes(&self) -> EventSubscription<ChangeEvent> {
        EventSubscription::attach(&self.inner.changes)
    }

    /// Message events as a `Stream`. Unregisters on drop.
    pub fn subscribe_messages(&self) -> EventSubscription<MessageEvent> {
        EventSubscription::attach(&self.inner.messages)
    }
}

// ── Session ──────────────────────────────────────────────────────

impl ClientInner {
    /// Publish a new state unless the client has been unmounted.
    fn set_state(&self, next: StreamState) {
        self.state.send_if_modified(|current| {
            if *current == StreamState::Unmounted || *current == next {
                return false;
            }
            *current = next;
            true
        });
    }

    fn transport(&self, protocol: Protocol) -> &dyn EventTransport {
        match protocol {
            Protocol::WebSocket => self.websocket.as_ref(),
            Protocol::Sse => self.sse.as_ref(),
        }
    }

    fn preferred(&self) -> Option<Protocol> {
        *self.preferred.lock().expect("preferred lock poisoned")
    }

    /// First frame on `protocol`: remember it and forgive past failures.
    fn mark_delivered(&self, protocol: Protocol) {
        let previous = self
            .preferred
            .lock()
            .expect("preferred lock poisoned")
            .replace(protocol);
        self.retries.store(0, Ordering::SeqCst);
        if previous != Some(protocol) {
            info!(%protocol, "preferring protocol");
        }
    }

    async fn reserve_and_open(&self, transport: &dyn EventTransport) -> Result<FrameStream, Error> {
        let reservation = self.reservations.reserve().await?;
        transport.open(&reservation).await
    }

    /// Run one attempt to completion. Always ends in the reason it failed.
    async fn run_attempt(&self, protocol: Protocol) -> Error {
        let transport = self.transport(protocol);

        let opened = match self.config.attempt_timeout {
            Some(limit) => tokio::time::timeout(limit, self.reserve_and_open(transport))
                .await
                .unwrap_or_else(|_| {
                    Err(Error::Timeout {
                        timeout_ms: u64::try_from(limit.as_millis()).unwrap_or(u64::MAX),
                    })
                }),
            None => self.reserve_and_open(transport).await,
        };

        let mut frames = match opened {
            Ok(frames) => frames,
            Err(e) => return e,
        };

        self.set_state(StreamState::Started { protocol });
        info!(%protocol, "event stream started");

        let mut delivered = false;
        while let Some(item) = frames.next().await {
            let frame = match item {
                Ok(frame) => frame,
                Err(e) => return e,
            };
            if self.cancel.is_cancelled() {
                break;
            }
            if !delivered {
                delivered = true;
                self.mark_delivered(protocol);
            }
            self.dispatch(&frame);
        }

        Error::StreamEnded { protocol }
    }

    fn dispatch(&self, frame: &Frame) {
        match frame {
            Frame::Change(event) => {
                debug!(action = %event.action, kind = %event.kind, id = %event.id, "change event");
                self.changes.dispatch(event);
            }
            Frame::Message(event) => {
                if event.is_connected() {
                    debug!("stream connected");
                }
                self.messages.dispatch(event);
            }
        }
    }
}

/// Session loop: attempt, back off, repeat until cancelled.
async fn run_session(inner: Arc<ClientInner>) {
    loop {
        let retries = inner.retries.load(Ordering::SeqCst);
        let protocol = select_protocol(inner.config.protocol, inner.preferred(), retries);
        let attempt = retries.saturating_add(1);
        inner.set_state(StreamState::Starting { attempt, protocol });
        debug!(%protocol, attempt, "starting event stream");

        let failure = tokio::select! {
            biased;
            () = inner.cancel.cancelled() => return,
            failure = inner.run_attempt(protocol) => failure,
        };

        if inner.cancel.is_cancelled() {
            return;
        }

        let before = inner.retries.fetch_add(1, Ordering::SeqCst);
        let delay = inner.config.reconnect.delay_for(before);
        warn!(
            %protocol,
            attempt,
            delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
            error = %failure,
            disconnect = failure.is_disconnect(),
            rejected = failure.is_rejection(),
            "event stream failed; reconnecting"
        );
        inner.set_state(StreamState::Failed {
            attempt,
            retry_in: delay,
        });

        tokio::select! {
            biased;
            () = inner.cancel.cancelled() => return,
            () = tokio::time::sleep(delay) => {}
        }
    }
}
