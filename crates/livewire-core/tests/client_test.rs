#![allow(clippy::unwrap_used)]
// Integration tests for `EventStreamClient` against scripted transports.
//
// Most tests run on tokio's paused clock: backoff sleeps complete as
// soon as the runtime is otherwise idle, and `Instant`s reflect the
// virtual time that elapsed. Teardown races need real worker threads
// and run on the multi-thread runtime instead.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use futures_util::future::{self, BoxFuture};
use futures_util::{FutureExt, StreamExt};
use pretty_assertions::assert_eq;
use tokio::sync::mpsc;
use tokio::time::Instant;
use tokio_stream::wrappers::UnboundedReceiverStream;

use livewire_api::{Error, EventTransport, Frame, FrameStream, Reservation, ReservationSource};
use livewire_core::{
    ChangeEvent, ChangeFilter, CoreError, EventStreamClient, MessageEvent, Protocol,
    ProtocolPreference, StreamConfig, StreamState,
};

// ── Fakes ───────────────────────────────────────────────────────────

/// What one `open()` call does.
enum Behavior {
    /// Fail to connect.
    Refuse,
    /// Connect, yield these frames, then end.
    Deliver(Vec<Frame>),
    /// Connect and yield whatever the test pushes, until the sender drops.
    Live(mpsc::UnboundedReceiver<Frame>),
}

fn live() -> (mpsc::UnboundedSender<Frame>, Behavior) {
    let (tx, rx) = mpsc::unbounded_channel();
    (tx, Behavior::Live(rx))
}

fn greeting() -> Behavior {
    Behavior::Deliver(vec![Frame::Message(MessageEvent::connected())])
}

type OpenLog = mpsc::UnboundedSender<(Protocol, Instant)>;

struct ScriptedTransport {
    protocol: Protocol,
    script: Mutex<VecDeque<Behavior>>,
    fallback: fn() -> Behavior,
    log: OpenLog,
}

impl ScriptedTransport {
    fn new(
        protocol: Protocol,
        script: Vec<Behavior>,
        fallback: fn() -> Behavior,
        log: &OpenLog,
    ) -> Box<Self> {
        Box::new(Self {
            protocol,
            script: Mutex::new(script.into()),
            fallback,
            log: log.clone(),
        })
    }
}

impl EventTransport for ScriptedTransport {
    fn protocol(&self) -> Protocol {
        self.protocol
    }

    fn open<'a>(&'a self, _: &'a Reservation) -> BoxFuture<'a, Result<FrameStream, Error>> {
        let _ = self.log.send((self.protocol, Instant::now()));
        let behavior = self
            .script
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(self.fallback);

        let result = match behavior {
            Behavior::Refuse => Err(Error::WebSocketConnect("connection refused".into())),
            Behavior::Deliver(frames) => {
                Ok(futures_util::stream::iter(frames.into_iter().map(Ok)).boxed())
            }
            Behavior::Live(rx) => Ok(UnboundedReceiverStream::new(rx).map(Ok).boxed()),
        };
        future::ready(result).boxed()
    }
}

#[derive(Default)]
struct FakeReservations {
    refusals: AtomicU32,
    hang: bool,
    issued: AtomicU32,
}

impl ReservationSource for FakeReservations {
    fn reserve(&self) -> BoxFuture<'_, Result<Reservation, Error>> {
        if self.hang {
            return future::pending().boxed();
        }
        let refused = self
            .refusals
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if refused {
            return future::ready(Err(Error::Reservation {
                status: 503,
                body: "busy".into(),
            }))
            .boxed();
        }
        let n = self.issued.fetch_add(1, Ordering::SeqCst);
        future::ready(Ok(Reservation::new(format!("r-{n}")))).boxed()
    }
}

fn refuse() -> Behavior {
    Behavior::Refuse
}

// ── Harness ─────────────────────────────────────────────────────────

struct Harness {
    client: EventStreamClient,
    opens: mpsc::UnboundedReceiver<(Protocol, Instant)>,
}

struct Scripts {
    ws: Vec<Behavior>,
    ws_fallback: fn() -> Behavior,
    sse: Vec<Behavior>,
    sse_fallback: fn() -> Behavior,
    reservations: FakeReservations,
    config: StreamConfig,
}

impl Default for Scripts {
    fn default() -> Self {
        Self {
            ws: Vec::new(),
            ws_fallback: refuse,
            sse: Vec::new(),
            sse_fallback: refuse,
            reservations: FakeReservations::default(),
            config: StreamConfig::default(),
        }
    }
}

fn harness(scripts: Scripts) -> Harness {
    let (log, opens) = mpsc::unbounded_channel();
    let ws = ScriptedTransport::new(Protocol::WebSocket, scripts.ws, scripts.ws_fallback, &log);
    let sse = ScriptedTransport::new(Protocol::Sse, scripts.sse, scripts.sse_fallback, &log);
    let client =
        EventStreamClient::new(scripts.config, Box::new(scripts.reservations), ws, sse);
    Harness { client, opens }
}

impl Harness {
    async fn next_open(&mut self) -> (Protocol, Instant) {
        self.opens.recv().await.unwrap()
    }

    async fn opens(&mut self, n: usize) -> Vec<(Protocol, Instant)> {
        let mut out = Vec::with_capacity(n);
        for _ in 0..n {
            out.push(self.next_open().await);
        }
        out
    }
}

fn protocols(opens: &[(Protocol, Instant)]) -> Vec<Protocol> {
    opens.iter().map(|(p, _)| *p).collect()
}

fn gaps(opens: &[(Protocol, Instant)]) -> Vec<Duration> {
    opens.windows(2).map(|w| w[1].1 - w[0].1).collect()
}

fn record_changes(
    client: &EventStreamClient,
    label: &'static str,
    tx: &mpsc::UnboundedSender<(&'static str, ChangeEvent)>,
) -> livewire_core::ListenerId {
    let tx = tx.clone();
    client.register_change_listener(move |event| {
        let _ = tx.send((label, event.clone()));
    })
}

fn updated(id: &str) -> ChangeEvent {
    ChangeEvent::new("updated", "connection", id)
}

// ── Lifecycle ───────────────────────────────────────────────────────

#[test]
fn test_start_without_runtime_is_refused() {
    let h = harness(Scripts::default());

    assert!(!h.client.start());
    assert!(!h.client.is_running());
    assert_eq!(*h.client.state().borrow(), StreamState::Idle);
}

#[cfg(debug_assertions)]
#[test]
#[should_panic(expected = "websocket slot")]
fn test_transports_in_swapped_slots_are_refused() {
    let (log, _opens) = mpsc::unbounded_channel();
    let ws = ScriptedTransport::new(Protocol::Sse, Vec::new(), refuse, &log);
    let sse = ScriptedTransport::new(Protocol::WebSocket, Vec::new(), refuse, &log);
    let _ = EventStreamClient::new(
        StreamConfig::default(),
        Box::new(FakeReservations::default()),
        ws,
        sse,
    );
}

#[tokio::test(start_paused = true)]
async fn test_repeated_start_opens_one_transport() {
    let (_feed, session) = live();
    let mut h = harness(Scripts {
        ws: vec![session],
        ..Scripts::default()
    });

    assert!(h.client.start());
    for _ in 0..4 {
        assert!(!h.client.start());
    }

    let (protocol, _) = h.next_open().await;
    assert_eq!(protocol, Protocol::WebSocket);
    assert_eq!(
        h.client.wait_started(Some(Duration::from_secs(1))).await.unwrap(),
        Protocol::WebSocket
    );

    tokio::time::sleep(Duration::from_secs(60)).await;
    assert!(h.opens.try_recv().is_err(), "a second transport was opened");
    assert!(h.client.is_running());
}

#[tokio::test(start_paused = true)]
async fn test_state_walks_through_lifecycle() {
    let (feed, session) = live();
    let h = harness(Scripts {
        ws: vec![Behavior::Refuse],
        sse: vec![session],
        ..Scripts::default()
    });
    let mut state = h.client.state();
    assert_eq!(*state.borrow(), StreamState::Idle);

    h.client.start();

    let failed = state
        .wait_for(|s| matches!(s, StreamState::Failed { .. }))
        .await
        .unwrap()
        .clone();
    assert_eq!(
        failed,
        StreamState::Failed {
            attempt: 1,
            retry_in: Duration::from_millis(1),
        }
    );

    let started = state.wait_for(StreamState::is_started).await.unwrap().clone();
    assert_eq!(
        started,
        StreamState::Started {
            protocol: Protocol::Sse
        }
    );

    feed.send(Frame::Message(MessageEvent::connected())).unwrap();
    h.client.stop();
    assert_eq!(*state.borrow(), StreamState::Unmounted);
    assert!(!h.client.start(), "start() after stop() must be ignored");
}

// ── Protocol selection ──────────────────────────────────────────────

#[tokio::test(start_paused = true)]
async fn test_alternates_until_something_works() {
    let mut h = harness(Scripts::default());
    h.client.start();

    let opens = h.opens(6).await;
    assert_eq!(
        protocols(&opens),
        vec![
            Protocol::WebSocket,
            Protocol::Sse,
            Protocol::WebSocket,
            Protocol::Sse,
            Protocol::WebSocket,
            Protocol::Sse,
        ]
    );
    assert_eq!(h.client.preferred_protocol(), None);
    h.client.stop();
}

#[tokio::test(start_paused = true)]
async fn test_sticks_to_protocol_that_delivered() {
    // SSE delivers once, then fails forever; WebSocket is never retried.
    let mut h = harness(Scripts {
        sse: vec![greeting()],
        ..Scripts::default()
    });
    h.client.start();

    let opens = h.opens(14).await;
    let picked = protocols(&opens);

    assert_eq!(picked[0], Protocol::WebSocket);
    assert!(
        picked[1..].iter().all(|p| *p == Protocol::Sse),
        "protocol switched after success: {picked:?}"
    );
    assert_eq!(h.client.preferred_protocol(), Some(Protocol::Sse));
    h.client.stop();
}

#[tokio::test(start_paused = true)]
async fn test_sticky_across_repeated_short_sessions() {
    let mut h = harness(Scripts {
        sse_fallback: greeting,
        ..Scripts::default()
    });
    let (tx, mut seen) = mpsc::unbounded_channel();
    h.client.register_message_listener(move |m| {
        let _ = tx.send(m.data.clone());
    });
    h.client.start();

    let opens = h.opens(13).await;
    let picked = protocols(&opens);
    assert_eq!(picked[0], Protocol::WebSocket);
    assert!(picked[1..].iter().all(|p| *p == Protocol::Sse));

    // Each successful session resets the counter, so reconnects stay fast.
    assert!(gaps(&opens).iter().all(|g| *g < Duration::from_millis(50)));
    assert_eq!(seen.recv().await.unwrap(), "connected");
    h.client.stop();
}

#[tokio::test(start_paused = true)]
async fn test_pinned_protocol_is_never_swapped() {
    let mut h = harness(Scripts {
        config: StreamConfig {
            protocol: ProtocolPreference::SseOnly,
            ..StreamConfig::default()
        },
        ..Scripts::default()
    });
    h.client.start();

    let opens = h.opens(5).await;
    assert!(protocols(&opens).iter().all(|p| *p == Protocol::Sse));
    h.client.stop();
}

// ── Backoff ─────────────────────────────────────────────────────────

#[tokio::test(start_paused = true)]
async fn test_backoff_schedule() {
    let mut h = harness(Scripts::default());
    h.client.start();

    let opens = h.opens(7).await;
    let gaps = gaps(&opens);

    for gap in &gaps[..3] {
        assert!(*gap <= Duration::from_millis(2), "fast retry took {gap:?}");
    }
    for gap in &gaps[3..] {
        assert!(
            *gap >= Duration::from_millis(5000) && *gap <= Duration::from_millis(5002),
            "slow retry took {gap:?}"
        );
    }
    assert!(h.client.retries() >= 6);
    h.client.stop();
}

#[tokio::test(start_paused = true)]
async fn test_reservation_failures_count_as_retries() {
    let (feed, session) = live();
    let mut h = harness(Scripts {
        ws: vec![session],
        reservations: FakeReservations {
            refusals: AtomicU32::new(2),
            ..FakeReservations::default()
        },
        ..Scripts::default()
    });
    let (tx, mut seen) = mpsc::unbounded_channel();
    h.client.register_message_listener(move |m| {
        let _ = tx.send(m.clone());
    });
    h.client.start();

    // Two handshake failures: WS (refused reservation), SSE (refused
    // reservation), then WS again on even parity.
    let (protocol, _) = h.next_open().await;
    assert_eq!(protocol, Protocol::WebSocket);
    assert_eq!(h.client.retries(), 2);

    feed.send(Frame::Message(MessageEvent::connected())).unwrap();
    assert!(seen.recv().await.unwrap().is_connected());
    assert_eq!(h.client.retries(), 0);
    assert_eq!(h.client.preferred_protocol(), Some(Protocol::WebSocket));
    h.client.stop();
}

#[tokio::test(start_paused = true)]
async fn test_attempt_timeout_fails_a_hung_handshake() {
    let h = harness(Scripts {
        reservations: FakeReservations {
            hang: true,
            ..FakeReservations::default()
        },
        config: StreamConfig {
            attempt_timeout: Some(Duration::from_secs(2)),
            ..StreamConfig::default()
        },
        ..Scripts::default()
    });
    let mut state = h.client.state();
    let started = Instant::now();
    h.client.start();

    state
        .wait_for(|s| matches!(s, StreamState::Failed { .. }))
        .await
        .unwrap();
    assert!(started.elapsed() >= Duration::from_secs(2));
    h.client.stop();
}

#[tokio::test(start_paused = true)]
async fn test_wait_started_times_out_and_reports_stop() {
    let h = harness(Scripts::default());
    h.client.start();

    let result = h.client.wait_started(Some(Duration::from_secs(10))).await;
    assert!(matches!(result, Err(CoreError::Timeout { timeout_secs: 10 })));

    h.client.stop();
    let result = h.client.wait_started(None).await;
    assert!(matches!(result, Err(CoreError::Unmounted)));
}

// ── Dispatch ────────────────────────────────────────────────────────

#[tokio::test(start_paused = true)]
async fn test_change_fan_out_in_registration_order() {
    let (feed, session) = live();
    let h = harness(Scripts {
        ws: vec![session],
        ..Scripts::default()
    });
    let (tx, mut seen) = mpsc::unbounded_channel();
    for label in ["a", "b", "c"] {
        record_changes(&h.client, label, &tx);
    }
    h.client.start();

    feed.send(Frame::Change(updated("abc"))).unwrap();

    let mut deliveries = Vec::new();
    for _ in 0..3 {
        deliveries.push(seen.recv().await.unwrap());
    }
    assert_eq!(
        deliveries,
        vec![("a", updated("abc")), ("b", updated("abc")), ("c", updated("abc"))]
    );

    tokio::time::sleep(Duration::from_millis(100)).await;
    assert!(seen.try_recv().is_err(), "a listener saw the event twice");
    h.client.stop();
}

#[tokio::test(start_paused = true)]
async fn test_unregister_mid_stream() {
    let (feed, session) = live();
    let h = harness(Scripts {
        ws: vec![session],
        ..Scripts::default()
    });
    let (tx, mut seen) = mpsc::unbounded_channel();
    record_changes(&h.client, "a", &tx);
    let b = record_changes(&h.client, "b", &tx);
    record_changes(&h.client, "c", &tx);
    h.client.start();

    feed.send(Frame::Change(updated("1"))).unwrap();
    for _ in 0..3 {
        seen.recv().await.unwrap();
    }

    assert!(h.client.unregister_change_listener(b));
    assert!(!h.client.unregister_change_listener(b));
    feed.send(Frame::Change(updated("2"))).unwrap();

    let second: Vec<_> = vec![seen.recv().await.unwrap(), seen.recv().await.unwrap()];
    assert_eq!(second, vec![("a", updated("2")), ("c", updated("2"))]);
    h.client.stop();
}

#[tokio::test(start_paused = true)]
async fn test_connected_sentinel_reaches_message_listeners() {
    let (feed, session) = live();
    let h = harness(Scripts {
        ws: vec![session],
        ..Scripts::default()
    });
    let (tx, mut seen) = mpsc::unbounded_channel();
    h.client.register_message_listener(move |m| {
        let _ = tx.send(m.clone());
    });
    let (change_tx, mut changes) = mpsc::unbounded_channel();
    record_changes(&h.client, "c", &change_tx);
    h.client.start();

    feed.send(Frame::Message(MessageEvent::connected())).unwrap();

    let message = seen.recv().await.unwrap();
    assert_eq!(message.data, "connected");
    assert_eq!(message.event, "message");
    assert!(changes.try_recv().is_err());
    h.client.stop();
}

#[tokio::test(start_paused = true)]
async fn test_filtered_listener_sees_matching_changes_only() {
    let (feed, session) = live();
    let h = harness(Scripts {
        ws: vec![session],
        ..Scripts::default()
    });
    let (tx, mut seen) = mpsc::unbounded_channel();
    h.client.register_filtered_change_listener(
        ChangeFilter::Kind("integration".into()),
        move |e| {
            let _ = tx.send(e.clone());
        },
    );
    h.client.start();

    feed.send(Frame::Change(updated("abc"))).unwrap();
    feed.send(Frame::Change(ChangeEvent::new("created", "integration", "1001")))
        .unwrap();

    assert_eq!(
        seen.recv().await.unwrap(),
        ChangeEvent::new("created", "integration", "1001")
    );
    h.client.stop();
}

#[tokio::test(start_paused = true)]
async fn test_subscription_stream_ends_on_stop() {
    let (feed, session) = live();
    let h = harness(Scripts {
        ws: vec![session],
        ..Scripts::default()
    });
    let mut changes = h.client.subscribe_changes();
    assert_eq!(h.client.change_listener_count(), 1);
    h.client.start();

    feed.send(Frame::Change(updated("abc"))).unwrap();
    assert_eq!(changes.next().await, Some(updated("abc")));

    h.client.stop();
    assert_eq!(changes.next().await, None);
}

#[tokio::test(start_paused = true)]
async fn test_dropping_subscription_unregisters() {
    let h = harness(Scripts::default());
    let messages = h.client.subscribe_messages();
    assert_eq!(h.client.message_listener_count(), 1);

    drop(messages);
    assert_eq!(h.client.message_listener_count(), 0);
}

// ── Teardown ────────────────────────────────────────────────────────

#[tokio::test(start_paused = true)]
async fn test_stop_silences_late_frames() {
    let (feed, session) = live();
    let h = harness(Scripts {
        ws: vec![session],
        ..Scripts::default()
    });
    let (tx, mut seen) = mpsc::unbounded_channel();
    let id = record_changes(&h.client, "a", &tx);
    drop(tx);
    h.client.start();
    h.client.wait_started(None).await.unwrap();

    h.client.stop();
    let _ = feed.send(Frame::Change(updated("late")));
    tokio::time::sleep(Duration::from_secs(10)).await;

    assert!(seen.try_recv().is_err(), "listener ran after stop()");
    assert!(!h.client.unregister_change_listener(id));
    assert_eq!(h.client.change_listener_count(), 0);
    assert!(!h.client.is_running());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_stop_during_dispatch_skips_remaining_listeners() {
    let (feed, session) = live();
    let h = harness(Scripts {
        ws: vec![session],
        ..Scripts::default()
    });

    let (entered_tx, mut entered) = mpsc::unbounded_channel();
    h.client.register_change_listener(move |_| {
        let _ = entered_tx.send(());
        std::thread::sleep(Duration::from_millis(300));
    });
    let stopped = Arc::new(AtomicBool::new(false));
    let ran_after_stop = Arc::new(AtomicBool::new(false));
    let (seen_stop, flagged) = (Arc::clone(&stopped), Arc::clone(&ran_after_stop));
    h.client.register_change_listener(move |_| {
        if seen_stop.load(Ordering::SeqCst) {
            flagged.store(true, Ordering::SeqCst);
        }
    });
    h.client.start();

    feed.send(Frame::Change(updated("slow"))).unwrap();
    entered.recv().await.unwrap();
    h.client.stop();
    stopped.store(true, Ordering::SeqCst);

    tokio::time::sleep(Duration::from_millis(600)).await;
    assert!(
        !ran_after_stop.load(Ordering::SeqCst),
        "listener ran after stop() returned"
    );
}

#[tokio::test(start_paused = true)]
async fn test_stop_cancels_pending_retry() {
    let mut h = harness(Scripts::default());
    h.client.start();

    // Four failures put the session into its 5s backoff.
    h.opens(4).await;
    h.client.stop();

    tokio::time::sleep(Duration::from_secs(60)).await;
    assert!(h.opens.try_recv().is_err(), "reconnected after stop()");
}
