//! Connection lifecycle management for the collector link.
//!
//! `ConnectionManager` is the only owner of the link and of the session
//! bookkeeping. It is driven synchronously by the caller: every cycle the
//! caller invokes [`ConnectionManager::ensure_connected`], which decides
//! whether the current link is still usable, must be renewed, or must be
//! (re)established.
//!
//! # Bounded connect
//!
//! Event-stream clients have been seen to hang inside `connect` despite their
//! own retry logic. Every attempt is therefore raced against a wall-clock
//! deadline; whichever finishes first wins and the other future is dropped.
//! A timed-out attempt is abandoned and the caller simply tries again next
//! cycle.
//!
//! # Forced renewal
//!
//! A link may keep reporting connected while the collector stops receiving
//! events. There is no liveness signal besides elapsed time, so once the
//! session is older than the renewal threshold it is closed and reopened.
//!
//! ```text
//! Disconnected --(connect within deadline)--> Connected
//! Disconnected --(deadline / connect error)--> Disconnected
//! Connected --(disconnect | renewal | remote close)--> Disconnected
//! ```

use serde::Serialize;
use tokio::{
    sync::{
        mpsc::{self, error::TryRecvError},
        watch,
    },
    time::{sleep_until, timeout_at, Duration, Instant},
};
use tracing::{debug, error, info, warn};

use super::{
    config::Config,
    error::TransferError,
    link::{Connector, Link, LinkEvent},
    state::{ConnectionSession, ConnectionState},
};

/// The link currently held together with its notification channel.
struct ActiveLink<L> {
    link: L,
    events: mpsc::UnboundedReceiver<LinkEvent>,
}

/// Owns the collector link and drives the connection state machine.
///
/// The manager is not shared: it lives inside the driving loop and every
/// operation takes `&mut self` (or `&self` for emit), so there is no locking.
pub struct ConnectionManager<C: Connector> {
    /// Produces new links on demand.
    connector: C,

    /// Endpoint, identity, deadline and renewal settings.
    config: Config,

    /// State and age of the current session.
    session: ConnectionSession,

    /// Live link, present only while `Connected`.
    link: Option<ActiveLink<C::Link>>,

    /// Broadcast of state transitions for observers.
    state_tx: watch::Sender<ConnectionState>,
}

impl<C: Connector> ConnectionManager<C> {
    /// Creates a manager in `Disconnected` state. No connection is attempted.
    pub fn new(connector: C, config: Config) -> Self {
        let (state_tx, _) = watch::channel(ConnectionState::Disconnected);
        Self {
            connector,
            config,
            session: ConnectionSession::new(),
            link: None,
            state_tx,
        }
    }

    /// Current connection state.
    pub fn state(&self) -> ConnectionState {
        self.session.state()
    }

    /// Session bookkeeping (state and last connect instant).
    pub fn session(&self) -> &ConnectionSession {
        &self.session
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Subscribes to state transitions.
    ///
    /// The receiver sees the current state immediately; later values are
    /// only published when the state actually changes.
    pub fn subscribe_state(&self) -> watch::Receiver<ConnectionState> {
        self.state_tx.subscribe()
    }

    /// Makes sure a usable link exists, connecting or renewing if needed.
    ///
    /// - `Connected` and younger than the renewal threshold: returns at once.
    /// - `Connected` and at or past the threshold: disconnects, then connects.
    /// - `Disconnected`: one connect attempt bounded by `deadline`.
    ///
    /// Closing a stale link and the connect attempt share one `deadline`
    /// budget, so the call never blocks for longer than `deadline`.
    ///
    /// Failures are logged and leave the state `Disconnected`; the caller is
    /// expected to call again on its next cycle.
    pub async fn ensure_connected(&mut self, deadline: Duration) -> ConnectionState {
        let until = Instant::now() + deadline;
        self.drain_link_events(until).await;

        if self.session.state().is_connected() {
            let now = Instant::now();
            if !self
                .session
                .needs_renewal(now, self.config.renewal_interval())
            {
                return ConnectionState::Connected;
            }

            info!(
                "Session renewal threshold of {}s reached, disconnecting from collector",
                self.config.renewal_interval
            );
            self.disconnect_until(until).await;
        }

        match self.connect_until(until, deadline).await {
            Ok(()) => info!("Connected to collector"),
            Err(e) if e.is_connect_failure() => {
                warn!("Connect attempt failed, will retry next cycle: {}", e)
            }
            Err(e) => error!("Cannot connect to collector: {}", e),
        }

        self.session.state()
    }

    /// Drops the current link and moves to `Disconnected`.
    ///
    /// Closing is best-effort and bounded by the connect timeout. Calling this
    /// while already disconnected does nothing besides logging at debug level.
    pub async fn disconnect(&mut self) {
        self.disconnect_until(Instant::now() + self.config.connect_timeout())
            .await;
    }

    /// Drops the current link, giving `close()` until `until` to finish.
    async fn disconnect_until(&mut self, until: Instant) {
        match self.link.take() {
            Some(active) => {
                match timeout_at(until, active.link.close()).await {
                    Ok(Ok(())) => debug!("Link closed"),
                    Ok(Err(e)) => warn!("Error closing collector link: {}", e),
                    Err(_) => warn!("Closing collector link timed out, dropping it"),
                }
                info!("Disconnected from collector");
            }
            None => debug!("Disconnect requested without an active link"),
        }

        self.session.mark_disconnected();
        self.publish_state();
    }

    /// Sends the configured event carrying `payload` as a JSON object.
    ///
    /// # Errors
    ///
    /// - `TransferError::NotConnected` outside `Connected`; nothing is sent.
    /// - `TransferError::Serialization` if `payload` cannot be serialized.
    /// - Whatever the link reports for send failures. The state is left as-is.
    pub async fn emit<T>(&self, payload: &T) -> Result<(), TransferError>
    where
        T: Serialize + ?Sized,
    {
        let active = match (&self.link, self.session.state()) {
            (Some(active), ConnectionState::Connected) => active,
            _ => return Err(TransferError::NotConnected),
        };

        let value = serde_json::to_value(payload)?;
        active.link.emit(&self.config.event, value).await
    }

    /// Runs one connect attempt raced against the `until` instant.
    ///
    /// `deadline` is the full budget, reported in the timeout error.
    async fn connect_until(
        &mut self,
        until: Instant,
        deadline: Duration,
    ) -> Result<(), TransferError> {
        let url = self.config.endpoint_url()?;

        self.session.mark_connecting();
        self.publish_state();

        info!("Attempting to connect to collector at {}", url);
        let (events_tx, events_rx) = mpsc::unbounded_channel();

        let outcome = tokio::select! {
            biased;
            result = self.connector.connect(&url, events_tx) => result,
            _ = sleep_until(until) => Err(TransferError::ConnectTimeout(deadline)),
        };

        match outcome {
            Ok(link) => {
                self.link = Some(ActiveLink {
                    link,
                    events: events_rx,
                });
                self.session.mark_connected(Instant::now());
                self.publish_state();
                Ok(())
            }
            Err(e) => {
                self.session.mark_disconnected();
                self.publish_state();
                Err(e)
            }
        }
    }

    /// Applies notifications the transport queued since the last call.
    async fn drain_link_events(&mut self, until: Instant) {
        let mut closed = None;
        if let Some(active) = self.link.as_mut() {
            loop {
                match active.events.try_recv() {
                    Ok(LinkEvent::Closed(reason)) => closed = Some(reason),
                    Err(TryRecvError::Empty) | Err(TryRecvError::Disconnected) => break,
                }
            }
        }

        if let Some(reason) = closed {
            warn!("Collector link closed remotely: {}", reason);
            self.disconnect_until(until).await;
        }
    }

    fn publish_state(&self) {
        let state = self.session.state();
        self.state_tx.send_if_modified(|current| {
            if *current == state {
                false
            } else {
                debug!("Connection state changed: {} -> {}", current, state);
                *current = state;
                true
            }
        });
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{
        atomic::{AtomicUsize, Ordering},
        Arc, Mutex,
    };

    use serde_json::{json, Value};
    use tokio::time::sleep;
    use tracing_test::traced_test;
    use url::Url;

    use super::*;
    use crate::link::LinkEvents;

    #[derive(Debug, Clone, Copy)]
    enum Behavior {
        Immediate,
        Delay(Duration),
        Hang,
        Refuse,
    }

    /// Counters shared between the test and the mock transport.
    #[derive(Default, Clone)]
    struct Probe {
        connects: Arc<AtomicUsize>,
        closes: Arc<AtomicUsize>,
        pending: Arc<AtomicUsize>,
        connected_at: Arc<Mutex<Vec<Instant>>>,
        emitted: Arc<Mutex<Vec<(String, Value)>>>,
        events: Arc<Mutex<Option<LinkEvents>>>,
        urls: Arc<Mutex<Vec<String>>>,
    }

    impl Probe {
        fn connects(&self) -> usize {
            self.connects.load(Ordering::SeqCst)
        }

        fn closes(&self) -> usize {
            self.closes.load(Ordering::SeqCst)
        }

        fn pending(&self) -> usize {
            self.pending.load(Ordering::SeqCst)
        }

        fn emitted(&self) -> Vec<(String, Value)> {
            self.emitted.lock().unwrap().clone()
        }

        fn close_remotely(&self, reason: &str) {
            let tx = self.events.lock().unwrap().clone().unwrap();
            tx.send(LinkEvent::Closed(reason.into())).unwrap();
        }
    }

    /// Tracks an in-flight connect; dropping the future releases it.
    struct PendingGuard(Arc<AtomicUsize>);

    impl PendingGuard {
        fn new(counter: Arc<AtomicUsize>) -> Self {
            counter.fetch_add(1, Ordering::SeqCst);
            Self(counter)
        }
    }

    impl Drop for PendingGuard {
        fn drop(&mut self) {
            self.0.fetch_sub(1, Ordering::SeqCst);
        }
    }

    struct MockConnector {
        behavior: Mutex<Vec<Behavior>>,
        fail_emit: bool,
        hang_close: bool,
        probe: Probe,
    }

    impl MockConnector {
        fn new(probe: &Probe, script: &[Behavior]) -> Self {
            let mut behavior = script.to_vec();
            behavior.reverse();
            Self {
                behavior: Mutex::new(behavior),
                fail_emit: false,
                hang_close: false,
                probe: probe.clone(),
            }
        }

        fn next_behavior(&self) -> Behavior {
            let mut script = self.behavior.lock().unwrap();
            if script.len() > 1 {
                script.pop().unwrap()
            } else {
                script.last().copied().unwrap_or(Behavior::Immediate)
            }
        }
    }

    struct MockLink {
        probe: Probe,
        fail_emit: bool,
        hang_close: bool,
    }

    #[async_trait::async_trait]
    impl Connector for MockConnector {
        type Link = MockLink;

        async fn connect(&self, url: &Url, events: LinkEvents) -> Result<MockLink, TransferError> {
            self.probe.connects.fetch_add(1, Ordering::SeqCst);
            self.probe.urls.lock().unwrap().push(url.to_string());
            let _guard = PendingGuard::new(self.probe.pending.clone());

            match self.next_behavior() {
                Behavior::Immediate => {}
                Behavior::Delay(d) => sleep(d).await,
                Behavior::Hang => std::future::pending::<()>().await,
                Behavior::Refuse => return Err(TransferError::Connect("refused".into())),
            }

            self.probe.connected_at.lock().unwrap().push(Instant::now());
            *self.probe.events.lock().unwrap() = Some(events);
            Ok(MockLink {
                probe: self.probe.clone(),
                fail_emit: self.fail_emit,
                hang_close: self.hang_close,
            })
        }
    }

    #[async_trait::async_trait]
    impl Link for MockLink {
        async fn emit(&self, event: &str, payload: Value) -> Result<(), TransferError> {
            if self.fail_emit {
                return Err(TransferError::Emit("broken pipe".into()));
            }
            self.probe
                .emitted
                .lock()
                .unwrap()
                .push((event.to_string(), payload));
            Ok(())
        }

        async fn close(&self) -> Result<(), TransferError> {
            self.probe.closes.fetch_add(1, Ordering::SeqCst);
            if self.hang_close {
                std::future::pending::<()>().await;
            }
            Ok(())
        }
    }

    fn config() -> Config {
        Config {
            host: "http://collector.local:3001".into(),
            device_id: "pi".into(),
            monitoring_group_id: "kitchen".into(),
            ..Default::default()
        }
    }

    fn manager(probe: &Probe, script: &[Behavior]) -> ConnectionManager<MockConnector> {
        ConnectionManager::new(MockConnector::new(probe, script), config())
    }

    const DEADLINE: Duration = Duration::from_secs(10);

    #[tokio::test(start_paused = true)]
    async fn test_starts_disconnected_and_connects() {
        let probe = Probe::default();
        let mut mgr = manager(&probe, &[Behavior::Immediate]);
        assert_eq!(mgr.state(), ConnectionState::Disconnected);

        let state = mgr.ensure_connected(DEADLINE).await;

        assert_eq!(state, ConnectionState::Connected);
        assert_eq!(probe.connects(), 1);
        assert!(mgr.session().last_connected_at().is_some());
        assert_eq!(
            probe.urls.lock().unwrap()[0],
            "http://collector.local:3001/?deviceId=pi&monitoringGroupId=kitchen"
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_young_session_is_a_no_op() {
        let probe = Probe::default();
        let mut mgr = manager(&probe, &[Behavior::Immediate]);
        mgr.ensure_connected(DEADLINE).await;
        let connected_at = mgr.session().last_connected_at();

        tokio::time::advance(Duration::from_secs(299)).await;
        let state = mgr.ensure_connected(DEADLINE).await;

        assert_eq!(state, ConnectionState::Connected);
        assert_eq!(probe.connects(), 1);
        assert_eq!(probe.closes(), 0);
        assert_eq!(mgr.session().last_connected_at(), connected_at);
    }

    #[tokio::test(start_paused = true)]
    async fn test_old_session_is_renewed() {
        let probe = Probe::default();
        let mut mgr = manager(&probe, &[Behavior::Immediate]);
        mgr.ensure_connected(DEADLINE).await;
        let first = mgr.session().last_connected_at().unwrap();

        tokio::time::advance(Duration::from_secs(301)).await;
        let state = mgr.ensure_connected(DEADLINE).await;

        assert_eq!(state, ConnectionState::Connected);
        assert_eq!(probe.closes(), 1);
        assert_eq!(probe.connects(), 2);
        let second = mgr.session().last_connected_at().unwrap();
        assert_eq!(second - first, Duration::from_secs(301));
    }

    #[tokio::test(start_paused = true)]
    #[traced_test]
    async fn test_hanging_connect_is_bounded_by_deadline() {
        let probe = Probe::default();
        let mut mgr = manager(&probe, &[Behavior::Hang]);

        let started = Instant::now();
        let state = mgr.ensure_connected(DEADLINE).await;
        let waited = started.elapsed();

        assert_eq!(state, ConnectionState::Disconnected);
        assert!(waited >= DEADLINE);
        assert!(waited < DEADLINE + Duration::from_millis(50));
        assert_eq!(probe.pending(), 0, "abandoned connect must be dropped");
        assert!(mgr.session().last_connected_at().is_none());
        assert!(logs_contain("will retry next cycle"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_renewal_with_hanging_close_stays_within_deadline() {
        let probe = Probe::default();
        let mut connector = MockConnector::new(&probe, &[Behavior::Immediate, Behavior::Hang]);
        connector.hang_close = true;
        let mut mgr = ConnectionManager::new(connector, config());
        mgr.ensure_connected(DEADLINE).await;

        tokio::time::advance(Duration::from_secs(301)).await;
        let started = Instant::now();
        let state = mgr.ensure_connected(DEADLINE).await;
        let waited = started.elapsed();

        assert_eq!(state, ConnectionState::Disconnected);
        assert!(waited >= DEADLINE);
        assert!(waited < DEADLINE + Duration::from_millis(50));
        assert_eq!(probe.closes(), 1);
        assert_eq!(probe.connects(), 2);
        assert_eq!(probe.pending(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_remote_close_with_hanging_close_stays_within_deadline() {
        let probe = Probe::default();
        let mut connector = MockConnector::new(&probe, &[Behavior::Immediate, Behavior::Hang]);
        connector.hang_close = true;
        let mut mgr = ConnectionManager::new(connector, config());
        mgr.ensure_connected(DEADLINE).await;

        probe.close_remotely("transport close");
        let started = Instant::now();
        let state = mgr.ensure_connected(DEADLINE).await;

        assert_eq!(state, ConnectionState::Disconnected);
        assert!(started.elapsed() < DEADLINE + Duration::from_millis(50));
    }

    #[tokio::test(start_paused = true)]
    async fn test_timeout_then_success_on_next_call() {
        let probe = Probe::default();
        let mut mgr = manager(&probe, &[Behavior::Hang, Behavior::Delay(Duration::from_secs(1))]);

        assert_eq!(
            mgr.ensure_connected(DEADLINE).await,
            ConnectionState::Disconnected
        );
        assert_eq!(
            mgr.ensure_connected(DEADLINE).await,
            ConnectionState::Connected
        );
        assert_eq!(probe.connects(), 2);
    }

    #[tokio::test(start_paused = true)]
    #[traced_test]
    async fn test_refused_connect_stays_disconnected() {
        let probe = Probe::default();
        let mut mgr = manager(&probe, &[Behavior::Refuse]);

        let state = mgr.ensure_connected(DEADLINE).await;

        assert_eq!(state, ConnectionState::Disconnected);
        assert!(logs_contain("Connect attempt failed"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_emit_requires_connected_state() {
        let probe = Probe::default();
        let mgr = manager(&probe, &[Behavior::Immediate]);

        let result = mgr.emit(&json!({"temperature": 21.5})).await;

        assert!(matches!(result, Err(TransferError::NotConnected)));
        assert!(probe.emitted().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_emit_sends_named_event() {
        let probe = Probe::default();
        let mut mgr = manager(&probe, &[Behavior::Immediate]);
        mgr.ensure_connected(DEADLINE).await;

        mgr.emit(&json!({"id": "a", "temperature": 21.5}))
            .await
            .unwrap();

        let emitted = probe.emitted();
        assert_eq!(emitted.len(), 1);
        assert_eq!(emitted[0].0, "send-temperature-recording");
        assert_eq!(emitted[0].1["temperature"], 21.5);
    }

    #[tokio::test(start_paused = true)]
    async fn test_emit_failure_leaves_state_untouched() {
        let probe = Probe::default();
        let mut connector = MockConnector::new(&probe, &[Behavior::Immediate]);
        connector.fail_emit = true;
        let mut mgr = ConnectionManager::new(connector, config());
        mgr.ensure_connected(DEADLINE).await;

        let result = mgr.emit(&json!({})).await;

        assert!(matches!(result, Err(TransferError::Emit(_))));
        assert_eq!(mgr.state(), ConnectionState::Connected);
    }

    #[tokio::test(start_paused = true)]
    async fn test_disconnect_is_idempotent() {
        let probe = Probe::default();
        let mut mgr = manager(&probe, &[Behavior::Immediate]);
        mgr.ensure_connected(DEADLINE).await;

        mgr.disconnect().await;
        mgr.disconnect().await;

        assert_eq!(mgr.state(), ConnectionState::Disconnected);
        assert_eq!(probe.closes(), 1);
        assert!(mgr.session().last_connected_at().is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_remote_close_triggers_reconnect() {
        let probe = Probe::default();
        let mut mgr = manager(&probe, &[Behavior::Immediate]);
        mgr.ensure_connected(DEADLINE).await;

        probe.close_remotely("transport close");
        let state = mgr.ensure_connected(DEADLINE).await;

        assert_eq!(state, ConnectionState::Connected);
        assert_eq!(probe.connects(), 2);
        assert_eq!(probe.closes(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_state_watch_reports_transitions() {
        let probe = Probe::default();
        let mut mgr = manager(&probe, &[Behavior::Immediate]);
        let mut state_rx = mgr.subscribe_state();
        assert_eq!(*state_rx.borrow(), ConnectionState::Disconnected);

        mgr.ensure_connected(DEADLINE).await;
        state_rx.changed().await.unwrap();
        assert_eq!(*state_rx.borrow_and_update(), ConnectionState::Connected);

        mgr.disconnect().await;
        state_rx.changed().await.unwrap();
        assert_eq!(*state_rx.borrow(), ConnectionState::Disconnected);
    }
}
