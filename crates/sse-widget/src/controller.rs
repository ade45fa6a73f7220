//! Reconnection state machine.
//!
//! [`ReconnectController`] owns the current session, the retry counter and
//! the pending retry timer. Every input, whether it comes from a transport, a
//! timer, or the embedding environment, goes through [`ReconnectController::handle`],
//! which runs one transition to completion and returns what the orchestrator
//! should publish.
//!
//! ```text
//!            Connect / ManualReconnect
//!   Idle ──────────────────────────────► Connecting ──Opened──► Connected
//!    ▲                                    ▲      │                 │
//!    │ url cleared / Teardown   TimerFired│      └────Errored──────┤
//!    │                                    │                        ▼
//!    │                              WaitingToRetry ◄── retry allowed?
//!    │                                                     │ no
//!    └──────────────── ManualReconnect ─────────── Stopped ◄┘
//! ```

use std::{fmt, time::Duration};

use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

use crate::{
    config::{ConfigChange, WidgetConfig},
    error::TransportError,
    reconnect::{BackoffPolicy, raw_delay},
    session::{Connector, EventSink, OpenRequest, Session, SessionEvent, SessionId},
    sse::SseEvent,
    timer::{RetryScheduler, RetryTimer, TimerId},
};

/// Connection status exposed to the embedding environment.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum ConnectionStatus {
    #[default]
    Disconnected,
    Connecting,
    Connected,
    Error,
}

impl ConnectionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Disconnected => "disconnected",
            Self::Connecting => "connecting",
            Self::Connected => "connected",
            Self::Error => "error",
        }
    }
}

impl fmt::Display for ConnectionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Internal controller state.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ControllerState {
    /// No session, no timer.
    Idle,
    /// A session was opened and has not reported yet.
    Connecting,
    /// The session reported `Opened`.
    Connected,
    /// A retry timer is pending.
    WaitingToRetry,
    /// Auto-reconnect disabled or attempts exhausted; waits for a manual
    /// reconnect.
    Stopped,
}

/// Inputs of the state machine.
#[derive(Debug)]
pub enum ControlEvent {
    /// Initial connect after attach.
    Connect,
    /// Event from a transport session.
    Session { id: SessionId, event: SessionEvent },
    /// A retry timer elapsed.
    TimerFired { id: TimerId },
    /// The configuration was replaced.
    ConfigChanged(ConfigChange),
    /// Reconnect immediately with a fresh retry budget.
    ManualReconnect,
    /// Close and stay closed until a manual reconnect.
    Disconnect,
    /// The network came back.
    Online,
    /// The network went away.
    Offline,
    /// The widget is being detached.
    Teardown,
}

/// Effects the orchestrator publishes after a transition.
#[derive(Debug)]
pub enum ControllerOutput {
    /// The externally visible status changed.
    Status(ConnectionStatus),
    /// The current session is established.
    Opened,
    /// A message from the current session.
    Message { session: SessionId, event: SseEvent },
    /// The current session failed.
    Failed(TransportError),
    /// A retry was scheduled.
    RetryScheduled {
        /// Retries scheduled since the last success, including this one.
        attempt: u32,
        /// Backoff before jitter.
        base_delay: Duration,
        /// Actual delay.
        delay: Duration,
    },
}

/// Retry counter and pending timer.
#[derive(Debug)]
struct RetryState<T> {
    attempts: u32,
    pending: Option<(TimerId, T)>,
}

struct ActiveSession<S> {
    id: SessionId,
    session: S,
}

/// The reconnection state machine.
pub struct ReconnectController<C: Connector, S: RetryScheduler> {
    connector: C,
    scheduler: S,
    events_tx: mpsc::UnboundedSender<ControlEvent>,
    backoff: BackoffPolicy,
    state: ControllerState,
    status: ConnectionStatus,
    retry: RetryState<S::Timer>,
    session: Option<ActiveSession<C::Session>>,
    next_session: u64,
    next_timer: u64,
}

impl<C: Connector, S: RetryScheduler> ReconnectController<C, S> {
    /// Create a controller. Sessions report through `events_tx`; the caller
    /// feeds everything received on the matching receiver back into
    /// [`handle`](Self::handle).
    pub fn new(connector: C, scheduler: S, events_tx: mpsc::UnboundedSender<ControlEvent>) -> Self {
        Self {
            connector,
            scheduler,
            events_tx,
            backoff: BackoffPolicy::ERROR_RETRY,
            state: ControllerState::Idle,
            status: ConnectionStatus::Disconnected,
            retry: RetryState {
                attempts: 0,
                pending: None,
            },
            session: None,
            next_session: 0,
            next_timer: 0,
        }
    }

    /// Replace the backoff policy.
    #[must_use]
    pub fn with_backoff(mut self, backoff: BackoffPolicy) -> Self {
        self.backoff = backoff;
        self
    }

    pub fn state(&self) -> ControllerState {
        self.state
    }

    pub fn status(&self) -> ConnectionStatus {
        self.status
    }

    /// Retries scheduled since the last successful open.
    pub fn attempts(&self) -> u32 {
        self.retry.attempts
    }

    pub fn has_pending_retry(&self) -> bool {
        self.retry.pending.is_some()
    }

    /// The live session, if any.
    pub fn session_id(&self) -> Option<SessionId> {
        self.session.as_ref().map(|active| active.id)
    }

    /// Run one transition.
    pub fn handle(&mut self, event: ControlEvent, config: &WidgetConfig) -> Vec<ControllerOutput> {
        let mut out = Vec::new();
        match event {
            ControlEvent::Connect => {
                if matches!(self.state, ControllerState::Idle | ControllerState::Stopped) {
                    if config.has_url() {
                        self.open_session(config, &mut out);
                    } else {
                        debug!("No stream URL configured, staying idle");
                    }
                }
            }
            ControlEvent::Session { id, event } => {
                if self.session_id() != Some(id) {
                    debug!(session = %id, "Dropping event from stale session");
                    return out;
                }
                self.on_session_event(event, config, &mut out);
            }
            ControlEvent::TimerFired { id } => {
                let current = matches!(&self.retry.pending, Some((pending, _)) if *pending == id);
                if !current || self.state != ControllerState::WaitingToRetry {
                    debug!(timer = %id, "Ignoring stale retry timer");
                    return out;
                }
                self.retry.pending = None;
                self.open_session(config, &mut out);
            }
            ControlEvent::ConfigChanged(change) => {
                if change.endpoint_changed {
                    info!(url = %config.stream_url, "Stream endpoint changed, reconnecting");
                    self.reconnect_now(config, &mut out);
                }
            }
            ControlEvent::ManualReconnect | ControlEvent::Online => {
                self.reconnect_now(config, &mut out);
            }
            ControlEvent::Disconnect => {
                info!("Stream disconnected on request");
                self.reset();
                self.state = ControllerState::Stopped;
                self.set_status(ConnectionStatus::Disconnected, &mut out);
            }
            ControlEvent::Offline => {
                warn!("Network offline");
                self.set_status(ConnectionStatus::Error, &mut out);
            }
            ControlEvent::Teardown => {
                self.reset();
                self.state = ControllerState::Idle;
                self.set_status(ConnectionStatus::Disconnected, &mut out);
            }
        }
        out
    }

    fn on_session_event(
        &mut self,
        event: SessionEvent,
        config: &WidgetConfig,
        out: &mut Vec<ControllerOutput>,
    ) {
        match event {
            SessionEvent::Opened => {
                if self.state != ControllerState::Connecting {
                    return;
                }
                info!(url = %config.stream_url, "SSE connection established");
                self.state = ControllerState::Connected;
                self.retry.attempts = 0;
                self.set_status(ConnectionStatus::Connected, out);
                out.push(ControllerOutput::Opened);
            }
            SessionEvent::Message(event) => {
                if self.state != ControllerState::Connected {
                    debug!("Dropping message received before open");
                    return;
                }
                if let Some(session) = self.session_id() {
                    out.push(ControllerOutput::Message { session, event });
                }
            }
            SessionEvent::Errored(err) => self.on_transport_error(err, config, out),
        }
    }

    /// Tear everything down and open a fresh session right away.
    fn reconnect_now(&mut self, config: &WidgetConfig, out: &mut Vec<ControllerOutput>) {
        self.reset();
        self.set_status(ConnectionStatus::Disconnected, out);
        if config.has_url() {
            self.open_session(config, out);
        } else {
            self.state = ControllerState::Idle;
        }
    }

    fn open_session(&mut self, config: &WidgetConfig, out: &mut Vec<ControllerOutput>) {
        debug_assert!(self.session.is_none() && self.retry.pending.is_none());

        self.next_session += 1;
        let id = SessionId(self.next_session);
        self.state = ControllerState::Connecting;
        self.set_status(ConnectionStatus::Connecting, out);
        info!(url = %config.stream_url, session = %id, attempt = self.retry.attempts, "SSE connecting");

        let request = OpenRequest {
            url: &config.stream_url,
            with_credentials: config.send_credentials,
        };
        let sink = EventSink::new(id, self.events_tx.clone());
        match self.connector.open(request, sink) {
            Ok(session) => self.session = Some(ActiveSession { id, session }),
            Err(err) => self.on_transport_error(err, config, out),
        }
    }

    fn on_transport_error(
        &mut self,
        err: TransportError,
        config: &WidgetConfig,
        out: &mut Vec<ControllerOutput>,
    ) {
        error!(url = %config.stream_url, error = %err, "SSE connection failed");
        self.close_session();
        self.set_status(ConnectionStatus::Error, out);
        out.push(ControllerOutput::Failed(err));

        if !config.allows_retry(self.retry.attempts) {
            if config.auto_reconnect {
                error!(attempts = self.retry.attempts, "Max SSE reconnect attempts exceeded");
            }
            self.state = ControllerState::Stopped;
            return;
        }

        let attempt = self.retry.attempts;
        let base_delay = raw_delay(attempt, config.base_delay, config.max_delay);
        let delay = self.backoff.delay(attempt, config.base_delay, config.max_delay);
        self.retry.attempts = attempt.saturating_add(1);

        self.next_timer += 1;
        let id = TimerId(self.next_timer);
        let timer = self.scheduler.schedule(id, delay);
        self.retry.pending = Some((id, timer));
        self.state = ControllerState::WaitingToRetry;

        warn!(
            attempt = self.retry.attempts,
            delay_ms = delay.as_millis() as u64,
            "SSE reconnecting after backoff"
        );
        out.push(ControllerOutput::RetryScheduled {
            attempt: self.retry.attempts,
            base_delay,
            delay,
        });
    }

    /// Cancel the timer, close the session, forget the retry count.
    fn reset(&mut self) {
        self.cancel_retry();
        self.close_session();
        self.retry.attempts = 0;
    }

    fn cancel_retry(&mut self) {
        if let Some((id, mut timer)) = self.retry.pending.take() {
            debug!(timer = %id, "Cancelling pending retry");
            timer.cancel();
        }
    }

    fn close_session(&mut self) {
        if let Some(mut active) = self.session.take() {
            debug!(session = %active.id, "Closing SSE session");
            active.session.close();
        }
    }

    fn set_status(&mut self, status: ConnectionStatus, out: &mut Vec<ControllerOutput>) {
        if self.status != status {
            self.status = status;
            out.push(ControllerOutput::Status(status));
        }
    }
}

impl<C: Connector, S: RetryScheduler> Drop for ReconnectController<C, S> {
    fn drop(&mut self) {
        self.cancel_retry();
        self.close_session();
    }
}


#[cfg(test)]
mod tests {
    use super::{testing::*, *};

    type Controller = ReconnectController<FakeConnector, FakeScheduler>;

    struct Harness {
        controller: Controller,
        connector: FakeConnector,
        scheduler: FakeScheduler,
        config: WidgetConfig,
        _rx: mpsc::UnboundedReceiver<ControlEvent>,
    }

    impl Harness {
        fn new(config: WidgetConfig) -> Self {
            let (tx, rx) = mpsc::unbounded_channel();
            let connector = FakeConnector::default();
            let scheduler = FakeScheduler::default();
            let controller = ReconnectController::new(connector.clone(), scheduler.clone(), tx)
                .with_backoff(BackoffPolicy::EXACT);
            Self {
                controller,
                connector,
                scheduler,
                config,
                _rx: rx,
            }
        }

        fn send(&mut self, event: ControlEvent) -> Vec<ControllerOutput> {
            self.controller.handle(event, &self.config)
        }

        fn current(&self) -> SessionId {
            self.controller.session_id().expect("live session")
        }

        fn open(&mut self) -> Vec<ControllerOutput> {
            let id = self.current();
            self.send(ControlEvent::Session {
                id,
                event: SessionEvent::Opened,
            })
        }

        fn fail(&mut self) -> Vec<ControllerOutput> {
            let id = self.current();
            self.send(ControlEvent::Session {
                id,
                event: SessionEvent::Errored(TransportError::StreamEnded),
            })
        }

        fn fire_timer(&mut self) -> Vec<ControllerOutput> {
            let id = self.scheduler.last_timer().expect("scheduled timer");
            self.send(ControlEvent::TimerFired { id })
        }
    }

    fn statuses(out: &[ControllerOutput]) -> Vec<ConnectionStatus> {
        out.iter()
            .filter_map(|o| match o {
                ControllerOutput::Status(s) => Some(*s),
                _ => None,
            })
            .collect()
    }

    fn url() -> WidgetConfig {
        WidgetConfig::new("http://localhost/stream")
    }

    #[test]
    fn test_connect_opens_one_session() {
        let mut h = Harness::new(url());
        let out = h.send(ControlEvent::Connect);

        assert_eq!(h.controller.state(), ControllerState::Connecting);
        assert_eq!(statuses(&out), vec![ConnectionStatus::Connecting]);
        assert_eq!(h.connector.open_count(), 1);

        // A second connect while a session is live is a no-op.
        h.send(ControlEvent::Connect);
        assert_eq!(h.connector.open_count(), 1);
    }

    #[test]
    fn test_connect_without_url_stays_idle() {
        let mut h = Harness::new(WidgetConfig::default());
        let out = h.send(ControlEvent::Connect);
        assert!(out.is_empty());
        assert_eq!(h.controller.state(), ControllerState::Idle);
        assert_eq!(h.connector.open_count(), 0);
    }

    #[test]
    fn test_open_resets_attempts() {
        let mut h = Harness::new(url());
        h.send(ControlEvent::Connect);
        h.fail();
        h.fire_timer();
        assert_eq!(h.controller.attempts(), 1);

        let out = h.open();
        assert_eq!(h.controller.state(), ControllerState::Connected);
        assert_eq!(h.controller.attempts(), 0);
        assert_eq!(statuses(&out), vec![ConnectionStatus::Connected]);
        assert!(out.iter().any(|o| matches!(o, ControllerOutput::Opened)));
    }

    #[test]
    fn test_zero_max_attempts_stops_on_first_error() {
        let mut h = Harness::new(url().max_attempts(Some(0)));
        h.send(ControlEvent::Connect);
        h.open();
        let out = h.fail();

        assert_eq!(h.controller.state(), ControllerState::Stopped);
        assert_eq!(h.controller.status(), ConnectionStatus::Error);
        assert!(h.scheduler.delays().is_empty());
        assert!(out.iter().any(|o| matches!(o, ControllerOutput::Failed(_))));
        assert_eq!(h.controller.session_id(), None);
    }

    #[test]
    fn test_bounded_retries_then_stop() {
        let mut h = Harness::new(url().max_attempts(Some(3)));
        h.send(ControlEvent::Connect);

        for expected in 1..=3 {
            h.fail();
            assert_eq!(h.controller.state(), ControllerState::WaitingToRetry);
            assert_eq!(h.controller.attempts(), expected);
            assert_eq!(h.controller.session_id(), None);
            h.fire_timer();
            assert_eq!(h.controller.state(), ControllerState::Connecting);
        }
        h.fail();

        assert_eq!(h.controller.state(), ControllerState::Stopped);
        let delays = h.scheduler.delays();
        assert_eq!(delays.len(), 3);
        assert!(delays.windows(2).all(|w| w[0] <= w[1]));
        assert_eq!(h.connector.open_count(), 4);
    }

    #[test]
    fn test_jittered_retries_stay_non_decreasing() {
        let (tx, _rx) = mpsc::unbounded_channel();
        let scheduler = FakeScheduler::default();
        let mut controller = ReconnectController::new(FakeConnector::default(), scheduler.clone(), tx);
        let config = url().max_attempts(Some(3));

        controller.handle(ControlEvent::Connect, &config);
        for _ in 0..3 {
            let id = controller.session_id().expect("live session");
            controller.handle(
                ControlEvent::Session {
                    id,
                    event: SessionEvent::Errored(TransportError::StreamEnded),
                },
                &config,
            );
            let timer = scheduler.last_timer().expect("timer");
            controller.handle(ControlEvent::TimerFired { id: timer }, &config);
        }

        let delays = scheduler.delays();
        assert_eq!(delays.len(), 3);
        assert!(delays.windows(2).all(|w| w[0] <= w[1]));
        for (attempt, delay) in delays.iter().enumerate() {
            let raw = raw_delay(attempt as u32, config.base_delay, config.max_delay).as_secs_f64();
            let delay = delay.as_secs_f64();
            assert!(delay >= raw * 0.75 - 1e-9 && delay <= raw * 1.25 + 1e-9);
        }
    }

    #[test]
    fn test_huge_delays_schedule_without_overflow() {
        let (tx, _rx) = mpsc::unbounded_channel();
        let scheduler = FakeScheduler::default();
        let mut controller = ReconnectController::new(FakeConnector::default(), scheduler.clone(), tx);
        let config = url().base_delay(Duration::MAX).max_delay(Duration::MAX);
        assert!(config.validate().is_ok());

        controller.handle(ControlEvent::Connect, &config);
        let id = controller.session_id().expect("live session");
        controller.handle(
            ControlEvent::Session {
                id,
                event: SessionEvent::Errored(TransportError::StreamEnded),
            },
            &config,
        );

        assert_eq!(controller.state(), ControllerState::WaitingToRetry);
        assert_eq!(scheduler.delays().len(), 1);
    }

    #[test]
    fn test_unbounded_raw_delays() {
        let config = url()
            .base_delay(Duration::from_millis(1000))
            .max_delay(Duration::from_millis(8000))
            .max_attempts(None);
        let mut h = Harness::new(config);
        h.send(ControlEvent::Connect);

        let mut base_delays = Vec::new();
        for _ in 0..5 {
            for output in h.fail() {
                if let ControllerOutput::RetryScheduled { base_delay, .. } = output {
                    base_delays.push(base_delay.as_millis());
                }
            }
            h.fire_timer();
        }
        assert_eq!(base_delays, vec![1000, 2000, 4000, 8000, 8000]);
    }

    #[test]
    fn test_auto_reconnect_disabled_stops() {
        let mut h = Harness::new(url().auto_reconnect(false));
        h.send(ControlEvent::Connect);
        h.fail();
        assert_eq!(h.controller.state(), ControllerState::Stopped);
        assert!(h.scheduler.delays().is_empty());
    }

    #[test]
    fn test_manual_reconnect_cancels_pending_retry() {
        let mut h = Harness::new(url());
        h.send(ControlEvent::Connect);
        h.fail();
        h.fire_timer();
        h.fail();
        assert_eq!(h.controller.state(), ControllerState::WaitingToRetry);
        assert_eq!(h.controller.attempts(), 2);
        let pending = h.scheduler.last_timer().expect("timer");

        let opens_before = h.connector.open_count();
        h.send(ControlEvent::ManualReconnect);

        assert_eq!(h.scheduler.cancelled(), vec![pending]);
        assert_eq!(h.connector.open_count(), opens_before + 1);
        assert_eq!(h.controller.attempts(), 0);
        assert_eq!(h.controller.state(), ControllerState::Connecting);

        // The cancelled timer firing late must not open a second session.
        h.send(ControlEvent::TimerFired { id: pending });
        assert_eq!(h.connector.open_count(), opens_before + 1);
    }

    #[test]
    fn test_url_change_while_connected() {
        let mut h = Harness::new(url());
        h.send(ControlEvent::Connect);
        h.open();
        let old = h.current();

        let (config, change) = h
            .config
            .apply(&crate::config::ConfigUpdate::new().stream_url("http://localhost/other"))
            .expect("valid update");
        h.config = config;
        h.send(ControlEvent::ConfigChanged(change));

        assert_eq!(h.connector.closed(), vec![old]);
        assert_eq!(h.connector.open_count(), 2);
        let (_, url, _) = h.connector.last_open().expect("open");
        assert_eq!(url, "http://localhost/other");

        // Late message from the old session is dropped.
        let out = h.send(ControlEvent::Session {
            id: old,
            event: SessionEvent::Message(SseEvent::message("late")),
        });
        assert!(out.is_empty());
    }

    #[test]
    fn test_credentials_change_reconnects() {
        let mut h = Harness::new(url());
        h.send(ControlEvent::Connect);
        h.open();

        let (config, change) = h
            .config
            .apply(&crate::config::ConfigUpdate::new().send_credentials(true))
            .expect("valid update");
        h.config = config;
        h.send(ControlEvent::ConfigChanged(change));

        let (_, _, with_credentials) = h.connector.last_open().expect("open");
        assert!(with_credentials);
        assert_eq!(h.connector.open_count(), 2);
    }

    #[test]
    fn test_non_endpoint_change_keeps_session() {
        let mut h = Harness::new(url());
        h.send(ControlEvent::Connect);
        h.open();
        let out = h.send(ControlEvent::ConfigChanged(ConfigChange {
            endpoint_changed: false,
            placeholder_changed: true,
        }));
        assert!(out.is_empty());
        assert_eq!(h.connector.open_count(), 1);
        assert_eq!(h.controller.state(), ControllerState::Connected);
    }

    #[test]
    fn test_url_cleared_goes_idle() {
        let mut h = Harness::new(url());
        h.send(ControlEvent::Connect);
        h.open();
        h.config.stream_url.clear();
        let out = h.send(ControlEvent::ConfigChanged(ConfigChange {
            endpoint_changed: true,
            placeholder_changed: false,
        }));

        assert_eq!(h.controller.state(), ControllerState::Idle);
        assert_eq!(statuses(&out), vec![ConnectionStatus::Disconnected]);
        assert_eq!(h.controller.session_id(), None);
        assert!(!h.controller.has_pending_retry());
    }

    #[test]
    fn test_disconnect_is_terminal_until_manual_reconnect() {
        let mut h = Harness::new(url());
        h.send(ControlEvent::Connect);
        h.fail();
        assert!(h.controller.has_pending_retry());

        let out = h.send(ControlEvent::Disconnect);
        assert_eq!(h.controller.state(), ControllerState::Stopped);
        assert_eq!(statuses(&out), vec![ConnectionStatus::Disconnected]);
        assert!(!h.controller.has_pending_retry());
        assert_eq!(h.controller.attempts(), 0);

        h.send(ControlEvent::ManualReconnect);
        assert_eq!(h.controller.state(), ControllerState::Connecting);
    }

    #[test]
    fn test_offline_only_changes_status() {
        let mut h = Harness::new(url());
        h.send(ControlEvent::Connect);
        h.open();
        let out = h.send(ControlEvent::Offline);

        assert_eq!(statuses(&out), vec![ConnectionStatus::Error]);
        assert_eq!(h.controller.state(), ControllerState::Connected);
        assert!(h.connector.closed().is_empty());
    }

    #[test]
    fn test_online_forces_reconnect() {
        let mut h = Harness::new(url());
        h.send(ControlEvent::Connect);
        h.open();
        h.send(ControlEvent::Online);
        assert_eq!(h.connector.open_count(), 2);
        assert_eq!(h.connector.closed().len(), 1);
    }

    #[test]
    fn test_rejected_open_counts_as_transport_error() {
        let mut h = Harness::new(WidgetConfig::new("ws://localhost/stream").max_attempts(Some(1)));
        let out = h.send(ControlEvent::Connect);

        assert!(out.iter().any(|o| matches!(o, ControllerOutput::Failed(_))));
        assert_eq!(h.controller.state(), ControllerState::WaitingToRetry);
        h.fire_timer();
        assert_eq!(h.controller.state(), ControllerState::Stopped);
    }

    #[test]
    fn test_messages_forwarded_only_when_connected() {
        let mut h = Harness::new(url());
        h.send(ControlEvent::Connect);
        let id = h.current();
        let early = h.send(ControlEvent::Session {
            id,
            event: SessionEvent::Message(SseEvent::message("early")),
        });
        assert!(early.is_empty());

        h.open();
        let out = h.send(ControlEvent::Session {
            id,
            event: SessionEvent::Message(SseEvent::message("hello")),
        });
        assert!(matches!(
            out.as_slice(),
            [ControllerOutput::Message { session, event }] if *session == id && event.data() == "hello"
        ));
    }

    #[test]
    fn test_teardown_releases_everything() {
        let mut h = Harness::new(url());
        h.send(ControlEvent::Connect);
        h.fail();
        h.send(ControlEvent::Teardown);
        assert_eq!(h.controller.state(), ControllerState::Idle);
        assert_eq!(h.scheduler.cancelled().len(), 1);
        assert_eq!(h.controller.status(), ConnectionStatus::Disconnected);
    }

    #[test]
    fn test_status_display() {
        assert_eq!(ConnectionStatus::Disconnected.to_string(), "disconnected");
        assert_eq!(ConnectionStatus::Connecting.to_string(), "connecting");
        assert_eq!(ConnectionStatus::Connected.to_string(), "connected");
        assert_eq!(ConnectionStatus::Error.to_string(), "error");
    }
}
