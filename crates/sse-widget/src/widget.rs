//! The stream widget orchestrator.
//!
//! [`StreamWidget`] runs as a background task that owns the configuration, the
//! [`ReconnectController`], the status/display publishers and the queue of
//! in-flight transforms. Everything that can change its state arrives on a
//! channel and is handled one event at a time:
//!
//! ```text
//! WidgetHandle ── WidgetCommand ──┐
//! HttpSession ─── ControlEvent ───┼──► StreamWidget::run ──► watch (status, display, config)
//! TokioTimer ──── ControlEvent ───┘          │             └─► broadcast (WidgetEvent)
//!                                            └── FuturesOrdered<transform>
//! ```
//!
//! # Example
//!
//! ```rust,no_run
//! use sse_widget::{PassThrough, StreamWidget, WidgetConfig, WidgetEvent};
//!
//! # async fn example() -> Result<(), sse_widget::Error> {
//! let config = WidgetConfig::new("https://api.example.com/stream").max_attempts(Some(5));
//! let (handle, mut events) = StreamWidget::attach(config, PassThrough)?;
//!
//! while let Some(event) = events.recv().await {
//!     println!("status: {}", handle.status());
//!     match event {
//!         WidgetEvent::Data(payload) => println!("{}", payload.data),
//!         WidgetEvent::Error(err) => eprintln!("{err}"),
//!         WidgetEvent::Detached => break,
//!         _ => {}
//!     }
//! }
//! # Ok(())
//! # }
//! ```

use std::{any::Any, panic::AssertUnwindSafe, sync::Arc};

use futures_util::{
    FutureExt, Stream, StreamExt,
    future::BoxFuture,
    stream::{self, FuturesOrdered},
};
use tokio::sync::{broadcast, mpsc, oneshot, watch};
use tracing::{debug, info, warn};

use crate::{
    config::{ConfigUpdate, WidgetConfig},
    controller::{ConnectionStatus, ControlEvent, ControllerOutput, ReconnectController},
    error::{ConfigError, Error, TransformError},
    session::{Connector, SessionId},
    sse::{HttpConnector, SseEvent},
    timer::TokioScheduler,
    transform::{PayloadTransform, Render},
};

const EVENT_CHANNEL_CAPACITY: usize = 256;

/// Visual tone of the rendered content.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Tone {
    Loading,
    Data,
    Error,
}

/// What the widget currently shows.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Display {
    pub text: String,
    pub tone: Tone,
}

impl Display {
    fn loading(text: &str) -> Self {
        Self {
            text: text.to_string(),
            tone: Tone::Loading,
        }
    }

    fn error(text: &str) -> Self {
        Self {
            text: text.to_string(),
            tone: Tone::Error,
        }
    }
}

/// Notifications published by a widget.
#[derive(Clone, Debug)]
pub enum WidgetEvent<O> {
    /// The widget started.
    Attached,
    /// A session is established.
    Opened,
    /// A transport or transform failure.
    Error(Arc<Error>),
    /// A transformed payload.
    Data(O),
    /// The widget stopped; no further events follow.
    Detached,
}

/// Commands sent from [`WidgetHandle`] to the widget task.
#[derive(Debug)]
enum WidgetCommand {
    UpdateConfig {
        update: ConfigUpdate,
        reply_tx: oneshot::Sender<Result<(), ConfigError>>,
    },
    ReconnectNow,
    Disconnect,
    NetworkOnline,
    NetworkOffline,
    Detach,
}

/// Receiver of [`WidgetEvent`]s.
///
/// Events missed by a slow receiver are skipped with a warning.
pub struct WidgetEvents<O> {
    rx: broadcast::Receiver<WidgetEvent<O>>,
}

impl<O: Clone> WidgetEvents<O> {
    /// Wait for the next event. Returns `None` once every publisher is gone.
    pub async fn recv(&mut self) -> Option<WidgetEvent<O>> {
        loop {
            match self.rx.recv().await {
                Ok(event) => return Some(event),
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    warn!(skipped, "Widget event receiver lagged");
                }
                Err(broadcast::error::RecvError::Closed) => return None,
            }
        }
    }

    /// Take the next event if one is queued.
    pub fn try_recv(&mut self) -> Option<WidgetEvent<O>> {
        loop {
            match self.rx.try_recv() {
                Ok(event) => return Some(event),
                Err(broadcast::error::TryRecvError::Lagged(skipped)) => {
                    warn!(skipped, "Widget event receiver lagged");
                }
                Err(_) => return None,
            }
        }
    }

    /// Consume the receiver as a [`Stream`].
    pub fn into_stream(self) -> impl Stream<Item = WidgetEvent<O>>
    where
        O: Send + 'static,
    {
        stream::unfold(self, |mut events| async move {
            events.recv().await.map(|event| (event, events))
        })
    }
}

/// Clone-able handle for controlling and observing a running widget.
///
/// Dropping the last handle detaches the widget.
pub struct WidgetHandle<O> {
    cmd_tx: mpsc::UnboundedSender<WidgetCommand>,
    status_rx: watch::Receiver<ConnectionStatus>,
    display_rx: watch::Receiver<Display>,
    config_rx: watch::Receiver<WidgetConfig>,
    events_tx: broadcast::Sender<WidgetEvent<O>>,
}

impl<O> Clone for WidgetHandle<O> {
    fn clone(&self) -> Self {
        Self {
            cmd_tx: self.cmd_tx.clone(),
            status_rx: self.status_rx.clone(),
            display_rx: self.display_rx.clone(),
            config_rx: self.config_rx.clone(),
            events_tx: self.events_tx.clone(),
        }
    }
}

impl<O: Clone> WidgetHandle<O> {
    /// Merge a partial configuration change.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if the resulting configuration is invalid (the
    /// previous one stays in effect) and [`Error::Closed`] if the widget has
    /// been detached.
    pub async fn update_config(&self, update: ConfigUpdate) -> Result<(), Error> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.send(WidgetCommand::UpdateConfig { update, reply_tx })?;
        reply_rx.await.map_err(|_| Error::Closed)??;
        Ok(())
    }

    /// Apply an attribute mutation; `None` means the attribute was removed.
    ///
    /// # Errors
    ///
    /// Same as [`update_config`](Self::update_config), plus
    /// [`ConfigError::UnknownAttribute`] and [`ConfigError::InvalidValue`].
    pub async fn set_attribute(&self, name: &str, value: Option<&str>) -> Result<(), Error> {
        let update = ConfigUpdate::from_attribute(name, value)?;
        self.update_config(update).await
    }

    /// Reconnect immediately with a fresh retry budget.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Closed`] if the widget has been detached.
    pub fn reconnect_now(&self) -> Result<(), Error> {
        self.send(WidgetCommand::ReconnectNow)
    }

    /// Close the connection and turn auto-reconnect off.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Closed`] if the widget has been detached.
    pub fn disconnect(&self) -> Result<(), Error> {
        self.send(WidgetCommand::Disconnect)
    }

    /// Signal that the network is reachable again.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Closed`] if the widget has been detached.
    pub fn network_online(&self) -> Result<(), Error> {
        self.send(WidgetCommand::NetworkOnline)
    }

    /// Signal that the network went away.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Closed`] if the widget has been detached.
    pub fn network_offline(&self) -> Result<(), Error> {
        self.send(WidgetCommand::NetworkOffline)
    }

    /// Stop the widget, releasing its session and timer.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Closed`] if the widget has already been detached.
    pub fn detach(&self) -> Result<(), Error> {
        self.send(WidgetCommand::Detach)
    }

    pub fn status(&self) -> ConnectionStatus {
        *self.status_rx.borrow()
    }

    /// Watch status changes.
    pub fn status_watch(&self) -> watch::Receiver<ConnectionStatus> {
        self.status_rx.clone()
    }

    pub fn display(&self) -> Display {
        self.display_rx.borrow().clone()
    }

    /// The configuration currently in effect.
    pub fn config(&self) -> WidgetConfig {
        self.config_rx.borrow().clone()
    }

    /// Additional event receiver. Only sees events published after this call.
    pub fn subscribe(&self) -> WidgetEvents<O> {
        WidgetEvents {
            rx: self.events_tx.subscribe(),
        }
    }

    /// Returns `true` while the widget task is running.
    pub fn is_attached(&self) -> bool {
        !self.cmd_tx.is_closed()
    }

    fn send(&self, cmd: WidgetCommand) -> Result<(), Error> {
        self.cmd_tx.send(cmd).map_err(|_| Error::Closed)
    }
}

type Transformed<O> = BoxFuture<'static, (SessionId, Result<O, TransformError>)>;

enum Step<O> {
    Command(Option<WidgetCommand>),
    Control(ControlEvent),
    Transformed(SessionId, Result<O, TransformError>),
}

/// The widget task.
pub struct StreamWidget<T: PayloadTransform, C: Connector> {
    config: WidgetConfig,
    controller: ReconnectController<C, TokioScheduler>,
    transform: Arc<T>,
    cmd_rx: mpsc::UnboundedReceiver<WidgetCommand>,
    control_rx: mpsc::UnboundedReceiver<ControlEvent>,
    status_tx: watch::Sender<ConnectionStatus>,
    display_tx: watch::Sender<Display>,
    config_tx: watch::Sender<WidgetConfig>,
    events_tx: broadcast::Sender<WidgetEvent<T::Output>>,
    pending: FuturesOrdered<Transformed<T::Output>>,
    showing_placeholder: bool,
}

type Attached<O> = (WidgetHandle<O>, WidgetEvents<O>);

impl<T: PayloadTransform> StreamWidget<T, HttpConnector> {
    /// Attach a widget that streams over HTTP.
    ///
    /// Must be called from within a tokio runtime.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if `config` is invalid and
    /// [`Error::Transport`] if the HTTP client cannot be created.
    pub fn attach(config: WidgetConfig, transform: T) -> Result<Attached<T::Output>, Error> {
        let connector = HttpConnector::new()?;
        Self::attach_with(config, transform, connector)
    }
}

impl<T: PayloadTransform, C: Connector> StreamWidget<T, C> {
    /// Attach a widget using a custom [`Connector`].
    ///
    /// Must be called from within a tokio runtime.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if `config` is invalid.
    pub fn attach_with(
        config: WidgetConfig,
        transform: T,
        connector: C,
    ) -> Result<Attached<T::Output>, Error> {
        config.validate()?;

        let (cmd_tx, cmd_rx) = mpsc::unbounded_channel();
        let (control_tx, control_rx) = mpsc::unbounded_channel();
        let (status_tx, status_rx) = watch::channel(ConnectionStatus::Disconnected);
        let (display_tx, display_rx) = watch::channel(Display::loading(&config.placeholder_text));
        let (config_tx, config_rx) = watch::channel(config.clone());
        let (events_tx, events_rx) = broadcast::channel(EVENT_CHANNEL_CAPACITY);

        let scheduler = TokioScheduler::new(control_tx.clone());
        let widget = Self {
            config,
            controller: ReconnectController::new(connector, scheduler, control_tx),
            transform: Arc::new(transform),
            cmd_rx,
            control_rx,
            status_tx,
            display_tx,
            config_tx,
            events_tx: events_tx.clone(),
            pending: FuturesOrdered::new(),
            showing_placeholder: true,
        };
        tokio::spawn(widget.run());

        let handle = WidgetHandle {
            cmd_tx,
            status_rx,
            display_rx,
            config_rx,
            events_tx,
        };
        Ok((handle, WidgetEvents { rx: events_rx }))
    }

    async fn run(mut self) {
        info!(url = %self.config.stream_url, "Widget attached");
        self.render_placeholder();
        self.emit(WidgetEvent::Attached);
        self.dispatch(ControlEvent::Connect);

        loop {
            let step = tokio::select! {
                biased;

                cmd = self.cmd_rx.recv() => Step::Command(cmd),
                // Finished transforms go out before the session can be closed.
                Some((session, result)) = self.pending.next(), if !self.pending.is_empty() => {
                    Step::Transformed(session, result)
                }
                Some(event) = self.control_rx.recv() => Step::Control(event),
            };

            match step {
                Step::Command(Some(WidgetCommand::Detach) | None) => break,
                Step::Command(Some(cmd)) => self.on_command(cmd),
                Step::Control(event) => self.dispatch(event),
                Step::Transformed(session, result) => self.on_transformed(session, result),
            }
        }

        self.pending = FuturesOrdered::new();
        self.dispatch(ControlEvent::Teardown);
        self.emit(WidgetEvent::Detached);
        info!("Widget detached");
    }

    fn on_command(&mut self, cmd: WidgetCommand) {
        match cmd {
            WidgetCommand::UpdateConfig { update, reply_tx } => {
                let result = self.update_config(&update);
                let _ = reply_tx.send(result);
            }
            WidgetCommand::ReconnectNow => {
                info!("Manual reconnect requested");
                self.dispatch(ControlEvent::ManualReconnect);
            }
            WidgetCommand::Disconnect => {
                if self.config.auto_reconnect {
                    self.config.auto_reconnect = false;
                    self.config_tx.send_replace(self.config.clone());
                }
                self.dispatch(ControlEvent::Disconnect);
            }
            WidgetCommand::NetworkOnline => {
                info!("Network online");
                self.dispatch(ControlEvent::Online);
            }
            WidgetCommand::NetworkOffline => self.dispatch(ControlEvent::Offline),
            WidgetCommand::Detach => {}
        }
    }

    fn update_config(&mut self, update: &ConfigUpdate) -> Result<(), ConfigError> {
        let (next, change) = self.config.apply(update).inspect_err(|err| {
            warn!(error = %err, "Rejected configuration change");
        })?;
        self.config = next;
        self.config_tx.send_replace(self.config.clone());

        if change.placeholder_changed && self.showing_placeholder {
            self.render_placeholder();
        }
        self.dispatch(ControlEvent::ConfigChanged(change));
        Ok(())
    }

    /// Feed one event to the controller and publish its outputs.
    fn dispatch(&mut self, event: ControlEvent) {
        for output in self.controller.handle(event, &self.config) {
            match output {
                ControllerOutput::Status(status) => self.on_status(status),
                ControllerOutput::Opened => self.emit(WidgetEvent::Opened),
                ControllerOutput::Message { session, event } => self.start_transform(session, event),
                ControllerOutput::Failed(err) => {
                    // Status may already be Error while data is on display.
                    self.render_error();
                    self.emit(WidgetEvent::Error(Arc::new(Error::Transport(err))));
                }
                ControllerOutput::RetryScheduled {
                    attempt,
                    base_delay,
                    delay,
                } => {
                    debug!(
                        attempt,
                        base_delay_ms = base_delay.as_millis() as u64,
                        delay_ms = delay.as_millis() as u64,
                        "Retry scheduled"
                    );
                }
            }
        }
    }

    fn on_status(&mut self, status: ConnectionStatus) {
        self.status_tx.send_replace(status);
        match status {
            ConnectionStatus::Connecting => self.render_placeholder(),
            ConnectionStatus::Error => self.render_error(),
            ConnectionStatus::Connected | ConnectionStatus::Disconnected => {}
        }
    }

    fn start_transform(&mut self, session: SessionId, event: SseEvent) {
        let transform = Arc::clone(&self.transform);
        self.pending.push_back(Box::pin(async move {
            let result = AssertUnwindSafe(transform.transform(event))
                .catch_unwind()
                .await
                .unwrap_or_else(|panic| {
                    Err(TransformError::Panicked {
                        message: panic_message(panic.as_ref()),
                    })
                });
            (session, result)
        }));
    }

    fn on_transformed(&mut self, session: SessionId, result: Result<T::Output, TransformError>) {
        if self.controller.session_id() != Some(session) {
            debug!(session = %session, "Dropping transform result from stale session");
            return;
        }
        match result {
            Ok(output) => {
                self.showing_placeholder = false;
                self.display_tx.send_replace(Display {
                    text: output.render(),
                    tone: Tone::Data,
                });
                self.emit(WidgetEvent::Data(output));
            }
            Err(err) => {
                warn!(session = %session, error = %err, "Payload transform failed");
                self.render_error();
                self.emit(WidgetEvent::Error(Arc::new(Error::Transform(err))));
            }
        }
    }

    fn render_placeholder(&mut self) {
        self.showing_placeholder = true;
        self.display_tx
            .send_replace(Display::loading(&self.config.placeholder_text));
    }

    fn render_error(&mut self) {
        self.showing_placeholder = false;
        self.display_tx
            .send_replace(Display::error(&self.config.error_text));
    }

    fn emit(&self, event: WidgetEvent<T::Output>) {
        // No receivers is fine.
        let _ = self.events_tx.send(event);
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}
