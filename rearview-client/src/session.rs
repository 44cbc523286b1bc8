/*
 * Copyright 2025 Security Union LLC
 *
 * Licensed under either of
 *
 * * Apache License, Version 2.0
 *   (http://www.apache.org/licenses/LICENSE-2.0)
 * * MIT license
 *   (http://opensource.org/licenses/MIT)
 *
 * at your option.
 *
 * Unless you explicitly state otherwise, any contribution intentionally
 * submitted for inclusion in the work by you, as defined in the Apache-2.0
 * license, shall be dual licensed as above, without any additional terms or
 * conditions.
 */

//! The stream session controller.
//!
//! One tokio task owns all session state: the current [`Connection`], the
//! H.264 parser, the freshness monitor, the retry deadline and the display
//! sink. Caller commands, connection events and both timers are handled one
//! at a time by that task, so a retry can never race a newly established
//! connection's first frame.
//!
//! ```text
//!   RearviewSession ──commands──┐
//!                               ▼
//!   Connection ──messages──► SessionController ──frames──► DisplaySink
//!                               │
//!                               └──SessionEvent──► caller
//! ```

use crate::camera_control::CameraOptionsAdjuster;
use crate::camera_options::{CameraSensitivityMode, Daylight};
use crate::config::RearviewConfig;
use crate::display::DisplaySink;
use crate::freshness::FrameFreshnessMonitor;
use crate::retry::RetryPolicy;
use log::{debug, error, info, trace, warn};
use rearview_codecs::{FormatError, H264StreamParser, ParseEvent};
use rearview_transport::{
    AddressError, CameraHost, Connection, ConnectionEvent, ConnectionMessage, TerminationReason,
};
use std::net::SocketAddr;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};

/// Retries for camera options re-sent after a reconnect. The control server
/// starts more slowly than the video server.
const RECONNECT_CONTROL_RETRY_COUNT: u32 = 10;
const CONNECTION_CHANNEL_CAPACITY: usize = 64;

/// Health and lifecycle notifications for the presentation layer.
#[derive(Debug, Clone, PartialEq)]
pub enum SessionEvent {
    Connecting { connection_id: u64 },
    Established { connection_id: u64 },
    /// `retry_after` is `None` when no reconnect will be attempted.
    Terminated {
        reason: TerminationReason,
        retry_after: Option<Duration>,
    },
    /// The configured camera address is unusable. The session stays stopped.
    InvalidAddress(AddressError),
    /// No frame arrived within the expiration window; the display was cleared.
    FrameExpired,
    /// The stream's parameter sets could not be used; slices are dropped.
    DecodeError(FormatError),
    Stopped,
}

#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
#[error("the rearview session has shut down")]
pub struct SessionClosed;

#[derive(Debug)]
enum Command {
    Start,
    Stop,
    SetSensitivityMode(CameraSensitivityMode),
    SetDaylight(Option<Daylight>),
    Shutdown,
}

/// Handle to a running session. Cheap to clone.
///
/// ```no_run
/// use rearview_client::{DisplaySink, RearviewConfig, RearviewSession, SessionEvent};
/// use rearview_codecs::DecodableFrame;
///
/// struct Logger;
///
/// impl DisplaySink for Logger {
///     fn enqueue(&mut self, frame: DecodableFrame) {
///         println!("frame {}", frame.sequence_number);
///     }
///     fn flush_and_remove_image(&mut self) {
///         println!("cleared");
///     }
/// }
///
/// # async fn example() -> Result<(), rearview_client::SessionClosed> {
/// let config = RearviewConfig::with_camera_address("192.168.1.20");
/// let (session, mut events) = RearviewSession::spawn(config, Logger);
/// session.start()?;
/// while let Some(event) = events.recv().await {
///     if let SessionEvent::InvalidAddress(e) = event {
///         eprintln!("{e}");
///         break;
///     }
/// }
/// session.shutdown().await;
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct RearviewSession {
    commands: mpsc::UnboundedSender<Command>,
}

impl RearviewSession {
    /// Spawns the controller task. Must be called within a tokio runtime.
    pub fn spawn<S: DisplaySink>(
        config: RearviewConfig,
        sink: S,
    ) -> (Self, mpsc::UnboundedReceiver<SessionEvent>) {
        let (command_tx, command_rx) = mpsc::unbounded_channel();
        let (event_tx, event_rx) = mpsc::unbounded_channel();
        let (connection_tx, connection_rx) = mpsc::channel(CONNECTION_CHANNEL_CAPACITY);

        let controller = SessionController::new(config, sink, event_tx, connection_tx);
        tokio::spawn(controller.run(command_rx, connection_rx));

        (
            Self {
                commands: command_tx,
            },
            event_rx,
        )
    }

    /// Connects to the camera. Does nothing if already started.
    pub fn start(&self) -> Result<(), SessionClosed> {
        self.send(Command::Start)
    }

    /// Disconnects and cancels pending timers. Safe to call repeatedly.
    pub fn stop(&self) -> Result<(), SessionClosed> {
        self.send(Command::Stop)
    }

    pub fn set_sensitivity_mode(&self, mode: CameraSensitivityMode) -> Result<(), SessionClosed> {
        self.send(Command::SetSensitivityMode(mode))
    }

    /// Tells the session whether it is light outside, for the auto mode.
    pub fn set_daylight(&self, daylight: Option<Daylight>) -> Result<(), SessionClosed> {
        self.send(Command::SetDaylight(daylight))
    }

    /// Stops the session and waits for the controller task to exit.
    pub async fn shutdown(&self) {
        if self.send(Command::Shutdown).is_ok() {
            self.commands.closed().await;
        }
    }

    pub fn is_closed(&self) -> bool {
        self.commands.is_closed()
    }

    fn send(&self, command: Command) -> Result<(), SessionClosed> {
        self.commands.send(command).map_err(|_| SessionClosed)
    }
}

struct SessionController<S> {
    config: RearviewConfig,
    policy: RetryPolicy,
    sink: S,
    events: mpsc::UnboundedSender<SessionEvent>,
    connection_tx: mpsc::Sender<ConnectionMessage>,

    started: bool,
    endpoint: Option<SocketAddr>,
    connection: Option<Connection>,
    parser: H264StreamParser,
    monitor: FrameFreshnessMonitor,
    freshness_armed: bool,
    retry_at: Option<Instant>,
    has_received_initial_frame: bool,
    reconnecting: bool,

    mode: CameraSensitivityMode,
    daylight: Option<Daylight>,
    adjuster: Option<CameraOptionsAdjuster>,
    control_task: Option<JoinHandle<()>>,
}

impl<S: DisplaySink> SessionController<S> {
    fn new(
        config: RearviewConfig,
        sink: S,
        events: mpsc::UnboundedSender<SessionEvent>,
        connection_tx: mpsc::Sender<ConnectionMessage>,
    ) -> Self {
        Self {
            policy: config.retry_policy(),
            monitor: FrameFreshnessMonitor::new(config.frame_expiration()),
            config,
            sink,
            events,
            connection_tx,
            started: false,
            endpoint: None,
            connection: None,
            parser: H264StreamParser::new(),
            freshness_armed: false,
            retry_at: None,
            has_received_initial_frame: false,
            reconnecting: false,
            mode: CameraSensitivityMode::default(),
            daylight: None,
            adjuster: None,
            control_task: None,
        }
    }

    async fn run(
        mut self,
        mut commands: mpsc::UnboundedReceiver<Command>,
        mut connection_rx: mpsc::Receiver<ConnectionMessage>,
    ) {
        let mut freshness_ticker = tokio::time::interval(self.config.freshness_period());
        freshness_ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            let retry_at = self.retry_at;
            let retry = async move {
                match retry_at {
                    Some(deadline) => tokio::time::sleep_until(deadline).await,
                    None => std::future::pending().await,
                }
            };

            tokio::select! {
                biased;
                command = commands.recv() => match command {
                    Some(Command::Shutdown) | None => break,
                    Some(command) => self.handle_command(command),
                },
                Some(message) = connection_rx.recv() => {
                    self.handle_connection_message(message, Instant::now());
                }
                _ = retry => self.fire_retry(),
                _ = freshness_ticker.tick(), if self.freshness_armed => {
                    self.check_freshness(Instant::now());
                }
            }
        }

        self.stop();
        if let Some(task) = self.control_task.take() {
            task.abort();
        }
        debug!("Rearview session task exiting");
    }

    fn handle_command(&mut self, command: Command) {
        match command {
            Command::Start => self.start(),
            Command::Stop => self.stop(),
            Command::SetSensitivityMode(mode) => self.set_sensitivity_mode(mode),
            Command::SetDaylight(daylight) => self.set_daylight(daylight),
            Command::Shutdown => self.stop(),
        }
    }

    fn emit(&self, event: SessionEvent) {
        let _ = self.events.send(event);
    }

    fn start(&mut self) {
        if self.started {
            debug!("Session already started");
            return;
        }

        let host: CameraHost = match self.config.camera_address.parse() {
            Ok(host) => host,
            Err(e) => {
                error!("Cannot start session: {e}");
                self.emit(SessionEvent::InvalidAddress(e));
                return;
            }
        };

        info!("Starting rearview session with camera {host}");
        self.endpoint = Some(host.socket_addr(self.config.video_port));
        self.started = true;
        self.has_received_initial_frame = false;

        if self.config.camera_control_enabled && self.adjuster.is_none() {
            match CameraOptionsAdjuster::new(&self.config) {
                Ok(adjuster) => self.adjuster = Some(adjuster),
                Err(e) => warn!("Camera control unavailable: {e}"),
            }
        }
        self.apply_camera_mode(0);
        self.connect();
    }

    /// Replaces the current connection with a fresh one.
    fn connect(&mut self) {
        let Some(endpoint) = self.endpoint else {
            return;
        };
        if let Some(mut previous) = self.connection.take() {
            previous.disconnect();
        }

        self.parser.reset_stream();
        let mut connection =
            Connection::with_endpoint(endpoint, self.config.connection_options());
        let connection_id = connection.id();
        connection.connect(self.connection_tx.clone());
        self.connection = Some(connection);
        self.emit(SessionEvent::Connecting { connection_id });
    }

    fn stop(&mut self) {
        self.retry_at = None;
        self.freshness_armed = false;
        self.monitor.reset();
        if let Some(mut connection) = self.connection.take() {
            connection.disconnect();
        }
        if self.reconnecting {
            self.reconnecting = false;
            self.sink.set_reconnecting(false);
        }

        if self.started {
            info!("Stopping rearview session");
            self.started = false;
            self.sink.flush_and_remove_image();
            self.emit(SessionEvent::Stopped);
        }
    }

    fn fire_retry(&mut self) {
        self.retry_at = None;
        if self.started {
            debug!("Reconnecting to camera");
            self.connect();
        }
    }

    fn handle_connection_message(&mut self, message: ConnectionMessage, now: Instant) {
        let current = self.connection.as_ref().map(Connection::id);
        if current != Some(message.connection_id) {
            trace!(
                "Ignoring {:?} from superseded connection {}",
                message.event,
                message.connection_id
            );
            return;
        }

        match message.event {
            ConnectionEvent::Established => self.on_established(message.connection_id),
            ConnectionEvent::Data(bytes) => self.on_data(&bytes, now),
            ConnectionEvent::Terminated(reason) => self.on_terminated(reason, now),
        }
    }

    fn on_established(&mut self, connection_id: u64) {
        info!("Connection {connection_id} established");
        if self.reconnecting {
            self.reconnecting = false;
            self.sink.set_reconnecting(false);
        }
        self.has_received_initial_frame = false;
        self.freshness_armed = true;

        if self
            .adjuster
            .as_ref()
            .is_some_and(CameraOptionsAdjuster::last_request_failed)
        {
            self.apply_camera_mode(RECONNECT_CONTROL_RETRY_COUNT);
        }
        self.emit(SessionEvent::Established { connection_id });
    }

    fn on_data(&mut self, bytes: &[u8], now: Instant) {
        for event in self.parser.parse_to_vec(bytes) {
            match event {
                ParseEvent::Frame(frame) => {
                    self.monitor.record_frame(now);
                    if !self.has_received_initial_frame {
                        self.has_received_initial_frame = true;
                        self.sink.fade_in();
                    }
                    self.sink.enqueue(frame);
                }
                ParseEvent::FormatError(e) => {
                    warn!("Unusable parameter sets: {e}");
                    self.emit(SessionEvent::DecodeError(e));
                }
            }
        }
    }

    fn on_terminated(&mut self, reason: TerminationReason, now: Instant) {
        self.connection = None;
        let Some(plan) = self.policy.plan(reason) else {
            info!("Connection closed by client");
            self.emit(SessionEvent::Terminated {
                reason,
                retry_after: None,
            });
            self.stop();
            return;
        };

        info!("Connection terminated ({reason}), retrying in {:?}", plan.delay);
        if plan.clear_display {
            self.sink.flush_and_remove_image();
            self.monitor.reset();
        }
        if plan.show_reconnecting && !self.reconnecting {
            self.reconnecting = true;
            self.sink.set_reconnecting(true);
        }
        self.retry_at = Some(now + plan.delay);
        self.emit(SessionEvent::Terminated {
            reason,
            retry_after: Some(plan.delay),
        });
    }

    fn check_freshness(&mut self, now: Instant) {
        if self.monitor.check(now) {
            debug!("No frame for {:?}, clearing display", self.monitor.expiration());
            self.sink.flush_and_remove_image();
            self.emit(SessionEvent::FrameExpired);
        }
    }

    fn set_sensitivity_mode(&mut self, mode: CameraSensitivityMode) {
        self.mode = mode;
        if self.started {
            self.apply_camera_mode(0);
        }
    }

    fn set_daylight(&mut self, daylight: Option<Daylight>) {
        let changed = self.daylight != daylight;
        self.daylight = daylight;
        if changed && self.started && self.mode == CameraSensitivityMode::Auto {
            self.apply_camera_mode(0);
        }
    }

    /// Sends the current mode in the background. A newer request replaces
    /// one that is still retrying.
    fn apply_camera_mode(&mut self, max_retry_count: u32) {
        let Some(adjuster) = self.adjuster.clone() else {
            return;
        };
        if let Some(task) = self.control_task.take() {
            task.abort();
        }

        let mode = self.mode;
        let daylight = self.daylight;
        self.control_task = Some(tokio::spawn(async move {
            if let Err(e) = adjuster.apply(mode, daylight, max_retry_count).await {
                warn!("Failed to apply camera sensitivity mode {mode}: {e}");
            }
        }));
    }
}
