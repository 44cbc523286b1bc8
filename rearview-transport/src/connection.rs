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

//! A single TCP connection to the camera's video port.
//!
//! A [`Connection`] goes through `NotStarted -> Connecting -> Ready ->
//! Terminated` exactly once. Everything it has to say is pushed as a
//! [`ConnectionMessage`] onto a channel owned by whoever started it: one
//! `Established`, any number of `Data` chunks, and exactly one `Terminated`
//! carrying the reason. A terminated connection is never restarted; callers
//! build a new one to retry.
//!
//! # Example
//!
//! ```no_run
//! use rearview_transport::{Connection, ConnectionEvent, ConnectionOptions};
//! use tokio::sync::mpsc;
//!
//! # async fn example() -> anyhow::Result<()> {
//! let (tx, mut rx) = mpsc::channel(64);
//! let mut connection = Connection::new("192.168.1.20", 5001, ConnectionOptions::default())?;
//! connection.connect(tx);
//!
//! while let Some(message) = rx.recv().await {
//!     match message.event {
//!         ConnectionEvent::Established => println!("connected"),
//!         ConnectionEvent::Data(bytes) => println!("received {} bytes", bytes.len()),
//!         ConnectionEvent::Terminated(reason) => {
//!             println!("terminated: {reason}");
//!             break;
//!         }
//!     }
//! }
//! # Ok(())
//! # }
//! ```

use crate::address::{AddressError, CameraHost};
use bytes::{Bytes, BytesMut};
use log::{debug, info, trace, warn};
use std::fmt;
use std::io;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tokio::io::AsyncReadExt;
use tokio::net::TcpStream;
use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tokio::time::error::Elapsed;
use tokio::time::timeout;

/// Default time allowed for the TCP handshake.
pub const DEFAULT_ESTABLISHMENT_TIMEOUT: Duration = Duration::from_secs(1);
/// Default time a ready connection may go without receiving anything.
pub const DEFAULT_DROP_TIMEOUT: Duration = Duration::from_secs(1);
/// A receive completes once at least this many bytes are buffered.
pub const DEFAULT_MINIMUM_INCOMPLETE_LENGTH: usize = 500;
/// Upper bound on a single delivered chunk.
pub const DEFAULT_MAXIMUM_LENGTH: usize = 100_000;

static NEXT_CONNECTION_ID: AtomicU64 = AtomicU64::new(1);

/// Why a connection ended. Every connection reports exactly one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TerminationReason {
    /// The handshake failed, e.g. connection refused or no route to host.
    EstablishmentFailure,
    /// The handshake did not complete within the establishment timeout.
    EstablishmentTimeout,
    /// The owner disconnected or dropped the connection.
    ClosedByClient,
    /// The peer closed the stream cleanly.
    ClosedByServer,
    /// The stream failed after it was established.
    UnexpectedDisconnection,
    /// Nothing arrived within the drop timeout after the connection was ready.
    ConnectionDropTimeout,
}

impl TerminationReason {
    pub const ALL: [TerminationReason; 6] = [
        TerminationReason::EstablishmentFailure,
        TerminationReason::EstablishmentTimeout,
        TerminationReason::ClosedByClient,
        TerminationReason::ClosedByServer,
        TerminationReason::UnexpectedDisconnection,
        TerminationReason::ConnectionDropTimeout,
    ];

    /// Everything except a client-initiated close is worth retrying.
    pub fn is_retryable(&self) -> bool {
        *self != TerminationReason::ClosedByClient
    }
}

impl fmt::Display for TerminationReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            TerminationReason::EstablishmentFailure => "establishment failure",
            TerminationReason::EstablishmentTimeout => "establishment timeout",
            TerminationReason::ClosedByClient => "closed by client",
            TerminationReason::ClosedByServer => "closed by server",
            TerminationReason::UnexpectedDisconnection => "unexpected disconnection",
            TerminationReason::ConnectionDropTimeout => "connection drop timeout",
        };
        f.write_str(text)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    NotStarted,
    Connecting,
    Ready,
    Terminated(TerminationReason),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConnectionEvent {
    /// The handshake completed. Sent at most once.
    Established,
    /// A non-empty chunk of the byte stream, in arrival order.
    Data(Bytes),
    /// The connection is over. Always the last event.
    Terminated(TerminationReason),
}

/// An event tagged with the connection that produced it, so a consumer that
/// replaces connections can ignore stragglers from an older one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectionMessage {
    pub connection_id: u64,
    pub event: ConnectionEvent,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConnectionOptions {
    pub establishment_timeout: Duration,
    pub drop_timeout: Duration,
    pub minimum_incomplete_length: usize,
    pub maximum_length: usize,
}

impl Default for ConnectionOptions {
    fn default() -> Self {
        Self {
            establishment_timeout: DEFAULT_ESTABLISHMENT_TIMEOUT,
            drop_timeout: DEFAULT_DROP_TIMEOUT,
            minimum_incomplete_length: DEFAULT_MINIMUM_INCOMPLETE_LENGTH,
            maximum_length: DEFAULT_MAXIMUM_LENGTH,
        }
    }
}

/// A TCP client connection to the camera's video stream.
pub struct Connection {
    id: u64,
    endpoint: SocketAddr,
    options: ConnectionOptions,
    state_tx: Option<watch::Sender<ConnectionState>>,
    state_rx: watch::Receiver<ConnectionState>,
    cancel: Option<oneshot::Sender<()>>,
    task: Option<JoinHandle<()>>,
}

impl fmt::Debug for Connection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Connection")
            .field("id", &self.id)
            .field("endpoint", &self.endpoint)
            .field("state", &self.state())
            .finish()
    }
}

impl Connection {
    /// Creates a connection to `host:port` without starting it.
    ///
    /// `host` must be a literal IPv4 or IPv6 address; anything else is
    /// rejected here rather than failing later at connect time.
    pub fn new(host: &str, port: u16, options: ConnectionOptions) -> Result<Self, AddressError> {
        let host: CameraHost = host.parse()?;
        Ok(Self::with_endpoint(host.socket_addr(port), options))
    }

    pub fn with_endpoint(endpoint: SocketAddr, options: ConnectionOptions) -> Self {
        let (state_tx, state_rx) = watch::channel(ConnectionState::NotStarted);
        Self {
            id: NEXT_CONNECTION_ID.fetch_add(1, Ordering::Relaxed),
            endpoint,
            options,
            state_tx: Some(state_tx),
            state_rx,
            cancel: None,
            task: None,
        }
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn endpoint(&self) -> SocketAddr {
        self.endpoint
    }

    pub fn state(&self) -> ConnectionState {
        *self.state_rx.borrow()
    }

    /// Starts connecting on a background task. Events go to `events`.
    ///
    /// Must be called from within a tokio runtime. Calling it again, or
    /// after [`disconnect`](Self::disconnect), does nothing.
    pub fn connect(&mut self, events: mpsc::Sender<ConnectionMessage>) {
        let Some(state_tx) = self.state_tx.take() else {
            warn!("Connection {} cannot be started twice", self.id);
            return;
        };

        info!("Connection {} connecting to {}", self.id, self.endpoint);
        let (cancel_tx, cancel_rx) = oneshot::channel();
        self.cancel = Some(cancel_tx);
        self.task = Some(tokio::spawn(run(
            self.id,
            self.endpoint,
            self.options,
            state_tx,
            cancel_rx,
            events,
        )));
    }

    /// Closes the connection from our side.
    ///
    /// The owner still receives `Terminated(ClosedByClient)` unless the
    /// connection had already terminated for another reason.
    pub fn disconnect(&mut self) {
        if let Some(cancel) = self.cancel.take() {
            debug!("Connection {} disconnect requested", self.id);
            let _ = cancel.send(());
        } else if let Some(state_tx) = self.state_tx.take() {
            // Never started: nobody is listening for events yet.
            let _ = state_tx.send(ConnectionState::Terminated(TerminationReason::ClosedByClient));
        }
    }

    pub fn is_terminated(&self) -> bool {
        matches!(self.state(), ConnectionState::Terminated(_))
    }
}

impl Drop for Connection {
    fn drop(&mut self) {
        // Dropping the cancel sender is enough to stop the task; it reports
        // ClosedByClient if the receiver is still around.
        self.cancel.take();
        self.task.take();
    }
}

async fn run(
    id: u64,
    endpoint: SocketAddr,
    options: ConnectionOptions,
    state_tx: watch::Sender<ConnectionState>,
    mut cancel: oneshot::Receiver<()>,
    events: mpsc::Sender<ConnectionMessage>,
) {
    let _ = state_tx.send(ConnectionState::Connecting);

    let reason = tokio::select! {
        biased;
        // A dropped sender is a cancellation too.
        _ = &mut cancel => TerminationReason::ClosedByClient,
        reason = establish_and_receive(id, endpoint, options, &state_tx, &events) => reason,
    };

    info!("Connection {} to {} terminated: {}", id, endpoint, reason);
    let _ = state_tx.send(ConnectionState::Terminated(reason));
    let _ = events
        .send(ConnectionMessage {
            connection_id: id,
            event: ConnectionEvent::Terminated(reason),
        })
        .await;
}

async fn establish_and_receive(
    id: u64,
    endpoint: SocketAddr,
    options: ConnectionOptions,
    state_tx: &watch::Sender<ConnectionState>,
    events: &mpsc::Sender<ConnectionMessage>,
) -> TerminationReason {
    let attempt = timeout(options.establishment_timeout, TcpStream::connect(endpoint)).await;
    let mut stream = match establishment_outcome(attempt) {
        Ok(stream) => stream,
        Err(reason) => {
            warn!("Connection {} to {} failed: {}", id, endpoint, reason);
            return reason;
        }
    };

    let _ = state_tx.send(ConnectionState::Ready);
    info!("Connection {} established with {}", id, endpoint);
    let send = |event: ConnectionEvent| {
        events.send(ConnectionMessage {
            connection_id: id,
            event,
        })
    };
    if send(ConnectionEvent::Established).await.is_err() {
        return TerminationReason::ClosedByClient;
    }

    let mut buffer = BytesMut::with_capacity(options.maximum_length);
    loop {
        let outcome = receive(&mut stream, &mut buffer, &options).await;

        if !buffer.is_empty() {
            let chunk = buffer.split().freeze();
            trace!("Connection {} received {} bytes", id, chunk.len());
            if send(ConnectionEvent::Data(chunk)).await.is_err() {
                // Nobody is listening anymore.
                return TerminationReason::ClosedByClient;
            }
        }

        match outcome {
            Receive::Ready => {}
            Receive::EndOfStream => return TerminationReason::ClosedByServer,
            Receive::TimedOut => return TerminationReason::ConnectionDropTimeout,
            Receive::Failed(e) => {
                warn!("Connection {} read error: {}", id, e);
                return read_failure(&e);
            }
        }
    }
}

enum Receive {
    /// At least the minimum length is buffered.
    Ready,
    EndOfStream,
    TimedOut,
    Failed(io::Error),
}

/// Reads until `buffer` holds at least `minimum_incomplete_length` bytes, never
/// more than `maximum_length`. Each individual read is bounded by the drop
/// timeout.
async fn receive(stream: &mut TcpStream, buffer: &mut BytesMut, options: &ConnectionOptions) -> Receive {
    let minimum = options.minimum_incomplete_length.clamp(1, options.maximum_length);

    while buffer.len() < minimum {
        let room = options.maximum_length - buffer.len();
        buffer.reserve(room);
        let mut limited = (&mut *stream).take(room as u64);
        match timeout(options.drop_timeout, limited.read_buf(buffer)).await {
            Err(_) => return Receive::TimedOut,
            Ok(Ok(0)) => return Receive::EndOfStream,
            Ok(Ok(_)) => {}
            Ok(Err(e)) => return Receive::Failed(e),
        }
    }
    Receive::Ready
}

/// Maps a connect attempt bounded by the establishment timeout onto the
/// connected stream or the reason it never got there.
fn establishment_outcome<T>(
    attempt: Result<io::Result<T>, Elapsed>,
) -> Result<T, TerminationReason> {
    match attempt {
        Ok(Ok(stream)) => Ok(stream),
        Ok(Err(e)) if is_timeout(&e) => Err(TerminationReason::EstablishmentTimeout),
        Ok(Err(e)) => {
            debug!("Connect error: {}", e);
            Err(TerminationReason::EstablishmentFailure)
        }
        Err(_) => Err(TerminationReason::EstablishmentTimeout),
    }
}

fn read_failure(e: &io::Error) -> TerminationReason {
    if is_timeout(e) {
        TerminationReason::ConnectionDropTimeout
    } else {
        TerminationReason::UnexpectedDisconnection
    }
}

fn is_timeout(e: &io::Error) -> bool {
    e.kind() == io::ErrorKind::TimedOut
}
