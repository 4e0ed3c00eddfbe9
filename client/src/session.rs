//! Transport session: handshake plus the background receive and write loops.
//!
//! The render thread never touches the socket. Decoded snapshots are queued
//! for [`Session::poll_event`] and outbound messages are queued by
//! [`Session::send`]; both sides are bounded and non-blocking.

use std::time::Duration;

use log::{debug, info, warn};
use shared::codec::{decode_server, encode_client};
use shared::{
    Action, ActionMessage, ClientMessage, IdentityRequest, PlayerId, Pose, PositionUpdate,
    ServerMessage, Snapshot,
};
use tokio::runtime::Handle;
use tokio::sync::mpsc::error::{TryRecvError, TrySendError};
use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tokio::time::{interval, timeout};

use crate::config::ClientConfig;
use crate::error::{HandshakeError, ReceiveError, SendError};
use crate::transport::{self, FrameReader, FrameWriter};

/// Datagrams can be lost, so the identity request is repeated at this rate
/// until the server answers.
const HANDSHAKE_RESEND: Duration = Duration::from_millis(500);

#[derive(Debug, Clone, PartialEq)]
pub enum SessionEvent {
    Snapshot(Snapshot),
    /// The connection ended; no further events follow.
    Closed(String),
}

/// What the synchronization core needs from a session.
pub trait SessionLink {
    fn player_id(&self) -> PlayerId;
    fn poll_event(&mut self) -> Option<SessionEvent>;
    fn send(&mut self, msg: &ClientMessage) -> Result<(), SendError>;
    fn shutdown(&mut self);
}

/// Joins the server in the background for levels that need a session.
pub trait Connector {
    type Link: SessionLink + 'static;

    /// Starts joining with `config`, replacing any attempt still running.
    fn begin(&mut self, config: &ClientConfig);
    /// The session once joining finished, or why it failed. `None` while the
    /// attempt is still running or none was started.
    fn poll(&mut self) -> Option<Result<Self::Link, String>>;
}

#[derive(Debug)]
pub struct Session {
    player_id: PlayerId,
    outbound: mpsc::Sender<Vec<u8>>,
    inbound: mpsc::Receiver<SessionEvent>,
    shutdown: watch::Sender<bool>,
    tasks: Vec<JoinHandle<()>>,
    closed: bool,
    close_reported: bool,
}

impl Session {
    /// Connects, performs the identity handshake and starts the background
    /// loops. Must be called from within a tokio runtime.
    pub async fn connect(config: &ClientConfig) -> Result<Self, HandshakeError> {
        info!(
            "Connecting to {} over {:?} as {:?}",
            config.server_addr, config.transport, config.player_name
        );

        let (mut writer, mut reader) = transport::connect(
            config.transport,
            &config.server_addr,
            config.bind_addr.as_deref(),
        )
        .await?;

        let request = encode_client(&ClientMessage::Identity(IdentityRequest::new(
            config.player_name.clone(),
            config.player_skin.clone(),
        )))
        .map_err(SendError::from)?;

        let wait = config.handshake_timeout();
        let player_id = timeout(wait, handshake(&mut writer, &mut reader, &request))
            .await
            .map_err(|_| HandshakeError::Timeout(wait))??;

        info!("Handshake complete, assigned player id {}", player_id);

        Ok(Self::start(
            player_id,
            writer,
            reader,
            config.outbound_queue,
            config.inbound_queue,
        ))
    }

    fn start(
        player_id: PlayerId,
        writer: FrameWriter,
        reader: FrameReader,
        outbound_capacity: usize,
        inbound_capacity: usize,
    ) -> Self {
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let (outbound_tx, outbound_rx) = mpsc::channel(outbound_capacity.max(1));
        let (inbound_tx, inbound_rx) = mpsc::channel(inbound_capacity.max(1));

        let tasks = vec![
            tokio::spawn(receive_loop(reader, inbound_tx, shutdown_rx.clone())),
            tokio::spawn(write_loop(writer, outbound_rx, shutdown_rx)),
        ];

        Self {
            player_id,
            outbound: outbound_tx,
            inbound: inbound_rx,
            shutdown: shutdown_tx,
            tasks,
            closed: false,
            close_reported: false,
        }
    }

    pub fn player_id(&self) -> PlayerId {
        self.player_id
    }

    pub fn is_closed(&self) -> bool {
        self.closed || self.close_reported
    }

    /// Returns the next inbound event without blocking.
    pub fn poll_event(&mut self) -> Option<SessionEvent> {
        if self.close_reported {
            return None;
        }
        match self.inbound.try_recv() {
            Ok(SessionEvent::Closed(reason)) => {
                self.close_reported = true;
                Some(SessionEvent::Closed(reason))
            }
            Ok(event) => Some(event),
            Err(TryRecvError::Empty) => None,
            Err(TryRecvError::Disconnected) => {
                self.close_reported = true;
                Some(SessionEvent::Closed("receive loop ended".to_string()))
            }
        }
    }

    /// Queues a message for the writer task. Never blocks; a full queue drops
    /// the message.
    pub fn send(&self, msg: &ClientMessage) -> Result<(), SendError> {
        if self.closed {
            return Err(SendError::Closed);
        }
        let frame = encode_client(msg)?;
        self.outbound.try_send(frame).map_err(|e| match e {
            TrySendError::Full(_) => SendError::QueueFull,
            TrySendError::Closed(_) => SendError::Closed,
        })
    }

    pub fn send_position(&self, pose: Pose, flip_x: bool) -> Result<(), SendError> {
        self.send(&ClientMessage::Position(PositionUpdate {
            id: self.player_id,
            x: pose.x,
            y: pose.y,
            flip_x,
        }))
    }

    pub fn send_action(&self, action: Action) -> Result<(), SendError> {
        self.send(&ClientMessage::Action(ActionMessage {
            id: self.player_id,
            action,
        }))
    }

    /// Signals both loops to stop and closes the transport. Safe to call more
    /// than once.
    pub fn shutdown(&mut self) {
        if self.closed {
            return;
        }
        self.closed = true;
        info!("Shutting down session for player {}", self.player_id);
        let _ = self.shutdown.send(true);
    }

    /// Waits for the background loops to finish.
    pub async fn join(&mut self) {
        for task in self.tasks.drain(..) {
            if let Err(e) = task.await {
                warn!("Session task failed: {}", e);
            }
        }
    }
}

impl SessionLink for Session {
    fn player_id(&self) -> PlayerId {
        Session::player_id(self)
    }

    fn poll_event(&mut self) -> Option<SessionEvent> {
        Session::poll_event(self)
    }

    fn send(&mut self, msg: &ClientMessage) -> Result<(), SendError> {
        Session::send(self, msg)
    }

    fn shutdown(&mut self) {
        Session::shutdown(self)
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        self.shutdown();
    }
}

/// [`Connector`] that runs [`Session::connect`] on a tokio runtime.
pub struct SessionConnector {
    runtime: Handle,
    pending: Option<oneshot::Receiver<Result<Session, HandshakeError>>>,
}

impl SessionConnector {
    pub fn new(runtime: Handle) -> Self {
        Self {
            runtime,
            pending: None,
        }
    }
}

impl Connector for SessionConnector {
    type Link = Session;

    fn begin(&mut self, config: &ClientConfig) {
        let (tx, rx) = oneshot::channel();
        let config = config.clone();
        self.runtime.spawn(async move {
            let _ = tx.send(Session::connect(&config).await);
        });
        self.pending = Some(rx);
    }

    fn poll(&mut self) -> Option<Result<Session, String>> {
        let pending = self.pending.as_mut()?;
        let result = match pending.try_recv() {
            Ok(result) => result.map_err(|e| e.to_string()),
            Err(oneshot::error::TryRecvError::Empty) => return None,
            Err(oneshot::error::TryRecvError::Closed) => {
                Err("connect task was cancelled".to_string())
            }
        };
        self.pending = None;
        Some(result)
    }
}

async fn handshake(
    writer: &mut FrameWriter,
    reader: &mut FrameReader,
    request: &[u8],
) -> Result<PlayerId, HandshakeError> {
    writer.send(request).await?;

    let resend = matches!(writer, FrameWriter::Datagram(_));
    let mut resend_timer = interval(HANDSHAKE_RESEND);
    resend_timer.tick().await;
    let mut attempts = 1u32;

    loop {
        tokio::select! {
            _ = resend_timer.tick(), if resend => {
                attempts += 1;
                debug!("Resending identity request (attempt {})", attempts);
                writer.send(request).await?;
            }
            received = reader.recv() => {
                let bytes = match received {
                    Ok(bytes) => bytes,
                    Err(ReceiveError::Closed) => return Err(HandshakeError::UnexpectedClose),
                    Err(e) => return Err(e.into()),
                };
                match decode_server(&bytes) {
                    Ok(ServerMessage::Identity(response)) => return Ok(response.id),
                    Ok(ServerMessage::Snapshot(_)) => {
                        debug!("Ignoring snapshot received before identity response");
                    }
                    Err(e) => warn!("Discarding malformed handshake reply: {}", e),
                }
            }
        }
    }
}

async fn receive_loop(
    mut reader: FrameReader,
    events: mpsc::Sender<SessionEvent>,
    mut shutdown: watch::Receiver<bool>,
) {
    loop {
        let received = tokio::select! {
            _ = shutdown.changed() => {
                debug!("Receive loop stopping on shutdown");
                return;
            }
            received = reader.recv() => received,
        };

        match received {
            Ok(bytes) => match decode_server(&bytes) {
                Ok(ServerMessage::Snapshot(snapshot)) => {
                    match events.try_send(SessionEvent::Snapshot(snapshot)) {
                        Ok(()) => {}
                        Err(TrySendError::Full(_)) => {
                            warn!("Inbound queue full, dropping snapshot");
                        }
                        Err(TrySendError::Closed(_)) => return,
                    }
                }
                Ok(ServerMessage::Identity(response)) => {
                    debug!("Ignoring repeated identity response {}", response.id);
                }
                Err(e) => warn!("Discarding malformed message ({} bytes): {}", bytes.len(), e),
            },
            Err(e) => {
                warn!("Connection closed: {}", e);
                tokio::select! {
                    _ = events.send(SessionEvent::Closed(e.to_string())) => {}
                    _ = shutdown.changed() => {}
                }
                return;
            }
        }
    }
}

async fn write_loop(
    mut writer: FrameWriter,
    mut frames: mpsc::Receiver<Vec<u8>>,
    mut shutdown: watch::Receiver<bool>,
) {
    loop {
        tokio::select! {
            _ = shutdown.changed() => break,
            frame = frames.recv() => match frame {
                Some(frame) => {
                    if let Err(e) = writer.send(&frame).await {
                        warn!("Failed to send message: {}", e);
                    }
                }
                None => break,
            },
        }
    }
    writer.close().await;
    debug!("Write loop stopped");
}
