//! Error taxonomy for the synchronization core.
//!
//! Only [`HandshakeError`] is allowed to abort startup. Send and receive
//! failures are reported to the render thread as values so a frame never
//! unwinds because of the network.

use std::io;
use std::time::Duration;

use shared::codec::EncodeError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConnectionError {
    #[error("failed to resolve server address {addr}: {source}")]
    Resolve {
        addr: String,
        #[source]
        source: io::Error,
    },
    #[error("server address {0} resolved to nothing")]
    NoAddress(String),
    #[error("invalid local bind address {0}")]
    InvalidBind(String),
    #[error("failed to bind local socket {addr}: {source}")]
    Bind {
        addr: String,
        #[source]
        source: io::Error,
    },
    #[error("failed to connect to {addr}: {source}")]
    Connect {
        addr: String,
        #[source]
        source: io::Error,
    },
}

#[derive(Debug, Error)]
pub enum SendError {
    #[error(transparent)]
    Encode(#[from] EncodeError),
    #[error("transport write failed: {0}")]
    Io(#[from] io::Error),
    #[error("outbound queue is full, message dropped")]
    QueueFull,
    #[error("session is closed")]
    Closed,
}

#[derive(Debug, Error)]
pub enum ReceiveError {
    #[error("transport read failed: {0}")]
    Io(#[from] io::Error),
    #[error("connection closed by peer")]
    Closed,
    #[error("frame of {len} bytes exceeds the {max} byte limit")]
    FrameTooLarge { len: usize, max: usize },
}

#[derive(Debug, Error)]
pub enum HandshakeError {
    #[error(transparent)]
    Connection(#[from] ConnectionError),
    #[error("failed to send identity request: {0}")]
    Send(#[from] SendError),
    #[error("failed to receive identity response: {0}")]
    Receive(#[from] ReceiveError),
    #[error("no identity response within {0:?}")]
    Timeout(Duration),
    #[error("server closed the connection during the handshake")]
    UnexpectedClose,
}
