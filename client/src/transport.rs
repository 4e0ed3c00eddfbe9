//! Byte transports to the server.
//!
//! Both variants carry one encoded message per unit: a datagram for UDP, a
//! length-prefixed frame for TCP. The connection is split into a writer and a
//! reader so the receive loop and the outbound writer can run as separate
//! tasks.

use std::net::{IpAddr, Ipv4Addr, Ipv6Addr, SocketAddr};
use std::sync::Arc;

use bytes::{BufMut, BytesMut};
use log::debug;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::{lookup_host, TcpSocket, TcpStream, UdpSocket};

use crate::config::TransportKind;
use crate::error::{ConnectionError, ReceiveError, SendError};

pub const MAX_DATAGRAM_SIZE: usize = 64 * 1024;
pub const MAX_FRAME_SIZE: usize = 1024 * 1024;

pub enum FrameWriter {
    Datagram(Arc<UdpSocket>),
    Stream(OwnedWriteHalf),
}

pub enum FrameReader {
    Datagram { socket: Arc<UdpSocket>, buf: Vec<u8> },
    Stream(OwnedReadHalf),
}

/// Opens a connection of the requested kind.
///
/// `bind_hint` pins the local address; without it the OS picks one.
pub async fn connect(
    kind: TransportKind,
    server_addr: &str,
    bind_hint: Option<&str>,
) -> Result<(FrameWriter, FrameReader), ConnectionError> {
    let server = resolve(server_addr).await?;
    let bind = match bind_hint {
        Some(hint) => Some(
            hint.parse::<SocketAddr>()
                .map_err(|_| ConnectionError::InvalidBind(hint.to_string()))?,
        ),
        None => None,
    };

    match kind {
        TransportKind::Datagram => connect_datagram(server, bind).await,
        TransportKind::Stream => connect_stream(server, bind).await,
    }
}

async fn resolve(server_addr: &str) -> Result<SocketAddr, ConnectionError> {
    let mut addrs = lookup_host(server_addr)
        .await
        .map_err(|source| ConnectionError::Resolve {
            addr: server_addr.to_string(),
            source,
        })?;
    addrs
        .next()
        .ok_or_else(|| ConnectionError::NoAddress(server_addr.to_string()))
}

fn unspecified_for(server: &SocketAddr) -> SocketAddr {
    let ip = match server.ip() {
        IpAddr::V4(_) => IpAddr::V4(Ipv4Addr::UNSPECIFIED),
        IpAddr::V6(_) => IpAddr::V6(Ipv6Addr::UNSPECIFIED),
    };
    SocketAddr::new(ip, 0)
}

async fn connect_datagram(
    server: SocketAddr,
    bind: Option<SocketAddr>,
) -> Result<(FrameWriter, FrameReader), ConnectionError> {
    let local = bind.unwrap_or_else(|| unspecified_for(&server));
    let socket = UdpSocket::bind(local)
        .await
        .map_err(|source| ConnectionError::Bind {
            addr: local.to_string(),
            source,
        })?;
    socket
        .connect(server)
        .await
        .map_err(|source| ConnectionError::Connect {
            addr: server.to_string(),
            source,
        })?;
    debug!("UDP socket {:?} connected to {}", socket.local_addr().ok(), server);

    let socket = Arc::new(socket);
    Ok((
        FrameWriter::Datagram(Arc::clone(&socket)),
        FrameReader::Datagram {
            socket,
            buf: vec![0u8; MAX_DATAGRAM_SIZE],
        },
    ))
}

async fn connect_stream(
    server: SocketAddr,
    bind: Option<SocketAddr>,
) -> Result<(FrameWriter, FrameReader), ConnectionError> {
    let connect_err = |source| ConnectionError::Connect {
        addr: server.to_string(),
        source,
    };

    let stream = match bind {
        Some(local) => {
            let socket = match server {
                SocketAddr::V4(_) => TcpSocket::new_v4(),
                SocketAddr::V6(_) => TcpSocket::new_v6(),
            }
            .map_err(connect_err)?;
            socket.bind(local).map_err(|source| ConnectionError::Bind {
                addr: local.to_string(),
                source,
            })?;
            socket.connect(server).await.map_err(connect_err)?
        }
        None => TcpStream::connect(server).await.map_err(connect_err)?,
    };
    stream.set_nodelay(true).map_err(connect_err)?;
    debug!("TCP stream connected to {}", server);

    let (read, write) = stream.into_split();
    Ok((FrameWriter::Stream(write), FrameReader::Stream(read)))
}

impl FrameWriter {
    pub async fn send(&mut self, payload: &[u8]) -> Result<(), SendError> {
        match self {
            FrameWriter::Datagram(socket) => {
                socket.send(payload).await?;
            }
            FrameWriter::Stream(stream) => {
                let mut frame = BytesMut::with_capacity(4 + payload.len());
                frame.put_u32(payload.len() as u32);
                frame.extend_from_slice(payload);
                stream.write_all(&frame).await?;
            }
        }
        Ok(())
    }

    /// Closes the sending side. Datagram sockets have nothing to flush.
    pub async fn close(&mut self) {
        if let FrameWriter::Stream(stream) = self {
            if let Err(e) = stream.shutdown().await {
                debug!("Stream shutdown: {}", e);
            }
        }
    }
}

impl FrameReader {
    /// Blocks until the next complete message arrives.
    pub async fn recv(&mut self) -> Result<Vec<u8>, ReceiveError> {
        match self {
            FrameReader::Datagram { socket, buf } => {
                let len = socket.recv(buf).await?;
                Ok(buf[..len].to_vec())
            }
            FrameReader::Stream(stream) => {
                let mut len_buf = [0u8; 4];
                read_exact_or_closed(stream, &mut len_buf).await?;
                let len = u32::from_be_bytes(len_buf) as usize;
                if len > MAX_FRAME_SIZE {
                    return Err(ReceiveError::FrameTooLarge {
                        len,
                        max: MAX_FRAME_SIZE,
                    });
                }
                let mut payload = vec![0u8; len];
                read_exact_or_closed(stream, &mut payload).await?;
                Ok(payload)
            }
        }
    }
}

async fn read_exact_or_closed(
    stream: &mut OwnedReadHalf,
    buf: &mut [u8],
) -> Result<(), ReceiveError> {
    match stream.read_exact(buf).await {
        Ok(_) => Ok(()),
        Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => Err(ReceiveError::Closed),
        Err(e) => Err(ReceiveError::Io(e)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::net::TcpListener;

    #[tokio::test]
    async fn test_datagram_roundtrip_through_echo() {
        let echo = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        let echo_addr = echo.local_addr().unwrap().to_string();
        tokio::spawn(async move {
            let mut buf = [0u8; 1024];
            if let Ok((len, from)) = echo.recv_from(&mut buf).await {
                let _ = echo.send_to(&buf[..len], from).await;
            }
        });

        let (mut writer, mut reader) = connect(TransportKind::Datagram, &echo_addr, None)
            .await
            .unwrap();
        writer.send(b"hello").await.unwrap();
        assert_eq!(reader.recv().await.unwrap(), b"hello");
    }

    #[tokio::test]
    async fn test_stream_frames_are_length_prefixed() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap().to_string();
        let server = tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut len = [0u8; 4];
            socket.read_exact(&mut len).await.unwrap();
            let mut payload = vec![0u8; u32::from_be_bytes(len) as usize];
            socket.read_exact(&mut payload).await.unwrap();
            socket.write_all(&len).await.unwrap();
            socket.write_all(&payload).await.unwrap();
            payload
        });

        let (mut writer, mut reader) = connect(TransportKind::Stream, &addr, None)
            .await
            .unwrap();
        writer.send(br#"{"id":1}"#).await.unwrap();
        assert_eq!(reader.recv().await.unwrap(), br#"{"id":1}"#);
        assert_eq!(server.await.unwrap(), br#"{"id":1}"#);
    }

    #[tokio::test]
    async fn test_stream_peer_close_is_reported() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap().to_string();
        tokio::spawn(async move {
            let (socket, _) = listener.accept().await.unwrap();
            drop(socket);
        });

        let (_writer, mut reader) = connect(TransportKind::Stream, &addr, None)
            .await
            .unwrap();
        assert!(matches!(reader.recv().await, Err(ReceiveError::Closed)));
    }

    #[tokio::test]
    async fn test_oversized_frame_is_rejected() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap().to_string();
        tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let len = (MAX_FRAME_SIZE as u32 + 1).to_be_bytes();
            let _ = socket.write_all(&len).await;
            tokio::time::sleep(std::time::Duration::from_millis(100)).await;
        });

        let (_writer, mut reader) = connect(TransportKind::Stream, &addr, None)
            .await
            .unwrap();
        assert!(matches!(
            reader.recv().await,
            Err(ReceiveError::FrameTooLarge { .. })
        ));
    }

    #[tokio::test]
    async fn test_invalid_bind_hint() {
        let result = connect(TransportKind::Datagram, "127.0.0.1:9", Some("not-an-addr")).await;
        assert!(matches!(result, Err(ConnectionError::InvalidBind(_))));
    }
}
