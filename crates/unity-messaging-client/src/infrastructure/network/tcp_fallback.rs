//! TCP side channel for frames too large for one datagram.
//!
//! # Outbound (`serve_frame`)
//!
//! ```text
//!   client                                   editor
//!     │ bind TcpListener on an ephemeral port   │
//!     │ ── UDP  Tcp "<port>:<frameLen>" ──────▶ │
//!     │ ◀───────────── TCP connect ──────────── │
//!     │ ── frame bytes, then shutdown ────────▶ │
//! ```
//!
//! # Inbound (`fetch_frame`)
//!
//! The editor announces its own listener the same way; the client connects to
//! `origin.ip:<port>` and reads exactly `<frameLen>` bytes.
//!
//! Both directions run under one overall timeout.  Any failure loses the
//! frame; nothing is retried.

use std::net::{IpAddr, SocketAddr};
use std::time::Duration;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream, UdpSocket};
use tokio::time::timeout;
use tracing::debug;
use unity_messaging_core::{
    encode_message,
    protocol::{codec::peek_frame_len, messages::HEADER_SIZE},
    TcpCoordination,
};

use crate::application::transport::TransportError;

/// Largest inbound frame the client agrees to buffer.
pub const MAX_FETCH_BYTES: usize = 64 * 1024 * 1024;

/// Announces a listener to `peer` over `socket` and streams `frame` to the
/// first connection it accepts.
///
/// # Errors
///
/// [`TransportError::TcpTimeout`] if the peer does not connect and receive
/// the frame within `wait`; [`TransportError::TcpFailed`] for socket errors.
pub async fn serve_frame(
    socket: &UdpSocket,
    peer: SocketAddr,
    bind_ip: IpAddr,
    frame: Vec<u8>,
    wait: Duration,
) -> Result<(), TransportError> {
    let listener = TcpListener::bind((bind_ip, 0))
        .await
        .map_err(TransportError::TcpFailed)?;
    let port = listener
        .local_addr()
        .map_err(TransportError::TcpFailed)?
        .port();

    let announce = encode_message(&TcpCoordination::new(port, frame.len()).to_message())?;
    socket
        .send_to(&announce, peer)
        .await
        .map_err(|source| TransportError::SendFailed { peer, source })?;
    debug!(%peer, port, bytes = frame.len(), "announced large frame");

    let exchange = async {
        let (mut stream, remote) = listener.accept().await.map_err(TransportError::TcpFailed)?;
        stream
            .write_all(&frame)
            .await
            .map_err(TransportError::TcpFailed)?;
        stream.shutdown().await.map_err(TransportError::TcpFailed)?;
        debug!(%remote, bytes = frame.len(), "large frame delivered");
        Ok::<_, TransportError>(())
    };

    timeout(wait, exchange)
        .await
        .map_err(|_| TransportError::TcpTimeout(wait))?
}

/// Connects to the listener announced by `origin` and reads the whole frame.
///
/// # Errors
///
/// [`TransportError::FrameTooLarge`] if the announced length exceeds
/// `max_len`; [`TransportError::LengthMismatch`] if the frame header
/// disagrees with the announcement; [`TransportError::ShortRead`] if the
/// stream ends early;
/// [`TransportError::TcpTimeout`] if the exchange takes longer than `wait`.
pub async fn fetch_frame(
    origin: SocketAddr,
    coordination: TcpCoordination,
    wait: Duration,
    max_len: usize,
) -> Result<Vec<u8>, TransportError> {
    let expected = coordination.length;
    if expected > max_len {
        return Err(TransportError::FrameTooLarge(expected));
    }
    let addr = SocketAddr::new(origin.ip(), coordination.port);

    let exchange = async {
        let mut stream = TcpStream::connect(addr)
            .await
            .map_err(TransportError::TcpFailed)?;
        let mut frame = vec![0u8; expected];
        let mut received = 0;
        let mut header_checked = false;
        while received < expected {
            let n = stream
                .read(&mut frame[received..])
                .await
                .map_err(TransportError::TcpFailed)?;
            if n == 0 {
                return Err(TransportError::ShortRead { expected, received });
            }
            received += n;
            if !header_checked && received >= HEADER_SIZE {
                header_checked = true;
                let declared = peek_frame_len(&frame[..HEADER_SIZE]);
                if declared != Some(expected) {
                    return Err(TransportError::LengthMismatch {
                        announced: expected,
                        declared,
                    });
                }
            }
        }
        debug!(%addr, bytes = expected, "large frame fetched");
        Ok(frame)
    };

    timeout(wait, exchange)
        .await
        .map_err(|_| TransportError::TcpTimeout(wait))?
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::Ipv4Addr;
    use unity_messaging_core::{decode_message, Message, MessageType};

    const LOCALHOST: IpAddr = IpAddr::V4(Ipv4Addr::LOCALHOST);

    #[tokio::test]
    async fn test_serve_frame_announces_and_streams_whole_frame() {
        // Arrange
        let client = UdpSocket::bind((LOCALHOST, 0)).await.unwrap();
        let editor = UdpSocket::bind((LOCALHOST, 0)).await.unwrap();
        let editor_addr = editor.local_addr().unwrap();
        let frame: Vec<u8> = (0..20_000u32).map(|i| i as u8).collect();
        let expected = frame.clone();

        // Act
        let serve = tokio::spawn(async move {
            serve_frame(&client, editor_addr, LOCALHOST, frame, Duration::from_secs(5)).await
        });
        let mut buf = [0u8; 128];
        let (len, from) = editor.recv_from(&mut buf).await.unwrap();
        let (announce, _) = decode_message(&buf[..len]).unwrap();
        let coordination = TcpCoordination::parse(&announce.value).unwrap();
        let mut stream = TcpStream::connect((from.ip(), coordination.port)).await.unwrap();
        let mut received = Vec::new();
        stream.read_to_end(&mut received).await.unwrap();

        // Assert
        assert_eq!(announce.message_type, MessageType::Tcp);
        assert_eq!(coordination.length, expected.len());
        assert_eq!(received, expected);
        assert!(serve.await.unwrap().is_ok());
    }

    #[tokio::test]
    async fn test_serve_frame_times_out_when_peer_never_connects() {
        let client = UdpSocket::bind((LOCALHOST, 0)).await.unwrap();
        let editor = UdpSocket::bind((LOCALHOST, 0)).await.unwrap();

        let result = serve_frame(
            &client,
            editor.local_addr().unwrap(),
            LOCALHOST,
            vec![0; 9000],
            Duration::from_millis(50),
        )
        .await;

        assert!(matches!(result, Err(TransportError::TcpTimeout(_))));
    }

    #[tokio::test]
    async fn test_fetch_frame_reads_exact_length() {
        // Arrange
        let listener = TcpListener::bind((LOCALHOST, 0)).await.unwrap();
        let port = listener.local_addr().unwrap().port();
        let payload = encode_message(&Message::new(MessageType::TestListRetrieved, "t".repeat(10_000)))
            .unwrap();
        let sent = payload.clone();
        tokio::spawn(async move {
            let (mut stream, _) = listener.accept().await.unwrap();
            stream.write_all(&sent).await.unwrap();
        });
        let origin = SocketAddr::new(LOCALHOST, 1);

        // Act
        let frame = fetch_frame(
            origin,
            TcpCoordination::new(port, payload.len()),
            Duration::from_secs(5),
            MAX_FETCH_BYTES,
        )
        .await;

        // Assert
        assert_eq!(frame.unwrap(), payload);
    }

    #[tokio::test]
    async fn test_fetch_frame_rejects_header_disagreeing_with_announcement() {
        // Arrange
        let listener = TcpListener::bind((LOCALHOST, 0)).await.unwrap();
        let port = listener.local_addr().unwrap().port();
        let frame = encode_message(&Message::new(MessageType::Info, "x".repeat(50))).unwrap();
        let declared = frame.len();
        tokio::spawn(async move {
            let (mut stream, _) = listener.accept().await.unwrap();
            stream.write_all(&frame).await.unwrap();
            stream.write_all(&[0u8; 10]).await.unwrap();
        });

        // Act
        let result = fetch_frame(
            SocketAddr::new(LOCALHOST, 1),
            TcpCoordination::new(port, declared + 10),
            Duration::from_secs(5),
            MAX_FETCH_BYTES,
        )
        .await;

        // Assert
        assert!(matches!(
            result,
            Err(TransportError::LengthMismatch { announced, declared: Some(d) })
                if announced == declared + 10 && d == declared
        ));
    }

    #[tokio::test]
    async fn test_fetch_frame_reports_short_read() {
        let listener = TcpListener::bind((LOCALHOST, 0)).await.unwrap();
        let port = listener.local_addr().unwrap().port();
        tokio::spawn(async move {
            let (mut stream, _) = listener.accept().await.unwrap();
            stream.write_all(&[1, 2, 3]).await.unwrap();
        });

        let result = fetch_frame(
            SocketAddr::new(LOCALHOST, 1),
            TcpCoordination::new(port, 100),
            Duration::from_secs(5),
            MAX_FETCH_BYTES,
        )
        .await;

        assert!(matches!(
            result,
            Err(TransportError::ShortRead {
                expected: 100,
                received: 3
            })
        ));
    }

    #[tokio::test]
    async fn test_fetch_frame_rejects_oversized_announcement() {
        let result = fetch_frame(
            SocketAddr::new(LOCALHOST, 1),
            TcpCoordination::new(4000, 1_000_000),
            Duration::from_secs(1),
            1024,
        )
        .await;

        assert!(matches!(result, Err(TransportError::FrameTooLarge(1_000_000))));
    }
}
