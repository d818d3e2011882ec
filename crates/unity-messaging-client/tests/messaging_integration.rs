//! End-to-end tests against a fake editor on real localhost sockets.
//!
//! The fake editor is a plain UDP socket.  To make the client find it, the
//! messaging base port is chosen so that `base + 1234 % 1000` lands on the
//! editor's ephemeral port.

use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::sync::Arc;
use std::time::Duration;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream, UdpSocket};
use tokio::sync::mpsc;
use tokio::time::timeout;
use unity_messaging_client::{
    application::transport::TransportFactory,
    infrastructure::{liveness::ManualLivenessSource, network::UdpTransportFactory},
    ClientSettings, MessagingClient,
};
use unity_messaging_core::{
    decode_message, encode_message, Message, MessageType, TcpCoordination, TestMode,
};

const PID: u32 = 1234;
const LOCALHOST: IpAddr = IpAddr::V4(Ipv4Addr::LOCALHOST);
const WAIT: Duration = Duration::from_secs(5);

struct FakeEditor {
    socket: UdpSocket,
}

impl FakeEditor {
    async fn bind() -> Self {
        let socket = UdpSocket::bind((LOCALHOST, 0)).await.expect("bind editor");
        Self { socket }
    }

    fn port(&self) -> u16 {
        self.socket.local_addr().unwrap().port()
    }

    /// Next message that is not a heartbeat ping.
    async fn recv_non_ping(&self) -> (Message, SocketAddr) {
        let mut buf = vec![0u8; 64 * 1024];
        loop {
            let (len, from) = timeout(WAIT, self.socket.recv_from(&mut buf))
                .await
                .expect("editor recv timed out")
                .expect("editor recv");
            let (message, _) = decode_message(&buf[..len]).expect("valid frame");
            if message.message_type != MessageType::Ping {
                return (message, from);
            }
        }
    }

    /// Waits for the first ping and returns the client's address.
    async fn recv_probe(&self) -> SocketAddr {
        let mut buf = [0u8; 64];
        let (len, from) = timeout(WAIT, self.socket.recv_from(&mut buf))
            .await
            .expect("probe timed out")
            .expect("probe recv");
        let (message, _) = decode_message(&buf[..len]).unwrap();
        assert_eq!(message.message_type, MessageType::Ping);
        from
    }

    async fn send(&self, message: Message, to: SocketAddr) {
        let bytes = encode_message(&message).unwrap();
        self.socket.send_to(&bytes, to).await.unwrap();
    }
}

fn spawn_client(editor: &FakeEditor, liveness: &ManualLivenessSource) -> MessagingClient {
    let offset = (PID % 1000) as u16;
    let settings = ClientSettings {
        messaging_base_port: editor.port() - offset,
        ..ClientSettings::default()
    };
    let factory: Arc<dyn TransportFactory> = Arc::new(UdpTransportFactory::from_settings(&settings));
    MessagingClient::spawn(settings, liveness, factory)
}

async fn wait_online(client: &MessagingClient) {
    let mut status = client.watch_status();
    timeout(WAIT, status.wait_for(|s| s.online))
        .await
        .expect("online timed out")
        .map(|_| ())
        .expect("client alive");
}

/// Connects a client to a fresh fake editor and brings it online.
async fn online_pair() -> (FakeEditor, ManualLivenessSource, MessagingClient, SocketAddr) {
    let editor = FakeEditor::bind().await;
    let liveness = ManualLivenessSource::new();
    let client = spawn_client(&editor, &liveness);
    liveness.report_running(PID);
    let client_addr = editor.recv_probe().await;
    editor.send(Message::new(MessageType::Pong, ""), client_addr).await;
    wait_online(&client).await;
    (editor, liveness, client, client_addr)
}

#[tokio::test]
async fn test_client_connects_to_port_derived_from_pid() {
    // Arrange
    let editor = FakeEditor::bind().await;
    let liveness = ManualLivenessSource::new();
    let client = spawn_client(&editor, &liveness);

    // Act
    liveness.report_running(PID);
    editor.recv_probe().await;

    // Assert
    let status = client.status();
    assert!(status.connected);
    assert_eq!(status.port, Some(editor.port()));
    client.dispose().await;
}

#[tokio::test]
async fn test_sends_queued_before_first_reply_flush_in_order() {
    // Arrange
    let editor = FakeEditor::bind().await;
    let liveness = ManualLivenessSource::new();
    let client = spawn_client(&editor, &liveness);
    liveness.report_running(PID);
    let client_addr = editor.recv_probe().await;

    let c = client.clone();
    let first = tokio::spawn(async move { c.execute_tests(TestMode::EditMode, "Suite").await });
    tokio::time::sleep(Duration::from_millis(20)).await;
    let c = client.clone();
    let second = tokio::spawn(async move { c.build().await });
    tokio::time::sleep(Duration::from_millis(20)).await;
    assert!(!first.is_finished(), "send must wait for the editor");

    // Act
    editor.send(Message::new(MessageType::Pong, ""), client_addr).await;

    // Assert
    let (a, _) = editor.recv_non_ping().await;
    let (b, _) = editor.recv_non_ping().await;
    assert_eq!(a.message_type, MessageType::ExecuteTests);
    assert_eq!(a.value, "EditMode:Suite");
    assert_eq!(b.message_type, MessageType::Build);
    assert!(first.await.unwrap().is_ok());
    assert!(second.await.unwrap().is_ok());
    client.dispose().await;
}

#[tokio::test]
async fn test_oversized_send_is_delivered_over_tcp() {
    // Arrange
    let (editor, _liveness, client, _) = online_pair().await;
    let value = "x".repeat(10_000);

    // Act
    let c = client.clone();
    let sent_value = value.clone();
    let send = tokio::spawn(async move { c.send(MessageType::ExecuteTests, sent_value).await });
    let (announce, from) = editor.recv_non_ping().await;
    let coordination = TcpCoordination::parse(&announce.value).unwrap();
    let mut stream = TcpStream::connect((from.ip(), coordination.port)).await.unwrap();
    let mut frame = Vec::new();
    timeout(WAIT, stream.read_to_end(&mut frame)).await.unwrap().unwrap();

    // Assert
    assert_eq!(announce.message_type, MessageType::Tcp);
    assert_eq!(frame.len(), coordination.length);
    let (message, _) = decode_message(&frame).unwrap();
    assert_eq!(message.message_type, MessageType::ExecuteTests);
    assert_eq!(message.value, value);
    assert!(send.await.unwrap().is_ok());
    client.dispose().await;
}

#[tokio::test]
async fn test_large_inbound_message_is_fetched_over_tcp() {
    // Arrange
    let (editor, _liveness, client, client_addr) = online_pair().await;
    let (tx, mut rx) = mpsc::unbounded_channel();
    let _sub = client.on_message(MessageType::TestListRetrieved, move |message| {
        let _ = tx.send(message.value.clone());
    });
    let payload = format!("PlayMode:{}", "t".repeat(20_000));
    let frame = encode_message(&Message::new(MessageType::TestListRetrieved, payload.clone())).unwrap();
    let listener = TcpListener::bind((LOCALHOST, 0)).await.unwrap();
    let coordination = TcpCoordination::new(listener.local_addr().unwrap().port(), frame.len());

    // Act
    editor.send(coordination.to_message(), client_addr).await;
    let (mut stream, _) = timeout(WAIT, listener.accept()).await.unwrap().unwrap();
    stream.write_all(&frame).await.unwrap();

    // Assert
    let received = timeout(WAIT, rx.recv()).await.unwrap().unwrap();
    assert_eq!(received, payload);
    client.dispose().await;
}

#[tokio::test]
async fn test_request_state_round_trip() {
    // Arrange
    let (editor, _liveness, client, client_addr) = online_pair().await;

    // Act
    let c = client.clone();
    let request = tokio::spawn(async move { c.request_state(Duration::from_secs(2)).await });
    let (probe, _) = editor.recv_non_ping().await;
    editor
        .send(
            Message::new(MessageType::IsPlaying, format!("{}:false", probe.value)),
            client_addr,
        )
        .await;

    // Assert
    assert_eq!(probe.message_type, MessageType::IsPlaying);
    assert_eq!(request.await.unwrap().unwrap(), Some("false".to_owned()));
    client.dispose().await;
}

#[tokio::test]
async fn test_editor_exit_disconnects_client() {
    // Arrange
    let (_editor, liveness, client, _) = online_pair().await;
    let mut status = client.watch_status();

    // Act
    liveness.report_stopped();

    // Assert
    timeout(WAIT, status.wait_for(|s| !s.connected))
        .await
        .expect("disconnect timed out")
        .map(|_| ())
        .expect("client alive");
    assert!(!client.status().online);
    client.dispose().await;
}
