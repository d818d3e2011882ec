//! Unity messaging protocol message types.
//!
//! The numeric tags below are a contract with the editor-side messenger and
//! must match it bit for bit.  Tags the client does not know still decode
//! (as [`MessageType::Unknown`]) so a newer editor never breaks an older
//! client; they simply cannot be routed to a typed handler.

use std::fmt;
use std::net::SocketAddr;

use serde::{Deserialize, Serialize};

use crate::protocol::codec::ProtocolError;

// ── Protocol constants ────────────────────────────────────────────────────────

/// Size of the fixed frame header: `type` (i32 LE) + `payloadLength` (i32 LE).
pub const HEADER_SIZE: usize = 8;

/// Frames of this many bytes or more are never sent as a single datagram.
///
/// They are announced with a [`MessageType::Tcp`] coordination frame and
/// streamed over a transient TCP connection instead.
pub const UDP_BUFFER_CEILING: usize = 8192;

/// Returns `true` when a frame of `frame_len` bytes must take the TCP path.
pub fn needs_tcp_fallback(frame_len: usize, ceiling: usize) -> bool {
    frame_len >= ceiling
}

// ── Message type codes ────────────────────────────────────────────────────────

/// All message type tags understood by the client.
///
/// `Unknown` carries any tag outside the table so decoding stays total.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MessageType {
    None,
    Ping,
    Pong,
    Play,
    Stop,
    Pause,
    Unpause,
    Build,
    Refresh,
    Info,
    Error,
    Warning,
    Open,
    Opened,
    Version,
    UpdatePackage,
    ProjectPath,
    /// Large-message coordination: value is `"<listenPort>:<byteLength>"`.
    Tcp,
    RunStarted,
    RunFinished,
    TestStarted,
    TestFinished,
    TestListRetrieved,
    RetrieveTestList,
    ExecuteTests,
    ShowUsage,
    CompilationFinished,
    PackageName,
    Online,
    Offline,
    IsPlaying,
    CompilationStarted,
    GetCompileErrors,
    /// A tag this client does not recognise.
    Unknown(i32),
}

impl MessageType {
    /// Returns the numeric wire tag.
    pub fn code(self) -> i32 {
        match self {
            MessageType::None => 0,
            MessageType::Ping => 1,
            MessageType::Pong => 2,
            MessageType::Play => 3,
            MessageType::Stop => 4,
            MessageType::Pause => 5,
            MessageType::Unpause => 6,
            MessageType::Build => 7,
            MessageType::Refresh => 8,
            MessageType::Info => 9,
            MessageType::Error => 10,
            MessageType::Warning => 11,
            MessageType::Open => 12,
            MessageType::Opened => 13,
            MessageType::Version => 14,
            MessageType::UpdatePackage => 15,
            MessageType::ProjectPath => 16,
            MessageType::Tcp => -1,
            MessageType::RunStarted => 18,
            MessageType::RunFinished => 19,
            MessageType::TestStarted => 20,
            MessageType::TestFinished => 21,
            MessageType::TestListRetrieved => 22,
            MessageType::RetrieveTestList => 23,
            MessageType::ExecuteTests => 24,
            MessageType::ShowUsage => 25,
            MessageType::CompilationFinished => 100,
            MessageType::PackageName => 101,
            MessageType::Online => 102,
            MessageType::Offline => 103,
            MessageType::IsPlaying => 104,
            MessageType::CompilationStarted => 105,
            MessageType::GetCompileErrors => 106,
            MessageType::Unknown(code) => code,
        }
    }

    /// Maps a wire tag to a [`MessageType`]; never fails.
    pub fn from_code(code: i32) -> Self {
        match code {
            0 => MessageType::None,
            1 => MessageType::Ping,
            2 => MessageType::Pong,
            3 => MessageType::Play,
            4 => MessageType::Stop,
            5 => MessageType::Pause,
            6 => MessageType::Unpause,
            7 => MessageType::Build,
            8 => MessageType::Refresh,
            9 => MessageType::Info,
            10 => MessageType::Error,
            11 => MessageType::Warning,
            12 => MessageType::Open,
            13 => MessageType::Opened,
            14 => MessageType::Version,
            15 => MessageType::UpdatePackage,
            16 => MessageType::ProjectPath,
            -1 => MessageType::Tcp,
            18 => MessageType::RunStarted,
            19 => MessageType::RunFinished,
            20 => MessageType::TestStarted,
            21 => MessageType::TestFinished,
            22 => MessageType::TestListRetrieved,
            23 => MessageType::RetrieveTestList,
            24 => MessageType::ExecuteTests,
            25 => MessageType::ShowUsage,
            100 => MessageType::CompilationFinished,
            101 => MessageType::PackageName,
            102 => MessageType::Online,
            103 => MessageType::Offline,
            104 => MessageType::IsPlaying,
            105 => MessageType::CompilationStarted,
            106 => MessageType::GetCompileErrors,
            other => MessageType::Unknown(other),
        }
    }

    /// Heartbeat primitives bypass the offline queue and are never rate limited.
    pub fn is_heartbeat(self) -> bool {
        matches!(self, MessageType::Ping | MessageType::Pong)
    }

    /// Inbound messages of these types prove the peer is accepting traffic.
    pub fn is_online_indicator(self) -> bool {
        matches!(
            self,
            MessageType::Online | MessageType::Ping | MessageType::Pong
        )
    }

    /// Returns `true` for tags outside the known table.
    pub fn is_unknown(self) -> bool {
        matches!(self, MessageType::Unknown(_))
    }
}

impl From<i32> for MessageType {
    fn from(code: i32) -> Self {
        MessageType::from_code(code)
    }
}

impl fmt::Display for MessageType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MessageType::Unknown(code) => write!(f, "Unknown({code})"),
            other => write!(f, "{other:?}"),
        }
    }
}

// ── Message ───────────────────────────────────────────────────────────────────

/// One unit of protocol exchange.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    pub message_type: MessageType,
    /// UTF-8 payload; may be empty.
    pub value: String,
    /// Sender address.  Only populated on receipt.
    pub origin: Option<SocketAddr>,
}

impl Message {
    /// Creates an outbound message with no origin.
    pub fn new(message_type: MessageType, value: impl Into<String>) -> Self {
        Self {
            message_type,
            value: value.into(),
            origin: None,
        }
    }

    /// Tags the message with the address it arrived from.
    pub fn with_origin(mut self, origin: SocketAddr) -> Self {
        self.origin = Some(origin);
        self
    }

    /// Number of bytes this message occupies on the wire.
    pub fn frame_len(&self) -> usize {
        HEADER_SIZE + self.value.len()
    }
}

// ── TCP coordination ──────────────────────────────────────────────────────────

/// Parsed value of a [`MessageType::Tcp`] frame.
///
/// The side holding a large frame listens on `port` and writes exactly
/// `length` bytes (one complete frame) to whoever connects.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TcpCoordination {
    pub port: u16,
    pub length: usize,
}

impl TcpCoordination {
    pub fn new(port: u16, length: usize) -> Self {
        Self { port, length }
    }

    /// Builds the coordination frame announcing this exchange.
    pub fn to_message(self) -> Message {
        Message::new(MessageType::Tcp, format!("{}:{}", self.port, self.length))
    }

    /// Parses a `"<listenPort>:<byteLength>"` value.
    ///
    /// # Errors
    ///
    /// Returns [`ProtocolError::MalformedCoordination`] when either field is
    /// missing or not a number, or when the length is smaller than a header.
    pub fn parse(value: &str) -> Result<Self, ProtocolError> {
        let malformed = || ProtocolError::MalformedCoordination(value.to_string());

        let (port, length) = value.trim().split_once(':').ok_or_else(malformed)?;
        let port: u16 = port.parse().map_err(|_| malformed())?;
        let length: usize = length.parse().map_err(|_| malformed())?;
        if port == 0 || length < HEADER_SIZE {
            return Err(malformed());
        }
        Ok(Self { port, length })
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
