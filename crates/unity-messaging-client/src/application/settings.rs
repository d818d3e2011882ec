//! Runtime settings handed to [`MessagingClient::spawn`].
//!
//! These are the already-validated values the actor works with.  The on-disk
//! TOML shape lives in `infrastructure::storage::config` and converts into
//! this type.
//!
//! [`MessagingClient::spawn`]: crate::application::messaging_client::MessagingClient::spawn

use std::net::{IpAddr, Ipv4Addr};
use std::time::Duration;

use unity_messaging_core::{protocol::messages::UDP_BUFFER_CEILING, MessageType, MESSAGING_BASE_PORT};

use crate::application::heartbeat::HeartbeatSettings;

#[derive(Debug, Clone, PartialEq)]
pub struct ClientSettings {
    /// Host the editor listens on.
    pub peer_host: IpAddr,
    /// Base of the messaging port derivation.
    pub messaging_base_port: u16,
    pub heartbeat: HeartbeatSettings,
    /// Frames at or above this size go over the TCP fallback.
    pub udp_ceiling: usize,
    pub tcp_timeout: Duration,
    /// Default timeout for `request_state`.
    pub request_timeout: Duration,
    /// Minimum interval between two sends of each listed type.
    pub rate_limits: Vec<(MessageType, Duration)>,
}

impl Default for ClientSettings {
    fn default() -> Self {
        Self {
            peer_host: IpAddr::V4(Ipv4Addr::LOCALHOST),
            messaging_base_port: MESSAGING_BASE_PORT,
            heartbeat: HeartbeatSettings::default(),
            udp_ceiling: UDP_BUFFER_CEILING,
            tcp_timeout: Duration::from_millis(5000),
            request_timeout: Duration::from_millis(1000),
            rate_limits: default_rate_limits(),
        }
    }
}

/// Refresh, test execution and test discovery are throttled by default.
pub fn default_rate_limits() -> Vec<(MessageType, Duration)> {
    vec![
        (MessageType::Refresh, Duration::from_millis(2000)),
        (MessageType::ExecuteTests, Duration::from_millis(1000)),
        (MessageType::RetrieveTestList, Duration::from_millis(1000)),
    ]
}
