//! unity-messaging-probe: connect to one running Unity editor and watch it.
//!
//! Useful when debugging the messaging protocol by hand: point it at an
//! editor's process id and it logs every status transition and every message
//! the editor sends, optionally issuing a command once the editor is online.
//!
//! # Usage
//!
//! ```text
//! unity-messaging-probe --pid <PID> [OPTIONS]
//!
//! Options:
//!   --pid <PID>             Editor process id                [env: UNITY_PID]
//!   --config <PATH>         Config file [default: platform config dir]
//!   --peer-host <HOST>      Editor host override             [env: UNITY_PEER_HOST]
//!   --custom-peer           Use the slower relaxed heartbeat
//!   --refresh               Ask the editor to refresh assets
//!   --request-tests <MODE>  Ask for the test list (EditMode|PlayMode)
//!   --execute <MODE:NAME>   Run tests, e.g. EditMode:MyTests
//!   --state                 Query the editor's play state
//! ```
//!
//! Logging honours `RUST_LOG`; without it the config file's `log_level` is
//! used.  Relayed editor logs use the `unity` target, so
//! `RUST_LOG=unity=info,warn` shows only those.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;
use unity_messaging_client::{
    application::transport::TransportFactory,
    infrastructure::{
        liveness::ManualLivenessSource,
        network::UdpTransportFactory,
        storage::config::{config_file_path, load_config_from, MessagingConfig},
    },
    MessagingClient,
};
use unity_messaging_core::{MessageType, ProcessState, TestMode};

// ── CLI argument definitions ──────────────────────────────────────────────────

#[derive(Debug, Parser)]
#[command(
    name = "unity-messaging-probe",
    about = "Connects to a running Unity editor over its messaging protocol",
    version
)]
struct Cli {
    /// Process id of the editor to connect to.
    #[arg(long, env = "UNITY_PID")]
    pid: u32,

    /// Path of the TOML config file.
    #[arg(long, env = "UNITY_MESSAGING_CONFIG")]
    config: Option<PathBuf>,

    /// Overrides `peer_host` from the config file.
    #[arg(long, env = "UNITY_PEER_HOST")]
    peer_host: Option<String>,

    /// Treat the editor as a custom build with a slower relaxed heartbeat.
    #[arg(long)]
    custom_peer: bool,

    /// Ask the editor to refresh its asset database once online.
    #[arg(long)]
    refresh: bool,

    /// Request the test list for a mode once online.
    #[arg(long, value_name = "MODE")]
    request_tests: Option<TestMode>,

    /// Execute tests once online, as `<mode>:<name>`.
    #[arg(long, value_name = "MODE:NAME")]
    execute: Option<String>,

    /// Query the editor's play state once online.
    #[arg(long)]
    state: bool,
}

impl Cli {
    fn load_config(&self) -> anyhow::Result<MessagingConfig> {
        let path = match &self.config {
            Some(path) => path.clone(),
            None => config_file_path().context("cannot locate the config directory")?,
        };
        let mut config = load_config_from(&path)
            .with_context(|| format!("failed to load config from {}", path.display()))?;
        if let Some(host) = &self.peer_host {
            config.peer_host = host.clone();
        }
        Ok(config)
    }

    fn process_state(&self) -> ProcessState {
        let state = ProcessState::running(self.pid);
        if self.custom_peer {
            state.with_custom_peer()
        } else {
            state
        }
    }
}

// ── Entry point ───────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let config = cli.load_config()?;

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(&config.log_level)),
        )
        .init();

    let settings = config.to_settings().context("invalid configuration")?;
    let factory: Arc<dyn TransportFactory> = Arc::new(UdpTransportFactory::from_settings(&settings));
    let liveness = ManualLivenessSource::new();
    let client = MessagingClient::spawn(settings, &liveness, factory);

    let _connection = client.on_connection_changed(|connected| info!(connected, "connection changed"));
    let _online = client.on_online_changed(|online| info!(online, "online changed"));
    let _tests = client.on_message(MessageType::TestListRetrieved, |message| {
        match TestMode::split_value(&message.value) {
            Some((mode, tests)) => info!(%mode, bytes = tests.len(), "test list received"),
            None => warn!("test list reply without a mode prefix"),
        }
    });
    for message_type in [
        MessageType::RunStarted,
        MessageType::RunFinished,
        MessageType::TestStarted,
        MessageType::TestFinished,
        MessageType::CompilationStarted,
        MessageType::CompilationFinished,
    ] {
        client
            .on_message(message_type, move |message| {
                info!(%message_type, value = %message.value, "editor event");
            })
            .detach();
    }

    info!(pid = cli.pid, "waiting for editor");
    liveness.report(cli.process_state());

    let mut status = client.watch_status();
    let session = async {
        status
            .wait_for(|s| s.online)
            .await
            .map(|_| ())
            .context("client stopped before the editor came online")?;
        issue_commands(&cli, &client).await;
        // Keep logging until interrupted.
        std::future::pending::<anyhow::Result<()>>().await
    };

    tokio::select! {
        result = session => result?,
        signal = tokio::signal::ctrl_c() => signal.context("failed to listen for Ctrl+C")?,
    }

    info!("shutting down");
    liveness.report_stopped();
    client.dispose().await;
    Ok(())
}

async fn issue_commands(cli: &Cli, client: &MessagingClient) {
    if cli.refresh {
        report("refresh", client.refresh_remote_state().await);
    }
    if let Some(mode) = cli.request_tests {
        report("request test list", client.request_test_list(mode).await);
    }
    if let Some(target) = &cli.execute {
        match TestMode::split_value(target) {
            Some((mode, name)) => report("execute tests", client.execute_tests(mode, name).await),
            None => warn!(value = %target, "--execute expects <mode>:<name>"),
        }
    }
    if cli.state {
        match client.request_state_default().await {
            Ok(Some(state)) => info!(%state, "editor state"),
            Ok(None) => warn!("editor did not answer the state request"),
            Err(e) => warn!("state request failed: {e}"),
        }
    }
}

fn report(what: &str, result: Result<(), unity_messaging_client::MessagingError>) {
    match result {
        Ok(()) => info!("{what} sent"),
        Err(e) => warn!("{what} failed: {e}"),
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_requires_only_pid() {
        // Arrange / Act
        let cli = Cli::parse_from(["unity-messaging-probe", "--pid", "1234"]);

        // Assert
        assert_eq!(cli.pid, 1234);
        assert!(!cli.refresh);
        assert!(cli.request_tests.is_none());
    }

    #[test]
    fn test_cli_parses_test_mode() {
        let cli = Cli::parse_from([
            "unity-messaging-probe",
            "--pid",
            "1",
            "--request-tests",
            "PlayMode",
        ]);
        assert_eq!(cli.request_tests, Some(TestMode::PlayMode));
    }

    #[test]
    fn test_custom_peer_flag_sets_process_flag() {
        let cli = Cli::parse_from(["unity-messaging-probe", "--pid", "9", "--custom-peer"]);

        let state = cli.process_state();

        assert!(state.flags.custom_peer);
        assert_eq!(state.live_process_id(), Some(9));
    }

    #[test]
    fn test_peer_host_flag_overrides_config() {
        let dir = std::env::temp_dir().join(format!("unity_probe_{}", std::process::id()));
        let cli = Cli::parse_from([
            "unity-messaging-probe",
            "--pid",
            "9",
            "--config",
            dir.join("missing.toml").to_str().unwrap(),
            "--peer-host",
            "10.0.0.5",
        ]);

        let config = cli.load_config().unwrap();

        assert_eq!(config.peer_host, "10.0.0.5");
    }
}
