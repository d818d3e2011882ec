//! Liveness payload published by the editor process detector.

use serde::{Deserialize, Serialize};

/// Auxiliary facts about the detected editor process.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ProcessFlags {
    /// The peer is a custom (slower) editor build; heartbeats relax further.
    pub custom_peer: bool,
}

/// One state-change event from the liveness source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ProcessState {
    pub is_running: bool,
    pub process_id: Option<u32>,
    pub flags: ProcessFlags,
}

impl ProcessState {
    /// An editor process with the given pid is running.
    pub fn running(process_id: u32) -> Self {
        Self {
            is_running: true,
            process_id: Some(process_id),
            flags: ProcessFlags::default(),
        }
    }

    /// No editor process is running.
    pub fn stopped() -> Self {
        Self::default()
    }

    /// Marks the process as a custom peer.
    pub fn with_custom_peer(mut self) -> Self {
        self.flags.custom_peer = true;
        self
    }

    /// The pid to connect to, if the process is running and identified.
    pub fn live_process_id(&self) -> Option<u32> {
        if self.is_running {
            self.process_id
        } else {
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_running_state_exposes_pid() {
        assert_eq!(ProcessState::running(77).live_process_id(), Some(77));
    }

    #[test]
    fn test_stopped_state_has_no_live_pid() {
        assert_eq!(ProcessState::stopped().live_process_id(), None);
    }

    #[test]
    fn test_not_running_with_stale_pid_has_no_live_pid() {
        let state = ProcessState {
            is_running: false,
            process_id: Some(12),
            flags: ProcessFlags::default(),
        };
        assert_eq!(state.live_process_id(), None);
    }

    #[test]
    fn test_with_custom_peer_sets_flag() {
        assert!(ProcessState::running(1).with_custom_peer().flags.custom_peer);
    }
}
