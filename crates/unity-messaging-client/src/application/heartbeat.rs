//! Adaptive heartbeat scheduler.
//!
//! # Two phases
//!
//! A fresh connection is probed aggressively (every 500 ms by default) so the
//! client notices quickly when a just-launched editor starts answering.  Once
//! the first reply of any kind arrives, the scheduler waits a short delay and
//! then relaxes to a much longer interval.  A busy editor (recompiling,
//! reloading its domain) can stay silent for many seconds, so a relaxed
//! interval keeps the heartbeat from piling work onto a peer that is already
//! struggling.
//!
//! ```text
//!   Stopped ──start──▶ Aggressive ──first reply──▶ Relaxing ──delay──▶ Relaxed
//!      ▲                    │                          │                  │
//!      └────────────────────┴──────── stop ────────────┴──────────────────┘
//! ```
//!
//! # One authoritative timer
//!
//! The scheduler owns no timers.  It stores deadlines as data and the actor
//! asks [`HeartbeatScheduler::next_deadline`] for the single instant it must
//! wake at.  Stopping or restarting simply overwrites the deadlines, so two
//! overlapping heartbeat chains cannot exist after a rapid reconnect.

use std::time::Duration;

use tokio::time::Instant;

/// Timing policy for the heartbeat.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HeartbeatSettings {
    /// Ping interval right after connecting.
    pub aggressive_interval: Duration,
    /// How long to keep pinging aggressively after the first reply.
    pub relax_delay: Duration,
    /// Ping interval once the connection is confirmed.
    pub relaxed_interval: Duration,
    /// Relaxed interval for a custom (slow) peer build.
    pub custom_peer_relaxed_interval: Duration,
}

impl Default for HeartbeatSettings {
    fn default() -> Self {
        Self {
            aggressive_interval: Duration::from_millis(500),
            relax_delay: Duration::from_millis(2000),
            relaxed_interval: Duration::from_millis(3000),
            custom_peer_relaxed_interval: Duration::from_millis(5000),
        }
    }
}

/// Where the scheduler is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HeartbeatPhase {
    Stopped,
    /// Connected, no reply seen yet.
    Aggressive,
    /// First reply seen; still aggressive until `relax_at`.
    Relaxing { relax_at: Instant },
    Relaxed,
}

/// What the actor should do when a deadline fires.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HeartbeatEvent {
    /// Send a ping.
    Tick,
    /// Switch to the relaxed interval.
    Relax,
}

#[derive(Debug)]
pub struct HeartbeatScheduler {
    settings: HeartbeatSettings,
    phase: HeartbeatPhase,
    interval: Duration,
    next_tick: Option<Instant>,
    custom_peer: bool,
}

impl HeartbeatScheduler {
    pub fn new(settings: HeartbeatSettings) -> Self {
        Self {
            settings,
            phase: HeartbeatPhase::Stopped,
            interval: settings.aggressive_interval,
            next_tick: None,
            custom_peer: false,
        }
    }

    /// Starts (or restarts) aggressive probing from `now`.
    pub fn start(&mut self, now: Instant, custom_peer: bool) {
        self.custom_peer = custom_peer;
        self.phase = HeartbeatPhase::Aggressive;
        self.interval = self.settings.aggressive_interval;
        self.next_tick = Some(now + self.interval);
    }

    /// Stops probing and resets the interval to the aggressive baseline.
    pub fn stop(&mut self) {
        self.phase = HeartbeatPhase::Stopped;
        self.interval = self.settings.aggressive_interval;
        self.next_tick = None;
    }

    /// Records a reply from the peer.
    ///
    /// Returns `true` only for the first reply since [`start`](Self::start),
    /// which schedules the relax transition.
    pub fn on_response(&mut self, now: Instant) -> bool {
        if self.phase != HeartbeatPhase::Aggressive {
            return false;
        }
        self.phase = HeartbeatPhase::Relaxing {
            relax_at: now + self.settings.relax_delay,
        };
        true
    }

    /// The single earliest instant the scheduler needs attention at.
    pub fn next_deadline(&self) -> Option<(Instant, HeartbeatEvent)> {
        let tick = self.next_tick.map(|at| (at, HeartbeatEvent::Tick));
        match self.phase {
            HeartbeatPhase::Stopped => None,
            HeartbeatPhase::Relaxing { relax_at } => match tick {
                Some((at, _)) if at < relax_at => tick,
                _ => Some((relax_at, HeartbeatEvent::Relax)),
            },
            HeartbeatPhase::Aggressive | HeartbeatPhase::Relaxed => tick,
        }
    }

    /// Applies a fired deadline.  Returns `true` when a ping must be sent.
    pub fn fire(&mut self, event: HeartbeatEvent, now: Instant) -> bool {
        match (event, self.phase) {
            (_, HeartbeatPhase::Stopped) => false,
            (HeartbeatEvent::Tick, _) => {
                self.next_tick = Some(now + self.interval);
                true
            }
            (HeartbeatEvent::Relax, HeartbeatPhase::Relaxing { .. }) => {
                self.phase = HeartbeatPhase::Relaxed;
                self.interval = if self.custom_peer {
                    self.settings.custom_peer_relaxed_interval
                } else {
                    self.settings.relaxed_interval
                };
                // Restart the tick chain on the new interval.
                self.next_tick = Some(now + self.interval);
                false
            }
            (HeartbeatEvent::Relax, _) => false,
        }
    }

    pub fn phase(&self) -> HeartbeatPhase {
        self.phase
    }

    /// The current ping interval.
    pub fn interval(&self) -> Duration {
        self.interval
    }
}
