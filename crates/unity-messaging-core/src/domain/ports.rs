//! Port derivation for editor-side sockets.
//!
//! The editor does not advertise its port.  Both sides compute it from the
//! editor's process id:
//!
//! ```text
//! port = base + (pid mod 1000)
//! ```
//!
//! The messaging channel and the detector channel use different bases.  The
//! base values are part of the contract with the editor-side messenger.

/// Base port of the editor's messaging UDP socket.
pub const MESSAGING_BASE_PORT: u16 = 56000;

/// Base port of the editor's detector channel.
pub const DETECTOR_BASE_PORT: u16 = 58000;

/// Computes `base + (process_id mod 1000)`.
///
/// Returns `None` when a caller-supplied base is so high that the result
/// would not be a valid port.
pub fn peer_port(base: u16, process_id: u32) -> Option<u16> {
    let offset = (process_id % 1000) as u16;
    base.checked_add(offset)
}

/// Messaging port of the editor with the given process id.
pub fn messaging_port(process_id: u32) -> u16 {
    // 56000 + 999 always fits in a u16.
    MESSAGING_BASE_PORT + (process_id % 1000) as u16
}

/// Detector port of the editor with the given process id.
pub fn detector_port(process_id: u32) -> u16 {
    DETECTOR_BASE_PORT + (process_id % 1000) as u16
}
