//! Domain layer: protocol-adjacent data with no I/O.
//!
//! - **`ports`** – where an editor process listens, derived from its pid.
//! - **`process`** – the liveness payload emitted by the editor detector.
//! - **`test_mode`** – the test-runner mode and its `"<mode>:<name>"` encoding.

pub mod ports;
pub mod process;
pub mod test_mode;
