//! HUPMon Core
//!
//! Terminal-liveness probing and bidirectional I/O proxy engine.
//!
//! This crate contains the hard parts described as the core of HUPMon:
//! the CPR liveness prober ([`prober`]), the PTY-backed I/O proxy
//! ([`proxy`]), the child process supervisor ([`child`]), the
//! terminal-state manager ([`termios_guard`]), the SIGWINCH bridge
//! ([`signal_bridge`]), and deadline arithmetic ([`clock`]).
//!
//! Argument parsing, the one-shot status printer, and environment
//! exposure live one layer up, in the `hupmon` binary crate.

pub mod child;
pub mod clock;
pub mod device_state;
pub mod error;
pub mod flow_control;
pub mod prober;
pub mod proxy;
pub mod signal_bridge;
pub mod termios_guard;

pub use child::ChildHandle;
pub use clock::Deadline;
pub use device_state::{DeviceState, ProbeBuffer};
pub use error::{HupmonError, Result};
pub use prober::{probe, validate_bytes, ProbeOutcome};
