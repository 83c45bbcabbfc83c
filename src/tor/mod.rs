//! Tor integration
//!
//! - control-port client used to request new exit identities
//! - identity rotation with a randomized circuit-build wait
//! - exit address probe over the SOCKS port

pub mod control;
pub mod exit_probe;
pub mod rotator;

pub use control::ControlConnection;
pub use exit_probe::ExitProbe;
pub use rotator::{IdentityRotator, TorIdentityRotator};
