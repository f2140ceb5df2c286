//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! Signals (signals.rs):
//!     SIGTERM/SIGINT → shutdown_signal() resolves
//!
//! Shutdown (shutdown.rs):
//!     trigger() → every subscribed server stops accepting → in-flight
//!     requests drain → serve future returns
//! ```
//!
//! # Design Decisions
//! - Servers take either a broadcast receiver or any future as their stop
//!   condition, so tests can stop them without OS signals

pub mod shutdown;
pub mod signals;

pub use shutdown::Shutdown;
pub use signals::shutdown_signal;
