//! Network layer subsystem.
//!
//! # Data Flow
//! ```text
//! Receiver::start_listen
//!     → listener.rs (bind port, accept)
//!     → connection.rs (connection IDs, active count)
//!     → Hand off to HTTP layer
//! ```
//!
//! # Design Decisions
//! - Bind failures are surfaced to the caller, never retried
//! - Each connection tracked so shutdown can report what it cut off

pub mod connection;
pub mod listener;
#[cfg(test)]
pub(crate) mod scripted;

pub use connection::{ConnectionGuard, ConnectionId, ConnectionTracker};
pub use listener::{Accept, BindError, Listener};
