//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! Receiver::start_listen (receiver.rs):
//!     Idle → Binding → Serving → ShuttingDown → Stopped
//!                  ↘ Failed       ↘ Failed ↗
//!
//! Shutdown (shutdown.rs):
//!     ListenContext cancelled → stop accepting → drain (bounded) → return
//!
//! Signals (signals.rs):
//!     SIGTERM/SIGINT → cancel the ListenContext
//! ```
//!
//! # Design Decisions
//! - Bind failures end the invocation before anything is spawned
//! - Drain has a timeout: remaining connections are closed after the deadline
//! - The serving task is always awaited before `start_listen` returns

pub mod receiver;
pub mod shutdown;
pub mod signals;

pub use receiver::{Receiver, ReceiverError, ReceiverState};
pub use shutdown::{ListenContext, ShutdownError, DEFAULT_SHUTDOWN_TIMEOUT};
