//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! Bound listener
//!     → server.rs (accept loop, hyper-util auto connection per socket)
//!     → decorated handler (observability::tracing::create_handler)
//!     → caller's handler
//!
//! On stop:
//!     server.rs stops accepting → Drain (graceful, bounded by timeout)
//! ```

pub mod server;

pub use server::{Drain, HttpServer, ServeError};
