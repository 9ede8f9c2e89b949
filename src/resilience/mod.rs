//! Resilience subsystem.
//!
//! # Data Flow
//! ```text
//! Accept loop error:
//!     → retries.rs (is the error transient?)
//!     → backoff.rs (how long to pause before accepting again)
//!     → otherwise the accept loop fails and the receiver stops
//! ```
//!
//! # Design Decisions
//! - Only accept errors are retried; bind errors and shutdown are not
//! - Backoff is capped so a recovering listener resumes within a second

pub mod backoff;
pub mod retries;
