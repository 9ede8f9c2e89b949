//! Accept error classification.
//!
//! # Design Decisions
//! - Errors tied to a single pending connection are transient
//! - Running out of file descriptors is transient: connections will close
//! - Anything else means the listening socket itself is unusable

use std::io;

/// Returns true if the accept loop should back off and try again.
pub fn is_transient_accept_error(err: &io::Error) -> bool {
    if matches!(
        err.kind(),
        io::ErrorKind::ConnectionAborted
            | io::ErrorKind::ConnectionReset
            | io::ErrorKind::ConnectionRefused
            | io::ErrorKind::Interrupted
            | io::ErrorKind::WouldBlock
            | io::ErrorKind::TimedOut
    ) {
        return true;
    }

    is_fd_exhaustion(err)
}

#[cfg(unix)]
fn is_fd_exhaustion(err: &io::Error) -> bool {
    // EMFILE / ENFILE on Linux and the BSDs.
    matches!(err.raw_os_error(), Some(23) | Some(24))
}

#[cfg(not(unix))]
fn is_fd_exhaustion(_err: &io::Error) -> bool {
    false
}
