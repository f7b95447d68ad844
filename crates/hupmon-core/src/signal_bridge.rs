//! Signal Bridge: the single process-wide `sigwinch_pending` flag.
//!
//! The SIGWINCH handler only sets the flag and returns; all actual work
//! (reading the new window size, pushing it to the PTY, signalling the
//! child) happens in the event loop, which clears the flag only after
//! the update has been applied. No other signals are touched by the
//! core — default dispositions apply to SIGINT/SIGTERM.

use std::sync::atomic::{AtomicBool, Ordering};

use nix::sys::signal::SigHandler;

use crate::termios_guard::SigwinchGuard;

static SIGWINCH_PENDING: AtomicBool = AtomicBool::new(false);

extern "C" fn handle_sigwinch(_sig: nix::libc::c_int) {
    SIGWINCH_PENDING.store(true, Ordering::Relaxed);
}

/// Installs the SIGWINCH handler for the duration of a wrap session.
pub fn install() -> crate::error::Result<SigwinchGuard> {
    unsafe { SigwinchGuard::install(SigHandler::Handler(handle_sigwinch)) }
}

/// True if SIGWINCH has fired since the last [`clear`].
pub fn pending() -> bool {
    SIGWINCH_PENDING.load(Ordering::Relaxed)
}

/// Clears the pending flag. Call only once the resulting window-size
/// update has actually been applied (coalescing is correct: a second
/// SIGWINCH arriving mid-update just re-sets the flag for next time).
pub fn clear() {
    SIGWINCH_PENDING.store(false, Ordering::Relaxed);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn starts_clear() {
        clear();
        assert!(!pending());
    }

    #[test]
    fn handler_sets_flag() {
        clear();
        handle_sigwinch(0);
        assert!(pending());
        clear();
        assert!(!pending());
    }
}
