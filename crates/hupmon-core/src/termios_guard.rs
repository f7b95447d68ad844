//! Terminal State Manager: scoped acquisition of termios and the
//! SIGWINCH disposition, with guaranteed restore on every exit path.

use std::os::unix::io::{BorrowedFd, RawFd};

use nix::sys::signal::{self, SigAction, SigHandler, Signal};
use nix::sys::termios::{self, InputFlags, LocalFlags, OutputFlags, SetArg, Termios};

use crate::error::{HupmonError, Result};

/// Checks whether IXOFF is currently set on `fd`, without saving or
/// modifying anything. Used by the proxy to re-query flow-control mode
/// on every terminal read, since it can change mid-session (e.g. the
/// wrapped shell or user running `stty`).
pub fn ixoff_active(fd: RawFd) -> bool {
    let borrowed = unsafe { BorrowedFd::borrow_raw(fd) };
    termios::tcgetattr(borrowed)
        .map(|t| t.input_flags.contains(InputFlags::IXOFF))
        .unwrap_or(false)
}

/// Saved termios for one fd, restored on drop.
///
/// Mirrors the teacher's `PtySession` which saves `original_termios` at
/// spawn and restores it in `Drop::drop`; here the save/restore is
/// factored into its own scoped type so the prober and the proxy can
/// both use it without duplicating the restore logic.
pub struct TermiosGuard {
    fd: RawFd,
    saved: Termios,
    active: bool,
}

impl TermiosGuard {
    /// Saves the current termios of `fd` without modifying it.
    pub fn save(fd: RawFd) -> Result<Self> {
        let borrowed = unsafe { BorrowedFd::borrow_raw(fd) };
        let saved = termios::tcgetattr(borrowed)
            .map_err(|e| HupmonError::Termios(format!("tcgetattr: {e}")))?;
        Ok(TermiosGuard {
            fd,
            saved,
            active: true,
        })
    }

    /// The termios as it was when saved.
    pub fn saved(&self) -> &Termios {
        &self.saved
    }

    /// Whether IXOFF (kernel XON/XOFF input handling) is set in the
    /// saved termios.
    pub fn ixoff(&self) -> bool {
        self.saved.input_flags.contains(InputFlags::IXOFF)
    }

    /// Applies a raw-mode configuration derived from the saved termios:
    /// no canonical input, no echo, no input/output translation.
    pub fn set_raw(&self) -> Result<()> {
        let mut raw = self.saved.clone();
        raw.input_flags.remove(
            InputFlags::IGNBRK
                | InputFlags::BRKINT
                | InputFlags::PARMRK
                | InputFlags::ISTRIP
                | InputFlags::INLCR
                | InputFlags::IGNCR
                | InputFlags::ICRNL
                | InputFlags::IXON,
        );
        raw.output_flags.remove(OutputFlags::OPOST);
        raw.local_flags.remove(
            LocalFlags::ECHO | LocalFlags::ECHONL | LocalFlags::ICANON | LocalFlags::ISIG,
        );
        raw.control_chars[nix::libc::VMIN] = 1;
        raw.control_chars[nix::libc::VTIME] = 0;

        let borrowed = unsafe { BorrowedFd::borrow_raw(self.fd) };
        termios::tcsetattr(borrowed, SetArg::TCSANOW, &raw)
            .map_err(|e| HupmonError::Termios(format!("tcsetattr(raw): {e}")))
    }

    /// Applies the saved (non-raw) termios to a different fd — used to
    /// configure the PTY slave the child inherits.
    pub fn apply_saved_to(&self, other_fd: RawFd) -> Result<()> {
        let borrowed = unsafe { BorrowedFd::borrow_raw(other_fd) };
        termios::tcsetattr(borrowed, SetArg::TCSANOW, &self.saved)
            .map_err(|e| HupmonError::Termios(format!("tcsetattr(apply): {e}")))
    }

    /// Restores the saved termios early, consuming the guard's
    /// responsibility to do so on drop. Errors are logged, never
    /// propagated: per the spec's error-handling policy, restoration
    /// failures are silent and must not clobber a prior diagnostic.
    pub fn restore(mut self) {
        self.restore_inner();
        self.active = false;
    }

    fn restore_inner(&self) {
        let borrowed = unsafe { BorrowedFd::borrow_raw(self.fd) };
        if let Err(e) = termios::tcsetattr(borrowed, SetArg::TCSADRAIN, &self.saved) {
            log::debug!("termios restore failed: {e}");
        }
    }
}

impl Drop for TermiosGuard {
    fn drop(&mut self) {
        if self.active {
            self.restore_inner();
        }
    }
}

/// Saved SIGWINCH disposition, restored on drop.
pub struct SigwinchGuard {
    previous: SigAction,
    active: bool,
}

impl SigwinchGuard {
    /// Installs `handler` for SIGWINCH, saving the previous disposition.
    ///
    /// Deliberately omits `SA_RESTART`: the event loop relies on a
    /// blocking `poll` being interrupted (EINTR) by the signal so it
    /// can observe `sigwinch_pending` even when the inactivity timeout
    /// is disabled and the poll would otherwise block forever.
    ///
    /// # Safety
    /// Must be called before any other thread depends on SIGWINCH's
    /// prior disposition; HUPMon is single-threaded (see §5) so this is
    /// always safe to call from `main`.
    pub unsafe fn install(handler: SigHandler) -> Result<Self> {
        let action = SigAction::new(handler, signal::SaFlags::empty(), signal::SigSet::empty());
        let previous = signal::sigaction(Signal::SIGWINCH, &action)
            .map_err(|e| HupmonError::Termios(format!("sigaction: {e}")))?;
        Ok(SigwinchGuard {
            previous,
            active: true,
        })
    }

    fn restore_inner(&self) {
        if let Err(e) = unsafe { signal::sigaction(Signal::SIGWINCH, &self.previous) } {
            log::debug!("SIGWINCH restore failed: {e}");
        }
    }

    pub fn restore(mut self) {
        self.restore_inner();
        self.active = false;
    }
}

impl Drop for SigwinchGuard {
    fn drop(&mut self) {
        if self.active {
            self.restore_inner();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use nix::pty::openpty;

    #[test]
    fn save_and_raw_roundtrip_preserves_original() {
        let pty = openpty(None, None).expect("openpty");
        let fd = std::os::unix::io::AsRawFd::as_raw_fd(&pty.master);

        let guard = TermiosGuard::save(fd).expect("save");
        let before = guard.saved().clone();
        guard.set_raw().expect("set_raw");
        guard.restore();

        let borrowed = unsafe { BorrowedFd::borrow_raw(fd) };
        let after = termios::tcgetattr(borrowed).expect("tcgetattr after restore");
        assert_eq!(before.input_flags, after.input_flags);
        assert_eq!(before.local_flags, after.local_flags);
    }
}
