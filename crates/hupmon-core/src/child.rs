//! Child Supervisor: PTY pair allocation, fork, and reap.
//!
//! Grounded on the teacher's `PtySession::spawn` (`src/pty.rs`), which
//! already uses `nix::pty::openpty`, `nix::unistd::{fork, execvp}`,
//! `dup2`, and `waitpid`/`WaitStatus`. Generalized here to apply the
//! *saved* (non-raw) termios and window size to the slave before exec,
//! so the wrapped program sees an ordinary terminal, and to map exec
//! failures to 127 (not found) / 126 (found, not executable) instead
//! of a single bare exit code.
use std::ffi::CString;
use std::os::unix::io::{AsRawFd, OwnedFd, RawFd};

use nix::pty::{openpty, OpenptyResult, Winsize};
use nix::sys::signal::{self, Signal};
use nix::sys::termios::Termios;
use nix::sys::wait::{waitpid, WaitStatus};
use nix::unistd::{dup2, execvp, fork, ForkResult, Pid};

use crate::error::{HupmonError, Result};

/// A spawned child process attached to a fresh PTY.
pub struct ChildHandle {
    pid: Pid,
    /// `None` once the master has been closed ahead of `waitpid` (see
    /// `wait`); never observed as `None` by any other method.
    master: Option<OwnedFd>,
    reaped: bool,
}

impl ChildHandle {
    /// Allocates a PTY pair, forks, and execs `argv` in the child with
    /// the slave as its controlling terminal. The slave inherits
    /// `termios`/`winsize` unmodified so the wrapped program sees a
    /// normal terminal (§4.3).
    pub fn spawn(argv: &[String], termios: &Termios, winsize: Winsize) -> Result<Self> {
        if argv.is_empty() {
            return Err(HupmonError::Spawn("empty command".into()));
        }

        let OpenptyResult { master, slave } = openpty(Some(&winsize), Some(termios))
            .map_err(|e| HupmonError::Spawn(format!("openpty: {e}")))?;

        match unsafe { fork() } {
            Ok(ForkResult::Child) => {
                drop(master);
                exec_child(slave, argv);
                // exec_child never returns.
            }
            Ok(ForkResult::Parent { child }) => {
                drop(slave);
                Ok(ChildHandle {
                    pid: child,
                    master: Some(master),
                    reaped: false,
                })
            }
            Err(e) => Err(HupmonError::Spawn(format!("fork: {e}"))),
        }
    }

    pub fn master_fd(&self) -> RawFd {
        self.master
            .as_ref()
            .expect("master_fd called after wait()")
            .as_raw_fd()
    }

    /// Pushes a new window size to the PTY master (propagated to the
    /// slave by the kernel) after a SIGWINCH.
    pub fn push_winsize(&self, winsize: Winsize) -> Result<()> {
        set_winsize(self.master_fd(), winsize)
    }

    /// Delivers SIGHUP to the child. At most one is ever sent per
    /// session per the invariant in §8; callers are responsible for
    /// only calling this once.
    pub fn hangup(&self) -> Result<()> {
        signal::kill(self.pid, Signal::SIGHUP)
            .map_err(|e| HupmonError::Io(std::io::Error::from(e)))
    }

    /// Delivers SIGWINCH to the child.
    pub fn winch(&self) -> Result<()> {
        signal::kill(self.pid, Signal::SIGWINCH)
            .map_err(|e| HupmonError::Io(std::io::Error::from(e)))
    }

    /// Closes the master and waits for the child to exit, mapping the
    /// status to an exit code: low 8 bits on normal exit, `128 + signum`
    /// on signal death.
    ///
    /// The master must be closed *before* `waitpid` is called: if the
    /// child is blocked reading its slave (e.g. `-f cat` after the
    /// controlling terminal has gone away), it only sees EOF once every
    /// open reference to the master is gone. Closing after `waitpid`
    /// returns would deadlock forever in that case.
    pub fn wait(mut self) -> Result<i32> {
        self.reaped = true;
        drop(self.master.take());
        match waitpid(self.pid, None) {
            Ok(WaitStatus::Exited(_, code)) => Ok(code),
            Ok(WaitStatus::Signaled(_, sig, _)) => Ok(128 + sig as i32),
            Ok(_) => Ok(0),
            Err(e) => Err(HupmonError::Io(std::io::Error::from(e))),
        }
    }
}

impl Drop for ChildHandle {
    fn drop(&mut self) {
        if !self.reaped {
            self.reaped = true;
            drop(self.master.take());
            let _ = waitpid(self.pid, None);
        }
    }
}

fn set_winsize(fd: RawFd, winsize: Winsize) -> Result<()> {
    use nix::libc::{ioctl, TIOCSWINSZ};
    let ret = unsafe { ioctl(fd, TIOCSWINSZ, &winsize as *const Winsize) };
    if ret != 0 {
        return Err(HupmonError::Io(std::io::Error::last_os_error()));
    }
    Ok(())
}

/// Child-side exec path. Never returns on success; on failure exits
/// with 127 (not found) or 126 (found, not executable) per §6.
///
/// `termios`/`winsize` are already applied to the slave by `openpty`
/// at allocation time, so nothing further needs setting here beyond
/// making the slave the controlling terminal.
fn exec_child(slave: OwnedFd, argv: &[String]) -> ! {
    let slave_fd = slave.as_raw_fd();
    let _ = nix::unistd::setsid();

    for target in [0, 1, 2] {
        let _ = dup2(slave_fd, target);
    }
    if slave_fd > 2 {
        drop(slave);
    }

    let program = match CString::new(argv[0].as_str()) {
        Ok(c) => c,
        Err(_) => std::process::exit(127),
    };
    let args: Vec<CString> = argv
        .iter()
        .filter_map(|s| CString::new(s.as_str()).ok())
        .collect();

    match execvp(&program, &args) {
        Ok(_) => unreachable!("execvp does not return on success"),
        Err(nix::errno::Errno::ENOENT) => {
            eprintln!("hupmon: {}: command not found", argv[0]);
            std::process::exit(127);
        }
        Err(e) => {
            eprintln!("hupmon: {}: {e}", argv[0]);
            std::process::exit(126);
        }
    }
}
