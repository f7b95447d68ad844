//! I/O Proxy: the bidirectional event loop between the controlling
//! terminal and the child's PTY. Multiplexes both descriptors,
//! demultiplexes embedded XON/XOFF, probes liveness on a deadline, and
//! delivers SIGHUP/SIGWINCH to the child.

use std::os::unix::io::{BorrowedFd, RawFd};
use std::time::Duration;

use nix::errno::Errno;
use nix::poll::{poll, PollFd, PollFlags, PollTimeout};
use nix::pty::Winsize;
use nix::unistd::{read, write};

use crate::child::ChildHandle;
use crate::clock::Deadline;
use crate::device_state::DeviceState;
use crate::error::{HupmonError, Result};
use crate::flow_control::demultiplex;
use crate::prober::probe;
use crate::signal_bridge;
use crate::termios_guard::{ixoff_active, TermiosGuard};

const BUF_SIZE: usize = 4096;

/// Runtime state of one proxy session (§3's ProxyState).
struct ProxyState {
    transmit_ok: bool,
    offline_latched: bool,
}

impl ProxyState {
    fn new() -> Self {
        ProxyState {
            transmit_ok: true,
            offline_latched: false,
        }
    }
}

/// Runs the wrap session: spawns `argv` attached to a fresh PTY,
/// forwards bytes both ways, probes liveness every `timeout` (disabled
/// if `None`), and returns the child's exit code per §6's table (or
/// `-1` if the child never ran).
pub fn run(
    tty_fd: RawFd,
    argv: &[String],
    timeout: Option<Duration>,
    reply_timeout: Duration,
) -> Result<i32> {
    let sigwinch_guard = signal_bridge::install()?;
    let termios_guard = TermiosGuard::save(tty_fd)?;
    let winsize = get_winsize(tty_fd)?;

    if let Err(e) = termios_guard.set_raw() {
        termios_guard.restore();
        sigwinch_guard.restore();
        return Err(e);
    }

    let child = match ChildHandle::spawn(argv, termios_guard.saved(), winsize) {
        Ok(c) => c,
        Err(e) => {
            termios_guard.restore();
            sigwinch_guard.restore();
            return Err(e);
        }
    };

    event_loop(tty_fd, &child, timeout, reply_timeout);

    let exit_code = child.wait().unwrap_or(-1);

    termios_guard.restore();
    sigwinch_guard.restore();

    Ok(exit_code)
}

fn get_winsize(fd: RawFd) -> Result<Winsize> {
    use nix::libc::{ioctl, TIOCGWINSZ};
    let mut ws: Winsize = unsafe { std::mem::zeroed() };
    let ret = unsafe { ioctl(fd, TIOCGWINSZ, &mut ws as *mut Winsize) };
    if ret != 0 {
        return Err(HupmonError::Io(std::io::Error::last_os_error()));
    }
    Ok(ws)
}

fn handle_sigwinch(tty_fd: RawFd, child: &ChildHandle) {
    if !signal_bridge::pending() {
        return;
    }
    if let Ok(ws) = get_winsize(tty_fd) {
        let _ = child.push_winsize(ws);
    }
    let _ = child.winch();
    signal_bridge::clear();
}

fn event_loop(tty_fd: RawFd, child: &ChildHandle, timeout: Option<Duration>, reply_timeout: Duration) {
    let mut state = ProxyState::new();
    let mut deadline = timeout.map(Deadline::after);
    let mut buf = [0u8; BUF_SIZE];
    let master_fd = child.master_fd();

    loop {
        handle_sigwinch(tty_fd, child);

        let timeout_ms: i32 = if state.offline_latched {
            -1
        } else {
            match &deadline {
                Some(d) => d.remaining_ms(),
                None => -1,
            }
        };
        let poll_timeout = if timeout_ms < 0 {
            PollTimeout::NONE
        } else {
            PollTimeout::try_from(timeout_ms).unwrap_or(PollTimeout::ZERO)
        };

        let tty_borrowed = unsafe { BorrowedFd::borrow_raw(tty_fd) };
        let master_borrowed = unsafe { BorrowedFd::borrow_raw(master_fd) };
        let poll_master = state.transmit_ok;

        let mut fds = [
            PollFd::new(tty_borrowed, PollFlags::POLLIN),
            PollFd::new(master_borrowed, PollFlags::POLLIN),
        ];
        let n_fds = if poll_master { 2 } else { 1 };

        match poll(&mut fds[..n_fds], poll_timeout) {
            Ok(0) => {
                handle_probe_timeout(tty_fd, child, &mut state, &mut deadline, timeout, reply_timeout);
                continue;
            }
            Ok(_) => {}
            Err(Errno::EINTR) => continue,
            Err(_) => break,
        }

        let tty_ready = fds[0]
            .revents()
            .map(|r| r.contains(PollFlags::POLLIN))
            .unwrap_or(false);
        let master_ready = poll_master
            && fds[1]
                .revents()
                .map(|r| r.contains(PollFlags::POLLIN))
                .unwrap_or(false);

        if tty_ready {
            match read(tty_fd, &mut buf) {
                Ok(0) => break,
                Ok(n) => {
                    let written = if ixoff_active(tty_fd) {
                        demultiplex(&mut buf[..n], &mut state.transmit_ok)
                    } else {
                        n
                    };
                    if written > 0 {
                        let _ = write(master_borrowed, &buf[..written]);
                    }
                    if let Some(t) = timeout {
                        deadline = Some(Deadline::after(t));
                    }
                }
                Err(Errno::EINTR) => {}
                Err(_) => break,
            }
        }

        if master_ready {
            match read(master_fd, &mut buf) {
                Ok(0) => break,
                Ok(n) => {
                    let _ = write(tty_borrowed, &buf[..n]);
                }
                Err(Errno::EINTR) => {}
                Err(_) => break,
            }
        }
    }
}

/// Handles the "timeout fires and probing enabled" branch of §4.2.
fn handle_probe_timeout(
    tty_fd: RawFd,
    child: &ChildHandle,
    state: &mut ProxyState,
    deadline: &mut Option<Deadline>,
    timeout: Option<Duration>,
    reply_timeout: Duration,
) {
    if deadline.is_none() || state.offline_latched {
        return;
    }

    if !state.transmit_ok {
        // Not allowed to write the probe; treat as OFFLINE per §4.2.
        state.offline_latched = true;
        let _ = child.hangup();
        return;
    }

    let master_borrowed = unsafe { BorrowedFd::borrow_raw(child.master_fd()) };
    match probe(tty_fd, reply_timeout) {
        Ok(outcome) => match outcome.state {
            DeviceState::Offline => {
                state.offline_latched = true;
                let _ = child.hangup();
            }
            DeviceState::Online => {
                if !outcome.reply.is_empty() {
                    let _ = write(master_borrowed, outcome.reply.as_slice());
                }
                if let Some(t) = timeout {
                    *deadline = Some(Deadline::after(t));
                }
            }
            DeviceState::Unknown => {
                if let Some(t) = timeout {
                    *deadline = Some(Deadline::after(t));
                }
            }
        },
        Err(_) => {
            // Probe I/O error: classified UNKNOWN, not OFFLINE (§7).
            if let Some(t) = timeout {
                *deadline = Some(Deadline::after(t));
            }
        }
    }
}
