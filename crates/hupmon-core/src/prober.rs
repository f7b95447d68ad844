//! Liveness Prober: a CPR (Cursor Position Report) probe driven by a
//! table-based state machine, run against a raw-mode terminal under a
//! deadline that can be extended by embedded XOFF bytes.

use std::os::unix::io::{BorrowedFd, RawFd};
use std::time::Duration;

use nix::errno::Errno;
use nix::poll::{poll, PollFd, PollFlags, PollTimeout};
use nix::unistd::{read, write};

use crate::clock::Deadline;
use crate::device_state::{classify, ByteClass, DeviceState, ProbeBuffer, ESC, XOFF};
use crate::error::Result;
use crate::termios_guard::TermiosGuard;

/// The literal 4-byte CPR request: `ESC [ 6 n`.
pub const CPR_REQUEST: [u8; 4] = [0x1B, b'[', b'6', b'n'];

/// How much the deadline is pushed out when an XOFF arrives mid-probe
/// on a terminal with IXOFF set.
const XOFF_EXTENSION: Duration = Duration::from_millis(100);

/// Outcome of a single probe: the classification, plus any bytes
/// captured that were not consumed as part of a well-formed CPR (to be
/// forwarded to the child by the caller).
#[derive(Debug)]
pub struct ProbeOutcome {
    pub state: DeviceState,
    pub reply: ProbeBuffer,
}

/// 10-state CPR validator, encoding the grammar
/// `ESC [ [0-9]{1,3} ; [0-9]{1,3} R` as a table indexed by (state, class).
///
/// States follow §3's labeling (0=ESC, 1=`[`, 2-4=row digits, 5=`;`,
/// 6-8=column digits, 9=`R`), read as "the token type expected next".
/// The short-field shortcut (§9) is expressed directly: seeing `;`
/// while still in the row-digit states (3 or 4) jumps straight to the
/// first column-digit state (6); seeing `R` while still in the
/// column-digit states (7 or 8) completes the match immediately.
struct Validator {
    state: u8,
}

enum Transition {
    Advance(u8),
    Complete,
    Mismatch,
    /// Control byte other than ESC: ignored, does not advance.
    Ignore,
}

impl Validator {
    fn new() -> Self {
        Validator { state: 0 }
    }

    fn feed(&mut self, byte: u8) -> Transition {
        let class = classify(byte);
        if class == ByteClass::OtherControl {
            return Transition::Ignore;
        }

        let transition = match (self.state, class) {
            (0, ByteClass::Esc) => Transition::Advance(1),
            (1, ByteClass::LBracket) => Transition::Advance(2),
            (2, ByteClass::Digit) => Transition::Advance(3),
            (3, ByteClass::Digit) => Transition::Advance(4),
            (3, ByteClass::Semicolon) => Transition::Advance(6),
            (4, ByteClass::Digit) => Transition::Advance(5),
            (4, ByteClass::Semicolon) => Transition::Advance(6),
            (5, ByteClass::Semicolon) => Transition::Advance(6),
            (6, ByteClass::Digit) => Transition::Advance(7),
            (7, ByteClass::Digit) => Transition::Advance(8),
            (7, ByteClass::R) => Transition::Complete,
            (8, ByteClass::Digit) => Transition::Advance(9),
            (8, ByteClass::R) => Transition::Complete,
            (9, ByteClass::R) => Transition::Complete,
            _ => Transition::Mismatch,
        };

        if let Transition::Advance(next) = transition {
            self.state = next;
        }
        transition
    }
}

/// Runs one liveness probe against `fd` with reply timeout `reply_timeout`
/// (caller-enforced minimum 10ms per §6).
pub fn probe(fd: RawFd, reply_timeout: Duration) -> Result<ProbeOutcome> {
    let guard = match TermiosGuard::save(fd) {
        Ok(g) => g,
        Err(_) => {
            return Ok(ProbeOutcome {
                state: DeviceState::Unknown,
                reply: ProbeBuffer::new(),
            })
        }
    };
    if guard.set_raw().is_err() {
        guard.restore();
        return Ok(ProbeOutcome {
            state: DeviceState::Unknown,
            reply: ProbeBuffer::new(),
        });
    }

    let ixoff = guard.ixoff();
    let outcome = run_probe_io(fd, reply_timeout, ixoff);
    guard.restore();
    outcome
}

fn run_probe_io(fd: RawFd, reply_timeout: Duration, ixoff: bool) -> Result<ProbeOutcome> {
    let borrowed = unsafe { BorrowedFd::borrow_raw(fd) };
    if write(borrowed, &CPR_REQUEST).is_err() {
        return Ok(ProbeOutcome {
            state: DeviceState::Unknown,
            reply: ProbeBuffer::new(),
        });
    }
    if nix::sys::termios::tcdrain(borrowed).is_err() {
        return Ok(ProbeOutcome {
            state: DeviceState::Unknown,
            reply: ProbeBuffer::new(),
        });
    }

    let mut deadline = Deadline::after(reply_timeout);
    let mut validator = Validator::new();
    let mut reply = ProbeBuffer::new();
    let mut saw_non_control = false;

    loop {
        let timeout_ms = deadline.remaining_ms();
        let borrowed = unsafe { BorrowedFd::borrow_raw(fd) };
        let mut fds = [PollFd::new(borrowed, PollFlags::POLLIN)];
        let poll_timeout = PollTimeout::try_from(timeout_ms).unwrap_or(PollTimeout::ZERO);

        match poll(&mut fds, poll_timeout) {
            Ok(0) => {
                return Ok(ProbeOutcome {
                    state: if saw_non_control {
                        DeviceState::Online
                    } else {
                        DeviceState::Offline
                    },
                    reply,
                });
            }
            Ok(_) => {}
            Err(Errno::EINTR) => continue,
            Err(_) => {
                return Ok(ProbeOutcome {
                    state: DeviceState::Unknown,
                    reply,
                })
            }
        }

        let mut buf = [0u8; 1];
        match read(fd, &mut buf) {
            Ok(0) => {
                return Ok(ProbeOutcome {
                    state: DeviceState::Unknown,
                    reply,
                })
            }
            Ok(_) => {}
            Err(Errno::EINTR) => continue,
            Err(_) => {
                return Ok(ProbeOutcome {
                    state: DeviceState::Unknown,
                    reply,
                })
            }
        }

        let byte = buf[0];
        let class = classify(byte);

        if class == ByteClass::OtherControl {
            if byte == XOFF && ixoff {
                deadline.extend(XOFF_EXTENSION);
            }
            continue;
        }

        saw_non_control = true;
        reply.push(byte);

        match validator.feed(byte) {
            Transition::Advance(_) => continue,
            Transition::Complete => {
                return Ok(ProbeOutcome {
                    state: DeviceState::Online,
                    reply: ProbeBuffer::new(), // consumed silently
                });
            }
            Transition::Mismatch => {
                return Ok(ProbeOutcome {
                    state: DeviceState::Online,
                    reply,
                });
            }
            Transition::Ignore => unreachable!("control bytes filtered above"),
        }
    }
}

/// Pure, I/O-free run of the CPR validator over a byte slice, as if it
/// had arrived over the wire with no intervening control bytes.
/// Exposed for property testing the acceptor in isolation (§8's
/// round-trip laws) without needing a real terminal.
pub fn validate_bytes(bytes: &[u8]) -> (DeviceState, ProbeBuffer) {
    let mut validator = Validator::new();
    let mut reply = ProbeBuffer::new();
    let mut saw_non_control = false;
    for &b in bytes {
        let class = classify(b);
        if class == ByteClass::OtherControl {
            continue;
        }
        saw_non_control = true;
        reply.push(b);
        match validator.feed(b) {
            Transition::Advance(_) => continue,
            Transition::Complete => return (DeviceState::Online, ProbeBuffer::new()),
            Transition::Mismatch => return (DeviceState::Online, reply),
            Transition::Ignore => unreachable!(),
        }
    }
    // A truncated-but-started sequence (or any stray non-control byte)
    // still counts as ONLINE, matching `run_probe_io`'s `saw_non_control`.
    let state = if saw_non_control {
        DeviceState::Online
    } else {
        DeviceState::Offline
    };
    (state, reply)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn feed_all(bytes: &[u8]) -> (DeviceState, usize) {
        let (state, reply) = validate_bytes(bytes);
        (state, reply.len())
    }

    #[test]
    fn full_cpr_three_digit_match() {
        let (state, len) = feed_all(b"\x1b[123;456R");
        assert_eq!(state, DeviceState::Online);
        assert_eq!(len, 0);
    }

    #[test]
    fn full_cpr_one_digit_match() {
        let (state, len) = feed_all(b"\x1b[1;1R");
        assert_eq!(state, DeviceState::Online);
        assert_eq!(len, 0);
    }

    #[test]
    fn full_cpr_two_digit_match() {
        let (state, len) = feed_all(b"\x1b[12;34R");
        assert_eq!(state, DeviceState::Online);
        assert_eq!(len, 0);
    }

    #[test]
    fn single_stray_byte_is_online_with_capture() {
        let (state, len) = feed_all(b"?");
        assert_eq!(state, DeviceState::Online);
        assert_eq!(len, 1);
    }

    #[test]
    fn malformed_sequence_forwarded() {
        let (state, len) = feed_all(b"\x1b[9");
        assert_eq!(state, DeviceState::Online);
        assert_eq!(len, 3);
    }

    #[test]
    fn no_bytes_at_all_is_offline() {
        let (state, len) = feed_all(b"");
        assert_eq!(state, DeviceState::Offline);
        assert_eq!(len, 0);
    }
}
