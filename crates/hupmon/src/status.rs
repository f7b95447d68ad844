//! One-shot status printer (§4, `-1` mode): probes once and prints
//! exactly one literal status line to stdout.

use std::io::{self, Write};
use std::os::unix::io::RawFd;
use std::time::Duration;

use hupmon_core::{probe, DeviceState};

/// Runs a single probe against `fd` and writes the matching status
/// line to stdout, flushing before returning. A failed probe still
/// prints `DEVICE_STATUS_UNKNOWN`; the diagnostic goes to stderr
/// separately so stdout always carries exactly one of the three
/// literal lines and nothing else.
pub fn print_status(fd: RawFd, reply_timeout: Duration) -> io::Result<()> {
    let outcome = probe(fd, reply_timeout)
        .map_err(|e| io::Error::new(io::ErrorKind::Other, e.to_string()))?;

    let line = match outcome.state {
        DeviceState::Online => "DEVICE_ONLINE",
        DeviceState::Offline => "DEVICE_OFFLINE",
        DeviceState::Unknown => {
            eprintln!("hupmon: probe did not complete");
            "DEVICE_STATUS_UNKNOWN"
        }
    };

    let stdout = io::stdout();
    let mut handle = stdout.lock();
    writeln!(handle, "{line}")?;
    handle.flush()
}
