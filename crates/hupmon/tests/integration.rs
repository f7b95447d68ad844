//! End-to-end scenarios from the specification's worked examples:
//! one-shot probes against a fabricated terminal peer (an `openpty`
//! pair standing in for the real controlling terminal), and wrap-mode
//! sessions against trivial child commands.

use std::os::unix::io::AsRawFd;
use std::thread;
use std::time::Duration;

use nix::pty::openpty;
use nix::sys::signal::Signal;
use nix::unistd::{read, write};

use hupmon_core::{probe, proxy, DeviceState};

#[test]
fn one_shot_responsive_terminal_reports_online() {
    let pty = openpty(None, None).expect("openpty");
    let master_fd = pty.master.as_raw_fd();
    let slave = pty.slave;

    let responder = thread::spawn(move || {
        let mut buf = [0u8; 4];
        if read(&slave, &mut buf).is_ok() {
            let _ = write(&slave, b"\x1b[24;80R");
        }
    });

    let outcome = probe(master_fd, Duration::from_millis(200)).expect("probe");
    assert_eq!(outcome.state, DeviceState::Online);
    assert!(outcome.reply.is_empty());

    responder.join().unwrap();
}

#[test]
fn one_shot_silent_terminal_reports_offline() {
    let pty = openpty(None, None).expect("openpty");
    let master_fd = pty.master.as_raw_fd();
    let _slave = pty.slave; // held open, never answers the probe

    let outcome = probe(master_fd, Duration::from_millis(50)).expect("probe");
    assert_eq!(outcome.state, DeviceState::Offline);
}

#[test]
fn one_shot_transient_noise_reports_online_with_capture() {
    let pty = openpty(None, None).expect("openpty");
    let master_fd = pty.master.as_raw_fd();
    let slave = pty.slave;

    let responder = thread::spawn(move || {
        let mut buf = [0u8; 4];
        if read(&slave, &mut buf).is_ok() {
            let _ = write(&slave, b"X");
        }
    });

    let outcome = probe(master_fd, Duration::from_millis(200)).expect("probe");
    assert_eq!(outcome.state, DeviceState::Online);
    assert_eq!(outcome.reply.as_slice(), b"X");

    responder.join().unwrap();
}

#[test]
fn wrap_mode_clean_child_exit_returns_status_code() {
    let pty = openpty(None, None).expect("openpty");
    let master_fd = pty.master.as_raw_fd();
    let _slave = pty.slave;

    let code = proxy::run(master_fd, &["true".to_string()], None, Duration::from_millis(200))
        .expect("proxy run");
    assert_eq!(code, 0);
}

#[test]
fn wrap_mode_silent_terminal_triggers_hangup() {
    let pty = openpty(None, None).expect("openpty");
    let master_fd = pty.master.as_raw_fd();
    let _slave = pty.slave; // never answers any CPR probe

    let code = proxy::run(
        master_fd,
        &["sleep".to_string(), "5".to_string()],
        Some(Duration::from_millis(50)),
        Duration::from_millis(30),
    )
    .expect("proxy run");

    assert_eq!(code, 128 + Signal::SIGHUP as i32);
}

#[test]
fn flow_only_mode_never_probes_or_hangs_up() {
    let pty = openpty(None, None).expect("openpty");
    let master_fd = pty.master.as_raw_fd();
    let _slave = pty.slave; // silent; flow-only disables the inactivity timeout

    let code = proxy::run(master_fd, &["true".to_string()], None, Duration::from_millis(200))
        .expect("proxy run");
    assert_eq!(code, 0);
}
