//! HUPMon entry point: argument parsing, logging setup, precondition
//! checks, environment exposure, and mode dispatch.
//!
//! Follows the teacher's `main.rs` split (`setup_logging` + a `run`
//! dispatcher returning a `Result`), adapted to HUPMon's three modes
//! and exit-code table (§6).

mod cli;
mod status;

use std::io::Write;
use std::os::unix::io::RawFd;
use std::process::ExitCode;

use clap::Parser;
use log::{info, LevelFilter};
use nix::sys::stat::fstat;
use nix::unistd::isatty;

use cli::{Cli, Mode};
use hupmon_core::proxy;

const STDIN_FD: RawFd = 0;
const STDOUT_FD: RawFd = 1;

/// A failure that main() must turn into a process exit code: usage
/// errors exit 2, everything else exits 1 (§6).
enum RunError {
    Usage(String),
    Internal(String),
}

impl RunError {
    fn exit_code(&self) -> u8 {
        match self {
            RunError::Usage(_) => 2,
            RunError::Internal(_) => 1,
        }
    }

    fn message(&self) -> &str {
        match self {
            RunError::Usage(m) | RunError::Internal(m) => m,
        }
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    setup_logging(cli.verbose);

    match run(&cli) {
        Ok(code) => ExitCode::from(code.clamp(0, 255) as u8),
        Err(e) => {
            eprintln!("hupmon: {}", e.message());
            ExitCode::from(e.exit_code())
        }
    }
}

fn setup_logging(verbosity: u8) {
    let filter = match verbosity {
        0 => LevelFilter::Warn,
        1 => LevelFilter::Info,
        2 => LevelFilter::Debug,
        _ => LevelFilter::Trace,
    };
    env_logger::Builder::new()
        .filter_level(filter)
        .format(|buf, record| writeln!(buf, "[{}] {}: {}", record.level(), record.target(), record.args()))
        .init();
}

fn run(cli: &Cli) -> Result<i32, RunError> {
    if cli.conflicting_modes() {
        return Err(RunError::Usage(
            "-1, -f, and -h are mutually exclusive".to_string(),
        ));
    }

    match cli.mode() {
        Mode::OneShot => run_one_shot(cli),
        Mode::FlowOnly | Mode::Hangup => run_wrap(cli),
    }
}

fn run_one_shot(cli: &Cli) -> Result<i32, RunError> {
    if !cli.command.is_empty() {
        return Err(RunError::Usage("-1 does not take a command".to_string()));
    }
    if !isatty(STDIN_FD).unwrap_or(false) {
        return Err(RunError::Usage("-1 requires a TTY on stdin".to_string()));
    }

    status::print_status(STDIN_FD, cli.reply_timeout_duration())
        .map(|_| 0)
        .map_err(|e| RunError::Internal(e.to_string()))
}

fn run_wrap(cli: &Cli) -> Result<i32, RunError> {
    if cli.command.is_empty() {
        return Err(RunError::Usage("a command is required".to_string()));
    }
    if !same_tty(STDIN_FD, STDOUT_FD) {
        return Err(RunError::Usage(
            "stdin and stdout must be the same controlling terminal".to_string(),
        ));
    }

    std::env::set_var("HUPMON_PID", std::process::id().to_string());
    if let Some(path) = tty_path(STDIN_FD) {
        std::env::set_var("HUPMON_TTY", path);
    }

    let timeout = cli.inactivity_timeout();
    info!(
        "wrapping {:?} (mode={:?}, inactivity_timeout={:?}, reply_timeout={:?})",
        cli.command,
        cli.mode(),
        timeout,
        cli.reply_timeout_duration()
    );

    proxy::run(STDIN_FD, &cli.command, timeout, cli.reply_timeout_duration())
        .map_err(|e| RunError::Internal(e.to_string()))
}

/// stdin and stdout must refer to the same controlling terminal,
/// compared by device and inode rather than by fd number (§4.1).
fn same_tty(a: RawFd, b: RawFd) -> bool {
    match (fstat(a), fstat(b)) {
        (Ok(sa), Ok(sb)) => sa.st_dev == sb.st_dev && sa.st_ino == sb.st_ino,
        _ => false,
    }
}

fn tty_path(fd: RawFd) -> Option<String> {
    std::fs::read_link(format!("/proc/self/fd/{fd}"))
        .ok()
        .map(|p| p.display().to_string())
}
