//! Command-line interface for HUPMon.
//!
//! Mirrors the teacher's `#[derive(Parser)]` style (`streamdown-rs`'s
//! `src/cli.rs`), adapted to HUPMon's three mutually exclusive
//! invocation modes and numeric-with-minimum options from §6.

use std::time::Duration;

use clap::{ArgAction, Parser};

/// HUPMon - detects hangups on serial terminals lacking hardware
/// carrier-detect, and bridges software flow control for subordinate
/// programs that do not implement it.
#[derive(Parser, Debug)]
#[command(
    name = "hupmon",
    author,
    version,
    about = "Terminal-liveness hangup detector and flow-control bridge",
    disable_help_flag = true,
    after_help = "Examples:\n  \
                  hupmon -- login\n  \
                  hupmon -f cat\n  \
                  hupmon -1 -r 0.2"
)]
pub struct Cli {
    /// One-shot status: print a device status line and exit. Requires
    /// a TTY on stdin; forbids a command.
    #[arg(short = '1')]
    pub one_shot: bool,

    /// Flow-control-only: bridge XON/XOFF without liveness probing.
    #[arg(short = 'f')]
    pub flow_only: bool,

    /// Hangup-detector (default mode when neither -1 nor -f is given).
    #[arg(short = 'h')]
    pub hangup: bool,

    /// Reply timeout in seconds for the CPR probe (minimum 0.01).
    #[arg(short = 'r', value_name = "SECS", default_value_t = 0.200, value_parser = parse_reply_timeout)]
    pub reply_timeout: f64,

    /// Inactivity threshold in seconds before probing (minimum 1).
    #[arg(short = 't', value_name = "SECS", default_value_t = 10.0, value_parser = parse_inactivity_timeout)]
    pub inactivity_timeout: f64,

    /// Increase logging verbosity (repeatable: -v, -vv, -vvv).
    #[arg(short = 'v', action = ArgAction::Count)]
    pub verbose: u8,

    /// Print help and exit.
    #[arg(long = "help", action = ArgAction::Help)]
    _help: Option<bool>,

    /// Command (and its arguments) to wrap.
    #[arg(trailing_var_arg = true, allow_hyphen_values = true)]
    pub command: Vec<String>,
}

/// The three mutually exclusive invocation modes from §6.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    OneShot,
    FlowOnly,
    Hangup,
}

impl Cli {
    /// Resolves the selected mode, defaulting to `Hangup` per §6.
    pub fn mode(&self) -> Mode {
        if self.one_shot {
            Mode::OneShot
        } else if self.flow_only {
            Mode::FlowOnly
        } else {
            Mode::Hangup
        }
    }

    /// Whether more than one of `-1`/`-f`/`-h` was given.
    pub fn conflicting_modes(&self) -> bool {
        [self.one_shot, self.flow_only, self.hangup]
            .iter()
            .filter(|&&b| b)
            .count()
            > 1
    }

    pub fn reply_timeout_duration(&self) -> Duration {
        Duration::from_secs_f64(self.reply_timeout)
    }

    /// `None` disables probing, per `-f`'s `T = -1` in §6.
    pub fn inactivity_timeout(&self) -> Option<Duration> {
        match self.mode() {
            Mode::FlowOnly => None,
            _ => Some(Duration::from_secs_f64(self.inactivity_timeout)),
        }
    }
}

fn parse_reply_timeout(s: &str) -> Result<f64, String> {
    let v: f64 = s.parse().map_err(|_| format!("invalid number: {s}"))?;
    if v < 0.01 {
        Err(format!("reply timeout must be >= 0.01 seconds (got {v})"))
    } else {
        Ok(v)
    }
}

fn parse_inactivity_timeout(s: &str) -> Result<f64, String> {
    let v: f64 = s.parse().map_err(|_| format!("invalid number: {s}"))?;
    if v < 1.0 {
        Err(format!("inactivity timeout must be >= 1 second (got {v})"))
    } else {
        Ok(v)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_mode_is_hangup() {
        let cli = Cli::parse_from(["hupmon", "sleep", "1"]);
        assert_eq!(cli.mode(), Mode::Hangup);
        assert_eq!(cli.command, vec!["sleep", "1"]);
    }

    #[test]
    fn one_shot_mode_parses() {
        let cli = Cli::parse_from(["hupmon", "-1"]);
        assert_eq!(cli.mode(), Mode::OneShot);
        assert!(cli.command.is_empty());
    }

    #[test]
    fn flow_only_disables_timeout() {
        let cli = Cli::parse_from(["hupmon", "-f", "cat"]);
        assert_eq!(cli.mode(), Mode::FlowOnly);
        assert_eq!(cli.inactivity_timeout(), None);
    }

    #[test]
    fn reply_timeout_minimum_rejected() {
        let result = Cli::try_parse_from(["hupmon", "-r", "0.009", "true"]);
        assert!(result.is_err());
    }

    #[test]
    fn reply_timeout_minimum_accepted() {
        let cli = Cli::parse_from(["hupmon", "-r", "0.01", "true"]);
        assert!((cli.reply_timeout - 0.01).abs() < 1e-9);
    }

    #[test]
    fn inactivity_timeout_minimum_rejected() {
        let result = Cli::try_parse_from(["hupmon", "-t", "0.999", "true"]);
        assert!(result.is_err());
    }

    #[test]
    fn inactivity_timeout_minimum_accepted() {
        let cli = Cli::parse_from(["hupmon", "-t", "1", "true"]);
        assert_eq!(cli.inactivity_timeout(), Some(Duration::from_secs(1)));
    }

    #[test]
    fn default_reply_and_inactivity_timeouts() {
        let cli = Cli::parse_from(["hupmon", "true"]);
        assert!((cli.reply_timeout - 0.200).abs() < 1e-9);
        assert_eq!(cli.inactivity_timeout(), Some(Duration::from_secs(10)));
    }

    #[test]
    fn command_vector_stops_option_parsing() {
        let cli = Cli::parse_from(["hupmon", "-t", "5", "--", "ls", "-la"]);
        assert_eq!(cli.command, vec!["ls", "-la"]);
    }

    #[test]
    fn conflicting_modes_detected() {
        let cli = Cli::parse_from(["hupmon", "-1", "-f"]);
        assert!(cli.conflicting_modes());
    }
}
