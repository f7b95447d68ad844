//! Error types for hupmon-core.

use thiserror::Error;

/// Main error type for the liveness/proxy engine.
#[derive(Error, Debug)]
pub enum HupmonError {
    /// IO error during a terminal or PTY operation.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// `tcgetattr`/`tcsetattr`/window-size ioctl failure.
    #[error("terminal configuration error: {0}")]
    Termios(String),

    /// PTY allocation or child process spawn failure.
    #[error("spawn error: {0}")]
    Spawn(String),
}

/// Result type alias for hupmon-core operations.
pub type Result<T> = std::result::Result<T, HupmonError>;

impl From<nix::Error> for HupmonError {
    fn from(e: nix::Error) -> Self {
        HupmonError::Io(std::io::Error::from(e))
    }
}
