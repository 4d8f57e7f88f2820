//! Error types for tuner access

use thiserror::Error;

/// Errors that can occur while opening or controlling a tuner
#[derive(Debug, Error)]
pub enum TunerError {
    /// Failed to open the device node
    #[error("failed to open {path}: {source}")]
    Open {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// Device exists but has no tuner capability
    #[error("{0} is not a radio tuner")]
    NotATuner(String),

    /// A device control request failed
    #[cfg(target_os = "linux")]
    #[error("{request} failed: {source}")]
    Ioctl {
        request: &'static str,
        #[source]
        source: nix::errno::Errno,
    },

    /// Device stopped responding
    #[error("tuner unavailable: {0}")]
    Unavailable(String),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
