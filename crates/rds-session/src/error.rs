//! Error types for client sessions

use rds_tuner::TunerError;
use thiserror::Error;

/// Errors that end a client session
///
/// None of these are fatal to the server; the accept loop keeps running.
#[derive(Debug, Error)]
pub enum SessionError {
    /// Socket or device stream failure
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Tuner control failure; the device state is unknown afterwards
    #[error("tuner error: {0}")]
    Tuner(#[from] TunerError),
}
