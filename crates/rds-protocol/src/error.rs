//! Error types for command parsing and frequency validation

use thiserror::Error;

use crate::frequency::{FREQUENCY_MAX, FREQUENCY_MIN, FREQUENCY_STEP};

/// Errors produced when validating a user-facing frequency
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum FrequencyError {
    /// Outside the FM broadcast band
    #[error("frequency {0} outside {min}..={max}", min = FREQUENCY_MIN, max = FREQUENCY_MAX)]
    OutOfRange(u32),

    /// Not on the channel grid
    #[error("frequency {0} is not a multiple of {step}", step = FREQUENCY_STEP)]
    OffGrid(u32),
}

/// Errors that can occur while parsing a client command line
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CommandError {
    /// Blank line
    #[error("empty command line")]
    Empty,

    /// SET_FREQ without exactly one argument
    #[error("command FREQ requires one argument")]
    MissingArgument,

    /// SET_FREQ argument that is not a valid band frequency (raw token kept)
    #[error("invalid frequency: {0}")]
    InvalidFrequency(String),

    /// Verb not in the command table
    #[error("unknown command: {0}")]
    UnknownVerb(String),
}
