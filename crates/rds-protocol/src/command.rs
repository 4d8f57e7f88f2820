//! Client command language
//!
//! Clients send newline-terminated ASCII lines. A line is trimmed,
//! upper-cased and split on whitespace into a verb and its arguments:
//!
//! | Verb | Arguments | Meaning |
//! |------|-----------|---------|
//! | `QUIT` | - | close the session |
//! | `SET_FREQ` | kHz | tune to an in-band, on-grid frequency |
//! | `GET_FREQ` | - | report the tuned frequency |
//! | `GET_SIGNAL` | - | report signal strength |
//! | `SEEK` | `[DOWN]` | hardware seek, upward unless `DOWN` |
//! | `UP` / `DOWN` | - | move one channel, wrapping at the band edges |
//! | `ID` | - | report the device name |
//!
//! Replies are single lines prefixed with [`REPLY_MARKER`] so clients can tell
//! them apart from RDS group lines, which are never prefixed.

use std::fmt;
use std::str::FromStr;

use crate::error::CommandError;
use crate::frequency::Frequency;
use crate::{Direction, FrameCodec};

/// First character of every reply line
pub const REPLY_MARKER: char = '%';

/// Longest command line accepted before the buffer is discarded
const MAX_LINE_LEN: usize = 256;

/// A parsed client command
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    /// Close the connection without a reply
    Quit,
    /// Tune to a validated frequency
    SetFrequency(Frequency),
    GetFrequency,
    GetSignal,
    /// Hardware seek with wraparound
    Seek(Direction),
    /// Move one channel, wrapping at the band edges
    Step(Direction),
    /// Report the device identifier
    Id,
}

impl Command {
    /// Parse one command line
    ///
    /// Unknown verbs and blank lines are errors with no reply; malformed
    /// `SET_FREQ` arguments are errors that carry a reply
    /// (see [`CommandError::reply`]).
    pub fn parse(line: &str) -> Result<Self, CommandError> {
        let line = line.trim().to_uppercase();
        let mut parts = line.split_whitespace();
        let verb = parts.next().ok_or(CommandError::Empty)?;
        let args: Vec<&str> = parts.collect();

        match verb {
            "QUIT" => Ok(Self::Quit),
            "SET_FREQ" => match args.as_slice() {
                [raw] => raw
                    .parse::<u32>()
                    .ok()
                    .and_then(|khz| Frequency::new(khz).ok())
                    .map(Self::SetFrequency)
                    .ok_or_else(|| CommandError::InvalidFrequency(canonical_number(raw))),
                _ => Err(CommandError::MissingArgument),
            },
            "GET_FREQ" => Ok(Self::GetFrequency),
            "GET_SIGNAL" => Ok(Self::GetSignal),
            "SEEK" => match args.as_slice() {
                ["DOWN"] => Ok(Self::Seek(Direction::Down)),
                _ => Ok(Self::Seek(Direction::Up)),
            },
            "UP" => Ok(Self::Step(Direction::Up)),
            "DOWN" => Ok(Self::Step(Direction::Down)),
            "ID" => Ok(Self::Id),
            other => Err(CommandError::UnknownVerb(other.to_string())),
        }
    }

    /// The protocol verb for this command
    pub fn verb(&self) -> &'static str {
        match self {
            Self::Quit => "QUIT",
            Self::SetFrequency(_) => "SET_FREQ",
            Self::GetFrequency => "GET_FREQ",
            Self::GetSignal => "GET_SIGNAL",
            Self::Seek(_) => "SEEK",
            Self::Step(Direction::Up) => "UP",
            Self::Step(Direction::Down) => "DOWN",
            Self::Id => "ID",
        }
    }
}

impl FromStr for Command {
    type Err = CommandError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

/// Echo numeric arguments the way they were understood (`087550` -> `87550`)
fn canonical_number(raw: &str) -> String {
    raw.parse::<u64>()
        .map(|n| n.to_string())
        .unwrap_or_else(|_| raw.to_string())
}

/// A reply line sent to the client
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reply {
    /// Tuned frequency in kHz
    Frequency(u32),
    /// Signal strength in device units
    Signal(i32),
    /// Device identifier
    Id(String),
    /// Rejected SET_FREQ argument
    InvalidFrequency(String),
    /// SET_FREQ without exactly one argument
    MissingArgument,
}

impl Reply {
    /// Full wire line including marker and terminator
    pub fn to_line(&self) -> String {
        format!("{} {}\n", REPLY_MARKER, self)
    }
}

impl fmt::Display for Reply {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Frequency(khz) => write!(f, "Freq: {}", khz),
            Self::Signal(level) => write!(f, "Signal: {}", level),
            Self::Id(name) => write!(f, "Id: {}", name),
            Self::InvalidFrequency(raw) => write!(f, "Invalid frequency: {}", raw),
            Self::MissingArgument => f.write_str("Command FREQ requires one argument."),
        }
    }
}

impl CommandError {
    /// The reply owed to the client for this error, if any
    pub fn reply(&self) -> Option<Reply> {
        match self {
            Self::MissingArgument => Some(Reply::MissingArgument),
            Self::InvalidFrequency(raw) => Some(Reply::InvalidFrequency(raw.clone())),
            Self::Empty | Self::UnknownVerb(_) => None,
        }
    }
}

/// Streaming codec that splits client bytes into lines
///
/// Accepts `\n` and `\r\n` terminators. Invalid UTF-8 is replaced rather than
/// rejected. A line that grows past the buffer limit is dropped whole, up to
/// and including its terminator.
#[derive(Debug, Default)]
pub struct LineCodec {
    buffer: Vec<u8>,
    /// Inside an overlong line; skip until the next `\n`
    discarding: bool,
}

impl LineCodec {
    pub fn new() -> Self {
        Self {
            buffer: Vec::with_capacity(64),
            discarding: false,
        }
    }

    /// Whether the rest of the current line is being thrown away
    pub fn is_discarding(&self) -> bool {
        self.discarding
    }
}

impl FrameCodec for LineCodec {
    type Frame = String;

    fn push_bytes(&mut self, mut data: &[u8]) {
        if self.discarding {
            match data.iter().position(|&b| b == b'\n') {
                Some(end) => {
                    self.discarding = false;
                    data = &data[end + 1..];
                }
                None => return,
            }
        }

        self.buffer.extend_from_slice(data);

        let line_start = self
            .buffer
            .iter()
            .rposition(|&b| b == b'\n')
            .map_or(0, |end| end + 1);
        let pending = self.buffer.len() - line_start;
        if pending > MAX_LINE_LEN {
            tracing::warn!(
                "Discarding unterminated command line after {} bytes",
                pending
            );
            self.buffer.truncate(line_start);
            self.discarding = true;
        }
    }

    fn next_frame(&mut self) -> Option<String> {
        let end = self.buffer.iter().position(|&b| b == b'\n')?;
        let line: Vec<u8> = self.buffer.drain(..=end).collect();
        let text = String::from_utf8_lossy(&line[..line.len() - 1]);
        Some(text.trim_end_matches('\r').to_string())
    }

    fn clear(&mut self) {
        self.buffer.clear();
        self.discarding = false;
    }
}
