//! Tuner Control Adapter
//!
//! This crate hides the radio hardware behind two traits:
//!
//! - [`TunerControl`]: the synchronous control calls (frequency, seek,
//!   signal, identification), one device request each
//! - [`TunerSource`]: opens a device for one client session, returning the
//!   raw RDS byte stream together with a control handle on the same device
//!
//! The Linux implementation in [`v4l2`] talks to `/dev/radioN` through V4L2
//! ioctls. A simulated implementation lives in the `rds-sim` crate.
//!
//! Frequencies cross this boundary in device units (1/16 kHz); conversion
//! to user units is the caller's job.

pub mod error;
#[cfg(target_os = "linux")]
pub mod v4l2;

use tokio::io::AsyncRead;

pub use error::TunerError;
pub use rds_protocol::Direction;
#[cfg(target_os = "linux")]
pub use v4l2::{RdsStream, V4l2Source, V4l2Tuner};

/// Synchronous control interface of a radio tuner
///
/// Every call maps to exactly one device request and may block. Failures are
/// returned as-is; nothing is retried.
pub trait TunerControl: Send {
    /// Current tuned frequency in device units
    fn frequency(&self) -> Result<u32, TunerError>;

    /// Tune to a frequency in device units
    fn set_frequency(&self, units: u32) -> Result<(), TunerError>;

    /// Run a hardware seek with wraparound, returning once it completes
    fn seek(&self, direction: Direction) -> Result<(), TunerError>;

    /// Instantaneous signal strength in device units
    fn signal(&self) -> Result<i32, TunerError>;

    /// Device identifier string
    fn capability_name(&self) -> Result<String, TunerError>;
}

/// Opens independent device instances, one per client session
pub trait TunerSource: Send + Sync + 'static {
    /// Raw RDS block stream
    type Stream: AsyncRead + Unpin + Send + 'static;
    /// Control handle on the same device as the stream
    type Tuner: TunerControl + 'static;

    /// Human-readable description for logs
    fn describe(&self) -> String;

    /// Open the device; must be called from within a tokio runtime
    fn open(&self) -> Result<(Self::Stream, Self::Tuner), TunerError>;
}
