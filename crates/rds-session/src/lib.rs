//! RDS Session Engine
//!
//! This crate runs the client side of the RDS tuner server. Each TCP client
//! gets its own [`Session`], which multiplexes two streams:
//!
//! - **Device stream**: raw 3-byte RDS blocks, framed and assembled into
//!   groups, then forwarded to the client as one hex line per group
//! - **Client stream**: newline-terminated text commands, executed against
//!   the tuner with replies prefixed by `% `
//!
//! The [`Server`] accepts connections and opens a fresh device instance for
//! every client through a [`rds_tuner::TunerSource`]. Sessions share nothing
//! but the physical tuner, so the last frequency change wins.
//!
//! # Example
//!
//! ```rust,no_run
//! use rds_session::{Server, ServerConfig};
//! use rds_sim::{SimulatedSource, VirtualTuner};
//!
//! # async fn run() -> std::io::Result<()> {
//! let source = SimulatedSource::new(VirtualTuner::default());
//! let server = Server::new(ServerConfig::default(), source);
//! server.run_until(async { let _ = tokio::signal::ctrl_c().await; }).await
//! # }
//! ```

pub mod connection;
pub mod error;
pub mod interpreter;
pub mod server;

pub use connection::{EndReason, Session, SessionConfig, SessionSummary, DEFAULT_POLL_INTERVAL};
pub use error::SessionError;
pub use interpreter::{execute, interpret_line, run_control, Outcome};
pub use server::{handle_connection, Server, ServerConfig, DEFAULT_PORT};
