//! Per-connection session loop
//!
//! A session owns one client stream, one device stream and one tuner handle.
//! Each iteration waits for whichever stream becomes readable first (or the
//! poll interval to lapse) and handles exactly that event before waiting
//! again, so writes to the client never interleave.

use std::fmt;
use std::time::Duration;

use rds_protocol::{BlockCodec, DecoderStats, FrameCodec, GroupDecoder, LineCodec};
use rds_tuner::TunerControl;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tracing::{debug, info, trace};

use crate::error::SessionError;
use crate::interpreter::{interpret_line, run_control, Outcome};

/// Default bound on one multiplexed wait
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(1);

/// Read buffer size for each stream
const READ_BUFFER_LEN: usize = 1024;

/// Session tuning knobs
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionConfig {
    /// Upper bound on a single wait for readability
    pub poll_interval: Duration,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            poll_interval: DEFAULT_POLL_INTERVAL,
        }
    }
}

/// Why a session ended normally
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EndReason {
    /// Client closed its side
    ClientClosed,
    /// Client sent QUIT
    Quit,
    /// Device stream reached end of file
    DeviceClosed,
}

impl fmt::Display for EndReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::ClientClosed => "client closed",
            Self::Quit => "quit",
            Self::DeviceClosed => "device closed",
        })
    }
}

/// Counters reported when a session ends
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionSummary {
    pub reason: EndReason,
    pub decoder: DecoderStats,
    /// Command lines received
    pub commands: u64,
    /// Waits that timed out with nothing to do
    pub idle_polls: u64,
}

/// One client session
///
/// Generic over the device stream `D`, client stream `C` and tuner `T` so the
/// same loop drives real hardware, simulated tuners and in-memory tests.
pub struct Session<D, C, T> {
    device: D,
    client: C,
    tuner: T,
    config: SessionConfig,
    blocks: BlockCodec,
    decoder: GroupDecoder,
    lines: LineCodec,
    device_buf: Vec<u8>,
    client_buf: Vec<u8>,
    commands: u64,
    idle_polls: u64,
}

impl<D, C, T> Session<D, C, T>
where
    D: AsyncRead + Unpin,
    C: AsyncRead + AsyncWrite + Unpin,
    T: TunerControl,
{
    pub fn new(device: D, client: C, tuner: T, config: SessionConfig) -> Self {
        Self {
            device,
            client,
            tuner,
            config,
            blocks: BlockCodec::new(),
            decoder: GroupDecoder::new(),
            lines: LineCodec::new(),
            device_buf: vec![0u8; READ_BUFFER_LEN],
            client_buf: vec![0u8; READ_BUFFER_LEN],
            commands: 0,
            idle_polls: 0,
        }
    }

    /// Run until the client leaves, sends QUIT, or a stream or tuner fails
    pub async fn run(mut self) -> Result<SessionSummary, SessionError> {
        let reason = self.run_loop().await;
        let stats = self.decoder.stats();

        match &reason {
            Ok(reason) => info!(
                "Session ended ({}): {} groups, {} resyncs, {} corrupted blocks, {} commands",
                reason,
                stats.groups,
                stats.resyncs,
                stats.corrected + stats.uncorrectable,
                self.commands
            ),
            Err(e) => info!(
                "Session aborted ({}): {} groups, {} resyncs, {} commands",
                e, stats.groups, stats.resyncs, self.commands
            ),
        }

        let reason = reason?;
        // Best effort: the peer may already be gone
        let _ = self.client.shutdown().await;

        Ok(SessionSummary {
            reason,
            decoder: stats,
            commands: self.commands,
            idle_polls: self.idle_polls,
        })
    }

    async fn run_loop(&mut self) -> Result<EndReason, SessionError> {
        loop {
            tokio::select! {
                result = self.device.read(&mut self.device_buf) => {
                    let n = result?;
                    if n == 0 {
                        debug!("Device stream closed");
                        return Ok(EndReason::DeviceClosed);
                    }
                    self.handle_device_data(n).await?;
                }

                result = self.client.read(&mut self.client_buf) => {
                    let n = result?;
                    if n == 0 {
                        debug!("Client closed connection");
                        return Ok(EndReason::ClientClosed);
                    }
                    if let Some(reason) = self.handle_client_data(n).await? {
                        return Ok(reason);
                    }
                }

                _ = tokio::time::sleep(self.config.poll_interval) => {
                    self.idle_polls += 1;
                    trace!("Nothing ready after {:?}", self.config.poll_interval);
                }
            }
        }
    }

    /// Frame device bytes into blocks and forward completed groups
    async fn handle_device_data(&mut self, n: usize) -> Result<(), SessionError> {
        self.blocks.push_bytes(&self.device_buf[..n]);

        while let Some(block) = self.blocks.next_frame() {
            if let Some(group) = self.decoder.consume_block(block) {
                let line = format!("{}\n", group);
                self.client.write_all(line.as_bytes()).await?;
            }
        }
        self.client.flush().await?;
        Ok(())
    }

    /// Frame client bytes into lines and execute each
    async fn handle_client_data(&mut self, n: usize) -> Result<Option<EndReason>, SessionError> {
        self.lines.push_bytes(&self.client_buf[..n]);

        while let Some(line) = self.lines.next_frame() {
            self.commands += 1;
            let outcome = run_control(|| interpret_line(&self.tuner, &line))?;

            match outcome {
                Outcome::Reply(reply) => {
                    self.client.write_all(reply.to_line().as_bytes()).await?;
                    self.client.flush().await?;
                }
                Outcome::Silent => {}
                Outcome::Quit => {
                    debug!("Client requested quit");
                    return Ok(Some(EndReason::Quit));
                }
            }
        }
        Ok(None)
    }
}
