//! Simulated device source
//!
//! Each [`SimulatedSource::open`] call creates an in-memory duplex pipe and
//! spawns a broadcast task that writes the tuned station's groups into it at
//! the RDS group rate. The task ends when the session drops its end.

use std::time::Duration;

use rds_protocol::BLOCK_LEN;
use rds_tuner::{TunerError, TunerSource};
use tokio::io::{AsyncReadExt, AsyncWriteExt, DuplexStream};
use tokio::task::JoinHandle;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, trace};

use crate::encoder::GroupEncoder;
use crate::tuner::VirtualTuner;

/// One group every ~87.6 ms at 1187.5 bit/s
pub const DEFAULT_GROUP_INTERVAL: Duration = Duration::from_micros(87_579);

/// Pipe capacity in groups before the broadcast task waits for the reader
const PIPE_GROUPS: usize = 64;

/// `TunerSource` backed by a shared [`VirtualTuner`]
#[derive(Debug, Clone)]
pub struct SimulatedSource {
    tuner: VirtualTuner,
    group_interval: Duration,
    corrupt_every: Option<u32>,
}

impl SimulatedSource {
    pub fn new(tuner: VirtualTuner) -> Self {
        Self {
            tuner,
            group_interval: DEFAULT_GROUP_INTERVAL,
            corrupt_every: None,
        }
    }

    /// Override the group rate
    pub fn with_group_interval(mut self, group_interval: Duration) -> Self {
        self.group_interval = group_interval;
        self
    }

    /// Flag every `n`th broadcast block as uncorrectable
    pub fn with_corruption(mut self, every: Option<u32>) -> Self {
        self.corrupt_every = every;
        self
    }

    pub fn tuner(&self) -> &VirtualTuner {
        &self.tuner
    }

    /// Start a broadcast task, returning the session end of its pipe
    fn spawn_broadcast(&self) -> (DuplexStream, JoinHandle<()>) {
        let (device_end, session_end) = tokio::io::duplex(PIPE_GROUPS * 4 * BLOCK_LEN);
        let task = tokio::spawn(run_broadcast(
            device_end,
            self.tuner.clone(),
            self.group_interval,
            self.corrupt_every,
        ));
        (session_end, task)
    }
}

impl TunerSource for SimulatedSource {
    type Stream = DuplexStream;
    type Tuner = VirtualTuner;

    fn describe(&self) -> String {
        format!("simulated tuner with {} stations", self.tuner.stations().len())
    }

    fn open(&self) -> Result<(DuplexStream, VirtualTuner), TunerError> {
        let (session_end, _broadcast) = self.spawn_broadcast();
        Ok((session_end, self.tuner.clone()))
    }
}

/// Broadcast the tuned station's groups until the session end closes
async fn run_broadcast(
    device_end: DuplexStream,
    tuner: VirtualTuner,
    group_interval: Duration,
    corrupt_every: Option<u32>,
) {
    let (mut reader, mut writer) = tokio::io::split(device_end);
    let mut ticker = interval(group_interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
    let mut encoder: Option<GroupEncoder> = None;
    let mut probe = [0u8; 1];

    debug!("Simulated broadcast started");

    loop {
        tokio::select! {
            // The session never writes; a completed read means it hung up
            _ = reader.read(&mut probe) => break,

            _ = ticker.tick() => {
                let Some(station) = tuner.current_station() else {
                    encoder = None;
                    continue;
                };

                if encoder.as_ref().map(GroupEncoder::pi) != Some(station.pi) {
                    encoder = Some(GroupEncoder::new(&station).with_corruption(corrupt_every));
                }
                let Some(bytes) = encoder.as_mut().map(GroupEncoder::next_bytes) else {
                    continue;
                };
                trace!("Broadcast {} bytes for {}", bytes.len(), station.ps);
                if writer.write_all(&bytes).await.is_err() {
                    break;
                }
            }
        }
    }

    debug!("Simulated broadcast stopped");
}
