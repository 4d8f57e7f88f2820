//! Command execution against a tuner
//!
//! Turns one client line into tuner calls and at most one reply. Parse
//! failures that owe the client an answer become replies; tuner failures are
//! returned to the caller, which ends the session.

use rds_protocol::{step_wrapping, Command, Frequency, Reply, FREQUENCY_SCALE};
use rds_tuner::{TunerControl, TunerError};
use tokio::runtime::{Handle, RuntimeFlavor};
use tracing::debug;

/// What the session should do after a command line
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    /// Send this reply and continue
    Reply(Reply),
    /// Nothing to send
    Silent,
    /// Close the session without a reply
    Quit,
}

/// Parse and execute one client line
pub fn interpret_line<T>(tuner: &T, line: &str) -> Result<Outcome, TunerError>
where
    T: TunerControl + ?Sized,
{
    match Command::parse(line) {
        Ok(command) => {
            debug!("Command {} / {}", command.verb(), line.trim());
            execute(tuner, command)
        }
        Err(e) => {
            debug!("Rejected command line {:?}: {}", line.trim(), e);
            Ok(e.reply().map_or(Outcome::Silent, Outcome::Reply))
        }
    }
}

/// Execute a parsed command
pub fn execute<T>(tuner: &T, command: Command) -> Result<Outcome, TunerError>
where
    T: TunerControl + ?Sized,
{
    let reply = match command {
        Command::Quit => return Ok(Outcome::Quit),
        Command::SetFrequency(freq) => {
            tuner.set_frequency(freq.to_device_units())?;
            read_frequency(tuner)?
        }
        Command::GetFrequency => read_frequency(tuner)?,
        Command::GetSignal => Reply::Signal(tuner.signal()?),
        Command::Seek(direction) => {
            tuner.seek(direction)?;
            read_frequency(tuner)?
        }
        Command::Step(direction) => {
            let current = Frequency::khz_from_device_units(tuner.frequency()?);
            let next = step_wrapping(current, direction);
            tuner.set_frequency(next * FREQUENCY_SCALE)?;
            read_frequency(tuner)?
        }
        Command::Id => Reply::Id(tuner.capability_name()?),
    };

    Ok(Outcome::Reply(reply))
}

fn read_frequency<T>(tuner: &T) -> Result<Reply, TunerError>
where
    T: TunerControl + ?Sized,
{
    let units = tuner.frequency()?;
    Ok(Reply::Frequency(Frequency::khz_from_device_units(units)))
}

/// Run a blocking tuner call without starving other sessions
///
/// On a multi-threaded runtime the worker hands its other tasks off first;
/// elsewhere the call simply runs inline.
pub fn run_control<R>(f: impl FnOnce() -> R) -> R {
    match Handle::try_current().map(|handle| handle.runtime_flavor()) {
        Ok(RuntimeFlavor::MultiThread) => tokio::task::block_in_place(f),
        _ => f(),
    }
}
