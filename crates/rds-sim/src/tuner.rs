//! Virtual tuner simulation
//!
//! All clones of a [`VirtualTuner`] share one state, the way concurrent
//! sessions share one physical device: the most recent write wins.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use rds_protocol::{Direction, Frequency};
use rds_tuner::{TunerControl, TunerError};
use serde::{Deserialize, Serialize};
use tracing::debug;

/// A simulated broadcast station
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VirtualStation {
    /// Carrier frequency
    pub frequency: Frequency,
    /// Programme identification code
    pub pi: u16,
    /// Programme service name (padded/truncated to 8 characters on air)
    pub ps: String,
    /// Programme type code (0-31)
    #[serde(default)]
    pub pty: u8,
    /// Reported signal strength when tuned
    #[serde(default = "default_signal")]
    pub signal: i32,
}

fn default_signal() -> i32 {
    0xC000
}

/// Configuration for creating a virtual tuner
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VirtualTunerConfig {
    /// Identifier reported by the ID command
    pub name: String,
    /// Frequency tuned at startup
    pub initial_frequency: Frequency,
    /// Stations on the simulated band
    pub stations: Vec<VirtualStation>,
}

impl Default for VirtualTunerConfig {
    fn default() -> Self {
        let station = |khz, pi, ps: &str, pty, signal| VirtualStation {
            frequency: Frequency::new(khz).unwrap_or(Frequency::MIN),
            pi,
            ps: ps.to_string(),
            pty,
            signal,
        };
        Self {
            name: "Virtual FM Tuner".to_string(),
            initial_frequency: Frequency::MIN,
            stations: vec![
                station(89_100, 0xF211, "FRANCE I", 5, 0xB000),
                station(93_500, 0xF202, "INTER", 1, 0xD000),
                station(97_400, 0xF205, "FIP", 15, 0x9000),
                station(105_100, 0xF204, "MOUV", 10, 0xE000),
            ],
        }
    }
}

#[derive(Debug)]
struct TunerState {
    name: String,
    units: u32,
    stations: Vec<VirtualStation>,
    failure: Option<String>,
}

impl TunerState {
    fn khz(&self) -> u32 {
        Frequency::khz_from_device_units(self.units)
    }

    fn check(&self) -> Result<(), TunerError> {
        match &self.failure {
            Some(reason) => Err(TunerError::Unavailable(reason.clone())),
            None => Ok(()),
        }
    }
}

/// A simulated tuner; clones share state
#[derive(Debug, Clone)]
pub struct VirtualTuner {
    state: Arc<Mutex<TunerState>>,
}

impl Default for VirtualTuner {
    fn default() -> Self {
        Self::from_config(VirtualTunerConfig::default())
    }
}

impl VirtualTuner {
    /// Create a virtual tuner from configuration
    pub fn from_config(config: VirtualTunerConfig) -> Self {
        let mut stations = config.stations;
        stations.sort_by_key(|s| s.frequency);
        stations.dedup_by_key(|s| s.frequency);

        Self {
            state: Arc::new(Mutex::new(TunerState {
                name: config.name,
                units: config.initial_frequency.to_device_units(),
                stations,
                failure: None,
            })),
        }
    }

    fn state(&self) -> MutexGuard<'_, TunerState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Current frequency in kHz
    pub fn frequency_khz(&self) -> u32 {
        self.state().khz()
    }

    /// The station at the tuned frequency, if any
    pub fn current_station(&self) -> Option<VirtualStation> {
        let state = self.state();
        let khz = state.khz();
        state
            .stations
            .iter()
            .find(|s| s.frequency.khz() == khz)
            .cloned()
    }

    pub fn stations(&self) -> Vec<VirtualStation> {
        self.state().stations.clone()
    }

    /// Make every subsequent control call fail (`None` restores the tuner)
    pub fn set_failure(&self, reason: Option<&str>) {
        self.state().failure = reason.map(str::to_string);
    }
}

impl TunerControl for VirtualTuner {
    fn frequency(&self) -> Result<u32, TunerError> {
        let state = self.state();
        state.check()?;
        Ok(state.units)
    }

    fn set_frequency(&self, units: u32) -> Result<(), TunerError> {
        let mut state = self.state();
        state.check()?;
        debug!("Virtual tuner set to {} units", units);
        state.units = units;
        Ok(())
    }

    fn seek(&self, direction: Direction) -> Result<(), TunerError> {
        let mut state = self.state();
        state.check()?;

        let khz = state.khz();
        let found = match direction {
            Direction::Up => state
                .stations
                .iter()
                .find(|s| s.frequency.khz() > khz)
                .or_else(|| state.stations.first()),
            Direction::Down => state
                .stations
                .iter()
                .rev()
                .find(|s| s.frequency.khz() < khz)
                .or_else(|| state.stations.last()),
        }
        .map(|s| s.frequency);

        match found {
            Some(freq) => {
                debug!("Virtual seek {} found {}", direction.name(), freq);
                state.units = freq.to_device_units();
            }
            None => debug!("Virtual seek {} found nothing", direction.name()),
        }
        Ok(())
    }

    fn signal(&self) -> Result<i32, TunerError> {
        let state = self.state();
        state.check()?;
        let khz = state.khz();
        Ok(state
            .stations
            .iter()
            .find(|s| s.frequency.khz() == khz)
            .map_or(0, |s| s.signal))
    }

    fn capability_name(&self) -> Result<String, TunerError> {
        let state = self.state();
        state.check()?;
        Ok(state.name.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn freq(khz: u32) -> Frequency {
        Frequency::new(khz).unwrap()
    }

    #[test]
    fn test_create_virtual_tuner() {
        let tuner = VirtualTuner::default();
        assert_eq!(tuner.frequency_khz(), 87_500);
        assert_eq!(tuner.frequency().unwrap(), 87_500 * 16);
        assert_eq!(tuner.capability_name().unwrap(), "Virtual FM Tuner");
        assert!(tuner.current_station().is_none());
        assert_eq!(tuner.signal().unwrap(), 0);
    }

    #[test]
    fn test_seek_up_and_wrap() {
        let tuner = VirtualTuner::default();
        tuner.seek(Direction::Up).unwrap();
        assert_eq!(tuner.frequency_khz(), 89_100);
        assert_eq!(tuner.signal().unwrap(), 0xB000);

        tuner.set_frequency(freq(106_000).to_device_units()).unwrap();
        tuner.seek(Direction::Up).unwrap();
        assert_eq!(tuner.frequency_khz(), 89_100);
    }

    #[test]
    fn test_seek_down_and_wrap() {
        let tuner = VirtualTuner::default();
        tuner.set_frequency(freq(97_400).to_device_units()).unwrap();
        tuner.seek(Direction::Down).unwrap();
        assert_eq!(tuner.frequency_khz(), 93_500);

        tuner.set_frequency(freq(88_000).to_device_units()).unwrap();
        tuner.seek(Direction::Down).unwrap();
        assert_eq!(tuner.frequency_khz(), 105_100);
    }

    #[test]
    fn test_seek_on_empty_band_keeps_frequency() {
        let tuner = VirtualTuner::from_config(VirtualTunerConfig {
            stations: Vec::new(),
            ..Default::default()
        });
        tuner.seek(Direction::Up).unwrap();
        assert_eq!(tuner.frequency_khz(), 87_500);
    }

    #[test]
    fn test_clones_share_state() {
        let a = VirtualTuner::default();
        let b = a.clone();
        a.set_frequency(freq(93_500).to_device_units()).unwrap();
        b.set_frequency(freq(97_400).to_device_units()).unwrap();
        assert_eq!(a.frequency_khz(), 97_400);
        assert_eq!(a.current_station().unwrap().ps, "FIP");
    }

    #[test]
    fn test_failure_injection() {
        let tuner = VirtualTuner::default();
        tuner.set_failure(Some("unplugged"));
        assert!(matches!(
            tuner.frequency(),
            Err(TunerError::Unavailable(reason)) if reason == "unplugged"
        ));
        assert!(tuner.seek(Direction::Up).is_err());

        tuner.set_failure(None);
        assert!(tuner.frequency().is_ok());
    }

    #[test]
    fn test_config_from_json() {
        let config: VirtualTunerConfig = serde_json::from_str(
            r#"{
                "name": "Bench",
                "initial_frequency": 100000,
                "stations": [{ "frequency": 100000, "pi": 4660, "ps": "TEST" }]
            }"#,
        )
        .unwrap();
        let tuner = VirtualTuner::from_config(config);
        let station = tuner.current_station().unwrap();
        assert_eq!(station.pi, 0x1234);
        assert_eq!(station.signal, 0xC000);
        assert_eq!(tuner.signal().unwrap(), 0xC000);
    }
}
