//! Server settings

use std::net::{Ipv4Addr, SocketAddr};
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::Context;
use rds_session::{ServerConfig, SessionConfig, DEFAULT_PORT};
use rds_sim::VirtualTunerConfig;
use serde::{Deserialize, Serialize};

/// Simulated hardware settings, used with `--simulate`
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SimulationSettings {
    /// Time between broadcast groups in milliseconds
    #[serde(default = "default_group_interval_ms")]
    pub group_interval_ms: u64,
    /// Flag every nth broadcast block as uncorrectable
    #[serde(default)]
    pub corrupt_every: Option<u32>,
    /// Virtual tuner and its stations
    #[serde(default)]
    pub tuner: VirtualTunerConfig,
}

fn default_group_interval_ms() -> u64 {
    88
}

impl Default for SimulationSettings {
    fn default() -> Self {
        Self {
            group_interval_ms: default_group_interval_ms(),
            corrupt_every: None,
            tuner: VirtualTunerConfig::default(),
        }
    }
}

/// Server settings, loaded from a JSON file with every field optional
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ServerSettings {
    /// Address to accept clients on
    #[serde(default = "default_listen_addr")]
    pub listen_addr: SocketAddr,
    /// Radio device node
    #[serde(default = "default_device")]
    pub device: PathBuf,
    /// Upper bound on one session wait, in milliseconds
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
    /// Serve the simulated tuner instead of hardware
    #[serde(default)]
    pub simulate: bool,
    #[serde(default)]
    pub simulation: SimulationSettings,
}

fn default_listen_addr() -> SocketAddr {
    SocketAddr::from((Ipv4Addr::UNSPECIFIED, DEFAULT_PORT))
}

fn default_device() -> PathBuf {
    PathBuf::from("/dev/radio0")
}

fn default_poll_interval_ms() -> u64 {
    1000
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            listen_addr: default_listen_addr(),
            device: default_device(),
            poll_interval_ms: default_poll_interval_ms(),
            simulate: false,
            simulation: SimulationSettings::default(),
        }
    }
}

impl ServerSettings {
    /// Load settings from a JSON file
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read settings from {}", path.display()))?;
        Self::from_json(&text)
            .with_context(|| format!("Failed to parse settings in {}", path.display()))
    }

    pub fn from_json(text: &str) -> anyhow::Result<Self> {
        Ok(serde_json::from_str(text)?)
    }

    pub fn to_json(&self) -> anyhow::Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Listener and session configuration
    pub fn server_config(&self) -> ServerConfig {
        ServerConfig {
            listen_addr: self.listen_addr,
            session: SessionConfig {
                // A zero interval would spin
                poll_interval: Duration::from_millis(self.poll_interval_ms.max(1)),
            },
        }
    }

    pub fn group_interval(&self) -> Duration {
        Duration::from_millis(self.simulation.group_interval_ms.max(1))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_file_uses_defaults() {
        let settings = ServerSettings::from_json("{}").unwrap();
        assert_eq!(settings, ServerSettings::default());
        assert_eq!(settings.listen_addr.port(), 8750);
        assert_eq!(settings.device, PathBuf::from("/dev/radio0"));
        assert_eq!(
            settings.server_config().session.poll_interval,
            Duration::from_secs(1)
        );
    }

    #[test]
    fn test_partial_file() {
        let settings = ServerSettings::from_json(
            r#"{
                "listen_addr": "127.0.0.1:9000",
                "simulate": true,
                "simulation": {
                    "corrupt_every": 7,
                    "tuner": {
                        "name": "Bench",
                        "initial_frequency": 89100,
                        "stations": [{ "frequency": 89100, "pi": 4660, "ps": "TEST" }]
                    }
                }
            }"#,
        )
        .unwrap();

        assert_eq!(settings.listen_addr, "127.0.0.1:9000".parse().unwrap());
        assert!(settings.simulate);
        assert_eq!(settings.simulation.group_interval_ms, 88);
        assert_eq!(settings.simulation.corrupt_every, Some(7));
        assert_eq!(settings.simulation.tuner.name, "Bench");
        assert_eq!(settings.simulation.tuner.stations[0].pi, 0x1234);
    }

    #[test]
    fn test_rejects_off_grid_station() {
        let result = ServerSettings::from_json(
            r#"{ "simulation": { "tuner": {
                "name": "x", "initial_frequency": 87550, "stations": []
            } } }"#,
        );
        assert!(result.is_err());
    }

    #[test]
    fn test_json_round_trip() {
        let settings = ServerSettings {
            poll_interval_ms: 250,
            ..Default::default()
        };
        let text = settings.to_json().unwrap();
        assert_eq!(ServerSettings::from_json(&text).unwrap(), settings);
    }

    #[test]
    fn test_zero_poll_interval_is_clamped() {
        let settings = ServerSettings {
            poll_interval_ms: 0,
            ..Default::default()
        };
        assert_eq!(
            settings.server_config().session.poll_interval,
            Duration::from_millis(1)
        );
    }

    #[test]
    fn test_missing_file() {
        let err = ServerSettings::load(Path::new("/nonexistent/rds.json")).unwrap_err();
        assert!(err.to_string().contains("/nonexistent/rds.json"));
    }
}
