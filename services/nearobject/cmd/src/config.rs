//! Configuration handling for the nearobject service.
//!
//! Settings come from the `nearobject` section of a YAML file, then from
//! `NEAROBJECT_*` environment variables, then from the command line.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{info, warn};
use uwb_fira::{Channel, DeviceRole};

/// Service configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServiceConfig {
    /// Default log level
    pub log_level: String,
    /// Device discovery
    pub discovery: DiscoveryConfig,
    /// Profile store location; the temp dir default when unset
    pub profile_path: Option<PathBuf>,
    /// Demo ranging sessions
    pub ranging: RangingConfig,
}

/// Device discovery settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DiscoveryConfig {
    /// Simulated devices to attach
    pub simulators: u32,
    /// Time between probes
    pub poll_interval: Duration,
    /// Directory scanned for host device nodes, if any
    pub device_directory: Option<PathBuf>,
    /// Name prefix of host device nodes
    pub device_prefix: String,
    /// Initialize devices as they arrive
    pub auto_initialize: bool,
}

/// Demo ranging session settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RangingConfig {
    /// UWB channel number
    pub channel: u8,
    /// Role of the local device
    pub initiator: bool,
    /// Time between ranging rounds
    pub interval: Duration,
    /// How long to range before shutting down; zero waits for Ctrl-C
    pub duration: Duration,
}

impl Default for DiscoveryConfig {
    fn default() -> Self {
        Self {
            simulators: 1,
            poll_interval: Duration::from_secs(2),
            device_directory: None,
            device_prefix: "uwb".to_string(),
            auto_initialize: true,
        }
    }
}

impl Default for RangingConfig {
    fn default() -> Self {
        Self {
            channel: 9,
            initiator: true,
            interval: Duration::from_millis(200),
            duration: Duration::from_secs(5),
        }
    }
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            discovery: DiscoveryConfig::default(),
            profile_path: None,
            ranging: RangingConfig::default(),
        }
    }
}

impl RangingConfig {
    /// Configured channel as a FiRa channel
    pub fn channel(&self) -> Result<Channel> {
        Channel::try_from(self.channel)
            .map_err(|value| anyhow::anyhow!("unsupported UWB channel {}", value))
    }

    /// Configured role as a FiRa device role
    pub fn device_role(&self) -> DeviceRole {
        if self.initiator {
            DeviceRole::Initiator
        } else {
            DeviceRole::Responder
        }
    }
}

/// Root of the YAML file
#[derive(Debug, Default, Deserialize)]
struct RootConfig {
    nearobject: Option<FileConfig>,
}

/// The `nearobject` section. Durations are humantime strings such as `500ms`.
#[derive(Debug, Default, Deserialize)]
struct FileConfig {
    log_level: Option<String>,
    profile_path: Option<PathBuf>,
    discovery: Option<FileDiscoveryConfig>,
    ranging: Option<FileRangingConfig>,
}

#[derive(Debug, Default, Deserialize)]
struct FileDiscoveryConfig {
    simulators: Option<u32>,
    poll_interval: Option<String>,
    device_directory: Option<PathBuf>,
    device_prefix: Option<String>,
    auto_initialize: Option<bool>,
}

#[derive(Debug, Default, Deserialize)]
struct FileRangingConfig {
    channel: Option<u8>,
    initiator: Option<bool>,
    interval: Option<String>,
    duration: Option<String>,
}

fn parse_duration(key: &str, value: &str) -> Result<Duration> {
    humantime::parse_duration(value).with_context(|| format!("invalid duration for {}: {}", key, value))
}

impl ServiceConfig {
    /// Load from `config_path` and the environment.
    ///
    /// A missing or unparsable file leaves the defaults in place.
    pub fn load_from_file<P: AsRef<Path>>(config_path: P) -> Result<Self> {
        let path = config_path.as_ref();
        let mut config = Self::default();

        match std::fs::read_to_string(path) {
            Ok(content) => match serde_yaml::from_str::<RootConfig>(&content) {
                Ok(root) => {
                    if let Some(section) = root.nearobject {
                        config.apply_file_config(section)?;
                    }
                    info!("Loaded configuration from {}", path.display());
                }
                Err(e) => warn!(
                    "Failed to parse config file {}, using defaults: {}",
                    path.display(),
                    e
                ),
            },
            Err(_) => warn!("Config file {} not found, using defaults", path.display()),
        }

        config.apply_environment_overrides(|key| std::env::var(key).ok())?;
        Ok(config)
    }

    fn apply_file_config(&mut self, file: FileConfig) -> Result<()> {
        if let Some(log_level) = file.log_level {
            self.log_level = log_level;
        }
        if file.profile_path.is_some() {
            self.profile_path = file.profile_path;
        }

        if let Some(discovery) = file.discovery {
            if let Some(simulators) = discovery.simulators {
                self.discovery.simulators = simulators;
            }
            if let Some(interval) = discovery.poll_interval {
                self.discovery.poll_interval = parse_duration("discovery.poll_interval", &interval)?;
            }
            if discovery.device_directory.is_some() {
                self.discovery.device_directory = discovery.device_directory;
            }
            if let Some(prefix) = discovery.device_prefix {
                self.discovery.device_prefix = prefix;
            }
            if let Some(auto_initialize) = discovery.auto_initialize {
                self.discovery.auto_initialize = auto_initialize;
            }
        }

        if let Some(ranging) = file.ranging {
            if let Some(channel) = ranging.channel {
                self.ranging.channel = channel;
            }
            if let Some(initiator) = ranging.initiator {
                self.ranging.initiator = initiator;
            }
            if let Some(interval) = ranging.interval {
                self.ranging.interval = parse_duration("ranging.interval", &interval)?;
            }
            if let Some(duration) = ranging.duration {
                self.ranging.duration = parse_duration("ranging.duration", &duration)?;
            }
        }
        Ok(())
    }

    /// Apply `NEAROBJECT_*` overrides, reading variables through `lookup`
    fn apply_environment_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) -> Result<()> {
        if let Some(level) = lookup("NEAROBJECT_LOG_LEVEL") {
            self.log_level = level;
            info!("Log level overridden by environment: {}", self.log_level);
        }

        if let Some(simulators) = lookup("NEAROBJECT_SIMULATORS") {
            match simulators.parse::<u32>() {
                Ok(count) => {
                    self.discovery.simulators = count;
                    info!("Simulator count overridden by environment: {}", count);
                }
                Err(_) => warn!("Ignoring invalid NEAROBJECT_SIMULATORS: {}", simulators),
            }
        }

        if let Some(interval) = lookup("NEAROBJECT_POLL_INTERVAL") {
            self.discovery.poll_interval = parse_duration("NEAROBJECT_POLL_INTERVAL", &interval)?;
            info!("Poll interval overridden by environment: {}", interval);
        }

        if let Some(directory) = lookup("NEAROBJECT_DEVICE_DIR") {
            self.discovery.device_directory = Some(PathBuf::from(directory));
        }

        if let Some(path) = lookup("NEAROBJECT_PROFILE_PATH") {
            self.profile_path = Some(PathBuf::from(path));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_default_config() {
        let config = ServiceConfig::default();
        assert_eq!(config.log_level, "info");
        assert_eq!(config.discovery.simulators, 1);
        assert_eq!(config.ranging.channel().unwrap(), Channel::C9);
        assert_eq!(config.ranging.device_role(), DeviceRole::Initiator);
    }

    #[test]
    fn test_load_from_file() {
        let yaml_content = r#"
nearobject:
  log_level: debug
  profile_path: /tmp/test.nearobject
  discovery:
    simulators: 3
    poll_interval: 500ms
    device_directory: /dev
  ranging:
    channel: 5
    initiator: false
    duration: 1m
"#;
        let mut temp_file = NamedTempFile::new().unwrap();
        temp_file.write_all(yaml_content.as_bytes()).unwrap();

        let config = ServiceConfig::load_from_file(temp_file.path()).unwrap();
        assert_eq!(config.log_level, "debug");
        assert_eq!(config.profile_path, Some(PathBuf::from("/tmp/test.nearobject")));
        assert_eq!(config.discovery.simulators, 3);
        assert_eq!(config.discovery.poll_interval, Duration::from_millis(500));
        assert_eq!(config.discovery.device_directory, Some(PathBuf::from("/dev")));
        assert_eq!(config.discovery.device_prefix, "uwb");
        assert_eq!(config.ranging.channel().unwrap(), Channel::C5);
        assert_eq!(config.ranging.device_role(), DeviceRole::Responder);
        assert_eq!(config.ranging.duration, Duration::from_secs(60));
    }

    #[test]
    fn test_missing_file_uses_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = ServiceConfig::load_from_file(dir.path().join("absent.yaml")).unwrap();
        assert_eq!(config.discovery, DiscoveryConfig::default());
    }

    #[test]
    fn test_invalid_duration_is_an_error() {
        let mut temp_file = NamedTempFile::new().unwrap();
        temp_file
            .write_all(b"nearobject:\n  ranging:\n    interval: soon\n")
            .unwrap();
        assert!(ServiceConfig::load_from_file(temp_file.path()).is_err());
    }

    #[test]
    fn test_environment_overrides() {
        let env: HashMap<&str, &str> = [
            ("NEAROBJECT_SIMULATORS", "4"),
            ("NEAROBJECT_POLL_INTERVAL", "1s"),
            ("NEAROBJECT_PROFILE_PATH", "/var/lib/profiles.nearobject"),
        ]
        .into_iter()
        .collect();

        let mut config = ServiceConfig::default();
        config
            .apply_environment_overrides(|key| env.get(key).map(|v| v.to_string()))
            .unwrap();
        assert_eq!(config.discovery.simulators, 4);
        assert_eq!(config.discovery.poll_interval, Duration::from_secs(1));
        assert_eq!(
            config.profile_path,
            Some(PathBuf::from("/var/lib/profiles.nearobject"))
        );
    }

    #[test]
    fn test_unsupported_channel() {
        let config = RangingConfig {
            channel: 7,
            ..Default::default()
        };
        assert!(config.channel().is_err());
    }
}
