//! Recorder configuration.
//!
//! Loaded from a TOML file, then patched from the environment:
//!
//! - `FLIGHTREC_OUTPUT_DIR` replaces `output_dir`
//! - `FLIGHTREC_ALWAYS` appends whitespace-separated channel names that are
//!   not configured yet, with the default retention
//! - every `FLIGHTREC_CHANNELS_*` variable (in key order) does the same, so
//!   separate launch scripts can each contribute a channel group
//!
//! ```toml
//! output_dir = "/var/lib/flightrec"
//! default_retention_secs = 30
//!
//! [[channels]]
//! name = "/odom"
//! retention_secs = 300
//!
//! [[channels]]
//! name = "/imu"
//! ```

use std::collections::{BTreeMap, HashSet};
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::retention::RetentionWindow;

pub const ENV_OUTPUT_DIR: &str = "FLIGHTREC_OUTPUT_DIR";
pub const ENV_ALWAYS: &str = "FLIGHTREC_ALWAYS";
pub const ENV_CHANNELS_PREFIX: &str = "FLIGHTREC_CHANNELS_";

const DEFAULT_RETENTION_SECS: f64 = 30.0;
const DEFAULT_CONTROL_ADDR: &str = "127.0.0.1:7447";

/// One `[[channels]]` entry as written in the config file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChannelSpec {
    pub name: String,
    /// Seconds to retain; unset or `0` means the default.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub retention_secs: Option<f64>,
}

impl ChannelSpec {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            retention_secs: None,
        }
    }

    pub fn with_retention(name: impl Into<String>, secs: f64) -> Self {
        Self {
            name: name.into(),
            retention_secs: Some(secs),
        }
    }
}

/// Backoff knobs for the subscription retry loop.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SubscriptionConfig {
    pub initial_ms: u64,
    pub max_ms: u64,
    pub multiplier: f64,
}

impl Default for SubscriptionConfig {
    fn default() -> Self {
        Self {
            initial_ms: 100,
            max_ms: 5_000,
            multiplier: 2.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecorderConfig {
    /// Directory export logs are written to. Falls back to `$HOME/flightrec`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output_dir: Option<PathBuf>,

    #[serde(default = "default_retention_secs")]
    pub default_retention_secs: f64,

    #[serde(default = "default_control_addr")]
    pub control_addr: String,

    #[serde(default)]
    pub subscription: SubscriptionConfig,

    #[serde(default)]
    pub channels: Vec<ChannelSpec>,
}

fn default_retention_secs() -> f64 {
    DEFAULT_RETENTION_SECS
}

fn default_control_addr() -> String {
    DEFAULT_CONTROL_ADDR.to_string()
}

impl Default for RecorderConfig {
    fn default() -> Self {
        Self {
            output_dir: None,
            default_retention_secs: DEFAULT_RETENTION_SECS,
            control_addr: default_control_addr(),
            subscription: SubscriptionConfig::default(),
            channels: Vec::new(),
        }
    }
}

/// A channel with its retention resolved against the default.
#[derive(Debug, Clone, PartialEq)]
pub struct ChannelConfig {
    pub name: String,
    pub retention: RetentionWindow,
}

impl RecorderConfig {
    /// Read, parse and env-patch a config file. Does not validate.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let mut config = Self::from_toml_str(&text)?;
        config.apply_env();
        Ok(config)
    }

    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(text)?)
    }

    pub fn apply_env(&mut self) {
        self.apply_env_from(std::env::vars());
    }

    /// Apply env overrides from `vars` instead of the process environment.
    pub fn apply_env_from<I, K, V>(&mut self, vars: I)
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        let vars: BTreeMap<String, String> = vars
            .into_iter()
            .map(|(k, v)| (k.into(), v.into()))
            .collect();

        if let Some(dir) = vars.get(ENV_OUTPUT_DIR).filter(|d| !d.trim().is_empty()) {
            self.output_dir = Some(PathBuf::from(dir));
        }
        if let Some(always) = vars.get(ENV_ALWAYS) {
            self.append_channels(always);
        }
        for (_, group) in vars.iter().filter(|(k, _)| k.starts_with(ENV_CHANNELS_PREFIX)) {
            self.append_channels(group);
        }
    }

    fn append_channels(&mut self, names: &str) {
        for name in names.split_whitespace() {
            if !self.channels.iter().any(|c| c.name == name) {
                self.channels.push(ChannelSpec::new(name));
            }
        }
    }

    /// Check the channel list and retention values.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.default_retention_secs <= 0.0
            || Duration::try_from_secs_f64(self.default_retention_secs).is_err()
        {
            return Err(ConfigError::InvalidDefaultRetention(
                self.default_retention_secs,
            ));
        }

        let mut seen = HashSet::new();
        for (index, channel) in self.channels.iter().enumerate() {
            if channel.name.trim().is_empty() {
                return Err(ConfigError::EmptyChannelName { index });
            }
            if !seen.insert(channel.name.as_str()) {
                return Err(ConfigError::DuplicateChannel(channel.name.clone()));
            }
            if let Some(secs) = channel.retention_secs {
                if secs != 0.0 && Duration::try_from_secs_f64(secs).is_err() {
                    return Err(ConfigError::InvalidRetention {
                        channel: channel.name.clone(),
                        value: secs,
                    });
                }
            }
        }

        self.control_socket_addr()?;
        Ok(())
    }

    /// Falls back to 30 s when `default_retention_secs` does not validate.
    pub fn default_retention(&self) -> RetentionWindow {
        let window = Duration::try_from_secs_f64(self.default_retention_secs)
            .ok()
            .filter(|d| !d.is_zero())
            .unwrap_or(Duration::from_secs_f64(DEFAULT_RETENTION_SECS));
        RetentionWindow::new(window)
    }

    /// Channels in configuration order with retention resolved.
    pub fn resolved_channels(&self) -> Vec<ChannelConfig> {
        let default = self.default_retention();
        self.channels
            .iter()
            .map(|c| ChannelConfig {
                name: c.name.clone(),
                retention: RetentionWindow::resolve(c.retention_secs, default),
            })
            .collect()
    }

    /// Configured output directory, or `$HOME/flightrec`.
    pub fn resolved_output_dir(&self) -> PathBuf {
        match &self.output_dir {
            Some(dir) => dir.clone(),
            None => {
                let home = std::env::var("HOME").unwrap_or_else(|_| ".".to_string());
                PathBuf::from(home).join("flightrec")
            }
        }
    }

    /// Create the output directory if needed and check it accepts new files.
    pub fn ensure_output_dir(&self) -> Result<PathBuf, ConfigError> {
        let dir = self.resolved_output_dir();
        let unwritable = |source| ConfigError::OutputDirUnwritable {
            path: dir.clone(),
            source,
        };
        std::fs::create_dir_all(&dir).map_err(unwritable)?;
        tempfile::NamedTempFile::new_in(&dir).map_err(unwritable)?;
        Ok(dir)
    }

    pub fn control_socket_addr(&self) -> Result<SocketAddr, ConfigError> {
        self.control_addr
            .parse()
            .map_err(|e: std::net::AddrParseError| ConfigError::InvalidControlAddr {
                addr: self.control_addr.clone(),
                reason: e.to_string(),
            })
    }

    pub fn backoff(&self) -> crate::subscription::Backoff {
        crate::subscription::Backoff::new(
            Duration::from_millis(self.subscription.initial_ms),
            Duration::from_millis(self.subscription.max_ms),
            self.subscription.multiplier,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"
        output_dir = "/data/rec"
        default_retention_secs = 20

        [[channels]]
        name = "/odom"
        retention_secs = 300

        [[channels]]
        name = "/imu"

        [[channels]]
        name = "/sonar"
        retention_secs = 0
    "#;

    #[test]
    fn parses_sample_and_resolves_retention() {
        let config = RecorderConfig::from_toml_str(SAMPLE).unwrap();
        config.validate().unwrap();
        assert_eq!(config.output_dir, Some(PathBuf::from("/data/rec")));
        assert_eq!(config.control_addr, DEFAULT_CONTROL_ADDR);

        let channels = config.resolved_channels();
        let names: Vec<_> = channels.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, vec!["/odom", "/imu", "/sonar"]);
        assert_eq!(channels[0].retention.as_duration(), Duration::from_secs(300));
        assert_eq!(channels[1].retention.as_duration(), Duration::from_secs(20));
        assert_eq!(channels[2].retention.as_duration(), Duration::from_secs(20));
    }

    #[test]
    fn empty_file_uses_defaults() {
        let config = RecorderConfig::from_toml_str("").unwrap();
        assert_eq!(config, RecorderConfig::default());
        config.validate().unwrap();
    }

    #[test]
    fn env_overrides_dir_and_appends_unique_channels() {
        let mut config = RecorderConfig::from_toml_str(SAMPLE).unwrap();
        config.apply_env_from([
            (ENV_OUTPUT_DIR, "/mnt/bags"),
            (ENV_ALWAYS, "/imu /cam/left  /cam/right"),
            ("UNRELATED", "/not/a/channel"),
        ]);

        assert_eq!(config.output_dir, Some(PathBuf::from("/mnt/bags")));
        let names: Vec<_> = config.channels.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, vec!["/odom", "/imu", "/sonar", "/cam/left", "/cam/right"]);
        assert_eq!(config.channels[3].retention_secs, None);
    }

    #[test]
    fn prefixed_env_groups_append_channels_in_key_order() {
        let mut config = RecorderConfig::default();
        config.apply_env_from([
            ("FLIGHTREC_CHANNELS_SONAR", "/sonar/raw"),
            (ENV_ALWAYS, "/odom"),
            ("FLIGHTREC_CHANNELS_CAMERAS", "/cam/left /odom /cam/right"),
            ("FLIGHTREC_CHANNEL", "/typo/ignored"),
        ]);

        let names: Vec<_> = config.channels.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(
            names,
            vec!["/odom", "/cam/left", "/cam/right", "/sonar/raw"]
        );
        config.validate().unwrap();
    }

    #[test]
    fn rejects_duplicate_channels() {
        let mut config = RecorderConfig::default();
        config.channels = vec![ChannelSpec::new("/a"), ChannelSpec::new("/a")];
        assert!(matches!(
            config.validate(),
            Err(ConfigError::DuplicateChannel(name)) if name == "/a"
        ));
    }

    #[test]
    fn rejects_bad_retention_values() {
        let mut config = RecorderConfig::default();
        config.channels = vec![ChannelSpec::with_retention("/a", -3.0)];
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidRetention { .. })
        ));

        config.channels = vec![ChannelSpec::with_retention("/a", f64::NAN)];
        assert!(config.validate().is_err());

        config.channels = vec![ChannelSpec::with_retention("/a", 1e20)];
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidRetention { value, .. }) if value == 1e20
        ));

        config.channels = vec![ChannelSpec::new("  ")];
        assert!(matches!(
            config.validate(),
            Err(ConfigError::EmptyChannelName { index: 0 })
        ));

        for bad in [0.0, -1.0, f64::NAN, 1e20] {
            let config = RecorderConfig {
                default_retention_secs: bad,
                ..RecorderConfig::default()
            };
            assert!(matches!(
                config.validate(),
                Err(ConfigError::InvalidDefaultRetention(_))
            ));
            assert_eq!(
                config.default_retention().as_duration(),
                Duration::from_secs(30)
            );
        }
    }

    #[test]
    fn rejects_malformed_toml_and_control_addr() {
        assert!(matches!(
            RecorderConfig::from_toml_str("channels = 3"),
            Err(ConfigError::Parse(_))
        ));

        let config = RecorderConfig {
            control_addr: "not an addr".to_string(),
            ..RecorderConfig::default()
        };
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidControlAddr { .. })
        ));
    }

    #[test]
    fn ensure_output_dir_creates_missing_directory() {
        let root = tempfile::tempdir().unwrap();
        let config = RecorderConfig {
            output_dir: Some(root.path().join("a").join("b")),
            ..RecorderConfig::default()
        };
        let dir = config.ensure_output_dir().unwrap();
        assert!(dir.is_dir());
        assert_eq!(std::fs::read_dir(&dir).unwrap().count(), 0);
    }

    #[test]
    fn load_reports_missing_file() {
        let err = RecorderConfig::load(Path::new("/definitely/not/here.toml")).unwrap_err();
        assert!(matches!(err, ConfigError::Read { .. }));
    }
}
