//! Configuration file handling

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

use super::paths::config_path;
use super::{Error, Result};
use crate::model::Mode;

/// Main configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Device-facing endpoints
    #[serde(default)]
    pub endpoints: Endpoints,

    /// Timeout settings
    #[serde(default)]
    pub timeouts: Timeouts,

    /// Pass/fail thresholds
    #[serde(default)]
    pub thresholds: ScoreThresholds,
}

/// Where terminal sessions connect to
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Endpoints {
    /// Pub/sub broker URL
    #[serde(default = "default_mqtt_url")]
    pub mqtt_url: String,

    /// Socket-stream endpoint URL
    #[serde(default = "default_websocket_url")]
    pub websocket_url: String,

    /// Protocol version announced when a session opens
    #[serde(default = "default_protocol_version")]
    pub protocol_version: String,
}

impl Default for Endpoints {
    fn default() -> Self {
        Self {
            mqtt_url: default_mqtt_url(),
            websocket_url: default_websocket_url(),
            protocol_version: default_protocol_version(),
        }
    }
}

fn default_mqtt_url() -> String {
    "tcp://127.0.0.1:1883".to_string()
}
fn default_websocket_url() -> String {
    "ws://127.0.0.1:8080/terminal".to_string()
}
fn default_protocol_version() -> String {
    "v1".to_string()
}

/// Timeout settings in milliseconds
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Timeouts {
    /// Budget for a single event send to be acknowledged
    #[serde(default = "default_send")]
    pub send_ms: u64,

    /// Fixed collection window for NEGATIVE_MATCH units
    #[serde(default = "default_negative_window")]
    pub negative_window_ms: u64,

    /// Part of a unit's budget kept back from the collection window of
    /// POSITIVE_MATCH and BOUNDARY_CONDITION units
    #[serde(default = "default_delivery_reserve")]
    pub delivery_reserve_ms: u64,

    /// Unit budget when a benchmark file does not give one
    #[serde(default = "default_unit")]
    pub unit_default_ms: u64,
}

impl Default for Timeouts {
    fn default() -> Self {
        Self {
            send_ms: default_send(),
            negative_window_ms: default_negative_window(),
            delivery_reserve_ms: default_delivery_reserve(),
            unit_default_ms: default_unit(),
        }
    }
}

fn default_send() -> u64 {
    3_000
}
fn default_negative_window() -> u64 {
    10_000
}
fn default_delivery_reserve() -> u64 {
    10_000
}
fn default_unit() -> u64 {
    50_000
}

impl Timeouts {
    pub fn send(&self) -> Duration {
        Duration::from_millis(self.send_ms)
    }

    pub fn unit_default(&self) -> Duration {
        Duration::from_millis(self.unit_default_ms)
    }

    pub fn delivery_reserve(&self) -> Duration {
        Duration::from_millis(self.delivery_reserve_ms)
    }

    /// How long a unit waits for actions after its last send
    ///
    /// NEGATIVE_MATCH waits a fixed window; other modes wait the unit budget
    /// minus the delivery reserve (zero if the budget is smaller).
    pub fn collection_window(&self, mode: Mode, unit_timeout: Duration) -> Duration {
        match mode {
            Mode::NegativeMatch => Duration::from_millis(self.negative_window_ms),
            Mode::PositiveMatch | Mode::BoundaryCondition => {
                unit_timeout.saturating_sub(self.delivery_reserve())
            }
        }
    }
}

/// Mode-specific success thresholds
///
/// Decoupled from the fixed score tiers so strictness can be tuned per mode.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoreThresholds {
    /// Used for any mode without its own threshold
    #[serde(default = "default_threshold")]
    pub default: f64,

    /// Per-mode overrides; when the table is absent every mode uses `default`
    #[serde(default)]
    pub modes: Option<ModeThresholds>,
}

impl Default for ScoreThresholds {
    fn default() -> Self {
        Self {
            default: default_threshold(),
            modes: Some(ModeThresholds::default()),
        }
    }
}

fn default_threshold() -> f64 {
    0.8
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModeThresholds {
    #[serde(default = "default_positive")]
    pub positive_match: f64,

    #[serde(default = "default_negative")]
    pub negative_match: f64,

    #[serde(default = "default_boundary")]
    pub boundary_condition: f64,
}

impl Default for ModeThresholds {
    fn default() -> Self {
        Self {
            positive_match: default_positive(),
            negative_match: default_negative(),
            boundary_condition: default_boundary(),
        }
    }
}

fn default_positive() -> f64 {
    0.80
}
fn default_negative() -> f64 {
    0.90
}
fn default_boundary() -> f64 {
    0.75
}

impl ScoreThresholds {
    /// Same threshold for every mode
    pub fn uniform(threshold: f64) -> Self {
        Self {
            default: threshold,
            modes: None,
        }
    }

    pub fn success_threshold(&self, mode: Mode) -> f64 {
        match &self.modes {
            None => self.default,
            Some(m) => match mode {
                Mode::PositiveMatch => m.positive_match,
                Mode::NegativeMatch => m.negative_match,
                Mode::BoundaryCondition => m.boundary_condition,
            },
        }
    }

    pub fn is_successful(&self, score: f64, mode: Mode) -> bool {
        score >= self.success_threshold(mode)
    }

    fn validate(&self) -> Result<()> {
        let mut all = vec![("default", self.default)];
        if let Some(m) = &self.modes {
            all.push(("positive_match", m.positive_match));
            all.push(("negative_match", m.negative_match));
            all.push(("boundary_condition", m.boundary_condition));
        }
        for (name, value) in all {
            if !(0.0..=1.0).contains(&value) {
                return Err(Error::Config(format!(
                    "threshold '{}' is {}, expected a value between 0.0 and 1.0",
                    name, value
                )));
            }
        }
        Ok(())
    }
}

impl Config {
    /// Load configuration from the default config file
    ///
    /// Returns default configuration if file doesn't exist
    pub fn load() -> Result<Self> {
        if let Some(path) = config_path() {
            if path.exists() {
                return Self::load_from(&path);
            }
        }
        Ok(Self::default())
    }

    /// Load configuration from an explicit path, which must exist
    pub fn load_from(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| Error::FileRead {
            path: path.display().to_string(),
            error: e.to_string(),
        })?;
        let config: Self =
            toml::from_str(&content).map_err(|e| Error::ConfigParse(e.to_string()))?;
        config.thresholds.validate()?;
        Ok(config)
    }

    /// Render the effective configuration as TOML
    pub fn to_toml(&self) -> Result<String> {
        toml::to_string_pretty(self).map_err(|e| Error::Internal(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_config(content: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(content.as_bytes()).unwrap();
        file
    }

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.timeouts.send(), Duration::from_millis(3_000));
        assert_eq!(config.timeouts.unit_default(), Duration::from_millis(50_000));
        assert_eq!(config.thresholds.success_threshold(Mode::PositiveMatch), 0.80);
        assert_eq!(config.thresholds.success_threshold(Mode::NegativeMatch), 0.90);
        assert_eq!(config.thresholds.success_threshold(Mode::BoundaryCondition), 0.75);
        assert_eq!(config.endpoints.protocol_version, "v1");
    }

    #[test]
    fn test_collection_windows() {
        let t = Timeouts::default();
        let unit = Duration::from_millis(50_000);
        assert_eq!(
            t.collection_window(Mode::NegativeMatch, unit),
            Duration::from_millis(10_000)
        );
        assert_eq!(
            t.collection_window(Mode::PositiveMatch, unit),
            Duration::from_millis(40_000)
        );
        assert_eq!(
            t.collection_window(Mode::BoundaryCondition, Duration::from_millis(5_000)),
            Duration::ZERO
        );
    }

    #[test]
    fn test_missing_modes_table_uses_default_everywhere() {
        let file = write_config("[thresholds]\ndefault = 0.6\n");
        let config = Config::load_from(file.path()).unwrap();
        for mode in Mode::ALL {
            assert_eq!(config.thresholds.success_threshold(mode), 0.6);
        }
        assert!(config.thresholds.is_successful(0.6, Mode::NegativeMatch));
        assert!(!config.thresholds.is_successful(0.59, Mode::PositiveMatch));
    }

    #[test]
    fn test_partial_file_keeps_other_defaults() {
        let file = write_config(
            "[timeouts]\nsend_ms = 500\n\n[thresholds.modes]\nnegative_match = 1.0\n",
        );
        let config = Config::load_from(file.path()).unwrap();
        assert_eq!(config.timeouts.send_ms, 500);
        assert_eq!(config.timeouts.negative_window_ms, 10_000);
        assert_eq!(config.thresholds.success_threshold(Mode::NegativeMatch), 1.0);
        assert_eq!(config.thresholds.success_threshold(Mode::PositiveMatch), 0.80);
        assert_eq!(config.endpoints.mqtt_url, "tcp://127.0.0.1:1883");
    }

    #[test]
    fn test_out_of_range_threshold_is_rejected() {
        let file = write_config("[thresholds]\ndefault = 1.5\n");
        let err = Config::load_from(file.path()).unwrap_err();
        assert!(err.is_config());
        assert!(err.to_string().contains("between 0.0 and 1.0"));
    }

    #[test]
    fn test_bad_toml_is_parse_error() {
        let file = write_config("[timeouts\n");
        assert!(matches!(
            Config::load_from(file.path()),
            Err(Error::ConfigParse(_))
        ));
    }

    #[test]
    fn test_effective_config_renders() {
        let rendered = Config::default().to_toml().unwrap();
        assert!(rendered.contains("send_ms = 3000"));
        assert!(rendered.contains("[thresholds.modes]"));
    }
}
