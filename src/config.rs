//! Configuration System using Figment
//!
//! This module provides strongly-typed configuration loading for the bridge.
//! Configuration is merged from, in increasing priority:
//! 1. compiled-in defaults
//! 2. a TOML file (`config/bridge.toml` unless another path is given)
//! 3. environment variables prefixed with `DAQ_BRIDGE_`, nested with `__`
//!
//! # Example
//! ```no_run
//! use daq_bridge::config::BridgeConfig;
//!
//! let config = BridgeConfig::load()?;
//! println!("Polling every {} ms", config.scheduler.interval_ms);
//! # Ok::<(), daq_bridge::error::BridgeError>(())
//! ```

use crate::error::{BridgeError, BridgeResult};
use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};
use std::net::{IpAddr, SocketAddr};
use std::path::Path;
use std::time::Duration;

/// Default configuration file location, relative to the working directory.
pub const DEFAULT_CONFIG_PATH: &str = "config/bridge.toml";

/// Prefix for environment overrides.
pub const ENV_PREFIX: &str = "DAQ_BRIDGE_";

/// Top-level configuration
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct BridgeConfig {
    /// Application settings
    #[serde(default)]
    pub application: ApplicationConfig,
    /// The three telemetry stream producers
    #[serde(default)]
    pub channels: ChannelConfig,
    /// Actuator control channel
    #[serde(default)]
    pub control: ControlConfig,
    /// Polling loop settings
    #[serde(default)]
    pub scheduler: SchedulerConfig,
    /// Offline log validation settings
    #[serde(default)]
    pub validation: ValidationConfig,
}

/// Application-level configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApplicationConfig {
    /// Application name
    pub name: String,
    /// Logging level (trace, debug, info, warn, error)
    pub log_level: String,
    /// Log output format (pretty, compact, json)
    #[serde(default = "default_log_format")]
    pub log_format: String,
}

/// Stream channel configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChannelConfig {
    /// Host the producers listen on
    pub host: String,
    /// Ports of out1, out2 and out3, in that order
    pub ports: [u16; 3],
    /// Longest accepted line in bytes, newline excluded
    #[serde(default = "default_line_capacity")]
    pub line_capacity: usize,
}

/// Control channel configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ControlConfig {
    /// Whether control datagrams are sent at all
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    /// Actuator host
    pub host: String,
    /// Actuator UDP port
    pub port: u16,
}

/// Scheduler configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchedulerConfig {
    /// Tick period in milliseconds
    pub interval_ms: u64,
    /// Number of snapshots to emit before stopping (absent = run until interrupted)
    #[serde(default)]
    pub tick_budget: Option<u64>,
    /// Trigger level for the out3 hysteresis
    #[serde(default = "default_trigger_threshold")]
    pub trigger_threshold: f64,
}

/// Validator configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidationConfig {
    /// Accepted deviation from the interval between adjacent snapshots
    pub tolerance_ms: u64,
    /// Ticks between a latch change on out3 and its effect on out1
    pub propagation_delay: usize,
    /// |out1| above this counts as excitation
    pub excitation_magnitude: f32,
    /// out3 value that latches the trigger high
    pub latch_high: f32,
    /// out3 value that latches the trigger low
    pub latch_low: f32,
}

// Default value functions
fn default_log_format() -> String {
    "compact".to_string()
}

fn default_line_capacity() -> usize {
    1024
}

fn default_enabled() -> bool {
    true
}

fn default_trigger_threshold() -> f64 {
    3.0
}

impl Default for ApplicationConfig {
    fn default() -> Self {
        Self {
            name: "daq-bridge".to_string(),
            log_level: "info".to_string(),
            log_format: default_log_format(),
        }
    }
}

impl Default for ChannelConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            ports: [4001, 4002, 4003],
            line_capacity: default_line_capacity(),
        }
    }
}

impl Default for ControlConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            host: "127.0.0.1".to_string(),
            port: 4000,
        }
    }
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            interval_ms: 100,
            tick_budget: None,
            trigger_threshold: default_trigger_threshold(),
        }
    }
}

impl Default for ValidationConfig {
    fn default() -> Self {
        Self {
            tolerance_ms: 10,
            propagation_delay: 1,
            excitation_magnitude: 5.0,
            latch_high: 5.0,
            latch_low: 0.0,
        }
    }
}

impl BridgeConfig {
    /// Load configuration from `config/bridge.toml` and environment variables
    ///
    /// Environment variables override the file with prefix `DAQ_BRIDGE_`.
    /// Example: `DAQ_BRIDGE_SCHEDULER__INTERVAL_MS=20`
    pub fn load() -> BridgeResult<Self> {
        Self::load_from(DEFAULT_CONFIG_PATH)
    }

    /// Load configuration from a specific file path. A missing file is not an error.
    pub fn load_from<P: AsRef<Path>>(path: P) -> BridgeResult<Self> {
        let config: Self = Self::figment(path.as_ref()).extract()?;
        config.validate()?;
        Ok(config)
    }

    fn figment(path: &Path) -> Figment {
        Figment::from(Serialized::defaults(BridgeConfig::default()))
            .merge(Toml::file(path))
            .merge(Env::prefixed(ENV_PREFIX).split("__"))
    }

    /// Validate configuration after loading
    pub fn validate(&self) -> BridgeResult<()> {
        let valid_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_levels.contains(&self.application.log_level.to_lowercase().as_str()) {
            return Err(BridgeError::InvalidConfig(format!(
                "Invalid log_level '{}'. Must be one of: {}",
                self.application.log_level,
                valid_levels.join(", ")
            )));
        }

        let valid_formats = ["pretty", "compact", "json"];
        if !valid_formats.contains(&self.application.log_format.as_str()) {
            return Err(BridgeError::InvalidConfig(format!(
                "Invalid log_format '{}'. Must be one of: {}",
                self.application.log_format,
                valid_formats.join(", ")
            )));
        }

        parse_host(&self.channels.host)?;
        parse_host(&self.control.host)?;

        for port in self
            .channels
            .ports
            .iter()
            .chain(std::iter::once(&self.control.port))
        {
            if *port == 0 {
                return Err(BridgeError::InvalidConfig(
                    "Port number must be greater than 0".to_string(),
                ));
            }
        }

        if self.channels.line_capacity < 2 {
            return Err(BridgeError::InvalidConfig(format!(
                "Invalid line_capacity {}. Must be at least 2",
                self.channels.line_capacity
            )));
        }

        if self.scheduler.interval_ms == 0 {
            return Err(BridgeError::InvalidConfig(
                "interval_ms must be greater than 0".to_string(),
            ));
        }

        if !self.scheduler.trigger_threshold.is_finite() {
            return Err(BridgeError::InvalidConfig(
                "trigger_threshold must be a finite number".to_string(),
            ));
        }

        if self.validation.propagation_delay == 0 {
            return Err(BridgeError::InvalidConfig(
                "propagation_delay must be at least one tick".to_string(),
            ));
        }

        Ok(())
    }

    /// Render the effective configuration as TOML.
    pub fn to_toml_string(&self) -> BridgeResult<String> {
        toml::to_string_pretty(self)
            .map_err(|e| BridgeError::InvalidConfig(format!("cannot render config: {}", e)))
    }

    /// Addresses of out1, out2 and out3.
    pub fn channel_addrs(&self) -> BridgeResult<[SocketAddr; 3]> {
        let ip = parse_host(&self.channels.host)?;
        let [p1, p2, p3] = self.channels.ports;
        Ok([
            SocketAddr::new(ip, p1),
            SocketAddr::new(ip, p2),
            SocketAddr::new(ip, p3),
        ])
    }

    /// Address of the actuator.
    pub fn control_addr(&self) -> BridgeResult<SocketAddr> {
        Ok(SocketAddr::new(parse_host(&self.control.host)?, self.control.port))
    }
}

impl SchedulerConfig {
    /// Tick period as a `Duration`.
    #[must_use]
    pub fn interval(&self) -> Duration {
        Duration::from_millis(self.interval_ms)
    }
}

fn parse_host(host: &str) -> BridgeResult<IpAddr> {
    host.parse::<IpAddr>()
        .map_err(|_| BridgeError::InvalidConfig(format!("Invalid IP address '{}'", host)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults_are_valid() {
        let config = BridgeConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.channels.ports, [4001, 4002, 4003]);
        assert_eq!(config.control.port, 4000);
        assert_eq!(config.scheduler.interval_ms, 100);
        assert!(config.scheduler.tick_budget.is_none());
    }

    #[test]
    fn test_missing_file_falls_back_to_defaults() {
        let config = BridgeConfig::load_from("does/not/exist.toml").unwrap();
        assert_eq!(config.application.name, "daq-bridge");
    }

    #[test]
    fn test_file_overrides_defaults() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            r#"
            [scheduler]
            interval_ms = 20
            tick_budget = 50

            [control]
            enabled = false
            host = "127.0.0.1"
            port = 4100
            "#
        )
        .unwrap();

        let config = BridgeConfig::load_from(file.path()).unwrap();
        assert_eq!(config.scheduler.interval_ms, 20);
        assert_eq!(config.scheduler.tick_budget, Some(50));
        assert!(!config.control.enabled);
        assert_eq!(config.control.port, 4100);
        // untouched sections keep their defaults
        assert_eq!(config.channels.line_capacity, 1024);
    }

    #[test]
    fn test_invalid_log_level() {
        let mut config = BridgeConfig::default();
        config.application.log_level = "loud".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_zero_interval_rejected() {
        let mut config = BridgeConfig::default();
        config.scheduler.interval_ms = 0;
        assert!(matches!(
            config.validate(),
            Err(BridgeError::InvalidConfig(_))
        ));
    }

    #[test]
    fn test_zero_port_rejected() {
        let mut config = BridgeConfig::default();
        config.channels.ports[1] = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_bad_host_rejected() {
        let mut config = BridgeConfig::default();
        config.control.host = "not-an-ip".to_string();
        assert!(config.validate().is_err());
        assert!(config.control_addr().is_err());
    }

    #[test]
    fn test_rendered_toml_loads_back() {
        let mut config = BridgeConfig::default();
        config.scheduler.tick_budget = Some(7);
        config.channels.ports = [5001, 5002, 5003];

        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(config.to_toml_string().unwrap().as_bytes())
            .unwrap();

        let loaded = BridgeConfig::load_from(file.path()).unwrap();
        assert_eq!(loaded.scheduler.tick_budget, Some(7));
        assert_eq!(loaded.channels.ports, [5001, 5002, 5003]);
    }

    #[test]
    fn test_shipped_config_file_is_valid() {
        let path = concat!(env!("CARGO_MANIFEST_DIR"), "/config/bridge.toml");
        let config = BridgeConfig::load_from(path).unwrap();
        assert_eq!(config.channels.ports, [4001, 4002, 4003]);
        assert_eq!(config.control.port, 4000);
        assert!(config.scheduler.tick_budget.is_none());
    }

    #[test]
    fn test_channel_addrs() {
        let config = BridgeConfig::default();
        let addrs = config.channel_addrs().unwrap();
        assert_eq!(addrs[2].to_string(), "127.0.0.1:4003");
    }
}
