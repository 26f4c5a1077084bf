//! Diagnostic logging for the bridge.
//!
//! One `tracing-subscriber` fmt layer, filtered by `RUST_LOG` when it is set
//! and by `[application] log_level` otherwise. Output always goes to stderr:
//! stdout is reserved for snapshot lines and validator verdicts.
//!
//! ```no_run
//! use daq_bridge::{config::BridgeConfig, logging};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let config = BridgeConfig::load()?;
//! logging::init_from_config(&config)?;
//! tracing::info!("bridge starting");
//! # Ok(())
//! # }
//! ```

use crate::config::BridgeConfig;
use std::str::FromStr;
use tracing::Level;
use tracing_subscriber::{
    filter::LevelFilter,
    fmt::{self, format::FmtSpan},
    layer::SubscriberExt,
    util::SubscriberInitExt,
    EnvFilter, Layer, Registry,
};

/// How log records are rendered on stderr.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    /// Multi-line, coloured; for an operator watching the terminal
    Pretty,
    /// One line per record
    #[default]
    Compact,
    /// One JSON object per record
    Json,
}

impl FromStr for LogFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "pretty" => Ok(LogFormat::Pretty),
            "compact" => Ok(LogFormat::Compact),
            "json" => Ok(LogFormat::Json),
            other => Err(format!(
                "unknown log format '{}', expected pretty, compact or json",
                other
            )),
        }
    }
}

/// Subscriber settings.
#[derive(Debug, Clone)]
pub struct LogConfig {
    /// Default verbosity when `RUST_LOG` is unset
    pub level: Level,
    /// Record rendering
    pub format: LogFormat,
    /// Also log span open/close (useful around a scheduler run)
    pub span_events: bool,
    /// Include the source location of each record
    pub source_location: bool,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: Level::INFO,
            format: LogFormat::default(),
            span_events: false,
            source_location: false,
        }
    }
}

impl LogConfig {
    /// Settings from the `[application]` section.
    pub fn from_bridge_config(config: &BridgeConfig) -> Result<Self, String> {
        let level = Level::from_str(&config.application.log_level)
            .map_err(|_| format!("unknown log level '{}'", config.application.log_level))?;
        Ok(Self {
            level,
            format: config.application.log_format.parse()?,
            ..Self::default()
        })
    }

    /// Default settings at `level`.
    pub fn at(level: Level) -> Self {
        Self {
            level,
            ..Self::default()
        }
    }

    /// Use `format`.
    pub fn format(mut self, format: LogFormat) -> Self {
        self.format = format;
        self
    }

    /// Toggle span open/close records.
    pub fn span_events(mut self, enabled: bool) -> Self {
        self.span_events = enabled;
        self
    }

    /// Toggle file and line on each record.
    pub fn source_location(mut self, enabled: bool) -> Self {
        self.source_location = enabled;
        self
    }

    fn filter(&self) -> EnvFilter {
        EnvFilter::builder()
            .with_default_directive(LevelFilter::from_level(self.level).into())
            .from_env_lossy()
    }

    fn layer(&self) -> Box<dyn Layer<Registry> + Send + Sync> {
        let spans = if self.span_events {
            FmtSpan::NEW | FmtSpan::CLOSE
        } else {
            FmtSpan::NONE
        };
        let base = fmt::layer()
            .with_writer(std::io::stderr)
            .with_span_events(spans)
            .with_file(self.source_location)
            .with_line_number(self.source_location);

        match self.format {
            LogFormat::Pretty => base.pretty().with_filter(self.filter()).boxed(),
            LogFormat::Compact => base
                .compact()
                .with_ansi(false)
                .with_filter(self.filter())
                .boxed(),
            LogFormat::Json => base.json().with_filter(self.filter()).boxed(),
        }
    }
}

/// Install the global subscriber described by the bridge configuration.
pub fn init_from_config(config: &BridgeConfig) -> Result<(), String> {
    init(LogConfig::from_bridge_config(config)?)
}

/// Install the global subscriber.
///
/// A second call, or a call after some other subscriber was installed, leaves
/// the existing one in place and returns `Ok(())`.
pub fn init(config: LogConfig) -> Result<(), String> {
    match tracing_subscriber::registry().with(config.layer()).try_init() {
        Ok(()) => Ok(()),
        Err(e) if e.to_string().contains("already been set") => Ok(()),
        Err(e) => Err(format!("failed to install log subscriber: {}", e)),
    }
}
