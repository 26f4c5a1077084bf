//! CLI Entry Point for daq-bridge
//!
//! Provides command-line interface for:
//! - Running the bridge: poll the producers, stream snapshots to stdout, drive
//!   the actuator
//! - Validating a captured snapshot log offline
//! - Printing the effective configuration
//!
//! # Usage
//!
//! Stream snapshots until Ctrl+C:
//! ```bash
//! daq-bridge run > capture.log
//! ```
//!
//! Check the capture:
//! ```bash
//! daq-bridge validate capture.log
//! ```
//!
//! Diagnostics are written to stderr; stdout only ever carries snapshot lines
//! (or the validator verdict).

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use daq_bridge::config::{BridgeConfig, DEFAULT_CONFIG_PATH};
use daq_bridge::control::{ControlSink, UdpControlChannel};
use daq_bridge::logging;
use daq_bridge::report::{
    install_signal_handlers, shutdown_channel, ReportScheduler, SchedulerSettings,
};
use daq_bridge::stream::connect_channels;
use daq_bridge::validator::{validate_file, validate_reader, ValidationParams};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;

#[derive(Parser)]
#[command(name = "daq-bridge")]
#[command(about = "Telemetry poller with threshold-driven actuator control", long_about = None)]
struct Cli {
    /// Configuration file (missing file falls back to defaults)
    #[arg(long, global = true, default_value = DEFAULT_CONFIG_PATH)]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Poll the producers and stream snapshots to stdout
    Run {
        /// Tick period in milliseconds
        #[arg(long)]
        interval_ms: Option<u64>,

        /// Stop after this many snapshots
        #[arg(long)]
        count: Option<u64>,

        /// Do not send control frames
        #[arg(long)]
        no_control: bool,
    },

    /// Check timing and causality of a captured snapshot log
    Validate {
        /// Log file, or `-` for stdin
        log: PathBuf,

        /// Interval the log was captured at
        #[arg(long)]
        interval_ms: Option<u64>,
    },

    /// Print the merged configuration as TOML
    ShowConfig,
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    let cli = Cli::parse();
    let mut config = BridgeConfig::load_from(&cli.config)
        .with_context(|| format!("loading {}", cli.config.display()))?;

    match cli.command {
        Commands::Run {
            interval_ms,
            count,
            no_control,
        } => {
            if let Some(ms) = interval_ms {
                config.scheduler.interval_ms = ms;
            }
            if count.is_some() {
                config.scheduler.tick_budget = count;
            }
            if no_control {
                config.control.enabled = false;
            }
            config.validate()?;
            init_logging(&config)?;
            run_bridge(&config).await
        }
        Commands::Validate { log, interval_ms } => {
            if let Some(ms) = interval_ms {
                config.scheduler.interval_ms = ms;
            }
            config.validate()?;
            init_logging(&config)?;
            run_validation(&config, &log)
        }
        Commands::ShowConfig => {
            print!("{}", config.to_toml_string()?);
            Ok(ExitCode::SUCCESS)
        }
    }
}

fn init_logging(config: &BridgeConfig) -> Result<()> {
    logging::init_from_config(config).map_err(anyhow::Error::msg)
}

async fn run_bridge(config: &BridgeConfig) -> Result<ExitCode> {
    let channels = connect_channels(config.channel_addrs()?, config.channels.line_capacity).await;

    let control: Option<Arc<dyn ControlSink>> = if config.control.enabled {
        let channel = UdpControlChannel::open(config.control_addr()?).await?;
        tracing::info!(destination = %channel.destination(), "control enabled");
        Some(Arc::new(channel) as Arc<dyn ControlSink>)
    } else {
        tracing::info!("control disabled");
        None
    };

    let (trigger, listener) = shutdown_channel();
    let signals = install_signal_handlers(trigger)?;

    let mut scheduler = ReportScheduler::new(
        channels,
        control,
        tokio::io::stdout(),
        SchedulerSettings::from_config(config),
    );
    let result = scheduler.run(listener).await;
    signals.abort();

    let summary = result.context("bridge stopped")?;
    tracing::info!(
        reason = ?summary.reason,
        snapshots = summary.snapshots,
        high_crossings = summary.high_crossings,
        low_crossings = summary.low_crossings,
        transmit_failures = summary.transmit_failures,
        degraded_reads = summary.degraded_reads,
        "run complete"
    );
    Ok(ExitCode::SUCCESS)
}

fn run_validation(config: &BridgeConfig, log: &Path) -> Result<ExitCode> {
    let params = ValidationParams::from_config(&config.validation, config.scheduler.interval_ms);
    let report = if log.as_os_str() == "-" {
        validate_reader(std::io::stdin().lock(), &params)?
    } else {
        validate_file(log, &params)?
    };

    let passed = report.passed();
    let verdict = serde_json::json!({
        "passed": passed,
        "report": report,
    });
    println!("{}", verdict);

    Ok(if passed {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}
