//! Fixed-cadence poll/emit/signal loop.
//!
//! Each tick drains the three stream channels, writes one snapshot line to
//! the sink and runs the trigger hysteresis, sending a control pair on a
//! crossing. The first tick only primes the connections: its readings are
//! discarded and a read failure there aborts the run.
//!
//! ```text
//! INIT ──(clock armed)──▶ RUNNING ──(interrupt | budget spent)──▶ TERMINATED
//!   │                        │
//!   └──(setup error)─────────┴──(priming read error | sink error)──▶ TERMINATED + Err
//! ```

use super::shutdown::ShutdownListener;
use super::snapshot::{parse_reading, Snapshot};
use super::trigger::{Crossing, TriggerState};
use crate::config::BridgeConfig;
use crate::control::ControlSink;
use crate::error::{BridgeError, BridgeResult};
use crate::stream::StreamChannel;
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncWrite, AsyncWriteExt};
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tracing::{debug, info, warn};

/// Loop parameters.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SchedulerSettings {
    /// Tick period
    pub interval: Duration,
    /// Snapshots to emit before stopping, `None` for no limit
    pub tick_budget: Option<u64>,
    /// Trigger level on out3
    pub trigger_threshold: f64,
}

impl SchedulerSettings {
    /// Settings from the `[scheduler]` section.
    #[must_use]
    pub fn from_config(config: &BridgeConfig) -> Self {
        Self {
            interval: config.scheduler.interval(),
            tick_budget: config.scheduler.tick_budget,
            trigger_threshold: config.scheduler.trigger_threshold,
        }
    }
}

impl Default for SchedulerSettings {
    fn default() -> Self {
        Self::from_config(&BridgeConfig::default())
    }
}

/// Lifecycle of a scheduler.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SchedulerState {
    /// Built, clock not armed
    Init,
    /// Ticking
    Running,
    /// Stopped; a scheduler is never restarted
    Terminated,
}

/// Why a run ended normally.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StopReason {
    /// The shutdown listener fired
    Interrupted,
    /// The tick budget reached zero
    BudgetExhausted,
}

/// Counters for one completed run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RunSummary {
    /// Clock ticks handled, priming tick included
    pub ticks: u64,
    /// Snapshot lines written
    pub snapshots: u64,
    /// Upward crossings
    pub high_crossings: u64,
    /// Downward crossings
    pub low_crossings: u64,
    /// Control messages that failed to send
    pub transmit_failures: u64,
    /// Channel reads degraded to the sentinel
    pub degraded_reads: u64,
    /// How the run ended
    pub reason: StopReason,
}

impl RunSummary {
    fn new() -> Self {
        Self {
            ticks: 0,
            snapshots: 0,
            high_crossings: 0,
            low_crossings: 0,
            transmit_failures: 0,
            degraded_reads: 0,
            reason: StopReason::Interrupted,
        }
    }
}

/// Drives the poll/emit/signal loop over three channels.
pub struct ReportScheduler<W> {
    channels: [StreamChannel; 3],
    control: Option<Arc<dyn ControlSink>>,
    sink: W,
    settings: SchedulerSettings,
    trigger: TriggerState,
    state: SchedulerState,
}

impl<W> ReportScheduler<W>
where
    W: AsyncWrite + Unpin + Send,
{
    /// Build a scheduler. `control = None` disables actuation entirely.
    pub fn new(
        channels: [StreamChannel; 3],
        control: Option<Arc<dyn ControlSink>>,
        sink: W,
        settings: SchedulerSettings,
    ) -> Self {
        Self {
            channels,
            control,
            sink,
            trigger: TriggerState::new(settings.trigger_threshold),
            settings,
            state: SchedulerState::Init,
        }
    }

    /// Current lifecycle state.
    #[must_use]
    pub fn state(&self) -> SchedulerState {
        self.state
    }

    /// The snapshot sink.
    pub fn sink(&self) -> &W {
        &self.sink
    }

    /// Consume the scheduler, returning the sink.
    pub fn into_sink(self) -> W {
        self.sink
    }

    /// Run until `shutdown` fires or the tick budget is spent.
    ///
    /// Both endings are graceful and return the run summary. The clock is
    /// released before returning on every path.
    ///
    /// # Errors
    /// - [`BridgeError::TimerSetup`] if the interval is zero or the scheduler
    ///   already ran.
    /// - [`BridgeError::Connection`] or [`BridgeError::Protocol`] from the
    ///   priming read.
    /// - [`BridgeError::Io`] if the sink rejects a snapshot.
    pub async fn run(&mut self, mut shutdown: ShutdownListener) -> BridgeResult<RunSummary> {
        if self.state != SchedulerState::Init {
            return Err(BridgeError::TimerSetup(format!(
                "scheduler cannot start from state {:?}",
                self.state
            )));
        }
        let period = self.settings.interval;
        if period.is_zero() {
            self.state = SchedulerState::Terminated;
            return Err(BridgeError::TimerSetup(
                "tick interval must be non-zero".to_string(),
            ));
        }

        let mut ticker = interval_at(Instant::now() + period, period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        self.state = SchedulerState::Running;
        info!(
            interval_ms = period.as_millis() as u64,
            budget = ?self.settings.tick_budget,
            control = self.control.is_some(),
            "scheduler running"
        );

        let mut summary = RunSummary::new();
        let result = self.tick_loop(&mut ticker, &mut shutdown, &mut summary).await;
        drop(ticker);
        self.state = SchedulerState::Terminated;

        match result {
            Ok(reason) => {
                summary.reason = reason;
                info!(
                    ?reason,
                    ticks = summary.ticks,
                    snapshots = summary.snapshots,
                    "scheduler stopped"
                );
                Ok(summary)
            }
            Err(e) => Err(e),
        }
    }

    async fn tick_loop(
        &mut self,
        ticker: &mut tokio::time::Interval,
        shutdown: &mut ShutdownListener,
        summary: &mut RunSummary,
    ) -> BridgeResult<StopReason> {
        let mut remaining = self.settings.tick_budget;
        if remaining == Some(0) {
            return Ok(StopReason::BudgetExhausted);
        }

        loop {
            tokio::select! {
                biased;
                _ = shutdown.triggered() => return Ok(StopReason::Interrupted),
                _ = ticker.tick() => {}
            }
            let timestamp = chrono::Utc::now().timestamp_millis();
            summary.ticks += 1;

            if summary.ticks == 1 {
                self.prime()?;
                continue;
            }

            let snapshot = Snapshot::new(timestamp, self.poll_channels(summary));
            self.emit(&snapshot).await?;
            summary.snapshots += 1;

            if let Some(left) = remaining.as_mut() {
                *left -= 1;
                if *left == 0 {
                    return Ok(StopReason::BudgetExhausted);
                }
            }

            self.evaluate_trigger(&snapshot, summary).await;
        }
    }

    fn prime(&mut self) -> BridgeResult<()> {
        for channel in &mut self.channels {
            let latest = channel.poll_latest()?.map(str::to_owned);
            debug!(channel = channel.name(), ?latest, "primed channel");
        }
        Ok(())
    }

    fn poll_channels(&mut self, summary: &mut RunSummary) -> [Option<f32>; 3] {
        let mut readings = [None; 3];
        for (reading, channel) in readings.iter_mut().zip(self.channels.iter_mut()) {
            match channel.poll_latest() {
                Ok(line) => *reading = line.and_then(parse_reading),
                Err(e) => {
                    summary.degraded_reads += 1;
                    warn!(channel = channel.name(), error = %e, "read failed, using sentinel");
                }
            }
        }
        readings
    }

    async fn emit(&mut self, snapshot: &Snapshot) -> BridgeResult<()> {
        let mut line = snapshot.to_line();
        line.push('\n');
        self.sink.write_all(line.as_bytes()).await?;
        self.sink.flush().await?;
        debug!(timestamp = snapshot.timestamp, "snapshot emitted");
        Ok(())
    }

    async fn evaluate_trigger(&mut self, snapshot: &Snapshot, summary: &mut RunSummary) {
        let Some(crossing) = self.trigger.evaluate(snapshot.out3.map(f64::from)) else {
            return;
        };
        match crossing {
            Crossing::High => summary.high_crossings += 1,
            Crossing::Low => summary.low_crossings += 1,
        }

        let Some(control) = self.control.as_ref() else {
            debug!(?crossing, "control disabled, crossing not sent");
            return;
        };
        info!(?crossing, out3 = ?snapshot.out3, "trigger crossed");
        for message in crossing.messages() {
            match control.send(&message).await {
                Ok(bytes) => debug!(%message, bytes, "control sent"),
                Err(e) => {
                    summary.transmit_failures += 1;
                    warn!(%message, error = %e, "control send failed");
                }
            }
        }
    }
}

impl<W> std::fmt::Debug for ReportScheduler<W> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReportScheduler")
            .field("channels", &self.channels)
            .field("control", &self.control.is_some())
            .field("settings", &self.settings)
            .field("trigger", &self.trigger)
            .field("state", &self.state)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::report::shutdown::shutdown_channel;
    use crate::stream::NonBlockingRead;
    use std::io;

    struct Silent;

    impl NonBlockingRead for Silent {
        fn try_read(&mut self, _buf: &mut [u8]) -> io::Result<usize> {
            Err(io::ErrorKind::WouldBlock.into())
        }
    }

    fn silent_channels() -> [StreamChannel; 3] {
        ["out1", "out2", "out3"].map(|name| StreamChannel::new(name, Box::new(Silent), 64))
    }

    fn settings(budget: Option<u64>) -> SchedulerSettings {
        SchedulerSettings {
            interval: Duration::from_millis(100),
            tick_budget: budget,
            trigger_threshold: 3.0,
        }
    }

    #[tokio::test(start_paused = true)]
    async fn silent_channels_emit_sentinels() {
        let (_trigger, listener) = shutdown_channel();
        let mut scheduler =
            ReportScheduler::new(silent_channels(), None, Vec::new(), settings(Some(2)));
        let summary = scheduler.run(listener).await.unwrap();

        assert_eq!(summary.ticks, 3);
        assert_eq!(summary.snapshots, 2);
        assert_eq!(summary.reason, StopReason::BudgetExhausted);
        assert_eq!(scheduler.state(), SchedulerState::Terminated);

        let out = String::from_utf8(scheduler.into_sink()).unwrap();
        let lines: Vec<_> = out.lines().collect();
        assert_eq!(lines.len(), 2);
        for line in lines {
            assert!(line.ends_with(r#""out1": "--", "out2": "--", "out3": "--"}"#));
        }
    }

    #[tokio::test(start_paused = true)]
    async fn zero_interval_is_a_timer_error() {
        let (_trigger, listener) = shutdown_channel();
        let mut settings = settings(None);
        settings.interval = Duration::ZERO;
        let mut scheduler = ReportScheduler::new(silent_channels(), None, Vec::new(), settings);
        assert!(matches!(
            scheduler.run(listener).await,
            Err(BridgeError::TimerSetup(_))
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn cannot_run_twice() {
        let (_trigger, listener) = shutdown_channel();
        let mut scheduler =
            ReportScheduler::new(silent_channels(), None, Vec::new(), settings(Some(1)));
        scheduler.run(listener.clone()).await.unwrap();
        assert!(matches!(
            scheduler.run(listener).await,
            Err(BridgeError::TimerSetup(_))
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn zero_budget_emits_nothing() {
        let (_trigger, listener) = shutdown_channel();
        let mut scheduler =
            ReportScheduler::new(silent_channels(), None, Vec::new(), settings(Some(0)));
        let summary = scheduler.run(listener).await.unwrap();
        assert_eq!(summary.ticks, 0);
        assert!(scheduler.sink().is_empty());
    }
}
