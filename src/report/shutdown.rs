//! Stop notification for the scheduler.
//!
//! A single-slot `watch` channel replaces a process-global run flag: the
//! trigger side is held by whoever decides to stop (a signal task, a test),
//! the listener side is checked by the scheduler between ticks.

use crate::error::{BridgeError, BridgeResult};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::info;

/// Create a connected trigger/listener pair.
#[must_use]
pub fn shutdown_channel() -> (ShutdownTrigger, ShutdownListener) {
    let (tx, rx) = watch::channel(false);
    (ShutdownTrigger { tx }, ShutdownListener { rx })
}

/// Requests a graceful stop.
#[derive(Debug, Clone)]
pub struct ShutdownTrigger {
    tx: watch::Sender<bool>,
}

impl ShutdownTrigger {
    /// Request the stop. Repeated calls are harmless.
    pub fn fire(&self) {
        self.tx.send_replace(true);
    }

    /// Another listener on the same channel.
    #[must_use]
    pub fn subscribe(&self) -> ShutdownListener {
        ShutdownListener {
            rx: self.tx.subscribe(),
        }
    }
}

/// Observes a stop request.
#[derive(Debug, Clone)]
pub struct ShutdownListener {
    rx: watch::Receiver<bool>,
}

impl ShutdownListener {
    /// Whether a stop was requested.
    #[must_use]
    pub fn is_triggered(&self) -> bool {
        *self.rx.borrow()
    }

    /// Resolve once a stop is requested.
    ///
    /// Never resolves if every trigger was dropped without firing.
    pub async fn triggered(&mut self) {
        let closed = self.rx.wait_for(|stop| *stop).await.is_err();
        if closed {
            std::future::pending::<()>().await;
        }
    }
}

/// Forward SIGINT and SIGTERM (Ctrl+C elsewhere) to `trigger`.
///
/// # Errors
/// [`BridgeError::TimerSetup`] if a signal listener cannot be registered.
#[cfg(unix)]
pub fn install_signal_handlers(trigger: ShutdownTrigger) -> BridgeResult<JoinHandle<()>> {
    use tokio::signal::unix::{signal, SignalKind};

    let mut sigint = signal(SignalKind::interrupt())
        .map_err(|e| BridgeError::TimerSetup(format!("SIGINT handler: {}", e)))?;
    let mut sigterm = signal(SignalKind::terminate())
        .map_err(|e| BridgeError::TimerSetup(format!("SIGTERM handler: {}", e)))?;

    Ok(tokio::spawn(async move {
        tokio::select! {
            _ = sigint.recv() => info!("Received SIGINT, stopping"),
            _ = sigterm.recv() => info!("Received SIGTERM, stopping"),
        }
        trigger.fire();
    }))
}

/// Forward SIGINT and SIGTERM (Ctrl+C elsewhere) to `trigger`.
///
/// # Errors
/// Never fails on this platform; registration errors surface in the task log.
#[cfg(not(unix))]
pub fn install_signal_handlers(trigger: ShutdownTrigger) -> BridgeResult<JoinHandle<()>> {
    Ok(tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => info!("Received Ctrl+C, stopping"),
            Err(e) => {
                tracing::warn!(error = %e, "Ctrl+C handler failed, stopping");
            }
        }
        trigger.fire();
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn fire_wakes_listener() {
        let (trigger, mut listener) = shutdown_channel();
        assert!(!listener.is_triggered());

        let waiter = tokio::spawn(async move {
            listener.triggered().await;
        });
        trigger.fire();
        tokio::time::timeout(Duration::from_secs(1), waiter)
            .await
            .unwrap()
            .unwrap();
    }

    #[tokio::test]
    async fn fired_before_wait_resolves_immediately() {
        let (trigger, mut listener) = shutdown_channel();
        trigger.fire();
        trigger.fire();
        listener.triggered().await;
        assert!(trigger.subscribe().is_triggered());
    }

    #[tokio::test(start_paused = true)]
    async fn dropped_trigger_never_resolves() {
        let (trigger, mut listener) = shutdown_channel();
        drop(trigger);
        let waited =
            tokio::time::timeout(Duration::from_secs(60), listener.triggered()).await;
        assert!(waited.is_err());
    }
}
