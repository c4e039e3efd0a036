use std::sync::Arc;

use tokio::sync::{mpsc, watch};

use tenderhub_types::Clock;

use crate::sweep::{DeadlineSweeper, SweepReport};

/// Configuration for the sweep loop.
pub struct SweepConfig {
    /// Time between sweep passes.
    pub interval: std::time::Duration,
}

impl Default for SweepConfig {
    fn default() -> Self {
        Self {
            interval: std::time::Duration::from_secs(60),
        }
    }
}

/// Runs a sweep pass on every tick until shutdown is signalled.
pub struct SweepLoop {
    sweeper: DeadlineSweeper,
    clock: Arc<dyn Clock>,
    shutdown_rx: watch::Receiver<bool>,
    report_tx: Option<mpsc::Sender<SweepReport>>,
    config: SweepConfig,
}

impl SweepLoop {
    pub fn new(
        sweeper: DeadlineSweeper,
        clock: Arc<dyn Clock>,
        shutdown_rx: watch::Receiver<bool>,
        config: SweepConfig,
    ) -> Self {
        Self {
            sweeper,
            clock,
            shutdown_rx,
            report_tx: None,
            config,
        }
    }

    /// Forward each pass's report to `tx`.
    pub fn with_reports(mut self, tx: mpsc::Sender<SweepReport>) -> Self {
        self.report_tx = Some(tx);
        self
    }

    pub async fn run(mut self) {
        let mut ticker = tokio::time::interval(self.config.interval);
        tracing::info!(interval_secs = self.config.interval.as_secs(), "sweep loop started");

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    self.tick().await;
                }
                Ok(()) = self.shutdown_rx.changed() => {
                    if *self.shutdown_rx.borrow() {
                        tracing::info!("Sweep loop shutting down");
                        break;
                    }
                }
            }
        }
    }

    async fn tick(&mut self) {
        match self.sweeper.sweep(self.clock.now()).await {
            Ok(report) => {
                if let Some(tx) = &self.report_tx {
                    let _ = tx.send(report).await;
                }
            }
            Err(e) => tracing::error!("Sweep pass failed: {}", e),
        }
    }
}
