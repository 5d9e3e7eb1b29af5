//! Background worker that carries out deferred effects.
//!
//! Transitions hand their [`Effect`]s to a [`SyncHandle`]; a single tokio
//! task applies them in dispatch order. Persistence is retried a bounded
//! number of times, navigation is tried once. Nothing here can reach back
//! into the in-memory snapshot: failures are logged and counted.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{anyhow, Result};
use outline_harness_core::store::{Navigation, Persistence};
use outline_harness_core::{Effect, SyncBatch};
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, error, warn};

use crate::config::SyncConfig;

/// Counters reported when the worker stops.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct SyncStats {
    pub persisted: usize,
    /// Batches given up on after every retry failed.
    pub dropped: usize,
    pub navigated: usize,
    pub navigation_failures: usize,
}

enum Command {
    Apply(Effect),
    Flush(oneshot::Sender<()>),
}

/// Sending side of the worker queue. Dropping every handle stops the worker
/// once the queue drains.
#[derive(Clone)]
pub struct SyncHandle {
    tx: mpsc::UnboundedSender<Command>,
}

impl SyncHandle {
    pub fn dispatch(&self, effects: Vec<Effect>) -> Result<()> {
        for effect in effects {
            self.tx
                .send(Command::Apply(effect))
                .map_err(|_| anyhow!("sync worker has stopped"))?;
        }
        Ok(())
    }

    /// Wait until everything dispatched before this call has been handled.
    pub async fn flush(&self) -> Result<()> {
        let (done, wait) = oneshot::channel();
        self.tx
            .send(Command::Flush(done))
            .map_err(|_| anyhow!("sync worker has stopped"))?;
        wait.await
            .map_err(|_| anyhow!("sync worker stopped before flushing"))
    }
}

pub struct SyncWorker {
    persistence: Arc<dyn Persistence>,
    navigation: Arc<dyn Navigation>,
    max_retries: u32,
    backoff: Duration,
    stats: SyncStats,
}

impl SyncWorker {
    pub fn new(
        persistence: Arc<dyn Persistence>,
        navigation: Arc<dyn Navigation>,
        config: &SyncConfig,
    ) -> Self {
        Self {
            persistence,
            navigation,
            max_retries: config.max_retries,
            backoff: Duration::from_millis(config.retry_backoff_ms),
            stats: SyncStats::default(),
        }
    }

    /// Start the worker on the current tokio runtime.
    pub fn spawn(self) -> (SyncHandle, JoinHandle<SyncStats>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let task = tokio::spawn(self.run(rx));
        (SyncHandle { tx }, task)
    }

    async fn run(mut self, mut rx: mpsc::UnboundedReceiver<Command>) -> SyncStats {
        while let Some(command) = rx.recv().await {
            match command {
                Command::Apply(Effect::Persist(batch)) => self.persist(&batch).await,
                Command::Apply(Effect::Navigate { path, replace }) => {
                    match self.navigation.navigate(&path, replace).await {
                        Ok(()) => self.stats.navigated += 1,
                        Err(e) => {
                            self.stats.navigation_failures += 1;
                            warn!(error = %e, path = %path, "navigation failed");
                        }
                    }
                }
                Command::Flush(done) => {
                    // receiver may have given up waiting
                    let _ = done.send(());
                }
            }
        }
        debug!(stats = ?self.stats, "sync worker stopped");
        self.stats
    }

    async fn persist(&mut self, batch: &SyncBatch) {
        let mut attempt = 0u32;
        loop {
            match self.persistence.apply(batch).await {
                Ok(()) => {
                    self.stats.persisted += 1;
                    return;
                }
                Err(e) if attempt < self.max_retries => {
                    attempt += 1;
                    warn!(
                        error = %e,
                        version = batch.version,
                        attempt,
                        max_retries = self.max_retries,
                        "persist failed; retrying"
                    );
                    tokio::time::sleep(self.backoff).await;
                }
                Err(e) => {
                    self.stats.dropped += 1;
                    error!(
                        error = %e,
                        version = batch.version,
                        "persist failed; batch dropped"
                    );
                    return;
                }
            }
        }
    }
}
