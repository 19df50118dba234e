//! Background polling of the mailbox.
//!
//! One worker thread owns the [`IngestionPipeline`] and runs its cycles on a
//! current-thread tokio runtime. Manual refreshes are queued onto the same
//! worker, so they never overlap a scheduled cycle. Stop is cooperative: the
//! worker notices it while sleeping, at the top of a cycle, or between
//! messages.

use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;

use chrono::{DateTime, Utc};
use crossbeam_channel::{bounded, Receiver, RecvTimeoutError, Sender};
use serde::Serialize;
use thiserror::Error;
use tokio::sync::{mpsc, watch};
use tracing::{debug, error, info, info_span, warn, Instrument};

use crate::config::PollerConfig;
use crate::pipeline::{CycleError, CycleOutcome, CycleReport, IngestionPipeline};

#[derive(Error, Debug)]
pub enum PollerError {
    #[error("Poller is already running")]
    AlreadyRunning,

    #[error("Poller is not running")]
    NotRunning,

    #[error("Pipeline is unavailable; the previous worker did not hand it back")]
    Unavailable,

    #[error("Failed to build the poller runtime: {0}")]
    Runtime(#[source] std::io::Error),

    #[error("Failed to spawn the poller thread: {0}")]
    Spawn(#[source] std::io::Error),

    #[error("Poller did not stop within {0:?}")]
    StopTimeout(Duration),

    #[error("Refresh did not finish within {0:?}")]
    RefreshTimeout(Duration),

    #[error("Refresh failed: {0}")]
    RefreshFailed(#[source] CycleError),

    #[error("Poller worker exited unexpectedly")]
    WorkerGone,
}

/// Scheduling knobs.
#[derive(Debug, Clone)]
pub struct PollerSettings {
    /// Pause after a successful cycle.
    pub interval: Duration,
    /// Pause after a failed cycle.
    pub recovery_interval: Duration,
    /// Upper bound on how long [`Poller::stop`] waits for the worker.
    pub stop_timeout: Duration,
}

impl PollerSettings {
    pub fn from_config(config: &PollerConfig) -> Self {
        Self {
            interval: Duration::from_secs(config.interval_secs),
            recovery_interval: Duration::from_secs(config.recovery_interval_secs),
            stop_timeout: Duration::from_secs(config.stop_timeout_secs),
        }
    }
}

impl Default for PollerSettings {
    fn default() -> Self {
        Self::from_config(&PollerConfig::default())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum PollerState {
    Stopped,
    Running,
    Stopping,
}

/// Read-only snapshot for a status indicator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PollerStatus {
    pub state: PollerState,
    /// Outcome of the most recent connect attempt.
    pub connected: bool,
    /// Last checkpoint written by a successful cycle.
    pub last_sync: Option<DateTime<Utc>>,
    pub last_error: Option<String>,
    pub cycles_completed: u64,
    pub consecutive_failures: u32,
}

impl PollerStatus {
    fn stopped(last_sync: Option<DateTime<Utc>>) -> Self {
        Self {
            state: PollerState::Stopped,
            connected: false,
            last_sync,
            last_error: None,
            cycles_completed: 0,
            consecutive_failures: 0,
        }
    }
}

type CycleResult = Result<CycleReport, CycleError>;

struct RefreshRequest {
    reply: Sender<CycleResult>,
}

struct Worker {
    stop_tx: watch::Sender<bool>,
    refresh_tx: mpsc::UnboundedSender<RefreshRequest>,
    done_rx: Receiver<IngestionPipeline>,
    handle: JoinHandle<()>,
}

/// Runs pipeline cycles on an interval until stopped.
pub struct Poller {
    settings: PollerSettings,
    pipeline: Option<IngestionPipeline>,
    worker: Option<Worker>,
    status: Arc<watch::Sender<PollerStatus>>,
}

impl Poller {
    pub fn new(pipeline: IngestionPipeline, settings: PollerSettings) -> Self {
        let last_sync = match pipeline.checkpoint().load() {
            Ok(at) => at,
            Err(e) => {
                warn!("Could not read checkpoint for status: {}", e);
                None
            }
        };
        let (status, _) = watch::channel(PollerStatus::stopped(last_sync));
        Self {
            settings,
            pipeline: Some(pipeline),
            worker: None,
            status: Arc::new(status),
        }
    }

    pub fn status(&self) -> PollerStatus {
        self.status.borrow().clone()
    }

    /// Receiver that sees every status change.
    pub fn subscribe(&self) -> watch::Receiver<PollerStatus> {
        self.status.subscribe()
    }

    pub fn is_running(&self) -> bool {
        self.status.borrow().state == PollerState::Running
    }

    /// Starts the worker. The first cycle runs immediately.
    pub fn start(&mut self) -> Result<(), PollerError> {
        self.reclaim_finished_worker();
        if self.worker.is_some() {
            return Err(PollerError::AlreadyRunning);
        }
        let pipeline = self.pipeline.take().ok_or(PollerError::Unavailable)?;

        let runtime = match tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
        {
            Ok(runtime) => runtime,
            Err(e) => {
                self.pipeline = Some(pipeline);
                return Err(PollerError::Runtime(e));
            }
        };

        let (stop_tx, stop_rx) = watch::channel(false);
        let (refresh_tx, refresh_rx) = mpsc::unbounded_channel();
        let (done_tx, done_rx) = bounded(1);
        let status = Arc::clone(&self.status);
        let settings = self.settings.clone();

        status.send_modify(|s| {
            s.state = PollerState::Running;
            s.last_error = None;
        });

        let spawned = std::thread::Builder::new()
            .name("careervue-poller".to_string())
            .spawn(move || {
                let pipeline = runtime.block_on(run_worker(
                    pipeline,
                    &settings,
                    &status,
                    stop_rx,
                    refresh_rx,
                ));
                status.send_modify(|s| s.state = PollerState::Stopped);
                let _ = done_tx.send(pipeline);
            });

        match spawned {
            Ok(handle) => {
                info!(
                    "Poller started (interval {:?}, recovery {:?})",
                    self.settings.interval, self.settings.recovery_interval
                );
                self.worker = Some(Worker {
                    stop_tx,
                    refresh_tx,
                    done_rx,
                    handle,
                });
                Ok(())
            }
            Err(e) => {
                self.status.send_modify(|s| s.state = PollerState::Stopped);
                Err(PollerError::Spawn(e))
            }
        }
    }

    /// Asks the worker to stop and waits for it, up to the stop timeout.
    ///
    /// On timeout the poller stays in `Stopping`; calling `stop` again keeps
    /// waiting for the same worker.
    pub fn stop(&mut self) -> Result<(), PollerError> {
        let Some(worker) = self.worker.as_ref() else {
            return Ok(());
        };

        self.status.send_modify(|s| {
            if s.state == PollerState::Running {
                s.state = PollerState::Stopping;
            }
        });
        let _ = worker.stop_tx.send(true);

        match worker.done_rx.recv_timeout(self.settings.stop_timeout) {
            Ok(pipeline) => {
                self.pipeline = Some(pipeline);
                self.join_worker();
                info!("Poller stopped");
                Ok(())
            }
            Err(RecvTimeoutError::Timeout) => {
                warn!(
                    "Poller did not stop within {:?}; the current cycle is still running",
                    self.settings.stop_timeout
                );
                Err(PollerError::StopTimeout(self.settings.stop_timeout))
            }
            Err(RecvTimeoutError::Disconnected) => {
                self.join_worker();
                self.status.send_modify(|s| s.state = PollerState::Stopped);
                Err(PollerError::WorkerGone)
            }
        }
    }

    /// Queues a cycle on the worker and waits for its report.
    ///
    /// The cycle runs after any cycle already in progress.
    pub fn refresh_now(&self, timeout: Duration) -> Result<CycleReport, PollerError> {
        let worker = self.worker.as_ref().ok_or(PollerError::NotRunning)?;
        if self.status.borrow().state != PollerState::Running {
            return Err(PollerError::NotRunning);
        }

        let (reply, reply_rx) = bounded(1);
        worker
            .refresh_tx
            .send(RefreshRequest { reply })
            .map_err(|_| PollerError::WorkerGone)?;
        info!("Manual refresh requested");

        match reply_rx.recv_timeout(timeout) {
            Ok(Ok(report)) => Ok(report),
            Ok(Err(e)) => Err(PollerError::RefreshFailed(e)),
            Err(RecvTimeoutError::Timeout) => Err(PollerError::RefreshTimeout(timeout)),
            Err(RecvTimeoutError::Disconnected) => Err(PollerError::WorkerGone),
        }
    }

    /// Takes back the pipeline from a worker that already exited.
    fn reclaim_finished_worker(&mut self) {
        let Some(worker) = self.worker.as_ref() else {
            return;
        };
        if let Ok(pipeline) = worker.done_rx.try_recv() {
            self.pipeline = Some(pipeline);
            self.join_worker();
        }
    }

    fn join_worker(&mut self) {
        if let Some(worker) = self.worker.take() {
            if worker.handle.join().is_err() {
                error!("Poller thread panicked");
            }
        }
    }
}

impl Drop for Poller {
    fn drop(&mut self) {
        if let Some(worker) = self.worker.as_ref() {
            debug!("Poller dropped while running; signalling stop");
            let _ = worker.stop_tx.send(true);
        }
    }
}

async fn run_worker(
    mut pipeline: IngestionPipeline,
    settings: &PollerSettings,
    status: &watch::Sender<PollerStatus>,
    mut stop_rx: watch::Receiver<bool>,
    mut refresh_rx: mpsc::UnboundedReceiver<RefreshRequest>,
) -> IngestionPipeline {
    let mut delay = Duration::ZERO;

    loop {
        let mut pending = None;
        tokio::select! {
            _ = tokio::time::sleep(delay) => {}
            Some(request) = refresh_rx.recv() => pending = Some(request),
            changed = stop_rx.changed() => {
                if changed.is_err() {
                    // Poller handle is gone.
                    break;
                }
            }
        }
        if *stop_rx.borrow() {
            break;
        }

        let result = pipeline
            .run_cycle(&stop_rx)
            .instrument(info_span!("poll", manual = pending.is_some()))
            .await;
        delay = record_cycle(status, settings, &result);

        if let Some(request) = pending {
            let _ = request.reply.send(result);
        }
    }

    // Queued refreshes see a closed reply channel.
    refresh_rx.close();
    pipeline
}

/// Updates the status after a cycle and returns the pause before the next.
fn record_cycle(
    status: &watch::Sender<PollerStatus>,
    settings: &PollerSettings,
    result: &CycleResult,
) -> Duration {
    match result {
        Ok(report) => {
            status.send_modify(|s| {
                if report.connected {
                    s.connected = true;
                }
                if report.outcome == CycleOutcome::Completed {
                    s.last_sync = report.checkpoint.or(s.last_sync);
                    s.cycles_completed += 1;
                    s.consecutive_failures = 0;
                    s.last_error = None;
                }
            });
            settings.interval
        }
        Err(e) => {
            error!("Cycle failed: {}", e);
            status.send_modify(|s| {
                s.connected = e.connected();
                s.last_error = Some(e.to_string());
                s.consecutive_failures = s.consecutive_failures.saturating_add(1);
            });
            settings.recovery_interval
        }
    }
}
