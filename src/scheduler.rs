//! Poll scheduler: drives fetch cycles over all registered products with
//! bounded concurrency and per-product failure isolation. All state lives
//! in the scheduler value, so tests can drive cycles without real timers.

use std::sync::{Arc, RwLock};
use std::time::Duration;

use chrono::Utc;
use futures::future::join_all;
use serde::Serialize;
use tokio::sync::{Semaphore, watch};
use tracing::{error, info, warn};

use crate::config::SchedulerConfig;
use crate::db::Database;
use crate::error::Result;
use crate::fetch::FetchPipeline;
use crate::models::{FailureKind, FetchOutcome, Product};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SchedulerState {
    Idle,
    CycleRunning,
    Stopped,
}

/// Summary of one full pass over the registered products.
#[derive(Debug, Clone, Copy, Default, Serialize)]
pub struct CycleReport {
    pub total: usize,
    pub succeeded: usize,
    pub failed: usize,
}

pub struct PollScheduler {
    db: Database,
    pipeline: Arc<FetchPipeline>,
    config: SchedulerConfig,
    state: Arc<RwLock<SchedulerState>>,
}

/// Stop signal for [`PollScheduler::run`]. Send `true` to stop admitting
/// new cycles and interrupt the inter-cycle sleep.
pub fn stop_channel() -> (watch::Sender<bool>, watch::Receiver<bool>) {
    watch::channel(false)
}

impl PollScheduler {
    pub fn new(db: Database, pipeline: Arc<FetchPipeline>, config: SchedulerConfig) -> Self {
        Self {
            db,
            pipeline,
            config,
            state: Arc::new(RwLock::new(SchedulerState::Idle)),
        }
    }

    pub fn state(&self) -> SchedulerState {
        self.state
            .read()
            .map(|guard| *guard)
            .unwrap_or(SchedulerState::Stopped)
    }

    fn set_state(&self, state: SchedulerState) {
        if let Ok(mut guard) = self.state.write() {
            *guard = state;
        }
    }

    /// One-shot run: a single cycle, then back to idle.
    pub async fn run_once(&self) -> Result<CycleReport> {
        self.set_state(SchedulerState::CycleRunning);
        let report = self.cycle().await;
        self.set_state(SchedulerState::Idle);
        report
    }

    /// Continuous mode: cycle, sleep, repeat, until the stop signal flips.
    /// The sleep is interruptible so shutdown never waits out the interval.
    pub async fn run(&self, mut stop: watch::Receiver<bool>) -> Result<()> {
        let interval = Duration::from_secs(self.config.interval_secs);

        while !*stop.borrow() {
            self.set_state(SchedulerState::CycleRunning);
            match self.cycle().await {
                Ok(report) => info!(
                    total = report.total,
                    succeeded = report.succeeded,
                    failed = report.failed,
                    "cycle complete"
                ),
                // A failed cycle (e.g. the registry was unreadable) is logged
                // and the loop keeps its schedule.
                Err(e) => error!("cycle aborted: {e}"),
            }
            self.set_state(SchedulerState::Idle);

            tokio::select! {
                _ = tokio::time::sleep(interval) => {}
                changed = stop.changed() => {
                    if changed.is_err() || *stop.borrow() {
                        break;
                    }
                }
            }
        }

        self.set_state(SchedulerState::Stopped);
        info!("scheduler stopped");
        Ok(())
    }

    /// One pass over the registry. Each product is fetched by exactly one
    /// worker; the semaphore bounds how many are in flight.
    async fn cycle(&self) -> Result<CycleReport> {
        let products = self.db.list_products().await?;
        let semaphore = Arc::new(Semaphore::new(self.config.workers));

        let mut handles = Vec::with_capacity(products.len());
        for product in products {
            let semaphore = Arc::clone(&semaphore);
            let db = self.db.clone();
            let pipeline = Arc::clone(&self.pipeline);
            let product_id = product.id.clone();

            let handle = tokio::spawn(async move {
                let _permit = semaphore
                    .acquire_owned()
                    .await
                    .map_err(|e| format!("worker pool closed: {e}"))?;
                Self::check_and_record(&db, &pipeline, &product).await
            });
            handles.push((product_id, handle));
        }

        let mut report = CycleReport {
            total: handles.len(),
            ..CycleReport::default()
        };

        let (ids, tasks): (Vec<_>, Vec<_>) = handles.into_iter().unzip();
        for (product_id, joined) in ids.into_iter().zip(join_all(tasks).await) {
            match joined {
                Ok(Ok(success)) => {
                    if success {
                        report.succeeded += 1;
                    } else {
                        report.failed += 1;
                    }
                }
                // Storage failed for this one record; the cycle goes on.
                Ok(Err(detail)) => {
                    error!(product = %product_id, "failed to record outcome: {detail}");
                    report.failed += 1;
                }
                // The task panicked. Downgrade to a generic failure outcome
                // so the attempt still shows up in history.
                Err(join_error) => {
                    warn!(product = %product_id, "product check aborted: {join_error}");
                    let outcome = FetchOutcome::failure(
                        &product_id,
                        Utc::now(),
                        FailureKind::Network,
                        format!("unexpected error: {join_error}"),
                    );
                    if let Err(e) = self.db.record(&outcome).await {
                        error!(product = %product_id, "failed to record outcome: {e}");
                    }
                    report.failed += 1;
                }
            }
        }

        Ok(report)
    }

    /// Full fetch → extract → record sequence for one product. Returns
    /// whether the recorded outcome was a success, or the storage error
    /// detail when the record itself could not be written.
    async fn check_and_record(
        db: &Database,
        pipeline: &FetchPipeline,
        product: &Product,
    ) -> std::result::Result<bool, String> {
        let result = pipeline.check(product).await;

        // Adopt the page title as display name while the name is still the
        // registration placeholder.
        if let Some(title) = &result.page_title {
            if product.name_is_placeholder() {
                if let Err(e) = db.rename_product(&product.id, title).await {
                    warn!(product = %product.id, "failed to adopt page title: {e}");
                }
            }
        }

        db.record(&result.outcome)
            .await
            .map_err(|e| e.to_string())?;
        Ok(result.outcome.is_success())
    }
}
