//! Three-stage ingestion: discover jobs, fetch and flatten their results,
//! persist everything inside one write transaction.
//!
//! Stages talk through bounded queues. Any stage may record a failure in the
//! shared [`FirstError`] cell; from then on every stage keeps draining its
//! input without doing work, so no producer stays blocked on a full queue, and
//! the persist stage rolls back instead of committing.

use crate::classify::JobLabeler;
use crate::model::{BuildRecord, BuildStatus, DiscoveredJob};
use crate::source::{flatten_job_results, ResultSource};
use crate::storage::{Store, StoreOps};
use serde::Serialize;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, Mutex};

pub mod first_error;
pub mod rate;

pub use first_error::FirstError;
pub use rate::RateCounter;

#[derive(Debug, Clone)]
pub struct IngestConfig {
    pub dashboards: Vec<String>,
    pub fetch_workers: usize,
    pub jobs_queue: usize,
    pub builds_queue: usize,
    /// Abort the run (and roll back) once this much time has passed.
    pub deadline: Option<Duration>,
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            dashboards: Vec::new(),
            fetch_workers: 5,
            jobs_queue: 100,
            builds_queue: 1000,
            deadline: None,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct IngestReport {
    pub jobs: usize,
    pub builds_seen: usize,
    pub builds_skipped_running: usize,
    pub builds_persisted: usize,
    pub results_written: usize,
}

pub struct Indexer {
    /// Held in a write transaction for the whole run. Clones of this store
    /// share its connection and block until the run ends; readers that must
    /// keep serving committed data open their own [`Store`] on the same file.
    pub store: Store,
    pub source: Arc<dyn ResultSource>,
    pub labeler: Arc<JobLabeler>,
    pub config: IngestConfig,
}

impl Indexer {
    pub async fn run(&self) -> anyhow::Result<IngestReport> {
        let errors = FirstError::new();
        let rate = Arc::new(RateCounter::per_second());
        let jobs_found = Arc::new(AtomicUsize::new(0));

        let (jobs_tx, jobs_rx) = mpsc::channel::<DiscoveredJob>(self.config.jobs_queue.max(1));
        let (builds_tx, builds_rx) = mpsc::channel::<BuildRecord>(self.config.builds_queue.max(1));

        tracing::info!(
            event = "ingest_started",
            dashboards = self.config.dashboards.len(),
            fetch_workers = self.config.fetch_workers.max(1)
        );

        let discover = tokio::spawn(discover_stage(
            self.source.clone(),
            self.config.dashboards.clone(),
            jobs_tx,
            errors.clone(),
            jobs_found.clone(),
        ));

        let jobs_rx = Arc::new(Mutex::new(jobs_rx));
        let mut fetchers = Vec::new();
        for worker in 0..self.config.fetch_workers.max(1) {
            fetchers.push(tokio::spawn(fetch_stage(
                worker,
                self.source.clone(),
                jobs_rx.clone(),
                builds_tx.clone(),
                errors.clone(),
            )));
        }
        // the builds queue closes once every fetcher has exited
        drop(builds_tx);

        let persist = {
            let store = self.store.clone();
            let labeler = self.labeler.clone();
            let errors = errors.clone();
            let rate = rate.clone();
            tokio::task::spawn_blocking(move || persist_stage(&store, &labeler, builds_rx, &errors, &rate))
        };

        let rate_logger = {
            let rate = rate.clone();
            tokio::spawn(async move {
                let mut tick = tokio::time::interval(Duration::from_secs(1));
                tick.tick().await;
                loop {
                    tick.tick().await;
                    tracing::info!(event = "insert_rate", rows_per_sec = rate.rate());
                }
            })
        };

        let deadline = self.config.deadline.map(|limit| {
            let errors = errors.clone();
            tokio::spawn(async move {
                tokio::time::sleep(limit).await;
                errors.record(anyhow::anyhow!("deadline exceeded after {:?}", limit));
            })
        });

        if let Err(e) = discover.await {
            errors.record(anyhow::anyhow!("discover task failed: {e}"));
        }
        for f in fetchers {
            if let Err(e) = f.await {
                errors.record(anyhow::anyhow!("fetch task failed: {e}"));
            }
        }
        let (report, committed) = match persist.await {
            Ok(done) => done,
            Err(e) => {
                errors.record(anyhow::anyhow!("persist task failed: {e}"));
                (IngestReport::default(), false)
            }
        };

        rate_logger.abort();
        if let Some(d) = deadline {
            d.abort();
        }

        if let Some(err) = errors.take() {
            if !committed {
                return Err(err);
            }
            // only the deadline timer can fire after a successful commit
            tracing::warn!(event = "error_after_commit", error = %format!("{err:#}"));
        }

        let report = IngestReport {
            jobs: jobs_found.load(Ordering::Relaxed),
            ..report
        };
        tracing::info!(
            event = "ingest_finished",
            jobs = report.jobs,
            builds_seen = report.builds_seen,
            builds_skipped_running = report.builds_skipped_running,
            builds_persisted = report.builds_persisted,
            results_written = report.results_written
        );
        Ok(report)
    }
}

async fn discover_stage(
    source: Arc<dyn ResultSource>,
    dashboards: Vec<String>,
    out: mpsc::Sender<DiscoveredJob>,
    errors: FirstError,
    found: Arc<AtomicUsize>,
) {
    for dashboard in dashboards {
        if errors.is_set() {
            break;
        }
        let jobs = match source.list_jobs(&dashboard).await {
            Ok(jobs) => jobs,
            Err(e) => {
                errors.record(e.context(format!("failed to list jobs of dashboard {dashboard}")));
                break;
            }
        };
        tracing::info!(event = "dashboard_listed", dashboard = %dashboard, jobs = jobs.len());

        for name in jobs {
            found.fetch_add(1, Ordering::Relaxed);
            let job = DiscoveredJob {
                dashboard: dashboard.clone(),
                name,
            };
            if out.send(job).await.is_err() {
                return;
            }
        }
    }
}

async fn fetch_stage(
    worker: usize,
    source: Arc<dyn ResultSource>,
    input: Arc<Mutex<mpsc::Receiver<DiscoveredJob>>>,
    out: mpsc::Sender<BuildRecord>,
    errors: FirstError,
) {
    loop {
        let job = {
            let mut rx = input.lock().await;
            rx.recv().await
        };
        let Some(job) = job else {
            break;
        };
        if errors.is_set() {
            continue;
        }

        let results = match source.fetch_job(&job.dashboard, &job.name).await {
            Ok(r) => r,
            Err(e) => {
                errors.record(e.context(format!(
                    "failed to fetch results of job {} on {}",
                    job.name, job.dashboard
                )));
                continue;
            }
        };

        let builds = match flatten_job_results(&job.dashboard, &job.name, &results) {
            Ok(b) => b,
            Err(e) => {
                errors.record(e);
                continue;
            }
        };
        tracing::debug!(event = "job_fetched", worker, job = %job.name, builds = builds.len());
        for build in builds {
            if out.send(build).await.is_err() {
                return;
            }
        }
    }
}

fn persist_stage(
    store: &Store,
    labeler: &JobLabeler,
    mut input: mpsc::Receiver<BuildRecord>,
    errors: &FirstError,
    rate: &RateCounter,
) -> (IngestReport, bool) {
    let mut report = IngestReport::default();

    let txn = match store.begin_write() {
        Ok(txn) => Some(txn),
        Err(e) => {
            errors.record(e);
            None
        }
    };

    while let Some(build) = input.blocking_recv() {
        let Some(txn) = txn.as_ref() else {
            continue;
        };
        if errors.is_set() {
            continue;
        }

        report.builds_seen += 1;
        if build.is_running() {
            report.builds_skipped_running += 1;
            continue;
        }

        match persist_build(&txn.ops(), labeler, &build) {
            Ok(written) => {
                report.builds_persisted += 1;
                report.results_written += written;
                rate.incr(written as u64);
            }
            Err(e) => {
                errors.record(e.context(format!(
                    "failed to store build {} of job {}",
                    build.number, build.job_name
                )));
            }
        }
    }

    let mut committed = false;
    if let Some(txn) = txn {
        if errors.is_set() {
            if let Err(e) = txn.rollback() {
                tracing::error!(event = "rollback_failed", error = %format!("{e:#}"));
            }
        } else {
            match txn.commit() {
                Ok(()) => committed = true,
                Err(e) => {
                    errors.record(e);
                }
            }
        }
    }
    (report, committed)
}

/// Writes one completed build. Returns the number of new result rows.
pub fn persist_build(
    ops: &StoreOps<'_>,
    labeler: &JobLabeler,
    build: &BuildRecord,
) -> anyhow::Result<usize> {
    let status = BuildStatus::from_tests(&build.tests);
    let job_id = ops.resolve_job(&build.job_name, &build.job_dashboard, || {
        labeler.label(&build.job_dashboard, &build.job_name)
    })?;
    let build_id = ops.upsert_build(job_id, &build.number, build.timestamp, status)?;

    let mut written = 0;
    for (name, status) in &build.tests {
        let test_id = ops.upsert_test(name)?;
        if ops.upsert_test_result(build_id, test_id, *status)? {
            written += 1;
        }
    }
    Ok(written)
}
