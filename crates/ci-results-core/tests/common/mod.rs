#![allow(dead_code)]

use async_trait::async_trait;
use ci_results_core::classify::{Classifier, JobLabeler};
use ci_results_core::model::{BuildRecord, JobClassification, TestStatus};
use ci_results_core::source::{JobResults, ResultSource};
use ci_results_core::storage::Store;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use std::time::Duration;

pub const DAY_MS: i64 = 86_400_000;
pub const NOW_MS: i64 = 1_700_000_000_000;

/// Tags looked up by exact job name; platform is the first tag.
#[derive(Default)]
pub struct StaticTags(pub HashMap<String, Vec<String>>);

impl StaticTags {
    pub fn with(mut self, job: &str, tags: &[&str]) -> Self {
        self.0
            .insert(job.to_string(), tags.iter().map(|t| t.to_string()).collect());
        self
    }
}

impl Classifier for StaticTags {
    fn classify(&self, job_name: &str) -> JobClassification {
        let tags = self.0.get(job_name).cloned().unwrap_or_default();
        JobClassification {
            platform: tags.first().cloned().unwrap_or_else(|| "unknown".into()),
            modifier: "none".into(),
            test_type: "other".into(),
            tags: tags.into_iter().collect(),
        }
    }
}

pub fn labeler(tags: StaticTags) -> Arc<JobLabeler> {
    Arc::new(JobLabeler::new(Arc::new(tags)))
}

#[derive(Default)]
pub struct FakeSource {
    pub dashboards: Vec<(String, Vec<String>)>,
    pub jobs: HashMap<String, JobResults>,
    pub failing_job: Option<String>,
    pub delay: Option<Duration>,
}

impl FakeSource {
    pub fn job(mut self, dashboard: &str, name: &str, results: JobResults) -> Self {
        match self.dashboards.iter_mut().find(|(d, _)| d == dashboard) {
            Some((_, jobs)) => jobs.push(name.to_string()),
            None => self
                .dashboards
                .push((dashboard.to_string(), vec![name.to_string()])),
        }
        self.jobs.insert(name.to_string(), results);
        self
    }

    pub fn dashboard_names(&self) -> Vec<String> {
        self.dashboards.iter().map(|(d, _)| d.clone()).collect()
    }
}

#[async_trait]
impl ResultSource for FakeSource {
    async fn list_jobs(&self, dashboard: &str) -> anyhow::Result<Vec<String>> {
        self.dashboards
            .iter()
            .find(|(d, _)| d == dashboard)
            .map(|(_, jobs)| jobs.clone())
            .ok_or_else(|| anyhow::anyhow!("no such dashboard {dashboard}"))
    }

    async fn fetch_job(&self, _dashboard: &str, job_name: &str) -> anyhow::Result<JobResults> {
        if let Some(d) = self.delay {
            tokio::time::sleep(d).await;
        }
        if self.failing_job.as_deref() == Some(job_name) {
            anyhow::bail!("upstream returned 503 for {job_name}");
        }
        self.jobs
            .get(job_name)
            .cloned()
            .ok_or_else(|| anyhow::anyhow!("no such job {job_name}"))
    }
}

/// `builds` builds numbered from 1, newest first, one hour apart, every test
/// reporting `status`.
pub fn uniform_results(builds: usize, newest_ts: i64, tests: &[(&str, TestStatus)]) -> JobResults {
    let changelists: Vec<String> = (0..builds).map(|i| (builds - i).to_string()).collect();
    let timestamps = (0..builds).map(|i| newest_ts - i as i64 * 3_600_000).collect();
    JobResults {
        changelists,
        timestamps,
        tests: tests
            .iter()
            .map(|(name, status)| (name.to_string(), vec![*status; builds]))
            .collect(),
    }
}

pub fn build(job: &str, number: &str, ts: i64, tests: &[(&str, TestStatus)]) -> BuildRecord {
    BuildRecord {
        job_dashboard: "dash".into(),
        job_name: job.into(),
        number: number.into(),
        timestamp: ts,
        tests: tests
            .iter()
            .map(|(n, s)| (n.to_string(), *s))
            .collect::<BTreeMap<_, _>>(),
    }
}

pub fn memory_store() -> Store {
    let store = Store::memory().unwrap();
    store.init_schema().unwrap();
    store
}

/// Persists `builds` in one committed transaction.
pub fn seed(store: &Store, labeler: &JobLabeler, builds: &[BuildRecord]) {
    let txn = store.begin_write().unwrap();
    for b in builds {
        ci_results_core::ingest::persist_build(&txn.ops(), labeler, b).unwrap();
    }
    txn.commit().unwrap();
}
