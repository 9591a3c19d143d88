//! Remote test-results provider.

use crate::model::{BuildRecord, TestStatus};
use async_trait::async_trait;
use std::collections::BTreeMap;

pub mod testgrid;

pub use testgrid::TestGridClient;

/// Results of one job in the provider's columnar layout: every test carries a
/// status array aligned to the shared `changelists`/`timestamps` axis.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct JobResults {
    pub changelists: Vec<String>,
    /// Milliseconds since the Unix epoch, one per changelist.
    pub timestamps: Vec<i64>,
    pub tests: Vec<(String, Vec<TestStatus>)>,
}

#[async_trait]
pub trait ResultSource: Send + Sync {
    /// Names of the jobs listed on `dashboard`.
    async fn list_jobs(&self, dashboard: &str) -> anyhow::Result<Vec<String>>;

    async fn fetch_job(&self, dashboard: &str, job_name: &str) -> anyhow::Result<JobResults>;
}

/// Turns columnar results into one record per changelist index. A test whose
/// status at that index is no-result is left out of that build.
///
/// Every changelist needs a timestamp: builds are immutable once stored, so a
/// short timestamp axis fails the job instead of storing a made-up time.
pub fn flatten_job_results(
    dashboard: &str,
    job_name: &str,
    results: &JobResults,
) -> anyhow::Result<Vec<BuildRecord>> {
    if results.timestamps.len() < results.changelists.len() {
        anyhow::bail!(
            "job {job_name} on {dashboard} has {} changelists but only {} timestamps",
            results.changelists.len(),
            results.timestamps.len()
        );
    }
    let builds = results
        .changelists
        .iter()
        .enumerate()
        .map(|(i, number)| {
            let mut tests = BTreeMap::new();
            for (name, statuses) in &results.tests {
                let status = statuses.get(i).copied().unwrap_or(TestStatus::NoResult);
                if status != TestStatus::NoResult {
                    tests.insert(name.clone(), status);
                }
            }
            BuildRecord {
                job_dashboard: dashboard.to_string(),
                job_name: job_name.to_string(),
                number: number.clone(),
                timestamp: results.timestamps[i],
                tests,
            }
        })
        .collect();
    Ok(builds)
}
