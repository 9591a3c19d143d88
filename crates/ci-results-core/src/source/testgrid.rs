//! TestGrid HTTP client.
//!
//! Only two endpoints are used: the dashboard summary (job listing) and the
//! per-job table. Table statuses are run-length encoded.

use super::{JobResults, ResultSource};
use crate::model::TestStatus;
use anyhow::Context;
use async_trait::async_trait;
use serde::Deserialize;
use std::collections::BTreeMap;
use std::time::Duration;

pub const DEFAULT_BASE_URL: &str = "https://testgrid.k8s.io";

#[derive(Debug, Clone, Deserialize)]
pub struct RunLength {
    pub count: usize,
    pub value: TestStatus,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TableTest {
    pub name: String,
    #[serde(default, rename = "original-name")]
    pub original_name: String,
    #[serde(default)]
    pub statuses: Vec<RunLength>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct JobTable {
    #[serde(default)]
    pub query: String,
    #[serde(default)]
    pub changelists: Vec<String>,
    #[serde(default)]
    pub tests: Vec<TableTest>,
    #[serde(default)]
    pub timestamps: Vec<i64>,
}

/// Expands run-length encoded statuses, keeping at most `limit` entries (the
/// length of the changelist axis).
pub fn expand_statuses(runs: &[RunLength], limit: usize) -> anyhow::Result<Vec<TestStatus>> {
    let total = runs
        .iter()
        .try_fold(0usize, |acc, r| acc.checked_add(r.count))
        .context("run-length counts overflow")?;
    let mut out = Vec::with_capacity(total.min(limit));
    for r in runs {
        let room = limit - out.len();
        if room == 0 {
            break;
        }
        out.extend(std::iter::repeat(r.value).take(r.count.min(room)));
    }
    Ok(out)
}

impl TryFrom<JobTable> for JobResults {
    type Error = anyhow::Error;

    fn try_from(table: JobTable) -> anyhow::Result<Self> {
        let limit = table.changelists.len();
        let tests = table
            .tests
            .into_iter()
            .map(|t| {
                let statuses = expand_statuses(&t.statuses, limit)
                    .with_context(|| format!("bad statuses for test {}", t.name))?;
                Ok((t.name, statuses))
            })
            .collect::<anyhow::Result<Vec<_>>>()?;
        Ok(JobResults {
            changelists: table.changelists,
            timestamps: table.timestamps,
            tests,
        })
    }
}

#[derive(Clone)]
pub struct TestGridClient {
    http: reqwest::Client,
    base_url: String,
}

impl TestGridClient {
    pub fn new(base_url: impl Into<String>) -> anyhow::Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(120))
            .build()
            .context("failed to build http client")?;
        Ok(Self::with_client(http, base_url))
    }

    pub fn with_client(http: reqwest::Client, base_url: impl Into<String>) -> Self {
        Self {
            http,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    fn dashboard_url(&self, dashboard: &str, endpoint: &str) -> anyhow::Result<reqwest::Url> {
        let mut url = reqwest::Url::parse(&self.base_url)
            .with_context(|| format!("invalid testgrid url {}", self.base_url))?;
        url.path_segments_mut()
            .map_err(|_| anyhow::anyhow!("testgrid url cannot be a base: {}", self.base_url))?
            .pop_if_empty()
            .push(dashboard)
            .push(endpoint);
        Ok(url)
    }

    async fn get_json<T: serde::de::DeserializeOwned>(&self, url: reqwest::Url) -> anyhow::Result<T> {
        tracing::debug!(event = "testgrid_get", url = %url);
        let resp = self
            .http
            .get(url.clone())
            .send()
            .await
            .with_context(|| format!("request to {url} failed"))?;
        let status = resp.status();
        if !status.is_success() {
            anyhow::bail!("unexpected http response from {}: {}", url, status);
        }
        resp.json::<T>()
            .await
            .with_context(|| format!("failed to decode response from {url}"))
    }
}

#[async_trait]
impl ResultSource for TestGridClient {
    async fn list_jobs(&self, dashboard: &str) -> anyhow::Result<Vec<String>> {
        let url = self.dashboard_url(dashboard, "summary")?;
        let summary: BTreeMap<String, serde_json::Value> = self.get_json(url).await?;
        Ok(summary.into_keys().collect())
    }

    async fn fetch_job(&self, dashboard: &str, job_name: &str) -> anyhow::Result<JobResults> {
        let mut url = self.dashboard_url(dashboard, "table")?;
        url.query_pairs_mut()
            .append_pair("tab", job_name)
            .append_pair("show-stale-tests", "");
        let table: JobTable = self.get_json(url).await?;
        JobResults::try_from(table)
            .with_context(|| format!("malformed table for job {job_name} on {dashboard}"))
    }
}
