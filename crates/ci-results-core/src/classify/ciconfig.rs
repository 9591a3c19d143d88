//! Tags derived from the CI step-registry configuration of periodic jobs.
//!
//! The CI config service resolves `org/repo/branch[/variant]` into the list of
//! tests it defines; each test becomes a periodic job whose steps tell us the
//! cluster profile and which e2e suite runs.

use super::JobTagSource;
use anyhow::Context;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

pub const DEFAULT_CONFIG_URL: &str = "https://config.ci.openshift.org/config";

pub const NO_STEPS_TAG: &str = "x-no-steps";

#[derive(Debug, Clone, Default, Deserialize)]
pub struct StepEnv {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub default: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Step {
    #[serde(default, rename = "as")]
    pub as_name: String,
    #[serde(default)]
    pub from: String,
    #[serde(default)]
    pub env: Vec<StepEnv>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct LiteralSteps {
    #[serde(default)]
    pub cluster_profile: String,
    #[serde(default)]
    pub pre: Vec<Step>,
    #[serde(default)]
    pub test: Vec<Step>,
    #[serde(default)]
    pub post: Vec<Step>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct CiTest {
    #[serde(default, rename = "as")]
    pub as_name: String,
    #[serde(default)]
    pub cron: String,
    #[serde(default)]
    pub literal_steps: LiteralSteps,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct GeneratedMetadata {
    #[serde(default)]
    pub org: String,
    #[serde(default)]
    pub repo: String,
    #[serde(default)]
    pub branch: String,
    #[serde(default)]
    pub variant: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct CiConfig {
    #[serde(default)]
    pub zz_generated_metadata: GeneratedMetadata,
    #[serde(default)]
    pub tests: Vec<CiTest>,
}

/// Downloads the resolved CI config for one `org/repo/branch[/variant]`.
pub async fn download_config(
    client: &reqwest::Client,
    base_url: &str,
    org: &str,
    repo: &str,
    branch: &str,
    variant: &str,
) -> anyhow::Result<CiConfig> {
    let mut query = vec![("org", org), ("repo", repo), ("branch", branch)];
    if !variant.is_empty() {
        query.push(("variant", variant));
    }

    tracing::debug!(event = "ci_config_download", org, repo, branch, variant);
    let resp = client
        .get(base_url)
        .query(&query)
        .send()
        .await
        .context("failed to make request to configresolver")?;

    let status = resp.status();
    if !status.is_success() {
        anyhow::bail!("got unexpected http response from configresolver: {}", status);
    }

    resp.json::<CiConfig>()
        .await
        .with_context(|| format!("failed to decode ci config for {org}/{repo}@{branch} {variant}"))
}

fn env_default<'a>(envs: &'a [StepEnv], key: &str) -> &'a str {
    envs.iter()
        .find(|e| e.name == key)
        .map(|e| e.default.as_str())
        .unwrap_or("")
}

/// Tags for one CI test definition.
pub fn test_tags(test: &CiTest) -> Vec<String> {
    let mut tags = vec![format!("x-platform-{}", test.literal_steps.cluster_profile)];
    let mut found_test = false;

    for step in &test.literal_steps.test {
        if !matches!(
            step.as_name.as_str(),
            "openshift-e2e-test" | "openshift-e2e-libvirt-test" | "baremetalds-e2e-test"
        ) {
            continue;
        }

        let kind = match env_default(&step.env, "TEST_TYPE") {
            "suite" | "conformance-serial" | "conformance-parallel" => {
                let suite = match env_default(&step.env, "TEST_SUITE") {
                    "openshift/conformance/parallel" => "parallel",
                    "openshift/conformance/serial" => "serial",
                    "openshift/csi" => "csi",
                    "experimental/reliability/minimal" => "canary",
                    _ => "unknown",
                };
                format!("suite-{suite}")
            }
            "upgrade-conformance" => "upgrade-conformance".to_string(),
            "upgrade" => "upgrade-only".to_string(),
            "image-ecosystem" => "image-ecosystem".to_string(),
            "jenkins-e2e-rhel-only" => "jenkins-e2e-rhel-only".to_string(),
            _ => "unknown".to_string(),
        };
        tags.push(format!("x-test-openshift-e2e-{kind}"));
        found_test = true;
    }

    if !found_test {
        tags.push("x-test-unknown".to_string());
    }
    tags
}

/// Maps periodic job names to the tags of the CI test that defines them.
#[derive(Debug, Default)]
pub struct CiConfigTagger {
    jobs: HashMap<String, Vec<String>>,
}

impl CiConfigTagger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_config(&mut self, cfg: &CiConfig) {
        let meta = &cfg.zz_generated_metadata;
        let mut prefix = format!("periodic-ci-{}-{}-{}-", meta.org, meta.repo, meta.branch);
        if !meta.variant.is_empty() {
            prefix.push_str(&meta.variant);
            prefix.push('-');
        }

        for test in &cfg.tests {
            self.jobs
                .insert(format!("{prefix}{}", test.as_name), test_tags(test));
        }
    }

    pub fn len(&self) -> usize {
        self.jobs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.jobs.is_empty()
    }
}

/// Where to fetch CI configs from, and which variants of the release repo to
/// load.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CiConfigSettings {
    pub base_url: String,
    pub org: String,
    pub repo: String,
    pub branch: String,
    pub variants: Vec<String>,
}

impl Default for CiConfigSettings {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_CONFIG_URL.to_string(),
            org: "openshift".into(),
            repo: "release".into(),
            branch: "master".into(),
            variants: [
                "ci-4.8",
                "ci-4.8-upgrade-from-stable-4.7",
                "ci-4.8-upgrade-from-from-stable-4.7-from-stable-4.6",
                "nightly-4.8",
                "nightly-4.8-upgrade-from-stable-4.7",
                "ci-4.9",
                "ci-4.9-upgrade-from-stable-4.8",
                "ci-4.9-upgrade-from-stable-4.8-from-stable-4.7",
                "nightly-4.9",
                "nightly-4.9-upgrade-from-stable-4.8",
                "nightly-4.9-upgrade-from-stable-4.7",
            ]
            .into_iter()
            .map(String::from)
            .collect(),
        }
    }
}

impl CiConfigTagger {
    /// Downloads every configured variant. Any failed download fails the
    /// whole load.
    pub async fn download(
        client: &reqwest::Client,
        settings: &CiConfigSettings,
    ) -> anyhow::Result<Self> {
        let mut tagger = Self::new();
        for variant in &settings.variants {
            let cfg = download_config(
                client,
                &settings.base_url,
                &settings.org,
                &settings.repo,
                &settings.branch,
                variant,
            )
            .await?;
            tagger.add_config(&cfg);
        }
        tracing::info!(
            event = "ci_config_loaded",
            variants = settings.variants.len(),
            jobs = tagger.len()
        );
        Ok(tagger)
    }
}

impl JobTagSource for CiConfigTagger {
    fn tags(&self, job_name: &str) -> Vec<String> {
        match self.jobs.get(job_name) {
            Some(tags) if !tags.is_empty() => tags.clone(),
            _ => vec![NO_STEPS_TAG.to_string()],
        }
    }
}
