use crate::classify::{CiConfigSettings, JobLabeler, JobTagSource, RuleClassifier};
use crate::errors::ConfigError;
use crate::ingest::IngestConfig;
use crate::source::testgrid::DEFAULT_BASE_URL;
use crate::storage::CacheConfig;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

pub const SUPPORTED_CONFIG_VERSION: u32 = 1;

/// Indexer settings. Every field has a default, so an empty file (or no file
/// at all) indexes the stock OpenShift release dashboards.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct IndexerConfig {
    #[serde(rename = "configVersion")]
    pub config_version: u32,
    pub dashboards: Vec<String>,
    /// Substrings of a dashboard name that become tags of its jobs.
    pub release_tags: Vec<String>,
    /// Jobs tagged `never-stable`.
    pub never_stable: Vec<String>,
    pub testgrid_url: String,
    pub ci_config: CiConfigSettings,
    pub fetch_workers: usize,
    pub jobs_queue: usize,
    pub builds_queue: usize,
    pub cache: CacheConfig,
    pub deadline_secs: Option<u64>,
}

impl Default for IndexerConfig {
    fn default() -> Self {
        let ingest = IngestConfig::default();
        Self {
            config_version: SUPPORTED_CONFIG_VERSION,
            dashboards: [
                "redhat-openshift-ocp-release-4.8-blocking",
                "redhat-openshift-ocp-release-4.8-informing",
                "redhat-openshift-ocp-release-4.9-blocking",
                "redhat-openshift-ocp-release-4.9-informing",
            ]
            .into_iter()
            .map(String::from)
            .collect(),
            release_tags: vec!["4.8".into(), "4.9".into()],
            never_stable: DEFAULT_NEVER_STABLE.iter().map(|s| s.to_string()).collect(),
            testgrid_url: DEFAULT_BASE_URL.to_string(),
            ci_config: CiConfigSettings::default(),
            fetch_workers: ingest.fetch_workers,
            jobs_queue: ingest.jobs_queue,
            builds_queue: ingest.builds_queue,
            cache: CacheConfig::default(),
            deadline_secs: None,
        }
    }
}

impl IndexerConfig {
    pub fn ingest_config(&self) -> IngestConfig {
        IngestConfig {
            dashboards: self.dashboards.clone(),
            fetch_workers: self.fetch_workers,
            jobs_queue: self.jobs_queue,
            builds_queue: self.builds_queue,
            deadline: self.deadline_secs.map(Duration::from_secs),
        }
    }

    pub fn labeler(&self, tag_source: Option<Arc<dyn JobTagSource>>) -> JobLabeler {
        let mut labeler = JobLabeler::new(Arc::new(RuleClassifier::new()))
            .with_release_tags(self.release_tags.iter().cloned())
            .with_never_stable(self.never_stable.iter().cloned());
        if let Some(source) = tag_source {
            labeler = labeler.with_tag_source(source);
        }
        labeler
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.config_version != SUPPORTED_CONFIG_VERSION {
            return Err(ConfigError(format!(
                "unsupported config version {} (supported: {})",
                self.config_version, SUPPORTED_CONFIG_VERSION
            )));
        }
        if self.dashboards.is_empty() {
            return Err(ConfigError("config has no dashboards".into()));
        }
        if self.fetch_workers == 0 {
            return Err(ConfigError("fetch_workers must be at least 1".into()));
        }
        if self.jobs_queue == 0 || self.builds_queue == 0 {
            return Err(ConfigError("queue capacities must be at least 1".into()));
        }
        Ok(())
    }
}

pub fn load_config(path: &Path) -> Result<IndexerConfig, ConfigError> {
    let raw = std::fs::read_to_string(path)
        .map_err(|e| ConfigError(format!("failed to read config {}: {}", path.display(), e)))?;
    parse_config(&raw).map_err(|e| ConfigError(format!("{} (file: {})", e, path.display())))
}

pub fn parse_config(raw: &str) -> Result<IndexerConfig, ConfigError> {
    // an empty document means "all defaults"
    if raw.trim().is_empty() {
        return Ok(IndexerConfig::default());
    }

    let mut ignored_keys = Vec::new();
    let deserializer = serde_yaml::Deserializer::from_str(raw);
    let cfg: IndexerConfig = serde_ignored::deserialize(deserializer, |path| {
        ignored_keys.push(path.to_string());
    })
    .map_err(|e| ConfigError(format!("failed to parse YAML: {}", e)))?;

    if !ignored_keys.is_empty() {
        tracing::warn!(event = "config_unknown_fields", fields = ?ignored_keys);
    }

    cfg.validate()?;
    Ok(cfg)
}

const DEFAULT_NEVER_STABLE: &[&str] = &[
    "periodic-ci-openshift-release-master-ci-4.9-upgrade-from-stable-4.8-e2e-aws-ovn-upgrade",
    "periodic-ci-openshift-release-master-ci-4.9-upgrade-from-stable-4.8-e2e-aws-upgrade",
    "periodic-ci-openshift-release-master-ci-4.9-upgrade-from-stable-4.8-e2e-azure-ovn-upgrade",
    "periodic-ci-openshift-release-master-ci-4.9-upgrade-from-stable-4.8-e2e-gcp-ovn-upgrade",
    "periodic-ci-openshift-release-master-ci-4.9-upgrade-from-stable-4.8-e2e-ovirt-upgrade",
    "periodic-ci-openshift-release-master-nightly-4.9-e2e-aws-csi-migration",
    "periodic-ci-openshift-release-master-nightly-4.9-e2e-aws-proxy",
    "periodic-ci-openshift-release-master-nightly-4.9-e2e-aws-upgrade",
    "periodic-ci-openshift-release-master-nightly-4.9-e2e-aws-workers-rhel7",
    "periodic-ci-openshift-release-master-nightly-4.9-e2e-compact-remote-libvirt-ppc64le",
    "periodic-ci-openshift-release-master-nightly-4.9-e2e-compact-remote-libvirt-s390x",
    "periodic-ci-openshift-release-master-nightly-4.9-e2e-gcp-rt",
    "periodic-ci-openshift-release-master-nightly-4.9-e2e-metal-ipi",
    "periodic-ci-openshift-release-master-nightly-4.9-e2e-metal-ipi-ovn-dualstack",
    "periodic-ci-openshift-release-master-nightly-4.9-e2e-metal-ipi-ovn-ipv6",
    "periodic-ci-openshift-release-master-nightly-4.9-e2e-metal-ipi-upgrade",
    "periodic-ci-openshift-release-master-nightly-4.9-e2e-remote-libvirt-ppc64le",
    "periodic-ci-openshift-release-master-nightly-4.9-e2e-remote-libvirt-s390x",
    "periodic-ci-openshift-release-master-nightly-4.9-openshift-ipi-azure-arcconformance",
    "periodic-ci-openshift-release-master-nightly-4.9-upgrade-from-stable-4.8-e2e-aws-upgrade",
    "periodic-ci-openshift-release-master-nightly-4.9-upgrade-from-stable-4.8-e2e-metal-ipi-upgrade",
    "release-openshift-ocp-installer-e2e-aws-upi-4.9",
    "release-openshift-ocp-installer-e2e-azure-ovn-4.9",
    "release-openshift-ocp-installer-e2e-gcp-ovn-4.9",
    "release-openshift-ocp-osd-aws-nightly-4.9",
    "release-openshift-ocp-osd-gcp-nightly-4.9",
    "release-openshift-origin-installer-e2e-aws-sdn-network-stress-4.9",
];
