//! Job classification.
//!
//! A job is labelled exactly once, when the store first sees it. The
//! [`JobLabeler`] combines the name-based [`Classifier`] with any number of
//! external [`JobTagSource`]s and dashboard-derived release tags.

use crate::model::JobClassification;
use std::collections::HashSet;
use std::sync::Arc;

pub mod ciconfig;
pub mod rules;
pub mod variants;

pub use ciconfig::{CiConfigSettings, CiConfigTagger};
pub use rules::RuleClassifier;

pub const NEVER_STABLE_TAG: &str = "never-stable";

/// Pure function of the job name: no state, no I/O.
pub trait Classifier: Send + Sync {
    fn classify(&self, job_name: &str) -> JobClassification;
}

/// Additional per-job tags from a source other than the job name itself.
pub trait JobTagSource: Send + Sync {
    fn tags(&self, job_name: &str) -> Vec<String>;
}

pub struct JobLabeler {
    classifier: Arc<dyn Classifier>,
    tag_sources: Vec<Arc<dyn JobTagSource>>,
    release_tags: Vec<String>,
    never_stable: HashSet<String>,
}

impl JobLabeler {
    pub fn new(classifier: Arc<dyn Classifier>) -> Self {
        Self {
            classifier,
            tag_sources: Vec::new(),
            release_tags: Vec::new(),
            never_stable: HashSet::new(),
        }
    }

    pub fn with_tag_source(mut self, source: Arc<dyn JobTagSource>) -> Self {
        self.tag_sources.push(source);
        self
    }

    /// Dashboards whose name contains `marker` tag their jobs with `marker`.
    pub fn with_release_tags<I, S>(mut self, markers: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.release_tags.extend(markers.into_iter().map(Into::into));
        self
    }

    pub fn with_never_stable<I, S>(mut self, jobs: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.never_stable.extend(jobs.into_iter().map(Into::into));
        self
    }

    pub fn label(&self, dashboard: &str, job_name: &str) -> JobClassification {
        let mut cls = self.classifier.classify(job_name);
        for source in &self.tag_sources {
            cls.tags.extend(source.tags(job_name));
        }
        for marker in &self.release_tags {
            if dashboard.contains(marker.as_str()) {
                cls.tags.insert(marker.clone());
            }
        }
        if self.never_stable.contains(job_name) {
            cls.tags.insert(NEVER_STABLE_TAG.to_string());
        }
        cls
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Fixed(Vec<&'static str>);

    impl JobTagSource for Fixed {
        fn tags(&self, _job_name: &str) -> Vec<String> {
            self.0.iter().map(|s| s.to_string()).collect()
        }
    }

    #[test]
    fn labeler_merges_all_sources_as_a_set() {
        let labeler = JobLabeler::new(Arc::new(RuleClassifier::new()))
            .with_tag_source(Arc::new(Fixed(vec!["x-no-steps", "aws"])))
            .with_release_tags(["4.8", "4.9"])
            .with_never_stable(["release-openshift-ocp-installer-e2e-aws-upi-4.9"]);

        let cls = labeler.label(
            "redhat-openshift-ocp-release-4.9-informing",
            "release-openshift-ocp-installer-e2e-aws-upi-4.9",
        );

        let tags: Vec<&str> = cls.tags.iter().map(String::as_str).collect();
        assert_eq!(tags, vec!["4.9", "aws", "never-stable", "x-no-steps"]);
        assert_eq!(cls.platform, "aws-upi");
    }
}
