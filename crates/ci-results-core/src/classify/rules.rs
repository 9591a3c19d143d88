//! Single-valued classification fields (platform, modifier, test type).
//!
//! Each field is decided by the first matching pattern of an ordered list, so
//! more specific patterns must come before generic ones.

use super::variants::identify_variants;
use super::Classifier;
use crate::model::JobClassification;
use regex::Regex;

struct RegexTagger {
    tag: &'static str,
    pattern: Regex,
}

impl RegexTagger {
    fn new(tag: &'static str, pattern: &str) -> Self {
        Self {
            tag,
            pattern: Regex::new(pattern).unwrap(),
        }
    }
}

fn join_patterns(taggers: &[RegexTagger]) -> String {
    if taggers.is_empty() {
        return String::new();
    }
    let alternatives: Vec<&str> = taggers.iter().map(|t| t.pattern.as_str()).collect();
    format!("(?:{})", alternatives.join("|"))
}

fn first_match<'a>(job_name: &str, taggers: &'a [RegexTagger], fallback: &'a str) -> &'a str {
    taggers
        .iter()
        .find(|t| t.pattern.is_match(job_name))
        .map(|t| t.tag)
        .unwrap_or(fallback)
}

/// Pattern-based classifier for OpenShift release job names.
pub struct RuleClassifier {
    platforms: Vec<RegexTagger>,
    modifiers: Vec<RegexTagger>,
    test_types: Vec<RegexTagger>,
}

impl Default for RuleClassifier {
    fn default() -> Self {
        Self::new()
    }
}

impl RuleClassifier {
    pub fn new() -> Self {
        let platforms = vec![
            RegexTagger::new("aws-upi", "-aws-upi"),
            RegexTagger::new("azure", "-azure"),
            RegexTagger::new("gcp", "-gcp"),
            RegexTagger::new("metal-assisted", "-metal-assisted"),
            RegexTagger::new("metal-ipi", "-metal-ipi"),
            RegexTagger::new("openstack", "-openstack"),
            RegexTagger::new("ovirt", "-ovirt"),
            RegexTagger::new("libvirt-ppc64le", "-libvirt-ppc64le"),
            RegexTagger::new("libvirt-s390x", "-libvirt-s390x"),
            RegexTagger::new("vsphere-upi", "-vsphere-upi"),
            // generic platforms after the specific ones
            RegexTagger::new("aws", "-aws"),
            RegexTagger::new("metal", "-metal"),
            RegexTagger::new("vsphere", "-vsphere"),
        ];

        let modifiers = vec![
            RegexTagger::new("calico", "-calico"),
            RegexTagger::new("canary", "-canary"),
            RegexTagger::new("cilium", "-cilium"),
            RegexTagger::new("compact", "-compact"),
            RegexTagger::new("disruptive", "-disruptive"),
            RegexTagger::new("fips", "-fips"),
            RegexTagger::new("mirrors", "-mirrors"),
            RegexTagger::new("ovn", "-ovn"),
            RegexTagger::new("proxy", "-proxy"),
            RegexTagger::new("rt", "-rt"),
            RegexTagger::new("sdn-multitenant", "-sdn-multitenant"),
            RegexTagger::new("shared-vpc", "-shared-vpc"),
            RegexTagger::new("single-node", "-single-node"),
        ];

        let parallel = format!(
            "{}{}?(?:-4.[0-9]+)?$",
            join_patterns(&platforms),
            join_patterns(&modifiers)
        );

        let test_types = vec![
            RegexTagger::new("promote", "^promote-"),
            RegexTagger::new("conformance-serial", "-serial"),
            RegexTagger::new("other", "-arcconformance"),
            RegexTagger::new("other", "-cert-rotation"),
            RegexTagger::new("other", "-cluster-logging-operator"),
            RegexTagger::new("other", "-console"),
            RegexTagger::new("other", "-csi"),
            RegexTagger::new("other", "-elasticsearch-operator"),
            RegexTagger::new("other", "-image-ecosystem"),
            RegexTagger::new("other", "-jenkins-e2e"),
            RegexTagger::new("upgrade-conformance-from-stable", "-upgrade-from-stable"),
            RegexTagger::new("upgrade-conformance", "-upgrade"),
            RegexTagger::new("conformance-parallel", &parallel),
        ];

        Self {
            platforms,
            modifiers,
            test_types,
        }
    }

    pub fn platform(&self, job_name: &str) -> &str {
        first_match(job_name, &self.platforms, "unknown")
    }

    pub fn modifier(&self, job_name: &str) -> &str {
        first_match(job_name, &self.modifiers, "none")
    }

    pub fn test_type(&self, job_name: &str) -> &str {
        first_match(job_name, &self.test_types, "other")
    }
}

impl Classifier for RuleClassifier {
    fn classify(&self, job_name: &str) -> JobClassification {
        JobClassification {
            platform: self.platform(job_name).to_string(),
            modifier: self.modifier(job_name).to_string(),
            test_type: self.test_type(job_name).to_string(),
            tags: identify_variants(job_name).into_iter().collect(),
        }
    }
}
