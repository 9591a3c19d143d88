//! Variant tags derived from a job name.
//!
//! Variants are the freeform labels users filter and group by. A job can carry
//! several at once (`aws`, `upgrade`, `ovn`, ...).

use regex::Regex;
use std::sync::OnceLock;

struct VariantPatterns {
    aws: Regex,
    azure: Regex,
    fips: Regex,
    metal: Regex,
    metal_assisted: Regex,
    metal_ipi: Regex,
    gcp: Regex,
    openstack: Regex,
    osd: Regex,
    ovirt: Regex,
    ovn: Regex,
    proxy: Regex,
    promote: Regex,
    ppc64le: Regex,
    rt: Regex,
    s390x: Regex,
    serial: Regex,
    upgrade: Regex,
    vsphere: Regex,
    vsphere_upi: Regex,
}

fn patterns() -> &'static VariantPatterns {
    static PATTERNS: OnceLock<VariantPatterns> = OnceLock::new();
    PATTERNS.get_or_init(|| {
        let re = |p: &str| Regex::new(p).unwrap();
        VariantPatterns {
            aws: re(r"(?i)-aws"),
            azure: re(r"(?i)-azure"),
            fips: re(r"(?i)-fips"),
            metal: re(r"(?i)-metal"),
            metal_assisted: re(r"(?i)-metal-assisted"),
            metal_ipi: re(r"(?i)-metal-ipi"),
            gcp: re(r"(?i)-gcp"),
            openstack: re(r"(?i)-openstack"),
            osd: re(r"(?i)-osd"),
            ovirt: re(r"(?i)-ovirt"),
            ovn: re(r"(?i)-ovn"),
            proxy: re(r"(?i)-proxy"),
            promote: re(r"(?i)^promote-"),
            ppc64le: re(r"(?i)-ppc64le"),
            rt: re(r"(?i)-rt"),
            s390x: re(r"(?i)-s390x"),
            serial: re(r"(?i)-serial"),
            upgrade: re(r"(?i)-upgrade"),
            vsphere: re(r"(?i)-vsphere"),
            vsphere_upi: re(r"(?i)-vsphere-upi"),
        }
    })
}

pub const UNKNOWN_VARIANT: &str = "unknown-variant";

/// Returns the variant tags for `job_name`, in a stable order.
pub fn identify_variants(job_name: &str) -> Vec<String> {
    let p = patterns();

    // a promotion job belongs to no other variant
    if p.promote.is_match(job_name) {
        return vec!["promote".to_string()];
    }

    let mut variants: Vec<&str> = Vec::new();
    let mut tag = |re: &Regex, name: &'static str| {
        if re.is_match(job_name) {
            variants.push(name);
        }
    };

    tag(&p.aws, "aws");
    tag(&p.azure, "azure");
    tag(&p.gcp, "gcp");
    tag(&p.openstack, "openstack");
    tag(&p.osd, "osd");

    if p.metal_assisted.is_match(job_name) {
        variants.push("metal-assisted");
    } else if p.metal_ipi.is_match(job_name) {
        variants.push("metal-ipi");
    } else if p.metal.is_match(job_name) {
        variants.push("metal-upi");
    }

    if p.ovirt.is_match(job_name) {
        variants.push("ovirt");
    }
    if p.vsphere_upi.is_match(job_name) {
        variants.push("vsphere-upi");
    } else if p.vsphere.is_match(job_name) {
        variants.push("vsphere-ipi");
    }

    let mut tag = |re: &Regex, name: &'static str| {
        if re.is_match(job_name) {
            variants.push(name);
        }
    };
    tag(&p.upgrade, "upgrade");
    tag(&p.serial, "serial");
    tag(&p.ovn, "ovn");
    tag(&p.fips, "fips");
    tag(&p.ppc64le, "ppc64le");
    tag(&p.s390x, "s390x");
    tag(&p.rt, "realtime");
    tag(&p.proxy, "proxy");

    if variants.is_empty() {
        tracing::debug!(event = "unknown_variant", job = job_name);
        return vec![UNKNOWN_VARIANT.to_string()];
    }

    variants.into_iter().map(String::from).collect()
}
