use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// Name of the synthetic test whose status is the verdict of a whole build.
pub const OVERALL_TEST: &str = "Overall";

/// Per-test status as reported by the result source.
///
/// Codes follow the TestGrid `test_status` enumeration. Values outside the
/// known set are preserved as `Other` so they can be stored verbatim and
/// reported as unexpected at aggregation time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "i32", into = "i32")]
pub enum TestStatus {
    NoResult,
    Pass,
    PassWithSkips,
    Running,
    Fail,
    Flaky,
    Other(i32),
}

impl TestStatus {
    pub fn code(self) -> i32 {
        match self {
            TestStatus::NoResult => 0,
            TestStatus::Pass => 1,
            TestStatus::PassWithSkips => 3,
            TestStatus::Running => 4,
            TestStatus::Fail => 12,
            TestStatus::Flaky => 13,
            TestStatus::Other(code) => code,
        }
    }

    pub fn from_code(code: i32) -> Self {
        match code {
            0 => TestStatus::NoResult,
            1 => TestStatus::Pass,
            3 => TestStatus::PassWithSkips,
            4 => TestStatus::Running,
            12 => TestStatus::Fail,
            13 => TestStatus::Flaky,
            other => TestStatus::Other(other),
        }
    }

    /// Pass-rate bucket for a per-test status. `None` for statuses that do not
    /// count towards pass rates.
    pub fn outcome(self) -> Option<Outcome> {
        match self {
            TestStatus::Pass | TestStatus::PassWithSkips => Some(Outcome::Pass),
            TestStatus::Flaky => Some(Outcome::Flake),
            TestStatus::Fail => Some(Outcome::Fail),
            _ => None,
        }
    }
}

impl From<i32> for TestStatus {
    fn from(code: i32) -> Self {
        TestStatus::from_code(code)
    }
}

impl From<TestStatus> for i32 {
    fn from(s: TestStatus) -> Self {
        s.code()
    }
}

/// Build-level verdict, derived from the `Overall` test.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BuildStatus {
    Success,
    Failure,
}

impl BuildStatus {
    pub fn code(self) -> i32 {
        match self {
            BuildStatus::Success => 1,
            BuildStatus::Failure => 2,
        }
    }

    /// Pass-rate bucket for a stored build status code.
    pub fn outcome_of(code: i32) -> Option<Outcome> {
        match code {
            1 => Some(Outcome::Pass),
            2 => Some(Outcome::Fail),
            _ => None,
        }
    }

    /// A build fails only when its `Overall` test failed.
    pub fn from_tests(tests: &BTreeMap<String, TestStatus>) -> Self {
        match tests.get(OVERALL_TEST) {
            Some(TestStatus::Fail) => BuildStatus::Failure,
            _ => BuildStatus::Success,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Pass,
    Flake,
    Fail,
}

/// Write-once metadata computed for a job the first time it is seen.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobClassification {
    pub platform: String,
    pub modifier: String,
    pub test_type: String,
    pub tags: BTreeSet<String>,
}

/// A job discovered on a dashboard.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiscoveredJob {
    pub dashboard: String,
    pub name: String,
}

/// One build of one job, flattened out of the source's columnar layout.
#[derive(Debug, Clone, PartialEq)]
pub struct BuildRecord {
    pub job_dashboard: String,
    pub job_name: String,
    pub number: String,
    /// Milliseconds since the Unix epoch.
    pub timestamp: i64,
    pub tests: BTreeMap<String, TestStatus>,
}

impl BuildRecord {
    pub fn is_running(&self) -> bool {
        self.tests.values().any(|s| *s == TestStatus::Running)
    }
}
