//! Pass-rate aggregation.
//!
//! A [`StatsRequest`] is turned into a single grouped query: one output column
//! per group dimension, the status column, and one `SUM` per window. Rows are
//! then folded into per-group `{pass, flake, fail}` counts.

use crate::errors::StatsError;
use crate::model::{BuildStatus, Outcome, TestStatus};
use crate::storage::{Store, StoreOps};
use rusqlite::types::Value;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

pub mod filter;
pub mod period;
pub mod query;

pub use filter::TagFilter;
pub use period::{layout_windows, parse_periods, Window};
pub use query::QueryBuilder;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum GroupColumn {
    Tag,
    JobName,
    Dashboard,
    TestName,
    Platform,
    Modifier,
    TestType,
}

impl GroupColumn {
    pub fn parse(name: &str) -> Result<Self, StatsError> {
        match name {
            "sippytags" => Ok(Self::Tag),
            "name" => Ok(Self::JobName),
            "dashboard" => Ok(Self::Dashboard),
            "test" => Ok(Self::TestName),
            "platform" => Ok(Self::Platform),
            "mod" => Ok(Self::Modifier),
            "testtype" => Ok(Self::TestType),
            other => Err(StatsError::UnknownColumn(other.to_string())),
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Tag => "sippytags",
            Self::JobName => "name",
            Self::Dashboard => "dashboard",
            Self::TestName => "test",
            Self::Platform => "platform",
            Self::Modifier => "mod",
            Self::TestType => "testtype",
        }
    }

    fn expr(self) -> &'static str {
        match self {
            Self::Tag => "jst.tag",
            Self::JobName => "j.name",
            Self::Dashboard => "j.dashboard",
            Self::TestName => "t.name",
            Self::Platform => "j.platform",
            Self::Modifier => "j.mod",
            Self::TestType => "j.testtype",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatsRequest {
    pub columns: Vec<GroupColumn>,
    pub filter: TagFilter,
    pub periods: Vec<u32>,
    pub test_name: Option<String>,
}

impl StatsRequest {
    /// Parses the textual request parameters. An empty `columns` means
    /// grouping by tag; an empty `test_name` means build-level status.
    pub fn parse(
        columns: &str,
        filter: &str,
        periods: &str,
        test_name: &str,
    ) -> Result<Self, StatsError> {
        let columns = if columns.is_empty() {
            vec![GroupColumn::Tag]
        } else {
            columns
                .split(',')
                .map(GroupColumn::parse)
                .collect::<Result<Vec<_>, _>>()?
        };
        Ok(Self {
            columns,
            filter: TagFilter::parse(filter)?,
            periods: parse_periods(periods)?,
            test_name: (!test_name.is_empty()).then(|| test_name.to_string()),
        })
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatsValues {
    pub pass: i64,
    pub flake: i64,
    pub fail: i64,
}

impl StatsValues {
    fn add(&mut self, outcome: Outcome, n: i64) {
        match outcome {
            Outcome::Pass => self.pass += n,
            Outcome::Flake => self.flake += n,
            Outcome::Fail => self.fail += n,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatsRow {
    pub columns: Vec<String>,
    /// One entry per requested period, in request order.
    pub values: Vec<StatsValues>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Stats {
    pub data: Vec<StatsRow>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum StatusLevel {
    Build,
    Test,
}

impl StatusLevel {
    fn outcome(self, code: i32) -> Option<Outcome> {
        match self {
            StatusLevel::Build => BuildStatus::outcome_of(code),
            StatusLevel::Test => TestStatus::from_code(code).outcome(),
        }
    }
}

pub fn build_stats(store: &Store, req: &StatsRequest) -> Result<Stats, StatsError> {
    let now_ms = chrono::Utc::now().timestamp_millis();
    store.read(|ops| build_stats_at(ops, req, now_ms))
}

/// Runs `req` with windows anchored at `now_ms`.
pub fn build_stats_at(
    ops: &StoreOps<'_>,
    req: &StatsRequest,
    now_ms: i64,
) -> Result<Stats, StatsError> {
    let mut q = QueryBuilder::from("builds b");
    q.join("jobs j ON j.id = b.job_id", vec![]);

    if !req.filter.is_empty() {
        let job_ids = req.filter.resolve_job_ids(ops.conn)?;
        if job_ids.is_empty() {
            tracing::debug!(event = "stats_filter_empty");
            return Ok(Stats::default());
        }
        q.filter(
            format!("j.id IN ({})", query::placeholders(job_ids.len())),
            job_ids.into_iter().map(Value::Integer).collect(),
        );
    }

    let mut level = StatusLevel::Build;
    let mut tags_joined = false;
    let mut tests_joined = false;
    for col in &req.columns {
        match col {
            GroupColumn::Tag if !tags_joined => {
                q.join("jobs_sippy_tags jst ON jst.job_id = j.id", vec![]);
                tags_joined = true;
            }
            GroupColumn::TestName if !tests_joined => {
                q.join("test_results tr ON tr.build_id = b.id", vec![]);
                q.join("tests t ON t.id = tr.test_id", vec![]);
                tests_joined = true;
                level = StatusLevel::Test;
            }
            _ => {}
        }
        q.select(col.expr(), vec![]);
        q.group_by(col.expr());
    }

    if let Some(name) = &req.test_name {
        let Some(test_id) = ops.find_test(name)? else {
            tracing::debug!(event = "stats_test_not_found", test = %name);
            return Ok(Stats::default());
        };
        if tests_joined {
            q.filter("tr.test_id = ?", vec![Value::Integer(test_id)]);
        } else {
            q.join(
                "test_results tr ON tr.build_id = b.id AND tr.test_id = ?",
                vec![Value::Integer(test_id)],
            );
            level = StatusLevel::Test;
        }
    }

    let status_expr = match level {
        StatusLevel::Build => "b.status",
        StatusLevel::Test => "tr.status",
    };
    q.select(status_expr, vec![]);
    q.group_by(status_expr);

    let windows = layout_windows(now_ms, &req.periods);
    for w in &windows {
        q.select(
            "SUM(? <= b.timestamp AND b.timestamp < ?)",
            vec![Value::Integer(w.start), Value::Integer(w.end)],
        );
    }
    let oldest = windows.last().map_or(now_ms, |w| w.start);
    q.filter(
        "b.timestamp >= ? AND b.timestamp < ?",
        vec![Value::Integer(oldest), Value::Integer(now_ms)],
    );

    let (sql, params) = q.build();
    tracing::debug!(event = "stats_query", sql = %sql, params = params.len());

    let ncols = req.columns.len();
    let mut stats = Stats::default();
    let mut index: HashMap<Vec<String>, usize> = HashMap::new();

    let mut stmt = ops.conn.prepare(&sql)?;
    let mut rows = stmt.query(rusqlite::params_from_iter(params))?;
    while let Some(row) = rows.next()? {
        let mut key = Vec::with_capacity(ncols);
        for i in 0..ncols {
            key.push(row.get::<_, String>(i)?);
        }
        let code: i32 = row.get(ncols)?;

        let slot = match index.get(&key) {
            Some(&slot) => slot,
            None => {
                stats.data.push(StatsRow {
                    columns: key.clone(),
                    values: vec![StatsValues::default(); windows.len()],
                });
                index.insert(key, stats.data.len() - 1);
                stats.data.len() - 1
            }
        };

        let Some(outcome) = level.outcome(code) else {
            tracing::warn!(event = "unexpected_status", status = code, level = ?level);
            continue;
        };
        let values = &mut stats.data[slot].values;
        for (i, v) in values.iter_mut().enumerate() {
            let n: Option<i64> = row.get(ncols + 1 + i)?;
            v.add(outcome, n.unwrap_or(0));
        }
    }

    Ok(stats)
}
