use super::query::QueryBuilder;
use crate::errors::StatsError;
use regex::Regex;
use rusqlite::types::Value;
use rusqlite::Connection;
use std::sync::OnceLock;

fn term_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^[a-z0-9.-]+$").unwrap())
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FilterTerm {
    pub tag: String,
    /// `-tag`: the job must not carry `tag`.
    pub exclude: bool,
}

/// Space-separated tag expression, e.g. `aws -fips`. All terms must hold.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TagFilter {
    pub terms: Vec<FilterTerm>,
}

impl TagFilter {
    pub fn parse(filter: &str) -> Result<Self, StatsError> {
        let mut terms = Vec::new();
        for raw in filter.split(' ').filter(|t| !t.is_empty()) {
            if !term_re().is_match(raw) {
                return Err(StatsError::InvalidFilterTerm(raw.to_string()));
            }
            let (tag, exclude) = match raw.strip_prefix('-') {
                Some(rest) => (rest, true),
                None => (raw, false),
            };
            if tag.is_empty() {
                return Err(StatsError::InvalidFilterTerm(raw.to_string()));
            }
            terms.push(FilterTerm {
                tag: tag.to_string(),
                exclude,
            });
        }
        Ok(Self { terms })
    }

    pub fn is_empty(&self) -> bool {
        self.terms.is_empty()
    }

    /// Query selecting the ids of matching jobs: one join per required tag,
    /// one anti-join per excluded tag.
    pub fn job_ids_query(&self) -> QueryBuilder {
        let mut q = QueryBuilder::from("jobs j");
        q.select("j.id", vec![]);
        for (i, term) in self.terms.iter().enumerate() {
            let alias = format!("jst{}", i + 1);
            let on = format!(
                "jobs_sippy_tags {alias} ON {alias}.job_id = j.id AND {alias}.tag = ?"
            );
            let tag = vec![Value::Text(term.tag.clone())];
            if term.exclude {
                q.left_join(on, tag);
                q.filter(format!("{alias}.job_id IS NULL"), vec![]);
            } else {
                q.join(on, tag);
            }
        }
        q
    }

    pub fn resolve_job_ids(&self, conn: &Connection) -> Result<Vec<i64>, StatsError> {
        let (sql, params) = self.job_ids_query().build();
        let mut stmt = conn.prepare(&sql)?;
        let ids = stmt
            .query_map(rusqlite::params_from_iter(params), |row| row.get::<_, i64>(0))?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(ids)
    }
}
