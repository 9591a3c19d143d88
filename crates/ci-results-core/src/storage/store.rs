use super::cache::{BuildKey, CacheConfig, StoreCaches};
use crate::classify::JobLabeler;
use crate::model::{BuildStatus, JobClassification, TestStatus};
use anyhow::Context;
use rusqlite::{params, Connection, OptionalExtension};
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

/// Handle to one SQLite connection plus its lookup caches.
///
/// Clones share the connection, so a clone blocks for as long as a
/// [`WriteTxn`] is open on any of them. Readers that run while an ingestion is
/// in progress, in this process or another, open their own `Store` on the
/// same file; WAL mode lets them see committed data meanwhile.
#[derive(Clone)]
pub struct Store {
    pub conn: Arc<Mutex<Connection>>,
    caches: Arc<StoreCaches>,
}

impl Store {
    pub fn open(path: &Path) -> anyhow::Result<Self> {
        Self::open_with_caches(path, &CacheConfig::default())
    }

    pub fn open_with_caches(path: &Path, caches: &CacheConfig) -> anyhow::Result<Self> {
        let conn = Connection::open(path)
            .with_context(|| format!("failed to open sqlite db {}", path.display()))?;
        conn.busy_timeout(Duration::from_secs(5))?;
        let mode: String = conn
            .query_row("PRAGMA journal_mode = WAL", [], |r| r.get(0))
            .context("failed to enable WAL")?;
        if !mode.eq_ignore_ascii_case("wal") {
            tracing::warn!(event = "wal_unavailable", journal_mode = %mode, path = %path.display());
        }
        conn.execute_batch("PRAGMA cache_size = -10000;")?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
            caches: Arc::new(StoreCaches::new(caches)),
        })
    }

    pub fn memory() -> anyhow::Result<Self> {
        Self::memory_with_caches(&CacheConfig::default())
    }

    pub fn memory_with_caches(caches: &CacheConfig) -> anyhow::Result<Self> {
        let conn = Connection::open_in_memory().context("failed to open in-memory sqlite db")?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
            caches: Arc::new(StoreCaches::new(caches)),
        })
    }

    pub fn init_schema(&self) -> anyhow::Result<()> {
        let conn = self.conn.lock().unwrap();
        conn.execute_batch(crate::storage::schema::DDL)
            .context("failed to initialize schema")?;
        Ok(())
    }

    /// Starts the single write transaction of an ingestion run. Dropping the
    /// returned value without calling [`WriteTxn::commit`] rolls it back.
    pub fn begin_write(&self) -> anyhow::Result<WriteTxn<'_>> {
        let conn = self.conn.lock().unwrap();
        conn.execute_batch("BEGIN IMMEDIATE")
            .context("failed to begin write transaction")?;
        Ok(WriteTxn {
            conn,
            caches: &self.caches,
            finished: false,
        })
    }

    /// Runs `f` against the connection outside of any write transaction.
    pub fn read<T>(&self, f: impl FnOnce(&StoreOps<'_>) -> T) -> T {
        let conn = self.conn.lock().unwrap();
        let ops = StoreOps {
            conn: &conn,
            caches: &self.caches,
        };
        f(&ops)
    }

    pub fn find_job(&self, name: &str) -> anyhow::Result<Option<i64>> {
        self.read(|ops| ops.find_job(name))
    }

    pub fn find_test(&self, name: &str) -> anyhow::Result<Option<i64>> {
        self.read(|ops| ops.find_test(name))
    }

    pub fn list_tests(&self) -> anyhow::Result<Vec<String>> {
        self.read(|ops| ops.list_tests())
    }

    pub fn job_tags(&self, job_id: i64) -> anyhow::Result<Vec<String>> {
        self.read(|ops| ops.job_tags(job_id))
    }

    pub fn count_rows(&self, table: &str) -> anyhow::Result<i64> {
        self.read(|ops| ops.count_rows(table))
    }

    /// Recomputes every job's classification with `labeler` and replaces its
    /// stored fields and tags. Returns the number of jobs rewritten.
    pub fn reclassify_jobs(&self, labeler: &JobLabeler) -> anyhow::Result<usize> {
        let txn = self.begin_write()?;
        let jobs = txn.ops().all_jobs()?;
        for job in &jobs {
            let cls = labeler.label(&job.dashboard, &job.name);
            txn.ops().reclassify_job(job.id, &cls)?;
        }
        txn.commit()?;
        tracing::info!(event = "jobs_reclassified", jobs = jobs.len());
        Ok(jobs.len())
    }
}

/// A write transaction holding the connection for its whole lifetime.
pub struct WriteTxn<'a> {
    conn: MutexGuard<'a, Connection>,
    caches: &'a StoreCaches,
    finished: bool,
}

impl<'a> WriteTxn<'a> {
    pub fn ops(&self) -> StoreOps<'_> {
        StoreOps {
            conn: &self.conn,
            caches: self.caches,
        }
    }

    pub fn commit(mut self) -> anyhow::Result<()> {
        self.conn
            .execute_batch("COMMIT")
            .context("failed to commit write transaction")?;
        self.finished = true;
        Ok(())
    }

    pub fn rollback(mut self) -> anyhow::Result<()> {
        self.finished = true;
        self.caches.clear();
        self.conn
            .execute_batch("ROLLBACK")
            .context("failed to roll back write transaction")?;
        Ok(())
    }
}

impl Drop for WriteTxn<'_> {
    fn drop(&mut self) {
        if !self.finished {
            self.caches.clear();
            if let Err(e) = self.conn.execute_batch("ROLLBACK") {
                tracing::error!(event = "rollback_failed", error = %e);
            } else {
                tracing::warn!(event = "write_txn_rolled_back");
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobRow {
    pub id: i64,
    pub name: String,
    pub dashboard: String,
    pub platform: String,
    pub modifier: String,
    pub test_type: String,
}

/// Point lookups and idempotent upserts over one borrowed connection.
pub struct StoreOps<'a> {
    pub conn: &'a Connection,
    caches: &'a StoreCaches,
}

impl StoreOps<'_> {
    pub fn find_job(&self, name: &str) -> anyhow::Result<Option<i64>> {
        if let Some(id) = self.caches.jobs.get(&name.to_string()) {
            return Ok(Some(id));
        }

        let id: Option<i64> = self
            .conn
            .prepare_cached("SELECT id FROM jobs WHERE name = ?1")?
            .query_row(params![name], |row| row.get(0))
            .optional()?;

        if let Some(id) = id {
            self.caches.jobs.insert(name.to_string(), id);
        }
        Ok(id)
    }

    /// Inserts a job with its write-once classification.
    ///
    /// Callers are expected to have seen `find_job` return `None`. If another
    /// writer inserted the same name in between, the existing row wins and its
    /// id is returned; the given classification is then discarded.
    pub fn insert_job(
        &self,
        name: &str,
        dashboard: &str,
        cls: &JobClassification,
    ) -> anyhow::Result<i64> {
        let inserted = self
            .conn
            .prepare_cached(
                "INSERT OR IGNORE INTO jobs (name, dashboard, platform, mod, testtype)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
            )?
            .execute(params![
                name,
                dashboard,
                cls.platform,
                cls.modifier,
                cls.test_type
            ])?;

        if inserted == 0 {
            tracing::debug!(event = "job_insert_lost_race", job = name);
            return self
                .find_job(name)?
                .with_context(|| format!("job {name} vanished after conflicting insert"));
        }

        let id = self.conn.last_insert_rowid();
        self.insert_tags(id, cls)?;
        self.caches.jobs.insert(name.to_string(), id);
        Ok(id)
    }

    fn insert_tags(&self, job_id: i64, cls: &JobClassification) -> anyhow::Result<()> {
        let mut stmt = self
            .conn
            .prepare_cached("INSERT OR IGNORE INTO jobs_sippy_tags (job_id, tag) VALUES (?1, ?2)")?;
        for tag in &cls.tags {
            stmt.execute(params![job_id, tag])?;
        }
        Ok(())
    }

    /// `find_job`, falling back to `insert_job` with a classification computed
    /// only when the job is new.
    pub fn resolve_job(
        &self,
        name: &str,
        dashboard: &str,
        classify: impl FnOnce() -> JobClassification,
    ) -> anyhow::Result<i64> {
        match self.find_job(name)? {
            Some(id) => Ok(id),
            None => self.insert_job(name, dashboard, &classify()),
        }
    }

    pub fn upsert_build(
        &self,
        job_id: i64,
        number: &str,
        timestamp: i64,
        status: BuildStatus,
    ) -> anyhow::Result<i64> {
        let key = BuildKey {
            job_id,
            number: number.to_string(),
        };
        if let Some(id) = self.caches.builds.get(&key) {
            return Ok(id);
        }

        let id = match self.select_build(job_id, number)? {
            Some(id) => id,
            None => {
                let inserted = self
                    .conn
                    .prepare_cached(
                        "INSERT OR IGNORE INTO builds (job_id, number, timestamp, status)
                         VALUES (?1, ?2, ?3, ?4)",
                    )?
                    .execute(params![job_id, number, timestamp, status.code()])?;
                if inserted == 0 {
                    self.select_build(job_id, number)?.with_context(|| {
                        format!("build {number} of job {job_id} vanished after conflicting insert")
                    })?
                } else {
                    self.conn.last_insert_rowid()
                }
            }
        };

        self.caches.builds.insert(key, id);
        Ok(id)
    }

    fn select_build(&self, job_id: i64, number: &str) -> anyhow::Result<Option<i64>> {
        Ok(self
            .conn
            .prepare_cached("SELECT id FROM builds WHERE job_id = ?1 AND number = ?2")?
            .query_row(params![job_id, number], |row| row.get(0))
            .optional()?)
    }

    pub fn find_test(&self, name: &str) -> anyhow::Result<Option<i64>> {
        if let Some(id) = self.caches.tests.get(&name.to_string()) {
            return Ok(Some(id));
        }
        let id: Option<i64> = self
            .conn
            .prepare_cached("SELECT id FROM tests WHERE name = ?1")?
            .query_row(params![name], |row| row.get(0))
            .optional()?;
        if let Some(id) = id {
            self.caches.tests.insert(name.to_string(), id);
        }
        Ok(id)
    }

    pub fn upsert_test(&self, name: &str) -> anyhow::Result<i64> {
        if let Some(id) = self.find_test(name)? {
            return Ok(id);
        }

        let inserted = self
            .conn
            .prepare_cached("INSERT OR IGNORE INTO tests (name) VALUES (?1)")?
            .execute(params![name])?;
        let id = if inserted == 0 {
            self.find_test(name)?
                .with_context(|| format!("test {name:?} vanished after conflicting insert"))?
        } else {
            self.conn.last_insert_rowid()
        };

        self.caches.tests.insert(name.to_string(), id);
        Ok(id)
    }

    /// Records a result unless one already exists for `(build, test)`; the
    /// first stored status is never revised. Returns whether a row was written.
    pub fn upsert_test_result(
        &self,
        build_id: i64,
        test_id: i64,
        status: TestStatus,
    ) -> anyhow::Result<bool> {
        let inserted = self
            .conn
            .prepare_cached(
                "INSERT OR IGNORE INTO test_results (build_id, test_id, status) VALUES (?1, ?2, ?3)",
            )?
            .execute(params![build_id, test_id, status.code()])?;
        Ok(inserted > 0)
    }

    pub fn list_tests(&self) -> anyhow::Result<Vec<String>> {
        let mut stmt = self.conn.prepare("SELECT name FROM tests ORDER BY name")?;
        let names = stmt
            .query_map([], |row| row.get::<_, String>(0))?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(names)
    }

    pub fn job_tags(&self, job_id: i64) -> anyhow::Result<Vec<String>> {
        let mut stmt = self
            .conn
            .prepare_cached("SELECT tag FROM jobs_sippy_tags WHERE job_id = ?1 ORDER BY tag")?;
        let tags = stmt
            .query_map(params![job_id], |row| row.get::<_, String>(0))?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(tags)
    }

    pub fn all_jobs(&self) -> anyhow::Result<Vec<JobRow>> {
        let mut stmt = self
            .conn
            .prepare("SELECT id, name, dashboard, platform, mod, testtype FROM jobs ORDER BY id")?;
        let jobs = stmt
            .query_map([], |row| {
                Ok(JobRow {
                    id: row.get(0)?,
                    name: row.get(1)?,
                    dashboard: row.get(2)?,
                    platform: row.get(3)?,
                    modifier: row.get(4)?,
                    test_type: row.get(5)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(jobs)
    }

    /// Overwrites the write-once classification of one job. Only meant for
    /// explicit backfills.
    pub fn reclassify_job(&self, job_id: i64, cls: &JobClassification) -> anyhow::Result<()> {
        self.conn.execute(
            "UPDATE jobs SET platform = ?1, mod = ?2, testtype = ?3 WHERE id = ?4",
            params![cls.platform, cls.modifier, cls.test_type, job_id],
        )?;
        self.conn.execute(
            "DELETE FROM jobs_sippy_tags WHERE job_id = ?1",
            params![job_id],
        )?;
        self.insert_tags(job_id, cls)
    }

    pub fn count_rows(&self, table: &str) -> anyhow::Result<i64> {
        // table names cannot be bound, so only known tables are accepted
        if !crate::storage::schema::TABLES.contains(&table) {
            anyhow::bail!("Invalid table name for count_rows: {}", table);
        }
        let sql = format!("SELECT COUNT(*) FROM {}", table);
        let n: i64 = self.conn.query_row(&sql, [], |r| r.get(0))?;
        Ok(n)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeSet;

    fn cls(tags: &[&str]) -> JobClassification {
        JobClassification {
            platform: "aws".into(),
            modifier: "none".into(),
            test_type: "other".into(),
            tags: tags.iter().map(|s| s.to_string()).collect::<BTreeSet<_>>(),
        }
    }

    fn store(caches: &CacheConfig) -> Store {
        let s = Store::memory_with_caches(caches).unwrap();
        s.init_schema().unwrap();
        s
    }

    #[test]
    fn find_job_is_none_until_inserted() {
        for caches in [CacheConfig::default(), CacheConfig::disabled()] {
            let s = store(&caches);
            assert_eq!(s.find_job("j").unwrap(), None);

            let txn = s.begin_write().unwrap();
            let id = txn.ops().insert_job("j", "dash", &cls(&["aws", "fips"])).unwrap();
            assert_eq!(txn.ops().find_job("j").unwrap(), Some(id));
            txn.commit().unwrap();

            assert_eq!(s.find_job("j").unwrap(), Some(id));
            assert_eq!(s.job_tags(id).unwrap(), vec!["aws", "fips"]);
        }
    }

    #[test]
    fn conflicting_job_insert_returns_existing_row() {
        let s = store(&CacheConfig::disabled());
        let txn = s.begin_write().unwrap();
        let first = txn.ops().insert_job("j", "d1", &cls(&["aws"])).unwrap();
        let second = txn.ops().insert_job("j", "d2", &cls(&["gcp"])).unwrap();
        assert_eq!(first, second);
        txn.commit().unwrap();

        assert_eq!(s.count_rows("jobs").unwrap(), 1);
        assert_eq!(s.job_tags(first).unwrap(), vec!["aws"]);
    }

    #[test]
    fn upserts_are_idempotent() {
        for caches in [CacheConfig::default(), CacheConfig::disabled()] {
            let s = store(&caches);
            let txn = s.begin_write().unwrap();
            let ops = txn.ops();
            let job = ops.insert_job("j", "d", &cls(&[])).unwrap();

            let b1 = ops.upsert_build(job, "100", 1000, BuildStatus::Success).unwrap();
            let b2 = ops.upsert_build(job, "100", 2000, BuildStatus::Failure).unwrap();
            assert_eq!(b1, b2);

            let t1 = ops.upsert_test("Overall").unwrap();
            let t2 = ops.upsert_test("Overall").unwrap();
            assert_eq!(t1, t2);

            assert!(ops.upsert_test_result(b1, t1, TestStatus::Pass).unwrap());
            assert!(!ops.upsert_test_result(b1, t1, TestStatus::Fail).unwrap());
            drop(ops);
            txn.commit().unwrap();

            assert_eq!(s.count_rows("builds").unwrap(), 1);
            assert_eq!(s.count_rows("tests").unwrap(), 1);
            assert_eq!(s.count_rows("test_results").unwrap(), 1);

            // first write wins for both the build and the result
            let (ts, status): (i64, i32) = s
                .conn
                .lock()
                .unwrap()
                .query_row("SELECT timestamp, status FROM builds", [], |r| {
                    Ok((r.get(0)?, r.get(1)?))
                })
                .unwrap();
            assert_eq!((ts, status), (1000, 1));
            let result_status: i32 = s
                .conn
                .lock()
                .unwrap()
                .query_row("SELECT status FROM test_results", [], |r| r.get(0))
                .unwrap();
            assert_eq!(result_status, TestStatus::Pass.code());
        }
    }

    #[test]
    fn dropped_txn_rolls_back_and_clears_caches() {
        let s = store(&CacheConfig::default());
        {
            let txn = s.begin_write().unwrap();
            txn.ops().insert_job("j", "d", &cls(&["aws"])).unwrap();
            txn.ops().upsert_test("t").unwrap();
        }
        assert_eq!(s.count_rows("jobs").unwrap(), 0);
        assert_eq!(s.count_rows("jobs_sippy_tags").unwrap(), 0);
        assert_eq!(s.find_job("j").unwrap(), None);
        assert_eq!(s.find_test("t").unwrap(), None);
    }

    #[test]
    fn list_tests_is_sorted() {
        let s = store(&CacheConfig::default());
        let txn = s.begin_write().unwrap();
        for name in ["b", "Overall", "a"] {
            txn.ops().upsert_test(name).unwrap();
        }
        txn.commit().unwrap();
        assert_eq!(s.list_tests().unwrap(), vec!["Overall", "a", "b"]);
    }

    #[test]
    fn count_rows_rejects_unknown_tables() {
        let s = store(&CacheConfig::default());
        assert!(s.count_rows("sqlite_master; DROP TABLE jobs").is_err());
    }
}
