pub const DDL: &str = r#"
CREATE TABLE IF NOT EXISTS jobs (
  id INTEGER NOT NULL PRIMARY KEY,
  name TEXT NOT NULL,
  dashboard TEXT NOT NULL,
  platform TEXT NOT NULL,
  mod TEXT NOT NULL,
  testtype TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS jobs_sippy_tags (
  job_id INTEGER NOT NULL REFERENCES jobs(id),
  tag TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS builds (
  id INTEGER NOT NULL PRIMARY KEY,
  job_id INTEGER NOT NULL REFERENCES jobs(id),
  number TEXT NOT NULL,
  timestamp INTEGER NOT NULL,
  status INTEGER NOT NULL
);

CREATE TABLE IF NOT EXISTS tests (
  id INTEGER NOT NULL PRIMARY KEY,
  name TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS test_results (
  build_id INTEGER NOT NULL REFERENCES builds(id),
  test_id INTEGER NOT NULL REFERENCES tests(id),
  status INTEGER NOT NULL
);

CREATE UNIQUE INDEX IF NOT EXISTS jobs_name ON jobs (name);
CREATE UNIQUE INDEX IF NOT EXISTS jobs_sippy_tags_job_tag ON jobs_sippy_tags (job_id, tag);
CREATE UNIQUE INDEX IF NOT EXISTS builds_job_number ON builds (job_id, number);
CREATE UNIQUE INDEX IF NOT EXISTS tests_name ON tests (name);
CREATE UNIQUE INDEX IF NOT EXISTS test_results_build_test ON test_results (build_id, test_id);
CREATE INDEX IF NOT EXISTS test_results_test_id_status ON test_results (test_id, status);
CREATE INDEX IF NOT EXISTS builds_timestamp ON builds (timestamp);
"#;

/// Tables whose row counts may be queried by name.
pub const TABLES: &[&str] = &["jobs", "jobs_sippy_tags", "builds", "tests", "test_results"];
