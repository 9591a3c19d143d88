mod common;

use ci_results_core::ingest::{Indexer, IngestConfig, IngestReport};
use ci_results_core::model::TestStatus::{self, Fail, Flaky, NoResult, Pass, Running};
use ci_results_core::source::JobResults;
use ci_results_core::storage::Store;
use common::*;
use std::sync::Arc;
use std::time::Duration;

fn indexer(store: &Store, source: FakeSource, workers: usize) -> Indexer {
    let config = IngestConfig {
        dashboards: source.dashboard_names(),
        fetch_workers: workers,
        jobs_queue: 2,
        builds_queue: 4,
        deadline: None,
    };
    Indexer {
        store: store.clone(),
        source: Arc::new(source),
        labeler: labeler(
            StaticTags::default()
                .with("job-a", &["aws"])
                .with("job-b", &["gcp", "upgrade"]),
        ),
        config,
    }
}

fn sample_source() -> FakeSource {
    FakeSource::default()
        .job(
            "dash-4.9-blocking",
            "job-a",
            uniform_results(10, NOW_MS, &[("Overall", Pass), ("e2e", Flaky)]),
        )
        .job(
            "dash-4.9-informing",
            "job-b",
            uniform_results(5, NOW_MS, &[("Overall", Fail), ("install", Pass)]),
        )
}

#[tokio::test]
async fn ingests_every_discovered_build() -> anyhow::Result<()> {
    let store = memory_store();
    let report = indexer(&store, sample_source(), 3).run().await?;

    assert_eq!(
        report,
        IngestReport {
            jobs: 2,
            builds_seen: 15,
            builds_skipped_running: 0,
            builds_persisted: 15,
            results_written: 30,
        }
    );
    assert_eq!(store.count_rows("jobs")?, 2);
    assert_eq!(store.count_rows("builds")?, 15);
    assert_eq!(store.count_rows("tests")?, 3);
    assert_eq!(store.count_rows("test_results")?, 30);

    let job_b = store.find_job("job-b")?.expect("job-b stored");
    assert_eq!(store.job_tags(job_b)?, vec!["gcp", "upgrade"]);

    let failed: i64 = store.conn.lock().unwrap().query_row(
        "SELECT COUNT(*) FROM builds WHERE job_id = ?1 AND status = 2",
        [job_b],
        |r| r.get(0),
    )?;
    assert_eq!(failed, 5);
    Ok(())
}

#[tokio::test]
async fn rerunning_is_idempotent() -> anyhow::Result<()> {
    let store = memory_store();
    indexer(&store, sample_source(), 2).run().await?;
    let second = indexer(&store, sample_source(), 5).run().await?;

    assert_eq!(second.builds_persisted, 15);
    assert_eq!(second.results_written, 0);
    assert_eq!(store.count_rows("jobs")?, 2);
    assert_eq!(store.count_rows("jobs_sippy_tags")?, 3);
    assert_eq!(store.count_rows("builds")?, 15);
    assert_eq!(store.count_rows("test_results")?, 30);
    Ok(())
}

#[tokio::test]
async fn running_builds_are_skipped_until_complete() -> anyhow::Result<()> {
    let store = memory_store();
    let running = JobResults {
        changelists: vec!["2".into(), "1".into()],
        timestamps: vec![NOW_MS, NOW_MS - 1000],
        tests: vec![
            ("Overall".into(), vec![Running, Pass]),
            ("e2e".into(), vec![Fail, Pass]),
        ],
    };
    let report = indexer(&store, FakeSource::default().job("d", "job-a", running), 1)
        .run()
        .await?;
    assert_eq!(report.builds_seen, 2);
    assert_eq!(report.builds_skipped_running, 1);
    assert_eq!(store.count_rows("builds")?, 1);
    assert_eq!(store.count_rows("test_results")?, 2);

    // the next cycle sees the finished build and stores it whole
    let finished = JobResults {
        changelists: vec!["2".into(), "1".into()],
        timestamps: vec![NOW_MS, NOW_MS - 1000],
        tests: vec![
            ("Overall".into(), vec![Fail, Pass]),
            ("e2e".into(), vec![Fail, Pass]),
        ],
    };
    let report = indexer(&store, FakeSource::default().job("d", "job-a", finished), 1)
        .run()
        .await?;
    assert_eq!(report.builds_skipped_running, 0);
    assert_eq!(report.results_written, 2);
    assert_eq!(store.count_rows("builds")?, 2);
    assert_eq!(store.count_rows("test_results")?, 4);
    Ok(())
}

#[tokio::test]
async fn no_result_entries_are_not_stored() -> anyhow::Result<()> {
    let store = memory_store();
    let results = JobResults {
        changelists: vec!["1".into()],
        timestamps: vec![NOW_MS],
        tests: vec![
            ("Overall".into(), vec![Pass]),
            ("skipped".into(), vec![NoResult]),
        ],
    };
    indexer(&store, FakeSource::default().job("d", "job-a", results), 1)
        .run()
        .await?;
    assert_eq!(store.count_rows("test_results")?, 1);
    assert_eq!(store.find_test("skipped")?, None);
    Ok(())
}

#[tokio::test]
async fn short_timestamp_axis_fails_the_run_without_storing_builds() {
    let store = memory_store();
    let results = JobResults {
        changelists: vec!["2".into(), "1".into()],
        timestamps: vec![NOW_MS],
        tests: vec![("Overall".into(), vec![Pass, Pass])],
    };
    let err = indexer(&store, FakeSource::default().job("d", "job-a", results), 1)
        .run()
        .await
        .unwrap_err();
    assert!(format!("{err:#}").contains("timestamps"), "{err:#}");
    assert_eq!(store.count_rows("builds").unwrap(), 0);
}

#[tokio::test]
async fn fetch_error_rolls_back_the_whole_run() {
    let store = memory_store();
    let mut source = sample_source();
    source.failing_job = Some("job-b".into());

    let err = indexer(&store, source, 2).run().await.unwrap_err();
    let msg = format!("{err:#}");
    assert!(msg.contains("job-b"), "{msg}");
    assert!(msg.contains("503"), "{msg}");

    for table in ["jobs", "jobs_sippy_tags", "builds", "tests", "test_results"] {
        assert_eq!(store.count_rows(table).unwrap(), 0, "{table}");
    }
    // caches must not remember ids from the rolled back run
    assert_eq!(store.find_job("job-a").unwrap(), None);
}

#[tokio::test]
async fn discovery_error_fails_the_run() {
    let store = memory_store();
    let mut ix = indexer(&store, sample_source(), 2);
    ix.config.dashboards.push("missing-dashboard".into());

    let err = ix.run().await.unwrap_err();
    assert!(format!("{err:#}").contains("missing-dashboard"));
    assert_eq!(store.count_rows("builds").unwrap(), 0);
}

#[tokio::test]
async fn deadline_aborts_and_rolls_back() {
    let store = memory_store();
    let mut source = sample_source();
    source.delay = Some(Duration::from_secs(1));

    let mut ix = indexer(&store, source, 1);
    ix.config.deadline = Some(Duration::from_millis(50));

    let err = ix.run().await.unwrap_err();
    assert!(err.to_string().contains("deadline exceeded"), "{err}");
    assert_eq!(store.count_rows("builds").unwrap(), 0);
}

#[tokio::test]
async fn small_queues_do_not_deadlock_after_failure() {
    let store = memory_store();
    let mut source = FakeSource::default();
    for i in 0..20 {
        source = source.job(
            "d",
            &format!("job-{i}"),
            uniform_results(50, NOW_MS, &[("Overall", Pass)]),
        );
    }
    source.failing_job = Some("job-3".into());

    let idx = indexer(&store, source, 4);
    let run = idx.run();
    let res = tokio::time::timeout(Duration::from_secs(30), run)
        .await
        .expect("pipeline must drain and stop");
    assert!(res.is_err());
    assert_eq!(store.count_rows("builds").unwrap(), 0);
}

#[tokio::test]
async fn reclassify_rewrites_write_once_fields() -> anyhow::Result<()> {
    let store = memory_store();
    indexer(&store, sample_source(), 2).run().await?;

    let job_a = store.find_job("job-a")?.expect("job-a stored");
    assert_eq!(store.job_tags(job_a)?, vec!["aws"]);

    let relabel = labeler(StaticTags::default().with("job-a", &["azure", "fips"]));
    assert_eq!(store.reclassify_jobs(&relabel)?, 2);

    assert_eq!(store.job_tags(job_a)?, vec!["azure", "fips"]);
    let job_b = store.find_job("job-b")?.expect("job-b stored");
    assert!(store.job_tags(job_b)?.is_empty());
    let platform: String = store.conn.lock().unwrap().query_row(
        "SELECT platform FROM jobs WHERE id = ?1",
        [job_a],
        |r| r.get(0),
    )?;
    assert_eq!(platform, "azure");

    // builds are untouched
    assert_eq!(store.count_rows("builds")?, 15);
    Ok(())
}

#[test]
fn overall_status_drives_build_status() {
    let store = memory_store();
    let labeler = labeler(StaticTags::default());
    seed(
        &store,
        &labeler,
        &[
            build("j", "1", NOW_MS, &[("Overall", Fail)]),
            build("j", "2", NOW_MS, &[("Overall", TestStatus::Flaky)]),
            build("j", "3", NOW_MS, &[("e2e", Fail)]),
        ],
    );
    let statuses: Vec<i32> = {
        let conn = store.conn.lock().unwrap();
        let mut stmt = conn.prepare("SELECT status FROM builds ORDER BY number").unwrap();
        let rows = stmt
            .query_map([], |r| r.get(0))
            .unwrap()
            .collect::<Result<Vec<_>, _>>()
            .unwrap();
        rows
    };
    assert_eq!(statuses, vec![2, 1, 1]);
}
