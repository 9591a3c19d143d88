use crate::cache::{self, StatsCache};
use crate::error::ApiError;
use axum::extract::{Query, State};
use axum::routing::get;
use axum::{Json, Router};
use ci_results_core::aggregate::{build_stats, Stats, StatsRequest};
use ci_results_core::storage::Store;
use serde::Deserialize;
use std::sync::Arc;

pub const DEFAULT_COLUMNS: &str = "sippytags";
pub const DEFAULT_PERIODS: &str = "7,7";

#[derive(Clone)]
pub struct AppState {
    pub store: Store,
    pub cache: StatsCache,
}

#[derive(Debug, Default, Deserialize)]
pub struct BuildsQuery {
    #[serde(default)]
    pub columns: String,
    #[serde(default)]
    pub filter: String,
    #[serde(default)]
    pub periods: String,
    #[serde(default)]
    pub testname: String,
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/api/builds", get(builds))
        .route("/api/list-tests", get(list_tests))
        .with_state(state)
}

async fn builds(
    State(state): State<AppState>,
    Query(q): Query<BuildsQuery>,
) -> Result<Json<Arc<Stats>>, ApiError> {
    let columns = if q.columns.is_empty() { DEFAULT_COLUMNS } else { &q.columns };
    let periods = if q.periods.is_empty() { DEFAULT_PERIODS } else { &q.periods };

    let key = cache::key(columns, &q.filter, periods, &q.testname);
    if let Some(hit) = state.cache.get(&key) {
        tracing::debug!(event = "stats_cache_hit");
        return Ok(Json(hit));
    }

    let req = StatsRequest::parse(columns, &q.filter, periods, &q.testname)?;
    let store = state.store.clone();
    let stats = tokio::task::spawn_blocking(move || build_stats(&store, &req))
        .await
        .map_err(|e| anyhow::anyhow!("stats task failed: {e}"))??;

    let stats = Arc::new(stats);
    tracing::info!(
        event = "stats_served",
        columns,
        filter = %q.filter,
        periods,
        testname = %q.testname,
        rows = stats.data.len()
    );
    state.cache.insert(key, stats.clone());
    Ok(Json(stats))
}

async fn list_tests(State(state): State<AppState>) -> Result<Json<Vec<String>>, ApiError> {
    let store = state.store.clone();
    let tests = tokio::task::spawn_blocking(move || store.list_tests())
        .await
        .map_err(|e| anyhow::anyhow!("list-tests task failed: {e}"))??;
    Ok(Json(tests))
}
