//! Read-side HTTP API over the call store. These endpoints never mutate;
//! every store failure collapses into a uniform 500 payload.

use axum::{
    extract::{Query, State},
    http::StatusCode,
    routing::get,
    Json, Router,
};
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::error;

use crosstalk_db::repositories::{
    CallRepository, ExperimentRepository, HumanCallRepository, RepositoryError,
    SqlCallRepository, SqlExperimentRepository, SqlHumanCallRepository,
};
use crosstalk_db::DbPool;

const DEFAULT_LIST_LIMIT: i64 = 100;

#[derive(Clone)]
pub struct ApiState {
    pub db_pool: DbPool,
}

pub fn router(db_pool: DbPool) -> Router {
    Router::new()
        .route("/api/calls", get(list_calls))
        .route("/api/stats", get(call_stats))
        .route("/api/experiments", get(list_experiments))
        .route("/api/human-calls", get(list_human_calls))
        .route("/api/human-calls/stats", get(human_call_stats))
        .with_state(ApiState { db_pool })
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CallListQuery {
    pub experiment_id: Option<String>,
    pub limit: Option<i64>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct StatsQuery {
    pub experiment_id: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct LimitQuery {
    pub limit: Option<i64>,
}

pub async fn list_calls(
    State(state): State<ApiState>,
    Query(query): Query<CallListQuery>,
) -> (StatusCode, Json<Value>) {
    let repo = SqlCallRepository::new(state.db_pool.clone());
    let limit = query.limit.unwrap_or(DEFAULT_LIST_LIMIT).max(0);

    match repo.list(query.experiment_id.as_deref(), limit).await {
        Ok(calls) => {
            let count = calls.len();
            (StatusCode::OK, Json(json!({ "calls": calls, "count": count })))
        }
        Err(storage_error) => store_failure("api.calls.list_failed", storage_error),
    }
}

pub async fn call_stats(
    State(state): State<ApiState>,
    Query(query): Query<StatsQuery>,
) -> (StatusCode, Json<Value>) {
    let repo = SqlCallRepository::new(state.db_pool.clone());

    match repo.stats(query.experiment_id.as_deref()).await {
        Ok(stats) => (StatusCode::OK, Json(json!({ "stats": stats }))),
        Err(storage_error) => store_failure("api.stats.failed", storage_error),
    }
}

pub async fn list_experiments(State(state): State<ApiState>) -> (StatusCode, Json<Value>) {
    let repo = SqlExperimentRepository::new(state.db_pool.clone());

    match repo.list().await {
        Ok(experiments) => (StatusCode::OK, Json(json!({ "experiments": experiments }))),
        Err(storage_error) => store_failure("api.experiments.list_failed", storage_error),
    }
}

pub async fn list_human_calls(
    State(state): State<ApiState>,
    Query(query): Query<LimitQuery>,
) -> (StatusCode, Json<Value>) {
    let repo = SqlHumanCallRepository::new(state.db_pool.clone());
    let limit = query.limit.unwrap_or(DEFAULT_LIST_LIMIT).max(0);

    match repo.list(limit).await {
        Ok(calls) => {
            let count = calls.len();
            (StatusCode::OK, Json(json!({ "calls": calls, "count": count })))
        }
        Err(storage_error) => store_failure("api.human_calls.list_failed", storage_error),
    }
}

pub async fn human_call_stats(State(state): State<ApiState>) -> (StatusCode, Json<Value>) {
    let repo = SqlHumanCallRepository::new(state.db_pool.clone());

    match repo.stats().await {
        Ok(stats) => (StatusCode::OK, Json(json!({ "stats": stats }))),
        Err(storage_error) => store_failure("api.human_calls.stats_failed", storage_error),
    }
}

fn store_failure(event_name: &'static str, error: RepositoryError) -> (StatusCode, Json<Value>) {
    error!(event_name, error = %error, "read endpoint store access failed");
    (StatusCode::INTERNAL_SERVER_ERROR, Json(json!({ "error": "internal server error" })))
}

#[cfg(test)]
mod tests {
    use axum::{
        extract::{Query, State},
        http::StatusCode,
    };
    use serde_json::json;

    use crosstalk_core::domain::CallPatch;
    use crosstalk_db::repositories::{CallRepository, ExperimentRepository, SqlCallRepository, SqlExperimentRepository};
    use crosstalk_db::{connect_with_settings, migrations, DbPool};

    use super::{call_stats, list_calls, list_experiments, ApiState, CallListQuery, StatsQuery};

    async fn setup_pool() -> DbPool {
        let pool = connect_with_settings("sqlite::memory:", 1, 30)
            .await
            .expect("connect test pool");
        migrations::run_pending(&pool).await.expect("run migrations");
        pool
    }

    async fn seed_call(pool: &DbPool, vapi_call_id: &str, experiment_id: Option<&str>) {
        let patch = CallPatch {
            vapi_call_id: vapi_call_id.to_string(),
            experiment_id: experiment_id.map(str::to_string),
            status: Some("ended".to_string()),
            duration_seconds: Some(60),
            ..CallPatch::default()
        };
        SqlCallRepository::new(pool.clone()).upsert(&patch).await.expect("seed call");
    }

    #[tokio::test]
    async fn list_calls_filters_by_experiment_and_reports_count() {
        let pool = setup_pool().await;
        seed_call(&pool, "api-1", Some("exp-1")).await;
        seed_call(&pool, "api-2", Some("exp-1")).await;
        seed_call(&pool, "api-3", Some("exp-2")).await;

        let (status, payload) = list_calls(
            State(ApiState { db_pool: pool.clone() }),
            Query(CallListQuery { experiment_id: Some("exp-1".to_string()), limit: None }),
        )
        .await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(payload.0["count"], json!(2));
        assert_eq!(payload.0["calls"].as_array().expect("calls array").len(), 2);

        pool.close().await;
    }

    #[tokio::test]
    async fn list_calls_honors_limit() {
        let pool = setup_pool().await;
        for n in 0..5 {
            seed_call(&pool, &format!("api-limit-{n}"), None).await;
        }

        let (status, payload) = list_calls(
            State(ApiState { db_pool: pool.clone() }),
            Query(CallListQuery { experiment_id: None, limit: Some(3) }),
        )
        .await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(payload.0["count"], json!(3));

        pool.close().await;
    }

    #[tokio::test]
    async fn stats_endpoint_wraps_aggregates() {
        let pool = setup_pool().await;
        seed_call(&pool, "api-stats-1", Some("exp-s")).await;

        let (status, payload) = call_stats(
            State(ApiState { db_pool: pool.clone() }),
            Query(StatsQuery { experiment_id: Some("exp-s".to_string()) }),
        )
        .await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(payload.0["stats"]["total_calls"], json!(1));
        assert_eq!(payload.0["stats"]["completed_calls"], json!(1));

        pool.close().await;
    }

    #[tokio::test]
    async fn experiments_endpoint_lists_created_experiments() {
        let pool = setup_pool().await;
        SqlExperimentRepository::new(pool.clone())
            .create("batch-2024-01-01", Some("nightly run"))
            .await
            .expect("create experiment");

        let (status, payload) = list_experiments(State(ApiState { db_pool: pool.clone() })).await;

        assert_eq!(status, StatusCode::OK);
        let experiments = payload.0["experiments"].as_array().expect("experiments array");
        assert_eq!(experiments.len(), 1);
        assert_eq!(experiments[0]["name"], json!("batch-2024-01-01"));

        pool.close().await;
    }

    #[tokio::test]
    async fn store_failure_returns_uniform_error_payload() {
        let pool = setup_pool().await;
        pool.close().await;

        let (status, payload) = list_calls(
            State(ApiState { db_pool: pool }),
            Query(CallListQuery::default()),
        )
        .await;

        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(payload.0, json!({ "error": "internal server error" }));
    }
}
