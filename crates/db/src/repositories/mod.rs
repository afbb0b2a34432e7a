use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::Value;
use thiserror::Error;

use crosstalk_core::domain::{
    CallPatch, CallRecord, CallStats, Experiment, HumanCallPatch, HumanCallRecord, HumanCallStats,
};

pub mod call;
pub mod experiment;
pub mod human_call;

pub use call::SqlCallRepository;
pub use experiment::SqlExperimentRepository;
pub use human_call::SqlHumanCallRepository;

#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("decode error: {0}")]
    Decode(String),
}

/// Durable upsert-merge persistence for two-agent call rows, keyed by the
/// platform call id.
#[async_trait]
pub trait CallRepository: Send + Sync {
    /// Insert-or-merge one patch atomically. Columns absent from the patch
    /// keep their stored values; the merge never downgrades non-null to null.
    async fn upsert(&self, patch: &CallPatch) -> Result<CallRecord, RepositoryError>;

    async fn find_by_vapi_id(
        &self,
        vapi_call_id: &str,
    ) -> Result<Option<CallRecord>, RepositoryError>;

    /// Newest rows first, optionally scoped to one experiment.
    async fn list(
        &self,
        experiment_id: Option<&str>,
        limit: i64,
    ) -> Result<Vec<CallRecord>, RepositoryError>;

    async fn stats(&self, experiment_id: Option<&str>) -> Result<CallStats, RepositoryError>;
}

#[async_trait]
pub trait ExperimentRepository: Send + Sync {
    async fn create(
        &self,
        name: &str,
        description: Option<&str>,
    ) -> Result<Experiment, RepositoryError>;

    async fn list(&self) -> Result<Vec<Experiment>, RepositoryError>;
}

/// Human-caller analog of [`CallRepository`]; same upsert-by-key invariant.
#[async_trait]
pub trait HumanCallRepository: Send + Sync {
    async fn upsert(&self, patch: &HumanCallPatch) -> Result<HumanCallRecord, RepositoryError>;

    async fn find_by_vapi_id(
        &self,
        vapi_call_id: &str,
    ) -> Result<Option<HumanCallRecord>, RepositoryError>;

    async fn list(&self, limit: i64) -> Result<Vec<HumanCallRecord>, RepositoryError>;

    async fn stats(&self) -> Result<HumanCallStats, RepositoryError>;
}

pub(crate) fn parse_timestamp(column: &str, value: String) -> Result<DateTime<Utc>, RepositoryError> {
    DateTime::parse_from_rfc3339(&value).map(|timestamp| timestamp.with_timezone(&Utc)).map_err(
        |error| {
            RepositoryError::Decode(format!("invalid timestamp in `{column}`: `{value}` ({error})"))
        },
    )
}

pub(crate) fn parse_optional_timestamp(
    column: &str,
    value: Option<String>,
) -> Result<Option<DateTime<Utc>>, RepositoryError> {
    value.map(|timestamp| parse_timestamp(column, timestamp)).transpose()
}

pub(crate) fn parse_optional_json(
    column: &str,
    value: Option<String>,
) -> Result<Option<Value>, RepositoryError> {
    value
        .map(|raw| {
            serde_json::from_str(&raw).map_err(|error| {
                RepositoryError::Decode(format!("invalid JSON in `{column}`: {error}"))
            })
        })
        .transpose()
}
