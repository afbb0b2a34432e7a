use chrono::Utc;
use sqlx::{sqlite::SqliteRow, Row};

use crosstalk_core::domain::{HumanCallPatch, HumanCallRecord, HumanCallStats};

use super::{
    parse_optional_json, parse_timestamp, HumanCallRepository, RepositoryError,
};
use crate::DbPool;

pub struct SqlHumanCallRepository {
    pool: DbPool,
}

impl SqlHumanCallRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

#[async_trait::async_trait]
impl HumanCallRepository for SqlHumanCallRepository {
    async fn upsert(&self, patch: &HumanCallPatch) -> Result<HumanCallRecord, RepositoryError> {
        let now = Utc::now().to_rfc3339();

        sqlx::query(
            "INSERT INTO human_calls (
                vapi_call_id,
                duration_seconds,
                voice_provider,
                transcript,
                recording_url,
                raw_payload,
                created_at,
                updated_at
             ) VALUES (?, ?, ?, ?, ?, ?, ?, ?)
             ON CONFLICT(vapi_call_id) DO UPDATE SET
                duration_seconds = COALESCE(excluded.duration_seconds, human_calls.duration_seconds),
                voice_provider = COALESCE(excluded.voice_provider, human_calls.voice_provider),
                transcript = COALESCE(excluded.transcript, human_calls.transcript),
                recording_url = COALESCE(excluded.recording_url, human_calls.recording_url),
                raw_payload = COALESCE(excluded.raw_payload, human_calls.raw_payload),
                updated_at = excluded.updated_at",
        )
        .bind(&patch.vapi_call_id)
        .bind(patch.duration_seconds)
        .bind(patch.voice_provider.as_deref())
        .bind(patch.transcript.as_deref())
        .bind(patch.recording_url.as_deref())
        .bind(patch.raw_payload.as_ref().map(|value| value.to_string()))
        .bind(&now)
        .bind(&now)
        .execute(&self.pool)
        .await?;

        self.find_by_vapi_id(&patch.vapi_call_id).await?.ok_or_else(|| {
            RepositoryError::Decode(format!(
                "human call row `{}` missing after upsert",
                patch.vapi_call_id
            ))
        })
    }

    async fn find_by_vapi_id(
        &self,
        vapi_call_id: &str,
    ) -> Result<Option<HumanCallRecord>, RepositoryError> {
        let row = sqlx::query(
            "SELECT id, vapi_call_id, duration_seconds, voice_provider, transcript,
                    recording_url, raw_payload, created_at, updated_at
             FROM human_calls
             WHERE vapi_call_id = ?",
        )
        .bind(vapi_call_id)
        .fetch_optional(&self.pool)
        .await?;

        row.map(human_call_from_row).transpose()
    }

    async fn list(&self, limit: i64) -> Result<Vec<HumanCallRecord>, RepositoryError> {
        let rows = sqlx::query(
            "SELECT id, vapi_call_id, duration_seconds, voice_provider, transcript,
                    recording_url, raw_payload, created_at, updated_at
             FROM human_calls
             ORDER BY created_at DESC, id DESC
             LIMIT ?",
        )
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(human_call_from_row).collect()
    }

    async fn stats(&self) -> Result<HumanCallStats, RepositoryError> {
        let row = sqlx::query(
            "SELECT COUNT(*) AS total_calls,
                    AVG(duration_seconds) AS avg_duration,
                    SUM(duration_seconds) AS total_duration
             FROM human_calls",
        )
        .fetch_one(&self.pool)
        .await?;

        Ok(HumanCallStats {
            total_calls: row.try_get("total_calls")?,
            avg_duration: row.try_get("avg_duration")?,
            total_duration: row.try_get("total_duration")?,
        })
    }
}

fn human_call_from_row(row: SqliteRow) -> Result<HumanCallRecord, RepositoryError> {
    Ok(HumanCallRecord {
        id: row.try_get("id")?,
        vapi_call_id: row.try_get("vapi_call_id")?,
        duration_seconds: row.try_get("duration_seconds")?,
        voice_provider: row.try_get("voice_provider")?,
        transcript: row.try_get("transcript")?,
        recording_url: row.try_get("recording_url")?,
        raw_payload: parse_optional_json("raw_payload", row.try_get("raw_payload")?)?,
        created_at: parse_timestamp("created_at", row.try_get("created_at")?)?,
        updated_at: parse_timestamp("updated_at", row.try_get("updated_at")?)?,
    })
}
