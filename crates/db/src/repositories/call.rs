use chrono::Utc;
use sqlx::{sqlite::SqliteRow, Row};

use crosstalk_core::domain::{AgentIdentity, AgentSlot, CallPatch, CallRecord, CallStats};

use super::{
    parse_optional_json, parse_optional_timestamp, parse_timestamp, CallRepository,
    RepositoryError,
};
use crate::DbPool;

pub struct SqlCallRepository {
    pool: DbPool,
}

impl SqlCallRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

const CALL_COLUMNS: &str = "id,
    vapi_call_id,
    experiment_id,
    topic,
    agent_a_assistant_id,
    agent_a_voice_provider,
    agent_a_voice_id,
    agent_a_model_provider,
    agent_a_model,
    agent_a_prompt,
    agent_b_assistant_id,
    agent_b_voice_provider,
    agent_b_voice_id,
    agent_b_model_provider,
    agent_b_model,
    agent_b_prompt,
    status,
    ended_reason,
    started_at,
    ended_at,
    duration_seconds,
    transcript,
    messages,
    recording_url,
    cost,
    cost_breakdown,
    raw_payload,
    created_at,
    updated_at";

#[async_trait::async_trait]
impl CallRepository for SqlCallRepository {
    async fn upsert(&self, patch: &CallPatch) -> Result<CallRecord, RepositoryError> {
        // One atomic statement so concurrent deliveries for the same call id
        // never interleave a read-then-write. The patch carries at most one
        // agent slot; the other slot binds null and the COALESCE keeps
        // whatever an earlier delivery stored there.
        let (agent_a, agent_b) = match &patch.agent {
            Some(AgentSlot::A(identity)) => (Some(identity), None),
            Some(AgentSlot::B(identity)) => (None, Some(identity)),
            None => (None, None),
        };
        let now = Utc::now().to_rfc3339();

        sqlx::query(
            "INSERT INTO calls (
                vapi_call_id,
                experiment_id,
                topic,
                agent_a_assistant_id,
                agent_a_voice_provider,
                agent_a_voice_id,
                agent_a_model_provider,
                agent_a_model,
                agent_a_prompt,
                agent_b_assistant_id,
                agent_b_voice_provider,
                agent_b_voice_id,
                agent_b_model_provider,
                agent_b_model,
                agent_b_prompt,
                status,
                ended_reason,
                started_at,
                ended_at,
                duration_seconds,
                transcript,
                messages,
                recording_url,
                cost,
                cost_breakdown,
                raw_payload,
                created_at,
                updated_at
             ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
             ON CONFLICT(vapi_call_id) DO UPDATE SET
                experiment_id = COALESCE(excluded.experiment_id, calls.experiment_id),
                topic = COALESCE(excluded.topic, calls.topic),
                agent_a_assistant_id = COALESCE(excluded.agent_a_assistant_id, calls.agent_a_assistant_id),
                agent_a_voice_provider = COALESCE(excluded.agent_a_voice_provider, calls.agent_a_voice_provider),
                agent_a_voice_id = COALESCE(excluded.agent_a_voice_id, calls.agent_a_voice_id),
                agent_a_model_provider = COALESCE(excluded.agent_a_model_provider, calls.agent_a_model_provider),
                agent_a_model = COALESCE(excluded.agent_a_model, calls.agent_a_model),
                agent_a_prompt = COALESCE(excluded.agent_a_prompt, calls.agent_a_prompt),
                agent_b_assistant_id = COALESCE(excluded.agent_b_assistant_id, calls.agent_b_assistant_id),
                agent_b_voice_provider = COALESCE(excluded.agent_b_voice_provider, calls.agent_b_voice_provider),
                agent_b_voice_id = COALESCE(excluded.agent_b_voice_id, calls.agent_b_voice_id),
                agent_b_model_provider = COALESCE(excluded.agent_b_model_provider, calls.agent_b_model_provider),
                agent_b_model = COALESCE(excluded.agent_b_model, calls.agent_b_model),
                agent_b_prompt = COALESCE(excluded.agent_b_prompt, calls.agent_b_prompt),
                status = COALESCE(excluded.status, calls.status),
                ended_reason = COALESCE(excluded.ended_reason, calls.ended_reason),
                started_at = COALESCE(excluded.started_at, calls.started_at),
                ended_at = COALESCE(excluded.ended_at, calls.ended_at),
                duration_seconds = COALESCE(excluded.duration_seconds, calls.duration_seconds),
                transcript = COALESCE(excluded.transcript, calls.transcript),
                messages = COALESCE(excluded.messages, calls.messages),
                recording_url = COALESCE(excluded.recording_url, calls.recording_url),
                cost = COALESCE(excluded.cost, calls.cost),
                cost_breakdown = COALESCE(excluded.cost_breakdown, calls.cost_breakdown),
                raw_payload = COALESCE(excluded.raw_payload, calls.raw_payload),
                updated_at = excluded.updated_at",
        )
        .bind(&patch.vapi_call_id)
        .bind(patch.experiment_id.as_deref())
        .bind(patch.topic.as_deref())
        .bind(identity_field(agent_a, |i| i.assistant_id.as_deref()))
        .bind(identity_field(agent_a, |i| i.voice_provider.as_deref()))
        .bind(identity_field(agent_a, |i| i.voice_id.as_deref()))
        .bind(identity_field(agent_a, |i| i.model_provider.as_deref()))
        .bind(identity_field(agent_a, |i| i.model.as_deref()))
        .bind(patch.agent_a_prompt.as_deref())
        .bind(identity_field(agent_b, |i| i.assistant_id.as_deref()))
        .bind(identity_field(agent_b, |i| i.voice_provider.as_deref()))
        .bind(identity_field(agent_b, |i| i.voice_id.as_deref()))
        .bind(identity_field(agent_b, |i| i.model_provider.as_deref()))
        .bind(identity_field(agent_b, |i| i.model.as_deref()))
        .bind(patch.agent_b_prompt.as_deref())
        .bind(patch.status.as_deref())
        .bind(patch.ended_reason.as_deref())
        .bind(patch.started_at.map(|value| value.to_rfc3339()))
        .bind(patch.ended_at.map(|value| value.to_rfc3339()))
        .bind(patch.duration_seconds)
        .bind(patch.transcript.as_deref())
        .bind(patch.messages.as_ref().map(|value| value.to_string()))
        .bind(patch.recording_url.as_deref())
        .bind(patch.cost)
        .bind(patch.cost_breakdown.as_ref().map(|value| value.to_string()))
        .bind(patch.raw_payload.as_ref().map(|value| value.to_string()))
        .bind(&now)
        .bind(&now)
        .execute(&self.pool)
        .await?;

        self.find_by_vapi_id(&patch.vapi_call_id).await?.ok_or_else(|| {
            RepositoryError::Decode(format!("call row `{}` missing after upsert", patch.vapi_call_id))
        })
    }

    async fn find_by_vapi_id(
        &self,
        vapi_call_id: &str,
    ) -> Result<Option<CallRecord>, RepositoryError> {
        let row = sqlx::query(&format!("SELECT {CALL_COLUMNS} FROM calls WHERE vapi_call_id = ?"))
            .bind(vapi_call_id)
            .fetch_optional(&self.pool)
            .await?;

        row.map(call_from_row).transpose()
    }

    async fn list(
        &self,
        experiment_id: Option<&str>,
        limit: i64,
    ) -> Result<Vec<CallRecord>, RepositoryError> {
        let rows = if let Some(experiment_id) = experiment_id {
            sqlx::query(&format!(
                "SELECT {CALL_COLUMNS} FROM calls
                 WHERE experiment_id = ?
                 ORDER BY created_at DESC, id DESC
                 LIMIT ?"
            ))
            .bind(experiment_id)
            .bind(limit)
            .fetch_all(&self.pool)
            .await?
        } else {
            sqlx::query(&format!(
                "SELECT {CALL_COLUMNS} FROM calls
                 ORDER BY created_at DESC, id DESC
                 LIMIT ?"
            ))
            .bind(limit)
            .fetch_all(&self.pool)
            .await?
        };

        rows.into_iter().map(call_from_row).collect()
    }

    async fn stats(&self, experiment_id: Option<&str>) -> Result<CallStats, RepositoryError> {
        const AGGREGATES: &str = "COUNT(*) AS total_calls,
             COUNT(DISTINCT topic) AS unique_topics,
             AVG(duration_seconds) AS avg_duration,
             SUM(cost) AS total_cost,
             COUNT(CASE WHEN status = 'ended' THEN 1 END) AS completed_calls";

        let row = if let Some(experiment_id) = experiment_id {
            sqlx::query(&format!("SELECT {AGGREGATES} FROM calls WHERE experiment_id = ?"))
                .bind(experiment_id)
                .fetch_one(&self.pool)
                .await?
        } else {
            sqlx::query(&format!("SELECT {AGGREGATES} FROM calls")).fetch_one(&self.pool).await?
        };

        Ok(CallStats {
            total_calls: row.try_get("total_calls")?,
            unique_topics: row.try_get("unique_topics")?,
            avg_duration: row.try_get("avg_duration")?,
            total_cost: row.try_get("total_cost")?,
            completed_calls: row.try_get("completed_calls")?,
        })
    }
}

fn identity_field<'a>(
    identity: Option<&'a AgentIdentity>,
    pick: fn(&'a AgentIdentity) -> Option<&'a str>,
) -> Option<&'a str> {
    identity.and_then(pick)
}

fn call_from_row(row: SqliteRow) -> Result<CallRecord, RepositoryError> {
    Ok(CallRecord {
        id: row.try_get("id")?,
        vapi_call_id: row.try_get("vapi_call_id")?,
        experiment_id: row.try_get("experiment_id")?,
        topic: row.try_get("topic")?,
        agent_a_assistant_id: row.try_get("agent_a_assistant_id")?,
        agent_a_voice_provider: row.try_get("agent_a_voice_provider")?,
        agent_a_voice_id: row.try_get("agent_a_voice_id")?,
        agent_a_model_provider: row.try_get("agent_a_model_provider")?,
        agent_a_model: row.try_get("agent_a_model")?,
        agent_a_prompt: row.try_get("agent_a_prompt")?,
        agent_b_assistant_id: row.try_get("agent_b_assistant_id")?,
        agent_b_voice_provider: row.try_get("agent_b_voice_provider")?,
        agent_b_voice_id: row.try_get("agent_b_voice_id")?,
        agent_b_model_provider: row.try_get("agent_b_model_provider")?,
        agent_b_model: row.try_get("agent_b_model")?,
        agent_b_prompt: row.try_get("agent_b_prompt")?,
        status: row.try_get("status")?,
        ended_reason: row.try_get("ended_reason")?,
        started_at: parse_optional_timestamp("started_at", row.try_get("started_at")?)?,
        ended_at: parse_optional_timestamp("ended_at", row.try_get("ended_at")?)?,
        duration_seconds: row.try_get("duration_seconds")?,
        transcript: row.try_get("transcript")?,
        messages: parse_optional_json("messages", row.try_get("messages")?)?,
        recording_url: row.try_get("recording_url")?,
        cost: row.try_get("cost")?,
        cost_breakdown: parse_optional_json("cost_breakdown", row.try_get("cost_breakdown")?)?,
        raw_payload: parse_optional_json("raw_payload", row.try_get("raw_payload")?)?,
        created_at: parse_timestamp("created_at", row.try_get("created_at")?)?,
        updated_at: parse_timestamp("updated_at", row.try_get("updated_at")?)?,
    })
}
