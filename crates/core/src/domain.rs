//! Domain records and patch values shared between the normalizer, the
//! repositories, and the API surface.

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;

/// One orchestration run. Created once per batch, immutable thereafter.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Experiment {
    pub id: String,
    pub name: String,
    pub description: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Voice and model identity extracted from a call's assistant configuration.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct AgentIdentity {
    pub assistant_id: Option<String>,
    pub voice_provider: Option<String>,
    pub voice_id: Option<String>,
    pub model_provider: Option<String>,
    pub model: Option<String>,
}

/// Which conversation participant an end-of-call report describes.
///
/// A patch carries at most one slot; the store maps it onto the matching
/// column group and leaves the other group untouched. Modeling the choice as
/// a tagged value keeps a single merge path for both roles.
#[derive(Clone, Debug, PartialEq)]
pub enum AgentSlot {
    A(AgentIdentity),
    B(AgentIdentity),
}

impl AgentSlot {
    pub fn identity(&self) -> &AgentIdentity {
        match self {
            Self::A(identity) | Self::B(identity) => identity,
        }
    }
}

/// Field-level update for one call row, keyed by the platform call id.
///
/// `None` means "leave the stored value alone", never "clear it"; the store's
/// upsert coalesces per column.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct CallPatch {
    pub vapi_call_id: String,
    pub experiment_id: Option<String>,
    pub topic: Option<String>,
    pub agent: Option<AgentSlot>,
    pub agent_a_prompt: Option<String>,
    pub agent_b_prompt: Option<String>,
    pub status: Option<String>,
    pub ended_reason: Option<String>,
    pub started_at: Option<DateTime<Utc>>,
    pub ended_at: Option<DateTime<Utc>>,
    pub duration_seconds: Option<i64>,
    pub transcript: Option<String>,
    pub messages: Option<Value>,
    pub recording_url: Option<String>,
    pub cost: Option<f64>,
    pub cost_breakdown: Option<Value>,
    pub raw_payload: Option<Value>,
}

/// A fully materialized call row.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct CallRecord {
    pub id: i64,
    pub vapi_call_id: String,
    pub experiment_id: Option<String>,
    pub topic: Option<String>,
    pub agent_a_assistant_id: Option<String>,
    pub agent_a_voice_provider: Option<String>,
    pub agent_a_voice_id: Option<String>,
    pub agent_a_model_provider: Option<String>,
    pub agent_a_model: Option<String>,
    pub agent_a_prompt: Option<String>,
    pub agent_b_assistant_id: Option<String>,
    pub agent_b_voice_provider: Option<String>,
    pub agent_b_voice_id: Option<String>,
    pub agent_b_model_provider: Option<String>,
    pub agent_b_model: Option<String>,
    pub agent_b_prompt: Option<String>,
    pub status: Option<String>,
    pub ended_reason: Option<String>,
    pub started_at: Option<DateTime<Utc>>,
    pub ended_at: Option<DateTime<Utc>>,
    pub duration_seconds: Option<i64>,
    pub transcript: Option<String>,
    pub messages: Option<Value>,
    pub recording_url: Option<String>,
    pub cost: Option<f64>,
    pub cost_breakdown: Option<Value>,
    pub raw_payload: Option<Value>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Aggregate projection over call rows. Rows with null duration/cost are
/// excluded from the average/sum per SQL aggregate semantics.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct CallStats {
    pub total_calls: i64,
    pub unique_topics: i64,
    pub avg_duration: Option<f64>,
    pub total_cost: Option<f64>,
    pub completed_calls: i64,
}

/// Field-level update for one human-caller row. Same coalesce semantics as
/// [`CallPatch`].
#[derive(Clone, Debug, Default, PartialEq)]
pub struct HumanCallPatch {
    pub vapi_call_id: String,
    pub duration_seconds: Option<i64>,
    pub voice_provider: Option<String>,
    pub transcript: Option<String>,
    pub recording_url: Option<String>,
    pub raw_payload: Option<Value>,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct HumanCallRecord {
    pub id: i64,
    pub vapi_call_id: String,
    pub duration_seconds: Option<i64>,
    pub voice_provider: Option<String>,
    pub transcript: Option<String>,
    pub recording_url: Option<String>,
    pub raw_payload: Option<Value>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct HumanCallStats {
    pub total_calls: i64,
    pub avg_duration: Option<f64>,
    pub total_duration: Option<i64>,
}
