//! Wire-level types for webhook events delivered by the call platform.
//!
//! The platform sends loosely-typed JSON: beyond the call id, every field may
//! be absent, and payload shapes drift between event types. All fields are
//! therefore optional and unknown fields are ignored, so a surprising payload
//! degrades to unset values instead of a deserialization failure.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Outer envelope of every webhook delivery: `{ "message": { "type": ... } }`.
#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct WebhookEnvelope {
    pub message: WebhookMessage,
}

/// Inbound webhook message, discriminated by the `type` field.
///
/// Event types the dispatcher does not handle (`transcript`, `tool-calls`,
/// speech updates, ...) collapse into [`WebhookMessage::Other`] and are
/// acknowledged without processing.
#[derive(Clone, Debug, Deserialize, Serialize)]
#[serde(tag = "type")]
pub enum WebhookMessage {
    #[serde(rename = "end-of-call-report")]
    EndOfCallReport(EndOfCallReport),
    #[serde(rename = "status-update")]
    StatusUpdate(StatusUpdate),
    #[serde(rename = "assistant-request")]
    AssistantRequest(AssistantRequest),
    #[serde(other)]
    Other,
}

/// Delivered once a call terminates; carries final status, cost, transcript,
/// and recording. The transcript/recording artifact may appear at the top
/// level, nested under the call, or both.
#[derive(Clone, Debug, Default, Deserialize, Serialize)]
#[serde(rename_all = "camelCase", default)]
pub struct EndOfCallReport {
    #[serde(deserialize_with = "null_as_default")]
    pub call: CallSnapshot,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub artifact: Option<Artifact>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ended_reason: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub duration_seconds: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<String>,
}

/// Lifecycle notification (queued, ringing, in-progress, ended).
#[derive(Clone, Debug, Default, Deserialize, Serialize)]
#[serde(rename_all = "camelCase", default)]
pub struct StatusUpdate {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
    #[serde(deserialize_with = "null_as_default")]
    pub call: CallSnapshot,
}

/// Sent for inbound calls when the platform needs to know which assistant
/// should pick up.
#[derive(Clone, Debug, Default, Deserialize, Serialize)]
#[serde(rename_all = "camelCase", default)]
pub struct AssistantRequest {
    #[serde(deserialize_with = "null_as_default")]
    pub call: CallSnapshot,
}

/// The platform's view of a single call at event time.
#[derive(Clone, Debug, Default, Deserialize, Serialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CallSnapshot {
    pub id: String,
    #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
    pub call_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ended_reason: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cost: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cost_breakdown: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub started_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ended_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub assistant: Option<AssistantSnapshot>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub assistant_id: Option<String>,
    #[serde(deserialize_with = "null_as_default")]
    pub metadata: CallMetadata,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub artifact: Option<Artifact>,
}

/// Metadata echoed back verbatim from call initiation. The orchestrator sets
/// these keys so end-of-call reports can be attributed later.
#[derive(Clone, Debug, Default, Deserialize, Serialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CallMetadata {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub topic: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub experiment_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub agent_role: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub prompt_a: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub prompt_b: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

#[derive(Clone, Debug, Default, Deserialize, Serialize, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct AssistantSnapshot {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub voice: Option<VoiceConfig>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model: Option<ModelConfig>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub first_message: Option<String>,
}

#[derive(Clone, Debug, Default, Deserialize, Serialize, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct VoiceConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub provider: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub voice_id: Option<String>,
}

#[derive(Clone, Debug, Default, Deserialize, Serialize, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct ModelConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub provider: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub messages: Option<Vec<ChatMessage>>,
}

#[derive(Clone, Debug, Deserialize, Serialize, PartialEq)]
pub struct ChatMessage {
    pub role: String,
    pub content: String,
}

/// Transcript, recording, and message-log bundle attached to a call.
#[derive(Clone, Debug, Default, Deserialize, Serialize, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct Artifact {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub transcript: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub messages: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub recording: Option<Recording>,
}

#[derive(Clone, Debug, Default, Deserialize, Serialize, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct Recording {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stereo_url: Option<String>,
}

/// The platform sometimes delivers `"metadata": null` or `"call": null`
/// instead of omitting the key; treat an explicit null like absence.
fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: serde::Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::{WebhookEnvelope, WebhookMessage};

    #[test]
    fn end_of_call_report_parses_with_sparse_fields() {
        let envelope: WebhookEnvelope = serde_json::from_value(json!({
            "message": {
                "type": "end-of-call-report",
                "call": { "id": "call-123" }
            }
        }))
        .expect("sparse report should parse");

        match envelope.message {
            WebhookMessage::EndOfCallReport(report) => {
                assert_eq!(report.call.id, "call-123");
                assert!(report.call.started_at.is_none());
                assert!(report.artifact.is_none());
            }
            other => panic!("unexpected message variant: {other:?}"),
        }
    }

    #[test]
    fn unknown_event_types_collapse_to_other() {
        let envelope: WebhookEnvelope = serde_json::from_value(json!({
            "message": {
                "type": "speech-update",
                "status": "started",
                "call": { "id": "call-456" }
            }
        }))
        .expect("unknown type should still parse");

        assert!(matches!(envelope.message, WebhookMessage::Other));
    }

    #[test]
    fn explicit_null_metadata_degrades_to_defaults() {
        let envelope: WebhookEnvelope = serde_json::from_value(json!({
            "message": {
                "type": "end-of-call-report",
                "call": { "id": "call-321", "metadata": null }
            }
        }))
        .expect("null metadata should parse like an absent one");

        match envelope.message {
            WebhookMessage::EndOfCallReport(report) => {
                assert_eq!(report.call.id, "call-321");
                assert!(report.call.metadata.topic.is_none());
                assert!(report.call.metadata.agent_role.is_none());
            }
            other => panic!("unexpected message variant: {other:?}"),
        }
    }

    #[test]
    fn explicit_null_call_degrades_to_an_empty_snapshot() {
        let envelope: WebhookEnvelope = serde_json::from_value(json!({
            "message": { "type": "status-update", "status": "queued", "call": null }
        }))
        .expect("null call should parse like an absent one");

        match envelope.message {
            WebhookMessage::StatusUpdate(update) => {
                assert_eq!(update.status.as_deref(), Some("queued"));
                assert!(update.call.id.is_empty());
            }
            other => panic!("unexpected message variant: {other:?}"),
        }
    }

    #[test]
    fn unknown_fields_inside_known_events_are_ignored() {
        let envelope: WebhookEnvelope = serde_json::from_value(json!({
            "message": {
                "type": "status-update",
                "status": "in-progress",
                "call": { "id": "call-789", "orgId": "org-1", "monitor": {"listenUrl": "wss://x"} }
            }
        }))
        .expect("extra fields should be ignored");

        match envelope.message {
            WebhookMessage::StatusUpdate(update) => {
                assert_eq!(update.status.as_deref(), Some("in-progress"));
                assert_eq!(update.call.id, "call-789");
            }
            other => panic!("unexpected message variant: {other:?}"),
        }
    }
}
