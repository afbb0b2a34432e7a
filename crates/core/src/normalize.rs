//! Event Normalizer: pure transformations from wire-level webhook messages
//! into storage patches.
//!
//! Nothing here performs I/O. The dispatcher hands in the parsed message plus
//! the raw JSON it was parsed from (kept verbatim for forensic replay), and
//! gets back a patch the repository layer upserts.
//!
//! Two product modes share the end-of-call path: the two-agent variant
//! ([`end_of_call_patch`]) and the human-caller variant
//! ([`human_end_of_call_patch`]). They are deliberately kept as two named
//! functions rather than one parameterized pipeline; their field sets and
//! fallback orders are allowed to diverge independently.

use serde::Serialize;
use serde_json::Value;

use crate::config::VapiConfig;
use crate::domain::{AgentIdentity, AgentSlot, CallPatch, HumanCallPatch};
use crate::event::{
    Artifact, ChatMessage, EndOfCallReport, ModelConfig, VoiceConfig,
};

/// Greeting used when no receiving assistant is configured and the platform
/// asks for one inline.
const TRANSIENT_FIRST_MESSAGE: &str = "Hello, I'm ready to have a conversation with you.";
const TRANSIENT_SYSTEM_PROMPT: &str =
    "You are a helpful AI assistant having a phone conversation. Be natural, engaging, and concise.";
const TRANSIENT_MODEL_PROVIDER: &str = "openai";
const TRANSIENT_MODEL: &str = "gpt-4o";
const TRANSIENT_VOICE_PROVIDER: &str = "11labs";
const TRANSIENT_VOICE_ID: &str = "21m00Tcm4TlvDq8ikWAM";

/// Call reports are attributed to Agent A when the initiation metadata says
/// so, or when the call is a recognized outbound phone call (A initiates,
/// B receives). Everything else lands on Agent B.
const AGENT_A_ROLE: &str = "A";
const OUTBOUND_CALL_TYPE: &str = "outboundPhoneCall";

/// Artifact-backed fields (transcript, message log, recording URL) resolve
/// against an ordered candidate list: the top-level `artifact` on the event
/// first, then `call.artifact`. The order is applied independently per field,
/// so a top-level artifact missing only its recording still falls through to
/// the nested one for that field alone.
fn artifact_sources(report: &EndOfCallReport) -> [Option<&Artifact>; 2] {
    [report.artifact.as_ref(), report.call.artifact.as_ref()]
}

fn from_artifacts<T>(
    report: &EndOfCallReport,
    pick: impl Fn(&Artifact) -> Option<T>,
) -> Option<T> {
    artifact_sources(report).into_iter().flatten().find_map(|artifact| pick(artifact))
}

/// Duration preference order: an explicit `durationSeconds` on the event wins;
/// otherwise compute `round((ended - started) / 1000)` when both timestamps
/// are present. Nearest-integer rounding, not truncation.
fn duration_seconds(report: &EndOfCallReport) -> Option<i64> {
    if let Some(explicit) = report.duration_seconds {
        return Some(explicit.round() as i64);
    }
    match (report.call.started_at, report.call.ended_at) {
        (Some(started), Some(ended)) => {
            let millis = (ended - started).num_milliseconds();
            Some((millis as f64 / 1000.0).round() as i64)
        }
        _ => None,
    }
}

fn agent_identity(report: &EndOfCallReport) -> AgentIdentity {
    let assistant = report.call.assistant.as_ref();
    let voice = assistant.and_then(|a| a.voice.as_ref());
    let model = assistant.and_then(|a| a.model.as_ref());

    AgentIdentity {
        assistant_id: report
            .call
            .assistant_id
            .clone()
            .or_else(|| assistant.and_then(|a| a.id.clone())),
        voice_provider: voice.and_then(|v| v.provider.clone()),
        voice_id: voice.and_then(|v| v.voice_id.clone()),
        model_provider: model.and_then(|m| m.provider.clone()),
        model: model.and_then(|m| m.model.clone()),
    }
}

fn is_agent_a(report: &EndOfCallReport) -> bool {
    report.call.metadata.agent_role.as_deref() == Some(AGENT_A_ROLE)
        || report.call.call_type.as_deref() == Some(OUTBOUND_CALL_TYPE)
}

/// Normalize an end-of-call report into a two-agent call patch.
///
/// `raw_payload` is the unmodified message JSON as delivered; it rides along
/// in the patch so the stored row can be replayed or inspected later.
pub fn end_of_call_patch(report: &EndOfCallReport, raw_payload: Value) -> CallPatch {
    let identity = agent_identity(report);
    let agent = if is_agent_a(report) {
        AgentSlot::A(identity)
    } else {
        AgentSlot::B(identity)
    };

    CallPatch {
        vapi_call_id: report.call.id.clone(),
        experiment_id: report.call.metadata.experiment_id.clone(),
        topic: report.call.metadata.topic.clone(),
        agent: Some(agent),
        agent_a_prompt: report.call.metadata.prompt_a.clone(),
        agent_b_prompt: report.call.metadata.prompt_b.clone(),
        status: Some(report.call.status.clone().unwrap_or_else(|| "ended".to_string())),
        ended_reason: report.call.ended_reason.clone().or_else(|| report.ended_reason.clone()),
        started_at: report.call.started_at,
        ended_at: report.call.ended_at,
        duration_seconds: duration_seconds(report),
        transcript: from_artifacts(report, |a| a.transcript.clone()),
        messages: from_artifacts(report, |a| a.messages.clone()),
        recording_url: from_artifacts(report, |a| {
            a.recording.as_ref().and_then(|r| r.url.clone())
        }),
        cost: report.call.cost,
        cost_breakdown: report.call.cost_breakdown.clone(),
        raw_payload: Some(raw_payload),
    }
}

/// Normalize an end-of-call report for the human-caller mode.
///
/// Near-duplicate of [`end_of_call_patch`] with a reduced field set: no agent
/// slots, no experiment attribution. Kept separate on purpose.
pub fn human_end_of_call_patch(report: &EndOfCallReport, raw_payload: Value) -> HumanCallPatch {
    let voice_provider = report
        .call
        .assistant
        .as_ref()
        .and_then(|a| a.voice.as_ref())
        .and_then(|v| v.provider.clone());

    HumanCallPatch {
        vapi_call_id: report.call.id.clone(),
        duration_seconds: duration_seconds(report),
        voice_provider,
        transcript: from_artifacts(report, |a| a.transcript.clone()),
        recording_url: from_artifacts(report, |a| {
            a.recording.as_ref().and_then(|r| r.url.clone())
        }),
        raw_payload: Some(raw_payload),
    }
}

/// Response to an `assistant-request` event: either the statically configured
/// receiving assistant, or an inline transient assistant as a fallback.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(untagged)]
pub enum AssistantResponse {
    Configured {
        #[serde(rename = "assistantId")]
        assistant_id: String,
    },
    Transient {
        assistant: TransientAssistant,
    },
}

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TransientAssistant {
    pub first_message: String,
    pub model: ModelConfig,
    pub voice: VoiceConfig,
}

/// Resolve which assistant should take an inbound call. Pure lookup against
/// the deployment configuration; no state, no learning.
pub fn resolve_assistant(vapi: &VapiConfig) -> AssistantResponse {
    if let Some(assistant_id) = vapi.assistant_b_id.clone().filter(|id| !id.is_empty()) {
        return AssistantResponse::Configured { assistant_id };
    }

    AssistantResponse::Transient {
        assistant: TransientAssistant {
            first_message: TRANSIENT_FIRST_MESSAGE.to_string(),
            model: ModelConfig {
                provider: Some(TRANSIENT_MODEL_PROVIDER.to_string()),
                model: Some(TRANSIENT_MODEL.to_string()),
                messages: Some(vec![ChatMessage {
                    role: "system".to_string(),
                    content: TRANSIENT_SYSTEM_PROMPT.to_string(),
                }]),
            },
            voice: VoiceConfig {
                provider: Some(TRANSIENT_VOICE_PROVIDER.to_string()),
                voice_id: Some(TRANSIENT_VOICE_ID.to_string()),
            },
        },
    }
}

#[cfg(test)]
mod tests {
    use serde_json::{json, Value};

    use crate::config::VapiConfig;
    use crate::domain::AgentSlot;
    use crate::event::{EndOfCallReport, WebhookEnvelope, WebhookMessage};

    use super::{end_of_call_patch, human_end_of_call_patch, resolve_assistant, AssistantResponse};

    fn report_from(message: Value) -> (EndOfCallReport, Value) {
        let envelope: WebhookEnvelope =
            serde_json::from_value(json!({ "message": message })).expect("envelope should parse");
        match envelope.message {
            WebhookMessage::EndOfCallReport(report) => (report, message),
            other => panic!("expected end-of-call-report, got {other:?}"),
        }
    }

    #[test]
    fn duration_is_rounded_from_timestamps() {
        let (report, raw) = report_from(json!({
            "type": "end-of-call-report",
            "call": {
                "id": "call-1",
                "startedAt": "2024-01-01T00:00:00Z",
                "endedAt": "2024-01-01T00:01:30Z"
            }
        }));

        let patch = end_of_call_patch(&report, raw);
        assert_eq!(patch.duration_seconds, Some(90));
    }

    #[test]
    fn half_second_deltas_round_up_not_truncate() {
        let (report, raw) = report_from(json!({
            "type": "end-of-call-report",
            "call": {
                "id": "call-2",
                "startedAt": "2024-01-01T00:00:00.000Z",
                "endedAt": "2024-01-01T00:00:01.500Z"
            }
        }));

        let patch = end_of_call_patch(&report, raw);
        assert_eq!(patch.duration_seconds, Some(2));
    }

    #[test]
    fn explicit_duration_beats_computed_duration() {
        let (report, raw) = report_from(json!({
            "type": "end-of-call-report",
            "durationSeconds": 42.4,
            "call": {
                "id": "call-3",
                "startedAt": "2024-01-01T00:00:00Z",
                "endedAt": "2024-01-01T00:01:30Z"
            }
        }));

        let patch = end_of_call_patch(&report, raw);
        assert_eq!(patch.duration_seconds, Some(42));
    }

    #[test]
    fn duration_is_unset_without_timestamps() {
        let (report, raw) = report_from(json!({
            "type": "end-of-call-report",
            "call": { "id": "call-4", "startedAt": "2024-01-01T00:00:00Z" }
        }));

        let patch = end_of_call_patch(&report, raw);
        assert_eq!(patch.duration_seconds, None);
    }

    #[test]
    fn explicit_agent_role_a_populates_slot_a() {
        let (report, raw) = report_from(json!({
            "type": "end-of-call-report",
            "call": {
                "id": "call-5",
                "assistantId": "asst-a",
                "metadata": { "agentRole": "A" },
                "assistant": {
                    "voice": { "provider": "11labs", "voiceId": "rachel" },
                    "model": { "provider": "openai", "model": "gpt-4o" }
                }
            }
        }));

        let patch = end_of_call_patch(&report, raw);
        match patch.agent {
            Some(AgentSlot::A(identity)) => {
                assert_eq!(identity.assistant_id.as_deref(), Some("asst-a"));
                assert_eq!(identity.voice_provider.as_deref(), Some("11labs"));
                assert_eq!(identity.voice_id.as_deref(), Some("rachel"));
                assert_eq!(identity.model_provider.as_deref(), Some("openai"));
                assert_eq!(identity.model.as_deref(), Some("gpt-4o"));
            }
            other => panic!("expected agent slot A, got {other:?}"),
        }
    }

    #[test]
    fn outbound_call_without_role_metadata_is_agent_a() {
        let (report, raw) = report_from(json!({
            "type": "end-of-call-report",
            "call": { "id": "call-6", "type": "outboundPhoneCall" }
        }));

        let patch = end_of_call_patch(&report, raw);
        assert!(matches!(patch.agent, Some(AgentSlot::A(_))));
    }

    #[test]
    fn inbound_call_without_role_metadata_is_agent_b() {
        let (report, raw) = report_from(json!({
            "type": "end-of-call-report",
            "call": { "id": "call-7", "type": "inboundPhoneCall" }
        }));

        let patch = end_of_call_patch(&report, raw);
        assert!(matches!(patch.agent, Some(AgentSlot::B(_))));
    }

    #[test]
    fn top_level_artifact_wins_over_call_artifact_per_field() {
        let (report, raw) = report_from(json!({
            "type": "end-of-call-report",
            "artifact": { "transcript": "outer transcript" },
            "call": {
                "id": "call-8",
                "artifact": {
                    "transcript": "inner transcript",
                    "recording": { "url": "https://rec.example/inner.wav" }
                }
            }
        }));

        let patch = end_of_call_patch(&report, raw);
        // Transcript comes from the top level, recording falls through to the
        // nested artifact independently.
        assert_eq!(patch.transcript.as_deref(), Some("outer transcript"));
        assert_eq!(patch.recording_url.as_deref(), Some("https://rec.example/inner.wav"));
    }

    #[test]
    fn status_defaults_to_ended_and_reason_prefers_call_field() {
        let (report, raw) = report_from(json!({
            "type": "end-of-call-report",
            "endedReason": "outer-reason",
            "call": { "id": "call-9", "endedReason": "customer-ended-call" }
        }));

        let patch = end_of_call_patch(&report, raw);
        assert_eq!(patch.status.as_deref(), Some("ended"));
        assert_eq!(patch.ended_reason.as_deref(), Some("customer-ended-call"));
    }

    #[test]
    fn ended_reason_falls_back_to_message_level() {
        let (report, raw) = report_from(json!({
            "type": "end-of-call-report",
            "endedReason": "assistant-ended-call",
            "call": { "id": "call-10" }
        }));

        let patch = end_of_call_patch(&report, raw);
        assert_eq!(patch.ended_reason.as_deref(), Some("assistant-ended-call"));
    }

    #[test]
    fn metadata_attribution_and_raw_payload_are_carried() {
        let message = json!({
            "type": "end-of-call-report",
            "call": {
                "id": "call-11",
                "cost": 0.37,
                "costBreakdown": { "llm": 0.2, "tts": 0.17 },
                "metadata": {
                    "topic": "restaurant_reservation",
                    "experimentId": "exp-1",
                    "promptA": "You are booking a table.",
                    "promptB": "You are a host taking reservations."
                }
            }
        });
        let (report, raw) = report_from(message.clone());

        let patch = end_of_call_patch(&report, raw);
        assert_eq!(patch.topic.as_deref(), Some("restaurant_reservation"));
        assert_eq!(patch.experiment_id.as_deref(), Some("exp-1"));
        assert_eq!(patch.agent_a_prompt.as_deref(), Some("You are booking a table."));
        assert_eq!(patch.cost, Some(0.37));
        assert_eq!(patch.raw_payload, Some(message));
    }

    #[test]
    fn missing_assistant_config_yields_unset_identity_not_error() {
        let (report, raw) = report_from(json!({
            "type": "end-of-call-report",
            "call": { "id": "call-12", "metadata": { "agentRole": "A" } }
        }));

        let patch = end_of_call_patch(&report, raw);
        match patch.agent {
            Some(AgentSlot::A(identity)) => {
                assert!(identity.assistant_id.is_none());
                assert!(identity.voice_provider.is_none());
                assert!(identity.model.is_none());
            }
            other => panic!("expected agent slot A, got {other:?}"),
        }
    }

    #[test]
    fn human_variant_extracts_voice_provider_and_artifacts() {
        let (report, raw) = report_from(json!({
            "type": "end-of-call-report",
            "artifact": {
                "transcript": "hello there",
                "recording": { "url": "https://rec.example/human.wav" }
            },
            "call": {
                "id": "call-13",
                "startedAt": "2024-05-01T10:00:00Z",
                "endedAt": "2024-05-01T10:02:00Z",
                "assistant": { "voice": { "provider": "cartesia", "voiceId": "sonic" } }
            }
        }));

        let patch = human_end_of_call_patch(&report, raw);
        assert_eq!(patch.vapi_call_id, "call-13");
        assert_eq!(patch.duration_seconds, Some(120));
        assert_eq!(patch.voice_provider.as_deref(), Some("cartesia"));
        assert_eq!(patch.transcript.as_deref(), Some("hello there"));
        assert_eq!(patch.recording_url.as_deref(), Some("https://rec.example/human.wav"));
    }

    #[test]
    fn assistant_request_prefers_configured_assistant() {
        let vapi = VapiConfig { assistant_b_id: Some("asst-b-42".to_string()), ..VapiConfig::default() };

        let response = resolve_assistant(&vapi);
        assert_eq!(
            response,
            AssistantResponse::Configured { assistant_id: "asst-b-42".to_string() }
        );
        let body = serde_json::to_value(&response).expect("serialize");
        assert_eq!(body, json!({ "assistantId": "asst-b-42" }));
    }

    #[test]
    fn assistant_request_falls_back_to_transient_assistant() {
        let response = resolve_assistant(&VapiConfig::default());

        match &response {
            AssistantResponse::Transient { assistant } => {
                assert_eq!(assistant.model.provider.as_deref(), Some("openai"));
                assert_eq!(assistant.voice.provider.as_deref(), Some("11labs"));
            }
            other => panic!("expected transient assistant, got {other:?}"),
        }
        let body = serde_json::to_value(&response).expect("serialize");
        assert!(body.get("assistant").is_some());
        assert!(body.get("assistantId").is_none());
    }
}
