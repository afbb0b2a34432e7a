//! Outbound client for the call platform's REST API. Only the call-creation
//! endpoint is wrapped; everything else arrives through the webhook receiver.

use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crosstalk_core::config::{ConfigError, VapiConfig};
use crosstalk_core::topics::TopicConfig;

#[derive(Debug, Error)]
pub enum InitiationError {
    #[error("call platform returned {status}: {body}")]
    Api { status: u16, body: String },
    #[error("call platform transport error: {0}")]
    Transport(#[from] reqwest::Error),
}

/// Credentials that outbound calling cannot run without. Building this struct
/// front-loads the validation so the batch loop never sees a half-configured
/// client.
#[derive(Clone, Debug)]
pub struct OutboundIdentity {
    pub phone_number_id: String,
    pub customer_number: String,
    pub assistant_a_id: String,
}

impl OutboundIdentity {
    pub fn from_config(vapi: &VapiConfig) -> Result<Self, ConfigError> {
        vapi.require_outbound()?;
        Ok(Self {
            phone_number_id: vapi.phone_number_id.clone().unwrap_or_default(),
            customer_number: vapi.customer_number.clone().unwrap_or_default(),
            assistant_a_id: vapi.assistant_a_id.clone().unwrap_or_default(),
        })
    }
}

#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateCallRequest {
    pub phone_number_id: String,
    pub assistant_id: String,
    pub customer: Customer,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub assistant_overrides: Option<AssistantOverrides>,
    pub metadata: CallMetadata,
    pub name: String,
}

#[derive(Clone, Debug, Serialize)]
pub struct Customer {
    pub number: String,
}

#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AssistantOverrides {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model: Option<ModelOverride>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub first_message: Option<String>,
}

#[derive(Clone, Debug, Serialize)]
pub struct ModelOverride {
    pub provider: String,
    pub model: String,
    pub messages: Vec<SystemMessage>,
}

#[derive(Clone, Debug, Serialize)]
pub struct SystemMessage {
    pub role: String,
    pub content: String,
}

/// Rides along on the call and comes back verbatim in webhook deliveries;
/// this is how end-of-call reports are tied back to their experiment.
#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CallMetadata {
    pub topic: String,
    pub experiment_id: String,
    pub agent_role: String,
    pub prompt_a: String,
    pub prompt_b: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

#[derive(Clone, Debug, Deserialize)]
pub struct CreatedCall {
    pub id: String,
}

pub fn build_call_request(
    identity: &OutboundIdentity,
    topic: &TopicConfig,
    experiment_id: &str,
) -> CreateCallRequest {
    CreateCallRequest {
        phone_number_id: identity.phone_number_id.clone(),
        assistant_id: identity.assistant_a_id.clone(),
        customer: Customer { number: identity.customer_number.clone() },
        assistant_overrides: Some(AssistantOverrides {
            model: Some(ModelOverride {
                provider: "openai".to_string(),
                model: "gpt-4o".to_string(),
                messages: vec![SystemMessage {
                    role: "system".to_string(),
                    content: topic.prompt_a.to_string(),
                }],
            }),
            first_message: topic.first_message_a.map(str::to_string),
        }),
        metadata: CallMetadata {
            topic: topic.topic.to_string(),
            experiment_id: experiment_id.to_string(),
            agent_role: "A".to_string(),
            prompt_a: topic.prompt_a.to_string(),
            prompt_b: topic.prompt_b.to_string(),
            description: topic.description.map(str::to_string),
        },
        name: format!("{}-{}", topic.topic, chrono::Utc::now().timestamp_millis()),
    }
}

/// Seam between the orchestrator and the network so batch logic is testable
/// without a live platform account.
#[async_trait]
pub trait CallInitiator: Send + Sync {
    async fn initiate(&self, request: &CreateCallRequest) -> Result<CreatedCall, InitiationError>;
}

pub struct VapiClient {
    http: reqwest::Client,
    base_url: String,
    api_key: SecretString,
}

impl VapiClient {
    pub fn new(config: &VapiConfig) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: config.base_url.trim_end_matches('/').to_string(),
            api_key: config.api_key.clone(),
        }
    }
}

#[async_trait]
impl CallInitiator for VapiClient {
    async fn initiate(&self, request: &CreateCallRequest) -> Result<CreatedCall, InitiationError> {
        let response = self
            .http
            .post(format!("{}/call", self.base_url))
            .bearer_auth(self.api_key.expose_secret())
            .json(request)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(InitiationError::Api { status: status.as_u16(), body });
        }

        Ok(response.json().await?)
    }
}
