pub mod config;
pub mod domain;
pub mod event;
pub mod normalize;
pub mod topics;

pub use chrono;

pub use config::{AppConfig, CallMode, ConfigError, ConfigOverrides, LoadOptions, VapiConfig};
pub use domain::{
    AgentIdentity, AgentSlot, CallPatch, CallRecord, CallStats, Experiment, HumanCallPatch,
    HumanCallRecord, HumanCallStats,
};
pub use event::{EndOfCallReport, WebhookEnvelope, WebhookMessage};
pub use normalize::{end_of_call_patch, human_end_of_call_patch, resolve_assistant};
pub use topics::TopicConfig;
