//! Sequential batch orchestration: one experiment record, then one outbound
//! call per topic with a fixed pause between initiations.

use std::time::Duration;

use thiserror::Error;
use tracing::{info, warn};

use crosstalk_core::domain::CallPatch;
use crosstalk_core::topics::TopicConfig;
use crosstalk_db::repositories::{CallRepository, ExperimentRepository, RepositoryError};

use crate::vapi::{build_call_request, CallInitiator, OutboundIdentity};

#[derive(Debug, Error)]
pub enum OrchestrateError {
    #[error("could not create experiment record: {0}")]
    Experiment(#[source] RepositoryError),
}

#[derive(Clone, Copy, Debug)]
pub struct BatchOptions {
    pub dry_run: bool,
    pub delay_ms: u64,
}

#[derive(Clone, Debug, Default, PartialEq, serde::Serialize)]
pub struct BatchSummary {
    pub total: usize,
    pub successful: usize,
    pub failed: usize,
    pub call_ids: Vec<String>,
    pub experiment_id: Option<String>,
}

pub async fn run_batch(
    initiator: &dyn CallInitiator,
    experiments: &dyn ExperimentRepository,
    calls: &dyn CallRepository,
    identity: &OutboundIdentity,
    experiment_name: &str,
    topics: &[&TopicConfig],
    options: BatchOptions,
) -> Result<BatchSummary, OrchestrateError> {
    let mut summary = BatchSummary { total: topics.len(), ..BatchSummary::default() };

    if options.dry_run {
        for topic in topics {
            info!(
                event_name = "orchestrator.dry_run.call_planned",
                topic = topic.topic,
                first_message = topic.first_message_a.unwrap_or("(default)"),
                "would initiate call"
            );
        }
        return Ok(summary);
    }

    let experiment = experiments
        .create(
            experiment_name,
            Some(&format!("Batch of {} agent-on-agent calls", topics.len())),
        )
        .await
        .map_err(OrchestrateError::Experiment)?;
    info!(
        event_name = "orchestrator.experiment_created",
        experiment_id = %experiment.id,
        topics = topics.len(),
        "experiment record created"
    );
    summary.experiment_id = Some(experiment.id.clone());

    for (index, topic) in topics.iter().enumerate() {
        info!(
            event_name = "orchestrator.call_initiating",
            topic = topic.topic,
            position = index + 1,
            total = topics.len(),
            "initiating call"
        );

        let request = build_call_request(identity, topic, &experiment.id);
        match initiate_and_record(initiator, calls, &experiment.id, topic, &request).await {
            Ok(call_id) => {
                summary.successful += 1;
                summary.call_ids.push(call_id);
            }
            Err(error) => {
                warn!(
                    event_name = "orchestrator.call_failed",
                    topic = topic.topic,
                    error = %error,
                    "call initiation failed"
                );
                summary.failed += 1;
            }
        }

        // Rate limit between calls, but not after the last one.
        if index + 1 < topics.len() && options.delay_ms > 0 {
            info!(
                event_name = "orchestrator.pausing",
                delay_ms = options.delay_ms,
                "waiting before next call"
            );
            tokio::time::sleep(Duration::from_millis(options.delay_ms)).await;
        }
    }

    info!(
        event_name = "orchestrator.batch_complete",
        total = summary.total,
        successful = summary.successful,
        failed = summary.failed,
        "batch finished"
    );

    Ok(summary)
}

/// Initiates one call and pre-creates its row with the initiation-time fields
/// the end-of-call report will never carry back in full. A persistence
/// failure after a successful initiation still counts the call as failed so
/// the summary reflects what the store knows about.
async fn initiate_and_record(
    initiator: &dyn CallInitiator,
    calls: &dyn CallRepository,
    experiment_id: &str,
    topic: &TopicConfig,
    request: &crate::vapi::CreateCallRequest,
) -> Result<String, anyhow::Error> {
    let created = initiator.initiate(request).await?;
    info!(
        event_name = "orchestrator.call_initiated",
        call_id = %created.id,
        topic = topic.topic,
        "call accepted by platform"
    );

    let provisional = CallPatch {
        vapi_call_id: created.id.clone(),
        experiment_id: Some(experiment_id.to_string()),
        topic: Some(topic.topic.to_string()),
        agent_a_prompt: Some(topic.prompt_a.to_string()),
        agent_b_prompt: Some(topic.prompt_b.to_string()),
        status: Some("initiated".to_string()),
        ..CallPatch::default()
    };
    calls.upsert(&provisional).await?;

    Ok(created.id)
}
