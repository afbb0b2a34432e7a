use chrono::Utc;
use serde_json::json;

use crate::commands::CommandResult;
use crate::orchestrator::{run_batch, BatchOptions};
use crate::vapi::{OutboundIdentity, VapiClient};
use crosstalk_core::config::{AppConfig, ConfigOverrides, LoadOptions};
use crosstalk_core::topics::{self, TopicConfig};
use crosstalk_db::repositories::{SqlCallRepository, SqlExperimentRepository};
use crosstalk_db::{connect, migrations};

#[derive(Debug, Default)]
pub struct OrchestrateArgs {
    pub dry_run: bool,
    pub limit: Option<usize>,
    pub topic: Option<String>,
    pub delay_ms: Option<u64>,
}

pub fn run(args: OrchestrateArgs) -> CommandResult {
    let config = match AppConfig::load(LoadOptions {
        overrides: ConfigOverrides { delay_ms: args.delay_ms, ..ConfigOverrides::default() },
        ..LoadOptions::default()
    }) {
        Ok(config) => config,
        Err(error) => {
            return CommandResult::failure(
                "orchestrate",
                "config_validation",
                format!("configuration issue: {error}"),
                2,
            );
        }
    };

    let selected = match select_topics(args.topic.as_deref(), args.limit) {
        Ok(selected) => selected,
        Err(message) => {
            return CommandResult::failure("orchestrate", "topic_selection", message, 2);
        }
    };

    // Dry runs preview the batch without credentials; live runs need the
    // full outbound set up front.
    let identity = if args.dry_run {
        OutboundIdentity {
            phone_number_id: config.vapi.phone_number_id.clone().unwrap_or_default(),
            customer_number: config.vapi.customer_number.clone().unwrap_or_default(),
            assistant_a_id: config.vapi.assistant_a_id.clone().unwrap_or_default(),
        }
    } else {
        match OutboundIdentity::from_config(&config.vapi) {
            Ok(identity) => identity,
            Err(error) => {
                return CommandResult::failure(
                    "orchestrate",
                    "config_validation",
                    format!("configuration issue: {error}"),
                    2,
                );
            }
        }
    };

    let runtime = match tokio::runtime::Builder::new_current_thread().enable_all().build() {
        Ok(runtime) => runtime,
        Err(error) => {
            return CommandResult::failure(
                "orchestrate",
                "runtime_init",
                format!("failed to initialize async runtime: {error}"),
                3,
            );
        }
    };

    let experiment_name =
        format!("experiment-{}-{}", Utc::now().format("%Y-%m-%d"), Utc::now().timestamp_millis());
    let options = BatchOptions { dry_run: args.dry_run, delay_ms: config.orchestrator.delay_ms };

    let result = runtime.block_on(async {
        let pool = connect(&config.database)
            .await
            .map_err(|error| ("db_connectivity", error.to_string(), 4u8))?;
        migrations::run_pending(&pool)
            .await
            .map_err(|error| ("migration", error.to_string(), 5u8))?;

        let client = VapiClient::new(&config.vapi);
        let experiments = SqlExperimentRepository::new(pool.clone());
        let calls = SqlCallRepository::new(pool.clone());

        let summary = run_batch(
            &client,
            &experiments,
            &calls,
            &identity,
            &experiment_name,
            &selected,
            options,
        )
        .await
        .map_err(|error| ("orchestration", error.to_string(), 6u8))?;

        pool.close().await;
        Ok::<_, (&'static str, String, u8)>(summary)
    });

    match result {
        Ok(summary) => {
            let message = if args.dry_run {
                format!("dry run: {} calls previewed", summary.total)
            } else {
                format!("initiated {}/{} calls", summary.successful, summary.total)
            };
            let details = serde_json::to_value(&summary).unwrap_or_else(|_| json!({}));
            CommandResult::success_with("orchestrate", message, Some(details))
        }
        Err((error_class, message, exit_code)) => {
            CommandResult::failure("orchestrate", error_class, message, exit_code)
        }
    }
}

fn select_topics(
    name: Option<&str>,
    limit: Option<usize>,
) -> Result<Vec<&'static TopicConfig>, String> {
    let mut selected: Vec<&'static TopicConfig> = match name {
        Some(name) => {
            let topic = topics::find(name).ok_or_else(|| {
                let available: Vec<&str> =
                    topics::all().iter().map(|topic| topic.topic).collect();
                format!("topic `{name}` not found; available: {}", available.join(", "))
            })?;
            vec![topic]
        }
        None => topics::all().iter().collect(),
    };

    if let Some(limit) = limit {
        selected.truncate(limit);
    }

    Ok(selected)
}
