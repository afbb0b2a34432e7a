use serde_json::json;

use crate::commands::CommandResult;
use crosstalk_core::topics;

pub fn run() -> CommandResult {
    let catalog: Vec<_> = topics::all()
        .iter()
        .map(|topic| {
            json!({
                "topic": topic.topic,
                "category": topic.category,
                "description": topic.description,
                "first_message_a": topic.first_message_a,
            })
        })
        .collect();

    CommandResult::success_with(
        "topics",
        format!("{} topics available", catalog.len()),
        Some(json!({ "topics": catalog })),
    )
}
