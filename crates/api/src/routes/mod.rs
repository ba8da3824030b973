//! HTTP route handlers.

pub mod commands;
pub mod contracts;
pub mod event_buffer;
pub mod events;
pub mod health;
pub mod metrics;
pub mod organizations;
pub mod service_line_items;

use axum::http::StatusCode;
use domain::{Aggregate, CommandOutcome};
use serde::{Deserialize, Serialize};

/// Body of a create request: an optional caller-chosen id plus the command fields.
#[derive(Debug, Deserialize)]
pub struct CreateRequest<T> {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(flatten)]
    pub data: T,
}

/// Response for every accepted command.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CommandResponse {
    pub id: String,
    pub aggregate_id: String,
    pub version: Option<i64>,
    pub events: Vec<String>,
    pub attempts: u32,
}

impl<A: Aggregate> From<CommandOutcome<A>> for CommandResponse {
    fn from(outcome: CommandOutcome<A>) -> Self {
        let base = outcome.aggregate.base();
        Self {
            id: base.object_id().to_string(),
            aggregate_id: base.id().to_string(),
            version: base.version().map(|v| v.as_i64()),
            events: outcome.events.into_iter().map(|e| e.event_type).collect(),
            attempts: outcome.attempts,
        }
    }
}

pub type Created = (StatusCode, axum::Json<CommandResponse>);

pub fn created<A: Aggregate>(outcome: CommandOutcome<A>) -> Created {
    (StatusCode::CREATED, axum::Json(outcome.into()))
}
