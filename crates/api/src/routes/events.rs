//! Read-back of committed events.

use std::sync::Arc;

use axum::Json;
use axum::extract::{Path, State};
use common::AggregateId;
use event_store::{EventEnvelope, EventStore};

use crate::error::ApiError;
use crate::state::AppState;

/// GET /streams/{aggregate_id}/events — every event of one stream, oldest first.
#[tracing::instrument(skip(state))]
pub async fn list<S: EventStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Path(aggregate_id): Path<String>,
) -> Result<Json<Vec<EventEnvelope>>, ApiError> {
    let events = state
        .event_store
        .read_stream(&AggregateId::from_raw(aggregate_id.clone()))
        .await?;
    if events.is_empty() {
        return Err(ApiError::NotFound(format!("Stream {aggregate_id} not found")));
    }
    Ok(Json(events))
}
