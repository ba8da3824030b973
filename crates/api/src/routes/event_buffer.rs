//! Parking events and releasing them by hand.

use std::collections::HashMap;
use std::sync::Arc;

use axum::Json;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use chrono::{DateTime, Utc};
use common::{AggregateId, AggregateType, Tenant};
use event_buffer::DispatchReport;
use event_store::{EventEnvelope, EventMetadata, EventStore, Version};
use serde::{Deserialize, Serialize};

use crate::error::ApiError;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ParkRequest {
    pub uuid: String,
    pub tenant: String,
    pub expiry: DateTime<Utc>,
    pub aggregate_type: String,
    pub object_id: String,
    pub event_type: String,
    #[serde(default)]
    pub payload: serde_json::Value,
    #[serde(default)]
    pub metadata: HashMap<String, serde_json::Value>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ParkResponse {
    pub uuid: String,
    pub aggregate_id: String,
    pub expiry: DateTime<Utc>,
}

impl ParkRequest {
    /// The envelope to hold back. Its version is re-assigned on dispatch.
    fn envelope(&self, tenant: &Tenant) -> Result<EventEnvelope, ApiError> {
        let aggregate_type = AggregateType::new(self.aggregate_type.trim());
        let mut builder = EventEnvelope::builder()
            .event_type(self.event_type.trim())
            .aggregate_id(AggregateId::new(&aggregate_type, tenant, self.object_id.trim()))
            .aggregate_type(aggregate_type)
            .version(Version::first())
            .payload_raw(self.payload.clone())
            .with_metadata(&EventMetadata::for_tenant(tenant));
        for (key, value) in &self.metadata {
            builder = builder.metadata(key.clone(), value.clone());
        }
        builder
            .build()
            .map_err(|e| ApiError::BadRequest(e.to_string()))
    }

    fn validate(&self) -> Result<(), ApiError> {
        for (field, value) in [
            ("aggregateType", &self.aggregate_type),
            ("objectId", &self.object_id),
            ("eventType", &self.event_type),
        ] {
            if value.trim().is_empty() {
                return Err(ApiError::BadRequest(format!(
                    "missing required field `{field}`"
                )));
            }
        }
        Ok(())
    }
}

/// POST /event-buffer — park an event until its expiry.
#[tracing::instrument(skip(state, req), fields(uuid = %req.uuid))]
pub async fn park<S: EventStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Json(req): Json<ParkRequest>,
) -> Result<(StatusCode, Json<ParkResponse>), ApiError> {
    req.validate()?;
    let tenant = Tenant::new(req.tenant.trim());
    let envelope = req.envelope(&tenant)?;
    let aggregate_id = envelope.aggregate_id.to_string();

    state
        .event_buffer
        .park(envelope, tenant, &req.uuid, req.expiry)
        .await?;

    Ok((
        StatusCode::ACCEPTED,
        Json(ParkResponse {
            uuid: req.uuid,
            aggregate_id,
            expiry: req.expiry,
        }),
    ))
}

/// POST /event-buffer/{uuid}/dispatch — release one parked event now.
#[tracing::instrument(skip(state))]
pub async fn dispatch_one<S: EventStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Path(uuid): Path<String>,
) -> Result<StatusCode, ApiError> {
    state
        .event_buffer
        .dispatch_by_uuid(&uuid, &state.shutdown)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

/// POST /event-buffer/dispatch — run one dispatch pass over expired entries.
#[tracing::instrument(skip(state))]
pub async fn dispatch_expired<S: EventStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
) -> Result<Json<DispatchReport>, ApiError> {
    let report = state.event_buffer.dispatch(&state.shutdown).await?;
    Ok(Json(report))
}
