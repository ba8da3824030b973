//! Contract command endpoints.

use std::sync::Arc;

use axum::Json;
use axum::extract::{Path, State};
use axum::http::HeaderMap;
use domain::contract::{CreateContract, UpdateContract};
use event_store::EventStore;

use super::{CommandResponse, CreateRequest, Created, created};
use crate::error::ApiError;
use crate::state::{AppState, base_command};

/// POST /tenants/{tenant}/contracts — create a contract for an existing organization.
#[tracing::instrument(skip(state, headers, req))]
pub async fn create<S: EventStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Path(tenant): Path<String>,
    headers: HeaderMap,
    Json(req): Json<CreateRequest<CreateContract>>,
) -> Result<Created, ApiError> {
    let base = base_command(&tenant, req.id.as_deref().unwrap_or_default(), &headers);
    let outcome = state
        .contracts
        .create(base, req.data, &state.shutdown)
        .await?;
    Ok(created(outcome))
}

/// PUT /tenants/{tenant}/contracts/{id} — masked update.
#[tracing::instrument(skip(state, headers, req))]
pub async fn update<S: EventStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Path((tenant, id)): Path<(String, String)>,
    headers: HeaderMap,
    Json(req): Json<UpdateContract>,
) -> Result<Json<CommandResponse>, ApiError> {
    let outcome = state
        .contracts
        .update(base_command(&tenant, &id, &headers), req, &state.shutdown)
        .await?;
    Ok(Json(outcome.into()))
}

/// DELETE /tenants/{tenant}/contracts/{id} — soft delete.
#[tracing::instrument(skip(state, headers))]
pub async fn delete<S: EventStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Path((tenant, id)): Path<(String, String)>,
    headers: HeaderMap,
) -> Result<Json<CommandResponse>, ApiError> {
    let outcome = state
        .contracts
        .soft_delete(base_command(&tenant, &id, &headers), &state.shutdown)
        .await?;
    Ok(Json(outcome.into()))
}
