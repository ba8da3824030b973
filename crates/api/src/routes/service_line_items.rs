//! Service line item command endpoints.

use std::sync::Arc;

use axum::Json;
use axum::extract::{Path, State};
use axum::http::HeaderMap;
use domain::service_line_item::{
    CloseServiceLineItem, CreateServiceLineItem, ServiceLineItemUpdateRequest,
};
use event_store::EventStore;

use super::{CommandResponse, CreateRequest, Created, created};
use crate::error::ApiError;
use crate::state::{AppState, base_command};

/// POST /tenants/{tenant}/service-line-items — create a line item on a contract.
#[tracing::instrument(skip(state, headers, req))]
pub async fn create<S: EventStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Path(tenant): Path<String>,
    headers: HeaderMap,
    Json(req): Json<CreateRequest<CreateServiceLineItem>>,
) -> Result<Created, ApiError> {
    let base = base_command(&tenant, req.id.as_deref().unwrap_or_default(), &headers);
    let outcome = state
        .service_line_items
        .create(base, req.data, &state.shutdown)
        .await?;
    Ok(created(outcome))
}

/// PUT /tenants/{tenant}/service-line-items/{id} — correct in place or add a new version.
///
/// A new version answers with the id of the item it created.
#[tracing::instrument(skip(state, headers, req))]
pub async fn update<S: EventStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Path((tenant, id)): Path<(String, String)>,
    headers: HeaderMap,
    Json(req): Json<ServiceLineItemUpdateRequest>,
) -> Result<Json<CommandResponse>, ApiError> {
    let outcome = state
        .service_line_items
        .update(base_command(&tenant, &id, &headers), req, &state.shutdown)
        .await?;
    Ok(Json(outcome.into()))
}

/// POST /tenants/{tenant}/service-line-items/{id}/close — end or cancel an item.
#[tracing::instrument(skip(state, headers, req))]
pub async fn close<S: EventStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Path((tenant, id)): Path<(String, String)>,
    headers: HeaderMap,
    Json(req): Json<CloseServiceLineItem>,
) -> Result<Json<CommandResponse>, ApiError> {
    let outcome = state
        .service_line_items
        .close(base_command(&tenant, &id, &headers), req, &state.shutdown)
        .await?;
    Ok(Json(outcome.into()))
}

/// DELETE /tenants/{tenant}/service-line-items/{id}
#[tracing::instrument(skip(state, headers))]
pub async fn delete<S: EventStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Path((tenant, id)): Path<(String, String)>,
    headers: HeaderMap,
) -> Result<Json<CommandResponse>, ApiError> {
    let outcome = state
        .service_line_items
        .delete(base_command(&tenant, &id, &headers), &state.shutdown)
        .await?;
    Ok(Json(outcome.into()))
}
