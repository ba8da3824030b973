//! Organization command endpoints.

use std::sync::Arc;

use axum::Json;
use axum::extract::{Path, State};
use axum::http::HeaderMap;
use domain::organization::{CreateOrganization, UpdateOrganization};
use event_store::EventStore;
use serde::Deserialize;

use super::{CommandResponse, CreateRequest, Created, created};
use crate::error::ApiError;
use crate::state::{AppState, base_command};

#[derive(Debug, Deserialize)]
pub struct LinkDomainRequest {
    pub domain: String,
}

/// POST /tenants/{tenant}/organizations — create an organization.
#[tracing::instrument(skip(state, headers, req))]
pub async fn create<S: EventStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Path(tenant): Path<String>,
    headers: HeaderMap,
    Json(req): Json<CreateRequest<CreateOrganization>>,
) -> Result<Created, ApiError> {
    let base = base_command(&tenant, req.id.as_deref().unwrap_or_default(), &headers);
    let outcome = state
        .organizations
        .create(base, req.data, &state.shutdown)
        .await?;
    Ok(created(outcome))
}

/// PUT /tenants/{tenant}/organizations/{id} — update name or website.
#[tracing::instrument(skip(state, headers, req))]
pub async fn update<S: EventStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Path((tenant, id)): Path<(String, String)>,
    headers: HeaderMap,
    Json(req): Json<UpdateOrganization>,
) -> Result<Json<CommandResponse>, ApiError> {
    let outcome = state
        .organizations
        .update(base_command(&tenant, &id, &headers), req, &state.shutdown)
        .await?;
    Ok(Json(outcome.into()))
}

/// POST /tenants/{tenant}/organizations/{id}/domains — link a domain.
#[tracing::instrument(skip(state, headers, req))]
pub async fn link_domain<S: EventStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Path((tenant, id)): Path<(String, String)>,
    headers: HeaderMap,
    Json(req): Json<LinkDomainRequest>,
) -> Result<Json<CommandResponse>, ApiError> {
    let outcome = state
        .organizations
        .link_domain(base_command(&tenant, &id, &headers), req.domain, &state.shutdown)
        .await?;
    Ok(Json(outcome.into()))
}
