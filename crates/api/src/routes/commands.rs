//! Tagged command dispatch: one endpoint for every command kind.

use std::sync::Arc;

use axum::Json;
use axum::extract::{Path, State};
use axum::http::HeaderMap;
use common::new_object_id;
use domain::contract::{CONTRACT, ContractCommand};
use domain::organization::{ORGANIZATION, OrganizationCommand};
use domain::service_line_item::{SERVICE_LINE_ITEM, ServiceLineItemCommand};
use domain::{BaseCommand, Command, DomainError, TaggedCommand};
use event_store::EventStore;
use serde::Deserialize;

use super::CommandResponse;
use crate::error::ApiError;
use crate::state::{AppState, base_command};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaggedCommandRequest {
    /// Target object; may be omitted for creations, which then get a generated id.
    #[serde(default)]
    pub object_id: String,
    #[serde(default)]
    pub data: serde_json::Value,
}

fn decode<C: TaggedCommand>(
    kind: &str,
    base: BaseCommand,
    data: serde_json::Value,
) -> Result<C, DomainError> {
    // Creations may arrive without a body when every field has a default.
    let data = if data.is_null() {
        serde_json::Value::Object(Default::default())
    } else {
        data
    };
    let command = C::from_tagged(kind, base.clone(), data.clone())?;
    if command.creates_stream() && base.object_id.trim().is_empty() {
        let mut base = base;
        base.object_id = new_object_id();
        return C::from_tagged(kind, base, data);
    }
    Ok(command)
}

/// POST /tenants/{tenant}/commands/{aggregate}/{kind}
///
/// Decodes `kind` against the aggregate's command set; an unknown kind is a 400.
#[tracing::instrument(skip(state, headers, req))]
pub async fn dispatch<S: EventStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Path((tenant, aggregate, kind)): Path<(String, String, String)>,
    headers: HeaderMap,
    Json(req): Json<TaggedCommandRequest>,
) -> Result<Json<CommandResponse>, ApiError> {
    let base = base_command(&tenant, &req.object_id, &headers);
    let cancel = &state.shutdown;

    let response = match aggregate.as_str() {
        a if a == ORGANIZATION.as_str() => {
            let command: OrganizationCommand = decode(&kind, base, req.data)?;
            state.organizations.handle(command, cancel).await?.into()
        }
        a if a == CONTRACT.as_str() => {
            let command: ContractCommand = decode(&kind, base, req.data)?;
            state.contracts.handle(command, cancel).await?.into()
        }
        a if a == SERVICE_LINE_ITEM.as_str() || a == "service-line-item" => {
            let command: ServiceLineItemCommand = decode(&kind, base, req.data)?;
            state.service_line_items.handle(command, cancel).await?.into()
        }
        other => {
            return Err(ApiError::NotFound(format!("Unknown aggregate type `{other}`")));
        }
    };
    Ok(Json(response))
}
