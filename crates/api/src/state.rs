//! Shared application state.

use std::sync::Arc;

use axum::http::HeaderMap;
use common::Tenant;
use domain::{
    AggregateStore, BaseCommand, Cancellation, ContractService, OrganizationService,
    ServiceLineItemService,
};
use event_buffer::{EventBuffer, InMemoryParkedEventStore};
use event_store::EventStore;

use crate::config::Config;

/// Header carrying the id of the user issuing a command.
pub const USER_ID_HEADER: &str = "x-user-id";
/// Header naming the application a command originates from.
pub const APP_SOURCE_HEADER: &str = "x-app-source";

/// Shared application state accessible from all handlers.
pub struct AppState<S: EventStore + 'static> {
    pub organizations: OrganizationService<S>,
    pub contracts: ContractService<S>,
    pub service_line_items: ServiceLineItemService<S>,
    pub event_buffer: EventBuffer<S, InMemoryParkedEventStore>,
    pub event_store: S,
    /// Fired on shutdown so in-flight retries stop waiting.
    pub shutdown: Cancellation,
}

impl<S: EventStore + Clone + 'static> AppState<S> {
    pub fn new(event_store: S, config: &Config) -> Self {
        let store = AggregateStore::new(event_store.clone());
        let retry = config.retry();
        Self {
            organizations: OrganizationService::new(store.clone(), retry.clone()),
            contracts: ContractService::new(store.clone(), retry.clone()),
            service_line_items: ServiceLineItemService::new(store.clone(), retry),
            event_buffer: EventBuffer::new(
                store,
                InMemoryParkedEventStore::new(),
                config.event_buffer(),
            ),
            event_store,
            shutdown: Cancellation::new(),
        }
    }
}

/// Creates the default application state.
pub fn create_default_state<S: EventStore + Clone + 'static>(
    event_store: S,
    config: &Config,
) -> Arc<AppState<S>> {
    Arc::new(AppState::new(event_store, config))
}

/// Builds the command base from path segments and caller headers.
pub fn base_command(tenant: &str, object_id: &str, headers: &HeaderMap) -> BaseCommand {
    let mut base = BaseCommand::new(Tenant::new(tenant), object_id);
    if let Some(user) = header_str(headers, USER_ID_HEADER) {
        base = base.acting_user(user);
    }
    if let Some(app) = header_str(headers, APP_SOURCE_HEADER) {
        base = base.app_source(app);
    }
    base
}

fn header_str<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty())
}
