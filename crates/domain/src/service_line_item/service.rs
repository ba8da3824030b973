//! Service line item service.

use common::{Tenant, new_object_id};
use event_store::EventStore;

use crate::aggregate::Aggregate;
use crate::cancel::Cancellation;
use crate::command::{BaseCommand, Command, CommandHandler, CommandOutcome, RetryConfig};
use crate::contract::CONTRACT;
use crate::error::{DomainError, Result};
use crate::store::AggregateStore;

use super::{
    CloseServiceLineItem, CreateServiceLineItem, ServiceLineItem, ServiceLineItemAction,
    ServiceLineItemCommand, ServiceLineItemUpdateRequest,
};

pub struct ServiceLineItemService<S: EventStore> {
    handler: CommandHandler<S, ServiceLineItem>,
}

impl<S: EventStore> ServiceLineItemService<S> {
    pub fn new(store: AggregateStore<S>, retry: RetryConfig) -> Self {
        Self {
            handler: CommandHandler::new(store).with_retry(retry),
        }
    }

    pub fn handler(&self) -> &CommandHandler<S, ServiceLineItem> {
        &self.handler
    }

    /// Runs any line item command. Creation requires the contract to exist.
    #[tracing::instrument(
        skip_all,
        fields(
            kind = command.command_type(),
            tenant = %command.base.tenant,
            object_id = %command.base.object_id
        )
    )]
    pub async fn handle(
        &self,
        command: ServiceLineItemCommand,
        cancel: &Cancellation,
    ) -> Result<CommandOutcome<ServiceLineItem>> {
        command.base.validate()?;
        if let ServiceLineItemAction::Create(data) = &command.action {
            self.require_contract(&command.base.tenant, &data.contract_id)
                .await?;
        }
        self.handler.handle(&command, cancel).await
    }

    async fn require_contract(&self, tenant: &Tenant, contract_id: &str) -> Result<()> {
        let contract_id = contract_id.trim();
        if contract_id.is_empty() {
            return Err(DomainError::missing_field("contractId"));
        }
        self.handler
            .store()
            .require_reference(&CONTRACT, tenant, contract_id)
            .await
    }

    pub async fn create(
        &self,
        mut base: BaseCommand,
        data: CreateServiceLineItem,
        cancel: &Cancellation,
    ) -> Result<CommandOutcome<ServiceLineItem>> {
        if base.object_id.trim().is_empty() {
            base.object_id = new_object_id();
        }
        self.handle(
            ServiceLineItemCommand::new(base, ServiceLineItemAction::Create(data)),
            cancel,
        )
        .await
    }

    /// Corrects the addressed item in place, or replaces it with a new version.
    ///
    /// The new version gets a fresh id, inherits the previous item's parent
    /// unless the request names one, and records the previous item's id.
    /// Ended items cannot get a new version.
    #[tracing::instrument(
        skip_all,
        fields(
            tenant = %base.tenant,
            object_id = %base.object_id,
            retroactive = request.is_retroactive_correction
        )
    )]
    pub async fn update(
        &self,
        base: BaseCommand,
        request: ServiceLineItemUpdateRequest,
        cancel: &Cancellation,
    ) -> Result<CommandOutcome<ServiceLineItem>> {
        if request.is_retroactive_correction {
            return self
                .handle(
                    ServiceLineItemCommand::new(base, ServiceLineItemAction::Update(request.data)),
                    cancel,
                )
                .await;
        }

        base.validate()?;
        self.require_contract(&base.tenant, &request.contract_id)
            .await?;

        let previous = self.get(&base.tenant, &base.object_id).await?;
        if previous.state().is_ended() {
            return Err(DomainError::Precondition(format!(
                "service line item {} is already ended",
                base.object_id
            )));
        }

        let state = previous.state();
        let data = request.data;
        let parent_id = request
            .parent_id
            .filter(|id| !id.trim().is_empty())
            .unwrap_or_else(|| state.parent_id.clone());
        let create = CreateServiceLineItem {
            contract_id: request.contract_id,
            parent_id: Some(parent_id),
            previous_version_id: Some(base.object_id.clone()),
            name: data.name.unwrap_or_else(|| state.name.clone()),
            billed: data.billed.unwrap_or(state.billed),
            price: data.price.unwrap_or(state.price),
            quantity: data.quantity.unwrap_or(state.quantity),
            comments: data.comments.unwrap_or_else(|| state.comments.clone()),
            started_at: data.started_at,
            ended_at: None,
            created_at: data.updated_at,
        };

        let mut next_base = base;
        next_base.object_id = new_object_id();
        tracing::debug!(new_object_id = %next_base.object_id, "Creating new line item version");
        self.handle(
            ServiceLineItemCommand::new(next_base, ServiceLineItemAction::Create(create)),
            cancel,
        )
        .await
    }

    pub async fn close(
        &self,
        base: BaseCommand,
        data: CloseServiceLineItem,
        cancel: &Cancellation,
    ) -> Result<CommandOutcome<ServiceLineItem>> {
        self.handle(
            ServiceLineItemCommand::new(base, ServiceLineItemAction::Close(data)),
            cancel,
        )
        .await
    }

    pub async fn delete(
        &self,
        base: BaseCommand,
        cancel: &Cancellation,
    ) -> Result<CommandOutcome<ServiceLineItem>> {
        self.handle(
            ServiceLineItemCommand::new(base, ServiceLineItemAction::Delete),
            cancel,
        )
        .await
    }

    #[tracing::instrument(skip(self))]
    pub async fn get(&self, tenant: &Tenant, object_id: &str) -> Result<ServiceLineItem> {
        let mut item = ServiceLineItem::with_tenant_and_id(tenant.clone(), object_id);
        self.handler.store().load(&mut item).await?;
        Ok(item)
    }
}
