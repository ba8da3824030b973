//! Contract service wrapping the command handler.

use common::{Tenant, new_object_id};
use event_store::EventStore;

use crate::aggregate::Aggregate;
use crate::cancel::Cancellation;
use crate::command::{BaseCommand, Command, CommandHandler, CommandOutcome, RetryConfig};
use crate::error::{DomainError, Result};
use crate::organization::ORGANIZATION;
use crate::store::AggregateStore;

use super::{Contract, ContractAction, ContractCommand, CreateContract, UpdateContract};

/// Service for managing contracts.
pub struct ContractService<S: EventStore> {
    handler: CommandHandler<S, Contract>,
}

impl<S: EventStore> ContractService<S> {
    pub fn new(store: AggregateStore<S>, retry: RetryConfig) -> Self {
        Self {
            handler: CommandHandler::new(store).with_retry(retry),
        }
    }

    pub fn handler(&self) -> &CommandHandler<S, Contract> {
        &self.handler
    }

    /// Runs any contract command.
    ///
    /// Creation additionally requires the owning organization to exist.
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
        command: ContractCommand,
        cancel: &Cancellation,
    ) -> Result<CommandOutcome<Contract>> {
        command.base.validate()?;
        if let ContractAction::Create(data) = &command.action {
            let organization_id = data.organization_id.trim();
            if organization_id.is_empty() {
                return Err(DomainError::missing_field("organizationId"));
            }
            self.handler
                .store()
                .require_reference(&ORGANIZATION, &command.base.tenant, organization_id)
                .await?;
        }
        self.handler.handle(&command, cancel).await
    }

    /// Creates a contract; an empty object id gets a generated one.
    pub async fn create(
        &self,
        mut base: BaseCommand,
        data: CreateContract,
        cancel: &Cancellation,
    ) -> Result<CommandOutcome<Contract>> {
        if base.object_id.trim().is_empty() {
            base.object_id = new_object_id();
        }
        self.handle(ContractCommand::new(base, ContractAction::Create(data)), cancel)
            .await
    }

    pub async fn update(
        &self,
        base: BaseCommand,
        data: UpdateContract,
        cancel: &Cancellation,
    ) -> Result<CommandOutcome<Contract>> {
        self.handle(ContractCommand::new(base, ContractAction::Update(data)), cancel)
            .await
    }

    pub async fn refresh_status(
        &self,
        base: BaseCommand,
        cancel: &Cancellation,
    ) -> Result<CommandOutcome<Contract>> {
        self.handle(ContractCommand::new(base, ContractAction::RefreshStatus), cancel)
            .await
    }

    pub async fn rollout_renewal_opportunity(
        &self,
        base: BaseCommand,
        cancel: &Cancellation,
    ) -> Result<CommandOutcome<Contract>> {
        self.handle(
            ContractCommand::new(base, ContractAction::RolloutRenewalOpportunity),
            cancel,
        )
        .await
    }

    pub async fn soft_delete(
        &self,
        base: BaseCommand,
        cancel: &Cancellation,
    ) -> Result<CommandOutcome<Contract>> {
        self.handle(ContractCommand::new(base, ContractAction::SoftDelete), cancel)
            .await
    }

    #[tracing::instrument(skip(self))]
    pub async fn get(&self, tenant: &Tenant, object_id: &str) -> Result<Contract> {
        let mut contract = Contract::with_tenant_and_id(tenant.clone(), object_id);
        self.handler.store().load(&mut contract).await?;
        Ok(contract)
    }
}
