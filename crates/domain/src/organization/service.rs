//! Organization service providing a simplified API for organization operations.

use common::{Tenant, new_object_id};
use event_store::EventStore;

use crate::aggregate::Aggregate;
use crate::cancel::Cancellation;
use crate::command::{BaseCommand, Command, CommandHandler, CommandOutcome, RetryConfig};
use crate::error::Result;
use crate::store::AggregateStore;

use super::{
    CreateOrganization, LinkDomain, LinkEmail, Organization, OrganizationAction,
    OrganizationCommand, UnlinkDomain, UpdateOrganization,
};

/// Service for managing organizations.
pub struct OrganizationService<S: EventStore> {
    handler: CommandHandler<S, Organization>,
}

impl<S: EventStore> OrganizationService<S> {
    pub fn new(store: AggregateStore<S>, retry: RetryConfig) -> Self {
        Self {
            handler: CommandHandler::new(store).with_retry(retry),
        }
    }

    /// Returns a reference to the underlying command handler.
    pub fn handler(&self) -> &CommandHandler<S, Organization> {
        &self.handler
    }

    /// Runs any organization command.
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
        command: OrganizationCommand,
        cancel: &Cancellation,
    ) -> Result<CommandOutcome<Organization>> {
        command.base.validate()?;
        self.handler.handle(&command, cancel).await
    }

    /// Creates an organization; an empty object id gets a generated one.
    pub async fn create(
        &self,
        mut base: BaseCommand,
        data: CreateOrganization,
        cancel: &Cancellation,
    ) -> Result<CommandOutcome<Organization>> {
        if base.object_id.trim().is_empty() {
            base.object_id = new_object_id();
        }
        self.handle(
            OrganizationCommand::new(base, OrganizationAction::Create(data)),
            cancel,
        )
        .await
    }

    pub async fn update(
        &self,
        base: BaseCommand,
        data: UpdateOrganization,
        cancel: &Cancellation,
    ) -> Result<CommandOutcome<Organization>> {
        self.handle(
            OrganizationCommand::new(base, OrganizationAction::Update(data)),
            cancel,
        )
        .await
    }

    pub async fn link_domain(
        &self,
        base: BaseCommand,
        domain: impl Into<String>,
        cancel: &Cancellation,
    ) -> Result<CommandOutcome<Organization>> {
        let action = OrganizationAction::LinkDomain(LinkDomain {
            domain: domain.into(),
        });
        self.handle(OrganizationCommand::new(base, action), cancel)
            .await
    }

    pub async fn unlink_domain(
        &self,
        base: BaseCommand,
        domain: impl Into<String>,
        cancel: &Cancellation,
    ) -> Result<CommandOutcome<Organization>> {
        let action = OrganizationAction::UnlinkDomain(UnlinkDomain {
            domain: domain.into(),
        });
        self.handle(OrganizationCommand::new(base, action), cancel)
            .await
    }

    pub async fn link_email(
        &self,
        base: BaseCommand,
        data: LinkEmail,
        cancel: &Cancellation,
    ) -> Result<CommandOutcome<Organization>> {
        self.handle(
            OrganizationCommand::new(base, OrganizationAction::LinkEmail(data)),
            cancel,
        )
        .await
    }

    pub async fn hide(
        &self,
        base: BaseCommand,
        cancel: &Cancellation,
    ) -> Result<CommandOutcome<Organization>> {
        self.handle(OrganizationCommand::new(base, OrganizationAction::Hide), cancel)
            .await
    }

    pub async fn show(
        &self,
        base: BaseCommand,
        cancel: &Cancellation,
    ) -> Result<CommandOutcome<Organization>> {
        self.handle(OrganizationCommand::new(base, OrganizationAction::Show), cancel)
            .await
    }

    /// Loads an organization by object id.
    #[tracing::instrument(skip(self))]
    pub async fn get(&self, tenant: &Tenant, object_id: &str) -> Result<Organization> {
        let mut organization = Organization::with_tenant_and_id(tenant.clone(), object_id);
        self.handler.store().load(&mut organization).await?;
        Ok(organization)
    }
}
