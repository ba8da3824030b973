//! Contract aggregate implementation.

use chrono::{DateTime, Utc};
use common::{AggregateType, Tenant};
use event_store::EventMetadata;

use crate::aggregate::{Aggregate, AggregateBase};
use crate::error::{DomainError, Result};

use super::{
    CONTRACT, ContractAction, ContractCommand, ContractEvent, ContractStatus, CreateContract,
    UpdateContract,
    commands::field,
    events::{
        ContractCreatedData, ContractDeletedData, ContractStatusData, ContractUpdatedData,
        RenewalOpportunityData,
    },
};

const MAX_LENGTH_IN_MONTHS: i64 = 1200;
const MAX_DUE_DAYS: i64 = 365;

/// Current state of a contract.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ContractState {
    pub organization_id: String,
    pub name: String,
    pub contract_url: String,
    pub created_by_user_id: String,
    pub service_started_at: Option<DateTime<Utc>>,
    pub signed_at: Option<DateTime<Utc>>,
    pub ended_at: Option<DateTime<Utc>>,
    pub length_in_months: i64,
    pub due_days: i64,
    pub status: ContractStatus,
    pub renewal_requested_at: Option<DateTime<Utc>>,
    pub created_at: Option<DateTime<Utc>>,
    pub updated_at: Option<DateTime<Utc>>,
    pub deleted: bool,
}

/// Contract aggregate root.
#[derive(Debug)]
pub struct Contract {
    base: AggregateBase,
    state: ContractState,
}

impl Contract {
    pub fn state(&self) -> &ContractState {
        &self.state
    }

    fn ensure_active(&self) -> Result<()> {
        if self.state.deleted {
            return Err(DomainError::Precondition(format!(
                "contract {} is deleted",
                self.base.object_id()
            )));
        }
        Ok(())
    }

    fn create(&mut self, data: &CreateContract, user_id: &str, meta: &EventMetadata) -> Result<()> {
        if self.exists() {
            return Err(DomainError::Precondition(format!(
                "contract {} already exists",
                self.base.object_id()
            )));
        }
        if data.organization_id.trim().is_empty() {
            return Err(DomainError::missing_field("organizationId"));
        }

        let now = Utc::now();
        let status = ContractStatus::derive(data.service_started_at, None, now);
        self.apply(
            ContractEvent::Created(ContractCreatedData {
                organization_id: data.organization_id.trim().to_string(),
                name: data.name.trim().to_string(),
                contract_url: data.contract_url.trim().to_string(),
                created_by_user_id: user_id.to_string(),
                service_started_at: data.service_started_at,
                signed_at: data.signed_at,
                length_in_months: data.length_in_months.clamp(0, MAX_LENGTH_IN_MONTHS),
                due_days: data.due_days.clamp(0, MAX_DUE_DAYS),
                status,
                created_at: data.created_at.unwrap_or(now),
            }),
            meta,
        )
    }

    fn update(&mut self, data: &UpdateContract, meta: &EventMetadata) -> Result<()> {
        self.ensure_active()?;
        let current = &self.state;

        let pick = |name: &str, new: Option<DateTime<Utc>>, old: Option<DateTime<Utc>>| {
            if data.is_updated(name) { new } else { old }
        };
        let service_started_at = pick(
            field::SERVICE_STARTED_AT,
            data.service_started_at,
            current.service_started_at,
        );
        let signed_at = pick(field::SIGNED_AT, data.signed_at, current.signed_at);
        let ended_at = pick(field::ENDED_AT, data.ended_at, current.ended_at);

        if data.is_updated(field::ENDED_AT)
            && let Some(ended_at) = ended_at
        {
            let before_signed = signed_at.is_some_and(|signed| ended_at < signed);
            let before_start = service_started_at.is_some_and(|started| ended_at < started);
            if before_signed || before_start {
                return Err(DomainError::Validation(
                    "endedAt must be after both signedAt and serviceStartedAt".to_string(),
                ));
            }
        }

        let name = match &data.name {
            Some(name) if data.is_updated(field::NAME) => name.trim().to_string(),
            _ => current.name.clone(),
        };
        let contract_url = match &data.contract_url {
            Some(url) if data.is_updated(field::CONTRACT_URL) => url.trim().to_string(),
            _ => current.contract_url.clone(),
        };
        let length_in_months = match data.length_in_months {
            Some(months) if data.is_updated(field::LENGTH_IN_MONTHS) => {
                months.clamp(0, MAX_LENGTH_IN_MONTHS)
            }
            _ => current.length_in_months,
        };
        let due_days = match data.due_days {
            Some(days) if data.is_updated(field::DUE_DAYS) => days.clamp(0, MAX_DUE_DAYS),
            _ => current.due_days,
        };

        let now = Utc::now();
        self.apply(
            ContractEvent::Updated(ContractUpdatedData {
                name,
                contract_url,
                service_started_at,
                signed_at,
                ended_at,
                length_in_months,
                due_days,
                updated_at: data.updated_at.unwrap_or(now),
                fields_mask: data.normalized_mask(),
            }),
            meta,
        )?;

        self.refresh_status(now, meta)
    }

    /// Emits a status event if the dates imply a different status than the current one.
    fn refresh_status(&mut self, now: DateTime<Utc>, meta: &EventMetadata) -> Result<()> {
        let status =
            ContractStatus::derive(self.state.service_started_at, self.state.ended_at, now);
        if status == self.state.status {
            return Ok(());
        }
        self.apply(
            ContractEvent::StatusUpdated(ContractStatusData { status }),
            meta,
        )
    }

    fn rollout_renewal_opportunity(&mut self, meta: &EventMetadata) -> Result<()> {
        self.ensure_active()?;
        self.apply(
            ContractEvent::RenewalOpportunityRolledOut(RenewalOpportunityData {
                requested_at: Utc::now(),
            }),
            meta,
        )
    }

    fn soft_delete(&mut self, meta: &EventMetadata) -> Result<()> {
        if self.state.deleted {
            return Ok(());
        }
        self.apply(
            ContractEvent::Deleted(ContractDeletedData {
                deleted_at: Utc::now(),
            }),
            meta,
        )
    }
}

impl Aggregate for Contract {
    type Event = ContractEvent;
    type Command = ContractCommand;

    const AGGREGATE_TYPE: AggregateType = CONTRACT;

    fn with_tenant_and_id(tenant: Tenant, object_id: &str) -> Self {
        Self {
            base: AggregateBase::new(CONTRACT, tenant, object_id),
            state: ContractState::default(),
        }
    }

    fn base(&self) -> &AggregateBase {
        &self.base
    }

    fn base_mut(&mut self) -> &mut AggregateBase {
        &mut self.base
    }

    fn when(&mut self, event: &ContractEvent) {
        let state = &mut self.state;
        match event {
            ContractEvent::Created(data) => {
                state.organization_id = data.organization_id.clone();
                state.name = data.name.clone();
                state.contract_url = data.contract_url.clone();
                state.created_by_user_id = data.created_by_user_id.clone();
                state.service_started_at = data.service_started_at;
                state.signed_at = data.signed_at;
                state.length_in_months = data.length_in_months;
                state.due_days = data.due_days;
                state.status = data.status;
                state.created_at = Some(data.created_at);
                state.updated_at = Some(data.created_at);
            }
            ContractEvent::Updated(data) => {
                state.name = data.name.clone();
                state.contract_url = data.contract_url.clone();
                state.service_started_at = data.service_started_at;
                state.signed_at = data.signed_at;
                state.ended_at = data.ended_at;
                state.length_in_months = data.length_in_months;
                state.due_days = data.due_days;
                state.updated_at = Some(data.updated_at);
            }
            ContractEvent::StatusUpdated(data) => state.status = data.status,
            ContractEvent::RenewalOpportunityRolledOut(data) => {
                state.renewal_requested_at = Some(data.requested_at);
            }
            ContractEvent::Deleted(data) => {
                state.deleted = true;
                state.updated_at = Some(data.deleted_at);
            }
        }
    }

    fn handle_command(&mut self, command: &ContractCommand) -> Result<()> {
        let meta = command.base.metadata();
        match &command.action {
            ContractAction::Create(data) => self.create(data, &command.base.acting_user_id, &meta),
            ContractAction::Update(data) => self.update(data, &meta),
            ContractAction::RefreshStatus => {
                self.ensure_active()?;
                self.refresh_status(Utc::now(), &meta)
            }
            ContractAction::RolloutRenewalOpportunity => self.rollout_renewal_opportunity(&meta),
            ContractAction::SoftDelete => self.soft_delete(&meta),
        }
    }
}
