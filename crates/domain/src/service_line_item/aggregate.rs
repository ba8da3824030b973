//! Service line item aggregate implementation.

use chrono::{DateTime, Utc};
use common::{AggregateType, Tenant};
use event_store::EventMetadata;

use crate::aggregate::{Aggregate, AggregateBase};
use crate::error::{DomainError, Result};

use super::{
    BilledType, CloseServiceLineItem, CreateServiceLineItem, SERVICE_LINE_ITEM,
    ServiceLineItemAction, ServiceLineItemCommand, ServiceLineItemEvent, UpdateServiceLineItem,
    events::{
        ServiceLineItemClosedData, ServiceLineItemCreatedData, ServiceLineItemDeletedData,
        ServiceLineItemUpdatedData,
    },
};

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ServiceLineItemState {
    pub contract_id: String,
    pub parent_id: String,
    pub previous_version_id: Option<String>,
    pub name: String,
    pub billed: BilledType,
    pub price: f64,
    pub quantity: i64,
    pub comments: String,
    pub started_at: Option<DateTime<Utc>>,
    pub ended_at: Option<DateTime<Utc>>,
    pub is_canceled: bool,
    pub created_at: Option<DateTime<Utc>>,
    pub updated_at: Option<DateTime<Utc>>,
    pub deleted: bool,
}

impl ServiceLineItemState {
    pub fn is_ended(&self) -> bool {
        self.ended_at.is_some()
    }
}

#[derive(Debug)]
pub struct ServiceLineItem {
    base: AggregateBase,
    state: ServiceLineItemState,
}

fn check_amounts(price: f64, quantity: i64) -> Result<()> {
    if !price.is_finite() || price < 0.0 {
        return Err(DomainError::Validation(format!(
            "price must be a non-negative number, got {price}"
        )));
    }
    if quantity < 0 {
        return Err(DomainError::Validation(format!(
            "quantity must not be negative, got {quantity}"
        )));
    }
    Ok(())
}

impl ServiceLineItem {
    pub fn state(&self) -> &ServiceLineItemState {
        &self.state
    }

    fn ensure_not_deleted(&self) -> Result<()> {
        if self.state.deleted {
            return Err(DomainError::Precondition(format!(
                "service line item {} is deleted",
                self.base.object_id()
            )));
        }
        Ok(())
    }

    fn create(&mut self, data: &CreateServiceLineItem, meta: &EventMetadata) -> Result<()> {
        if self.exists() {
            return Err(DomainError::Precondition(format!(
                "service line item {} already exists",
                self.base.object_id()
            )));
        }
        let contract_id = data.contract_id.trim();
        if contract_id.is_empty() {
            return Err(DomainError::missing_field("contractId"));
        }
        check_amounts(data.price, data.quantity)?;

        let now = Utc::now();
        let started_at = data.started_at.unwrap_or(now);
        if data.ended_at.is_some_and(|ended| ended < started_at) {
            return Err(DomainError::Validation(
                "endedAt must not be before startedAt".to_string(),
            ));
        }

        let parent_id = data
            .parent_id
            .as_deref()
            .map(str::trim)
            .filter(|id| !id.is_empty())
            .unwrap_or(self.base.object_id())
            .to_string();

        self.apply(
            ServiceLineItemEvent::Created(ServiceLineItemCreatedData {
                contract_id: contract_id.to_string(),
                parent_id,
                previous_version_id: data.previous_version_id.clone(),
                name: data.name.trim().to_string(),
                billed: data.billed,
                price: data.price,
                quantity: data.quantity,
                comments: data.comments.clone(),
                started_at,
                ended_at: data.ended_at,
                created_at: data.created_at.unwrap_or(now),
            }),
            meta,
        )
    }

    fn update(&mut self, data: &UpdateServiceLineItem, meta: &EventMetadata) -> Result<()> {
        self.ensure_not_deleted()?;
        let current = &self.state;
        let price = data.price.unwrap_or(current.price);
        let quantity = data.quantity.unwrap_or(current.quantity);
        check_amounts(price, quantity)?;

        let now = Utc::now();
        let event = ServiceLineItemUpdatedData {
            name: data
                .name
                .as_deref()
                .map(str::trim)
                .unwrap_or(current.name.as_str())
                .to_string(),
            billed: data.billed.unwrap_or(current.billed),
            price,
            quantity,
            comments: data.comments.clone().unwrap_or_else(|| current.comments.clone()),
            started_at: data.started_at.or(current.started_at).unwrap_or(now),
            updated_at: data.updated_at.unwrap_or(now),
        };
        self.apply(ServiceLineItemEvent::Updated(event), meta)
    }

    fn close(&mut self, data: &CloseServiceLineItem, meta: &EventMetadata) -> Result<()> {
        self.ensure_not_deleted()?;
        if self.state.is_ended() {
            return Err(DomainError::Precondition(format!(
                "service line item {} is already ended",
                self.base.object_id()
            )));
        }
        let now = Utc::now();
        self.apply(
            ServiceLineItemEvent::Closed(ServiceLineItemClosedData {
                ended_at: data.ended_at.unwrap_or(now),
                is_canceled: data.cancelled,
                updated_at: now,
            }),
            meta,
        )
    }

    fn delete(&mut self, meta: &EventMetadata) -> Result<()> {
        if self.state.deleted {
            return Ok(());
        }
        self.apply(
            ServiceLineItemEvent::Deleted(ServiceLineItemDeletedData {
                deleted_at: Utc::now(),
            }),
            meta,
        )
    }
}

impl Aggregate for ServiceLineItem {
    type Event = ServiceLineItemEvent;
    type Command = ServiceLineItemCommand;

    const AGGREGATE_TYPE: AggregateType = SERVICE_LINE_ITEM;

    fn with_tenant_and_id(tenant: Tenant, object_id: &str) -> Self {
        Self {
            base: AggregateBase::new(SERVICE_LINE_ITEM, tenant, object_id),
            state: ServiceLineItemState::default(),
        }
    }

    fn base(&self) -> &AggregateBase {
        &self.base
    }

    fn base_mut(&mut self) -> &mut AggregateBase {
        &mut self.base
    }

    fn when(&mut self, event: &ServiceLineItemEvent) {
        let state = &mut self.state;
        match event {
            ServiceLineItemEvent::Created(data) => {
                state.contract_id = data.contract_id.clone();
                state.parent_id = data.parent_id.clone();
                state.previous_version_id = data.previous_version_id.clone();
                state.name = data.name.clone();
                state.billed = data.billed;
                state.price = data.price;
                state.quantity = data.quantity;
                state.comments = data.comments.clone();
                state.started_at = Some(data.started_at);
                state.ended_at = data.ended_at;
                state.created_at = Some(data.created_at);
                state.updated_at = Some(data.created_at);
            }
            ServiceLineItemEvent::Updated(data) => {
                state.name = data.name.clone();
                state.billed = data.billed;
                state.price = data.price;
                state.quantity = data.quantity;
                state.comments = data.comments.clone();
                state.started_at = Some(data.started_at);
                state.updated_at = Some(data.updated_at);
            }
            ServiceLineItemEvent::Closed(data) => {
                state.ended_at = Some(data.ended_at);
                state.is_canceled = data.is_canceled;
                state.updated_at = Some(data.updated_at);
            }
            ServiceLineItemEvent::Deleted(data) => {
                state.deleted = true;
                state.updated_at = Some(data.deleted_at);
            }
        }
    }

    fn handle_command(&mut self, command: &ServiceLineItemCommand) -> Result<()> {
        let meta = command.base.metadata();
        match &command.action {
            ServiceLineItemAction::Create(data) => self.create(data, &meta),
            ServiceLineItemAction::Update(data) => self.update(data, &meta),
            ServiceLineItemAction::Close(data) => self.close(data, &meta),
            ServiceLineItemAction::Delete => self.delete(&meta),
        }
    }
}
