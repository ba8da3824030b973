//! Contract commands.

use chrono::{DateTime, Utc};
use serde::Deserialize;

use crate::command::{BaseCommand, Command, TaggedCommand, decode_body, invalid_command_type};
use crate::error::Result;

use super::CONTRACT;

/// Field names accepted in an update's `fieldsMask`.
pub mod field {
    pub const NAME: &str = "name";
    pub const CONTRACT_URL: &str = "contractUrl";
    pub const SERVICE_STARTED_AT: &str = "serviceStartedAt";
    pub const SIGNED_AT: &str = "signedAt";
    pub const ENDED_AT: &str = "endedAt";
    pub const LENGTH_IN_MONTHS: &str = "lengthInMonths";
    pub const DUE_DAYS: &str = "dueDays";

    pub const ALL: [&str; 7] = [
        NAME,
        CONTRACT_URL,
        SERVICE_STARTED_AT,
        SIGNED_AT,
        ENDED_AT,
        LENGTH_IN_MONTHS,
        DUE_DAYS,
    ];
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateContract {
    pub organization_id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub contract_url: String,
    #[serde(default)]
    pub service_started_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub signed_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub length_in_months: i64,
    #[serde(default)]
    pub due_days: i64,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
}

/// Partial update of a contract.
///
/// Only fields named in `fields_mask` are changed; an empty mask changes all
/// of them, so an absent value clears the field.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateContract {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub contract_url: Option<String>,
    #[serde(default)]
    pub service_started_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub signed_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub ended_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub length_in_months: Option<i64>,
    #[serde(default)]
    pub due_days: Option<i64>,
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub fields_mask: Vec<String>,
}

impl UpdateContract {
    pub fn is_updated(&self, field: &str) -> bool {
        self.fields_mask.is_empty() || self.fields_mask.iter().any(|f| f == field)
    }

    /// The mask with duplicates and unknown names removed.
    pub fn normalized_mask(&self) -> Vec<String> {
        let mut mask: Vec<String> = Vec::new();
        for name in &self.fields_mask {
            if field::ALL.contains(&name.as_str()) && !mask.contains(name) {
                mask.push(name.clone());
            }
        }
        mask
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ContractAction {
    Create(CreateContract),
    Update(UpdateContract),
    /// Re-derives the status from the contract's dates and the current time.
    RefreshStatus,
    RolloutRenewalOpportunity,
    SoftDelete,
}

/// A command addressed to one contract.
#[derive(Debug, Clone, PartialEq)]
pub struct ContractCommand {
    pub base: BaseCommand,
    pub action: ContractAction,
}

impl ContractCommand {
    pub fn new(base: BaseCommand, action: ContractAction) -> Self {
        Self { base, action }
    }
}

impl Command for ContractCommand {
    fn base(&self) -> &BaseCommand {
        &self.base
    }

    fn command_type(&self) -> &'static str {
        match self.action {
            ContractAction::Create(_) => "CreateContract",
            ContractAction::Update(_) => "UpdateContract",
            ContractAction::RefreshStatus => "RefreshContractStatus",
            ContractAction::RolloutRenewalOpportunity => "RolloutRenewalOpportunity",
            ContractAction::SoftDelete => "SoftDeleteContract",
        }
    }

    fn creates_stream(&self) -> bool {
        matches!(self.action, ContractAction::Create(_))
    }
}

impl TaggedCommand for ContractCommand {
    fn from_tagged(kind: &str, base: BaseCommand, body: serde_json::Value) -> Result<Self> {
        let action = match kind {
            "CreateContract" => ContractAction::Create(decode_body(kind, body)?),
            "UpdateContract" => ContractAction::Update(decode_body(kind, body)?),
            "RefreshContractStatus" => ContractAction::RefreshStatus,
            "RolloutRenewalOpportunity" => ContractAction::RolloutRenewalOpportunity,
            "SoftDeleteContract" => ContractAction::SoftDelete,
            _ => return Err(invalid_command_type(&CONTRACT, kind)),
        };
        Ok(Self::new(base, action))
    }
}
