//! Organization aggregate implementation.

use chrono::{DateTime, Utc};
use common::{AggregateType, Tenant};
use event_store::EventMetadata;

use crate::aggregate::{Aggregate, AggregateBase};
use crate::error::{DomainError, Result};

use super::{
    CreateOrganization, LinkEmail, ORGANIZATION, OrganizationAction, OrganizationCommand,
    OrganizationEvent, UpdateOrganization,
    events::{
        DomainData, EmailLinkedData, OrganizationCreatedData, OrganizationUpdatedData,
        ScrapeRequestedData, VisibilityData,
    },
};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LinkedEmail {
    pub email_id: String,
    pub primary: bool,
}

/// Current state of an organization.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct OrganizationState {
    pub name: String,
    pub website: Option<String>,
    pub domains: Vec<String>,
    pub emails: Vec<LinkedEmail>,
    pub hidden: bool,
    /// Website of the most recent scrape request.
    pub scrape_requested_for: Option<String>,
    pub created_at: Option<DateTime<Utc>>,
    pub updated_at: Option<DateTime<Utc>>,
}

impl OrganizationState {
    pub fn primary_email(&self) -> Option<&str> {
        self.emails
            .iter()
            .find(|e| e.primary)
            .map(|e| e.email_id.as_str())
    }
}

/// Organization aggregate root.
#[derive(Debug)]
pub struct Organization {
    base: AggregateBase,
    state: OrganizationState,
}

impl Organization {
    pub fn state(&self) -> &OrganizationState {
        &self.state
    }

    fn create(&mut self, data: &CreateOrganization, meta: &EventMetadata) -> Result<()> {
        if self.exists() {
            return Err(DomainError::Precondition(format!(
                "organization {} already exists",
                self.base.object_id()
            )));
        }
        let name = data.name.trim();
        if name.is_empty() {
            return Err(DomainError::missing_field("name"));
        }

        let created_at = data.created_at.unwrap_or_else(Utc::now);
        let website = non_empty(data.website.as_deref());
        self.apply(
            OrganizationEvent::Created(OrganizationCreatedData {
                name: name.to_string(),
                website: website.clone(),
                created_at,
            }),
            meta,
        )?;

        if let Some(website) = website {
            self.request_scrape(website, created_at, meta)?;
        }
        Ok(())
    }

    fn update(&mut self, data: &UpdateOrganization, meta: &EventMetadata) -> Result<()> {
        let name = match data.name.as_deref().map(str::trim) {
            Some("") => return Err(DomainError::Validation("name cannot be blank".to_string())),
            Some(name) => name.to_string(),
            None => self.state.name.clone(),
        };
        let website = match data.website.as_deref() {
            Some(website) => non_empty(Some(website)),
            None => self.state.website.clone(),
        };
        let website_changed = website.is_some() && website != self.state.website;
        let updated_at = data.updated_at.unwrap_or_else(Utc::now);

        self.apply(
            OrganizationEvent::Updated(OrganizationUpdatedData {
                name,
                website: website.clone(),
                updated_at,
            }),
            meta,
        )?;

        if website_changed && let Some(website) = website {
            self.request_scrape(website, updated_at, meta)?;
        }
        Ok(())
    }

    fn request_scrape(
        &mut self,
        website: String,
        requested_at: DateTime<Utc>,
        meta: &EventMetadata,
    ) -> Result<()> {
        self.apply(
            OrganizationEvent::ScrapeRequested(ScrapeRequestedData {
                website,
                requested_at,
            }),
            meta,
        )
    }

    fn link_domain(&mut self, domain: &str, meta: &EventMetadata) -> Result<()> {
        let domain = domain.trim();
        if domain.is_empty() {
            return Err(DomainError::missing_field("domain"));
        }
        if self.state.domains.iter().any(|d| d == domain) {
            return Ok(());
        }
        self.apply(
            OrganizationEvent::DomainLinked(DomainData {
                domain: domain.to_string(),
            }),
            meta,
        )
    }

    fn unlink_domain(&mut self, domain: &str, meta: &EventMetadata) -> Result<()> {
        let domain = domain.trim();
        if !self.state.domains.iter().any(|d| d == domain) {
            return Ok(());
        }
        self.apply(
            OrganizationEvent::DomainUnlinked(DomainData {
                domain: domain.to_string(),
            }),
            meta,
        )
    }

    fn link_email(&mut self, data: &LinkEmail, meta: &EventMetadata) -> Result<()> {
        let email_id = data.email_id.trim();
        if email_id.is_empty() {
            return Err(DomainError::missing_field("emailId"));
        }
        let already_linked = self
            .state
            .emails
            .iter()
            .any(|e| e.email_id == email_id && e.primary == data.primary);
        if already_linked {
            return Ok(());
        }

        // Collected first: applying a primary link clears every other primary flag.
        let demoted: Vec<String> = if data.primary {
            self.state
                .emails
                .iter()
                .filter(|e| e.primary && e.email_id != email_id)
                .map(|e| e.email_id.clone())
                .collect()
        } else {
            Vec::new()
        };

        self.apply(
            OrganizationEvent::EmailLinked(EmailLinkedData {
                email_id: email_id.to_string(),
                primary: data.primary,
            }),
            meta,
        )?;

        for email_id in demoted {
            self.apply(
                OrganizationEvent::EmailLinked(EmailLinkedData {
                    email_id,
                    primary: false,
                }),
                meta,
            )?;
        }
        Ok(())
    }

    fn set_hidden(&mut self, hidden: bool, meta: &EventMetadata) -> Result<()> {
        if self.state.hidden == hidden {
            return Ok(());
        }
        let data = VisibilityData {
            updated_at: Utc::now(),
        };
        let event = if hidden {
            OrganizationEvent::Hidden(data)
        } else {
            OrganizationEvent::Shown(data)
        };
        self.apply(event, meta)
    }
}

impl Aggregate for Organization {
    type Event = OrganizationEvent;
    type Command = OrganizationCommand;

    const AGGREGATE_TYPE: AggregateType = ORGANIZATION;

    fn with_tenant_and_id(tenant: Tenant, object_id: &str) -> Self {
        Self {
            base: AggregateBase::new(ORGANIZATION, tenant, object_id),
            state: OrganizationState::default(),
        }
    }

    fn base(&self) -> &AggregateBase {
        &self.base
    }

    fn base_mut(&mut self) -> &mut AggregateBase {
        &mut self.base
    }

    fn when(&mut self, event: &OrganizationEvent) {
        let state = &mut self.state;
        match event {
            OrganizationEvent::Created(data) => {
                state.name = data.name.clone();
                state.website = data.website.clone();
                state.created_at = Some(data.created_at);
                state.updated_at = Some(data.created_at);
            }
            OrganizationEvent::Updated(data) => {
                state.name = data.name.clone();
                state.website = data.website.clone();
                state.updated_at = Some(data.updated_at);
            }
            OrganizationEvent::ScrapeRequested(data) => {
                state.scrape_requested_for = Some(data.website.clone());
            }
            OrganizationEvent::DomainLinked(data) => {
                if !state.domains.contains(&data.domain) {
                    state.domains.push(data.domain.clone());
                }
            }
            OrganizationEvent::DomainUnlinked(data) => {
                state.domains.retain(|d| d != &data.domain);
            }
            OrganizationEvent::EmailLinked(data) => {
                if data.primary {
                    for email in &mut state.emails {
                        email.primary = false;
                    }
                }
                match state.emails.iter_mut().find(|e| e.email_id == data.email_id) {
                    Some(email) => email.primary = data.primary,
                    None => state.emails.push(LinkedEmail {
                        email_id: data.email_id.clone(),
                        primary: data.primary,
                    }),
                }
            }
            OrganizationEvent::Hidden(data) => {
                state.hidden = true;
                state.updated_at = Some(data.updated_at);
            }
            OrganizationEvent::Shown(data) => {
                state.hidden = false;
                state.updated_at = Some(data.updated_at);
            }
        }
    }

    fn handle_command(&mut self, command: &OrganizationCommand) -> Result<()> {
        let meta = command.base.metadata();
        match &command.action {
            OrganizationAction::Create(data) => self.create(data, &meta),
            OrganizationAction::Update(data) => self.update(data, &meta),
            OrganizationAction::LinkDomain(data) => self.link_domain(&data.domain, &meta),
            OrganizationAction::UnlinkDomain(data) => self.unlink_domain(&data.domain, &meta),
            OrganizationAction::LinkEmail(data) => self.link_email(data, &meta),
            OrganizationAction::Hide => self.set_hidden(true, &meta),
            OrganizationAction::Show => self.set_hidden(false, &meta),
        }
    }
}

fn non_empty(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}
