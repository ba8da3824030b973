//! Integration tests for aggregate persistence and command handling.
//!
//! These tests drive the services end to end against the in-memory log and
//! cover replay, atomic saves, version ordering and the retry policy.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use common::{AggregateId, Tenant};
use domain::organization::{CreateOrganization, LinkEmail};
use domain::{
    Aggregate, AggregateStore, BaseCommand, Cancellation, DomainError, OrganizationService,
    RetryConfig,
};
use event_store::{
    EventEnvelope, EventStore, EventStoreError, EventStream, ExpectedVersion, InMemoryEventStore,
    Version,
};

fn tenant() -> Tenant {
    Tenant::new("acme")
}

fn base(object_id: &str) -> BaseCommand {
    BaseCommand::new(tenant(), object_id)
        .acting_user("u-1")
        .app_source("tests")
}

fn fast_retry(max_attempts: u32) -> RetryConfig {
    RetryConfig {
        max_attempts,
        base_delay: Duration::from_millis(1),
        max_delay: Duration::from_millis(5),
        backoff_multiplier: 2.0,
    }
}

fn create_org(name: &str, website: Option<&str>) -> CreateOrganization {
    CreateOrganization {
        name: name.to_string(),
        website: website.map(str::to_string),
        ..Default::default()
    }
}

/// Event store double that rejects the first `conflicts` appends and counts reads.
#[derive(Clone)]
struct ConflictingStore {
    inner: InMemoryEventStore,
    conflicts: Arc<AtomicUsize>,
    reads: Arc<AtomicUsize>,
}

impl ConflictingStore {
    fn new(conflicts: usize) -> Self {
        Self {
            inner: InMemoryEventStore::new(),
            conflicts: Arc::new(AtomicUsize::new(conflicts)),
            reads: Arc::new(AtomicUsize::new(0)),
        }
    }

    fn reads(&self) -> usize {
        self.reads.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl EventStore for ConflictingStore {
    async fn append_to_stream(
        &self,
        aggregate_id: &AggregateId,
        expected: ExpectedVersion,
        events: Vec<EventEnvelope>,
    ) -> event_store::Result<Version> {
        let pending = self
            .conflicts
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1));
        if pending.is_ok() {
            return Err(EventStoreError::ConcurrencyConflict {
                aggregate_id: aggregate_id.clone(),
                expected,
                actual: Some(Version::new(99)),
            });
        }
        self.inner
            .append_to_stream(aggregate_id, expected, events)
            .await
    }

    async fn read_stream(
        &self,
        aggregate_id: &AggregateId,
    ) -> event_store::Result<Vec<EventEnvelope>> {
        self.reads.fetch_add(1, Ordering::SeqCst);
        self.inner.read_stream(aggregate_id).await
    }

    async fn stream_version(
        &self,
        aggregate_id: &AggregateId,
    ) -> event_store::Result<Option<Version>> {
        self.inner.stream_version(aggregate_id).await
    }

    async fn stream_all_events(&self) -> event_store::Result<EventStream> {
        self.inner.stream_all_events().await
    }
}

mod persistence {
    use super::*;

    #[tokio::test]
    async fn replaying_a_stream_rebuilds_identical_state() {
        let store = InMemoryEventStore::new();
        let service = OrganizationService::new(AggregateStore::new(store), fast_retry(3));
        let cancel = Cancellation::new();

        service
            .create(base("org-1"), create_org("Acme", Some("acme.com")), &cancel)
            .await
            .unwrap();
        service
            .link_domain(base("org-1"), "acme.io", &cancel)
            .await
            .unwrap();
        service
            .link_email(
                base("org-1"),
                LinkEmail {
                    email_id: "e-1".to_string(),
                    primary: true,
                },
                &cancel,
            )
            .await
            .unwrap();

        let first = service.get(&tenant(), "org-1").await.unwrap();
        let second = service.get(&tenant(), "org-1").await.unwrap();
        assert_eq!(first.state(), second.state());
        assert_eq!(first.version(), second.version());
        assert_eq!(first.state().domains, vec!["acme.io".to_string()]);
    }

    #[tokio::test]
    async fn failed_save_writes_nothing() {
        let store = InMemoryEventStore::new();
        let service = OrganizationService::new(AggregateStore::new(store.clone()), fast_retry(3));
        store.fail_next_appends(1).await;

        // Two events: the creation and the scrape request for the website.
        let err = service
            .create(
                base("org-1"),
                create_org("Acme", Some("acme.com")),
                &Cancellation::new(),
            )
            .await
            .err()
            .unwrap();
        assert!(matches!(
            err,
            DomainError::EventStore(EventStoreError::Unavailable(_))
        ));
        assert_eq!(store.event_count().await, 0);
        assert!(matches!(
            service.get(&tenant(), "org-1").await,
            Err(DomainError::AggregateNotFound(_))
        ));
    }

    #[tokio::test]
    async fn stream_versions_are_dense_from_zero() {
        let store = InMemoryEventStore::new();
        let service = OrganizationService::new(AggregateStore::new(store.clone()), fast_retry(3));
        let cancel = Cancellation::new();

        service
            .create(base("org-1"), create_org("Acme", Some("acme.com")), &cancel)
            .await
            .unwrap();
        service.hide(base("org-1"), &cancel).await.unwrap();
        service.show(base("org-1"), &cancel).await.unwrap();

        let organization = service.get(&tenant(), "org-1").await.unwrap();
        let events = store.read_stream(organization.id()).await.unwrap();
        let versions: Vec<i64> = events.iter().map(|e| e.version.as_i64()).collect();
        assert_eq!(versions, vec![0, 1, 2, 3]);
        assert!(events
            .iter()
            .all(|e| e.metadata_str(common::metadata::TENANT) == Some("acme")));
    }

    #[tokio::test]
    async fn concurrent_commands_all_land_with_retries() {
        let store = InMemoryEventStore::new();
        let service = Arc::new(OrganizationService::new(
            AggregateStore::new(store.clone()),
            fast_retry(32),
        ));
        let cancel = Cancellation::new();
        service
            .create(base("org-1"), create_org("Acme", None), &cancel)
            .await
            .unwrap();

        let mut tasks = Vec::new();
        for i in 0..8 {
            let service = Arc::clone(&service);
            let cancel = cancel.clone();
            tasks.push(tokio::spawn(async move {
                service
                    .link_domain(base("org-1"), format!("acme-{i}.com"), &cancel)
                    .await
                    .map(|outcome| outcome.attempts)
            }));
        }
        for task in tasks {
            task.await.unwrap().unwrap();
        }

        let organization = service.get(&tenant(), "org-1").await.unwrap();
        assert_eq!(organization.state().domains.len(), 8);
        assert_eq!(organization.version(), Some(Version::new(8)));
    }
}

mod retry {
    use super::*;

    #[tokio::test]
    async fn conflicts_below_the_bound_are_absorbed() {
        let store = ConflictingStore::new(2);
        let service = OrganizationService::new(AggregateStore::new(store.clone()), fast_retry(3));

        let outcome = service
            .create(base("org-1"), create_org("Acme", None), &Cancellation::new())
            .await
            .unwrap();

        assert_eq!(outcome.attempts, 3);
        assert_eq!(store.reads(), 3);
        assert_eq!(outcome.aggregate.version(), Some(Version::first()));
    }

    #[tokio::test]
    async fn exhausted_retries_surface_the_conflict() {
        let store = ConflictingStore::new(10);
        let service = OrganizationService::new(AggregateStore::new(store.clone()), fast_retry(3));

        let err = service
            .create(base("org-1"), create_org("Acme", None), &Cancellation::new())
            .await
            .err()
            .unwrap();

        assert!(matches!(err, DomainError::WrongExpectedVersion { .. }));
        assert!(err.is_conflict());
        assert_eq!(store.reads(), 3);
    }

    #[tokio::test]
    async fn non_conflict_errors_are_not_retried() {
        let store = ConflictingStore::new(0);
        let service = OrganizationService::new(AggregateStore::new(store.clone()), fast_retry(3));

        let err = service
            .hide(base("org-404"), &Cancellation::new())
            .await
            .err()
            .unwrap();

        assert!(matches!(err, DomainError::AggregateNotFound(_)));
        assert_eq!(store.reads(), 1);
    }

    #[tokio::test]
    async fn cancellation_interrupts_backoff() {
        let store = ConflictingStore::new(10);
        let retry = RetryConfig {
            max_attempts: 5,
            base_delay: Duration::from_secs(30),
            max_delay: Duration::from_secs(30),
            backoff_multiplier: 1.0,
        };
        let service = OrganizationService::new(AggregateStore::new(store.clone()), retry);
        let cancel = Cancellation::new();

        let canceller = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(50)).await;
            canceller.cancel();
        });

        let result = tokio::time::timeout(
            Duration::from_secs(5),
            service.create(base("org-1"), create_org("Acme", None), &cancel),
        )
        .await
        .unwrap();

        assert!(matches!(result, Err(DomainError::Cancelled)));
        assert_eq!(store.reads(), 1);
    }

    #[tokio::test]
    async fn cancelled_before_start_does_no_work() {
        let store = ConflictingStore::new(0);
        let service = OrganizationService::new(AggregateStore::new(store.clone()), fast_retry(3));
        let cancel = Cancellation::new();
        cancel.cancel();

        let result = service
            .create(base("org-1"), create_org("Acme", None), &cancel)
            .await;
        assert!(matches!(result, Err(DomainError::Cancelled)));
        assert_eq!(store.reads(), 0);
    }
}
