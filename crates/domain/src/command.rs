//! Command handling infrastructure.

use std::marker::PhantomData;
use std::time::{Duration, Instant};

use common::Tenant;
use event_store::{EventEnvelope, EventMetadata, EventStore};
use serde::{Deserialize, Serialize, de::DeserializeOwned};
use tracing::Instrument;

use crate::aggregate::Aggregate;
use crate::cancel::Cancellation;
use crate::error::{DomainError, ErrorKind, Result};
use crate::store::AggregateStore;

/// Fields every command carries.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BaseCommand {
    pub object_id: String,
    pub tenant: Tenant,
    #[serde(default)]
    pub acting_user_id: String,
    #[serde(default)]
    pub app_source: Option<String>,
}

impl BaseCommand {
    pub fn new(tenant: Tenant, object_id: impl Into<String>) -> Self {
        Self {
            object_id: object_id.into(),
            tenant,
            acting_user_id: String::new(),
            app_source: None,
        }
    }

    pub fn acting_user(mut self, user_id: impl Into<String>) -> Self {
        self.acting_user_id = user_id.into();
        self
    }

    pub fn app_source(mut self, app: impl Into<String>) -> Self {
        self.app_source = Some(app.into());
        self
    }

    /// Metadata stamped on every event this command produces.
    pub fn metadata(&self) -> EventMetadata {
        EventMetadata::for_tenant(&self.tenant)
            .user_id(self.acting_user_id.clone())
            .app(self.app_source.clone())
    }

    /// Rejects commands without a tenant or object id.
    pub fn validate(&self) -> Result<()> {
        if self.tenant.is_empty() {
            return Err(DomainError::missing_field("tenant"));
        }
        if self.object_id.trim().is_empty() {
            return Err(DomainError::missing_field("objectId"));
        }
        Ok(())
    }
}

/// Trait for commands that can be executed against an aggregate.
///
/// Commands represent an intention to perform an action. They may be rejected
/// if the aggregate's current state doesn't allow the action.
pub trait Command: Send + Sync + std::fmt::Debug {
    fn base(&self) -> &BaseCommand;

    /// Name of the command kind, for logs and metrics.
    fn command_type(&self) -> &'static str;

    /// Whether the command may run against an empty stream.
    fn creates_stream(&self) -> bool {
        false
    }
}

/// A command sum type that can be decoded from a `(kind, body)` request.
pub trait TaggedCommand: Command + Sized {
    fn from_tagged(kind: &str, base: BaseCommand, body: serde_json::Value) -> Result<Self>;
}

/// Deserializes a tagged command body, reporting a mismatch as a validation error.
pub fn decode_body<T: DeserializeOwned>(kind: &str, body: serde_json::Value) -> Result<T> {
    serde_json::from_value(body)
        .map_err(|e| DomainError::Validation(format!("invalid {kind} body: {e}")))
}

pub fn invalid_command_type(aggregate_type: &common::AggregateType, kind: &str) -> DomainError {
    DomainError::InvalidCommandType {
        aggregate_type: aggregate_type.to_string(),
        command_type: kind.to_string(),
    }
}

/// Bounds and pacing for retrying a command after a concurrency conflict.
#[derive(Debug, Clone)]
pub struct RetryConfig {
    /// Total number of load/handle/save cycles, the first one included.
    pub max_attempts: u32,
    /// Delay before the second cycle.
    pub base_delay: Duration,
    /// Upper bound for any single delay.
    pub max_delay: Duration,
    /// Multiplier applied to the delay after each conflict.
    pub backoff_multiplier: f64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_millis(50),
            max_delay: Duration::from_secs(2),
            backoff_multiplier: 2.0,
        }
    }
}

impl RetryConfig {
    /// Delay to wait after the given failed attempt (1-based).
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(i32::MAX as u32) as i32;
        let millis = self.base_delay.as_millis() as f64 * self.backoff_multiplier.powi(exponent);
        let capped = millis.min(self.max_delay.as_millis() as f64).max(0.0);
        Duration::from_millis(capped.round() as u64)
    }
}

/// Result of command execution.
#[derive(Debug)]
pub struct CommandOutcome<A: Aggregate> {
    /// The aggregate after the new events were saved.
    pub aggregate: A,

    /// The events that were generated and persisted.
    pub events: Vec<EventEnvelope>,

    /// Number of load/save cycles it took.
    pub attempts: u32,
}

/// Handler for executing commands against aggregates.
///
/// Each cycle constructs a fresh aggregate, loads it, handles the command and
/// saves. A concurrency conflict reruns the cycle after a backoff, up to
/// [`RetryConfig::max_attempts`] cycles in total; any other error returns at
/// once.
pub struct CommandHandler<S, A>
where
    S: EventStore,
    A: Aggregate,
{
    store: AggregateStore<S>,
    retry: RetryConfig,
    _phantom: PhantomData<A>,
}

impl<S, A> CommandHandler<S, A>
where
    S: EventStore,
    A: Aggregate,
{
    /// Creates a new command handler with the default retry policy.
    pub fn new(store: AggregateStore<S>) -> Self {
        Self {
            store,
            retry: RetryConfig::default(),
            _phantom: PhantomData,
        }
    }

    pub fn with_retry(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }

    /// Returns a reference to the underlying aggregate store.
    pub fn store(&self) -> &AggregateStore<S> {
        &self.store
    }

    pub fn retry_config(&self) -> &RetryConfig {
        &self.retry
    }

    /// Executes a command and persists the resulting events.
    pub async fn handle(
        &self,
        command: &A::Command,
        cancel: &Cancellation,
    ) -> Result<CommandOutcome<A>> {
        let started = Instant::now();
        let max_attempts = self.retry.max_attempts.max(1);
        let command_type = command.command_type();
        let mut attempt = 0;

        loop {
            attempt += 1;
            if cancel.is_cancelled() {
                return Err(DomainError::Cancelled);
            }

            let aggregate = A::for_command(command);
            let span = tracing::info_span!(
                "handle_command",
                command = command_type,
                tenant = %aggregate.tenant(),
                aggregate_id = %aggregate.id(),
                attempt
            );

            match self.attempt(aggregate, command).instrument(span).await {
                Ok((aggregate, events)) => {
                    metrics::counter!("commands_handled_total", "outcome" => "ok").increment(1);
                    metrics::histogram!("command_duration_seconds")
                        .record(started.elapsed().as_secs_f64());
                    return Ok(CommandOutcome {
                        aggregate,
                        events,
                        attempts: attempt,
                    });
                }
                Err(err) if err.is_conflict() && attempt < max_attempts => {
                    metrics::counter!("command_conflicts_total").increment(1);
                    let delay = self.retry.delay_for(attempt);
                    tracing::warn!(
                        command = command_type,
                        attempt,
                        ?delay,
                        error = %err,
                        "Concurrency conflict, retrying"
                    );
                    tokio::select! {
                        _ = tokio::time::sleep(delay) => {}
                        _ = cancel.cancelled() => return Err(DomainError::Cancelled),
                    }
                }
                Err(err) => {
                    match err.kind() {
                        ErrorKind::Conflict { .. } => {
                            metrics::counter!("command_conflicts_total").increment(1);
                            tracing::warn!(command = command_type, attempt, error = %err, "Retries exhausted");
                        }
                        ErrorKind::InvalidType | ErrorKind::Internal => {
                            tracing::error!(command = command_type, error = %err, "Command failed");
                        }
                        _ => {
                            tracing::debug!(command = command_type, error = %err, "Command rejected");
                        }
                    }
                    metrics::counter!("commands_handled_total", "outcome" => "error").increment(1);
                    return Err(err);
                }
            }
        }
    }

    async fn attempt(
        &self,
        mut aggregate: A,
        command: &A::Command,
    ) -> Result<(A, Vec<EventEnvelope>)> {
        match self.store.load(&mut aggregate).await {
            Ok(()) => {}
            Err(DomainError::AggregateNotFound(_)) if command.creates_stream() => {}
            Err(err) => return Err(err),
        }

        aggregate.handle_command(command)?;
        let events = aggregate.uncommitted_events().to_vec();
        self.store.save(&mut aggregate).await?;

        Ok((aggregate, events))
    }
}

#[cfg(test)]
mod tests {
    use common::Tenant;
    use event_store::{InMemoryEventStore, Version};

    use super::*;
    use crate::aggregate::tests::{Counter, CounterCommand};

    fn handler(store: InMemoryEventStore) -> CommandHandler<InMemoryEventStore, Counter> {
        CommandHandler::new(AggregateStore::new(store))
    }

    fn base() -> BaseCommand {
        BaseCommand::new(Tenant::new("acme"), "c-1").acting_user("u-1")
    }

    #[test]
    fn backoff_grows_and_caps() {
        let retry = RetryConfig {
            max_attempts: 10,
            base_delay: Duration::from_millis(100),
            max_delay: Duration::from_millis(350),
            backoff_multiplier: 2.0,
        };
        assert_eq!(retry.delay_for(1), Duration::from_millis(100));
        assert_eq!(retry.delay_for(2), Duration::from_millis(200));
        assert_eq!(retry.delay_for(3), Duration::from_millis(350));
        assert_eq!(retry.delay_for(30), Duration::from_millis(350));
    }

    #[test]
    fn base_command_validation() {
        assert!(base().validate().is_ok());
        let missing = BaseCommand::new(Tenant::new(""), "c-1");
        assert!(matches!(
            missing.validate(),
            Err(DomainError::Validation(_))
        ));
    }

    #[tokio::test]
    async fn creation_command_starts_stream() {
        let store = InMemoryEventStore::new();
        let handler = handler(store.clone());

        let outcome = handler
            .handle(&CounterCommand::Add(base(), 3), &Cancellation::new())
            .await
            .unwrap();

        assert_eq!(outcome.attempts, 1);
        assert_eq!(outcome.events.len(), 1);
        assert_eq!(outcome.aggregate.total, 3);
        assert_eq!(outcome.aggregate.version(), Some(Version::first()));
        assert!(outcome.aggregate.uncommitted_events().is_empty());
        assert_eq!(store.event_count().await, 1);
    }

    #[tokio::test]
    async fn non_creation_command_on_empty_stream_is_not_found() {
        let store = InMemoryEventStore::new();
        let handler = handler(store.clone());

        let err = handler
            .handle(&CounterCommand::Reset(base()), &Cancellation::new())
            .await
            .unwrap_err();

        assert!(matches!(err, DomainError::AggregateNotFound(_)));
        assert_eq!(store.event_count().await, 0);
    }

    #[tokio::test]
    async fn versions_continue_across_commands() {
        let store = InMemoryEventStore::new();
        let handler = handler(store);
        let cancel = Cancellation::new();

        handler
            .handle(&CounterCommand::Add(base(), 1), &cancel)
            .await
            .unwrap();
        handler
            .handle(&CounterCommand::Add(base(), 2), &cancel)
            .await
            .unwrap();
        let outcome = handler
            .handle(&CounterCommand::Reset(base()), &cancel)
            .await
            .unwrap();

        assert_eq!(outcome.events[0].version, Version::new(2));
        assert_eq!(outcome.aggregate.total, 0);
    }

    #[tokio::test]
    async fn rejected_command_writes_nothing() {
        let store = InMemoryEventStore::new();
        let handler = handler(store.clone());

        let err = handler
            .handle(&CounterCommand::Add(base(), -1), &Cancellation::new())
            .await
            .unwrap_err();

        assert!(matches!(err, DomainError::Validation(_)));
        assert_eq!(store.event_count().await, 0);
    }

    #[tokio::test]
    async fn cancelled_before_start_writes_nothing() {
        let store = InMemoryEventStore::new();
        let handler = handler(store.clone());
        let cancel = Cancellation::new();
        cancel.cancel();

        let err = handler
            .handle(&CounterCommand::Add(base(), 1), &cancel)
            .await
            .unwrap_err();

        assert!(matches!(err, DomainError::Cancelled));
        assert_eq!(store.event_count().await, 0);
    }

    #[tokio::test]
    async fn store_failure_is_not_retried() {
        let store = InMemoryEventStore::new();
        store.fail_next_appends(1).await;
        let handler = handler(store.clone());

        let err = handler
            .handle(&CounterCommand::Add(base(), 1), &Cancellation::new())
            .await
            .unwrap_err();

        assert!(matches!(err, DomainError::EventStore(_)));
        assert_eq!(store.event_count().await, 0);
    }
}
