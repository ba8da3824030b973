//! Paged background jobs that repair derived aggregate state.
//!
//! Jobs sharing a group never overlap: a run that finds its group busy is
//! skipped rather than queued.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use common::Tenant;
use domain::contract::CONTRACT;
use domain::contract::events::CONTRACT_CREATE_V1;
use domain::{BaseCommand, Cancellation, ContractStatus, DomainError};
use event_store::EventStore;
use futures_util::StreamExt;
use tokio::sync::{Mutex, OwnedMutexGuard};
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};

use crate::state::AppState;

/// Application source recorded on commands issued by jobs.
pub const JOB_APP_SOURCE: &str = "upkeeper";

pub const CONTRACT_GROUP: &str = "contract";

/// One mutex per job group.
#[derive(Default)]
pub struct JobLocks {
    groups: Mutex<HashMap<&'static str, Arc<Mutex<()>>>>,
}

impl JobLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Takes the group's lock if nobody holds it.
    pub async fn try_acquire(&self, group: &'static str) -> Option<OwnedMutexGuard<()>> {
        let lock = {
            let mut groups = self.groups.lock().await;
            Arc::clone(groups.entry(group).or_default())
        };
        lock.try_lock_owned().ok()
    }
}

/// A job that repeatedly fetches a page of due items and processes them.
#[async_trait]
pub trait BatchJob: Send + Sync {
    type Item: Send + std::fmt::Debug;

    fn group(&self) -> &'static str;

    fn name(&self) -> &'static str;

    /// Up to `limit` items still needing work.
    async fn fetch_due(&self, limit: usize) -> Result<Vec<Self::Item>, DomainError>;

    async fn process(&self, item: Self::Item, cancel: &Cancellation) -> Result<(), DomainError>;
}

#[derive(Debug, Clone)]
pub struct BatchConfig {
    pub page_size: usize,
    /// Pause between pages.
    pub settle_delay: Duration,
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            page_size: 100,
            settle_delay: Duration::ZERO,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BatchReport {
    pub pages: usize,
    pub processed: usize,
    pub failed: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunOutcome {
    Completed(BatchReport),
    /// Another job of the same group was running.
    Skipped,
}

pub struct BatchRunner {
    locks: Arc<JobLocks>,
    config: BatchConfig,
}

impl BatchRunner {
    pub fn new(locks: Arc<JobLocks>, config: BatchConfig) -> Self {
        Self { locks, config }
    }

    /// Runs `job` until no due items remain, a page makes no progress, or `cancel` fires.
    pub async fn run<J: BatchJob>(
        &self,
        job: &J,
        cancel: &Cancellation,
    ) -> Result<RunOutcome, DomainError> {
        let Some(_guard) = self.locks.try_acquire(job.group()).await else {
            tracing::debug!(job = job.name(), group = job.group(), "Job group busy, skipping");
            return Ok(RunOutcome::Skipped);
        };

        let started = Instant::now();
        let mut report = BatchReport::default();
        let page_size = self.config.page_size.max(1);

        while !cancel.is_cancelled() {
            let items = job.fetch_due(page_size).await?;
            if items.is_empty() {
                break;
            }
            report.pages += 1;
            let fetched = items.len();
            let mut succeeded = 0;

            for item in items {
                if cancel.is_cancelled() {
                    break;
                }
                tracing::debug!(job = job.name(), ?item, "Processing item");
                match job.process(item, cancel).await {
                    Ok(()) => succeeded += 1,
                    Err(err) => {
                        report.failed += 1;
                        metrics::counter!("batch_job_failures_total", "job" => job.name())
                            .increment(1);
                        tracing::error!(job = job.name(), error = %err, "Item failed");
                    }
                }
            }
            report.processed += succeeded;

            if fetched < page_size || succeeded == 0 {
                break;
            }
            if !self.config.settle_delay.is_zero() {
                tokio::time::sleep(self.config.settle_delay).await;
            }
        }

        metrics::histogram!("batch_job_duration_seconds", "job" => job.name())
            .record(started.elapsed().as_secs_f64());
        tracing::info!(
            job = job.name(),
            pages = report.pages,
            processed = report.processed,
            failed = report.failed,
            "Job finished"
        );
        Ok(RunOutcome::Completed(report))
    }
}

/// Spawns a task running `job` every `every` until `cancel` fires.
pub fn spawn_periodic<J: BatchJob + 'static>(
    runner: Arc<BatchRunner>,
    job: Arc<J>,
    every: Duration,
    cancel: Cancellation,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval_at(Instant::now() + every, every);
        interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = interval.tick() => {
                    if let Err(err) = runner.run(job.as_ref(), &cancel).await {
                        tracing::error!(job = job.name(), error = %err, "Job run failed");
                    }
                }
            }
        }
        tracing::debug!(job = job.name(), "Job task exiting");
    })
}

/// Brings stored contract statuses in line with their dates.
pub struct ContractStatusJob<S: EventStore + 'static> {
    state: Arc<AppState<S>>,
}

impl<S: EventStore + Clone + 'static> ContractStatusJob<S> {
    pub fn new(state: Arc<AppState<S>>) -> Self {
        Self { state }
    }
}

#[async_trait]
impl<S: EventStore + Clone + 'static> BatchJob for ContractStatusJob<S> {
    type Item = (Tenant, String);

    fn group(&self) -> &'static str {
        CONTRACT_GROUP
    }

    fn name(&self) -> &'static str {
        "contract_status"
    }

    async fn fetch_due(&self, limit: usize) -> Result<Vec<Self::Item>, DomainError> {
        let now = Utc::now();
        let mut due = Vec::new();
        let mut events = self.state.event_store.stream_all_events().await?;

        while let Some(event) = events.next().await {
            let event = event?;
            if event.event_type != CONTRACT_CREATE_V1 {
                continue;
            }
            let Some(tenant) = event.tenant() else {
                continue;
            };
            let object_id = event.aggregate_id.object_id(&CONTRACT, &tenant).to_string();

            let contract = match self.state.contracts.get(&tenant, &object_id).await {
                Ok(contract) => contract,
                Err(err) => {
                    tracing::warn!(%tenant, %object_id, error = %err, "Skipping unreadable contract");
                    continue;
                }
            };
            let current = contract.state();
            if current.deleted {
                continue;
            }
            let derived =
                ContractStatus::derive(current.service_started_at, current.ended_at, now);
            if derived != current.status {
                due.push((tenant, object_id));
                if due.len() >= limit {
                    break;
                }
            }
        }
        Ok(due)
    }

    async fn process(&self, item: Self::Item, cancel: &Cancellation) -> Result<(), DomainError> {
        let (tenant, object_id) = item;
        let base = BaseCommand::new(tenant, object_id).app_source(JOB_APP_SOURCE);
        self.state.contracts.refresh_status(base, cancel).await?;
        Ok(())
    }
}
