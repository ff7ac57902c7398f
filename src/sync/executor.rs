//! Idempotent execution of sync plans.

use crate::error::Result;
use crate::resource::{DiffEntry, ResourceType, SyncAction};
use crate::store::PromotionContext;
use crate::strategy::{PromotionRegistry, PromotionStrategy};
use crate::sync::SyncPlan;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, error, info, warn};

/// Default number of plan entries executed per batch.
pub const DEFAULT_BATCH_SIZE: usize = 25;

/// How one plan entry ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntryStatus {
    /// The write or delete was performed.
    Applied,
    /// The target already matched; nothing was written.
    Unchanged,
    /// The entry was not attempted.
    Skipped,
    /// A guardrail rejected the entry.
    Conflict,
    /// The adapter call failed. Later entries still ran.
    Failed,
}

impl std::fmt::Display for EntryStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Applied => "applied",
            Self::Unchanged => "unchanged",
            Self::Skipped => "skipped",
            Self::Conflict => "conflict",
            Self::Failed => "failed",
        };
        write!(f, "{s}")
    }
}

/// Outcome of one plan entry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EntryResult {
    /// Business key of the resource.
    pub business_key: String,
    /// Canonical type of the resource.
    pub resource_type: ResourceType,
    /// The action effectively taken. A planned create degrades to
    /// [`SyncAction::Unchanged`] when the target converged in the meantime.
    pub action: SyncAction,
    /// How the entry ended.
    pub status: EntryStatus,
    /// Failure, conflict, or skip detail.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

/// Aggregated outcome of one plan execution.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SyncReport {
    /// Per-entry outcomes in execution order.
    pub entries: Vec<EntryResult>,
    /// Resources created.
    pub created: usize,
    /// Resources updated.
    pub updated: usize,
    /// Resources deleted, counting proposals that found nothing to remove.
    pub deleted: usize,
    /// Entries that needed no write.
    pub unchanged: usize,
    /// Entries not attempted.
    pub skipped: usize,
    /// Entries rejected by a guardrail.
    pub conflicts: usize,
    /// Entries whose adapter call failed.
    pub failed: usize,
    /// Whether the run finished without failures or conflicts.
    pub success: bool,
}

impl SyncReport {
    /// Creates an empty report.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Folds one entry outcome into the counters.
    pub fn record(&mut self, result: EntryResult) {
        match result.status {
            EntryStatus::Applied => match result.action {
                SyncAction::Create => self.created += 1,
                SyncAction::Update => self.updated += 1,
                SyncAction::Delete => self.deleted += 1,
                SyncAction::Unchanged => self.unchanged += 1,
            },
            EntryStatus::Unchanged => self.unchanged += 1,
            EntryStatus::Skipped => self.skipped += 1,
            EntryStatus::Conflict => self.conflicts += 1,
            EntryStatus::Failed => self.failed += 1,
        }
        self.entries.push(result);
    }
}

impl std::fmt::Display for SyncReport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} created, {} updated, {} deleted, {} unchanged, {} skipped, {} conflicts, {} failed",
            self.created,
            self.updated,
            self.deleted,
            self.unchanged,
            self.skipped,
            self.conflicts,
            self.failed
        )
    }
}

/// Applies a [`SyncPlan`] entry by entry, in plan order.
///
/// Per-entry adapter failures and guardrail conflicts are recorded in the
/// report and never stop the remaining entries. Re-running a plan against a
/// converged target writes nothing.
pub struct SyncExecutor {
    registry: Arc<PromotionRegistry>,
    batch_size: usize,
}

impl SyncExecutor {
    /// Creates an executor with the default batch size.
    #[must_use]
    pub const fn new(registry: Arc<PromotionRegistry>) -> Self {
        Self {
            registry,
            batch_size: DEFAULT_BATCH_SIZE,
        }
    }

    /// Overrides the batch size.
    #[must_use]
    pub const fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size;
        self
    }

    /// Executes the plan against the context's target environment.
    ///
    /// # Errors
    ///
    /// Returns [`PlanningError`](crate::error::PlanningError) when an entry's
    /// type has no registered strategy. Everything that goes wrong past that
    /// point lands in the report instead.
    pub async fn execute(&self, plan: &SyncPlan, ctx: &PromotionContext) -> Result<SyncReport> {
        info!(
            "Executing plan {} -> {} with {} entries",
            plan.source_environment_id,
            plan.target_environment_id,
            plan.entries.len()
        );

        let mut report = SyncReport::new();
        let batch_size = self.batch_size.max(1);
        for (batch, entries) in plan.entries.chunks(batch_size).enumerate() {
            debug!("Executing batch {} ({} entries)", batch + 1, entries.len());
            for entry in entries {
                let result = self.apply_entry(entry, ctx).await?;
                report.record(result);
            }
        }

        report.success = report.failed == 0 && report.conflicts == 0;
        info!("Plan execution finished: {report}");
        Ok(report)
    }

    /// Executes a single entry.
    async fn apply_entry(&self, entry: &DiffEntry, ctx: &PromotionContext) -> Result<EntryResult> {
        let strategy = self.registry.strategy_for(entry.resource_type)?;

        match entry.action {
            SyncAction::Unchanged => Ok(entry_result(
                entry,
                SyncAction::Unchanged,
                EntryStatus::Unchanged,
                None,
            )),
            SyncAction::Create | SyncAction::Update => {
                let Some(desired) = entry.source.as_ref() else {
                    return Ok(entry_result(
                        entry,
                        entry.action,
                        EntryStatus::Failed,
                        Some(String::from("entry has no source snapshot")),
                    ));
                };
                match strategy.apply_snapshot(ctx, desired).await {
                    Ok((SyncAction::Unchanged, _)) => Ok(entry_result(
                        entry,
                        SyncAction::Unchanged,
                        EntryStatus::Unchanged,
                        Some(String::from("target already matched")),
                    )),
                    Ok((effective, _)) => {
                        Ok(entry_result(entry, effective, EntryStatus::Applied, None))
                    }
                    Err(e) => {
                        error!(
                            "Failed to {} {} '{}': {e}",
                            entry.action, entry.resource_type, entry.business_key
                        );
                        Ok(entry_result(
                            entry,
                            entry.action,
                            EntryStatus::Failed,
                            Some(e.to_string()),
                        ))
                    }
                }
            }
            SyncAction::Delete => Ok(self.apply_delete(strategy, entry, ctx).await),
        }
    }

    /// Executes a delete proposal. Deletes are the only destructive path, so
    /// the live record is re-read and checked against the protection guard
    /// immediately before the adapter call.
    async fn apply_delete(
        &self,
        strategy: &PromotionStrategy,
        entry: &DiffEntry,
        ctx: &PromotionContext,
    ) -> EntryResult {
        if !ctx.prune {
            debug!(
                "Prune disabled, leaving {} '{}' in place",
                entry.resource_type, entry.business_key
            );
            return entry_result(
                entry,
                SyncAction::Delete,
                EntryStatus::Skipped,
                Some(String::from("prune disabled")),
            );
        }

        let live = match strategy
            .adapter()
            .find_by_business_key(&ctx.target_environment_id, &entry.business_key)
            .await
        {
            Ok(live) => live,
            Err(e) => {
                error!(
                    "Failed to re-read {} '{}' before delete: {e}",
                    entry.resource_type, entry.business_key
                );
                return entry_result(
                    entry,
                    SyncAction::Delete,
                    EntryStatus::Failed,
                    Some(e.to_string()),
                );
            }
        };

        let Some(record) = live else {
            return entry_result(
                entry,
                SyncAction::Delete,
                EntryStatus::Applied,
                Some(String::from("already absent")),
            );
        };

        if record.protected {
            warn!(
                "Refusing to delete protected {} '{}'",
                entry.resource_type, entry.business_key
            );
            return entry_result(
                entry,
                SyncAction::Delete,
                EntryStatus::Conflict,
                Some(String::from("resource is protected")),
            );
        }

        match strategy.adapter().delete(ctx, &record).await {
            Ok(()) => entry_result(entry, SyncAction::Delete, EntryStatus::Applied, None),
            Err(e) => {
                error!(
                    "Failed to delete {} '{}': {e}",
                    entry.resource_type, entry.business_key
                );
                entry_result(
                    entry,
                    SyncAction::Delete,
                    EntryStatus::Failed,
                    Some(e.to_string()),
                )
            }
        }
    }
}

/// Builds the result row for one entry.
fn entry_result(
    entry: &DiffEntry,
    action: SyncAction,
    status: EntryStatus,
    detail: Option<String>,
) -> EntryResult {
    EntryResult {
        business_key: entry.business_key.clone(),
        resource_type: entry.resource_type,
        action,
        status,
        detail,
    }
}
