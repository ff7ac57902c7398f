//! End-to-end promotion operations.
//!
//! The orchestrator is the only entry point that combines validation,
//! authorization, locking, planning, and execution. Everything underneath it
//! is composable on its own; everything above it (the CLI, a service
//! endpoint) only ever calls the three operations defined here.

use crate::change::{ChangeAggregator, ChangeStore, PatchKind, PatchOp, apply_op};
use crate::config::PromotionSettings;
use crate::environment::{Actor, Environment, EnvironmentLookup, PromotionGate};
use crate::error::{PlanningError, PromotionError, Result, ValidationError};
use crate::resource::{ResourceRecord, ResourceType, SyncAction};
use crate::store::{LockLease, PromotionContext, PromotionLock, generate_holder_id};
use crate::strategy::PromotionRegistry;
use crate::sync::{SyncExecutor, SyncPlan, SyncPlanBuilder, SyncReport};
use serde::Serialize;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// Outcome of the legacy single-resource promotion path.
#[derive(Debug, Clone, Serialize)]
pub struct PromotedResource {
    /// Canonical type of the promoted resource.
    pub resource_type: ResourceType,
    /// Business key of the promoted resource.
    pub business_key: String,
    /// The action effectively taken in the target environment.
    pub action: SyncAction,
    /// The record as it now exists in the target environment.
    pub record: ResourceRecord,
}

/// Drives promotions between environments of one organization.
pub struct PromotionOrchestrator {
    registry: Arc<PromotionRegistry>,
    environments: Arc<dyn EnvironmentLookup>,
    gate: Arc<dyn PromotionGate>,
    lock: Arc<dyn PromotionLock>,
    changes: Arc<dyn ChangeStore>,
    settings: PromotionSettings,
    holder: String,
}

impl PromotionOrchestrator {
    /// Wires an orchestrator over its backends.
    #[must_use]
    pub fn new(
        registry: Arc<PromotionRegistry>,
        environments: Arc<dyn EnvironmentLookup>,
        gate: Arc<dyn PromotionGate>,
        lock: Arc<dyn PromotionLock>,
        changes: Arc<dyn ChangeStore>,
        settings: PromotionSettings,
    ) -> Self {
        Self {
            registry,
            environments,
            gate,
            lock,
            changes,
            settings,
            holder: generate_holder_id(),
        }
    }

    /// Computes the plan a publish would execute, without writing anything.
    ///
    /// # Errors
    ///
    /// Returns a [`ValidationError`] when the environment pair is invalid and
    /// a [`PlanningError`] when the plan cannot be built.
    pub async fn diff_environments(
        &self,
        source_environment_id: &str,
        target_environment_id: &str,
    ) -> Result<SyncPlan> {
        let (source, target) = self
            .validate_pair(source_environment_id, target_environment_id)
            .await?;

        debug!("Computing diff {} -> {}", source.id, target.id);

        SyncPlanBuilder::new(Arc::clone(&self.registry))
            .build_plan(&source.id, &target.id, &self.promotion_types())
            .await
    }

    /// Plans and executes a full promotion into the target environment.
    ///
    /// The target is locked for the duration of the run. Per-entry failures
    /// land in the report; only pre-write validation and planning abort.
    ///
    /// # Errors
    ///
    /// Returns a [`ValidationError`] when the pair is invalid, the actor
    /// lacks permission, or the target lock stays contended past the
    /// configured wait. Returns a [`PlanningError`] when the plan cannot be
    /// built.
    pub async fn publish_to_environment(
        &self,
        source_environment_id: &str,
        target_environment_id: &str,
        actor: &Actor,
    ) -> Result<SyncReport> {
        let (source, target) = self
            .validate_pair(source_environment_id, target_environment_id)
            .await?;
        self.gate.assert_can_promote(actor, &source, &target).await?;

        info!("Publishing {} -> {} as {actor}", source.id, target.id);

        let lease = self.acquire_target_lock(&target.id).await?;
        let outcome = self.execute_publish(&source, &target, actor).await;
        if let Err(e) = self.lock.release(&lease).await {
            warn!("Failed to release lock on {}: {e}", target.id);
        }
        outcome
    }

    /// Promotes one resource by replaying its change history into the
    /// target environment.
    ///
    /// This is the changelog-era path. The replayed state wins field by
    /// field: leaves it carries are written over the target's copy, leaves it
    /// lacks are removed, and environment-bound payload fields stay
    /// untouched. The target environment is not locked; the write is a
    /// single upsert.
    ///
    /// # Errors
    ///
    /// Returns [`PlanningError::NothingToPromote`] when the resource has no
    /// enabled changes, a [`ValidationError`] when the pair is invalid or the
    /// actor lacks permission, and a [`StoreError`](crate::error::StoreError)
    /// when the write fails.
    pub async fn promote_change(
        &self,
        organization_id: &str,
        resource_type: ResourceType,
        resource_id: &str,
        target_environment_id: &str,
        actor: &Actor,
    ) -> Result<PromotedResource> {
        let aggregated = ChangeAggregator::new(Arc::clone(&self.changes))
            .aggregate(organization_id, resource_type, resource_id)
            .await?;
        let source_environment_id = match aggregated.environment_id {
            Some(ref id) if aggregated.has_changes() => id.clone(),
            _ => {
                return Err(PlanningError::NothingToPromote {
                    resource_type: resource_type.canonical().to_string(),
                    resource_id: resource_id.to_string(),
                }
                .into());
            }
        };

        let (source, target) = self
            .validate_pair(&source_environment_id, target_environment_id)
            .await?;
        self.gate.assert_can_promote(actor, &source, &target).await?;

        let strategy = self.registry.strategy_for(resource_type)?;
        let desired = strategy
            .normalizer()
            .normalize_payload(&aggregated.state, resource_id)?;

        info!(
            "Promoting {} '{}' into {} as {actor}",
            strategy.resource_type(),
            desired.business_key,
            target.id
        );

        let live = strategy
            .adapter()
            .find_by_business_key(&target.id, &desired.business_key)
            .await?;

        let (action, record) = match live {
            None => {
                let created = strategy
                    .adapter()
                    .create(&target.id, desired.payload())
                    .await?;
                (SyncAction::Create, created)
            }
            Some(live_record) => {
                let observed = strategy.normalizer().normalize(&live_record)?;
                if observed.fingerprint() == desired.fingerprint() {
                    debug!(
                        "Target copy of '{}' already matches the replayed state",
                        desired.business_key
                    );
                    (SyncAction::Unchanged, live_record)
                } else {
                    let mut payload = live_record.payload.clone();
                    for path in desired.diff_fields(&observed) {
                        let op = match desired.field(&path) {
                            Some(value) => {
                                PatchOp::set(PatchKind::Replace, path.clone(), value.clone())
                            }
                            None => PatchOp::remove(path.clone()),
                        };
                        apply_op(&mut payload, &op).map_err(|e| {
                            PromotionError::internal(format!(
                                "Replayed state for '{}' is not applicable: {e}",
                                desired.business_key
                            ))
                        })?;
                    }
                    let updated = strategy
                        .adapter()
                        .update(&target.id, &live_record.id, payload)
                        .await?;
                    (SyncAction::Update, updated)
                }
            }
        };

        info!(
            "Promoted {} '{}' into {}: {action}",
            strategy.resource_type(),
            desired.business_key,
            target.id
        );

        Ok(PromotedResource {
            resource_type: strategy.resource_type(),
            business_key: desired.business_key,
            action,
            record,
        })
    }

    /// Resolves both environments and checks they form a declared promotion
    /// edge within one organization.
    async fn validate_pair(
        &self,
        source_environment_id: &str,
        target_environment_id: &str,
    ) -> Result<(Environment, Environment)> {
        let source = self
            .environments
            .find_environment(source_environment_id)
            .await?
            .ok_or_else(|| ValidationError::EnvironmentNotFound {
                environment_id: source_environment_id.to_string(),
            })?;
        let target = self
            .environments
            .find_environment(target_environment_id)
            .await?
            .ok_or_else(|| ValidationError::EnvironmentNotFound {
                environment_id: target_environment_id.to_string(),
            })?;

        if source.organization_id != target.organization_id {
            return Err(ValidationError::OrganizationMismatch {
                source_environment_id: source.id,
                target_environment_id: target.id,
            }
            .into());
        }

        if !source.is_promotion_target(&target.id) {
            return Err(ValidationError::NotAPromotionTarget {
                source_environment_id: source.id,
                target_environment_id: target.id,
            }
            .into());
        }

        Ok((source, target))
    }

    /// Acquires the target lock, retrying while the contention stays
    /// retryable and the configured wait has not elapsed.
    async fn acquire_target_lock(&self, environment_id: &str) -> Result<LockLease> {
        let deadline = Instant::now() + Duration::from_secs(self.settings.lock_wait_secs);
        loop {
            match self
                .lock
                .acquire(environment_id, &self.holder, self.settings.lock_expiry_secs)
                .await
            {
                Ok(lease) => return Ok(lease),
                Err(e) if e.is_retryable() => {
                    let now = Instant::now();
                    if now >= deadline {
                        return Err(e);
                    }
                    let delay = Duration::from_secs(e.retry_delay_secs().unwrap_or(1))
                        .min(deadline - now);
                    info!("Environment {environment_id} is locked, retrying in {delay:?}");
                    tokio::time::sleep(delay).await;
                }
                Err(e) => return Err(e),
            }
        }
    }

    /// Builds and executes the plan while the target lock is held.
    async fn execute_publish(
        &self,
        source: &Environment,
        target: &Environment,
        actor: &Actor,
    ) -> Result<SyncReport> {
        let plan = SyncPlanBuilder::new(Arc::clone(&self.registry))
            .build_plan(&source.id, &target.id, &self.promotion_types())
            .await?;

        let ctx = PromotionContext::new(
            source.organization_id.clone(),
            &source.id,
            &target.id,
            actor.clone(),
        )
        .with_prune(self.settings.prune);

        SyncExecutor::new(Arc::clone(&self.registry))
            .with_batch_size(self.settings.batch_size)
            .execute(&plan, &ctx)
            .await
    }

    /// The resource types a promotion covers: the configured restriction, or
    /// every registered type.
    fn promotion_types(&self) -> Vec<ResourceType> {
        self.settings
            .types
            .clone()
            .unwrap_or_else(|| self.registry.types())
    }
}
