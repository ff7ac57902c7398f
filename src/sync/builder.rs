//! Plan construction from live environment state.

use crate::error::{PlanningError, Result};
use crate::resource::{CanonicalSnapshot, ResourceType, compare_sets};
use crate::strategy::{PromotionRegistry, PromotionStrategy};
use crate::sync::{DependencyAnalyzer, SyncPlan};
use std::collections::HashSet;
use std::sync::Arc;
use tracing::debug;

/// Builds a [`SyncPlan`] by snapshotting both environments and classifying
/// every resource of the requested types.
///
/// Building is a pure read: neither environment is modified, and the same
/// pair of environments always produces the same plan.
#[derive(Clone)]
pub struct SyncPlanBuilder {
    registry: Arc<PromotionRegistry>,
}

impl SyncPlanBuilder {
    /// Creates a builder over the registered strategies.
    #[must_use]
    pub const fn new(registry: Arc<PromotionRegistry>) -> Self {
        Self { registry }
    }

    /// Computes the ordered plan that would make `target_environment_id`
    /// match `source_environment_id` for the given resource types.
    ///
    /// # Errors
    ///
    /// Returns a [`PlanningError`] when a type has no registered strategy,
    /// a record cannot be normalized, business keys collide, or references
    /// form a cycle. Store read failures propagate as
    /// [`StoreError`](crate::error::StoreError).
    pub async fn build_plan(
        &self,
        source_environment_id: &str,
        target_environment_id: &str,
        types: &[ResourceType],
    ) -> Result<SyncPlan> {
        let mut requested: Vec<ResourceType> =
            types.iter().map(|t| t.canonical()).collect();
        requested.sort_by_key(|t| t.order_index());
        requested.dedup();

        let mut entries = Vec::new();
        for resource_type in requested {
            let strategy = self.registry.strategy_for(resource_type)?;
            let source = snapshot_environment(strategy, source_environment_id).await?;
            let target = snapshot_environment(strategy, target_environment_id).await?;
            debug!(
                "Compared {resource_type}: {} in {source_environment_id}, {} in {target_environment_id}",
                source.len(),
                target.len()
            );
            entries.extend(compare_sets(&source, &target));
        }

        let entries = DependencyAnalyzer::new(self.registry.profiles()).order(entries)?;
        Ok(SyncPlan::new(
            source_environment_id,
            target_environment_id,
            entries,
        ))
    }
}

/// Reads and normalizes every record of the strategy's type in one
/// environment, rejecting business key collisions.
async fn snapshot_environment(
    strategy: &PromotionStrategy,
    environment_id: &str,
) -> Result<Vec<CanonicalSnapshot>> {
    let records = strategy.adapter().find_all(environment_id).await?;

    let mut seen: HashSet<String> = HashSet::with_capacity(records.len());
    let mut snapshots = Vec::with_capacity(records.len());
    for record in &records {
        let snapshot = strategy.normalizer().normalize(record)?;
        if !seen.insert(snapshot.business_key.clone()) {
            return Err(PlanningError::DuplicateBusinessKey {
                resource_type: strategy.resource_type().to_string(),
                business_key: snapshot.business_key,
                environment_id: environment_id.to_string(),
            }
            .into());
        }
        snapshots.push(snapshot);
    }
    Ok(snapshots)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::PromotionError;
    use crate::resource::SyncAction;
    use crate::store::MemoryResourceStore;
    use chrono::Utc;
    use serde_json::json;

    fn registry_for(store: &MemoryResourceStore, types: &[ResourceType]) -> Arc<PromotionRegistry> {
        let mut registry = PromotionRegistry::new();
        for resource_type in types {
            registry.register_builtin(*resource_type, store.adapter(*resource_type));
        }
        Arc::new(registry)
    }

    fn record(
        environment_id: &str,
        resource_type: ResourceType,
        payload: serde_json::Value,
    ) -> crate::resource::ResourceRecord {
        crate::resource::ResourceRecord {
            id: uuid::Uuid::new_v4().to_string(),
            organization_id: String::from("org-1"),
            environment_id: environment_id.to_string(),
            resource_type,
            protected: false,
            payload,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn test_plan_orders_layout_before_referencing_workflow() {
        let store = MemoryResourceStore::new("org-1");
        store
            .insert(record(
                "env-dev",
                ResourceType::Workflow,
                json!({
                    "trigger": {"identifier": "w1"},
                    "steps": [{"template": "t-absent", "controls": {"layout": "l1"}}],
                }),
            ))
            .await;
        store
            .insert(record(
                "env-dev",
                ResourceType::Layout,
                json!({"identifier": "l1", "content": "<html/>"}),
            ))
            .await;

        let registry = registry_for(&store, &[ResourceType::Workflow, ResourceType::Layout]);
        let plan = SyncPlanBuilder::new(registry)
            .build_plan(
                "env-dev",
                "env-prod",
                &[ResourceType::Workflow, ResourceType::Layout],
            )
            .await
            .expect("plan should build");

        let keys: Vec<&str> = plan
            .entries
            .iter()
            .map(|e| e.business_key.as_str())
            .collect();
        assert_eq!(keys, vec!["l1", "w1"]);
        assert!(plan.entries.iter().all(|e| e.action == SyncAction::Create));
    }

    #[tokio::test]
    async fn test_identical_environments_plan_as_unchanged() {
        let store = MemoryResourceStore::new("org-1");
        for environment_id in ["env-dev", "env-prod"] {
            store
                .insert(record(
                    environment_id,
                    ResourceType::Feed,
                    json!({"identifier": "activity", "name": "Activity"}),
                ))
                .await;
        }

        let registry = registry_for(&store, &[ResourceType::Feed]);
        let plan = SyncPlanBuilder::new(registry)
            .build_plan("env-dev", "env-prod", &[ResourceType::Feed])
            .await
            .expect("plan should build");

        assert_eq!(plan.entries.len(), 1);
        assert!(plan.is_noop());
    }

    #[tokio::test]
    async fn test_duplicate_business_keys_abort_planning() {
        let store = MemoryResourceStore::new("org-1");
        for _ in 0..2 {
            store
                .insert(record(
                    "env-dev",
                    ResourceType::Feed,
                    json!({"identifier": "activity"}),
                ))
                .await;
        }

        let registry = registry_for(&store, &[ResourceType::Feed]);
        let result = SyncPlanBuilder::new(registry)
            .build_plan("env-dev", "env-prod", &[ResourceType::Feed])
            .await;

        match result {
            Err(PromotionError::Planning(PlanningError::DuplicateBusinessKey {
                business_key,
                environment_id,
                ..
            })) => {
                assert_eq!(business_key, "activity");
                assert_eq!(environment_id, "env-dev");
            }
            other => panic!("expected duplicate key error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_unregistered_type_aborts_planning() {
        let store = MemoryResourceStore::new("org-1");
        let registry = registry_for(&store, &[ResourceType::Feed]);

        let result = SyncPlanBuilder::new(registry)
            .build_plan("env-dev", "env-prod", &[ResourceType::Workflow])
            .await;

        assert!(matches!(
            result,
            Err(PromotionError::Planning(
                PlanningError::UnsupportedResourceType { .. }
            ))
        ));
    }

    #[tokio::test]
    async fn test_building_twice_yields_the_same_plan() {
        let store = MemoryResourceStore::new("org-1");
        for key in ["b", "a", "c"] {
            store
                .insert(record(
                    "env-dev",
                    ResourceType::Layout,
                    json!({"identifier": key}),
                ))
                .await;
        }

        let registry = registry_for(&store, &[ResourceType::Layout]);
        let builder = SyncPlanBuilder::new(registry);

        let first = builder
            .build_plan("env-dev", "env-prod", &[ResourceType::Layout])
            .await
            .expect("plan should build");
        let second = builder
            .build_plan("env-dev", "env-prod", &[ResourceType::Layout])
            .await
            .expect("plan should build");

        let keys = |plan: &SyncPlan| -> Vec<String> {
            plan.entries.iter().map(|e| e.business_key.clone()).collect()
        };
        assert_eq!(keys(&first), keys(&second));
        assert_eq!(keys(&first), vec!["a", "b", "c"]);
    }
}
