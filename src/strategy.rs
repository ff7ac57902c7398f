//! Per-type promotion strategies and their registry.
//!
//! A strategy pairs one resource type's [`TypeProfile`] with the adapter
//! that persists it. The registry is the only place the engine resolves a
//! resource type to behavior; supporting a new type means registering a
//! strategy, nothing else.

use crate::error::{PlanningError, Result};
use crate::resource::{
    CanonicalSnapshot, Normalizer, ResourceRecord, ResourceType, SyncAction, TypeProfile,
};
use crate::store::{PromotionContext, ResourceAdapter};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use tracing::debug;

/// One resource type's promotion behavior.
pub struct PromotionStrategy {
    normalizer: Normalizer,
    adapter: Arc<dyn ResourceAdapter>,
}

impl fmt::Debug for PromotionStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PromotionStrategy")
            .field("normalizer", &self.normalizer)
            .finish_non_exhaustive()
    }
}

impl PromotionStrategy {
    /// Pairs a profile with its persistence adapter.
    #[must_use]
    pub fn new(profile: TypeProfile, adapter: Arc<dyn ResourceAdapter>) -> Self {
        Self {
            normalizer: Normalizer::new(profile),
            adapter,
        }
    }

    /// The canonical type this strategy promotes.
    #[must_use]
    pub const fn resource_type(&self) -> ResourceType {
        self.normalizer.profile().resource_type
    }

    /// The normalizer for this type.
    #[must_use]
    pub const fn normalizer(&self) -> &Normalizer {
        &self.normalizer
    }

    /// The profile for this type.
    #[must_use]
    pub const fn profile(&self) -> &TypeProfile {
        self.normalizer.profile()
    }

    /// The persistence adapter for this type.
    #[must_use]
    pub fn adapter(&self) -> &dyn ResourceAdapter {
        self.adapter.as_ref()
    }

    /// Upserts one desired snapshot into the target environment.
    ///
    /// The live target is re-read fresh: when it already matches the desired
    /// fingerprint no write happens, otherwise the newest state wins and the
    /// live record is overwritten (or created when absent). Returns the
    /// action actually performed and the resulting record.
    ///
    /// # Errors
    ///
    /// Propagates adapter read and write failures.
    pub async fn apply_snapshot(
        &self,
        ctx: &PromotionContext,
        desired: &CanonicalSnapshot,
    ) -> Result<(SyncAction, ResourceRecord)> {
        let live = self
            .adapter
            .find_by_business_key(&ctx.target_environment_id, &desired.business_key)
            .await?;

        match live {
            Some(record) => {
                let already_matches = self
                    .normalizer
                    .normalize(&record)
                    .is_ok_and(|observed| observed.fingerprint() == desired.fingerprint());
                if already_matches {
                    debug!(
                        "Target {} '{}' already matches, no write needed",
                        self.resource_type(),
                        desired.business_key
                    );
                    return Ok((SyncAction::Unchanged, record));
                }

                let updated = self
                    .adapter
                    .update(&ctx.target_environment_id, &record.id, desired.payload())
                    .await?;
                Ok((SyncAction::Update, updated))
            }
            None => {
                let created = self
                    .adapter
                    .create(&ctx.target_environment_id, desired.payload())
                    .await?;
                Ok((SyncAction::Create, created))
            }
        }
    }
}

/// Resolves resource types to their promotion strategies.
#[derive(Default)]
pub struct PromotionRegistry {
    strategies: HashMap<ResourceType, PromotionStrategy>,
}

impl PromotionRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a strategy, replacing any previous one for its type.
    pub fn register(&mut self, strategy: PromotionStrategy) {
        self.strategies.insert(strategy.resource_type(), strategy);
    }

    /// Registers the built-in profile for a type with the given adapter.
    pub fn register_builtin(
        &mut self,
        resource_type: ResourceType,
        adapter: Arc<dyn ResourceAdapter>,
    ) {
        self.register(PromotionStrategy::new(
            TypeProfile::builtin(resource_type),
            adapter,
        ));
    }

    /// Resolves a type to its strategy; aliases resolve to their canonical
    /// type's strategy.
    ///
    /// # Errors
    ///
    /// Returns [`PlanningError::UnsupportedResourceType`] when no strategy
    /// is registered.
    pub fn strategy_for(&self, resource_type: ResourceType) -> Result<&PromotionStrategy> {
        self.strategies
            .get(&resource_type.canonical())
            .ok_or_else(|| {
                PlanningError::UnsupportedResourceType {
                    resource_type: resource_type.to_string(),
                }
                .into()
            })
    }

    /// Registered types, in promotion order.
    #[must_use]
    pub fn types(&self) -> Vec<ResourceType> {
        ResourceType::promotion_order()
            .iter()
            .copied()
            .filter(|t| self.strategies.contains_key(t))
            .collect()
    }

    /// Profiles of the registered types, in promotion order.
    #[must_use]
    pub fn profiles(&self) -> Vec<TypeProfile> {
        self.types()
            .into_iter()
            .filter_map(|t| self.strategies.get(&t).map(|s| s.profile().clone()))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::environment::Actor;
    use crate::error::PromotionError;
    use crate::store::MemoryResourceStore;
    use serde_json::json;

    fn context() -> PromotionContext {
        PromotionContext::new("org-1", "env-dev", "env-prod", Actor::new("user-1"))
    }

    fn layout_snapshot(content: &str) -> CanonicalSnapshot {
        let normalizer = Normalizer::new(TypeProfile::builtin(ResourceType::Layout));
        normalizer
            .normalize_payload(
                &json!({"identifier": "marketing", "content": content}),
                "lay-src",
            )
            .expect("snapshot should normalize")
    }

    #[tokio::test]
    async fn test_apply_snapshot_creates_then_skips() {
        let store = MemoryResourceStore::new("org-1");
        let strategy = PromotionStrategy::new(
            TypeProfile::builtin(ResourceType::Layout),
            store.adapter(ResourceType::Layout),
        );
        let desired = layout_snapshot("<html/>");

        let (first, record) = strategy
            .apply_snapshot(&context(), &desired)
            .await
            .expect("apply should succeed");
        assert_eq!(first, SyncAction::Create);
        assert_eq!(record.environment_id, "env-prod");
        assert_eq!(store.write_count(), 1);

        let (second, _) = strategy
            .apply_snapshot(&context(), &desired)
            .await
            .expect("re-apply should succeed");
        assert_eq!(second, SyncAction::Unchanged);
        assert_eq!(store.write_count(), 1);
    }

    #[tokio::test]
    async fn test_apply_snapshot_overwrites_divergent_target() {
        let store = MemoryResourceStore::new("org-1");
        let adapter = store.adapter(ResourceType::Layout);
        adapter
            .create("env-prod", json!({"identifier": "marketing", "content": "old"}))
            .await
            .expect("seed create should succeed");

        let strategy =
            PromotionStrategy::new(TypeProfile::builtin(ResourceType::Layout), adapter);
        let (action, record) = strategy
            .apply_snapshot(&context(), &layout_snapshot("new"))
            .await
            .expect("apply should succeed");

        assert_eq!(action, SyncAction::Update);
        assert_eq!(record.payload["content"], json!("new"));
    }

    #[test]
    fn test_registry_resolves_aliases_to_canonical_strategy() {
        let store = MemoryResourceStore::new("org-1");
        let mut registry = PromotionRegistry::new();
        registry.register_builtin(ResourceType::Layout, store.adapter(ResourceType::Layout));

        let strategy = registry
            .strategy_for(ResourceType::DefaultLayout)
            .expect("alias should resolve");

        assert_eq!(strategy.resource_type(), ResourceType::Layout);
    }

    #[test]
    fn test_registry_rejects_unregistered_types() {
        let registry = PromotionRegistry::new();

        let err = registry
            .strategy_for(ResourceType::Workflow)
            .expect_err("unregistered type should fail");

        assert!(matches!(
            err,
            PromotionError::Planning(PlanningError::UnsupportedResourceType { .. })
        ));
    }

    #[test]
    fn test_registry_types_follow_promotion_order() {
        let store = MemoryResourceStore::new("org-1");
        let mut registry = PromotionRegistry::new();
        registry.register_builtin(ResourceType::Workflow, store.adapter(ResourceType::Workflow));
        registry.register_builtin(ResourceType::Layout, store.adapter(ResourceType::Layout));
        registry.register_builtin(
            ResourceType::MessageTemplate,
            store.adapter(ResourceType::MessageTemplate),
        );

        assert_eq!(
            registry.types(),
            vec![
                ResourceType::Layout,
                ResourceType::MessageTemplate,
                ResourceType::Workflow
            ]
        );
    }
}
