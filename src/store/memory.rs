//! In-memory backends for tests and the bundle-backed CLI.

use crate::change::{ChangeRecord, ChangeStore};
use crate::environment::{Actor, Environment, EnvironmentLookup, PromotionGate};
use crate::error::{Result, StoreError};
use crate::resource::{Normalizer, ResourceRecord, ResourceType, TypeProfile};
use crate::store::{PromotionContext, ResourceAdapter};
use async_trait::async_trait;
use chrono::Utc;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use tokio::sync::RwLock;
use tracing::debug;
use uuid::Uuid;

/// Shared in-memory resource store for one organization, with per-type
/// [`ResourceAdapter`] views.
///
/// Adapter writes are counted, so tests can assert that an idempotent
/// re-run touched nothing. Seeding through [`MemoryResourceStore::insert`]
/// does not count.
#[derive(Debug, Clone)]
pub struct MemoryResourceStore {
    inner: Arc<StoreInner>,
}

#[derive(Debug)]
struct StoreInner {
    organization_id: String,
    records: RwLock<Vec<ResourceRecord>>,
    writes: AtomicUsize,
    deletes: AtomicUsize,
}

impl MemoryResourceStore {
    /// Creates an empty store for one organization.
    #[must_use]
    pub fn new(organization_id: impl Into<String>) -> Self {
        Self {
            inner: Arc::new(StoreInner {
                organization_id: organization_id.into(),
                records: RwLock::new(Vec::new()),
                writes: AtomicUsize::new(0),
                deletes: AtomicUsize::new(0),
            }),
        }
    }

    /// Seeds a record without counting it as an adapter write.
    pub async fn insert(&self, record: ResourceRecord) {
        self.inner.records.write().await.push(record);
    }

    /// Returns the adapter view for one resource type.
    #[must_use]
    pub fn adapter(&self, resource_type: ResourceType) -> Arc<dyn ResourceAdapter> {
        let resource_type = resource_type.canonical();
        Arc::new(MemoryResourceAdapter {
            inner: Arc::clone(&self.inner),
            resource_type,
            normalizer: Normalizer::new(TypeProfile::builtin(resource_type)),
        })
    }

    /// Every record in the store, across environments and types.
    pub async fn all_records(&self) -> Vec<ResourceRecord> {
        self.inner.records.read().await.clone()
    }

    /// Resolves a record by business key, normalizing candidate payloads.
    pub async fn record_by_key(
        &self,
        environment_id: &str,
        resource_type: ResourceType,
        business_key: &str,
    ) -> Option<ResourceRecord> {
        let resource_type = resource_type.canonical();
        let normalizer = Normalizer::new(TypeProfile::builtin(resource_type));
        let records = self.inner.records.read().await;
        records
            .iter()
            .filter(|r| {
                r.environment_id == environment_id && r.resource_type.canonical() == resource_type
            })
            .find(|r| {
                normalizer
                    .normalize(r)
                    .is_ok_and(|snapshot| snapshot.business_key == business_key)
            })
            .cloned()
    }

    /// Number of adapter writes (creates, updates, and deletes) so far.
    #[must_use]
    pub fn write_count(&self) -> usize {
        self.inner.writes.load(Ordering::Relaxed)
    }

    /// Number of adapter deletes so far.
    #[must_use]
    pub fn delete_count(&self) -> usize {
        self.inner.deletes.load(Ordering::Relaxed)
    }
}

/// One resource type's view of a [`MemoryResourceStore`].
struct MemoryResourceAdapter {
    inner: Arc<StoreInner>,
    resource_type: ResourceType,
    normalizer: Normalizer,
}

#[async_trait]
impl ResourceAdapter for MemoryResourceAdapter {
    async fn find_all(&self, environment_id: &str) -> Result<Vec<ResourceRecord>> {
        let records = self.inner.records.read().await;
        Ok(records
            .iter()
            .filter(|r| {
                r.environment_id == environment_id
                    && r.resource_type.canonical() == self.resource_type
            })
            .cloned()
            .collect())
    }

    async fn find_by_business_key(
        &self,
        environment_id: &str,
        business_key: &str,
    ) -> Result<Option<ResourceRecord>> {
        let records = self.inner.records.read().await;
        Ok(records
            .iter()
            .filter(|r| {
                r.environment_id == environment_id
                    && r.resource_type.canonical() == self.resource_type
            })
            .find(|r| {
                self.normalizer
                    .normalize(r)
                    .is_ok_and(|snapshot| snapshot.business_key == business_key)
            })
            .cloned())
    }

    async fn create(&self, environment_id: &str, payload: Value) -> Result<ResourceRecord> {
        let now = Utc::now();
        let record = ResourceRecord {
            id: Uuid::new_v4().to_string(),
            organization_id: self.inner.organization_id.clone(),
            environment_id: environment_id.to_string(),
            resource_type: self.resource_type,
            protected: false,
            payload,
            created_at: now,
            updated_at: now,
        };

        self.inner.records.write().await.push(record.clone());
        self.inner.writes.fetch_add(1, Ordering::Relaxed);
        debug!(
            "Created {} {} in environment {environment_id}",
            self.resource_type, record.id
        );

        Ok(record)
    }

    async fn update(
        &self,
        environment_id: &str,
        resource_id: &str,
        payload: Value,
    ) -> Result<ResourceRecord> {
        let mut records = self.inner.records.write().await;
        let record = records
            .iter_mut()
            .find(|r| {
                r.id == resource_id
                    && r.environment_id == environment_id
                    && r.resource_type.canonical() == self.resource_type
            })
            .ok_or_else(|| {
                StoreError::backend(format!(
                    "{} '{resource_id}' not found in environment {environment_id}",
                    self.resource_type
                ))
            })?;

        record.payload = payload;
        record.updated_at = Utc::now();
        let updated = record.clone();
        self.inner.writes.fetch_add(1, Ordering::Relaxed);
        debug!(
            "Updated {} {resource_id} in environment {environment_id}",
            self.resource_type
        );

        Ok(updated)
    }

    async fn delete(&self, ctx: &PromotionContext, record: &ResourceRecord) -> Result<()> {
        let mut records = self.inner.records.write().await;
        let before = records.len();
        records.retain(|r| {
            !(r.id == record.id
                && r.environment_id == record.environment_id
                && r.resource_type.canonical() == self.resource_type)
        });

        if records.len() < before {
            self.inner.deletes.fetch_add(1, Ordering::Relaxed);
            self.inner.writes.fetch_add(1, Ordering::Relaxed);
            debug!(
                "Deleted {} {} for {}",
                self.resource_type, record.id, ctx.actor
            );
        } else {
            debug!("{} {} was already absent", self.resource_type, record.id);
        }

        Ok(())
    }
}

/// In-memory [`ChangeStore`].
#[derive(Debug, Default)]
pub struct MemoryChangeStore {
    records: RwLock<Vec<ChangeRecord>>,
}

impl MemoryChangeStore {
    /// Creates an empty change history.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a history from existing records.
    #[must_use]
    pub fn with_records(records: Vec<ChangeRecord>) -> Self {
        Self {
            records: RwLock::new(records),
        }
    }

    /// Appends a change record.
    pub async fn push(&self, record: ChangeRecord) {
        self.records.write().await.push(record);
    }
}

#[async_trait]
impl ChangeStore for MemoryChangeStore {
    async fn changes_for(
        &self,
        organization_id: &str,
        resource_type: ResourceType,
        resource_id: &str,
    ) -> Result<Vec<ChangeRecord>> {
        let records = self.records.read().await;
        Ok(records
            .iter()
            .filter(|r| {
                r.organization_id == organization_id
                    && r.resource_type.canonical() == resource_type.canonical()
                    && r.resource_id == resource_id
            })
            .cloned()
            .collect())
    }
}

/// In-memory [`EnvironmentLookup`].
#[derive(Debug, Default)]
pub struct MemoryEnvironmentLookup {
    environments: RwLock<HashMap<String, Environment>>,
}

impl MemoryEnvironmentLookup {
    /// Creates an empty lookup.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a lookup from existing environments.
    #[must_use]
    pub fn with_environments(environments: Vec<Environment>) -> Self {
        Self {
            environments: RwLock::new(
                environments.into_iter().map(|e| (e.id.clone(), e)).collect(),
            ),
        }
    }

    /// Adds or replaces an environment.
    pub async fn insert(&self, environment: Environment) {
        self.environments
            .write()
            .await
            .insert(environment.id.clone(), environment);
    }
}

#[async_trait]
impl EnvironmentLookup for MemoryEnvironmentLookup {
    async fn find_environment(&self, environment_id: &str) -> Result<Option<Environment>> {
        Ok(self.environments.read().await.get(environment_id).cloned())
    }
}

/// Allow-all [`PromotionGate`]; real authorization lives outside the engine.
#[derive(Debug, Clone, Copy, Default)]
pub struct OpenGate;

#[async_trait]
impl PromotionGate for OpenGate {
    async fn assert_can_promote(
        &self,
        _actor: &Actor,
        _source: &Environment,
        _target: &Environment,
    ) -> Result<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn context() -> PromotionContext {
        PromotionContext::new("org-1", "env-dev", "env-prod", Actor::new("user-1"))
    }

    #[tokio::test]
    async fn test_adapter_writes_are_counted_but_seeding_is_not() {
        let store = MemoryResourceStore::new("org-1");
        let now = Utc::now();
        store
            .insert(ResourceRecord {
                id: "seeded".to_string(),
                organization_id: "org-1".to_string(),
                environment_id: "env-dev".to_string(),
                resource_type: ResourceType::Layout,
                protected: false,
                payload: json!({"identifier": "seed"}),
                created_at: now,
                updated_at: now,
            })
            .await;
        assert_eq!(store.write_count(), 0);

        let adapter = store.adapter(ResourceType::Layout);
        let created = adapter
            .create("env-prod", json!({"identifier": "marketing"}))
            .await
            .expect("create should succeed");
        adapter
            .update(
                "env-prod",
                &created.id,
                json!({"identifier": "marketing", "content": "v2"}),
            )
            .await
            .expect("update should succeed");

        assert_eq!(store.write_count(), 2);
        assert_eq!(store.delete_count(), 0);
    }

    #[tokio::test]
    async fn test_find_by_business_key_ignores_environment_fields() {
        let store = MemoryResourceStore::new("org-1");
        let adapter = store.adapter(ResourceType::Layout);
        adapter
            .create(
                "env-prod",
                json!({"_id": "raw", "identifier": "marketing", "content": "<html/>"}),
            )
            .await
            .expect("create should succeed");

        let found = adapter
            .find_by_business_key("env-prod", "marketing")
            .await
            .expect("lookup should succeed");

        assert!(found.is_some());
        assert!(
            adapter
                .find_by_business_key("env-dev", "marketing")
                .await
                .expect("lookup should succeed")
                .is_none()
        );
    }

    #[tokio::test]
    async fn test_delete_removes_and_counts() {
        let store = MemoryResourceStore::new("org-1");
        let adapter = store.adapter(ResourceType::Feed);
        let record = adapter
            .create("env-prod", json!({"identifier": "activity"}))
            .await
            .expect("create should succeed");

        adapter
            .delete(&context(), &record)
            .await
            .expect("delete should succeed");
        assert_eq!(store.delete_count(), 1);

        // Deleting again is a no-op.
        adapter
            .delete(&context(), &record)
            .await
            .expect("repeat delete should succeed");
        assert_eq!(store.delete_count(), 1);
    }

    #[tokio::test]
    async fn test_update_of_missing_record_fails() {
        let store = MemoryResourceStore::new("org-1");
        let adapter = store.adapter(ResourceType::Feed);

        let result = adapter
            .update("env-prod", "nope", json!({"identifier": "activity"}))
            .await;

        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_change_store_matches_legacy_alias_types() {
        let record = ChangeRecord {
            id: "chg-1".to_string(),
            organization_id: "org-1".to_string(),
            environment_id: "env-dev".to_string(),
            resource_type: ResourceType::DefaultLayout,
            resource_id: "lay-1".to_string(),
            diff: Vec::new(),
            enabled: true,
            created_at: Utc::now(),
        };
        let store = MemoryChangeStore::with_records(vec![record]);

        let found = store
            .changes_for("org-1", ResourceType::Layout, "lay-1")
            .await
            .expect("lookup should succeed");

        assert_eq!(found.len(), 1);
    }
}
