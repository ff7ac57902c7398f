//! Environment bundle files.
//!
//! A bundle is a portable JSON export of one organization's promotable
//! state: its environments, the live resources in each, and the recorded
//! change history. The CLI operates on bundles so promotions can be
//! exercised and inspected without a platform backend.

use crate::change::ChangeRecord;
use crate::environment::Environment;
use crate::error::{Result, StoreError};
use crate::resource::ResourceRecord;
use crate::store::{MemoryChangeStore, MemoryEnvironmentLookup, MemoryResourceStore};
use serde::{Deserialize, Serialize};
use std::path::Path;
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tracing::{debug, info};

/// One organization's environments, resources, and change history.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EnvironmentBundle {
    /// The organization everything in the bundle belongs to.
    pub organization_id: String,
    /// Environments and their promotion edges.
    #[serde(default)]
    pub environments: Vec<Environment>,
    /// Live resources across all environments.
    #[serde(default)]
    pub resources: Vec<ResourceRecord>,
    /// Recorded change history.
    #[serde(default)]
    pub changes: Vec<ChangeRecord>,
}

impl EnvironmentBundle {
    /// Loads a bundle from a JSON file.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::BundleNotFound`] when the file does not exist
    /// and [`StoreError::Corrupted`] when it is not a valid bundle.
    pub async fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();

        if !path.exists() {
            return Err(StoreError::BundleNotFound {
                path: path.to_path_buf(),
            }
            .into());
        }

        let content = fs::read_to_string(path).await.map_err(|e| {
            StoreError::backend(format!("Failed to read bundle file: {e}"))
        })?;

        let bundle: Self = serde_json::from_str(&content).map_err(|e| StoreError::Corrupted {
            message: format!("Bundle is not valid JSON: {e}"),
        })?;

        info!(
            "Loaded bundle from {}: {} environments, {} resources, {} changes",
            path.display(),
            bundle.environments.len(),
            bundle.resources.len(),
            bundle.changes.len()
        );

        Ok(bundle)
    }

    /// Saves the bundle, writing a temporary file first and renaming it into
    /// place so readers never observe a partial bundle.
    ///
    /// # Errors
    ///
    /// Returns a [`StoreError`] when serialization or the write fails.
    pub async fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();

        let content = serde_json::to_string_pretty(self)
            .map_err(|e| StoreError::serialization(format!("Failed to serialize bundle: {e}")))?;

        let temp_path = path.with_extension("tmp");

        let mut file = fs::File::create(&temp_path).await.map_err(|e| {
            StoreError::backend(format!("Failed to create temp bundle file: {e}"))
        })?;
        file.write_all(content.as_bytes()).await.map_err(|e| {
            StoreError::backend(format!("Failed to write bundle file: {e}"))
        })?;
        file.sync_all().await.map_err(|e| {
            StoreError::backend(format!("Failed to sync bundle file: {e}"))
        })?;

        fs::rename(&temp_path, path).await.map_err(|e| {
            StoreError::backend(format!("Failed to rename bundle file: {e}"))
        })?;

        debug!("Saved bundle to {}", path.display());
        Ok(())
    }

    /// Builds a resource store seeded with the bundle's resources.
    pub async fn resource_store(&self) -> MemoryResourceStore {
        let store = MemoryResourceStore::new(&self.organization_id);
        for record in &self.resources {
            store.insert(record.clone()).await;
        }
        store
    }

    /// Builds a change store over the bundle's history.
    #[must_use]
    pub fn change_store(&self) -> MemoryChangeStore {
        MemoryChangeStore::with_records(self.changes.clone())
    }

    /// Builds an environment lookup over the bundle's environments.
    #[must_use]
    pub fn environment_lookup(&self) -> MemoryEnvironmentLookup {
        MemoryEnvironmentLookup::with_environments(self.environments.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::environment::EnvironmentLookup;
    use crate::error::PromotionError;
    use crate::resource::ResourceType;
    use chrono::Utc;
    use serde_json::json;
    use tempfile::TempDir;

    fn sample_bundle() -> EnvironmentBundle {
        let now = Utc::now();
        EnvironmentBundle {
            organization_id: "org-1".to_string(),
            environments: vec![Environment {
                id: "env-dev".to_string(),
                organization_id: "org-1".to_string(),
                name: "Development".to_string(),
                promotion_targets: vec!["env-prod".to_string()],
            }],
            resources: vec![ResourceRecord {
                id: "lay-1".to_string(),
                organization_id: "org-1".to_string(),
                environment_id: "env-dev".to_string(),
                resource_type: ResourceType::Layout,
                protected: false,
                payload: json!({"identifier": "marketing", "content": "<html/>"}),
                created_at: now,
                updated_at: now,
            }],
            changes: Vec::new(),
        }
    }

    #[tokio::test]
    async fn test_save_and_load_round_trip() {
        let dir = TempDir::new().expect("temp dir");
        let path = dir.path().join("bundle.json");

        sample_bundle().save(&path).await.expect("save should succeed");
        let loaded = EnvironmentBundle::load(&path)
            .await
            .expect("load should succeed");

        assert_eq!(loaded.organization_id, "org-1");
        assert_eq!(loaded.environments.len(), 1);
        assert_eq!(loaded.resources.len(), 1);
        // The temp file must not linger after the atomic rename.
        assert!(!dir.path().join("bundle.tmp").exists());
    }

    #[tokio::test]
    async fn test_load_missing_bundle_fails() {
        let dir = TempDir::new().expect("temp dir");

        let err = EnvironmentBundle::load(dir.path().join("absent.json"))
            .await
            .expect_err("missing bundle should fail");

        assert!(matches!(
            err,
            PromotionError::Store(StoreError::BundleNotFound { .. })
        ));
    }

    #[tokio::test]
    async fn test_load_rejects_invalid_json() {
        let dir = TempDir::new().expect("temp dir");
        let path = dir.path().join("bundle.json");
        std::fs::write(&path, "{ not json").expect("write fixture");

        let err = EnvironmentBundle::load(&path)
            .await
            .expect_err("corrupt bundle should fail");

        assert!(matches!(
            err,
            PromotionError::Store(StoreError::Corrupted { .. })
        ));
    }

    #[tokio::test]
    async fn test_backends_reflect_bundle_contents() {
        let bundle = sample_bundle();

        let store = bundle.resource_store().await;
        assert_eq!(store.all_records().await.len(), 1);
        assert_eq!(store.write_count(), 0);

        let lookup = bundle.environment_lookup();
        let env = lookup
            .find_environment("env-dev")
            .await
            .expect("lookup should succeed");
        assert!(env.is_some());
    }
}
