//! Per-type persistence seam.

use crate::environment::Actor;
use crate::error::Result;
use crate::resource::ResourceRecord;
use async_trait::async_trait;
use serde_json::Value;

/// The identity and mode of one promotion run, carried through to adapters.
#[derive(Debug, Clone)]
pub struct PromotionContext {
    /// Owning organization.
    pub organization_id: String,
    /// Environment the desired state was read from.
    pub source_environment_id: String,
    /// Environment being written to.
    pub target_environment_id: String,
    /// Principal driving the promotion.
    pub actor: Actor,
    /// Whether delete proposals are applied.
    pub prune: bool,
}

impl PromotionContext {
    /// Creates a context with pruning disabled.
    #[must_use]
    pub fn new(
        organization_id: impl Into<String>,
        source_environment_id: impl Into<String>,
        target_environment_id: impl Into<String>,
        actor: Actor,
    ) -> Self {
        Self {
            organization_id: organization_id.into(),
            source_environment_id: source_environment_id.into(),
            target_environment_id: target_environment_id.into(),
            actor,
            prune: false,
        }
    }

    /// Enables or disables the application of delete proposals.
    #[must_use]
    pub const fn with_prune(mut self, prune: bool) -> Self {
        self.prune = prune;
        self
    }
}

/// Persistence operations for one resource type.
///
/// One adapter serves every environment of the organization; methods that
/// need a placement take the environment id. The engine reads through
/// `find_*` and writes through `create`/`update`/`delete`, always one record
/// at a time. Transactional grouping, where the backing store offers it, is
/// an implementation concern behind this trait.
#[async_trait]
pub trait ResourceAdapter: Send + Sync {
    /// Loads every record of this type in one environment.
    ///
    /// # Errors
    ///
    /// Returns a [`StoreError`](crate::error::StoreError) when the backing
    /// store cannot be read.
    async fn find_all(&self, environment_id: &str) -> Result<Vec<ResourceRecord>>;

    /// Resolves a record by its business key in one environment.
    ///
    /// # Errors
    ///
    /// Returns a [`StoreError`](crate::error::StoreError) when the backing
    /// store cannot be read; an absent key is `Ok(None)`.
    async fn find_by_business_key(
        &self,
        environment_id: &str,
        business_key: &str,
    ) -> Result<Option<ResourceRecord>>;

    /// Creates a record in one environment.
    ///
    /// # Errors
    ///
    /// Returns a [`StoreError`](crate::error::StoreError) when the write
    /// fails.
    async fn create(&self, environment_id: &str, payload: Value) -> Result<ResourceRecord>;

    /// Overwrites a record's payload.
    ///
    /// # Errors
    ///
    /// Returns a [`StoreError`](crate::error::StoreError) when the record
    /// does not exist or the write fails.
    async fn update(
        &self,
        environment_id: &str,
        resource_id: &str,
        payload: Value,
    ) -> Result<ResourceRecord>;

    /// Deletes a record. Callers check the protection flag first; adapters
    /// may assume the record was cleared for deletion.
    ///
    /// # Errors
    ///
    /// Returns a [`StoreError`](crate::error::StoreError) when the delete
    /// fails.
    async fn delete(&self, ctx: &PromotionContext, record: &ResourceRecord) -> Result<()>;
}
