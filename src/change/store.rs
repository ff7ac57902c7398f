//! Change history access.

use crate::change::ChangeRecord;
use crate::error::Result;
use crate::resource::ResourceType;
use async_trait::async_trait;

/// Read access to the recorded change history of one organization.
///
/// The engine never writes history; recording happens wherever resources
/// are edited. Implementations only need to return the records for one
/// resource, in any order, and the aggregator sorts them before folding.
#[async_trait]
pub trait ChangeStore: Send + Sync {
    /// Loads every recorded change for one resource, enabled or not.
    ///
    /// # Errors
    ///
    /// Returns a [`StoreError`](crate::error::StoreError) when the backing
    /// history cannot be read.
    async fn changes_for(
        &self,
        organization_id: &str,
        resource_type: ResourceType,
        resource_id: &str,
    ) -> Result<Vec<ChangeRecord>>;
}
