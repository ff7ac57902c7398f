//! Environments, actors, and the promotion permission gate.

use crate::error::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// One environment of an organization.
///
/// Promotions only flow along declared edges: a publish into `target` is
/// valid when `target` appears in the source's `promotion_targets` and both
/// environments belong to the same organization.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Environment {
    /// Environment id.
    pub id: String,
    /// Owning organization.
    pub organization_id: String,
    /// Human-readable name.
    pub name: String,
    /// Environment ids this environment may promote into.
    #[serde(default)]
    pub promotion_targets: Vec<String>,
}

impl Environment {
    /// Whether this environment declares `environment_id` as a promotion
    /// target.
    #[must_use]
    pub fn is_promotion_target(&self, environment_id: &str) -> bool {
        self.promotion_targets.iter().any(|t| t == environment_id)
    }
}

/// The principal requesting a promotion.
///
/// Authentication happens before the engine is called; the actor is only
/// carried through to the permission gate and audit logs.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Actor {
    /// Principal id.
    pub id: String,
}

impl Actor {
    /// Creates an actor from a principal id.
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self { id: id.into() }
    }
}

impl std::fmt::Display for Actor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.id)
    }
}

/// Environment resolution, backed by the platform's environment service.
#[async_trait]
pub trait EnvironmentLookup: Send + Sync {
    /// Resolves an environment by id.
    ///
    /// # Errors
    ///
    /// Returns a [`StoreError`](crate::error::StoreError) when the backing
    /// service cannot be reached; an unknown id is `Ok(None)`.
    async fn find_environment(&self, environment_id: &str) -> Result<Option<Environment>>;
}

/// Authorization check for write promotions.
#[async_trait]
pub trait PromotionGate: Send + Sync {
    /// Verifies the actor may promote from `source` into `target`.
    ///
    /// # Errors
    ///
    /// Returns [`ValidationError::PermissionDenied`](crate::error::ValidationError)
    /// when the actor lacks permission.
    async fn assert_can_promote(
        &self,
        actor: &Actor,
        source: &Environment,
        target: &Environment,
    ) -> Result<()>;
}
