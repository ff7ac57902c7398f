//! Ordered synchronization plans.

use crate::resource::{DiffEntry, SyncAction};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Everything a promotion will do, in the exact order it will do it.
///
/// Entries are ordered by the dependency analyzer: deletes first with
/// dependents ahead of their dependencies, then creates and updates with
/// dependencies ahead of their dependents. Building a plan never writes;
/// the same pair of environments always yields the same plan.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncPlan {
    /// Environment the desired state was read from.
    pub source_environment_id: String,
    /// Environment the plan writes into.
    pub target_environment_id: String,
    /// When the plan was computed.
    pub created_at: DateTime<Utc>,
    /// The ordered entries.
    pub entries: Vec<DiffEntry>,
}

impl SyncPlan {
    /// Creates a plan over already-ordered entries.
    #[must_use]
    pub fn new(
        source_environment_id: impl Into<String>,
        target_environment_id: impl Into<String>,
        entries: Vec<DiffEntry>,
    ) -> Self {
        Self {
            source_environment_id: source_environment_id.into(),
            target_environment_id: target_environment_id.into(),
            created_at: Utc::now(),
            entries,
        }
    }

    /// Number of entries classified as `action`.
    #[must_use]
    pub fn count(&self, action: SyncAction) -> usize {
        self.entries.iter().filter(|e| e.action == action).count()
    }

    /// True when the environments already agree on every resource.
    #[must_use]
    pub fn is_noop(&self) -> bool {
        self.entries
            .iter()
            .all(|e| e.action == SyncAction::Unchanged)
    }
}

impl std::fmt::Display for SyncPlan {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(
            f,
            "Plan {} -> {}: {} to create, {} to update, {} to delete, {} unchanged",
            self.source_environment_id,
            self.target_environment_id,
            self.count(SyncAction::Create),
            self.count(SyncAction::Update),
            self.count(SyncAction::Delete),
            self.count(SyncAction::Unchanged),
        )?;
        for entry in &self.entries {
            if entry.action == SyncAction::Unchanged {
                continue;
            }
            writeln!(
                f,
                "  {} {} '{}'",
                entry.action, entry.resource_type, entry.business_key
            )?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resource::{CanonicalSnapshot, ResourceType, compare};
    use serde_json::json;

    fn snapshot(key: &str) -> CanonicalSnapshot {
        CanonicalSnapshot {
            business_key: key.to_string(),
            resource_type: ResourceType::Feed,
            fields: [(crate::change::FieldPath::new("identifier"), json!(key))]
                .into_iter()
                .collect(),
        }
    }

    #[test]
    fn test_counts_and_noop_detection() {
        let unchanged = compare(&snapshot("a"), Some(&snapshot("a")));
        let create = compare(&snapshot("b"), None);

        let plan = SyncPlan::new("env-dev", "env-prod", vec![unchanged.clone(), create]);
        assert_eq!(plan.count(SyncAction::Create), 1);
        assert_eq!(plan.count(SyncAction::Unchanged), 1);
        assert!(!plan.is_noop());

        let quiet = SyncPlan::new("env-dev", "env-prod", vec![unchanged]);
        assert!(quiet.is_noop());
    }

    #[test]
    fn test_display_summarizes_and_lists_changes() {
        let plan = SyncPlan::new(
            "env-dev",
            "env-prod",
            vec![
                compare(&snapshot("a"), Some(&snapshot("a"))),
                compare(&snapshot("b"), None),
            ],
        );

        let rendered = plan.to_string();

        assert!(rendered.contains("Plan env-dev -> env-prod"));
        assert!(rendered.contains("1 to create"));
        assert!(rendered.contains("create feed 'b'"));
        assert!(!rendered.contains("'a'"));
    }
}
