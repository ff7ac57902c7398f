//! Stored change records.

use crate::change::PatchOp;
use crate::resource::ResourceType;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One recorded edit to a resource in its source environment.
///
/// A record carries the structural diff the edit produced, not the full
/// resource. Folding every enabled record for one resource in creation
/// order reproduces the resource state at recording time.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChangeRecord {
    /// Unique change id.
    pub id: String,
    /// Owning organization.
    pub organization_id: String,
    /// Environment the edit happened in.
    pub environment_id: String,
    /// Type of the changed resource.
    pub resource_type: ResourceType,
    /// Id of the changed resource in its environment.
    pub resource_id: String,
    /// Ordered diff operations describing the edit.
    #[serde(default)]
    pub diff: Vec<PatchOp>,
    /// Whether the change takes part in replays. Disabled changes are
    /// retained for history but never folded.
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    /// Recording time; the primary replay ordering key.
    pub created_at: DateTime<Utc>,
}

const fn default_enabled() -> bool {
    true
}

impl ChangeRecord {
    /// Returns the deterministic replay ordering key.
    ///
    /// Records fold in creation order; the id breaks timestamp ties so two
    /// replays of the same history always agree.
    #[must_use]
    pub fn replay_key(&self) -> (DateTime<Utc>, &str) {
        (self.created_at, &self.id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_enabled_defaults_to_true() {
        let raw = json!({
            "id": "chg-1",
            "organization_id": "org-1",
            "environment_id": "env-dev",
            "resource_type": "workflow",
            "resource_id": "wf-1",
            "created_at": "2024-03-01T10:00:00Z"
        });

        let record: ChangeRecord = serde_json::from_value(raw).expect("record should parse");

        assert!(record.enabled);
        assert!(record.diff.is_empty());
    }

    #[test]
    fn test_replay_key_breaks_timestamp_ties_by_id() {
        let at: DateTime<Utc> = "2024-03-01T10:00:00Z".parse().expect("valid timestamp");
        let a = ChangeRecord {
            id: "chg-a".to_string(),
            organization_id: "org-1".to_string(),
            environment_id: "env-dev".to_string(),
            resource_type: ResourceType::Workflow,
            resource_id: "wf-1".to_string(),
            diff: Vec::new(),
            enabled: true,
            created_at: at,
        };
        let mut b = a.clone();
        b.id = "chg-b".to_string();

        assert!(a.replay_key() < b.replay_key());
    }
}
