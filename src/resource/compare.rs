//! Snapshot comparison and per-resource diff classification.

use crate::change::FieldPath;
use crate::resource::{CanonicalSnapshot, ResourceType};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// What a promotion has to do for one resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SyncAction {
    /// The resource is absent in the target.
    Create,
    /// The resource exists in the target with different content.
    Update,
    /// The resource exists only in the target. Deletes are proposals; they
    /// are applied only when the caller opts into pruning.
    Delete,
    /// Source and target already agree.
    Unchanged,
}

impl std::fmt::Display for SyncAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Create => "create",
            Self::Update => "update",
            Self::Delete => "delete",
            Self::Unchanged => "unchanged",
        };
        write!(f, "{s}")
    }
}

/// One resource's classified difference between two environments.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DiffEntry {
    /// Business key of the resource.
    pub business_key: String,
    /// Canonical type of the resource.
    pub resource_type: ResourceType,
    /// The classified action.
    pub action: SyncAction,
    /// For updates, the leaf paths that differ.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub changed_fields: Vec<FieldPath>,
    /// Desired state from the source environment; absent for deletes.
    pub source: Option<CanonicalSnapshot>,
    /// Observed state from the target environment; absent for creates.
    pub target: Option<CanonicalSnapshot>,
}

impl DiffEntry {
    /// The snapshot whose references order this entry: the source for
    /// creates and updates, the target for deletes.
    #[must_use]
    pub const fn reference_snapshot(&self) -> Option<&CanonicalSnapshot> {
        match self.action {
            SyncAction::Delete => self.target.as_ref(),
            _ => self.source.as_ref(),
        }
    }
}

/// Classifies one source snapshot against its target counterpart.
#[must_use]
pub fn compare(source: &CanonicalSnapshot, target: Option<&CanonicalSnapshot>) -> DiffEntry {
    let Some(target) = target else {
        return DiffEntry {
            business_key: source.business_key.clone(),
            resource_type: source.resource_type,
            action: SyncAction::Create,
            changed_fields: Vec::new(),
            source: Some(source.clone()),
            target: None,
        };
    };

    if source.fingerprint() == target.fingerprint() {
        DiffEntry {
            business_key: source.business_key.clone(),
            resource_type: source.resource_type,
            action: SyncAction::Unchanged,
            changed_fields: Vec::new(),
            source: Some(source.clone()),
            target: Some(target.clone()),
        }
    } else {
        DiffEntry {
            business_key: source.business_key.clone(),
            resource_type: source.resource_type,
            action: SyncAction::Update,
            changed_fields: source.diff_fields(target),
            source: Some(source.clone()),
            target: Some(target.clone()),
        }
    }
}

/// Classifies two same-type snapshot sets keyed by business key.
///
/// Every source snapshot produces an entry; target-only keys produce Delete
/// proposals. Output is sorted by business key, deletes after the rest.
#[must_use]
pub fn compare_sets(
    source: &[CanonicalSnapshot],
    target: &[CanonicalSnapshot],
) -> Vec<DiffEntry> {
    let target_by_key: BTreeMap<&str, &CanonicalSnapshot> = target
        .iter()
        .map(|snapshot| (snapshot.business_key.as_str(), snapshot))
        .collect();

    let mut entries: Vec<DiffEntry> = source
        .iter()
        .map(|snapshot| compare(snapshot, target_by_key.get(snapshot.business_key.as_str()).copied()))
        .collect();
    entries.sort_by(|a, b| a.business_key.cmp(&b.business_key));

    let mut deletes: Vec<DiffEntry> = target_by_key
        .values()
        .filter(|snapshot| {
            !source
                .iter()
                .any(|s| s.business_key == snapshot.business_key)
        })
        .map(|snapshot| DiffEntry {
            business_key: snapshot.business_key.clone(),
            resource_type: snapshot.resource_type,
            action: SyncAction::Delete,
            changed_fields: Vec::new(),
            source: None,
            target: Some((*snapshot).clone()),
        })
        .collect();
    entries.append(&mut deletes);

    entries
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{Value, json};

    fn snapshot(key: &str, fields: &[(&str, Value)]) -> CanonicalSnapshot {
        CanonicalSnapshot {
            business_key: key.to_string(),
            resource_type: ResourceType::Layout,
            fields: fields
                .iter()
                .map(|(path, value)| (FieldPath::new(*path), value.clone()))
                .collect(),
        }
    }

    #[test]
    fn test_absent_target_classifies_as_create() {
        let source = snapshot("marketing", &[("identifier", json!("marketing"))]);

        let entry = compare(&source, None);

        assert_eq!(entry.action, SyncAction::Create);
        assert!(entry.target.is_none());
    }

    #[test]
    fn test_equal_snapshots_classify_as_unchanged() {
        let source = snapshot("marketing", &[("identifier", json!("marketing"))]);
        let target = source.clone();

        let entry = compare(&source, Some(&target));

        assert_eq!(entry.action, SyncAction::Unchanged);
        assert!(entry.changed_fields.is_empty());
    }

    #[test]
    fn test_update_lists_differing_paths() {
        let source = snapshot(
            "marketing",
            &[("identifier", json!("marketing")), ("content", json!("v2"))],
        );
        let target = snapshot(
            "marketing",
            &[("identifier", json!("marketing")), ("content", json!("v1"))],
        );

        let entry = compare(&source, Some(&target));

        assert_eq!(entry.action, SyncAction::Update);
        assert_eq!(entry.changed_fields, vec![FieldPath::new("content")]);
    }

    #[test]
    fn test_target_only_keys_become_delete_proposals() {
        let source = vec![snapshot("a", &[("identifier", json!("a"))])];
        let target = vec![
            snapshot("a", &[("identifier", json!("a"))]),
            snapshot("stale", &[("identifier", json!("stale"))]),
        ];

        let entries = compare_sets(&source, &target);

        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].action, SyncAction::Unchanged);
        assert_eq!(entries[1].action, SyncAction::Delete);
        assert_eq!(entries[1].business_key, "stale");
        assert!(entries[1].source.is_none());
    }

    #[test]
    fn test_set_comparison_is_deterministic() {
        let source = vec![
            snapshot("b", &[("identifier", json!("b"))]),
            snapshot("a", &[("identifier", json!("a"))]),
        ];
        let target = vec![snapshot("z", &[("identifier", json!("z"))])];

        let keys: Vec<String> = compare_sets(&source, &target)
            .into_iter()
            .map(|entry| entry.business_key)
            .collect();

        assert_eq!(keys, vec!["a", "b", "z"]);
    }
}
