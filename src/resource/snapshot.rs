//! Environment-agnostic resource snapshots.

use crate::change::{FieldPath, unflatten};
use crate::resource::ResourceType;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;

/// The comparable form of a resource: its business key plus a sorted leaf
/// map of every environment-agnostic field.
///
/// Two snapshots with equal fields serialize to identical bytes (sorted map,
/// canonical JSON), so fingerprint equality is structural equality.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CanonicalSnapshot {
    /// Environment-independent identity of the resource.
    pub business_key: String,
    /// Canonical type of the resource.
    pub resource_type: ResourceType,
    /// Flattened payload with environment-bound fields stripped.
    pub fields: BTreeMap<FieldPath, Value>,
}

impl CanonicalSnapshot {
    /// SHA-256 fingerprint of the canonical serialization.
    #[must_use]
    pub fn fingerprint(&self) -> String {
        let canonical = serde_json::to_string(self).unwrap_or_default();
        let mut hasher = Sha256::new();
        hasher.update(canonical.as_bytes());
        hex::encode(hasher.finalize())
    }

    /// Looks up one leaf by path.
    #[must_use]
    pub fn field(&self, path: &FieldPath) -> Option<&Value> {
        self.fields.get(path)
    }

    /// Rebuilds the nested payload from the leaf map.
    #[must_use]
    pub fn payload(&self) -> Value {
        unflatten(&self.fields)
    }

    /// Paths whose leaves differ between the two snapshots, in path order.
    ///
    /// Covers leaves added, changed, and removed relative to `other`.
    #[must_use]
    pub fn diff_fields(&self, other: &Self) -> Vec<FieldPath> {
        let mut changed = Vec::new();
        for (path, value) in &self.fields {
            if other.fields.get(path) != Some(value) {
                changed.push(path.clone());
            }
        }
        for path in other.fields.keys() {
            if !self.fields.contains_key(path) {
                changed.push(path.clone());
            }
        }
        changed.sort();
        changed
    }
}
