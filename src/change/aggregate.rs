//! Change history replay.

use crate::change::{ChangeStore, apply_op};
use crate::error::Result;
use crate::resource::ResourceType;
use serde_json::{Map, Value};
use std::sync::Arc;
use tracing::{debug, warn};

/// The state a resource's change history folds down to.
#[derive(Debug, Clone)]
pub struct AggregatedState {
    /// Owning organization.
    pub organization_id: String,
    /// Environment of the newest folded record, when any exist.
    pub environment_id: Option<String>,
    /// Type of the replayed resource.
    pub resource_type: ResourceType,
    /// Id of the replayed resource.
    pub resource_id: String,
    /// The folded payload.
    pub state: Value,
    /// Number of enabled records folded.
    pub applied_changes: usize,
    /// Number of malformed diff operations skipped during the fold.
    pub skipped_ops: usize,
}

impl AggregatedState {
    /// Returns true when at least one enabled record was folded.
    #[must_use]
    pub const fn has_changes(&self) -> bool {
        self.applied_changes > 0
    }
}

/// Replays a resource's change history into a single payload.
///
/// Records fold onto an empty object in `(created_at, id)` order, so two
/// replays of the same history always produce the same payload. Disabled
/// records are passed over entirely. A malformed diff operation inside an
/// otherwise readable record is logged and skipped rather than failing the
/// replay; the record's remaining operations still apply.
pub struct ChangeAggregator {
    store: Arc<dyn ChangeStore>,
}

impl ChangeAggregator {
    /// Creates an aggregator over a change history.
    #[must_use]
    pub fn new(store: Arc<dyn ChangeStore>) -> Self {
        Self { store }
    }

    /// Folds every enabled change for one resource into its replayed state.
    ///
    /// # Errors
    ///
    /// Returns an error when the change history cannot be read.
    pub async fn aggregate(
        &self,
        organization_id: &str,
        resource_type: ResourceType,
        resource_id: &str,
    ) -> Result<AggregatedState> {
        let mut records = self
            .store
            .changes_for(organization_id, resource_type, resource_id)
            .await?;
        records.sort_by(|a, b| a.replay_key().cmp(&b.replay_key()));

        let environment_id = records
            .iter()
            .rev()
            .find(|r| r.enabled)
            .map(|r| r.environment_id.clone());
        let mut state = Value::Object(Map::new());
        let mut applied_changes = 0;
        let mut skipped_ops = 0;

        for record in &records {
            if !record.enabled {
                continue;
            }
            for op in &record.diff {
                if let Err(reason) = apply_op(&mut state, op) {
                    skipped_ops += 1;
                    warn!(
                        "Skipping malformed {} op in change {}: {reason}",
                        op.op, record.id
                    );
                }
            }
            applied_changes += 1;
        }

        debug!(
            "Replayed {applied_changes} changes for {resource_type} '{resource_id}' \
             ({skipped_ops} ops skipped)"
        );

        Ok(AggregatedState {
            organization_id: organization_id.to_string(),
            environment_id,
            resource_type,
            resource_id: resource_id.to_string(),
            state,
            applied_changes,
            skipped_ops,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::change::{ChangeRecord, PatchKind, PatchOp};
    use crate::store::MemoryChangeStore;
    use chrono::{DateTime, Utc};
    use serde_json::json;

    fn record(id: &str, at: &str, enabled: bool, diff: Vec<PatchOp>) -> ChangeRecord {
        let created_at: DateTime<Utc> = at.parse().expect("valid timestamp");
        ChangeRecord {
            id: id.to_string(),
            organization_id: "org-1".to_string(),
            environment_id: "env-dev".to_string(),
            resource_type: ResourceType::MessageTemplate,
            resource_id: "tpl-1".to_string(),
            diff,
            enabled,
            created_at,
        }
    }

    async fn aggregate(records: Vec<ChangeRecord>) -> AggregatedState {
        let store = Arc::new(MemoryChangeStore::with_records(records));
        ChangeAggregator::new(store)
            .aggregate("org-1", ResourceType::MessageTemplate, "tpl-1")
            .await
            .expect("aggregation should succeed")
    }

    #[tokio::test]
    async fn test_fold_skips_disabled_records() {
        let records = vec![
            record(
                "chg-1",
                "2024-03-01T10:00:00Z",
                true,
                vec![
                    PatchOp::set(PatchKind::Add, "identifier", json!("welcome")),
                    PatchOp::set(PatchKind::Add, "body", json!("Hello")),
                ],
            ),
            record(
                "chg-2",
                "2024-03-01T11:00:00Z",
                false,
                vec![PatchOp::set(PatchKind::Replace, "body", json!("IGNORED"))],
            ),
            record(
                "chg-3",
                "2024-03-01T12:00:00Z",
                true,
                vec![
                    PatchOp::set(PatchKind::Replace, "body", json!("Hello there")),
                    PatchOp::remove("identifier"),
                ],
            ),
        ];

        let folded = aggregate(records).await;

        assert_eq!(folded.state, json!({"body": "Hello there"}));
        assert_eq!(folded.applied_changes, 2);
        assert_eq!(folded.skipped_ops, 0);
        assert_eq!(folded.environment_id.as_deref(), Some("env-dev"));
    }

    #[tokio::test]
    async fn test_fold_order_is_independent_of_store_order() {
        let newest = record(
            "chg-2",
            "2024-03-01T12:00:00Z",
            true,
            vec![PatchOp::set(PatchKind::Replace, "body", json!("second"))],
        );
        let oldest = record(
            "chg-1",
            "2024-03-01T10:00:00Z",
            true,
            vec![PatchOp::set(PatchKind::Add, "body", json!("first"))],
        );

        // The store returns newest first; the fold still replays by time.
        let folded = aggregate(vec![newest, oldest]).await;

        assert_eq!(folded.state, json!({"body": "second"}));
    }

    #[tokio::test]
    async fn test_timestamp_ties_fold_in_id_order() {
        let records = vec![
            record(
                "chg-b",
                "2024-03-01T10:00:00Z",
                true,
                vec![PatchOp::set(PatchKind::Replace, "body", json!("from-b"))],
            ),
            record(
                "chg-a",
                "2024-03-01T10:00:00Z",
                true,
                vec![PatchOp::set(PatchKind::Add, "body", json!("from-a"))],
            ),
        ];

        let folded = aggregate(records).await;

        assert_eq!(folded.state, json!({"body": "from-b"}));
    }

    #[tokio::test]
    async fn test_malformed_operations_are_skipped_not_fatal() {
        let records = vec![record(
            "chg-1",
            "2024-03-01T10:00:00Z",
            true,
            vec![
                PatchOp::set(PatchKind::Add, "identifier", json!("welcome")),
                PatchOp::set(PatchKind::Add, "", json!("lost")),
                PatchOp::set(PatchKind::Add, "body", json!("Hello")),
            ],
        )];

        let folded = aggregate(records).await;

        assert_eq!(
            folded.state,
            json!({"identifier": "welcome", "body": "Hello"})
        );
        assert_eq!(folded.applied_changes, 1);
        assert_eq!(folded.skipped_ops, 1);
    }

    #[tokio::test]
    async fn test_empty_history_folds_to_empty_object() {
        let folded = aggregate(Vec::new()).await;

        assert_eq!(folded.state, json!({}));
        assert!(!folded.has_changes());
        assert!(folded.environment_id.is_none());
    }
}
