//! Change history model and replay.
//!
//! This module covers the changelog-replay generation of the promotion
//! engine: stored structural diffs ([`ChangeRecord`]), the patch algebra
//! that applies them, the read-only store seam they are fetched through,
//! and the aggregator that folds enabled changes back into a resource's
//! current desired state.

mod aggregate;
mod patch;
mod record;
mod store;

pub use aggregate::{AggregatedState, ChangeAggregator};
pub use patch::{FieldPath, PatchError, PatchKind, PatchOp, apply_op, flatten, unflatten};
pub use record::ChangeRecord;
pub use store::ChangeStore;
