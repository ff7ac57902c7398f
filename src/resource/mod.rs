//! Resource vocabulary, canonical snapshots, and structural comparison.

mod compare;
mod normalize;
mod profile;
mod snapshot;
mod types;

pub use compare::{DiffEntry, SyncAction, compare, compare_sets};
pub use normalize::Normalizer;
pub use profile::{ReferencePattern, TypeProfile};
pub use snapshot::CanonicalSnapshot;
pub use types::{ResourceRecord, ResourceType};
