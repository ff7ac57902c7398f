//! Storage seams consumed by the engine and the in-crate backends behind
//! them.
//!
//! Real deployments implement [`ResourceAdapter`], [`PromotionLock`], and the
//! environment lookup against their own persistence; the memory backends here
//! serve tests and the bundle-backed CLI.

mod adapter;
mod bundle;
mod lock;
mod memory;

pub use adapter::{PromotionContext, ResourceAdapter};
pub use bundle::EnvironmentBundle;
pub use lock::{LockInfo, LockLease, MemoryPromotionLock, PromotionLock, generate_holder_id};
pub use memory::{MemoryChangeStore, MemoryEnvironmentLookup, MemoryResourceStore, OpenGate};
