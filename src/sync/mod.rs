//! Plan construction and execution for environment synchronization.

mod builder;
mod deps;
mod executor;
mod plan;

pub use builder::SyncPlanBuilder;
pub use deps::DependencyAnalyzer;
pub use executor::{DEFAULT_BATCH_SIZE, EntryResult, EntryStatus, SyncExecutor, SyncReport};
pub use plan::SyncPlan;
