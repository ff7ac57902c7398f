// ============================================================================
// Strict linting - Dangerous or non-idiomatic practices are forbidden
// ============================================================================

#![deny(warnings)]                    // All warnings are treated as errors
#![forbid(unsafe_code)]               // Unsafe code is forbidden
#![deny(missing_docs)]                // All public items must be documented
#![deny(dead_code)]                   // Unused code is forbidden
#![deny(non_camel_case_types)]        // Types must follow CamelCase convention

// Additional strictness - Leave nothing unchecked
#![deny(unused_imports)]              // Unused imports are forbidden
#![deny(unused_variables)]            // Unused variables are forbidden
#![deny(unused_must_use)]             // Must handle Result and Option explicitly
#![deny(non_snake_case)]              // Variables and functions must be snake_case
#![deny(non_upper_case_globals)]      // Constants must be UPPER_CASE
#![deny(nonstandard_style)]           // Non-standard code style is forbidden
#![forbid(unsafe_op_in_unsafe_fn)]    // Unsafe ops in unsafe fns are forbidden

// Clippy lints (warnings only)
#![warn(clippy::all)]                 // All standard Clippy lints
#![warn(clippy::pedantic)]            // Very strict Clippy lints
#![warn(clippy::nursery)]             // Experimental lints
#![warn(clippy::unwrap_used)]         // unwrap() warning
#![warn(clippy::expect_used)]         // expect() warning
#![warn(clippy::panic)]               // panic!() warning
#![warn(clippy::print_stdout)]        // println!() warning
#![warn(clippy::todo)]                // TODO warning
#![warn(clippy::unimplemented)]       // unimplemented!() warning
#![warn(clippy::missing_const_for_fn)] // Force const when possible
#![warn(clippy::unwrap_in_result)]    // unwrap() in Result warning
#![warn(clippy::module_inception)]    // Module with same name as crate warning
#![warn(clippy::redundant_clone)]     // Useless clones warning
#![warn(clippy::shadow_unrelated)]    // Shadowing unrelated variables warning
#![warn(clippy::too_many_arguments)]  // Limit function arguments
#![warn(clippy::cognitive_complexity)] // Limit cognitive complexity

// Safety and robustness lints
#![deny(overflowing_literals)]        // Overflowing literals are forbidden
#![deny(arithmetic_overflow)]         // Arithmetic overflow is forbidden

// ============================================================================
// Crate Documentation
// ============================================================================

//! # Skald Promote
//!
//! A diff-and-apply promotion engine for notification platform configuration.
//!
//! ## Overview
//!
//! Skald moves workflows, message templates, layouts, groups, feeds, and
//! translations between the environments of one organization:
//!
//! - Compare two environments structurally, ignoring environment-bound fields
//! - Publish the differences as an ordered, idempotent plan
//! - Replay a single resource's recorded change history into a target
//! - Guard targets with promotion edges, permission gates, and locks
//!
//! ## Architecture
//!
//! The engine is built around **state reconciliation**:
//!
//! 1. **Snapshot**: Load both environments and reduce every resource to its
//!    canonical, environment-independent form
//! 2. **Diff**: Classify each resource as create, update, delete, or
//!    unchanged, keyed by business key
//! 3. **Plan**: Order the entries so referenced resources land before the
//!    resources that point at them
//! 4. **Execute**: Apply the plan in batches, verifying each write against
//!    the live target so reruns converge to no-ops
//!
//! An older changelog-replay path survives for single-resource promotions:
//! recorded structural diffs are folded in order and the folded state is
//! patched onto the target.
//!
//! ## Modules
//!
//! - [`resource`]: Resource vocabulary, canonical snapshots, comparison
//! - [`change`]: Change records, patch algebra, and replay
//! - [`sync`]: Plan construction, dependency ordering, and execution
//! - [`strategy`]: Per-type promotion strategies and their registry
//! - [`store`]: Adapter seams, locks, bundles, and in-memory backends
//! - [`environment`]: Environments, actors, and permission seams
//! - [`orchestrator`]: The operations tying everything together
//! - [`config`]: Promotion settings parsing
//! - [`cli`]: Command-line interface
//!
//! ## Example
//!
//! ```json
//! {
//!   "organization_id": "org-1",
//!   "environments": [
//!     {
//!       "id": "env-dev",
//!       "organization_id": "org-1",
//!       "name": "Development",
//!       "promotion_targets": ["env-prod"]
//!     },
//!     {
//!       "id": "env-prod",
//!       "organization_id": "org-1",
//!       "name": "Production"
//!     }
//!   ],
//!   "resources": [],
//!   "changes": []
//! }
//! ```

// ============================================================================
// Modules
// ============================================================================

pub mod change;
pub mod cli;
pub mod config;
pub mod environment;
pub mod error;
pub mod orchestrator;
pub mod resource;
pub mod store;
pub mod strategy;
pub mod sync;

// ============================================================================
// Re-exports
// ============================================================================

pub use change::{AggregatedState, ChangeAggregator, ChangeRecord, ChangeStore};
pub use cli::{Cli, Commands, OutputFormatter};
pub use config::{PromotionSettings, SettingsParser};
pub use environment::{Actor, Environment, EnvironmentLookup, PromotionGate};
pub use error::{PromotionError, Result};
pub use orchestrator::{PromotedResource, PromotionOrchestrator};
pub use resource::{CanonicalSnapshot, DiffEntry, ResourceRecord, ResourceType, SyncAction};
pub use store::{EnvironmentBundle, PromotionContext, PromotionLock, ResourceAdapter};
pub use strategy::{PromotionRegistry, PromotionStrategy};
pub use sync::{SyncExecutor, SyncPlan, SyncPlanBuilder, SyncReport};
