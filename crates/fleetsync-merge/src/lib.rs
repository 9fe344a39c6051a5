//! FleetSync Merge - Reconciliation logic
//!
//! Provides:
//! - Provisional identity assignment for local-only records
//! - Last-write-wins collection merge producing the unified collection and
//!   the push list
//! - Whole-value settings reconciliation decisions
//!
//! Everything here is pure: no I/O, no clocks other than the `now` passed in.

pub mod identity;
pub mod merge;
pub mod settings;

pub use identity::IdentityAssigner;
pub use merge::{MergeEngine, MergeOutcome, MergeStats};
pub use settings::{SettingDecision, SettingsReconciler};
