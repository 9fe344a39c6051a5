//! FleetSync Sync - Pass orchestration
//!
//! Provides:
//! - The sync lock that keeps passes mutually exclusive
//! - The orchestrator that runs one pass: collections, profiles, settings
//! - The trigger scheduler that turns startup, timer, remote changes and
//!   local mutations into passes
//!
//! ## Modules
//!
//! - [`lock`] - Non-blocking mutual exclusion with guaranteed release
//! - [`orchestrator`] - One sync pass over every managed collection and key
//! - [`scheduler`] - Trigger sources feeding the orchestrator

pub mod lock;
pub mod orchestrator;
pub mod scheduler;

pub use lock::{SyncGuard, SyncLock};
pub use orchestrator::{CollectionReport, PassOutcome, PassReport, SkipReason, SyncOrchestrator};
pub use scheduler::{Trigger, TriggerScheduler};

use thiserror::Error;

/// Errors raised while wiring the sync machinery
#[derive(Debug, Error)]
pub enum SyncError {
    /// A remote replica was already installed
    #[error("Remote replica already initialized")]
    AlreadyInitialized,
}
