//! Application use cases
//!
//! - [`LocalReplica`] - typed access to collections, settings and profiles
//!   held in the local store
//! - [`RecordMutations`] - user-facing mutations that publish change events

pub mod record_mutations;
pub mod replica;

pub use record_mutations::RecordMutations;
pub use replica::{LocalReplica, LocalSetting};
