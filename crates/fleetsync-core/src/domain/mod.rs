//! Domain entities and business logic
//!
//! This module contains the core domain types for FleetSync:
//! - Newtypes for validated identities and timestamps
//! - The generic `Entity` record and its reserved fields
//! - Remote storage shapes (`RemoteRow`, `SettingRow`)
//! - Sync status, toast severity, and change/mutation events
//! - Domain-specific error types

pub mod entity;
pub mod errors;
pub mod events;
pub mod newtypes;
pub mod rows;
pub mod status;

// Re-export commonly used types
pub use entity::{Entity, BACKEND_ID_FIELD, CREATED_AT_FIELD, UPDATED_AT_FIELD};
pub use errors::DomainError;
pub use events::{ChangeKind, ChangeNotification, EventMask, MutationEvent, MutationKind};
pub use newtypes::*;
pub use rows::{RemoteRow, SettingRow};
pub use status::{SyncStatus, ToastSeverity};
