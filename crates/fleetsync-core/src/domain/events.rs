//! Events that trigger synchronization
//!
//! [`MutationEvent`]s are published by local mutating operations after they
//! commit; [`ChangeNotification`]s arrive from the remote change feed.

use std::fmt;

use serde::{Deserialize, Serialize};

use super::newtypes::Timestamp;

/// Local mutating operations that announce themselves
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MutationKind {
    Save,
    SoftDelete,
    PermanentDelete,
    Restore,
    ToggleStatus,
}

impl fmt::Display for MutationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Save => "save",
            Self::SoftDelete => "soft_delete",
            Self::PermanentDelete => "permanent_delete",
            Self::Restore => "restore",
            Self::ToggleStatus => "toggle_status",
        };
        f.write_str(s)
    }
}

/// Published after a local mutation has been persisted
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MutationEvent {
    pub kind: MutationKind,
    pub backend_id: Option<String>,
    pub at: Timestamp,
}

impl MutationEvent {
    #[must_use]
    pub fn new(kind: MutationKind, backend_id: Option<String>) -> Self {
        Self {
            kind,
            backend_id,
            at: Timestamp::now(),
        }
    }
}

/// Kind of change observed on a remote table
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ChangeKind {
    Insert,
    Update,
    Delete,
}

/// Filter for which change kinds a subscription delivers
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EventMask {
    #[default]
    All,
    Insert,
    Update,
    Delete,
}

impl EventMask {
    #[must_use]
    pub fn accepts(&self, kind: ChangeKind) -> bool {
        matches!(
            (self, kind),
            (Self::All, _)
                | (Self::Insert, ChangeKind::Insert)
                | (Self::Update, ChangeKind::Update)
                | (Self::Delete, ChangeKind::Delete)
        )
    }
}

/// A remote table changed; the payload is intentionally thin
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChangeNotification {
    pub table: String,
    pub kind: ChangeKind,
    pub detected_at: Timestamp,
}
