//! Per-key settings reconciliation
//!
//! A setting is one JSON value replaced wholesale by whichever side is
//! newer. The remote row carries `updated_at`; the local side mirrors its
//! own timestamp under `<key>_updated`. This module only decides; applying
//! the decision is the orchestrator's job.

use serde_json::Value;
use tracing::trace;

use fleetsync_core::domain::{SettingRow, Timestamp};
use fleetsync_core::usecases::LocalSetting;

/// What to do with one settings key
#[derive(Debug, Clone, PartialEq)]
pub enum SettingDecision {
    /// Remote is newer: overwrite the local value and mirrored timestamp
    PullRemote { value: Value, updated_at: String },
    /// Local is newer: upsert the remote row with the local value
    PushLocal(SettingRow),
    /// No remote row and a local value (stamped or not): create the remote
    /// row at `now` and restamp the local copy with the same instant
    CreateRemote(SettingRow),
    /// Both sides agree or there is nothing to move
    Noop,
}

/// Settings decision logic
pub struct SettingsReconciler;

impl SettingsReconciler {
    /// Decides how to reconcile `key`
    pub fn decide(
        key: &str,
        remote: Option<&SettingRow>,
        local: &LocalSetting,
        now: Timestamp,
    ) -> SettingDecision {
        let remote_time = remote.map(SettingRow::updated_at).unwrap_or_default();
        let local_time = Timestamp::parse_or_epoch(local.updated_at.as_deref());

        let decision = match (remote, &local.value) {
            (Some(row), _) if remote_time > local_time => SettingDecision::PullRemote {
                value: row.value.clone(),
                updated_at: row
                    .updated_at
                    .clone()
                    .unwrap_or_else(|| remote_time.to_iso_string()),
            },
            (None, Some(value)) => {
                SettingDecision::CreateRemote(SettingRow::new(key, value.clone(), now))
            }
            (Some(_), Some(value)) if local_time > remote_time => {
                SettingDecision::PushLocal(SettingRow::new(key, value.clone(), local_time))
            }
            _ => SettingDecision::Noop,
        };

        trace!(
            key,
            remote = %remote_time,
            local = %local_time,
            decision = ?decision,
            "Setting decision"
        );
        decision
    }
}
