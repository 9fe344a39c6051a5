//! Record mutation use case
//!
//! The user-facing mutating operations on the managed collection. Each
//! operation commits to the local replica first and then publishes a
//! [`MutationEvent`] so that the trigger scheduler can start a sync pass.
//! Deletion moves records into the deleted-records setting; nothing here
//! writes tombstones into a collection.
//!
//! Soft deletion only touches the local replica. The remote row of a record
//! that was already pushed survives, so the next sync pass re-adopts it as a
//! remote-only record: it is then live in the collection and also listed in
//! the deleted-records setting. Removing the remote row is not part of this
//! use case.

use anyhow::{Context, Result};
use serde_json::Value;
use tokio::sync::broadcast;
use tracing::{debug, info};

use super::replica::LocalReplica;
use crate::domain::{DomainError, Entity, MutationEvent, MutationKind, Timestamp};

/// Capacity of the mutation event channel
const EVENT_CAPACITY: usize = 64;

/// Field flipped by [`RecordMutations::toggle_status`]
pub const STATUS_FIELD: &str = "status";

/// Field stamped on records moved to the deleted-records setting
pub const DELETED_AT_FIELD: &str = "deleted_at";

const STATUS_ACTIVE: &str = "active";
const STATUS_PASSIVE: &str = "passive";

/// Use case performing local record mutations
pub struct RecordMutations {
    replica: LocalReplica,
    collection: String,
    deleted_key: String,
    events: broadcast::Sender<MutationEvent>,
}

impl RecordMutations {
    /// Creates the use case for one collection and its deleted-records setting
    pub fn new(
        replica: LocalReplica,
        collection: impl Into<String>,
        deleted_key: impl Into<String>,
    ) -> Self {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Self {
            replica,
            collection: collection.into(),
            deleted_key: deleted_key.into(),
            events,
        }
    }

    /// Subscribes to mutation events published after each commit
    pub fn subscribe(&self) -> broadcast::Receiver<MutationEvent> {
        self.events.subscribe()
    }

    /// Current records of the managed collection
    pub async fn list(&self) -> Result<Vec<Entity>> {
        self.replica.load_collection(&self.collection).await
    }

    /// Records currently in the deleted-records setting
    pub async fn list_deleted(&self) -> Result<Vec<Entity>> {
        let setting = self.replica.load_setting(&self.deleted_key).await?;
        Ok(deleted_entities(setting.value))
    }

    /// Inserts or replaces a record
    ///
    /// A record carrying an identity replaces the existing record with that
    /// identity, or is appended if none exists. A record without one is
    /// appended; the identity assigner mints its id at the next sync pass.
    /// `updated_at` is always refreshed and `created_at` is set when absent.
    pub async fn save(&self, mut entity: Entity) -> Result<Entity> {
        let now = Timestamp::now();
        entity.touch(now);
        if !entity.has_created_at() {
            entity.set_created_at(now);
        }

        let mut records = self.list().await?;
        let existing = entity
            .backend_id()
            .and_then(|id| records.iter().position(|r| r.backend_id() == Some(id)));
        match existing {
            Some(index) => records[index] = entity.clone(),
            None => records.push(entity.clone()),
        }
        self.replica
            .save_collection(&self.collection, &records)
            .await?;

        info!(id = ?entity.backend_id(), replaced = existing.is_some(), "Saved record");
        self.publish(MutationKind::Save, entity.backend_id());
        Ok(entity)
    }

    /// Moves a record from the collection to the deleted-records setting
    pub async fn soft_delete(&self, id: &str) -> Result<Entity> {
        let now = Timestamp::now();
        let mut records = self.list().await?;
        let index = position(&records, id)?;
        let mut entity = records.remove(index);
        entity.insert(DELETED_AT_FIELD, Value::String(now.to_iso_string()));

        let mut deleted = self.list_deleted().await?;
        deleted.retain(|r| r.backend_id() != Some(id));
        deleted.push(entity.clone());

        self.replica
            .save_collection(&self.collection, &records)
            .await?;
        self.save_deleted(&deleted, now).await?;

        info!(id, "Moved record to deleted records");
        self.publish(MutationKind::SoftDelete, Some(id));
        Ok(entity)
    }

    /// Removes a record from the deleted-records setting for good
    pub async fn permanent_delete(&self, id: &str) -> Result<Entity> {
        let mut deleted = self.list_deleted().await?;
        let index = position(&deleted, id)?;
        let entity = deleted.remove(index);
        self.save_deleted(&deleted, Timestamp::now()).await?;

        info!(id, "Permanently deleted record");
        self.publish(MutationKind::PermanentDelete, Some(id));
        Ok(entity)
    }

    /// Moves a record from the deleted-records setting back to the collection
    pub async fn restore(&self, id: &str) -> Result<Entity> {
        let now = Timestamp::now();
        let mut deleted = self.list_deleted().await?;
        let index = position(&deleted, id)?;
        let mut entity = deleted.remove(index);
        entity.remove(DELETED_AT_FIELD);
        entity.touch(now);

        let mut records = self.list().await?;
        records.retain(|r| r.backend_id() != Some(id));
        records.push(entity.clone());

        self.replica
            .save_collection(&self.collection, &records)
            .await?;
        self.save_deleted(&deleted, now).await?;

        info!(id, "Restored record");
        self.publish(MutationKind::Restore, Some(id));
        Ok(entity)
    }

    /// Flips a record's status between `active` and `passive`
    ///
    /// A record without a status is considered active.
    pub async fn toggle_status(&self, id: &str) -> Result<Entity> {
        let mut records = self.list().await?;
        let index = position(&records, id)?;
        let entity = &mut records[index];
        let next = match entity.get(STATUS_FIELD).and_then(Value::as_str) {
            Some(STATUS_PASSIVE) => STATUS_ACTIVE,
            _ => STATUS_PASSIVE,
        };
        entity.insert(STATUS_FIELD, Value::String(next.to_string()));
        entity.touch(Timestamp::now());
        let updated = entity.clone();

        self.replica
            .save_collection(&self.collection, &records)
            .await?;

        info!(id, status = next, "Toggled record status");
        self.publish(MutationKind::ToggleStatus, Some(id));
        Ok(updated)
    }

    async fn save_deleted(&self, deleted: &[Entity], now: Timestamp) -> Result<()> {
        let value = serde_json::to_value(deleted).context("Failed to serialize deleted records")?;
        self.replica
            .store_setting(&self.deleted_key, &value, &now.to_iso_string())
            .await
    }

    fn publish(&self, kind: MutationKind, backend_id: Option<&str>) {
        let event = MutationEvent::new(kind, backend_id.map(str::to_string));
        // No receivers is fine: the event is only a sync hint.
        if self.events.send(event).is_err() {
            debug!(%kind, "No mutation subscribers");
        }
    }
}

fn position(records: &[Entity], id: &str) -> Result<usize> {
    records
        .iter()
        .position(|r| r.backend_id() == Some(id))
        .ok_or_else(|| DomainError::EntityNotFound(id.to_string()).into())
}

fn deleted_entities(value: Option<Value>) -> Vec<Entity> {
    match value {
        Some(Value::Array(items)) => items
            .into_iter()
            .filter_map(|item| Entity::from_value(item).ok())
            .collect(),
        _ => Vec::new(),
    }
}
