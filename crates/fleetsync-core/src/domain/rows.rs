//! Remote storage shapes
//!
//! Collection tables store `{id, data, updated_at}` where `data` is the opaque
//! entity payload. The settings table stores `{key, value, updated_at}`.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::entity::Entity;
use super::newtypes::Timestamp;

/// A row of a remote collection table
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RemoteRow {
    pub id: String,
    #[serde(default)]
    pub data: Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<String>,
}

impl RemoteRow {
    /// Builds the push payload for an entity that already carries an identity
    ///
    /// A missing `updated_at` defaults to `now`. Returns `None` when the
    /// entity has no identity.
    #[must_use]
    pub fn from_entity(entity: &Entity, now: Timestamp) -> Option<Self> {
        let id = entity.backend_id()?.to_string();
        let updated_at = entity
            .updated_at_raw()
            .map(str::to_string)
            .unwrap_or_else(|| now.to_iso_string());
        Some(Self {
            id,
            data: entity.clone().into_value(),
            updated_at: Some(updated_at),
        })
    }

    /// Normalizes the row into an entity
    ///
    /// Copies `id` onto the identity field and, when present, the row's
    /// `updated_at` onto the payload. A non-object payload is replaced by an
    /// empty object.
    #[must_use]
    pub fn into_entity(self) -> Entity {
        let mut entity = match self.data {
            Value::Object(map) => Entity::from(map),
            _ => Entity::from(Map::new()),
        };
        entity.set_backend_id(self.id);
        if let Some(updated_at) = self.updated_at {
            entity.insert(super::entity::UPDATED_AT_FIELD, Value::String(updated_at));
        }
        entity
    }
}

/// A row of the remote settings table
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SettingRow {
    pub key: String,
    #[serde(default)]
    pub value: Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<String>,
}

impl SettingRow {
    #[must_use]
    pub fn new(key: impl Into<String>, value: Value, updated_at: Timestamp) -> Self {
        Self {
            key: key.into(),
            value,
            updated_at: Some(updated_at.to_iso_string()),
        }
    }

    /// Parsed `updated_at`, epoch when missing
    #[must_use]
    pub fn updated_at(&self) -> Timestamp {
        Timestamp::parse_or_epoch(self.updated_at.as_deref())
    }
}
