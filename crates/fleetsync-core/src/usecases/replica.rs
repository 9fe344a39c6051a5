//! Local replica access
//!
//! Interprets the raw strings of an [`ILocalStore`] as collections,
//! settings with their mirrored timestamps, and cached profiles.
//!
//! ## Corrupt data policy
//!
//! A collection whose stored text is not a JSON array is copied verbatim to
//! `<key>_corrupt`, logged, and read as empty. The next save overwrites the
//! original key, so the quarantined copy is the only remaining trace.
//! Array elements that are not objects are dropped. A setting whose text is
//! not valid JSON reads as absent.

use std::sync::Arc;

use anyhow::{Context, Result};
use serde_json::Value;
use tracing::{debug, warn};

use crate::domain::Entity;
use crate::ports::ILocalStore;

/// Suffix of the key mirroring a setting's last-modified time
pub const SETTING_STAMP_SUFFIX: &str = "_updated";

/// Suffix of the key receiving unparseable collection text
pub const CORRUPT_SUFFIX: &str = "_corrupt";

/// A setting as stored locally
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LocalSetting {
    pub value: Option<Value>,
    /// Mirrored timestamp string, as written by the last reconciliation or mutation
    pub updated_at: Option<String>,
}

/// Typed view over the local key-value store
#[derive(Clone)]
pub struct LocalReplica {
    store: Arc<dyn ILocalStore>,
}

impl LocalReplica {
    pub fn new(store: Arc<dyn ILocalStore>) -> Self {
        Self { store }
    }

    /// Loads a collection; a missing key yields an empty collection
    pub async fn load_collection(&self, key: &str) -> Result<Vec<Entity>> {
        let Some(raw) = self
            .store
            .get(key)
            .await
            .with_context(|| format!("Failed to read collection '{key}'"))?
        else {
            return Ok(Vec::new());
        };

        let items = match serde_json::from_str::<Value>(&raw) {
            Ok(Value::Array(items)) => items,
            _ => {
                self.quarantine(key, &raw).await?;
                return Ok(Vec::new());
            }
        };

        let total = items.len();
        let entities: Vec<Entity> = items
            .into_iter()
            .filter_map(|item| Entity::from_value(item).ok())
            .collect();
        if entities.len() != total {
            warn!(
                key,
                dropped = total - entities.len(),
                "Dropped non-object elements from collection"
            );
        }
        Ok(entities)
    }

    /// Persists a collection as a JSON array, replacing the previous value
    pub async fn save_collection(&self, key: &str, entities: &[Entity]) -> Result<()> {
        let raw = serde_json::to_string(entities).context("Failed to serialize collection")?;
        self.store
            .set(key, &raw)
            .await
            .with_context(|| format!("Failed to write collection '{key}'"))?;
        debug!(key, count = entities.len(), "Saved collection");
        Ok(())
    }

    /// Loads a setting value and its mirrored timestamp
    pub async fn load_setting(&self, key: &str) -> Result<LocalSetting> {
        let value = match self.store.get(key).await? {
            Some(raw) => match serde_json::from_str::<Value>(&raw) {
                Ok(value) => Some(value),
                Err(e) => {
                    warn!(key, error = %e, "Ignoring unparseable local setting");
                    None
                }
            },
            None => None,
        };
        let updated_at = self.store.get(&stamp_key(key)).await?;
        Ok(LocalSetting { value, updated_at })
    }

    /// Writes a setting value together with its mirrored timestamp
    pub async fn store_setting(&self, key: &str, value: &Value, updated_at: &str) -> Result<()> {
        let raw = serde_json::to_string(value).context("Failed to serialize setting")?;
        self.store
            .set(key, &raw)
            .await
            .with_context(|| format!("Failed to write setting '{key}'"))?;
        self.store_setting_stamp(key, updated_at).await
    }

    /// Writes only the mirrored timestamp of a setting
    pub async fn store_setting_stamp(&self, key: &str, updated_at: &str) -> Result<()> {
        self.store
            .set(&stamp_key(key), updated_at)
            .await
            .with_context(|| format!("Failed to write timestamp of setting '{key}'"))
    }

    /// Loads cached profiles; missing or unparseable data yields an empty list
    pub async fn load_profiles(&self, key: &str) -> Result<Vec<Value>> {
        Ok(match self.store.get(key).await? {
            Some(raw) => match serde_json::from_str::<Value>(&raw) {
                Ok(Value::Array(rows)) => rows,
                _ => {
                    warn!(key, "Ignoring unparseable cached profiles");
                    Vec::new()
                }
            },
            None => Vec::new(),
        })
    }

    /// Replaces the cached profiles
    pub async fn save_profiles(&self, key: &str, rows: &[Value]) -> Result<()> {
        let raw = serde_json::to_string(rows).context("Failed to serialize profiles")?;
        self.store.set(key, &raw).await
    }

    async fn quarantine(&self, key: &str, raw: &str) -> Result<()> {
        let target = format!("{key}{CORRUPT_SUFFIX}");
        warn!(
            key,
            quarantine_key = %target,
            bytes = raw.len(),
            "Local collection is not a JSON array; treating as empty"
        );
        self.store
            .set(&target, raw)
            .await
            .with_context(|| format!("Failed to quarantine corrupt collection '{key}'"))
    }
}

fn stamp_key(key: &str) -> String {
    format!("{key}{SETTING_STAMP_SUFFIX}")
}
