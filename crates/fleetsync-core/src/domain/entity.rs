//! Generic synchronized record
//!
//! An [`Entity`] is an opaque JSON object with three reserved fields. The
//! engine never interprets the remaining fields; they are carried through
//! merges untouched.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::errors::DomainError;
use super::newtypes::{BackendId, Timestamp};

/// Field holding the record identity
pub const BACKEND_ID_FIELD: &str = "__backendId";

/// Field holding the last-modified timestamp used for last-write-wins
pub const UPDATED_AT_FIELD: &str = "updated_at";

/// Field holding the creation timestamp used to order merged collections
pub const CREATED_AT_FIELD: &str = "created_at";

/// One record participating in two-way sync
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Entity(Map<String, Value>);

impl Entity {
    /// Creates an empty entity
    #[must_use]
    pub fn new() -> Self {
        Self(Map::new())
    }

    /// Wraps an arbitrary JSON value
    ///
    /// # Errors
    /// Returns [`DomainError::NotAnObject`] unless `value` is a JSON object
    pub fn from_value(value: Value) -> Result<Self, DomainError> {
        match value {
            Value::Object(map) => Ok(Self(map)),
            other => Err(DomainError::NotAnObject(json_kind(&other).to_string())),
        }
    }

    /// The identity, if present as a non-empty string
    ///
    /// Non-string identities are treated as missing.
    #[must_use]
    pub fn backend_id(&self) -> Option<&str> {
        match self.0.get(BACKEND_ID_FIELD) {
            Some(Value::String(s)) if !s.is_empty() => Some(s.as_str()),
            _ => None,
        }
    }

    /// The identity as a validated [`BackendId`]
    ///
    /// `None` when missing, not a string, or not a valid id.
    #[must_use]
    pub fn identity(&self) -> Option<BackendId> {
        self.backend_id().and_then(|id| BackendId::new(id).ok())
    }

    pub fn set_backend_id(&mut self, id: impl Into<String>) {
        self.0
            .insert(BACKEND_ID_FIELD.to_string(), Value::String(id.into()));
    }

    /// The raw `updated_at` string as stored
    #[must_use]
    pub fn updated_at_raw(&self) -> Option<&str> {
        self.0.get(UPDATED_AT_FIELD).and_then(Value::as_str)
    }

    /// Parsed `updated_at`; missing or malformed values compare as the epoch
    #[must_use]
    pub fn updated_at(&self) -> Timestamp {
        Timestamp::parse_or_epoch(self.updated_at_raw())
    }

    pub fn set_updated_at(&mut self, ts: Timestamp) {
        self.0.insert(
            UPDATED_AT_FIELD.to_string(),
            Value::String(ts.to_iso_string()),
        );
    }

    /// Parsed `created_at`; missing or malformed values compare as the epoch
    #[must_use]
    pub fn created_at(&self) -> Timestamp {
        Timestamp::parse_or_epoch(self.0.get(CREATED_AT_FIELD).and_then(Value::as_str))
    }

    /// Returns true if `created_at` is present
    #[must_use]
    pub fn has_created_at(&self) -> bool {
        self.0.contains_key(CREATED_AT_FIELD)
    }

    pub fn set_created_at(&mut self, ts: Timestamp) {
        self.0.insert(
            CREATED_AT_FIELD.to_string(),
            Value::String(ts.to_iso_string()),
        );
    }

    /// Marks the entity as modified at `now`
    pub fn touch(&mut self, now: Timestamp) {
        self.set_updated_at(now);
    }

    #[must_use]
    pub fn get(&self, field: &str) -> Option<&Value> {
        self.0.get(field)
    }

    pub fn insert(&mut self, field: impl Into<String>, value: Value) -> Option<Value> {
        self.0.insert(field.into(), value)
    }

    pub fn remove(&mut self, field: &str) -> Option<Value> {
        self.0.remove(field)
    }

    #[must_use]
    pub fn as_map(&self) -> &Map<String, Value> {
        &self.0
    }

    #[must_use]
    pub fn into_value(self) -> Value {
        Value::Object(self.0)
    }
}

impl From<Map<String, Value>> for Entity {
    fn from(map: Map<String, Value>) -> Self {
        Self(map)
    }
}

impl TryFrom<Value> for Entity {
    type Error = DomainError;

    fn try_from(value: Value) -> Result<Self, Self::Error> {
        Self::from_value(value)
    }
}

pub(crate) fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
