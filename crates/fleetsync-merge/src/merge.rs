//! Last-write-wins collection merge
//!
//! Reconciles a local collection against the rows read from the remote
//! table. The remote side seeds the result; a local record replaces its
//! remote counterpart only when its `updated_at` is strictly newer. Equal
//! timestamps keep the remote version.

use std::collections::{HashMap, HashSet};

use tracing::{debug, warn};

use fleetsync_core::domain::{Entity, RemoteRow, Timestamp};

/// Counters describing one merge
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MergeStats {
    /// Records known only to the remote side
    pub remote_only: usize,
    /// Records known only to the local side
    pub local_only: usize,
    /// Shared records where the local copy was newer
    pub local_wins: usize,
    /// Shared records where the remote copy was newer or equal
    pub remote_wins: usize,
}

/// Result of merging one collection
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MergeOutcome {
    /// Collection to persist locally, newest `created_at` first
    pub unified: Vec<Entity>,
    /// Rows to upsert remotely, at most one per identity
    pub push: Vec<RemoteRow>,
    pub stats: MergeStats,
}

/// Keyed, insertion-ordered working set
#[derive(Default)]
struct Keyed {
    entries: Vec<Entity>,
    index: HashMap<String, usize>,
}

impl Keyed {
    fn get(&self, id: &str) -> Option<&Entity> {
        self.index.get(id).map(|&i| &self.entries[i])
    }

    /// Identities in entry order
    fn order(&self) -> Vec<String> {
        let mut ids = vec![String::new(); self.entries.len()];
        for (id, &i) in &self.index {
            ids[i] = id.clone();
        }
        ids
    }

    fn upsert(&mut self, id: String, entity: Entity) {
        match self.index.get(&id) {
            Some(&i) => self.entries[i] = entity,
            None => {
                self.index.insert(id, self.entries.len());
                self.entries.push(entity);
            }
        }
    }
}

/// Splits `local` into one record per identity and the unkeyed rest
///
/// Duplicate identities collapse to the copy with the newest `updated_at`;
/// on equal stamps the later copy in collection order is kept.
fn collapse_local(local: Vec<Entity>) -> (Vec<(String, Entity)>, Vec<Entity>) {
    let mut keyed = Keyed::default();
    let mut unkeyed = Vec::new();

    for entity in local {
        let Some(id) = entity.backend_id().map(str::to_string) else {
            unkeyed.push(entity);
            continue;
        };
        let newer = keyed
            .get(&id)
            .map_or(true, |kept| entity.updated_at() >= kept.updated_at());
        if newer {
            keyed.upsert(id, entity);
        } else {
            debug!(id = %id, "Dropping older duplicate of local record");
        }
    }

    let ids = keyed.order();
    (ids.into_iter().zip(keyed.entries).collect(), unkeyed)
}

/// Collection reconciliation
pub struct MergeEngine;

impl MergeEngine {
    /// Merges `local` with `remote`
    ///
    /// `remote` rows are normalized first (row id copied onto the payload).
    /// Local records must already carry an identity; any that do not are kept
    /// in the unified output but never pushed.
    pub fn merge(local: Vec<Entity>, remote: Vec<RemoteRow>, now: Timestamp) -> MergeOutcome {
        let mut map = Keyed::default();
        for row in remote {
            let id = row.id.clone();
            map.upsert(id, row.into_entity());
        }
        let mut unmatched_remote: HashSet<String> = map.index.keys().cloned().collect();

        let (locals, unkeyed) = collapse_local(local);
        let mut push = Keyed::default();
        let mut stats = MergeStats::default();

        for (id, entity) in locals {
            match map.get(&id) {
                None => {
                    stats.local_only += 1;
                    push.upsert(id.clone(), entity.clone());
                    map.upsert(id, entity);
                }
                Some(current) => {
                    unmatched_remote.remove(&id);
                    if entity.updated_at() > current.updated_at() {
                        stats.local_wins += 1;
                        push.upsert(id.clone(), entity.clone());
                        map.upsert(id, entity);
                    } else {
                        stats.remote_wins += 1;
                    }
                }
            }
        }
        stats.remote_only = unmatched_remote.len();

        if !unkeyed.is_empty() {
            warn!(
                count = unkeyed.len(),
                "Local records without identity kept but not pushed"
            );
        }

        let mut unified = map.entries;
        unified.extend(unkeyed);
        // sort_by is stable: equal created_at keeps construction order
        unified.sort_by(|a, b| b.created_at().cmp(&a.created_at()));

        let push: Vec<RemoteRow> = push
            .entries
            .iter()
            .filter_map(|e| RemoteRow::from_entity(e, now))
            .collect();

        debug!(
            unified = unified.len(),
            push = push.len(),
            remote_only = stats.remote_only,
            local_only = stats.local_only,
            local_wins = stats.local_wins,
            remote_wins = stats.remote_wins,
            "Merged collection"
        );

        MergeOutcome {
            unified,
            push,
            stats,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{json, Value};

    use crate::identity::IdentityAssigner;

    fn now() -> Timestamp {
        Timestamp::parse("2024-07-01T00:00:00Z").unwrap()
    }

    fn local(value: Value) -> Entity {
        Entity::from_value(value).unwrap()
    }

    fn row(id: &str, data: Value, updated_at: Option<&str>) -> RemoteRow {
        RemoteRow {
            id: id.to_string(),
            data,
            updated_at: updated_at.map(str::to_string),
        }
    }

    fn find<'a>(entities: &'a [Entity], id: &str) -> &'a Entity {
        entities
            .iter()
            .find(|e| e.backend_id() == Some(id))
            .expect("entity present")
    }

    #[test]
    fn test_new_local_record_is_assigned_and_pushed() {
        let mut locals = vec![local(json!({"updated_at": "2024-01-01T00:00:00Z"}))];
        IdentityAssigner::assign(&mut locals, now());
        let id = locals[0].backend_id().unwrap().to_string();

        let outcome = MergeEngine::merge(locals, vec![], now());
        assert_eq!(outcome.unified.len(), 1);
        assert_eq!(outcome.unified[0].backend_id(), Some(id.as_str()));
        assert_eq!(outcome.push.len(), 1);
        assert_eq!(outcome.push[0].id, id);
        assert_eq!(outcome.stats.local_only, 1);
    }

    #[test]
    fn test_newer_remote_wins() {
        let locals = vec![local(json!({"__backendId": "x", "updated_at": "2024-06-01T00:00:00Z", "km": 1}))];
        let remote = vec![row("x", json!({"km": 2}), Some("2024-06-02T00:00:00Z"))];

        let outcome = MergeEngine::merge(locals, remote, now());
        let merged = find(&outcome.unified, "x");
        assert_eq!(merged.updated_at_raw(), Some("2024-06-02T00:00:00Z"));
        assert_eq!(merged.get("km"), Some(&json!(2)));
        assert!(outcome.push.is_empty());
    }

    #[test]
    fn test_equal_timestamps_keep_remote() {
        let locals = vec![local(json!({"__backendId": "y", "updated_at": "2024-06-01T00:00:00Z", "v": "local"}))];
        let remote = vec![row("y", json!({"v": "remote"}), Some("2024-06-01T00:00:00Z"))];

        let outcome = MergeEngine::merge(locals, remote, now());
        assert_eq!(find(&outcome.unified, "y").get("v"), Some(&json!("remote")));
        assert!(outcome.push.is_empty());
        assert_eq!(outcome.stats.remote_wins, 1);
    }

    #[test]
    fn test_equal_instants_in_different_formats_keep_remote() {
        let locals = vec![local(json!({"__backendId": "y", "updated_at": "2024-06-01T03:00:00+03:00"}))];
        let remote = vec![row("y", json!({}), Some("2024-06-01 00:00:00+00"))];

        let outcome = MergeEngine::merge(locals, remote, now());
        assert!(outcome.push.is_empty());
    }

    #[test]
    fn test_newer_local_wins_and_is_pushed() {
        let locals = vec![local(json!({"__backendId": "z", "updated_at": "2024-06-03T00:00:00Z", "v": "local"}))];
        let remote = vec![row("z", json!({"v": "remote"}), Some("2024-06-02T00:00:00Z"))];

        let outcome = MergeEngine::merge(locals, remote, now());
        assert_eq!(find(&outcome.unified, "z").get("v"), Some(&json!("local")));
        assert_eq!(outcome.push.len(), 1);
        assert_eq!(outcome.push[0].updated_at.as_deref(), Some("2024-06-03T00:00:00Z"));
        assert_eq!(outcome.push[0].data["v"], json!("local"));
    }

    #[test]
    fn test_missing_local_timestamp_never_beats_remote() {
        let locals = vec![local(json!({"__backendId": "a"}))];
        let remote = vec![row("a", json!({}), None)];
        let outcome = MergeEngine::merge(locals, remote, now());
        assert!(outcome.push.is_empty());
    }

    #[test]
    fn test_remote_only_is_adopted_not_pushed() {
        let remote = vec![row("r", json!({"plate": "35 R 1"}), Some("2024-06-02T00:00:00Z"))];
        let outcome = MergeEngine::merge(vec![], remote, now());
        assert_eq!(outcome.unified.len(), 1);
        assert_eq!(outcome.unified[0].backend_id(), Some("r"));
        assert!(outcome.push.is_empty());
        assert_eq!(outcome.stats.remote_only, 1);
    }

    #[test]
    fn test_push_defaults_missing_timestamp_to_now() {
        let locals = vec![local(json!({"__backendId": "n"}))];
        let outcome = MergeEngine::merge(locals, vec![], now());
        assert_eq!(
            outcome.push[0].updated_at.as_deref(),
            Some("2024-07-01T00:00:00.000Z")
        );
    }

    #[test]
    fn test_unified_sorted_by_created_at_desc_with_missing_last() {
        let locals = vec![
            local(json!({"__backendId": "old", "created_at": "2024-01-01T00:00:00Z"})),
            local(json!({"__backendId": "none"})),
            local(json!({"__backendId": "new", "created_at": "2024-05-01T00:00:00Z"})),
        ];
        let outcome = MergeEngine::merge(locals, vec![], now());
        let order: Vec<_> = outcome.unified.iter().map(|e| e.backend_id().unwrap()).collect();
        assert_eq!(order, vec!["new", "old", "none"]);
    }

    #[test]
    fn test_duplicate_local_ids_push_once() {
        let locals = vec![
            local(json!({"__backendId": "d", "updated_at": "2024-06-01T00:00:00Z", "v": 1})),
            local(json!({"__backendId": "d", "updated_at": "2024-06-05T00:00:00Z", "v": 2})),
        ];
        let outcome = MergeEngine::merge(locals, vec![], now());
        assert_eq!(outcome.unified.len(), 1);
        assert_eq!(outcome.push.len(), 1);
        assert_eq!(outcome.push[0].data["v"], json!(2));
    }

    #[test]
    fn test_duplicate_local_ids_count_once() {
        let locals = vec![
            local(json!({"__backendId": "d", "updated_at": "2024-06-05T00:00:00Z", "v": 1})),
            local(json!({"__backendId": "d", "updated_at": "2024-06-01T00:00:00Z", "v": 2})),
        ];
        let outcome = MergeEngine::merge(locals, vec![], now());
        assert_eq!(outcome.stats.local_only, 1);
        assert_eq!(outcome.stats.local_wins, 0);
        assert_eq!(outcome.push[0].data["v"], json!(1));
    }

    #[test]
    fn test_duplicate_local_ids_against_remote_count_once() {
        let locals = vec![
            local(json!({"__backendId": "d", "updated_at": "2024-06-03T00:00:00Z", "v": 1})),
            local(json!({"__backendId": "d", "updated_at": "2024-06-04T00:00:00Z", "v": 2})),
        ];
        let remote = vec![row("d", json!({"v": 0}), Some("2024-06-02T00:00:00Z"))];

        let outcome = MergeEngine::merge(locals, remote, now());
        assert_eq!(outcome.stats.local_wins, 1);
        assert_eq!(outcome.stats.remote_wins, 0);
        assert_eq!(outcome.stats.remote_only, 0);
        assert_eq!(find(&outcome.unified, "d").get("v"), Some(&json!(2)));
    }

    #[test]
    fn test_newer_local_wins_with_remote_counted_as_matched() {
        let locals = vec![local(json!({"__backendId": "m", "updated_at": "2024-06-03T00:00:00Z"}))];
        let remote = vec![
            row("m", json!({}), Some("2024-06-02T00:00:00Z")),
            row("o", json!({}), Some("2024-06-02T00:00:00Z")),
        ];

        let outcome = MergeEngine::merge(locals, remote, now());
        assert_eq!(outcome.stats.local_wins, 1);
        assert_eq!(outcome.stats.remote_only, 1);
    }

    #[test]
    fn test_merge_is_idempotent() {
        let locals = vec![
            local(json!({"__backendId": "a", "updated_at": "2024-06-03T00:00:00Z"})),
            local(json!({"__backendId": "b", "updated_at": "2024-06-01T00:00:00Z"})),
        ];
        let remote = vec![
            row("b", json!({}), Some("2024-06-02T00:00:00Z")),
            row("c", json!({}), Some("2024-06-02T00:00:00Z")),
        ];

        let first = MergeEngine::merge(locals, remote.clone(), now());
        assert_eq!(first.push.len(), 1);

        // Apply the push to the remote side as the backend would.
        let mut remote_after = remote;
        for pushed in &first.push {
            remote_after.retain(|r| r.id != pushed.id);
            remote_after.push(pushed.clone());
        }

        let second = MergeEngine::merge(first.unified.clone(), remote_after, now());
        assert!(second.push.is_empty());

        let mut a: Vec<_> = first.unified.iter().map(|e| e.backend_id().unwrap().to_string()).collect();
        let mut b: Vec<_> = second.unified.iter().map(|e| e.backend_id().unwrap().to_string()).collect();
        a.sort();
        b.sort();
        assert_eq!(a, b);
    }

    #[test]
    fn test_unkeyed_local_is_kept_but_not_pushed() {
        let outcome = MergeEngine::merge(vec![Entity::new()], vec![], now());
        assert_eq!(outcome.unified.len(), 1);
        assert!(outcome.push.is_empty());
    }
}
