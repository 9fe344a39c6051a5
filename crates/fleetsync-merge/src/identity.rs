//! Provisional identity assignment
//!
//! Records created locally have no backend identity until their first
//! successful push. Before a collection is merged, every record lacking one
//! receives `local_<epoch-millis>_<6 lowercase alphanumerics>`. Once written
//! back to the local store that id is permanent.

use std::collections::HashSet;

use tracing::debug;
use uuid::Uuid;

use fleetsync_core::domain::{BackendId, Entity, Timestamp};

const SUFFIX_LEN: usize = 6;

const SUFFIX_ALPHABET: &[u8; 36] = b"0123456789abcdefghijklmnopqrstuvwxyz";

/// Assigns provisional identities to local-only records
pub struct IdentityAssigner;

impl IdentityAssigner {
    /// Mints one provisional id for the given instant
    pub fn mint(now: Timestamp) -> BackendId {
        let random = Uuid::new_v4();
        let suffix: String = random.as_bytes()[..SUFFIX_LEN]
            .iter()
            .map(|b| SUFFIX_ALPHABET[usize::from(*b) % SUFFIX_ALPHABET.len()] as char)
            .collect();
        BackendId::provisional(now, &suffix)
    }

    /// Gives every record without an identity a fresh provisional one
    ///
    /// Records that also lack `updated_at` are stamped with `now`. Records
    /// that already carry an identity are never touched, so repeated calls are
    /// stable. Returns how many identities were assigned; the caller must
    /// persist the collection when this is non-zero.
    pub fn assign(entities: &mut [Entity], now: Timestamp) -> usize {
        let mut taken: HashSet<String> = entities
            .iter()
            .filter_map(|e| e.backend_id().map(str::to_string))
            .collect();

        let mut assigned = 0;
        for entity in entities.iter_mut().filter(|e| e.backend_id().is_none()) {
            let id = loop {
                let candidate = Self::mint(now);
                if taken.insert(candidate.as_str().to_string()) {
                    break candidate;
                }
            };
            debug!(id = %id, "Assigned provisional identity");
            entity.set_backend_id(id);
            if entity.updated_at_raw().is_none() {
                entity.touch(now);
            }
            assigned += 1;
        }
        assigned
    }
}
