//! Incremental change detection between the remote content set and the
//! indexed snapshot.

use std::collections::HashSet;

use super::types::{ContentKey, IndexSnapshot, PreparedItem};

/// Partition of one indexing cycle's work, keyed by `(slug, content_type)`.
#[derive(Debug, Default)]
pub struct IndexPlan {
    pub new: Vec<PreparedItem>,
    pub updated: Vec<PreparedItem>,
    pub removed: Vec<ContentKey>,
    pub unchanged: Vec<ContentKey>,
}

impl IndexPlan {
    /// Classify every prepared remote item against the snapshot.
    ///
    /// Pure function of its inputs: applying the same remote set twice in a
    /// row yields an empty second plan, regardless of item ordering.
    ///
    /// - no chunks: removal if the key is currently indexed, otherwise skip;
    /// - key not in snapshot: new;
    /// - hash changed, or both update timestamps known and the remote one is
    ///   newer: updated (the hash is the primary signal and catches edits
    ///   without a timestamp bump; the timestamp catches metadata-only
    ///   touches);
    /// - snapshot keys absent from the remote set: removed.
    pub fn build(remote_items: Vec<PreparedItem>, snapshot: &IndexSnapshot) -> Self {
        let mut plan = IndexPlan::default();
        let mut remote_keys: HashSet<ContentKey> = HashSet::new();

        for prepared in remote_items {
            let key = prepared.item.key();
            remote_keys.insert(key.clone());

            if prepared.chunks.is_empty() {
                if snapshot.contains(&key) {
                    plan.removed.push(key);
                }
                continue;
            }

            let Some(existing) = snapshot.get(&key) else {
                plan.new.push(prepared);
                continue;
            };

            let hash_changed = match (&prepared.content_hash, &existing.content_hash) {
                (Some(remote_hash), Some(indexed_hash)) => remote_hash != indexed_hash,
                // No stored hash to compare against: treat as changed so the
                // entry gets rewritten with one.
                (Some(_), None) => true,
                (None, _) => false,
            };

            let timestamp_newer = match (prepared.item.updated_at, existing.updated_at) {
                (Some(remote), Some(indexed)) => remote > indexed,
                _ => false,
            };

            if hash_changed || timestamp_newer {
                plan.updated.push(prepared);
            } else {
                plan.unchanged.push(key);
            }
        }

        for key in snapshot.keys() {
            if !remote_keys.contains(key) {
                plan.removed.push(key.clone());
            }
        }

        plan
    }

    pub fn has_work(&self) -> bool {
        !self.new.is_empty() || !self.updated.is_empty() || !self.removed.is_empty()
    }
}
