use std::collections::HashMap;
use tracing::debug;

use crate::node::{NodeKey, NodeRecord, NodeUpdate};

/// In-memory node database with lookup by node number or hex id.
///
/// Records live in insertion-ordered slots; both indexes point at slot
/// positions, so a node reachable by either identifier is one record.
/// Iteration follows slot order and does not shuffle between refreshes.
#[derive(Debug, Default, Clone)]
pub struct NodeCache {
    slots: Vec<Option<NodeRecord>>,
    by_num: HashMap<u32, usize>,
    by_id: HashMap<String, usize>,
}

impl NodeCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a cache from previously persisted records
    pub fn from_records(records: impl IntoIterator<Item = NodeRecord>) -> Self {
        let mut cache = Self::new();
        for record in records {
            cache.insert_record(record);
        }
        cache
    }

    pub fn len(&self) -> usize {
        self.slots.iter().flatten().count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn get(&self, key: &NodeKey) -> Option<&NodeRecord> {
        let slot = match key {
            NodeKey::Num(num) => self.by_num.get(num),
            NodeKey::Hex(id) => self.by_id.get(id),
        }?;
        self.slots.get(*slot)?.as_ref()
    }

    /// Apply a node update, normalizing it first. Returns the merged record,
    /// or `None` when the update carries no usable identifier.
    pub fn upsert(&mut self, update: &NodeUpdate) -> Option<NodeRecord> {
        if !update.has_identifier() {
            debug!("Ignoring node update without identifier");
            return None;
        }
        self.insert_record(update.normalize())
    }

    /// Merge an already-normalized record into the cache
    pub fn insert_record(&mut self, record: NodeRecord) -> Option<NodeRecord> {
        let num_slot = record.num.and_then(|num| self.by_num.get(&num).copied());
        let id_slot = record
            .id
            .as_ref()
            .and_then(|id| self.by_id.get(id).copied());

        let slot = match (num_slot, id_slot) {
            (None, None) => {
                if record.num.is_none() && record.id.is_none() {
                    return None;
                }
                self.slots.push(None);
                self.slots.len() - 1
            }
            (Some(slot), None) => slot,
            (None, Some(slot)) => match (record.num, self.num_at(slot)) {
                (Some(new_num), Some(held_by)) if new_num != held_by => {
                    self.release_id(slot);
                    self.slots.push(None);
                    self.slots.len() - 1
                }
                _ => slot,
            },
            (Some(a), Some(b)) if a == b => a,
            (Some(keep), Some(other)) => {
                self.reconcile(keep, other);
                keep
            }
        };

        let entry = self.slots[slot].get_or_insert_with(NodeRecord::default);
        let previous_id = entry.id.clone();
        entry.merge(record);

        if let Some(num) = entry.num {
            self.by_num.insert(num, slot);
        }
        if let Some(id) = &entry.id {
            if let Some(old) = previous_id.filter(|old| old != id)
                && self.by_id.get(&old) == Some(&slot)
            {
                self.by_id.remove(&old);
            }
            self.by_id.insert(id.clone(), slot);
        }

        Some(entry.clone())
    }

    /// The hex id in an update already belongs to the record in `other`
    /// while the node number resolves to `keep`.
    fn reconcile(&mut self, keep: usize, other: usize) {
        let Some(mut orphan) = self.slots[other].take() else {
            return;
        };

        if orphan.num.is_some() {
            self.slots[other] = Some(orphan);
            self.release_id(other);
            return;
        }

        // Hex-only record of the same node, fold it in
        if let Some(kept) = self.slots[keep].as_mut() {
            kept.fill_missing(orphan);
        }
    }

    fn num_at(&self, slot: usize) -> Option<u32> {
        self.slots.get(slot)?.as_ref()?.num
    }

    /// A different physical node now claims this slot's hex id; the slot
    /// keeps its record but loses the id.
    fn release_id(&mut self, slot: usize) {
        let Some(id) = self.slots[slot].as_mut().and_then(|r| r.id.take()) else {
            return;
        };
        if self.by_id.get(&id) == Some(&slot) {
            self.by_id.remove(&id);
        }
        debug!("Hex id {id} moved away from node slot {slot}");
    }

    /// All records in stable insertion order
    pub fn all(&self) -> impl Iterator<Item = &NodeRecord> {
        self.slots.iter().flatten()
    }

    /// `"{long name} ({hex id})"` for a known, named node; otherwise
    /// `"Unknown ({identifier})"`.
    pub fn display_name(&self, key: &NodeKey) -> String {
        match self.get(key) {
            Some(NodeRecord {
                long_name: Some(name),
                id,
                ..
            }) => match id {
                Some(id) => format!("{name} ({id})"),
                None => format!("{name} ({key})"),
            },
            _ => format!("Unknown ({key})"),
        }
    }
}
