//! Persistence gateway for chat history and the node database.

mod json;
mod memory;

use anyhow::Result;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::message::{MessageRecord, Role};
use crate::node::NodeRecord;

pub use json::JsonFileStore;
pub use memory::MemoryStore;

/// Save/load interface the session writes through.
///
/// Calls are synchronous; the session moves them off the async runtime.
pub trait Store: Send + Sync + 'static {
    fn save_message(&self, sender_id: &str, role: Role, payload: &str, channel: u32)
    -> Result<()>;

    fn save_node(&self, node: &NodeRecord) -> Result<()>;

    /// Every stored node keyed by its storage key
    fn load_all_nodes(&self) -> Result<BTreeMap<String, NodeRecord>>;

    /// Chat history in the order it was saved
    fn load_messages(&self) -> Result<Vec<MessageRecord>>;

    /// Stored nodes ordered by storage key
    fn load_nodes(&self) -> Result<Vec<NodeRecord>> {
        Ok(self.load_all_nodes()?.into_values().collect())
    }
}

/// Everything a store holds, in the shape written to disk
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub(crate) struct StoreDocument {
    #[serde(default)]
    pub messages: Vec<MessageRecord>,
    #[serde(default)]
    pub nodes: BTreeMap<String, NodeRecord>,
}

impl StoreDocument {
    pub fn push_message(&mut self, sender_id: &str, role: Role, payload: &str, channel: u32) {
        self.messages.push(MessageRecord {
            sender_id: sender_id.to_string(),
            role,
            payload: payload.to_string(),
            channel,
            timestamp: Utc::now(),
        });
    }

    /// Insert or replace a node, dropping older entries of the same node
    /// stored under a different key (e.g. hex id before the number was known).
    pub fn put_node(&mut self, node: &NodeRecord) -> Result<()> {
        let key = node
            .storage_key()
            .ok_or_else(|| anyhow::anyhow!("Node record has neither number nor hex id"))?;

        self.nodes
            .retain(|existing_key, existing| *existing_key == key || !existing.same_node(node));

        // A hex id belongs to one node; another numbered node holding it loses it
        if node.id.is_some() {
            for (existing_key, existing) in self.nodes.iter_mut() {
                if *existing_key != key && existing.id == node.id {
                    existing.id = None;
                }
            }
        }

        self.nodes.insert(key, node.clone());
        Ok(())
    }
}
