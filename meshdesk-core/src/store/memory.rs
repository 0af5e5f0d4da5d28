use anyhow::{Result, anyhow};
use std::collections::BTreeMap;
use std::sync::{Mutex, MutexGuard};

use super::{Store, StoreDocument};
use crate::message::{MessageRecord, Role};
use crate::node::NodeRecord;

/// Store that keeps everything in process memory
#[derive(Debug, Default)]
pub struct MemoryStore {
    doc: Mutex<StoreDocument>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start from a set of known nodes
    pub fn with_nodes(nodes: impl IntoIterator<Item = NodeRecord>) -> Result<Self> {
        let mut doc = StoreDocument::default();
        for node in nodes {
            doc.put_node(&node)?;
        }
        Ok(Self {
            doc: Mutex::new(doc),
        })
    }

    fn doc(&self) -> Result<MutexGuard<'_, StoreDocument>> {
        self.doc.lock().map_err(|_| anyhow!("Memory store lock poisoned"))
    }
}

impl Store for MemoryStore {
    fn save_message(
        &self,
        sender_id: &str,
        role: Role,
        payload: &str,
        channel: u32,
    ) -> Result<()> {
        self.doc()?.push_message(sender_id, role, payload, channel);
        Ok(())
    }

    fn save_node(&self, node: &NodeRecord) -> Result<()> {
        self.doc()?.put_node(node)
    }

    fn load_all_nodes(&self) -> Result<BTreeMap<String, NodeRecord>> {
        Ok(self.doc()?.nodes.clone())
    }

    fn load_messages(&self) -> Result<Vec<MessageRecord>> {
        Ok(self.doc()?.messages.clone())
    }
}
