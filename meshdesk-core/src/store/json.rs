use anyhow::{Context, Result, anyhow};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};
use tracing::{debug, info};

use super::{Store, StoreDocument};
use crate::message::{MessageRecord, Role};
use crate::node::NodeRecord;

/// Store backed by a single JSON document on disk.
///
/// The whole document is kept in memory and rewritten through a temp file
/// plus rename after every save, so a crash never leaves a torn file.
#[derive(Debug)]
pub struct JsonFileStore {
    path: PathBuf,
    doc: Mutex<StoreDocument>,
}

impl JsonFileStore {
    /// Open the store at `path`, creating parent directories as needed.
    /// A missing file starts an empty store.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create {}", parent.display()))?;
        }

        let doc = if path.exists() {
            let raw = fs::read_to_string(&path)
                .with_context(|| format!("Failed to read {}", path.display()))?;
            serde_json::from_str(&raw)
                .with_context(|| format!("Failed to parse {}", path.display()))?
        } else {
            StoreDocument::default()
        };

        info!(
            "Opened store at {} ({} messages, {} nodes)",
            path.display(),
            doc.messages.len(),
            doc.nodes.len()
        );

        Ok(Self {
            path,
            doc: Mutex::new(doc),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn doc(&self) -> Result<MutexGuard<'_, StoreDocument>> {
        self.doc.lock().map_err(|_| anyhow!("JSON store lock poisoned"))
    }

    fn flush(&self, doc: &StoreDocument) -> Result<()> {
        let tmp = self.path.with_extension("json.tmp");
        let raw = serde_json::to_vec_pretty(doc).context("Failed to serialize store")?;
        fs::write(&tmp, raw).with_context(|| format!("Failed to write {}", tmp.display()))?;
        fs::rename(&tmp, &self.path)
            .with_context(|| format!("Failed to replace {}", self.path.display()))?;
        debug!("Flushed store to {}", self.path.display());
        Ok(())
    }
}

impl Store for JsonFileStore {
    fn save_message(
        &self,
        sender_id: &str,
        role: Role,
        payload: &str,
        channel: u32,
    ) -> Result<()> {
        let mut doc = self.doc()?;
        doc.push_message(sender_id, role, payload, channel);
        self.flush(&doc)
    }

    fn save_node(&self, node: &NodeRecord) -> Result<()> {
        let mut doc = self.doc()?;
        doc.put_node(node)?;
        self.flush(&doc)
    }

    fn load_all_nodes(&self) -> Result<BTreeMap<String, NodeRecord>> {
        Ok(self.doc()?.nodes.clone())
    }

    fn load_messages(&self) -> Result<Vec<MessageRecord>> {
        Ok(self.doc()?.messages.clone())
    }
}
