//! 内存存储（测试与演练用）

use anyhow::{anyhow, Result};
use std::collections::HashMap;
use std::sync::Mutex;

use super::{IdempotencyStore, StoredDocument};

#[derive(Debug, Default)]
pub struct MemoryStore {
    documents: Mutex<HashMap<String, StoredDocument>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.documents.lock().map(|docs| docs.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl IdempotencyStore for MemoryStore {
    fn name(&self) -> &str {
        "memory"
    }

    fn get(&self, id: &str) -> Result<Option<StoredDocument>> {
        let docs = self
            .documents
            .lock()
            .map_err(|_| anyhow!("memory store lock poisoned"))?;
        Ok(docs.get(id).cloned())
    }

    fn put(&self, id: &str, document: &StoredDocument) -> Result<()> {
        let mut docs = self
            .documents
            .lock()
            .map_err(|_| anyhow!("memory store lock poisoned"))?;
        docs.insert(id.to_string(), document.clone());
        Ok(())
    }
}
