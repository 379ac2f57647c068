//! 幂等存储 - 记录哪些审计事件已经处理过
//!
//! 每条记录以事件 ID 为键，文档内容为 `{timestamp, action}`。
//! 只需要两个操作：按键读取、按键创建或覆盖。

pub mod credentials;
pub mod file;
pub mod firestore;
pub mod memory;

use anyhow::Result;
use serde::{Deserialize, Serialize};

use crate::config::StoreSettings;
use crate::github::event::AuditEvent;
use crate::notification::format_timestamp;

pub use credentials::{ServiceAccountKey, TokenProvider};
pub use file::JsonFileStore;
pub use firestore::FirestoreStore;
pub use memory::MemoryStore;

/// 存储中的文档
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredDocument {
    /// 可读时间戳（与告警头部相同的格式）
    pub timestamp: String,
    /// 事件类型
    pub action: String,
}

/// 已处理记录 `(id, timestamp, action)`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProcessedRecord {
    pub id: String,
    pub timestamp: String,
    pub action: String,
}

impl ProcessedRecord {
    pub fn new(id: impl Into<String>, timestamp: impl Into<String>, action: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            timestamp: timestamp.into(),
            action: action.into(),
        }
    }

    pub fn from_event(event: &AuditEvent) -> Self {
        Self::new(&event.id, format_timestamp(&event.occurred_at), &event.kind)
    }

    pub fn document(&self) -> StoredDocument {
        StoredDocument {
            timestamp: self.timestamp.clone(),
            action: self.action.clone(),
        }
    }

    /// 文档是否与本记录完全一致
    pub fn matches(&self, document: &StoredDocument) -> bool {
        document.timestamp == self.timestamp && document.action == self.action
    }
}

/// 幂等存储 trait
///
/// `get` 对"不存在"返回 `Ok(None)`，其他错误一律返回 `Err`，由调用方终止运行。
pub trait IdempotencyStore: Send + Sync {
    /// 后端名称（用于日志）
    fn name(&self) -> &str;

    /// 按事件 ID 读取文档
    fn get(&self, id: &str) -> Result<Option<StoredDocument>>;

    /// 创建或覆盖文档
    fn put(&self, id: &str, document: &StoredDocument) -> Result<()>;

    /// 是否已存在 ID、时间戳、类型都相同的记录
    fn exists(&self, record: &ProcessedRecord) -> Result<bool> {
        Ok(self
            .get(&record.id)?
            .map(|doc| record.matches(&doc))
            .unwrap_or(false))
    }

    /// 记录为已处理
    fn save(&self, record: &ProcessedRecord) -> Result<()> {
        self.put(&record.id, &record.document())
    }
}

/// 按配置打开存储后端
pub fn open(settings: &StoreSettings) -> Result<Box<dyn IdempotencyStore>> {
    match settings {
        StoreSettings::File { path } => Ok(Box::new(JsonFileStore::open(path)?)),
        StoreSettings::Firestore(fs) => Ok(Box::new(FirestoreStore::new(fs.clone())?)),
        StoreSettings::Memory => Ok(Box::new(MemoryStore::new())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::github::event::RawAuditNode;

    #[test]
    fn test_record_from_event() {
        let event = AuditEvent::from_node(RawAuditNode {
            id: "AE_1".to_string(),
            action: Some("repo.create".to_string()),
            created_at: Some("2020-03-02T10:15:00Z".to_string()),
            ..Default::default()
        })
        .unwrap();

        let record = ProcessedRecord::from_event(&event);
        assert_eq!(record.id, "AE_1");
        assert_eq!(record.timestamp, "Monday 02 Mar 2020 10:15:00 UTC");
        assert_eq!(record.action, "repo.create");
    }

    #[test]
    fn test_exists_requires_full_match() {
        let store = MemoryStore::new();
        let record = ProcessedRecord::new("AE_1", "Monday 02 Mar 2020 10:15:00 UTC", "repo.create");
        assert!(!store.exists(&record).unwrap());

        store.save(&record).unwrap();
        assert!(store.exists(&record).unwrap());

        // 同 ID 但类型不同视为未处理
        let other_kind = ProcessedRecord::new(&record.id, &record.timestamp, "repo.destroy");
        assert!(!store.exists(&other_kind).unwrap());

        let other_time = ProcessedRecord::new(&record.id, "Tuesday 03 Mar 2020 10:15:00 UTC", &record.action);
        assert!(!store.exists(&other_time).unwrap());
    }

    #[test]
    fn test_save_overwrites() {
        let store = MemoryStore::new();
        let first = ProcessedRecord::new("AE_1", "t1", "repo.create");
        let second = ProcessedRecord::new("AE_1", "t2", "repo.create");
        store.save(&first).unwrap();
        store.save(&second).unwrap();
        assert_eq!(store.get("AE_1").unwrap(), Some(second.document()));
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_open_memory_backend() {
        let store = open(&StoreSettings::Memory).unwrap();
        assert_eq!(store.name(), "memory");
    }

    #[test]
    fn test_open_file_backend() {
        let dir = tempfile::tempdir().unwrap();
        let store = open(&StoreSettings::File {
            path: dir.path().join("processed.json"),
        })
        .unwrap();
        assert_eq!(store.name(), "file");
    }
}
