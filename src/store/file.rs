//! 本地 JSON 文件存储
//!
//! 整个存储是一个 `{id: {timestamp, action}}` 的 JSON 对象。
//! 读写都持有旁路 `.lock` 文件的独占锁；写入先写临时文件再原子替换。

use anyhow::{anyhow, Context, Result};
use fs2::FileExt;
use std::collections::BTreeMap;
use std::fs::{self, File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tracing::debug;

use super::{IdempotencyStore, StoredDocument};
use crate::config::config_dir;

type Documents = BTreeMap<String, StoredDocument>;

/// JSON 文件存储
#[derive(Debug)]
pub struct JsonFileStore {
    path: PathBuf,
    /// 打开时载入的内容，之后随写入同步
    cache: Mutex<Documents>,
}

impl JsonFileStore {
    /// 默认路径 `~/.config/github-auditor/processed.json`
    pub fn default_path() -> PathBuf {
        config_dir().join("processed.json")
    }

    /// 打开存储（文件不存在时视为空）
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)
                    .with_context(|| format!("Failed to create {}", parent.display()))?;
            }
        }

        let documents = {
            let _lock = Self::lock(&path)?;
            Self::read(&path)?
        };
        debug!(path = %path.display(), records = documents.len(), "Opened file store");

        Ok(Self {
            path,
            cache: Mutex::new(documents),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn lock_path(path: &Path) -> PathBuf {
        path.with_extension("lock")
    }

    /// 获取独占锁，返回值析构时释放
    fn lock(path: &Path) -> Result<File> {
        let lock_path = Self::lock_path(path);
        let file = OpenOptions::new()
            .create(true)
            .write(true)
            .open(&lock_path)
            .with_context(|| format!("Failed to open lock file {}", lock_path.display()))?;
        file.lock_exclusive()
            .with_context(|| format!("Failed to lock {}", lock_path.display()))?;
        Ok(file)
    }

    fn read(path: &Path) -> Result<Documents> {
        if !path.exists() {
            return Ok(Documents::new());
        }
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        if content.trim().is_empty() {
            return Ok(Documents::new());
        }
        serde_json::from_str(&content)
            .with_context(|| format!("Corrupt store file {}", path.display()))
    }

    fn write(path: &Path, documents: &Documents) -> Result<()> {
        let temp_path = path.with_extension("tmp");
        {
            let mut temp_file = File::create(&temp_path)
                .with_context(|| format!("Failed to create {}", temp_path.display()))?;
            temp_file.write_all(serde_json::to_string_pretty(documents)?.as_bytes())?;
            temp_file.sync_all()?;
        }
        fs::rename(&temp_path, path)
            .with_context(|| format!("Failed to replace {}", path.display()))?;
        Ok(())
    }
}

impl IdempotencyStore for JsonFileStore {
    fn name(&self) -> &str {
        "file"
    }

    fn get(&self, id: &str) -> Result<Option<StoredDocument>> {
        let cache = self
            .cache
            .lock()
            .map_err(|_| anyhow!("file store cache lock poisoned"))?;
        Ok(cache.get(id).cloned())
    }

    fn put(&self, id: &str, document: &StoredDocument) -> Result<()> {
        let mut cache = self
            .cache
            .lock()
            .map_err(|_| anyhow!("file store cache lock poisoned"))?;

        // 内容未变时不重写文件
        if cache.get(id) == Some(document) {
            return Ok(());
        }

        let lock = Self::lock(&self.path)?;
        let mut documents = Self::read(&self.path)?;
        documents.insert(id.to_string(), document.clone());
        Self::write(&self.path, &documents)?;
        lock.unlock()?;

        *cache = documents;
        Ok(())
    }
}
