//! 运行配置
//!
//! 加载顺序（后者覆盖前者）：
//! 1. 内置默认值
//! 2. JSON 配置文件（`--config` 指定，否则 `~/.config/github-auditor/config.json`，不存在则跳过）
//! 3. 环境变量（`main` 会先用 dotenvy 加载 `.env`）
//!
//! 环境变量沿用既有部署的命名：`GITHUB_TOKEN`、`GITHUB_ORG_NAME`、
//! `SLACK_WEBHOOK`、`SLACK_ALERTS_CHANNEL`、`FIRESTORE_PROJECT`、`FIRESTORE_CREDENTIALS` 等。

use anyhow::{anyhow, Context, Result};
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;
use tracing::debug;

/// GitHub GraphQL 端点
pub const DEFAULT_GRAPHQL_URL: &str = "https://api.github.com/graphql";

/// Firestore REST 端点
pub const DEFAULT_FIRESTORE_URL: &str = "https://firestore.googleapis.com/v1";

/// Firestore 集合名
pub const DEFAULT_COLLECTION: &str = "github-auditor";

pub const DEFAULT_SLACK_USERNAME: &str = "GitHub Auditor Bot";
pub const DEFAULT_SLACK_ICON: &str = ":github:";

/// 投递间隔（秒）
pub const DEFAULT_RATE_LIMIT_SECS: u64 = 5;

/// HTTP 超时（秒）
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// 配置目录 `~/.config/github-auditor`
pub fn config_dir() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".config")
        .join("github-auditor")
}

/// 幂等存储后端
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StoreBackend {
    File,
    Firestore,
    Memory,
}

impl FromStr for StoreBackend {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "file" => Ok(StoreBackend::File),
            "firestore" => Ok(StoreBackend::Firestore),
            "memory" => Ok(StoreBackend::Memory),
            other => Err(anyhow!(
                "Unknown store backend '{}' (expected file, firestore or memory)",
                other
            )),
        }
    }
}

/// 配置文件内容（所有字段可选）
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct FileConfig {
    pub github_token: Option<String>,
    pub organisation: Option<String>,
    pub graphql_url: Option<String>,
    pub slack_webhook: Option<String>,
    pub slack_channel: Option<String>,
    pub slack_username: Option<String>,
    pub slack_icon: Option<String>,
    pub store: Option<StoreBackend>,
    pub store_path: Option<PathBuf>,
    pub firestore_project: Option<String>,
    pub firestore_token: Option<String>,
    pub firestore_credentials: Option<PathBuf>,
    pub firestore_url: Option<String>,
    pub firestore_collection: Option<String>,
    pub rate_limit_secs: Option<u64>,
    pub delivery_attempts: Option<u32>,
    pub timeout_secs: Option<u64>,
}

/// GitHub 连接配置
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GitHubSettings {
    pub token: String,
    pub organisation: String,
    pub graphql_url: String,
    pub timeout_secs: u64,
}

/// Slack 投递配置
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SlackSettings {
    pub webhook_url: String,
    pub channel: String,
    pub username: String,
    pub icon_emoji: String,
    pub timeout_secs: u64,
}

impl Default for SlackSettings {
    fn default() -> Self {
        Self {
            webhook_url: String::new(),
            channel: String::new(),
            username: DEFAULT_SLACK_USERNAME.to_string(),
            icon_emoji: DEFAULT_SLACK_ICON.to_string(),
            timeout_secs: DEFAULT_TIMEOUT_SECS,
        }
    }
}

/// Firestore 认证方式
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FirestoreAuth {
    /// 现成的 OAuth 访问令牌
    AccessToken(String),
    /// 服务账号 JSON 密钥文件路径，运行时换取访问令牌
    ServiceAccountFile(PathBuf),
}

/// Firestore 配置
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FirestoreSettings {
    pub base_url: String,
    pub project: String,
    pub collection: String,
    pub auth: FirestoreAuth,
    pub timeout_secs: u64,
}

/// 幂等存储配置
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreSettings {
    File { path: PathBuf },
    Firestore(FirestoreSettings),
    Memory,
}

/// 投递节奏配置
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeliverySettings {
    pub pause: Duration,
    pub max_attempts: u32,
}

/// 合并后的完整配置
///
/// 各 `*_settings` 方法在需要时才校验必填项，`fetch` 命令只需要 GitHub 部分。
#[derive(Debug, Clone, Default)]
pub struct AuditorConfig {
    values: FileConfig,
}

impl AuditorConfig {
    /// 从配置文件和进程环境加载
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let file = match path {
            Some(path) => Self::read_file(path)?,
            None => {
                let default_path = config_dir().join("config.json");
                if default_path.exists() {
                    Self::read_file(&default_path)?
                } else {
                    FileConfig::default()
                }
            }
        };

        Self::from_lookup(file, |name| std::env::var(name).ok())
    }

    /// 读取 JSON 配置文件
    pub fn read_file(path: &Path) -> Result<FileConfig> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        let config: FileConfig = serde_json::from_str(&content)
            .with_context(|| format!("Invalid config file {}", path.display()))?;
        debug!(path = %path.display(), "Loaded config file");
        Ok(config)
    }

    /// 用环境查找函数覆盖文件配置（空值视为未设置）
    pub fn from_lookup<F>(file: FileConfig, lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());
        let mut values = file;

        let overlay = |slot: &mut Option<String>, name: &str| {
            if let Some(v) = get(name) {
                *slot = Some(v);
            }
        };
        overlay(&mut values.github_token, "GITHUB_TOKEN");
        overlay(&mut values.organisation, "GITHUB_ORG_NAME");
        overlay(&mut values.graphql_url, "GITHUB_GRAPHQL_URL");
        overlay(&mut values.slack_webhook, "SLACK_WEBHOOK");
        overlay(&mut values.slack_channel, "SLACK_ALERTS_CHANNEL");
        overlay(&mut values.firestore_project, "FIRESTORE_PROJECT");
        overlay(&mut values.firestore_token, "FIRESTORE_ACCESS_TOKEN");

        if let Some(v) = get("FIRESTORE_CREDENTIALS") {
            values.firestore_credentials = Some(PathBuf::from(v));
        }
        if let Some(v) = get("AUDITOR_STORE") {
            values.store = Some(v.parse()?);
        }
        if let Some(v) = get("AUDITOR_STORE_PATH") {
            values.store_path = Some(PathBuf::from(v));
        }
        if let Some(v) = get("AUDITOR_RATE_LIMIT_SECS") {
            values.rate_limit_secs = Some(
                v.trim()
                    .parse()
                    .with_context(|| format!("Invalid AUDITOR_RATE_LIMIT_SECS '{}'", v))?,
            );
        }
        if let Some(v) = get("AUDITOR_DELIVERY_ATTEMPTS") {
            values.delivery_attempts = Some(
                v.trim()
                    .parse()
                    .with_context(|| format!("Invalid AUDITOR_DELIVERY_ATTEMPTS '{}'", v))?,
            );
        }

        Ok(Self { values })
    }

    fn timeout_secs(&self) -> u64 {
        self.values.timeout_secs.unwrap_or(DEFAULT_TIMEOUT_SECS)
    }

    pub fn github_settings(&self) -> Result<GitHubSettings> {
        Ok(GitHubSettings {
            token: required(&self.values.github_token, "GITHUB_TOKEN")?,
            organisation: required(&self.values.organisation, "GITHUB_ORG_NAME")?,
            graphql_url: self
                .values
                .graphql_url
                .clone()
                .unwrap_or_else(|| DEFAULT_GRAPHQL_URL.to_string()),
            timeout_secs: self.timeout_secs(),
        })
    }

    pub fn slack_settings(&self) -> Result<SlackSettings> {
        Ok(SlackSettings {
            webhook_url: required(&self.values.slack_webhook, "SLACK_WEBHOOK")?,
            channel: required(&self.values.slack_channel, "SLACK_ALERTS_CHANNEL")?,
            username: self
                .values
                .slack_username
                .clone()
                .unwrap_or_else(|| DEFAULT_SLACK_USERNAME.to_string()),
            icon_emoji: self
                .values
                .slack_icon
                .clone()
                .unwrap_or_else(|| DEFAULT_SLACK_ICON.to_string()),
            timeout_secs: self.timeout_secs(),
        })
    }

    /// 存储后端：显式配置优先，否则有 Firestore 项目或凭据时用 Firestore，再否则用本地文件
    pub fn store_settings(&self) -> Result<StoreSettings> {
        let backend = match self.values.store {
            Some(backend) => backend,
            None if self.values.firestore_project.is_some()
                || self.values.firestore_credentials.is_some() =>
            {
                StoreBackend::Firestore
            }
            None => StoreBackend::File,
        };

        match backend {
            StoreBackend::File => Ok(StoreSettings::File {
                path: self
                    .values
                    .store_path
                    .clone()
                    .unwrap_or_else(|| config_dir().join("processed.json")),
            }),
            StoreBackend::Firestore => Ok(StoreSettings::Firestore(FirestoreSettings {
                base_url: self
                    .values
                    .firestore_url
                    .clone()
                    .unwrap_or_else(|| DEFAULT_FIRESTORE_URL.to_string()),
                project: required(&self.values.firestore_project, "FIRESTORE_PROJECT")?,
                collection: self
                    .values
                    .firestore_collection
                    .clone()
                    .unwrap_or_else(|| DEFAULT_COLLECTION.to_string()),
                auth: self.firestore_auth()?,
                timeout_secs: self.timeout_secs(),
            })),
            StoreBackend::Memory => Ok(StoreSettings::Memory),
        }
    }

    /// 访问令牌优先于服务账号密钥
    fn firestore_auth(&self) -> Result<FirestoreAuth> {
        if let Ok(token) = required(&self.values.firestore_token, "FIRESTORE_ACCESS_TOKEN") {
            return Ok(FirestoreAuth::AccessToken(token));
        }
        match &self.values.firestore_credentials {
            Some(path) if !path.as_os_str().is_empty() => {
                Ok(FirestoreAuth::ServiceAccountFile(path.clone()))
            }
            _ => Err(anyhow!("Missing FIRESTORE_CREDENTIALS environment variable")),
        }
    }

    pub fn delivery_settings(&self) -> DeliverySettings {
        DeliverySettings {
            pause: Duration::from_secs(self.values.rate_limit_secs.unwrap_or(DEFAULT_RATE_LIMIT_SECS)),
            max_attempts: self.values.delivery_attempts.unwrap_or(1).max(1),
        }
    }
}

fn required(value: &Option<String>, name: &str) -> Result<String> {
    value
        .clone()
        .filter(|v| !v.trim().is_empty())
        .ok_or_else(|| anyhow!("Missing {} environment variable", name))
}
