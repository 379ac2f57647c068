//! GitHub Auditor - 将组织审计日志转为 Slack 告警，每个事件只告警一次

pub mod cli;
pub mod config;
pub mod error;
pub mod export;
pub mod github;
pub mod notification;
pub mod pipeline;
pub mod store;
pub mod taxonomy;

pub use config::{AuditorConfig, GitHubSettings, SlackSettings, StoreSettings};
pub use error::PipelineError;
pub use export::{flatten, FlatAuditEntry};
pub use github::{fetch_all, Actor, AuditEvent, AuditLogSource, EventDetails, GitHubClient};
pub use notification::{AlertChannel, AlertFormatter, AlertMessage, RateLimiter, RetryPolicy, SendResult};
pub use pipeline::{run_once, DeliveryPipeline, EventOutcome, RunSummary};
pub use store::{IdempotencyStore, JsonFileStore, MemoryStore, ProcessedRecord};
