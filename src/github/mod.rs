//! GitHub 组织审计日志
//!
//! - `event`：审计事件数据模型（线上扁平节点与按形状解码后的变体）
//! - `auditlog`：GraphQL 查询、分页结构与 `fetch_all`
//! - `client`：GraphQL 传输层

pub mod auditlog;
pub mod client;
pub mod event;

pub use auditlog::{fetch_all, AuditLogPage, AuditLogSource, PageInfo, PAGE_SIZE};
pub use client::GitHubClient;
pub use event::{Actor, AuditEvent, EventDetails, Invitee, RawAuditNode};
