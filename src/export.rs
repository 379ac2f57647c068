//! 扁平导出 - 供 SIEM 采集的 JSON 输出
//!
//! 导出取自收到的原始节点，与线上结构一致，缺失或空字段直接省略。

use anyhow::Result;
use chrono::SecondsFormat;
use serde::Serialize;

use crate::github::event::{Actor, AuditEvent};

/// 一条扁平审计记录（camelCase 键）
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FlatAuditEntry {
    pub id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub action: Option<String>,
    pub created_at: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub actor: Option<Actor>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user: Option<Actor>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub blocked_user: Option<Actor>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub merge_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub oauth_application_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub organization_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub permission: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub permission_was: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub repository_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub team_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub visibility: Option<String>,
}

fn text(value: &Option<String>) -> Option<String> {
    value.clone().filter(|v| !v.is_empty())
}

/// 将事件还原为扁平记录
///
/// 直接取自收到的原始节点：`createdAt` 保留原始精度，
/// 已知类型也不会丢掉模板用不到的字段，未知执行者原样输出。
pub fn flatten(event: &AuditEvent) -> FlatAuditEntry {
    let raw = &event.raw;
    let created_at = match raw.created_at.as_deref().filter(|c| !c.is_empty()) {
        Some(created_at) => created_at.to_string(),
        None => event.occurred_at.to_rfc3339_opts(SecondsFormat::AutoSi, true),
    };

    FlatAuditEntry {
        id: event.id.clone(),
        action: text(&raw.action),
        created_at,
        actor: raw.actor.clone(),
        user: raw.user.clone(),
        blocked_user: raw.blocked_user.clone(),
        email: text(&raw.email),
        merge_type: text(&raw.merge_type),
        oauth_application_name: text(&raw.oauth_application_name),
        organization_name: text(&raw.organization_name),
        permission: text(&raw.permission),
        permission_was: text(&raw.permission_was),
        repository_name: text(&raw.repository_name),
        team_name: text(&raw.team_name),
        visibility: text(&raw.visibility),
    }
}

impl From<&AuditEvent> for FlatAuditEntry {
    fn from(event: &AuditEvent) -> Self {
        flatten(event)
    }
}

/// 单条事件的紧凑 JSON（投递前逐条输出）
pub fn to_json_line(event: &AuditEvent) -> Result<String> {
    Ok(serde_json::to_string(&flatten(event))?)
}

/// 导出为格式化 JSON 数组
pub fn to_json_pretty(events: &[AuditEvent]) -> Result<String> {
    let entries: Vec<FlatAuditEntry> = events.iter().map(flatten).collect();
    Ok(serde_json::to_string_pretty(&entries)?)
}
