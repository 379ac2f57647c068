//! 告警渠道 trait 定义

use anyhow::Result;
use serde::{Deserialize, Serialize};

/// 一条待发送的告警
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AlertMessage {
    /// 完整文本（已带时间戳）
    pub text: String,
    /// 来源审计事件 ID
    pub event_id: String,
    /// 事件类型
    pub kind: String,
}

impl AlertMessage {
    pub fn new(text: impl Into<String>, event_id: impl Into<String>, kind: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            event_id: event_id.into(),
            kind: kind.into(),
        }
    }
}

/// 发送结果
#[derive(Debug, Clone, PartialEq)]
pub enum SendResult {
    /// 发送成功
    Sent,
    /// 渠道拒绝（如 4xx/5xx），附原因
    Failed(String),
}

impl SendResult {
    pub fn is_sent(&self) -> bool {
        matches!(self, SendResult::Sent)
    }
}

/// 告警渠道 trait
///
/// `Err` 表示传输层错误（连接失败等），`Ok(Failed)` 表示渠道明确拒绝；
/// 两者对流水线都是投递失败。
pub trait AlertChannel: Send + Sync {
    /// 渠道名称（用于日志）
    fn name(&self) -> &str;

    /// 同步发送
    fn send(&self, message: &AlertMessage) -> Result<SendResult>;
}
