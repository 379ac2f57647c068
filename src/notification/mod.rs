//! 告警层 - 格式化审计事件并投递到聊天渠道
//!
//! # 组成
//! 1. `formatter`：事件 → 告警文本（或不发告警的原因）
//! 2. `channel`：渠道 trait，所有投递目标实现 `AlertChannel`
//! 3. `slack`：Slack Incoming Webhook 渠道
//! 4. `throttle`：投递前固定暂停与重试策略
//!
//! # 使用示例
//! ```ignore
//! use github_auditor::notification::{AlertFormatter, AlertMessage, AlertChannel};
//!
//! if let Some(text) = AlertFormatter::new().format(&event) {
//!     channel.send(&AlertMessage::new(text, &event.id, &event.kind))?;
//! }
//! ```

pub mod channel;
pub mod formatter;
pub mod slack;
pub mod throttle;

pub use channel::{AlertChannel, AlertMessage, SendResult};
pub use formatter::{actor_label, format_timestamp, Alert, AlertFormatter, Classification, SuppressReason};
pub use slack::{SlackPayload, SlackWebhookChannel};
pub use throttle::{RateLimiter, RetryPolicy, DEFAULT_RETRY_DELAY};
