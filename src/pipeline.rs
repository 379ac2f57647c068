//! 投递流水线
//!
//! 逐条处理拉取到的事件，一条事件完整走完后才处理下一条：
//!
//! ```text
//! 分类 ──┬─ 不发告警（未知类型 / 空变更）──────────────┐
//!        └─ 有告警 ── 已处理？──┬─ 是：重复 ──────────────┤
//!                              └─ 否：限速 → 发送(重试) ─┴─ 记录为已处理
//! ```
//!
//! 记录总在发送成功之后；记录失败立即终止运行。
//! 模板参数取不到的事件既不发送也不记录，修复后的下一次运行会重新处理。

use serde::Serialize;
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::error::PipelineError;
use crate::github::auditlog::{fetch_all, AuditLogSource};
use crate::github::event::AuditEvent;
use crate::notification::{
    Alert, AlertChannel, AlertFormatter, AlertMessage, Classification, RateLimiter, RetryPolicy,
    SendResult, SuppressReason,
};
use crate::store::{IdempotencyStore, ProcessedRecord};

/// 单条事件的处理结果
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EventOutcome {
    /// 已发送告警
    Delivered,
    /// 之前的运行已处理过
    Duplicate,
    /// 不发告警
    Suppressed(SuppressReason),
}

/// 一次运行的统计
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct RunSummary {
    pub processed: usize,
    pub delivered: usize,
    pub duplicates: usize,
    pub suppressed: usize,
    pub unknown: usize,
}

impl RunSummary {
    fn record(&mut self, outcome: &EventOutcome) {
        self.processed += 1;
        match outcome {
            EventOutcome::Delivered => self.delivered += 1,
            EventOutcome::Duplicate => self.duplicates += 1,
            EventOutcome::Suppressed(SuppressReason::UnknownKind) => self.unknown += 1,
            EventOutcome::Suppressed(_) => self.suppressed += 1,
        }
    }
}

/// 发送前对每条待投递事件调用一次
pub type DeliveryHook<'a> = Box<dyn Fn(&AuditEvent) + 'a>;

/// 投递流水线
pub struct DeliveryPipeline<'a> {
    store: &'a dyn IdempotencyStore,
    channel: &'a dyn AlertChannel,
    limiter: RateLimiter,
    retry: RetryPolicy,
    formatter: AlertFormatter,
    on_deliver: Option<DeliveryHook<'a>>,
}

impl<'a> DeliveryPipeline<'a> {
    /// 默认 5 秒限速，失败不重试
    pub fn new(store: &'a dyn IdempotencyStore, channel: &'a dyn AlertChannel) -> Self {
        Self {
            store,
            channel,
            limiter: RateLimiter::default(),
            retry: RetryPolicy::default(),
            formatter: AlertFormatter::new(),
            on_deliver: None,
        }
    }

    pub fn with_rate_limiter(mut self, limiter: RateLimiter) -> Self {
        self.limiter = limiter;
        self
    }

    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// 每条事件首次发送前回调（例如逐条输出导出记录）
    pub fn with_delivery_hook(mut self, hook: impl Fn(&AuditEvent) + 'a) -> Self {
        self.on_deliver = Some(Box::new(hook));
        self
    }

    pub fn rate_limiter(&self) -> &RateLimiter {
        &self.limiter
    }

    /// 按顺序处理全部事件，遇到终止错误立即返回
    pub fn run(&self, events: &[AuditEvent]) -> Result<RunSummary, PipelineError> {
        let mut summary = RunSummary::default();
        for event in events {
            let outcome = self.process_event(event)?;
            summary.record(&outcome);
        }

        info!(
            processed = summary.processed,
            delivered = summary.delivered,
            duplicates = summary.duplicates,
            suppressed = summary.suppressed,
            unknown = summary.unknown,
            "Audit run complete"
        );
        Ok(summary)
    }

    /// 处理单条事件（分类 → 去重 → 发送 → 记录）
    pub fn process_event(&self, event: &AuditEvent) -> Result<EventOutcome, PipelineError> {
        let record = ProcessedRecord::from_event(event);

        let outcome = match self.formatter.classify(event) {
            Classification::Suppressed(reason @ SuppressReason::Unresolvable(_)) => {
                warn!(id = %event.id, kind = %event.kind, "Event left unrecorded");
                return Ok(EventOutcome::Suppressed(reason));
            }
            Classification::Suppressed(reason) => {
                if reason == SuppressReason::UnknownKind {
                    warn!(id = %event.id, kind = %event.kind, "Unknown audit event kind");
                } else {
                    debug!(id = %event.id, kind = %event.kind, reason = ?reason, "Alert suppressed");
                }
                EventOutcome::Suppressed(reason)
            }
            Classification::Alert(alert) => {
                let seen = self
                    .store
                    .exists(&record)
                    .map_err(|cause| PipelineError::Store {
                        id: event.id.clone(),
                        cause,
                    })?;

                if seen {
                    debug!(id = %event.id, kind = %event.kind, "Already processed");
                    EventOutcome::Duplicate
                } else {
                    self.deliver(event, &alert)?;
                    info!(
                        id = %event.id,
                        kind = %event.kind,
                        channel = %self.channel.name(),
                        "Alert delivered"
                    );
                    EventOutcome::Delivered
                }
            }
        };

        self.store
            .save(&record)
            .map_err(|cause| PipelineError::Store {
                id: event.id.clone(),
                cause,
            })?;

        Ok(outcome)
    }

    /// 发送告警；每次尝试前限速，重试全部发生在记录之前
    fn deliver(&self, event: &AuditEvent, alert: &Alert) -> Result<(), PipelineError> {
        let message = AlertMessage::new(alert.text(), &event.id, &event.kind);
        if let Some(hook) = &self.on_deliver {
            hook(event);
        }
        let mut attempt = 0;

        loop {
            attempt += 1;
            self.limiter.wait();

            let failure = match self.channel.send(&message) {
                Ok(SendResult::Sent) => return Ok(()),
                Ok(SendResult::Failed(reason)) => anyhow::anyhow!(reason),
                Err(e) => e,
            };

            if !self.retry.should_retry(attempt) {
                return Err(PipelineError::Delivery {
                    id: event.id.clone(),
                    attempts: attempt,
                    cause: failure,
                });
            }

            let delay = self.retry.delay_after(attempt);
            warn!(
                id = %event.id,
                attempt,
                delay_ms = delay.as_millis() as u64,
                error = %failure,
                "Delivery failed, retrying"
            );
            if delay > Duration::ZERO {
                std::thread::sleep(delay);
            }
        }
    }
}

/// 拉取并处理一次，返回拉取到的全部事件与统计
pub fn run_once<S>(
    source: &S,
    organisation: &str,
    pipeline: &DeliveryPipeline<'_>,
) -> Result<(Vec<AuditEvent>, RunSummary), PipelineError>
where
    S: AuditLogSource + ?Sized,
{
    let events = fetch_all(source, organisation).map_err(|cause| PipelineError::Fetch {
        organisation: organisation.to_string(),
        cause,
    })?;
    let summary = pipeline.run(&events)?;
    Ok((events, summary))
}
