//! 流水线终止错误

use thiserror::Error;

/// 终止本次运行的错误
///
/// 底层原因保留为 `anyhow::Error`，显示时带完整上下文链。
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("failed to fetch audit log for {organisation}: {cause:#}")]
    Fetch {
        organisation: String,
        cause: anyhow::Error,
    },

    #[error("idempotency store failure for event {id}: {cause:#}")]
    Store { id: String, cause: anyhow::Error },

    #[error("failed to deliver alert for event {id} after {attempts} attempt(s): {cause:#}")]
    Delivery {
        id: String,
        attempts: u32,
        cause: anyhow::Error,
    },
}

impl PipelineError {
    /// 简短、稳定的错误类别
    pub fn kind(&self) -> &'static str {
        match self {
            PipelineError::Fetch { .. } => "fetch",
            PipelineError::Store { .. } => "store",
            PipelineError::Delivery { .. } => "delivery",
        }
    }

    /// 相关事件 ID（拉取错误没有）
    pub fn event_id(&self) -> Option<&str> {
        match self {
            PipelineError::Fetch { .. } => None,
            PipelineError::Store { id, .. } | PipelineError::Delivery { id, .. } => Some(id),
        }
    }
}
