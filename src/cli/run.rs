//! `github-auditor run` - 拉取审计日志、投递告警、输出 SIEM JSON

use anyhow::Result;
use clap::Args;
use std::path::PathBuf;
use tracing::{info, warn};

use crate::config::AuditorConfig;
use crate::export;
use crate::github::GitHubClient;
use crate::notification::{RateLimiter, RetryPolicy, SlackWebhookChannel, DEFAULT_RETRY_DELAY};
use crate::pipeline::{run_once, DeliveryPipeline};
use crate::store;

/// Run 命令参数
#[derive(Args, Debug)]
pub struct RunArgs {
    /// 配置文件路径（默认 ~/.config/github-auditor/config.json）
    #[arg(long, short)]
    pub config: Option<PathBuf>,

    /// 不向 stdout 输出事件 JSON
    #[arg(long)]
    pub no_export: bool,
}

/// 处理 run 命令
pub fn handle_run(args: RunArgs) -> Result<()> {
    let config = AuditorConfig::load(args.config.as_deref())?;
    let github = config.github_settings()?;
    let slack = config.slack_settings()?;
    let store_settings = config.store_settings()?;
    let delivery = config.delivery_settings();

    let client = GitHubClient::new(&github)?;
    let channel = SlackWebhookChannel::new(slack)?;
    let store = store::open(&store_settings)?;

    info!(
        organisation = %github.organisation,
        store = %store.name(),
        pause_secs = delivery.pause.as_secs(),
        attempts = delivery.max_attempts,
        "Starting audit run"
    );

    let mut pipeline = DeliveryPipeline::new(store.as_ref(), &channel)
        .with_rate_limiter(RateLimiter::new(delivery.pause))
        .with_retry_policy(RetryPolicy::new(delivery.max_attempts, DEFAULT_RETRY_DELAY));
    if !args.no_export {
        // 投递前逐条输出紧凑 JSON，运行结束后再输出完整数组
        pipeline = pipeline.with_delivery_hook(|event| match export::to_json_line(event) {
            Ok(line) => println!("{}", line),
            Err(e) => warn!(id = %event.id, error = %e, "Failed to serialise event"),
        });
    }

    let (events, _summary) = run_once(&client, &github.organisation, &pipeline)?;

    if !args.no_export {
        println!("{}", export::to_json_pretty(&events)?);
    }
    Ok(())
}
