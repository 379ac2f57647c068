//! GitHub Auditor CLI
//!
//! 拉取组织审计日志，向 Slack 发送告警，并把事件 JSON 输出到 stdout 供 SIEM 采集

use anyhow::Result;
use clap::{Parser, Subcommand};
use github_auditor::cli::{handle_fetch, handle_kinds, handle_run, FetchArgs, KindsArgs, RunArgs};
use tracing_subscriber::{fmt, EnvFilter};

#[derive(Parser)]
#[command(name = "github-auditor")]
#[command(about = "GitHub Auditor - 组织审计日志告警")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// 拉取审计日志并投递告警
    Run(RunArgs),
    /// 只拉取审计日志并输出 JSON
    Fetch(FetchArgs),
    /// 列出已知事件类型
    Kinds(KindsArgs),
}

fn main() -> Result<()> {
    // .env 不存在时忽略
    dotenvy::dotenv().ok();

    // 日志写 stderr，stdout 留给 JSON 输出
    // 例如: RUST_LOG=github_auditor=debug github-auditor run
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("github_auditor=info"));

    fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(false)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Run(args) => handle_run(args)?,
        Commands::Fetch(args) => handle_fetch(args)?,
        Commands::Kinds(args) => handle_kinds(args)?,
    }

    Ok(())
}
