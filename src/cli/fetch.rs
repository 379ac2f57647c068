//! `github-auditor fetch` - 只拉取并输出，不投递、不写存储

use anyhow::Result;
use clap::Args;
use std::path::PathBuf;

use crate::config::AuditorConfig;
use crate::export;
use crate::github::{fetch_all, GitHubClient};

#[derive(Args, Debug)]
pub struct FetchArgs {
    /// 配置文件路径
    #[arg(long, short)]
    pub config: Option<PathBuf>,
}

pub fn handle_fetch(args: FetchArgs) -> Result<()> {
    let config = AuditorConfig::load(args.config.as_deref())?;
    let github = config.github_settings()?;
    let client = GitHubClient::new(&github)?;

    let events = fetch_all(&client, &github.organisation)?;
    println!("{}", export::to_json_pretty(&events)?);
    Ok(())
}
