//! `github-auditor kinds` - 列出已知事件类型

use anyhow::Result;
use clap::Args;
use serde::Serialize;

use crate::taxonomy::{self, Category};

#[derive(Args, Debug)]
pub struct KindsArgs {
    /// 输出 JSON 格式
    #[arg(long)]
    pub json: bool,
}

/// 一行输出
#[derive(Debug, Clone, Serialize)]
pub struct KindRow {
    pub kind: &'static str,
    pub category: Category,
    pub template: &'static str,
}

pub fn kind_rows() -> Vec<KindRow> {
    taxonomy::entries()
        .iter()
        .map(|entry| KindRow {
            kind: entry.kind,
            category: entry.category,
            template: entry.template,
        })
        .collect()
}

/// 纯文本表格
pub fn render_kinds(rows: &[KindRow]) -> String {
    let width = rows.iter().map(|r| r.kind.len()).max().unwrap_or(0);
    rows.iter()
        .map(|r| {
            format!(
                "{:<width$}  {:<12}  {}",
                r.kind,
                r.category.as_str(),
                r.template,
                width = width
            )
        })
        .collect::<Vec<_>>()
        .join("\n")
}

pub fn handle_kinds(args: KindsArgs) -> Result<()> {
    let rows = kind_rows();
    if args.json {
        println!("{}", serde_json::to_string_pretty(&rows)?);
    } else {
        println!("{}", render_kinds(&rows));
    }
    Ok(())
}
