//! TravelGuide 控制台前端
//!
//! 每行标准输入是一轮对话，响应以 JSON 打印。用户 ID 取 `--user <id>`、`TRAVELGUIDE_USER` 或配置中的 default_user。

use std::path::PathBuf;

use anyhow::Context;
use clap::Parser;
use tokio::io::{AsyncBufReadExt, BufReader};
use travelguide::{agent::build_orchestrator, observability};

#[derive(Parser)]
#[command(name = "travelguide")]
#[command(about = "Travel assistant console: one line per turn, JSON replies", long_about = None)]
#[command(version)]
struct Cli {
    /// User id whose session the turns belong to
    #[arg(short, long, env = "TRAVELGUIDE_USER")]
    user: Option<String>,
    /// Extra TOML config file layered over config/default.toml
    #[arg(short, long)]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    observability::init();

    let cli = Cli::parse();
    let (cfg, orchestrator) = build_orchestrator(cli.config);
    let user_id = cli
        .user
        .filter(|u| !u.trim().is_empty())
        .unwrap_or_else(|| cfg.app.default_user.clone());

    tracing::info!("{} console ready (user {})", cfg.app.name, user_id);

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await.context("Failed to read stdin")? {
        let response = orchestrator.handle(&line, &user_id).await;
        let rendered =
            serde_json::to_string_pretty(&response).context("Failed to render response")?;
        println!("{}", rendered);
    }

    Ok(())
}
