//! # Siddi CLI
//!
//! 命令行接口入口点。
//!
//! 提供：
//! - 配置加载与验证
//! - 单次事件分发与脚本回放
//! - 优雅关闭处理 (等待队列投递完成)

mod cli;
mod commands;
mod session;

use anyhow::Result;
use clap::Parser;
use observability::ObservabilityConfig;
use tracing::info;

use cli::{Cli, Commands};
use commands::{run_info, run_replay, run_track, run_validate};

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present
    dotenvy::dotenv().ok();

    let cli = Cli::parse();

    let mut observability_config = ObservabilityConfig::default()
        .with_log_format(cli.log_format.into())
        .with_default_log_level(cli.log_level());
    if let Some(port) = cli.metrics_port {
        observability_config = observability_config.with_metrics_port(port);
    }
    observability::init_with_config(observability_config)?;

    info!(version = env!("CARGO_PKG_VERSION"), "Siddi CLI starting");

    // Execute command
    let result = match &cli.command {
        Commands::Track(args) => run_track(args).await,
        Commands::Replay(args) => run_replay(args).await,
        Commands::Validate(args) => run_validate(args),
        Commands::Info(args) => run_info(args),
    };

    if let Err(ref e) = result {
        tracing::error!(error = %e, "Command failed");
    }

    result
}
