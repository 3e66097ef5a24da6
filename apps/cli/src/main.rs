//! # torobo-exec
//!
//! Torobo 机械臂闭环轨迹执行器（仿真机械臂）。
//!
//! ```bash
//! # 检查配置
//! torobo-exec check-config --config demos/torobo.toml
//!
//! # 执行轨迹（Ctrl+C 在下一个迭代边界停止，并释放机械臂）
//! torobo-exec run --config demos/torobo.toml --dataset demos/line.json
//! ```
//!
//! 日志级别通过 `RUST_LOG` 调整，例如 `RUST_LOG=torobo_client=debug`。

use anyhow::Result;
use clap::{Parser, Subcommand};

mod commands;
mod dataset;
mod sim;

use commands::{CheckConfigCommand, RunCommand};

/// torobo-exec - 闭环轨迹执行器
#[derive(Parser, Debug)]
#[command(name = "torobo-exec")]
#[command(about = "Closed-loop trajectory executor for Torobo robot arms", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// 执行轨迹跟踪
    Run {
        #[command(flatten)]
        args: RunCommand,
    },

    /// 检查配置文件
    CheckConfig {
        #[command(flatten)]
        args: CheckConfigCommand,
    },
}

fn main() -> Result<()> {
    // 初始化日志
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("torobo_exec=info".parse()?)
                .add_directive("torobo_client=info".parse()?),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Run { args } => args.execute(),
        Commands::CheckConfig { args } => args.execute(),
    }
}
