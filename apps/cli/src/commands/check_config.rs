//! check-config 命令
//!
//! 加载并校验配置文件，打印生效的参数。

use anyhow::{Context, Result};
use clap::Args;
use std::path::PathBuf;
use torobo_client::ExecutorConfig;

/// 配置检查命令参数
#[derive(Args, Debug)]
pub struct CheckConfigCommand {
    /// 配置文件路径（TOML）
    #[arg(short, long)]
    pub config: PathBuf,
}

impl CheckConfigCommand {
    pub fn execute(&self) -> Result<()> {
        let config = ExecutorConfig::load(&self.config)
            .with_context(|| format!("Failed to load config {}", self.config.display()))?;

        println!("✅ {} is valid", self.config.display());
        println!("  joints:        {}", config.joint_count());
        println!("  control_freq:  {} Hz", config.session.control_freq);
        println!("  stop_tol:      {} m", config.control.stop_tol);
        println!("  dt:            {} s", config.control.dt);
        println!("  ik timeout:    {:?}", config.ik.timeout());
        println!("  ik mode:       {:?}", config.ik.mode);
        println!(
            "  motion timing: each_time={} motion_time={} duration={}",
            config.motion.each_time, config.motion.motion_time, config.motion.duration
        );
        Ok(())
    }
}
