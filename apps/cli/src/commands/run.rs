//! run 命令
//!
//! 在仿真机械臂上执行一次轨迹跟踪：
//!
//! 1. 加载配置和数据集
//! 2. 注册 Ctrl+C → 关停信号
//! 3. 打开会话，运行控制循环，释放会话

use anyhow::{Context, Result, bail};
use clap::Args;
use std::path::PathBuf;
use std::time::Duration;
use torobo_client::{
    ControlSession, ControllerDeps, ExecutorConfig, IkBridge, LinearField, RunReport, RunState,
    ShutdownSignal, TrajectoryController,
};
use tracing::info;

use crate::dataset;
use crate::sim::{GANTRY_AXES, GantryIk, gantry_fk, simulated_driver};

/// 轨迹执行命令参数
#[derive(Args, Debug)]
pub struct RunCommand {
    /// 配置文件路径（TOML）
    #[arg(short, long)]
    pub config: PathBuf,

    /// 数据集路径（JSON 点数组，最后一个点为目标点）
    #[arg(short, long)]
    pub dataset: PathBuf,

    /// 最大迭代次数（覆盖配置）
    #[arg(long)]
    pub max_iterations: Option<usize>,

    /// 线性稳定场增益（1/s）
    #[arg(long, default_value_t = 1.0)]
    pub gain: f64,

    /// 仿真 IK 求解耗时（毫秒）
    #[arg(long, default_value_t = 0)]
    pub ik_latency_ms: u64,
}

impl RunCommand {
    pub fn execute(&self) -> Result<()> {
        let mut config = ExecutorConfig::load(&self.config)
            .with_context(|| format!("Failed to load config {}", self.config.display()))?;
        if let Some(max) = self.max_iterations {
            config.control.max_iterations = Some(max);
        }
        if !self.gain.is_finite() || self.gain <= 0.0 {
            bail!("--gain must be a finite value > 0, got {}", self.gain);
        }

        let joint_count = config.joint_count();
        if joint_count < GANTRY_AXES {
            bail!(
                "The simulated arm needs at least {} joints, config has {}",
                GANTRY_AXES,
                joint_count
            );
        }

        let dataset = dataset::load(&self.dataset)?;
        info!(
            "Loaded {} points ({}D) from {}",
            dataset.len(),
            dataset.dim(),
            self.dataset.display()
        );

        let shutdown = ShutdownSignal::new();
        let handler_signal = shutdown.clone();
        ctrlc::set_handler(move || {
            eprintln!("\nReceived interrupt signal. Stopping at the next iteration...");
            handler_signal.trigger();
        })
        .context("Failed to set signal handler")?;

        let service = GantryIk {
            latency: Duration::from_millis(self.ik_latency_ms),
            reach: 2.0,
        };
        let ik = IkBridge::spawn(service, config.ik.clone(), joint_count)?;
        let controller = TrajectoryController::new(
            ControllerDeps {
                kinematics: gantry_fk,
                ik,
                field: LinearField::new(self.gain),
            },
            config.control.clone(),
        )?;

        let driver = simulated_driver(joint_count);
        let report = ControlSession::scoped(driver, &config.session, config.motion, |session| {
            Ok(controller.run(session, &dataset, &shutdown))
        })
        .context("Failed to acquire the arm")?;

        print_report(&report);
        match report.state {
            RunState::Failed(e) => Err(e).context("Trajectory run failed"),
            _ => Ok(()),
        }
    }
}

fn print_report(report: &RunReport) {
    println!();
    println!("📊 执行结果:");
    println!("  状态:     {:?}", report.state);
    println!(
        "  迭代:     {} ({} 次跳过)",
        report.iterations, report.skipped_iterations
    );
    if let Some(initial) = report.initial_error {
        println!("  初始误差: {:.6} m", initial);
    }
    if let Some(error) = report.final_error {
        println!("  最终误差: {:.6} m", error);
    }
    match (&report.last_point, &report.last_velocity) {
        (Some(point), Some(velocity)) => {
            println!(
                "  末端点:   [{:.4}, {:.4}, {:.4}]",
                point.x, point.y, point.z
            );
            println!(
                "  速度:     [{:.4}, {:.4}, {:.4}]",
                velocity.x, velocity.y, velocity.z
            );
        },
        _ => println!("  未执行任何迭代"),
    }
}
