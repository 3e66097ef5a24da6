//! TrajectoryController - 轨迹跟踪控制循环
//!
//! 每次迭代：
//!
//! ```text
//! sample → xdot = Σ field(data - x_des) → x_next = x_cur + xdot·dt
//!        → 重新采样关节（IK 种子）→ IK(x_next) → IK(x_des)（仅诊断）
//!        → issue_motion(joint_positions) → error = ‖x_next - x_des‖
//! ```
//!
//! # 终止条件
//!
//! | 状态 | 条件 |
//! |------|------|
//! | `Converged` | `error <= stop_tol` |
//! | `Cancelled` | 在迭代边界观察到关停信号 |
//! | `IterationLimit` | 达到 `max_iterations` |
//! | `Failed` | 致命错误（驱动不可用、下发失败、连续跳过过多） |
//!
//! IK 的瞬态错误只跳过当前迭代：不下发运动、不更新误差，
//! 但迭代计数照常增加。

use super::field::{POSITION_DIM, StabilizationField, TrajectoryDataset, aggregate_velocity};
use super::shutdown::ShutdownSignal;
use crate::error::{ControlError, Result};
use crate::ik::IkBridge;
use crate::observer::{ForwardKinematics, StateSampler};
use crate::session::ControlSession;
use nalgebra::Vector3;
use serde::{Deserialize, Serialize};
use torobo_driver::ArmDriver;
use tracing::{debug, error, info, warn};

/// 控制循环配置
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ControllerConfig {
    /// 收敛阈值（m）
    pub stop_tol: f64,
    /// 积分步长（s）
    pub dt: f64,
    /// 允许的最大连续跳过次数，超过即失败
    pub max_consecutive_skips: u32,
    /// 最大迭代次数（`None` 表示不限制）
    pub max_iterations: Option<usize>,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        ControllerConfig {
            stop_tol: 0.01,
            dt: 0.1,
            max_consecutive_skips: 50,
            max_iterations: None,
        }
    }
}

impl ControllerConfig {
    /// 检查配置
    pub fn validate(&self) -> Result<()> {
        if !self.stop_tol.is_finite() || self.stop_tol <= 0.0 {
            return Err(ControlError::invalid_parameter(
                "control.stop_tol",
                format!("{} (must be a finite value > 0)", self.stop_tol),
            ));
        }
        if !self.dt.is_finite() || self.dt <= 0.0 {
            return Err(ControlError::invalid_parameter(
                "control.dt",
                format!("{} (must be a finite value > 0)", self.dt),
            ));
        }
        Ok(())
    }
}

/// 控制循环的外部依赖（构造时注入）
pub struct ControllerDeps<K, F> {
    /// 正运动学
    pub kinematics: K,
    /// IK 服务桥接
    pub ik: IkBridge,
    /// 稳定场
    pub field: F,
}

/// 运行终止状态
#[derive(Debug)]
pub enum RunState {
    /// 误差小于等于阈值
    Converged,
    /// 外部关停
    Cancelled,
    /// 达到最大迭代次数
    IterationLimit,
    /// 致命错误
    Failed(ControlError),
}

impl RunState {
    /// 是否为正常终止（非 `Failed`）
    pub fn is_success(&self) -> bool {
        !matches!(self, RunState::Failed(_))
    }
}

/// 一次运行的结果
#[derive(Debug)]
pub struct RunReport {
    /// 终止状态
    pub state: RunState,
    /// 迭代次数（含跳过的迭代）
    pub iterations: usize,
    /// 因 IK 瞬态错误跳过的迭代次数
    pub skipped_iterations: usize,
    /// 初始误差（m），初始采样失败时为 `None`
    pub initial_error: Option<f64>,
    /// 最后一次误差（m）
    pub final_error: Option<f64>,
    /// 最后一次计算的 `x_next`
    pub last_point: Option<Vector3<f64>>,
    /// 最后一次计算的聚合速度
    pub last_velocity: Option<Vector3<f64>>,
    /// 最后一次下发的关节目标
    pub last_target_joints: Option<Vec<f64>>,
}

impl RunReport {
    fn new() -> Self {
        RunReport {
            state: RunState::Converged,
            iterations: 0,
            skipped_iterations: 0,
            initial_error: None,
            final_error: None,
            last_point: None,
            last_velocity: None,
            last_target_joints: None,
        }
    }

    /// 失败时取出错误，否则返回报告本身
    pub fn into_result(self) -> Result<RunReport> {
        match self.state {
            RunState::Failed(e) => Err(e),
            state => Ok(RunReport { state, ..self }),
        }
    }
}

/// 两点位置分量之间的欧氏距离（只比较前三维）
pub fn position_error(current: &[f64], destination: &[f64]) -> f64 {
    current
        .iter()
        .zip(destination)
        .take(POSITION_DIM)
        .map(|(a, b)| (a - b).powi(2))
        .sum::<f64>()
        .sqrt()
}

/// 轨迹跟踪控制器
pub struct TrajectoryController<K, F> {
    sampler: StateSampler<K>,
    ik: IkBridge,
    field: F,
    config: ControllerConfig,
}

impl<K, F> TrajectoryController<K, F>
where
    K: ForwardKinematics,
    F: StabilizationField,
{
    /// 创建控制器
    pub fn new(deps: ControllerDeps<K, F>, config: ControllerConfig) -> Result<Self> {
        config.validate()?;
        Ok(TrajectoryController {
            sampler: StateSampler::new(deps.kinematics),
            ik: deps.ik,
            field: deps.field,
            config,
        })
    }

    /// 控制器配置
    pub fn config(&self) -> &ControllerConfig {
        &self.config
    }

    /// 状态采样器
    pub fn sampler(&self) -> &StateSampler<K> {
        &self.sampler
    }

    /// 执行一次轨迹跟踪，直到收敛、关停、达到迭代上限或失败
    ///
    /// 不会释放会话；释放由会话自身（显式 `release` 或 `Drop`）负责。
    pub fn run<D: ArmDriver>(
        &self,
        session: &mut ControlSession<D>,
        dataset: &TrajectoryDataset,
        shutdown: &ShutdownSignal,
    ) -> RunReport {
        let mut report = RunReport::new();
        if let Err(e) = self.execute(session, dataset, shutdown, &mut report) {
            error!("Trajectory run failed after {} iterations: {}", report.iterations, e);
            report.state = RunState::Failed(e);
        }

        info!(
            "Trajectory run finished: {:?} after {} iterations ({} skipped), final error {:?}",
            report.state, report.iterations, report.skipped_iterations, report.final_error
        );
        report
    }

    fn execute<D: ArmDriver>(
        &self,
        session: &mut ControlSession<D>,
        dataset: &TrajectoryDataset,
        shutdown: &ShutdownSignal,
        report: &mut RunReport,
    ) -> Result<()> {
        let destination = dataset.destination_position();
        // 场的输入与当前位置无关，整次运行只计算一次偏移
        let offsets = dataset.offsets();

        let initial = self.sampler.sample(session.driver())?;
        let mut error = position_error(initial.pose.as_slice(), destination.as_slice());
        report.initial_error = Some(error);
        report.final_error = Some(error);
        info!(
            "Starting trajectory run: initial error {:.6} m, stop_tol {} m",
            error, self.config.stop_tol
        );

        let mut consecutive_skips: u32 = 0;
        while error > self.config.stop_tol {
            if shutdown.is_triggered() {
                info!("Shutdown requested, stopping at iteration {}", report.iterations);
                report.state = RunState::Cancelled;
                return Ok(());
            }
            if self.config.max_iterations.is_some_and(|max| report.iterations >= max) {
                warn!("Iteration limit {} reached, error {:.6} m", report.iterations, error);
                report.state = RunState::IterationLimit;
                return Ok(());
            }

            let sample = self.sampler.sample(session.driver())?;
            let velocity = aggregate_velocity(&self.field, &offsets)?;
            let next = sample.pose + velocity * self.config.dt;
            report.last_point = Some(next);
            report.last_velocity = Some(velocity);

            let seed = self.sampler.joint_state(session.driver())?.positions();
            match self.ik.solve(&next, Some(seed.as_slice())) {
                Ok(joint_positions) => {
                    consecutive_skips = 0;
                    if let Err(e) = self.ik.solve(&destination, None) {
                        debug!("IK for destination failed (diagnostic only): {}", e);
                    }

                    session.issue_motion(&joint_positions)?;
                    report.last_target_joints = Some(joint_positions);

                    error = position_error(next.as_slice(), destination.as_slice());
                    report.final_error = Some(error);
                },
                Err(e) if e.is_transient() => {
                    consecutive_skips += 1;
                    report.skipped_iterations += 1;
                    warn!(
                        "Iteration {} skipped ({}/{}): {}",
                        report.iterations + 1,
                        consecutive_skips,
                        self.config.max_consecutive_skips,
                        e
                    );
                    if consecutive_skips > self.config.max_consecutive_skips {
                        report.iterations += 1;
                        return Err(ControlError::ConsecutiveFailures {
                            count: consecutive_skips,
                            last_error: Box::new(e),
                        });
                    }
                },
                Err(e) => return Err(e),
            }

            report.iterations += 1;
            info!("Iteration {}: error norm {:.6} m", report.iterations, error);
        }

        report.state = RunState::Converged;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_unit_error_norm() {
        assert_eq!(position_error(&[0.0, 0.0, 0.0], &[0.0, 0.0, 1.0]), 1.0);
    }

    #[test]
    fn test_error_ignores_extra_components() {
        let error = position_error(&[3.0, 4.0, 0.0, 100.0], &[0.0, 0.0, 0.0, -100.0]);
        assert_eq!(error, 5.0);
    }

    #[test]
    fn test_config_validation() {
        assert!(ControllerConfig::default().validate().is_ok());

        for (stop_tol, dt) in [(0.0, 0.1), (-1.0, 0.1), (0.01, 0.0), (f64::NAN, 0.1)] {
            let config = ControllerConfig {
                stop_tol,
                dt,
                ..ControllerConfig::default()
            };
            assert!(config.validate().unwrap_err().is_config_error());
        }
    }

    #[test]
    fn test_into_result() {
        let mut report = RunReport::new();
        report.iterations = 4;
        let report = report.into_result().unwrap();
        assert_eq!(report.iterations, 4);

        let mut report = RunReport::new();
        report.state = RunState::Failed(ControlError::DriverUnavailable);
        assert!(matches!(report.into_result(), Err(ControlError::DriverUnavailable)));
    }

    proptest! {
        #[test]
        fn prop_error_matches_nalgebra_norm(
            a in prop::array::uniform3(-10.0f64..10.0),
            b in prop::array::uniform3(-10.0f64..10.0),
        ) {
            let expected = (Vector3::from(a) - Vector3::from(b)).norm();
            prop_assert!((position_error(&a, &b) - expected).abs() < 1e-12);
            prop_assert_eq!(position_error(&a, &b), position_error(&b, &a));
            prop_assert!(position_error(&a, &b) >= 0.0);
        }
    }
}
