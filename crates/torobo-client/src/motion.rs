//! MotionIssuer - 运动命令下发
//!
//! 把一次关节运动命令按驱动要求的顺序下发：
//!
//! ```text
//! start_joint_control → arm_log_buffer(duration) → start_timer → move_joints
//! ```
//!
//! 下发是 fire-and-forget 的：不等待运动完成，是否收敛由控制循环在下一次
//! 迭代重新采样来判断。任何一步失败都返回 `MotionDispatchFailure`，
//! 不重试（部分下发的运动会让机械臂处于未定义的指令状态）。

use crate::error::{ControlError, Result};
use torobo_driver::{ArmDriver, DriverError, MotionTiming};
use tracing::debug;

/// 关节运动命令
///
/// 每次迭代创建一次，由 [`MotionIssuer::issue`] 消费后丢弃。
#[derive(Debug, Clone, PartialEq)]
pub struct JointCommand {
    /// 目标关节角（rad）
    pub positions: Vec<f64>,
    /// 时序参数
    pub timing: MotionTiming,
}

impl JointCommand {
    /// 创建运动命令
    pub fn new(positions: impl Into<Vec<f64>>, timing: MotionTiming) -> Self {
        JointCommand {
            positions: positions.into(),
            timing,
        }
    }
}

/// 运动命令下发器
#[derive(Debug, Clone, Copy, Default)]
pub struct MotionIssuer {
    timing: MotionTiming,
}

impl MotionIssuer {
    /// 使用固定时序参数创建下发器
    pub fn new(timing: MotionTiming) -> Self {
        MotionIssuer { timing }
    }

    /// 时序参数
    pub fn timing(&self) -> &MotionTiming {
        &self.timing
    }

    /// 用固定时序参数构造命令
    pub fn command(&self, positions: &[f64]) -> JointCommand {
        JointCommand::new(positions, self.timing)
    }

    /// 下发运动命令
    ///
    /// # 错误
    ///
    /// - `ControlError::MotionDispatchFailure`: 关节数量不匹配、目标包含非有限值，
    ///   或任何一步驱动调用失败
    pub fn issue<D: ArmDriver + ?Sized>(&self, driver: &D, command: JointCommand) -> Result<()> {
        let JointCommand { positions, timing } = command;

        DriverError::check_joint_count("move_joints", driver.joint_count(), positions.len())
            .map_err(|e| ControlError::dispatch("validate", e))?;
        if let Some(index) = positions.iter().position(|p| !p.is_finite()) {
            return Err(ControlError::dispatch(
                "validate",
                DriverError::InvalidInput(format!("joint {index} target is not finite")),
            ));
        }

        driver
            .start_joint_control()
            .map_err(|e| ControlError::dispatch("start_joint_control", e))?;
        driver
            .arm_log_buffer(timing.duration)
            .map_err(|e| ControlError::dispatch("arm_log_buffer", e))?;
        driver.start_timer().map_err(|e| ControlError::dispatch("start_timer", e))?;
        driver
            .move_joints(&positions, &timing)
            .map_err(|e| ControlError::dispatch("move_joints", e))?;

        debug!("Issued joint motion: {:?} ({:?})", positions, timing);
        Ok(())
    }
}
