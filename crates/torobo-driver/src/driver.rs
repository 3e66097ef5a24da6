//! 硬件能力接口
//!
//! `ArmDriver` 描述控制核心所需的全部硬件操作。核心只依赖这一组能力，
//! 不关心电机控制器的具体协议。
//!
//! # 约定
//!
//! - 所有方法都取 `&self`，实现方自行负责内部可变性
//! - `latest_telemetry()` 是非阻塞读取，返回最近一帧（可能已过期）
//! - 除 `latest_telemetry()` 外，所有方法失败时返回 [`DriverError`]

use crate::command::{MotionTiming, RunMode};
use crate::error::DriverError;
use crate::state::JointState;
use std::sync::Arc;

/// 机械臂硬件驱动能力接口
pub trait ArmDriver: Send + Sync {
    /// 关节数量
    fn joint_count(&self) -> usize;

    /// 伺服上电
    fn servo_on(&self) -> Result<(), DriverError>;

    /// 伺服断电
    fn servo_off(&self) -> Result<(), DriverError>;

    /// 设置运行模式
    fn set_run_mode(&self, mode: RunMode) -> Result<(), DriverError>;

    /// 下发各关节电流（A）
    ///
    /// `currents.len()` 必须等于 `joint_count()`。
    fn send_currents(&self, currents: &[f64]) -> Result<(), DriverError>;

    /// 进入关节位置控制
    fn start_joint_control(&self) -> Result<(), DriverError>;

    /// 为接下来的运动准备日志缓冲区
    fn arm_log_buffer(&self, duration: u32) -> Result<(), DriverError>;

    /// 启动内部计时器
    fn start_timer(&self) -> Result<(), DriverError>;

    /// 下发关节运动命令（不等待运动完成）
    fn move_joints(&self, positions: &[f64], timing: &MotionTiming) -> Result<(), DriverError>;

    /// 最近一帧遥测数据
    ///
    /// 从未收到过遥测帧时返回 `None`。
    fn latest_telemetry(&self) -> Option<Arc<JointState>>;
}

impl<D: ArmDriver + ?Sized> ArmDriver for Arc<D> {
    fn joint_count(&self) -> usize {
        (**self).joint_count()
    }

    fn servo_on(&self) -> Result<(), DriverError> {
        (**self).servo_on()
    }

    fn servo_off(&self) -> Result<(), DriverError> {
        (**self).servo_off()
    }

    fn set_run_mode(&self, mode: RunMode) -> Result<(), DriverError> {
        (**self).set_run_mode(mode)
    }

    fn send_currents(&self, currents: &[f64]) -> Result<(), DriverError> {
        (**self).send_currents(currents)
    }

    fn start_joint_control(&self) -> Result<(), DriverError> {
        (**self).start_joint_control()
    }

    fn arm_log_buffer(&self, duration: u32) -> Result<(), DriverError> {
        (**self).arm_log_buffer(duration)
    }

    fn start_timer(&self) -> Result<(), DriverError> {
        (**self).start_timer()
    }

    fn move_joints(&self, positions: &[f64], timing: &MotionTiming) -> Result<(), DriverError> {
        (**self).move_joints(positions, timing)
    }

    fn latest_telemetry(&self) -> Option<Arc<JointState>> {
        (**self).latest_telemetry()
    }
}
