//! 命令参数类型
//!
//! 驱动层命令所需的模式与时序参数。

use std::fmt;

/// 运行模式（`ORDER_RUN_MODE` 的取值）
///
/// 会话只需要切换到电流模式；关节位置控制由 `start_joint_control` 进入。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum RunMode {
    /// 电流控制模式
    Current,
}

impl fmt::Display for RunMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RunMode::Current => write!(f, "current"),
        }
    }
}

/// 关节运动的时序参数
///
/// - `each_time`: 每个插补点的时间（秒）
/// - `motion_time`: 整段运动的时间（秒）
/// - `duration`: 日志缓冲区长度（采样数），同时作为运动持续参数
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct MotionTiming {
    /// 每个插补点的时间（秒）
    pub each_time: f64,
    /// 运动时间（秒）
    pub motion_time: f64,
    /// 日志缓冲区长度
    pub duration: u32,
}

impl Default for MotionTiming {
    fn default() -> Self {
        MotionTiming {
            each_time: 5.0,
            motion_time: 10.0,
            duration: 500,
        }
    }
}
