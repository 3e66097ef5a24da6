//! 驱动层模块
//!
//! 本 crate 定义 Torobo 机械臂控制核心与硬件之间的能力边界：
//! - [`ArmDriver`]：伺服上下电、运行模式、电流下发、关节运动、遥测读取
//! - [`JointState`]：不可变的关节遥测帧
//! - [`MotionTiming`] / [`RunMode`]：命令参数
//! - [`DriverError`]：驱动层错误
//!
//! 启用 `mock` feature 后提供 [`mock::MockDriver`]，无需硬件即可运行控制循环。

mod command;
mod driver;
mod error;
mod state;

#[cfg(any(test, feature = "mock"))]
pub mod mock;

pub use command::{MotionTiming, RunMode};
pub use driver::ArmDriver;
pub use error::DriverError;
pub use state::{DEFAULT_JOINT_COUNT, JointSample, JointState};
