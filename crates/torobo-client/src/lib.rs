//! Torobo 机械臂闭环轨迹执行核心
//!
//! 本 crate 把末端执行器沿稳定场驱动到期望的笛卡尔目标点：
//!
//! ```text
//! ControlSession::open ─► TrajectoryController::run ─► ControlSession::release
//!                          │
//!                          ├─ StateSampler   读取最新遥测帧 + FK
//!                          ├─ 稳定场          期望笛卡尔速度
//!                          ├─ IkBridge       笛卡尔 → 关节（有界等待）
//!                          └─ MotionIssuer   按节拍下发关节运动
//! ```
//!
//! # 模块
//!
//! - [`rate`]：控制周期节拍器
//! - [`observer`]：状态采样（遥测 + 正运动学）
//! - [`motion`]：运动命令下发
//! - [`ik`]：IK 服务桥接
//! - [`control`]：稳定场、数据集、控制循环、关停信号
//! - [`session`]：会话获取与释放（RAII）
//! - [`config`]：TOML 配置
//!
//! 硬件能力边界由 [`torobo_driver::ArmDriver`] 定义。

pub mod config;
pub mod control;
pub mod error;
pub mod ik;
pub mod motion;
pub mod observer;
pub mod rate;
pub mod session;

// 重新导出常用类型
pub use config::ExecutorConfig;
pub use control::{
    ControllerConfig, ControllerDeps, LinearField, RunReport, RunState, ShutdownSignal,
    StabilizationField, TrajectoryController, TrajectoryDataset,
};
pub use error::{ControlError, Result};
pub use ik::{IkBridge, IkBridgeConfig, IkRequest, IkRequestMode, IkService, IkServiceError};
pub use motion::{JointCommand, MotionIssuer};
pub use observer::{ForwardKinematics, StateSample, StateSampler};
pub use rate::RateLimiter;
pub use session::{ControlSession, SERVO_OFF_ATTEMPTS, SessionConfig};
