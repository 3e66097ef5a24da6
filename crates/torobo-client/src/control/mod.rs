//! 控制循环模块
//!
//! 提供轨迹跟踪相关的全部组件：
//! - `StabilizationField` - 稳定场接口（闭包即可实现）
//! - `TrajectoryDataset` - 轨迹数据集（最后一列为目标点）
//! - `TrajectoryController` - 节拍驱动的跟踪循环
//! - `ShutdownSignal` - 协作式关停信号

pub mod field;
pub mod shutdown;
pub mod trajectory;

// 重新导出常用类型
pub use field::{LinearField, StabilizationField, TrajectoryDataset, aggregate_velocity};
pub use shutdown::ShutdownSignal;
pub use trajectory::{
    ControllerConfig, ControllerDeps, RunReport, RunState, TrajectoryController, position_error,
};
