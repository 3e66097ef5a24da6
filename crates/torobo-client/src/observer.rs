//! StateSampler - 状态采样器
//!
//! 从驱动读取最新的关节遥测帧，并通过正运动学（FK）推导末端位置。
//!
//! # 设计目标
//!
//! - **非阻塞**: 直接读取驱动缓存的最新帧，不请求新帧（可能已过期）
//! - **单位统一**: FK 输出的平移分量为毫米，采样结果统一换算为米
//! - **可注入**: FK 通过 [`ForwardKinematics`] trait 注入，闭包即可实现
//!
//! # 使用示例
//!
//! ```rust
//! use nalgebra::Matrix4;
//! use torobo_client::observer::StateSampler;
//!
//! // 平移分量（毫米）直接取前三个关节
//! let sampler = StateSampler::new(|q: &[f64]| {
//!     let mut t = Matrix4::identity();
//!     t[(0, 3)] = q[0];
//!     t[(1, 3)] = q[1];
//!     t[(2, 3)] = q[2];
//!     t
//! });
//!
//! let pose = sampler.end_effector(&[1000.0, 0.0, 500.0]);
//! assert_eq!(pose.z, 0.5);
//! ```

use crate::error::{ControlError, Result};
use nalgebra::{Matrix4, Vector3};
use std::sync::Arc;
use torobo_driver::{ArmDriver, JointState};

/// FK 平移分量的单位换算（毫米 → 米）
pub const MILLIMETERS_PER_METER: f64 = 1000.0;

/// 正运动学接口
///
/// 输入关节位置，返回 4x4 齐次变换矩阵，平移分量单位为毫米。
pub trait ForwardKinematics {
    /// 计算末端位姿
    fn forward(&self, positions: &[f64]) -> Matrix4<f64>;
}

impl<F> ForwardKinematics for F
where
    F: Fn(&[f64]) -> Matrix4<f64>,
{
    fn forward(&self, positions: &[f64]) -> Matrix4<f64> {
        self(positions)
    }
}

/// 一次状态采样
#[derive(Debug, Clone)]
pub struct StateSample {
    /// 关节状态帧
    pub joints: Arc<JointState>,
    /// 末端位置（米）
    pub pose: Vector3<f64>,
}

/// 状态采样器
#[derive(Debug, Clone)]
pub struct StateSampler<K> {
    kinematics: K,
}

impl<K: ForwardKinematics> StateSampler<K> {
    /// 创建状态采样器
    pub fn new(kinematics: K) -> Self {
        StateSampler { kinematics }
    }

    /// 采样关节状态和末端位置
    ///
    /// # 错误
    ///
    /// - `ControlError::DriverUnavailable`: 驱动从未收到过遥测帧
    pub fn sample<D: ArmDriver + ?Sized>(&self, driver: &D) -> Result<StateSample> {
        let joints = self.joint_state(driver)?;
        let pose = self.end_effector(&joints.positions());
        Ok(StateSample { joints, pose })
    }

    /// 只读取关节状态（不计算 FK）
    pub fn joint_state<D: ArmDriver + ?Sized>(&self, driver: &D) -> Result<Arc<JointState>> {
        driver.latest_telemetry().ok_or(ControlError::DriverUnavailable)
    }

    /// 由关节位置计算末端位置（米）
    pub fn end_effector(&self, positions: &[f64]) -> Vector3<f64> {
        let transform = self.kinematics.forward(positions);
        transform.fixed_view::<3, 1>(0, 3).into_owned() / MILLIMETERS_PER_METER
    }
}
