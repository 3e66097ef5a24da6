//! 关节遥测状态
//!
//! 驱动层上报的最新关节状态帧。每一帧在产生后不可变，
//! 通过 `Arc` 在驱动与控制循环之间共享。
//!
//! # 示例
//!
//! ```rust
//! use torobo_driver::{JointSample, JointState};
//!
//! let state = JointState::from_positions(&[0.0, 0.1, 0.2]);
//! assert_eq!(state.len(), 3);
//! assert_eq!(state.positions().as_slice(), &[0.0, 0.1, 0.2]);
//! assert_eq!(state[1], JointSample::new(0.1, 0.0));
//! ```

use smallvec::SmallVec;
use std::ops::Index;
use std::time::Instant;

/// 参考机型（Torobo Arm）的关节数量
pub const DEFAULT_JOINT_COUNT: usize = 7;

/// 单个关节的遥测采样
#[derive(Debug, Clone, Copy, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct JointSample {
    /// 关节位置（rad）
    pub position: f64,
    /// 关节速度（rad/s）
    pub velocity: f64,
}

impl JointSample {
    /// 创建新的关节采样
    pub const fn new(position: f64, velocity: f64) -> Self {
        JointSample { position, velocity }
    }
}

/// 关节状态帧
///
/// 按关节顺序排列的 `{position, velocity}`，长度等于关节数量。
#[derive(Debug, Clone, PartialEq)]
pub struct JointState {
    joints: SmallVec<[JointSample; 8]>,
    /// 帧到达驱动层的时间
    received_at: Instant,
}

impl JointState {
    /// 从关节采样创建状态帧
    pub fn new(joints: impl IntoIterator<Item = JointSample>) -> Self {
        JointState {
            joints: joints.into_iter().collect(),
            received_at: Instant::now(),
        }
    }

    /// 从位置向量创建状态帧（速度为 0）
    pub fn from_positions(positions: &[f64]) -> Self {
        Self::new(positions.iter().map(|&p| JointSample::new(p, 0.0)))
    }

    /// 关节数量
    pub fn len(&self) -> usize {
        self.joints.len()
    }

    /// 是否为空帧
    pub fn is_empty(&self) -> bool {
        self.joints.is_empty()
    }

    /// 关节位置向量
    pub fn positions(&self) -> SmallVec<[f64; 8]> {
        self.joints.iter().map(|j| j.position).collect()
    }

    /// 关节速度向量
    pub fn velocities(&self) -> SmallVec<[f64; 8]> {
        self.joints.iter().map(|j| j.velocity).collect()
    }

    /// 迭代所有关节采样
    pub fn iter(&self) -> impl Iterator<Item = &JointSample> {
        self.joints.iter()
    }

    /// 帧到达时间
    pub fn received_at(&self) -> Instant {
        self.received_at
    }

    /// 帧的年龄（自到达以来经过的时间）
    pub fn age(&self) -> std::time::Duration {
        self.received_at.elapsed()
    }
}

impl Index<usize> for JointState {
    type Output = JointSample;

    fn index(&self, index: usize) -> &Self::Output {
        &self.joints[index]
    }
}
