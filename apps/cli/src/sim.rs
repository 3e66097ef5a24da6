//! 仿真机械臂
//!
//! 龙门式运动学模型：前三个关节直接是笛卡尔 x/y/z 轴（米），其余关节
//! 不影响末端位置。FK 按驱动约定以毫米输出平移分量。
//!
//! 驱动使用回显模式的 `MockDriver`：下发的关节目标立即成为最新遥测帧。

use nalgebra::Matrix4;
use std::sync::Arc;
use std::time::Duration;
use torobo_client::{IkRequest, IkService, IkServiceError};
use torobo_driver::mock::MockDriver;

/// 龙门模型需要的最少关节数
pub const GANTRY_AXES: usize = 3;

/// 龙门式正运动学（平移单位：毫米）
pub fn gantry_fk(q: &[f64]) -> Matrix4<f64> {
    let mut t = Matrix4::identity();
    for (axis, value) in q.iter().take(GANTRY_AXES).enumerate() {
        t[(axis, 3)] = value * 1000.0;
    }
    t
}

/// 龙门式逆运动学服务
pub struct GantryIk {
    /// 模拟的求解耗时
    pub latency: Duration,
    /// 可达工作空间（每个轴的绝对值上限，米）
    pub reach: f64,
}

impl IkService for GantryIk {
    fn solve(&mut self, request: &IkRequest) -> Result<Vec<f64>, IkServiceError> {
        if !self.latency.is_zero() {
            std::thread::sleep(self.latency);
        }
        if request.linear.iter().any(|v| !v.is_finite() || v.abs() > self.reach) {
            return Err(IkServiceError::NoSolution);
        }

        let mut q = request.q_in.clone();
        q[..GANTRY_AXES].copy_from_slice(request.linear.as_slice());
        Ok(q)
    }
}

/// 创建仿真驱动
pub fn simulated_driver(joint_count: usize) -> Arc<MockDriver> {
    Arc::new(MockDriver::new(joint_count).with_echo_moves(true))
}
