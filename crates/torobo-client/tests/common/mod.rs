//! 集成测试辅助设施
//!
//! 龙门式（gantry）仿真模型：前三个关节直接对应笛卡尔 x/y/z（米），
//! FK 以毫米输出平移分量，IK 把目标平移写回前三个关节。配合回显模式的
//! `MockDriver`，每次下发的运动立刻成为下一帧遥测。

#![allow(dead_code)]

use nalgebra::{Matrix4, Vector3};
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use torobo_client::{
    ControlSession, ControllerConfig, ControllerDeps, IkBridge, IkBridgeConfig, IkRequest,
    IkService, IkServiceError, LinearField, SessionConfig, StabilizationField,
    TrajectoryController, TrajectoryDataset,
};
use torobo_driver::mock::MockDriver;
use torobo_driver::{JointState, MotionTiming};

pub const JOINTS: usize = 7;

/// 龙门式正运动学（平移单位：毫米）
pub fn gantry_fk(q: &[f64]) -> Matrix4<f64> {
    let mut t = Matrix4::identity();
    t[(0, 3)] = q[0] * 1000.0;
    t[(1, 3)] = q[1] * 1000.0;
    t[(2, 3)] = q[2] * 1000.0;
    t
}

/// 末端位于 `xyz` 的关节配置
pub fn joints_at(xyz: [f64; 3]) -> Vec<f64> {
    let mut q = vec![0.0; JOINTS];
    q[..3].copy_from_slice(&xyz);
    q
}

/// 可编程的 IK 服务
///
/// 先按顺序返回脚本中的应答，脚本用完后按龙门模型求解。
/// 每次调用都会记录请求。
pub struct ScriptedIk {
    script: VecDeque<Result<Vec<f64>, IkServiceError>>,
    delay: Duration,
    requests: Arc<Mutex<Vec<IkRequest>>>,
    calls: Arc<AtomicUsize>,
}

/// 测试侧观察 IK 服务的句柄
#[derive(Clone)]
pub struct IkProbe {
    pub requests: Arc<Mutex<Vec<IkRequest>>>,
    pub calls: Arc<AtomicUsize>,
}

impl IkProbe {
    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl ScriptedIk {
    pub fn gantry() -> (Self, IkProbe) {
        Self::with_script(Vec::new())
    }

    pub fn with_script(script: Vec<Result<Vec<f64>, IkServiceError>>) -> (Self, IkProbe) {
        let probe = IkProbe {
            requests: Arc::new(Mutex::new(Vec::new())),
            calls: Arc::new(AtomicUsize::new(0)),
        };
        let service = ScriptedIk {
            script: script.into(),
            delay: Duration::ZERO,
            requests: probe.requests.clone(),
            calls: probe.calls.clone(),
        };
        (service, probe)
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }
}

impl IkService for ScriptedIk {
    fn solve(&mut self, request: &IkRequest) -> Result<Vec<f64>, IkServiceError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.requests.lock().push(request.clone());
        if !self.delay.is_zero() {
            std::thread::sleep(self.delay);
        }
        if let Some(reply) = self.script.pop_front() {
            return reply;
        }
        let mut q = request.q_in.clone();
        q[..3].copy_from_slice(request.linear.as_slice());
        Ok(q)
    }
}

/// 回显模式的 Mock 驱动，末端初始位于 `start`
pub fn echo_driver(start: [f64; 3]) -> Arc<MockDriver> {
    Arc::new(
        MockDriver::new(JOINTS)
            .with_echo_moves(true)
            .with_telemetry(JointState::from_positions(&joints_at(start))),
    )
}

/// 归位到 `start` 的会话
pub fn open_session(
    driver: &Arc<MockDriver>,
    start: [f64; 3],
    control_freq: f64,
) -> ControlSession<Arc<MockDriver>> {
    let config = SessionConfig {
        home_pos: joints_at(start),
        control_freq,
    };
    ControlSession::open(driver.clone(), &config, MotionTiming::default()).unwrap()
}

/// 从 `start` 到 `destination` 的两点数据集
pub fn two_point_dataset(start: [f64; 3], destination: [f64; 3]) -> TrajectoryDataset {
    TrajectoryDataset::from_points(&[start.to_vec(), destination.to_vec()]).unwrap()
}

/// 对两点数据集，每次迭代前进 `step` 米的线性场
///
/// 聚合速度为 `gain * |destination - start|`，乘以 `dt` 后等于 `step`。
pub fn field_for_step(start: [f64; 3], destination: [f64; 3], step: f64, dt: f64) -> LinearField {
    let distance = (Vector3::from(destination) - Vector3::from(start)).norm();
    LinearField::new(step / (distance * dt))
}

pub fn controller<F: StabilizationField>(
    service: impl IkService,
    field: F,
    config: ControllerConfig,
) -> TrajectoryController<fn(&[f64]) -> Matrix4<f64>, F> {
    controller_with_ik(service, IkBridgeConfig::default(), field, config)
}

pub fn controller_with_ik<F: StabilizationField>(
    service: impl IkService,
    ik_config: IkBridgeConfig,
    field: F,
    config: ControllerConfig,
) -> TrajectoryController<fn(&[f64]) -> Matrix4<f64>, F> {
    let ik = IkBridge::spawn(service, ik_config, JOINTS).unwrap();
    let deps = ControllerDeps {
        kinematics: gantry_fk as fn(&[f64]) -> Matrix4<f64>,
        ik,
        field,
    };
    TrajectoryController::new(deps, config).unwrap()
}
