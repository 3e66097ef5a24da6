//! Mock 驱动
//!
//! 无硬件依赖的 [`ArmDriver`] 实现，用于测试和仿真：
//!
//! - 记录每一次调用（带时间戳），便于验证命令顺序和节拍
//! - 最新遥测帧存放在 `ArcSwapOption` 中（无锁读取）
//! - 可选回显模式：`move_joints` 的目标立即写回遥测帧
//! - 故障注入：运动命令失败、伺服断电失败、连接断开
//! - 运动钩子：每次成功的 `move_joints` 之后触发回调
//!
//! # 示例
//!
//! ```rust
//! use torobo_driver::mock::{DriverCall, MockDriver};
//! use torobo_driver::{ArmDriver, MotionTiming};
//!
//! let driver = MockDriver::new(7).with_echo_moves(true);
//! driver.move_joints(&[0.1; 7], &MotionTiming::default()).unwrap();
//!
//! assert_eq!(driver.move_count(), 1);
//! let state = driver.latest_telemetry().unwrap();
//! assert_eq!(state.positions().as_slice(), &[0.1; 7]);
//! assert!(matches!(driver.calls()[0].call, DriverCall::MoveJoints { .. }));
//! ```

use crate::command::{MotionTiming, RunMode};
use crate::driver::ArmDriver;
use crate::error::DriverError;
use crate::state::{JointSample, JointState};
use arc_swap::ArcSwapOption;
use parking_lot::Mutex;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Instant;
use tracing::debug;

/// Mock 驱动收到的调用
#[derive(Debug, Clone, PartialEq)]
pub enum DriverCall {
    ServoOn,
    ServoOff,
    SetRunMode(RunMode),
    SendCurrents(Vec<f64>),
    StartJointControl,
    ArmLogBuffer(u32),
    StartTimer,
    MoveJoints {
        positions: Vec<f64>,
        timing: MotionTiming,
    },
}

/// 带时间戳的调用记录
#[derive(Debug, Clone)]
pub struct RecordedCall {
    pub call: DriverCall,
    pub at: Instant,
    /// 调用是否成功
    pub ok: bool,
}

/// 运动钩子（参数为累计成功运动次数）
pub type MoveHook = Box<dyn Fn(usize) + Send + Sync>;

/// Mock 驱动
pub struct MockDriver {
    joint_count: usize,
    telemetry: ArcSwapOption<JointState>,
    calls: Mutex<Vec<RecordedCall>>,
    echo_moves: AtomicBool,
    connected: AtomicBool,
    fail_moves: AtomicBool,
    servo_off_failures: AtomicUsize,
    moves: AtomicUsize,
    servo_enabled: AtomicBool,
    run_mode: Mutex<Option<RunMode>>,
    currents: Mutex<Option<Vec<f64>>>,
    on_move: Mutex<Option<MoveHook>>,
}

impl MockDriver {
    /// 创建 Mock 驱动（尚无遥测帧）
    pub fn new(joint_count: usize) -> Self {
        MockDriver {
            joint_count,
            telemetry: ArcSwapOption::empty(),
            calls: Mutex::new(Vec::new()),
            echo_moves: AtomicBool::new(false),
            connected: AtomicBool::new(true),
            fail_moves: AtomicBool::new(false),
            servo_off_failures: AtomicUsize::new(0),
            moves: AtomicUsize::new(0),
            servo_enabled: AtomicBool::new(false),
            run_mode: Mutex::new(None),
            currents: Mutex::new(None),
            on_move: Mutex::new(None),
        }
    }

    /// 设置初始遥测帧
    pub fn with_telemetry(self, state: JointState) -> Self {
        self.set_telemetry(state);
        self
    }

    /// 设置回显模式
    pub fn with_echo_moves(self, echo: bool) -> Self {
        self.echo_moves.store(echo, Ordering::Release);
        self
    }

    /// 发布一帧新的遥测数据
    pub fn set_telemetry(&self, state: JointState) {
        self.telemetry.store(Some(Arc::new(state)));
    }

    /// 清空遥测（模拟从未收到帧）
    pub fn clear_telemetry(&self) {
        self.telemetry.store(None);
    }

    /// 模拟连接断开 / 恢复
    pub fn set_connected(&self, connected: bool) {
        self.connected.store(connected, Ordering::Release);
    }

    /// 让后续所有 `move_joints` 失败
    pub fn set_fail_moves(&self, fail: bool) {
        self.fail_moves.store(fail, Ordering::Release);
    }

    /// 让接下来 `count` 次 `servo_off` 失败
    pub fn fail_next_servo_offs(&self, count: usize) {
        self.servo_off_failures.store(count, Ordering::Release);
    }

    /// 注册运动钩子
    pub fn set_on_move(&self, hook: impl Fn(usize) + Send + Sync + 'static) {
        *self.on_move.lock() = Some(Box::new(hook));
    }

    /// 所有调用记录（按时间顺序）
    pub fn calls(&self) -> Vec<RecordedCall> {
        self.calls.lock().clone()
    }

    /// 清空调用记录
    pub fn clear_calls(&self) {
        self.calls.lock().clear();
    }

    /// 成功的 `move_joints` 次数
    pub fn move_count(&self) -> usize {
        self.moves.load(Ordering::Acquire)
    }

    /// 成功的 `move_joints` 时间戳
    pub fn move_timestamps(&self) -> Vec<Instant> {
        self.calls
            .lock()
            .iter()
            .filter(|c| c.ok && matches!(c.call, DriverCall::MoveJoints { .. }))
            .map(|c| c.at)
            .collect()
    }

    /// 成功的 `move_joints` 目标位置
    pub fn move_targets(&self) -> Vec<Vec<f64>> {
        self.calls
            .lock()
            .iter()
            .filter(|c| c.ok)
            .filter_map(|c| match &c.call {
                DriverCall::MoveJoints { positions, .. } => Some(positions.clone()),
                _ => None,
            })
            .collect()
    }

    /// `servo_off` 调用次数（含失败）
    pub fn servo_off_attempts(&self) -> usize {
        self.count_calls(|c| matches!(c, DriverCall::ServoOff))
    }

    /// 满足条件的调用次数（含失败）
    pub fn count_calls(&self, predicate: impl Fn(&DriverCall) -> bool) -> usize {
        self.calls.lock().iter().filter(|c| predicate(&c.call)).count()
    }

    /// 最近一次成功下发的电流
    pub fn commanded_currents(&self) -> Option<Vec<f64>> {
        self.currents.lock().clone()
    }

    /// 伺服是否上电
    pub fn servo_enabled(&self) -> bool {
        self.servo_enabled.load(Ordering::Acquire)
    }

    /// 当前运行模式
    pub fn run_mode(&self) -> Option<RunMode> {
        *self.run_mode.lock()
    }

    fn record(&self, call: DriverCall, ok: bool) {
        self.calls.lock().push(RecordedCall {
            call,
            at: Instant::now(),
            ok,
        });
    }

    /// 记录调用并返回连接状态检查结果
    fn checked(&self, call: DriverCall) -> Result<(), DriverError> {
        if self.connected.load(Ordering::Acquire) {
            self.record(call, true);
            Ok(())
        } else {
            self.record(call, false);
            Err(DriverError::Disconnected)
        }
    }
}

impl ArmDriver for MockDriver {
    fn joint_count(&self) -> usize {
        self.joint_count
    }

    fn servo_on(&self) -> Result<(), DriverError> {
        self.checked(DriverCall::ServoOn)?;
        self.servo_enabled.store(true, Ordering::Release);
        Ok(())
    }

    fn servo_off(&self) -> Result<(), DriverError> {
        let injected = self
            .servo_off_failures
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |n| n.checked_sub(1))
            .is_ok();
        if injected {
            debug!("MockDriver: injected servo_off failure");
            self.record(DriverCall::ServoOff, false);
            return Err(DriverError::rejected("servo_off", "injected failure"));
        }
        self.checked(DriverCall::ServoOff)?;
        self.servo_enabled.store(false, Ordering::Release);
        Ok(())
    }

    fn set_run_mode(&self, mode: RunMode) -> Result<(), DriverError> {
        self.checked(DriverCall::SetRunMode(mode))?;
        *self.run_mode.lock() = Some(mode);
        Ok(())
    }

    fn send_currents(&self, currents: &[f64]) -> Result<(), DriverError> {
        DriverError::check_joint_count("send_currents", self.joint_count, currents.len())?;
        self.checked(DriverCall::SendCurrents(currents.to_vec()))?;
        *self.currents.lock() = Some(currents.to_vec());
        Ok(())
    }

    fn start_joint_control(&self) -> Result<(), DriverError> {
        self.checked(DriverCall::StartJointControl)
    }

    fn arm_log_buffer(&self, duration: u32) -> Result<(), DriverError> {
        self.checked(DriverCall::ArmLogBuffer(duration))
    }

    fn start_timer(&self) -> Result<(), DriverError> {
        self.checked(DriverCall::StartTimer)
    }

    fn move_joints(&self, positions: &[f64], timing: &MotionTiming) -> Result<(), DriverError> {
        DriverError::check_joint_count("move_joints", self.joint_count, positions.len())?;
        let call = DriverCall::MoveJoints {
            positions: positions.to_vec(),
            timing: *timing,
        };
        if self.fail_moves.load(Ordering::Acquire) {
            debug!("MockDriver: injected move_joints failure");
            self.record(call, false);
            return Err(DriverError::rejected("move_joints", "injected failure"));
        }
        self.checked(call)?;

        if self.echo_moves.load(Ordering::Acquire) {
            self.set_telemetry(JointState::new(
                positions.iter().map(|&p| JointSample::new(p, 0.0)),
            ));
        }

        let count = self.moves.fetch_add(1, Ordering::AcqRel) + 1;
        if let Some(hook) = self.on_move.lock().as_ref() {
            hook(count);
        }
        Ok(())
    }

    fn latest_telemetry(&self) -> Option<Arc<JointState>> {
        self.telemetry.load_full()
    }
}
