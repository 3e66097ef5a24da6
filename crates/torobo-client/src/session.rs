//! ControlSession - 会话生命周期
//!
//! 会话独占驱动句柄和节拍时钟，负责机械臂的获取与释放：
//!
//! ```text
//! open():    move(home_pos) → set_run_mode(Current) → servo_on → 重置节拍时钟
//! release(): send_currents(0, ..) → servo_off × SERVO_OFF_ATTEMPTS
//! ```
//!
//! # RAII 释放
//!
//! 正常结束、返回错误、panic 展开，所有退出路径都会执行释放：
//!
//! - ✅ 显式调用 [`ControlSession::release`]（可重复调用）
//! - ✅ [`ControlSession::scoped`] 在闭包返回后释放
//! - ✅ `Drop` 在尚未释放时释放（包括 `open()` 中途失败的情况）
//!
//! 释放过程中的驱动错误只记录日志，不会向上传播，也不会中断后续步骤。

use crate::error::{ControlError, Result};
use crate::motion::MotionIssuer;
use crate::observer::{ForwardKinematics, StateSample, StateSampler};
use crate::rate::RateLimiter;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use torobo_driver::{ArmDriver, DEFAULT_JOINT_COUNT, DriverError, MotionTiming, RunMode};
use tracing::{debug, error, info, warn};

/// 释放时伺服断电的尝试次数
///
/// 断电命令在部分控制器固件上偶尔丢失，释放时无条件重复下发。
pub const SERVO_OFF_ATTEMPTS: usize = 3;

/// 会话配置
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// 进入会话时的归位关节角（rad）
    pub home_pos: Vec<f64>,
    /// 控制频率（Hz）
    pub control_freq: f64,
}

impl Default for SessionConfig {
    fn default() -> Self {
        SessionConfig {
            home_pos: vec![0.0; DEFAULT_JOINT_COUNT],
            control_freq: 30.0,
        }
    }
}

impl SessionConfig {
    /// 检查配置
    pub fn validate(&self, joint_count: usize) -> Result<()> {
        if !self.control_freq.is_finite() || self.control_freq <= 0.0 {
            return Err(ControlError::invalid_parameter(
                "session.control_freq",
                format!("{} (must be a finite value > 0)", self.control_freq),
            ));
        }
        if self.home_pos.len() != joint_count {
            return Err(ControlError::invalid_parameter(
                "session.home_pos",
                format!(
                    "expected {joint_count} joint values, got {}",
                    self.home_pos.len()
                ),
            ));
        }
        if self.home_pos.iter().any(|p| !p.is_finite()) {
            return Err(ControlError::invalid_parameter(
                "session.home_pos",
                "all values must be finite",
            ));
        }
        Ok(())
    }
}

/// 控制会话
///
/// 同一时刻只有一个会话持有驱动；节拍相关操作需要 `&mut self`。
pub struct ControlSession<D: ArmDriver> {
    driver: D,
    rate: RateLimiter,
    issuer: MotionIssuer,
    released: bool,
}

impl<D: ArmDriver> ControlSession<D> {
    /// 获取机械臂
    ///
    /// 配置校验失败时不会向驱动发送任何命令；一旦开始发送命令，
    /// 后续任何一步失败都会在返回错误前完成释放。
    ///
    /// # 错误
    ///
    /// - 配置错误（`control_freq`、`home_pos`）
    /// - `ControlError::MotionDispatchFailure`: 归位运动下发失败
    /// - `ControlError::Driver`: 设置运行模式或上电失败
    pub fn open(driver: D, config: &SessionConfig, timing: MotionTiming) -> Result<Self> {
        config.validate(driver.joint_count())?;
        let rate = RateLimiter::new(config.control_freq)?;

        let mut session = ControlSession {
            driver,
            rate,
            issuer: MotionIssuer::new(timing),
            released: false,
        };

        // 从这里开始 session 已经存在，`?` 返回时 Drop 会负责释放
        let home = session.issuer.command(&config.home_pos);
        session.issuer.issue(&session.driver, home)?;
        session.driver.set_run_mode(RunMode::Current)?;
        session.driver.servo_on()?;
        session.rate.reset();

        info!(
            "Control session opened: {} joints @ {} Hz",
            session.driver.joint_count(),
            session.rate.frequency()
        );
        Ok(session)
    }

    /// 在会话作用域内执行闭包，返回后立即释放
    ///
    /// 闭包 panic 时由 `Drop` 释放。
    ///
    /// # 示例
    ///
    /// ```rust
    /// use torobo_client::{ControlSession, SessionConfig};
    /// use torobo_driver::MotionTiming;
    /// use torobo_driver::mock::MockDriver;
    /// use std::sync::Arc;
    ///
    /// let driver = Arc::new(MockDriver::new(7));
    /// let result = ControlSession::scoped(
    ///     driver.clone(),
    ///     &SessionConfig::default(),
    ///     MotionTiming::default(),
    ///     |session| session.issue_motion(&[0.1; 7]),
    /// );
    ///
    /// assert!(result.is_ok());
    /// assert!(!driver.servo_enabled());
    /// assert_eq!(driver.commanded_currents(), Some(vec![0.0; 7]));
    /// ```
    pub fn scoped<T>(
        driver: D,
        config: &SessionConfig,
        timing: MotionTiming,
        f: impl FnOnce(&mut Self) -> Result<T>,
    ) -> Result<T> {
        let mut session = Self::open(driver, config, timing)?;
        let result = f(&mut session);
        session.release();
        result
    }

    /// 驱动句柄
    pub fn driver(&self) -> &D {
        &self.driver
    }

    /// 运动下发器
    pub fn issuer(&self) -> &MotionIssuer {
        &self.issuer
    }

    /// 控制周期
    pub fn period(&self) -> Duration {
        self.rate.period()
    }

    /// 是否已释放
    pub fn is_released(&self) -> bool {
        self.released
    }

    /// 等待到下一个控制时刻
    pub fn pace(&mut self) -> Duration {
        self.rate.wait()
    }

    /// 按节拍下发一次关节运动
    ///
    /// 先等待到下一个控制时刻，再下发运动命令。
    pub fn issue_motion(&mut self, positions: &[f64]) -> Result<()> {
        if self.released {
            return Err(ControlError::dispatch(
                "session",
                DriverError::rejected("move_joints", "session already released"),
            ));
        }
        self.rate.wait();
        let command = self.issuer.command(positions);
        self.issuer.issue(&self.driver, command)
    }

    /// 电流控制更新步
    ///
    /// 下发关节电流，等待到下一个控制时刻，然后采样最新状态。
    ///
    /// # 错误
    ///
    /// - `ControlError::Driver`: 电流向量长度不对或下发失败
    /// - `ControlError::DriverUnavailable`: 从未收到遥测帧
    pub fn update<K: ForwardKinematics>(
        &mut self,
        currents: &[f64],
        sampler: &StateSampler<K>,
    ) -> Result<StateSample> {
        DriverError::check_joint_count("send_currents", self.driver.joint_count(), currents.len())?;
        self.driver.send_currents(currents)?;
        self.rate.wait();
        sampler.sample(&self.driver)
    }

    /// 释放机械臂：所有关节电流置零，然后重复伺服断电
    ///
    /// 可以重复调用；每次调用都会完整执行一遍，驱动错误只记录日志。
    pub fn release(&mut self) {
        let zeros = vec![0.0; self.driver.joint_count()];
        if let Err(e) = self.driver.send_currents(&zeros) {
            warn!("Failed to zero joint currents during release: {}", e);
        }

        let mut failures = 0;
        for attempt in 1..=SERVO_OFF_ATTEMPTS {
            if let Err(e) = self.driver.servo_off() {
                failures += 1;
                warn!(
                    "Servo-off attempt {}/{} failed: {}",
                    attempt, SERVO_OFF_ATTEMPTS, e
                );
            }
        }
        if failures == SERVO_OFF_ATTEMPTS {
            error!("All {} servo-off attempts failed", SERVO_OFF_ATTEMPTS);
        }

        if !self.released {
            info!("Control session released");
        } else {
            debug!("Control session released again");
        }
        self.released = true;
    }
}

impl<D: ArmDriver> Drop for ControlSession<D> {
    fn drop(&mut self) {
        if !self.released {
            self.release();
        }
    }
}
