//! RateLimiter - 控制周期节拍器
//!
//! 保证相邻两次硬件更新之间至少间隔一个控制周期 `1 / control_freq`：
//!
//! ```text
//! sleep(max(latest_control + period - now, 0))
//! latest_control = now()
//! ```
//!
//! 这是尽力而为的节拍原语，不是硬实时保证：如果硬件 I/O 本身阻塞超过
//! 一个周期，调用方仍然会超时（Overrun），此时不睡眠，直接进入下一帧。
//!
//! 使用 `spin_sleep` 实现低抖动延时。

use crate::error::{ControlError, Result};
use std::time::{Duration, Instant};
use tracing::warn;

/// 控制周期节拍器
#[derive(Debug)]
pub struct RateLimiter {
    frequency_hz: f64,
    period: Duration,
    latest_control: Instant,
}

impl RateLimiter {
    /// 创建节拍器
    ///
    /// # 错误
    ///
    /// `control_freq` 必须为有限正数，且周期 `1 / control_freq` 能用 `Duration` 表示。
    pub fn new(control_freq: f64) -> Result<Self> {
        if !control_freq.is_finite() || control_freq <= 0.0 {
            return Err(ControlError::invalid_parameter(
                "control_freq",
                format!("{control_freq} (must be a finite value > 0)"),
            ));
        }
        let period = Duration::try_from_secs_f64(1.0 / control_freq).map_err(|e| {
            ControlError::invalid_parameter(
                "control_freq",
                format!("{control_freq} (period not representable: {e})"),
            )
        })?;

        Ok(RateLimiter {
            frequency_hz: control_freq,
            period,
            latest_control: Instant::now(),
        })
    }

    /// 控制频率（Hz）
    pub fn frequency(&self) -> f64 {
        self.frequency_hz
    }

    /// 控制周期
    pub fn period(&self) -> Duration {
        self.period
    }

    /// 最近一次控制的时间戳
    pub fn latest_control(&self) -> Instant {
        self.latest_control
    }

    /// 重置节拍时钟（`latest_control = now`）
    pub fn reset(&mut self) {
        self.latest_control = Instant::now();
    }

    /// 在 `now` 时刻距离下一个控制时刻的剩余时间
    ///
    /// 已经超过下一个控制时刻时返回 0（不会"向后睡眠"）。
    pub fn slack(&self, now: Instant) -> Duration {
        (self.latest_control + self.period).saturating_duration_since(now)
    }

    /// 睡眠到下一个控制时刻，然后推进节拍时钟
    ///
    /// 返回实际请求的睡眠时长。
    pub fn wait(&mut self) -> Duration {
        let now = Instant::now();
        let slack = self.slack(now);

        if slack.is_zero() {
            let overrun = now.saturating_duration_since(self.latest_control + self.period);
            if !overrun.is_zero() {
                warn!(
                    "Control period overrun by {:?} (period {:?}), skipping sleep",
                    overrun, self.period
                );
            }
        } else {
            spin_sleep::sleep(slack);
        }

        self.latest_control = Instant::now();
        slack
    }
}
