//! 执行器配置
//!
//! 所有配置集中在一个 TOML 文件中，每一节都可以省略（使用默认值）：
//!
//! ```toml
//! [session]
//! home_pos = [0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0]
//! control_freq = 30.0
//!
//! [control]
//! stop_tol = 0.01
//! dt = 0.1
//! max_consecutive_skips = 50
//!
//! [ik]
//! timeout_ms = 1000
//! mode = "target"
//!
//! [motion]
//! each_time = 5.0
//! motion_time = 10.0
//! duration = 500
//! ```

use crate::control::ControllerConfig;
use crate::error::{ControlError, Result};
use crate::ik::IkBridgeConfig;
use crate::session::SessionConfig;
use serde::{Deserialize, Serialize};
use std::path::Path;
use torobo_driver::MotionTiming;

/// 执行器完整配置
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExecutorConfig {
    /// 会话（归位、控制频率）
    pub session: SessionConfig,
    /// 控制循环
    pub control: ControllerConfig,
    /// IK 桥接
    pub ik: IkBridgeConfig,
    /// 运动时序
    pub motion: MotionTiming,
}

impl ExecutorConfig {
    /// 从 TOML 字符串解析（不做校验）
    pub fn from_toml_str(content: &str) -> Result<Self> {
        toml::from_str(content).map_err(|e| ControlError::ConfigError(e.to_string()))
    }

    /// 从文件加载并校验
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| {
            ControlError::ConfigError(format!("failed to read {}: {e}", path.display()))
        })?;
        let config = Self::from_toml_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// 关节数量（由 `home_pos` 决定）
    pub fn joint_count(&self) -> usize {
        self.session.home_pos.len()
    }

    /// 检查所有配置节
    pub fn validate(&self) -> Result<()> {
        if self.joint_count() == 0 {
            return Err(ControlError::invalid_parameter(
                "session.home_pos",
                "must contain at least one joint",
            ));
        }
        self.session.validate(self.joint_count())?;
        self.control.validate()?;
        self.ik.validate()?;
        validate_motion(&self.motion)
    }
}

fn validate_motion(motion: &MotionTiming) -> Result<()> {
    for (param, value) in [
        ("motion.each_time", motion.each_time),
        ("motion.motion_time", motion.motion_time),
    ] {
        if !value.is_finite() || value <= 0.0 {
            return Err(ControlError::invalid_parameter(
                param,
                format!("{value} (must be a finite value > 0)"),
            ));
        }
    }
    if motion.duration == 0 {
        return Err(ControlError::invalid_parameter(
            "motion.duration",
            "must be greater than 0",
        ));
    }
    Ok(())
}
