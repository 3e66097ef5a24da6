//! 错误类型体系
//!
//! 区分致命错误（Fatal，终止本次运行）和瞬态错误（Transient，跳过当前迭代）。
//!
//! | 错误 | 分类 | 控制循环的处理 |
//! |------|------|----------------|
//! | `DriverUnavailable` | 致命 | 终止，上报调用方 |
//! | `ServiceUnavailable` | 瞬态 | 记录日志，跳过本次迭代 |
//! | `IkUnreachable` | 瞬态 | 记录日志，跳过本次迭代 |
//! | `MotionDispatchFailure` | 致命 | 终止，会话仍然保证断电 |
//!
//! 外部关停（Shutdown）不是错误，而是正常的终止状态
//! [`RunState::Cancelled`](crate::control::RunState::Cancelled)。
//!
//! # 示例
//!
//! ```rust
//! use torobo_client::ControlError;
//!
//! fn handle_error(err: &ControlError) {
//!     if err.is_fatal() {
//!         eprintln!("致命错误: {}", err);
//!     } else if err.is_transient() {
//!         eprintln!("瞬态错误，下一次迭代重试: {}", err);
//!     }
//! }
//! # handle_error(&ControlError::IkUnreachable);
//! ```

use thiserror::Error;
use torobo_driver::DriverError;

/// 控制层错误类型
#[derive(Debug, Error)]
pub enum ControlError {
    // ==================== Fatal Errors ====================
    /// 驱动从未收到过遥测帧
    #[error("Driver unavailable: no telemetry frame has ever been received")]
    DriverUnavailable,

    /// 运动命令下发失败
    #[error("Motion dispatch failed at '{stage}': {source}")]
    MotionDispatchFailure {
        /// 失败的下发阶段
        stage: &'static str,
        /// 底层驱动错误
        #[source]
        source: DriverError,
    },

    /// 其他驱动错误（会话建立、电流下发等）
    #[error("Driver error: {0}")]
    Driver(#[from] DriverError),

    /// 连续跳过的迭代超过阈值
    #[error("Consecutive skipped iterations: {count}, last error: {last_error}")]
    ConsecutiveFailures {
        /// 连续跳过次数
        count: u32,
        /// 最后一次错误
        #[source]
        last_error: Box<ControlError>,
    },

    /// 稳定场输出维度错误
    #[error("Stabilization field returned {rows} rows, expected {expected}")]
    FieldDimension {
        /// 期望行数
        expected: usize,
        /// 实际行数
        rows: usize,
    },

    // ==================== Transient Errors ====================
    /// IK 服务不可达或在等待时间内无响应
    #[error("IK service unavailable: {reason}")]
    ServiceUnavailable {
        /// 原因
        reason: String,
    },

    /// IK 服务报告无可行解
    #[error("IK service reported no feasible solution")]
    IkUnreachable,

    // ==================== Configuration Errors ====================
    /// 配置错误
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// 参数无效
    #[error("Invalid parameter '{param}': {reason}")]
    InvalidParameter {
        /// 参数名
        param: String,
        /// 原因
        reason: String,
    },
}

impl ControlError {
    /// 是否为致命错误
    ///
    /// 致命错误会终止控制循环，并由会话负责断电。
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            Self::DriverUnavailable
                | Self::MotionDispatchFailure { .. }
                | Self::Driver(_)
                | Self::ConsecutiveFailures { .. }
                | Self::FieldDimension { .. }
        )
    }

    /// 是否为瞬态错误
    ///
    /// 瞬态错误只影响当前迭代，下一次迭代会重新尝试。
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::ServiceUnavailable { .. } | Self::IkUnreachable)
    }

    /// 是否为配置错误
    pub fn is_config_error(&self) -> bool {
        matches!(self, Self::ConfigError(_) | Self::InvalidParameter { .. })
    }

    /// 创建服务不可用错误
    pub fn service_unavailable(reason: impl Into<String>) -> Self {
        Self::ServiceUnavailable {
            reason: reason.into(),
        }
    }

    /// 创建参数无效错误
    pub fn invalid_parameter(param: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidParameter {
            param: param.into(),
            reason: reason.into(),
        }
    }

    /// 创建运动下发失败错误
    pub fn dispatch(stage: &'static str, source: DriverError) -> Self {
        Self::MotionDispatchFailure { stage, source }
    }
}

/// Result 类型别名
pub type Result<T> = std::result::Result<T, ControlError>;
