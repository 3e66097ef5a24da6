//! 驱动层错误类型定义

use thiserror::Error;

/// 驱动层错误类型
#[derive(Error, Debug, Clone, PartialEq)]
pub enum DriverError {
    /// 与电机控制器的连接已断开
    #[error("Driver disconnected")]
    Disconnected,

    /// 控制器拒绝了命令
    #[error("Command '{command}' rejected: {reason}")]
    Rejected {
        /// 命令名称
        command: &'static str,
        /// 拒绝原因
        reason: String,
    },

    /// 无效输入（如关节数量不匹配）
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// 操作超时
    #[error("Operation timeout")]
    Timeout,

    /// 底层传输错误
    #[error("Transport error: {0}")]
    Transport(String),
}

impl DriverError {
    /// 创建命令被拒绝错误
    pub fn rejected(command: &'static str, reason: impl Into<String>) -> Self {
        Self::Rejected {
            command,
            reason: reason.into(),
        }
    }

    /// 检查关节向量长度
    pub fn check_joint_count(
        command: &'static str,
        expected: usize,
        actual: usize,
    ) -> Result<(), Self> {
        if expected == actual {
            Ok(())
        } else {
            Err(Self::InvalidInput(format!(
                "{command}: expected {expected} joint values, got {actual}"
            )))
        }
    }
}
