//! 协作式关停信号
//!
//! 控制循环只在迭代边界检查一次，不会打断正在进行的 IK 调用或运动下发。

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

/// 关停信号（可克隆，所有克隆共享同一个标志）
#[derive(Debug, Clone, Default)]
pub struct ShutdownSignal {
    flag: Arc<AtomicBool>,
}

impl ShutdownSignal {
    /// 创建未触发的信号
    pub fn new() -> Self {
        Self::default()
    }

    /// 触发关停
    pub fn trigger(&self) {
        self.flag.store(true, Ordering::Release);
    }

    /// 是否已触发
    pub fn is_triggered(&self) -> bool {
        self.flag.load(Ordering::Acquire)
    }
}
