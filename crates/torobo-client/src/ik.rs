//! IKBridge - 逆运动学服务桥接
//!
//! 把期望的笛卡尔量和当前关节配置打包成 IK 请求，同步调用外部 IK 服务。
//!
//! # 有界等待
//!
//! IK 服务运行在专用的工作线程上，桥接层通过 `crossbeam-channel` 发送请求，
//! 并用 `recv_timeout` 等待应答。无论服务多慢，`solve()` 最多阻塞
//! `timeout`，控制循环的节拍假设因此保持成立：
//!
//! ```text
//! 控制线程                         IK 工作线程
//!    │  try_send(IkJob) ───────────────►│ 等待服务就绪（指数退避，截止到 deadline）
//!    │                                  │ service.solve(request)
//!    │◄─────────────── reply (bounded 1)│
//!    │  recv_timeout(timeout)           │
//! ```
//!
//! 超时的请求的应答会被丢弃（应答通道随请求一起创建）。
//!
//! # 请求载荷
//!
//! 请求中发送的笛卡尔量是一个配置点（[`IkRequestMode`]）：
//!
//! - `Target`（默认）：平移分量使用传入的目标位置，姿态使用配置的参考姿态
//! - `FixedReference`：无论输入如何，总是发送配置的参考位姿

use crate::error::{ControlError, Result};
use crossbeam_channel::{Receiver, RecvTimeoutError, Sender, TrySendError};
use nalgebra::Vector3;
use serde::{Deserialize, Serialize};
use std::thread::JoinHandle;
use std::time::{Duration, Instant};
use thiserror::Error;
use tracing::{debug, warn};

/// 等待服务就绪的初始退避
const READY_BACKOFF_INITIAL: Duration = Duration::from_millis(1);

/// 等待服务就绪的最大退避
const READY_BACKOFF_MAX: Duration = Duration::from_millis(50);

/// 参考位姿（Twist 形式：线速度/平移 + 角速度/姿态）
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ReferenceTwist {
    /// 平移分量
    pub linear: [f64; 3],
    /// 姿态分量
    pub angular: [f64; 3],
}

impl Default for ReferenceTwist {
    /// 参考机型的固定参考位姿
    fn default() -> Self {
        ReferenceTwist {
            linear: [-0.191556, -0.216731, 0.963396],
            angular: [-2.05147, -2.32108, -0.766848],
        }
    }
}

/// IK 请求载荷模式
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IkRequestMode {
    /// 发送目标平移 + 参考姿态
    #[default]
    Target,
    /// 总是发送固定参考位姿
    FixedReference,
}

/// IK 桥接配置
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct IkBridgeConfig {
    /// 单次请求的最长等待时间（毫秒）
    pub timeout_ms: u64,
    /// 请求载荷模式
    pub mode: IkRequestMode,
    /// 参考位姿
    pub reference: ReferenceTwist,
}

impl Default for IkBridgeConfig {
    fn default() -> Self {
        IkBridgeConfig {
            timeout_ms: 1000,
            mode: IkRequestMode::default(),
            reference: ReferenceTwist::default(),
        }
    }
}

impl IkBridgeConfig {
    /// 单次请求的最长等待时间
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    /// 检查配置
    pub fn validate(&self) -> Result<()> {
        if self.timeout_ms == 0 {
            return Err(ControlError::invalid_parameter(
                "ik.timeout_ms",
                "must be greater than 0",
            ));
        }
        let mut values = self.reference.linear.iter().chain(self.reference.angular.iter());
        if values.any(|v| !v.is_finite()) {
            return Err(ControlError::invalid_parameter(
                "ik.reference",
                "all components must be finite",
            ));
        }
        Ok(())
    }
}

/// 发送给 IK 服务的请求
#[derive(Debug, Clone, PartialEq)]
pub struct IkRequest {
    /// 期望的平移分量
    pub linear: Vector3<f64>,
    /// 期望的姿态分量
    pub angular: Vector3<f64>,
    /// 种子关节配置
    pub q_in: Vec<f64>,
}

/// IK 服务报告的错误
#[derive(Debug, Clone, PartialEq, Error)]
pub enum IkServiceError {
    /// 服务暂时不可用
    #[error("service unavailable: {0}")]
    Unavailable(String),
    /// 无可行解
    #[error("no feasible solution")]
    NoSolution,
}

/// 外部 IK 服务接口
///
/// 实现运行在 IK 工作线程上，可以自由阻塞。
pub trait IkService: Send + 'static {
    /// 服务是否就绪（默认总是就绪）
    fn is_ready(&mut self) -> bool {
        true
    }

    /// 求解关节配置
    fn solve(&mut self, request: &IkRequest) -> std::result::Result<Vec<f64>, IkServiceError>;
}

type Reply = std::result::Result<Vec<f64>, IkServiceError>;

struct IkJob {
    request: IkRequest,
    deadline: Instant,
    reply: Sender<Reply>,
}

/// IK 服务桥接
pub struct IkBridge {
    jobs: Option<Sender<IkJob>>,
    worker: Option<JoinHandle<()>>,
    config: IkBridgeConfig,
    joint_count: usize,
}

impl IkBridge {
    /// 启动 IK 工作线程并创建桥接
    ///
    /// # 参数
    ///
    /// - `service`: IK 服务（移交给工作线程）
    /// - `config`: 桥接配置
    /// - `joint_count`: 关节数量（用于默认种子和结果校验）
    pub fn spawn<S: IkService>(service: S, config: IkBridgeConfig, joint_count: usize) -> Result<Self> {
        config.validate()?;

        // 容量 1：工作线程忙碌时新请求立即失败，不会排队积压
        let (tx, rx) = crossbeam_channel::bounded::<IkJob>(1);
        let worker = std::thread::Builder::new()
            .name("torobo-ik".into())
            .spawn(move || worker_loop(service, rx))
            .map_err(|e| ControlError::service_unavailable(format!("failed to spawn IK worker: {e}")))?;

        Ok(IkBridge {
            jobs: Some(tx),
            worker: Some(worker),
            config,
            joint_count,
        })
    }

    /// 桥接配置
    pub fn config(&self) -> &IkBridgeConfig {
        &self.config
    }

    /// 按配置的载荷模式构造请求
    ///
    /// `q_in` 为 `None` 时使用全零种子。
    pub fn build_request(&self, desired: &Vector3<f64>, q_in: Option<&[f64]>) -> IkRequest {
        let reference = &self.config.reference;
        let linear = match self.config.mode {
            IkRequestMode::Target => *desired,
            IkRequestMode::FixedReference => Vector3::from(reference.linear),
        };

        IkRequest {
            linear,
            angular: Vector3::from(reference.angular),
            q_in: q_in.map_or_else(|| vec![0.0; self.joint_count], <[f64]>::to_vec),
        }
    }

    /// 求解目标关节配置（有界等待）
    ///
    /// # 错误
    ///
    /// - `ControlError::ServiceUnavailable`: 服务不可用、忙碌或在超时内无应答
    /// - `ControlError::IkUnreachable`: 服务报告无解，或返回的关节数量不对
    pub fn solve(&self, desired: &Vector3<f64>, q_in: Option<&[f64]>) -> Result<Vec<f64>> {
        let request = self.build_request(desired, q_in);
        let timeout = self.config.timeout();
        let (reply_tx, reply_rx) = crossbeam_channel::bounded(1);

        let jobs = self
            .jobs
            .as_ref()
            .ok_or_else(|| ControlError::service_unavailable("IK bridge is shut down"))?;
        let job = IkJob {
            request,
            deadline: Instant::now() + timeout,
            reply: reply_tx,
        };
        match jobs.try_send(job) {
            Ok(()) => {},
            Err(TrySendError::Full(_)) => {
                return Err(ControlError::service_unavailable(
                    "IK worker still busy with a previous request",
                ));
            },
            Err(TrySendError::Disconnected(_)) => {
                return Err(ControlError::service_unavailable("IK worker stopped"));
            },
        }

        match reply_rx.recv_timeout(timeout) {
            Ok(Ok(q_out)) if q_out.len() == self.joint_count => Ok(q_out),
            Ok(Ok(q_out)) => {
                warn!(
                    "IK service returned {} joints, expected {}",
                    q_out.len(),
                    self.joint_count
                );
                Err(ControlError::IkUnreachable)
            },
            Ok(Err(IkServiceError::NoSolution)) => Err(ControlError::IkUnreachable),
            Ok(Err(IkServiceError::Unavailable(reason))) => {
                Err(ControlError::service_unavailable(reason))
            },
            Err(RecvTimeoutError::Timeout) => Err(ControlError::service_unavailable(format!(
                "no response within {:?}",
                timeout
            ))),
            Err(RecvTimeoutError::Disconnected) => Err(ControlError::service_unavailable(
                "IK worker dropped the request",
            )),
        }
    }
}

impl Drop for IkBridge {
    fn drop(&mut self) {
        // 关闭请求通道，工作线程在当前请求结束后退出
        drop(self.jobs.take());
        if let Some(worker) = self.worker.take() {
            if worker.is_finished() {
                let _ = worker.join();
            } else {
                debug!("IK worker still busy on shutdown, detaching");
            }
        }
    }
}

fn worker_loop<S: IkService>(mut service: S, jobs: Receiver<IkJob>) {
    for job in jobs.iter() {
        if !wait_until_ready(&mut service, job.deadline) {
            let _ = job.reply.send(Err(IkServiceError::Unavailable(
                "service not ready before deadline".to_string(),
            )));
            continue;
        }
        if Instant::now() >= job.deadline {
            // 调用方已经放弃
            continue;
        }

        let result = service.solve(&job.request);
        // 调用方超时后应答通道已关闭，忽略发送失败
        let _ = job.reply.send(result);
    }
    debug!("IK worker exiting");
}

fn wait_until_ready<S: IkService>(service: &mut S, deadline: Instant) -> bool {
    let mut backoff = READY_BACKOFF_INITIAL;
    loop {
        if service.is_ready() {
            return true;
        }
        let now = Instant::now();
        if now >= deadline {
            return false;
        }
        std::thread::sleep(backoff.min(deadline - now));
        backoff = (backoff * 2).min(READY_BACKOFF_MAX);
    }
}
