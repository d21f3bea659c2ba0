//! 资源分配：把 CPU 预算换算为（每会话 worker 数，最大并行会话数）
//!
//! 单个作业在 30 个 worker 时饱和；保留 4 个核心给系统。
//! 新会话只有在剩余核心不少于饱和预算的一半时才值得开启，因此偏向「少而满」而非「多而薄」。

use serde::{Deserialize, Serialize};

/// 为系统保留的核心数
pub const RESERVED_CORES: usize = 4;

/// 单个作业可用的最大核心数
pub const MAX_JOB_CORES: usize = 30;

/// 开启额外并行会话的阈值
pub const PARALLEL_THRESHOLD: usize = MAX_JOB_CORES / 2;

/// 调用方请求的 worker 数
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum WorkerRequest {
    /// 按主机核心数自动分配
    #[default]
    Automatic,
    Explicit(usize),
}

impl WorkerRequest {
    /// 线上协议与 CLI 用 -1（或任何 <= 0 的值）表示自动分配
    pub fn from_raw(raw: i64) -> Self {
        if raw <= 0 {
            Self::Automatic
        } else {
            Self::Explicit(usize::try_from(raw).unwrap_or(usize::MAX))
        }
    }
}

pub fn workers_per_session(requested: WorkerRequest, cpu_count: usize) -> usize {
    match requested {
        WorkerRequest::Automatic => cpu_count
            .saturating_sub(RESERVED_CORES)
            .clamp(1, MAX_JOB_CORES),
        WorkerRequest::Explicit(n) => n.max(1),
    }
}

pub fn max_parallel_sessions(cpu_count: usize) -> usize {
    ((cpu_count + PARALLEL_THRESHOLD) / MAX_JOB_CORES).max(1)
}

/// 主机可用核心数；无法探测时返回 None
pub fn host_cpu_count() -> Option<usize> {
    std::thread::available_parallelism().ok().map(|n| n.get())
}

/// 一次批次运行的资源配置
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Allocation {
    pub workers_per_session: usize,
    pub max_parallel: usize,
}

impl Allocation {
    /// cpu_count 为 None（核心数未知）时退回 RESERVED_CORES 个 worker、单会话串行
    pub fn compute(requested: WorkerRequest, cpu_count: Option<usize>) -> Self {
        match cpu_count {
            Some(cpus) => Self {
                workers_per_session: workers_per_session(requested, cpus),
                max_parallel: max_parallel_sessions(cpus),
            },
            None => Self {
                workers_per_session: match requested {
                    WorkerRequest::Automatic => RESERVED_CORES,
                    WorkerRequest::Explicit(n) => n.max(1),
                },
                max_parallel: 1,
            },
        }
    }
}
