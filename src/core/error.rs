//! 错误类型与结构化失败记录
//!
//! PipelineError 是同步返回给调用方的错误（校验失败、并发冲突、跟踪文件 IO 等）；
//! JobFailure 是跨线程传递的结构化失败记录，写入跟踪文件与批次错误表，永远不会向上抛出。

use std::any::Any;
use std::fmt;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::core::tracker::JobStatus;

/// 编排层同步错误：只有 Validation 与 ConcurrencyConflict 会出现在 submit / CLI 的返回值里
#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Concurrency conflict: {0}")]
    ConcurrencyConflict(String),

    #[error("Invalid session {path}: {reason}")]
    InvalidSession { path: PathBuf, reason: String },

    #[error(transparent)]
    Tracker(#[from] TrackerError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Config error: {0}")]
    Config(#[from] config::ConfigError),
}

/// 跟踪文件读写与状态迁移错误
#[derive(Error, Debug)]
pub enum TrackerError {
    #[error("Tracker IO error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Tracker file {path} is malformed: {source}")]
    Malformed {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("Unknown job id: {0}")]
    UnknownJob(String),

    /// 状态只能 pending → running → done/failed 单向迁移一次
    #[error("Invalid transition for job {job_id}: {from} -> {to}")]
    InvalidTransition {
        job_id: String,
        from: JobStatus,
        to: JobStatus,
    },
}

/// 失败类别（可机器检查）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    /// 作业执行器返回错误
    Execution,
    /// 作业执行器 panic
    Panic,
    /// 未配置执行命令
    NotConfigured,
    /// 上次运行遗留的 running 记录（需 reset 才会重跑）
    StaleRunning,
    /// 上次运行已失败（需 reset 才会重跑）
    PreviouslyFailed,
    /// 跟踪文件读写失败
    Tracker,
    /// 会话目录无法解析
    Setup,
    /// 会话线程无法启动
    Spawn,
    /// 批次管理循环自身的故障
    ManagerLoop,
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            FailureKind::Execution => "execution",
            FailureKind::Panic => "panic",
            FailureKind::NotConfigured => "not_configured",
            FailureKind::StaleRunning => "stale_running",
            FailureKind::PreviouslyFailed => "previously_failed",
            FailureKind::Tracker => "tracker",
            FailureKind::Setup => "setup",
            FailureKind::Spawn => "spawn",
            FailureKind::ManagerLoop => "manager_loop",
        };
        f.write_str(s)
    }
}

/// 结构化失败：{kind, message, job, location}
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobFailure {
    pub kind: FailureKind,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub job: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
}

impl JobFailure {
    pub fn new(kind: FailureKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            job: None,
            location: None,
        }
    }

    pub fn with_job(mut self, job: impl Into<String>) -> Self {
        self.job = Some(job.into());
        self
    }

    pub fn with_location(mut self, location: impl Into<String>) -> Self {
        self.location = Some(location.into());
        self
    }
}

impl fmt::Display for JobFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.job {
            Some(job) => write!(f, "[{}] {}: {}", self.kind, job, self.message),
            None => write!(f, "[{}] {}", self.kind, self.message),
        }
    }
}

/// 从 panic 负载中取出可读消息
pub fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic payload".to_string()
    }
}
