//! 作业执行器
//!
//! 执行器是外部协作者：拿到会话路径与 worker 预算，要么写出产物，要么返回错误。
//! 执行器在会话线程上同步阻塞运行，内部可自行开启不超过 `workers` 的并行度。
//! CommandExecutor 通过配置的外部解码命令执行作业；UnconfiguredExecutor 用于未配置命令的作业。

use std::path::Path;
use std::process::Command;

use anyhow::Context;
use thiserror::Error;

use crate::core::SessionLayout;
use crate::jobs::{JobId, JobName};

/// 作业执行上下文
#[derive(Debug, Clone, Copy)]
pub struct JobContext<'a> {
    pub job: JobName,
    pub job_id: &'a JobId,
    pub session: &'a SessionLayout,
    pub workers: usize,
}

impl JobContext<'_> {
    pub fn session_path(&self) -> &Path {
        self.session.root()
    }
}

#[derive(Error, Debug)]
pub enum ExecutorError {
    #[error("No executor command configured for job {0}")]
    NotConfigured(JobName),

    #[error(transparent)]
    Failed(#[from] anyhow::Error),
}

/// 作业执行器 trait
pub trait JobExecutor: Send + Sync {
    fn execute(&self, ctx: &JobContext<'_>) -> Result<(), ExecutorError>;
}

impl<F> JobExecutor for F
where
    F: Fn(&JobContext<'_>) -> Result<(), ExecutorError> + Send + Sync,
{
    fn execute(&self, ctx: &JobContext<'_>) -> Result<(), ExecutorError> {
        self(ctx)
    }
}

/// 从闭包构造执行器（让编译器按 Fn 约束推断闭包签名）
pub fn from_fn<F>(f: F) -> F
where
    F: Fn(&JobContext<'_>) -> Result<(), ExecutorError> + Send + Sync,
{
    f
}

/// 未配置命令的作业：执行即失败
#[derive(Debug, Default, Clone, Copy)]
pub struct UnconfiguredExecutor;

impl JobExecutor for UnconfiguredExecutor {
    fn execute(&self, ctx: &JobContext<'_>) -> Result<(), ExecutorError> {
        Err(ExecutorError::NotConfigured(ctx.job))
    }
}

/// stderr 截取的最大字符数
const STDERR_TAIL_CHARS: usize = 2000;

/// 外部命令执行器：参数支持 {session} {workers} {job} {job_id} {output} 占位符
#[derive(Debug, Clone)]
pub struct CommandExecutor {
    program: String,
    args: Vec<String>,
}

impl CommandExecutor {
    pub fn new(program: impl Into<String>, args: Vec<String>) -> Self {
        Self {
            program: program.into(),
            args,
        }
    }

    fn expand(&self, arg: &str, ctx: &JobContext<'_>) -> String {
        arg.replace("{session}", &ctx.session_path().display().to_string())
            .replace("{workers}", &ctx.workers.to_string())
            .replace("{job}", ctx.job.as_str())
            .replace("{job_id}", ctx.job_id.as_str())
            .replace("{output}", &ctx.session.output_dir().display().to_string())
    }
}

impl JobExecutor for CommandExecutor {
    fn execute(&self, ctx: &JobContext<'_>) -> Result<(), ExecutorError> {
        let args: Vec<String> = self.args.iter().map(|a| self.expand(a, ctx)).collect();
        tracing::debug!(program = %self.program, ?args, job = %ctx.job, "spawning job command");

        let output = Command::new(&self.program)
            .args(&args)
            .env("BEHAVIOR_WORKERS", ctx.workers.to_string())
            .env("BEHAVIOR_JOB_ID", ctx.job_id.as_str())
            .output()
            .with_context(|| format!("failed to spawn `{}`", self.program))?;

        if output.status.success() {
            return Ok(());
        }
        let stderr = String::from_utf8_lossy(&output.stderr);
        let tail: String = {
            let chars: Vec<char> = stderr.trim_end().chars().collect();
            chars[chars.len().saturating_sub(STDERR_TAIL_CHARS)..]
                .iter()
                .collect()
        };
        Err(ExecutorError::Failed(anyhow::anyhow!(
            "`{}` exited with {}: {}",
            self.program,
            output.status,
            tail
        )))
    }
}
