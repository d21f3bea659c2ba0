//! 作业注册表
//!
//! 每种作业注册为 JobDescriptor（名称、输入文件模式、执行器）；注册表按执行顺序存放，
//! 负责判断一个会话上哪些作业可运行（输入文件存在）。请求了但输入缺失的作业直接跳过，不算失败。

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use crate::config::AppConfig;
use crate::core::SessionLayout;
use crate::jobs::{CommandExecutor, JobExecutor, JobFlags, JobName, UnconfiguredExecutor};

/// 作业描述：定义后不可变
#[derive(Clone)]
pub struct JobDescriptor {
    name: JobName,
    /// 相对 raw_data/behavior_data 的 glob 模式
    input_pattern: String,
    executor: Arc<dyn JobExecutor>,
}

impl JobDescriptor {
    pub fn new(name: JobName, executor: Arc<dyn JobExecutor>) -> Self {
        Self {
            name,
            input_pattern: name.input_file(),
            executor,
        }
    }

    pub fn name(&self) -> JobName {
        self.name
    }

    pub fn input_pattern(&self) -> &str {
        &self.input_pattern
    }

    pub fn executor(&self) -> Arc<dyn JobExecutor> {
        Arc::clone(&self.executor)
    }

    /// 可用性：输入模式至少匹配到一个文件
    pub fn is_available(&self, session: &SessionLayout) -> bool {
        let dir = session.behavior_data_dir();
        let pattern = format!(
            "{}/{}",
            glob::Pattern::escape(&dir.to_string_lossy()),
            self.input_pattern
        );
        match glob::glob(&pattern) {
            Ok(mut paths) => paths.any(|p| p.map(|p| p.is_file()).unwrap_or(false)),
            Err(e) => {
                tracing::warn!(job = %self.name, error = %e, "invalid input pattern");
                false
            }
        }
    }
}

impl fmt::Debug for JobDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("JobDescriptor")
            .field("name", &self.name)
            .field("input_pattern", &self.input_pattern)
            .finish_non_exhaustive()
    }
}

/// 作业注册表：按 JobName 顺序（即执行顺序）存放
#[derive(Debug, Default, Clone)]
pub struct JobRegistry {
    jobs: BTreeMap<JobName, JobDescriptor>,
}

impl JobRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// 按配置构建：配置了命令的作业使用 CommandExecutor，其余使用 UnconfiguredExecutor
    pub fn from_config(cfg: &AppConfig) -> Self {
        let mut registry = Self::new();
        for job in JobName::ALL {
            match cfg.jobs.get(job.as_str()) {
                Some(cmd) => registry.register(
                    job,
                    CommandExecutor::new(cmd.command.clone(), cmd.args.clone()),
                ),
                None => registry.register(job, UnconfiguredExecutor),
            }
        }
        registry
    }

    pub fn register(&mut self, name: JobName, executor: impl JobExecutor + 'static) {
        self.jobs
            .insert(name, JobDescriptor::new(name, Arc::new(executor)));
    }

    /// 覆盖输入模式（例如测试或非标准日志命名）
    pub fn register_with_pattern(
        &mut self,
        name: JobName,
        input_pattern: impl Into<String>,
        executor: impl JobExecutor + 'static,
    ) {
        let mut descriptor = JobDescriptor::new(name, Arc::new(executor));
        descriptor.input_pattern = input_pattern.into();
        self.jobs.insert(name, descriptor);
    }

    pub fn get(&self, name: JobName) -> Option<&JobDescriptor> {
        self.jobs.get(&name)
    }

    pub fn job_names(&self) -> Vec<JobName> {
        self.jobs.keys().copied().collect()
    }

    /// 对每个已注册作业判断可用性（与是否请求无关）
    pub fn resolve_available(&self, session: &SessionLayout) -> BTreeMap<JobName, bool> {
        self.jobs
            .values()
            .map(|d| (d.name(), d.is_available(session)))
            .collect()
    }

    /// 请求且可用的作业，按执行顺序
    pub fn jobs_to_run(&self, session: &SessionLayout, flags: &JobFlags) -> Vec<JobName> {
        let available = self.resolve_available(session);
        flags
            .requested()
            .into_iter()
            .filter(|job| available.get(job).copied().unwrap_or(false))
            .collect()
    }
}
