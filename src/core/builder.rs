//! 流水线构建器：统一的初始化逻辑
//!
//! CLI、stdio 服务与 HTTP 服务共用同一套作业注册表、会话执行器、批次管理器与工具。

use std::sync::Arc;
use std::time::Duration;

use crate::config::AppConfig;
use crate::core::{BatchManager, BatchOptions, SessionRunner};
use crate::jobs::JobRegistry;
use crate::tools::{
    CheckOutputFilesTool, DiscoverSessionsTool, GetProcessingStatusTool, ListAvailableJobsTool,
    StartProcessingTool, ToolExecutor, ToolRegistry,
};

/// 流水线构建器
pub struct PipelineBuilder {
    config: AppConfig,
    registry: Option<JobRegistry>,
    cpu_count: Option<usize>,
    poll_interval: Option<Duration>,
}

impl PipelineBuilder {
    pub fn new(config: AppConfig) -> Self {
        Self {
            cpu_count: config.pipeline.cpu_count,
            config,
            registry: None,
            poll_interval: None,
        }
    }

    /// 使用自定义作业注册表（默认按配置中的外部命令构建）
    pub fn with_registry(mut self, registry: JobRegistry) -> Self {
        self.registry = Some(registry);
        self
    }

    pub fn with_cpu_count(mut self, cpus: usize) -> Self {
        self.cpu_count = Some(cpus);
        self
    }

    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = Some(interval);
        self
    }

    pub fn build_runner(&self) -> SessionRunner {
        let registry = self
            .registry
            .clone()
            .unwrap_or_else(|| JobRegistry::from_config(&self.config));
        SessionRunner::new(Arc::new(registry), self.config.pipeline.layout_options())
    }

    pub fn build_manager(&self, runner: SessionRunner) -> BatchManager {
        BatchManager::new(
            runner,
            BatchOptions {
                poll_interval: self
                    .poll_interval
                    .unwrap_or_else(|| self.config.pipeline.poll_interval()),
                cpu_count: self.cpu_count,
            },
        )
    }

    /// 构建工具注册表（五个工具共享同一个批次管理器）
    pub fn build_tool_registry(&self, manager: &BatchManager) -> ToolRegistry {
        let mut tools = ToolRegistry::new();
        tools.register(DiscoverSessionsTool);
        tools.register(ListAvailableJobsTool::new(manager.runner().clone()));
        tools.register(StartProcessingTool::new(manager.clone()));
        tools.register(GetProcessingStatusTool::new(manager.clone()));
        tools.register(CheckOutputFilesTool::new(manager.runner().clone()));
        tools
    }

    /// 构建全部组件
    pub fn build(&self) -> PipelineComponents {
        let runner = self.build_runner();
        let manager = self.build_manager(runner.clone());
        let tools = self.build_tool_registry(&manager);
        PipelineComponents {
            executor: ToolExecutor::new(tools, self.config.server.tool_timeout_secs),
            manager,
            runner,
            config: self.config.clone(),
        }
    }
}

/// 构建结果
pub struct PipelineComponents {
    pub runner: SessionRunner,
    pub manager: BatchManager,
    pub executor: ToolExecutor,
    pub config: AppConfig,
}
