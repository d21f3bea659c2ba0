//! behavior-pipeline - 行为数据处理编排引擎
//!
//! 模块划分：
//! - **config**: 应用配置加载（TOML + 环境变量）
//! - **core**: 资源分配、会话布局、跟踪器、会话执行器、批次管理
//! - **jobs**: 作业名称与请求标志、作业 ID、执行器、作业注册表
//! - **observability**: 日志初始化
//! - **server**: stdio JSON 行协议服务
//! - **tools**: 对外工具（发现、提交、状态、可用作业、输出文件）与执行器

pub mod config;
pub mod core;
pub mod jobs;
pub mod observability;
pub mod server;
pub mod tools;

pub use crate::core::{BatchManager, PipelineBuilder, PipelineError, SessionRunner};
