//! 应用配置：从 config/default.toml 与环境变量加载
//!
//! 加载顺序：先读 TOML 文件，再用环境变量 `BEHAVIOR__*` 覆盖（双下划线表示嵌套，如 `BEHAVIOR__PIPELINE__POLL_INTERVAL_MS=200`）。

use std::collections::HashMap;
use std::path::PathBuf;
use std::time::Duration;

use serde::Deserialize;

use crate::core::session::{LayoutOptions, DEFAULT_TRACKER_FILE};

/// 应用配置根（对应 config/default.toml 的顶层）
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct AppConfig {
    #[serde(default)]
    pub pipeline: PipelineSection,
    /// 键为作业名（如 runtime_processing）
    #[serde(default)]
    pub jobs: HashMap<String, JobCommandSection>,
    #[serde(default)]
    pub server: ServerSection,
}

/// [pipeline] 段：轮询间隔、输出根目录、跟踪文件名、核心数覆盖
#[derive(Debug, Clone, Deserialize)]
pub struct PipelineSection {
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
    /// processed_data 的替代根目录
    pub processed_data_root: Option<PathBuf>,
    #[serde(default = "default_tracker_file")]
    pub tracker_file: String,
    /// 覆盖探测到的 CPU 核心数
    pub cpu_count: Option<usize>,
}

impl Default for PipelineSection {
    fn default() -> Self {
        Self {
            poll_interval_ms: default_poll_interval_ms(),
            processed_data_root: None,
            tracker_file: default_tracker_file(),
            cpu_count: None,
        }
    }
}

impl PipelineSection {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms.max(1))
    }

    pub fn layout_options(&self) -> LayoutOptions {
        LayoutOptions {
            processed_data_root: self.processed_data_root.clone(),
            tracker_file: self.tracker_file.clone(),
        }
    }
}

fn default_poll_interval_ms() -> u64 {
    1000
}

fn default_tracker_file() -> String {
    DEFAULT_TRACKER_FILE.to_string()
}

/// [jobs.<name>] 段：外部解码命令，args 支持 {session} {workers} {job} {job_id} {output}
#[derive(Debug, Clone, Deserialize)]
pub struct JobCommandSection {
    pub command: String,
    #[serde(default)]
    pub args: Vec<String>,
}

/// [server] 段：HTTP 监听地址与单次工具调用超时
#[derive(Debug, Clone, Deserialize)]
pub struct ServerSection {
    #[serde(default = "default_http_bind")]
    pub http_bind: String,
    #[serde(default = "default_tool_timeout_secs")]
    pub tool_timeout_secs: u64,
}

impl Default for ServerSection {
    fn default() -> Self {
        Self {
            http_bind: default_http_bind(),
            tool_timeout_secs: default_tool_timeout_secs(),
        }
    }
}

fn default_http_bind() -> String {
    "127.0.0.1:8765".to_string()
}

fn default_tool_timeout_secs() -> u64 {
    30
}

/// 从 config 目录加载配置，环境变量 BEHAVIOR__* 可覆盖
///
/// 1. 按顺序查找 config/default.toml、../config/default.toml、default.toml，找到则作为第一源
/// 2. 若传入 config_path 且文件存在，则追加该文件（可覆盖前面的键）
/// 3. 最后叠加环境变量 BEHAVIOR__*（双下划线表示嵌套键）
pub fn load_config(config_path: Option<PathBuf>) -> Result<AppConfig, config::ConfigError> {
    let mut builder = config::Config::builder();

    let default_names = ["config/default", "../config/default", "default"];
    for name in default_names {
        let path = format!("{}.toml", name);
        if std::path::Path::new(&path).exists() {
            builder = builder.add_source(config::File::with_name(name).required(false));
            break;
        }
    }

    if let Some(ref path) = config_path {
        if path.exists() {
            builder = builder.add_source(config::File::from(path.clone()).required(false));
        } else {
            tracing::warn!(path = %path.display(), "config file not found, ignoring");
        }
    }

    builder = builder.add_source(
        config::Environment::with_prefix("BEHAVIOR")
            .separator("__")
            .try_parsing(true),
    );

    let c = builder.build()?;
    c.try_deserialize()
}
