//! start_processing：把一批会话提交给批次管理器，立即返回

use std::path::PathBuf;

use async_trait::async_trait;
use schemars::JsonSchema;
use serde::Deserialize;
use serde_json::Value;

use crate::core::{BatchManager, SubmitRequest, WorkerRequest};
use crate::jobs::JobFlags;
use crate::tools::schema::{parse_args, schema_of};
use crate::tools::{Tool, ToolError};

fn default_workers() -> i64 {
    -1
}

#[derive(Debug, Deserialize, JsonSchema)]
pub struct StartProcessingArgs {
    /// 要处理的会话路径
    pub session_paths: Vec<String>,
    #[serde(flatten)]
    pub flags: JobFlags,
    /// 每个会话的 worker 数；-1 表示按核心数自动分配
    #[serde(default = "default_workers")]
    pub workers: i64,
    /// 清空跟踪文件后重跑全部作业
    #[serde(default)]
    pub reset_tracker: bool,
}

pub struct StartProcessingTool {
    manager: BatchManager,
}

impl StartProcessingTool {
    pub fn new(manager: BatchManager) -> Self {
        Self { manager }
    }
}

#[async_trait]
impl Tool for StartProcessingTool {
    fn name(&self) -> &str {
        "start_processing"
    }

    fn description(&self) -> &str {
        "Queue sessions for behavior data processing and return immediately. Poll get_processing_status for progress."
    }

    fn parameters_schema(&self) -> Value {
        schema_of::<StartProcessingArgs>()
    }

    async fn execute(&self, args: Value) -> Result<Value, ToolError> {
        let args: StartProcessingArgs = parse_args(args)?;
        let summary = self.manager.submit(SubmitRequest {
            paths: args.session_paths.into_iter().map(PathBuf::from).collect(),
            flags: args.flags.normalized(),
            workers: WorkerRequest::from_raw(args.workers),
            reset: args.reset_tracker,
        })?;
        serde_json::to_value(summary).map_err(|e| ToolError::Failed(e.to_string()))
    }
}
