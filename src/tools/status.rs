//! get_processing_status：批次内全部会话的进度快照

use async_trait::async_trait;
use serde_json::Value;

use crate::core::BatchManager;
use crate::tools::{Tool, ToolError};

pub struct GetProcessingStatusTool {
    manager: BatchManager,
}

impl GetProcessingStatusTool {
    pub fn new(manager: BatchManager) -> Self {
        Self { manager }
    }
}

#[async_trait]
impl Tool for GetProcessingStatusTool {
    fn name(&self) -> &str {
        "get_processing_status"
    }

    fn description(&self) -> &str {
        "Report the phase, job progress and errors of every session in the current batch."
    }

    async fn execute(&self, _args: Value) -> Result<Value, ToolError> {
        let manager = self.manager.clone();
        // 跟踪文件读取是阻塞 IO
        let status = tokio::task::spawn_blocking(move || manager.status())
            .await
            .map_err(|e| ToolError::Failed(e.to_string()))?;
        let mut out = serde_json::to_value(&status).map_err(|e| ToolError::Failed(e.to_string()))?;
        if status.is_empty() {
            out["message"] = Value::String("No batch processing active".to_string());
        }
        Ok(out)
    }
}
