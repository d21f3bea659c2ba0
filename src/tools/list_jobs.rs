//! list_available_jobs：报告某个会话上哪些作业的输入文件存在

use std::path::PathBuf;

use async_trait::async_trait;
use schemars::JsonSchema;
use serde::Deserialize;
use serde_json::Value;

use crate::core::SessionRunner;
use crate::jobs::JobName;
use crate::tools::schema::{parse_args, schema_of};
use crate::tools::{Tool, ToolError};

#[derive(Debug, Deserialize, JsonSchema)]
pub struct SessionPathArgs {
    /// 会话根目录或其 raw_data 目录
    pub session_path: String,
}

pub struct ListAvailableJobsTool {
    runner: SessionRunner,
}

impl ListAvailableJobsTool {
    pub fn new(runner: SessionRunner) -> Self {
        Self { runner }
    }
}

#[async_trait]
impl Tool for ListAvailableJobsTool {
    fn name(&self) -> &str {
        "list_available_jobs"
    }

    fn description(&self) -> &str {
        "List which processing jobs have their input logs present in a session."
    }

    fn parameters_schema(&self) -> Value {
        schema_of::<SessionPathArgs>()
    }

    async fn execute(&self, args: Value) -> Result<Value, ToolError> {
        let args: SessionPathArgs = parse_args(args)?;
        let layout = self.runner.resolve(&PathBuf::from(args.session_path))?;
        let availability = self.runner.registry().resolve_available(&layout);
        let (available, not_available): (Vec<(JobName, bool)>, Vec<(JobName, bool)>) =
            availability.into_iter().partition(|(_, ok)| *ok);
        let names = |v: Vec<(JobName, bool)>| v.into_iter().map(|(j, _)| j).collect::<Vec<_>>();
        Ok(serde_json::json!({
            "session": layout.name(),
            "available": names(available),
            "not_available": names(not_available),
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::session::{LayoutOptions, BEHAVIOR_DATA_DIR, RAW_DATA_DIR};
    use crate::jobs::{JobRegistry, UnconfiguredExecutor};
    use std::sync::Arc;

    #[tokio::test]
    async fn test_partitions_jobs() {
        let dir = tempfile::tempdir().unwrap();
        let data = dir.path().join("s1").join(RAW_DATA_DIR).join(BEHAVIOR_DATA_DIR);
        std::fs::create_dir_all(&data).unwrap();
        std::fs::write(data.join("51_log.npz"), b"npz").unwrap();

        let mut registry = JobRegistry::new();
        for job in JobName::ALL {
            registry.register(job, UnconfiguredExecutor);
        }
        let tool = ListAvailableJobsTool::new(SessionRunner::new(
            Arc::new(registry),
            LayoutOptions::default(),
        ));
        let out = tool
            .execute(serde_json::json!({"session_path": dir.path().join("s1")}))
            .await
            .unwrap();
        assert_eq!(out["session"], "s1");
        assert_eq!(out["available"], serde_json::json!(["face_camera_processing"]));
        assert_eq!(out["not_available"].as_array().unwrap().len(), 5);
    }
}
