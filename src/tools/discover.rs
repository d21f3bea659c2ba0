//! discover_sessions：在根目录下递归查找会话

use std::path::PathBuf;

use async_trait::async_trait;
use schemars::JsonSchema;
use serde::Deserialize;
use serde_json::Value;

use crate::core::discover_sessions;
use crate::tools::schema::{parse_args, schema_of};
use crate::tools::{Tool, ToolError};

#[derive(Debug, Deserialize, JsonSchema)]
pub struct DiscoverSessionsArgs {
    /// 要搜索的根目录
    pub root_directory: String,
}

pub struct DiscoverSessionsTool;

#[async_trait]
impl Tool for DiscoverSessionsTool {
    fn name(&self) -> &str {
        "discover_sessions"
    }

    fn description(&self) -> &str {
        "Recursively find session directories (directories containing raw_data/) under a root directory."
    }

    fn parameters_schema(&self) -> Value {
        schema_of::<DiscoverSessionsArgs>()
    }

    async fn execute(&self, args: Value) -> Result<Value, ToolError> {
        let args: DiscoverSessionsArgs = parse_args(args)?;
        let root = PathBuf::from(args.root_directory);
        let sessions = tokio::task::spawn_blocking(move || discover_sessions(&root))
            .await
            .map_err(|e| ToolError::Failed(e.to_string()))??;
        Ok(serde_json::json!({
            "sessions": sessions,
            "count": sessions.len(),
        }))
    }
}
