//! check_output_files：列出会话输出目录中的文件及大小

use std::path::PathBuf;

use async_trait::async_trait;
use serde_json::Value;

use crate::core::{list_output_files, SessionRunner};
use crate::tools::list_jobs::SessionPathArgs;
use crate::tools::schema::{parse_args, schema_of};
use crate::tools::{Tool, ToolError};

pub struct CheckOutputFilesTool {
    runner: SessionRunner,
}

impl CheckOutputFilesTool {
    pub fn new(runner: SessionRunner) -> Self {
        Self { runner }
    }
}

#[async_trait]
impl Tool for CheckOutputFilesTool {
    fn name(&self) -> &str {
        "check_output_files"
    }

    fn description(&self) -> &str {
        "List the processed output files (name and size) written for a session."
    }

    fn parameters_schema(&self) -> Value {
        schema_of::<SessionPathArgs>()
    }

    async fn execute(&self, args: Value) -> Result<Value, ToolError> {
        let args: SessionPathArgs = parse_args(args)?;
        let layout = self.runner.resolve(&PathBuf::from(args.session_path))?;
        let files = list_output_files(&layout)?;
        Ok(serde_json::json!({
            "session": layout.name(),
            "output_directory": layout.output_dir(),
            "file_count": files.len(),
            "files": files,
        }))
    }
}
