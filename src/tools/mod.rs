//! 工具层：对外暴露的五个无状态操作，以及注册表、执行器与参数 schema

pub mod discover;
pub mod executor;
pub mod list_jobs;
pub mod outputs;
pub mod registry;
pub mod schema;
pub mod start;
pub mod status;

pub use discover::DiscoverSessionsTool;
pub use executor::ToolExecutor;
pub use list_jobs::ListAvailableJobsTool;
pub use outputs::CheckOutputFilesTool;
pub use registry::{Tool, ToolError, ToolInfo, ToolRegistry};
pub use start::StartProcessingTool;
pub use status::GetProcessingStatusTool;
