//! 工具参数 JSON Schema 生成与参数解析
//!
//! 每个工具的参数结构体 derive JsonSchema，list_tools 通过 schemars 自动生成其 schema。

use schemars::{schema_for, JsonSchema};
use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::tools::ToolError;

/// 参数结构体的 JSON Schema
pub fn schema_of<T: JsonSchema>() -> Value {
    let schema = schema_for!(T);
    serde_json::to_value(schema).unwrap_or_else(|_| serde_json::json!({"type": "object"}))
}

/// 解析工具参数；null 视为空对象
pub fn parse_args<T: DeserializeOwned>(args: Value) -> Result<T, ToolError> {
    let args = if args.is_null() {
        Value::Object(Default::default())
    } else {
        args
    };
    serde_json::from_value(args).map_err(|e| ToolError::InvalidArguments(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[allow(dead_code)]
    #[derive(Debug, Deserialize, JsonSchema)]
    struct Args {
        /// 会话路径
        session_path: String,
        #[serde(default)]
        verbose: bool,
    }

    #[test]
    fn test_schema_lists_required_fields() {
        let schema = schema_of::<Args>();
        assert_eq!(schema["required"], serde_json::json!(["session_path"]));
        assert!(schema["properties"]["verbose"].is_object());
    }

    #[test]
    fn test_parse_args_reports_missing_field() {
        let err = parse_args::<Args>(Value::Null).unwrap_err();
        assert_eq!(err.code(), "invalid_arguments");
        let ok: Args = parse_args(serde_json::json!({"session_path": "/x"})).unwrap();
        assert_eq!(ok.session_path, "/x");
    }
}
