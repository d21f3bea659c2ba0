//! stdio 工具服务：按行读取 JSON 请求，按行写出 JSON 响应
//!
//! 请求：`{"id": 1, "method": "call_tool", "tool": "start_processing", "args": {...}}` 或 `{"id": 2, "method": "list_tools"}`；
//! 响应：`{"id": 1, "result": {...}}` 或 `{"id": 1, "error": {"code": "...", "message": "..."}}`。
//! stdout 只用于协议帧，日志写到 stderr。

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt};

use crate::tools::{ToolError, ToolExecutor};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Method {
    ListTools,
    CallTool,
}

#[derive(Debug, Deserialize)]
pub struct Request {
    #[serde(default)]
    pub id: Value,
    pub method: Method,
    #[serde(default)]
    pub tool: Option<String>,
    #[serde(default)]
    pub args: Value,
}

#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub code: String,
    pub message: String,
}

#[derive(Debug, Serialize)]
pub struct Response {
    pub id: Value,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<ErrorBody>,
}

impl Response {
    fn ok(id: Value, result: Value) -> Self {
        Self {
            id,
            result: Some(result),
            error: None,
        }
    }

    fn err(id: Value, code: &str, message: impl Into<String>) -> Self {
        Self {
            id,
            result: None,
            error: Some(ErrorBody {
                code: code.to_string(),
                message: message.into(),
            }),
        }
    }

    fn from_tool_error(id: Value, e: &ToolError) -> Self {
        Self::err(id, e.code(), e.to_string())
    }
}

/// 处理一行请求
pub async fn handle_line(executor: &ToolExecutor, line: &str) -> Response {
    let request: Request = match serde_json::from_str(line) {
        Ok(r) => r,
        Err(e) => return Response::err(Value::Null, "parse_error", e.to_string()),
    };
    match request.method {
        Method::ListTools => Response::ok(
            request.id,
            serde_json::json!({ "tools": executor.describe() }),
        ),
        Method::CallTool => {
            let Some(tool) = request.tool else {
                return Response::err(request.id, "invalid_request", "call_tool requires a tool name");
            };
            match executor.execute(&tool, request.args).await {
                Ok(result) => Response::ok(request.id, result),
                Err(e) => {
                    tracing::warn!(tool = %tool, error = %e, "tool call failed");
                    Response::from_tool_error(request.id, &e)
                }
            }
        }
    }
}

/// 服务循环：读到 EOF 时返回
pub async fn serve<R, W>(executor: &ToolExecutor, reader: R, mut writer: W) -> std::io::Result<()>
where
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let mut lines = reader.lines();
    while let Some(line) = lines.next_line().await? {
        if line.trim().is_empty() {
            continue;
        }
        let response = handle_line(executor, &line).await;
        let mut frame = serde_json::to_string(&response).unwrap_or_else(|e| {
            format!(r#"{{"id":null,"error":{{"code":"internal","message":"{e}"}}}}"#)
        });
        frame.push('\n');
        writer.write_all(frame.as_bytes()).await?;
        writer.flush().await?;
    }
    tracing::info!("stdin closed, server exiting");
    Ok(())
}
