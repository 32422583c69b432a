use super::tools::{Toolbox, definitions};
use anyhow::{Context, Result};
use serde::Deserialize;
use serde_json::{Value, json};
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt};
use tracing::{debug, error, info, warn};

pub const PROTOCOL_VERSION: &str = "2024-11-05";
pub const SERVER_NAME: &str = "chatbot-pro-ops";

const PARSE_ERROR: i64 = -32700;
const INVALID_REQUEST: i64 = -32600;
const METHOD_NOT_FOUND: i64 = -32601;
const INVALID_PARAMS: i64 = -32602;

#[derive(Debug, Deserialize)]
struct Request {
    #[serde(default)]
    jsonrpc: Option<String>,
    /// Absent on notifications.
    #[serde(default)]
    id: Option<Value>,
    method: String,
    #[serde(default)]
    params: Value,
}

fn success(id: Value, result: Value) -> Value {
    json!({"jsonrpc": "2.0", "id": id, "result": result})
}

fn failure(id: Value, code: i64, message: &str) -> Value {
    json!({"jsonrpc": "2.0", "id": id, "error": {"code": code, "message": message}})
}

/// Handles one frame. Returns `None` when no reply is due.
pub async fn handle_line(toolbox: &Toolbox, line: &str) -> Option<Value> {
    let request: Request = match serde_json::from_str(line) {
        Ok(request) => request,
        Err(e) => {
            warn!("Unparseable request: {}", e);
            return Some(failure(Value::Null, PARSE_ERROR, "Parse error"));
        }
    };

    let Some(id) = request.id else {
        debug!(method = %request.method, "Notification received");
        return None;
    };
    if request.jsonrpc.as_deref() != Some("2.0") {
        return Some(failure(id, INVALID_REQUEST, "Invalid Request"));
    }

    Some(match request.method.as_str() {
        "initialize" => success(
            id,
            json!({
                "protocolVersion": PROTOCOL_VERSION,
                "capabilities": {"tools": {}},
                "serverInfo": {"name": SERVER_NAME, "version": env!("CARGO_PKG_VERSION")},
            }),
        ),
        "ping" => success(id, json!({})),
        "tools/list" => {
            info!("Tools list requested");
            success(id, json!({"tools": definitions()}))
        }
        "tools/call" => {
            let Some(name) = request.params["name"].as_str() else {
                return Some(failure(id, INVALID_PARAMS, "Missing tool name"));
            };
            let args = match &request.params["arguments"] {
                Value::Null => json!({}),
                args => args.clone(),
            };
            success(id, call_tool(toolbox, name, &args).await)
        }
        other => {
            warn!(method = other, "Unknown method");
            failure(id, METHOD_NOT_FOUND, "Method not found")
        }
    })
}

async fn call_tool(toolbox: &Toolbox, name: &str, args: &Value) -> Value {
    let (body, is_error) = match toolbox.call(name, args).await {
        Ok(body) => (body, false),
        Err(e) => {
            error!(tool = name, "Tool failed: {}", e);
            (json!({"success": false, "error": e.to_string()}), true)
        }
    };
    let text = serde_json::to_string_pretty(&body).unwrap_or_else(|_| body.to_string());
    json!({
        "content": [{"type": "text", "text": text}],
        "isError": is_error,
    })
}

/// Reads newline-delimited requests until EOF and writes one reply per line.
pub async fn serve<R, W>(toolbox: &Toolbox, reader: R, mut writer: W) -> Result<()>
where
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin,
{
    info!("Ops server listening on stdio");
    let mut lines = reader.lines();
    while let Some(line) = lines.next_line().await.context("Failed to read request")? {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        if let Some(reply) = handle_line(toolbox, line).await {
            let mut frame = reply.to_string();
            frame.push('\n');
            writer
                .write_all(frame.as_bytes())
                .await
                .context("Failed to write reply")?;
            writer.flush().await.context("Failed to flush reply")?;
        }
    }
    info!("Ops input closed");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::automation::AutomationEngine;
    use crate::automation::fakes::{FakeLookup, quick_settings};
    use crate::store::test_store;
    use std::sync::Arc;

    async fn toolbox() -> (tempfile::TempDir, Toolbox) {
        let (dir, store) = test_store().await;
        let engine = AutomationEngine::new(store, Arc::new(FakeLookup::default()), quick_settings());
        (dir, Toolbox::new(engine))
    }

    #[tokio::test]
    async fn initialize_and_list() {
        let (_dir, tools) = toolbox().await;

        let reply = handle_line(&tools, r#"{"jsonrpc":"2.0","id":1,"method":"initialize","params":{}}"#)
            .await
            .unwrap();
        assert_eq!(reply["id"], 1);
        assert_eq!(reply["result"]["serverInfo"]["name"], SERVER_NAME);

        let reply = handle_line(&tools, r#"{"jsonrpc":"2.0","id":"a","method":"tools/list"}"#)
            .await
            .unwrap();
        assert_eq!(reply["result"]["tools"].as_array().unwrap().len(), 13);
    }

    #[tokio::test]
    async fn notifications_get_no_reply() {
        let (_dir, tools) = toolbox().await;
        let reply = handle_line(&tools, r#"{"jsonrpc":"2.0","method":"notifications/initialized"}"#).await;
        assert!(reply.is_none());
    }

    #[tokio::test]
    async fn errors_use_protocol_codes() {
        let (_dir, tools) = toolbox().await;

        let reply = handle_line(&tools, "{not json").await.unwrap();
        assert_eq!(reply["error"]["code"], PARSE_ERROR);
        assert!(reply["id"].is_null());

        let reply = handle_line(&tools, r#"{"jsonrpc":"2.0","id":2,"method":"resources/list"}"#)
            .await
            .unwrap();
        assert_eq!(reply["error"]["code"], METHOD_NOT_FOUND);

        let reply = handle_line(&tools, r#"{"jsonrpc":"2.0","id":3,"method":"tools/call","params":{}}"#)
            .await
            .unwrap();
        assert_eq!(reply["error"]["code"], INVALID_PARAMS);
    }

    #[tokio::test]
    async fn tool_failures_are_flagged_results() {
        let (_dir, tools) = toolbox().await;
        let reply = handle_line(
            &tools,
            r#"{"jsonrpc":"2.0","id":4,"method":"tools/call","params":{"name":"verify_submission","arguments":{"submissionId":"x"}}}"#,
        )
        .await
        .unwrap();

        let result = &reply["result"];
        assert_eq!(result["isError"], true);
        assert_eq!(result["content"][0]["type"], "text");
        let body: Value = serde_json::from_str(result["content"][0]["text"].as_str().unwrap()).unwrap();
        assert_eq!(body["success"], false);
        assert_eq!(body["error"], "Invalid UUID format");
    }

    #[tokio::test]
    async fn serve_answers_each_request_line() {
        let (_dir, tools) = toolbox().await;
        let input = concat!(
            r#"{"jsonrpc":"2.0","id":1,"method":"ping"}"#,
            "\n\n",
            r#"{"jsonrpc":"2.0","method":"notifications/initialized"}"#,
            "\n",
            r#"{"jsonrpc":"2.0","id":2,"method":"tools/call","params":{"name":"get_automation_stats"}}"#,
            "\n",
        );
        let mut output = Vec::new();
        serve(&tools, input.as_bytes(), &mut output).await.unwrap();

        let replies: Vec<Value> = String::from_utf8(output)
            .unwrap()
            .lines()
            .map(|l| serde_json::from_str(l).unwrap())
            .collect();
        assert_eq!(replies.len(), 2);
        assert_eq!(replies[0]["id"], 1);
        assert_eq!(replies[1]["result"]["isError"], false);
    }
}
