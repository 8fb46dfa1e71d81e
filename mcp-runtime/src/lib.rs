//! MCP (Model Context Protocol) runtime: JSON-RPC 2.0 dispatch plus the
//! per-session tool surface. One [`ToolHandlerSet`] per session; the HTTP
//! server routes requests here, the standalone binary runs the stdio loop.

use std::sync::Arc;

use chrono::Utc;
use serde_json::{Map, Value, json};
use tokio::io::{self, AsyncBufReadExt, AsyncReadExt, AsyncWriteExt, BufReader};

pub mod session;

pub use session::{Session, SessionRegistry};

use repkit_core::history::{sessions_in_range, summarize};
use repkit_core::model::ProgramRequest;
use repkit_core::program::{ProgramIdSource, build_program};
use repkit_core::providers::{DEFAULT_IDENTITY, Providers};

pub const MCP_PROTOCOL_VERSION: &str = "2024-11-05";
pub const MCP_SERVER_NAME: &str = "repkit-mcp";
/// Transport header carrying the opaque session token.
pub const SESSION_HEADER: &str = "mcp-session-id";

/// The fixed tool set bound to one session. Immutable once registered; the
/// only mutable state it touches is the session's identity cell.
pub struct ToolHandlerSet {
    session: Arc<Session>,
    providers: Providers,
    ids: Arc<dyn ProgramIdSource>,
}

impl ToolHandlerSet {
    pub fn new(session: Arc<Session>, providers: Providers, ids: Arc<dyn ProgramIdSource>) -> Self {
        Self {
            session,
            providers,
            ids,
        }
    }

    pub fn session(&self) -> &Arc<Session> {
        &self.session
    }

    /// Dispatch one inbound JSON-RPC message or batch. Notifications produce
    /// no response, so the result may be empty.
    pub async fn handle_incoming_message(&self, incoming: Value) -> Vec<Value> {
        let mut responses = Vec::new();

        if let Some(batch) = incoming.as_array() {
            if batch.is_empty() {
                responses.push(error_response(
                    Value::Null,
                    RpcError::invalid_request("Batch request must not be empty"),
                ));
                return responses;
            }
            for item in batch {
                if let Some(response) = self.handle_single_message(item.clone()).await {
                    responses.push(response);
                }
            }
            return responses;
        }

        if let Some(response) = self.handle_single_message(incoming).await {
            responses.push(response);
        }
        responses
    }

    async fn handle_single_message(&self, incoming: Value) -> Option<Value> {
        let Some(obj) = incoming.as_object() else {
            return Some(error_response(
                Value::Null,
                RpcError::invalid_request("Request must be a JSON object"),
            ));
        };

        if obj.get("jsonrpc").and_then(Value::as_str) != Some("2.0") {
            let id = obj.get("id").cloned().unwrap_or(Value::Null);
            return Some(error_response(
                id,
                RpcError::invalid_request("jsonrpc must be '2.0'"),
            ));
        }

        let Some(method) = obj.get("method").and_then(Value::as_str) else {
            // Most likely a client response; this server issues no outbound
            // requests, so there is nothing to correlate it with.
            return None;
        };

        let params = obj.get("params").cloned().unwrap_or(Value::Null);
        if let Some(id) = obj.get("id").cloned() {
            let result = self.handle_request(method, params).await;
            Some(match result {
                Ok(payload) => success_response(id, payload),
                Err(err) => error_response(id, err),
            })
        } else {
            // Notifications (initialized, cancelled, unknown) are ignored.
            None
        }
    }

    async fn handle_request(&self, method: &str, params: Value) -> Result<Value, RpcError> {
        match method {
            "initialize" => Ok(self.initialize_payload()),
            "ping" => Ok(json!({})),
            "tools/list" => Ok(tools_list_payload()),
            "tools/call" => self.handle_tools_call(params).await,
            "prompts/list" => Ok(json!({ "prompts": [] })),
            _ => Err(RpcError::method_not_found(method)),
        }
    }

    fn initialize_payload(&self) -> Value {
        json!({
            "protocolVersion": MCP_PROTOCOL_VERSION,
            "capabilities": {
                "tools": {
                    "listChanged": false
                },
                "prompts": {
                    "listChanged": false
                }
            },
            "serverInfo": {
                "name": MCP_SERVER_NAME,
                "version": env!("CARGO_PKG_VERSION")
            },
            "instructions": "Training-program tools scoped to the session identity. Read the profile and recent history first, check one-rep-max data with get_rm_maxes, then call create_program for a weekly plan."
        })
    }

    async fn handle_tools_call(&self, params: Value) -> Result<Value, RpcError> {
        let params = params
            .as_object()
            .ok_or_else(|| RpcError::invalid_params("tools/call params must be an object"))?;

        let name = params
            .get("name")
            .and_then(Value::as_str)
            .ok_or_else(|| RpcError::invalid_params("tools/call requires string field 'name'"))?;

        let args = match params.get("arguments") {
            Some(Value::Object(map)) => map.clone(),
            Some(Value::Null) | None => Map::new(),
            Some(_) => {
                return Err(RpcError::invalid_params(
                    "tools/call 'arguments' must be an object",
                ));
            }
        };

        match self.execute_tool(name, &args).await {
            Ok(payload) => Ok(tool_call_response(&payload, false)),
            // Input-contract violations are protocol-level errors; the call
            // never reached the tool.
            Err(err) if matches!(err.code.as_str(), "validation_failed" | "unknown_tool") => {
                Err(RpcError::invalid_params(err.message.clone()).with_data(err.to_value()))
            }
            Err(err) => Ok(tool_call_response(&err.to_value(), true)),
        }
    }

    async fn execute_tool(&self, tool_name: &str, args: &Map<String, Value>) -> Result<Value, ToolError> {
        match tool_name {
            "get_user_profile" => self.tool_get_user_profile().await,
            "get_week_summary" => self.tool_get_week_summary(args).await,
            "list_exercises" => self.tool_list_exercises(args).await,
            "get_rm_maxes" => self.tool_get_rm_maxes(args).await,
            "create_program" => self.tool_create_program(args).await,
            _ => Err(ToolError::new(
                "unknown_tool",
                format!("Unknown tool '{tool_name}'"),
            )
            .with_field("name")),
        }
    }

    async fn tool_get_user_profile(&self) -> Result<Value, ToolError> {
        let user_id = self.session.identity();
        let profile = self
            .providers
            .profiles
            .profile(&user_id)
            .or_else(|| self.providers.profiles.profile(DEFAULT_IDENTITY))
            .ok_or_else(|| {
                ToolError::new(
                    "profile_unavailable",
                    "No profile found for the session identity or the demo fallback.",
                )
            })?;
        serde_json::to_value(profile)
            .map_err(|e| ToolError::new("internal_error", e.to_string()))
    }

    async fn tool_get_week_summary(&self, args: &Map<String, Value>) -> Result<Value, ToolError> {
        let start_date = required_string(args, "start_date")?;
        let end_date = required_string(args, "end_date")?;

        let user_id = self.session.identity();
        let all = self.providers.history.sessions(&user_id);
        let in_range = sessions_in_range(&all, &start_date, &end_date);
        let summary = summarize(&in_range);

        let sessions: Vec<Value> = in_range
            .iter()
            .map(|s| {
                json!({
                    "date": s.date,
                    "title": s.title,
                    "rpe": s.perceived_exertion_rpe,
                    "duration_min": s.duration_min
                })
            })
            .collect();

        Ok(json!({
            "user_id": user_id,
            "start_date": start_date,
            "end_date": end_date,
            "summary": summary,
            "sessions": sessions
        }))
    }

    async fn tool_list_exercises(&self, args: &Map<String, Value>) -> Result<Value, ToolError> {
        let query = arg_optional_string(args, "query")?;
        let exercises = self.providers.catalog.all();
        let filtered: Vec<_> = match query.as_deref().map(str::trim).filter(|q| !q.is_empty()) {
            Some(query) => {
                let needle = query.to_lowercase();
                exercises
                    .into_iter()
                    .filter(|e| {
                        format!("{} {} {}", e.key, e.name, e.group)
                            .to_lowercase()
                            .contains(&needle)
                    })
                    .collect()
            }
            None => exercises,
        };
        serde_json::to_value(filtered)
            .map_err(|e| ToolError::new("internal_error", e.to_string()))
    }

    async fn tool_get_rm_maxes(&self, args: &Map<String, Value>) -> Result<Value, ToolError> {
        let exercise_ids = required_i64_array(args, "exercise_ids")?;
        let user_id = self.session.identity();

        let mut rms = Map::new();
        for id in exercise_ids {
            let value = self
                .providers
                .rm
                .one_rm(&user_id, id)
                .map(|v| json!(v))
                .unwrap_or(Value::Null);
            rms.insert(id.to_string(), value);
        }

        Ok(json!({
            "user_id": user_id,
            "rms": rms
        }))
    }

    async fn tool_create_program(&self, args: &Map<String, Value>) -> Result<Value, ToolError> {
        let request: ProgramRequest = serde_json::from_value(Value::Object(args.clone()))
            .map_err(|e| {
                ToolError::new("validation_failed", e.to_string()).with_field("arguments")
            })?;
        if !(20..=120).contains(&request.session_minutes) {
            return Err(ToolError::new(
                "validation_failed",
                "'session_minutes' must be between 20 and 120",
            )
            .with_field("session_minutes"));
        }

        let user_id = self.session.identity();
        let output = build_program(
            &user_id,
            &request,
            self.providers.catalog.as_ref(),
            self.providers.rm.as_ref(),
            self.ids.as_ref(),
            Utc::now(),
        )
        .map_err(|e| ToolError::new("program_synthesis_failed", e.to_string()))?;

        Ok(json!({
            "user_id": user_id,
            "summary_text": output.summary_text,
            "program_json": output.plan
        }))
    }
}

#[derive(Debug)]
struct ToolDefinition {
    name: &'static str,
    description: &'static str,
    input_schema: Value,
}

fn tool_definitions() -> Vec<ToolDefinition> {
    vec![
        ToolDefinition {
            name: "get_user_profile",
            description: "Get the current user's training profile (read-only).",
            input_schema: json!({
                "type": "object",
                "properties": {},
                "additionalProperties": false
            }),
        },
        ToolDefinition {
            name: "get_week_summary",
            description: "Return a compact weekly summary for the user (read-only).",
            input_schema: json!({
                "type": "object",
                "properties": {
                    "start_date": { "type": "string", "description": "YYYY-MM-DD" },
                    "end_date": { "type": "string", "description": "YYYY-MM-DD" }
                },
                "required": ["start_date", "end_date"],
                "additionalProperties": false
            }),
        },
        ToolDefinition {
            name: "list_exercises",
            description: "List available exercises (id, name, key, knee_friendly).",
            input_schema: json!({
                "type": "object",
                "properties": {
                    "query": { "type": "string", "description": "Optional filter, e.g. 'squat' or 'upper'." }
                },
                "additionalProperties": false
            }),
        },
        ToolDefinition {
            name: "get_rm_maxes",
            description: "Get 1RM values for exercise IDs for the current user.",
            input_schema: json!({
                "type": "object",
                "properties": {
                    "exercise_ids": { "type": "array", "items": { "type": "number" } }
                },
                "required": ["exercise_ids"],
                "additionalProperties": false
            }),
        },
        ToolDefinition {
            name: "create_program",
            description: "Create a weekly program from user input using exercise IDs and RM data. Returns program JSON + short summary text.",
            input_schema: json!({
                "type": "object",
                "properties": {
                    "days_per_week": { "type": "number", "minimum": 1, "maximum": 7 },
                    "session_minutes": { "type": "number", "minimum": 20, "maximum": 120 },
                    "goal": {
                        "type": "object",
                        "properties": {
                            "primary": { "type": "string", "enum": ["strength", "hypertrophy", "fat_loss", "fitness"] },
                            "secondary": { "type": "string" }
                        },
                        "required": ["primary"]
                    },
                    "constraints": {
                        "type": "object",
                        "properties": {
                            "knee_sensitive": { "type": "boolean" }
                        },
                        "additionalProperties": true
                    },
                    "preferred_exercise_ids": {
                        "type": "array",
                        "items": { "type": "number" },
                        "description": "Optional: user-selected main lifts."
                    }
                },
                "required": ["days_per_week", "session_minutes", "goal"],
                "additionalProperties": false
            }),
        },
    ]
}

fn tools_list_payload() -> Value {
    let tools: Vec<Value> = tool_definitions()
        .into_iter()
        .map(|tool| {
            json!({
                "name": tool.name,
                "description": tool.description,
                "inputSchema": tool.input_schema,
            })
        })
        .collect();
    json!({ "tools": tools })
}

#[derive(Debug)]
pub struct RpcError {
    pub code: i64,
    pub message: String,
    pub data: Option<Value>,
}

impl RpcError {
    fn invalid_request(message: impl Into<String>) -> Self {
        Self {
            code: -32600,
            message: message.into(),
            data: None,
        }
    }

    fn method_not_found(method: &str) -> Self {
        Self {
            code: -32601,
            message: format!("Method not found: {method}"),
            data: None,
        }
    }

    fn invalid_params(message: impl Into<String>) -> Self {
        Self {
            code: -32602,
            message: message.into(),
            data: None,
        }
    }

    fn with_data(mut self, data: Value) -> Self {
        self.data = Some(data);
        self
    }
}

/// Structured tool failure: machine-readable code plus remediation hints.
#[derive(Debug, Clone)]
pub struct ToolError {
    pub code: String,
    pub message: String,
    pub field: Option<String>,
    pub docs_hint: Option<String>,
}

impl ToolError {
    fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
            field: None,
            docs_hint: None,
        }
    }

    fn with_field(mut self, field: impl Into<String>) -> Self {
        self.field = Some(field.into());
        self
    }

    fn to_value(&self) -> Value {
        let mut payload = json!({
            "error": self.code,
            "message": self.message
        });
        if let Some(field) = &self.field {
            payload["field"] = Value::String(field.clone());
        }
        if let Some(docs_hint) = &self.docs_hint {
            payload["docs_hint"] = Value::String(docs_hint.clone());
        }
        payload
    }
}

fn required_string(args: &Map<String, Value>, key: &str) -> Result<String, ToolError> {
    let value = args.get(key).ok_or_else(|| {
        ToolError::new(
            "validation_failed",
            format!("Missing required field '{key}'"),
        )
        .with_field(key)
    })?;
    match value {
        Value::String(v) if !v.trim().is_empty() => Ok(v.clone()),
        Value::String(_) => Err(ToolError::new(
            "validation_failed",
            format!("'{key}' must not be empty"),
        )
        .with_field(key)),
        _ => Err(
            ToolError::new("validation_failed", format!("'{key}' must be a string"))
                .with_field(key),
        ),
    }
}

fn arg_optional_string(args: &Map<String, Value>, key: &str) -> Result<Option<String>, ToolError> {
    match args.get(key) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(v)) => Ok(Some(v.clone())),
        Some(_) => Err(
            ToolError::new("validation_failed", format!("'{key}' must be a string"))
                .with_field(key),
        ),
    }
}

fn required_i64_array(args: &Map<String, Value>, key: &str) -> Result<Vec<i64>, ToolError> {
    let value = args.get(key).ok_or_else(|| {
        ToolError::new(
            "validation_failed",
            format!("Missing required field '{key}'"),
        )
        .with_field(key)
    })?;
    let items = value.as_array().ok_or_else(|| {
        ToolError::new(
            "validation_failed",
            format!("'{key}' must be an array of numbers"),
        )
        .with_field(key)
    })?;
    let mut out = Vec::with_capacity(items.len());
    for item in items {
        let id = item.as_i64().ok_or_else(|| {
            ToolError::new(
                "validation_failed",
                format!("'{key}' items must be integers"),
            )
            .with_field(key)
        })?;
        out.push(id);
    }
    Ok(out)
}

fn tool_call_response(payload: &Value, is_error: bool) -> Value {
    json!({
        "content": [{
            "type": "text",
            "text": to_pretty_json(payload)
        }],
        "isError": is_error
    })
}

fn success_response(id: Value, result: Value) -> Value {
    json!({
        "jsonrpc": "2.0",
        "id": id,
        "result": result
    })
}

fn error_response(id: Value, error: RpcError) -> Value {
    let mut payload = json!({
        "jsonrpc": "2.0",
        "id": id,
        "error": {
            "code": error.code,
            "message": error.message
        }
    });
    if let Some(data) = error.data {
        payload["error"]["data"] = data;
    }
    payload
}

pub fn to_pretty_json(value: &Value) -> String {
    serde_json::to_string_pretty(value).unwrap_or_else(|_| "{}".to_string())
}

/// Run the handler set over stdio with `Content-Length` framing. One process,
/// one session; ends cleanly at EOF.
pub async fn serve_stdio(handlers: &ToolHandlerSet) -> Result<(), String> {
    let stdin = io::stdin();
    let mut reader = BufReader::new(stdin);
    let mut stdout = io::stdout();

    loop {
        let incoming = read_framed_json(&mut reader)
            .await
            .map_err(|e| format!("Failed to read MCP message: {e}"))?;
        let Some(incoming) = incoming else {
            break;
        };

        let responses = handlers.handle_incoming_message(incoming).await;
        for response in responses {
            write_framed_json(&mut stdout, &response)
                .await
                .map_err(|e| format!("Failed to write MCP response: {e}"))?;
        }
    }

    Ok(())
}

async fn read_framed_json(
    reader: &mut BufReader<tokio::io::Stdin>,
) -> Result<Option<Value>, std::io::Error> {
    let mut content_length: Option<usize> = None;

    loop {
        let mut line = String::new();
        let bytes_read = reader.read_line(&mut line).await?;
        if bytes_read == 0 {
            if content_length.is_none() {
                return Ok(None);
            }
            return Err(std::io::Error::new(
                std::io::ErrorKind::UnexpectedEof,
                "Unexpected EOF while reading MCP headers",
            ));
        }

        if line == "\r\n" {
            break;
        }

        let line = line.trim_end_matches(['\r', '\n']);
        if line.to_ascii_lowercase().starts_with("content-length:") {
            let raw_len = line
                .split_once(':')
                .map(|(_, right)| right.trim())
                .unwrap_or_default();
            let parsed = raw_len.parse::<usize>().map_err(|_| {
                std::io::Error::new(
                    std::io::ErrorKind::InvalidData,
                    "Invalid Content-Length header",
                )
            })?;
            content_length = Some(parsed);
        }
    }

    let content_length = content_length.ok_or_else(|| {
        std::io::Error::new(
            std::io::ErrorKind::InvalidData,
            "Missing Content-Length header",
        )
    })?;
    let mut payload = vec![0_u8; content_length];
    reader.read_exact(&mut payload).await?;

    let json: Value = serde_json::from_slice(&payload).map_err(|e| {
        std::io::Error::new(
            std::io::ErrorKind::InvalidData,
            format!("Invalid JSON payload: {e}"),
        )
    })?;
    Ok(Some(json))
}

async fn write_framed_json(
    stdout: &mut tokio::io::Stdout,
    value: &Value,
) -> Result<(), std::io::Error> {
    let payload = serde_json::to_vec(value).map_err(|e| {
        std::io::Error::new(
            std::io::ErrorKind::InvalidData,
            format!("Failed to serialize response: {e}"),
        )
    })?;
    let header = format!("Content-Length: {}\r\n\r\n", payload.len());
    stdout.write_all(header.as_bytes()).await?;
    stdout.write_all(&payload).await?;
    stdout.flush().await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{DateTime, Utc};
    use repkit_core::program::RandomProgramIds;

    struct FixedIds;

    impl ProgramIdSource for FixedIds {
        fn program_id(&self, created_at: DateTime<Utc>) -> String {
            format!("prog_{}_0000", created_at.format("%Y%m%d"))
        }
    }

    fn handlers_for(identity: &str) -> ToolHandlerSet {
        let session = Arc::new(Session::new("sid-test", identity));
        ToolHandlerSet::new(session, Providers::demo(), Arc::new(FixedIds))
    }

    fn rpc_call(name: &str, args: Value) -> Value {
        json!({
            "jsonrpc": "2.0",
            "id": 1,
            "method": "tools/call",
            "params": { "name": name, "arguments": args }
        })
    }

    /// Unwrap the text-content payload of a successful tools/call response.
    async fn call_tool(handlers: &ToolHandlerSet, name: &str, args: Value) -> Value {
        let responses = handlers
            .handle_incoming_message(rpc_call(name, args))
            .await;
        assert_eq!(responses.len(), 1);
        let result = &responses[0]["result"];
        assert_eq!(result["isError"], json!(false), "tool call failed: {result}");
        let text = result["content"][0]["text"].as_str().unwrap();
        serde_json::from_str(text).unwrap()
    }

    #[tokio::test]
    async fn initialize_advertises_protocol_and_server() {
        let handlers = handlers_for("demo_user");
        let responses = handlers
            .handle_incoming_message(json!({
                "jsonrpc": "2.0",
                "id": 0,
                "method": "initialize",
                "params": {}
            }))
            .await;
        let result = &responses[0]["result"];
        assert_eq!(result["protocolVersion"], MCP_PROTOCOL_VERSION);
        assert_eq!(result["serverInfo"]["name"], MCP_SERVER_NAME);
    }

    #[tokio::test]
    async fn tools_list_exposes_the_full_surface() {
        let handlers = handlers_for("demo_user");
        let responses = handlers
            .handle_incoming_message(json!({
                "jsonrpc": "2.0",
                "id": 1,
                "method": "tools/list"
            }))
            .await;
        let tools = responses[0]["result"]["tools"].as_array().unwrap();
        let names: Vec<&str> = tools
            .iter()
            .map(|t| t["name"].as_str().unwrap())
            .collect();
        assert_eq!(
            names,
            vec![
                "get_user_profile",
                "get_week_summary",
                "list_exercises",
                "get_rm_maxes",
                "create_program"
            ]
        );
        for tool in tools {
            assert_eq!(tool["inputSchema"]["type"], "object");
        }
    }

    #[tokio::test]
    async fn unknown_method_yields_method_not_found() {
        let handlers = handlers_for("demo_user");
        let responses = handlers
            .handle_incoming_message(json!({
                "jsonrpc": "2.0",
                "id": 9,
                "method": "resources/list"
            }))
            .await;
        assert_eq!(responses[0]["error"]["code"], -32601);
    }

    #[tokio::test]
    async fn notifications_produce_no_response() {
        let handlers = handlers_for("demo_user");
        let responses = handlers
            .handle_incoming_message(json!({
                "jsonrpc": "2.0",
                "method": "notifications/initialized"
            }))
            .await;
        assert!(responses.is_empty());
    }

    #[tokio::test]
    async fn get_user_profile_falls_back_to_demo_profile() {
        let handlers = handlers_for("nobody-knows-me");
        let payload = call_tool(&handlers, "get_user_profile", json!({})).await;
        assert_eq!(payload["user_id"], "demo_user");

        let handlers = handlers_for("user_123");
        let payload = call_tool(&handlers, "get_user_profile", json!({})).await;
        assert_eq!(payload["user_id"], "user_123");
        assert_eq!(payload["goal"]["primary"], "fat_loss");
    }

    #[tokio::test]
    async fn week_summary_filters_sorts_and_aggregates() {
        let handlers = handlers_for("demo_user");
        let payload = call_tool(
            &handlers,
            "get_week_summary",
            json!({ "start_date": "2026-01-22", "end_date": "2026-01-26" }),
        )
        .await;
        assert_eq!(payload["summary"]["sessions_count"], 3);
        assert_eq!(payload["summary"]["total_minutes"], 175);
        assert_eq!(payload["summary"]["avg_session_rpe"], 7.8);
        let dates: Vec<&str> = payload["sessions"]
            .as_array()
            .unwrap()
            .iter()
            .map(|s| s["date"].as_str().unwrap())
            .collect();
        assert_eq!(dates, vec!["2026-01-26", "2026-01-24", "2026-01-22"]);
    }

    #[tokio::test]
    async fn week_summary_requires_both_dates() {
        let handlers = handlers_for("demo_user");
        let responses = handlers
            .handle_incoming_message(rpc_call(
                "get_week_summary",
                json!({ "start_date": "2026-01-22" }),
            ))
            .await;
        let error = &responses[0]["error"];
        assert_eq!(error["code"], -32602);
        assert_eq!(error["data"]["error"], "validation_failed");
        assert_eq!(error["data"]["field"], "end_date");
    }

    #[tokio::test]
    async fn list_exercises_filters_case_insensitively() {
        let handlers = handlers_for("demo_user");
        let all = call_tool(&handlers, "list_exercises", json!({})).await;
        assert_eq!(all.as_array().unwrap().len(), 10);

        let squats = call_tool(&handlers, "list_exercises", json!({ "query": "SQUAT" })).await;
        let keys: Vec<&str> = squats
            .as_array()
            .unwrap()
            .iter()
            .map(|e| e["key"].as_str().unwrap())
            .collect();
        assert_eq!(keys, vec!["back_squat", "box_squat", "split_squat"]);

        let upper = call_tool(&handlers, "list_exercises", json!({ "query": "upper" })).await;
        assert_eq!(upper.as_array().unwrap().len(), 4);
    }

    #[tokio::test]
    async fn rm_maxes_report_null_for_unknown_ids() {
        let handlers = handlers_for("demo_user");
        let payload = call_tool(
            &handlers,
            "get_rm_maxes",
            json!({ "exercise_ids": [101, 104, 999] }),
        )
        .await;
        assert_eq!(payload["rms"]["101"], 120.0);
        assert_eq!(payload["rms"]["104"], 0.0);
        assert_eq!(payload["rms"]["999"], Value::Null);
    }

    #[tokio::test]
    async fn create_program_respects_knee_constraint_and_rm_data() {
        let handlers = handlers_for("demo_user");
        let payload = call_tool(
            &handlers,
            "create_program",
            json!({
                "days_per_week": 4,
                "session_minutes": 60,
                "goal": { "primary": "strength" },
                "constraints": { "knee_sensitive": true }
            }),
        )
        .await;
        let plan = &payload["program_json"];
        assert_eq!(plan["user_id"], "demo_user");
        assert_eq!(plan["days"].as_array().unwrap().len(), 4);
        let lower_a_main = &plan["days"][1]["items"][0];
        assert_eq!(lower_a_main["name"], "Box Squat");
        assert_eq!(lower_a_main["prescription"]["target_weight_kg"], 125.0);
        assert!(
            payload["summary_text"]
                .as_str()
                .unwrap()
                .contains("knee-friendly")
        );
    }

    #[tokio::test]
    async fn create_program_clamps_excessive_day_counts() {
        let handlers = handlers_for("demo_user");
        let payload = call_tool(
            &handlers,
            "create_program",
            json!({
                "days_per_week": 10,
                "session_minutes": 45,
                "goal": { "primary": "fitness" }
            }),
        )
        .await;
        assert_eq!(payload["program_json"]["days"].as_array().unwrap().len(), 4);
        assert_eq!(payload["program_json"]["meta"]["days_per_week"], 7);
    }

    #[tokio::test]
    async fn create_program_rejects_missing_goal() {
        let handlers = handlers_for("demo_user");
        let responses = handlers
            .handle_incoming_message(rpc_call(
                "create_program",
                json!({ "days_per_week": 4, "session_minutes": 60 }),
            ))
            .await;
        assert_eq!(responses[0]["error"]["code"], -32602);
    }

    #[tokio::test]
    async fn create_program_rejects_out_of_range_session_minutes() {
        let handlers = handlers_for("demo_user");
        let responses = handlers
            .handle_incoming_message(rpc_call(
                "create_program",
                json!({
                    "days_per_week": 4,
                    "session_minutes": 5,
                    "goal": { "primary": "strength" }
                }),
            ))
            .await;
        assert_eq!(responses[0]["error"]["code"], -32602);
        assert_eq!(
            responses[0]["error"]["data"]["field"],
            "session_minutes"
        );
    }

    #[tokio::test]
    async fn unknown_tool_is_a_protocol_error() {
        let handlers = handlers_for("demo_user");
        let responses = handlers
            .handle_incoming_message(rpc_call("does_not_exist", json!({})))
            .await;
        assert_eq!(responses[0]["error"]["code"], -32602);
        assert_eq!(responses[0]["error"]["data"]["error"], "unknown_tool");
    }

    #[tokio::test]
    async fn rebind_changes_what_subsequent_calls_see() {
        let session = Arc::new(Session::new("sid-rebind", "demo_user"));
        let handlers = ToolHandlerSet::new(
            session.clone(),
            Providers::demo(),
            Arc::new(RandomProgramIds),
        );

        let payload = call_tool(&handlers, "get_user_profile", json!({})).await;
        assert_eq!(payload["user_id"], "demo_user");

        session.rebind("user_123");
        let payload = call_tool(&handlers, "get_user_profile", json!({})).await;
        assert_eq!(payload["user_id"], "user_123");
    }

    #[tokio::test]
    async fn batch_requests_fan_out_in_order() {
        let handlers = handlers_for("demo_user");
        let responses = handlers
            .handle_incoming_message(json!([
                { "jsonrpc": "2.0", "id": 1, "method": "ping" },
                { "jsonrpc": "2.0", "id": 2, "method": "tools/list" }
            ]))
            .await;
        assert_eq!(responses.len(), 2);
        assert_eq!(responses[0]["id"], 1);
        assert_eq!(responses[1]["id"], 2);

        let empty = handlers.handle_incoming_message(json!([])).await;
        assert_eq!(empty[0]["error"]["code"], -32600);
    }
}
