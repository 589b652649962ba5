//! Tool dispatch table (C13, §4.11, §6.1) — the `tools/call` half of the
//! JSON-RPC surface. Stdio transports are inherently local (§4.10), so
//! every request here is authenticated as `Origin::Local`; the REST
//! transport (`crate::rest`) builds its own `AuthContext` per request and
//! applies the same denylist before reaching `MemoryManager`/`CodingMemory`.

use std::sync::Arc;

use serde_json::{json, Value};

use crate::auth::{AuthGate, Origin};
use crate::coding_memory::CodingMemory;
use crate::error::CoreError;
use crate::memory_manager::MemoryManager;
use crate::mcp::protocol::{
    methods, InitializeResult, McpHandler, McpRequest, McpResponse, ToolCallResult,
};
use crate::mcp::tools::get_tool_definitions;
use crate::types::{
    FeedbackLabel, FileAction, ListFilter, MemoryScope, MemorySpec, MemoryValue, RecallOptions,
    ScopeFilter,
};

pub struct ToolDispatcher {
    memory: Arc<MemoryManager>,
    coding: Arc<CodingMemory>,
    auth: Arc<AuthGate>,
}

fn str_arg<'a>(params: &'a Value, name: &str) -> Option<&'a str> {
    params.get(name).and_then(Value::as_str)
}

fn string_arg(params: &Value, name: &str) -> Result<String, CoreError> {
    str_arg(params, name)
        .map(str::to_string)
        .ok_or_else(|| CoreError::BadRequest(format!("missing required field `{name}`")))
}

fn scope_filter(params: &Value) -> ScopeFilter {
    match str_arg(params, "scope") {
        Some("working") => ScopeFilter::Working,
        Some("persistent") => ScopeFilter::Persistent,
        _ => ScopeFilter::All,
    }
}

fn tags_arg(params: &Value) -> Vec<String> {
    params
        .get("tags")
        .and_then(Value::as_array)
        .map(|a| a.iter().filter_map(|v| v.as_str().map(str::to_string)).collect())
        .unwrap_or_default()
}

impl ToolDispatcher {
    pub fn new(memory: Arc<MemoryManager>, coding: Arc<CodingMemory>, auth: Arc<AuthGate>) -> Self {
        Self { memory, coding, auth }
    }

    fn dispatch(&self, name: &str, params: Value) -> Result<Value, CoreError> {
        match name {
            "memory_store" => self.memory_store(params),
            "memory_recall" => self.memory_recall(params),
            "memory_search" => self.memory_search(params),
            "memory_list" => self.memory_list(params),
            "memory_delete" => self.memory_delete(params),
            "memory_feedback" => self.memory_feedback(params),
            "memory_fetch" => self.memory_fetch(params),
            "memory_search_ids" => self.memory_search_ids(params),
            "memory_stats" => self.memory_stats(params),
            "memory_get_related" => self.memory_get_related(params),
            "memory_get_user_pattern" => self.memory_get_user_pattern(params),
            "memory_record_interaction" => self.memory_record_interaction(params),
            "coding_start_session" => self.coding_start_session(params),
            "coding_end_session" => self.coding_end_session(params),
            "coding_resume_session" => self.coding_resume_session(params),
            "coding_track_file_change" => self.coding_track_file_change(params),
            "coding_record_error" => self.coding_record_error(params),
            "coding_record_decision" => self.coding_record_decision(params),
            "coding_search_errors" => self.coding_search_errors(params),
            "coding_get_project_context" => self.coding_get_project_context(params),
            "coding_analyze_patterns" => self.coding_analyze_patterns(params),
            "coding_analyze_file_dependencies" => self.coding_analyze_file_dependencies(params),
            "coding_analyze_refactor_impact" => self.coding_analyze_refactor_impact(params),
            "coding_suggest_refactor_order" => self.coding_suggest_refactor_order(params),
            other => Err(CoreError::NotFound(format!("unknown tool `{other}`"))),
        }
    }

    fn memory_store(&self, params: Value) -> Result<Value, CoreError> {
        let spec = MemorySpec {
            user_id: string_arg(&params, "user_id")?,
            agent_name: str_arg(&params, "agent_name").unwrap_or("global").to_string(),
            key: str_arg(&params, "key").map(str::to_string),
            value: MemoryValue::Text(string_arg(&params, "value")?),
            scope: match str_arg(&params, "scope") {
                Some("working") => MemoryScope::Working,
                _ => MemoryScope::Persistent,
            },
            tags: tags_arg(&params),
            importance: params.get("importance").and_then(Value::as_f64).unwrap_or(0.5) as f32,
        };
        let memory = self.memory.remember(spec)?;
        Ok(json!(memory))
    }

    fn memory_recall(&self, params: Value) -> Result<Value, CoreError> {
        let user_id = string_arg(&params, "user_id")?;
        let agent_name = str_arg(&params, "agent_name").unwrap_or("global");
        let query = string_arg(&params, "query")?;
        let mut opts = RecallOptions::default();
        opts.top_k = params.get("top_k").and_then(Value::as_u64).unwrap_or(10) as usize;
        let results = self.memory.recall_hybrid(&user_id, agent_name, &query, &opts)?;
        Ok(json!(results))
    }

    fn memory_search(&self, params: Value) -> Result<Value, CoreError> {
        let user_id = string_arg(&params, "user_id")?;
        let agent_name = str_arg(&params, "agent_name").unwrap_or("global");
        let pattern = string_arg(&params, "pattern")?;
        let limit = params.get("limit").and_then(Value::as_u64).unwrap_or(20) as usize;
        let results = self.memory.search_text(&user_id, agent_name, &pattern, limit)?;
        Ok(json!(results))
    }

    fn memory_search_ids(&self, params: Value) -> Result<Value, CoreError> {
        let user_id = string_arg(&params, "user_id")?;
        let agent_name = str_arg(&params, "agent_name").unwrap_or("global");
        let pattern = string_arg(&params, "pattern")?;
        let limit = params.get("limit").and_then(Value::as_u64).unwrap_or(20) as usize;
        let results = self.memory.search_text(&user_id, agent_name, &pattern, limit)?;
        Ok(json!(results.into_iter().map(|m| m.id).collect::<Vec<_>>()))
    }

    fn memory_list(&self, params: Value) -> Result<Value, CoreError> {
        let user_id = string_arg(&params, "user_id")?;
        let scope = match str_arg(&params, "scope") {
            Some("working") => ScopeFilter::Working,
            Some("persistent") => ScopeFilter::Persistent,
            _ => ScopeFilter::All,
        };
        let filter = ListFilter {
            tags: Some(tags_arg(&params)).filter(|t| !t.is_empty()),
            since: str_arg(&params, "since").and_then(|s| s.parse().ok()),
            limit: params.get("limit").and_then(Value::as_u64).unwrap_or(50) as usize,
            ..Default::default()
        };
        let results = self.memory.list(&user_id, scope, &filter)?;
        Ok(json!(results))
    }

    fn memory_delete(&self, params: Value) -> Result<Value, CoreError> {
        let user_id = string_arg(&params, "user_id")?;
        let agent_name = str_arg(&params, "agent_name").unwrap_or("global");
        let key = string_arg(&params, "key")?;
        let deleted = self.memory.forget(&user_id, agent_name, scope_filter(&params), &key)?;
        Ok(json!({ "deleted": deleted }))
    }

    fn memory_feedback(&self, params: Value) -> Result<Value, CoreError> {
        let id = params
            .get("id")
            .and_then(Value::as_i64)
            .ok_or_else(|| CoreError::BadRequest("missing required field `id`".into()))?;
        let label = match str_arg(&params, "label") {
            Some("useful") => FeedbackLabel::Useful,
            Some("irrelevant") => FeedbackLabel::Irrelevant,
            Some("outdated") => FeedbackLabel::Outdated,
            other => return Err(CoreError::BadRequest(format!("invalid label {other:?}"))),
        };
        let weight = params.get("weight").and_then(Value::as_f64).unwrap_or(1.0) as f32;
        self.memory.feedback(id, label, weight)?;
        Ok(json!({ "ok": true }))
    }

    fn memory_fetch(&self, params: Value) -> Result<Value, CoreError> {
        let user_id = string_arg(&params, "user_id")?;
        let agent_name = str_arg(&params, "agent_name").unwrap_or("global");
        let key = string_arg(&params, "key")?;
        let memory = self.memory.recall_by_key(&user_id, agent_name, scope_filter(&params), &key)?;
        Ok(json!(memory))
    }

    fn memory_stats(&self, params: Value) -> Result<Value, CoreError> {
        let user_id = string_arg(&params, "user_id")?;
        Ok(json!(self.memory.memory_stats(&user_id)?))
    }

    fn memory_get_related(&self, params: Value) -> Result<Value, CoreError> {
        let seed_ids: Vec<String> = params
            .get("seed_ids")
            .and_then(Value::as_array)
            .ok_or_else(|| CoreError::BadRequest("missing required field `seed_ids`".into()))?
            .iter()
            .filter_map(|v| v.as_str().map(str::to_string))
            .collect();
        let hops = params.get("hops").and_then(Value::as_u64).unwrap_or(2) as u32;
        let subgraph = self.memory.get_related(&seed_ids, hops, None)?;
        Ok(json!(subgraph))
    }

    fn memory_get_user_pattern(&self, params: Value) -> Result<Value, CoreError> {
        let user_id = string_arg(&params, "user_id")?;
        Ok(json!(self.memory.get_user_pattern(&user_id)?))
    }

    fn memory_record_interaction(&self, params: Value) -> Result<Value, CoreError> {
        let user_id = string_arg(&params, "user_id")?;
        let query = string_arg(&params, "query")?;
        let response = string_arg(&params, "response")?;
        let metadata = params.get("metadata").cloned().unwrap_or(json!({}));
        let node_id = self.memory.record_interaction(&user_id, &query, &response, metadata)?;
        Ok(json!({ "node_id": node_id }))
    }

    fn coding_start_session(&self, params: Value) -> Result<Value, CoreError> {
        let user_id = string_arg(&params, "user_id")?;
        let project_id = string_arg(&params, "project_id")?;
        let description = string_arg(&params, "description")?;
        let session = self.coding.start(&user_id, &project_id, &description, tags_arg(&params))?;
        Ok(json!(session))
    }

    fn coding_end_session(&self, params: Value) -> Result<Value, CoreError> {
        let session_id = string_arg(&params, "session_id")?;
        let success = params.get("success").and_then(Value::as_bool).unwrap_or(true);
        Ok(json!(self.coding.end(&session_id, success)?))
    }

    fn coding_resume_session(&self, params: Value) -> Result<Value, CoreError> {
        let session_id = string_arg(&params, "session_id")?;
        Ok(json!(self.coding.resume(&session_id)?))
    }

    fn coding_track_file_change(&self, params: Value) -> Result<Value, CoreError> {
        let session_id = string_arg(&params, "session_id")?;
        let file_path = string_arg(&params, "file_path")?;
        let action: FileAction = str_arg(&params, "action")
            .unwrap_or("edit")
            .parse()
            .map_err(|_| CoreError::BadRequest("invalid `action`".into()))?;
        let line_range = match (
            params.get("line_range_start").and_then(Value::as_u64),
            params.get("line_range_end").and_then(Value::as_u64),
        ) {
            (Some(s), Some(e)) => Some((s as u32, e as u32)),
            _ => None,
        };
        let change = self.coding.track_file_change(
            &session_id,
            &file_path,
            action,
            str_arg(&params, "diff").map(str::to_string),
            str_arg(&params, "reason").map(str::to_string),
            tags_arg_named(&params, "related_files"),
            line_range,
            str_arg(&params, "implements_decision_id").map(str::to_string),
        )?;
        Ok(json!(change))
    }

    fn coding_record_error(&self, params: Value) -> Result<Value, CoreError> {
        let session_id = string_arg(&params, "session_id")?;
        let error_type = string_arg(&params, "error_type")?;
        let message = string_arg(&params, "message")?;
        let record = self.coding.record_error(
            &session_id,
            &error_type,
            &message,
            str_arg(&params, "stack_trace").map(str::to_string),
            str_arg(&params, "file_path").map(str::to_string),
            params.get("line_number").and_then(Value::as_u64).map(|n| n as u32),
            str_arg(&params, "screenshot_ref").map(str::to_string),
            tags_arg(&params),
            str_arg(&params, "solution").map(str::to_string),
        )?;
        Ok(json!(record))
    }

    fn coding_record_decision(&self, params: Value) -> Result<Value, CoreError> {
        let session_id = string_arg(&params, "session_id")?;
        let decision = string_arg(&params, "decision")?;
        let rationale = string_arg(&params, "rationale")?;
        let record = self.coding.record_decision(
            &session_id,
            &decision,
            &rationale,
            tags_arg_named(&params, "alternatives"),
            str_arg(&params, "impact").map(str::to_string),
            tags_arg(&params),
            tags_arg_named(&params, "related_files"),
            params.get("confidence").and_then(Value::as_f64).unwrap_or(0.5) as f32,
        )?;
        Ok(json!(record))
    }

    fn coding_search_errors(&self, params: Value) -> Result<Value, CoreError> {
        let user_id = string_arg(&params, "user_id")?;
        let project_id = string_arg(&params, "project_id")?;
        let query = str_arg(&params, "query").unwrap_or("");
        let unresolved_only = params.get("unresolved_only").and_then(Value::as_bool).unwrap_or(false);
        let errors = self.coding.search_errors(&user_id, &project_id, query, unresolved_only)?;
        Ok(json!(errors))
    }

    fn coding_get_project_context(&self, params: Value) -> Result<Value, CoreError> {
        let user_id = string_arg(&params, "user_id")?;
        let project_id = string_arg(&params, "project_id")?;
        Ok(json!(self.coding.get_project_context(&user_id, &project_id)?))
    }

    fn coding_analyze_patterns(&self, params: Value) -> Result<Value, CoreError> {
        let user_id = string_arg(&params, "user_id")?;
        let project_id = string_arg(&params, "project_id")?;
        Ok(json!(self.coding.analyze_patterns(&user_id, &project_id)?))
    }

    fn coding_analyze_file_dependencies(&self, params: Value) -> Result<Value, CoreError> {
        let path = string_arg(&params, "path")?;
        let content = string_arg(&params, "content")?;
        Ok(json!(self.coding.analyze_file_dependencies(&path, &content)?))
    }

    fn coding_analyze_refactor_impact(&self, params: Value) -> Result<Value, CoreError> {
        let path = string_arg(&params, "path")?;
        Ok(json!(self.coding.analyze_refactor_impact(&path)?))
    }

    fn coding_suggest_refactor_order(&self, params: Value) -> Result<Value, CoreError> {
        let files: Vec<String> = params
            .get("files")
            .and_then(Value::as_array)
            .ok_or_else(|| CoreError::BadRequest("missing required field `files`".into()))?
            .iter()
            .filter_map(|v| v.as_str().map(str::to_string))
            .collect();
        Ok(json!(self.coding.suggest_refactor_order(&files)?))
    }
}

fn tags_arg_named(params: &Value, name: &str) -> Vec<String> {
    params
        .get(name)
        .and_then(Value::as_array)
        .map(|a| a.iter().filter_map(|v| v.as_str().map(str::to_string)).collect())
        .unwrap_or_default()
}

impl McpHandler for ToolDispatcher {
    fn handle_request(&self, request: McpRequest) -> McpResponse {
        match request.method.as_str() {
            methods::INITIALIZE => McpResponse::success(request.id, json!(InitializeResult::default())),
            methods::INITIALIZED => McpResponse::success(request.id, json!({})),
            methods::LIST_TOOLS => {
                // Stdio callers are always local (§4.10); the full catalogue is advertised.
                let tools = get_tool_definitions();
                McpResponse::success(request.id, json!({ "tools": tools }))
            }
            methods::CALL_TOOL => {
                let name = request.params.get("name").and_then(Value::as_str).unwrap_or("");
                let arguments = request.params.get("arguments").cloned().unwrap_or(json!({}));
                let auth_ctx = self.auth.authenticate(None, None, Origin::Local);
                if !self.auth.allows_tool(&auth_ctx, name) {
                    return McpResponse::error(request.id, -32004, format!("tool `{name}` forbidden"));
                }
                match self.dispatch(name, arguments) {
                    Ok(result) => McpResponse::success(request.id, json!(ToolCallResult::json(&result))),
                    Err(err) => McpResponse::success(request.id, json!(ToolCallResult::error(err.to_string()))),
                }
            }
            other => McpResponse::error(request.id, -32601, format!("method not found: {other}")),
        }
    }
}
