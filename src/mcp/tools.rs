//! Tool surface definitions (§6.1): the JSON-RPC `tools/list` catalogue.
//!
//! Kept as flat `(name, description, input_schema)` tuples the way the
//! teacher's tool catalogue does, so adding a tool never touches
//! `ToolDefinition` itself.

use super::protocol::ToolDefinition;

pub const TOOL_DEFINITIONS: &[(&str, &str, &str)] = &[
    (
        "memory_store",
        "Store a memory under (user_id, agent_name, key). Upserts on an existing key.",
        r#"{
            "type": "object",
            "properties": {
                "user_id": {"type": "string"},
                "agent_name": {"type": "string", "default": "global"},
                "key": {"type": "string"},
                "value": {"type": "string"},
                "scope": {"type": "string", "enum": ["working", "persistent"], "default": "persistent"},
                "tags": {"type": "array", "items": {"type": "string"}},
                "importance": {"type": "number", "minimum": 0, "maximum": 1, "default": 0.5}
            },
            "required": ["user_id", "value"]
        }"#,
    ),
    (
        "memory_recall",
        "Hybrid semantic+lexical recall over a user's memories, fused and rescored.",
        r#"{
            "type": "object",
            "properties": {
                "user_id": {"type": "string"},
                "agent_name": {"type": "string", "default": "global"},
                "query": {"type": "string"},
                "top_k": {"type": "integer", "minimum": 0, "maximum": 100, "default": 10}
            },
            "required": ["user_id", "query"]
        }"#,
    ),
    (
        "memory_search",
        "Substring/fuzzy text search over a user's memories.",
        r#"{
            "type": "object",
            "properties": {
                "user_id": {"type": "string"},
                "agent_name": {"type": "string", "default": "global"},
                "pattern": {"type": "string"},
                "limit": {"type": "integer", "default": 20}
            },
            "required": ["user_id", "pattern"]
        }"#,
    ),
    (
        "memory_list",
        "List a user's memories, optionally filtered by tag and recency.",
        r#"{
            "type": "object",
            "properties": {
                "user_id": {"type": "string"},
                "scope": {"type": "string", "enum": ["working", "persistent", "all"], "default": "all"},
                "tags": {"type": "array", "items": {"type": "string"}},
                "since": {"type": "string", "format": "date-time"},
                "limit": {"type": "integer", "default": 50}
            },
            "required": ["user_id"]
        }"#,
    ),
    (
        "memory_delete",
        "Delete a memory by (user_id, agent_name, scope, key). Idempotent.",
        r#"{
            "type": "object",
            "properties": {
                "user_id": {"type": "string"},
                "agent_name": {"type": "string", "default": "global"},
                "scope": {"type": "string", "enum": ["working", "persistent", "all"], "default": "all"},
                "key": {"type": "string"}
            },
            "required": ["user_id", "key"]
        }"#,
    ),
    (
        "memory_feedback",
        "Adjust a memory's importance based on a usage signal (useful, irrelevant, outdated).",
        r#"{
            "type": "object",
            "properties": {
                "id": {"type": "integer"},
                "label": {"type": "string", "enum": ["useful", "irrelevant", "outdated"]},
                "weight": {"type": "number", "default": 1.0}
            },
            "required": ["id", "label"]
        }"#,
    ),
    (
        "memory_fetch",
        "Fetch a single memory by its exact (user_id, agent_name, scope, key).",
        r#"{
            "type": "object",
            "properties": {
                "user_id": {"type": "string"},
                "agent_name": {"type": "string", "default": "global"},
                "scope": {"type": "string", "enum": ["working", "persistent", "all"], "default": "all"},
                "key": {"type": "string"}
            },
            "required": ["user_id", "key"]
        }"#,
    ),
    (
        "memory_search_ids",
        "Like memory_search, but returns only matching memory ids.",
        r#"{
            "type": "object",
            "properties": {
                "user_id": {"type": "string"},
                "agent_name": {"type": "string", "default": "global"},
                "pattern": {"type": "string"},
                "limit": {"type": "integer", "default": 20}
            },
            "required": ["user_id", "pattern"]
        }"#,
    ),
    (
        "memory_stats",
        "Storage and cache statistics for a user's memory partition.",
        r#"{
            "type": "object",
            "properties": {
                "user_id": {"type": "string"}
            },
            "required": ["user_id"]
        }"#,
    ),
    (
        "memory_get_related",
        "Breadth-first traversal of the knowledge graph from a set of seed node ids.",
        r#"{
            "type": "object",
            "properties": {
                "seed_ids": {"type": "array", "items": {"type": "string"}},
                "hops": {"type": "integer", "minimum": 1, "maximum": 6, "default": 2}
            },
            "required": ["seed_ids"]
        }"#,
    ),
    (
        "memory_get_user_pattern",
        "Aggregate interaction count and top topics for a user from their graph neighborhood.",
        r#"{
            "type": "object",
            "properties": {
                "user_id": {"type": "string"}
            },
            "required": ["user_id"]
        }"#,
    ),
    (
        "memory_record_interaction",
        "Record a query/response interaction, creating interaction and topic graph nodes.",
        r#"{
            "type": "object",
            "properties": {
                "user_id": {"type": "string"},
                "query": {"type": "string"},
                "response": {"type": "string"},
                "metadata": {"type": "object"}
            },
            "required": ["user_id", "query", "response"]
        }"#,
    ),
    (
        "coding_start_session",
        "Start a coding session for (user_id, project_id). Fails if one is already active.",
        r#"{
            "type": "object",
            "properties": {
                "user_id": {"type": "string"},
                "project_id": {"type": "string"},
                "description": {"type": "string"},
                "tags": {"type": "array", "items": {"type": "string"}}
            },
            "required": ["user_id", "project_id", "description"]
        }"#,
    ),
    (
        "coding_end_session",
        "End an active coding session.",
        r#"{
            "type": "object",
            "properties": {
                "session_id": {"type": "string"},
                "success": {"type": "boolean", "default": true}
            },
            "required": ["session_id"]
        }"#,
    ),
    (
        "coding_resume_session",
        "Resume an aborted session within the resume window.",
        r#"{
            "type": "object",
            "properties": {
                "session_id": {"type": "string"}
            },
            "required": ["session_id"]
        }"#,
    ),
    (
        "coding_track_file_change",
        "Record a file change made during a coding session.",
        r#"{
            "type": "object",
            "properties": {
                "session_id": {"type": "string"},
                "file_path": {"type": "string"},
                "action": {"type": "string", "enum": ["create", "edit", "delete", "rename"]},
                "diff": {"type": "string"},
                "reason": {"type": "string"},
                "related_files": {"type": "array", "items": {"type": "string"}},
                "line_range_start": {"type": "integer"},
                "line_range_end": {"type": "integer"},
                "implements_decision_id": {"type": "string"}
            },
            "required": ["session_id", "file_path", "action"]
        }"#,
    ),
    (
        "coding_record_error",
        "Record an error (and optional solution) encountered during a session.",
        r#"{
            "type": "object",
            "properties": {
                "session_id": {"type": "string"},
                "error_type": {"type": "string"},
                "message": {"type": "string"},
                "stack_trace": {"type": "string"},
                "file_path": {"type": "string"},
                "line_number": {"type": "integer"},
                "screenshot_ref": {"type": "string"},
                "tags": {"type": "array", "items": {"type": "string"}},
                "solution": {"type": "string"}
            },
            "required": ["session_id", "error_type", "message"]
        }"#,
    ),
    (
        "coding_record_decision",
        "Record a design decision made during a session.",
        r#"{
            "type": "object",
            "properties": {
                "session_id": {"type": "string"},
                "decision": {"type": "string"},
                "rationale": {"type": "string"},
                "alternatives": {"type": "array", "items": {"type": "string"}},
                "impact": {"type": "string"},
                "tags": {"type": "array", "items": {"type": "string"}},
                "related_files": {"type": "array", "items": {"type": "string"}},
                "confidence": {"type": "number", "default": 0.5}
            },
            "required": ["session_id", "decision", "rationale"]
        }"#,
    ),
    (
        "coding_search_errors",
        "Search recorded errors across a project's sessions.",
        r#"{
            "type": "object",
            "properties": {
                "user_id": {"type": "string"},
                "project_id": {"type": "string"},
                "query": {"type": "string", "default": ""},
                "unresolved_only": {"type": "boolean", "default": false}
            },
            "required": ["user_id", "project_id"]
        }"#,
    ),
    (
        "coding_get_project_context",
        "Active session, recent file changes/decisions, and unresolved errors for a project.",
        r#"{
            "type": "object",
            "properties": {
                "user_id": {"type": "string"},
                "project_id": {"type": "string"}
            },
            "required": ["user_id", "project_id"]
        }"#,
    ),
    (
        "coding_analyze_patterns",
        "Recurring error types and frequently-changed files across a project's sessions.",
        r#"{
            "type": "object",
            "properties": {
                "user_id": {"type": "string"},
                "project_id": {"type": "string"}
            },
            "required": ["user_id", "project_id"]
        }"#,
    ),
    (
        "coding_analyze_file_dependencies",
        "Parse a source file with tree-sitter and list its imports.",
        r#"{
            "type": "object",
            "properties": {
                "path": {"type": "string"},
                "content": {"type": "string"}
            },
            "required": ["path", "content"]
        }"#,
    ),
    (
        "coding_analyze_refactor_impact",
        "Estimate the blast radius and risk of refactoring a tracked file.",
        r#"{
            "type": "object",
            "properties": {
                "path": {"type": "string"}
            },
            "required": ["path"]
        }"#,
    ),
    (
        "coding_suggest_refactor_order",
        "Topologically order a set of files by dependency so refactors land leaves-first.",
        r#"{
            "type": "object",
            "properties": {
                "files": {"type": "array", "items": {"type": "string"}}
            },
            "required": ["files"]
        }"#,
    ),
];

pub fn get_tool_definitions() -> Vec<ToolDefinition> {
    TOOL_DEFINITIONS
        .iter()
        .map(|(name, description, schema)| ToolDefinition {
            name: name.to_string(),
            description: description.to_string(),
            input_schema: serde_json::from_str(schema).expect("static tool schema must parse"),
        })
        .collect()
}

/// Tool name prefix used by `AuthGate::allows_tool` (§4.10) — none of the
/// tools above fall under the remote denylist (`file_*`, `dir_*`,
/// `shell_*`, `media_open_*`), so every tool here is remote-visible.
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn all_schemas_parse() {
        let defs = get_tool_definitions();
        assert_eq!(defs.len(), TOOL_DEFINITIONS.len());
    }

    #[test]
    fn names_are_unique() {
        let mut names: Vec<&str> = TOOL_DEFINITIONS.iter().map(|(n, _, _)| *n).collect();
        let before = names.len();
        names.sort();
        names.dedup();
        assert_eq!(names.len(), before);
    }
}
