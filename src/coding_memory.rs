//! CodingMemory (C10) — a higher-level view over `MemoryManager`/`GraphStore`
//! scoped by `(user_id, project_id)` (§4.6).
//!
//! §9 "mixins": rather than `CodingMemoryManager extends MemoryManager`, this
//! holds a `MemoryManager` and a `GraphStore` by composition and exposes its
//! own interface — the teacher's `intelligence/` modules, which similarly
//! compose on top of `Storage` rather than inherit from it, are the
//! structural template.

use std::path::Path;
use std::sync::Arc;

use chrono::{DateTime, Duration as ChronoDuration, Utc};
use parking_lot::Mutex;
use rusqlite::Connection;
use uuid::Uuid;

use crate::error::{CoreError, Result};
use crate::graph::GraphStore;
use crate::llm::LlmService;
use crate::memory_manager::MemoryManager;
use crate::types::{
    DecisionRecord, ErrorRecord, FileAction, FileChange, MemoryScope, MemorySpec, MemoryValue, NodeType, RelType,
    SessionStatus,
};

#[derive(Debug, Clone, Default, serde::Serialize)]
pub struct ProjectContext {
    pub active_session: Option<crate::types::CodingSession>,
    pub recent_file_changes: Vec<FileChange>,
    pub recent_decisions: Vec<DecisionRecord>,
    pub unresolved_errors: Vec<ErrorRecord>,
}

#[derive(Debug, Clone, Default, serde::Serialize)]
pub struct PatternReport {
    pub total_sessions: i64,
    pub recurring_error_types: Vec<(String, i64)>,
    pub frequently_changed_files: Vec<(String, i64)>,
    pub session_ids: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
pub enum RefactorRisk {
    Low,
    Medium,
    High,
}

#[derive(Debug, Clone, Default, serde::Serialize)]
pub struct FileDependencies {
    pub imports: Vec<String>,
    pub imported_by: Vec<String>,
    pub import_depth: u32,
    pub circular_deps: Vec<String>,
}

#[derive(Debug, Clone, serde::Serialize)]
pub struct RefactorImpact {
    pub affected_files: Vec<String>,
    pub risk: RefactorRisk,
}

#[derive(Debug, Clone, Default, serde::Serialize)]
pub struct DecisionImplementationStatus {
    pub completion: f32,
    pub pending_files: Vec<String>,
}

pub struct CodingMemory {
    conn: Arc<Mutex<Connection>>,
    graph: Arc<GraphStore>,
    memory_manager: Arc<MemoryManager>,
    llm: Arc<dyn LlmService>,
    max_session_duration_hours: i64,
}

fn node_id(kind: &str, id: &str) -> String {
    format!("{kind}:{id}")
}

impl CodingMemory {
    pub fn new(
        db_path: &str,
        graph: Arc<GraphStore>,
        memory_manager: Arc<MemoryManager>,
        llm: Arc<dyn LlmService>,
        max_session_duration_hours: i64,
    ) -> Result<Self> {
        let conn = if db_path == ":memory:" {
            Connection::open_in_memory()?
        } else {
            Connection::open(db_path)?
        };
        conn.execute_batch("PRAGMA busy_timeout=30000; PRAGMA foreign_keys=ON;")?;
        crate::storage::migrate(&conn)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
            graph,
            memory_manager,
            llm,
            max_session_duration_hours,
        })
    }

    /// `None -> Active` (§4.6.1). Fails with `Conflict` if an active
    /// session already exists for `(user_id, project_id)` (I4, P7).
    pub fn start(&self, user_id: &str, project_id: &str, description: &str, tags: Vec<String>) -> Result<crate::types::CodingSession> {
        let conn = self.conn.lock();
        let existing: i64 = conn.query_row(
            "SELECT COUNT(*) FROM coding_sessions WHERE user_id=?1 AND project_id=?2 AND status='active'",
            rusqlite::params![user_id, project_id],
            |row| row.get(0),
        )?;
        if existing > 0 {
            return Err(CoreError::Conflict(format!(
                "an active coding session already exists for user={user_id} project={project_id}"
            )));
        }

        let session_id = Uuid::new_v4().to_string();
        let now = Utc::now();
        let tags_json = serde_json::to_string(&tags)?;
        conn.execute(
            "INSERT INTO coding_sessions (session_id, user_id, project_id, description, started_at, status, tags)
             VALUES (?1, ?2, ?3, ?4, ?5, 'active', ?6)",
            rusqlite::params![session_id, user_id, project_id, description, now, tags_json],
        )?;
        drop(conn);

        self.graph.add_node(&node_id("session", &session_id), NodeType::Session, serde_json::json!({
            "user_id": user_id, "project_id": project_id, "description": description,
        }))?;

        self.get(&session_id)?.ok_or_else(|| CoreError::Internal("session vanished after insert".into()))
    }

    pub fn get(&self, session_id: &str) -> Result<Option<crate::types::CodingSession>> {
        let conn = self.conn.lock();
        Self::row_to_session_opt(&conn, session_id)
    }

    fn row_to_session_opt(conn: &Connection, session_id: &str) -> Result<Option<crate::types::CodingSession>> {
        let result = conn
            .query_row(
                "SELECT session_id, user_id, project_id, description, started_at, ended_at, status, tags,
                        linked_issue, summary
                 FROM coding_sessions WHERE session_id = ?1",
                rusqlite::params![session_id],
                |row| {
                    let tags_json: String = row.get(7)?;
                    let status: String = row.get(6)?;
                    Ok(crate::types::CodingSession {
                        session_id: row.get(0)?,
                        user_id: row.get(1)?,
                        project_id: row.get(2)?,
                        description: row.get(3)?,
                        started_at: row.get(4)?,
                        ended_at: row.get(5)?,
                        status: status.parse().unwrap_or(SessionStatus::Active),
                        tags: serde_json::from_str(&tags_json).unwrap_or_default(),
                        linked_issue: row.get(8)?,
                        summary: row.get(9)?,
                    })
                },
            )
            .map(Some)
            .or_else(|e| match e {
                rusqlite::Error::QueryReturnedNoRows => Ok(None),
                other => Err(other),
            })?;
        Ok(result)
    }

    /// `Active -> Ended` (§4.6.1): requests a summary, materializes it as a
    /// persistent memory, and links file changes/decisions to the session
    /// node in the graph (scenario 4).
    pub fn end(&self, session_id: &str, success: bool) -> Result<crate::types::CodingSession> {
        let session = self
            .get(session_id)?
            .ok_or_else(|| CoreError::NotFound(format!("coding session {session_id}")))?;
        if session.status != SessionStatus::Active {
            return Err(CoreError::Conflict(format!("session {session_id} is not active")));
        }

        let file_changes = self.list_file_changes(session_id)?;
        let decisions = self.list_decisions(session_id)?;
        let errors = self.list_errors(session_id)?;

        let narrative = format!(
            "Session: {}\nOutcome: {}\nFile changes: {}\nDecisions: {}\nErrors encountered: {}",
            session.description,
            if success { "success" } else { "incomplete" },
            file_changes
                .iter()
                .map(|f| format!("{} ({})", f.file_path, f.action.as_str()))
                .collect::<Vec<_>>()
                .join(", "),
            decisions.iter().map(|d| d.decision.clone()).collect::<Vec<_>>().join("; "),
            errors.iter().map(|e| e.message.clone()).collect::<Vec<_>>().join("; "),
        );
        let summary = self.llm.summarize(&narrative, 120)?;

        let now = Utc::now();
        {
            let conn = self.conn.lock();
            conn.execute(
                "UPDATE coding_sessions SET ended_at=?2, status='ended', summary=?3 WHERE session_id=?1",
                rusqlite::params![session_id, now, summary],
            )?;
        }

        self.memory_manager.remember(MemorySpec {
            user_id: session.user_id.clone(),
            agent_name: "global".to_string(),
            key: Some(format!("coding_session_summary:{session_id}")),
            value: MemoryValue::Text(summary.clone()),
            scope: MemoryScope::Persistent,
            tags: vec!["coding_session".to_string(), session.project_id.clone()],
            importance: 0.6,
        })?;

        for decision in &decisions {
            let decision_node = node_id("decision", &decision.id);
            self.graph.add_node(&decision_node, NodeType::Decision, serde_json::json!({"decision": decision.decision}))?;
            self.graph
                .add_edge(&node_id("session", session_id), &decision_node, RelType::Implements, None, None, None, None, None)
                .ok();
        }
        for change in &file_changes {
            let file_node = node_id("file", &change.file_path);
            self.graph.add_node(&file_node, NodeType::File, serde_json::json!({"path": change.file_path}))?;
            self.graph
                .add_edge(&file_node, &node_id("session", session_id), RelType::InSession, None, None, None, None, None)
                .ok();
        }

        self.get(session_id)?.ok_or_else(|| CoreError::Internal("session vanished after end".into()))
    }

    pub fn abort(&self, session_id: &str) -> Result<crate::types::CodingSession> {
        let session = self
            .get(session_id)?
            .ok_or_else(|| CoreError::NotFound(format!("coding session {session_id}")))?;
        if session.status != SessionStatus::Active {
            return Err(CoreError::Conflict(format!("session {session_id} is not active")));
        }
        let conn = self.conn.lock();
        conn.execute(
            "UPDATE coding_sessions SET ended_at=?2, status='aborted' WHERE session_id=?1",
            rusqlite::params![session_id, Utc::now()],
        )?;
        drop(conn);
        self.get(session_id)?.ok_or_else(|| CoreError::Internal("session vanished after abort".into()))
    }

    /// `Aborted -> Active` only within `max_session_duration_hours` of the
    /// abort (§4.6.1). Open question (SPEC_FULL.md/DESIGN.md): the window
    /// is measured from `ended_at` (the abort time), not `started_at`,
    /// since re-entering work hours after the abort is what the window is
    /// meant to bound.
    pub fn resume(&self, session_id: &str) -> Result<crate::types::CodingSession> {
        let session = self
            .get(session_id)?
            .ok_or_else(|| CoreError::NotFound(format!("coding session {session_id}")))?;
        if session.status != SessionStatus::Aborted {
            return Err(CoreError::Conflict(format!("session {session_id} was not aborted")));
        }
        let aborted_at = session
            .ended_at
            .ok_or_else(|| CoreError::Internal("aborted session missing ended_at".into()))?;
        if Utc::now() - aborted_at > ChronoDuration::hours(self.max_session_duration_hours) {
            return Err(CoreError::Conflict(format!(
                "session {session_id} aborted more than {}h ago, cannot resume",
                self.max_session_duration_hours
            )));
        }
        let conn = self.conn.lock();
        conn.execute(
            "UPDATE coding_sessions SET ended_at=NULL, status='active' WHERE session_id=?1",
            rusqlite::params![session_id],
        )?;
        drop(conn);
        self.get(session_id)?.ok_or_else(|| CoreError::Internal("session vanished after resume".into()))
    }

    pub fn track_file_change(
        &self,
        session_id: &str,
        file_path: &str,
        action: FileAction,
        diff: Option<String>,
        reason: Option<String>,
        related_files: Vec<String>,
        line_range: Option<(u32, u32)>,
        implements_decision_id: Option<String>,
    ) -> Result<FileChange> {
        let id = Uuid::new_v4().to_string();
        let now = Utc::now();
        let related_json = serde_json::to_string(&related_files)?;
        let conn = self.conn.lock();
        conn.execute(
            "INSERT INTO file_changes (id, session_id, file_path, action, diff, reason, related_files,
                line_range_start, line_range_end, implements_decision_id, created_at)
             VALUES (?1,?2,?3,?4,?5,?6,?7,?8,?9,?10,?11)",
            rusqlite::params![
                id,
                session_id,
                file_path,
                action.as_str(),
                diff,
                reason,
                related_json,
                line_range.map(|(s, _)| s),
                line_range.map(|(_, e)| e),
                implements_decision_id,
                now,
            ],
        )?;
        Ok(FileChange {
            id,
            session_id: session_id.to_string(),
            file_path: file_path.to_string(),
            action,
            diff,
            reason,
            related_files,
            line_range,
            implements_decision_id,
            created_at: now,
        })
    }

    pub fn list_file_changes(&self, session_id: &str) -> Result<Vec<FileChange>> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare(
            "SELECT id, session_id, file_path, action, diff, reason, related_files,
                    line_range_start, line_range_end, implements_decision_id, created_at
             FROM file_changes WHERE session_id = ?1 ORDER BY created_at ASC",
        )?;
        let rows = stmt.query_map(rusqlite::params![session_id], |row| {
            let action: String = row.get(3)?;
            let related_json: String = row.get(6)?;
            let start: Option<u32> = row.get(7)?;
            let end: Option<u32> = row.get(8)?;
            Ok(FileChange {
                id: row.get(0)?,
                session_id: row.get(1)?,
                file_path: row.get(2)?,
                action: action.parse().unwrap_or(FileAction::Edit),
                diff: row.get(4)?,
                reason: row.get(5)?,
                related_files: serde_json::from_str(&related_json).unwrap_or_default(),
                line_range: start.zip(end),
                implements_decision_id: row.get(9)?,
                created_at: row.get(10)?,
            })
        })?;
        let mut out = Vec::new();
        for row in rows {
            out.push(row?);
        }
        Ok(out)
    }

    /// Creates `error`/`solution` graph nodes and a `solved_by` edge,
    /// weight = `confidence` (default 0.7) when `solution` is present
    /// (§4.6.4).
    pub fn record_error(
        &self,
        session_id: &str,
        error_type: &str,
        message: &str,
        stack_trace: Option<String>,
        file_path: Option<String>,
        line_number: Option<u32>,
        screenshot_ref: Option<String>,
        tags: Vec<String>,
        solution: Option<String>,
    ) -> Result<ErrorRecord> {
        let id = Uuid::new_v4().to_string();
        let now = Utc::now();
        let resolved = solution.is_some();
        let tags_json = serde_json::to_string(&tags)?;
        {
            let conn = self.conn.lock();
            conn.execute(
                "INSERT INTO error_records (id, session_id, error_type, message, stack_trace, file_path,
                    line_number, screenshot_ref, tags, solution, resolved, created_at)
                 VALUES (?1,?2,?3,?4,?5,?6,?7,?8,?9,?10,?11,?12)",
                rusqlite::params![
                    id, session_id, error_type, message, stack_trace, file_path, line_number,
                    screenshot_ref, tags_json, solution, resolved as i64, now,
                ],
            )?;
        }

        if let Some(sol) = &solution {
            let error_node = node_id("error", &id);
            let solution_node = node_id("solution", &id);
            self.graph
                .add_node(&error_node, NodeType::Error, serde_json::json!({"message": message}))?;
            self.graph
                .add_node(&solution_node, NodeType::Solution, serde_json::json!({"text": sol}))?;
            self.graph
                .add_edge(&error_node, &solution_node, RelType::SolvedBy, Some(0.7), None, None, None, Some(0.7))
                .ok();
        }

        Ok(ErrorRecord {
            id,
            session_id: session_id.to_string(),
            error_type: error_type.to_string(),
            message: message.to_string(),
            stack_trace,
            file_path,
            line_number,
            screenshot_ref,
            tags,
            solution,
            resolved,
            created_at: now,
        })
    }

    /// Adjacent `solution` nodes sorted by weight then recency (§4.6.4).
    pub fn get_solutions_for_error(&self, error_id: &str) -> Result<Vec<(String, f32)>> {
        let edges = self.graph.neighbors_by_rel(&node_id("error", error_id), RelType::SolvedBy, Utc::now())?;
        Ok(edges.into_iter().map(|e| (e.dst, e.weight)).collect())
    }

    pub fn list_errors(&self, session_id: &str) -> Result<Vec<ErrorRecord>> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare(
            "SELECT id, session_id, error_type, message, stack_trace, file_path, line_number,
                    screenshot_ref, tags, solution, resolved, created_at
             FROM error_records WHERE session_id = ?1 ORDER BY created_at ASC",
        )?;
        let rows = stmt.query_map(rusqlite::params![session_id], Self::row_to_error)?;
        let mut out = Vec::new();
        for row in rows {
            out.push(row?);
        }
        Ok(out)
    }

    fn row_to_error(row: &rusqlite::Row) -> rusqlite::Result<ErrorRecord> {
        let tags_json: String = row.get(8)?;
        Ok(ErrorRecord {
            id: row.get(0)?,
            session_id: row.get(1)?,
            error_type: row.get(2)?,
            message: row.get(3)?,
            stack_trace: row.get(4)?,
            file_path: row.get(5)?,
            line_number: row.get(6)?,
            screenshot_ref: row.get(7)?,
            tags: serde_json::from_str(&tags_json).unwrap_or_default(),
            solution: row.get(9)?,
            resolved: row.get::<_, i64>(10)? != 0,
            created_at: row.get(11)?,
        })
    }

    /// "Contains substring, case-insensitive" per §9's open-question
    /// resolution (same rule `MemoryManager::search_text` applies).
    pub fn search_errors(&self, user_id: &str, project_id: &str, query: &str, unresolved_only: bool) -> Result<Vec<ErrorRecord>> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare(
            "SELECT e.id, e.session_id, e.error_type, e.message, e.stack_trace, e.file_path, e.line_number,
                    e.screenshot_ref, e.tags, e.solution, e.resolved, e.created_at
             FROM error_records e
             JOIN coding_sessions s ON s.session_id = e.session_id
             WHERE s.user_id = ?1 AND s.project_id = ?2
             ORDER BY e.created_at DESC",
        )?;
        let rows = stmt.query_map(rusqlite::params![user_id, project_id], Self::row_to_error)?;
        let needle = query.to_lowercase();
        let mut out = Vec::new();
        for row in rows {
            let record = row?;
            if unresolved_only && record.resolved {
                continue;
            }
            if !query.is_empty() && !record.message.to_lowercase().contains(&needle) {
                continue;
            }
            out.push(record);
        }
        Ok(out)
    }

    pub fn record_decision(
        &self,
        session_id: &str,
        decision: &str,
        rationale: &str,
        alternatives: Vec<String>,
        impact: Option<String>,
        tags: Vec<String>,
        related_files: Vec<String>,
        confidence: f32,
    ) -> Result<DecisionRecord> {
        let id = Uuid::new_v4().to_string();
        let now = Utc::now();
        let alternatives_json = serde_json::to_string(&alternatives)?;
        let tags_json = serde_json::to_string(&tags)?;
        let related_json = serde_json::to_string(&related_files)?;
        let conn = self.conn.lock();
        conn.execute(
            "INSERT INTO decision_records (id, session_id, decision, rationale, alternatives, impact, tags,
                related_files, confidence, created_at)
             VALUES (?1,?2,?3,?4,?5,?6,?7,?8,?9,?10)",
            rusqlite::params![id, session_id, decision, rationale, alternatives_json, impact, tags_json, related_json, confidence, now],
        )?;
        Ok(DecisionRecord {
            id,
            session_id: session_id.to_string(),
            decision: decision.to_string(),
            rationale: rationale.to_string(),
            alternatives,
            impact,
            tags,
            related_files,
            confidence,
            created_at: now,
        })
    }

    pub fn list_decisions(&self, session_id: &str) -> Result<Vec<DecisionRecord>> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare(
            "SELECT id, session_id, decision, rationale, alternatives, impact, tags, related_files, confidence, created_at
             FROM decision_records WHERE session_id = ?1 ORDER BY created_at ASC",
        )?;
        let rows = stmt.query_map(rusqlite::params![session_id], Self::row_to_decision)?;
        let mut out = Vec::new();
        for row in rows {
            out.push(row?);
        }
        Ok(out)
    }

    fn row_to_decision(row: &rusqlite::Row) -> rusqlite::Result<DecisionRecord> {
        let alternatives_json: String = row.get(4)?;
        let tags_json: String = row.get(6)?;
        let related_json: String = row.get(7)?;
        Ok(DecisionRecord {
            id: row.get(0)?,
            session_id: row.get(1)?,
            decision: row.get(2)?,
            rationale: row.get(3)?,
            alternatives: serde_json::from_str(&alternatives_json).unwrap_or_default(),
            impact: row.get(5)?,
            tags: serde_json::from_str(&tags_json).unwrap_or_default(),
            related_files: serde_json::from_str(&related_json).unwrap_or_default(),
            confidence: row.get(8)?,
            created_at: row.get(9)?,
        })
    }

    /// `|{f in related_files : exists implements edge to decision}| / |related_files|` (§4.6.5).
    pub fn get_decision_implementation_status(&self, decision_id: &str) -> Result<DecisionImplementationStatus> {
        let decision = {
            let conn = self.conn.lock();
            conn.query_row(
                "SELECT related_files FROM decision_records WHERE id = ?1",
                rusqlite::params![decision_id],
                |row| row.get::<_, String>(0),
            )
            .map(|j: String| serde_json::from_str::<Vec<String>>(&j).unwrap_or_default())
            .or_else(|e| match e {
                rusqlite::Error::QueryReturnedNoRows => Ok(Vec::new()),
                other => Err(other),
            })?
        };
        if decision.is_empty() {
            return Ok(DecisionImplementationStatus::default());
        }

        let decision_node = node_id("decision", decision_id);
        let mut implemented = 0usize;
        let mut pending = Vec::new();
        for file in &decision {
            let file_node = node_id("file", file);
            let has_edge = self
                .graph
                .query_graph(&[file_node], 1, Some(&[RelType::Implements]), Utc::now())?
                .edges
                .iter()
                .any(|e| e.dst == decision_node);
            if has_edge {
                implemented += 1;
            } else {
                pending.push(file.clone());
            }
        }
        Ok(DecisionImplementationStatus {
            completion: implemented as f32 / decision.len() as f32,
            pending_files: pending,
        })
    }

    pub fn get_project_context(&self, user_id: &str, project_id: &str) -> Result<ProjectContext> {
        let conn = self.conn.lock();
        let active_session_id: Option<String> = conn
            .query_row(
                "SELECT session_id FROM coding_sessions WHERE user_id=?1 AND project_id=?2 AND status='active'",
                rusqlite::params![user_id, project_id],
                |row| row.get(0),
            )
            .ok();
        drop(conn);

        let active_session = match &active_session_id {
            Some(id) => self.get(id)?,
            None => None,
        };

        let session_ids = self.session_ids_for_project(user_id, project_id)?;
        let mut recent_file_changes = Vec::new();
        let mut recent_decisions = Vec::new();
        let mut unresolved_errors = Vec::new();
        for sid in &session_ids {
            recent_file_changes.extend(self.list_file_changes(sid)?);
            recent_decisions.extend(self.list_decisions(sid)?);
            unresolved_errors.extend(self.list_errors(sid)?.into_iter().filter(|e| !e.resolved));
        }
        recent_file_changes.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        recent_file_changes.truncate(20);
        recent_decisions.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        recent_decisions.truncate(20);

        Ok(ProjectContext {
            active_session,
            recent_file_changes,
            recent_decisions,
            unresolved_errors,
        })
    }

    fn session_ids_for_project(&self, user_id: &str, project_id: &str) -> Result<Vec<String>> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare(
            "SELECT session_id FROM coding_sessions WHERE user_id=?1 AND project_id=?2 ORDER BY started_at DESC",
        )?;
        let rows = stmt.query_map(rusqlite::params![user_id, project_id], |row| row.get::<_, String>(0))?;
        let mut out = Vec::new();
        for row in rows {
            out.push(row?);
        }
        Ok(out)
    }

    pub fn analyze_patterns(&self, user_id: &str, project_id: &str) -> Result<PatternReport> {
        let session_ids = self.session_ids_for_project(user_id, project_id)?;
        let mut error_type_counts: std::collections::HashMap<String, i64> = std::collections::HashMap::new();
        let mut file_change_counts: std::collections::HashMap<String, i64> = std::collections::HashMap::new();
        for sid in &session_ids {
            for e in self.list_errors(sid)? {
                *error_type_counts.entry(e.error_type).or_insert(0) += 1;
            }
            for f in self.list_file_changes(sid)? {
                *file_change_counts.entry(f.file_path).or_insert(0) += 1;
            }
        }
        let mut recurring_error_types: Vec<(String, i64)> = error_type_counts.into_iter().filter(|(_, c)| *c > 1).collect();
        recurring_error_types.sort_by(|a, b| b.1.cmp(&a.1));
        let mut frequently_changed_files: Vec<(String, i64)> = file_change_counts.into_iter().collect();
        frequently_changed_files.sort_by(|a, b| b.1.cmp(&a.1));
        frequently_changed_files.truncate(10);

        Ok(PatternReport {
            total_sessions: session_ids.len() as i64,
            recurring_error_types,
            frequently_changed_files,
            session_ids,
        })
    }

    /// Parses import statements for recognized source files (§4.6.3) and
    /// records a forward `depends_on` edge per import; `imported_by` is
    /// derived by querying those edges in reverse rather than storing a
    /// second edge per pair.
    pub fn analyze_file_dependencies(&self, path: &str, content: &str) -> Result<FileDependencies> {
        let imports = parse_imports(path, content);
        let file_node = node_id("file", path);
        self.graph.add_node(&file_node, NodeType::File, serde_json::json!({"path": path}))?;
        for import in &imports {
            let import_node = node_id("file", import);
            self.graph.add_node(&import_node, NodeType::File, serde_json::json!({"path": import})).ok();
            self.graph
                .add_edge(&file_node, &import_node, RelType::DependsOn, None, None, None, Some("ast".to_string()), None)
                .ok();
        }

        let subgraph = self.graph.query_graph(&[file_node.clone()], 6, Some(&[RelType::DependsOn]), Utc::now())?;
        let imported_by: Vec<String> = self
            .graph
            .transitive_dependents(&file_node, 6, Some(&[RelType::DependsOn]), Utc::now())?
            .iter()
            .map(|n| n.trim_start_matches("file:").to_string())
            .collect();
        let import_depth = subgraph
            .edges
            .iter()
            .filter(|e| e.src == file_node)
            .count() as u32;

        let circular_deps = imports
            .iter()
            .filter(|imp| {
                self.graph
                    .shortest_path_len(&node_id("file", imp), &file_node, 6)
                    .unwrap_or(None)
                    .is_some()
            })
            .cloned()
            .collect();

        Ok(FileDependencies {
            imports,
            imported_by,
            import_depth,
            circular_deps,
        })
    }

    /// `≤1 -> low, ≤4 -> medium, else high` (§4.6.3).
    pub fn analyze_refactor_impact(&self, path: &str) -> Result<RefactorImpact> {
        let file_node = node_id("file", path);
        let affected_files: Vec<String> = self
            .graph
            .transitive_dependents(&file_node, 6, Some(&[RelType::DependsOn]), Utc::now())?
            .iter()
            .map(|n| n.trim_start_matches("file:").to_string())
            .collect();
        let risk = match affected_files.len() {
            0..=1 => RefactorRisk::Low,
            2..=4 => RefactorRisk::Medium,
            _ => RefactorRisk::High,
        };
        Ok(RefactorImpact { affected_files, risk })
    }

    /// Topological sort of the induced `depends_on` subgraph on `files`;
    /// cycle members are placed last, lexicographically (§4.6.3).
    pub fn suggest_refactor_order(&self, files: &[String]) -> Result<Vec<String>> {
        use std::collections::{HashMap, HashSet};

        let file_set: HashSet<&String> = files.iter().collect();
        let mut adjacency: HashMap<String, Vec<String>> = HashMap::new();
        let mut in_degree: HashMap<String, usize> = files.iter().map(|f| (f.clone(), 0)).collect();

        for f in files {
            let node = node_id("file", f);
            let subgraph = self.graph.query_graph(&[node.clone()], 1, Some(&[RelType::DependsOn]), Utc::now())?;
            for edge in &subgraph.edges {
                if edge.src != node {
                    continue;
                }
                let dep = edge.dst.trim_start_matches("file:").to_string();
                if file_set.contains(&dep) {
                    adjacency.entry(f.clone()).or_default().push(dep.clone());
                    *in_degree.entry(f.clone()).or_insert(0) += 1;
                }
            }
        }

        let mut ready: Vec<String> = in_degree.iter().filter(|(_, d)| **d == 0).map(|(f, _)| f.clone()).collect();
        ready.sort();
        let mut order = Vec::new();
        let mut remaining = in_degree.clone();

        while let Some(next) = ready.pop() {
            order.push(next.clone());
            remaining.remove(&next);
            for (f, deps) in &adjacency {
                if deps.contains(&next) {
                    if let Some(d) = remaining.get_mut(f) {
                        *d = d.saturating_sub(1);
                        if *d == 0 && !order.contains(f) && !ready.contains(f) {
                            ready.push(f.clone());
                            ready.sort();
                        }
                    }
                }
            }
        }

        let mut cyclic: Vec<String> = remaining.into_keys().filter(|f| !order.contains(f)).collect();
        cyclic.sort();
        order.extend(cyclic);
        Ok(order)
    }
}

/// Dispatches to a tree-sitter grammar by extension and extracts import
/// targets (§4.6.3). Unrecognized extensions yield no imports rather than
/// an error — AST dependency analysis is best-effort over recognized
/// source files only.
fn parse_imports(path: &str, content: &str) -> Vec<String> {
    let ext = Path::new(path).extension().and_then(|e| e.to_str()).unwrap_or("");
    match ext {
        "rs" => parse_imports_tree_sitter(content, tree_sitter_rust::language(), "(use_declaration argument: (_) @path)"),
        "js" | "jsx" | "mjs" => parse_imports_tree_sitter(
            content,
            tree_sitter_javascript::language(),
            "(import_statement source: (string) @path) (call_expression function: (identifier) @fn arguments: (arguments (string) @path) (#eq? @fn \"require\"))",
        ),
        "ts" | "tsx" => parse_imports_tree_sitter(
            content,
            tree_sitter_typescript::language_typescript(),
            "(import_statement source: (string) @path)",
        ),
        "py" => parse_imports_tree_sitter(
            content,
            tree_sitter_python::language(),
            "(import_from_statement module_name: (dotted_name) @path) (import_statement name: (dotted_name) @path)",
        ),
        _ => Vec::new(),
    }
}

fn parse_imports_tree_sitter(content: &str, language: tree_sitter::Language, query_src: &str) -> Vec<String> {
    let mut parser = tree_sitter::Parser::new();
    if parser.set_language(&language).is_err() {
        return Vec::new();
    }
    let Some(tree) = parser.parse(content, None) else {
        return Vec::new();
    };
    let Ok(query) = tree_sitter::Query::new(&language, query_src) else {
        return Vec::new();
    };
    let mut cursor = tree_sitter::QueryCursor::new();
    let mut imports = Vec::new();
    let mut matches = cursor.matches(&query, tree.root_node(), content.as_bytes());
    while let Some(m) = matches.next() {
        for capture in m.captures {
            if let Ok(text) = capture.node.utf8_text(content.as_bytes()) {
                imports.push(text.trim_matches(|c| c == '"' || c == '\'').to_string());
            }
        }
    }
    imports
}
