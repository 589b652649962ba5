//! Schema migrations (§3, §4.6.2, §4.8).
//!
//! Follows the incremental `schema_version` table + `migrate_vN` pattern:
//! each step is additive and idempotent so a fresh database and an upgraded
//! one converge on the same schema.

use rusqlite::Connection;

use crate::error::Result;

pub const SCHEMA_VERSION: i32 = 3;

pub fn migrate(conn: &Connection) -> Result<()> {
    conn.execute(
        "CREATE TABLE IF NOT EXISTS schema_version (
            version INTEGER PRIMARY KEY,
            applied_at TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP
        )",
        [],
    )?;

    let current_version: i32 = conn
        .query_row("SELECT COALESCE(MAX(version), 0) FROM schema_version", [], |row| {
            row.get(0)
        })
        .unwrap_or(0);

    if current_version < 1 {
        migrate_v1(conn)?;
    }
    if current_version < 2 {
        migrate_v2(conn)?;
    }
    if current_version < SCHEMA_VERSION {
        migrate_v3(conn)?;
    }

    Ok(())
}

/// `memories` table (C3, §3.1) and the vector/lexical companion tables.
fn migrate_v1(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        r#"
        CREATE TABLE IF NOT EXISTS memories (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            user_id TEXT NOT NULL,
            agent_name TEXT NOT NULL,
            key TEXT NOT NULL,
            value_kind TEXT NOT NULL,
            value_text TEXT NOT NULL,
            value_mime TEXT,
            tags TEXT NOT NULL DEFAULT '[]',
            importance REAL NOT NULL DEFAULT 0.5,
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL,
            access_count INTEGER NOT NULL DEFAULT 0,
            last_accessed_at TEXT NOT NULL,
            embedding_ref INTEGER,
            content_hash TEXT NOT NULL,
            UNIQUE(user_id, agent_name, key)
        );

        CREATE INDEX IF NOT EXISTS idx_memories_partition ON memories(user_id, agent_name);
        CREATE INDEX IF NOT EXISTS idx_memories_content_hash ON memories(user_id, agent_name, content_hash);
        CREATE INDEX IF NOT EXISTS idx_memories_updated_at ON memories(updated_at);

        CREATE TABLE IF NOT EXISTS embeddings (
            embedding_ref INTEGER PRIMARY KEY AUTOINCREMENT,
            model_name TEXT NOT NULL,
            dimensions INTEGER NOT NULL,
            vector BLOB NOT NULL
        );

        CREATE TABLE IF NOT EXISTS lexical_terms (
            memory_id INTEGER NOT NULL,
            term TEXT NOT NULL,
            term_freq INTEGER NOT NULL,
            PRIMARY KEY (memory_id, term),
            FOREIGN KEY (memory_id) REFERENCES memories(id) ON DELETE CASCADE
        );
        CREATE INDEX IF NOT EXISTS idx_lexical_terms_term ON lexical_terms(term);

        CREATE TABLE IF NOT EXISTS lexical_doc_stats (
            memory_id INTEGER PRIMARY KEY,
            doc_length INTEGER NOT NULL,
            FOREIGN KEY (memory_id) REFERENCES memories(id) ON DELETE CASCADE
        );

        CREATE TABLE IF NOT EXISTS lexical_doc_partition (
            memory_id INTEGER PRIMARY KEY,
            user_id TEXT NOT NULL,
            agent_name TEXT NOT NULL,
            FOREIGN KEY (memory_id) REFERENCES memories(id) ON DELETE CASCADE
        );
        "#,
    )?;
    conn.execute(
        "INSERT INTO schema_version (version) VALUES (1)",
        [],
    )?;
    Ok(())
}

/// Temporal knowledge graph tables (C8, §3.1, §4.8).
fn migrate_v2(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        r#"
        CREATE TABLE IF NOT EXISTS graph_nodes (
            id TEXT PRIMARY KEY,
            node_type TEXT NOT NULL,
            data TEXT NOT NULL DEFAULT '{}'
        );
        CREATE INDEX IF NOT EXISTS idx_graph_nodes_type ON graph_nodes(node_type);

        CREATE TABLE IF NOT EXISTS graph_edges (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            src TEXT NOT NULL,
            dst TEXT NOT NULL,
            rel_type TEXT NOT NULL,
            weight REAL NOT NULL DEFAULT 1.0,
            data TEXT NOT NULL DEFAULT '{}',
            valid_from TEXT NOT NULL,
            valid_until TEXT,
            source TEXT,
            confidence REAL NOT NULL DEFAULT 1.0,
            FOREIGN KEY (src) REFERENCES graph_nodes(id) ON DELETE CASCADE,
            FOREIGN KEY (dst) REFERENCES graph_nodes(id) ON DELETE CASCADE
        );
        CREATE INDEX IF NOT EXISTS idx_graph_edges_src ON graph_edges(src, rel_type, dst);
        CREATE INDEX IF NOT EXISTS idx_graph_edges_dst ON graph_edges(dst, rel_type, src);
        CREATE INDEX IF NOT EXISTS idx_graph_edges_validity ON graph_edges(valid_from, valid_until);
        "#,
    )?;
    conn.execute("INSERT INTO schema_version (version) VALUES (2)", [])?;
    Ok(())
}

/// Coding-session tables (C10, §4.6).
fn migrate_v3(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        r#"
        CREATE TABLE IF NOT EXISTS coding_sessions (
            session_id TEXT PRIMARY KEY,
            user_id TEXT NOT NULL,
            project_id TEXT NOT NULL,
            description TEXT NOT NULL,
            started_at TEXT NOT NULL,
            ended_at TEXT,
            status TEXT NOT NULL,
            tags TEXT NOT NULL DEFAULT '[]',
            linked_issue TEXT,
            summary TEXT
        );
        CREATE INDEX IF NOT EXISTS idx_coding_sessions_user_project
            ON coding_sessions(user_id, project_id, status);

        CREATE TABLE IF NOT EXISTS file_changes (
            id TEXT PRIMARY KEY,
            session_id TEXT NOT NULL,
            file_path TEXT NOT NULL,
            action TEXT NOT NULL,
            diff TEXT,
            reason TEXT,
            related_files TEXT NOT NULL DEFAULT '[]',
            line_range_start INTEGER,
            line_range_end INTEGER,
            implements_decision_id TEXT,
            created_at TEXT NOT NULL,
            FOREIGN KEY (session_id) REFERENCES coding_sessions(session_id) ON DELETE CASCADE
        );
        CREATE INDEX IF NOT EXISTS idx_file_changes_session ON file_changes(session_id);
        CREATE INDEX IF NOT EXISTS idx_file_changes_path ON file_changes(file_path);

        CREATE TABLE IF NOT EXISTS error_records (
            id TEXT PRIMARY KEY,
            session_id TEXT NOT NULL,
            error_type TEXT NOT NULL,
            message TEXT NOT NULL,
            stack_trace TEXT,
            file_path TEXT,
            line_number INTEGER,
            screenshot_ref TEXT,
            tags TEXT NOT NULL DEFAULT '[]',
            solution TEXT,
            resolved INTEGER NOT NULL DEFAULT 0,
            created_at TEXT NOT NULL,
            FOREIGN KEY (session_id) REFERENCES coding_sessions(session_id) ON DELETE CASCADE
        );
        CREATE INDEX IF NOT EXISTS idx_error_records_session ON error_records(session_id);

        CREATE TABLE IF NOT EXISTS decision_records (
            id TEXT PRIMARY KEY,
            session_id TEXT NOT NULL,
            decision TEXT NOT NULL,
            rationale TEXT NOT NULL,
            alternatives TEXT NOT NULL DEFAULT '[]',
            impact TEXT,
            tags TEXT NOT NULL DEFAULT '[]',
            related_files TEXT NOT NULL DEFAULT '[]',
            confidence REAL NOT NULL DEFAULT 0.5,
            created_at TEXT NOT NULL,
            FOREIGN KEY (session_id) REFERENCES coding_sessions(session_id) ON DELETE CASCADE
        );
        CREATE INDEX IF NOT EXISTS idx_decision_records_session ON decision_records(session_id);
        "#,
    )?;
    conn.execute("INSERT INTO schema_version (version) VALUES (3)", [])?;
    Ok(())
}
