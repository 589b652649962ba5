//! `rusqlite`-backed `KvStore` implementation (§4.1).
//!
//! Mirrors the teacher's WAL-mode pragma configuration and parent-directory
//! bootstrapping (`connection.rs`), but keeps a single mutex-guarded
//! connection rather than a pool: `KvStore`'s trait surface is synchronous,
//! and SQLite's own writer serialization makes a connection pool pure
//! overhead here (see DESIGN.md).

use std::path::Path;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use rusqlite::{params, Connection, OpenFlags, Row};
use serde_json::Value as JsonValue;

use super::migrations;
use super::{HealthStatus, KvStore, StorageStats};
use crate::error::Result;
use crate::types::{ListFilter, Memory, MemoryValue};

pub struct SqliteKvStore {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteKvStore {
    pub fn open(db_path: &str) -> Result<Self> {
        let conn = if db_path == ":memory:" {
            Connection::open_in_memory()?
        } else {
            if let Some(parent) = Path::new(db_path).parent() {
                if !parent.as_os_str().is_empty() {
                    std::fs::create_dir_all(parent)?;
                }
            }
            let flags = OpenFlags::SQLITE_OPEN_READ_WRITE
                | OpenFlags::SQLITE_OPEN_CREATE
                | OpenFlags::SQLITE_OPEN_NO_MUTEX;
            Connection::open_with_flags(db_path, flags)?
        };
        Self::configure_pragmas(&conn, db_path != ":memory:")?;
        migrations::migrate(&conn)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    pub fn open_in_memory() -> Result<Self> {
        Self::open(":memory:")
    }

    /// WAL for on-disk databases; in-memory databases can't use WAL and
    /// don't need the durability pragmas anyway.
    fn configure_pragmas(conn: &Connection, on_disk: bool) -> Result<()> {
        if on_disk {
            conn.execute_batch(
                r#"
                PRAGMA journal_mode=WAL;
                PRAGMA synchronous=NORMAL;
                PRAGMA wal_autocheckpoint=1000;
                PRAGMA busy_timeout=30000;
                PRAGMA cache_size=-64000;
                PRAGMA temp_store=MEMORY;
                PRAGMA mmap_size=268435456;
                PRAGMA foreign_keys=ON;
                "#,
            )?;
        } else {
            conn.execute_batch(
                r#"
                PRAGMA busy_timeout=30000;
                PRAGMA foreign_keys=ON;
                "#,
            )?;
        }
        Ok(())
    }

    pub fn with_connection<F, T>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&Connection) -> Result<T>,
    {
        let conn = self.conn.lock();
        f(&conn)
    }

    fn row_to_memory(row: &Row) -> rusqlite::Result<Memory> {
        let value_kind: String = row.get("value_kind")?;
        let value_text: String = row.get("value_text")?;
        let value_mime: Option<String> = row.get("value_mime")?;
        let value = match value_kind.as_str() {
            "json" => MemoryValue::Json(serde_json::from_str(&value_text).unwrap_or(JsonValue::Null)),
            "binary_ref" => MemoryValue::BinaryRef {
                uri: value_text,
                mime_type: value_mime,
            },
            _ => MemoryValue::Text(value_text),
        };
        let tags_json: String = row.get("tags")?;
        let tags: Vec<String> = serde_json::from_str(&tags_json).unwrap_or_default();

        Ok(Memory {
            id: row.get("id")?,
            user_id: row.get("user_id")?,
            agent_name: row.get("agent_name")?,
            key: row.get("key")?,
            value,
            scope: crate::types::MemoryScope::Persistent,
            tags,
            importance: row.get("importance")?,
            created_at: row.get("created_at")?,
            updated_at: row.get("updated_at")?,
            access_count: row.get("access_count")?,
            last_accessed_at: row.get("last_accessed_at")?,
            embedding_ref: row.get("embedding_ref")?,
            content_hash: row.get("content_hash")?,
        })
    }

    const SELECT_COLUMNS: &'static str = "id, user_id, agent_name, key, value_kind, value_text, \
        value_mime, tags, importance, created_at, updated_at, access_count, last_accessed_at, \
        embedding_ref, content_hash";
}

fn value_parts(value: &MemoryValue) -> (&'static str, String, Option<String>) {
    match value {
        MemoryValue::Text(s) => ("text", s.clone(), None),
        MemoryValue::Json(v) => ("json", v.to_string(), None),
        MemoryValue::BinaryRef { uri, mime_type } => ("binary_ref", uri.clone(), mime_type.clone()),
    }
}

impl KvStore for SqliteKvStore {
    fn put(&self, memory: &Memory) -> Result<Memory> {
        self.with_connection(|conn| {
            let (kind, text, mime) = value_parts(&memory.value);
            let tags_json = serde_json::to_string(&memory.tags)?;
            conn.execute(
                "INSERT INTO memories (
                    user_id, agent_name, key, value_kind, value_text, value_mime, tags,
                    importance, created_at, updated_at, access_count, last_accessed_at,
                    embedding_ref, content_hash
                ) VALUES (?1,?2,?3,?4,?5,?6,?7,?8,?9,?10,?11,?12,?13,?14)
                ON CONFLICT(user_id, agent_name, key) DO UPDATE SET
                    value_kind=excluded.value_kind,
                    value_text=excluded.value_text,
                    value_mime=excluded.value_mime,
                    tags=excluded.tags,
                    importance=excluded.importance,
                    updated_at=excluded.updated_at,
                    embedding_ref=excluded.embedding_ref,
                    content_hash=excluded.content_hash",
                params![
                    memory.user_id,
                    memory.agent_name,
                    memory.key,
                    kind,
                    text,
                    mime,
                    tags_json,
                    memory.importance,
                    memory.created_at,
                    memory.updated_at,
                    memory.access_count,
                    memory.last_accessed_at,
                    memory.embedding_ref,
                    memory.content_hash,
                ],
            )?;

            let sql = format!(
                "SELECT {} FROM memories WHERE user_id=?1 AND agent_name=?2 AND key=?3",
                SqliteKvStore::SELECT_COLUMNS
            );
            let stored = conn.query_row(
                &sql,
                params![memory.user_id, memory.agent_name, memory.key],
                SqliteKvStore::row_to_memory,
            )?;
            Ok(stored)
        })
    }

    fn get(&self, user_id: &str, agent_name: &str, key: &str) -> Result<Option<Memory>> {
        self.with_connection(|conn| {
            let sql = format!(
                "SELECT {} FROM memories WHERE user_id=?1 AND agent_name=?2 AND key=?3",
                SqliteKvStore::SELECT_COLUMNS
            );
            let result = conn
                .query_row(&sql, params![user_id, agent_name, key], SqliteKvStore::row_to_memory)
                .map(Some)
                .or_else(|e| match e {
                    rusqlite::Error::QueryReturnedNoRows => Ok(None),
                    other => Err(other),
                })?;
            Ok(result)
        })
    }

    fn get_by_id(&self, id: i64) -> Result<Option<Memory>> {
        self.with_connection(|conn| {
            let sql = format!("SELECT {} FROM memories WHERE id=?1", SqliteKvStore::SELECT_COLUMNS);
            let result = conn
                .query_row(&sql, params![id], SqliteKvStore::row_to_memory)
                .map(Some)
                .or_else(|e| match e {
                    rusqlite::Error::QueryReturnedNoRows => Ok(None),
                    other => Err(other),
                })?;
            Ok(result)
        })
    }

    fn find_by_content_hash(
        &self,
        user_id: &str,
        agent_name: &str,
        content_hash: &str,
    ) -> Result<Option<Memory>> {
        self.with_connection(|conn| {
            let sql = format!(
                "SELECT {} FROM memories WHERE user_id=?1 AND agent_name=?2 AND content_hash=?3 \
                 ORDER BY updated_at DESC LIMIT 1",
                SqliteKvStore::SELECT_COLUMNS
            );
            let result = conn
                .query_row(
                    &sql,
                    params![user_id, agent_name, content_hash],
                    SqliteKvStore::row_to_memory,
                )
                .map(Some)
                .or_else(|e| match e {
                    rusqlite::Error::QueryReturnedNoRows => Ok(None),
                    other => Err(other),
                })?;
            Ok(result)
        })
    }

    fn delete(&self, user_id: &str, agent_name: &str, key: &str) -> Result<bool> {
        self.with_connection(|conn| {
            let embedding_ref: Option<i64> = conn
                .query_row(
                    "SELECT embedding_ref FROM memories WHERE user_id=?1 AND agent_name=?2 AND key=?3",
                    params![user_id, agent_name, key],
                    |row| row.get(0),
                )
                .ok()
                .flatten();
            let affected = conn.execute(
                "DELETE FROM memories WHERE user_id=?1 AND agent_name=?2 AND key=?3",
                params![user_id, agent_name, key],
            )?;
            if let Some(eref) = embedding_ref {
                conn.execute("DELETE FROM embeddings WHERE embedding_ref=?1", params![eref])?;
            }
            Ok(affected > 0)
        })
    }

    fn delete_by_id(&self, id: i64) -> Result<bool> {
        self.with_connection(|conn| {
            let embedding_ref: Option<i64> = conn
                .query_row(
                    "SELECT embedding_ref FROM memories WHERE id=?1",
                    params![id],
                    |row| row.get(0),
                )
                .ok()
                .flatten();
            let affected = conn.execute("DELETE FROM memories WHERE id=?1", params![id])?;
            if let Some(eref) = embedding_ref {
                conn.execute("DELETE FROM embeddings WHERE embedding_ref=?1", params![eref])?;
            }
            Ok(affected > 0)
        })
    }

    fn scan(&self, user_id: &str, agent_name: Option<&str>, filter: &ListFilter) -> Result<Vec<Memory>> {
        self.with_connection(|conn| {
            let sql = format!(
                "SELECT {} FROM memories \
                 WHERE user_id=?1 \
                   AND (?2 IS NULL OR agent_name=?2) \
                   AND (?3 IS NULL OR updated_at >= ?3) \
                 ORDER BY updated_at DESC",
                SqliteKvStore::SELECT_COLUMNS
            );
            let agent = agent_name.or(filter.agent_name.as_deref());
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt.query_map(params![user_id, agent, filter.since], SqliteKvStore::row_to_memory)?;
            let mut out = Vec::new();
            for row in rows {
                out.push(row?);
            }
            if let Some(tags) = &filter.tags {
                out.retain(|m| tags.iter().all(|t| m.tags.contains(t)));
            }
            if filter.limit > 0 {
                out.truncate(filter.limit);
            }
            Ok(out)
        })
    }

    fn bump_access(&self, id: i64) -> Result<()> {
        self.with_connection(|conn| {
            conn.execute(
                "UPDATE memories SET access_count = access_count + 1, last_accessed_at = ?2 WHERE id = ?1",
                params![id, Utc::now()],
            )?;
            Ok(())
        })
    }

    fn set_importance(&self, id: i64, importance: f32) -> Result<()> {
        self.with_connection(|conn| {
            conn.execute(
                "UPDATE memories SET importance = ?2 WHERE id = ?1",
                params![id, importance],
            )?;
            Ok(())
        })
    }

    fn count(&self) -> Result<i64> {
        self.with_connection(|conn| {
            Ok(conn.query_row("SELECT COUNT(*) FROM memories", [], |row| row.get(0))?)
        })
    }

    fn health_check(&self) -> Result<HealthStatus> {
        let start = std::time::Instant::now();
        let result = self.with_connection(|conn| {
            conn.query_row("SELECT 1", [], |row| row.get::<_, i64>(0))?;
            Ok(())
        });
        let latency_ms = start.elapsed().as_secs_f64() * 1000.0;
        Ok(match result {
            Ok(()) => HealthStatus {
                healthy: true,
                latency_ms,
                error: None,
            },
            Err(e) => HealthStatus {
                healthy: false,
                latency_ms,
                error: Some(e.to_string()),
            },
        })
    }

    fn stats(&self) -> Result<StorageStats> {
        self.with_connection(|conn| {
            let memory_count: i64 = conn.query_row("SELECT COUNT(*) FROM memories", [], |row| row.get(0))?;
            let partition_count: i64 = conn.query_row(
                "SELECT COUNT(DISTINCT user_id || ':' || agent_name) FROM memories",
                [],
                |row| row.get(0),
            )?;
            let db_size_bytes: Option<i64> = conn
                .query_row(
                    "SELECT page_count * page_size FROM pragma_page_count(), pragma_page_size()",
                    [],
                    |row| row.get(0),
                )
                .ok();
            Ok(StorageStats {
                memory_count,
                partition_count,
                db_size_bytes,
            })
        })
    }

    fn all(&self) -> Result<Vec<Memory>> {
        self.with_connection(|conn| {
            let sql = format!("SELECT {} FROM memories ORDER BY id ASC", SqliteKvStore::SELECT_COLUMNS);
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt.query_map([], SqliteKvStore::row_to_memory)?;
            let mut out = Vec::new();
            for row in rows {
                out.push(row?);
            }
            Ok(out)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::MemoryScope;

    fn sample_memory(user_id: &str, key: &str) -> Memory {
        let now = Utc::now();
        let value = MemoryValue::Text("likes dark roast coffee".to_string());
        let tags = vec!["preference".to_string()];
        let content_hash = Memory::compute_content_hash(&value, &tags, MemoryScope::Persistent);
        Memory {
            id: 0,
            user_id: user_id.to_string(),
            agent_name: "assistant".to_string(),
            key: key.to_string(),
            value,
            scope: MemoryScope::Persistent,
            tags,
            importance: 0.5,
            created_at: now,
            updated_at: now,
            access_count: 0,
            last_accessed_at: now,
            embedding_ref: None,
            content_hash,
        }
    }

    #[test]
    fn put_then_get_round_trips() {
        let store = SqliteKvStore::open_in_memory().unwrap();
        let mem = sample_memory("u1", "coffee_pref");
        let stored = store.put(&mem).unwrap();
        assert!(stored.id > 0);

        let fetched = store.get("u1", "assistant", "coffee_pref").unwrap().unwrap();
        assert_eq!(fetched.value.as_text(), "likes dark roast coffee");
        assert_eq!(fetched.tags, vec!["preference".to_string()]);
    }

    #[test]
    fn put_upserts_on_same_key() {
        let store = SqliteKvStore::open_in_memory().unwrap();
        let mut mem = sample_memory("u1", "coffee_pref");
        store.put(&mem).unwrap();
        mem.value = MemoryValue::Text("likes light roast now".to_string());
        store.put(&mem).unwrap();

        assert_eq!(store.count().unwrap(), 1);
        let fetched = store.get("u1", "assistant", "coffee_pref").unwrap().unwrap();
        assert_eq!(fetched.value.as_text(), "likes light roast now");
    }

    #[test]
    fn delete_removes_row() {
        let store = SqliteKvStore::open_in_memory().unwrap();
        let mem = sample_memory("u1", "coffee_pref");
        store.put(&mem).unwrap();
        assert!(store.delete("u1", "assistant", "coffee_pref").unwrap());
        assert!(store.get("u1", "assistant", "coffee_pref").unwrap().is_none());
        assert!(!store.delete("u1", "assistant", "coffee_pref").unwrap());
    }

    #[test]
    fn scan_orders_by_updated_at_desc_and_respects_limit() {
        let store = SqliteKvStore::open_in_memory().unwrap();
        store.put(&sample_memory("u1", "a")).unwrap();
        std::thread::sleep(std::time::Duration::from_millis(5));
        store.put(&sample_memory("u1", "b")).unwrap();

        let filter = ListFilter {
            agent_name: None,
            tags: None,
            since: None,
            limit: 1,
        };
        let results = store.scan("u1", Some("assistant"), &filter).unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].key, "b");
    }

    #[test]
    fn find_by_content_hash_detects_duplicates() {
        let store = SqliteKvStore::open_in_memory().unwrap();
        let mem = sample_memory("u1", "a");
        store.put(&mem).unwrap();
        let found = store
            .find_by_content_hash("u1", "assistant", &mem.content_hash)
            .unwrap();
        assert!(found.is_some());
    }

    #[test]
    fn bump_access_increments_count() {
        let store = SqliteKvStore::open_in_memory().unwrap();
        let mem = store.put(&sample_memory("u1", "a")).unwrap();
        store.bump_access(mem.id).unwrap();
        store.bump_access(mem.id).unwrap();
        let fetched = store.get_by_id(mem.id).unwrap().unwrap();
        assert_eq!(fetched.access_count, 2);
    }

    #[test]
    fn health_check_reports_healthy_store() {
        let store = SqliteKvStore::open_in_memory().unwrap();
        let health = store.health_check().unwrap();
        assert!(health.healthy);
    }
}
