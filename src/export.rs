//! JSONL export/import (§6.3, P8): a portable snapshot of a store's
//! memories and graph, independent of the SQLite files backing them.
//!
//! Three files make up a snapshot directory:
//!   - `memories.jsonl` — one `Memory` JSON object per line
//!   - `graph.jsonl`    — one `GraphRecord` (node or edge) JSON object per line
//!   - `metadata.json`  — schema version and export timestamp
//!
//! `import` replays a snapshot through `GraphStore::apply` (I6, all-or-nothing)
//! and `KvStore::put` (idempotent upsert), so re-importing the same snapshot
//! is safe.

use std::fs::File;
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::Path;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{CoreError, Result};
use crate::graph::{GraphOp, GraphStore};
use crate::storage::{KvStore, SCHEMA_VERSION};
use crate::types::{GraphEdge, GraphNode, Memory};

const MEMORIES_FILE: &str = "memories.jsonl";
const GRAPH_FILE: &str = "graph.jsonl";
const METADATA_FILE: &str = "metadata.json";

/// One line of `graph.jsonl`: tagged so a single file can carry both nodes
/// and edges while staying line-delimited.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "record_type", rename_all = "snake_case")]
pub enum GraphRecord {
    Node(GraphNode),
    Edge(GraphEdge),
}

/// Sidecar written alongside the two JSONL files (§6.3).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExportMetadata {
    pub schema_version: i32,
    pub exported_at: DateTime<Utc>,
    pub memory_count: usize,
    pub node_count: usize,
    pub edge_count: usize,
}

/// Counts of records replayed by `import`.
#[derive(Debug, Clone, Copy, Default, Serialize)]
pub struct ImportStats {
    pub memories: usize,
    pub nodes: usize,
    pub edges: usize,
}

/// Write a full snapshot of `kv` and `graph` to `dir` (§6.3). Overwrites any
/// existing files in `dir`; the directory itself must already exist.
pub fn export(kv: &dyn KvStore, graph: &GraphStore, dir: &Path) -> Result<ExportMetadata> {
    let memories = kv.all()?;
    let nodes = graph.all_nodes()?;
    let edges = graph.all_edges()?;

    write_jsonl(&dir.join(MEMORIES_FILE), memories.iter())?;

    let graph_records: Vec<GraphRecord> = nodes
        .iter()
        .cloned()
        .map(GraphRecord::Node)
        .chain(edges.iter().cloned().map(GraphRecord::Edge))
        .collect();
    write_jsonl(&dir.join(GRAPH_FILE), graph_records.iter())?;

    let metadata = ExportMetadata {
        schema_version: SCHEMA_VERSION,
        exported_at: Utc::now(),
        memory_count: memories.len(),
        node_count: nodes.len(),
        edge_count: edges.len(),
    };
    let file = File::create(dir.join(METADATA_FILE))?;
    serde_json::to_writer_pretty(file, &metadata)?;
    Ok(metadata)
}

fn write_jsonl<'a, T: Serialize + 'a>(path: &Path, items: impl Iterator<Item = &'a T>) -> Result<()> {
    let file = File::create(path)?;
    let mut writer = BufWriter::new(file);
    for item in items {
        serde_json::to_writer(&mut writer, item)?;
        writer.write_all(b"\n")?;
    }
    writer.flush()?;
    Ok(())
}

/// Read a snapshot directory written by `export` back into `kv` and
/// `graph`. Memories are upserted via `KvStore::put` (idempotent on
/// `(user_id, agent_name, key)`); graph records replay through a single
/// `GraphStore::apply` batch so a malformed snapshot leaves the graph
/// untouched (I6).
///
/// Satisfies P8: `import(export(S))` reproduces `list(S)` modulo
/// `exported_at`/`id`/`access_count` bookkeeping fields that the store
/// itself regenerates on upsert.
pub fn import(kv: &dyn KvStore, graph: &GraphStore, dir: &Path) -> Result<ImportStats> {
    let metadata = read_metadata(dir)?;
    if metadata.schema_version > SCHEMA_VERSION {
        return Err(CoreError::BadRequest(format!(
            "snapshot schema version {} is newer than this build's {}",
            metadata.schema_version, SCHEMA_VERSION
        )));
    }

    let mut stats = ImportStats::default();

    for memory in read_jsonl::<Memory>(&dir.join(MEMORIES_FILE))? {
        kv.put(&memory)?;
        stats.memories += 1;
    }

    let mut ops = Vec::new();
    for record in read_jsonl::<GraphRecord>(&dir.join(GRAPH_FILE))? {
        match record {
            GraphRecord::Node(node) => {
                ops.push(GraphOp::AddNode {
                    id: node.id,
                    node_type: node.node_type,
                    data: node.data,
                });
                stats.nodes += 1;
            }
            GraphRecord::Edge(edge) => {
                ops.push(GraphOp::AddEdge {
                    src: edge.src,
                    dst: edge.dst,
                    rel_type: edge.rel_type,
                    weight: edge.weight,
                    data: edge.data,
                    valid_from: edge.valid_from,
                    valid_until: edge.valid_until,
                    source: edge.source,
                    confidence: edge.confidence,
                });
                stats.edges += 1;
            }
        }
    }
    if !ops.is_empty() {
        graph.apply(&ops)?;
    }

    Ok(stats)
}

fn read_metadata(dir: &Path) -> Result<ExportMetadata> {
    let file = File::open(dir.join(METADATA_FILE))?;
    Ok(serde_json::from_reader(file)?)
}

fn read_jsonl<T: for<'de> Deserialize<'de>>(path: &Path) -> Result<Vec<T>> {
    let file = File::open(path)?;
    let reader = BufReader::new(file);
    let mut out = Vec::new();
    for line in reader.lines() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        out.push(serde_json::from_str(&line)?);
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::SqliteKvStore;
    use crate::types::{MemoryScope, MemorySpec, MemoryValue};
    use tempfile::tempdir;

    fn seed_kv() -> SqliteKvStore {
        let kv = SqliteKvStore::open(":memory:").unwrap();
        let spec = MemorySpec {
            user_id: "u1".to_string(),
            agent_name: "global".to_string(),
            key: Some("fact".to_string()),
            value: MemoryValue::Text("paris is the capital of france".to_string()),
            scope: MemoryScope::Persistent,
            tags: vec!["geo".to_string()],
            importance: 0.7,
        };
        let now = Utc::now();
        let memory = Memory {
            id: 0,
            user_id: spec.user_id,
            agent_name: spec.agent_name,
            key: spec.key.unwrap(),
            content_hash: Memory::compute_content_hash(&spec.value, &spec.tags, spec.scope),
            value: spec.value,
            scope: spec.scope,
            tags: spec.tags,
            importance: spec.importance,
            created_at: now,
            updated_at: now,
            access_count: 0,
            last_accessed_at: now,
            embedding_ref: None,
        };
        kv.put(&memory).unwrap();
        kv
    }

    fn seed_graph() -> GraphStore {
        let graph = GraphStore::open(":memory:").unwrap();
        graph
            .add_node("mem:1", crate::types::NodeType::Memory, serde_json::json!({}))
            .unwrap();
        graph
            .add_node("user:u1", crate::types::NodeType::User, serde_json::json!({}))
            .unwrap();
        graph
            .add_edge(
                "user:u1",
                "mem:1",
                crate::types::RelType::RelatedTo,
                Some(0.9),
                None,
                None,
                Some("test".to_string()),
                Some(1.0),
            )
            .unwrap();
        graph
    }

    #[test]
    fn export_then_import_round_trips_memories_and_graph() {
        let kv_src = seed_kv();
        let graph_src = seed_graph();
        let dir = tempdir().unwrap();

        let metadata = export(&kv_src, &graph_src, dir.path()).unwrap();
        assert_eq!(metadata.memory_count, 1);
        assert_eq!(metadata.node_count, 2);
        assert_eq!(metadata.edge_count, 1);

        let kv_dst = SqliteKvStore::open(":memory:").unwrap();
        let graph_dst = GraphStore::open(":memory:").unwrap();
        let stats = import(&kv_dst, &graph_dst, dir.path()).unwrap();
        assert_eq!(stats.memories, 1);
        assert_eq!(stats.nodes, 2);
        assert_eq!(stats.edges, 1);

        let restored = kv_dst.get("u1", "global", "fact").unwrap().unwrap();
        assert_eq!(restored.value.as_text(), "paris is the capital of france");
        assert_eq!(restored.tags, vec!["geo".to_string()]);

        let sub = graph_dst
            .query_graph(&["user:u1".to_string()], 1, None, Utc::now())
            .unwrap();
        assert!(sub.nodes.iter().any(|n| n.id == "mem:1"));
        assert_eq!(sub.edges.len(), 1);
    }

    #[test]
    fn import_is_idempotent() {
        let kv_src = seed_kv();
        let graph_src = seed_graph();
        let dir = tempdir().unwrap();
        export(&kv_src, &graph_src, dir.path()).unwrap();

        let kv_dst = SqliteKvStore::open(":memory:").unwrap();
        let graph_dst = GraphStore::open(":memory:").unwrap();
        import(&kv_dst, &graph_dst, dir.path()).unwrap();
        let second = import(&kv_dst, &graph_dst, dir.path()).unwrap();
        assert_eq!(second.memories, 1);
        assert_eq!(kv_dst.count().unwrap(), 1);
    }

    #[test]
    fn rejects_snapshot_from_a_newer_schema() {
        let dir = tempdir().unwrap();
        write_jsonl::<Memory>(&dir.path().join(MEMORIES_FILE), std::iter::empty()).unwrap();
        write_jsonl::<GraphRecord>(&dir.path().join(GRAPH_FILE), std::iter::empty()).unwrap();
        let metadata = ExportMetadata {
            schema_version: SCHEMA_VERSION + 1,
            exported_at: Utc::now(),
            memory_count: 0,
            node_count: 0,
            edge_count: 0,
        };
        let file = File::create(dir.path().join(METADATA_FILE)).unwrap();
        serde_json::to_writer(file, &metadata).unwrap();

        let kv = SqliteKvStore::open(":memory:").unwrap();
        let graph = GraphStore::open(":memory:").unwrap();
        assert!(import(&kv, &graph, dir.path()).is_err());
    }
}
