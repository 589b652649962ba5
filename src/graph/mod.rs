//! GraphStore (C8) — temporal multi-relation graph over memories and
//! derived nodes (§3.1, §4.8).
//!
//! §9 "cyclic graph references": node identity is a `String` id, never a
//! direct pointer — the arena lives in SQLite (`graph_nodes`/`graph_edges`
//! from `storage::migrations`) and every traversal operates on ids, so a
//! cycle is just a revisited id the BFS in `query_graph` already guards
//! against with a visited set.

use std::collections::{HashSet, VecDeque};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use rusqlite::Connection;
use serde_json::Value as JsonValue;

use crate::error::{CoreError, Result};
use crate::types::{GraphEdge, GraphNode, NodeType, RelType};

/// One `add_edge`-shaped mutation, for the all-or-nothing `apply` batch
/// primitive (§4.8).
#[derive(Debug, Clone)]
pub enum GraphOp {
    AddNode {
        id: String,
        node_type: NodeType,
        data: JsonValue,
    },
    AddEdge {
        src: String,
        dst: String,
        rel_type: RelType,
        weight: f32,
        data: JsonValue,
        valid_from: DateTime<Utc>,
        valid_until: Option<DateTime<Utc>>,
        source: Option<String>,
        confidence: f32,
    },
    InvalidateEdge {
        src: String,
        dst: String,
    },
}

/// The result of `query_graph`: the nodes and edges reachable within
/// `hops`, at a fixed point in time (§4.8).
#[derive(Debug, Clone, Default, serde::Serialize)]
pub struct Subgraph {
    pub nodes: Vec<GraphNode>,
    pub edges: Vec<GraphEdge>,
}

pub struct GraphStore {
    conn: Arc<Mutex<Connection>>,
}

impl GraphStore {
    pub fn open(db_path: &str) -> Result<Self> {
        let conn = if db_path == ":memory:" {
            Connection::open_in_memory()?
        } else {
            Connection::open(db_path)?
        };
        conn.execute_batch("PRAGMA busy_timeout=30000; PRAGMA foreign_keys=ON;")?;
        crate::storage::migrate(&conn)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Idempotent on `(id, type)` (§4.8).
    pub fn add_node(&self, id: &str, node_type: NodeType, data: JsonValue) -> Result<()> {
        let conn = self.conn.lock();
        Self::add_node_locked(&conn, id, node_type, &data)
    }

    fn add_node_locked(conn: &Connection, id: &str, node_type: NodeType, data: &JsonValue) -> Result<()> {
        conn.execute(
            "INSERT INTO graph_nodes (id, node_type, data) VALUES (?1, ?2, ?3)
             ON CONFLICT(id) DO UPDATE SET node_type = excluded.node_type",
            rusqlite::params![id, node_type.as_str(), data.to_string()],
        )?;
        Ok(())
    }

    /// Multiple edges are allowed per `(src, dst, rel_type)` as long as
    /// their validity intervals do not overlap; `add_edge` is therefore
    /// *not* idempotent when the interval differs (§4.8).
    #[allow(clippy::too_many_arguments)]
    pub fn add_edge(
        &self,
        src: &str,
        dst: &str,
        rel_type: RelType,
        weight: Option<f32>,
        valid_from: Option<DateTime<Utc>>,
        valid_until: Option<DateTime<Utc>>,
        source: Option<String>,
        confidence: Option<f32>,
    ) -> Result<()> {
        let conn = self.conn.lock();
        let edge = GraphEdge {
            src: src.to_string(),
            dst: dst.to_string(),
            rel_type,
            weight: weight.unwrap_or(1.0),
            data: JsonValue::Null,
            valid_from: valid_from.unwrap_or_else(Utc::now),
            valid_until,
            source,
            confidence: confidence.unwrap_or(1.0),
        };
        Self::add_edge_locked(&conn, &edge)
    }

    fn add_edge_locked(conn: &Connection, edge: &GraphEdge) -> Result<()> {
        if let Some(until) = edge.valid_until {
            if edge.valid_from > until {
                return Err(CoreError::BadRequest(format!(
                    "edge validity interval inverted: {} > {}",
                    edge.valid_from, until
                )));
            }
        }
        Self::check_no_overlap_locked(conn, &edge.src, &edge.dst, edge.rel_type, edge.valid_from, edge.valid_until)?;
        conn.execute(
            "INSERT INTO graph_edges (src, dst, rel_type, weight, data, valid_from, valid_until, source, confidence)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
            rusqlite::params![
                edge.src,
                edge.dst,
                edge.rel_type.as_str(),
                edge.weight,
                edge.data.to_string(),
                edge.valid_from,
                edge.valid_until,
                edge.source,
                edge.confidence,
            ],
        )?;
        Ok(())
    }

    fn check_no_overlap_locked(
        conn: &Connection,
        src: &str,
        dst: &str,
        rel_type: RelType,
        valid_from: DateTime<Utc>,
        valid_until: Option<DateTime<Utc>>,
    ) -> Result<()> {
        let mut stmt = conn.prepare(
            "SELECT valid_from, valid_until FROM graph_edges
             WHERE src = ?1 AND dst = ?2 AND rel_type = ?3",
        )?;
        let rows = stmt.query_map(rusqlite::params![src, dst, rel_type.as_str()], |row| {
            let vf: DateTime<Utc> = row.get(0)?;
            let vu: Option<DateTime<Utc>> = row.get(1)?;
            Ok((vf, vu))
        })?;
        for row in rows {
            let (existing_from, existing_until) = row?;
            let overlaps = valid_from < existing_until.unwrap_or(DateTime::<Utc>::MAX_UTC)
                && existing_from < valid_until.unwrap_or(DateTime::<Utc>::MAX_UTC);
            if overlaps {
                return Err(CoreError::Conflict(format!(
                    "overlapping validity interval for edge {src}-[{}]->{dst}",
                    rel_type.as_str()
                )));
            }
        }
        Ok(())
    }

    /// Sets `valid_until = now` for all currently-valid edges between the
    /// pair, across all `rel_type`s (§4.8).
    pub fn invalidate_edge(&self, src: &str, dst: &str) -> Result<usize> {
        let conn = self.conn.lock();
        Self::invalidate_edge_locked(&conn, src, dst, Utc::now())
    }

    fn invalidate_edge_locked(conn: &Connection, src: &str, dst: &str, now: DateTime<Utc>) -> Result<usize> {
        let affected = conn.execute(
            "UPDATE graph_edges SET valid_until = ?3
             WHERE src = ?1 AND dst = ?2 AND (valid_until IS NULL OR valid_until > ?3) AND valid_from <= ?3",
            rusqlite::params![src, dst, now],
        )?;
        Ok(affected)
    }

    /// Atomic: invalidates the old edge and adds a new one starting now,
    /// plus a `supersedes` edge from the new node to the old (I6, §4.8).
    pub fn supersede(
        &self,
        old_src: &str,
        old_dst: &str,
        new_src: &str,
        new_dst: &str,
        rel_type: RelType,
    ) -> Result<()> {
        let conn = self.conn.lock();
        let now = Utc::now();
        Self::invalidate_edge_locked(&conn, old_src, old_dst, now)?;
        let new_edge = GraphEdge {
            src: new_src.to_string(),
            dst: new_dst.to_string(),
            rel_type,
            weight: 1.0,
            data: JsonValue::Null,
            valid_from: now,
            valid_until: None,
            source: Some("supersede".to_string()),
            confidence: 1.0,
        };
        Self::add_edge_locked(&conn, &new_edge)?;
        Self::add_node_locked(&conn, new_dst, NodeType::Memory, &JsonValue::Null).ok();
        let supersede_edge = GraphEdge {
            src: new_dst.to_string(),
            dst: old_dst.to_string(),
            rel_type: RelType::Supersedes,
            weight: 1.0,
            data: JsonValue::Null,
            valid_from: now,
            valid_until: None,
            source: Some("supersede".to_string()),
            confidence: 1.0,
        };
        Self::add_edge_locked(&conn, &supersede_edge)?;
        Ok(())
    }

    /// BFS up to `hops`, pruning edges whose validity interval does not
    /// contain `at_time` (P6). Neighbor expansion order is deterministic:
    /// `(rel_type asc, dst asc)` (§4.8).
    pub fn query_graph(
        &self,
        seed_ids: &[String],
        hops: u32,
        rel_filter: Option<&[RelType]>,
        at_time: DateTime<Utc>,
    ) -> Result<Subgraph> {
        let conn = self.conn.lock();
        let mut visited: HashSet<String> = seed_ids.iter().cloned().collect();
        let mut frontier: VecDeque<(String, u32)> = seed_ids.iter().map(|s| (s.clone(), 0)).collect();
        let mut out_edges: Vec<GraphEdge> = Vec::new();
        let mut out_node_ids: HashSet<String> = visited.clone();

        while let Some((node_id, depth)) = frontier.pop_front() {
            if depth >= hops {
                continue;
            }
            let mut stmt = conn.prepare(
                "SELECT src, dst, rel_type, weight, data, valid_from, valid_until, source, confidence
                 FROM graph_edges WHERE src = ?1 ORDER BY rel_type ASC, dst ASC",
            )?;
            let rows = stmt.query_map(rusqlite::params![node_id], Self::row_to_edge)?;
            for row in rows {
                let edge = row?;
                if !edge.valid_at(at_time) {
                    continue;
                }
                if let Some(allowed) = rel_filter {
                    if !allowed.contains(&edge.rel_type) {
                        continue;
                    }
                }
                out_node_ids.insert(edge.src.clone());
                out_node_ids.insert(edge.dst.clone());
                out_edges.push(edge.clone());
                if visited.insert(edge.dst.clone()) {
                    frontier.push_back((edge.dst, depth + 1));
                }
            }
        }

        let mut nodes = Vec::new();
        for id in &out_node_ids {
            if let Some(node) = self.get_node_locked(&conn, id)? {
                nodes.push(node);
            }
        }
        nodes.sort_by(|a, b| a.id.cmp(&b.id));

        Ok(Subgraph {
            nodes,
            edges: out_edges,
        })
    }

    fn row_to_edge(row: &rusqlite::Row) -> rusqlite::Result<GraphEdge> {
        let rel_type: String = row.get(2)?;
        let data_json: String = row.get(4)?;
        Ok(GraphEdge {
            src: row.get(0)?,
            dst: row.get(1)?,
            rel_type: rel_type.parse().unwrap_or(RelType::RelatedTo),
            weight: row.get(3)?,
            data: serde_json::from_str(&data_json).unwrap_or(JsonValue::Null),
            valid_from: row.get(5)?,
            valid_until: row.get(6)?,
            source: row.get(7)?,
            confidence: row.get(8)?,
        })
    }

    pub fn get_node(&self, id: &str) -> Result<Option<GraphNode>> {
        let conn = self.conn.lock();
        self.get_node_locked(&conn, id)
    }

    fn get_node_locked(&self, conn: &Connection, id: &str) -> Result<Option<GraphNode>> {
        let result = conn
            .query_row(
                "SELECT id, node_type, data FROM graph_nodes WHERE id = ?1",
                rusqlite::params![id],
                |row| {
                    let node_type: String = row.get(1)?;
                    let data_json: String = row.get(2)?;
                    Ok(GraphNode {
                        id: row.get(0)?,
                        node_type: node_type.parse().unwrap_or(NodeType::Memory),
                        data: serde_json::from_str(&data_json).unwrap_or(JsonValue::Null),
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

    /// Shortest-path hop count from `from` to `to`, capped at `cap` (used
    /// by `RecallScorer`'s `graph_distance` term, §4.7). Returns `None` if
    /// disconnected within the cap.
    pub fn shortest_path_len(&self, from: &str, to: &str, cap: u32) -> Result<Option<u32>> {
        if from == to {
            return Ok(Some(0));
        }
        let conn = self.conn.lock();
        let mut visited: HashSet<String> = HashSet::new();
        visited.insert(from.to_string());
        let mut frontier: VecDeque<(String, u32)> = VecDeque::new();
        frontier.push_back((from.to_string(), 0));
        let now = Utc::now();

        while let Some((node_id, depth)) = frontier.pop_front() {
            if depth >= cap {
                continue;
            }
            let mut stmt = conn.prepare(
                "SELECT dst, valid_from, valid_until FROM graph_edges WHERE src = ?1
                 UNION SELECT src, valid_from, valid_until FROM graph_edges WHERE dst = ?1",
            )?;
            let rows = stmt.query_map(rusqlite::params![node_id], |row| {
                let neighbor: String = row.get(0)?;
                let vf: DateTime<Utc> = row.get(1)?;
                let vu: Option<DateTime<Utc>> = row.get(2)?;
                Ok((neighbor, vf, vu))
            })?;
            for row in rows {
                let (neighbor, vf, vu) = row?;
                if !(vf <= now && vu.map(|u| now < u).unwrap_or(true)) {
                    continue;
                }
                if neighbor == to {
                    return Ok(Some(depth + 1));
                }
                if visited.insert(neighbor.clone()) {
                    frontier.push_back((neighbor, depth + 1));
                }
            }
        }
        Ok(None)
    }

    /// All-or-nothing application of a batch of ops (§4.8).
    pub fn apply(&self, ops: &[GraphOp]) -> Result<()> {
        let mut conn = self.conn.lock();
        let tx = conn.transaction()?;
        for op in ops {
            match op {
                GraphOp::AddNode { id, node_type, data } => {
                    Self::add_node_locked(&tx, id, *node_type, data)?;
                }
                GraphOp::AddEdge {
                    src,
                    dst,
                    rel_type,
                    weight,
                    data,
                    valid_from,
                    valid_until,
                    source,
                    confidence,
                } => {
                    let edge = GraphEdge {
                        src: src.clone(),
                        dst: dst.clone(),
                        rel_type: *rel_type,
                        weight: *weight,
                        data: data.clone(),
                        valid_from: *valid_from,
                        valid_until: *valid_until,
                        source: source.clone(),
                        confidence: *confidence,
                    };
                    Self::add_edge_locked(&tx, &edge)?;
                }
                GraphOp::InvalidateEdge { src, dst } => {
                    Self::invalidate_edge_locked(&tx, src, dst, Utc::now())?;
                }
            }
        }
        tx.commit()?;
        Ok(())
    }

    /// Neighbors of `id` with the given relation type, sorted by weight
    /// desc then `valid_from` desc (recency) — used by
    /// `get_solutions_for_error` (§4.6.4).
    pub fn neighbors_by_rel(&self, id: &str, rel_type: RelType, at_time: DateTime<Utc>) -> Result<Vec<GraphEdge>> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare(
            "SELECT src, dst, rel_type, weight, data, valid_from, valid_until, source, confidence
             FROM graph_edges WHERE src = ?1 AND rel_type = ?2",
        )?;
        let rows = stmt.query_map(rusqlite::params![id, rel_type.as_str()], Self::row_to_edge)?;
        let mut out = Vec::new();
        for row in rows {
            let edge = row?;
            if edge.valid_at(at_time) {
                out.push(edge);
            }
        }
        out.sort_by(|a, b| {
            b.weight
                .partial_cmp(&a.weight)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then(b.valid_from.cmp(&a.valid_from))
        });
        Ok(out)
    }

    /// Edges whose `dst` is `id` (the reverse of `query_graph`'s outgoing
    /// traversal), filtered to `rel_filter` and valid at `at_time` — "who
    /// points at this node" rather than "where this node points". Uses
    /// `idx_graph_edges_dst`.
    pub fn incoming_edges(
        &self,
        id: &str,
        rel_filter: Option<&[RelType]>,
        at_time: DateTime<Utc>,
    ) -> Result<Vec<GraphEdge>> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare(
            "SELECT src, dst, rel_type, weight, data, valid_from, valid_until, source, confidence
             FROM graph_edges WHERE dst = ?1 ORDER BY rel_type ASC, src ASC",
        )?;
        let rows = stmt.query_map(rusqlite::params![id], Self::row_to_edge)?;
        let mut out = Vec::new();
        for row in rows {
            let edge = row?;
            if !edge.valid_at(at_time) {
                continue;
            }
            if let Some(allowed) = rel_filter {
                if !allowed.contains(&edge.rel_type) {
                    continue;
                }
            }
            out.push(edge);
        }
        Ok(out)
    }

    /// Reverse BFS up to `hops`: starting from `seed`, repeatedly follows
    /// edges backward (`dst -> src`) via `incoming_edges`, collecting every
    /// `src` reached. This is `query_graph`'s mirror image — it answers
    /// "what transitively points at `seed`" instead of "what does `seed`
    /// transitively point at". Backs `analyze_file_dependencies`'s
    /// `imported_by` and `analyze_refactor_impact`'s `affected_files`
    /// (§4.6.3), both of which need transitive dependents, not dependencies.
    pub fn transitive_dependents(
        &self,
        seed: &str,
        hops: u32,
        rel_filter: Option<&[RelType]>,
        at_time: DateTime<Utc>,
    ) -> Result<Vec<String>> {
        let mut visited: HashSet<String> = HashSet::new();
        visited.insert(seed.to_string());
        let mut frontier: VecDeque<(String, u32)> = VecDeque::new();
        frontier.push_back((seed.to_string(), 0));
        let mut dependents: Vec<String> = Vec::new();

        while let Some((node_id, depth)) = frontier.pop_front() {
            if depth >= hops {
                continue;
            }
            for edge in self.incoming_edges(&node_id, rel_filter, at_time)? {
                if visited.insert(edge.src.clone()) {
                    dependents.push(edge.src.clone());
                    frontier.push_back((edge.src, depth + 1));
                }
            }
        }
        Ok(dependents)
    }

    /// All nodes, for export (§6.3, P8). Ordered by id for deterministic
    /// JSONL output.
    pub fn all_nodes(&self) -> Result<Vec<GraphNode>> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare("SELECT id, node_type, data FROM graph_nodes ORDER BY id")?;
        let rows = stmt.query_map([], |row| {
            let node_type: String = row.get(1)?;
            let data_json: String = row.get(2)?;
            Ok(GraphNode {
                id: row.get(0)?,
                node_type: node_type.parse().unwrap_or(NodeType::Memory),
                data: serde_json::from_str(&data_json).unwrap_or(JsonValue::Null),
            })
        })?;
        let mut out = Vec::new();
        for row in rows {
            out.push(row?);
        }
        Ok(out)
    }

    /// All edges, for export (§6.3, P8). Ordered `(src, dst, rel_type,
    /// valid_from)` for deterministic JSONL output.
    pub fn all_edges(&self) -> Result<Vec<GraphEdge>> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare(
            "SELECT src, dst, rel_type, weight, data, valid_from, valid_until, source, confidence
             FROM graph_edges ORDER BY src, dst, rel_type, valid_from",
        )?;
        let rows = stmt.query_map([], Self::row_to_edge)?;
        let mut out = Vec::new();
        for row in rows {
            out.push(row?);
        }
        Ok(out)
    }

    /// Validation pass (§3.3): edges whose endpoints no longer have a
    /// `graph_nodes` row — permitted dangling references after a memory
    /// delete, but worth surfacing.
    pub fn find_dangling_edges(&self) -> Result<Vec<(String, String)>> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare(
            "SELECT e.src, e.dst FROM graph_edges e
             LEFT JOIN graph_nodes ns ON ns.id = e.src
             LEFT JOIN graph_nodes nd ON nd.id = e.dst
             WHERE ns.id IS NULL OR nd.id IS NULL",
        )?;
        let rows = stmt.query_map([], |row| Ok((row.get(0)?, row.get(1)?)))?;
        let mut out = Vec::new();
        for row in rows {
            out.push(row?);
        }
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn dt(y: i32, m: u32, d: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, m, d, 0, 0, 0).unwrap()
    }

    #[test]
    fn temporal_supersede_scenario() {
        let store = GraphStore::open(":memory:").unwrap();
        store.add_node("alice", NodeType::User, JsonValue::Null).unwrap();
        store.add_node("oldcorp", NodeType::Topic, JsonValue::Null).unwrap();
        store.add_node("newcorp", NodeType::Topic, JsonValue::Null).unwrap();
        store
            .add_edge(
                "alice",
                "oldcorp",
                RelType::WorksOn,
                None,
                Some(dt(2015, 1, 1)),
                None,
                None,
                None,
            )
            .unwrap();

        store.invalidate_edge("alice", "oldcorp").unwrap();
        store
            .add_edge(
                "alice",
                "newcorp",
                RelType::WorksOn,
                None,
                Some(dt(2020, 1, 1)),
                None,
                None,
                None,
            )
            .unwrap();

        let before = store
            .query_graph(&["alice".to_string()], 1, None, dt(2016, 1, 1))
            .unwrap();
        assert!(before.edges.iter().any(|e| e.dst == "oldcorp"));
        assert!(!before.edges.iter().any(|e| e.dst == "newcorp"));

        let after = store
            .query_graph(&["alice".to_string()], 1, None, dt(2021, 1, 1))
            .unwrap();
        assert!(after.edges.iter().any(|e| e.dst == "newcorp"));
        assert!(!after.edges.iter().any(|e| e.dst == "oldcorp"));
    }

    #[test]
    fn overlapping_intervals_rejected() {
        let store = GraphStore::open(":memory:").unwrap();
        store.add_node("a", NodeType::Memory, JsonValue::Null).unwrap();
        store.add_node("b", NodeType::Memory, JsonValue::Null).unwrap();
        store
            .add_edge(
                "a",
                "b",
                RelType::RelatedTo,
                None,
                Some(dt(2020, 1, 1)),
                Some(dt(2021, 1, 1)),
                None,
                None,
            )
            .unwrap();
        let result = store.add_edge(
            "a",
            "b",
            RelType::RelatedTo,
            None,
            Some(dt(2020, 6, 1)),
            None,
            None,
            None,
        );
        assert!(result.is_err());
    }

    #[test]
    fn bfs_respects_hop_limit_and_cycles() {
        let store = GraphStore::open(":memory:").unwrap();
        for id in ["a", "b", "c"] {
            store.add_node(id, NodeType::Memory, JsonValue::Null).unwrap();
        }
        store
            .add_edge("a", "b", RelType::RelatedTo, None, None, None, None, None)
            .unwrap();
        store
            .add_edge("b", "c", RelType::RelatedTo, None, None, None, None, None)
            .unwrap();
        store
            .add_edge("c", "a", RelType::RelatedTo, None, None, None, None, None)
            .unwrap();

        let one_hop = store.query_graph(&["a".to_string()], 1, None, Utc::now()).unwrap();
        assert_eq!(one_hop.edges.len(), 1);

        let two_hop = store.query_graph(&["a".to_string()], 2, None, Utc::now()).unwrap();
        assert_eq!(two_hop.edges.len(), 2);
    }

    #[test]
    fn shortest_path_finds_distance() {
        let store = GraphStore::open(":memory:").unwrap();
        for id in ["a", "b", "c"] {
            store.add_node(id, NodeType::Memory, JsonValue::Null).unwrap();
        }
        store
            .add_edge("a", "b", RelType::RelatedTo, None, None, None, None, None)
            .unwrap();
        store
            .add_edge("b", "c", RelType::RelatedTo, None, None, None, None, None)
            .unwrap();
        assert_eq!(store.shortest_path_len("a", "c", 6).unwrap(), Some(2));
        assert_eq!(store.shortest_path_len("a", "zzz", 6).unwrap(), None);
    }

    #[test]
    fn apply_is_all_or_nothing() {
        let store = GraphStore::open(":memory:").unwrap();
        store.add_node("a", NodeType::Memory, JsonValue::Null).unwrap();
        store.add_node("b", NodeType::Memory, JsonValue::Null).unwrap();
        store
            .add_edge(
                "a",
                "b",
                RelType::RelatedTo,
                None,
                Some(dt(2020, 1, 1)),
                Some(dt(2021, 1, 1)),
                None,
                None,
            )
            .unwrap();

        let ops = vec![
            GraphOp::AddNode {
                id: "c".to_string(),
                node_type: NodeType::Memory,
                data: JsonValue::Null,
            },
            GraphOp::AddEdge {
                src: "a".to_string(),
                dst: "b".to_string(),
                rel_type: RelType::RelatedTo,
                weight: 1.0,
                data: JsonValue::Null,
                valid_from: dt(2020, 6, 1),
                valid_until: None,
                source: None,
                confidence: 1.0,
            },
        ];
        assert!(store.apply(&ops).is_err());
        assert!(store.get_node("c").unwrap().is_none());
    }
}
