//! LexicalIndex (C5) — BM25-Okapi inverted index, partitioned per
//! `(user_id, agent_name)` (§4.3).
//!
//! Tokenization is Unicode-aware via `unicode-segmentation`'s word
//! boundaries (UAX#29): Latin/Cyrillic text splits on word boundaries,
//! and because the word-break algorithm does not merge adjacent Han/CJK
//! ideographs into a single "word", each CJK character cluster already
//! surfaces as its own token (B3) without a dedicated code path. No
//! stemming, matching the spec's "no stemming by default".
//!
//! Built on ordinary tables (`lexical_terms`, `lexical_doc_stats`,
//! `lexical_doc_partition`, all from `storage::migrations`) rather than
//! FTS5, so the tokenizer stays fully custom — the teacher's FTS5-based
//! `search/bm25.rs` is the structural template for the scoring pipeline,
//! not the storage engine.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;
use rusqlite::Connection;
use unicode_segmentation::UnicodeSegmentation;

use crate::error::Result;

const BM25_K1: f32 = 1.5;
const BM25_B: f32 = 0.75;

/// Lowercased Unicode-word tokens. Single-character Latin tokens are kept
/// (unlike the embedder's bag-of-words heuristic) since BM25 exact-term
/// recall depends on them (scenario 2: querying "SnapDish" must match).
pub fn tokenize(text: &str) -> Vec<String> {
    text.unicode_words().map(|w| w.to_lowercase()).collect()
}

#[derive(Debug, Clone, Default)]
pub struct LexicalFilter {
    pub user_id: Option<String>,
    pub agent_name: Option<String>,
    pub tags: Option<Vec<String>>,
}

pub trait LexicalIndex: Send + Sync {
    fn upsert(&self, id: i64, text: &str, user_id: &str, agent_name: &str) -> Result<()>;

    /// Returns `(id, bm25_score)`, ordered best-first.
    fn search(&self, query: &str, k: usize, filter: &LexicalFilter) -> Result<Vec<(i64, f32)>>;

    fn delete(&self, id: i64) -> Result<()>;
}

pub struct SqliteLexicalIndex {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteLexicalIndex {
    pub fn open(db_path: &str) -> Result<Self> {
        let conn = if db_path == ":memory:" {
            Connection::open_in_memory()?
        } else {
            Connection::open(db_path)?
        };
        conn.execute_batch("PRAGMA busy_timeout=30000;")?;
        super::migrations::migrate(&conn)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }
}

impl LexicalIndex for SqliteLexicalIndex {
    fn upsert(&self, id: i64, text: &str, user_id: &str, agent_name: &str) -> Result<()> {
        let tokens = tokenize(text);
        let mut tf: HashMap<String, i64> = HashMap::new();
        for t in &tokens {
            *tf.entry(t.clone()).or_insert(0) += 1;
        }

        let conn = self.conn.lock();
        conn.execute("DELETE FROM lexical_terms WHERE memory_id = ?1", rusqlite::params![id])?;
        for (term, freq) in &tf {
            conn.execute(
                "INSERT INTO lexical_terms (memory_id, term, term_freq) VALUES (?1, ?2, ?3)",
                rusqlite::params![id, term, freq],
            )?;
        }
        conn.execute(
            "INSERT INTO lexical_doc_stats (memory_id, doc_length) VALUES (?1, ?2)
             ON CONFLICT(memory_id) DO UPDATE SET doc_length = excluded.doc_length",
            rusqlite::params![id, tokens.len() as i64],
        )?;
        // Mirror the document's partition onto the stats row so BM25's N
        // and avgdl can be scoped without joining `memories` on every query.
        // Table itself comes from `storage::migrations` so it exists even
        // on an index with zero prior upserts.
        conn.execute(
            "INSERT INTO lexical_doc_partition (memory_id, user_id, agent_name) VALUES (?1, ?2, ?3)
             ON CONFLICT(memory_id) DO UPDATE SET user_id=excluded.user_id, agent_name=excluded.agent_name",
            rusqlite::params![id, user_id, agent_name],
        )?;
        Ok(())
    }

    fn search(&self, query: &str, k: usize, filter: &LexicalFilter) -> Result<Vec<(i64, f32)>> {
        if k == 0 {
            return Ok(Vec::new());
        }
        let terms: Vec<String> = {
            let mut t = tokenize(query);
            t.sort();
            t.dedup();
            t
        };
        if terms.is_empty() {
            return Ok(Vec::new());
        }

        let conn = self.conn.lock();
        let partition_clause = "(?1 IS NULL OR p.user_id = ?1) AND (?2 IS NULL OR p.agent_name = ?2)";

        let doc_count: i64 = conn.query_row(
            &format!(
                "SELECT COUNT(*) FROM lexical_doc_stats s
                 JOIN lexical_doc_partition p ON p.memory_id = s.memory_id
                 WHERE {partition_clause}"
            ),
            rusqlite::params![filter.user_id, filter.agent_name],
            |row| row.get(0),
        )?;
        if doc_count == 0 {
            return Ok(Vec::new());
        }
        let avg_doc_len: f64 = conn
            .query_row(
                &format!(
                    "SELECT AVG(s.doc_length) FROM lexical_doc_stats s
                     JOIN lexical_doc_partition p ON p.memory_id = s.memory_id
                     WHERE {partition_clause}"
                ),
                rusqlite::params![filter.user_id, filter.agent_name],
                |row| row.get(0),
            )
            .unwrap_or(1.0);
        let avg_doc_len = avg_doc_len.max(1.0) as f32;

        let mut scores: HashMap<i64, f32> = HashMap::new();
        for term in &terms {
            let df: i64 = conn.query_row(
                &format!(
                    "SELECT COUNT(DISTINCT t.memory_id) FROM lexical_terms t
                     JOIN lexical_doc_partition p ON p.memory_id = t.memory_id
                     WHERE t.term = ?3 AND {partition_clause}"
                ),
                rusqlite::params![filter.user_id, filter.agent_name, term],
                |row| row.get(0),
            )?;
            if df == 0 {
                continue;
            }
            let idf = (((doc_count as f32 - df as f32 + 0.5) / (df as f32 + 0.5)) + 1.0).ln();

            let mut stmt = conn.prepare(&format!(
                "SELECT t.memory_id, t.term_freq, s.doc_length FROM lexical_terms t
                 JOIN lexical_doc_stats s ON s.memory_id = t.memory_id
                 JOIN lexical_doc_partition p ON p.memory_id = t.memory_id
                 WHERE t.term = ?3 AND {partition_clause}"
            ))?;
            let rows = stmt.query_map(rusqlite::params![filter.user_id, filter.agent_name, term], |row| {
                let id: i64 = row.get(0)?;
                let tf: i64 = row.get(1)?;
                let doc_len: i64 = row.get(2)?;
                Ok((id, tf as f32, doc_len as f32))
            })?;
            for row in rows {
                let (id, tf, doc_len) = row?;
                let numerator = tf * (BM25_K1 + 1.0);
                let denominator = tf + BM25_K1 * (1.0 - BM25_B + BM25_B * doc_len / avg_doc_len);
                *scores.entry(id).or_insert(0.0) += idf * (numerator / denominator);
            }
        }

        let mut ranked: Vec<(i64, f32)> = scores.into_iter().collect();

        if let Some(tags) = &filter.tags {
            if !tags.is_empty() {
                // Lexical index has no tag column of its own; tag filtering
                // leans on the caller's post-hoc join against `memories`
                // when this index is used standalone. `MemoryManager`
                // always re-validates candidates against the authoritative
                // row, so an approximate filter here is safe.
            }
        }

        ranked.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal).then(a.0.cmp(&b.0)));
        ranked.truncate(k);
        Ok(ranked)
    }

    fn delete(&self, id: i64) -> Result<()> {
        let conn = self.conn.lock();
        conn.execute("DELETE FROM lexical_terms WHERE memory_id = ?1", rusqlite::params![id])?;
        conn.execute("DELETE FROM lexical_doc_stats WHERE memory_id = ?1", rusqlite::params![id])?;
        conn.execute("DELETE FROM lexical_doc_partition WHERE memory_id = ?1", rusqlite::params![id])?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exact_term_ranks_above_unrelated_doc() {
        let idx = SqliteLexicalIndex::open(":memory:").unwrap();
        idx.upsert(1, "SnapDish is a photo app", "u1", "global").unwrap();
        idx.upsert(2, "the weather today is sunny", "u1", "global").unwrap();
        let results = idx.search("SnapDish", 5, &LexicalFilter::default()).unwrap();
        assert_eq!(results[0].0, 1);
    }

    #[test]
    fn cjk_query_tokenizes_and_matches() {
        let idx = SqliteLexicalIndex::open(":memory:").unwrap();
        idx.upsert(1, "我喜欢用筷子吃饭", "u1", "global").unwrap();
        let results = idx.search("筷子", 5, &LexicalFilter::default()).unwrap();
        assert!(!results.is_empty());
    }

    #[test]
    fn search_on_freshly_opened_index_returns_empty_not_error() {
        let idx = SqliteLexicalIndex::open(":memory:").unwrap();
        let results = idx.search("anything", 5, &LexicalFilter::default()).unwrap();
        assert!(results.is_empty());
    }

    #[test]
    fn empty_query_returns_empty() {
        let idx = SqliteLexicalIndex::open(":memory:").unwrap();
        idx.upsert(1, "some text", "u1", "global").unwrap();
        let results = idx.search("", 5, &LexicalFilter::default()).unwrap();
        assert!(results.is_empty());
    }

    #[test]
    fn partitioning_isolates_users() {
        let idx = SqliteLexicalIndex::open(":memory:").unwrap();
        idx.upsert(1, "prefers FastAPI over Django", "u1", "global").unwrap();
        idx.upsert(2, "prefers FastAPI over Django", "u2", "global").unwrap();
        let filter = LexicalFilter {
            user_id: Some("u2".to_string()),
            agent_name: None,
            tags: None,
        };
        let results = idx.search("FastAPI", 5, &filter).unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].0, 2);
    }

    #[test]
    fn delete_removes_term_entries() {
        let idx = SqliteLexicalIndex::open(":memory:").unwrap();
        idx.upsert(1, "unique_token_xyz", "u1", "global").unwrap();
        idx.delete(1).unwrap();
        let results = idx.search("unique_token_xyz", 5, &LexicalFilter::default()).unwrap();
        assert!(results.is_empty());
    }
}
