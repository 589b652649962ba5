//! Embedder (C1) — an opaque external interface per spec.md §1's non-goals:
//! "embedding model internals... opaque `Embedder`". This module defines the
//! trait the rest of the core programs against, a local feature-hashed
//! fallback that needs no network access, and (behind the `openai` feature)
//! an HTTP-backed implementation. Query/passage prefixing conventions are the
//! embedder's own business (§9) — the trait never hard-codes them.

use std::collections::HashMap;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

use crate::error::{Component, CoreError, Result};

/// Produces dense vectors for queries and passages (C1).
pub trait Embedder: Send + Sync {
    /// Embed a single passage (a memory's text projection).
    fn embed_passage(&self, text: &str) -> Result<Vec<f32>>;

    /// Embed a query. Some embedders apply an asymmetric prefix
    /// (E5-style `"query: "`) here; callers must not assume symmetry with
    /// `embed_passage`.
    fn embed_query(&self, text: &str) -> Result<Vec<f32>> {
        self.embed_passage(text)
    }

    fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>> {
        texts.iter().map(|t| self.embed_passage(t)).collect()
    }

    fn dimensions(&self) -> usize;
    fn model_name(&self) -> &str;
}

/// Deterministic, dependency-free embedder: a feature-hashed bag-of-words
/// with a log-TF / length-based IDF proxy. Used as the default fallback and
/// in tests where no network access is available.
pub struct LocalHashEmbedder {
    dimensions: usize,
}

impl LocalHashEmbedder {
    pub fn new(dimensions: usize) -> Self {
        Self { dimensions }
    }

    fn tokenize(text: &str) -> Vec<String> {
        text.to_lowercase()
            .split(|c: char| !c.is_alphanumeric())
            .filter(|s| s.len() > 1)
            .map(String::from)
            .collect()
    }

    fn hash_token(token: &str, dimensions: usize) -> usize {
        let mut hasher = std::collections::hash_map::DefaultHasher::new();
        token.hash(&mut hasher);
        (hasher.finish() as usize) % dimensions
    }

    fn hash_sign(token: &str) -> f32 {
        let mut hasher = std::collections::hash_map::DefaultHasher::new();
        format!("{token}_sign").hash(&mut hasher);
        if hasher.finish() % 2 == 0 {
            1.0
        } else {
            -1.0
        }
    }
}

impl Embedder for LocalHashEmbedder {
    fn embed_passage(&self, text: &str) -> Result<Vec<f32>> {
        let tokens = Self::tokenize(text);
        let mut embedding = vec![0.0_f32; self.dimensions];
        if tokens.is_empty() {
            return Ok(embedding);
        }

        let mut tf: HashMap<String, f32> = HashMap::new();
        for token in &tokens {
            *tf.entry(token.clone()).or_insert(0.0) += 1.0;
        }

        let doc_len = tokens.len() as f32;
        for (token, count) in tf {
            let tf_score = (1.0 + count / doc_len).ln();
            let idf_score = 1.0 + (token.len() as f32 * 0.1);
            let weight = tf_score * idf_score;
            let idx = Self::hash_token(&token, self.dimensions);
            embedding[idx] += weight * Self::hash_sign(&token);
        }

        let norm: f32 = embedding.iter().map(|x| x * x).sum::<f32>().sqrt();
        if norm > 0.0 {
            for x in embedding.iter_mut() {
                *x /= norm;
            }
        }
        Ok(embedding)
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }

    fn model_name(&self) -> &str {
        "local-hash-v1"
    }
}

/// OpenAI-compatible embeddings client (feature `openai`).
#[cfg(feature = "openai")]
pub struct OpenAiEmbedder {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
    model: String,
    dimensions: usize,
}

#[cfg(feature = "openai")]
impl OpenAiEmbedder {
    pub fn new(api_key: String, base_url: String, model: String, dimensions: usize) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url,
            api_key,
            model,
            dimensions,
        }
    }

    async fn embed_async(&self, text: &str) -> Result<Vec<f32>> {
        let response = self
            .client
            .post(format!("{}/embeddings", self.base_url))
            .header("Authorization", format!("Bearer {}", self.api_key))
            .json(&serde_json::json!({ "input": text, "model": self.model }))
            .send()
            .await
            .map_err(|e| CoreError::UpstreamFailure {
                component: Component::Embedder,
                message: e.to_string(),
            })?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(CoreError::UpstreamFailure {
                component: Component::Embedder,
                message: format!("embedding API error {status}: {body}"),
            });
        }

        let data: serde_json::Value = response.json().await?;
        let embedding = data["data"][0]["embedding"]
            .as_array()
            .ok_or_else(|| CoreError::UpstreamFailure {
                component: Component::Embedder,
                message: "invalid embedding response".into(),
            })?
            .iter()
            .filter_map(|v| v.as_f64().map(|f| f as f32))
            .collect();
        Ok(embedding)
    }
}

#[cfg(feature = "openai")]
impl Embedder for OpenAiEmbedder {
    fn embed_passage(&self, text: &str) -> Result<Vec<f32>> {
        tokio::task::block_in_place(|| {
            tokio::runtime::Handle::current().block_on(self.embed_async(text))
        })
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }

    fn model_name(&self) -> &str {
        &self.model
    }
}

/// Cosine distance converted to a normalized similarity, `sim = 1 - d/2`
/// (§4.2), so downstream scoring always sees a value in `[0, 1]`.
pub fn distance_to_similarity(distance: f32) -> f32 {
    (1.0 - distance / 2.0).clamp(0.0, 1.0)
}

pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }
    let dot: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        0.0
    } else {
        dot / (norm_a * norm_b)
    }
}

pub fn create_embedder(model: &str, api_key: Option<String>, dimensions: usize) -> Result<Arc<dyn Embedder>> {
    match model {
        #[cfg(feature = "openai")]
        "openai" => {
            let key = api_key.ok_or_else(|| CoreError::BadRequest("OpenAI API key required".into()))?;
            Ok(Arc::new(OpenAiEmbedder::new(
                key,
                "https://api.openai.com/v1".to_string(),
                "text-embedding-3-small".to_string(),
                dimensions,
            )))
        }
        "tfidf" | "local" | "local-hash" => Ok(Arc::new(LocalHashEmbedder::new(dimensions))),
        other => Err(CoreError::BadRequest(format!("unknown embedding model: {other}"))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn local_embedder_is_deterministic() {
        let e = LocalHashEmbedder::new(64);
        let a = e.embed_passage("the quick brown fox").unwrap();
        let b = e.embed_passage("the quick brown fox").unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn empty_text_yields_zero_vector() {
        let e = LocalHashEmbedder::new(32);
        let v = e.embed_passage("").unwrap();
        assert!(v.iter().all(|x| *x == 0.0));
    }

    #[test]
    fn similar_texts_are_more_similar_than_dissimilar() {
        let e = LocalHashEmbedder::new(256);
        let a = e.embed_passage("prefers FastAPI over Django for backend work").unwrap();
        let b = e.embed_passage("likes FastAPI more than Django").unwrap();
        let c = e.embed_passage("the weather in Lisbon is sunny today").unwrap();
        assert!(cosine_similarity(&a, &b) > cosine_similarity(&a, &c));
    }
}
