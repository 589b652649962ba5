//! LLMService (C2) — an opaque external interface per spec.md §1's non-goals
//! ("LLM provider adapters... treated as an opaque `LLMService`"). Consumed
//! by `CodingMemory::end_session` (summarization) and, optionally, by the
//! reranker for cross-encoder-style hints.

use std::sync::Arc;

use crate::error::{Component, CoreError, Result};

/// Chat/completion, summarization and reranking-hint surface used by the
/// rest of the core. Implementations are swappable; the core never assumes
/// a specific provider's prompt format.
pub trait LlmService: Send + Sync {
    /// Summarize free text into a short paragraph, used to materialize a
    /// `CodingSession`'s summary memory on `end()` (§4.6.1).
    fn summarize(&self, text: &str, max_words: usize) -> Result<String>;

    /// Score how relevant `candidate` is to `query` on a 0..1 scale. Used as
    /// a cross-encoder substitute when no dedicated `Reranker` is configured.
    fn score_relevance(&self, query: &str, candidate: &str) -> Result<f32>;
}

/// A no-op implementation used when no LLM is configured: summaries degrade
/// to a truncated excerpt, and relevance scoring degrades to 0.5 (neutral)
/// so callers that blend it with other signals aren't skewed either way.
pub struct NullLlmService;

impl LlmService for NullLlmService {
    fn summarize(&self, text: &str, max_words: usize) -> Result<String> {
        let words: Vec<&str> = text.split_whitespace().collect();
        if words.len() <= max_words {
            Ok(text.to_string())
        } else {
            Ok(format!("{}...", words[..max_words].join(" ")))
        }
    }

    fn score_relevance(&self, _query: &str, _candidate: &str) -> Result<f32> {
        Ok(0.5)
    }
}

/// OpenAI-compatible chat completion client (feature `openai`).
#[cfg(feature = "openai")]
pub struct OpenAiLlmService {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
    model: String,
}

#[cfg(feature = "openai")]
impl OpenAiLlmService {
    pub fn new(api_key: String, base_url: String, model: String) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url,
            api_key,
            model,
        }
    }

    async fn chat(&self, system: &str, user: &str) -> Result<String> {
        let response = self
            .client
            .post(format!("{}/chat/completions", self.base_url))
            .header("Authorization", format!("Bearer {}", self.api_key))
            .json(&serde_json::json!({
                "model": self.model,
                "messages": [
                    {"role": "system", "content": system},
                    {"role": "user", "content": user},
                ],
                "temperature": 0.2,
            }))
            .send()
            .await
            .map_err(|e| CoreError::UpstreamFailure {
                component: Component::LlmService,
                message: e.to_string(),
            })?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(CoreError::UpstreamFailure {
                component: Component::LlmService,
                message: format!("chat completion error {status}: {body}"),
            });
        }

        let data: serde_json::Value = response.json().await?;
        data["choices"][0]["message"]["content"]
            .as_str()
            .map(|s| s.to_string())
            .ok_or_else(|| CoreError::UpstreamFailure {
                component: Component::LlmService,
                message: "invalid chat completion response".into(),
            })
    }
}

#[cfg(feature = "openai")]
impl LlmService for OpenAiLlmService {
    fn summarize(&self, text: &str, max_words: usize) -> Result<String> {
        tokio::task::block_in_place(|| {
            tokio::runtime::Handle::current().block_on(self.chat(
                &format!("Summarize the following in at most {max_words} words."),
                text,
            ))
        })
    }

    fn score_relevance(&self, query: &str, candidate: &str) -> Result<f32> {
        let raw = tokio::task::block_in_place(|| {
            tokio::runtime::Handle::current().block_on(self.chat(
                "Rate how relevant the candidate passage is to the query on a 0.0-1.0 scale. \
                 Reply with only the number.",
                &format!("Query: {query}\nCandidate: {candidate}"),
            ))
        })?;
        raw.trim()
            .parse::<f32>()
            .map(|v| v.clamp(0.0, 1.0))
            .map_err(|_| CoreError::UpstreamFailure {
                component: Component::LlmService,
                message: format!("non-numeric relevance score: {raw}"),
            })
    }
}

/// Builds an `LlmService` from an optional API key, falling back to
/// `NullLlmService` when none is configured (or the `openai` feature is off),
/// mirroring `embedder::create_embedder`'s fallback shape.
pub fn create_llm_service(api_key: Option<String>) -> Arc<dyn LlmService> {
    #[cfg(feature = "openai")]
    if let Some(key) = api_key {
        return Arc::new(OpenAiLlmService::new(
            key,
            "https://api.openai.com/v1".to_string(),
            "gpt-4o-mini".to_string(),
        ));
    }
    #[cfg(not(feature = "openai"))]
    let _ = api_key;
    Arc::new(NullLlmService)
}
