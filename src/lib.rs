//! Universal Memory Core — tiered, cross-agent memory for AI systems.
//!
//! Persistent and working-tier memory with hybrid semantic/lexical recall,
//! a temporal knowledge graph, and a coding-session memory layer, exposed
//! over both a JSON-RPC tool protocol and a REST API.

pub mod auth;
pub mod cache;
pub mod coding_memory;
pub mod config;
pub mod embedder;
pub mod error;
pub mod export;
pub mod graph;
pub mod llm;
pub mod mcp;
pub mod memory_manager;
pub mod recall_scorer;
pub mod rest;
pub mod search;
pub mod storage;
pub mod topic;
pub mod types;

pub use error::{CoreError, Result};
pub use memory_manager::MemoryManager;
pub use types::*;

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
