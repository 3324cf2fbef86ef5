//! Embeddings capability: turn a batch of input strings into vectors over
//! a vendor's embeddings endpoint. Folded in alongside the other capability
//! modules since the `Capability::Embedding` variant it backs is otherwise
//! declared and never reachable.

use async_trait::async_trait;

use crate::error::Result;
use crate::usage::Usage;

#[derive(Debug, Clone)]
pub struct EmbeddingRequest {
    pub input: Vec<String>,
    pub model: Option<String>,
    pub dimensions: Option<u32>,
}

impl EmbeddingRequest {
    pub fn new(input: Vec<String>) -> Self {
        EmbeddingRequest {
            input,
            model: None,
            dimensions: None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct EmbeddingResponse {
    /// One vector per input string, in the same order as `EmbeddingRequest::input`.
    pub embeddings: Vec<Vec<f32>>,
    pub model: String,
    pub usage: Usage,
}

#[async_trait]
pub trait Embeddings: Send + Sync {
    async fn embed(&self, request: EmbeddingRequest) -> Result<EmbeddingResponse>;
}
