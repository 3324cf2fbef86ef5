//! Moderation capability: a straightforward CRUD-free classify-and-flag
//! contract over a vendor's moderation endpoint.

use async_trait::async_trait;
use std::collections::HashMap;

use crate::error::Result;

#[derive(Debug, Clone)]
pub struct ModerationCategoryResult {
    pub flagged: bool,
    pub score: f64,
}

#[derive(Debug, Clone, Default)]
pub struct ModerationResult {
    pub flagged: bool,
    pub categories: HashMap<String, ModerationCategoryResult>,
}

#[async_trait]
pub trait Moderation: Send + Sync {
    async fn moderate(&self, input: &str) -> Result<ModerationResult>;
}
