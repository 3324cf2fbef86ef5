//! Assistants capability: straightforward CRUD over a vendor's assistants
//! schema.

use async_trait::async_trait;
use serde_json::Value;

use crate::error::Result;
use crate::tool::Tool;

#[derive(Debug, Clone)]
pub struct Assistant {
    pub id: String,
    pub name: Option<String>,
    pub model: String,
    pub instructions: Option<String>,
    pub tools: Vec<Tool>,
}

#[derive(Debug, Clone, Default)]
pub struct AssistantUpdate {
    pub name: Option<String>,
    pub instructions: Option<String>,
    pub tools: Option<Vec<Tool>>,
}

#[async_trait]
pub trait Assistants: Send + Sync {
    async fn create(&self, model: &str, name: Option<&str>, instructions: Option<&str>, tools: Vec<Tool>) -> Result<Assistant>;

    async fn list(&self) -> Result<Vec<Assistant>>;

    async fn retrieve(&self, id: &str) -> Result<Assistant>;

    async fn modify(&self, id: &str, update: AssistantUpdate) -> Result<Assistant>;

    async fn delete(&self, id: &str) -> Result<()>;
}

pub(crate) fn tool_to_openai_json(tool: &Tool) -> Value {
    serde_json::json!({
        "type": "function",
        "function": {
            "name": tool.function.name,
            "description": tool.function.description,
            "parameters": tool.function.parameters,
        }
    })
}
