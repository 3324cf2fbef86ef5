//! File management capability.
//!
//! A thin wrapper over a provider's `Transport`: list/retrieve/delete
//! reduce to `getJSON`/`delete`, upload to `postForm`. The interesting
//! part is `FileObject`, which normalizes OpenAI's cursor pagination
//! (`first_id`/`last_id`/`has_more`) and Anthropic's offset pagination
//! (`total`/`limit`/`offset`) into one struct that carries both sets of
//! fields so a round trip back to either vendor's shape stays lossless.

use serde_json::{Value, json};

use crate::error::{LlmError, Result};
use crate::transport::{FormPart, Transport};

#[derive(Debug, Clone, PartialEq)]
pub struct FileObject {
    pub id: String,
    pub filename: String,
    pub bytes: u64,
    pub purpose: String,
    pub created_at: u64,
    /// Present on Anthropic files, absent on most OpenAI ones.
    pub status: Option<String>,
    /// OpenAI-style cursor pagination, carried through even when the file
    /// itself came from a list call that used offset pagination.
    pub first_id: Option<String>,
    pub last_id: Option<String>,
    pub has_more: Option<bool>,
    /// Anthropic-style offset pagination.
    pub total: Option<u64>,
    pub limit: Option<u64>,
    pub offset: Option<u64>,
}

impl FileObject {
    pub fn from_openai(value: &Value) -> Result<Self> {
        Ok(FileObject {
            id: field_str(value, "id")?,
            filename: field_str(value, "filename")?,
            bytes: value.get("bytes").and_then(Value::as_u64).unwrap_or(0),
            purpose: field_str(value, "purpose")?,
            created_at: value.get("created_at").and_then(Value::as_u64).unwrap_or(0),
            status: value.get("status").and_then(Value::as_str).map(str::to_string),
            first_id: None,
            last_id: None,
            has_more: None,
            total: None,
            limit: None,
            offset: None,
        })
    }

    pub fn to_openai_json(&self) -> Value {
        let mut obj = json!({
            "id": self.id,
            "object": "file",
            "filename": self.filename,
            "bytes": self.bytes,
            "purpose": self.purpose,
            "created_at": self.created_at,
        });
        if let (Value::Object(ref mut map), Some(status)) = (&mut obj, &self.status) {
            map.insert("status".to_string(), json!(status));
        }
        obj
    }

    pub fn from_anthropic(value: &Value) -> Result<Self> {
        Ok(FileObject {
            id: field_str(value, "id")?,
            filename: value.get("filename").and_then(Value::as_str).unwrap_or_default().to_string(),
            bytes: value.get("size_bytes").and_then(Value::as_u64).unwrap_or(0),
            purpose: "file".to_string(),
            created_at: value.get("created_at").and_then(Value::as_u64).unwrap_or(0),
            status: value.get("type").and_then(Value::as_str).map(str::to_string),
            first_id: None,
            last_id: None,
            has_more: None,
            total: None,
            limit: None,
            offset: None,
        })
    }

    pub fn to_anthropic_json(&self) -> Value {
        json!({
            "id": self.id,
            "type": self.status.clone().unwrap_or_else(|| "file".to_string()),
            "filename": self.filename,
            "size_bytes": self.bytes,
            "created_at": self.created_at,
        })
    }
}

fn field_str(value: &Value, key: &str) -> Result<String> {
    value
        .get(key)
        .and_then(Value::as_str)
        .map(str::to_string)
        .ok_or_else(|| LlmError::ResponseFormat {
            raw: format!("file object missing required field '{key}'"),
        })
}

pub struct FileListPage {
    pub files: Vec<FileObject>,
    pub has_more: bool,
}

#[async_trait::async_trait]
pub trait FileManagement: Send + Sync {
    async fn upload(&self, filename: &str, mime: &str, bytes: Vec<u8>, purpose: &str) -> Result<FileObject>;
    async fn list(&self, query: Option<&str>) -> Result<FileListPage>;
    async fn retrieve(&self, id: &str) -> Result<FileObject>;
    async fn delete(&self, id: &str) -> Result<()>;
    async fn get_content(&self, id: &str) -> Result<Vec<u8>>;
}

/// `FileManagement` implemented directly against a `Transport`, shared by
/// any OpenAI-shaped files endpoint. Anthropic's files API is assumed to
/// follow the same OpenAI multipart shape absent a documented content-type
/// of its own (see DESIGN.md for the open question this leaves).
pub struct OpenAiShapedFiles<'a> {
    transport: &'a dyn Transport,
    headers: Vec<(String, String)>,
}

impl<'a> OpenAiShapedFiles<'a> {
    pub fn new(transport: &'a dyn Transport, headers: Vec<(String, String)>) -> Self {
        OpenAiShapedFiles { transport, headers }
    }
}

#[async_trait::async_trait]
impl FileManagement for OpenAiShapedFiles<'_> {
    async fn upload(&self, filename: &str, mime: &str, bytes: Vec<u8>, purpose: &str) -> Result<FileObject> {
        let parts = vec![
            FormPart::Text {
                name: "purpose".to_string(),
                value: purpose.to_string(),
            },
            FormPart::File {
                name: "file".to_string(),
                filename: filename.to_string(),
                mime: mime.to_string(),
                bytes,
            },
        ];
        let value = self.transport.post_form("/files", &self.headers, parts).await?;
        FileObject::from_openai(&value)
    }

    async fn list(&self, query: Option<&str>) -> Result<FileListPage> {
        let path = match query {
            Some(q) => format!("/files?{q}"),
            None => "/files".to_string(),
        };
        let value = self.transport.get_json(&path, &self.headers).await?;
        let entries = value.get("data").and_then(Value::as_array).cloned().unwrap_or_default();
        let files = entries.iter().map(FileObject::from_openai).collect::<Result<Vec<_>>>()?;
        let has_more = value.get("has_more").and_then(Value::as_bool).unwrap_or(false);
        Ok(FileListPage { files, has_more })
    }

    async fn retrieve(&self, id: &str) -> Result<FileObject> {
        let value = self.transport.get_json(&format!("/files/{id}"), &self.headers).await?;
        FileObject::from_openai(&value)
    }

    async fn delete(&self, id: &str) -> Result<()> {
        self.transport.delete(&format!("/files/{id}"), &self.headers).await
    }

    async fn get_content(&self, id: &str) -> Result<Vec<u8>> {
        self.transport.get_bytes(&format!("/files/{id}/content"), &self.headers).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn openai_round_trip_preserves_fields_modulo_metadata() {
        let original = json!({
            "id": "file-abc",
            "object": "file",
            "filename": "corpus.txt",
            "bytes": 42,
            "purpose": "fine-tune",
            "created_at": 1000,
        });
        let file = FileObject::from_openai(&original).unwrap();
        assert_eq!(file.to_openai_json(), original);
    }
}
