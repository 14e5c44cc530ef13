use crate::error::{LedgerError, Result};
use base64::{engine::general_purpose::STANDARD, Engine as _};
use serde::{Deserialize, Serialize};
use std::path::Path;
use tokio::fs;

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct Base64Source {
    #[serde(rename = "type")]
    pub kind: String,
    pub media_type: String,
    pub data: String,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ContentBlock {
    Text { text: String },
    Image { source: Base64Source },
    Document { source: Base64Source },
}

impl ContentBlock {
    pub fn text(text: impl Into<String>) -> Self {
        ContentBlock::Text { text: text.into() }
    }
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct Message {
    pub role: String,
    pub content: Vec<ContentBlock>,
}

impl Message {
    pub fn user(content: Vec<ContentBlock>) -> Self {
        Self {
            role: "user".to_string(),
            content,
        }
    }
}

#[derive(Debug, Serialize)]
pub(crate) struct MessagesRequest<'a> {
    pub model: &'a str,
    pub max_tokens: u32,
    pub system: &'a str,
    pub messages: Vec<Message>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct MessagesResponse {
    #[serde(default)]
    pub content: Vec<ResponseBlock>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ResponseBlock {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub text: Option<String>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ApiErrorBody {
    pub error: ApiError,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ApiError {
    pub message: String,
}

/// A scanned contract, bill or receipt, ready to be sent inline.
#[derive(Debug, Clone, PartialEq)]
pub struct Attachment {
    pub display_name: String,
    pub media_type: String,
    data: String,
}

impl Attachment {
    pub fn from_bytes(display_name: impl Into<String>, media_type: impl Into<String>, bytes: &[u8]) -> Self {
        Self {
            display_name: display_name.into(),
            media_type: media_type.into(),
            data: STANDARD.encode(bytes),
        }
    }

    pub async fn from_path(path: &Path) -> Result<Self> {
        let display_name = path
            .file_name()
            .and_then(|n| n.to_str())
            .ok_or_else(|| LedgerError::InvalidInput("Invalid file name".to_string()))?
            .to_string();
        let media_type = mime_guess::from_path(path)
            .first_or_octet_stream()
            .to_string();
        let bytes = fs::read(path).await?;
        Ok(Self::from_bytes(display_name, media_type, &bytes))
    }

    /// Images go in as image blocks, everything else as a document.
    pub fn to_block(&self) -> ContentBlock {
        let source = Base64Source {
            kind: "base64".to_string(),
            media_type: self.media_type.clone(),
            data: self.data.clone(),
        };
        if self.media_type.starts_with("image/") {
            ContentBlock::Image { source }
        } else {
            ContentBlock::Document { source }
        }
    }
}
