//! Conversation message model.
//!
//! `MessageContent` is an explicit tagged variant. The OpenAI-compatible wire form
//! (a bare string, or an array of typed parts) is produced and consumed only by the
//! serde impls in this file.

use base64::Engine as _;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;

use crate::types::tool::ToolCall;
use crate::{Error, ErrorContext, Result};

/// A single conversation turn. Immutable once built; the orchestrator replaces
/// turns instead of editing them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    role: MessageRole,
    content: MessageContent,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    tool_calls: Option<Vec<ToolCall>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    citations: Option<Vec<Citation>>,
}

impl Message {
    pub fn new(role: MessageRole, content: impl Into<MessageContent>) -> Self {
        Self {
            role,
            content: content.into(),
            tool_calls: None,
            citations: None,
        }
    }

    pub fn system(text: impl Into<String>) -> Self {
        Self::new(MessageRole::System, MessageContent::Text(text.into()))
    }

    pub fn user(text: impl Into<String>) -> Self {
        Self::new(MessageRole::User, MessageContent::Text(text.into()))
    }

    pub fn assistant(text: impl Into<String>) -> Self {
        Self::new(MessageRole::Assistant, MessageContent::Text(text.into()))
    }

    /// Attach tool calls. An empty list leaves the field unset.
    pub fn with_tool_calls(mut self, tool_calls: Vec<ToolCall>) -> Self {
        self.tool_calls = (!tool_calls.is_empty()).then_some(tool_calls);
        self
    }

    /// Attach citations. An empty list leaves the field unset.
    pub fn with_citations(mut self, citations: Vec<Citation>) -> Self {
        self.citations = (!citations.is_empty()).then_some(citations);
        self
    }

    pub fn role(&self) -> MessageRole {
        self.role
    }

    pub fn content(&self) -> &MessageContent {
        &self.content
    }

    pub fn tool_calls(&self) -> &[ToolCall] {
        self.tool_calls.as_deref().unwrap_or_default()
    }

    pub fn citations(&self) -> &[Citation] {
        self.citations.as_deref().unwrap_or_default()
    }

    /// Plain-text view of the content; text parts are concatenated, images skipped.
    pub fn text(&self) -> String {
        self.content.to_text()
    }

    pub fn contains_image(&self) -> bool {
        match &self.content {
            MessageContent::Text(_) => false,
            MessageContent::Parts(parts) => parts
                .iter()
                .any(|p| matches!(p, ContentPart::ImageUrl { .. })),
        }
    }
}

/// Message role
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageRole {
    System,
    User,
    Assistant,
}

impl MessageRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            MessageRole::System => "system",
            MessageRole::User => "user",
            MessageRole::Assistant => "assistant",
        }
    }
}

impl fmt::Display for MessageRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Message content (a plain string or a non-empty list of typed parts)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MessageContent {
    Text(String),
    Parts(ContentParts),
}

impl MessageContent {
    pub fn text(text: impl Into<String>) -> Self {
        MessageContent::Text(text.into())
    }

    /// Build multi-part content. Fails when `parts` is empty.
    pub fn parts(parts: Vec<ContentPart>) -> Result<Self> {
        ContentParts::new(parts).map(MessageContent::Parts)
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            MessageContent::Text(s) => Some(s),
            MessageContent::Parts(_) => None,
        }
    }

    pub fn to_text(&self) -> String {
        match self {
            MessageContent::Text(s) => s.clone(),
            MessageContent::Parts(parts) => parts
                .iter()
                .filter_map(|p| match p {
                    ContentPart::Text { text } => Some(text.as_str()),
                    ContentPart::ImageUrl { .. } => None,
                })
                .collect::<Vec<_>>()
                .join(""),
        }
    }
}

impl From<String> for MessageContent {
    fn from(text: String) -> Self {
        MessageContent::Text(text)
    }
}

impl From<&str> for MessageContent {
    fn from(text: &str) -> Self {
        MessageContent::Text(text.to_string())
    }
}

/// Ordered, non-empty list of content parts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "Vec<ContentPart>", into = "Vec<ContentPart>")]
pub struct ContentParts(Vec<ContentPart>);

impl ContentParts {
    pub fn new(parts: Vec<ContentPart>) -> Result<Self> {
        if parts.is_empty() {
            return Err(Error::validation_with_context(
                "multi-part content must contain at least one part",
                ErrorContext::new()
                    .with_field_path("content")
                    .with_source("message_model"),
            ));
        }
        Ok(Self(parts))
    }

    pub fn iter(&self) -> std::slice::Iter<'_, ContentPart> {
        self.0.iter()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Always false; kept for API symmetry with `len`.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl TryFrom<Vec<ContentPart>> for ContentParts {
    type Error = Error;

    fn try_from(parts: Vec<ContentPart>) -> Result<Self> {
        Self::new(parts)
    }
}

impl From<ContentParts> for Vec<ContentPart> {
    fn from(parts: ContentParts) -> Self {
        parts.0
    }
}

impl<'a> IntoIterator for &'a ContentParts {
    type Item = &'a ContentPart;
    type IntoIter = std::slice::Iter<'a, ContentPart>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

/// One part of a multi-part message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum ContentPart {
    #[serde(rename = "text")]
    Text { text: String },
    #[serde(rename = "image_url")]
    ImageUrl { image_url: ImageSource },
}

impl ContentPart {
    pub fn text(text: impl Into<String>) -> Self {
        ContentPart::Text { text: text.into() }
    }

    pub fn image_url(url: impl Into<String>) -> Self {
        ContentPart::ImageUrl {
            image_url: ImageSource::Url(url.into()),
        }
    }

    pub fn image_base64(mime_type: impl Into<String>, data: impl Into<String>) -> Self {
        ContentPart::ImageUrl {
            image_url: ImageSource::Inline {
                mime_type: mime_type.into(),
                data: data.into(),
            },
        }
    }

    pub fn image_from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let mime_type = guess_media_type(path).ok_or_else(|| {
            Error::validation_with_context(
                "unsupported image file extension",
                ErrorContext::new()
                    .with_details(path.display().to_string())
                    .with_source("message_model"),
            )
        })?;
        let bytes = std::fs::read(path)?;
        let data = base64::engine::general_purpose::STANDARD.encode(bytes);
        Ok(Self::image_base64(mime_type, data))
    }
}

/// Where an image comes from: a remote URL, or inline base64 data with its mime type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "ImageUrlWire", into = "ImageUrlWire")]
pub enum ImageSource {
    Url(String),
    Inline { mime_type: String, data: String },
}

#[derive(Serialize, Deserialize)]
struct ImageUrlWire {
    url: String,
}

impl From<ImageUrlWire> for ImageSource {
    fn from(wire: ImageUrlWire) -> Self {
        parse_data_url(&wire.url).unwrap_or(ImageSource::Url(wire.url))
    }
}

impl From<ImageSource> for ImageUrlWire {
    fn from(source: ImageSource) -> Self {
        let url = match source {
            ImageSource::Url(url) => url,
            ImageSource::Inline { mime_type, data } => {
                format!("data:{};base64,{}", mime_type, data)
            }
        };
        ImageUrlWire { url }
    }
}

fn parse_data_url(url: &str) -> Option<ImageSource> {
    let rest = url.strip_prefix("data:")?;
    let (mime_type, data) = rest.split_once(";base64,")?;
    Some(ImageSource::Inline {
        mime_type: mime_type.to_string(),
        data: data.to_string(),
    })
}

/// Source attribution returned by search-backed models.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Citation {
    pub url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
}

impl Citation {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            title: None,
        }
    }
}

fn guess_media_type(path: &Path) -> Option<String> {
    let ext = path
        .extension()
        .and_then(|s| s.to_str())
        .unwrap_or("")
        .to_lowercase();
    let mt = match ext.as_str() {
        "png" => "image/png",
        "jpg" | "jpeg" => "image/jpeg",
        "webp" => "image/webp",
        "gif" => "image/gif",
        _ => return None,
    };
    Some(mt.to_string())
}
