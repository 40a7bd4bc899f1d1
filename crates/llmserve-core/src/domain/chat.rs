//! Chat message domain types.
//!
//! The generation surface only ever sends a single user message whose
//! content is an ordered list of blocks. Ordering is caller-significant:
//! vision prompts place the image before the text.

use serde::{Deserialize, Serialize};

use crate::contracts::{ChatCompletionMessage, ContentPart, ImageUrl, MessageContent};

/// Message role. Only user turns are produced by the gateway itself.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    #[default]
    User,
}

impl Role {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::User => "user",
        }
    }
}

/// A tagged unit of message content.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ContentBlock {
    Text { text: String },
    ImageRef { data_uri: String },
}

impl ContentBlock {
    pub fn text(text: impl Into<String>) -> Self {
        Self::Text { text: text.into() }
    }

    pub fn image(data_uri: impl Into<String>) -> Self {
        Self::ImageRef {
            data_uri: data_uri.into(),
        }
    }
}

impl From<ContentBlock> for ContentPart {
    fn from(block: ContentBlock) -> Self {
        match block {
            ContentBlock::Text { text } => Self::Text { text },
            ContentBlock::ImageRef { data_uri } => Self::ImageUrl {
                image_url: ImageUrl {
                    url: data_uri,
                    detail: None,
                },
            },
        }
    }
}

/// A chat message with ordered content blocks.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatMessage {
    pub role: Role,
    pub content: Vec<ContentBlock>,
}

impl ChatMessage {
    /// A user message with the given blocks, order preserved.
    pub fn user(content: Vec<ContentBlock>) -> Self {
        Self {
            role: Role::User,
            content,
        }
    }
}

impl From<ChatMessage> for ChatCompletionMessage {
    fn from(message: ChatMessage) -> Self {
        Self {
            role: message.role.as_str().to_string(),
            content: Some(MessageContent::Parts(
                message.content.into_iter().map(ContentPart::from).collect(),
            )),
            extra: serde_json::Map::new(),
        }
    }
}
