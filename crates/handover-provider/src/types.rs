use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ChatMessage {
    pub role: String,
    pub content: String,
}

impl ChatMessage {
    pub fn user(text: impl Into<String>) -> Self {
        Self {
            role: "user".into(),
            content: text.into(),
        }
    }

    pub fn assistant(text: impl Into<String>) -> Self {
        Self {
            role: "assistant".into(),
            content: text.into(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatRequest {
    pub model: String,
    pub system: Option<String>,
    pub messages: Vec<ChatMessage>,
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
}

fn default_max_tokens() -> u32 {
    4096
}

impl ChatRequest {
    pub fn new(
        model: impl Into<String>,
        system: Option<String>,
        messages: Vec<ChatMessage>,
    ) -> Self {
        Self {
            model: model.into(),
            system,
            messages,
            max_tokens: default_max_tokens(),
        }
    }

    /// Single user turn, the common shape for extraction prompts.
    pub fn simple(model: impl Into<String>, system: Option<String>, user: String) -> Self {
        Self::new(model, system, vec![ChatMessage::user(user)])
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatResponse {
    pub text: String,
    pub input_tokens: Option<u32>,
    pub output_tokens: Option<u32>,
}
