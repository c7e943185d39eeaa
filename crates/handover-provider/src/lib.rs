pub mod gemini;
pub mod types;

use std::sync::Arc;

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

pub use gemini::GeminiClient;
pub use types::{ChatMessage, ChatRequest, ChatResponse};

/// Opaque text-completion backend: system prompt + message history in,
/// reply text out. No streaming, no tool use; the platform only ever needs
/// one-shot completions.
#[async_trait]
pub trait LlmClient: Send + Sync {
    async fn chat(&self, request: ChatRequest) -> Result<ChatResponse>;
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ProviderKind {
    Gemini,
    Stub,
}

/// LLM backend configuration as it appears in `config/main.yaml`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmConfig {
    pub provider: ProviderKind,
    #[serde(default)]
    pub api_key: Option<String>,
    #[serde(default = "default_model")]
    pub model: String,
    #[serde(default)]
    pub base_url: Option<String>,
}

fn default_model() -> String {
    "gemini-2.0-flash".to_string()
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            provider: ProviderKind::Stub,
            api_key: None,
            model: default_model(),
            base_url: None,
        }
    }
}

/// Create a client from configuration.
pub fn create_client(config: &LlmConfig) -> Result<Arc<dyn LlmClient>> {
    let client: Arc<dyn LlmClient> = match config.provider {
        ProviderKind::Gemini => {
            let key = config
                .api_key
                .as_ref()
                .ok_or_else(|| anyhow!("gemini requires api_key"))?;
            match &config.base_url {
                Some(base) => Arc::new(GeminiClient::with_base_url(key.clone(), base.clone())),
                None => Arc::new(GeminiClient::new(key.clone())),
            }
        }
        ProviderKind::Stub => Arc::new(StubClient),
    };
    Ok(client)
}

/// Deterministic offline backend for tests and local development.
pub struct StubClient;

#[async_trait]
impl LlmClient for StubClient {
    async fn chat(&self, request: ChatRequest) -> Result<ChatResponse> {
        let user_text = request
            .messages
            .last()
            .map(|m| m.content.clone())
            .unwrap_or_default();
        Ok(ChatResponse {
            text: format!("[stub:{}] {}", request.model, user_text),
            input_tokens: None,
            output_tokens: None,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn stub_client_echoes_last_user_message() {
        let client = StubClient;
        let resp = client
            .chat(ChatRequest::simple("test-model", None, "ping".into()))
            .await
            .unwrap();
        assert!(resp.text.contains("stub:test-model"));
        assert!(resp.text.contains("ping"));
    }

    #[test]
    fn create_client_requires_gemini_key() {
        let config = LlmConfig {
            provider: ProviderKind::Gemini,
            api_key: None,
            model: "gemini-2.0-flash".into(),
            base_url: None,
        };
        let err = create_client(&config).err().unwrap();
        assert!(err.to_string().contains("requires api_key"));
    }

    #[test]
    fn create_client_defaults_to_stub() {
        let config = LlmConfig::default();
        assert_eq!(config.provider, ProviderKind::Stub);
        assert!(create_client(&config).is_ok());
    }

    #[test]
    fn llm_config_parses_from_yaml_style_json() {
        let config: LlmConfig = serde_json::from_str(
            r#"{"provider": "gemini", "api_key": "k", "model": "gemini-2.0-flash"}"#,
        )
        .unwrap();
        assert_eq!(config.provider, ProviderKind::Gemini);
        assert_eq!(config.api_key.as_deref(), Some("k"));
    }
}
