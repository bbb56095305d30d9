//! Ollama chat provider.
//!
//! Talks to a local Ollama instance over its `/api/chat` endpoint with streaming disabled,
//! so one request yields exactly one reply.

use crate::{status_error, ChatMessage, ChatReply, ChatRequest, LlmProvider, ProviderError};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Default Ollama API endpoint
pub const DEFAULT_BASE_URL: &str = "http://localhost:11434";

#[derive(Clone)]
pub struct OllamaProvider {
    client: Client,
    base_url: String,
}

#[derive(Serialize)]
struct OllamaChatRequest<'a> {
    model: &'a str,
    messages: &'a [ChatMessage],
    stream: bool,
}

#[derive(Deserialize)]
struct OllamaChatResponse {
    message: OllamaMessage,
}

#[derive(Deserialize)]
struct OllamaMessage {
    content: String,
}

impl OllamaProvider {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            base_url: base_url.into(),
        }
    }

    fn endpoint(&self) -> String {
        format!("{}/api/chat", self.base_url.trim_end_matches('/'))
    }
}

impl Default for OllamaProvider {
    fn default() -> Self {
        Self::new(DEFAULT_BASE_URL)
    }
}

#[async_trait::async_trait]
impl LlmProvider for OllamaProvider {
    async fn chat(&self, request: &ChatRequest) -> Result<ChatReply, ProviderError> {
        let body = OllamaChatRequest {
            model: &request.model,
            messages: &request.messages,
            stream: false,
        };

        debug!(model = %request.model, url = %self.endpoint(), "ollama chat request");
        let resp = self.client.post(self.endpoint()).json(&body).send().await?;
        if !resp.status().is_success() {
            return Err(status_error(resp).await);
        }

        let text = resp.text().await?;
        let parsed: OllamaChatResponse = serde_json::from_str(&text)
            .map_err(|e| ProviderError::MalformedResponse(format!("{}: {}", e, text)))?;
        Ok(ChatReply {
            content: parsed.message.content,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_disables_streaming() {
        let messages = vec![ChatMessage::user("which folder?")];
        let body = OllamaChatRequest {
            model: "llama3",
            messages: &messages,
            stream: false,
        };
        let json = serde_json::to_value(&body).unwrap();
        assert_eq!(json["model"], "llama3");
        assert_eq!(json["stream"], false);
        assert_eq!(json["messages"][0]["role"], "user");
    }

    #[test]
    fn response_content_is_extracted() {
        let parsed: OllamaChatResponse = serde_json::from_str(
            r#"{"model":"llama3","message":{"role":"assistant","content":"Work"},"done":true}"#,
        )
        .unwrap();
        assert_eq!(parsed.message.content, "Work");
    }

    #[tokio::test]
    async fn closed_port_is_unreachable() {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let port = listener.local_addr().unwrap().port();
        drop(listener);

        let provider = OllamaProvider::new(format!("http://127.0.0.1:{}", port));
        let request = ChatRequest {
            model: "llama3".into(),
            messages: vec![ChatMessage::user("hello")],
        };
        let err = provider.chat(&request).await.unwrap_err();
        assert!(err.is_transient(), "expected transport failure, got {err}");
    }
}
