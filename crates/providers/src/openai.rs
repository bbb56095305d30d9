use crate::{status_error, ChatMessage, ChatReply, ChatRequest, LlmProvider, ProviderError};
use reqwest::Client;
use serde::Deserialize;
use std::sync::Arc;
use tracing::debug;

pub const DEFAULT_BASE_URL: &str = "https://api.openai.com";

/// Settings for any OpenAI-compatible chat endpoint (OpenAI, LM Studio, llama.cpp server).
#[derive(Clone)]
pub struct OpenAiConfig {
    pub api_key: Option<String>,
    pub base_url: String,
}

#[derive(Clone)]
pub struct OpenAiProvider {
    client: Client,
    cfg: Arc<OpenAiConfig>,
}

impl OpenAiProvider {
    pub fn new(cfg: OpenAiConfig) -> Self {
        Self {
            client: Client::new(),
            cfg: Arc::new(cfg),
        }
    }

    fn endpoint(&self) -> String {
        format!(
            "{}/v1/chat/completions",
            self.cfg.base_url.trim_end_matches('/')
        )
    }
}

#[derive(serde::Serialize)]
struct ChatApiRequest<'a> {
    model: &'a str,
    messages: &'a [ChatMessage],
    stream: bool,
}

#[derive(Deserialize)]
struct Choice {
    message: ChatMessageResp,
}

#[derive(Deserialize)]
struct ChatMessageResp {
    #[serde(default)]
    content: Option<String>,
}

#[derive(Deserialize)]
struct ChatApiResponse {
    choices: Vec<Choice>,
}

fn reply_from(parsed: ChatApiResponse) -> Result<ChatReply, ProviderError> {
    parsed
        .choices
        .into_iter()
        .next()
        .and_then(|c| c.message.content)
        .map(|content| ChatReply { content })
        .ok_or_else(|| ProviderError::MalformedResponse("no choices in completion".into()))
}

#[async_trait::async_trait]
impl LlmProvider for OpenAiProvider {
    async fn chat(&self, request: &ChatRequest) -> Result<ChatReply, ProviderError> {
        let body = ChatApiRequest {
            model: &request.model,
            messages: &request.messages,
            stream: false,
        };

        debug!(model = %request.model, url = %self.endpoint(), "chat completion request");
        let mut builder = self.client.post(self.endpoint()).json(&body);
        if let Some(key) = &self.cfg.api_key {
            builder = builder.bearer_auth(key);
        }
        let resp = builder.send().await?;
        if !resp.status().is_success() {
            return Err(status_error(resp).await);
        }

        let parsed: ChatApiResponse = resp
            .json()
            .await
            .map_err(|e| ProviderError::MalformedResponse(e.to_string()))?;
        reply_from(parsed)
    }
}
