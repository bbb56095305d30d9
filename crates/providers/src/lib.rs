//! Provider abstractions for chat-style language models.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use thiserror::Error;

pub mod noop;
pub mod ollama;
pub mod openai;

#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("not implemented")]
    NotImplemented,
    #[error("service unreachable: {0}")]
    Unreachable(String),
    #[error("request timed out: {0}")]
    Timeout(String),
    #[error("request failed: {0}")]
    RequestFailed(String),
    #[error("malformed response: {0}")]
    MalformedResponse(String),
    #[error("unknown provider: {0}")]
    UnknownProvider(String),
}

impl ProviderError {
    /// Transport-level failures that may succeed when the same request is sent again.
    pub fn is_transient(&self) -> bool {
        matches!(self, ProviderError::Unreachable(_) | ProviderError::Timeout(_))
    }
}

impl From<reqwest::Error> for ProviderError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            ProviderError::Timeout(e.to_string())
        } else if e.is_connect() {
            ProviderError::Unreachable(e.to_string())
        } else if e.is_decode() {
            ProviderError::MalformedResponse(e.to_string())
        } else {
            ProviderError::RequestFailed(e.to_string())
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
}

impl ChatMessage {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }
}

/// A single, non-streaming chat round trip.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatRequest {
    pub model: String,
    pub messages: Vec<ChatMessage>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatReply {
    pub content: String,
}

#[async_trait::async_trait]
pub trait LlmProvider: Send + Sync {
    async fn chat(&self, request: &ChatRequest) -> Result<ChatReply, ProviderError>;
}

#[derive(Default, Clone)]
pub struct ProviderRegistry {
    llms: HashMap<String, Arc<dyn LlmProvider>>,
    pub preferred_llm: Option<String>,
}

impl ProviderRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_llm(mut self, name: &str, provider: Arc<dyn LlmProvider>) -> Self {
        self.llms.insert(name.to_string(), provider);
        self
    }

    pub fn set_preferred_llm(mut self, name: &str) -> Self {
        self.preferred_llm = Some(name.to_string());
        self
    }

    pub fn llm(&self, name: Option<&str>) -> Result<Arc<dyn LlmProvider>, ProviderError> {
        let key = name
            .map(str::to_string)
            .or_else(|| self.preferred_llm.clone())
            .ok_or_else(|| ProviderError::UnknownProvider("no llm provider configured".into()))?;
        self.llms
            .get(&key)
            .cloned()
            .ok_or(ProviderError::UnknownProvider(key))
    }

    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.llms.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }
}

/// Reads a non-success response into a `RequestFailed` carrying status and body.
pub(crate) async fn status_error(resp: reqwest::Response) -> ProviderError {
    let status = resp.status();
    let body = resp
        .bytes()
        .await
        .unwrap_or(bytes::Bytes::from_static(b""));
    ProviderError::RequestFailed(format!(
        "status {} body {}",
        status,
        String::from_utf8_lossy(&body)
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::noop::NoopProvider;

    #[test]
    fn registry_resolves_preferred_llm() {
        let reg = ProviderRegistry::new()
            .with_llm("noop", Arc::new(NoopProvider))
            .set_preferred_llm("noop");
        assert!(reg.llm(None).is_ok());
        assert!(reg.llm(Some("noop")).is_ok());
        assert_eq!(reg.names(), vec!["noop"]);
    }

    #[test]
    fn registry_reports_unknown_provider() {
        let reg = ProviderRegistry::new().with_llm("noop", Arc::new(NoopProvider));
        match reg.llm(Some("ollama")) {
            Err(ProviderError::UnknownProvider(name)) => assert_eq!(name, "ollama"),
            other => panic!("unexpected: {:?}", other.map(|_| ())),
        }
        assert!(matches!(
            reg.llm(None),
            Err(ProviderError::UnknownProvider(_))
        ));
    }

    #[test]
    fn transient_errors_are_transport_failures() {
        assert!(ProviderError::Unreachable("refused".into()).is_transient());
        assert!(ProviderError::Timeout("30s".into()).is_transient());
        assert!(!ProviderError::MalformedResponse("{}".into()).is_transient());
        assert!(!ProviderError::NotImplemented.is_transient());
    }

    #[test]
    fn chat_message_serializes_lowercase_role() {
        let msg = ChatMessage::user("hi");
        let json = serde_json::to_value(&msg).unwrap();
        assert_eq!(json["role"], "user");
        assert_eq!(json["content"], "hi");
    }
}
