//! Language-model classification: prompt construction, one chat round trip, and mapping the
//! reply onto the closed [`Category`] set.

use crate::category::{Category, CategorySpec};
use crate::config::{CategoryEntry, ClassifierConfig};
use providers::{ChatMessage, ChatReply, ChatRequest, LlmProvider, ProviderError};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, warn};

/// Everything the model is shown for one file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClassificationRequest {
    pub filename: String,
    pub content: String,
    pub categories: Vec<CategoryEntry>,
}

impl ClassificationRequest {
    pub fn new(spec: &CategorySpec, filename: &str, text: &str, max_chars: usize) -> Self {
        Self {
            filename: filename.to_string(),
            content: truncate_chars(text, max_chars).to_string(),
            categories: spec.entries().to_vec(),
        }
    }

    pub fn prompt(&self) -> String {
        let names = self
            .categories
            .iter()
            .map(|c| c.name.as_str())
            .collect::<Vec<_>>()
            .join(", ");
        let keywords = self
            .categories
            .iter()
            .map(|c| format!("- {}: {}", c.name, c.keywords))
            .collect::<Vec<_>>()
            .join("\n");
        format!(
            "Based on the filename and its content, which of the following categories does this file belong to?\n\
             The categories are: {names}.\n\
             The keywords for each category are (guidance only):\n\
             {keywords}\n\
             \n\
             Filename: {filename}\n\
             Content: \"{content}\"\n\
             \n\
             Please respond with only the single category name.",
            filename = self.filename,
            content = self.content,
        )
    }
}

/// First `max_chars` characters of `text`, never splitting a code point.
pub fn truncate_chars(text: &str, max_chars: usize) -> &str {
    match text.char_indices().nth(max_chars) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}

/// Maps a raw reply onto the category set. Anything but an exact name is the fallback.
pub fn interpret(spec: &CategorySpec, reply: &str) -> Category {
    spec.resolve(reply.trim())
}

pub struct CategoryClassifier {
    spec: Arc<CategorySpec>,
    llm: Arc<dyn LlmProvider>,
    model: String,
    timeout: Option<Duration>,
    max_retries: u32,
    alert_after: u32,
    content_chars: usize,
    consecutive_failures: AtomicU32,
}

impl CategoryClassifier {
    pub fn new(spec: Arc<CategorySpec>, llm: Arc<dyn LlmProvider>, cfg: &ClassifierConfig) -> Self {
        Self {
            spec,
            llm,
            model: cfg.model.clone(),
            timeout: (cfg.timeout_secs > 0).then(|| cfg.timeout()),
            max_retries: cfg.max_retries,
            alert_after: cfg.alert_after.max(1),
            content_chars: cfg.content_chars,
            consecutive_failures: AtomicU32::new(0),
        }
    }

    pub fn spec(&self) -> &CategorySpec {
        &self.spec
    }

    pub fn build_request(&self, filename: &str, text: &str) -> ClassificationRequest {
        ClassificationRequest::new(&self.spec, filename, text, self.content_chars)
    }

    /// Always yields a configured category or [`Category::Other`]; never fails.
    pub async fn classify(&self, filename: &str, text: &str) -> Category {
        let request = self.build_request(filename, text);
        let chat = ChatRequest {
            model: self.model.clone(),
            messages: vec![ChatMessage::user(request.prompt())],
        };

        match self.ask(&chat).await {
            Ok(reply) => {
                self.record_success();
                let category = interpret(&self.spec, &reply.content);
                if category.is_fallback() {
                    warn!(
                        file = filename,
                        reply = reply.content.trim(),
                        "model returned an unknown category"
                    );
                }
                category
            }
            Err(e) => {
                self.record_failure(filename, &e);
                Category::Other
            }
        }
    }

    async fn ask(&self, request: &ChatRequest) -> Result<ChatReply, ProviderError> {
        let mut attempt = 0;
        loop {
            let result = match self.timeout {
                Some(limit) => tokio::time::timeout(limit, self.llm.chat(request))
                    .await
                    .unwrap_or_else(|_| {
                        Err(ProviderError::Timeout(format!("no reply within {:?}", limit)))
                    }),
                None => self.llm.chat(request).await,
            };
            match result {
                Err(e) if e.is_transient() && attempt < self.max_retries => {
                    attempt += 1;
                    let backoff = Duration::from_millis(250u64 << attempt.min(6));
                    debug!(attempt, error = %e, ?backoff, "retrying classification call");
                    tokio::time::sleep(backoff).await;
                }
                other => return other,
            }
        }
    }

    fn record_success(&self) {
        let previous = self.consecutive_failures.swap(0, Ordering::Relaxed);
        if previous >= self.alert_after {
            info!(failures = previous, "classification service recovered");
        }
    }

    fn record_failure(&self, filename: &str, e: &ProviderError) {
        let failures = self.consecutive_failures.fetch_add(1, Ordering::Relaxed) + 1;
        if failures >= self.alert_after {
            error!(
                file = filename,
                error = %e,
                failures,
                "classification service keeps failing; files are going to the fallback category"
            );
        } else {
            warn!(file = filename, error = %e, "classification call failed, using fallback");
        }
    }

    pub fn consecutive_failures(&self) -> u32 {
        self.consecutive_failures.load(Ordering::Relaxed)
    }
}
