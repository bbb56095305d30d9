//! Per-event pipeline: settle → extract → classify → dispatch.

use crate::category::Category;
use crate::classifier::CategoryClassifier;
use crate::config::{AppConfig, ClassifierConfig, SettleConfig};
use crate::dispatcher::FileDispatcher;
use crate::extractor;
use crate::models::{ExtractionResult, FileEvent, MoveOutcome};
use crate::settle::{self, Settled};
use anyhow::Context;
use globset::{Glob, GlobSet, GlobSetBuilder};
use providers::noop::NoopProvider;
use providers::ollama::OllamaProvider;
use providers::openai::{OpenAiConfig, OpenAiProvider};
use providers::ProviderRegistry;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Idle,
    EventReceived,
    Extracting,
    Classifying,
    Dispatching,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Stage::Idle => "idle",
            Stage::EventReceived => "event-received",
            Stage::Extracting => "extracting",
            Stage::Classifying => "classifying",
            Stage::Dispatching => "dispatching",
        };
        f.write_str(s)
    }
}

pub struct Organizer {
    classifier: CategoryClassifier,
    dispatcher: FileDispatcher,
    settle: SettleConfig,
    ignore: GlobSet,
}

impl Organizer {
    pub fn new(
        classifier: CategoryClassifier,
        dispatcher: FileDispatcher,
        settle: SettleConfig,
        ignore: GlobSet,
    ) -> Self {
        Self {
            classifier,
            dispatcher,
            settle,
            ignore,
        }
    }

    /// Wires every component from configuration, sorting into `root`.
    pub fn from_config(config: &AppConfig, root: impl Into<PathBuf>) -> anyhow::Result<Self> {
        let spec = Arc::new(config.category_spec()?);
        let registry = build_registry(&config.classifier);
        let llm = registry
            .llm(None)
            .with_context(|| format!("classifier provider {:?}", config.classifier.provider))?;
        let classifier = CategoryClassifier::new(spec, llm, &config.classifier);
        let dispatcher = FileDispatcher::new(root, config.dispatch.conflict);
        let ignore = build_globset(&config.watch.ignore)?;
        Ok(Self::new(
            classifier,
            dispatcher,
            config.settle.clone(),
            ignore,
        ))
    }

    /// True for names matching a configured ignore glob (partial downloads, dotfiles).
    pub fn should_ignore(&self, path: &Path) -> bool {
        path.file_name()
            .map(|name| self.ignore.is_match(Path::new(name)))
            .unwrap_or(true)
    }

    /// Full handling of one creation event, including the settle wait.
    pub async fn process(&self, event: FileEvent) -> MoveOutcome {
        debug!(stage = %Stage::EventReceived, path = %event.path.display());
        match settle::wait_until_settled(&event.path, &self.settle).await {
            Settled::Vanished => {
                return MoveOutcome::skipped(event.path, "file disappeared before processing")
            }
            Settled::Unsettled => warn!(
                path = %event.path.display(),
                "file still changing after settle budget, processing anyway"
            ),
            Settled::Stable => {}
        }
        self.process_now(event).await
    }

    /// Extract, classify and dispatch without waiting for the file to settle.
    pub async fn process_now(&self, event: FileEvent) -> MoveOutcome {
        if event.path.is_dir() {
            return MoveOutcome::skipped(event.path, "directories are not sorted");
        }
        let (_, category) = self.classify_event(&event).await;

        debug!(stage = %Stage::Dispatching, category = %category);
        let dispatcher = self.dispatcher.clone();
        let source = event.path.clone();
        let outcome = match tokio::task::spawn_blocking(move || {
            dispatcher.dispatch(&source, &category)
        })
        .await
        {
            Ok(outcome) => outcome,
            Err(e) => MoveOutcome::failed(event.path, None, format!("dispatch task aborted: {}", e)),
        };
        debug!(stage = %Stage::Idle);
        outcome
    }

    /// Extract and classify only; the file is never touched.
    pub async fn classify_event(&self, event: &FileEvent) -> (ExtractionResult, Category) {
        debug!(stage = %Stage::Extracting, kind = ?event.kind);
        let extraction = extractor::extract_in_background(event.path.clone(), event.kind).await;

        debug!(stage = %Stage::Classifying, chars = extraction.text.chars().count());
        let category = self
            .classifier
            .classify(&event.file_name(), &extraction.text)
            .await;
        info!(file = %event.file_name(), category = %category, "categorized");
        (extraction, category)
    }

    /// Runs [`Organizer::process`] in its own task so a panic stays inside this event.
    pub async fn process_contained(self: &Arc<Self>, event: FileEvent) -> MoveOutcome {
        let organizer = Arc::clone(self);
        let path = event.path.clone();
        match tokio::spawn(async move { organizer.process(event).await }).await {
            Ok(outcome) => outcome,
            Err(e) => MoveOutcome::failed(path, None, format!("processing aborted: {}", e)),
        }
    }
}

pub fn build_registry(config: &ClassifierConfig) -> ProviderRegistry {
    let mut reg = ProviderRegistry::new().with_llm("noop", Arc::new(NoopProvider));

    let ollama = match (config.provider.as_str(), &config.base_url) {
        ("ollama", Some(base)) => OllamaProvider::new(base.clone()),
        _ => OllamaProvider::default(),
    };
    reg = reg.with_llm("ollama", Arc::new(ollama));

    let base_url = match (config.provider.as_str(), &config.base_url) {
        ("openai", Some(base)) => base.clone(),
        _ => std::env::var("OPENAI_BASE_URL")
            .unwrap_or_else(|_| providers::openai::DEFAULT_BASE_URL.to_string()),
    };
    let openai = OpenAiProvider::new(OpenAiConfig {
        api_key: std::env::var("OPENAI_API_KEY").ok(),
        base_url,
    });
    reg = reg.with_llm("openai", Arc::new(openai));

    reg.set_preferred_llm(&config.provider)
}

pub fn build_globset(patterns: &[String]) -> Result<GlobSet, crate::config::ConfigError> {
    let mut builder = GlobSetBuilder::new();
    for pat in patterns {
        let glob = Glob::new(pat).map_err(|source| {
            crate::config::ConfigError::InvalidIgnorePattern {
                pattern: pat.clone(),
                source,
            }
        })?;
        builder.add(glob);
    }
    builder
        .build()
        .map_err(|source| crate::config::ConfigError::InvalidIgnorePattern {
            pattern: patterns.join(", "),
            source,
        })
}
