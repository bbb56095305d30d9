use crate::category::CategorySpec;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to load configuration: {0}")]
    Load(#[from] config::ConfigError),
    #[error("at least one category must be configured")]
    NoCategories,
    #[error("category name must not be empty")]
    EmptyCategoryName,
    #[error("duplicate category name: {0}")]
    DuplicateCategory(String),
    #[error("category name {0:?} is not a valid folder name")]
    InvalidCategoryName(String),
    #[error("category name {0:?} is reserved for the fallback category")]
    ReservedCategoryName(String),
    #[error("invalid ignore pattern {pattern:?}: {source}")]
    InvalidIgnorePattern {
        pattern: String,
        #[source]
        source: globset::Error,
    },
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub watch: WatchConfig,
    pub settle: SettleConfig,
    pub classifier: ClassifierConfig,
    pub dispatch: DispatchConfig,
    pub categories: Vec<CategoryEntry>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WatchConfig {
    pub dir: PathBuf,
    /// Treat a rename whose target lands in the watched folder as an arrival.
    pub include_renames: bool,
    pub ignore: Vec<String>,
}

impl Default for WatchConfig {
    fn default() -> Self {
        Self {
            dir: default_watch_dir(),
            include_renames: true,
            ignore: [".*", "*.part", "*.crdownload", "*.tmp", "*.download"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
        }
    }
}

fn default_watch_dir() -> PathBuf {
    std::env::var_os("HOME")
        .or_else(|| std::env::var_os("USERPROFILE"))
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("."))
        .join("Downloads")
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SettleConfig {
    pub delay_ms: u64,
    pub poll_interval_ms: u64,
    /// Upper bound on size/mtime polls after the fixed delay; 0 disables the stability check.
    pub max_polls: u32,
}

impl Default for SettleConfig {
    fn default() -> Self {
        Self {
            delay_ms: 1000,
            poll_interval_ms: 250,
            max_polls: 8,
        }
    }
}

impl SettleConfig {
    pub fn delay(&self) -> Duration {
        Duration::from_millis(self.delay_ms)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ClassifierConfig {
    /// ollama | openai | noop
    pub provider: String,
    pub model: String,
    pub base_url: Option<String>,
    pub timeout_secs: u64,
    pub max_retries: u32,
    /// Consecutive failed calls after which failures are logged as errors.
    pub alert_after: u32,
    pub content_chars: usize,
}

impl Default for ClassifierConfig {
    fn default() -> Self {
        Self {
            provider: "ollama".to_string(),
            model: "llama3".to_string(),
            base_url: None,
            timeout_secs: 30,
            max_retries: 0,
            alert_after: 5,
            content_chars: 500,
        }
    }
}

impl ClassifierConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConflictPolicy {
    /// Move under the first free `stem_N.ext` name.
    #[default]
    Rename,
    /// Leave the file where it is.
    Skip,
    Overwrite,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct DispatchConfig {
    pub conflict: ConflictPolicy,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CategoryEntry {
    pub name: String,
    #[serde(default)]
    pub keywords: String,
}

impl CategoryEntry {
    pub fn new(name: &str, keywords: &str) -> Self {
        Self {
            name: name.to_string(),
            keywords: keywords.to_string(),
        }
    }
}

pub fn default_categories() -> Vec<CategoryEntry> {
    vec![
        CategoryEntry::new("Invoices", "invoice, receipt, bill, payment"),
        CategoryEntry::new("Images", "image, picture, screenshot, photo"),
        CategoryEntry::new("Documents", "document, report, resume, letter, form"),
        CategoryEntry::new("Code", "python, javascript, html, css, script"),
        CategoryEntry::new("Personal", "personal, travel, health, finance"),
        CategoryEntry::new("Work", "work, project, meeting, presentation"),
    ]
}

impl AppConfig {
    /// Validated category spec; falls back to the built-in set when none are configured.
    pub fn category_spec(&self) -> Result<CategorySpec, ConfigError> {
        if self.categories.is_empty() {
            CategorySpec::new(default_categories())
        } else {
            CategorySpec::new(self.categories.clone())
        }
    }
}

pub fn load(path: Option<&str>) -> Result<AppConfig, ConfigError> {
    let mut settings = config::Config::builder();
    if let Some(p) = path {
        settings = settings.add_source(config::File::with_name(p));
    } else {
        settings = settings.add_source(config::File::with_name("config/default").required(false));
    }
    settings = settings.add_source(
        config::Environment::with_prefix("SORTER")
            .separator("__")
            .try_parsing(true),
    );
    let cfg = settings.build()?;
    let app: AppConfig = cfg.try_deserialize()?;
    app.category_spec()?;
    Ok(app)
}
