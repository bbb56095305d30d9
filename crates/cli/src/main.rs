use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use sorter_cli::watch;
use sorter_core::config;
use sorter_core::config::AppConfig;
use sorter_core::models::{FileEvent, MoveStatus};
use sorter_core::pipeline::Organizer;
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);
    let cfg = config::load(cli.config.as_deref())?;

    match cli.command {
        Commands::Watch { dir } => watch::watch_dir(cfg, dir).await,
        Commands::Sort { file, json } => run_sort(cfg, file, json).await,
        Commands::Classify { file, json } => run_classify(cfg, file, json).await,
        Commands::Categories { json } => run_categories(cfg, json),
    }
}

fn init_tracing(verbose: bool) {
    let default = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

#[derive(Parser)]
#[command(name = "ai-sorter")]
#[command(about = "Sorts new files into category folders with a language model", long_about = None)]
struct Cli {
    /// Path to config TOML
    #[arg(short, long)]
    config: Option<String>,

    /// Debug logging (RUST_LOG takes precedence)
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Watch a folder and sort every new file
    Watch {
        /// Folder to watch (defaults to watch.dir from the config)
        #[arg(long)]
        dir: Option<PathBuf>,
    },
    /// Sort a single file into a category folder next to it
    Sort {
        file: PathBuf,
        /// Output JSON
        #[arg(long)]
        json: bool,
    },
    /// Print the category a file would be sorted into, without moving it
    Classify {
        file: PathBuf,
        /// Output JSON
        #[arg(long)]
        json: bool,
    },
    /// List configured categories and their keywords
    Categories {
        /// Output JSON
        #[arg(long)]
        json: bool,
    },
}

fn existing_file(file: &Path) -> Result<(PathBuf, PathBuf)> {
    let file = file
        .canonicalize()
        .with_context(|| format!("cannot open {}", file.display()))?;
    if !file.is_file() {
        bail!("{} is not a regular file", file.display());
    }
    let root = file
        .parent()
        .map(PathBuf::from)
        .context("file has no parent folder")?;
    Ok((file, root))
}

async fn run_sort(cfg: AppConfig, file: PathBuf, json: bool) -> Result<()> {
    let (file, root) = existing_file(&file)?;
    let organizer = Organizer::from_config(&cfg, root)?;
    let outcome = organizer.process_now(FileEvent::new(file)).await;
    if json {
        println!("{}", serde_json::to_string_pretty(&outcome)?);
    } else {
        watch::log_outcome(&outcome);
    }
    if let MoveStatus::Failed { error } = &outcome.status {
        bail!("sort failed: {}", error);
    }
    Ok(())
}

async fn run_classify(cfg: AppConfig, file: PathBuf, json: bool) -> Result<()> {
    let (file, root) = existing_file(&file)?;
    let organizer = Organizer::from_config(&cfg, root)?;
    let event = FileEvent::new(file);
    let (extraction, category) = organizer.classify_event(&event).await;
    if json {
        let out = serde_json::json!({
            "path": event.path,
            "kind": event.kind,
            "extracted_chars": extraction.text.chars().count(),
            "extraction_ok": extraction.succeeded,
            "category": category,
            "fallback": category.is_fallback(),
        });
        println!("{}", serde_json::to_string_pretty(&out)?);
    } else {
        println!("{}", category);
    }
    Ok(())
}

fn run_categories(cfg: AppConfig, json: bool) -> Result<()> {
    let spec = cfg.category_spec()?;
    if json {
        println!("{}", serde_json::to_string_pretty(spec.entries())?);
    } else {
        for entry in spec.entries() {
            println!("{:<12} {}", entry.name, entry.keywords);
        }
        println!("{:<12} (fallback)", sorter_core::category::FALLBACK_CATEGORY);
    }
    Ok(())
}
