use anyhow::{Context, Result};
use notify::event::{CreateKind, ModifyKind, RenameMode};
use notify::{Event, EventKind, RecursiveMode, Watcher};
use sorter_core::config::AppConfig;
use sorter_core::models::{FileEvent, MoveOutcome, MoveStatus};
use sorter_core::pipeline::Organizer;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::{mpsc, watch};
use tracing::{debug, error, info, warn};

/// Creates the watch folder if needed and returns its canonical path.
pub fn prepare_root(dir: &Path) -> Result<PathBuf> {
    if !dir.exists() {
        std::fs::create_dir_all(dir)
            .with_context(|| format!("creating watch folder {}", dir.display()))?;
        info!(dir = %dir.display(), "created watch folder");
    }
    dir.canonicalize()
        .with_context(|| format!("resolving watch folder {}", dir.display()))
}

/// Paths in `event` that are new files directly inside `root`.
pub fn arrivals(event: &Event, root: &Path, include_renames: bool) -> Vec<PathBuf> {
    let candidates: Vec<&PathBuf> = match &event.kind {
        EventKind::Create(CreateKind::Folder) => Vec::new(),
        EventKind::Create(_) => event.paths.iter().collect(),
        EventKind::Modify(ModifyKind::Name(RenameMode::To)) if include_renames => {
            event.paths.iter().collect()
        }
        // Platforms that cannot tell rename sources from targets; only targets still exist.
        EventKind::Modify(ModifyKind::Name(RenameMode::Any)) if include_renames => {
            event.paths.iter().filter(|p| p.exists()).collect()
        }
        _ => Vec::new(),
    };
    candidates
        .into_iter()
        .filter(|p| p.parent() == Some(root))
        .filter(|p| !p.is_dir())
        .cloned()
        .collect()
}

/// Arrivals from a batch of events, first occurrence order, duplicates collapsed.
pub fn collect_arrivals<I>(events: I, root: &Path, include_renames: bool) -> Vec<PathBuf>
where
    I: IntoIterator<Item = Event>,
{
    let mut out: Vec<PathBuf> = Vec::new();
    for event in events {
        for path in arrivals(&event, root, include_renames) {
            if !out.contains(&path) {
                out.push(path);
            }
        }
    }
    out
}

pub fn log_outcome(outcome: &MoveOutcome) {
    match &outcome.status {
        MoveStatus::Moved => info!(
            from = %outcome.source.display(),
            to = %outcome.destination.as_deref().unwrap_or(Path::new("")).display(),
            conflict = outcome.conflict,
            "moved"
        ),
        MoveStatus::Skipped { reason } => {
            warn!(path = %outcome.source.display(), reason = %reason, "skipped")
        }
        MoveStatus::Failed { error } => error!(
            path = %outcome.source.display(),
            error = %error,
            "could not move file, left in place"
        ),
    }
}

pub async fn watch_dir(cfg: AppConfig, dir: Option<PathBuf>) -> Result<()> {
    let root = prepare_root(dir.as_deref().unwrap_or(cfg.watch.dir.as_path()))?;
    let organizer = Arc::new(Organizer::from_config(&cfg, root.clone())?);

    let (tx, mut rx) = mpsc::unbounded_channel();
    let mut watcher = notify::recommended_watcher(move |res: notify::Result<Event>| {
        let _ = tx.send(res);
    })?;
    watcher
        .watch(&root, RecursiveMode::NonRecursive)
        .with_context(|| format!("watching {}", root.display()))?;

    let (stop_tx, mut stop_rx) = watch::channel(false);
    tokio::spawn(async move {
        shutdown_signal().await;
        let _ = stop_tx.send(true);
    });

    info!(dir = %root.display(), provider = %cfg.classifier.provider, model = %cfg.classifier.model, "watching for new files");
    'outer: loop {
        let first = tokio::select! {
            _ = stop_rx.changed() => break,
            received = rx.recv() => match received {
                Some(ev) => ev,
                None => break,
            },
        };
        let mut batch = vec![first];
        while let Ok(ev) = rx.try_recv() {
            batch.push(ev);
        }
        let events = batch.into_iter().filter_map(|res| match res {
            Ok(ev) => Some(ev),
            Err(e) => {
                warn!(error = %e, "watch error");
                None
            }
        });

        for path in collect_arrivals(events, &root, cfg.watch.include_renames) {
            if *stop_rx.borrow() {
                break 'outer;
            }
            if organizer.should_ignore(&path) {
                debug!(path = %path.display(), "ignored");
                continue;
            }
            info!(file = %path.display(), "new file detected");
            let outcome = organizer.process_contained(FileEvent::new(path)).await;
            log_outcome(&outcome);
        }
    }

    drop(watcher);
    info!("stopped watching");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!(error = %e, "cannot listen for ctrl-c");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                error!(error = %e, "cannot listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
    info!("shutdown requested, finishing current file");
}
