//! Best-effort wait for a freshly created file to stop changing before it is read.

use crate::config::SettleConfig;
use std::path::Path;
use std::time::SystemTime;
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Settled {
    /// Size and mtime stopped changing (or the stability check is disabled).
    Stable,
    /// Still changing when the poll budget ran out; processing continues anyway.
    Unsettled,
    Vanished,
}

async fn snapshot(path: &Path) -> Option<(u64, Option<SystemTime>)> {
    let meta = tokio::fs::metadata(path).await.ok()?;
    Some((meta.len(), meta.modified().ok()))
}

pub async fn wait_until_settled(path: &Path, cfg: &SettleConfig) -> Settled {
    tokio::time::sleep(cfg.delay()).await;

    let Some(mut last) = snapshot(path).await else {
        return Settled::Vanished;
    };
    for poll in 0..cfg.max_polls {
        tokio::time::sleep(cfg.poll_interval()).await;
        let Some(now) = snapshot(path).await else {
            return Settled::Vanished;
        };
        if now == last {
            debug!(path = %path.display(), polls = poll + 1, "file settled");
            return Settled::Stable;
        }
        last = now;
    }
    if cfg.max_polls == 0 {
        Settled::Stable
    } else {
        Settled::Unsettled
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn quick() -> SettleConfig {
        SettleConfig {
            delay_ms: 0,
            poll_interval_ms: 10,
            max_polls: 3,
        }
    }

    #[tokio::test]
    async fn unchanged_file_is_stable() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("done.pdf");
        std::fs::write(&path, "complete").unwrap();
        assert_eq!(wait_until_settled(&path, &quick()).await, Settled::Stable);
    }

    #[tokio::test]
    async fn missing_file_has_vanished() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("gone.pdf");
        assert_eq!(wait_until_settled(&path, &quick()).await, Settled::Vanished);
    }

    #[tokio::test]
    async fn disabled_check_only_waits() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("a.txt");
        std::fs::write(&path, "a").unwrap();
        let cfg = SettleConfig {
            delay_ms: 0,
            poll_interval_ms: 10,
            max_polls: 0,
        };
        assert_eq!(wait_until_settled(&path, &cfg).await, Settled::Stable);
    }
}
