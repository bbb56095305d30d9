//! Moves a classified file into `<root>/<category>/`.
//!
//! The source is only removed once the file is confirmed at its destination. Unless the
//! policy is `overwrite`, a destination name is claimed with a hard link, which fails if the
//! name is taken, so a file that appears between the check and the move is never replaced.
//! Cross-volume moves copy to a temporary sibling, verify it, and claim the name from there.

use crate::category::Category;
use crate::config::ConflictPolicy;
use crate::models::MoveOutcome;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, warn};

#[derive(Debug, Error)]
pub enum DispatchError {
    #[error("{op} {path}: {source}")]
    Io {
        op: &'static str,
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("copy of {0} did not match the source")]
    VerifyMismatch(PathBuf),
    #[error("{0} already exists")]
    Taken(PathBuf),
    #[error("remove {path}: {source}; copy at {copy} could not be removed either: {cleanup}")]
    Duplicated {
        path: PathBuf,
        #[source]
        source: io::Error,
        copy: PathBuf,
        cleanup: io::Error,
    },
}

fn io_err(op: &'static str, path: &Path) -> impl FnOnce(io::Error) -> DispatchError {
    let path = path.to_path_buf();
    move |source| DispatchError::Io { op, path, source }
}

#[derive(Debug, Clone)]
pub struct FileDispatcher {
    root: PathBuf,
    policy: ConflictPolicy,
}

impl FileDispatcher {
    pub fn new(root: impl Into<PathBuf>, policy: ConflictPolicy) -> Self {
        Self {
            root: root.into(),
            policy,
        }
    }

    pub fn destination_dir(&self, category: &Category) -> PathBuf {
        self.root.join(category.as_str())
    }

    pub fn dispatch(&self, source: &Path, category: &Category) -> MoveOutcome {
        let src = source.to_path_buf();
        match fs::symlink_metadata(source) {
            Ok(meta) if meta.is_dir() => {
                return MoveOutcome::skipped(src, "directories are not sorted")
            }
            Ok(_) => {}
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                return MoveOutcome::skipped(src, "source no longer exists")
            }
            Err(e) => return MoveOutcome::failed(src, None, io_err("stat", source)(e).to_string()),
        }
        let Some(file_name) = source.file_name() else {
            return MoveOutcome::failed(src, None, "source has no file name");
        };

        let dir = self.destination_dir(category);
        if let Err(e) = ensure_dir(&dir) {
            warn!(dir = %dir.display(), error = %e, "cannot create category folder");
            return MoveOutcome::failed(src, Some(dir), e.to_string());
        }

        let wanted = dir.join(file_name);
        let placed = match self.policy {
            ConflictPolicy::Overwrite => {
                let conflict = wanted.exists();
                replace_file(source, &wanted).map(|()| (wanted.clone(), conflict))
            }
            ConflictPolicy::Rename | ConflictPolicy::Skip => self.place_new(source, &wanted),
        };

        match placed {
            Ok((target, conflict)) => MoveOutcome::moved(src, target, conflict),
            Err(DispatchError::Taken(taken)) => {
                let mut outcome =
                    MoveOutcome::skipped(src, format!("{} already exists", taken.display()));
                outcome.destination = Some(taken);
                outcome.conflict = true;
                outcome
            }
            Err(e) => {
                let conflict = wanted.exists();
                let mut outcome = MoveOutcome::failed(src, Some(wanted), e.to_string());
                outcome.conflict = conflict;
                outcome
            }
        }
    }

    /// Moves `source` under `wanted` (or the first free `stem_N.ext` for `rename`) without
    /// ever replacing an existing file. Returns the final path and whether `wanted` was taken.
    fn place_new(&self, source: &Path, wanted: &Path) -> Result<(PathBuf, bool), DispatchError> {
        let mut staging: Option<PathBuf> = None;
        let mut target = wanted.to_path_buf();
        let mut conflict = false;

        let linked = loop {
            let from = staging.as_deref().unwrap_or(source);
            match claim_name(from, &target) {
                Ok(linked) => break linked,
                Err(e) if e.kind() == io::ErrorKind::AlreadyExists => {
                    if self.policy == ConflictPolicy::Skip {
                        discard_staging(staging.as_deref());
                        return Err(DispatchError::Taken(target));
                    }
                    conflict = true;
                    target = resolve_conflict(wanted);
                }
                Err(e) if staging.is_none() && is_cross_device(&e) => {
                    debug!(from = %source.display(), to = %target.display(), "cross-volume move, copying");
                    staging = Some(stage_copy(source, &target)?);
                }
                Err(e) => {
                    discard_staging(staging.as_deref());
                    return Err(io_err("link", from)(e));
                }
            }
        };

        match staging {
            None if linked => release_source(source, &target)?,
            None => {}
            Some(staged) => {
                if linked {
                    if let Err(e) = fs::remove_file(&staged) {
                        warn!(path = %staged.display(), error = %e, "cannot remove staging copy");
                    }
                }
                release_source(source, &target)?;
            }
        }
        Ok((target, conflict))
    }
}

/// Creates the folder and any missing parents. An existing folder is success.
pub fn ensure_dir(dir: &Path) -> Result<(), DispatchError> {
    fs::create_dir_all(dir).map_err(io_err("create_dir", dir))
}

/// First free `stem_N.ext` next to `dest`.
pub fn resolve_conflict(dest: &Path) -> PathBuf {
    let parent = dest.parent().unwrap_or_else(|| Path::new("."));
    let stem = dest
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "file".to_string());
    let ext = dest
        .extension()
        .map(|e| e.to_string_lossy().into_owned())
        .unwrap_or_default();
    let mut counter = 1;
    loop {
        let name = if ext.is_empty() {
            format!("{}_{}", stem, counter)
        } else {
            format!("{}_{}.{}", stem, counter, ext)
        };
        let candidate = parent.join(name);
        if !candidate.exists() {
            return candidate;
        }
        counter += 1;
    }
}

/// Gives `from` the additional name `to`, failing with `AlreadyExists` if `to` is taken.
///
/// Returns `true` when a hard link was made (the caller still owns `from`), `false` when the
/// filesystem has no hard links and `from` was renamed instead.
fn claim_name(from: &Path, to: &Path) -> io::Result<bool> {
    match fs::hard_link(from, to) {
        Ok(()) => Ok(true),
        Err(e) if e.kind() == io::ErrorKind::AlreadyExists || is_cross_device(&e) => Err(e),
        Err(e) => {
            debug!(error = %e, "hard link unavailable, renaming");
            if to.exists() {
                return Err(io::ErrorKind::AlreadyExists.into());
            }
            fs::rename(from, to).map(|()| false)
        }
    }
}

fn replace_file(from: &Path, to: &Path) -> Result<(), DispatchError> {
    match fs::rename(from, to) {
        Ok(()) => Ok(()),
        Err(e) if is_cross_device(&e) => {
            debug!(from = %from.display(), to = %to.display(), "cross-volume move, copying");
            let staged = stage_copy(from, to)?;
            if let Err(e) = fs::rename(&staged, to) {
                discard_staging(Some(&staged));
                return Err(io_err("rename", &staged)(e));
            }
            release_source(from, to)
        }
        Err(e) => Err(io_err("rename", from)(e)),
    }
}

/// Copies `from` to a hidden sibling of `to` and checks length and BLAKE3 digest.
fn stage_copy(from: &Path, to: &Path) -> Result<PathBuf, DispatchError> {
    let file_name = to
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    let staging = to.with_file_name(format!(".{}.sorting", file_name));

    let verified = fs::copy(from, &staging)
        .map_err(io_err("copy", from))
        .and_then(|_| {
            if digest(from)? == digest(&staging)? {
                Ok(())
            } else {
                Err(DispatchError::VerifyMismatch(from.to_path_buf()))
            }
        });
    match verified {
        Ok(()) => Ok(staging),
        Err(e) => {
            discard_staging(Some(&staging));
            Err(e)
        }
    }
}

fn discard_staging(staging: Option<&Path>) {
    if let Some(path) = staging {
        if let Err(e) = fs::remove_file(path) {
            if e.kind() != io::ErrorKind::NotFound {
                warn!(path = %path.display(), error = %e, "cannot remove staging copy");
            }
        }
    }
}

/// Removes the source once `placed` holds the file. On failure the placed copy goes instead,
/// so exactly one copy remains; if that fails too both paths are named in the error.
fn release_source(source: &Path, placed: &Path) -> Result<(), DispatchError> {
    let Err(e) = fs::remove_file(source) else {
        return Ok(());
    };
    match fs::remove_file(placed) {
        Ok(()) => Err(io_err("remove", source)(e)),
        Err(cleanup) => {
            warn!(
                source = %source.display(),
                copy = %placed.display(),
                error = %cleanup,
                "cannot remove copy after failed move, file now exists twice"
            );
            Err(DispatchError::Duplicated {
                path: source.to_path_buf(),
                source: e,
                copy: placed.to_path_buf(),
                cleanup,
            })
        }
    }
}

fn digest(path: &Path) -> Result<(u64, blake3::Hash), DispatchError> {
    let mut file = fs::File::open(path).map_err(io_err("open", path))?;
    let mut hasher = blake3::Hasher::new();
    let len = io::copy(&mut file, &mut hasher).map_err(io_err("read", path))?;
    Ok((len, hasher.finalize()))
}

#[cfg(unix)]
fn is_cross_device(e: &io::Error) -> bool {
    // EXDEV
    e.raw_os_error() == Some(18)
}

#[cfg(windows)]
fn is_cross_device(e: &io::Error) -> bool {
    // ERROR_NOT_SAME_DEVICE
    e.raw_os_error() == Some(17)
}

#[cfg(not(any(unix, windows)))]
fn is_cross_device(_e: &io::Error) -> bool {
    false
}
