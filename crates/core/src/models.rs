use serde::Serialize;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum FileKind {
    Pdf,
    Image,
    Other,
}

pub const IMAGE_EXTENSIONS: &[&str] = &["png", "jpg", "jpeg", "tiff", "bmp", "gif"];

impl FileKind {
    /// Detects the kind from the extension, case-insensitively.
    pub fn detect(path: &Path) -> Self {
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_lowercase())
            .unwrap_or_default();
        if ext == "pdf" {
            FileKind::Pdf
        } else if IMAGE_EXTENSIONS.contains(&ext.as_str()) {
            FileKind::Image
        } else {
            FileKind::Other
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileEvent {
    pub path: PathBuf,
    pub kind: FileKind,
}

impl FileEvent {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let kind = FileKind::detect(&path);
        Self { path, kind }
    }

    pub fn file_name(&self) -> String {
        self.path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExtractionResult {
    pub text: String,
    pub succeeded: bool,
}

impl ExtractionResult {
    pub fn ok(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            succeeded: true,
        }
    }

    pub fn failed() -> Self {
        Self {
            text: String::new(),
            succeeded: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum MoveStatus {
    Moved,
    Skipped { reason: String },
    Failed { error: String },
}

/// Terminal result of one event. Exactly one is produced per processed event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MoveOutcome {
    pub source: PathBuf,
    pub destination: Option<PathBuf>,
    #[serde(flatten)]
    pub status: MoveStatus,
    pub conflict: bool,
}

impl MoveOutcome {
    pub fn moved(source: PathBuf, destination: PathBuf, conflict: bool) -> Self {
        Self {
            source,
            destination: Some(destination),
            status: MoveStatus::Moved,
            conflict,
        }
    }

    pub fn skipped(source: PathBuf, reason: impl Into<String>) -> Self {
        Self {
            source,
            destination: None,
            status: MoveStatus::Skipped {
                reason: reason.into(),
            },
            conflict: false,
        }
    }

    pub fn failed(source: PathBuf, destination: Option<PathBuf>, error: impl Into<String>) -> Self {
        Self {
            source,
            destination,
            status: MoveStatus::Failed {
                error: error.into(),
            },
            conflict: false,
        }
    }

    pub fn is_moved(&self) -> bool {
        matches!(self.status, MoveStatus::Moved)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kind_detection_ignores_case() {
        assert_eq!(FileKind::detect(Path::new("/in/Scan.PDF")), FileKind::Pdf);
        assert_eq!(FileKind::detect(Path::new("/in/shot.JPeG")), FileKind::Image);
        assert_eq!(FileKind::detect(Path::new("/in/a.tiff")), FileKind::Image);
        assert_eq!(FileKind::detect(Path::new("/in/random123.xyz")), FileKind::Other);
        assert_eq!(FileKind::detect(Path::new("/in/Makefile")), FileKind::Other);
    }

    #[test]
    fn outcome_serializes_status_inline() {
        let outcome = MoveOutcome::skipped(PathBuf::from("/in/a.txt"), "vanished");
        let json = serde_json::to_value(&outcome).unwrap();
        assert_eq!(json["status"], "skipped");
        assert_eq!(json["reason"], "vanished");
        assert_eq!(json["conflict"], false);
    }
}
