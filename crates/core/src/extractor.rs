//! Best-effort text extraction. Failures never escape: they degrade to empty text.

use crate::models::{ExtractionResult, FileKind};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Extracts text according to the extension-derived kind of `path`.
pub fn extract(path: &Path) -> ExtractionResult {
    extract_kind(path, FileKind::detect(path))
}

pub fn extract_kind(path: &Path, kind: FileKind) -> ExtractionResult {
    let attempt = match kind {
        FileKind::Pdf => pdf_text(path),
        FileKind::Image => ocr_text(path),
        FileKind::Other => return ExtractionResult::ok(""),
    };
    match attempt {
        Ok(text) => {
            debug!(path = %path.display(), chars = text.chars().count(), "extracted text");
            ExtractionResult::ok(text)
        }
        Err(e) => {
            warn!(path = %path.display(), error = %e, "text extraction failed");
            ExtractionResult::failed()
        }
    }
}

/// Runs [`extract_kind`] on the blocking pool. A panicking backend counts as a failed extraction.
pub async fn extract_in_background(path: PathBuf, kind: FileKind) -> ExtractionResult {
    let shown = path.display().to_string();
    match tokio::task::spawn_blocking(move || extract_kind(&path, kind)).await {
        Ok(result) => result,
        Err(e) => {
            warn!(path = %shown, error = %e, "extraction task aborted");
            ExtractionResult::failed()
        }
    }
}

#[cfg(feature = "pdf")]
fn pdf_text(path: &Path) -> anyhow::Result<String> {
    let doc = lopdf::Document::load(path)?;
    let mut text = String::new();
    for page in doc.get_pages().keys() {
        match doc.extract_text(&[*page]) {
            Ok(page_text) => text.push_str(&page_text),
            Err(e) => debug!(page, error = %e, "page has no extractable text"),
        }
    }
    Ok(text)
}

#[cfg(not(feature = "pdf"))]
fn pdf_text(path: &Path) -> anyhow::Result<String> {
    debug!(path = %path.display(), "pdf support not compiled in");
    Ok(String::new())
}

#[cfg(feature = "ocr")]
fn ocr_text(path: &Path) -> anyhow::Result<String> {
    let img = image::open(path)?;
    let mut png = std::io::Cursor::new(Vec::new());
    img.write_to(&mut png, image::ImageOutputFormat::Png)?;
    let mut tess = leptess::LepTess::new(None, "eng")
        .map_err(|e| anyhow::anyhow!("tesseract init: {:?}", e))?;
    tess.set_image_from_mem(png.get_ref())
        .map_err(|e| anyhow::anyhow!("tesseract image: {:?}", e))?;
    tess.get_utf8_text()
        .map_err(|e| anyhow::anyhow!("tesseract text: {:?}", e))
}

#[cfg(not(feature = "ocr"))]
fn ocr_text(path: &Path) -> anyhow::Result<String> {
    debug!(path = %path.display(), "ocr support not compiled in");
    Ok(String::new())
}
