//! Plain-text extraction from uploaded resume files.
//!
//! Two formats are accepted: PDF (paginated) and DOCX (flow text in a ZIP
//! of WordprocessingML). Extraction never fails outward: a file that cannot
//! be parsed yields an empty string and a warning in the log.

use std::any::Any;
use std::io::{Cursor, Read};
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::path::Path;

use lopdf::Document as PdfDocument;
use regex_lite::{Captures, Regex};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::ExtractionError;

/// Supported upload formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DocumentKind {
    /// Portable Document Format.
    Pdf,
    /// Office Open XML word-processing document.
    Docx,
}

impl DocumentKind {
    /// Every supported kind.
    pub const ALL: [DocumentKind; 2] = [DocumentKind::Pdf, DocumentKind::Docx];

    /// Match a file extension (without the dot), case-insensitively.
    pub fn from_extension(extension: &str) -> Option<Self> {
        match extension.to_ascii_lowercase().as_str() {
            "pdf" => Some(Self::Pdf),
            "docx" => Some(Self::Docx),
            _ => None,
        }
    }

    /// Kind of a file judged by the text after its last dot.
    pub fn from_filename(filename: &str) -> Option<Self> {
        let (_, extension) = filename.rsplit_once('.')?;
        Self::from_extension(extension)
    }

    /// Canonical extension.
    pub fn extension(self) -> &'static str {
        match self {
            Self::Pdf => "pdf",
            Self::Docx => "docx",
        }
    }
}

/// Extract raw text from file contents of the declared kind.
///
/// Returns an empty string when the file cannot be parsed, including when
/// the parser panics on malformed input.
pub fn extract_text(bytes: &[u8], kind: DocumentKind) -> String {
    let result = catch_unwind(AssertUnwindSafe(|| match kind {
        DocumentKind::Pdf => extract_pdf(bytes),
        DocumentKind::Docx => extract_docx(bytes),
    }))
    .unwrap_or_else(|payload| Err(ExtractionError::Panicked(panic_message(payload.as_ref()))));

    match result {
        Ok(text) => {
            debug!("Extracted {} characters from {kind:?}", text.len());
            text
        }
        Err(e) => {
            warn!("Failed to extract text from {kind:?} ({} bytes): {e}", bytes.len());
            String::new()
        }
    }
}

/// Read a file from disk and extract its text, picking the format from the
/// extension. Unreadable files and unsupported extensions yield an empty
/// string.
pub async fn extract_file(path: &Path) -> String {
    let Some(kind) = path
        .extension()
        .and_then(|ext| ext.to_str())
        .and_then(DocumentKind::from_extension)
    else {
        warn!("Unsupported file type: {}", path.display());
        return String::new();
    };

    match tokio::fs::read(path).await {
        Ok(bytes) => extract_text(&bytes, kind),
        Err(e) => {
            warn!("Failed to read {}: {e}", path.display());
            String::new()
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic".to_string()
    }
}

fn extract_pdf(bytes: &[u8]) -> Result<String, ExtractionError> {
    let doc = PdfDocument::load_mem(bytes)?;

    let mut pages = Vec::new();
    for page_number in doc.get_pages().into_keys() {
        match doc.extract_text(&[page_number]) {
            Ok(text) => pages.push(text),
            Err(e) => debug!("Skipping unreadable PDF page {page_number}: {e}"),
        }
    }

    Ok(pages.join("\n"))
}

fn extract_docx(bytes: &[u8]) -> Result<String, ExtractionError> {
    let mut archive = zip::ZipArchive::new(Cursor::new(bytes))?;
    let mut xml = String::new();
    archive.by_name("word/document.xml")?.read_to_string(&mut xml)?;

    docx_body_text(&xml)
}

/// Flatten a WordprocessingML body into text, one line per paragraph.
fn docx_body_text(xml: &str) -> Result<String, ExtractionError> {
    let runs = Regex::new(r"<w:t(?:\s[^>]*)?>([^<]*)</w:t>|<w:(tab|br|cr)\s*/>")
        .map_err(|e| ExtractionError::Markup(e.to_string()))?;

    let paragraphs: Vec<String> = xml
        .split("</w:p>")
        .map(|paragraph| {
            let mut text = String::new();
            for caps in runs.captures_iter(paragraph) {
                if let Some(run) = caps.get(1) {
                    text.push_str(&unescape_xml(run.as_str()));
                } else if caps.get(2).is_some_and(|m| m.as_str() == "tab") {
                    text.push('\t');
                } else {
                    text.push('\n');
                }
            }
            text
        })
        .collect();

    // The segment after the last `</w:p>` is document trailer, not a paragraph.
    let body = match paragraphs.split_last() {
        Some((trailer, rest)) if trailer.is_empty() => rest,
        _ => &paragraphs[..],
    };

    Ok(body.join("\n"))
}

fn unescape_xml(text: &str) -> String {
    if !text.contains('&') {
        return text.to_string();
    }

    let numeric = match Regex::new(r"&#(x?)([0-9A-Fa-f]+);") {
        Ok(re) => re,
        Err(_) => return text.to_string(),
    };
    let decoded = numeric.replace_all(text, |caps: &Captures<'_>| {
        let radix = if caps[1].is_empty() { 10 } else { 16 };
        u32::from_str_radix(&caps[2], radix)
            .ok()
            .and_then(char::from_u32)
            .map_or_else(|| caps[0].to_string(), String::from)
    });

    decoded
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&apos;", "'")
        .replace("&amp;", "&")
}
