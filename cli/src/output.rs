//! Plain-text rendering for the terminal.

use std::fmt::Write as _;

use chrono::{DateTime, Utc};
use serde::Serialize;

use resume_documents::{Candidate, Document};
use resume_ranking::SearchReport;

/// Longest text preview shown by `show`.
const PREVIEW_CHARS: usize = 2000;

/// A stored resume without its text or vector, for `list --json`.
#[derive(Debug, Serialize)]
pub struct Listing<'a> {
    pub id: &'a str,
    pub filename: &'a str,
    pub candidate: &'a Candidate,
    pub uploaded_at: DateTime<Utc>,
    pub characters: usize,
    pub has_embedding: bool,
}

impl<'a> From<&'a Document> for Listing<'a> {
    fn from(document: &'a Document) -> Self {
        Self {
            id: &document.id,
            filename: &document.filename,
            candidate: &document.candidate,
            uploaded_at: document.uploaded_at,
            characters: document.text_content.chars().count(),
            has_embedding: document.has_embedding(),
        }
    }
}

pub fn ingested(document: &Document) -> String {
    let vector = if document.has_embedding() {
        "embedded"
    } else {
        "not embedded yet"
    };
    format!(
        "Stored {} as {} ({} characters, {vector})",
        document.filename,
        document.id,
        document.text_content.chars().count()
    )
}

pub fn search_report(report: &SearchReport) -> String {
    if report.hits.is_empty() {
        return "No resumes stored yet.\n".to_string();
    }

    let mut out = String::new();
    for (rank, hit) in report.hits.iter().enumerate() {
        let _ = writeln!(
            out,
            "{:>3}. {:>6.3}  {}{}  [{}]",
            rank + 1,
            hit.score,
            hit.filename,
            candidate_suffix(&hit.candidate),
            hit.id
        );
    }
    let _ = writeln!(
        out,
        "{} of {} resumes shown",
        report.hits.len(),
        report.total_documents
    );
    out
}

pub fn document_list(documents: &[Document]) -> String {
    if documents.is_empty() {
        return "No resumes stored yet.\n".to_string();
    }

    let mut out = String::new();
    for document in documents {
        let marker = if document.has_embedding() { "*" } else { " " };
        let _ = writeln!(
            out,
            "{marker} {}  {}  {}{}",
            document.id,
            document.uploaded_at.format("%Y-%m-%d %H:%M"),
            document.filename,
            candidate_suffix(&document.candidate)
        );
    }
    out
}

pub fn document_detail(document: &Document) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "id:        {}", document.id);
    let _ = writeln!(out, "file:      {}", document.filename);
    if let Some(name) = &document.candidate.name {
        let _ = writeln!(out, "name:      {name}");
    }
    if let Some(email) = &document.candidate.email {
        let _ = writeln!(out, "email:     {email}");
    }
    let _ = writeln!(
        out,
        "uploaded:  {}",
        document.uploaded_at.format("%Y-%m-%d %H:%M:%S UTC")
    );
    let _ = writeln!(out, "embedded:  {}", document.has_embedding());
    let _ = writeln!(out);

    let preview: String = document.text_content.chars().take(PREVIEW_CHARS).collect();
    out.push_str(&preview);
    if document.text_content.chars().count() > PREVIEW_CHARS {
        out.push_str(" ...");
    }
    out.push('\n');
    out
}

fn candidate_suffix(candidate: &Candidate) -> String {
    match (&candidate.name, &candidate.email) {
        (Some(name), Some(email)) => format!("  {name} <{email}>"),
        (Some(name), None) => format!("  {name}"),
        (None, Some(email)) => format!("  <{email}>"),
        (None, None) => String::new(),
    }
}
