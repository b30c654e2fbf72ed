//! PDF text extraction

use std::sync::mpsc;
use std::thread;
use std::time::Duration;

use crate::error::{Error, Result};
use crate::types::{FileType, SourceDocument};

/// How long the pdf-extract fallback may run on one document
const FALLBACK_TIMEOUT: Duration = Duration::from_secs(60);

/// Replace ligatures, non-breaking spaces and NULs that PDF fonts commonly emit
fn cleanup_pdf_text(text: &str) -> String {
    text.replace('\0', "")
        .replace('\u{00A0}', " ")
        .replace('\u{FB00}', "ff")
        .replace('\u{FB01}', "fi")
        .replace('\u{FB02}', "fl")
        .replace('\u{FB03}', "ffi")
        .replace('\u{FB04}', "ffl")
}

/// Text extracted from one document
#[derive(Debug, Clone)]
pub struct ExtractedDocument {
    /// Filename as uploaded
    pub filename: String,
    /// SHA-256 of the file bytes
    pub content_hash: String,
    /// Total pages in the file
    pub total_pages: usize,
    /// Pages that produced any text
    pub pages_with_text: usize,
    /// Concatenated page text
    pub text: String,
}

/// Text extracted from a whole submission
#[derive(Debug, Clone, Default)]
pub struct ExtractedText {
    /// Per-document results, in upload order
    pub documents: Vec<ExtractedDocument>,
    /// All document text concatenated in upload order
    pub text: String,
}

impl ExtractedText {
    pub fn pages_with_text(&self) -> usize {
        self.documents.iter().map(|d| d.pages_with_text).sum()
    }

    pub fn char_count(&self) -> usize {
        self.text.chars().count()
    }
}

/// Reads every page of every uploaded PDF
pub struct TextExtractor;

impl TextExtractor {
    /// Extract and concatenate the text of all documents
    ///
    /// Fails on the first file that cannot be decoded, naming it.
    pub fn extract_all(documents: &[SourceDocument]) -> Result<ExtractedText> {
        let mut extracted = ExtractedText::default();

        for document in documents {
            let doc = Self::extract(document)?;
            extracted.text.push_str(&doc.text);
            extracted.documents.push(doc);
        }

        Ok(extracted)
    }

    /// Extract the text of one document, page by page
    pub fn extract(document: &SourceDocument) -> Result<ExtractedDocument> {
        match document.file_type() {
            FileType::Pdf => {}
            other => {
                return Err(Error::UnsupportedFile(format!(
                    "{} ({}); only PDF files can be processed",
                    document.filename,
                    other.display_name()
                )))
            }
        }

        let pdf = lopdf::Document::load_mem(&document.data)
            .map_err(|e| Error::file_read(&document.filename, e.to_string()))?;

        let pages = pdf.get_pages();
        let mut text = String::new();
        let mut pages_with_text = 0usize;

        for page_number in pages.keys() {
            match pdf.extract_text(&[*page_number]) {
                Ok(page_text) => {
                    let page_text = cleanup_pdf_text(&page_text);
                    if page_text.trim().is_empty() {
                        tracing::debug!("{}: page {} has no text", document.filename, page_number);
                        continue;
                    }
                    pages_with_text += 1;
                    text.push_str(&page_text);
                }
                Err(e) => {
                    tracing::debug!(
                        "{}: could not extract page {}: {}",
                        document.filename,
                        page_number,
                        e
                    );
                }
            }
        }

        if text.trim().is_empty() && !pages.is_empty() {
            tracing::warn!(
                "{}: no text from page extraction, trying pdf-extract",
                document.filename
            );
            if let Some(fallback) = Self::extract_with_fallback(document) {
                let fallback = cleanup_pdf_text(&fallback);
                if !fallback.trim().is_empty() {
                    pages_with_text = pages.len();
                    text = fallback;
                }
            }
        }

        if text.trim().is_empty() {
            tracing::warn!(
                "{}: no extractable text (image-based or empty PDF)",
                document.filename
            );
        }

        Ok(ExtractedDocument {
            filename: document.filename.clone(),
            content_hash: document.content_hash(),
            total_pages: pages.len(),
            pages_with_text,
            text,
        })
    }

    /// Whole-document extraction with pdf-extract, bounded by a timeout
    fn extract_with_fallback(document: &SourceDocument) -> Option<String> {
        let data = document.data.clone();
        let (tx, rx) = mpsc::channel();

        thread::spawn(move || {
            let _ = tx.send(pdf_extract::extract_text_from_mem(&data));
        });

        match rx.recv_timeout(FALLBACK_TIMEOUT) {
            Ok(Ok(text)) => Some(text),
            Ok(Err(e)) => {
                tracing::warn!("{}: pdf-extract failed: {}", document.filename, e);
                None
            }
            Err(mpsc::RecvTimeoutError::Timeout) => {
                tracing::error!(
                    "{}: pdf-extract timed out after {:?}",
                    document.filename,
                    FALLBACK_TIMEOUT
                );
                None
            }
            Err(mpsc::RecvTimeoutError::Disconnected) => {
                tracing::error!("{}: pdf-extract thread crashed", document.filename);
                None
            }
        }
    }
}
