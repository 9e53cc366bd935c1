//! PDF text source.
//!
//! Turns document bytes into the plain text the extractor consumes. This
//! runs before the pipeline; a failure here means no model call is made.

use std::panic;
use std::path::Path;
use thiserror::Error;
use tracing::debug;

const PDF_MAGIC: &[u8] = b"%PDF-";

/// Why a document could not be turned into text
#[derive(Debug, Error)]
pub enum DocumentReadError {
    /// The file could not be read
    #[error("Failed to read '{path}': {source}")]
    Io {
        /// File that was read
        path: String,
        /// Underlying error
        #[source]
        source: std::io::Error,
    },

    /// The bytes do not start with a PDF header
    #[error("Not a PDF document (missing %PDF- header)")]
    NotPdf,

    /// The PDF is password protected
    #[error("PDF is encrypted")]
    Encrypted,

    /// The PDF structure could not be parsed
    #[error("Corrupt PDF: {0}")]
    Corrupt(String),

    /// Parsed fine, but holds no text layer (e.g. a scan)
    #[error("PDF contains no extractable text; scanned documents need OCR first")]
    NoText,
}

/// Extract plain text from PDF bytes
pub fn extract_text(bytes: &[u8]) -> Result<String, DocumentReadError> {
    if !bytes.starts_with(PDF_MAGIC) {
        return Err(DocumentReadError::NotPdf);
    }
    let encrypted = is_encrypted(bytes);

    // The parser can panic on malformed input
    let outcome = panic::catch_unwind(|| pdf_extract::extract_text_from_mem(bytes));
    let text = match outcome {
        Ok(Ok(text)) => text,
        _ if encrypted => return Err(DocumentReadError::Encrypted),
        Ok(Err(e)) => return Err(DocumentReadError::Corrupt(e.to_string())),
        Err(_) => {
            return Err(DocumentReadError::Corrupt(
                "PDF parser aborted on malformed input".to_string(),
            ))
        }
    };

    if text.trim().is_empty() {
        return Err(if encrypted {
            DocumentReadError::Encrypted
        } else {
            DocumentReadError::NoText
        });
    }

    debug!(bytes = bytes.len(), chars = text.chars().count(), "PDF text extracted");
    Ok(text)
}

/// Read a PDF file and extract its text on the blocking pool
pub async fn read_document(path: &Path) -> Result<String, DocumentReadError> {
    let bytes = tokio::fs::read(path)
        .await
        .map_err(|source| DocumentReadError::Io {
            path: path.display().to_string(),
            source,
        })?;

    tokio::task::spawn_blocking(move || extract_text(&bytes))
        .await
        .map_err(|e| DocumentReadError::Corrupt(format!("PDF parser aborted: {}", e)))?
}

/// The trailer of an encrypted PDF references an /Encrypt dictionary
fn is_encrypted(bytes: &[u8]) -> bool {
    bytes.windows(b"/Encrypt".len()).any(|w| w == b"/Encrypt")
}
