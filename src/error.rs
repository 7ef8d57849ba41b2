//! Pipeline error taxonomy.
//!
//! Only infrastructure and format failures are errors. Business outcomes
//! (insufficient quality, identity mismatch, duplicates) are ordinary
//! variants of [`AnalysisResult`](crate::models::AnalysisResult) so the
//! caller can render them as actionable states instead of crash paths.

/// Fatal analysis error (no retry at this layer; the pipeline aborts).
#[derive(Debug)]
pub enum AnalysisError {
    /// Input bytes are not a parseable PDF or supported image.
    InvalidDocumentFormat(String),
    /// Every chunk failed OCR, so there is no text to work with.
    ExtractionFailed(String),
    /// The text-completion call itself failed (transport or timeout).
    /// An unparseable but delivered response is NOT this error; it
    /// degrades to an empty field map handled by the quality gate.
    CompletionFailed(String),
    /// The document store could not be queried for duplicates.
    StoreUnavailable(String),
}

impl std::fmt::Display for AnalysisError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AnalysisError::InvalidDocumentFormat(e) => {
                write!(f, "invalid document format: {}", e)
            }
            AnalysisError::ExtractionFailed(e) => write!(f, "text extraction failed: {}", e),
            AnalysisError::CompletionFailed(e) => write!(f, "field extraction call failed: {}", e),
            AnalysisError::StoreUnavailable(e) => write!(f, "document store query failed: {}", e),
        }
    }
}

impl std::error::Error for AnalysisError {}
