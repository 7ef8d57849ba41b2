//! Core data models used throughout the analysis pipeline.
//!
//! Everything here lives and dies inside a single `analyze()` invocation;
//! the only durable storage is the external document store consulted
//! read-only by duplicate detection.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::kind::DocumentKind;

/// A contiguous 1-based inclusive page range.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageRange {
    pub start: u32,
    pub end: u32,
}

impl PageRange {
    pub fn new(start: u32, end: u32) -> Self {
        Self { start, end }
    }

    pub fn len(&self) -> u32 {
        self.end.saturating_sub(self.start) + 1
    }

    pub fn is_empty(&self) -> bool {
        self.end < self.start
    }
}

impl std::fmt::Display for PageRange {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}-{}", self.start, self.end)
    }
}

/// A bounded page-range slice of the source document, OCR'd independently.
///
/// Chunks are produced once by the planner and never re-split. For a PDF
/// each chunk's `bytes` is a standalone PDF containing only its pages; for
/// an image there is exactly one chunk wrapping the whole payload.
#[derive(Debug, Clone)]
pub struct Chunk {
    pub index: usize,
    pub pages: PageRange,
    pub bytes: Vec<u8>,
}

/// A named entity surfaced by the OCR service.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Entity {
    pub entity_type: String,
    pub mention_text: String,
    /// OCR confidence in `[0, 1]`.
    pub confidence: f64,
}

/// Raw output of one OCR call, before pipeline bookkeeping.
#[derive(Debug, Clone, Default)]
pub struct OcrOutput {
    pub text: String,
    pub entities: Vec<Entity>,
}

/// Result of running OCR over one chunk. A failed chunk is recorded, not
/// dropped: the merge step filters on `success` and the orchestrator
/// checks that at least one chunk succeeded.
#[derive(Debug, Clone)]
pub struct ChunkAnalysis {
    pub chunk_index: usize,
    pub pages: PageRange,
    pub raw_text: String,
    pub entities: Vec<Entity>,
    pub success: bool,
    pub error: Option<String>,
}

impl ChunkAnalysis {
    pub fn succeeded(chunk_index: usize, pages: PageRange, output: OcrOutput) -> Self {
        Self {
            chunk_index,
            pages,
            raw_text: output.text,
            entities: output.entities,
            success: true,
            error: None,
        }
    }

    pub fn failed(chunk_index: usize, pages: PageRange, error: String) -> Self {
        Self {
            chunk_index,
            pages,
            raw_text: String::new(),
            entities: Vec::new(),
            success: false,
            error: Some(error),
        }
    }
}

/// Header/footer band text from the targeted first-page scan.
#[derive(Debug, Clone, Default)]
pub struct RegionScan {
    pub header_text: String,
    pub footer_text: String,
}

impl RegionScan {
    pub fn is_empty(&self) -> bool {
        self.header_text.trim().is_empty() && self.footer_text.trim().is_empty()
    }
}

/// The merged view of all successful chunk analyses.
///
/// `field_candidates` keeps every chunk's guess per coarse metadata field
/// (keyed by lowercased entity type, in chunk order) so later stages can
/// fall back to "first non-empty chunk wins" when the model leaves a
/// field blank.
#[derive(Debug, Clone, Default)]
pub struct MergedSummary {
    pub formatted_text: String,
    pub raw_text: String,
    pub field_candidates: BTreeMap<String, Vec<String>>,
}

impl MergedSummary {
    /// First non-empty candidate for a field, by chunk order. Later
    /// chunks never override an earlier candidate.
    pub fn first_candidate(&self, field: &str) -> Option<&str> {
        self.field_candidates
            .get(field)?
            .iter()
            .map(|s| s.trim())
            .find(|s| !s.is_empty())
    }
}

/// The document-kind-specific field map produced by field extraction.
///
/// Keys are exactly the kind profile's declared fields; a `None` value
/// means the document (or the model) did not yield that field. All date
/// values are ISO `YYYY-MM-DD`; `ship_imo` is a bare 7-digit string.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExtractedFields {
    pub kind: DocumentKind,
    pub values: BTreeMap<String, Option<String>>,
    /// Model-reported overall confidence in `[0, 1]`; 0.0 when the
    /// response could not be parsed.
    pub confidence_score: f64,
}

impl ExtractedFields {
    /// An all-empty field map for a kind (the unparseable-response case).
    pub fn empty(kind: DocumentKind) -> Self {
        let values = kind
            .profile()
            .fields
            .iter()
            .map(|f| (f.to_string(), None))
            .collect();
        Self {
            kind,
            values,
            confidence_score: 0.0,
        }
    }

    /// Non-empty value for a field, if any.
    pub fn get(&self, field: &str) -> Option<&str> {
        self.values
            .get(field)
            .and_then(|v| v.as_deref())
            .map(str::trim)
            .filter(|s| !s.is_empty())
    }

    /// Set a field; blank strings are stored as `None`.
    pub fn set(&mut self, field: &str, value: Option<String>) {
        let cleaned = value.map(|v| v.trim().to_string()).filter(|v| !v.is_empty());
        self.values.insert(field.to_string(), cleaned);
    }

    /// The kind's display-name field (e.g. `cert_name`).
    pub fn document_name(&self) -> Option<&str> {
        self.get(self.kind.profile().name_field)
    }

    /// The kind's serial-number field (e.g. `cert_no`).
    pub fn document_no(&self) -> Option<&str> {
        self.get(self.kind.profile().no_field)
    }

    pub fn ship_name(&self) -> Option<&str> {
        self.get("ship_name")
    }

    pub fn ship_imo(&self) -> Option<&str> {
        self.get("ship_imo")
    }
}

/// Output of the quality gate.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QualityVerdict {
    /// True only when every critical field is present AND the confidence
    /// and overall-rate thresholds are met.
    pub sufficient: bool,
    pub confidence_score: f64,
    pub critical_extraction_rate: f64,
    pub overall_extraction_rate: f64,
    /// Every empty critical field, for user-facing messaging.
    pub missing_fields: Vec<String>,
}

/// Output of the identity gate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum ValidationOutcome {
    /// No identity mismatch.
    Pass,
    /// Ship names differ but IMOs do not conflict; the caller may proceed
    /// and must persist the note alongside the record.
    SoftWarning { reason: String, override_note: String },
    /// IMO mismatch; automatic processing halts unconditionally.
    HardReject { reason: String },
}

/// Output of the duplicate gate. Purely advisory; the caller decides
/// skip/replace/keep-both.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DuplicateVerdict {
    pub is_duplicate: bool,
    pub existing_id: Option<String>,
    /// `1.0` = name and number both match, `0.8` = name only.
    pub similarity: f64,
}

impl DuplicateVerdict {
    pub fn none() -> Self {
        Self {
            is_duplicate: false,
            existing_id: None,
            similarity: 0.0,
        }
    }
}

/// How an analysis terminated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AnalysisOutcome {
    /// Clean result, no warnings beyond what `validation` carries.
    Done,
    /// An existing record matched; caller decides skip/replace/keep-both.
    DuplicateFound,
    /// Quality gate failed; `fields` pre-fills a manual-correction form.
    RequiresManualInput,
    /// Identity hard reject; no downstream gates ran.
    Rejected,
}

/// Everything the CRUD layer needs to persist, prompt, or archive.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisResult {
    pub analysis_id: String,
    pub outcome: AnalysisOutcome,
    pub fields: ExtractedFields,
    pub quality: QualityVerdict,
    /// `None` when the identity gate did not run (quality failure or
    /// manual override).
    pub validation: Option<ValidationOutcome>,
    /// `None` when the duplicate gate did not run.
    pub duplicate: Option<DuplicateVerdict>,
    /// Human-readable reason for non-`Done` outcomes.
    pub reason: Option<String>,
    /// Set when the result came through `resolve_override`.
    pub approved_by: Option<String>,
    /// Original file bytes, passed through for archival.
    pub raw_bytes: Vec<u8>,
    /// SHA-256 of `raw_bytes`, for the archival layer's audit trail.
    pub content_hash: String,
    /// Merged summary text, passed through for archival.
    pub summary_text: String,
}

/// Input to [`Analyzer::analyze`](crate::pipeline::Analyzer::analyze).
#[derive(Debug, Clone)]
pub struct AnalysisRequest {
    pub bytes: Vec<u8>,
    pub filename: String,
    /// Declared content type: `pdf`, `jpg`, or `png` (full MIME accepted).
    pub mime_type: String,
    pub kind: DocumentKind,
    /// The ship this upload is filed under; scopes duplicate detection.
    pub ship_id: String,
    pub expected_ship_name: Option<String>,
    pub expected_imo: Option<String>,
}
