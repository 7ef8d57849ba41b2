//! Capability interfaces for the external collaborators.
//!
//! The pipeline never talks to a network or a database directly; it goes
//! through these traits. Default HTTP-backed implementations live in
//! [`providers`](crate::providers); the document store is always supplied
//! by the caller (it is the CRUD layer's database).
//!
//! ```text
//! ┌─────────────────────────────────────────────────┐
//! │                   Analyzer                      │
//! │  DocumentOcr   RegionOcr   CompletionModel      │
//! │  DocumentStore (read-only)   AliasLookup        │
//! └──────────────┬──────────────────────────────────┘
//!                ▼
//!        analyze() → AnalysisResult
//! ```
//!
//! # Example
//!
//! ```rust
//! use async_trait::async_trait;
//! use anyhow::Result;
//! use maridoc::models::{OcrOutput, Entity};
//! use maridoc::traits::DocumentOcr;
//!
//! pub struct FixtureOcr;
//!
//! #[async_trait]
//! impl DocumentOcr for FixtureOcr {
//!     async fn analyze(&self, _bytes: &[u8], _mime_type: &str) -> Result<OcrOutput> {
//!         Ok(OcrOutput {
//!             text: "SAFETY MANAGEMENT CERTIFICATE".to_string(),
//!             entities: vec![],
//!         })
//!     }
//! }
//! ```

use anyhow::Result;
use async_trait::async_trait;
use serde_json::Value;

use crate::models::{OcrOutput, RegionScan};

/// Text extraction over one chunk's bytes.
///
/// Called once per chunk, concurrently, each call under the configured
/// timeout. A failure (error or timeout) is that chunk's failure only;
/// the pipeline proceeds as long as at least one chunk succeeds.
#[async_trait]
pub trait DocumentOcr: Send + Sync {
    /// Run OCR/document-AI extraction over a chunk payload.
    async fn analyze(&self, bytes: &[u8], mime_type: &str) -> Result<OcrOutput>;
}

/// Targeted scan of the header and footer band of the first page.
///
/// General-purpose document OCR frequently drops letterheads and form
/// codes because of their font and placement; this second pass recovers
/// them. Strictly best-effort: any failure degrades to absence.
#[async_trait]
pub trait RegionOcr: Send + Sync {
    /// Scan the header/footer band. `first_page` is chunk 0's payload
    /// (always contains page 1); rendering is the adapter's concern.
    async fn scan_header_footer(&self, first_page: &[u8]) -> Result<RegionScan>;
}

/// Text-completion model used for structured field extraction.
#[async_trait]
pub trait CompletionModel: Send + Sync {
    /// Send a prompt, get the raw text response back. The response is
    /// expected to contain JSON, possibly wrapped in code fences; parsing
    /// and degradation are the pipeline's job, not the adapter's.
    async fn complete(&self, prompt: &str) -> Result<String>;
}

/// Read-only view of the external document store, for duplicate lookups.
///
/// `filter` is a flat field-equality object (e.g.
/// `{"ship_id": "...", "cert_name": "..."}`). Implementations map it onto
/// whatever query language their store speaks.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Find one record in `collection` matching `filter`, if any.
    async fn find_one(&self, collection: &str, filter: &Value) -> Result<Option<Value>>;
}

/// Issuing-authority alias lookup, so "DNV GL" and "DNV" converge on one
/// canonical spelling. Pure lookup, no I/O.
pub trait AliasLookup: Send + Sync {
    /// Canonical name for an organization; unknown names pass through
    /// trimmed but otherwise untouched.
    fn normalize(&self, org_name: &str) -> String;
}
