//! # Maridoc
//!
//! Chunked document analysis and validation pipeline for maritime
//! compliance records.
//!
//! Maridoc turns an uploaded scanned/PDF document (certificate, survey
//! report, test report, audit report) into structured, validated field
//! data: oversized PDFs are split into bounded page-range chunks, each
//! chunk is OCR'd concurrently through an external document-AI service,
//! the partial results are merged into one summary, a text-completion
//! model extracts a typed field map, and three gates — quality, ship
//! identity, duplicate — decide whether the record can proceed without a
//! human.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────┐   ┌──────────────┐   ┌──────────────┐
//! │ ChunkPlanner│──▶│ OCR fan-out   │──▶│ Merge +       │
//! │ (lopdf)     │   │ (bounded)     │   │ header/footer │
//! └─────────────┘   └──────────────┘   └──────┬───────┘
//!                                             │
//!                      ┌──────────────────────┤
//!                      ▼                      ▼
//!               ┌────────────┐        ┌──────────────┐
//!               │ Field      │        │ Quality /     │
//!               │ extraction │───────▶│ Identity /    │
//!               │ (LLM)      │        │ Duplicate     │
//!               └────────────┘        └──────────────┘
//! ```
//!
//! ## Quick start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use maridoc::config::AnalysisConfig;
//! use maridoc::kind::DocumentKind;
//! use maridoc::models::AnalysisRequest;
//! use maridoc::pipeline::Analyzer;
//! use maridoc::providers::{HttpDocumentOcr, OpenAiCompletionModel, StaticAliasLookup};
//!
//! # async fn run(store: Arc<dyn maridoc::traits::DocumentStore>) -> anyhow::Result<()> {
//! let config = AnalysisConfig::default();
//! let ocr = Arc::new(HttpDocumentOcr::new(
//!     "https://ocr.internal/v1/analyze".to_string(),
//!     None,
//!     config.ocr.timeout_secs,
//! )?);
//! let model = Arc::new(OpenAiCompletionModel::new(
//!     config.extraction.model.clone(),
//!     config.extraction.timeout_secs,
//! )?);
//! let aliases = Arc::new(StaticAliasLookup::from_config(&config.aliases));
//!
//! let analyzer = Analyzer::new(config, ocr, None, model, store, aliases);
//! let result = analyzer
//!     .analyze(AnalysisRequest {
//!         bytes: std::fs::read("ISM_Cert.pdf")?,
//!         filename: "ISM_Cert.pdf".to_string(),
//!         mime_type: "pdf".to_string(),
//!         kind: DocumentKind::Certificate,
//!         ship_id: "ship-42".to_string(),
//!         expected_ship_name: Some("MV EXAMPLE".to_string()),
//!         expected_imo: Some("9123456".to_string()),
//!     })
//!     .await?;
//! println!("{:?}", result.outcome);
//! # Ok(())
//! # }
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration with documented default tuning |
//! | [`error`] | Error taxonomy for infrastructure and format failures |
//! | [`models`] | Core data types flowing through one analysis |
//! | [`kind`] | Document kinds and their static extraction profiles |
//! | [`planner`] | Page counting and bounded page-range splitting |
//! | [`traits`] | Capability interfaces for external collaborators |
//! | [`providers`] | Default HTTP adapters and alias lookup |
//! | [`merge`] | Combining partial chunk analyses |
//! | [`prompt`] | Extraction prompt templates |
//! | [`extraction`] | Completion call, parsing, normalization |
//! | [`normalize`] | Date/IMO/enum/authority normalizers |
//! | [`quality`] | Quality gate |
//! | [`identity`] | Ship identity gate |
//! | [`duplicate`] | Duplicate detection |
//! | [`pipeline`] | The orchestrating state machine |
//! | [`progress`] | Progress reporting |

pub mod config;
pub mod duplicate;
pub mod error;
pub mod extraction;
pub mod identity;
pub mod kind;
pub mod merge;
pub mod models;
pub mod normalize;
pub mod pipeline;
pub mod planner;
pub mod progress;
pub mod prompt;
pub mod providers;
pub mod quality;
pub mod traits;
