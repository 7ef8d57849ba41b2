//! Pipeline orchestration.
//!
//! Ties planner, OCR fan-out, merge, field extraction, and the three
//! gates into one `analyze()` call. Transitions are strictly forward and
//! nothing retries at this layer — retry policy belongs to the adapters.
//!
//! ```text
//! Planning → Ocr (concurrent, bounded) → Merging → Extracting
//!     → QualityGate → IdentityGate → DuplicateGate → Done
//! ```
//!
//! Each gate can short-circuit with a terminal outcome; business outcomes
//! come back as ordinary [`AnalysisResult`] variants, only infrastructure
//! and format failures are errors.

use std::sync::Arc;
use std::time::Duration;

use sha2::{Digest, Sha256};
use tokio::sync::{oneshot, Semaphore};
use tokio::task::JoinSet;
use uuid::Uuid;

use crate::config::AnalysisConfig;
use crate::duplicate::DuplicateDetector;
use crate::error::AnalysisError;
use crate::extraction::FieldExtractionEngine;
use crate::identity;
use crate::merge::{self, MergeMeta};
use crate::models::{
    AnalysisOutcome, AnalysisRequest, AnalysisResult, ChunkAnalysis, DuplicateVerdict,
    ExtractedFields, RegionScan, ValidationOutcome,
};
use crate::normalize::IntervalTable;
use crate::planner::{self, ChunkPlan};
use crate::progress::{AnalysisEvent, AnalysisPhase, AnalysisProgressReporter, NoProgress};
use crate::quality;
use crate::traits::{AliasLookup, CompletionModel, DocumentOcr, DocumentStore, RegionOcr};

/// The analysis pipeline. One instance serves any number of concurrent
/// `analyze()` calls; invocations share nothing but the read-only
/// adapters and configuration.
pub struct Analyzer {
    config: AnalysisConfig,
    ocr: Arc<dyn DocumentOcr>,
    region: Option<Arc<dyn RegionOcr>>,
    extraction: FieldExtractionEngine,
    detector: DuplicateDetector,
    progress: Arc<dyn AnalysisProgressReporter>,
}

impl Analyzer {
    /// Build an analyzer from configuration and capability adapters.
    /// `region` is optional because the header/footer scan is a
    /// best-effort enrichment, not a required collaborator.
    pub fn new(
        config: AnalysisConfig,
        ocr: Arc<dyn DocumentOcr>,
        region: Option<Arc<dyn RegionOcr>>,
        model: Arc<dyn CompletionModel>,
        store: Arc<dyn DocumentStore>,
        aliases: Arc<dyn AliasLookup>,
    ) -> Self {
        let extraction = FieldExtractionEngine::new(
            model,
            aliases,
            IntervalTable::from_config(&config.intervals),
            Duration::from_secs(config.extraction.timeout_secs),
        );
        let detector = DuplicateDetector::new(store);
        Self {
            config,
            ocr,
            region,
            extraction,
            detector,
            progress: Arc::new(NoProgress),
        }
    }

    /// Replace the progress reporter (default: no-op).
    pub fn with_progress(mut self, progress: Arc<dyn AnalysisProgressReporter>) -> Self {
        self.progress = progress;
        self
    }

    /// Run the full pipeline over one uploaded document.
    ///
    /// Blocks the caller until the terminal outcome; internally the
    /// chunk OCR calls overlap. Dropping the returned future aborts any
    /// in-flight chunk work.
    pub async fn analyze(&self, request: AnalysisRequest) -> Result<AnalysisResult, AnalysisError> {
        let analysis_id = Uuid::new_v4().to_string();
        let content_hash = sha256_hex(&request.bytes);

        self.progress.report(AnalysisEvent::PhaseStarted {
            phase: AnalysisPhase::Planning,
        });
        let plan = planner::plan(&request.bytes, &request.mime_type, &self.config.chunking)?;

        self.progress.report(AnalysisEvent::PhaseStarted {
            phase: AnalysisPhase::Ocr,
        });
        let (analyses, region_scan) = self.run_ocr(&plan).await;

        if !analyses.iter().any(|a| a.success) {
            let detail = analyses
                .iter()
                .find_map(|a| a.error.as_deref())
                .unwrap_or("no chunk results");
            return Err(AnalysisError::ExtractionFailed(format!(
                "all {} chunks failed OCR; first error: {}",
                plan.chunks.len(),
                detail
            )));
        }

        self.progress.report(AnalysisEvent::PhaseStarted {
            phase: AnalysisPhase::Merging,
        });
        let meta = MergeMeta {
            filename: &request.filename,
            ship_name: request.expected_ship_name.as_deref(),
            total_pages: plan.total_pages,
            chunk_count: plan.chunks.len(),
        };
        let mut summary = merge::merge(&analyses, &meta);
        if let Some(scan) = &region_scan {
            merge::append_region_scan(&mut summary, scan);
        }

        self.progress.report(AnalysisEvent::PhaseStarted {
            phase: AnalysisPhase::Extracting,
        });
        let fields = self
            .extraction
            .extract(&summary, request.kind, &request.filename)
            .await?;

        self.progress.report(AnalysisEvent::PhaseStarted {
            phase: AnalysisPhase::QualityGate,
        });
        let quality = quality::assess(&fields, &self.config.quality);
        if !quality.sufficient {
            let reason = if quality.missing_fields.is_empty() {
                format!(
                    "extraction below thresholds (confidence {:.2}, field rate {:.2})",
                    quality.confidence_score, quality.overall_extraction_rate
                )
            } else {
                format!(
                    "missing critical fields: {}",
                    quality.missing_fields.join(", ")
                )
            };
            return Ok(self.finish(AnalysisResult {
                analysis_id,
                outcome: AnalysisOutcome::RequiresManualInput,
                fields,
                quality,
                validation: None,
                duplicate: None,
                reason: Some(reason),
                approved_by: None,
                raw_bytes: request.bytes,
                content_hash,
                summary_text: summary.formatted_text,
            }));
        }

        self.progress.report(AnalysisEvent::PhaseStarted {
            phase: AnalysisPhase::IdentityGate,
        });
        let validation = identity::validate(
            fields.ship_name(),
            fields.ship_imo(),
            request.expected_ship_name.as_deref(),
            request.expected_imo.as_deref(),
        );
        if let ValidationOutcome::HardReject { reason } = &validation {
            let reason = reason.clone();
            return Ok(self.finish(AnalysisResult {
                analysis_id,
                outcome: AnalysisOutcome::Rejected,
                fields,
                quality,
                validation: Some(validation),
                duplicate: None,
                reason: Some(reason),
                approved_by: None,
                raw_bytes: request.bytes,
                content_hash,
                summary_text: summary.formatted_text,
            }));
        }

        self.progress.report(AnalysisEvent::PhaseStarted {
            phase: AnalysisPhase::DuplicateGate,
        });
        let duplicate = self.detector.detect(&request.ship_id, &fields).await?;
        let (outcome, reason) = outcome_for_duplicate(&duplicate);

        Ok(self.finish(AnalysisResult {
            analysis_id,
            outcome,
            fields,
            quality,
            validation: Some(validation),
            duplicate: Some(duplicate),
            reason,
            approved_by: None,
            raw_bytes: request.bytes,
            content_hash,
            summary_text: summary.formatted_text,
        }))
    }

    /// Entry point for a user-approved bypass of a prior hard reject or
    /// insufficient-quality outcome. Quality and identity gates are
    /// skipped — a human vouched for the data — but the duplicate gate
    /// still runs. The quality verdict on the result is informational.
    pub async fn resolve_override(
        &self,
        ship_id: &str,
        fields: ExtractedFields,
        approved_by: &str,
    ) -> Result<AnalysisResult, AnalysisError> {
        self.progress.report(AnalysisEvent::PhaseStarted {
            phase: AnalysisPhase::DuplicateGate,
        });
        let duplicate = self.detector.detect(ship_id, &fields).await?;
        let quality = quality::assess(&fields, &self.config.quality);
        let (outcome, reason) = outcome_for_duplicate(&duplicate);

        Ok(self.finish(AnalysisResult {
            analysis_id: Uuid::new_v4().to_string(),
            outcome,
            fields,
            quality,
            validation: None,
            duplicate: Some(duplicate),
            reason,
            approved_by: Some(approved_by.to_string()),
            raw_bytes: Vec::new(),
            content_hash: String::new(),
            summary_text: String::new(),
        }))
    }

    fn finish(&self, result: AnalysisResult) -> AnalysisResult {
        self.progress.report(AnalysisEvent::Finished {
            outcome: result.outcome,
        });
        result
    }

    /// Fan the chunks out to the OCR adapter with bounded concurrency,
    /// overlapping the best-effort header/footer scan once chunk 0 is
    /// through. Returns analyses sorted by chunk index.
    async fn run_ocr(&self, plan: &ChunkPlan) -> (Vec<ChunkAnalysis>, Option<RegionScan>) {
        let total = plan.chunks.len();
        let call_timeout = Duration::from_secs(self.config.ocr.timeout_secs);
        let semaphore = Arc::new(Semaphore::new(self.config.ocr.max_concurrent));
        let (first_done_tx, first_done_rx) = oneshot::channel::<()>();
        let mut first_done_tx = Some(first_done_tx);

        let mut set: JoinSet<ChunkAnalysis> = JoinSet::new();
        for chunk in &plan.chunks {
            let ocr = Arc::clone(&self.ocr);
            let semaphore = Arc::clone(&semaphore);
            let bytes = chunk.bytes.clone();
            let mime = plan.mime_type;
            let index = chunk.index;
            let pages = chunk.pages;
            let notify_first = if index == 0 {
                first_done_tx.take()
            } else {
                None
            };
            set.spawn(async move {
                let _permit = semaphore.acquire_owned().await.ok();
                let outcome = tokio::time::timeout(call_timeout, ocr.analyze(&bytes, mime)).await;
                if let Some(tx) = notify_first {
                    let _ = tx.send(());
                }
                match outcome {
                    Ok(Ok(output)) => ChunkAnalysis::succeeded(index, pages, output),
                    Ok(Err(e)) => ChunkAnalysis::failed(index, pages, e.to_string()),
                    Err(_) => ChunkAnalysis::failed(
                        index,
                        pages,
                        format!("OCR call exceeded {}s", call_timeout.as_secs()),
                    ),
                }
            });
        }

        let first_page = plan.chunks.first().map(|c| c.bytes.clone());
        let region_fut = self.run_region_scan(first_page, first_done_rx);

        let progress = &self.progress;
        let collect_fut = async move {
            let mut set = set;
            let mut analyses: Vec<ChunkAnalysis> = Vec::with_capacity(total);
            while let Some(joined) = set.join_next().await {
                match joined {
                    Ok(analysis) => {
                        if analysis.success {
                            progress.report(AnalysisEvent::ChunkCompleted {
                                index: analysis.chunk_index,
                                total,
                            });
                        } else {
                            progress.report(AnalysisEvent::ChunkFailed {
                                index: analysis.chunk_index,
                                total,
                                error: analysis.error.clone().unwrap_or_default(),
                            });
                        }
                        analyses.push(analysis);
                    }
                    Err(e) => {
                        progress.report(AnalysisEvent::Warning {
                            message: format!("chunk task aborted: {}", e),
                        });
                    }
                }
            }
            analyses.sort_by_key(|a| a.chunk_index);
            analyses
        };

        tokio::join!(collect_fut, region_fut)
    }

    /// Best-effort first-page header/footer scan. Waits until chunk 0's
    /// OCR has completed (page 1 is in chunk 0), runs under its own short
    /// timeout, and degrades to `None` on any failure.
    async fn run_region_scan(
        &self,
        first_page: Option<Vec<u8>>,
        first_done: oneshot::Receiver<()>,
    ) -> Option<RegionScan> {
        let region = self.region.as_ref()?;
        let first_page = first_page?;
        if first_done.await.is_err() {
            // Chunk 0's task went away without reporting; skip the scan.
            return None;
        }
        self.progress.report(AnalysisEvent::PhaseStarted {
            phase: AnalysisPhase::RegionScan,
        });
        let scan_timeout = Duration::from_secs(self.config.ocr.region_timeout_secs);
        match tokio::time::timeout(scan_timeout, region.scan_header_footer(&first_page)).await {
            Ok(Ok(scan)) if !scan.is_empty() => Some(scan),
            Ok(Ok(_)) => None,
            Ok(Err(e)) => {
                self.progress.report(AnalysisEvent::Warning {
                    message: format!("header/footer scan failed: {}", e),
                });
                None
            }
            Err(_) => {
                self.progress.report(AnalysisEvent::Warning {
                    message: format!("header/footer scan exceeded {}s", scan_timeout.as_secs()),
                });
                None
            }
        }
    }
}

fn outcome_for_duplicate(duplicate: &DuplicateVerdict) -> (AnalysisOutcome, Option<String>) {
    if duplicate.is_duplicate {
        let reason = match &duplicate.existing_id {
            Some(id) => format!(
                "matches existing record {} (similarity {:.1})",
                id, duplicate.similarity
            ),
            None => format!(
                "matches an existing record (similarity {:.1})",
                duplicate.similarity
            ),
        };
        (AnalysisOutcome::DuplicateFound, Some(reason))
    } else {
        (AnalysisOutcome::Done, None)
    }
}

fn sha256_hex(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    format!("{:x}", hasher.finalize())
}
