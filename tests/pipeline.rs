//! End-to-end pipeline tests with in-memory capability adapters.
//!
//! These prove the orchestrator's gate ordering and short-circuits over
//! a real multi-page PDF built in-test: split → concurrent OCR → merge →
//! extraction → quality → identity → duplicate.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use anyhow::Result;
use async_trait::async_trait;
use serde_json::Value;

use maridoc::config::AnalysisConfig;
use maridoc::error::AnalysisError;
use maridoc::kind::DocumentKind;
use maridoc::models::{
    AnalysisOutcome, AnalysisRequest, ExtractedFields, OcrOutput, RegionScan, ValidationOutcome,
};
use maridoc::pipeline::Analyzer;
use maridoc::providers::StaticAliasLookup;
use maridoc::traits::{AliasLookup, CompletionModel, DocumentOcr, DocumentStore, RegionOcr};

// ─── Fixtures ───────────────────────────────────────────────────────

/// Build a minimal n-page PDF.
fn pdf_with_pages(n: u32) -> Vec<u8> {
    use lopdf::{dictionary, Document, Object};

    let mut doc = Document::with_version("1.5");
    let pages_id = doc.new_object_id();
    let mut kids: Vec<Object> = Vec::new();
    for _ in 0..n {
        let page_id = doc.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => pages_id,
            "MediaBox" => vec![0.into(), 0.into(), 612.into(), 792.into()],
        });
        kids.push(page_id.into());
    }
    let count = kids.len() as i64;
    doc.objects.insert(
        pages_id,
        Object::Dictionary(dictionary! {
            "Type" => "Pages",
            "Kids" => kids,
            "Count" => count,
        }),
    );
    let catalog_id = doc.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    });
    doc.trailer.set("Root", catalog_id);
    let mut out = Vec::new();
    doc.save_to(&mut out).unwrap();
    out
}

// ─── Test OCR adapter ───────────────────────────────────────────────

/// Returns fixed text per call and counts invocations; optionally fails
/// specific chunk calls (by arrival order).
struct ScriptedOcr {
    calls: AtomicUsize,
    fail_all: bool,
    fail_first: bool,
}

impl ScriptedOcr {
    fn ok() -> Self {
        Self {
            calls: AtomicUsize::new(0),
            fail_all: false,
            fail_first: false,
        }
    }

    fn failing() -> Self {
        Self {
            calls: AtomicUsize::new(0),
            fail_all: true,
            fail_first: false,
        }
    }

    fn flaky_first() -> Self {
        Self {
            calls: AtomicUsize::new(0),
            fail_all: false,
            fail_first: true,
        }
    }
}

#[async_trait]
impl DocumentOcr for ScriptedOcr {
    async fn analyze(&self, _bytes: &[u8], _mime_type: &str) -> Result<OcrOutput> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_all || (self.fail_first && call == 0) {
            anyhow::bail!("service unavailable");
        }
        Ok(OcrOutput {
            text: format!("SAFETY MANAGEMENT CERTIFICATE body text (call {})", call),
            entities: vec![],
        })
    }
}

// ─── Test region adapter ────────────────────────────────────────────

struct FixedRegion;

#[async_trait]
impl RegionOcr for FixedRegion {
    async fn scan_header_footer(&self, _first_page: &[u8]) -> Result<RegionScan> {
        Ok(RegionScan {
            header_text: "DNV GL  Form SMC-01".to_string(),
            footer_text: "Page 1".to_string(),
        })
    }
}

// ─── Test completion model ──────────────────────────────────────────

/// Returns a canned JSON response and captures the prompt it was given.
struct CannedModel {
    response: String,
    last_prompt: Mutex<Option<String>>,
}

impl CannedModel {
    fn new(response: &str) -> Self {
        Self {
            response: response.to_string(),
            last_prompt: Mutex::new(None),
        }
    }

    fn prompt(&self) -> String {
        self.last_prompt.lock().unwrap().clone().unwrap_or_default()
    }
}

#[async_trait]
impl CompletionModel for CannedModel {
    async fn complete(&self, prompt: &str) -> Result<String> {
        *self.last_prompt.lock().unwrap() = Some(prompt.to_string());
        Ok(self.response.clone())
    }
}

// ─── Test store ─────────────────────────────────────────────────────

struct FixedStore {
    record: Option<Value>,
    queries: Mutex<Vec<(String, Value)>>,
}

impl FixedStore {
    fn empty() -> Self {
        Self {
            record: None,
            queries: Mutex::new(Vec::new()),
        }
    }

    fn with_record(record: Value) -> Self {
        Self {
            record: Some(record),
            queries: Mutex::new(Vec::new()),
        }
    }
}

#[async_trait]
impl DocumentStore for FixedStore {
    async fn find_one(&self, collection: &str, filter: &Value) -> Result<Option<Value>> {
        self.queries
            .lock()
            .unwrap()
            .push((collection.to_string(), filter.clone()));
        Ok(self.record.clone())
    }
}

// ─── Helpers ────────────────────────────────────────────────────────

const GOOD_CERT_RESPONSE: &str = r#"{
    "cert_name": "ISM Certificate",
    "cert_no": "A123",
    "cert_type": "Full Term",
    "issue_date": "2024-03-15",
    "valid_date": "2029-03-14",
    "issued_by": "DNV GL",
    "ship_name": "MV EXAMPLE",
    "ship_imo": "IMO 9123456",
    "confidence_score": 0.92
}"#;

fn request_for(bytes: Vec<u8>) -> AnalysisRequest {
    AnalysisRequest {
        bytes,
        filename: "ISM_Cert.pdf".to_string(),
        mime_type: "pdf".to_string(),
        kind: DocumentKind::Certificate,
        ship_id: "ship-42".to_string(),
        expected_ship_name: Some("MV EXAMPLE".to_string()),
        expected_imo: Some("9123456".to_string()),
    }
}

fn analyzer(
    ocr: Arc<dyn DocumentOcr>,
    region: Option<Arc<dyn RegionOcr>>,
    model: Arc<dyn CompletionModel>,
    store: Arc<dyn DocumentStore>,
) -> Analyzer {
    let config = AnalysisConfig::default();
    let aliases: Arc<dyn AliasLookup> =
        Arc::new(StaticAliasLookup::from_config(&config.aliases));
    Analyzer::new(config, ocr, region, model, store, aliases)
}

// ─── Tests ──────────────────────────────────────────────────────────

#[tokio::test]
async fn twenty_page_certificate_passes_cleanly() {
    let ocr = Arc::new(ScriptedOcr::ok());
    let model = Arc::new(CannedModel::new(GOOD_CERT_RESPONSE));
    let store = Arc::new(FixedStore::empty());
    let analyzer = analyzer(ocr.clone(), Some(Arc::new(FixedRegion)), model.clone(), store);

    let result = analyzer
        .analyze(request_for(pdf_with_pages(20)))
        .await
        .unwrap();

    assert_eq!(result.outcome, AnalysisOutcome::Done);
    assert_eq!(result.fields.get("cert_name"), Some("ISM Certificate"));
    assert_eq!(result.fields.get("cert_no"), Some("A123"));
    assert_eq!(result.fields.get("ship_imo"), Some("9123456"));
    // The alias table canonicalized the issuing authority.
    assert_eq!(result.fields.get("issued_by"), Some("DNV"));
    assert!(result.quality.sufficient);
    assert_eq!(result.validation, Some(ValidationOutcome::Pass));
    assert!(!result.duplicate.as_ref().unwrap().is_duplicate);
    assert!(result.reason.is_none());

    // 20 pages split into two chunks, both OCR'd.
    assert_eq!(ocr.calls.load(Ordering::SeqCst), 2);
    assert!(result.summary_text.contains("=== Pages 1-12 ==="));
    assert!(result.summary_text.contains("=== Pages 13-20 ==="));
    // Header/footer scan landed in the summary and hence the prompt.
    assert!(result.summary_text.contains("DNV GL  Form SMC-01"));
    assert!(model.prompt().contains("DNV GL  Form SMC-01"));
    assert!(model.prompt().contains("Filename: ISM_Cert.pdf"));

    // Raw bytes and hash pass through for archival.
    assert!(!result.raw_bytes.is_empty());
    assert_eq!(result.content_hash.len(), 64);
    assert!(!result.analysis_id.is_empty());
}

#[tokio::test]
async fn small_pdf_takes_the_no_split_path() {
    let ocr = Arc::new(ScriptedOcr::ok());
    let model = Arc::new(CannedModel::new(GOOD_CERT_RESPONSE));
    let store = Arc::new(FixedStore::empty());
    let analyzer = analyzer(ocr.clone(), None, model, store);

    let result = analyzer
        .analyze(request_for(pdf_with_pages(5)))
        .await
        .unwrap();

    assert_eq!(result.outcome, AnalysisOutcome::Done);
    assert_eq!(ocr.calls.load(Ordering::SeqCst), 1);
    assert!(result.summary_text.contains("=== Pages 1-5 ==="));
}

#[tokio::test]
async fn malformed_bytes_fail_before_any_ocr_call() {
    let ocr = Arc::new(ScriptedOcr::ok());
    let model = Arc::new(CannedModel::new(GOOD_CERT_RESPONSE));
    let store = Arc::new(FixedStore::empty());
    let analyzer = analyzer(ocr.clone(), None, model, store);

    let err = analyzer
        .analyze(request_for(b"definitely not a pdf".to_vec()))
        .await
        .unwrap_err();

    assert!(matches!(err, AnalysisError::InvalidDocumentFormat(_)));
    assert_eq!(ocr.calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn all_chunks_failing_is_extraction_failed() {
    let ocr = Arc::new(ScriptedOcr::failing());
    let model = Arc::new(CannedModel::new(GOOD_CERT_RESPONSE));
    let store = Arc::new(FixedStore::empty());
    let analyzer = analyzer(ocr, None, model, store);

    let err = analyzer
        .analyze(request_for(pdf_with_pages(20)))
        .await
        .unwrap_err();

    match err {
        AnalysisError::ExtractionFailed(msg) => {
            assert!(msg.contains("all 2 chunks failed"));
            assert!(msg.contains("service unavailable"));
        }
        other => panic!("expected extraction failure, got {:?}", other),
    }
}

#[tokio::test]
async fn one_failed_chunk_degrades_not_aborts() {
    let ocr = Arc::new(ScriptedOcr::flaky_first());
    let model = Arc::new(CannedModel::new(GOOD_CERT_RESPONSE));
    let store = Arc::new(FixedStore::empty());
    let analyzer = analyzer(ocr.clone(), None, model, store);

    let result = analyzer
        .analyze(request_for(pdf_with_pages(20)))
        .await
        .unwrap();

    assert_eq!(result.outcome, AnalysisOutcome::Done);
    assert_eq!(ocr.calls.load(Ordering::SeqCst), 2);
    // Exactly one page-range section made it into the merged text.
    let sections = result.summary_text.matches("=== Pages ").count();
    assert_eq!(sections, 1);
}

#[tokio::test]
async fn insufficient_quality_requires_manual_input() {
    // Missing cert_no (critical) despite high confidence.
    let response = r#"{"cert_name": "ISM Certificate", "cert_no": null,
        "issue_date": "2024-03-15", "issued_by": "DNV",
        "ship_name": "MV EXAMPLE", "ship_imo": "9123456",
        "confidence_score": 0.95}"#;
    let model = Arc::new(CannedModel::new(response));
    let store = Arc::new(FixedStore::empty());
    let analyzer = analyzer(Arc::new(ScriptedOcr::ok()), None, model, store);

    let result = analyzer
        .analyze(request_for(pdf_with_pages(5)))
        .await
        .unwrap();

    assert_eq!(result.outcome, AnalysisOutcome::RequiresManualInput);
    assert!(!result.quality.sufficient);
    assert_eq!(result.quality.missing_fields, vec!["cert_no".to_string()]);
    assert!(result.reason.as_ref().unwrap().contains("cert_no"));
    // Identity and duplicate gates never ran.
    assert!(result.validation.is_none());
    assert!(result.duplicate.is_none());
    // Partial fields survive for pre-filling a manual form.
    assert_eq!(result.fields.get("cert_name"), Some("ISM Certificate"));
}

#[tokio::test]
async fn unparseable_model_response_degrades_to_manual_input() {
    let model = Arc::new(CannedModel::new("I cannot help with that."));
    let store = Arc::new(FixedStore::empty());
    let analyzer = analyzer(Arc::new(ScriptedOcr::ok()), None, model, store);

    let result = analyzer
        .analyze(request_for(pdf_with_pages(5)))
        .await
        .unwrap();

    assert_eq!(result.outcome, AnalysisOutcome::RequiresManualInput);
    assert_eq!(result.quality.confidence_score, 0.0);
}

#[tokio::test]
async fn imo_mismatch_hard_rejects_before_duplicate_gate() {
    let response = r#"{"cert_name": "ISM Certificate", "cert_no": "A123",
        "issue_date": "2024-03-15", "valid_date": "2029-03-14",
        "issued_by": "DNV", "ship_name": "MV EXAMPLE",
        "ship_imo": "7654321", "confidence_score": 0.9}"#;
    let model = Arc::new(CannedModel::new(response));
    let store = Arc::new(FixedStore::empty());
    let analyzer = analyzer(Arc::new(ScriptedOcr::ok()), None, model, store.clone());

    let result = analyzer
        .analyze(request_for(pdf_with_pages(5)))
        .await
        .unwrap();

    assert_eq!(result.outcome, AnalysisOutcome::Rejected);
    assert!(matches!(
        result.validation,
        Some(ValidationOutcome::HardReject { .. })
    ));
    assert!(result.reason.as_ref().unwrap().contains("different ship"));
    // The duplicate gate never ran.
    assert!(result.duplicate.is_none());
    assert!(store.queries.lock().unwrap().is_empty());
}

#[tokio::test]
async fn name_mismatch_soft_warns_but_completes() {
    let response = r#"{"cert_name": "ISM Certificate", "cert_no": "A123",
        "issue_date": "2024-03-15", "valid_date": "2029-03-14",
        "issued_by": "DNV", "ship_name": "MV OTHER",
        "ship_imo": "9123456", "confidence_score": 0.9}"#;
    let model = Arc::new(CannedModel::new(response));
    let store = Arc::new(FixedStore::empty());
    let analyzer = analyzer(Arc::new(ScriptedOcr::ok()), None, model, store);

    let result = analyzer
        .analyze(request_for(pdf_with_pages(5)))
        .await
        .unwrap();

    // Soft warning rides along; the pipeline still reached the end.
    assert_eq!(result.outcome, AnalysisOutcome::Done);
    match result.validation {
        Some(ValidationOutcome::SoftWarning {
            ref reason,
            ref override_note,
        }) => {
            assert!(reason.contains("MV OTHER"));
            assert!(!override_note.is_empty());
        }
        ref other => panic!("expected soft warning, got {:?}", other),
    }
    assert!(result.duplicate.is_some());
}

#[tokio::test]
async fn existing_record_surfaces_as_duplicate() {
    let model = Arc::new(CannedModel::new(GOOD_CERT_RESPONSE));
    let store = Arc::new(FixedStore::with_record(serde_json::json!({
        "_id": "rec-7",
        "cert_name": "ISM Certificate",
        "cert_no": "A123",
    })));
    let analyzer = analyzer(Arc::new(ScriptedOcr::ok()), None, model, store.clone());

    let result = analyzer
        .analyze(request_for(pdf_with_pages(5)))
        .await
        .unwrap();

    assert_eq!(result.outcome, AnalysisOutcome::DuplicateFound);
    let duplicate = result.duplicate.unwrap();
    assert!(duplicate.is_duplicate);
    assert_eq!(duplicate.similarity, 1.0);
    assert_eq!(duplicate.existing_id.as_deref(), Some("rec-7"));
    assert!(result.reason.unwrap().contains("rec-7"));

    // The store was queried in the right collection with the ship scope.
    let queries = store.queries.lock().unwrap();
    assert_eq!(queries.len(), 1);
    assert_eq!(queries[0].0, "certificates");
    assert_eq!(queries[0].1["ship_id"], "ship-42");
    assert_eq!(queries[0].1["cert_name"], "ISM Certificate");
}

#[tokio::test]
async fn override_skips_gates_but_still_checks_duplicates() {
    let model = Arc::new(CannedModel::new(GOOD_CERT_RESPONSE));
    let store = Arc::new(FixedStore::with_record(serde_json::json!({
        "_id": "rec-9",
        "cert_name": "ISM Certificate",
        "cert_no": "A123",
    })));
    let analyzer = analyzer(Arc::new(ScriptedOcr::ok()), None, model, store);

    // Fields a human corrected after a prior hard reject; the quality
    // gate would fail them (missing criticals are fine here).
    let mut fields = ExtractedFields::empty(DocumentKind::Certificate);
    fields.set("cert_name", Some("ISM Certificate".to_string()));
    fields.set("cert_no", Some("A123".to_string()));

    let result = analyzer
        .resolve_override("ship-42", fields, "ops@example.com")
        .await
        .unwrap();

    assert_eq!(result.outcome, AnalysisOutcome::DuplicateFound);
    assert_eq!(result.approved_by.as_deref(), Some("ops@example.com"));
    assert!(result.validation.is_none());
    assert!(result.duplicate.unwrap().is_duplicate);
}

#[tokio::test]
async fn region_scan_failure_degrades_gracefully() {
    struct BrokenRegion;

    #[async_trait]
    impl RegionOcr for BrokenRegion {
        async fn scan_header_footer(&self, _first_page: &[u8]) -> Result<RegionScan> {
            anyhow::bail!("renderer crashed")
        }
    }

    let model = Arc::new(CannedModel::new(GOOD_CERT_RESPONSE));
    let store = Arc::new(FixedStore::empty());
    let analyzer = analyzer(
        Arc::new(ScriptedOcr::ok()),
        Some(Arc::new(BrokenRegion)),
        model,
        store,
    );

    let result = analyzer
        .analyze(request_for(pdf_with_pages(5)))
        .await
        .unwrap();

    assert_eq!(result.outcome, AnalysisOutcome::Done);
    assert!(!result.summary_text.contains("Header/Footer"));
}
