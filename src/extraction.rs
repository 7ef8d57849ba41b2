//! Structured field extraction over the merged summary text.
//!
//! One completion call per analysis — never per chunk — so field values
//! cannot come out inconsistent across fragments. The response contract
//! is strict JSON, but the handling of a broken response is deliberately
//! soft: fence-stripping first, then a lenient decode, then degradation
//! to an empty field map that the quality gate will classify as
//! insufficient. Only a failed *call* (transport, timeout) is an error.

use std::sync::Arc;
use std::time::Duration;

use serde_json::Value;

use crate::error::AnalysisError;
use crate::kind::{DocumentKind, DEFAULT_CERT_TYPE, CERT_TYPES};
use crate::models::{ExtractedFields, MergedSummary};
use crate::normalize::{coerce_enum, normalize_date, normalize_imo, IntervalTable};
use crate::prompt::build_prompt;
use crate::traits::{AliasLookup, CompletionModel};

/// Coarse merge-candidate keys tried, in order, when the model leaves the
/// document-name field empty. These are the entity types document-AI
/// services commonly emit for a title.
const NAME_CANDIDATE_KEYS: &[&str] = &["document_title", "title", "report_name", "subject"];

pub struct FieldExtractionEngine {
    model: Arc<dyn CompletionModel>,
    aliases: Arc<dyn AliasLookup>,
    intervals: IntervalTable,
    timeout: Duration,
}

impl FieldExtractionEngine {
    pub fn new(
        model: Arc<dyn CompletionModel>,
        aliases: Arc<dyn AliasLookup>,
        intervals: IntervalTable,
        timeout: Duration,
    ) -> Self {
        Self {
            model,
            aliases,
            intervals,
            timeout,
        }
    }

    /// Extract and normalize the kind's field map from the merged text.
    pub async fn extract(
        &self,
        summary: &MergedSummary,
        kind: DocumentKind,
        filename: &str,
    ) -> Result<ExtractedFields, AnalysisError> {
        let prompt = build_prompt(kind, &summary.formatted_text, filename);

        let response = tokio::time::timeout(self.timeout, self.model.complete(&prompt))
            .await
            .map_err(|_| {
                AnalysisError::CompletionFailed(format!(
                    "completion call exceeded {}s",
                    self.timeout.as_secs()
                ))
            })?
            .map_err(|e| AnalysisError::CompletionFailed(e.to_string()))?;

        let mut fields = parse_response(&response, kind);
        apply_candidates(&mut fields, summary);
        self.normalize(&mut fields);
        Ok(fields)
    }

    fn normalize(&self, fields: &mut ExtractedFields) {
        let profile = fields.kind.profile();

        for date_field in profile.date_fields {
            let normalized = fields.get(date_field).and_then(normalize_date);
            fields.set(date_field, normalized);
        }

        let imo = fields.get("ship_imo").and_then(normalize_imo);
        fields.set("ship_imo", imo);

        if let Some(enum_field) = profile.enum_field {
            if let Some(raw) = fields.get(enum_field) {
                let coerced = coerce_enum(raw, CERT_TYPES, DEFAULT_CERT_TYPE);
                fields.set(enum_field, Some(coerced));
            }
        }

        if let Some(issued_by) = fields.get("issued_by") {
            let canonical = self.aliases.normalize(issued_by);
            fields.set("issued_by", Some(canonical));
        }

        // Test reports: compute the next due date from the service
        // interval table when the document does not print one.
        if fields.kind == DocumentKind::TestReport && fields.get("next_test_date").is_none() {
            let due = match (fields.get("equipment_name"), fields.get("test_date")) {
                (Some(equipment), Some(test_date)) => self.intervals.next_due(equipment, test_date),
                _ => None,
            };
            fields.set("next_test_date", due);
        }
    }
}

/// Decode the model response into a field map. Undecodable responses
/// yield the empty map (confidence 0.0) rather than an error.
fn parse_response(response: &str, kind: DocumentKind) -> ExtractedFields {
    let mut fields = ExtractedFields::empty(kind);

    let body = strip_code_fences(response);
    let value: Value = match serde_json::from_str(body) {
        Ok(v) => v,
        Err(_) => return fields,
    };
    let object = match value.as_object() {
        Some(o) => o,
        None => return fields,
    };

    for field in kind.profile().fields {
        let extracted = object.get(*field).and_then(json_value_to_string);
        fields.set(field, extracted);
    }
    fields.confidence_score = object
        .get("confidence_score")
        .and_then(json_number)
        .map(|c| c.clamp(0.0, 1.0))
        .unwrap_or(0.0);
    fields
}

/// Fall back to coarse merge candidates for the document-name field when
/// the model returned nothing (first non-empty chunk wins upstream).
fn apply_candidates(fields: &mut ExtractedFields, summary: &MergedSummary) {
    let name_field = fields.kind.profile().name_field;
    if fields.get(name_field).is_some() {
        return;
    }
    for key in NAME_CANDIDATE_KEYS {
        if let Some(candidate) = summary.first_candidate(key) {
            fields.set(name_field, Some(candidate.to_string()));
            return;
        }
    }
}

/// Strip a Markdown code fence wrapper, or isolate the outermost JSON
/// object when the model wrapped it in prose.
fn strip_code_fences(response: &str) -> &str {
    let trimmed = response.trim();
    if let Some(rest) = trimmed.strip_prefix("```") {
        // Drop the info string ("json") and the closing fence.
        let rest = rest.strip_prefix("json").unwrap_or(rest);
        let rest = rest.strip_suffix("```").unwrap_or(rest);
        return rest.trim();
    }
    if !trimmed.starts_with('{') {
        if let (Some(open), Some(close)) = (trimmed.find('{'), trimmed.rfind('}')) {
            if open < close {
                return &trimmed[open..=close];
            }
        }
    }
    trimmed
}

fn json_value_to_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn json_number(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}
