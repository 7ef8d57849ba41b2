//! The quality gate: is an extraction trustworthy enough to proceed
//! without a human?
//!
//! Pure and deterministic, no I/O, so it is unit-testable in isolation
//! from everything else. A missing critical field alone is disqualifying,
//! no matter how confident the model claims to be.

use crate::config::QualityConfig;
use crate::models::{ExtractedFields, QualityVerdict};

/// Score an extraction against the kind's declared fields.
pub fn assess(fields: &ExtractedFields, thresholds: &QualityConfig) -> QualityVerdict {
    let profile = fields.kind.profile();

    let critical_total = profile.critical_fields.len();
    let mut missing_fields = Vec::new();
    for critical in profile.critical_fields {
        if fields.get(critical).is_none() {
            missing_fields.push(critical.to_string());
        }
    }
    let critical_extraction_rate = if critical_total == 0 {
        1.0
    } else {
        (critical_total - missing_fields.len()) as f64 / critical_total as f64
    };

    let overall_total = profile.fields.len();
    let overall_present = profile
        .fields
        .iter()
        .filter(|f| fields.get(f).is_some())
        .count();
    let overall_extraction_rate = if overall_total == 0 {
        1.0
    } else {
        overall_present as f64 / overall_total as f64
    };

    let sufficient = missing_fields.is_empty()
        && fields.confidence_score >= thresholds.min_confidence
        && overall_extraction_rate >= thresholds.min_overall_rate;

    QualityVerdict {
        sufficient,
        confidence_score: fields.confidence_score,
        critical_extraction_rate,
        overall_extraction_rate,
        missing_fields,
    }
}
