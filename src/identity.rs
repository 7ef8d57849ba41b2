//! The identity gate: does this document belong to the ship it was
//! uploaded against?
//!
//! The IMO number is the authoritative key — hull names legally change
//! over a ship's life, the IMO number never does. An IMO mismatch is a
//! hard reject no matter how well the names agree; a name-only mismatch
//! is a soft warning the caller may override with an attached note.

use crate::models::ValidationOutcome;
use crate::normalize::normalize_imo;

/// Override note attached to every soft warning; the caller persists it
/// alongside the record if it proceeds.
pub const NAME_MISMATCH_NOTE: &str = "ship name from document kept for reference only";

/// Compare extracted ship identity against the expected ship.
///
/// Absent fields skip their comparison: an OCR that failed to find the
/// IMO is not evidence of a mismatch.
pub fn validate(
    extracted_name: Option<&str>,
    extracted_imo: Option<&str>,
    expected_name: Option<&str>,
    expected_imo: Option<&str>,
) -> ValidationOutcome {
    let extracted_imo = extracted_imo.and_then(normalize_imo);
    let expected_imo = expected_imo.and_then(normalize_imo);

    if let (Some(extracted), Some(expected)) = (&extracted_imo, &expected_imo) {
        if extracted != expected {
            return ValidationOutcome::HardReject {
                reason: format!(
                    "document belongs to a different ship: IMO {} does not match expected IMO {}",
                    extracted, expected
                ),
            };
        }
    }

    if let (Some(extracted), Some(expected)) = (extracted_name, expected_name) {
        let extracted = extracted.trim();
        let expected = expected.trim();
        if !extracted.is_empty()
            && !expected.is_empty()
            && !extracted.eq_ignore_ascii_case(expected)
        {
            return ValidationOutcome::SoftWarning {
                reason: format!(
                    "ship name on document ('{}') differs from expected ('{}')",
                    extracted, expected
                ),
                override_note: NAME_MISMATCH_NOTE.to_string(),
            };
        }
    }

    ValidationOutcome::Pass
}
