//! Prompt construction for structured field extraction.
//!
//! One template, parameterized by document kind: the key set and the
//! per-key guidance come from the kind profile. The contract with the
//! model is strict — a bare JSON object with exactly the enumerated keys —
//! because the parser downstream refuses to guess at prose.

use crate::kind::{DocumentKind, CERT_TYPES};
use crate::merge::REGION_SECTION_HEADER;

/// Build the extraction prompt for one document.
pub fn build_prompt(kind: DocumentKind, summary_text: &str, filename: &str) -> String {
    let profile = kind.profile();
    let mut prompt = String::with_capacity(summary_text.len() + 2048);

    prompt.push_str(&format!(
        "You are extracting structured fields from a scanned maritime {}.\n\n",
        profile.label
    ));
    prompt.push_str(
        "Return ONLY a JSON object, with no prose and no code fences, containing exactly these keys:\n",
    );
    for field in profile.fields {
        prompt.push_str(&format!("- \"{}\": {}\n", field, field_hint(field)));
    }
    prompt.push_str("- \"confidence_score\": your overall confidence in this extraction, a number from 0.0 to 1.0\n");

    prompt.push_str("\nRules:\n");
    prompt.push_str("- Every value must be a string, or null when the document does not state it. Never invent values.\n");
    if let Some(enum_field) = profile.enum_field {
        prompt.push_str(&format!(
            "- \"{}\" must be one of: {}.\n",
            enum_field,
            CERT_TYPES.join(", ")
        ));
    }
    prompt.push_str(&format!(
        "- If a \"{}\" section is present below, prefer it for {}: general OCR frequently drops letterheads and form codes from the page body.\n",
        REGION_SECTION_HEADER.trim_matches(['=', ' ']),
        priority_fields(kind)
    ));
    prompt.push_str(
        "- The filename often encodes the report or form identifier; use it as a secondary hint when the document text is unclear.\n",
    );

    prompt.push_str(&format!("\nFilename: {}\n", filename));
    prompt.push_str("\nDocument text:\n");
    prompt.push_str(summary_text);
    prompt
}

/// Which fields the header/footer section should win for, per kind.
fn priority_fields(kind: DocumentKind) -> &'static str {
    match kind.profile().form_code_field {
        Some(_) => "\"form_code\" and \"issued_by\"",
        None => "\"issued_by\"",
    }
}

fn field_hint(field: &str) -> &'static str {
    match field {
        "cert_name" => "the certificate's full title",
        "cert_no" => "the certificate number or serial",
        "cert_type" => "the certificate term type",
        "survey_report_name" => "the survey report's full title",
        "survey_report_no" => "the survey report number",
        "test_report_name" => "the test report's full title",
        "test_report_no" => "the test report number",
        "audit_report_name" => "the audit report's full title",
        "audit_report_no" => "the audit report number",
        "audit_type" => "the audit type (e.g. internal, external, interim)",
        "form_code" => "the printed form code, usually in the header or footer",
        "equipment_name" => "the equipment under test",
        "issue_date" => "the date of issue",
        "valid_date" => "the expiry / valid-until date",
        "test_date" => "the date the test was performed",
        "next_test_date" => "the next due date, if printed",
        "issued_by" => "the issuing authority or classification society",
        "ship_name" => "the ship's name as printed",
        "ship_imo" => "the ship's IMO number",
        _ => "the value as printed",
    }
}
