//! Document kinds and their static extraction profiles.
//!
//! Each kind the pipeline understands maps to a fixed profile: the field
//! key set the extraction prompt enumerates, the critical subset that must
//! be present for automatic processing, and the store collection consulted
//! by duplicate detection. Dispatch is a closed `match`, never a string
//! lookup, so an unhandled kind is a compile error.

use serde::{Deserialize, Serialize};

/// The document categories the pipeline can analyze.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DocumentKind {
    Certificate,
    SurveyReport,
    TestReport,
    AuditReport,
    AuditCertificate,
}

/// Accepted certificate-type values; anything else coerces to the default.
pub const CERT_TYPES: &[&str] = &["Full Term", "Interim", "Provisional", "Short Term"];

/// Default certificate type when the model returns something off-list.
pub const DEFAULT_CERT_TYPE: &str = "Full Term";

/// Static per-kind extraction profile.
#[derive(Debug)]
pub struct KindProfile {
    /// Human label used in prompts and progress output.
    pub label: &'static str,
    /// Document-store collection holding existing records of this kind.
    pub collection: &'static str,
    /// Every field key the extraction prompt enumerates.
    pub fields: &'static [&'static str],
    /// Fields whose absence alone disqualifies automatic processing.
    pub critical_fields: &'static [&'static str],
    /// Fields normalized to ISO `YYYY-MM-DD`.
    pub date_fields: &'static [&'static str],
    /// Field holding the document's display name (duplicate key part 1).
    pub name_field: &'static str,
    /// Field holding the document's serial number (duplicate key part 2).
    pub no_field: &'static str,
    /// Closed-set field coerced to a canonical default when off-list.
    pub enum_field: Option<&'static str>,
    /// Form-code field prioritized from the header/footer scan, if any.
    pub form_code_field: Option<&'static str>,
}

const CERTIFICATE: KindProfile = KindProfile {
    label: "certificate",
    collection: "certificates",
    fields: &[
        "cert_name",
        "cert_no",
        "cert_type",
        "issue_date",
        "valid_date",
        "issued_by",
        "ship_name",
        "ship_imo",
    ],
    critical_fields: &["cert_name", "cert_no"],
    date_fields: &["issue_date", "valid_date"],
    name_field: "cert_name",
    no_field: "cert_no",
    enum_field: Some("cert_type"),
    form_code_field: None,
};

const SURVEY_REPORT: KindProfile = KindProfile {
    label: "survey report",
    collection: "survey_reports",
    fields: &[
        "survey_report_name",
        "survey_report_no",
        "form_code",
        "issue_date",
        "issued_by",
        "ship_name",
        "ship_imo",
    ],
    critical_fields: &["survey_report_name", "survey_report_no"],
    date_fields: &["issue_date"],
    name_field: "survey_report_name",
    no_field: "survey_report_no",
    enum_field: None,
    form_code_field: Some("form_code"),
};

const TEST_REPORT: KindProfile = KindProfile {
    label: "test report",
    collection: "test_reports",
    fields: &[
        "test_report_name",
        "test_report_no",
        "form_code",
        "equipment_name",
        "test_date",
        "next_test_date",
        "issued_by",
        "ship_name",
        "ship_imo",
    ],
    critical_fields: &["test_report_name", "test_report_no"],
    date_fields: &["test_date", "next_test_date"],
    name_field: "test_report_name",
    no_field: "test_report_no",
    enum_field: None,
    form_code_field: Some("form_code"),
};

const AUDIT_REPORT: KindProfile = KindProfile {
    label: "audit report",
    collection: "audit_reports",
    fields: &[
        "audit_report_name",
        "audit_report_no",
        "form_code",
        "audit_type",
        "issue_date",
        "issued_by",
        "ship_name",
        "ship_imo",
    ],
    critical_fields: &["audit_report_name", "audit_report_no"],
    date_fields: &["issue_date"],
    name_field: "audit_report_name",
    no_field: "audit_report_no",
    enum_field: None,
    form_code_field: Some("form_code"),
};

const AUDIT_CERTIFICATE: KindProfile = KindProfile {
    label: "audit certificate",
    collection: "audit_certificates",
    fields: &[
        "cert_name",
        "cert_no",
        "cert_type",
        "issue_date",
        "valid_date",
        "issued_by",
        "ship_name",
        "ship_imo",
    ],
    critical_fields: &["cert_name", "cert_no"],
    date_fields: &["issue_date", "valid_date"],
    name_field: "cert_name",
    no_field: "cert_no",
    enum_field: Some("cert_type"),
    form_code_field: None,
};

impl DocumentKind {
    /// The static extraction profile for this kind.
    pub fn profile(&self) -> &'static KindProfile {
        match self {
            DocumentKind::Certificate => &CERTIFICATE,
            DocumentKind::SurveyReport => &SURVEY_REPORT,
            DocumentKind::TestReport => &TEST_REPORT,
            DocumentKind::AuditReport => &AUDIT_REPORT,
            DocumentKind::AuditCertificate => &AUDIT_CERTIFICATE,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            DocumentKind::Certificate => "certificate",
            DocumentKind::SurveyReport => "survey_report",
            DocumentKind::TestReport => "test_report",
            DocumentKind::AuditReport => "audit_report",
            DocumentKind::AuditCertificate => "audit_certificate",
        }
    }
}

impl std::fmt::Display for DocumentKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for DocumentKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "certificate" => Ok(DocumentKind::Certificate),
            "survey_report" => Ok(DocumentKind::SurveyReport),
            "test_report" => Ok(DocumentKind::TestReport),
            "audit_report" => Ok(DocumentKind::AuditReport),
            "audit_certificate" => Ok(DocumentKind::AuditCertificate),
            other => Err(format!(
                "unknown document kind: '{}' (expected: certificate, survey_report, test_report, audit_report, audit_certificate)",
                other
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn critical_fields_are_declared_fields() {
        for kind in [
            DocumentKind::Certificate,
            DocumentKind::SurveyReport,
            DocumentKind::TestReport,
            DocumentKind::AuditReport,
            DocumentKind::AuditCertificate,
        ] {
            let p = kind.profile();
            for crit in p.critical_fields {
                assert!(p.fields.contains(crit), "{}: {} not declared", kind, crit);
            }
            assert!(p.fields.contains(&p.name_field));
            assert!(p.fields.contains(&p.no_field));
        }
    }

    #[test]
    fn kind_roundtrips_through_str() {
        let kind = DocumentKind::from_str("survey_report").unwrap();
        assert_eq!(kind, DocumentKind::SurveyReport);
        assert_eq!(kind.as_str(), "survey_report");
        assert!(DocumentKind::from_str("invoice").is_err());
    }
}
