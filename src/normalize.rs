//! Field normalizers applied after model extraction.
//!
//! Everything here is lenient: an unparseable value becomes `None` (or the
//! kind's canonical default for closed-set fields), never an error. The
//! quality gate downstream decides whether the result is still usable.

use chrono::{Months, NaiveDate};

use crate::config::IntervalConfig;

/// Date formats tried in order. Day-first variants come before
/// month-first: these documents are issued almost exclusively by non-US
/// flag states and class societies.
const DATE_FORMATS: &[&str] = &[
    "%Y-%m-%d",
    "%d/%m/%Y",
    "%d.%m.%Y",
    "%d-%m-%Y",
    "%d %b %Y",
    "%d %B %Y",
    "%b %d, %Y",
    "%B %d, %Y",
    "%Y/%m/%d",
    "%m/%d/%Y",
    "%Y%m%d",
];

/// Parse a date leniently and re-emit ISO `YYYY-MM-DD`; `None` if no
/// known format matches.
pub fn normalize_date(raw: &str) -> Option<String> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return None;
    }
    for format in DATE_FORMATS {
        if let Ok(date) = NaiveDate::parse_from_str(trimmed, format) {
            return Some(date.format("%Y-%m-%d").to_string());
        }
    }
    None
}

/// Normalize an IMO number to a bare 7-digit string.
///
/// Strips whitespace and a leading "IMO" literal (any case, with or
/// without a separator). Anything that does not leave exactly 7 digits is
/// rejected: hull names change, the IMO number does not, so a mangled one
/// is worse than none.
pub fn normalize_imo(raw: &str) -> Option<String> {
    let mut s = raw.trim().to_string();
    let upper = s.to_uppercase();
    if let Some(rest) = upper.strip_prefix("IMO") {
        s = rest.trim_start_matches([' ', ':', '.', '-']).to_string();
    }
    let digits: String = s.chars().filter(|c| !c.is_whitespace()).collect();
    if digits.len() == 7 && digits.chars().all(|c| c.is_ascii_digit()) {
        Some(digits)
    } else {
        None
    }
}

/// Coerce a closed-set field value to one of the accepted spellings,
/// matching case-insensitively; off-list values take the default.
pub fn coerce_enum(raw: &str, accepted: &[&str], default: &str) -> String {
    let trimmed = raw.trim();
    accepted
        .iter()
        .find(|a| a.eq_ignore_ascii_case(trimmed))
        .map(|a| a.to_string())
        .unwrap_or_else(|| default.to_string())
}

/// Immutable equipment-to-service-interval lookup for test-report due
/// dates. Built from config once per analyzer; keys match as lowercase
/// substrings of the extracted equipment name.
#[derive(Debug, Clone)]
pub struct IntervalTable {
    months: Vec<(String, u32)>,
    fallback_months: u32,
}

impl IntervalTable {
    pub fn from_config(config: &IntervalConfig) -> Self {
        Self {
            months: config
                .months
                .iter()
                .map(|(k, v)| (k.to_lowercase(), *v))
                .collect(),
            fallback_months: config.fallback_months,
        }
    }

    /// Service interval in months for an equipment name.
    pub fn interval_months(&self, equipment: &str) -> u32 {
        let needle = equipment.to_lowercase();
        self.months
            .iter()
            .find(|(key, _)| needle.contains(key.as_str()))
            .map(|(_, months)| *months)
            .unwrap_or(self.fallback_months)
    }

    /// Next due date (ISO) for equipment tested on `test_date` (ISO).
    pub fn next_due(&self, equipment: &str, test_date: &str) -> Option<String> {
        let date = NaiveDate::parse_from_str(test_date, "%Y-%m-%d").ok()?;
        let months = self.interval_months(equipment);
        date.checked_add_months(Months::new(months))
            .map(|d| d.format("%Y-%m-%d").to_string())
    }
}
