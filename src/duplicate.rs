//! Duplicate detection against the external document store.
//!
//! Read-only and advisory: the detector never mutates anything, it only
//! tells the caller how similar an existing record looks so the caller
//! can offer skip/replace/keep-both.

use std::sync::Arc;

use serde_json::{json, Value};

use crate::error::AnalysisError;
use crate::models::{DuplicateVerdict, ExtractedFields};
use crate::traits::DocumentStore;

/// Similarity when both name and number match an existing record.
const SIMILARITY_EXACT: f64 = 1.0;
/// Similarity when only the name matches (number absent on either side).
const SIMILARITY_NAME_ONLY: f64 = 0.8;

pub struct DuplicateDetector {
    store: Arc<dyn DocumentStore>,
}

impl DuplicateDetector {
    pub fn new(store: Arc<dyn DocumentStore>) -> Self {
        Self { store }
    }

    /// Look for an existing record of this kind with the same
    /// `(ship_id, document_name)` and score its similarity.
    pub async fn detect(
        &self,
        ship_id: &str,
        fields: &ExtractedFields,
    ) -> Result<DuplicateVerdict, AnalysisError> {
        let profile = fields.kind.profile();

        let name = match fields.document_name() {
            Some(name) => name,
            // Without a name there is nothing to match on.
            None => return Ok(DuplicateVerdict::none()),
        };

        let mut filter = serde_json::Map::new();
        filter.insert("ship_id".to_string(), json!(ship_id));
        filter.insert(profile.name_field.to_string(), json!(name));
        let filter = Value::Object(filter);
        let existing = self
            .store
            .find_one(profile.collection, &filter)
            .await
            .map_err(|e| AnalysisError::StoreUnavailable(e.to_string()))?;

        let record = match existing {
            Some(record) => record,
            None => return Ok(DuplicateVerdict::none()),
        };

        let existing_id = record_id(&record);
        let existing_no = record
            .get(profile.no_field)
            .and_then(Value::as_str)
            .map(str::trim)
            .filter(|s| !s.is_empty());
        let new_no = fields.document_no();

        let verdict = match (new_no, existing_no) {
            (Some(a), Some(b)) if a.eq_ignore_ascii_case(b) => DuplicateVerdict {
                is_duplicate: true,
                existing_id,
                similarity: SIMILARITY_EXACT,
            },
            // Same name, both numbers present but different: a successive
            // issue of the same certificate series, not a duplicate.
            (Some(_), Some(_)) => DuplicateVerdict::none(),
            _ => DuplicateVerdict {
                is_duplicate: true,
                existing_id,
                similarity: SIMILARITY_NAME_ONLY,
            },
        };
        Ok(verdict)
    }
}

fn record_id(record: &Value) -> Option<String> {
    record
        .get("_id")
        .or_else(|| record.get("id"))
        .and_then(Value::as_str)
        .map(str::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kind::DocumentKind;
    use anyhow::Result;
    use async_trait::async_trait;

    struct FixedStore(Option<Value>);

    #[async_trait]
    impl DocumentStore for FixedStore {
        async fn find_one(&self, _collection: &str, _filter: &Value) -> Result<Option<Value>> {
            Ok(self.0.clone())
        }
    }

    struct FailingStore;

    #[async_trait]
    impl DocumentStore for FailingStore {
        async fn find_one(&self, _collection: &str, _filter: &Value) -> Result<Option<Value>> {
            anyhow::bail!("connection refused")
        }
    }

    fn certificate(name: Option<&str>, no: Option<&str>) -> ExtractedFields {
        let mut fields = ExtractedFields::empty(DocumentKind::Certificate);
        fields.set("cert_name", name.map(str::to_string));
        fields.set("cert_no", no.map(str::to_string));
        fields
    }

    #[tokio::test]
    async fn name_and_number_match_is_exact_duplicate() {
        let detector = DuplicateDetector::new(Arc::new(FixedStore(Some(json!({
            "_id": "rec-1", "cert_name": "ISM Certificate", "cert_no": "A123"
        })))));
        let verdict = detector
            .detect("ship-1", &certificate(Some("ISM Certificate"), Some("A123")))
            .await
            .unwrap();
        assert!(verdict.is_duplicate);
        assert_eq!(verdict.similarity, 1.0);
        assert_eq!(verdict.existing_id.as_deref(), Some("rec-1"));
    }

    #[tokio::test]
    async fn name_match_without_numbers_scores_point_eight() {
        let detector = DuplicateDetector::new(Arc::new(FixedStore(Some(json!({
            "_id": "rec-2", "cert_name": "ISM Certificate"
        })))));
        let verdict = detector
            .detect("ship-1", &certificate(Some("ISM Certificate"), None))
            .await
            .unwrap();
        assert!(verdict.is_duplicate);
        assert_eq!(verdict.similarity, 0.8);
    }

    #[tokio::test]
    async fn different_numbers_are_not_a_duplicate() {
        let detector = DuplicateDetector::new(Arc::new(FixedStore(Some(json!({
            "_id": "rec-3", "cert_name": "ISM Certificate", "cert_no": "B456"
        })))));
        let verdict = detector
            .detect("ship-1", &certificate(Some("ISM Certificate"), Some("A123")))
            .await
            .unwrap();
        assert!(!verdict.is_duplicate);
        assert_eq!(verdict.similarity, 0.0);
    }

    #[tokio::test]
    async fn no_existing_record_is_clean() {
        let detector = DuplicateDetector::new(Arc::new(FixedStore(None)));
        let verdict = detector
            .detect("ship-1", &certificate(Some("ISM Certificate"), Some("A123")))
            .await
            .unwrap();
        assert!(!verdict.is_duplicate);
        assert!(verdict.existing_id.is_none());
    }

    #[tokio::test]
    async fn missing_document_name_skips_the_query() {
        let detector = DuplicateDetector::new(Arc::new(FailingStore));
        // The failing store would error if queried; no name means no query.
        let verdict = detector
            .detect("ship-1", &certificate(None, Some("A123")))
            .await
            .unwrap();
        assert!(!verdict.is_duplicate);
    }

    #[tokio::test]
    async fn store_failure_is_a_tagged_error() {
        let detector = DuplicateDetector::new(Arc::new(FailingStore));
        let err = detector
            .detect("ship-1", &certificate(Some("ISM Certificate"), None))
            .await
            .unwrap_err();
        assert!(matches!(err, AnalysisError::StoreUnavailable(_)));
    }
}
