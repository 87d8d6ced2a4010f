//! Stage result payloads and the per-run result bag.

use crate::errors::StageError;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// The payload produced by one stage.
///
/// `StageResult` is immutable once created. Later stages receive it through
/// a shared [`StageResults`] bag and never mutate it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StageResult {
    /// The stage that produced the payload.
    pub stage_name: String,
    /// The structured payload.
    pub payload: serde_json::Value,
}

impl StageResult {
    /// Creates a result from a raw JSON payload.
    #[must_use]
    pub fn new(stage_name: impl Into<String>, payload: serde_json::Value) -> Self {
        Self {
            stage_name: stage_name.into(),
            payload,
        }
    }

    /// Creates a result by serializing a typed payload.
    ///
    /// # Errors
    ///
    /// Returns an internal `StageError` if the payload cannot be serialized.
    pub fn from_serializable<T: Serialize>(
        stage_name: impl Into<String>,
        payload: &T,
    ) -> Result<Self, StageError> {
        let stage_name = stage_name.into();
        let payload = serde_json::to_value(payload).map_err(|e| {
            StageError::internal(&stage_name, format!("failed to encode payload: {e}"))
        })?;
        Ok(Self { stage_name, payload })
    }

    /// Decodes the payload into a typed value.
    ///
    /// # Errors
    ///
    /// Returns an invalid-input `StageError` attributed to `consumer`, the
    /// stage reading the payload.
    pub fn decode<T: DeserializeOwned>(&self, consumer: &str) -> Result<T, StageError> {
        serde_json::from_value(self.payload.clone()).map_err(|e| {
            StageError::invalid_input(
                consumer,
                format!("unreadable output of stage '{}': {e}", self.stage_name),
            )
        })
    }
}

/// Results produced so far in one pipeline run, in production order.
///
/// Cloning is cheap: results are shared behind `Arc`.
#[derive(Debug, Clone, Default)]
pub struct StageResults {
    results: Vec<Arc<StageResult>>,
}

impl StageResults {
    /// Creates an empty result bag.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a result. A later result for the same stage shadows earlier ones.
    pub fn push(&mut self, result: StageResult) {
        self.results.push(Arc::new(result));
    }

    /// Gets the result produced by `stage_name`.
    #[must_use]
    pub fn get(&self, stage_name: &str) -> Option<&StageResult> {
        self.results
            .iter()
            .rev()
            .find(|r| r.stage_name == stage_name)
            .map(AsRef::as_ref)
    }

    /// Gets the result produced by `stage_name`, failing on behalf of `consumer`.
    ///
    /// # Errors
    ///
    /// Returns an internal `StageError` if the stage produced nothing.
    pub fn require(&self, stage_name: &str, consumer: &str) -> Result<&StageResult, StageError> {
        self.get(stage_name).ok_or_else(|| {
            StageError::internal(consumer, format!("missing output of stage '{stage_name}'"))
        })
    }

    /// Returns the most recent result.
    #[must_use]
    pub fn last(&self) -> Option<&StageResult> {
        self.results.last().map(AsRef::as_ref)
    }

    /// Returns the stage names in production order.
    #[must_use]
    pub fn stage_names(&self) -> Vec<&str> {
        self.results.iter().map(|r| r.stage_name.as_str()).collect()
    }

    /// Returns the number of results.
    #[must_use]
    pub fn len(&self) -> usize {
        self.results.len()
    }

    /// Returns true if no stage has produced a result.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.results.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[derive(Debug, PartialEq, Serialize, Deserialize)]
    struct Payload {
        score: f64,
    }

    #[test]
    fn test_typed_payload() {
        let result = StageResult::from_serializable("analysis", &Payload { score: 7.5 }).unwrap();
        assert_eq!(result.payload, json!({"score": 7.5}));

        let decoded: Payload = result.decode("synthesis").unwrap();
        assert_eq!(decoded, Payload { score: 7.5 });
    }

    #[test]
    fn test_decode_failure_is_attributed_to_consumer() {
        let result = StageResult::new("analysis", json!({"unexpected": true}));
        let err = result.decode::<Payload>("synthesis").unwrap_err();

        assert_eq!(err.stage, "synthesis");
        assert!(err.message.contains("analysis"));
    }

    #[test]
    fn test_results_lookup() {
        let mut results = StageResults::new();
        assert!(results.is_empty());

        results.push(StageResult::new("data_extraction", json!({"a": 1})));
        results.push(StageResult::new("analysis", json!({"b": 2})));

        assert_eq!(results.len(), 2);
        assert_eq!(results.stage_names(), vec!["data_extraction", "analysis"]);
        assert_eq!(results.get("analysis").unwrap().payload, json!({"b": 2}));
        assert_eq!(results.last().unwrap().stage_name, "analysis");
        assert!(results.get("synthesis").is_none());
    }

    #[test]
    fn test_require_missing() {
        let results = StageResults::new();
        let err = results.require("analysis", "synthesis").unwrap_err();
        assert_eq!(err.stage, "synthesis");
    }

    #[test]
    fn test_clone_shares_payloads() {
        let mut results = StageResults::new();
        results.push(StageResult::new("data_extraction", json!({})));
        let snapshot = results.clone();
        results.push(StageResult::new("analysis", json!({})));

        assert_eq!(snapshot.len(), 1);
        assert_eq!(results.len(), 2);
    }
}
