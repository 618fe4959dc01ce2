//! Testing utilities including a mock vault service.
//!
//! Useful for testing code built on the client without reaching a real
//! vault.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use crate::service::{ApiError, DetectService};
use crate::types::{DeidentifyRequest, DeidentifyResult, ReidentifyResult};

/// Record of a call made to the mock service.
#[derive(Debug, Clone, PartialEq)]
pub enum MockDetectCall {
    Deidentify { request: DeidentifyRequest },
    Reidentify { text: String },
}

#[derive(Debug, Clone)]
struct MockFailure {
    status: Option<u16>,
    message: String,
    details: Option<serde_json::Value>,
}

impl MockFailure {
    fn from_error(err: &ApiError) -> Self {
        Self {
            status: err.status,
            message: err.message.clone(),
            details: err.details.clone(),
        }
    }

    fn to_error(&self) -> ApiError {
        ApiError {
            status: self.status,
            message: self.message.clone(),
            details: self.details.clone(),
            source: None,
        }
    }
}

/// A mock [`DetectService`] with deterministic, configurable responses.
///
/// Deidentify looks up the input in the per-input table, then falls back to
/// the fixed result, then echoes the input. Reidentify looks up the table
/// and echoes unmapped text.
#[derive(Default)]
pub struct MockDetectService {
    /// Deidentify results by exact input
    deidentifications: Arc<RwLock<HashMap<String, DeidentifyResult>>>,

    /// Result for inputs not in the table
    fixed_result: Arc<RwLock<Option<DeidentifyResult>>>,

    /// Reidentified text by exact input
    reidentifications: Arc<RwLock<HashMap<String, String>>>,

    deidentify_failure: Arc<RwLock<Option<MockFailure>>>,
    reidentify_failure: Arc<RwLock<Option<MockFailure>>>,

    /// Call tracking for assertions
    calls: Arc<RwLock<Vec<MockDetectCall>>>,
}

impl MockDetectService {
    pub fn new() -> Self {
        Self::default()
    }

    /// Return `processed_text` for every deidentify call.
    pub fn with_deidentified_text(self, processed_text: impl Into<String>) -> Self {
        self.with_deidentify_result(DeidentifyResult::new(processed_text))
    }

    /// Return `result` for every deidentify call without a per-input entry.
    pub fn with_deidentify_result(self, result: DeidentifyResult) -> Self {
        *self.fixed_result.write().unwrap() = Some(result);
        self
    }

    /// Deidentify `input` to `processed_text`.
    pub fn with_deidentification(
        self,
        input: impl Into<String>,
        processed_text: impl Into<String>,
    ) -> Self {
        self.deidentifications
            .write()
            .unwrap()
            .insert(input.into(), DeidentifyResult::new(processed_text));
        self
    }

    /// Reidentify `tokenized` to `restored`.
    pub fn with_reidentification(
        self,
        tokenized: impl Into<String>,
        restored: impl Into<String>,
    ) -> Self {
        self.reidentifications
            .write()
            .unwrap()
            .insert(tokenized.into(), restored.into());
        self
    }

    /// Fail every deidentify call with a copy of `err`.
    pub fn with_deidentify_failure(self, err: ApiError) -> Self {
        *self.deidentify_failure.write().unwrap() = Some(MockFailure::from_error(&err));
        self
    }

    /// Fail every reidentify call with a copy of `err`.
    pub fn with_reidentify_failure(self, err: ApiError) -> Self {
        *self.reidentify_failure.write().unwrap() = Some(MockFailure::from_error(&err));
        self
    }

    /// Get all calls made to this mock.
    pub fn calls(&self) -> Vec<MockDetectCall> {
        self.calls.read().unwrap().clone()
    }

    pub fn deidentify_calls(&self) -> usize {
        self.count(|call| matches!(call, MockDetectCall::Deidentify { .. }))
    }

    pub fn reidentify_calls(&self) -> usize {
        self.count(|call| matches!(call, MockDetectCall::Reidentify { .. }))
    }

    /// Clear call history.
    pub fn clear_calls(&self) {
        self.calls.write().unwrap().clear();
    }

    fn count(&self, predicate: impl Fn(&MockDetectCall) -> bool) -> usize {
        self.calls.read().unwrap().iter().filter(|c| predicate(c)).count()
    }

    fn record(&self, call: MockDetectCall) {
        self.calls.write().unwrap().push(call);
    }
}

#[async_trait]
impl DetectService for MockDetectService {
    async fn deidentify_text(
        &self,
        request: DeidentifyRequest,
    ) -> Result<DeidentifyResult, ApiError> {
        self.record(MockDetectCall::Deidentify {
            request: request.clone(),
        });

        if let Some(failure) = self.deidentify_failure.read().unwrap().as_ref() {
            return Err(failure.to_error());
        }

        if let Some(result) = self.deidentifications.read().unwrap().get(&request.text) {
            return Ok(result.clone());
        }

        let fixed = self.fixed_result.read().unwrap().clone();
        Ok(fixed.unwrap_or_else(|| DeidentifyResult::new(request.text)))
    }

    async fn reidentify_text(&self, text: &str) -> Result<ReidentifyResult, ApiError> {
        self.record(MockDetectCall::Reidentify {
            text: text.to_string(),
        });

        if let Some(failure) = self.reidentify_failure.read().unwrap().as_ref() {
            return Err(failure.to_error());
        }

        let restored = self
            .reidentifications
            .read()
            .unwrap()
            .get(text)
            .cloned()
            .unwrap_or_else(|| text.to_string());
        Ok(ReidentifyResult::new(restored))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::DeidentifyOptions;

    #[tokio::test]
    async fn test_lookup_order() {
        let mock = MockDetectService::new()
            .with_deidentified_text("[FIXED]")
            .with_deidentification("ann", "[NAME_1]");

        let mapped = mock
            .deidentify_text(DeidentifyRequest::new("ann", &DeidentifyOptions::default()))
            .await
            .unwrap();
        assert_eq!(mapped.processed_text, "[NAME_1]");

        let fixed = mock
            .deidentify_text(DeidentifyRequest::new("bob", &DeidentifyOptions::default()))
            .await
            .unwrap();
        assert_eq!(fixed.processed_text, "[FIXED]");

        assert_eq!(mock.deidentify_calls(), 2);
        assert_eq!(mock.reidentify_calls(), 0);
    }

    #[tokio::test]
    async fn test_unmapped_reidentify_echoes() {
        let mock = MockDetectService::new();
        let result = mock.reidentify_text("plain").await.unwrap();
        assert_eq!(result.processed_text, "plain");

        mock.clear_calls();
        assert!(mock.calls().is_empty());
    }

    #[tokio::test]
    async fn test_failures_are_repeatable() {
        let mock = MockDetectService::new()
            .with_reidentify_failure(ApiError::new("detokenize failed").with_status(500));

        for _ in 0..2 {
            let err = mock.reidentify_text("x").await.unwrap_err();
            assert_eq!(err.status, Some(500));
            assert_eq!(err.message, "detokenize failed");
        }
    }
}
