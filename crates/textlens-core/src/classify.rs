use std::time::Duration;

use crate::cache::{CacheStore, Namespace};
use crate::error::AppError;
use crate::json_extract::extract_record;
use crate::models::ClassificationResult;
use crate::traits::Classifier;

pub const DEFAULT_MAX_RETRIES: u32 = 3;
pub const DEFAULT_ATTEMPT_TIMEOUT: Duration = Duration::from_secs(120);

/// Result of a single classification attempt.
#[derive(Debug, Clone, PartialEq)]
pub enum AttemptOutcome {
    Success(ClassificationResult),
    /// Worth another attempt: transport failure, timeout, unparseable answer.
    Retryable(String),
    /// No attempt can succeed (e.g. rejected credentials).
    Fatal(String),
}

/// Classifies one image URL with caching and a bounded, immediate retry loop.
#[derive(Clone)]
pub struct ClassificationClient<C: Classifier> {
    classifier: C,
    cache: Option<CacheStore>,
    max_retries: u32,
    attempt_timeout: Duration,
}

impl<C: Classifier> ClassificationClient<C> {
    pub fn new(classifier: C) -> Self {
        Self {
            classifier,
            cache: None,
            max_retries: DEFAULT_MAX_RETRIES,
            attempt_timeout: DEFAULT_ATTEMPT_TIMEOUT,
        }
    }

    pub fn with_cache(mut self, cache: impl Into<Option<CacheStore>>) -> Self {
        self.cache = cache.into();
        self
    }

    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    pub fn with_attempt_timeout(mut self, timeout: Duration) -> Self {
        self.attempt_timeout = timeout;
        self
    }

    /// Returns the cached result if fresh; otherwise calls the classifier up to
    /// `max_retries` times. Never fails: exhausted or fatal attempts yield
    /// [`ClassificationResult::failed`].
    pub async fn classify(&self, image_url: &str) -> ClassificationResult {
        if let Some(cache) = &self.cache {
            if let Some(cached) =
                cache.get_json::<ClassificationResult>(Namespace::Classification, image_url)
            {
                tracing::info!(url = %image_url, "Using cached classification");
                return cached;
            }
        }

        tracing::info!(url = %image_url, "Classifying image");
        let mut last_reason = None;

        for attempt in 0..self.max_retries {
            if attempt > 0 {
                tracing::info!(
                    url = %image_url,
                    attempt,
                    max_retries = self.max_retries,
                    "Retrying classification"
                );
            }

            match self.attempt(image_url).await {
                AttemptOutcome::Success(result) => {
                    tracing::info!(url = %image_url, attempt, "Classification complete");
                    self.store(image_url, &result);
                    return result;
                }
                AttemptOutcome::Retryable(reason) => {
                    tracing::warn!(
                        url = %image_url,
                        attempt,
                        %reason,
                        "Classification attempt failed"
                    );
                    last_reason = Some(reason);
                }
                AttemptOutcome::Fatal(reason) => {
                    tracing::error!(
                        url = %image_url,
                        attempt,
                        %reason,
                        "Classification failed permanently"
                    );
                    return ClassificationResult::failed(reason);
                }
            }
        }

        let reason = last_reason.unwrap_or_else(|| "Maximum retries exceeded".to_string());
        tracing::error!(
            url = %image_url,
            max_retries = self.max_retries,
            %reason,
            "Giving up on image"
        );
        ClassificationResult::failed(reason)
    }

    /// One request to the classifier, bounded by the attempt timeout.
    pub async fn attempt(&self, image_url: &str) -> AttemptOutcome {
        let call = self.classifier.classify(image_url);
        match tokio::time::timeout(self.attempt_timeout, call).await {
            Ok(Ok(raw)) => parse_response(&raw),
            Ok(Err(e)) if e.is_permanent() => {
                AttemptOutcome::Fatal(format!("Classification request failed: {e}"))
            }
            Ok(Err(e)) => AttemptOutcome::Retryable(format!("Classification request failed: {e}")),
            Err(_) => AttemptOutcome::Retryable(
                AppError::Timeout(self.attempt_timeout.as_secs()).to_string(),
            ),
        }
    }

    fn store(&self, image_url: &str, result: &ClassificationResult) {
        if let Some(cache) = &self.cache {
            if let Err(e) = cache.put_json(Namespace::Classification, image_url, result) {
                tracing::warn!(url = %image_url, error = %e, "Failed to cache classification");
            }
        }
    }
}

/// Turns raw classifier text into an outcome.
pub fn parse_response(raw: &str) -> AttemptOutcome {
    let Some(extracted) = extract_record(raw) else {
        return AttemptOutcome::Retryable(AppError::RecordNotFound.to_string());
    };

    let strategy = extracted.strategy;
    match serde_json::from_value::<ClassificationResult>(extracted.into_value()) {
        Ok(mut result) => {
            // An "error" key in the model's own answer is not a pipeline failure.
            result.error = None;
            tracing::debug!(%strategy, "Parsed classification record");
            AttemptOutcome::Success(result)
        }
        Err(e) => AttemptOutcome::Retryable(format!("Record has unexpected shape: {e}")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::{MockClassifier, compliant_answer};
    use chrono::TimeDelta;
    use tempfile::TempDir;

    const IMAGE: &str = "https://example.com/banner.png";

    fn open_cache(dir: &TempDir) -> CacheStore {
        CacheStore::open(dir.path(), TimeDelta::days(7)).unwrap()
    }

    #[tokio::test]
    async fn success_on_first_attempt() {
        let classifier = MockClassifier::answering(&compliant_answer());
        let client = ClassificationClient::new(classifier.clone());

        let result = client.classify(IMAGE).await;
        assert!(!result.is_error());
        assert!(result.contains_text);
        assert!(result.compliant);
        assert_eq!(classifier.call_count(), 1);
        assert_eq!(classifier.calls(), vec![IMAGE.to_string()]);
    }

    #[tokio::test]
    async fn prose_wrapped_answer_is_accepted() {
        let raw = format!("Sure! Here is the analysis:\n```json\n{}\n```", compliant_answer());
        let client = ClassificationClient::new(MockClassifier::answering(&raw));
        assert!(!client.classify(IMAGE).await.is_error());
    }

    #[tokio::test]
    async fn unparseable_answers_exhaust_exactly_max_retries() {
        let classifier = MockClassifier::answering("I am unable to analyse this image.");
        let client = ClassificationClient::new(classifier.clone()).with_max_retries(3);

        let result = client.classify(IMAGE).await;
        assert!(result.is_error());
        assert_eq!(classifier.call_count(), 3);
        assert_eq!(result.reason, AppError::RecordNotFound.to_string());
        assert!(!result.contains_text);
        assert!(!result.compliant);
    }

    #[tokio::test]
    async fn transient_failure_then_success() {
        let classifier = MockClassifier::with_responses(vec![
            Err(AppError::NetworkError("connection reset".into())),
            Ok(compliant_answer()),
        ]);
        let client = ClassificationClient::new(classifier.clone());

        let result = client.classify(IMAGE).await;
        assert!(!result.is_error());
        assert_eq!(classifier.call_count(), 2);
    }

    #[tokio::test]
    async fn service_errors_are_reported_after_last_attempt() {
        let classifier = MockClassifier::with_responses(vec![
            Err(AppError::RateLimitExceeded),
            Err(AppError::RateLimitExceeded),
        ]);
        let client = ClassificationClient::new(classifier.clone()).with_max_retries(2);

        let result = client.classify(IMAGE).await;
        assert!(result.is_error());
        assert!(result.error.as_deref().unwrap().contains("Rate limit exceeded"));
        assert_eq!(classifier.call_count(), 2);
    }

    #[tokio::test]
    async fn fatal_error_stops_immediately() {
        let classifier = MockClassifier::with_responses(vec![Err(AppError::LlmError {
            message: "Incorrect API key provided".into(),
            status_code: 401,
            retryable: false,
        })]);
        let client = ClassificationClient::new(classifier.clone());

        let result = client.classify(IMAGE).await;
        assert!(result.is_error());
        assert!(result.reason.contains("Incorrect API key"));
        assert_eq!(classifier.call_count(), 1);
    }

    #[tokio::test]
    async fn zero_retries_never_calls_the_service() {
        let classifier = MockClassifier::answering(&compliant_answer());
        let client = ClassificationClient::new(classifier.clone()).with_max_retries(0);

        let result = client.classify(IMAGE).await;
        assert!(result.is_error());
        assert_eq!(classifier.call_count(), 0);
    }

    #[tokio::test]
    async fn hung_call_times_out_and_is_retried() {
        let classifier = MockClassifier::answering(&compliant_answer())
            .with_delay(Duration::from_millis(500));
        let client = ClassificationClient::new(classifier.clone())
            .with_max_retries(2)
            .with_attempt_timeout(Duration::from_millis(20));

        let result = client.classify(IMAGE).await;
        assert!(result.is_error());
        assert!(result.reason.contains("timed out"));
        assert_eq!(classifier.call_count(), 2);
    }

    #[tokio::test]
    async fn success_is_cached_and_reused_without_network() {
        let dir = TempDir::new().unwrap();
        let cache = open_cache(&dir);
        let classifier = MockClassifier::answering(&compliant_answer());
        let client = ClassificationClient::new(classifier.clone()).with_cache(cache.clone());

        let first = client.classify(IMAGE).await;
        assert!(cache.is_valid(Namespace::Classification, IMAGE));

        let second = client.classify(IMAGE).await;
        assert_eq!(first, second);
        assert_eq!(classifier.call_count(), 1);
    }

    #[tokio::test]
    async fn preexisting_cache_entry_bypasses_classifier() {
        let dir = TempDir::new().unwrap();
        let cache = open_cache(&dir);
        let cached = ClassificationResult {
            contains_text: true,
            is_logo: true,
            compliant: true,
            reason: "Company logo".into(),
            ..Default::default()
        };
        cache
            .put_json(Namespace::Classification, IMAGE, &cached)
            .unwrap();

        let classifier = MockClassifier::answering("never used");
        let client = ClassificationClient::new(classifier.clone()).with_cache(cache);

        assert_eq!(client.classify(IMAGE).await, cached);
        assert_eq!(classifier.call_count(), 0);
    }

    #[tokio::test]
    async fn failures_are_not_cached() {
        let dir = TempDir::new().unwrap();
        let cache = open_cache(&dir);
        let client = ClassificationClient::new(MockClassifier::answering("no json"))
            .with_cache(cache.clone())
            .with_max_retries(1);

        assert!(client.classify(IMAGE).await.is_error());
        assert!(!cache.is_valid(Namespace::Classification, IMAGE));
    }

    #[tokio::test]
    async fn failed_cache_write_still_returns_result() {
        let dir = TempDir::new().unwrap();
        let cache = open_cache(&dir);
        std::fs::remove_dir_all(dir.path().join(Namespace::Classification.as_str())).unwrap();

        let classifier = MockClassifier::answering(&compliant_answer());
        let client = ClassificationClient::new(classifier.clone()).with_cache(cache.clone());

        let result = client.classify(IMAGE).await;
        assert!(!result.is_error());
        assert!(result.compliant);
        assert_eq!(classifier.call_count(), 1);
        assert!(!cache.is_valid(Namespace::Classification, IMAGE));
    }

    #[tokio::test]
    async fn null_judgments_are_accepted_on_first_attempt() {
        let classifier = MockClassifier::answering(r#"{"contains_text": true, "is_logo": null}"#);
        let client = ClassificationClient::new(classifier.clone());

        let result = client.classify(IMAGE).await;
        assert!(!result.is_error());
        assert!(result.contains_text);
        assert!(!result.is_logo);
        assert_eq!(classifier.call_count(), 1);
    }

    #[test]
    fn parse_response_treats_null_booleans_as_false() {
        let raw = r#"{"contains_text": true, "detected_text": "SALE", "is_essential": null,
            "can_be_html_css": null, "compliant": null}"#;
        let AttemptOutcome::Success(result) = parse_response(raw) else {
            panic!("expected success");
        };
        assert!(result.contains_text);
        assert_eq!(result.detected_text, "SALE");
        assert!(!result.is_essential);
        assert!(!result.can_be_html_css);
        assert!(!result.compliant);
    }

    #[test]
    fn parse_response_outcomes() {
        assert!(matches!(
            parse_response(&compliant_answer()),
            AttemptOutcome::Success(_)
        ));
        assert_eq!(
            parse_response("nothing here"),
            AttemptOutcome::Retryable(AppError::RecordNotFound.to_string())
        );
        assert!(matches!(
            parse_response(r#"{"contains_text": "maybe"}"#),
            AttemptOutcome::Retryable(reason) if reason.contains("unexpected shape")
        ));
    }

    #[test]
    fn parse_response_ignores_model_error_key() {
        let AttemptOutcome::Success(result) =
            parse_response(r#"{"contains_text": false, "error": "none"}"#)
        else {
            panic!("expected success");
        };
        assert!(!result.is_error());
    }
}
