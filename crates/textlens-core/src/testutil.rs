//! Test utilities: mock implementations of all core traits.
//!
//! Handwritten mocks for dependency injection in unit tests.
//! All mocks use `Arc<Mutex<_>>` for interior mutability, allowing
//! test assertions on recorded calls.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use crate::batch::{BatchEvent, BatchReporter};
use crate::document::ElementTree;
use crate::error::AppError;
use crate::models::Candidate;
use crate::traits::{Classifier, Fetcher, MarkupParser};

/// A well-formed classifier answer for an image with compliant text.
pub fn compliant_answer() -> String {
    serde_json::json!({
        "contains_text": true,
        "detected_text": "Spring Sale",
        "purpose": "Promotional banner",
        "has_significant_visual_content": true,
        "visual_content_description": "Photo of flowers",
        "is_logo": false,
        "is_essential": true,
        "essential_reason": "Text is part of the artwork",
        "is_customizable": false,
        "can_be_html_css": false,
        "has_text_alternative": true,
        "compliant": true,
        "reason": "Text is integral to the image",
        "recommendations": []
    })
    .to_string()
}

/// Candidate for an `img` directly under `body`.
pub fn candidate(page_url: &str, image_url: &str) -> Candidate {
    let name = image_url.rsplit('/').next().unwrap_or(image_url);
    Candidate {
        source_page_url: page_url.to_string(),
        raw_markup: format!("<img src=\"{name}\">"),
        absolute_url: image_url.to_string(),
        alt_text: String::new(),
        locator: "/html/body/img".to_string(),
    }
}

// ---------------------------------------------------------------------------
// MockFetcher
// ---------------------------------------------------------------------------

/// Mock fetcher that returns a configurable response.
#[derive(Clone)]
pub struct MockFetcher {
    /// Queue of responses. Each call pops the first element.
    /// If empty, returns a default HTML string.
    responses: Arc<Mutex<Vec<Result<String, AppError>>>>,
    calls: Arc<Mutex<Vec<String>>>,
}

impl MockFetcher {
    pub fn new(html: &str) -> Self {
        Self::with_responses(vec![Ok(html.to_string())])
    }

    pub fn with_error(error: AppError) -> Self {
        Self::with_responses(vec![Err(error)])
    }

    pub fn with_responses(responses: Vec<Result<String, AppError>>) -> Self {
        Self {
            responses: Arc::new(Mutex::new(responses)),
            calls: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }
}

impl Fetcher for MockFetcher {
    async fn fetch(&self, url: &str) -> Result<String, AppError> {
        self.calls.lock().unwrap().push(url.to_string());
        let mut responses = self.responses.lock().unwrap();
        if responses.is_empty() {
            Ok("<html><body>default</body></html>".to_string())
        } else {
            responses.remove(0)
        }
    }
}

// ---------------------------------------------------------------------------
// MockParser
// ---------------------------------------------------------------------------

/// Mock parser that builds `html > body > img*`, one `img` per `src="..."`
/// occurrence in the markup.
#[derive(Clone, Default)]
pub struct MockParser {
    parses: Arc<AtomicUsize>,
}

impl MockParser {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn parse_count(&self) -> usize {
        self.parses.load(Ordering::SeqCst)
    }
}

impl MarkupParser for MockParser {
    type Document = ElementTree;

    fn parse(&self, markup: &str) -> ElementTree {
        self.parses.fetch_add(1, Ordering::SeqCst);
        let mut tree = ElementTree::new();
        let html = tree.push(None, "html", &[]);
        let body = tree.push(Some(html), "body", &[]);
        for piece in markup.split("src=\"").skip(1) {
            if let Some(src) = piece.split('"').next() {
                tree.push(Some(body), "img", &[("src", src)]);
            }
        }
        tree
    }
}

// ---------------------------------------------------------------------------
// MockClassifier
// ---------------------------------------------------------------------------

/// Mock classifier with a response queue, a fallback answer, and in-flight
/// tracking for concurrency assertions.
#[derive(Clone)]
pub struct MockClassifier {
    /// Queue of responses. Each call pops the first element.
    /// If empty, returns `fallback`.
    responses: Arc<Mutex<Vec<Result<String, AppError>>>>,
    fallback: String,
    delay: Duration,
    calls: Arc<Mutex<Vec<String>>>,
    in_flight: Arc<AtomicUsize>,
    max_in_flight: Arc<AtomicUsize>,
}

impl MockClassifier {
    /// Always answers with `text`.
    pub fn answering(text: &str) -> Self {
        Self {
            responses: Arc::new(Mutex::new(Vec::new())),
            fallback: text.to_string(),
            delay: Duration::ZERO,
            calls: Arc::new(Mutex::new(Vec::new())),
            in_flight: Arc::new(AtomicUsize::new(0)),
            max_in_flight: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Serves `responses` in order, then answers with [`compliant_answer`].
    pub fn with_responses(responses: Vec<Result<String, AppError>>) -> Self {
        let mock = Self::answering(&compliant_answer());
        *mock.responses.lock().unwrap() = responses;
        mock
    }

    /// Every call sleeps for `delay` before answering.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }

    /// Highest number of calls observed running at the same time.
    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }
}

impl Classifier for MockClassifier {
    async fn classify(&self, image_url: &str) -> Result<String, AppError> {
        self.calls.lock().unwrap().push(image_url.to_string());
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);

        if self.delay.is_zero() {
            tokio::task::yield_now().await;
        } else {
            tokio::time::sleep(self.delay).await;
        }

        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        let next = {
            let mut responses = self.responses.lock().unwrap();
            if responses.is_empty() {
                None
            } else {
                Some(responses.remove(0))
            }
        };
        next.unwrap_or_else(|| Ok(self.fallback.clone()))
    }
}

// ---------------------------------------------------------------------------
// RecordingReporter
// ---------------------------------------------------------------------------

/// Reporter that records a compact label per event.
#[derive(Clone, Default)]
pub struct RecordingReporter {
    events: Arc<Mutex<Vec<String>>>,
}

impl RecordingReporter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<String> {
        self.events.lock().unwrap().clone()
    }

    pub fn count_matching(&self, prefix: &str) -> usize {
        self.events
            .lock()
            .unwrap()
            .iter()
            .filter(|e| e.starts_with(prefix))
            .count()
    }
}

impl BatchReporter for RecordingReporter {
    fn report(&self, event: BatchEvent<'_>) {
        let label = match event {
            BatchEvent::Started { candidates, .. } => format!("started:{candidates}"),
            BatchEvent::BatchStarted { batch, .. } => format!("batch_started:{batch}"),
            BatchEvent::CandidateSkipped { candidate_url, .. } => {
                format!("skipped:{candidate_url}")
            }
            BatchEvent::CandidateFinished { report } => {
                format!("candidate:{}", report.candidate_url)
            }
            BatchEvent::BatchFinished { batch, .. } => format!("batch_finished:{batch}"),
            BatchEvent::Finished { reports, .. } => format!("finished:{reports}"),
        };
        self.events.lock().unwrap().push(label);
    }
}
