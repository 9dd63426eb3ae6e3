use serde::{Deserialize, Deserializer, Serialize};
use sha2::{Digest, Sha256};
use uuid::Uuid;

/// One image element selected for classification.
///
/// Candidates are also the payload of the `candidate_list` cache namespace,
/// so a cache hit restores them without re-parsing markup.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Candidate {
    /// Page the element was found on.
    pub source_page_url: String,
    /// Serialized markup of the element (e.g. `<img src="a.png" alt="A">`).
    pub raw_markup: String,
    /// `src` resolved against the page URL; always absolute.
    pub absolute_url: String,
    pub alt_text: String,
    /// Structural locator such as `/html/body/div/img[2]`.
    pub locator: String,
}

/// Classifier judgment for one image.
///
/// This is both the shape the classification service is asked to answer in
/// and the on-disk cache payload. A failed classification is the same struct
/// with `error` set (see [`ClassificationResult::failed`]).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClassificationResult {
    #[serde(deserialize_with = "null_as_default")]
    pub contains_text: bool,
    #[serde(deserialize_with = "null_as_default")]
    pub detected_text: String,
    #[serde(alias = "text_purpose", deserialize_with = "null_as_default")]
    pub purpose: String,
    #[serde(deserialize_with = "null_as_default")]
    pub has_significant_visual_content: bool,
    #[serde(deserialize_with = "null_as_default")]
    pub visual_content_description: String,
    #[serde(deserialize_with = "null_as_default")]
    pub is_logo: bool,
    #[serde(deserialize_with = "null_as_default")]
    pub is_essential: bool,
    #[serde(deserialize_with = "null_as_default")]
    pub essential_reason: String,
    #[serde(deserialize_with = "null_as_default")]
    pub is_customizable: bool,
    #[serde(deserialize_with = "null_as_default")]
    pub can_be_html_css: bool,
    #[serde(deserialize_with = "null_as_default")]
    pub has_text_alternative: bool,
    #[serde(alias = "wcag_145_compliant", deserialize_with = "null_as_default")]
    pub compliant: bool,
    #[serde(deserialize_with = "null_as_default")]
    pub reason: String,
    #[serde(deserialize_with = "null_as_default")]
    pub recommendations: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ClassificationResult {
    /// Builds the error form: every judgment false, `reason` set to the message.
    pub fn failed(message: impl Into<String>) -> Self {
        let message = message.into();
        Self {
            reason: message.clone(),
            error: Some(message),
            ..Self::default()
        }
    }

    pub fn is_error(&self) -> bool {
        self.error.is_some()
    }
}

fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

/// Outcome for one candidate within a run.
#[derive(Debug, Clone, Serialize)]
pub struct CandidateReport {
    pub page_url: String,
    pub candidate_url: String,
    pub locator: String,
    pub raw_markup: String,
    pub alt_text: String,
    pub result: ClassificationResult,
}

impl CandidateReport {
    pub fn new(candidate: &Candidate, result: ClassificationResult) -> Self {
        Self {
            page_url: candidate.source_page_url.clone(),
            candidate_url: candidate.absolute_url.clone(),
            locator: candidate.locator.clone(),
            raw_markup: candidate.raw_markup.clone(),
            alt_text: candidate.alt_text.clone(),
            result,
        }
    }
}

/// A page that could not be checked at all.
#[derive(Debug, Clone, Serialize)]
pub struct PageFailure {
    pub page_url: String,
    pub error: String,
}

/// Everything a run produced, in the order it was produced.
#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub run_id: Uuid,
    pub reports: Vec<CandidateReport>,
    pub page_failures: Vec<PageFailure>,
}

impl RunReport {
    pub fn error_count(&self) -> usize {
        self.reports.iter().filter(|r| r.result.is_error()).count()
    }

    pub fn non_compliant_count(&self) -> usize {
        self.reports
            .iter()
            .filter(|r| !r.result.is_error() && r.result.contains_text && !r.result.compliant)
            .count()
    }
}

/// Compute a SHA-256 hash of a string, returned as 64-char hex.
pub fn compute_hash(content: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(content.as_bytes());
    format!("{:x}", hasher.finalize())
}
