pub mod batch;
pub mod cache;
pub mod candidates;
pub mod check;
pub mod classify;
pub mod config;
pub mod content;
pub mod document;
pub mod error;
pub mod json_extract;
pub mod models;
pub mod run;
pub mod traits;

#[cfg(test)]
pub(crate) mod testutil;

pub use batch::{BatchEvent, BatchReporter, BatchScheduler, TracingBatchReporter};
pub use cache::{CacheStore, Namespace};
pub use candidates::CandidateExtractor;
pub use check::CheckService;
pub use classify::{AttemptOutcome, ClassificationClient};
pub use config::Settings;
pub use content::ContentFetcher;
pub use document::{Document, ElementTree, NodeId};
pub use error::AppError;
pub use models::{
    Candidate, CandidateReport, ClassificationResult, PageFailure, RunReport, compute_hash,
};
pub use run::RunState;
pub use traits::{Classifier, Fetcher, MarkupParser};
