use crate::batch::{BatchReporter, BatchScheduler};
use crate::candidates::CandidateExtractor;
use crate::content::ContentFetcher;
use crate::error::AppError;
use crate::run::RunState;
use crate::traits::{Classifier, Fetcher, MarkupParser};

/// Orchestrates the check pipeline: fetch → extract candidates → limit → schedule.
///
/// Generic over all external dependencies via traits, enabling dependency injection
/// and testability without real HTTP or classifier calls. Run state is owned by
/// the caller.
pub struct CheckService<F, P, C>
where
    F: Fetcher,
    P: MarkupParser,
    C: Classifier,
{
    content: ContentFetcher<F, P>,
    extractor: CandidateExtractor,
    scheduler: BatchScheduler<C>,
    max_images: Option<usize>,
}

impl<F, P, C> CheckService<F, P, C>
where
    F: Fetcher,
    P: MarkupParser,
    C: Classifier,
{
    pub fn new(
        content: ContentFetcher<F, P>,
        extractor: CandidateExtractor,
        scheduler: BatchScheduler<C>,
    ) -> Self {
        Self {
            content,
            extractor,
            scheduler,
            max_images: None,
        }
    }

    /// Caps the number of candidates classified per page.
    pub fn with_max_images(mut self, max_images: Option<usize>) -> Self {
        self.max_images = max_images;
        self
    }

    /// Checks one page, returning the number of reports it added.
    ///
    /// A page already visited in this run is skipped and yields 0.
    pub async fn check_page<R: BatchReporter>(
        &self,
        url: &str,
        state: &mut RunState,
        reporter: &R,
    ) -> Result<usize, AppError> {
        if !state.mark_page_visited(url) {
            tracing::info!(%url, "Page already checked in this run");
            return Ok(0);
        }

        let document = self.content.fetch_document(url).await?;
        let mut candidates = self.extractor.extract_candidates(url, &document);

        if let Some(limit) = self.max_images {
            if candidates.len() > limit {
                tracing::info!(%url, found = candidates.len(), %limit, "Limiting images");
                candidates.truncate(limit);
            }
        }

        let reports = self.scheduler.run(url, &candidates, state, reporter).await;
        Ok(reports.len())
    }

    /// Checks every URL in order. A failing page is recorded in `state` and
    /// the run moves on.
    pub async fn run<R: BatchReporter>(&self, urls: &[String], state: &mut RunState, reporter: &R) {
        for url in urls {
            match self.check_page(url, state, reporter).await {
                Ok(added) => tracing::info!(%url, reports = added, "Page checked"),
                Err(e) => {
                    tracing::error!(%url, error = %e, "Page check failed");
                    state.record_page_failure(url, &e);
                }
            }
        }
    }
}
