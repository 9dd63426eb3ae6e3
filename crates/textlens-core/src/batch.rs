use futures::stream::{self, StreamExt};

use crate::classify::ClassificationClient;
use crate::models::{Candidate, CandidateReport};
use crate::run::RunState;
use crate::traits::Classifier;

pub const DEFAULT_BATCH_SIZE: usize = 10;

/// Progress events emitted while a page's candidates are scheduled.
#[derive(Debug, Clone)]
pub enum BatchEvent<'a> {
    Started {
        page_url: &'a str,
        candidates: usize,
        batches: usize,
    },
    BatchStarted {
        page_url: &'a str,
        batch: usize,
        batches: usize,
        size: usize,
    },
    CandidateSkipped {
        page_url: &'a str,
        candidate_url: &'a str,
    },
    CandidateFinished {
        report: &'a CandidateReport,
    },
    BatchFinished {
        page_url: &'a str,
        batch: usize,
        completed: usize,
    },
    Finished {
        page_url: &'a str,
        reports: usize,
    },
}

/// Trait for receiving batch events (decoupled logging).
pub trait BatchReporter: Send + Sync {
    fn report(&self, event: BatchEvent<'_>) {
        let _ = event;
    }
}

/// Reporter that uses the `tracing` crate.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingBatchReporter;

impl BatchReporter for TracingBatchReporter {
    fn report(&self, event: BatchEvent<'_>) {
        match event {
            BatchEvent::Started {
                page_url,
                candidates,
                batches,
            } => {
                tracing::info!(url = %page_url, %candidates, %batches, "Scheduling candidates");
            }
            BatchEvent::BatchStarted {
                page_url,
                batch,
                batches,
                size,
            } => {
                tracing::info!(url = %page_url, %batch, %batches, %size, "Processing batch");
            }
            BatchEvent::CandidateSkipped {
                page_url,
                candidate_url,
            } => {
                tracing::debug!(
                    url = %page_url,
                    candidate = %candidate_url,
                    "Candidate already processed"
                );
            }
            BatchEvent::CandidateFinished { report } => {
                if let Some(error) = &report.result.error {
                    tracing::warn!(candidate = %report.candidate_url, %error, "Candidate failed");
                } else {
                    tracing::debug!(
                        candidate = %report.candidate_url,
                        contains_text = report.result.contains_text,
                        compliant = report.result.compliant,
                        "Candidate classified"
                    );
                }
            }
            BatchEvent::BatchFinished {
                page_url,
                batch,
                completed,
            } => {
                tracing::info!(url = %page_url, %batch, %completed, "Batch finished");
            }
            BatchEvent::Finished { page_url, reports } => {
                tracing::info!(url = %page_url, %reports, "Page scheduling finished");
            }
        }
    }
}

/// Classifies candidates in fixed-size batches.
///
/// Batches run strictly one after another; within a batch at most
/// `concurrency` classifications are in flight.
#[derive(Clone)]
pub struct BatchScheduler<C: Classifier> {
    client: ClassificationClient<C>,
    batch_size: usize,
    concurrency: usize,
}

impl<C: Classifier> BatchScheduler<C> {
    /// Sizes below 1 are treated as 1. Concurrency defaults to the batch size.
    pub fn new(client: ClassificationClient<C>, batch_size: usize) -> Self {
        let batch_size = batch_size.max(1);
        Self {
            client,
            batch_size,
            concurrency: batch_size,
        }
    }

    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency.max(1);
        self
    }

    pub fn batch_size(&self) -> usize {
        self.batch_size
    }

    pub fn concurrency(&self) -> usize {
        self.concurrency
    }

    /// Classifies `candidates` and appends one report per newly seen candidate
    /// URL to `state`. Returns the reports appended by this call.
    ///
    /// Candidates whose URL was already visited in this run are skipped. A URL
    /// is marked visited before dispatch, so duplicates within one batch are
    /// dispatched once.
    pub async fn run<'s, R: BatchReporter>(
        &self,
        page_url: &str,
        candidates: &[Candidate],
        state: &'s mut RunState,
        reporter: &R,
    ) -> &'s [CandidateReport] {
        let start = state.reports.len();
        let batches = candidates.len().div_ceil(self.batch_size);
        reporter.report(BatchEvent::Started {
            page_url,
            candidates: candidates.len(),
            batches,
        });

        for (index, chunk) in candidates.chunks(self.batch_size).enumerate() {
            let batch = index + 1;
            reporter.report(BatchEvent::BatchStarted {
                page_url,
                batch,
                batches,
                size: chunk.len(),
            });

            let mut pending = Vec::with_capacity(chunk.len());
            for candidate in chunk {
                if state.mark_candidate_visited(&candidate.absolute_url) {
                    pending.push(candidate);
                } else {
                    reporter.report(BatchEvent::CandidateSkipped {
                        page_url,
                        candidate_url: &candidate.absolute_url,
                    });
                }
            }

            let client = &self.client;
            let mut completed = 0;
            let mut in_flight = stream::iter(pending)
                .map(move |candidate| async move {
                    let result = client.classify(&candidate.absolute_url).await;
                    CandidateReport::new(candidate, result)
                })
                .buffer_unordered(self.concurrency);

            while let Some(report) = in_flight.next().await {
                reporter.report(BatchEvent::CandidateFinished { report: &report });
                state.reports.push(report);
                completed += 1;
            }

            reporter.report(BatchEvent::BatchFinished {
                page_url,
                batch,
                completed,
            });
        }

        let appended = &state.reports[start..];
        reporter.report(BatchEvent::Finished {
            page_url,
            reports: appended.len(),
        });
        appended
    }
}
