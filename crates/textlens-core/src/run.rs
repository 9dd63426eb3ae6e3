use std::collections::HashSet;

use uuid::Uuid;

use crate::models::{CandidateReport, PageFailure, RunReport};

/// Mutable state of one check run. Lives only in memory.
#[derive(Debug, Clone)]
pub struct RunState {
    run_id: Uuid,
    visited_page_urls: HashSet<String>,
    visited_candidate_urls: HashSet<String>,
    pub(crate) reports: Vec<CandidateReport>,
    pub(crate) page_failures: Vec<PageFailure>,
}

impl Default for RunState {
    fn default() -> Self {
        Self::new()
    }
}

impl RunState {
    pub fn new() -> Self {
        Self {
            run_id: Uuid::new_v4(),
            visited_page_urls: HashSet::new(),
            visited_candidate_urls: HashSet::new(),
            reports: Vec::new(),
            page_failures: Vec::new(),
        }
    }

    pub fn run_id(&self) -> Uuid {
        self.run_id
    }

    /// Marks a page as visited; false if it already was.
    pub fn mark_page_visited(&mut self, url: &str) -> bool {
        self.visited_page_urls.insert(url.to_string())
    }

    /// Marks a candidate URL as visited; false if it already was.
    pub fn mark_candidate_visited(&mut self, url: &str) -> bool {
        self.visited_candidate_urls.insert(url.to_string())
    }

    pub fn is_page_visited(&self, url: &str) -> bool {
        self.visited_page_urls.contains(url)
    }

    pub fn is_candidate_visited(&self, url: &str) -> bool {
        self.visited_candidate_urls.contains(url)
    }

    pub fn reports(&self) -> &[CandidateReport] {
        &self.reports
    }

    pub fn page_failures(&self) -> &[PageFailure] {
        &self.page_failures
    }

    pub fn record_page_failure(&mut self, page_url: &str, error: impl ToString) {
        self.page_failures.push(PageFailure {
            page_url: page_url.to_string(),
            error: error.to_string(),
        });
    }

    pub fn finish(self) -> RunReport {
        RunReport {
            run_id: self.run_id,
            reports: self.reports,
            page_failures: self.page_failures,
        }
    }
}
