use crate::cache::{CacheStore, Namespace};
use crate::error::AppError;
use crate::traits::{Fetcher, MarkupParser};

/// Fetches page markup (from the `page` cache when fresh) and parses it.
#[derive(Clone)]
pub struct ContentFetcher<F: Fetcher, P: MarkupParser> {
    fetcher: F,
    parser: P,
    cache: Option<CacheStore>,
}

impl<F: Fetcher, P: MarkupParser> ContentFetcher<F, P> {
    pub fn new(fetcher: F, parser: P) -> Self {
        Self {
            fetcher,
            parser,
            cache: None,
        }
    }

    pub fn with_cache(mut self, cache: impl Into<Option<CacheStore>>) -> Self {
        self.cache = cache.into();
        self
    }

    /// Returns the parsed document for `url`.
    ///
    /// An empty cached body is treated as a miss. Network failures propagate;
    /// cache write failures are only logged.
    pub async fn fetch_document(&self, url: &str) -> Result<P::Document, AppError> {
        if let Some(markup) = self.cached_markup(url) {
            tracing::info!(%url, bytes = markup.len(), "Using cached page");
            return Ok(self.parser.parse(&markup));
        }

        tracing::info!(%url, "Fetching page");
        let markup = self.fetcher.fetch(url).await?;
        tracing::info!(%url, bytes = markup.len(), "Fetched page");

        if let Some(cache) = &self.cache {
            if let Err(e) = cache.put_text(Namespace::Page, url, &markup) {
                tracing::warn!(%url, error = %e, "Failed to cache page");
            }
        }

        Ok(self.parser.parse(&markup))
    }

    fn cached_markup(&self, url: &str) -> Option<String> {
        self.cache
            .as_ref()?
            .get_text(Namespace::Page, url)
            .filter(|markup| !markup.is_empty())
    }
}
