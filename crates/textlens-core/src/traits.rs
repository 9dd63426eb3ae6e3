use std::future::Future;

use crate::document::Document;
use crate::error::AppError;

/// Fetches raw HTML content from a URL.
pub trait Fetcher: Send + Sync + Clone {
    fn fetch(&self, url: &str) -> impl Future<Output = Result<String, AppError>> + Send;
}

/// Turns raw markup into a navigable [`Document`].
pub trait MarkupParser: Send + Sync + Clone {
    type Document: Document;

    fn parse(&self, markup: &str) -> Self::Document;
}

/// Asks an external vision service to judge one image.
pub trait Classifier: Send + Sync + Clone {
    /// Sends the evaluation instructions and the image URL, returning the raw
    /// text of the service's answer. The text is expected to contain one JSON
    /// object but may be wrapped in prose or code fences.
    fn classify(&self, image_url: &str) -> impl Future<Output = Result<String, AppError>> + Send;
}
