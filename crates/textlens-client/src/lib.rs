pub mod fetcher;
pub mod html;
pub mod vision;

#[cfg(test)]
mod test_server;

pub use fetcher::ReqwestFetcher;
pub use html::HtmlParser;
pub use vision::{DEFAULT_INSTRUCTIONS, OpenAiClassifier};
