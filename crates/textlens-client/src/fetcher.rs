use std::time::Duration;

use reqwest::Client;
use textlens_core::error::AppError;
use textlens_core::traits::Fetcher;
use url::Url;

const USER_AGENT: &str = concat!("textlens/", env!("CARGO_PKG_VERSION"));
const DEFAULT_FETCH_TIMEOUT: Duration = Duration::from_secs(30);

/// HTTP fetcher using reqwest.
///
/// Downloads page markup with a fixed User-Agent and timeout. Only `http` and
/// `https` URLs are accepted. Bodies are decoded as UTF-8, replacing invalid
/// sequences.
#[derive(Clone)]
pub struct ReqwestFetcher {
    client: Client,
    timeout_secs: u64,
}

impl ReqwestFetcher {
    pub fn new() -> Result<Self, AppError> {
        Self::with_timeout(DEFAULT_FETCH_TIMEOUT)
    }

    pub fn with_timeout(timeout: Duration) -> Result<Self, AppError> {
        let client = Client::builder()
            .user_agent(USER_AGENT)
            .timeout(timeout)
            .build()
            .map_err(|e| AppError::HttpError(e.to_string()))?;

        Ok(Self {
            client,
            timeout_secs: timeout.as_secs(),
        })
    }

    /// Replaces the underlying HTTP client, keeping the configured timeout
    /// for error reporting.
    pub fn with_http_client(mut self, client: Client) -> Self {
        self.client = client;
        self
    }
}

impl Fetcher for ReqwestFetcher {
    async fn fetch(&self, url: &str) -> Result<String, AppError> {
        validate_scheme(url)?;

        let response = self.client.get(url).send().await.map_err(|e| {
            if e.is_timeout() {
                AppError::Timeout(self.timeout_secs)
            } else if e.is_connect() {
                AppError::NetworkError(format!("Connection failed: {e}"))
            } else {
                AppError::HttpError(e.to_string())
            }
        })?;

        let status = response.status();
        if !status.is_success() {
            return Err(AppError::HttpError(format!(
                "HTTP {} for {}",
                status.as_u16(),
                url
            )));
        }

        let body = response
            .bytes()
            .await
            .map_err(|e| AppError::HttpError(format!("Failed to read response body: {e}")))?;
        Ok(String::from_utf8_lossy(&body).into_owned())
    }
}

fn validate_scheme(url: &str) -> Result<(), AppError> {
    let parsed = Url::parse(url).map_err(|e| AppError::HttpError(format!("Invalid URL: {e}")))?;
    match parsed.scheme() {
        "http" | "https" => Ok(()),
        scheme => Err(AppError::HttpError(format!(
            "URL scheme '{scheme}' is not allowed (only http/https)"
        ))),
    }
}
