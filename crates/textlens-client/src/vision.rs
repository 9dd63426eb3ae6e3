use std::time::Duration;

use reqwest::Client;
use serde::{Deserialize, Serialize};
use textlens_core::error::AppError;
use textlens_core::traits::Classifier;

const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";
const DEFAULT_MODEL_TIMEOUT: Duration = Duration::from_secs(120);
const DEFAULT_MAX_TOKENS: u32 = 4000;

/// Evaluation instructions sent alongside every image.
pub const DEFAULT_INSTRUCTIONS: &str = r#"Analyse this image for images of text and answer with a single JSON object in exactly this shape:
{
  "contains_text": true/false,
  "detected_text": "the text found in the image",
  "purpose": "what the text is for (logo, navigation, heading, body copy, ...)",
  "has_significant_visual_content": true/false,
  "visual_content_description": "description of important non-text content, if any",
  "is_logo": true/false,
  "is_essential": true/false,
  "essential_reason": "why this particular presentation is essential, if it is",
  "is_customizable": true/false,
  "can_be_html_css": true/false,
  "has_text_alternative": true/false,
  "compliant": true/false,
  "reason": "detailed reason for the verdict",
  "recommendations": ["suggestion 1", "suggestion 2"]
}

Criteria:
1. has_significant_visual_content: the image carries important non-text information (charts, screenshots, diagrams).
2. is_logo: the text is part of a logo or brand name.
3. is_essential: this exact presentation is essential to the information (font samples, historical documents, symbolic glyphs such as a bold "B").
4. is_customizable: the user can change the text's size, colour or spacing.
5. has_text_alternative: the same information is also available as real text.
6. compliant: true if any of the following holds: it is a logo, it is customizable, the presentation is essential, the information is available as text, or the text is part of other significant visual content.

Respond with the JSON object only."#;

/// OpenAI-compatible vision client that judges one image per request.
///
/// Works with any OpenAI-compatible chat completions API that accepts
/// `image_url` content parts.
#[derive(Clone)]
pub struct OpenAiClassifier {
    client: Client,
    base_url: String,
    api_key: String,
    model: String,
    timeout_secs: u64,
    instructions: String,
    max_tokens: u32,
}

impl OpenAiClassifier {
    pub fn new(api_key: &str, model: &str) -> Result<Self, AppError> {
        Self::with_base_url(api_key, model, DEFAULT_BASE_URL)
    }

    pub fn with_base_url(api_key: &str, model: &str, base_url: &str) -> Result<Self, AppError> {
        Self::build(api_key, model, base_url, DEFAULT_MODEL_TIMEOUT)
    }

    pub fn with_timeout(self, timeout: Duration) -> Result<Self, AppError> {
        let rebuilt = Self::build(&self.api_key, &self.model, &self.base_url, timeout)?;
        Ok(Self {
            instructions: self.instructions,
            max_tokens: self.max_tokens,
            ..rebuilt
        })
    }

    pub fn with_instructions(mut self, instructions: impl Into<String>) -> Self {
        self.instructions = instructions.into();
        self
    }

    pub fn with_http_client(mut self, client: Client) -> Self {
        self.client = client;
        self
    }

    fn build(
        api_key: &str,
        model: &str,
        base_url: &str,
        timeout: Duration,
    ) -> Result<Self, AppError> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| AppError::HttpError(e.to_string()))?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: api_key.to_string(),
            model: model.to_string(),
            timeout_secs: timeout.as_secs(),
            instructions: DEFAULT_INSTRUCTIONS.to_string(),
            max_tokens: DEFAULT_MAX_TOKENS,
        })
    }

    fn request<'a>(&'a self, image_url: &'a str) -> ChatRequest<'a> {
        ChatRequest {
            model: &self.model,
            messages: vec![Message {
                role: "user",
                content: vec![
                    ContentPart::Text {
                        text: &self.instructions,
                    },
                    ContentPart::ImageUrl {
                        image_url: ImageUrl { url: image_url },
                    },
                ],
            }],
            max_tokens: self.max_tokens,
        }
    }
}

// ---- OpenAI API types ----

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<Message<'a>>,
    max_tokens: u32,
}

#[derive(Serialize)]
struct Message<'a> {
    role: &'static str,
    content: Vec<ContentPart<'a>>,
}

#[derive(Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum ContentPart<'a> {
    Text { text: &'a str },
    ImageUrl { image_url: ImageUrl<'a> },
}

#[derive(Serialize)]
struct ImageUrl<'a> {
    url: &'a str,
}

#[derive(Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Deserialize)]
struct Choice {
    message: ResponseMessage,
}

#[derive(Deserialize)]
struct ResponseMessage {
    content: Option<String>,
}

#[derive(Deserialize)]
struct ApiError {
    error: ApiErrorDetail,
}

#[derive(Deserialize)]
struct ApiErrorDetail {
    message: String,
}

impl Classifier for OpenAiClassifier {
    async fn classify(&self, image_url: &str) -> Result<String, AppError> {
        let url = format!("{}/chat/completions", self.base_url);

        let response = self
            .client
            .post(&url)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .json(&self.request(image_url))
            .send()
            .await
            .map_err(|e| {
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
            let status_code = status.as_u16();
            if status_code == 429 {
                return Err(AppError::RateLimitExceeded);
            }

            let body = response.text().await.unwrap_or_default();
            let message = serde_json::from_str::<ApiError>(&body)
                .map(|e| e.error.message)
                .unwrap_or_else(|_| format!("HTTP {status_code}: {body}"));

            return Err(AppError::LlmError {
                message,
                status_code,
                retryable: status_code >= 500,
            });
        }

        let chat_response: ChatResponse = response
            .json()
            .await
            .map_err(|e| AppError::HttpError(format!("Failed to parse model response: {e}")))?;

        chat_response
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .ok_or_else(|| AppError::LlmError {
                message: "Empty response from model".into(),
                status_code: 200,
                retryable: true,
            })
    }
}
