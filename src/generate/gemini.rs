//! Gemini text-generation client.
//!
//! Sends one `generateContent` request asking for a JSON-only response that
//! matches [`ArticleDraft`], then parses the concatenated candidate text.
use std::time::Duration;

use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use thiserror::Error;

use crate::draft::ArticleDraft;
use crate::http::{self, HttpError};
use crate::util::{normalize_base_url, validate_base_url, UrlValidationError};

pub const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com";
pub const DEFAULT_MODEL: &str = "gemini-1.5-flash";

#[derive(Debug, Error)]
pub enum GeminiError {
    #[error("Gemini API key missing. Add it in Settings to generate content.")]
    MissingApiKey,
    #[error("Gemini API request failed: {status} {body}")]
    Api { status: u16, body: String },
    #[error("Gemini response was empty. Try again or adjust the prompt.")]
    EmptyResponse,
    #[error("Unable to parse Gemini response as JSON.")]
    InvalidJson(#[source] serde_json::Error),
    #[error("Invalid Gemini base URL: {0}")]
    BaseUrl(#[from] UrlValidationError),
    #[error(transparent)]
    Http(#[from] HttpError),
}

/// Tunables for the text-generation request.
#[derive(Debug, Clone)]
pub struct GeminiOptions {
    pub base_url: String,
    pub model: String,
    pub temperature: f32,
    pub max_output_tokens: u32,
    pub timeout: Duration,
}

impl Default for GeminiOptions {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            model: DEFAULT_MODEL.to_string(),
            temperature: 0.8,
            max_output_tokens: 2048,
            timeout: Duration::from_secs(120),
        }
    }
}

#[derive(Clone)]
pub struct GeminiClient {
    http: reqwest::Client,
    options: GeminiOptions,
}

// ============================================================================
// Wire Types
// ============================================================================

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateRequest<'a> {
    contents: [Content<'a>; 1],
    generation_config: GenerationConfig,
}

#[derive(Serialize)]
struct Content<'a> {
    role: &'static str,
    parts: [Part<'a>; 1],
}

#[derive(Serialize)]
struct Part<'a> {
    text: &'a str,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig {
    temperature: f32,
    max_output_tokens: u32,
    response_mime_type: &'static str,
    response_schema: Value,
}

#[derive(Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Deserialize)]
struct Candidate {
    content: Option<CandidateContent>,
}

#[derive(Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<CandidatePart>,
}

#[derive(Deserialize)]
struct CandidatePart {
    text: Option<String>,
}

// ============================================================================
// Client
// ============================================================================

impl GeminiClient {
    pub fn new(http: reqwest::Client, options: GeminiOptions) -> Self {
        Self { http, options }
    }

    /// Generate a complete article for `title`.
    ///
    /// # Errors
    ///
    /// - [`GeminiError::MissingApiKey`] when no key is configured
    /// - [`GeminiError::Api`] for non-2xx responses, with the response body
    /// - [`GeminiError::EmptyResponse`] when no candidate text came back
    /// - [`GeminiError::InvalidJson`] when the text is not an article object
    pub async fn generate_article(
        &self,
        title: &str,
        api_key: Option<&SecretString>,
    ) -> Result<ArticleDraft, GeminiError> {
        let api_key = api_key
            .filter(|k| !k.expose_secret().trim().is_empty())
            .ok_or(GeminiError::MissingApiKey)?;

        let base = validate_base_url(&self.options.base_url)?;
        let endpoint = format!(
            "{}/v1beta/models/{}:generateContent",
            normalize_base_url(base.as_str()),
            self.options.model
        );

        let prompt = build_prompt(title);
        let body = GenerateRequest {
            contents: [Content {
                role: "user",
                parts: [Part { text: &prompt }],
            }],
            generation_config: GenerationConfig {
                temperature: self.options.temperature,
                max_output_tokens: self.options.max_output_tokens,
                response_mime_type: "application/json",
                response_schema: article_schema(),
            },
        };
        let payload = serde_json::to_vec(&body).map_err(GeminiError::InvalidJson)?;

        tracing::info!(model = %self.options.model, title = %title, "Requesting article from Gemini");

        let request = self
            .http
            .post(&endpoint)
            .header(reqwest::header::CONTENT_TYPE, "application/json")
            .header("x-goog-api-key", api_key.expose_secret())
            .body(payload);

        let reply = http::exchange(request, self.options.timeout).await?;
        let status = reply.status;
        if !status.is_success() {
            let body = reply.error_text();
            tracing::warn!(status = status.as_u16(), "Gemini request failed");
            return Err(GeminiError::Api {
                status: status.as_u16(),
                body,
            });
        }

        parse_response(&reply.body)
    }
}

fn build_prompt(title: &str) -> String {
    format!(
        "You are an expert home decor copywriter creating JSON only responses. \
Follow these rules strictly:\n\n\
- Output must be a single JSON object.\n\
- Obey the provided schema exactly.\n\
- Never include human beings in the imagery prompts.\n\
- The article theme is home decor.\n\n\
Return creative yet practical content for the article title: \"{}\".",
        title
    )
}

/// OpenAPI-subset schema describing [`ArticleDraft`].
fn article_schema() -> Value {
    let string = json!({ "type": "STRING" });
    json!({
        "type": "OBJECT",
        "properties": {
            "introduction": string,
            "featured_image_prompt": string,
            "listicle": {
                "type": "ARRAY",
                "items": {
                    "type": "OBJECT",
                    "properties": {
                        "title": string,
                        "description": string,
                        "image_prompt": string
                    },
                    "required": ["title", "description", "image_prompt"]
                }
            },
            "faq": {
                "type": "ARRAY",
                "items": {
                    "type": "OBJECT",
                    "properties": {
                        "question": string,
                        "answer": string
                    },
                    "required": ["question", "answer"]
                }
            },
            "conclusion": string,
            "slug": string,
            "focus_keyphrase": string,
            "meta_description": string
        },
        "required": [
            "introduction",
            "featured_image_prompt",
            "listicle",
            "faq",
            "conclusion",
            "slug",
            "focus_keyphrase",
            "meta_description"
        ]
    })
}

fn parse_response(bytes: &[u8]) -> Result<ArticleDraft, GeminiError> {
    let response: GenerateResponse =
        serde_json::from_slice(bytes).map_err(GeminiError::InvalidJson)?;

    let text: String = response
        .candidates
        .into_iter()
        .next()
        .and_then(|c| c.content)
        .map(|content| {
            content
                .parts
                .into_iter()
                .filter_map(|p| p.text)
                .collect::<String>()
        })
        .unwrap_or_default();

    let text = strip_code_fence(text.trim());
    if text.is_empty() {
        return Err(GeminiError::EmptyResponse);
    }

    serde_json::from_str(text).map_err(|e| {
        tracing::error!(error = %e, len = text.len(), "Gemini JSON parse error");
        GeminiError::InvalidJson(e)
    })
}

/// Remove a surrounding Markdown code fence (```json ... ```), if any.
fn strip_code_fence(text: &str) -> &str {
    let Some(rest) = text.strip_prefix("```") else {
        return text;
    };
    let rest = rest.strip_suffix("```").unwrap_or(rest);
    // Drop the info string (e.g. "json") on the opening line
    match rest.split_once('\n') {
        Some((info, body)) if !info.contains('{') => body.trim(),
        _ => rest.trim(),
    }
}
