//! Ideogram image-generation client.
use std::time::Duration;

use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::draft::{to_data_url, GeneratedImage, ImageRatio};
use crate::http::{self, HttpError};
use crate::util::{normalize_base_url, validate_base_url, UrlValidationError};

pub const DEFAULT_BASE_URL: &str = "https://api.ideogram.ai";
pub const DEFAULT_MODEL: &str = "V_2";

/// Keeps people out of every generated image.
const NEGATIVE_PROMPT: &str =
    "humans, people, person, human figure, human faces, human silhouettes";

#[derive(Debug, Error)]
pub enum ImageError {
    #[error("Ideogram API key missing. Add it in Settings to generate images.")]
    MissingApiKey,
    #[error("Ideogram API request failed: {status} {body}")]
    Api { status: u16, body: String },
    #[error("Ideogram error: {0}")]
    Rejected(String),
    #[error("Ideogram returned no image data.")]
    NoImageData,
    #[error("Ideogram returned an unreadable image: {0}")]
    InvalidImage(String),
    #[error("Invalid Ideogram base URL: {0}")]
    BaseUrl(#[from] UrlValidationError),
    #[error(transparent)]
    Http(#[from] HttpError),
}

#[derive(Debug, Clone)]
pub struct IdeogramOptions {
    pub base_url: String,
    pub model: String,
    pub timeout: Duration,
}

impl Default for IdeogramOptions {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            model: DEFAULT_MODEL.to_string(),
            timeout: Duration::from_secs(120),
        }
    }
}

#[derive(Clone)]
pub struct IdeogramClient {
    http: reqwest::Client,
    options: IdeogramOptions,
}

#[derive(Serialize)]
struct ImageRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    aspect_ratio: ImageRatio,
    negative_prompt: &'static str,
    width: u32,
    height: u32,
    response_format: &'static str,
}

#[derive(Deserialize)]
struct ImageResponse {
    #[serde(default)]
    data: Vec<ImageData>,
    error: Option<ApiError>,
}

#[derive(Deserialize)]
struct ImageData {
    image_base64: Option<String>,
}

#[derive(Deserialize)]
struct ApiError {
    message: String,
}

impl IdeogramClient {
    pub fn new(http: reqwest::Client, options: IdeogramOptions) -> Self {
        Self { http, options }
    }

    /// Generate one image for `prompt` at `ratio`, returned inline as a data URL.
    pub async fn generate_image(
        &self,
        prompt: &str,
        ratio: ImageRatio,
        api_key: Option<&SecretString>,
    ) -> Result<GeneratedImage, ImageError> {
        let api_key = api_key
            .filter(|k| !k.expose_secret().trim().is_empty())
            .ok_or(ImageError::MissingApiKey)?;

        let base = validate_base_url(&self.options.base_url)?;
        let endpoint = format!("{}/images", normalize_base_url(base.as_str()));

        let (width, height) = ratio.dimensions();
        let body = ImageRequest {
            model: &self.options.model,
            prompt,
            aspect_ratio: ratio,
            negative_prompt: NEGATIVE_PROMPT,
            width,
            height,
            response_format: "b64_json",
        };
        let payload =
            serde_json::to_vec(&body).map_err(|e| ImageError::InvalidImage(e.to_string()))?;

        tracing::debug!(ratio = %ratio, prompt_len = prompt.len(), "Requesting image from Ideogram");

        let request = self
            .http
            .post(&endpoint)
            .header(reqwest::header::CONTENT_TYPE, "application/json")
            .header("api-key", api_key.expose_secret())
            .body(payload);

        let reply = http::exchange(request, self.options.timeout).await?;
        let status = reply.status;
        if !status.is_success() {
            let body = reply.error_text();
            tracing::warn!(status = status.as_u16(), "Ideogram request failed");
            return Err(ImageError::Api {
                status: status.as_u16(),
                body,
            });
        }

        let data_url = parse_response(&reply.body)?;

        Ok(GeneratedImage {
            prompt: prompt.to_string(),
            ratio,
            data_url,
        })
    }
}

fn parse_response(bytes: &[u8]) -> Result<String, ImageError> {
    let response: ImageResponse =
        serde_json::from_slice(bytes).map_err(|e| ImageError::InvalidImage(e.to_string()))?;

    if let Some(error) = response.error {
        return Err(ImageError::Rejected(error.message));
    }

    let encoded = response
        .data
        .into_iter()
        .next()
        .and_then(|d| d.image_base64)
        .filter(|b| !b.trim().is_empty())
        .ok_or(ImageError::NoImageData)?;

    // Decode once to validate the payload and sniff its real format
    let raw = BASE64
        .decode(encoded.trim())
        .map_err(|e| ImageError::InvalidImage(e.to_string()))?;

    Ok(to_data_url(&raw))
}
