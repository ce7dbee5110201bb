//! Article draft data model.
//!
//! An [`ArticleDraft`] is produced wholesale by one Gemini call and is never
//! edited in place; only a full regeneration replaces it. Images are tracked
//! separately in [`DraftState`] so each one can be regenerated on its own.
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use serde::{Deserialize, Serialize};
use thiserror::Error;

// ============================================================================
// Generated Content
// ============================================================================

/// One numbered section of the listicle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ListicleItem {
    pub title: String,
    pub description: String,
    pub image_prompt: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FaqItem {
    pub question: String,
    pub answer: String,
}

/// Structured article returned by the text generator.
///
/// Field names match the JSON object the model is asked to emit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArticleDraft {
    pub introduction: String,
    pub featured_image_prompt: String,
    pub listicle: Vec<ListicleItem>,
    #[serde(default)]
    pub faq: Vec<FaqItem>,
    pub conclusion: String,
    pub slug: String,
    pub focus_keyphrase: String,
    pub meta_description: String,
}

// ============================================================================
// Images
// ============================================================================

#[derive(Debug, Error)]
#[error("Unsupported aspect ratio '{0}' (expected 4:3, 1:1 or 3:4)")]
pub struct InvalidRatio(pub String);

/// Aspect ratios offered by the image generator.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ImageRatio {
    #[serde(rename = "4:3")]
    Landscape,
    #[default]
    #[serde(rename = "1:1")]
    Square,
    #[serde(rename = "3:4")]
    Portrait,
}

impl ImageRatio {
    /// Ratio used for the featured image.
    pub const FEATURED: ImageRatio = ImageRatio::Landscape;

    /// Listicle images alternate square and portrait by position.
    pub fn initial_for(index: usize) -> Self {
        const CYCLE: [ImageRatio; 2] = [ImageRatio::Square, ImageRatio::Portrait];
        CYCLE[index % CYCLE.len()]
    }

    /// Pixel dimensions requested from the image generator as `(width, height)`.
    pub fn dimensions(self) -> (u32, u32) {
        match self {
            ImageRatio::Landscape => (1600, 1200),
            ImageRatio::Square => (1400, 1400),
            ImageRatio::Portrait => (1350, 1800),
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ImageRatio::Landscape => "4:3",
            ImageRatio::Square => "1:1",
            ImageRatio::Portrait => "3:4",
        }
    }
}

impl fmt::Display for ImageRatio {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ImageRatio {
    type Err = InvalidRatio;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "4:3" => Ok(ImageRatio::Landscape),
            "1:1" => Ok(ImageRatio::Square),
            "3:4" => Ok(ImageRatio::Portrait),
            other => Err(InvalidRatio(other.to_string())),
        }
    }
}

/// An image produced by the image generator, kept inline as a data URL.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GeneratedImage {
    pub prompt: String,
    pub ratio: ImageRatio,
    pub data_url: String,
}

// Data URLs run to megabytes; never dump them into logs.
impl fmt::Debug for GeneratedImage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GeneratedImage")
            .field("prompt", &self.prompt)
            .field("ratio", &self.ratio)
            .field("data_url_len", &self.data_url.len())
            .finish()
    }
}

impl GeneratedImage {
    pub fn decode(&self) -> Result<DecodedImage, DataUrlError> {
        DecodedImage::from_data_url(&self.data_url)
    }
}

#[derive(Debug, Error)]
pub enum DataUrlError {
    #[error("Image is not a base64 data URL")]
    NotDataUrl,
    #[error("Image data is not valid base64: {0}")]
    Base64(#[from] base64::DecodeError),
}

/// Raw bytes and mime type recovered from a `data:<mime>;base64,<payload>` URL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodedImage {
    pub mime_type: String,
    pub bytes: Vec<u8>,
}

impl DecodedImage {
    pub fn from_data_url(data_url: &str) -> Result<Self, DataUrlError> {
        let rest = data_url.strip_prefix("data:").ok_or(DataUrlError::NotDataUrl)?;
        let (header, payload) = rest.split_once(',').ok_or(DataUrlError::NotDataUrl)?;
        let mime_type = header
            .strip_suffix(";base64")
            .ok_or(DataUrlError::NotDataUrl)?;
        let mime_type = if mime_type.is_empty() {
            "image/jpeg"
        } else {
            mime_type
        };

        Ok(Self {
            mime_type: mime_type.to_string(),
            bytes: BASE64.decode(payload.trim())?,
        })
    }

    /// File extension matching the mime type.
    pub fn extension(&self) -> &'static str {
        match self.mime_type.as_str() {
            "image/png" => "png",
            "image/webp" => "webp",
            _ => "jpg",
        }
    }
}

/// Sniffs an image mime type from its leading bytes.
///
/// Anything unrecognized is reported as JPEG, the generator's default format.
pub fn sniff_mime_type(bytes: &[u8]) -> &'static str {
    if bytes.starts_with(b"\x89PNG\r\n\x1a\n") {
        "image/png"
    } else if bytes.len() >= 12 && &bytes[0..4] == b"RIFF" && &bytes[8..12] == b"WEBP" {
        "image/webp"
    } else {
        "image/jpeg"
    }
}

/// Builds a data URL from raw image bytes.
pub fn to_data_url(bytes: &[u8]) -> String {
    format!("data:{};base64,{}", sniff_mime_type(bytes), BASE64.encode(bytes))
}

// ============================================================================
// Draft State
// ============================================================================

/// Everything the studio knows about the article currently being worked on.
///
/// Listicle images and ratios are keyed by listicle index so a single
/// position can be replaced without touching the others.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DraftState {
    pub title: String,
    pub article: Option<ArticleDraft>,
    pub featured_image: Option<GeneratedImage>,
    #[serde(default)]
    pub listicle_images: BTreeMap<usize, GeneratedImage>,
    #[serde(default)]
    pub ratios: BTreeMap<usize, ImageRatio>,
}

impl DraftState {
    /// True when the article, its featured image and an image for every
    /// listicle item are all present.
    pub fn is_publishable(&self) -> bool {
        let Some(article) = &self.article else {
            return false;
        };
        self.featured_image.is_some()
            && (0..article.listicle.len()).all(|i| self.listicle_images.contains_key(&i))
    }

    /// Ratio for the next regeneration of the image at `index`.
    pub fn ratio_for(&self, index: usize) -> ImageRatio {
        self.ratios.get(&index).copied().unwrap_or_default()
    }

    /// Listicle images in item order, or `None` if any position is missing.
    pub fn ordered_listicle_images(&self) -> Option<Vec<&GeneratedImage>> {
        let article = self.article.as_ref()?;
        (0..article.listicle.len())
            .map(|i| self.listicle_images.get(&i))
            .collect()
    }
}
