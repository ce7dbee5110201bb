//! The studio: one draft, the three service clients, and the last status.
//!
//! Every operation sets a user-facing [`Status`] before it starts and again
//! when it finishes. Failures leave the draft exactly as it was.
use std::collections::BTreeMap;

use futures::stream::{self, StreamExt, TryStreamExt};
use thiserror::Error;

use crate::config::Config;
use crate::draft::{DraftState, GeneratedImage, ImageRatio};
use crate::generate::{GeminiClient, GeminiError, IdeogramClient, ImageError};
use crate::publish::{PublishError, PublishRequest, PublishedPost, WordPressClient};
use crate::settings::Settings;

/// Shortest title (trimmed, in characters) that cannot be generated from.
const MIN_TITLE_CHARS: usize = 4;

// ============================================================================
// Status
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusTone {
    Neutral,
    Success,
    Error,
}

/// The banner shown after each operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Status {
    pub tone: StatusTone,
    pub message: String,
}

impl Status {
    fn neutral(message: impl Into<String>) -> Self {
        Self {
            tone: StatusTone::Neutral,
            message: message.into(),
        }
    }

    fn success(message: impl Into<String>) -> Self {
        Self {
            tone: StatusTone::Success,
            message: message.into(),
        }
    }

    fn error(message: impl Into<String>) -> Self {
        Self {
            tone: StatusTone::Error,
            message: message.into(),
        }
    }
}

#[derive(Debug, Error)]
pub enum StudioError {
    #[error("Enter a title longer than 4 characters.")]
    TitleTooShort,
    #[error("Generate an article first.")]
    NoArticle,
    #[error("Image #{number} does not exist (the article has {len} items).")]
    NoSuchImage { number: usize, len: usize },
    #[error("Generate the article and all of its images before publishing.")]
    NotPublishable,
    #[error("No saved website named '{0}'.")]
    UnknownWebsite(String),
    #[error(transparent)]
    Text(#[from] GeminiError),
    #[error(transparent)]
    Image(#[from] ImageError),
    #[error(transparent)]
    Publish(#[from] PublishError),
}

/// Which position a generated image fills.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Slot {
    Featured,
    Listicle(usize),
}

// ============================================================================
// Studio
// ============================================================================

pub struct Studio {
    gemini: GeminiClient,
    ideogram: IdeogramClient,
    wordpress: WordPressClient,
    settings: Settings,
    max_concurrent_images: usize,
    state: DraftState,
    status: Option<Status>,
}

impl Studio {
    pub fn new(config: &Config, http: reqwest::Client, settings: Settings) -> Self {
        Self {
            gemini: GeminiClient::new(http.clone(), config.gemini_options()),
            ideogram: IdeogramClient::new(http.clone(), config.ideogram_options()),
            wordpress: WordPressClient::new(
                http,
                config.request_timeout(),
                config.max_concurrent_images,
            ),
            settings,
            max_concurrent_images: config.max_concurrent_images.max(1),
            state: DraftState::default(),
            status: None,
        }
    }

    /// Resume work on a previously saved draft.
    pub fn with_state(mut self, state: DraftState) -> Self {
        self.state = state;
        self
    }

    pub fn state(&self) -> &DraftState {
        &self.state
    }

    pub fn into_state(self) -> DraftState {
        self.state
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn status(&self) -> Option<&Status> {
        self.status.as_ref()
    }

    pub fn dismiss_status(&mut self) {
        self.status = None;
    }

    /// Whether `title` is long enough to generate from.
    pub fn can_generate(title: &str) -> bool {
        title.trim().chars().count() > MIN_TITLE_CHARS
    }

    /// Generate a fresh article and all of its images.
    ///
    /// The draft is replaced only once every request has succeeded; the
    /// first failure aborts the rest and keeps the previous draft.
    pub async fn generate(&mut self, title: &str) -> Result<(), StudioError> {
        let title = title.trim();
        if !Self::can_generate(title) {
            return Err(self.fail(StudioError::TitleTooShort));
        }

        self.status = Some(Status::neutral("Generating article with Gemini…"));
        tracing::info!(title = %title, "Generating draft");

        match self.generate_draft(title).await {
            Ok(state) => {
                tracing::info!(
                    items = state.listicle_images.len(),
                    "Draft generated"
                );
                self.state = state;
                self.status = Some(Status::success(
                    "Draft generated successfully. Review the content before pushing live.",
                ));
                Ok(())
            }
            Err(e) => Err(self.fail(e)),
        }
    }

    async fn generate_draft(&self, title: &str) -> Result<DraftState, StudioError> {
        let article = self
            .gemini
            .generate_article(title, self.settings.gemini_api_key.as_ref())
            .await?;

        let ratios: BTreeMap<usize, ImageRatio> = (0..article.listicle.len())
            .map(|i| (i, ImageRatio::initial_for(i)))
            .collect();

        let jobs = std::iter::once((
            Slot::Featured,
            article.featured_image_prompt.as_str(),
            ImageRatio::FEATURED,
        ))
        .chain(article.listicle.iter().enumerate().map(|(i, item)| {
            (Slot::Listicle(i), item.image_prompt.as_str(), ratios[&i])
        }));

        let key = self.settings.ideogram_api_key.as_ref();
        let ideogram = &self.ideogram;
        let generated: Vec<(Slot, GeneratedImage)> = stream::iter(jobs)
            .map(|(slot, prompt, ratio)| async move {
                ideogram
                    .generate_image(prompt, ratio, key)
                    .await
                    .map(|image| (slot, image))
            })
            .buffer_unordered(self.max_concurrent_images)
            .try_collect()
            .await?;

        let mut featured_image = None;
        let mut listicle_images = BTreeMap::new();
        for (slot, image) in generated {
            match slot {
                Slot::Featured => featured_image = Some(image),
                Slot::Listicle(i) => {
                    listicle_images.insert(i, image);
                }
            }
        }

        Ok(DraftState {
            title: title.to_string(),
            article: Some(article),
            featured_image,
            listicle_images,
            ratios,
        })
    }

    /// Replace the image for listicle item `index` (zero-based) using the
    /// ratio currently selected for it.
    pub async fn regenerate_image(&mut self, index: usize) -> Result<(), StudioError> {
        let Some(article) = &self.state.article else {
            return Err(self.fail(StudioError::NoArticle));
        };
        let Some(item) = article.listicle.get(index) else {
            let len = article.listicle.len();
            return Err(self.fail(StudioError::NoSuchImage {
                number: index + 1,
                len,
            }));
        };

        let number = index + 1;
        let ratio = self.state.ratio_for(index);
        self.status = Some(Status::neutral(format!("Regenerating image #{number}…")));
        tracing::info!(number, ratio = %ratio, "Regenerating listicle image");

        let result = self
            .ideogram
            .generate_image(
                &item.image_prompt,
                ratio,
                self.settings.ideogram_api_key.as_ref(),
            )
            .await;

        match result {
            Ok(image) => {
                self.state.listicle_images.insert(index, image);
                self.status = Some(Status::success(format!("Image #{number} regenerated.")));
                Ok(())
            }
            Err(e) => Err(self.fail(e.into())),
        }
    }

    /// Replace the featured image, always at 4:3.
    pub async fn regenerate_featured(&mut self) -> Result<(), StudioError> {
        let Some(article) = &self.state.article else {
            return Err(self.fail(StudioError::NoArticle));
        };

        self.status = Some(Status::neutral("Regenerating featured image…"));
        let result = self
            .ideogram
            .generate_image(
                &article.featured_image_prompt,
                ImageRatio::FEATURED,
                self.settings.ideogram_api_key.as_ref(),
            )
            .await;

        match result {
            Ok(image) => {
                self.state.featured_image = Some(image);
                self.status = Some(Status::success("Featured image regenerated."));
                Ok(())
            }
            Err(e) => Err(self.fail(e.into())),
        }
    }

    /// Choose the ratio used the next time image `index` is regenerated.
    pub fn set_ratio(&mut self, index: usize, ratio: ImageRatio) -> Result<(), StudioError> {
        let Some(article) = &self.state.article else {
            return Err(self.fail(StudioError::NoArticle));
        };
        let len = article.listicle.len();
        if index >= len {
            return Err(self.fail(StudioError::NoSuchImage {
                number: index + 1,
                len,
            }));
        }
        self.state.ratios.insert(index, ratio);
        self.status = Some(Status::neutral(format!(
            "Image #{} will use {ratio} next time it is regenerated.",
            index + 1
        )));
        Ok(())
    }

    /// Push the draft to a saved website, found by id or name.
    pub async fn publish(&mut self, website: &str) -> Result<PublishedPost, StudioError> {
        let Some(site) = self.settings.find_website(website).cloned() else {
            return Err(self.fail(StudioError::UnknownWebsite(website.trim().to_string())));
        };
        if !self.state.is_publishable() {
            return Err(self.fail(StudioError::NotPublishable));
        }

        self.status = Some(Status::neutral("Uploading images to WordPress…"));
        let result = match (
            self.state.article.as_ref(),
            self.state.featured_image.as_ref(),
            self.state.ordered_listicle_images(),
        ) {
            (Some(article), Some(featured), Some(listicle_images)) => {
                let request = PublishRequest {
                    title: self.state.title.trim(),
                    article,
                    featured,
                    listicle_images,
                };
                self.wordpress
                    .publish(request, &site)
                    .await
                    .map_err(StudioError::from)
            }
            _ => Err(StudioError::NotPublishable),
        };

        match result {
            Ok(post) => {
                self.status = Some(Status::success(format!(
                    "Draft created on {}. Status: {}.",
                    site.name, post.status
                )));
                Ok(post)
            }
            Err(e) => Err(self.fail(e)),
        }
    }

    /// Forget the draft, its ratios and the status.
    pub fn reset(&mut self) {
        self.state = DraftState::default();
        self.status = None;
    }

    fn fail(&mut self, error: StudioError) -> StudioError {
        tracing::warn!(error = %error, "Studio operation failed");
        self.status = Some(Status::error(error.to_string()));
        error
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::draft::fixtures::{article, image};
    use crate::settings::WebsiteCredential;
    use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
    use secrecy::SecretString;
    use serde_json::json;
    use std::time::Duration;
    use wiremock::matchers::{body_partial_json, method, path, path_regex};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const JPEG: [u8; 6] = [0xff, 0xd8, 0xff, 0xe0, 0x00, 0x10];

    fn studio(server: &MockServer) -> Studio {
        let config = Config {
            gemini_base_url: server.uri(),
            ideogram_base_url: server.uri(),
            max_concurrent_images: 2,
            ..Config::default()
        };
        let settings = Settings {
            gemini_api_key: Some(SecretString::from("gemini-key")),
            ideogram_api_key: Some(SecretString::from("ideogram-key")),
            websites: vec![WebsiteCredential {
                id: "site-1".to_string(),
                name: "Decor Blog".to_string(),
                url: server.uri(),
                username: "editor".to_string(),
                application_password: SecretString::from("abcd efgh ijkl"),
            }],
        };
        Studio::new(&config, reqwest::Client::new(), settings)
    }

    async fn mount_gemini(server: &MockServer, items: usize) {
        let text = serde_json::to_string(&article(items)).unwrap();
        Mock::given(method("POST"))
            .and(path_regex(r"^/v1beta/models/.+:generateContent$"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "candidates": [{ "content": { "parts": [{ "text": text }] } }]
            })))
            .mount(server)
            .await;
    }

    async fn mount_ideogram(server: &MockServer) {
        Mock::given(method("POST"))
            .and(path("/images"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "data": [{ "image_base64": BASE64.encode(JPEG) }]
            })))
            .mount(server)
            .await;
    }

    fn ideogram_requests(requests: &[wiremock::Request]) -> Vec<serde_json::Value> {
        requests
            .iter()
            .filter(|r| r.url.path() == "/images")
            .map(|r| serde_json::from_slice(&r.body).unwrap())
            .collect()
    }

    fn generated_state(items: usize) -> DraftState {
        let mut state = DraftState {
            title: "Serene Bedroom Ideas".to_string(),
            article: Some(article(items)),
            featured_image: Some(image("Featured", ImageRatio::FEATURED)),
            ..Default::default()
        };
        for i in 0..items {
            state
                .listicle_images
                .insert(i, image(&format!("Prompt {}", i + 1), ImageRatio::initial_for(i)));
            state.ratios.insert(i, ImageRatio::initial_for(i));
        }
        state
    }

    #[test]
    fn test_can_generate() {
        assert!(!Studio::can_generate("Rugs"));
        assert!(!Studio::can_generate("  Rugs   "));
        assert!(Studio::can_generate("Rugs!"));
    }

    #[tokio::test]
    async fn test_short_title_rejected_without_requests() {
        let server = MockServer::start().await;
        let mut studio = studio(&server);

        let err = studio.generate("  abc ").await.unwrap_err();
        assert!(matches!(err, StudioError::TitleTooShort));
        assert_eq!(studio.status().unwrap().tone, StatusTone::Error);
        assert!(server.received_requests().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_generate_fills_draft() {
        let server = MockServer::start().await;
        mount_gemini(&server, 3).await;
        mount_ideogram(&server).await;

        let mut studio = studio(&server);
        studio.generate("  Serene Bedroom Ideas ").await.unwrap();

        let state = studio.state();
        assert_eq!(state.title, "Serene Bedroom Ideas");
        assert!(state.is_publishable());
        assert_eq!(state.featured_image.as_ref().unwrap().ratio, ImageRatio::Landscape);
        assert_eq!(state.listicle_images[&0].ratio, ImageRatio::Square);
        assert_eq!(state.listicle_images[&1].ratio, ImageRatio::Portrait);
        assert_eq!(state.listicle_images[&2].ratio, ImageRatio::Square);
        assert_eq!(state.listicle_images[&1].prompt, "Prompt 2");
        assert_eq!(state.ratio_for(1), ImageRatio::Portrait);

        let status = studio.status().unwrap();
        assert_eq!(status.tone, StatusTone::Success);
        assert_eq!(
            status.message,
            "Draft generated successfully. Review the content before pushing live."
        );

        let requests = server.received_requests().await.unwrap();
        let images = ideogram_requests(&requests);
        assert_eq!(images.len(), 4);
        assert!(images
            .iter()
            .any(|b| b["prompt"] == "Sunlit bedroom with linen bedding" && b["aspect_ratio"] == "4:3"));
    }

    #[tokio::test]
    async fn test_image_requests_respect_concurrency_limit() {
        let server = MockServer::start().await;
        mount_gemini(&server, 3).await;
        Mock::given(method("POST"))
            .and(path("/images"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(json!({
                        "data": [{ "image_base64": BASE64.encode(JPEG) }]
                    }))
                    .set_delay(Duration::from_millis(300)),
            )
            .expect(4)
            .mount(&server)
            .await;

        // Featured plus three listicle images, two at a time
        let mut studio = studio(&server);
        let started = std::time::Instant::now();
        studio.generate("Serene Bedroom Ideas").await.unwrap();
        let elapsed = started.elapsed();

        assert!(elapsed >= Duration::from_millis(600), "took {:?}", elapsed);
        assert!(elapsed < Duration::from_millis(1200), "took {:?}", elapsed);
        assert_eq!(studio.state().listicle_images.len(), 3);
    }

    #[tokio::test]
    async fn test_image_failure_keeps_previous_draft() {
        let server = MockServer::start().await;
        mount_gemini(&server, 3).await;
        Mock::given(method("POST"))
            .and(path("/images"))
            .and(body_partial_json(json!({ "prompt": "Prompt 2" })))
            .respond_with(ResponseTemplate::new(500).set_body_string("upstream exploded"))
            .with_priority(1)
            .mount(&server)
            .await;
        mount_ideogram(&server).await;

        let previous = generated_state(1);
        let mut studio = studio(&server).with_state(previous.clone());
        let err = studio.generate("Serene Bedroom Ideas").await.unwrap_err();

        assert!(matches!(err, StudioError::Image(ImageError::Api { status: 500, .. })));
        assert_eq!(studio.state(), &previous);
        let status = studio.status().unwrap();
        assert_eq!(status.tone, StatusTone::Error);
        assert_eq!(
            status.message,
            "Ideogram API request failed: 500 upstream exploded"
        );
    }

    #[tokio::test]
    async fn test_missing_gemini_key() {
        let server = MockServer::start().await;
        let mut studio = studio(&server);
        studio.settings.gemini_api_key = None;

        studio.generate("Serene Bedroom Ideas").await.unwrap_err();
        assert_eq!(
            studio.status().unwrap().message,
            "Gemini API key missing. Add it in Settings to generate content."
        );
        assert!(studio.state().article.is_none());
    }

    #[tokio::test]
    async fn test_regenerate_uses_selected_ratio() {
        let server = MockServer::start().await;
        mount_ideogram(&server).await;

        let mut studio = studio(&server).with_state(generated_state(2));
        studio.set_ratio(1, ImageRatio::Landscape).unwrap();
        studio.regenerate_image(1).await.unwrap();

        assert_eq!(studio.state().listicle_images[&1].ratio, ImageRatio::Landscape);
        assert_eq!(studio.state().listicle_images[&0].prompt, "Prompt 1");
        assert_eq!(studio.status().unwrap().message, "Image #2 regenerated.");

        let requests = server.received_requests().await.unwrap();
        let images = ideogram_requests(&requests);
        assert_eq!(images.len(), 1);
        assert_eq!(images[0]["prompt"], "Prompt 2");
        assert_eq!(images[0]["aspect_ratio"], "4:3");
    }

    #[tokio::test]
    async fn test_regenerate_defaults_to_square() {
        let server = MockServer::start().await;
        mount_ideogram(&server).await;

        let mut state = generated_state(2);
        state.ratios.clear();
        let mut studio = studio(&server).with_state(state);
        studio.regenerate_image(1).await.unwrap();

        assert_eq!(studio.state().listicle_images[&1].ratio, ImageRatio::Square);
    }

    #[tokio::test]
    async fn test_regenerate_failure_keeps_image() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/images"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "error": { "message": "prompt rejected" }
            })))
            .mount(&server)
            .await;

        let state = generated_state(2);
        let mut studio = studio(&server).with_state(state.clone());
        studio.regenerate_image(0).await.unwrap_err();

        assert_eq!(studio.state(), &state);
        assert_eq!(studio.status().unwrap().message, "Ideogram error: prompt rejected");
    }

    #[tokio::test]
    async fn test_regenerate_out_of_range() {
        let server = MockServer::start().await;
        let mut studio = studio(&server).with_state(generated_state(2));

        let err = studio.regenerate_image(2).await.unwrap_err();
        assert!(matches!(err, StudioError::NoSuchImage { number: 3, len: 2 }));
        assert!(studio.set_ratio(5, ImageRatio::Square).is_err());
    }

    #[tokio::test]
    async fn test_regenerate_featured() {
        let server = MockServer::start().await;
        mount_ideogram(&server).await;

        let mut studio = studio(&server).with_state(generated_state(1));
        studio.regenerate_featured().await.unwrap();

        let featured = studio.state().featured_image.as_ref().unwrap();
        assert_eq!(featured.prompt, "Sunlit bedroom with linen bedding");
        assert_eq!(featured.ratio, ImageRatio::Landscape);
    }

    #[tokio::test]
    async fn test_publish_requires_complete_draft() {
        let server = MockServer::start().await;
        let mut state = generated_state(2);
        state.listicle_images.remove(&1);
        let mut studio = studio(&server).with_state(state);

        let err = studio.publish("Decor Blog").await.unwrap_err();
        assert!(matches!(err, StudioError::NotPublishable));
        assert!(server.received_requests().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_publish_unknown_site() {
        let server = MockServer::start().await;
        let mut studio = studio(&server).with_state(generated_state(1));

        let err = studio.publish("Elsewhere").await.unwrap_err();
        assert_eq!(err.to_string(), "No saved website named 'Elsewhere'.");
    }

    #[tokio::test]
    async fn test_publish_success_status() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/wp-json/wp/v2/media"))
            .respond_with(ResponseTemplate::new(201).set_body_json(json!({
                "id": 3,
                "source_url": "https://cdn.example.com/a.jpg"
            })))
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/wp-json/wp/v2/posts"))
            .respond_with(ResponseTemplate::new(201).set_body_json(json!({
                "id": 77,
                "link": "https://decor.example.com/?p=77",
                "status": "draft"
            })))
            .expect(1)
            .mount(&server)
            .await;

        let mut studio = studio(&server).with_state(generated_state(2));
        let post = studio.publish("decor blog").await.unwrap();

        assert_eq!(post.id, 77);
        let status = studio.status().unwrap();
        assert_eq!(status.tone, StatusTone::Success);
        assert_eq!(status.message, "Draft created on Decor Blog. Status: draft.");
    }

    #[tokio::test]
    async fn test_reset_clears_everything() {
        let server = MockServer::start().await;
        let mut studio = studio(&server).with_state(generated_state(2));
        studio.regenerate_image(9).await.unwrap_err();
        assert!(studio.status().is_some());

        studio.reset();
        assert_eq!(studio.state(), &DraftState::default());
        assert!(studio.status().is_none());
    }

    #[tokio::test]
    async fn test_dismiss_status() {
        let server = MockServer::start().await;
        let mut studio = studio(&server).with_state(generated_state(1));
        studio.set_ratio(0, ImageRatio::Portrait).unwrap();
        studio.dismiss_status();
        assert!(studio.status().is_none());
        assert_eq!(studio.state().ratio_for(0), ImageRatio::Portrait);
    }
}
