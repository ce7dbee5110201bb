//! WordPress REST publisher.
//!
//! Uploads every image to the media library, then creates a draft post whose
//! body is Gutenberg block markup referencing the uploaded media.
use std::time::Duration;

use futures::stream::{self, StreamExt, TryStreamExt};
use secrecy::ExposeSecret;
use serde::{Deserialize, Serialize};
use serde_json::json;
use thiserror::Error;
use url::Url;

use super::blocks::{article_content, UploadedMedia};
use crate::draft::{ArticleDraft, DataUrlError, GeneratedImage};
use crate::http::{self, HttpError};
use crate::settings::WebsiteCredential;
use crate::util::{format_slug, normalize_base_url, validate_base_url, UrlValidationError};

#[derive(Debug, Error)]
pub enum PublishError {
    #[error("Website credentials are incomplete.")]
    IncompleteCredentials,
    #[error("Invalid website URL: {0}")]
    SiteUrl(#[from] UrlValidationError),
    #[error("Cannot upload image: {0}")]
    Image(#[from] DataUrlError),
    #[error("Failed to upload image to WordPress: {status} {body}")]
    Upload { status: u16, body: String },
    #[error("Failed to create WordPress draft: {status} {body}")]
    CreatePost { status: u16, body: String },
    #[error("Unexpected WordPress response: {0}")]
    InvalidResponse(String),
    #[error(transparent)]
    Http(#[from] HttpError),
}

/// The post WordPress created.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PublishedPost {
    pub id: u64,
    pub link: String,
    pub status: String,
}

/// Everything needed to publish one article.
pub struct PublishRequest<'a> {
    pub title: &'a str,
    pub article: &'a ArticleDraft,
    pub featured: &'a GeneratedImage,
    /// One image per listicle item, in item order.
    pub listicle_images: Vec<&'a GeneratedImage>,
}

#[derive(Clone)]
pub struct WordPressClient {
    http: reqwest::Client,
    timeout: Duration,
    max_concurrent_uploads: usize,
}

impl WordPressClient {
    pub fn new(http: reqwest::Client, timeout: Duration, max_concurrent_uploads: usize) -> Self {
        Self {
            http,
            timeout,
            max_concurrent_uploads: max_concurrent_uploads.max(1),
        }
    }

    /// Upload all images and create the draft post on `site`.
    ///
    /// The featured image is uploaded first, then the listicle images
    /// concurrently. The first failure aborts the publish; media already
    /// uploaded stay in the site's library.
    pub async fn publish(
        &self,
        request: PublishRequest<'_>,
        site: &WebsiteCredential,
    ) -> Result<PublishedPost, PublishError> {
        if !site.is_complete() {
            return Err(PublishError::IncompleteCredentials);
        }
        let base = validate_base_url(&site.url)?;
        let base = normalize_base_url(base.as_str()).to_string();

        let slug = match format_slug(&request.article.slug) {
            s if s.is_empty() => format_slug(request.title),
            s => s,
        };

        tracing::info!(
            site = %site.name,
            images = request.listicle_images.len() + 1,
            "Uploading images to WordPress"
        );

        let featured = self
            .upload_image(site, &base, request.featured, request.title, "featured", &slug)
            .await?;

        let mut uploaded: Vec<(usize, UploadedMedia)> =
            stream::iter(request.listicle_images.iter().enumerate())
                .map(|(index, image)| {
                    let alt = request
                        .article
                        .listicle
                        .get(index)
                        .map(|item| item.title.as_str())
                        .unwrap_or(request.title);
                    let base = &base;
                    let slug = &slug;
                    async move {
                        let label = index.to_string();
                        self.upload_image(site, base, image, alt, &label, slug)
                            .await
                            .map(|media| (index, media))
                    }
                })
                .buffer_unordered(self.max_concurrent_uploads)
                .try_collect()
                .await?;
        uploaded.sort_by_key(|(index, _)| *index);
        let media: Vec<UploadedMedia> = uploaded.into_iter().map(|(_, m)| m).collect();

        let content = article_content(request.article, &media);
        let post = self
            .create_post(site, &base, request, &slug, featured.id, content)
            .await?;

        tracing::info!(post_id = post.id, status = %post.status, site = %site.name, "WordPress draft created");
        Ok(post)
    }

    async fn upload_image(
        &self,
        site: &WebsiteCredential,
        base: &str,
        image: &GeneratedImage,
        alt: &str,
        label: &str,
        slug: &str,
    ) -> Result<UploadedMedia, PublishError> {
        let decoded = image.decode()?;
        let filename = format!(
            "{}-{}-{}.{}",
            slug,
            label,
            chrono::Utc::now().timestamp_millis(),
            decoded.extension()
        );

        let mut url = Url::parse(&format!("{}/wp-json/wp/v2/media", base))
            .map_err(UrlValidationError::from)?;
        url.query_pairs_mut().append_pair("alt_text", alt);

        let request = self
            .http
            .post(url)
            .basic_auth(&site.username, Some(site.application_password.expose_secret()))
            .header(
                reqwest::header::CONTENT_DISPOSITION,
                format!("attachment; filename=\"{}\"", filename),
            )
            .header(reqwest::header::CONTENT_TYPE, decoded.mime_type.as_str())
            .body(decoded.bytes);

        let reply = http::exchange(request, self.timeout).await?;
        let status = reply.status;
        if !status.is_success() {
            let body = reply.error_text();
            tracing::warn!(status = status.as_u16(), file = %filename, "Media upload failed");
            return Err(PublishError::Upload {
                status: status.as_u16(),
                body,
            });
        }

        let media: UploadedMedia = serde_json::from_slice(&reply.body)
            .map_err(|e| PublishError::InvalidResponse(e.to_string()))?;
        tracing::debug!(media_id = media.id, file = %filename, "Uploaded image");
        Ok(media)
    }

    async fn create_post(
        &self,
        site: &WebsiteCredential,
        base: &str,
        request: PublishRequest<'_>,
        slug: &str,
        featured_media: u64,
        content: String,
    ) -> Result<PublishedPost, PublishError> {
        let body = json!({
            "title": request.title,
            "content": content,
            "slug": slug,
            "status": "draft",
            "featured_media": featured_media,
            "meta": {
                "_yoast_wpseo_focuskw": request.article.focus_keyphrase,
                "_yoast_wpseo_metadesc": request.article.meta_description,
            }
        });
        let payload = serde_json::to_vec(&body)
            .map_err(|e| PublishError::InvalidResponse(e.to_string()))?;

        let request = self
            .http
            .post(format!("{}/wp-json/wp/v2/posts", base))
            .basic_auth(&site.username, Some(site.application_password.expose_secret()))
            .header(reqwest::header::CONTENT_TYPE, "application/json")
            .body(payload);

        let reply = http::exchange(request, self.timeout).await?;
        let status = reply.status;
        if !status.is_success() {
            let body = reply.error_text();
            return Err(PublishError::CreatePost {
                status: status.as_u16(),
                body,
            });
        }

        serde_json::from_slice(&reply.body)
            .map_err(|e| PublishError::InvalidResponse(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::draft::fixtures::{article, image};
    use crate::draft::ImageRatio;
    use secrecy::SecretString;
    use wiremock::matchers::{header, header_regex, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn site(server: &MockServer) -> WebsiteCredential {
        WebsiteCredential {
            id: "site-1".to_string(),
            name: "Cozy Loft Blog".to_string(),
            url: format!("{}/", server.uri()),
            username: "editor".to_string(),
            application_password: SecretString::from("abcd efgh ijkl"),
        }
    }

    fn client() -> WordPressClient {
        WordPressClient::new(
            http::build_client(Duration::from_secs(30)).unwrap(),
            Duration::from_secs(5),
            4,
        )
    }

    async fn mount_media(server: &MockServer) {
        Mock::given(method("POST"))
            .and(path("/wp-json/wp/v2/media"))
            .and(header_regex("authorization", "^Basic "))
            .respond_with(ResponseTemplate::new(201).set_body_json(json!({
                "id": 11,
                "source_url": "https://cdn.example.com/uploads/img.jpg"
            })))
            .mount(server)
            .await;
    }

    #[tokio::test]
    async fn test_publish_creates_draft() {
        let server = MockServer::start().await;
        mount_media(&server).await;
        Mock::given(method("POST"))
            .and(path("/wp-json/wp/v2/posts"))
            .and(header("content-type", "application/json"))
            .respond_with(ResponseTemplate::new(201).set_body_json(json!({
                "id": 99,
                "link": "https://decor.example.com/?p=99",
                "status": "draft"
            })))
            .expect(1)
            .mount(&server)
            .await;

        let draft = article(2);
        let featured = image("featured", ImageRatio::FEATURED);
        let one = image("one", ImageRatio::Square);
        let two = image("two", ImageRatio::Portrait);
        let post = client()
            .publish(
                PublishRequest {
                    title: "Serene Bedroom Ideas",
                    article: &draft,
                    featured: &featured,
                    listicle_images: vec![&one, &two],
                },
                &site(&server),
            )
            .await
            .unwrap();

        assert_eq!(post.id, 99);
        assert_eq!(post.status, "draft");

        let requests = server.received_requests().await.unwrap();
        let uploads: Vec<_> = requests
            .iter()
            .filter(|r| r.url.path() == "/wp-json/wp/v2/media")
            .collect();
        assert_eq!(uploads.len(), 3);

        let post_req = requests
            .iter()
            .find(|r| r.url.path() == "/wp-json/wp/v2/posts")
            .unwrap();
        let sent: serde_json::Value = serde_json::from_slice(&post_req.body).unwrap();
        assert_eq!(sent["title"], "Serene Bedroom Ideas");
        assert_eq!(sent["status"], "draft");
        assert_eq!(sent["slug"], "serene-bedroom-ideas");
        assert_eq!(sent["featured_media"], 11);
        assert_eq!(sent["meta"]["_yoast_wpseo_focuskw"], "serene bedroom");
        assert_eq!(
            sent["meta"]["_yoast_wpseo_metadesc"],
            "Serene bedroom styling tricks."
        );
        let content = sent["content"].as_str().unwrap();
        assert!(content.contains("<h2>2. Idea 2</h2>"));
        assert!(content.contains("src=\"https://cdn.example.com/uploads/img.jpg\""));
    }

    #[tokio::test]
    async fn test_listicle_uploads_respect_concurrency_limit() {
        let server = MockServer::start().await;
        let media = json!({ "id": 11, "source_url": "https://cdn.example.com/uploads/img.jpg" });
        Mock::given(method("POST"))
            .and(path("/wp-json/wp/v2/media"))
            .and(query_param("alt_text", "Serene Bedroom Ideas"))
            .respond_with(ResponseTemplate::new(201).set_body_json(media.clone()))
            .with_priority(1)
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/wp-json/wp/v2/media"))
            .respond_with(
                ResponseTemplate::new(201)
                    .set_body_json(media)
                    .set_delay(Duration::from_millis(300)),
            )
            .expect(4)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/wp-json/wp/v2/posts"))
            .respond_with(ResponseTemplate::new(201).set_body_json(json!({
                "id": 99,
                "link": "https://decor.example.com/?p=99",
                "status": "draft"
            })))
            .mount(&server)
            .await;

        let client = WordPressClient::new(
            http::build_client(Duration::from_secs(30)).unwrap(),
            Duration::from_secs(5),
            2,
        );
        let draft = article(4);
        let featured = image("featured", ImageRatio::FEATURED);
        let images: Vec<GeneratedImage> = (0..4)
            .map(|i| image(&format!("Prompt {}", i + 1), ImageRatio::initial_for(i)))
            .collect();

        let started = std::time::Instant::now();
        client
            .publish(
                PublishRequest {
                    title: "Serene Bedroom Ideas",
                    article: &draft,
                    featured: &featured,
                    listicle_images: images.iter().collect(),
                },
                &site(&server),
            )
            .await
            .unwrap();
        let elapsed = started.elapsed();

        // Four delayed uploads, two at a time
        assert!(elapsed >= Duration::from_millis(600), "took {:?}", elapsed);
        assert!(elapsed < Duration::from_millis(1200), "took {:?}", elapsed);
    }

    #[tokio::test]
    async fn test_upload_sends_binary_with_filename_and_alt() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/wp-json/wp/v2/media"))
            .and(query_param("alt_text", "Serene Bedroom Ideas"))
            .and(header("content-type", "image/jpeg"))
            .and(header_regex(
                "content-disposition",
                r#"^attachment; filename="serene-bedroom-ideas-featured-\d+\.jpg"$"#,
            ))
            .respond_with(ResponseTemplate::new(201).set_body_json(json!({
                "id": 5,
                "source_url": "https://cdn.example.com/f.jpg"
            })))
            .expect(1)
            .mount(&server)
            .await;

        let featured = image("featured", ImageRatio::FEATURED);
        let media = client()
            .upload_image(
                &site(&server),
                &server.uri(),
                &featured,
                "Serene Bedroom Ideas",
                "featured",
                "serene-bedroom-ideas",
            )
            .await
            .unwrap();
        assert_eq!(media.id, 5);

        let requests = server.received_requests().await.unwrap();
        assert_eq!(requests[0].body, featured.decode().unwrap().bytes);
    }

    #[tokio::test]
    async fn test_upload_failure_aborts_before_post() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/wp-json/wp/v2/media"))
            .respond_with(ResponseTemplate::new(401).set_body_string("rest_cannot_create"))
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/wp-json/wp/v2/posts"))
            .respond_with(ResponseTemplate::new(201))
            .expect(0)
            .mount(&server)
            .await;

        let draft = article(1);
        let featured = image("featured", ImageRatio::FEATURED);
        let one = image("one", ImageRatio::Square);
        let err = client()
            .publish(
                PublishRequest {
                    title: "Serene Bedroom Ideas",
                    article: &draft,
                    featured: &featured,
                    listicle_images: vec![&one],
                },
                &site(&server),
            )
            .await
            .unwrap_err();

        assert_eq!(
            err.to_string(),
            "Failed to upload image to WordPress: 401 rest_cannot_create"
        );
    }

    #[tokio::test]
    async fn test_create_post_failure() {
        let server = MockServer::start().await;
        mount_media(&server).await;
        Mock::given(method("POST"))
            .and(path("/wp-json/wp/v2/posts"))
            .respond_with(ResponseTemplate::new(400).set_body_string("rest_invalid_param"))
            .mount(&server)
            .await;

        let draft = article(0);
        let featured = image("featured", ImageRatio::FEATURED);
        let err = client()
            .publish(
                PublishRequest {
                    title: "Serene Bedroom Ideas",
                    article: &draft,
                    featured: &featured,
                    listicle_images: vec![],
                },
                &site(&server),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, PublishError::CreatePost { status: 400, .. }));
    }

    #[tokio::test]
    async fn test_incomplete_credentials() {
        let server = MockServer::start().await;
        let mut incomplete = site(&server);
        incomplete.username = "  ".to_string();

        let draft = article(0);
        let featured = image("featured", ImageRatio::FEATURED);
        let err = client()
            .publish(
                PublishRequest {
                    title: "Serene Bedroom Ideas",
                    article: &draft,
                    featured: &featured,
                    listicle_images: vec![],
                },
                &incomplete,
            )
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "Website credentials are incomplete.");
    }

    #[tokio::test]
    async fn test_slug_falls_back_to_title() {
        let server = MockServer::start().await;
        mount_media(&server).await;
        Mock::given(method("POST"))
            .and(path("/wp-json/wp/v2/posts"))
            .respond_with(ResponseTemplate::new(201).set_body_json(json!({
                "id": 1, "link": "https://decor.example.com/?p=1", "status": "draft"
            })))
            .mount(&server)
            .await;

        let mut draft = article(0);
        draft.slug = "!!!".to_string();
        let featured = image("featured", ImageRatio::FEATURED);
        client()
            .publish(
                PublishRequest {
                    title: "Warm Minimalist Rooms",
                    article: &draft,
                    featured: &featured,
                    listicle_images: vec![],
                },
                &site(&server),
            )
            .await
            .unwrap();

        let requests = server.received_requests().await.unwrap();
        let post_req = requests
            .iter()
            .find(|r| r.url.path() == "/wp-json/wp/v2/posts")
            .unwrap();
        let sent: serde_json::Value = serde_json::from_slice(&post_req.body).unwrap();
        assert_eq!(sent["slug"], "warm-minimalist-rooms");
    }

    #[tokio::test]
    async fn test_insecure_site_rejected() {
        let mut insecure = WebsiteCredential {
            id: "x".to_string(),
            name: "Plain".to_string(),
            url: "http://decor.example.com".to_string(),
            username: "editor".to_string(),
            application_password: SecretString::from("abcd efgh"),
        };
        let draft = article(0);
        let featured = image("featured", ImageRatio::FEATURED);
        let result = client()
            .publish(
                PublishRequest {
                    title: "T",
                    article: &draft,
                    featured: &featured,
                    listicle_images: vec![],
                },
                &insecure,
            )
            .await;
        assert!(matches!(result, Err(PublishError::SiteUrl(_))));

        insecure.url = "ftp://decor.example.com".to_string();
        assert!(validate_base_url(&insecure.url).is_err());
    }
}
