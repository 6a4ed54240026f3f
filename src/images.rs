//! Photo lookup for slides.
//!
//! Uses the Unsplash search API through reqwest. Each slide's keywords are
//! tried in order and the first hit wins; failures are logged, never fatal.

use crate::config::{Config, ConfigError};
use crate::slide::Slide;
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use std::time::Duration;
use thiserror::Error;

/// User-Agent string sent with every outbound request
const USER_AGENT: &str = concat!("slidesmith/", env!("CARGO_PKG_VERSION"));

#[derive(Error, Debug)]
pub enum ImageError {
    #[error("image request failed: {0}")]
    FetchError(#[from] reqwest::Error),
    #[error("image search returned {status}: {body}")]
    Status { status: u16, body: String },
    #[error("configuration error: {0}")]
    ConfigError(#[from] ConfigError),
}

#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    results: Vec<Photo>,
}

#[derive(Debug, Deserialize)]
struct Photo {
    urls: PhotoUrls,
}

#[derive(Debug, Deserialize)]
struct PhotoUrls {
    small: String,
}

/// Create a configured HTTP client for outbound calls
pub fn create_client(timeout: Duration) -> Result<Client, reqwest::Error> {
    Client::builder()
        .user_agent(USER_AGENT)
        .timeout(timeout)
        .build()
}

/// Client for the photo search service
#[derive(Debug, Clone)]
pub struct ImageSearch {
    client: Client,
    base_url: String,
    client_id: String,
    orientation: String,
}

impl ImageSearch {
    pub fn new(
        base_url: impl Into<String>,
        client_id: impl Into<String>,
        orientation: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self, ImageError> {
        Ok(Self {
            client: create_client(timeout)?,
            base_url: base_url.into(),
            client_id: client_id.into(),
            orientation: orientation.into(),
        })
    }

    pub fn from_config(config: &Config) -> Result<Self, ImageError> {
        Self::new(
            config.images.base_url.as_str(),
            config.client_id()?,
            config.images.orientation.as_str(),
            config.images.timeout(),
        )
    }

    /// Search for one photo matching `keyword`.
    ///
    /// Returns the small rendition URL of the first result, or `None` when
    /// the search succeeded but found nothing.
    pub async fn search(&self, keyword: &str) -> Result<Option<String>, ImageError> {
        let url = format!("{}/search/photos", self.base_url.trim_end_matches('/'));
        let response = self
            .client
            .get(&url)
            .query(&[
                ("client_id", self.client_id.as_str()),
                ("query", keyword),
                ("page", "1"),
                ("per_page", "1"),
                ("orientation", self.orientation.as_str()),
            ])
            .send()
            .await?;

        let status = response.status();
        if status != StatusCode::OK {
            let body = response.text().await.unwrap_or_default();
            return Err(ImageError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let found: SearchResponse = response.json().await?;
        Ok(found.results.into_iter().next().map(|photo| photo.urls.small))
    }

    /// Attach a photo URL to every slide for which one of its keywords
    /// yields a result. Slides without a match are left unchanged.
    pub async fn enrich(&self, slides: &mut [Slide]) {
        for slide in slides.iter_mut() {
            for keyword in &slide.image_keywords {
                match self.search(keyword).await {
                    Ok(Some(url)) => {
                        tracing::debug!(slide = slide.id, keyword = %keyword, "photo found");
                        slide.image_url = Some(url);
                        break;
                    }
                    Ok(None) => {
                        tracing::info!(slide = slide.id, keyword = %keyword, "no photos found");
                    }
                    Err(e) => {
                        tracing::warn!(slide = slide.id, keyword = %keyword, error = %e, "image search failed");
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockito::{Matcher, Server, ServerGuard};

    fn search_for(server: &ServerGuard) -> ImageSearch {
        ImageSearch::new(server.url(), "test-client", "squarish", Duration::from_secs(5)).unwrap()
    }

    fn photo_body(url: &str) -> String {
        format!(r#"{{"total": 1, "results": [{{"id": "x", "urls": {{"small": "{url}", "raw": "ignored"}}}}]}}"#)
    }

    fn query_for(keyword: &str) -> Matcher {
        Matcher::AllOf(vec![
            Matcher::UrlEncoded("client_id".into(), "test-client".into()),
            Matcher::UrlEncoded("query".into(), keyword.into()),
            Matcher::UrlEncoded("per_page".into(), "1".into()),
            Matcher::UrlEncoded("orientation".into(), "squarish".into()),
        ])
    }

    fn slide(id: i64, keywords: &[&str]) -> Slide {
        Slide::new(id, format!("Slide {id}"), vec![])
            .with_keywords(keywords.iter().map(|k| k.to_string()).collect())
    }

    #[tokio::test]
    async fn first_keyword_hit_fills_every_slide() {
        let mut server = Server::new_async().await;
        let ocean = server
            .mock("GET", "/search/photos")
            .match_query(query_for("ocean"))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(photo_body("https://img.test/ocean-small.jpg"))
            .create_async()
            .await;
        let reef = server
            .mock("GET", "/search/photos")
            .match_query(query_for("coral reef"))
            .with_status(200)
            .with_body(photo_body("https://img.test/reef-small.jpg"))
            .create_async()
            .await;
        let whale = server
            .mock("GET", "/search/photos")
            .match_query(query_for("whale"))
            .expect(0)
            .create_async()
            .await;

        let mut slides = vec![slide(1, &["ocean"]), slide(2, &["coral reef", "whale"])];
        search_for(&server).enrich(&mut slides).await;

        assert_eq!(slides[0].image_url.as_deref(), Some("https://img.test/ocean-small.jpg"));
        assert_eq!(slides[1].image_url.as_deref(), Some("https://img.test/reef-small.jpg"));
        ocean.assert_async().await;
        reef.assert_async().await;
        whale.assert_async().await;
    }

    #[tokio::test]
    async fn falls_back_to_next_keyword_after_error() {
        let mut server = Server::new_async().await;
        server
            .mock("GET", "/search/photos")
            .match_query(query_for("rate limited"))
            .with_status(403)
            .with_body("Rate Limit Exceeded")
            .create_async()
            .await;
        server
            .mock("GET", "/search/photos")
            .match_query(query_for("nothing"))
            .with_status(200)
            .with_body(r#"{"total": 0, "results": []}"#)
            .create_async()
            .await;
        server
            .mock("GET", "/search/photos")
            .match_query(query_for("kelp"))
            .with_status(200)
            .with_body(photo_body("https://img.test/kelp.jpg"))
            .create_async()
            .await;

        let mut slides = vec![slide(1, &["rate limited", "nothing", "kelp"])];
        search_for(&server).enrich(&mut slides).await;

        assert_eq!(slides[0].image_url.as_deref(), Some("https://img.test/kelp.jpg"));
    }

    #[tokio::test]
    async fn slide_without_hits_is_unchanged() {
        let mut server = Server::new_async().await;
        server
            .mock("GET", "/search/photos")
            .match_query(Matcher::Any)
            .with_status(500)
            .with_body("upstream exploded")
            .create_async()
            .await;

        let before = slide(4, &["abyss", "trench"]);
        let mut slides = vec![before.clone()];
        search_for(&server).enrich(&mut slides).await;

        assert_eq!(slides[0], before);
        let json = serde_json::to_value(&slides[0]).unwrap();
        assert!(json.get("image_url").is_none());
    }

    #[tokio::test]
    async fn search_reports_status_and_body() {
        let mut server = Server::new_async().await;
        server
            .mock("GET", "/search/photos")
            .match_query(Matcher::Any)
            .with_status(401)
            .with_body("OAuth error: The access token is invalid")
            .create_async()
            .await;

        let err = search_for(&server).search("ocean").await.unwrap_err();
        match err {
            ImageError::Status { status, body } => {
                assert_eq!(status, 401);
                assert!(body.contains("access token"));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn unreachable_service_is_swallowed() {
        let search =
            ImageSearch::new("http://127.0.0.1:1", "id", "squarish", Duration::from_secs(2)).unwrap();
        let mut slides = vec![slide(1, &["ocean"])];
        search.enrich(&mut slides).await;
        assert_eq!(slides[0].image_url, None);
    }
}
