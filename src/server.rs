//! HTTP endpoints.
//!
//! `POST /create_ppt` turns a topic into an outline with photo URLs,
//! `POST /download` turns a (possibly edited) outline into a `.pptx`, and
//! `POST /rewrite` is reserved.

use crate::agent::{generate_outline, AgentError, ChatSession, GeminiAgent, SlideModel};
use crate::config::Config;
use crate::deck::{self, DOWNLOAD_NAME, PPTX_MIME};
use crate::images::{create_client, ImageError, ImageSearch};
use crate::slide::{duplicate_id, Outline, Slide};
use axum::extract::State;
use axum::http::{header, StatusCode};
use axum::response::IntoResponse;
use axum::routing::post;
use axum::{Form, Json, Router};
use reqwest::Client;
use serde::Deserialize;
use std::sync::Arc;
use thiserror::Error;
use tower_http::cors::CorsLayer;

#[derive(Error, Debug)]
pub enum ServerError {
    #[error("failed to bind {addr}: {source}")]
    BindError {
        addr: String,
        source: std::io::Error,
    },
    #[error("server error: {0}")]
    ServeError(#[from] std::io::Error),
    #[error(transparent)]
    AgentError(#[from] AgentError),
    #[error(transparent)]
    ImageError(#[from] ImageError),
    #[error("failed to build HTTP client: {0}")]
    ClientError(#[from] reqwest::Error),
}

/// Form fields of an outline request
#[derive(Debug, Deserialize)]
pub struct OutlineForm {
    pub title: String,
    #[serde(rename = "numSlides")]
    pub num_slides: String,
    #[serde(rename = "additionalInstructions", default)]
    pub additional_instructions: String,
}

/// Body of a download request
#[derive(Debug, Deserialize)]
pub struct DownloadRequest {
    #[serde(default)]
    pub slides: Vec<EditedSlide>,
}

/// A slide sent back by the client for rendering.
///
/// Stricter than [`Slide`]: the bullet list must be present, even if empty.
#[derive(Debug, Deserialize)]
pub struct EditedSlide {
    pub id: i64,
    pub title: String,
    pub points: Vec<String>,
    #[serde(default)]
    pub image_keywords: Vec<String>,
    #[serde(default)]
    pub image_url: Option<String>,
}

impl From<EditedSlide> for Slide {
    fn from(edited: EditedSlide) -> Self {
        Slide {
            id: edited.id,
            title: edited.title,
            points: edited.points,
            image_keywords: edited.image_keywords,
            image_url: edited.image_url,
        }
    }
}

/// State shared by all handlers; read-only after startup.
#[derive(Clone)]
struct AppState {
    model: Arc<dyn SlideModel>,
    images: ImageSearch,
    http: Client,
    persona: String,
}

/// The presentation service
pub struct Server {
    state: AppState,
}

impl Server {
    pub fn new(model: Arc<dyn SlideModel>, images: ImageSearch, http: Client, persona: impl Into<String>) -> Self {
        Self {
            state: AppState {
                model,
                images,
                http,
                persona: persona.into(),
            },
        }
    }

    /// Wire the Gemini model and Unsplash search from configuration
    pub fn from_config(config: &Config) -> Result<Self, ServerError> {
        let model = GeminiAgent::from_config(config)?;
        let images = ImageSearch::from_config(config)?;
        let http = create_client(config.images.timeout())?;
        Ok(Self::new(Arc::new(model), images, http, config.agent.persona.as_str()))
    }

    pub fn router(self) -> Router {
        Router::new()
            .route("/create_ppt", post(create_ppt))
            .route("/download", post(download))
            .route("/rewrite", post(rewrite))
            .layer(CorsLayer::permissive())
            .with_state(self.state)
    }

    /// Listen on `addr` until the process is stopped
    pub async fn run(self, addr: &str) -> Result<(), ServerError> {
        let listener = tokio::net::TcpListener::bind(addr)
            .await
            .map_err(|source| ServerError::BindError {
                addr: addr.to_string(),
                source,
            })?;

        tracing::info!(addr, "listening");
        axum::serve(listener, self.router()).await?;
        Ok(())
    }
}

/// Validate a slide count before any upstream call is made.
fn parse_slide_count(raw: &str) -> Result<u64, String> {
    match raw.trim().parse::<u64>() {
        Ok(0) | Err(_) => Err(format!("numSlides must be a positive integer, got {raw:?}")),
        Ok(count) => Ok(count),
    }
}

async fn create_ppt(
    State(state): State<AppState>,
    Form(form): Form<OutlineForm>,
) -> Result<Json<Outline>, (StatusCode, String)> {
    let topic = form.title.trim();
    if topic.is_empty() {
        return Err((StatusCode::BAD_REQUEST, "title must not be empty".to_string()));
    }
    let count = parse_slide_count(&form.num_slides).map_err(|e| (StatusCode::BAD_REQUEST, e))?;
    tracing::info!(topic, count, "outline requested");

    let mut session = ChatSession::new(state.persona.as_str());
    let mut outline = generate_outline(
        state.model.as_ref(),
        &mut session,
        topic,
        &count.to_string(),
        &form.additional_instructions,
    )
    .await
    .map_err(|e| {
        tracing::error!(error = %e, "outline generation failed");
        (StatusCode::BAD_GATEWAY, e.to_string())
    })?;

    state.images.enrich(&mut outline).await;
    Ok(Json(outline))
}

async fn download(
    State(state): State<AppState>,
    Json(request): Json<DownloadRequest>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let slides: Outline = request.slides.into_iter().map(Slide::from).collect();
    if let Some(id) = duplicate_id(&slides) {
        return Err((StatusCode::BAD_REQUEST, format!("duplicate slide id {id}")));
    }
    tracing::info!(slides = slides.len(), "document requested");

    let bytes = deck::assemble(&state.http, &slides).await.map_err(|e| {
        tracing::error!(error = %e, "document assembly failed");
        (StatusCode::INTERNAL_SERVER_ERROR, e.to_string())
    })?;

    let headers = [
        (header::CONTENT_TYPE, PPTX_MIME.to_string()),
        (
            header::CONTENT_DISPOSITION,
            format!("attachment; filename=\"{DOWNLOAD_NAME}\""),
        ),
    ];
    Ok((headers, bytes))
}

/// Reserved for rewriting a slide from free text; no contract yet.
async fn rewrite() -> StatusCode {
    StatusCode::NOT_IMPLEMENTED
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agent::tests::CannedModel;
    use mockito::{Matcher, Server as MockServer, ServerGuard};
    use std::io::Cursor;
    use std::time::Duration;

    const TWO_SLIDES: &str = r#"Here you go:
```json
[
  {"id": 1, "title": "What is an ocean?", "points": ["Salt water", "Covers 71% of Earth"], "image_keywords": ["ocean"]},
  {"id": 2, "title": "Ocean life", "points": ["Fish", "Whales"], "image_keywords": ["coral reef"]}
]
```"#;

    struct Harness {
        base: String,
        model: Arc<CannedModel>,
        _images: ServerGuard,
    }

    async fn spawn(model: CannedModel) -> Harness {
        let mut images = MockServer::new_async().await;
        images
            .mock("GET", "/search/photos")
            .match_query(Matcher::Any)
            .with_status(200)
            .with_body(r#"{"results": [{"urls": {"small": "https://img.test/small.jpg"}}]}"#)
            .create_async()
            .await;

        let model = Arc::new(model);
        let timeout = Duration::from_secs(5);
        let search = ImageSearch::new(images.url(), "client", "squarish", timeout).unwrap();
        let server = Server::new(model.clone(), search, create_client(timeout).unwrap(), "");

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let _ = axum::serve(listener, server.router()).await;
        });

        Harness {
            base: format!("http://{addr}"),
            model,
            _images: images,
        }
    }

    async fn post_form(base: &str, body: &str) -> reqwest::Response {
        Client::new()
            .post(format!("{base}/create_ppt"))
            .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
            .body(body.to_string())
            .send()
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn create_ppt_returns_enriched_outline() {
        let harness = spawn(CannedModel::replying(TWO_SLIDES)).await;

        let response = post_form(
            &harness.base,
            "title=Intro+to+Oceans&numSlides=2&additionalInstructions=",
        )
        .await;
        assert_eq!(response.status(), StatusCode::OK);

        let outline: serde_json::Value = response.json().await.unwrap();
        let slides = outline.as_array().unwrap();
        assert_eq!(slides.len(), 2);
        for slide in slides {
            for key in ["id", "title", "points", "image_keywords", "image_url"] {
                assert!(slide.get(key).is_some(), "missing {key}");
            }
            assert_eq!(slide["image_url"], "https://img.test/small.jpg");
        }

        let seen = harness.model.seen.lock().unwrap();
        assert!(seen[0][0].text.contains("Intro to Oceans"));
        assert!(seen[0][0].text.contains("exactly 2 slides"));
    }

    #[tokio::test]
    async fn invalid_slide_counts_are_rejected_before_the_model() {
        let harness = spawn(CannedModel::replying(TWO_SLIDES)).await;

        for count in ["0", "-1", "abc", ""] {
            let response = post_form(&harness.base, &format!("title=Oceans&numSlides={count}")).await;
            assert_eq!(response.status(), StatusCode::BAD_REQUEST, "count {count:?}");
        }
        let response = post_form(&harness.base, "title=+&numSlides=2").await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        assert_eq!(harness.model.calls(), 0);
    }

    #[tokio::test]
    async fn model_failure_is_a_bad_gateway() {
        let harness = spawn(CannedModel::failing("quota exceeded")).await;
        let response = post_form(&harness.base, "title=Oceans&numSlides=2").await;
        assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
        assert!(response.text().await.unwrap().contains("quota exceeded"));
    }

    #[tokio::test]
    async fn unparseable_reply_is_a_bad_gateway() {
        let harness = spawn(CannedModel::replying("Sorry, I can't help with that.")).await;
        let response = post_form(&harness.base, "title=Oceans&numSlides=2").await;
        assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
    }

    #[tokio::test]
    async fn download_returns_pptx_attachment() {
        let harness = spawn(CannedModel::replying(TWO_SLIDES)).await;
        let body = serde_json::json!({
            "slides": [
                {"id": 1, "title": "Edited title", "points": ["One"], "image_keywords": []},
                {"id": 2, "title": "Second", "points": [], "image_keywords": ["x"]}
            ]
        });

        let response = Client::new()
            .post(format!("{}/download", harness.base))
            .json(&body)
            .send()
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers()[header::CONTENT_TYPE], PPTX_MIME);
        assert_eq!(
            response.headers()[header::CONTENT_DISPOSITION],
            "attachment; filename=\"presentation.pptx\""
        );

        let bytes = response.bytes().await.unwrap();
        let archive = zip::ZipArchive::new(Cursor::new(bytes.to_vec())).unwrap();
        assert!(archive.file_names().any(|n| n == "ppt/slides/slide2.xml"));
        assert!(!archive.file_names().any(|n| n == "ppt/slides/slide3.xml"));
    }

    #[tokio::test]
    async fn download_rejects_malformed_outlines() {
        let harness = spawn(CannedModel::replying(TWO_SLIDES)).await;
        let client = Client::new();
        let url = format!("{}/download", harness.base);

        let duplicate = serde_json::json!({"slides": [
            {"id": 1, "title": "a", "points": []},
            {"id": 1, "title": "b", "points": []}
        ]});
        let response = client.post(&url).json(&duplicate).send().await.unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let untitled = serde_json::json!({"slides": [{"id": 1, "points": ["no title"]}]});
        let response = client.post(&url).json(&untitled).send().await.unwrap();
        assert!(response.status().is_client_error());

        let pointless = serde_json::json!({"slides": [{"id": 1, "title": "no bullets key"}]});
        let response = client.post(&url).json(&pointless).send().await.unwrap();
        assert!(response.status().is_client_error());
    }

    #[test]
    fn download_records_require_points() {
        let missing = serde_json::from_str::<DownloadRequest>(r#"{"slides": [{"id": 1, "title": "t"}]}"#);
        assert!(missing.is_err());

        let request: DownloadRequest = serde_json::from_str(
            r#"{"slides": [{"id": 7, "title": "t", "points": [], "image_url": "https://img.test/a.jpg"}]}"#,
        )
        .unwrap();
        let slide = Slide::from(request.slides.into_iter().next().unwrap());
        assert!(slide.points.is_empty());
        assert!(slide.image_keywords.is_empty());
        assert_eq!(slide.image_url.as_deref(), Some("https://img.test/a.jpg"));
    }

    #[tokio::test]
    async fn rewrite_is_not_implemented() {
        let harness = spawn(CannedModel::replying(TWO_SLIDES)).await;
        let response = Client::new()
            .post(format!("{}/rewrite", harness.base))
            .send()
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_IMPLEMENTED);
        assert!(response.bytes().await.unwrap().is_empty());
    }

    #[test]
    fn slide_counts() {
        assert_eq!(parse_slide_count(" 5 "), Ok(5));
        assert!(parse_slide_count("0").is_err());
        assert!(parse_slide_count("-3").is_err());
        assert!(parse_slide_count("2.5").is_err());
        assert_eq!(parse_slide_count("4294967296"), Ok(4_294_967_296));
    }
}
