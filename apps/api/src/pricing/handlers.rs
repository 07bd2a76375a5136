//! Axum route handlers for the Recommendations API.

use anyhow::Context;
use axum::{
    extract::{multipart::MultipartError, Multipart, Path, Query, State},
    http::StatusCode,
    Json,
};
use bytes::Bytes;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, info};
use uuid::Uuid;

use crate::errors::AppError;
use crate::models::recommendation::{
    parse_price, JobSubmission, RecommendationResult, ScopeType, StoredRecommendation,
};
use crate::pricing::engine::recommend;
use crate::pricing::notes::refine_note;
use crate::state::AppState;

const DEFAULT_LIST_LIMIT: usize = 50;
const MAX_LIST_LIMIT: usize = 500;

// ────────────────────────────────────────────────────────────────────────────
// Request / Response types
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PreviewRequest {
    /// Number or string; anything else is treated as missing.
    pub price: Option<Value>,
    #[serde(default)]
    pub description: String,
    pub scope_type: Option<String>,
    pub operator_id: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListQuery {
    pub scope_type: Option<String>,
    pub limit: Option<usize>,
}

/// A recommendation as returned to clients. `persisted` is false for previews and for the
/// insufficient-input variant, which are never stored.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RecommendationResponse {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<Uuid>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
    pub persisted: bool,
    #[serde(flatten)]
    pub result: RecommendationResult,
}

impl From<StoredRecommendation> for RecommendationResponse {
    fn from(stored: StoredRecommendation) -> Self {
        Self {
            id: Some(stored.id),
            created_at: Some(stored.created_at),
            persisted: true,
            result: stored.result,
        }
    }
}

impl From<RecommendationResult> for RecommendationResponse {
    fn from(result: RecommendationResult) -> Self {
        Self {
            id: None,
            created_at: None,
            persisted: false,
            result,
        }
    }
}

#[derive(Debug, Default)]
struct UploadForm {
    price: Option<String>,
    description: String,
    scope_type: Option<String>,
    operator_id: Option<String>,
    media: Option<UploadedMedia>,
}

#[derive(Debug)]
struct UploadedMedia {
    filename: String,
    mimetype: String,
    bytes: Bytes,
}

// ────────────────────────────────────────────────────────────────────────────
// Handlers
// ────────────────────────────────────────────────────────────────────────────

/// POST /api/v1/recommendations
///
/// Multipart upload: `price`, `description`, `scopeType`, `operatorId`, optional `media`.
/// Computes, refines the note, stores media and appends the record. Insufficient input is
/// answered with the zero band and nothing is stored.
pub async fn handle_create_recommendation(
    State(state): State<AppState>,
    multipart: Multipart,
) -> Result<Json<RecommendationResponse>, AppError> {
    let form = read_upload_form(multipart).await?;
    let submission = JobSubmission::from_raw(
        form.price.as_deref(),
        &form.description,
        form.scope_type.as_deref(),
        form.operator_id.as_deref(),
    );

    let mut result = compute_recommendation(&state, &submission).await?;
    if result.is_insufficient_input() {
        info!("Insufficient input from operator {}", submission.operator_id);
        return Ok(Json(result.into()));
    }

    if let Some(media) = form.media {
        let media_ref = state
            .media
            .put(&media.filename, &media.mimetype, media.bytes)
            .await
            .map_err(|e| AppError::Storage(format!("{e:#}")))?;
        result.media_ref = Some(media_ref);
    }

    let stored = state.store.append(result).await?;
    info!(
        "Recommendation {} for operator {}: {}..{} ({})",
        stored.id,
        stored.result.operator_id,
        stored.result.ai_low,
        stored.result.ai_high,
        stored.result.pricing_rule.as_str()
    );

    Ok(Json(stored.into()))
}

/// POST /api/v1/recommendations/preview
///
/// Same engine and note refinement as an upload, nothing persisted.
pub async fn handle_preview(
    State(state): State<AppState>,
    Json(request): Json<PreviewRequest>,
) -> Result<Json<RecommendationResponse>, AppError> {
    let mut submission = JobSubmission::from_raw(
        None,
        &request.description,
        request.scope_type.as_deref(),
        request.operator_id.as_deref(),
    );
    submission.price = request.price.as_ref().and_then(price_from_json);

    let result = compute_recommendation(&state, &submission).await?;
    Ok(Json(result.into()))
}

/// GET /api/v1/recommendations?scopeType=&limit=
///
/// Newest first.
pub async fn handle_list_recommendations(
    State(state): State<AppState>,
    Query(query): Query<ListQuery>,
) -> Result<Json<Vec<StoredRecommendation>>, AppError> {
    let scope = query.scope_type.as_deref().map(ScopeType::parse_lenient);
    let limit = query
        .limit
        .unwrap_or(DEFAULT_LIST_LIMIT)
        .min(MAX_LIST_LIMIT);

    let records = state
        .store
        .load()
        .await?
        .into_iter()
        .rev()
        .filter(|r| scope.map_or(true, |s| r.result.scope_type == s))
        .take(limit)
        .collect();

    Ok(Json(records))
}

/// GET /api/v1/recommendations/:id
pub async fn handle_get_recommendation(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<StoredRecommendation>, AppError> {
    state
        .store
        .get(id)
        .await?
        .map(Json)
        .ok_or_else(|| AppError::NotFound(format!("Recommendation {id} not found")))
}

// ────────────────────────────────────────────────────────────────────────────
// Pipeline
// ────────────────────────────────────────────────────────────────────────────

/// Corpus snapshot → engine → note refinement.
///
/// A missing or empty history is just an untuned band, but a history that cannot be read
/// fails the request: no partially computed result is returned.
async fn compute_recommendation(
    state: &AppState,
    submission: &JobSubmission,
) -> Result<RecommendationResult, AppError> {
    if submission.usable_price().is_none() {
        return Ok(recommend(submission, &[]));
    }

    let corpus: Vec<RecommendationResult> = state
        .store
        .load()
        .await
        .context("Recommendation history could not be read")?
        .into_iter()
        .map(|r| r.result)
        .collect();

    let result = recommend(submission, &corpus);
    Ok(refine_note(
        result,
        state.refiner.as_deref(),
        state.config.note_refine_timeout,
    )
    .await)
}

fn price_from_json(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => parse_price(s),
        _ => None,
    }
}

fn is_supported_media(mimetype: &str) -> bool {
    mimetype.starts_with("image/") || mimetype.starts_with("video/")
}

async fn read_upload_form(mut multipart: Multipart) -> Result<UploadForm, AppError> {
    let mut form = UploadForm::default();

    while let Some(field) = multipart.next_field().await.map_err(multipart_error)? {
        let name = field.name().unwrap_or_default().to_string();
        match name.as_str() {
            "price" => form.price = Some(field.text().await.map_err(multipart_error)?),
            "description" => form.description = field.text().await.map_err(multipart_error)?,
            "scopeType" | "scope_type" => {
                form.scope_type = Some(field.text().await.map_err(multipart_error)?)
            }
            "operatorId" | "operator_id" => {
                form.operator_id = Some(field.text().await.map_err(multipart_error)?)
            }
            "media" | "file" => {
                let filename = field.file_name().unwrap_or("upload").to_string();
                let mimetype = field
                    .content_type()
                    .unwrap_or("application/octet-stream")
                    .to_string();
                let bytes = field.bytes().await.map_err(multipart_error)?;
                // Browsers send an empty part when no file was chosen
                if bytes.is_empty() {
                    continue;
                }
                if !is_supported_media(&mimetype) {
                    return Err(AppError::UnsupportedMedia(format!(
                        "'{mimetype}' is not an image or video"
                    )));
                }
                form.media = Some(UploadedMedia {
                    filename,
                    mimetype,
                    bytes,
                });
            }
            other => debug!("Ignoring unknown multipart field '{other}'"),
        }
    }

    Ok(form)
}

fn multipart_error(e: MultipartError) -> AppError {
    if e.status() == StatusCode::PAYLOAD_TOO_LARGE {
        AppError::PayloadTooLarge(e.body_text())
    } else {
        AppError::Validation(e.body_text())
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Tests
// ────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use async_trait::async_trait;
    use axum::body::Body;
    use axum::http::{header, Request};
    use axum::Router;
    use tempfile::TempDir;
    use tower::ServiceExt;

    use super::*;
    use crate::config::Config;
    use crate::llm_client::LlmError;
    use crate::pricing::band::PricingRule;
    use crate::pricing::notes::{NoteRefiner, RefineRequest};
    use crate::routes::build_router;
    use crate::storage::json_file::JsonFileStore;
    use crate::storage::media::LocalMediaStore;
    use crate::storage::RecommendationStore;

    const BOUNDARY: &str = "fairprice-test-boundary";

    struct FixedRefiner(&'static str);

    #[async_trait]
    impl NoteRefiner for FixedRefiner {
        async fn refine(&self, _request: &RefineRequest<'_>) -> Result<String, LlmError> {
            Ok(self.0.to_string())
        }
    }

    struct Harness {
        dir: TempDir,
        store: Arc<JsonFileStore>,
        app: Router,
    }

    fn harness(refiner: Option<Arc<dyn NoteRefiner>>) -> Harness {
        let dir = tempfile::tempdir().unwrap();
        let store = Arc::new(JsonFileStore::new(dir.path().join("recs.json")));
        let state = AppState {
            store: store.clone(),
            media: Arc::new(LocalMediaStore::new(dir.path().join("uploads"))),
            refiner,
            config: Config::from_vars(|_| None).unwrap(),
        };
        Harness {
            dir,
            store,
            app: build_router(state),
        }
    }

    fn multipart_request(fields: &[(&str, &str)], file: Option<(&str, &str, &[u8])>) -> Request<Body> {
        let mut body = Vec::new();
        for (name, value) in fields {
            body.extend_from_slice(
                format!(
                    "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"{name}\"\r\n\r\n{value}\r\n"
                )
                .as_bytes(),
            );
        }
        if let Some((filename, mimetype, bytes)) = file {
            body.extend_from_slice(
                format!(
                    "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"media\"; filename=\"{filename}\"\r\nContent-Type: {mimetype}\r\n\r\n"
                )
                .as_bytes(),
            );
            body.extend_from_slice(bytes);
            body.extend_from_slice(b"\r\n");
        }
        body.extend_from_slice(format!("--{BOUNDARY}--\r\n").as_bytes());

        Request::builder()
            .method("POST")
            .uri("/api/v1/recommendations")
            .header(
                header::CONTENT_TYPE,
                format!("multipart/form-data; boundary={BOUNDARY}"),
            )
            .body(Body::from(body))
            .unwrap()
    }

    fn json_request(method: &str, uri: &str, body: Value) -> Request<Body> {
        Request::builder()
            .method(method)
            .uri(uri)
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    fn get(uri: &str) -> Request<Body> {
        Request::builder().uri(uri).body(Body::empty()).unwrap()
    }

    async fn send(app: &Router, request: Request<Body>) -> (StatusCode, Value) {
        let response = app.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let body = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap()
        };
        (status, body)
    }

    fn past(scope: ScopeType, price: f64, low: i64, high: i64) -> RecommendationResult {
        let mut submission = JobSubmission::from_raw(None, "earlier job", None, None);
        submission.scope_type = scope;
        submission.price = Some(price);
        RecommendationResult {
            ai_low: low,
            ai_high: high,
            ..recommend(&submission, &[])
        }
    }

    #[tokio::test]
    async fn test_upload_tiny_job_with_media_is_persisted() {
        let h = harness(None);
        let request = multipart_request(
            &[
                ("price", "500"),
                ("description", "1 min paint touch up"),
                ("scopeType", "snapshot"),
                ("operatorId", "op-42"),
            ],
            Some(("chip.jpg", "image/jpeg", b"\xff\xd8\xff")),
        );

        let (status, body) = send(&h.app, request).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["aiLow"], 400);
        assert_eq!(body["aiHigh"], 500);
        assert_eq!(body["upsellPotential"], 0);
        assert_eq!(body["persisted"], true);
        assert_eq!(body["operatorId"], "op-42");
        assert_eq!(body["pricingRule"], "tiny_job_ceiling");
        assert_eq!(body["mediaRef"]["mimetype"], "image/jpeg");
        assert_eq!(body["mediaRef"]["size"], 3);

        let key = body["mediaRef"]["key"].as_str().unwrap();
        assert!(h.dir.path().join("uploads").join(key).exists());

        let stored = h.store.load().await.unwrap();
        assert_eq!(stored.len(), 1);
        assert_eq!(stored[0].id.to_string(), body["id"].as_str().unwrap());
    }

    #[tokio::test]
    async fn test_invalid_price_returns_zero_band_and_stores_nothing() {
        let h = harness(None);
        let request = multipart_request(&[("price", "free"), ("description", "wash")], None);

        let (status, body) = send(&h.app, request).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["price"], 0.0);
        assert_eq!(body["aiLow"], 0);
        assert_eq!(body["aiHigh"], 0);
        assert_eq!(body["upsellPotential"], 0);
        assert_eq!(body["persisted"], false);
        assert!(body.get("id").is_none());
        assert!(!body["notes"].as_str().unwrap().is_empty());
        assert!(h.store.load().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_unsupported_media_is_rejected() {
        let h = harness(None);
        let request = multipart_request(
            &[("price", "200")],
            Some(("notes.txt", "text/plain", b"hello")),
        );

        let (status, body) = send(&h.app, request).await;
        assert_eq!(status, StatusCode::UNSUPPORTED_MEDIA_TYPE);
        assert_eq!(body["error"]["code"], "UNSUPPORTED_MEDIA_TYPE");
        assert!(h.store.load().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_history_tunes_new_upload() {
        let h = harness(None);
        for (price, low, high) in [
            (100.0, 90, 110),
            (100.0, 85, 115),
            (1000.0, 850, 1150),
            (100.0, 80, 120),
            (100.0, 75, 125),
        ] {
            h.store
                .append(past(ScopeType::Snapshot, price, low, high))
                .await
                .unwrap();
        }

        let request = multipart_request(&[("price", "1000"), ("description", "full exterior")], None);
        let (status, body) = send(&h.app, request).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["aiLow"], 850);
        assert_eq!(body["aiHigh"], 1150);
        assert_eq!(body["pricingRule"], "history_tuned");
    }

    #[tokio::test]
    async fn test_unreadable_history_is_a_computation_failure() {
        let h = harness(None);
        std::fs::write(h.dir.path().join("recs.json"), "[{broken").unwrap();

        let request = json_request(
            "POST",
            "/api/v1/recommendations/preview",
            serde_json::json!({"price": 1000}),
        );
        let (status, body) = send(&h.app, request).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body["error"]["code"], "INTERNAL_ERROR");
        assert!(body.get("aiLow").is_none());
    }

    #[tokio::test]
    async fn test_missing_history_gives_untuned_band() {
        let h = harness(None);
        assert!(!h.dir.path().join("recs.json").exists());

        let request = json_request(
            "POST",
            "/api/v1/recommendations/preview",
            serde_json::json!({"price": 1000}),
        );
        let (status, body) = send(&h.app, request).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["aiLow"], 750);
        assert_eq!(body["aiHigh"], 1250);
        assert_eq!(body["pricingRule"], "base");
    }

    #[tokio::test]
    async fn test_unreadable_history_fails_the_upload_without_storing() {
        let h = harness(None);
        std::fs::write(h.dir.path().join("recs.json"), "[{broken").unwrap();

        let request = multipart_request(&[("price", "1000")], None);
        let (status, body) = send(&h.app, request).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body["error"]["code"], "INTERNAL_ERROR");
        assert!(body.get("aiLow").is_none());
    }

    #[tokio::test]
    async fn test_refined_note_is_used_when_consistent() {
        let h = harness(Some(Arc::new(FixedRefiner(
            "Nice lane. Anywhere from $750 to $1250 holds up.",
        ))));
        let request = multipart_request(&[("price", "1000")], None);

        let (_, body) = send(&h.app, request).await;
        assert_eq!(body["notes"], "Nice lane. Anywhere from $750 to $1250 holds up.");
        assert_eq!(body["aiLow"], 750);
        assert_eq!(body["aiHigh"], 1250);
        assert_eq!(body["upsellPotential"], 15);
    }

    #[tokio::test]
    async fn test_contradicting_refined_note_is_discarded() {
        let h = harness(Some(Arc::new(FixedRefiner("Go for $5000 next time!"))));
        let request = multipart_request(&[("price", "1000")], None);

        let (_, body) = send(&h.app, request).await;
        let notes = body["notes"].as_str().unwrap();
        assert!(notes.contains("$750"), "notes were {notes}");
        assert!(!notes.contains("5000"));
    }

    #[tokio::test]
    async fn test_preview_accepts_numeric_price_and_persists_nothing() {
        let h = harness(None);
        let request = json_request(
            "POST",
            "/api/v1/recommendations/preview",
            serde_json::json!({"price": 30000, "description": "1 hour detail"}),
        );

        let (status, body) = send(&h.app, request).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["aiLow"], 18000);
        assert_eq!(body["aiHigh"], 27000);
        assert_eq!(body["impliedHourlyRate"], 30000.0);
        assert_eq!(body["persisted"], false);
        assert!(h.store.load().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_preview_accepts_string_price() {
        let h = harness(None);
        let request = json_request(
            "POST",
            "/api/v1/recommendations/preview",
            serde_json::json!({"price": "$1,000", "scopeType": "walkaround"}),
        );

        let (_, body) = send(&h.app, request).await;
        assert_eq!(body["price"], 1000.0);
        assert_eq!(body["scopeType"], "walkaround");
    }

    #[tokio::test]
    async fn test_list_is_newest_first_and_filters_scope() {
        let h = harness(None);
        let first = h
            .store
            .append(past(ScopeType::Snapshot, 100.0, 75, 125))
            .await
            .unwrap();
        let second = h
            .store
            .append(past(ScopeType::Walkaround, 200.0, 150, 250))
            .await
            .unwrap();
        let third = h
            .store
            .append(past(ScopeType::Snapshot, 300.0, 225, 375))
            .await
            .unwrap();

        let (status, body) = send(&h.app, get("/api/v1/recommendations")).await;
        assert_eq!(status, StatusCode::OK);
        let ids: Vec<&str> = body
            .as_array()
            .unwrap()
            .iter()
            .map(|r| r["id"].as_str().unwrap())
            .collect();
        let expected = [third.id.to_string(), second.id.to_string(), first.id.to_string()];
        assert_eq!(ids, expected.iter().map(String::as_str).collect::<Vec<_>>());

        let (_, body) = send(
            &h.app,
            get("/api/v1/recommendations?scopeType=snapshot&limit=1"),
        )
        .await;
        let list = body.as_array().unwrap();
        assert_eq!(list.len(), 1);
        assert_eq!(list[0]["id"], third.id.to_string());
    }

    #[tokio::test]
    async fn test_get_by_id() {
        let h = harness(None);
        let stored = h
            .store
            .append(past(ScopeType::Snapshot, 100.0, 75, 125))
            .await
            .unwrap();

        let (status, body) = send(
            &h.app,
            get(&format!("/api/v1/recommendations/{}", stored.id)),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["aiLow"], 75);
        assert_eq!(body["pricingRule"], PricingRule::Base.as_str());

        let (status, body) = send(
            &h.app,
            get(&format!("/api/v1/recommendations/{}", Uuid::new_v4())),
        )
        .await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["error"]["code"], "NOT_FOUND");
    }

    #[tokio::test]
    async fn test_health() {
        let h = harness(None);
        let (status, body) = send(&h.app, get("/health")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "ok");
        assert_eq!(body["noteRefiner"], "disabled");
        assert_eq!(body["store"], "json");
    }
}
