//! Read-only HTTP API over the master table, plus the listings passthrough.

mod query;

use std::{collections::HashMap, path::PathBuf, sync::Arc};

use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::Serialize;
use serde_json::json;
use tower_http::cors::{Any, CorsLayer};

pub use query::{Page, TableView, TopRanking, TOTAL_SCORE_COLUMN};

use crate::store::StoreClient;

const LIST_LIMIT_DEFAULT: usize = 200;
const LIST_LIMIT_MAX: usize = 5000;
const TOP_N_DEFAULT: usize = 10;
const TOP_N_MAX: usize = 100;
const LISTINGS_LIMIT_DEFAULT: usize = 20;

#[derive(Debug, Clone)]
pub struct AppState {
    pub table_path: PathBuf,
    pub store: Option<StoreClient>,
}

/// Build the router; CORS is open to any origin.
pub fn router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/health", get(health))
        .route("/manzanas", get(manzanas))
        .route("/top", get(top))
        .route("/api/listings", get(listings))
        .route("/search", post(search))
        .layer(cors)
        .with_state(Arc::new(state))
}

#[derive(Debug, Serialize)]
struct ErrorResponse {
    error: String,
}

/// Failure answered as `{"error": ...}`.
struct ApiError(StatusCode, String);

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.0, Json(ErrorResponse { error: self.1 })).into_response()
    }
}

fn bad_request(message: String) -> ApiError {
    ApiError(StatusCode::BAD_REQUEST, message)
}

type Params = Query<HashMap<String, String>>;

async fn health() -> impl IntoResponse {
    Json(json!({"status": "ok"}))
}

async fn manzanas(State(state): State<Arc<AppState>>, Query(params): Params) -> Result<Json<Page>, ApiError> {
    let limit = parse_bounded(&params, "limit", LIST_LIMIT_DEFAULT, 1, LIST_LIMIT_MAX)?;
    let offset = parse_bounded(&params, "offset", 0, 0, usize::MAX)?;
    let min_counts = prefixed(&params, "min_")
        .map(|(layer, raw)| raw.trim().parse::<i64>()
            .map(|min| (layer.to_string(), min))
            .map_err(|_| bad_request(format!("min_{layer} must be an integer, got {raw:?}"))))
        .collect::<Result<Vec<_>, _>>()?;

    let view = load_view(&state).await?;
    Ok(Json(view.list(&min_counts, limit, offset)))
}

async fn top(State(state): State<Arc<AppState>>, Query(params): Params) -> Result<Json<TopRanking>, ApiError> {
    let n = parse_bounded(&params, "n", TOP_N_DEFAULT, 1, TOP_N_MAX)?;
    let weights = prefixed(&params, "w_")
        .map(|(layer, raw)| match raw.trim().parse::<f64>() {
            Ok(weight) if weight.is_finite() => Ok((layer.to_string(), weight)),
            _ => Err(bad_request(format!("w_{layer} must be a number, got {raw:?}"))),
        })
        .collect::<Result<HashMap<_, _>, _>>()?;

    let view = load_view(&state).await?;
    Ok(Json(view.top(n, &weights)))
}

async fn listings(State(state): State<Arc<AppState>>, Query(params): Params) -> Result<Response, ApiError> {
    let limit = parse_bounded(&params, "limit", LISTINGS_LIMIT_DEFAULT, 1, LIST_LIMIT_MAX)?;
    let Some(store) = &state.store else {
        return Err(ApiError(StatusCode::SERVICE_UNAVAILABLE, "backing store is not configured".into()));
    };

    match store.listings(limit).await {
        Ok(items) => Ok(Json(json!({"items": items})).into_response()),
        Err(err) => {
            tracing::error!(error = %format!("{err:#}"), "listing query failed");
            Err(ApiError(StatusCode::BAD_GATEWAY, format!("{err:#}")))
        }
    }
}

/// Placeholder search: accepts any JSON object and finds nothing.
async fn search(Json(_payload): Json<serde_json::Map<String, serde_json::Value>>) -> impl IntoResponse {
    Json(json!({"results": []}))
}

async fn load_view(state: &AppState) -> Result<TableView, ApiError> {
    let path = state.table_path.clone();
    if !path.exists() {
        return Err(ApiError(StatusCode::SERVICE_UNAVAILABLE, format!("table {} does not exist", path.display())));
    }
    tokio::task::spawn_blocking(move || TableView::load(&path))
        .await
        .map_err(|err| ApiError(StatusCode::INTERNAL_SERVER_ERROR, err.to_string()))?
        .map_err(|err| {
            tracing::error!(error = %format!("{err:#}"), "failed to read master table");
            ApiError(StatusCode::INTERNAL_SERVER_ERROR, format!("{err:#}"))
        })
}

fn parse_bounded(params: &HashMap<String, String>, key: &str, default: usize, min: usize, max: usize) -> Result<usize, ApiError> {
    let Some(raw) = params.get(key) else { return Ok(default) };
    match raw.trim().parse::<usize>() {
        Ok(value) if (min..=max).contains(&value) => Ok(value),
        _ if max == usize::MAX => Err(bad_request(format!("{key} must be an integer >= {min}, got {raw:?}"))),
        _ => Err(bad_request(format!("{key} must be an integer in {min}..={max}, got {raw:?}"))),
    }
}

/// `(suffix, value)` for every parameter starting with `prefix`.
fn prefixed<'a>(params: &'a HashMap<String, String>, prefix: &'a str) -> impl Iterator<Item = (&'a str, &'a str)> + 'a {
    params.iter()
        .filter_map(move |(key, value)| key.strip_prefix(prefix).map(|layer| (layer, value.as_str())))
        .filter(|(layer, _)| !layer.is_empty())
}

#[cfg(test)]
mod tests {
    use axum::{body::Body, http::Request};
    use serde_json::Value;
    use tower::ServiceExt;

    use super::*;

    async fn get_json(app: Router, uri: &str) -> (StatusCode, Value) {
        let resp = app
            .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
            .await
            .unwrap();
        let status = resp.status();
        let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX).await.unwrap();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    fn app_with_table(dir: &tempfile::TempDir) -> Router {
        let path = dir.path().join("tabla_manzanas.csv");
        std::fs::write(&path, "MANCODIGO,SITP_Count,SITP_Score,PARQUES_Count,PARQUES_Score\n\
                               001,5,4,0,1\n002,0,1,3,5\n003,2,3,1,3\n004,9,5,0,1\n").unwrap();
        router(AppState { table_path: path, store: None })
    }

    #[tokio::test]
    async fn health_is_ok() {
        let dir = tempfile::tempdir().unwrap();
        let (status, body) = get_json(app_with_table(&dir), "/health").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, json!({"status": "ok"}));
    }

    #[tokio::test]
    async fn manzanas_pages_and_filters() {
        let dir = tempfile::tempdir().unwrap();
        let (status, body) = get_json(app_with_table(&dir), "/manzanas?limit=1&offset=1&min_sitp=2").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["total"], json!(3));
        assert_eq!(body["limit"], json!(1));
        assert_eq!(body["offset"], json!(1));
        assert_eq!(body["data"][0]["MANCODIGO"], json!("003"));
    }

    #[tokio::test]
    async fn manzanas_rejects_out_of_range_limit() {
        let dir = tempfile::tempdir().unwrap();
        let (status, body) = get_json(app_with_table(&dir), "/manzanas?limit=5001").await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body["error"].as_str().unwrap().contains("limit"));
    }

    #[tokio::test]
    async fn top_ranks_by_weighted_scores() {
        let dir = tempfile::tempdir().unwrap();
        let (status, body) = get_json(app_with_table(&dir), "/top?n=1&w_sitp=2&w_parques=0").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["n"], json!(1));
        assert_eq!(body["data"][0]["MANCODIGO"], json!("004"));
        assert_eq!(body["data"][0]["TOTAL_Score"], json!(10.0));
        assert_eq!(body["weights"]["sitp"], json!(2.0));
    }

    #[tokio::test]
    async fn top_rejects_bad_weight() {
        let dir = tempfile::tempdir().unwrap();
        let (status, _) = get_json(app_with_table(&dir), "/top?w_sitp=lots").await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn missing_table_is_unavailable() {
        let dir = tempfile::tempdir().unwrap();
        let app = router(AppState { table_path: dir.path().join("absent.csv"), store: None });
        let (status, body) = get_json(app, "/manzanas").await;
        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
        assert!(body["error"].is_string());
    }

    #[tokio::test]
    async fn listings_without_store_are_unavailable() {
        let dir = tempfile::tempdir().unwrap();
        let (status, _) = get_json(app_with_table(&dir), "/api/listings").await;
        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    }

    #[tokio::test]
    async fn search_finds_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let resp = app_with_table(&dir)
            .oneshot(Request::builder()
                .method("POST")
                .uri("/search")
                .header("content-type", "application/json")
                .body(Body::from(r#"{"q": "parque"}"#))
                .unwrap())
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX).await.unwrap();
        assert_eq!(serde_json::from_slice::<Value>(&bytes).unwrap(), json!({"results": []}));
    }
}
