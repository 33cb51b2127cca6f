//! Thin HTTP surface over [`DataLayer`]. No auth, no tier gating.

use std::collections::HashMap;
use std::sync::Arc;

use serde::Deserialize;
use serde_json::json;
use shuttle_axum::axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use tower_http::cors::CorsLayer;

use crate::error::DataError;
use crate::layer::{DataLayer, Feature};
use crate::news::DEFAULT_LIMIT;

#[derive(Clone)]
pub struct AppState {
    pub layer: Arc<DataLayer>,
}

impl AppState {
    pub fn new(layer: DataLayer) -> Self {
        Self {
            layer: Arc::new(layer),
        }
    }
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(|| async { "OK" }))
        .route("/elements/{section}", get(list_factors))
        .route("/elements/{section}/{code}", get(element))
        .route("/series/{section}/{code}/{group}/{factor}", get(series))
        .route("/search", get(search))
        .route("/news", get(news))
        .route("/translate", get(translate))
        .route("/analysis", get(analysis))
        .route("/analysis/pair", get(analysis_pair))
        .layer(CorsLayer::very_permissive())
        .with_state(state)
}

/// `DataError` rendered as `{"error": ...}` with a mapped status.
pub struct ApiError(pub DataError);

impl From<DataError> for ApiError {
    fn from(e: DataError) -> Self {
        Self(e)
    }
}

pub fn status_for(e: &DataError) -> StatusCode {
    match e {
        DataError::NotFound { .. } | DataError::UnknownFactor { .. } => StatusCode::NOT_FOUND,
        DataError::UnsupportedLanguage(_) => StatusCode::UNPROCESSABLE_ENTITY,
        _ => StatusCode::BAD_GATEWAY,
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = status_for(&self.0);
        if status.is_server_error() {
            tracing::warn!(error = %self.0, "request failed");
        }
        (status, Json(json!({ "error": self.0.to_string() }))).into_response()
    }
}

type ApiResult<T> = Result<T, ApiError>;

async fn list_factors(State(state): State<AppState>, Path(section): Path<String>) -> ApiResult<Response> {
    let entries = state.layer.factors(&section)?;
    Ok(Json(entries).into_response())
}

#[derive(Deserialize)]
struct LangQuery {
    lang: Option<String>,
}

async fn element(
    State(state): State<AppState>,
    Path((section, code)): Path<(String, String)>,
    Query(q): Query<LangQuery>,
) -> ApiResult<Response> {
    let el = state.layer.resolve_element(&section, &code).await?;
    let localized = match q.lang.as_deref().filter(|l| !l.trim().is_empty()) {
        Some(lang) => Some(state.layer.localize(&el, lang).await?),
        None => None,
    };
    Ok(Json(json!({ "element": el, "localized": localized })).into_response())
}

#[derive(Deserialize)]
struct SeriesQuery {
    #[serde(default)]
    raw: bool,
}

/// 204 when upstream has no usable data.
async fn series(
    State(state): State<AppState>,
    Path((section, code, group, factor)): Path<(String, String, String, String)>,
    Query(q): Query<SeriesQuery>,
) -> ApiResult<Response> {
    let layer = &state.layer;
    let resp = if q.raw {
        match layer.get_series_raw(&section, &code, &group, &factor).await? {
            Some(points) => {
                let rows: Vec<_> = points.into_iter().map(|(t, x)| json!({ "t": t, "x": x })).collect();
                Json(rows).into_response()
            }
            None => StatusCode::NO_CONTENT.into_response(),
        }
    } else {
        match layer.get_series(&section, &code, &group, &factor).await? {
            Some(ds) => Json(ds).into_response(),
            None => StatusCode::NO_CONTENT.into_response(),
        }
    };
    Ok(resp)
}

async fn search(State(state): State<AppState>, Query(q): Query<HashMap<String, String>>) -> ApiResult<Response> {
    let text = q.get("text").map(String::as_str).unwrap_or_default();
    let found = state.layer.search_elements(text).await?;
    Ok(Json(found).into_response())
}

#[derive(Deserialize)]
struct NewsQuery {
    symbol: Option<String>,
    limit: Option<usize>,
}

async fn news(State(state): State<AppState>, Query(q): Query<NewsQuery>) -> ApiResult<Response> {
    let limit = q.limit.unwrap_or(DEFAULT_LIMIT).clamp(1, 100);
    let items = state.layer.news(q.symbol.as_deref(), limit).await?;
    Ok(Json(items).into_response())
}

#[derive(Deserialize)]
struct TranslateQuery {
    text: String,
    to: String,
    from: Option<String>,
}

async fn translate(State(state): State<AppState>, Query(q): Query<TranslateQuery>) -> ApiResult<Response> {
    let text = state
        .layer
        .translate(&q.text, &q.to, q.from.as_deref())
        .await?;
    Ok(Json(json!({ "text": text, "to": q.to })).into_response())
}

/// `?features=symbol:AAPL:price:adj_close,country:USA:economy:gdp`
async fn analysis(State(state): State<AppState>, Query(q): Query<HashMap<String, String>>) -> ApiResult<Response> {
    let features = q
        .get("features")
        .map(String::as_str)
        .unwrap_or_default()
        .split(',')
        .filter(|s| !s.trim().is_empty())
        .map(str::parse::<Feature>)
        .collect::<Result<Vec<_>, _>>()?;
    let report = state.layer.analyze(&features).await?;
    Ok(Json(report).into_response())
}

#[derive(Deserialize)]
struct PairQuery {
    x: String,
    y: String,
}

/// Raw per-lag outputs for `x → y`; 204 without overlapping data.
async fn analysis_pair(State(state): State<AppState>, Query(q): Query<PairQuery>) -> ApiResult<Response> {
    let (x, y): (Feature, Feature) = (q.x.parse()?, q.y.parse()?);
    Ok(match state.layer.analyze_pair(&x, &y).await? {
        Some(report) => Json(report).into_response(),
        None => StatusCode::NO_CONTENT.into_response(),
    })
}
