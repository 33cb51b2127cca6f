// tests/api_http.rs
//
// HTTP-level tests for the public API Router without opening sockets.
// We exercise the router directly via tower::ServiceExt::oneshot.

mod common;

use std::sync::Arc;

use serde_json::{json, Value as Json};
use shuttle_axum::axum::{
    body::{self, Body},
    http::{Request, StatusCode},
    Router,
};
use tower::ServiceExt as _; // for `oneshot`

use common::{korea_record, price_history, wb_page, FakeBackend, FakeTransport, BODY_LIMIT};
use econ_data_service::metrics::Metrics;
use econ_data_service::{api, AppState};

fn upstreams() -> Arc<FakeTransport> {
    Arc::new(
        FakeTransport::new()
            .on("historical-price-full/AAPL", price_history("AAPL", 15))
            .on("historical-price-full/THIN", price_history("THIN", 1))
            .route(|url, _| {
                url.ends_with("/profile/AAPL").then(|| {
                    json!([{
                        "symbol": "AAPL",
                        "companyName": "Apple Inc.",
                        "description": "Designs consumer electronics.",
                        "exchangeShortName": "NASDAQ",
                        "currency": "USD",
                        "country": "US"
                    }])
                })
            })
            .route(|url, _| {
                url.ends_with("/search")
                    .then(|| json!([{ "symbol": "KRX", "name": "Korea Fund", "exchangeShortName": "NYSE" }]))
            })
            .route(|url, _| url.ends_with("/country/KOR").then(|| wb_page(vec![korea_record()])))
            .route(|url, _| {
                url.ends_with("/v2/country").then(|| {
                    wb_page(vec![
                        korea_record(),
                        json!({ "id": "EAS", "name": "East Asia & Pacific (Korea region)", "region": { "value": "Aggregates" } }),
                    ])
                })
            }),
    )
}

/// Build the same Router the binary uses, over fake upstreams.
fn test_router(dir: &std::path::Path) -> Router {
    let vendor = Arc::new(FakeBackend::default().answer("Korea, Rep.", "ko", "대한민국"));
    let layer = common::layer(dir, upstreams(), vendor);
    api::router(AppState::new(layer))
}

async fn get(app: Router, uri: &str) -> (StatusCode, Vec<u8>) {
    let req = Request::builder()
        .method("GET")
        .uri(uri)
        .body(Body::empty())
        .expect("build request");
    let resp = app.oneshot(req).await.expect("oneshot");
    let status = resp.status();
    let bytes = body::to_bytes(resp.into_body(), BODY_LIMIT)
        .await
        .expect("read body")
        .to_vec();
    (status, bytes)
}

fn json_body(bytes: &[u8]) -> Json {
    serde_json::from_slice(bytes).expect("valid JSON")
}

#[tokio::test]
async fn api_health_returns_200_and_ok_body() {
    let dir = tempfile::tempdir().unwrap();
    let (status, bytes) = get(test_router(dir.path()), "/health").await;
    assert_eq!(status, StatusCode::OK, "health should be 200");
    assert_eq!(String::from_utf8(bytes).expect("utf8").trim(), "OK");
}

#[tokio::test]
async fn symbol_element_resolves_with_factor_catalog() {
    let dir = tempfile::tempdir().unwrap();
    let (status, bytes) = get(test_router(dir.path()), "/elements/symbol/aapl").await;
    assert_eq!(status, StatusCode::OK);
    let v = json_body(&bytes);
    assert_eq!(v["element"]["section"], "symbol");
    assert_eq!(v["element"]["code"], "AAPL");
    assert_eq!(v["element"]["name"], "Apple Inc.");
    assert!(v["element"]["factors"].as_array().is_some_and(|f| !f.is_empty()));
    assert!(v["localized"].is_null());
}

#[tokio::test]
async fn country_element_localizes_name() {
    let dir = tempfile::tempdir().unwrap();
    let (status, bytes) = get(test_router(dir.path()), "/elements/country/KOR?lang=ko").await;
    assert_eq!(status, StatusCode::OK);
    let v = json_body(&bytes);
    assert_eq!(v["element"]["is_valid"], true);
    assert_eq!(v["localized"]["name"], "대한민국");
    assert!(v["localized"]["note"]
        .as_str()
        .is_some_and(|n| n.contains("capital is Seoul")));
}

#[tokio::test]
async fn missing_elements_and_factors_are_404() {
    let dir = tempfile::tempdir().unwrap();
    let app = test_router(dir.path());

    let (status, bytes) = get(app.clone(), "/elements/symbol/ZZZZ").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert!(json_body(&bytes)["error"].as_str().is_some_and(|e| e.contains("ZZZZ")));

    let (status, _) = get(app.clone(), "/elements/fund/ZZZZ").await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = get(app, "/series/symbol/AAPL/price/nope").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn series_endpoint_serves_dense_and_raw_views() {
    let dir = tempfile::tempdir().unwrap();
    let app = test_router(dir.path());

    let (status, bytes) = get(app.clone(), "/series/symbol/AAPL/price/close").await;
    assert_eq!(status, StatusCode::OK);
    let v = json_body(&bytes);
    assert_eq!(v["t"].as_array().map(Vec::len), Some(15));
    assert_eq!(v["t"][0], "2024-01-02");
    assert_eq!(v["attrs"]["interpolation"]["method"], "pchip");

    let (status, bytes) = get(app, "/series/symbol/AAPL/price/close?raw=true").await;
    assert_eq!(status, StatusCode::OK);
    let rows = json_body(&bytes);
    assert_eq!(rows[0]["t"], "2024-01-02");
    let first = rows[0]["x"].as_f64().unwrap();
    assert!((first - 100.0).abs() < 1e-9);
}

#[tokio::test]
async fn thin_history_is_no_content() {
    let dir = tempfile::tempdir().unwrap();
    let (status, bytes) = get(test_router(dir.path()), "/series/symbol/THIN/price/close").await;
    assert_eq!(status, StatusCode::NO_CONTENT);
    assert!(bytes.is_empty());
}

#[tokio::test]
async fn factor_listing_covers_every_group() {
    let dir = tempfile::tempdir().unwrap();
    let (status, bytes) = get(test_router(dir.path()), "/elements/country").await;
    assert_eq!(status, StatusCode::OK);
    let v = json_body(&bytes);
    let groups: std::collections::BTreeSet<&str> = v
        .as_array()
        .unwrap()
        .iter()
        .filter_map(|e| e["group"].as_str())
        .collect();
    assert_eq!(
        groups.into_iter().collect::<Vec<_>>(),
        vec!["economy", "industry", "natural", "population", "trade"]
    );
}

#[tokio::test]
async fn search_returns_symbols_and_valid_countries_only() {
    let dir = tempfile::tempdir().unwrap();
    let (status, bytes) = get(test_router(dir.path()), "/search?text=Korea").await;
    assert_eq!(status, StatusCode::OK);
    let v = json_body(&bytes);
    assert_eq!(v["symbols"][0]["code"], "KRX");
    let countries = v["countries"].as_array().unwrap();
    assert_eq!(countries.len(), 1, "aggregates are filtered: {countries:?}");
    assert_eq!(countries[0]["code"], "KOR");
}

#[tokio::test]
async fn translate_rejects_unknown_targets_with_422() {
    let dir = tempfile::tempdir().unwrap();
    let app = test_router(dir.path());

    let (status, _) = get(app.clone(), "/translate?text=Open&to=xx").await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);

    let (status, bytes) = get(app, "/translate?text=Korea,%20Rep.&to=ko&from=en").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json_body(&bytes)["text"], "대한민국");
}

#[tokio::test]
async fn analysis_reports_overlapping_features() {
    let dir = tempfile::tempdir().unwrap();
    let (status, bytes) = get(
        test_router(dir.path()),
        "/analysis?features=symbol:AAPL:price:close,symbol:AAPL:price:volume",
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let v = json_body(&bytes);
    assert_eq!(v["days"], 15);
    assert_eq!(v["features"].as_array().map(Vec::len), Some(2));

    let (status, _) = get(test_router(dir.path()), "/analysis?features=symbol:AAPL").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn metrics_router_renders_exposition_text() {
    let m = Metrics::detached();
    let (status, _) = get(m.router(), "/metrics").await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn pair_analysis_exposes_per_lag_p_values() {
    let dir = tempfile::tempdir().unwrap();
    let (status, bytes) = get(
        test_router(dir.path()),
        "/analysis/pair?x=symbol:AAPL:price:volume&y=symbol:AAPL:price:close",
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let v = json_body(&bytes);
    assert_eq!(v["x"], "symbol:AAPL:price:volume");
    assert_eq!(v["days"], 15);
    assert!(v["granger"]["lags"].is_array());
    assert!(v["cointegration"]["score"].is_number());
}

#[tokio::test]
async fn cors_allows_any_origin() {
    let dir = tempfile::tempdir().unwrap();
    let req = Request::builder()
        .method("GET")
        .uri("/health")
        .header(http::header::ORIGIN, "https://app.example")
        .body(Body::empty())
        .expect("build request");
    let resp = test_router(dir.path()).oneshot(req).await.expect("oneshot");
    assert_eq!(resp.status(), StatusCode::OK);
    assert!(resp
        .headers()
        .contains_key(http::header::ACCESS_CONTROL_ALLOW_ORIGIN));
}
