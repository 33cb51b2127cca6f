// tests/news_merge.rs
//
// News aggregation across the stock, forex and crypto feeds.

mod common;

use std::sync::Arc;

use serde_json::{json, Value};

use common::{DownBackend, FakeTransport};

fn items(prefix: &str, symbol: &str, n: usize, hour_offset: usize) -> Value {
    let rows: Vec<Value> = (0..n)
        .map(|i| {
            let minute = (i + hour_offset) % 60;
            json!({
                "symbol": symbol,
                "publishedDate": format!("2024-03-01 {:02}:{:02}:00", 10 + i / 60, minute),
                "title": format!("{prefix} {i}"),
                "text": "body",
                "url": format!("https://{prefix}.example/{i}"),
            })
        })
        .collect();
    Value::Array(rows)
}

fn feeds() -> Arc<FakeTransport> {
    Arc::new(
        FakeTransport::new()
            .route(|url, _| url.ends_with("/stock_news").then(|| items("stock", "AAPL", 20, 0)))
            .route(|url, _| url.ends_with("/forex_news").then(|| json!([])))
            .route(|url, q| {
                let first = q.get("page").map(String::as_str) == Some("0");
                url.ends_with("/crypto_news")
                    .then(|| if first { items("crypto", "AAPL", 6, 30) } else { json!([]) })
            }),
    )
}

#[tokio::test]
async fn quota_leftover_goes_to_the_longest_feed() {
    let dir = tempfile::tempdir().unwrap();
    let layer = common::layer(dir.path(), feeds(), Arc::new(DownBackend));

    let out = layer.news(Some("AAPL"), 9).await.expect("news");
    assert_eq!(out.len(), 9);

    let from = |p: &str| out.iter().filter(|n| n.source_url.contains(p)).count();
    assert_eq!(from("stock"), 6);
    assert_eq!(from("forex"), 0);
    assert_eq!(from("crypto"), 3);

    assert!(out.windows(2).all(|w| w[0].timestamp <= w[1].timestamp), "oldest first");
}

#[tokio::test]
async fn without_symbol_only_stock_news_is_returned() {
    let dir = tempfile::tempdir().unwrap();
    let layer = common::layer(dir.path(), feeds(), Arc::new(DownBackend));

    let out = layer.news(None, 5).await.expect("news");
    assert_eq!(out.len(), 5);
    assert!(out.iter().all(|n| n.source_url.contains("stock")));
}

#[tokio::test]
async fn crypto_pages_until_a_page_without_matches() {
    let dir = tempfile::tempdir().unwrap();
    let transport = feeds();
    let layer = common::layer(dir.path(), transport.clone(), Arc::new(DownBackend));

    layer.news(Some("AAPL"), 12).await.expect("news");
    // page 0 matched, page 1 was empty.
    assert_eq!(transport.calls_to("crypto_news"), 2);
    assert_eq!(transport.calls_to("forex_news"), 1);
}
