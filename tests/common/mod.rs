// tests/common/mod.rs
//
// In-memory upstreams shared by the integration tests: a routed JSON
// transport standing in for FMP/World Bank and a scripted translation vendor.

#![allow(dead_code)]

use std::collections::HashMap;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{Days, NaiveDate};
use serde_json::{json, Value};

use econ_data_service::cache::SeriesCache;
use econ_data_service::config::zone_from_hours;
use econ_data_service::elements::{Schema, Section, Sources};
use econ_data_service::error::{DataError, Result};
use econ_data_service::interpolate::Method;
use econ_data_service::providers::{FmpClient, JsonTransport, WorldBankClient};
use econ_data_service::translate::{Glossary, TranslationBackend, TranslationStore, Translator};
use econ_data_service::DataLayer;

pub const BODY_LIMIT: usize = 1024 * 1024;

type Route = Box<dyn Fn(&str, &HashMap<String, String>) -> Option<Value> + Send + Sync>;

/// Answers GETs from registered routes; the first route returning `Some` wins.
/// Unrouted URLs answer `[]`, which upstreams use for "no results".
#[derive(Default)]
pub struct FakeTransport {
    routes: Vec<Route>,
    calls: Mutex<Vec<String>>,
}

impl FakeTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn route(
        mut self,
        f: impl Fn(&str, &HashMap<String, String>) -> Option<Value> + Send + Sync + 'static,
    ) -> Self {
        self.routes.push(Box::new(f));
        self
    }

    /// Fixed body for any URL containing `needle`.
    pub fn on(self, needle: &'static str, body: Value) -> Self {
        self.route(move |url, _| url.contains(needle).then(|| body.clone()))
    }

    pub fn calls_to(&self, needle: &str) -> usize {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .filter(|u| u.contains(needle))
            .count()
    }
}

#[async_trait]
impl JsonTransport for FakeTransport {
    async fn get_json(&self, url: &str, query: &[(String, String)]) -> Result<Value> {
        self.calls.lock().unwrap().push(url.to_string());
        let q: HashMap<String, String> = query.iter().cloned().collect();
        Ok(self
            .routes
            .iter()
            .find_map(|r| r(url, &q))
            .unwrap_or_else(|| json!([])))
    }
}

/// Scripted vendor: canned answers per `(text, to)`, otherwise the text itself.
#[derive(Default)]
pub struct FakeBackend {
    pub answers: HashMap<(String, String), String>,
    pub calls: AtomicUsize,
}

impl FakeBackend {
    pub fn answer(mut self, text: &str, to: &str, out: &str) -> Self {
        self.answers.insert((text.to_string(), to.to_string()), out.to_string());
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl TranslationBackend for FakeBackend {
    fn name(&self) -> &'static str {
        "fake"
    }

    async fn translate(&self, text: &str, to: &str, _from: Option<&str>) -> Result<String> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(self
            .answers
            .get(&(text.to_string(), to.to_string()))
            .cloned()
            .unwrap_or_else(|| text.to_string()))
    }

    async fn languages(&self) -> Result<Vec<String>> {
        Ok(vec!["ko".into(), "ja".into()])
    }
}

/// A vendor that is always down.
pub struct DownBackend;

#[async_trait]
impl TranslationBackend for DownBackend {
    fn name(&self) -> &'static str {
        "down"
    }

    async fn translate(&self, _text: &str, _to: &str, _from: Option<&str>) -> Result<String> {
        Err(DataError::Upstream("vendor unavailable".into()))
    }

    async fn languages(&self) -> Result<Vec<String>> {
        Ok(vec!["ko".into()])
    }
}

pub fn sources(root: &Path, transport: Arc<dyn JsonTransport>) -> Sources {
    Sources {
        fmp: FmpClient::new(transport.clone(), Some("test-key".into()), 64),
        worldbank: WorldBankClient::new(transport, 64),
        cache: SeriesCache::new(root.join("cache"), zone_from_hours(9)),
        symbols: Schema::load(Section::Symbol, Path::new("config/symbol_factors.json"))
            .expect("symbol schema"),
        countries: Schema::load(Section::Country, Path::new("config/country_factors.json"))
            .expect("country schema"),
        country_info_dir: root.join("info").join("country"),
        method: Method::Pchip,
    }
}

pub fn translator(root: &Path, backend: Arc<dyn TranslationBackend>, glossary: Glossary) -> Translator {
    Translator::with_languages(
        backend,
        glossary,
        TranslationStore::new(root.join("translations"), 64),
        ["ko".to_string(), "ja".to_string()],
    )
}

pub fn layer(root: &Path, transport: Arc<FakeTransport>, backend: Arc<dyn TranslationBackend>) -> DataLayer {
    DataLayer::new(
        sources(root, transport),
        translator(root, backend, Glossary::default()),
    )
}

pub fn day(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

/// `historical-price-full` body with `n` consecutive days starting 2024-01-02.
/// Upstream delivers newest first.
pub fn price_history(symbol: &str, n: u64) -> Value {
    let start = day(2024, 1, 2);
    let mut rows: Vec<Value> = (0..n)
        .map(|i| {
            let d = start.checked_add_days(Days::new(i)).unwrap();
            let close = 100.0 + i as f64;
            json!({
                "date": d.format("%Y-%m-%d").to_string(),
                "open": close - 1.0,
                "high": close + 1.0,
                "low": close - 2.0,
                "close": close,
                "adjClose": close * 0.99,
                "volume": 1_000_000 + i,
                "vwap": close,
                "changePercent": 0.5,
            })
        })
        .collect();
    rows.reverse();
    json!({ "symbol": symbol, "historical": rows })
}

/// One World Bank page wrapping `rows`.
pub fn wb_page(rows: Vec<Value>) -> Value {
    json!([{ "page": 1, "pages": 1, "per_page": 1000, "total": rows.len() }, rows])
}

pub fn korea_record() -> Value {
    json!({
        "id": "KOR",
        "iso2Code": "KR",
        "name": "Korea, Rep.",
        "region": { "id": "EAS", "value": "East Asia & Pacific" },
        "incomeLevel": { "id": "HIC", "value": "High income" },
        "capitalCity": "Seoul",
        "longitude": "126.957",
        "latitude": "37.5323"
    })
}
