//! World Bank Open API v2 client.
//!
//! Every call adds `format=json` and `per_page=1000`. Responses are
//! `[meta, data]` pairs; error objects and empty payloads normalize to empty.
//! Pagination stops at `meta.page == meta.pages` or after a 20s budget, in
//! which case the pages collected so far are returned.

use std::sync::Arc;
use std::time::Duration;

use chrono::NaiveDate;
use once_cell::sync::Lazy;
use regex::{Regex, RegexBuilder};
use serde_json::Value;
use tokio::sync::OnceCell;
use tokio::time::Instant;

use super::transport::JsonTransport;
use crate::error::Result;
use crate::memo::Memo;
use crate::retry;

pub const WORLD_BANK_BASE_URL: &str = "https://api.worldbank.org/v2";

const PAGE_BUDGET: Duration = Duration::from_secs(20);
const PER_PAGE: &str = "1000";

pub struct WorldBankClient {
    transport: Arc<dyn JsonTransport>,
    base_url: String,
    countries: OnceCell<Vec<Value>>,
    indicator_memo: Memo<String, Value>,
    country_memo: Memo<String, Value>,
}

impl WorldBankClient {
    pub fn new(transport: Arc<dyn JsonTransport>, memo_cap: usize) -> Self {
        Self {
            transport,
            base_url: WORLD_BANK_BASE_URL.to_string(),
            countries: OnceCell::new(),
            indicator_memo: Memo::permanent(memo_cap),
            country_memo: Memo::permanent(memo_cap),
        }
    }

    pub fn with_base_url(mut self, base: impl Into<String>) -> Self {
        self.base_url = base.into();
        self
    }

    /// Fetch every page of `path` and concatenate the data halves.
    pub async fn paginate(&self, path: &str) -> Result<Vec<Value>> {
        let url = format!("{}/{}", self.base_url.trim_end_matches('/'), path.trim_start_matches('/'));
        let started = Instant::now();
        let mut out = Vec::new();
        let mut page: u64 = 1;

        loop {
            let query = vec![
                ("format".to_string(), "json".to_string()),
                ("per_page".to_string(), PER_PAGE.to_string()),
                ("page".to_string(), page.to_string()),
            ];
            let remaining = PAGE_BUDGET.saturating_sub(started.elapsed());
            let body = retry::pool(remaining, || self.transport.get_json(&url, &query)).await?;

            let Some((meta, data)) = split_page(body) else {
                break;
            };
            out.extend(data);

            let pages = loose_u64(meta.get("pages")).unwrap_or(1);
            let current = loose_u64(meta.get("page")).unwrap_or(page);
            if current >= pages {
                break;
            }
            if started.elapsed() >= PAGE_BUDGET {
                tracing::warn!(
                    target: "providers",
                    provider = "worldbank",
                    path,
                    page = current,
                    pages,
                    "pagination budget exhausted; returning partial result"
                );
                break;
            }
            page = current + 1;
        }
        Ok(out)
    }

    /// Observations of `indicator` for `country` (ISO-3).
    pub async fn data(&self, indicator: &str, country: &str) -> Result<Vec<Value>> {
        self.paginate(&format!("country/{country}/indicator/{indicator}"))
            .await
    }

    /// Indicator metadata record; memoized for the life of the process.
    pub async fn indicator(&self, indicator: &str) -> Result<Option<Value>> {
        if let Some(hit) = self.indicator_memo.get(&indicator.to_string()) {
            return Ok(Some(hit));
        }
        let rec = self
            .paginate(&format!("indicator/{indicator}"))
            .await?
            .into_iter()
            .next();
        if let Some(r) = &rec {
            self.indicator_memo.insert(indicator.to_string(), r.clone());
        }
        Ok(rec)
    }

    /// All countries, loaded once per client.
    pub async fn countries(&self) -> Result<&[Value]> {
        let list = self
            .countries
            .get_or_try_init(|| self.paginate("country"))
            .await?;
        Ok(list.as_slice())
    }

    /// Case-insensitive regex scan over the cached country list (name, ISO-3, ISO-2).
    pub async fn search_countries(&self, query: &str) -> Result<Vec<Value>> {
        let query = query.trim();
        if query.is_empty() {
            return Ok(Vec::new());
        }
        let re = country_pattern(query);
        let hits = self
            .countries()
            .await?
            .iter()
            .filter(|c| {
                ["name", "id", "iso2Code"]
                    .iter()
                    .filter_map(|k| c.get(*k).and_then(Value::as_str))
                    .any(|s| re.is_match(s))
            })
            .cloned()
            .collect();
        Ok(hits)
    }

    /// Single country record by code; memoized for the life of the process.
    pub async fn country(&self, code: &str) -> Result<Option<Value>> {
        let code = code.trim();
        if code.is_empty() || !code.chars().all(|c| c.is_ascii_alphanumeric()) {
            return Ok(None);
        }
        let key = code.to_ascii_uppercase();
        if let Some(hit) = self.country_memo.get(&key) {
            return Ok(Some(hit));
        }
        let rec = self
            .paginate(&format!("country/{key}"))
            .await?
            .into_iter()
            .next();
        if let Some(r) = &rec {
            self.country_memo.insert(key, r.clone());
        }
        Ok(rec)
    }
}

/// Treat the query as a regex; fall back to a literal match when it does not compile.
fn country_pattern(query: &str) -> Regex {
    RegexBuilder::new(query)
        .case_insensitive(true)
        .build()
        .unwrap_or_else(|_| {
            RegexBuilder::new(&regex::escape(query))
                .case_insensitive(true)
                .build()
                .unwrap_or_else(|_| MATCH_NOTHING.clone())
        })
}

static MATCH_NOTHING: Lazy<Regex> = Lazy::new(|| Regex::new(r"[^\s\S]").expect("static regex"));

/// Split a `[meta, data]` page. Error objects (`[{"message": ...}]`) and
/// `data: null` are "no results".
pub fn split_page(body: Value) -> Option<(Value, Vec<Value>)> {
    let Value::Array(mut parts) = body else {
        return None;
    };
    if parts.len() < 2 {
        return None;
    }
    let data = parts.pop()?;
    let meta = parts.pop()?;
    let rows = match data {
        Value::Array(rows) => rows,
        _ => Vec::new(),
    };
    Some((meta, rows))
}

fn loose_u64(v: Option<&Value>) -> Option<u64> {
    match v? {
        Value::Number(n) => n.as_u64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

/// World Bank period labels: `2020`, `2020Q3`, `2020M07`, `2020-07-01`.
pub fn parse_period(s: &str) -> Option<NaiveDate> {
    static QUARTER: Lazy<Regex> = Lazy::new(|| Regex::new(r"^(\d{4})Q([1-4])$").expect("static regex"));
    static MONTH: Lazy<Regex> = Lazy::new(|| Regex::new(r"^(\d{4})M(\d{2})$").expect("static regex"));

    let s = s.trim();
    if let Ok(d) = NaiveDate::parse_from_str(s, "%Y-%m-%d") {
        return Some(d);
    }
    if let Some(c) = QUARTER.captures(s) {
        let y: i32 = c[1].parse().ok()?;
        let q: u32 = c[2].parse().ok()?;
        return NaiveDate::from_ymd_opt(y, (q - 1) * 3 + 1, 1);
    }
    if let Some(c) = MONTH.captures(s) {
        let y: i32 = c[1].parse().ok()?;
        let m: u32 = c[2].parse().ok()?;
        return NaiveDate::from_ymd_opt(y, m, 1);
    }
    if s.len() == 4 {
        let y: i32 = s.parse().ok()?;
        return NaiveDate::from_ymd_opt(y, 1, 1);
    }
    None
}
