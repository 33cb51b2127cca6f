//! FinancialModelingPrep client.
//!
//! Single `get(path, query)` entry point: injects `apikey`, retries any error
//! within a 20s budget, and optionally memoizes the JSON body for 12×360s.
//! `historical-price-full` is special: it needs `from=1900-01-01` to return
//! the whole history and wraps the rows under `historical`.

use std::sync::Arc;
use std::time::Duration;

use serde_json::Value;

use super::transport::JsonTransport;
use crate::error::{DataError, Result};
use crate::memo::Memo;
use crate::retry;

pub const FMP_BASE_URL: &str = "https://financialmodelingprep.com/api/v3";
pub const HISTORICAL_PRICE_FULL: &str = "historical-price-full";

const RETRY_BUDGET: Duration = Duration::from_secs(20);
const MEMO_TTL: Duration = Duration::from_secs(12 * 360);

pub struct FmpClient {
    transport: Arc<dyn JsonTransport>,
    api_key: Option<String>,
    base_url: String,
    memo: Memo<String, Value>,
}

impl FmpClient {
    pub fn new(transport: Arc<dyn JsonTransport>, api_key: Option<String>, memo_cap: usize) -> Self {
        Self {
            transport,
            api_key,
            base_url: FMP_BASE_URL.to_string(),
            memo: Memo::new(memo_cap, Some(MEMO_TTL)),
        }
    }

    pub fn with_base_url(mut self, base: impl Into<String>) -> Self {
        self.base_url = base.into();
        self
    }

    /// GET `{base}/{path}` with `query` + `apikey`.
    pub async fn get(&self, path: &str, query: &[(String, String)], memoize: bool) -> Result<Value> {
        let key = memo_key(path, query);
        if memoize {
            if let Some(hit) = self.memo.get(&key) {
                return Ok(hit);
            }
        }

        let api_key = self
            .api_key
            .as_deref()
            .ok_or_else(|| DataError::Config("FMP_API_KEY is not set".into()))?;
        let url = format!("{}/{}", self.base_url.trim_end_matches('/'), path.trim_start_matches('/'));
        let mut params = query.to_vec();
        params.push(("apikey".to_string(), api_key.to_string()));

        let value = retry::pool_any(RETRY_BUDGET, || self.transport.get_json(&url, &params))
            .await
            .inspect_err(|e| tracing::warn!(target: "providers", provider = "fmp", path, error = %e, "request failed"))?;

        if memoize {
            self.memo.insert(key, value.clone());
        }
        Ok(value)
    }

    /// Full daily price history for `symbol`, oldest first as delivered upstream.
    pub async fn historical_price_full(&self, symbol: &str) -> Result<Vec<Value>> {
        let path = format!("{HISTORICAL_PRICE_FULL}/{symbol}");
        let query = vec![("from".to_string(), "1900-01-01".to_string())];
        let body = self.get(&path, &query, false).await?;
        Ok(unwrap_historical(body))
    }

    /// Company profile record, `None` when the ticker is unknown upstream.
    pub async fn profile(&self, symbol: &str) -> Result<Option<Value>> {
        let body = self.get(&format!("profile/{symbol}"), &[], true).await?;
        Ok(first_record(body))
    }

    /// Ticker search by free text.
    pub async fn search(&self, text: &str, limit: usize) -> Result<Vec<Value>> {
        let query = vec![
            ("query".to_string(), text.to_string()),
            ("limit".to_string(), limit.to_string()),
        ];
        let body = self.get("search", &query, true).await?;
        Ok(into_records(body))
    }
}

fn memo_key(path: &str, query: &[(String, String)]) -> String {
    let mut q: Vec<String> = query.iter().map(|(k, v)| format!("{k}={v}")).collect();
    q.sort();
    format!("{path}?{}", q.join("&"))
}

/// `historical-price-full` nests rows under `historical`; everything else is a top-level array.
pub fn unwrap_historical(body: Value) -> Vec<Value> {
    match body {
        Value::Object(mut m) => match m.remove("historical") {
            Some(Value::Array(rows)) => rows,
            _ => Vec::new(),
        },
        Value::Array(rows) => rows,
        _ => Vec::new(),
    }
}

/// Upstream "no results" shows up as `[]`, `{}` or an error object; all map to empty.
pub fn into_records(body: Value) -> Vec<Value> {
    match body {
        Value::Array(rows) => rows.into_iter().filter(Value::is_object).collect(),
        _ => Vec::new(),
    }
}

fn first_record(body: Value) -> Option<Value> {
    into_records(body).into_iter().next()
}
