//! Financial instrument element backed by FMP.

use std::collections::BTreeMap;

use chrono::NaiveDate;
use serde::Serialize;
use serde_json::Value;

use super::schema::{Endpoint, GroupSpec};
use super::{FactorInfo, Section, Sources};
use crate::error::{DataError, Result};
use crate::normalize::RawPoint;
use crate::providers::fmp::{into_records, HISTORICAL_PRICE_FULL};
use crate::providers::FmpClient;

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Symbol {
    pub code: String,
    pub name: Option<String>,
    pub note: Option<String>,
    pub exchange: Option<String>,
    pub currency: Option<String>,
    pub country: Option<String>,
    pub factors: Vec<FactorInfo>,
}

impl Symbol {
    /// Upper-cases and validates a ticker.
    pub fn normalize_code(code: &str) -> Result<String> {
        let code = code.trim().to_ascii_uppercase();
        let ok = !code.is_empty()
            && code.len() <= 20
            && code
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '^' | '='));
        if ok {
            Ok(code)
        } else {
            Err(DataError::not_found(Section::Symbol.as_str(), code))
        }
    }

    /// Resolve identity from the FMP profile endpoint.
    pub async fn load(code: &str, sources: &Sources) -> Result<Self> {
        let code = Self::normalize_code(code)?;
        let profile = sources
            .fmp
            .profile(&code)
            .await?
            .ok_or_else(|| DataError::not_found(Section::Symbol.as_str(), &code))?;

        let mut symbol = Self {
            code,
            name: text_field(&profile, "companyName"),
            note: text_field(&profile, "description"),
            exchange: text_field(&profile, "exchangeShortName"),
            currency: text_field(&profile, "currency"),
            country: text_field(&profile, "country"),
            factors: Vec::new(),
        };
        symbol.factors = describe_factors(sources);
        Ok(symbol)
    }

    /// Lightweight identity built from a `search` record; no profile call.
    pub fn from_search_record(rec: &Value) -> Option<Self> {
        let code = Self::normalize_code(rec.get("symbol")?.as_str()?).ok()?;
        Some(Self {
            code,
            name: text_field(rec, "name"),
            note: None,
            exchange: text_field(rec, "exchangeShortName").or_else(|| text_field(rec, "stockExchange")),
            currency: text_field(rec, "currency"),
            country: None,
            factors: Vec::new(),
        })
    }
}

fn describe_factors(sources: &Sources) -> Vec<FactorInfo> {
    sources
        .symbols
        .groups()
        .flat_map(|(g, spec)| {
            spec.factors.iter().map(move |(f, fs)| FactorInfo {
                group: g.clone(),
                factor: f.clone(),
                name: fs.name.clone(),
                note: fs.note.clone(),
            })
        })
        .collect()
}

/// One request for the whole group; returns `factor → raw points`.
///
/// Records missing a factor's field contribute a missing value for it.
pub async fn collect(fmp: &FmpClient, symbol: &str, group: &GroupSpec) -> Result<BTreeMap<String, Vec<RawPoint>>> {
    let rows = fetch_rows(fmp, symbol, group).await?;
    Ok(rows_to_points(&rows, group))
}

async fn fetch_rows(fmp: &FmpClient, symbol: &str, group: &GroupSpec) -> Result<Vec<Value>> {
    let Endpoint::Fmp { api, query, symbol_in_path } = &group.endpoint else {
        return Err(DataError::Config("symbol group bound to a non-FMP endpoint".into()));
    };
    if api == HISTORICAL_PRICE_FULL {
        return fmp.historical_price_full(symbol).await;
    }
    let mut params = query.clone();
    let path = if *symbol_in_path {
        format!("{api}/{symbol}")
    } else {
        params.push(("symbol".to_string(), symbol.to_string()));
        api.clone()
    };
    Ok(into_records(fmp.get(&path, &params, false).await?))
}

pub fn rows_to_points(rows: &[Value], group: &GroupSpec) -> BTreeMap<String, Vec<RawPoint>> {
    let mut out: BTreeMap<String, Vec<RawPoint>> = group
        .factors
        .keys()
        .map(|k| (k.clone(), Vec::with_capacity(rows.len())))
        .collect();
    for row in rows {
        let Some(t) = row.get(&group.t_key).and_then(parse_date) else {
            continue;
        };
        for (key, spec) in &group.factors {
            let value = row.get(&spec.field).and_then(loose_f64);
            if let Some(points) = out.get_mut(key) {
                points.push(RawPoint::new(t, value));
            }
        }
    }
    out
}

/// `2024-01-02` or `2024-01-02 16:00:00`.
pub fn parse_date(v: &Value) -> Option<NaiveDate> {
    let s = v.as_str()?.trim();
    let day = s.get(..10).unwrap_or(s);
    NaiveDate::parse_from_str(day, "%Y-%m-%d").ok()
}

pub fn loose_f64(v: &Value) -> Option<f64> {
    match v {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
    .filter(|x: &f64| x.is_finite())
}

fn text_field(v: &Value, key: &str) -> Option<String> {
    v.get(key)
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}
