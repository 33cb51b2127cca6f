//! # News Aggregator
//! Stock, forex and crypto news from FMP merged into one bounded list.
//!
//! Without a symbol only stock news is returned. With a symbol, the forex and
//! crypto streams are paged until each holds `limit` matching items or a page
//! has no matches, then the three lists are merged with a fair-share quota.
//! Output is ordered oldest → newest.

use chrono::NaiveDateTime;
use serde::Serialize;
use serde_json::Value;

use crate::error::Result;
use crate::providers::fmp::into_records;
use crate::providers::FmpClient;

pub const DEFAULT_LIMIT: usize = 10;
const MAX_PAGES: usize = 10;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NewsItem {
    /// Ticker the item is about; resolvable into a symbol element.
    pub element: Option<String>,
    pub title: String,
    pub content: String,
    pub source_url: String,
    pub timestamp: NaiveDateTime,
}

impl NewsItem {
    pub fn from_record(rec: &Value) -> Option<Self> {
        let text = |k: &str| rec.get(k).and_then(Value::as_str).map(str::trim).unwrap_or_default();
        let timestamp = parse_timestamp(text("publishedDate"))?;
        Some(Self {
            element: Some(text("symbol"))
                .filter(|s| !s.is_empty())
                .map(str::to_string),
            title: text("title").to_string(),
            content: text("text").to_string(),
            source_url: text("url").to_string(),
            timestamp,
        })
    }
}

fn parse_timestamp(s: &str) -> Option<NaiveDateTime> {
    const FORMATS: [&str; 3] = ["%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S%.fZ", "%Y-%m-%dT%H:%M:%S%.f"];
    FORMATS
        .iter()
        .find_map(|f| NaiveDateTime::parse_from_str(s, f).ok())
        .or_else(|| chrono::DateTime::parse_from_rfc3339(s).ok().map(|d| d.naive_utc()))
}

#[derive(Debug, Clone, Copy)]
enum Stream {
    Forex,
    Crypto,
}

impl Stream {
    fn path(&self) -> &'static str {
        match self {
            Stream::Forex => "forex_news",
            Stream::Crypto => "crypto_news",
        }
    }
}

pub struct NewsAggregator<'a> {
    fmp: &'a FmpClient,
}

impl<'a> NewsAggregator<'a> {
    pub fn new(fmp: &'a FmpClient) -> Self {
        Self { fmp }
    }

    pub async fn news(&self, symbol: Option<&str>, limit: usize) -> Result<Vec<NewsItem>> {
        let symbol = symbol.map(str::trim).filter(|s| !s.is_empty());
        let (stock, forex, crypto) = tokio::join!(
            self.stock(symbol, limit),
            self.page(Stream::Forex, symbol, limit, 0),
            self.page(Stream::Crypto, symbol, limit, 0),
        );
        let stock = stock?;

        let Some(symbol) = symbol else {
            let mut out = stock;
            out.truncate(limit);
            sort_oldest_first(&mut out);
            return Ok(out);
        };

        let forex = self.fill(Stream::Forex, symbol, limit, forex).await;
        let crypto = self.fill(Stream::Crypto, symbol, limit, crypto).await;
        tracing::debug!(
            target: "news",
            symbol,
            stock = stock.len(),
            forex = forex.len(),
            crypto = crypto.len(),
            "news streams collected"
        );

        let mut out = fair_merge([stock, forex, crypto], limit);
        sort_oldest_first(&mut out);
        Ok(out)
    }

    async fn stock(&self, symbol: Option<&str>, limit: usize) -> Result<Vec<NewsItem>> {
        let mut query = vec![("limit".to_string(), limit.to_string())];
        if let Some(s) = symbol {
            query.push(("tickers".to_string(), s.to_string()));
        }
        let body = self.fmp.get("stock_news", &query, true).await?;
        Ok(into_records(body)
            .iter()
            .filter_map(NewsItem::from_record)
            .filter(|n| n.element.is_some())
            .collect())
    }

    async fn page(&self, stream: Stream, symbol: Option<&str>, limit: usize, page: usize) -> Result<Vec<NewsItem>> {
        let mut query = vec![
            ("limit".to_string(), limit.to_string()),
            ("page".to_string(), page.to_string()),
        ];
        if let Some(s) = symbol {
            query.push(("symbol".to_string(), s.to_string()));
        }
        let body = self.fmp.get(stream.path(), &query, true).await?;
        Ok(into_records(body).iter().filter_map(NewsItem::from_record).collect())
    }

    /// Keep paging until `limit` matches or a page without matches.
    async fn fill(&self, stream: Stream, symbol: &str, limit: usize, first: Result<Vec<NewsItem>>) -> Vec<NewsItem> {
        let mut out = Vec::new();
        let mut batch = first;
        for page in 1..=MAX_PAGES {
            let items = match batch {
                Ok(items) => items,
                Err(e) => {
                    tracing::warn!(target: "news", stream = stream.path(), error = %e, "news page failed");
                    break;
                }
            };
            let before = out.len();
            out.extend(items.into_iter().filter(|n| matches_symbol(n, symbol)));
            if out.len() == before || out.len() >= limit {
                break;
            }
            batch = self.page(stream, Some(symbol), limit, page).await;
        }
        out.truncate(limit);
        out
    }
}

fn matches_symbol(item: &NewsItem, symbol: &str) -> bool {
    let norm = |s: &str| -> String {
        s.chars()
            .filter(char::is_ascii_alphanumeric)
            .map(|c| c.to_ascii_uppercase())
            .collect()
    };
    item.element
        .as_deref()
        .is_some_and(|e| norm(e) == norm(symbol))
}

fn sort_oldest_first(items: &mut [NewsItem]) {
    items.sort_by_key(|n| n.timestamp);
}

/// Merge up to `limit` items: each list gets `⌊limit/3⌋`, and whatever is
/// left over goes to the longest lists first, skipping exhausted ones.
/// Each list contributes from its head.
pub fn fair_merge<T>(lists: [Vec<T>; 3], limit: usize) -> Vec<T> {
    let quota = limit / 3;
    let mut take: [usize; 3] = [0; 3];
    for (i, l) in lists.iter().enumerate() {
        take[i] = l.len().min(quota);
    }
    let mut left = limit - take.iter().sum::<usize>();

    let mut by_len: Vec<usize> = (0..3).collect();
    by_len.sort_by(|a, b| lists[*b].len().cmp(&lists[*a].len()));
    for i in by_len {
        if left == 0 {
            break;
        }
        let extra = (lists[i].len() - take[i]).min(left);
        take[i] += extra;
        left -= extra;
    }

    lists
        .into_iter()
        .zip(take)
        .flat_map(|(l, n)| l.into_iter().take(n))
        .collect()
}
