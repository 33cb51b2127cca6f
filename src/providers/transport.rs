// src/providers/transport.rs
use std::time::Duration;

use async_trait::async_trait;
use metrics::counter;
use serde_json::Value;

use crate::error::{DataError, Result};

/// One JSON GET against an upstream. Implemented over reqwest in production
/// and by in-memory fakes in tests.
#[async_trait]
pub trait JsonTransport: Send + Sync {
    async fn get_json(&self, url: &str, query: &[(String, String)]) -> Result<Value>;
}

/// Shared reqwest client with a long per-request timeout.
#[derive(Clone)]
pub struct HttpTransport {
    client: reqwest::Client,
}

impl HttpTransport {
    pub fn new(timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent("econ-data-service/0.1")
            .connect_timeout(Duration::from_secs(10))
            .timeout(timeout)
            .build()
            .map_err(|e| DataError::Config(format!("http client: {e}")))?;
        Ok(Self { client })
    }

    pub fn client(&self) -> &reqwest::Client {
        &self.client
    }
}

#[async_trait]
impl JsonTransport for HttpTransport {
    async fn get_json(&self, url: &str, query: &[(String, String)]) -> Result<Value> {
        counter!("provider_requests_total").increment(1);
        let resp = self.client.get(url).query(query).send().await.map_err(|e| {
            counter!("provider_errors_total").increment(1);
            DataError::from(e)
        })?;
        let status = resp.status();
        if !status.is_success() {
            counter!("provider_errors_total").increment(1);
            return Err(DataError::Http {
                status: status.as_u16(),
                url: resp.url().path().to_string(),
            });
        }
        let body = resp.text().await?;
        serde_json::from_str(&body)
            .map_err(|e| DataError::Upstream(format!("malformed JSON from {url}: {e}")))
    }
}
