//! Google Cloud Translation (v2 REST).
//!
//! Credentials come from the `GCP_CREDENTIAL_JSON` blob. Three shapes are accepted:
//! a service-account key file (`"type": "service_account"`, exchanged for
//! short-lived OAuth tokens), `{"api_key": "..."}` (sent as `key=`) or
//! `{"access_token": "..."}` (static Bearer).

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use gcp_auth::{CustomServiceAccount, TokenProvider};
use serde::Deserialize;
use serde_json::{json, Value};

use super::backend::TranslationBackend;
use crate::error::{DataError, Result};

pub const GOOGLE_TRANSLATE_URL: &str = "https://translation.googleapis.com/language/translate/v2";
const TRANSLATE_SCOPE: &str = "https://www.googleapis.com/auth/cloud-translation";

#[derive(Clone)]
pub enum GoogleAuth {
    ApiKey(String),
    Bearer(String),
    /// Signs a JWT with the account key; tokens are cached until near expiry.
    ServiceAccount(Arc<CustomServiceAccount>),
}

impl fmt::Debug for GoogleAuth {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ApiKey(_) => f.write_str("ApiKey(..)"),
            Self::Bearer(_) => f.write_str("Bearer(..)"),
            Self::ServiceAccount(_) => f.write_str("ServiceAccount(..)"),
        }
    }
}

#[derive(Deserialize)]
struct CredentialBlob {
    #[serde(rename = "type")]
    kind: Option<String>,
    api_key: Option<String>,
    access_token: Option<String>,
}

impl GoogleAuth {
    pub fn from_credential_json(blob: &str) -> Result<Self> {
        let creds: CredentialBlob = serde_json::from_str(blob)
            .map_err(|e| DataError::Config(format!("GCP_CREDENTIAL_JSON: {e}")))?;
        if creds.kind.as_deref() == Some("service_account") {
            let account = CustomServiceAccount::from_json(blob)
                .map_err(|e| DataError::Config(format!("GCP_CREDENTIAL_JSON service account: {e}")))?;
            return Ok(Self::ServiceAccount(Arc::new(account)));
        }
        match (creds.api_key, creds.access_token) {
            (Some(k), _) if !k.trim().is_empty() => Ok(Self::ApiKey(k.trim().to_string())),
            (_, Some(t)) if !t.trim().is_empty() => Ok(Self::Bearer(t.trim().to_string())),
            _ => Err(DataError::Config(
                "GCP_CREDENTIAL_JSON is not a service account and carries neither api_key nor access_token".into(),
            )),
        }
    }
}

pub struct GoogleTranslate {
    client: reqwest::Client,
    auth: GoogleAuth,
    base_url: String,
}

impl GoogleTranslate {
    pub fn new(client: reqwest::Client, auth: GoogleAuth) -> Self {
        Self {
            client,
            auth,
            base_url: GOOGLE_TRANSLATE_URL.to_string(),
        }
    }

    pub fn with_base_url(mut self, base: impl Into<String>) -> Self {
        self.base_url = base.into();
        self
    }

    async fn authorize(&self, req: reqwest::RequestBuilder) -> Result<reqwest::RequestBuilder> {
        Ok(match &self.auth {
            GoogleAuth::ApiKey(k) => req.query(&[("key", k.as_str())]),
            GoogleAuth::Bearer(t) => req.bearer_auth(t),
            GoogleAuth::ServiceAccount(account) => {
                let token = account
                    .token(&[TRANSLATE_SCOPE])
                    .await
                    .map_err(|e| DataError::Upstream(format!("google token exchange: {e}")))?;
                req.bearer_auth(token.as_str())
            }
        })
    }

    async fn send(&self, req: reqwest::RequestBuilder) -> Result<Value> {
        let resp = self.authorize(req).await?.send().await?;
        let status = resp.status();
        if !status.is_success() {
            return Err(DataError::Http {
                status: status.as_u16(),
                url: resp.url().path().to_string(),
            });
        }
        Ok(resp.json().await?)
    }
}

#[async_trait]
impl TranslationBackend for GoogleTranslate {
    fn name(&self) -> &'static str {
        "google"
    }

    async fn translate(&self, text: &str, to: &str, from: Option<&str>) -> Result<String> {
        let mut body = json!({ "q": text, "target": to, "format": "text" });
        if let Some(from) = from {
            body["source"] = json!(from);
        }
        let v = self.send(self.client.post(&self.base_url).json(&body)).await?;
        translated_text(&v).ok_or_else(|| DataError::Upstream("google: no translation in response".into()))
    }

    async fn languages(&self) -> Result<Vec<String>> {
        let url = format!("{}/languages", self.base_url.trim_end_matches('/'));
        let v = self.send(self.client.get(&url)).await?;
        Ok(language_codes(&v))
    }
}

fn translated_text(v: &Value) -> Option<String> {
    v.pointer("/data/translations/0/translatedText")
        .and_then(Value::as_str)
        .map(str::to_string)
}

fn language_codes(v: &Value) -> Vec<String> {
    v.pointer("/data/languages")
        .and_then(Value::as_array)
        .map(|langs| {
            langs
                .iter()
                .filter_map(|l| l.get("language").and_then(Value::as_str))
                .map(|s| s.to_ascii_lowercase())
                .collect()
        })
        .unwrap_or_default()
}
