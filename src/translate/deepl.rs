//! DeepL v2 backend.
//!
//! DeepL expects its own code variants: `en` → `EN-US`, `pt` → `PT-PT`,
//! everything else upper-cased. Source codes are always plain upper-case.

use async_trait::async_trait;
use serde_json::{json, Value};

use super::backend::TranslationBackend;
use crate::error::{DataError, Result};

pub const DEEPL_API_URL: &str = "https://api.deepl.com/v2";
pub const DEEPL_FREE_API_URL: &str = "https://api-free.deepl.com/v2";

pub struct DeepL {
    client: reqwest::Client,
    api_key: String,
    base_url: String,
}

impl DeepL {
    /// Free-tier keys end in `:fx` and live on a separate host.
    pub fn new(client: reqwest::Client, api_key: String) -> Self {
        let base_url = if api_key.ends_with(":fx") {
            DEEPL_FREE_API_URL
        } else {
            DEEPL_API_URL
        };
        Self {
            client,
            api_key,
            base_url: base_url.to_string(),
        }
    }

    pub fn with_base_url(mut self, base: impl Into<String>) -> Self {
        self.base_url = base.into();
        self
    }

    async fn send(&self, req: reqwest::RequestBuilder) -> Result<Value> {
        let resp = req.bearer_auth(&self.api_key).send().await?;
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

/// ISO 639-1 → DeepL target code.
pub fn target_code(lang: &str) -> String {
    match lang.to_ascii_lowercase().as_str() {
        "en" => "EN-US".to_string(),
        "pt" => "PT-PT".to_string(),
        other => other.to_ascii_uppercase(),
    }
}

/// DeepL code → ISO 639-1 (`EN-US` → `en`).
pub fn iso_code(deepl: &str) -> String {
    deepl
        .split('-')
        .next()
        .unwrap_or(deepl)
        .to_ascii_lowercase()
}

#[async_trait]
impl TranslationBackend for DeepL {
    fn name(&self) -> &'static str {
        "deepl"
    }

    async fn translate(&self, text: &str, to: &str, from: Option<&str>) -> Result<String> {
        let mut body = json!({ "text": [text], "target_lang": target_code(to) });
        if let Some(from) = from {
            body["source_lang"] = json!(from.to_ascii_uppercase());
        }
        let url = format!("{}/translate", self.base_url.trim_end_matches('/'));
        let v = self.send(self.client.post(&url).json(&body)).await?;
        v.pointer("/translations/0/text")
            .and_then(Value::as_str)
            .map(str::to_string)
            .ok_or_else(|| DataError::Upstream("deepl: no translation in response".into()))
    }

    async fn languages(&self) -> Result<Vec<String>> {
        let url = format!("{}/languages", self.base_url.trim_end_matches('/'));
        let v = self
            .send(self.client.get(&url).query(&[("type", "target")]))
            .await?;
        let mut langs: Vec<String> = v
            .as_array()
            .map(|a| {
                a.iter()
                    .filter_map(|l| l.get("language").and_then(Value::as_str))
                    .map(iso_code)
                    .collect()
            })
            .unwrap_or_default();
        langs.sort();
        langs.dedup();
        Ok(langs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn code_variants() {
        assert_eq!(target_code("en"), "EN-US");
        assert_eq!(target_code("pt"), "PT-PT");
        assert_eq!(target_code("ko"), "KO");
        assert_eq!(iso_code("EN-GB"), "en");
        assert_eq!(iso_code("JA"), "ja");
    }

    #[test]
    fn free_keys_use_free_host() {
        let c = reqwest::Client::new();
        assert_eq!(DeepL::new(c.clone(), "abc:fx".into()).base_url, DEEPL_FREE_API_URL);
        assert_eq!(DeepL::new(c, "abc".into()).base_url, DEEPL_API_URL);
    }
}
