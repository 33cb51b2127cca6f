// src/translate/mod.rs
//! # Translator
//! `translate(text, to, from?)` resolves in this order:
//! 1. trim the input
//! 2. identity (`to == from`) returns the text unchanged
//! 3. glossary override, verbatim
//! 4. persistent translation memory
//! 5. backend call; HTML entities in the result are unescaped before the
//!    value is stored and returned
//!
//! Supported targets are discovered from the backend at startup. Unknown
//! targets fail with `UnsupportedLanguage`.

pub mod backend;
pub mod deepl;
pub mod glossary;
pub mod google;
pub mod store;

use std::collections::BTreeSet;
use std::sync::Arc;

use metrics::counter;
use serde::{Deserialize, Serialize};

pub use backend::{TranslationBackend, Unconfigured};
pub use deepl::DeepL;
pub use glossary::Glossary;
pub use google::{GoogleAuth, GoogleTranslate};
pub use store::TranslationStore;

use crate::error::{DataError, Result};

pub struct Translator {
    backend: Arc<dyn TranslationBackend>,
    glossary: Glossary,
    store: TranslationStore,
    languages: BTreeSet<String>,
}

impl Translator {
    /// Build with languages discovered from the backend. If discovery fails,
    /// only English and glossary targets are accepted.
    pub async fn discover(backend: Arc<dyn TranslationBackend>, glossary: Glossary, store: TranslationStore) -> Self {
        let languages = match backend.languages().await {
            Ok(langs) if !langs.is_empty() => langs,
            Ok(_) => {
                tracing::warn!(target: "translate", backend = backend.name(), "backend reported no languages");
                Vec::new()
            }
            Err(e) => {
                tracing::warn!(target: "translate", backend = backend.name(), error = %e, "language discovery failed");
                Vec::new()
            }
        };
        let fallback: Vec<String> = glossary.targets().map(str::to_string).collect();
        let mut t = Self::with_languages(backend, glossary, store, languages);
        t.languages.extend(fallback);
        tracing::info!(target: "translate", languages = t.languages.len(), "translator ready");
        t
    }

    pub fn with_languages(
        backend: Arc<dyn TranslationBackend>,
        glossary: Glossary,
        store: TranslationStore,
        languages: impl IntoIterator<Item = String>,
    ) -> Self {
        let mut languages: BTreeSet<String> = languages.into_iter().map(|l| l.to_ascii_lowercase()).collect();
        languages.insert("en".to_string());
        Self {
            backend,
            glossary,
            store,
            languages,
        }
    }

    pub fn languages(&self) -> impl Iterator<Item = &str> {
        self.languages.iter().map(String::as_str)
    }

    pub fn supports(&self, lang: &str) -> bool {
        self.languages.contains(&lang.to_ascii_lowercase())
    }

    pub async fn translate(&self, text: &str, to: &str, from: Option<&str>) -> Result<String> {
        let text = text.trim();
        let to = to.trim().to_ascii_lowercase();
        let from = from
            .map(|f| f.trim().to_ascii_lowercase())
            .filter(|f| !f.is_empty());

        if from.as_deref() == Some(to.as_str()) || text.is_empty() {
            return Ok(text.to_string());
        }
        if !self.supports(&to) {
            return Err(DataError::UnsupportedLanguage(to));
        }
        if let Some(hit) = self.glossary.lookup(text, &to, from.as_deref()) {
            return Ok(hit.to_string());
        }

        let key = TranslationStore::key(text, &to, from.as_deref());
        if let Some(hit) = self.store.get(&key).await {
            counter!("translation_cache_hits_total").increment(1);
            return Ok(hit);
        }

        counter!("translation_backend_calls_total").increment(1);
        let raw = self.backend.translate(text, &to, from.as_deref()).await?;
        let out = html_escape::decode_html_entities(&raw).into_owned();
        tracing::debug!(
            target: "translate",
            backend = self.backend.name(),
            to = %to,
            text_sha = &store::hash_hex(text)[..12],
            "translated"
        );
        if let Err(e) = self.store.set(&key, &out).await {
            tracing::warn!(target: "translate", error = %e, "translation memory write failed");
        }
        Ok(out)
    }
}

/// English text that can be rendered in any supported language.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Multilingual {
    pub text: String,
}

impl Multilingual {
    pub fn new(text: impl Into<String>) -> Self {
        Self { text: text.into() }
    }

    pub async fn translate(&self, translator: &Translator, to: &str) -> Result<String> {
        translator.translate(&self.text, to, Some("en")).await
    }
}
