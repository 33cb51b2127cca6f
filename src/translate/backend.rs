use async_trait::async_trait;

use crate::error::{DataError, Result};

/// A machine translation vendor.
///
/// Language codes on both sides of the trait are ISO 639-1 (`en`, `ko`, ...);
/// vendors map them to their own variants internally.
#[async_trait]
pub trait TranslationBackend: Send + Sync {
    fn name(&self) -> &'static str;

    /// Translate `text` into `to`. `from: None` lets the vendor detect the source.
    async fn translate(&self, text: &str, to: &str, from: Option<&str>) -> Result<String>;

    /// Target languages the vendor accepts.
    async fn languages(&self) -> Result<Vec<String>>;
}

/// Stand-in used when no vendor credentials are configured. Every call fails
/// with a configuration error; glossary and memory hits still resolve.
pub struct Unconfigured {
    pub reason: String,
}

#[async_trait]
impl TranslationBackend for Unconfigured {
    fn name(&self) -> &'static str {
        "unconfigured"
    }

    async fn translate(&self, _text: &str, _to: &str, _from: Option<&str>) -> Result<String> {
        Err(DataError::Config(self.reason.clone()))
    }

    async fn languages(&self) -> Result<Vec<String>> {
        Ok(Vec::new())
    }
}
