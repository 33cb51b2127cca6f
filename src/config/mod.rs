// src/config/mod.rs
//! Service settings: optional TOML file, overridden by process environment.
//!
//! Lookup order per key: env var → `config/econ.toml` (or `$ECON_CONFIG_PATH`) → default.

use anyhow::{anyhow, Context, Result};
use chrono::{FixedOffset, NaiveDate, Offset, Utc};
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};

pub const ENV_CONFIG_PATH: &str = "ECON_CONFIG_PATH";
pub const DEFAULT_CONFIG_PATH: &str = "config/econ.toml";

pub const DEFAULT_LRU_CACHE_SIZE: usize = 512;
pub const DEFAULT_UTC_OFFSET_HOURS: i32 = 9;
pub const DEFAULT_HTTP_TIMEOUT_SECS: u64 = 60;

/// Which translation vendor answers `translate()` calls.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TranslatorKind {
    Google,
    Deepl,
}

impl TranslatorKind {
    fn parse(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "google" | "gcp" => Ok(Self::Google),
            "deepl" => Ok(Self::Deepl),
            other => Err(anyhow!("unsupported TRANSLATOR_BACKEND: {other}")),
        }
    }
}

/// Keys accepted in the TOML file (all optional).
#[derive(Debug, Default, Deserialize)]
pub struct FileConfig {
    pub fmp_api_key: Option<String>,
    pub cognito_user_pool_id: Option<String>,
    pub cognito_app_client_id: Option<String>,
    pub gcp_credential_json: Option<String>,
    pub deepl_api_key: Option<String>,
    pub lru_cache_size: Option<usize>,
    pub efs_volume_path: Option<PathBuf>,
    pub translator_backend: Option<TranslatorKind>,
    pub cache_utc_offset_hours: Option<i32>,
    pub glossary_dir: Option<PathBuf>,
    pub symbol_schema_path: Option<PathBuf>,
    pub country_schema_path: Option<PathBuf>,
    pub http_timeout_secs: Option<u64>,
}

#[derive(Debug, Clone)]
pub struct Settings {
    pub fmp_api_key: Option<String>,
    /// Carried through for the auth collaborator; unused here.
    pub cognito_user_pool_id: Option<String>,
    pub cognito_app_client_id: Option<String>,
    pub gcp_credential_json: Option<String>,
    pub deepl_api_key: Option<String>,
    pub lru_cache_size: usize,
    pub volume_path: PathBuf,
    pub translator: TranslatorKind,
    pub utc_offset_hours: i32,
    pub glossary_dir: PathBuf,
    pub symbol_schema_path: PathBuf,
    pub country_schema_path: PathBuf,
    pub http_timeout_secs: u64,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            fmp_api_key: None,
            cognito_user_pool_id: None,
            cognito_app_client_id: None,
            gcp_credential_json: None,
            deepl_api_key: None,
            lru_cache_size: DEFAULT_LRU_CACHE_SIZE,
            volume_path: PathBuf::from("data"),
            translator: TranslatorKind::Google,
            utc_offset_hours: DEFAULT_UTC_OFFSET_HOURS,
            glossary_dir: PathBuf::from("config/glossary"),
            symbol_schema_path: PathBuf::from("config/symbol_factors.json"),
            country_schema_path: PathBuf::from("config/country_factors.json"),
            http_timeout_secs: DEFAULT_HTTP_TIMEOUT_SECS,
        }
    }
}

impl Settings {
    /// Load from `$ECON_CONFIG_PATH` / `config/econ.toml` (if present) plus env.
    pub fn load() -> Result<Self> {
        let path = std::env::var(ENV_CONFIG_PATH)
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from(DEFAULT_CONFIG_PATH));
        let file = if path.exists() {
            load_file(&path)?
        } else {
            FileConfig::default()
        };
        Self::resolve(file, |k| std::env::var(k).ok())
    }

    /// Merge file values with an env lookup. Env wins.
    pub fn resolve(file: FileConfig, env: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let d = Settings::default();
        let env = |k: &str| env(k).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        let lru_cache_size = match env("LRU_CACHE_SIZE") {
            Some(v) => v
                .parse()
                .with_context(|| format!("LRU_CACHE_SIZE is not a number: {v}"))?,
            None => file.lru_cache_size.unwrap_or(d.lru_cache_size),
        };
        let utc_offset_hours = match env("CACHE_UTC_OFFSET_HOURS") {
            Some(v) => v
                .parse()
                .with_context(|| format!("CACHE_UTC_OFFSET_HOURS is not a number: {v}"))?,
            None => file.cache_utc_offset_hours.unwrap_or(d.utc_offset_hours),
        };
        if !(-23..=23).contains(&utc_offset_hours) {
            return Err(anyhow!("CACHE_UTC_OFFSET_HOURS out of range: {utc_offset_hours}"));
        }
        let http_timeout_secs = match env("HTTP_TIMEOUT_SECS") {
            Some(v) => v
                .parse()
                .with_context(|| format!("HTTP_TIMEOUT_SECS is not a number: {v}"))?,
            None => file.http_timeout_secs.unwrap_or(d.http_timeout_secs),
        };
        let translator = match env("TRANSLATOR_BACKEND") {
            Some(v) => TranslatorKind::parse(&v)?,
            None => file.translator_backend.unwrap_or(d.translator),
        };

        Ok(Self {
            fmp_api_key: env("FMP_API_KEY").or(file.fmp_api_key),
            cognito_user_pool_id: env("COGNITO_USER_POOL_ID").or(file.cognito_user_pool_id),
            cognito_app_client_id: env("COGNITO_APP_CLIENT_ID").or(file.cognito_app_client_id),
            gcp_credential_json: env("GCP_CREDENTIAL_JSON").or(file.gcp_credential_json),
            deepl_api_key: env("DEEPL_API_KEY").or(file.deepl_api_key),
            lru_cache_size,
            volume_path: env("EFS_VOLUME_PATH")
                .map(PathBuf::from)
                .or(file.efs_volume_path)
                .unwrap_or(d.volume_path),
            translator,
            utc_offset_hours,
            glossary_dir: env("GLOSSARY_DIR")
                .map(PathBuf::from)
                .or(file.glossary_dir)
                .unwrap_or(d.glossary_dir),
            symbol_schema_path: env("SYMBOL_SCHEMA_PATH")
                .map(PathBuf::from)
                .or(file.symbol_schema_path)
                .unwrap_or(d.symbol_schema_path),
            country_schema_path: env("COUNTRY_SCHEMA_PATH")
                .map(PathBuf::from)
                .or(file.country_schema_path)
                .unwrap_or(d.country_schema_path),
            http_timeout_secs,
        })
    }

    /// Root of the normalized series cache.
    pub fn cache_root(&self) -> PathBuf {
        self.volume_path.join("cache")
    }

    /// Directory for country identity sidecars.
    pub fn country_info_dir(&self) -> PathBuf {
        self.volume_path.join("info").join("country")
    }

    /// Directory for the persistent translation memory.
    pub fn translations_dir(&self) -> PathBuf {
        self.volume_path.join("translations")
    }

    pub fn zone(&self) -> FixedOffset {
        zone_from_hours(self.utc_offset_hours)
    }
}

pub fn zone_from_hours(hours: i32) -> FixedOffset {
    FixedOffset::east_opt(hours * 3600).unwrap_or_else(|| Utc.fix())
}

/// Calendar day "now" in the given zone.
pub fn today_in(zone: FixedOffset) -> NaiveDate {
    Utc::now().with_timezone(&zone).date_naive()
}

fn load_file(path: &Path) -> Result<FileConfig> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("reading settings from {}", path.display()))?;
    toml::from_str(&content).with_context(|| format!("parsing settings {}", path.display()))
}
