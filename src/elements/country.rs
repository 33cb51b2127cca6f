//! Country element backed by the World Bank API.
//!
//! Identity (name, note, coordinates) is persisted as a JSON sidecar under
//! `{volume}/info/country/{CODE}.json` so it is fetched once per volume.

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use futures::future::join_all;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::{FactorInfo, Section, Sources};
use crate::error::{DataError, Result};
use crate::translate::Translator;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CountryInfo {
    pub name: Option<String>,
    /// `None` when region, capital or income level is unknown (aggregates).
    pub note: Option<String>,
    pub longitude: Option<f64>,
    pub latitude: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Country {
    pub code: String,
    #[serde(flatten)]
    pub info: CountryInfo,
    pub is_valid: bool,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub factors: Vec<FactorInfo>,
}

impl Country {
    /// ISO 3166-1 alpha-3, upper-cased.
    pub fn normalize_code(code: &str) -> Result<String> {
        let code = code.trim().to_ascii_uppercase();
        if code.len() == 3 && code.chars().all(|c| c.is_ascii_alphabetic()) {
            Ok(code)
        } else {
            Err(DataError::not_found(Section::Country.as_str(), code))
        }
    }

    fn from_info(code: String, info: CountryInfo) -> Self {
        let is_valid = info.name.is_some() && info.note.is_some();
        Self {
            code,
            info,
            is_valid,
            factors: Vec::new(),
        }
    }

    /// Identity plus factor descriptions, resolved concurrently.
    pub async fn load(code: &str, sources: &Sources) -> Result<Self> {
        let code = Self::normalize_code(code)?;
        let (info, factors) = tokio::join!(load_info(&code, sources), describe_factors(sources));
        let info = info?;
        if info.name.is_none() {
            return Err(DataError::not_found(Section::Country.as_str(), &code));
        }
        let mut country = Self::from_info(code, info);
        country.factors = factors;
        Ok(country)
    }

    /// Identity only; used by search where factor descriptions are not needed.
    pub async fn load_identity(code: &str, sources: &Sources) -> Result<Self> {
        let code = Self::normalize_code(code)?;
        let info = load_info(&code, sources).await?;
        Ok(Self::from_info(code, info))
    }

    /// The synthesized note, or a placeholder when it could not be formed.
    pub fn display_note(&self) -> String {
        match (&self.info.note, &self.info.name) {
            (Some(note), _) => note.clone(),
            (None, Some(name)) => format!("{name}({}) has no regional profile.", self.code),
            (None, None) => format!("{} has no regional profile.", self.code),
        }
    }

    /// Free-text country search in any language.
    ///
    /// The text is translated to English, then the country list scan and the
    /// direct code lookup run for both forms concurrently. Results are
    /// restricted to valid countries and ordered by shortest English name.
    pub async fn search(text: &str, sources: &Sources, translator: &Translator) -> Result<Vec<Country>> {
        let text = text.trim();
        if text.is_empty() {
            return Ok(Vec::new());
        }
        let english = match translator.translate(text, "en", None).await {
            Ok(t) => t,
            Err(e) => {
                tracing::warn!(target: "translate", error = %e, "search text translation failed; using original");
                text.to_string()
            }
        };

        let wb = &sources.worldbank;
        let (by_text, by_english, code_text, code_english) = tokio::join!(
            wb.search_countries(text),
            wb.search_countries(&english),
            wb.country(text),
            wb.country(&english),
        );

        let mut codes = BTreeSet::new();
        for list in [by_text, by_english] {
            for rec in list.unwrap_or_else(|e| log_empty(e)) {
                if let Some(id) = rec.get("id").and_then(Value::as_str) {
                    codes.insert(id.to_ascii_uppercase());
                }
            }
        }
        for rec in [code_text, code_english] {
            if let Some(id) = rec
                .unwrap_or_else(|e| log_empty(e))
                .as_ref()
                .and_then(|r| r.get("id"))
                .and_then(Value::as_str)
            {
                codes.insert(id.to_ascii_uppercase());
            }
        }

        let loaded = join_all(codes.iter().map(|c| Country::load_identity(c, sources))).await;
        let mut found: Vec<Country> = loaded
            .into_iter()
            .filter_map(|r| r.ok())
            .filter(|c| c.is_valid)
            .collect();
        found.sort_by_key(|c| c.info.name.as_ref().map_or(usize::MAX, |n| n.chars().count()));
        Ok(found)
    }
}

fn log_empty<T: Default>(e: DataError) -> T {
    tracing::warn!(target: "providers", provider = "worldbank", error = %e, "country search leg failed");
    T::default()
}

/// Sidecar first; upstream on miss, then persist.
async fn load_info(code: &str, sources: &Sources) -> Result<CountryInfo> {
    let path = sidecar_path(&sources.country_info_dir, code);
    if let Some(info) = read_sidecar(&path).await {
        return Ok(info);
    }
    let rec = sources
        .worldbank
        .country(code)
        .await?
        .ok_or_else(|| DataError::not_found(Section::Country.as_str(), code))?;
    let info = info_from_record(code, &rec);
    if let Err(e) = write_sidecar(&path, &info).await {
        tracing::warn!(target: "cache", country = code, error = %e, "could not persist country sidecar");
    }
    Ok(info)
}

pub fn sidecar_path(dir: &Path, code: &str) -> PathBuf {
    dir.join(format!("{code}.json"))
}

async fn read_sidecar(path: &Path) -> Option<CountryInfo> {
    let bytes = tokio::fs::read(path).await.ok()?;
    match serde_json::from_slice(&bytes) {
        Ok(info) => Some(info),
        Err(e) => {
            tracing::warn!(target: "cache", path = %path.display(), error = %e, "ignoring unreadable sidecar");
            None
        }
    }
}

async fn write_sidecar(path: &Path, info: &CountryInfo) -> Result<()> {
    if let Some(dir) = path.parent() {
        tokio::fs::create_dir_all(dir).await?;
    }
    let tmp = path.with_extension(format!("json.{:016x}.tmp", rand::random::<u64>()));
    tokio::fs::write(&tmp, serde_json::to_vec_pretty(info)?).await?;
    tokio::fs::rename(&tmp, path).await?;
    Ok(())
}

/// Build identity from a World Bank country record.
pub fn info_from_record(code: &str, rec: &Value) -> CountryInfo {
    let text = |v: Option<&Value>| {
        v.and_then(Value::as_str)
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
    };
    let coord = |key: &str| match rec.get(key) {
        Some(Value::Number(n)) => n.as_f64(),
        Some(Value::String(s)) => s.trim().parse().ok(),
        _ => None,
    };

    let name = text(rec.get("name"));
    let region = text(rec.get("region").and_then(|r| r.get("value"))).filter(|r| r != "Aggregates");
    let capital = text(rec.get("capitalCity"));
    let income = text(rec.get("incomeLevel").and_then(|r| r.get("value")));

    let note = match (&name, region, capital, income) {
        (Some(name), Some(region), Some(capital), Some(income)) => Some(format!(
            "{name}({code}) is located in {region} and its capital is {capital}. The income level is {income}."
        )),
        _ => None,
    };

    CountryInfo {
        name,
        note,
        longitude: coord("longitude"),
        latitude: coord("latitude"),
    }
}

/// Factor names and notes from indicator metadata, schema names as fallback.
async fn describe_factors(sources: &Sources) -> Vec<FactorInfo> {
    let pending = sources.countries.groups().flat_map(|(g, spec)| {
        spec.factors.iter().map(move |(f, fs)| async move {
            let meta = match sources.worldbank.indicator(&fs.field).await {
                Ok(m) => m,
                Err(e) => {
                    tracing::debug!(target: "providers", provider = "worldbank", indicator = %fs.field, error = %e, "indicator meta unavailable");
                    None
                }
            };
            let pick = |key: &str| {
                meta.as_ref()
                    .and_then(|m| m.get(key))
                    .and_then(Value::as_str)
                    .map(str::trim)
                    .filter(|s| !s.is_empty())
                    .map(str::to_string)
            };
            FactorInfo {
                group: g.clone(),
                factor: f.clone(),
                name: pick("name").unwrap_or_else(|| fs.name.clone()),
                note: pick("sourceNote").unwrap_or_else(|| fs.note.clone()),
            }
        })
    });
    join_all(pending).await
}
