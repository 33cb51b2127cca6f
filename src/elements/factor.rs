//! Lazy handle to one cached series of an element.

use std::time::Instant;

use serde_json::Value;

use super::schema::FactorSpec;
use super::symbol::{self, loose_f64};
use super::{FactorInfo, Section, Sources};
use crate::cache::EntryKey;
use crate::error::{DataError, Result};
use crate::interpolate::Method;
use crate::normalize::{standardize, NormalizedDataset, Provenance, RawPoint};
use crate::providers::worldbank::parse_period;

pub struct Factor<'a> {
    sources: &'a Sources,
    section: Section,
    element: String,
    group: String,
    factor: String,
    spec: &'a FactorSpec,
}

impl<'a> Factor<'a> {
    /// Resolve `(group, factor)` against the section's schema.
    pub fn new(sources: &'a Sources, section: Section, element: &str, group: &str, factor: &str) -> Result<Self> {
        let (_, spec) = sources.schema(section).get(group, factor)?;
        Ok(Self {
            sources,
            section,
            element: element.to_string(),
            group: group.to_string(),
            factor: factor.to_string(),
            spec,
        })
    }

    pub fn key(&self) -> EntryKey {
        entry_key(self.section, &self.element, &self.group, &self.factor)
    }

    pub fn info(&self) -> FactorInfo {
        FactorInfo {
            group: self.group.clone(),
            factor: self.factor.clone(),
            name: self.spec.name.clone(),
            note: self.spec.note.clone(),
        }
    }

    /// Today's dataset, refreshing from upstream when stale.
    /// `None` when upstream has no usable data.
    pub async fn fetch(&self) -> Result<Option<NormalizedDataset>> {
        match self.section {
            Section::Symbol => self.fetch_symbol().await,
            Section::Country => self.fetch_country().await,
        }
    }

    async fn fetch_symbol(&self) -> Result<Option<NormalizedDataset>> {
        let cache = &self.sources.cache;
        let key = self.key();
        if let Some(ds) = cache.fresh_or_miss(&key).await {
            return Ok(Some(ds));
        }
        if cache.is_insufficient(&key) {
            return Ok(None);
        }

        let group = self.sources.symbols.group(&self.group)?;
        let started = Instant::now();
        let mut collected = match symbol::collect(&self.sources.fmp, &self.element, group).await {
            Ok(c) => c,
            Err(e) => {
                tracing::warn!(target: "providers", provider = "fmp", element = %self.element, group = %self.group, error = %e, "group collection failed");
                Default::default()
            }
        };

        let today = cache.today();
        let mut wanted = None;
        for name in group.factors.keys() {
            let key = entry_key(Section::Symbol, &self.element, &self.group, name);
            let points = collected.remove(name).unwrap_or_default();
            let provenance = Provenance {
                source: "fmp".to_string(),
                element: self.element.clone(),
                factor: format!("{}.{name}", self.group),
                collected: today,
            };
            match normalize_blocking(points, provenance, self.sources.method).await? {
                Some(ds) => {
                    let written = cache.write(&key, &ds).await;
                    if *name == self.factor {
                        written?;
                        wanted = Some(ds);
                    } else if let Err(e) = written {
                        tracing::warn!(target: "cache", entry = %key, error = %e, "sibling factor write failed");
                    }
                }
                None => {
                    tracing::debug!(target: "cache", entry = %key, "insufficient data");
                    cache.mark_insufficient(&key);
                }
            }
        }
        metrics::histogram!("series_refresh_ms").record(started.elapsed().as_secs_f64() * 1_000.0);
        Ok(wanted)
    }

    async fn fetch_country(&self) -> Result<Option<NormalizedDataset>> {
        let cache = &self.sources.cache;
        let key = self.key();
        let provenance = Provenance {
            source: "worldbank".to_string(),
            element: self.element.clone(),
            factor: format!("{}.{}", self.group, self.factor),
            collected: cache.today(),
        };
        cache
            .get_or_refresh(&key, || async {
                let rows = self
                    .sources
                    .worldbank
                    .data(&self.spec.field, &self.element)
                    .await?;
                let points = indicator_points(&rows);
                normalize_blocking(points, provenance, self.sources.method).await
            })
            .await
    }
}

/// `{section}/{element}/{group}.{factor}`
pub fn entry_key(section: Section, element: &str, group: &str, factor: &str) -> EntryKey {
    EntryKey::new(section.as_str(), element, format!("{group}.{factor}"))
}

/// World Bank observation rows → raw points (`date` period label, `value`).
pub fn indicator_points(rows: &[Value]) -> Vec<RawPoint> {
    rows.iter()
        .filter_map(|row| {
            let t = parse_period(row.get("date")?.as_str()?)?;
            let value = row.get("value").and_then(loose_f64);
            Some(RawPoint::new(t, value))
        })
        .collect()
}

async fn normalize_blocking(
    points: Vec<RawPoint>,
    provenance: Provenance,
    method: Method,
) -> Result<Option<NormalizedDataset>> {
    tokio::task::spawn_blocking(move || standardize(&points, provenance, method))
        .await
        .map_err(|e| DataError::Upstream(format!("normalize task: {e}")))
}
