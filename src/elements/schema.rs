//! Declarative factor schemas, parsed once at startup into a dispatch table
//! `(group, factor) → (endpoint, upstream field, English name/note)`.
//!
//! Symbol schema (`config/symbol_factors.json`):
//! ```json
//! { "price": { "api": "historical-price-full", "t_key": "date",
//!              "factors": { "adj_close": { "field": "adjClose", "name": "...", "note": "..." } } } }
//! ```
//! Country schema (`config/country_factors.json`), themed groups of
//! friendly name → World Bank indicator code:
//! ```json
//! { "population": { "total": "SP.POP.TOTL" } }
//! ```

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use super::Section;
use crate::error::{DataError, Result};

fn default_t_key() -> String {
    "date".to_string()
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FactorSpec {
    /// Upstream JSON field (symbols) or World Bank indicator code (countries).
    pub field: String,
    pub name: String,
    #[serde(default)]
    pub note: String,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Endpoint {
    Fmp {
        api: String,
        query: Vec<(String, String)>,
        symbol_in_path: bool,
    },
    WorldBank,
}

#[derive(Debug, Clone, PartialEq)]
pub struct GroupSpec {
    pub endpoint: Endpoint,
    pub t_key: String,
    pub factors: BTreeMap<String, FactorSpec>,
}

#[derive(Debug, Deserialize)]
struct RawSymbolGroup {
    api: String,
    #[serde(default)]
    query: BTreeMap<String, String>,
    #[serde(default = "default_true")]
    symbol_in_path: bool,
    #[serde(default = "default_t_key")]
    t_key: String,
    factors: BTreeMap<String, FactorSpec>,
}

/// One row of [`Schema::entries`].
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FactorEntry {
    pub group: String,
    pub factor: String,
    pub name: String,
}

#[derive(Debug, Clone)]
pub struct Schema {
    section: Section,
    groups: BTreeMap<String, GroupSpec>,
}

impl Schema {
    pub fn load(section: Section, path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path).map_err(|e| {
            DataError::Config(format!("reading {} schema {}: {e}", section, path.display()))
        })?;
        match section {
            Section::Symbol => Self::symbol_from_json(&text),
            Section::Country => Self::country_from_json(&text),
        }
    }

    pub fn symbol_from_json(text: &str) -> Result<Self> {
        let raw: BTreeMap<String, RawSymbolGroup> = serde_json::from_str(text)
            .map_err(|e| DataError::Config(format!("symbol schema: {e}")))?;
        let groups = raw
            .into_iter()
            .map(|(name, g)| {
                let spec = GroupSpec {
                    endpoint: Endpoint::Fmp {
                        api: g.api,
                        query: g.query.into_iter().collect(),
                        symbol_in_path: g.symbol_in_path,
                    },
                    t_key: g.t_key,
                    factors: g.factors,
                };
                (name, spec)
            })
            .collect();
        Self::build(Section::Symbol, groups)
    }

    pub fn country_from_json(text: &str) -> Result<Self> {
        let raw: BTreeMap<String, BTreeMap<String, String>> = serde_json::from_str(text)
            .map_err(|e| DataError::Config(format!("country schema: {e}")))?;
        let groups = raw
            .into_iter()
            .map(|(name, indicators)| {
                let factors = indicators
                    .into_iter()
                    .map(|(friendly, code)| {
                        let spec = FactorSpec {
                            field: code,
                            name: humanize(&friendly),
                            note: String::new(),
                        };
                        (friendly, spec)
                    })
                    .collect();
                let spec = GroupSpec {
                    endpoint: Endpoint::WorldBank,
                    t_key: default_t_key(),
                    factors,
                };
                (name, spec)
            })
            .collect();
        Self::build(Section::Country, groups)
    }

    fn build(section: Section, groups: BTreeMap<String, GroupSpec>) -> Result<Self> {
        if groups.is_empty() {
            return Err(DataError::Config(format!("{section} schema has no groups")));
        }
        if let Some((g, _)) = groups.iter().find(|(_, spec)| spec.factors.is_empty()) {
            return Err(DataError::Config(format!("{section} group '{g}' has no factors")));
        }
        Ok(Self { section, groups })
    }

    pub fn section(&self) -> Section {
        self.section
    }

    pub fn group(&self, group: &str) -> Result<&GroupSpec> {
        self.groups.get(group).ok_or_else(|| DataError::UnknownFactor {
            group: group.to_string(),
            factor: "*".to_string(),
        })
    }

    /// Dispatch lookup for one factor.
    pub fn get(&self, group: &str, factor: &str) -> Result<(&GroupSpec, &FactorSpec)> {
        let unknown = || DataError::UnknownFactor {
            group: group.to_string(),
            factor: factor.to_string(),
        };
        let g = self.groups.get(group).ok_or_else(unknown)?;
        let f = g.factors.get(factor).ok_or_else(unknown)?;
        Ok((g, f))
    }

    pub fn groups(&self) -> impl Iterator<Item = (&String, &GroupSpec)> {
        self.groups.iter()
    }

    /// Every `(group, factor)` pair with its English name, in schema order.
    pub fn entries(&self) -> Vec<FactorEntry> {
        self.groups
            .iter()
            .flat_map(|(g, spec)| {
                spec.factors.iter().map(move |(f, fs)| FactorEntry {
                    group: g.clone(),
                    factor: f.clone(),
                    name: fs.name.clone(),
                })
            })
            .collect()
    }
}

/// `gdp_per_capita` → `Gdp per capita`
fn humanize(key: &str) -> String {
    let spaced = key.replace('_', " ");
    let mut chars = spaced.chars();
    match chars.next() {
        Some(c) => c.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SYMBOLS: &str = r#"{
        "price": {
            "api": "historical-price-full",
            "factors": {
                "adj_close": {"field": "adjClose", "name": "Adjusted close", "note": "Split and dividend adjusted"},
                "volume": {"field": "volume", "name": "Volume"}
            }
        },
        "ratios": {
            "api": "ratios",
            "query": {"period": "quarter"},
            "t_key": "date",
            "factors": {"pe": {"field": "priceEarningsRatio", "name": "P/E"}}
        }
    }"#;

    #[test]
    fn symbol_schema_dispatches() {
        let s = Schema::symbol_from_json(SYMBOLS).unwrap();
        let (g, f) = s.get("price", "adj_close").unwrap();
        assert_eq!(f.field, "adjClose");
        assert_eq!(g.t_key, "date");
        let (g, _) = s.get("ratios", "pe").unwrap();
        assert_eq!(
            g.endpoint,
            Endpoint::Fmp {
                api: "ratios".into(),
                query: vec![("period".into(), "quarter".into())],
                symbol_in_path: true,
            }
        );
        assert_eq!(s.entries().len(), 3);
    }

    #[test]
    fn unknown_factor_is_typed() {
        let s = Schema::symbol_from_json(SYMBOLS).unwrap();
        assert!(matches!(s.get("price", "nope"), Err(DataError::UnknownFactor { .. })));
        assert!(matches!(s.get("nope", "adj_close"), Err(DataError::UnknownFactor { .. })));
    }

    #[test]
    fn country_schema_maps_indicators() {
        let s = Schema::country_from_json(r#"{"population": {"total": "SP.POP.TOTL", "growth_rate": "SP.POP.GROW"}}"#)
            .unwrap();
        let (g, f) = s.get("population", "growth_rate").unwrap();
        assert_eq!(g.endpoint, Endpoint::WorldBank);
        assert_eq!(f.field, "SP.POP.GROW");
        assert_eq!(f.name, "Growth rate");
    }

    #[test]
    fn empty_groups_are_rejected() {
        assert!(Schema::country_from_json("{}").is_err());
        assert!(Schema::country_from_json(r#"{"trade": {}}"#).is_err());
        assert!(Schema::symbol_from_json("not json").is_err());
    }
}
