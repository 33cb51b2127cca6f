// src/elements/mod.rs
//! Element model: symbols and countries, each exposing a fixed set of
//! factors described by a declarative schema.

pub mod country;
pub mod factor;
pub mod schema;
pub mod symbol;

use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::cache::SeriesCache;
use crate::error::DataError;
use crate::interpolate::Method;
use crate::providers::{FmpClient, WorldBankClient};

pub use country::{Country, CountryInfo};
pub use factor::Factor;
pub use schema::{FactorEntry, Schema};
pub use symbol::Symbol;

/// Element variant discriminator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Section {
    Symbol,
    Country,
}

impl Section {
    pub fn as_str(&self) -> &'static str {
        match self {
            Section::Symbol => "symbol",
            Section::Country => "country",
        }
    }
}

impl fmt::Display for Section {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Section {
    type Err = DataError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "symbol" => Ok(Section::Symbol),
            "country" => Ok(Section::Country),
            other => Err(DataError::not_found("section", other)),
        }
    }
}

/// Localizable description of one factor of an element.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FactorInfo {
    pub group: String,
    pub factor: String,
    pub name: String,
    pub note: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "section", rename_all = "lowercase")]
pub enum Element {
    Symbol(Symbol),
    Country(Country),
}

impl Element {
    pub fn section(&self) -> Section {
        match self {
            Element::Symbol(_) => Section::Symbol,
            Element::Country(_) => Section::Country,
        }
    }

    pub fn code(&self) -> &str {
        match self {
            Element::Symbol(s) => &s.code,
            Element::Country(c) => &c.code,
        }
    }

    pub fn name(&self) -> Option<&str> {
        match self {
            Element::Symbol(s) => s.name.as_deref(),
            Element::Country(c) => c.info.name.as_deref(),
        }
    }

    pub fn note(&self) -> Option<&str> {
        match self {
            Element::Symbol(s) => s.note.as_deref(),
            Element::Country(c) => c.info.note.as_deref(),
        }
    }
}

/// Everything a factor needs to fetch its series.
pub struct Sources {
    pub fmp: FmpClient,
    pub worldbank: WorldBankClient,
    pub cache: SeriesCache,
    pub symbols: Schema,
    pub countries: Schema,
    pub country_info_dir: PathBuf,
    pub method: Method,
}

impl Sources {
    pub fn schema(&self, section: Section) -> &Schema {
        match section {
            Section::Symbol => &self.symbols,
            Section::Country => &self.countries,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sections_parse_case_insensitively() {
        assert_eq!("Symbol".parse::<Section>().unwrap(), Section::Symbol);
        assert_eq!(" country ".parse::<Section>().unwrap(), Section::Country);
        assert!(matches!("fund".parse::<Section>(), Err(DataError::NotFound { .. })));
    }
}
