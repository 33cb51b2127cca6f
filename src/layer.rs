//! # Data Layer
//! Inbound facade used by the HTTP surface: element resolution, series reads,
//! search, news, translation and relationship analysis.

use std::collections::BTreeSet;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use chrono::NaiveDate;
use futures::future::join_all;
use serde::Serialize;

use crate::analysis::{self, CointReport, GrangerReport, MultivariateAnalyzer, PairwiseAnalyzer};
use crate::cache::SeriesCache;
use crate::config::{Settings, TranslatorKind};
use crate::elements::{Country, Element, Factor, FactorEntry, Schema, Section, Sources, Symbol};
use crate::error::{DataError, Result};
use crate::interpolate::Method;
use crate::news::{NewsAggregator, NewsItem};
use crate::normalize::{destandardize, NormalizedDataset};
use crate::providers::{FmpClient, HttpTransport, JsonTransport, WorldBankClient};
use crate::translate::{
    DeepL, Glossary, GoogleAuth, GoogleTranslate, Multilingual, TranslationBackend, TranslationStore, Translator,
    Unconfigured,
};

const SYMBOL_SEARCH_CAP: usize = 10;

#[derive(Debug, Clone, Serialize)]
pub struct SearchResult {
    pub symbols: Vec<Symbol>,
    pub countries: Vec<Country>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LocalizedText {
    pub name: Option<String>,
    pub note: Option<String>,
}

/// A concrete `(element, factor)` pair, written `section:code:group:factor`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Feature {
    pub section: Section,
    pub code: String,
    pub group: String,
    pub factor: String,
}

impl FromStr for Feature {
    type Err = DataError;

    fn from_str(s: &str) -> Result<Self> {
        let parts: Vec<&str> = s.trim().split(':').collect();
        let [section, code, group, factor] = parts.as_slice() else {
            return Err(DataError::not_found("feature", s));
        };
        Ok(Self {
            section: section.parse()?,
            code: code.to_string(),
            group: group.to_string(),
            factor: factor.to_string(),
        })
    }
}

impl std::fmt::Display for Feature {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}:{}:{}", self.section, self.code, self.group, self.factor)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PairScore {
    pub a: String,
    pub b: String,
    pub score: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AnalysisReport {
    /// Features that had data and took part.
    pub features: Vec<String>,
    /// Overlapping days used.
    pub days: usize,
    /// `a` Granger-causes `b`.
    pub granger: Vec<PairScore>,
    pub cointegration: Vec<PairScore>,
}

/// Raw outputs for one ordered pair: does `x` help forecast `y`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PairReport {
    pub x: String,
    pub y: String,
    pub days: usize,
    pub granger: GrangerReport,
    pub cointegration: CointReport,
}

pub struct DataLayer {
    sources: Sources,
    translator: Translator,
}

impl DataLayer {
    pub fn new(sources: Sources, translator: Translator) -> Self {
        Self { sources, translator }
    }

    /// Wire providers, cache, schemas and translator from settings.
    pub async fn from_settings(settings: &Settings) -> anyhow::Result<Self> {
        let http = HttpTransport::new(Duration::from_secs(settings.http_timeout_secs))
            .context("building HTTP client")?;
        let client = http.client().clone();
        let transport: Arc<dyn JsonTransport> = Arc::new(http);

        let sources = Sources {
            fmp: FmpClient::new(transport.clone(), settings.fmp_api_key.clone(), settings.lru_cache_size),
            worldbank: WorldBankClient::new(transport, settings.lru_cache_size),
            cache: SeriesCache::new(settings.cache_root(), settings.zone()),
            symbols: Schema::load(Section::Symbol, &settings.symbol_schema_path).context("loading symbol schema")?,
            countries: Schema::load(Section::Country, &settings.country_schema_path)
                .context("loading country schema")?,
            country_info_dir: settings.country_info_dir(),
            method: Method::default(),
        };

        let glossary = Glossary::load(&settings.glossary_dir).context("loading glossaries")?;
        let store = TranslationStore::new(settings.translations_dir(), settings.lru_cache_size);
        let backend = translation_backend(settings, client);
        let translator = Translator::discover(backend, glossary, store).await;

        tracing::info!(
            volume = %settings.volume_path.display(),
            translator = ?settings.translator,
            utc_offset_hours = settings.utc_offset_hours,
            "data layer ready"
        );
        Ok(Self::new(sources, translator))
    }

    pub fn sources(&self) -> &Sources {
        &self.sources
    }

    pub fn translator(&self) -> &Translator {
        &self.translator
    }

    pub async fn resolve_element(&self, section: &str, code: &str) -> Result<Element> {
        match section.parse::<Section>()? {
            Section::Symbol => Symbol::load(code, &self.sources).await.map(Element::Symbol),
            Section::Country => Country::load(code, &self.sources).await.map(Element::Country),
        }
    }

    /// Element name and note rendered in `lang`.
    pub async fn localize(&self, element: &Element, lang: &str) -> Result<LocalizedText> {
        let render = |text: Option<String>| async move {
            match text {
                Some(t) => Multilingual::new(t).translate(&self.translator, lang).await.map(Some),
                None => Ok(None),
            }
        };
        let note = match element {
            Element::Country(c) => Some(c.display_note()),
            other => other.note().map(str::to_string),
        };
        let (name, note) = tokio::join!(render(element.name().map(str::to_string)), render(note));
        Ok(LocalizedText {
            name: name?,
            note: note?,
        })
    }

    pub async fn get_series(
        &self,
        section: &str,
        code: &str,
        group: &str,
        factor: &str,
    ) -> Result<Option<NormalizedDataset>> {
        let section: Section = section.parse()?;
        let code = match section {
            Section::Symbol => Symbol::normalize_code(code)?,
            Section::Country => Country::normalize_code(code)?,
        };
        Factor::new(&self.sources, section, &code, group, factor)?
            .fetch()
            .await
    }

    /// Observed days in original units.
    pub async fn get_series_raw(
        &self,
        section: &str,
        code: &str,
        group: &str,
        factor: &str,
    ) -> Result<Option<Vec<(NaiveDate, f64)>>> {
        Ok(self
            .get_series(section, code, group, factor)
            .await?
            .map(|ds| destandardize(&ds)))
    }

    pub fn factors(&self, section: &str) -> Result<Vec<FactorEntry>> {
        let section: Section = section.parse()?;
        Ok(self.sources.schema(section).entries())
    }

    pub async fn search_elements(&self, text: &str) -> Result<SearchResult> {
        let (symbols, countries) = tokio::join!(
            self.search_symbols(text),
            Country::search(text, &self.sources, &self.translator),
        );
        Ok(SearchResult {
            symbols: symbols?,
            countries: countries?,
        })
    }

    /// FMP ticker search with the original and English text, deduped by ticker.
    async fn search_symbols(&self, text: &str) -> Result<Vec<Symbol>> {
        let text = text.trim();
        if text.is_empty() {
            return Ok(Vec::new());
        }
        let english = self
            .translator
            .translate(text, "en", None)
            .await
            .unwrap_or_else(|_| text.to_string());
        let mut queries = vec![text.to_string()];
        if english != text {
            queries.push(english);
        }

        let results = join_all(
            queries
                .iter()
                .map(|q| self.sources.fmp.search(q, SYMBOL_SEARCH_CAP)),
        )
        .await;

        let mut seen = BTreeSet::new();
        let mut out = Vec::new();
        for res in results {
            let records = match res {
                Ok(r) => r,
                Err(e) => {
                    tracing::warn!(target: "providers", provider = "fmp", error = %e, "symbol search failed");
                    continue;
                }
            };
            for sym in records.iter().filter_map(Symbol::from_search_record) {
                if seen.insert(sym.code.clone()) {
                    out.push(sym);
                }
            }
        }
        out.truncate(SYMBOL_SEARCH_CAP);
        Ok(out)
    }

    pub async fn news(&self, symbol: Option<&str>, limit: usize) -> Result<Vec<NewsItem>> {
        NewsAggregator::new(&self.sources.fmp).news(symbol, limit).await
    }

    pub async fn translate(&self, text: &str, to: &str, from: Option<&str>) -> Result<String> {
        self.translator.translate(text, to, from).await
    }

    /// Pairwise Granger and cointegration scores over the overlap of the features.
    pub async fn analyze(&self, features: &[Feature]) -> Result<AnalysisReport> {
        let fetched = join_all(features.iter().map(|f| async move {
            let ds = self
                .get_series(f.section.as_str(), &f.code, &f.group, &f.factor)
                .await?;
            Ok::<_, DataError>(ds.map(|d| (f.to_string(), d)))
        }))
        .await;

        let mut datasets = Vec::new();
        for r in fetched {
            if let Some(pair) = r? {
                datasets.push(pair);
            }
        }

        tokio::task::spawn_blocking(move || {
            let aligned = analysis::align(&datasets);
            let days = aligned.values().next().map_or(0, Vec::len);
            let features: Vec<String> = aligned.keys().cloned().collect();
            let m = MultivariateAnalyzer::new(aligned);
            let pairs = |scores: std::collections::BTreeMap<(String, String), f64>| -> Vec<PairScore> {
                scores
                    .into_iter()
                    .map(|((a, b), score)| PairScore { a, b, score })
                    .collect()
            };
            AnalysisReport {
                features,
                days,
                granger: pairs(m.grangercausality()),
                cointegration: pairs(m.cointegration()),
            }
        })
        .await
        .map_err(|e| DataError::Upstream(format!("analysis task: {e}")))
    }

    /// Per-lag Granger p-values and the cointegration test for `x → y`.
    /// `None` when either feature has no data or the axes do not overlap.
    pub async fn analyze_pair(&self, x: &Feature, y: &Feature) -> Result<Option<PairReport>> {
        let (xs, ys) = tokio::join!(
            self.get_series(x.section.as_str(), &x.code, &x.group, &x.factor),
            self.get_series(y.section.as_str(), &y.code, &y.group, &y.factor),
        );
        let (Some(xs), Some(ys)) = (xs?, ys?) else {
            return Ok(None);
        };
        let (xn, yn) = (x.to_string(), y.to_string());
        tokio::task::spawn_blocking(move || {
            let aligned = analysis::align(&[(xn.clone(), xs), (yn.clone(), ys)]);
            let (Some(xt), Some(yt)) = (aligned.get(&xn), aligned.get(&yn)) else {
                return None;
            };
            let pair = PairwiseAnalyzer::new(xt, yt);
            Some(PairReport {
                days: xt.len(),
                granger: pair.granger_report(),
                cointegration: pair.cointegration_report(),
                x: xn,
                y: yn,
            })
        })
        .await
        .map_err(|e| DataError::Upstream(format!("analysis task: {e}")))
    }
}

/// A missing or unusable credential disables machine translation; it never
/// stops startup.
fn translation_backend(settings: &Settings, client: reqwest::Client) -> Arc<dyn TranslationBackend> {
    match settings.translator {
        TranslatorKind::Google => match settings.gcp_credential_json.as_deref() {
            Some(blob) => match GoogleAuth::from_credential_json(blob) {
                Ok(auth) => Arc::new(GoogleTranslate::new(client, auth)),
                Err(e) => unconfigured(&format!("GCP_CREDENTIAL_JSON unusable: {e}")),
            },
            None => unconfigured("GCP_CREDENTIAL_JSON is not set"),
        },
        TranslatorKind::Deepl => match settings.deepl_api_key.clone() {
            Some(key) => Arc::new(DeepL::new(client, key)),
            None => unconfigured("DEEPL_API_KEY is not set"),
        },
    }
}

fn unconfigured(reason: &str) -> Arc<dyn TranslationBackend> {
    tracing::warn!(target: "translate", reason, "machine translation disabled");
    Arc::new(Unconfigured {
        reason: reason.to_string(),
    })
}
