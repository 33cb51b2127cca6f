//! # Series Cache
//! On-disk store of normalized datasets on a volume shared by every process.
//!
//! Layout: `{root}/{variant}/{element}/{factor}.arr/`
//! - `data.parquet`: columns `t` (days since 1970-01-01), `daily`, `mask`
//! - `attrs.json`: provenance, interpolation and scaling blocks, row count and
//!   the SHA-256 of `data.parquet`
//!
//! Both files are written to a private temp name and renamed into place, data
//! first, metadata last. A reader that sees data and metadata from different
//! writes detects the hash mismatch and retries. Reads and writes retry within
//! an 8s budget, then make one last unsuppressed attempt.
//!
//! An entry is fresh when its `collected` day equals today in the configured zone.

use std::collections::HashMap;
use std::fs;
use std::io::Cursor;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::time::Duration;

use chrono::{FixedOffset, NaiveDate};
use metrics::counter;
use polars::prelude::*;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::config::today_in;
use crate::error::{DataError, Result};
use crate::normalize::{DatasetAttrs, NormalizedDataset};
use crate::retry::Poll;

pub const DATA_FILE: &str = "data.parquet";
pub const ATTRS_FILE: &str = "attrs.json";
pub const READ_BUDGET: Duration = Duration::from_secs(8);

/// Identifies one cached series.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct EntryKey {
    pub variant: String,
    pub element: String,
    pub factor: String,
}

impl EntryKey {
    pub fn new(variant: impl Into<String>, element: impl Into<String>, factor: impl Into<String>) -> Self {
        Self {
            variant: variant.into(),
            element: element.into(),
            factor: factor.into(),
        }
    }
}

impl std::fmt::Display for EntryKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}/{}", self.variant, self.element, self.factor)
    }
}

/// `attrs.json` as stored on disk.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct StoredAttrs {
    #[serde(flatten)]
    attrs: DatasetAttrs,
    rows: usize,
    data_sha256: String,
}

pub struct SeriesCache {
    root: PathBuf,
    zone: FixedOffset,
    budget: Duration,
    insufficient: Mutex<HashMap<EntryKey, NaiveDate>>,
}

impl SeriesCache {
    pub fn new(root: impl Into<PathBuf>, zone: FixedOffset) -> Self {
        Self {
            root: root.into(),
            zone,
            budget: READ_BUDGET,
            insufficient: Mutex::new(HashMap::new()),
        }
    }

    pub fn with_budget(mut self, budget: Duration) -> Self {
        self.budget = budget;
        self
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Today's calendar day in the cache's zone.
    pub fn today(&self) -> NaiveDate {
        today_in(self.zone)
    }

    pub fn is_fresh(&self, ds: &NormalizedDataset) -> bool {
        ds.collected() == self.today()
    }

    /// `{root}/{variant}/{element}/{factor}.arr`
    pub fn entry_dir(&self, key: &EntryKey) -> Result<PathBuf> {
        for seg in [&key.variant, &key.element, &key.factor] {
            check_segment(seg)?;
        }
        Ok(self
            .root
            .join(&key.variant)
            .join(&key.element)
            .join(format!("{}.arr", key.factor)))
    }

    /// Load an entry. `Ok(None)` when it was never written.
    pub async fn read(&self, key: &EntryKey) -> Result<Option<NormalizedDataset>> {
        let dir = self.entry_dir(key)?;
        Poll::<Option<NormalizedDataset>, DataError>::new(self.budget)
            .swallow(DataError::is_transient)
            .run(|| {
                let dir = dir.clone();
                async move {
                    tokio::task::spawn_blocking(move || read_entry(&dir))
                        .await
                        .map_err(|e| DataError::Cache(format!("read task: {e}")))?
                }
            })
            .await
            .inspect_err(|e| tracing::warn!(target: "cache", entry = %key, error = %e, "cache read failed"))
    }

    /// Load an entry only if it was collected today.
    pub async fn read_fresh(&self, key: &EntryKey) -> Result<Option<NormalizedDataset>> {
        let found = self.read(key).await?.filter(|ds| self.is_fresh(ds));
        if found.is_some() {
            counter!("series_cache_hits_total").increment(1);
        } else {
            counter!("series_cache_misses_total").increment(1);
        }
        Ok(found)
    }

    /// [`read_fresh`](Self::read_fresh) with an unreadable entry counted as a
    /// miss, so the caller refreshes and overwrites it.
    pub async fn fresh_or_miss(&self, key: &EntryKey) -> Option<NormalizedDataset> {
        match self.read_fresh(key).await {
            Ok(found) => found,
            Err(e) => {
                counter!("series_cache_misses_total").increment(1);
                tracing::warn!(target: "cache", entry = %key, error = %e, "unreadable entry; refreshing");
                None
            }
        }
    }

    /// Replace an entry's contents.
    pub async fn write(&self, key: &EntryKey, ds: &NormalizedDataset) -> Result<()> {
        let dir = self.entry_dir(key)?;
        Poll::<(), DataError>::new(self.budget)
            .swallow(DataError::is_transient)
            .run(|| {
                let dir = dir.clone();
                let ds = ds.clone();
                async move {
                    tokio::task::spawn_blocking(move || write_entry(&dir, &ds))
                        .await
                        .map_err(|e| DataError::Cache(format!("write task: {e}")))?
                }
            })
            .await?;
        self.clear_insufficient(key);
        tracing::debug!(target: "cache", entry = %key, rows = ds.len(), "cache entry written");
        Ok(())
    }

    /// Remember that `key` had no usable data today.
    pub fn mark_insufficient(&self, key: &EntryKey) {
        counter!("series_refresh_insufficient_total").increment(1);
        let today = self.today();
        let mut marks = self.insufficient.lock().expect("insufficient mutex poisoned");
        // Marks from earlier days no longer suppress anything.
        marks.retain(|_, day| *day == today);
        marks.insert(key.clone(), today);
    }

    pub fn is_insufficient(&self, key: &EntryKey) -> bool {
        let today = self.today();
        self.insufficient
            .lock()
            .expect("insufficient mutex poisoned")
            .get(key)
            .is_some_and(|d| *d == today)
    }

    fn clear_insufficient(&self, key: &EntryKey) {
        self.insufficient
            .lock()
            .expect("insufficient mutex poisoned")
            .remove(key);
    }

    /// Fresh entry, or refresh through `refresh` and store the result.
    ///
    /// A refresh yielding `None` (no data, fewer than two points) or an
    /// upstream error leaves the entry untouched and returns `None`.
    pub async fn get_or_refresh<F, Fut>(&self, key: &EntryKey, refresh: F) -> Result<Option<NormalizedDataset>>
    where
        F: FnOnce() -> Fut,
        Fut: std::future::Future<Output = Result<Option<NormalizedDataset>>>,
    {
        if let Some(ds) = self.fresh_or_miss(key).await {
            return Ok(Some(ds));
        }
        if self.is_insufficient(key) {
            return Ok(None);
        }

        let started = std::time::Instant::now();
        let fresh = match refresh().await {
            Ok(v) => v,
            Err(e) => {
                tracing::warn!(target: "cache", entry = %key, error = %e, "refresh failed");
                None
            }
        };
        metrics::histogram!("series_refresh_ms").record(started.elapsed().as_secs_f64() * 1_000.0);

        match fresh {
            Some(ds) => {
                self.write(key, &ds).await?;
                Ok(Some(ds))
            }
            None => {
                self.mark_insufficient(key);
                Ok(None)
            }
        }
    }
}

fn check_segment(seg: &str) -> Result<()> {
    let ok = !seg.is_empty()
        && seg != "."
        && seg != ".."
        && seg
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '-' | '.' | '^' | '='));
    if ok {
        Ok(())
    } else {
        Err(DataError::Cache(format!("invalid cache key segment '{seg}'")))
    }
}

// ── Entry I/O ───────────────────────────────────────────────────────

fn read_entry(dir: &Path) -> Result<Option<NormalizedDataset>> {
    if !dir.exists() {
        return Ok(None);
    }
    let attrs_path = dir.join(ATTRS_FILE);
    let data_path = dir.join(DATA_FILE);
    if !attrs_path.exists() {
        return Err(DataError::Cache(format!(
            "{} has no consolidated metadata",
            dir.display()
        )));
    }

    let stored: StoredAttrs = serde_json::from_slice(&fs::read(&attrs_path)?)
        .map_err(|e| DataError::Cache(format!("attrs unreadable: {e}")))?;
    let bytes = fs::read(&data_path)?;
    if sha256_hex(&bytes) != stored.data_sha256 {
        return Err(DataError::Cache("data does not match metadata".into()));
    }

    let df = ParquetReader::new(Cursor::new(bytes))
        .finish()
        .map_err(|e| DataError::Parquet(format!("read: {e}")))?;
    if df.height() != stored.rows {
        return Err(DataError::Cache(format!(
            "row count {} != {}",
            df.height(),
            stored.rows
        )));
    }
    let (t, daily, mask) = dataframe_to_columns(&df)?;
    Ok(Some(NormalizedDataset {
        t,
        daily,
        mask,
        attrs: stored.attrs,
    }))
}

fn write_entry(dir: &Path, ds: &NormalizedDataset) -> Result<()> {
    fs::create_dir_all(dir)?;

    let mut df = columns_to_dataframe(ds)?;
    let mut buf = Vec::new();
    ParquetWriter::new(&mut buf)
        .finish(&mut df)
        .map_err(|e| DataError::Parquet(format!("write: {e}")))?;

    let stored = StoredAttrs {
        attrs: ds.attrs.clone(),
        rows: ds.len(),
        data_sha256: sha256_hex(&buf),
    };
    let attrs_json = serde_json::to_vec_pretty(&stored)?;

    replace_file(&dir.join(DATA_FILE), &buf)?;
    replace_file(&dir.join(ATTRS_FILE), &attrs_json)?;
    Ok(())
}

/// Write to a temp name unique to this writer, then rename over `path`.
fn replace_file(path: &Path, bytes: &[u8]) -> Result<()> {
    let nonce: u64 = rand::random();
    let file_name = path
        .file_name()
        .and_then(|s| s.to_str())
        .unwrap_or("entry");
    let tmp = path.with_file_name(format!(".{file_name}.{}.{nonce:016x}.tmp", std::process::id()));
    fs::write(&tmp, bytes)?;
    fs::rename(&tmp, path).map_err(|e| {
        let _ = fs::remove_file(&tmp);
        DataError::Cache(format!("atomic rename failed: {e}"))
    })
}

fn sha256_hex(bytes: &[u8]) -> String {
    let digest = Sha256::digest(bytes);
    digest.iter().map(|b| format!("{b:02x}")).collect()
}

fn epoch() -> NaiveDate {
    NaiveDate::from_ymd_opt(1970, 1, 1).unwrap_or_default()
}

fn columns_to_dataframe(ds: &NormalizedDataset) -> Result<DataFrame> {
    let base = epoch();
    let t: Vec<i32> = ds.t.iter().map(|d| (*d - base).num_days() as i32).collect();
    DataFrame::new(vec![
        Column::new("t".into(), t),
        Column::new("daily".into(), ds.daily.clone()),
        Column::new("mask".into(), ds.mask.clone()),
    ])
    .map_err(|e| DataError::Parquet(format!("dataframe creation: {e}")))
}

fn dataframe_to_columns(df: &DataFrame) -> Result<(Vec<NaiveDate>, Vec<f64>, Vec<bool>)> {
    let map_err = |e: PolarsError| DataError::Parquet(format!("column read: {e}"));

    let t_ca = df.column("t").map_err(map_err)?.i32().map_err(map_err)?;
    let daily_ca = df.column("daily").map_err(map_err)?.f64().map_err(map_err)?;
    let mask_ca = df.column("mask").map_err(map_err)?.bool().map_err(map_err)?;

    let base = epoch();
    let n = df.height();
    let mut t = Vec::with_capacity(n);
    let mut daily = Vec::with_capacity(n);
    let mut mask = Vec::with_capacity(n);
    for i in 0..n {
        let days = t_ca
            .get(i)
            .ok_or_else(|| DataError::Parquet(format!("null t at row {i}")))?;
        t.push(base + chrono::Duration::days(days as i64));
        daily.push(
            daily_ca
                .get(i)
                .ok_or_else(|| DataError::Parquet(format!("null daily at row {i}")))?,
        );
        mask.push(mask_ca.get(i).unwrap_or(false));
    }
    Ok((t, daily, mask))
}
