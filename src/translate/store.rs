//! Persistent translation memory.
//!
//! One file per entry under the translations directory, named by the SHA-256
//! of `"[{from}-{to}]{text}"`. A bounded in-process memo sits in front.

use std::path::{Path, PathBuf};

use sha2::{Digest, Sha256};

use crate::error::Result;
use crate::memo::Memo;

pub struct TranslationStore {
    dir: PathBuf,
    memo: Memo<String, String>,
}

impl TranslationStore {
    pub fn new(dir: impl Into<PathBuf>, memo_cap: usize) -> Self {
        Self {
            dir: dir.into(),
            memo: Memo::permanent(memo_cap),
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn key(text: &str, to: &str, from: Option<&str>) -> String {
        format!("[{}-{to}]{text}", from.unwrap_or("auto"))
    }

    fn path_for(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{}.txt", hash_hex(key)))
    }

    pub async fn get(&self, key: &str) -> Option<String> {
        if let Some(hit) = self.memo.get(&key.to_string()) {
            return Some(hit);
        }
        let bytes = tokio::fs::read(self.path_for(key)).await.ok()?;
        let text = String::from_utf8_lossy(&bytes).into_owned();
        self.memo.insert(key.to_string(), text.clone());
        Some(text)
    }

    pub async fn set(&self, key: &str, value: &str) -> Result<()> {
        self.memo.insert(key.to_string(), value.to_string());
        tokio::fs::create_dir_all(&self.dir).await?;
        let path = self.path_for(key);
        let tmp = path.with_extension(format!("{:016x}.tmp", rand::random::<u64>()));
        tokio::fs::write(&tmp, value.as_bytes()).await?;
        tokio::fs::rename(&tmp, &path).await?;
        Ok(())
    }
}

pub fn hash_hex(s: &str) -> String {
    Sha256::digest(s.as_bytes())
        .iter()
        .map(|b| format!("{b:02x}"))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn survives_a_new_process() {
        let dir = tempfile::tempdir().unwrap();
        let key = TranslationStore::key("Close", "ko", Some("en"));
        assert_eq!(key, "[en-ko]Close");

        TranslationStore::new(dir.path(), 8).set(&key, "종가").await.unwrap();
        let fresh = TranslationStore::new(dir.path(), 8);
        assert_eq!(fresh.get(&key).await.as_deref(), Some("종가"));
        assert_eq!(fresh.get("[en-ko]Open").await, None);
    }

    #[test]
    fn undetected_source_keys_as_auto() {
        assert_eq!(TranslationStore::key("x", "en", None), "[auto-en]x");
    }
}
