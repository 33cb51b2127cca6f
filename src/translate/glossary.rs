//! Static phrase overrides loaded from `{from}-{to}.json` files.

use std::collections::HashMap;
use std::fs;
use std::path::Path;

use crate::error::{DataError, Result};

#[derive(Debug, Default, Clone)]
pub struct Glossary {
    // (from, to) → phrase → replacement
    maps: HashMap<(String, String), HashMap<String, String>>,
}

impl Glossary {
    /// Load every `{from}-{to}.json` in `dir`. A missing directory is an empty
    /// glossary; an unreadable or malformed file is an error.
    pub fn load(dir: &Path) -> Result<Self> {
        let mut g = Self::default();
        if !dir.is_dir() {
            tracing::warn!(target: "translate", dir = %dir.display(), "glossary directory missing; no overrides");
            return Ok(g);
        }
        let entries = fs::read_dir(dir)
            .map_err(|e| DataError::Glossary(format!("{}: {e}", dir.display())))?;
        for entry in entries {
            let path = entry?.path();
            if path.extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }
            let Some((from, to)) = path
                .file_stem()
                .and_then(|s| s.to_str())
                .and_then(|s| s.split_once('-'))
            else {
                return Err(DataError::Glossary(format!(
                    "{} is not named {{from}}-{{to}}.json",
                    path.display()
                )));
            };
            let text = fs::read_to_string(&path)
                .map_err(|e| DataError::Glossary(format!("{}: {e}", path.display())))?;
            let map: HashMap<String, String> = serde_json::from_str(&text)
                .map_err(|e| DataError::Glossary(format!("{}: {e}", path.display())))?;
            g.insert(from, to, map);
        }
        tracing::info!(target: "translate", pairs = g.maps.len(), "glossaries loaded");
        Ok(g)
    }

    pub fn insert(&mut self, from: &str, to: &str, map: HashMap<String, String>) {
        let map = map
            .into_iter()
            .map(|(k, v)| (k.trim().to_string(), v))
            .collect();
        self.maps
            .insert((from.to_ascii_lowercase(), to.to_ascii_lowercase()), map);
    }

    /// Exact match on the trimmed phrase. With no `from`, every glossary
    /// targeting `to` is consulted.
    pub fn lookup(&self, text: &str, to: &str, from: Option<&str>) -> Option<&str> {
        let text = text.trim();
        match from {
            Some(from) => self
                .maps
                .get(&(from.to_string(), to.to_string()))
                .and_then(|m| m.get(text))
                .map(String::as_str),
            None => self
                .maps
                .iter()
                .filter(|((_, t), _)| t == to)
                .find_map(|(_, m)| m.get(text))
                .map(String::as_str),
        }
    }

    /// Target languages some glossary covers.
    pub fn targets(&self) -> impl Iterator<Item = &str> {
        self.maps.keys().map(|(_, to)| to.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn loads_pairs_from_directory() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("en-ko.json"), r#"{"Close": "종가"}"#).unwrap();
        fs::write(dir.path().join("README.txt"), "ignored").unwrap();
        let g = Glossary::load(dir.path()).unwrap();
        assert_eq!(g.lookup("  Close ", "ko", Some("en")), Some("종가"));
        assert_eq!(g.lookup("Close", "ko", None), Some("종가"));
        assert_eq!(g.lookup("Close", "ja", None), None);
    }

    #[test]
    fn malformed_file_is_fatal() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("en-ko.json"), "{not json").unwrap();
        assert!(matches!(Glossary::load(dir.path()), Err(DataError::Glossary(_))));
    }

    #[test]
    fn missing_dir_is_empty() {
        let g = Glossary::load(Path::new("/definitely/not/here")).unwrap();
        assert_eq!(g.targets().count(), 0);
    }
}
