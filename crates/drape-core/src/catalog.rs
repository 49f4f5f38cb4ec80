//! Clothing-style catalog: skin-tone bucket → gender → ordered style names.
//!
//! Loaded once from JSON and never mutated. Every miss resolves to the
//! single-entry [`NO_STYLES_FOUND`] list; lookups never fail.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Sentinel entry returned when the catalog has nothing for a key.
pub const NO_STYLES_FOUND: &str = "No recommended clothing styles found";

#[derive(Error, Debug)]
pub enum CatalogError {
    #[error("catalog file not found: {0}")]
    NotFound(String),
    #[error("failed to read catalog {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid catalog JSON: {0}")]
    Parse(#[from] serde_json::Error),
}

/// Immutable two-level style table.
///
/// Bucket keys may be a full label (`"Golden Beige (Medium)"`) or the short
/// name before the parenthesis (`"Golden Beige"`).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StyleCatalog {
    entries: BTreeMap<String, BTreeMap<String, Vec<String>>>,
}

impl StyleCatalog {
    pub fn new(entries: BTreeMap<String, BTreeMap<String, Vec<String>>>) -> Self {
        Self { entries }
    }

    /// A catalog where every lookup falls back to the sentinel.
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn from_json_str(json: &str) -> Result<Self, CatalogError> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn load(path: &Path) -> Result<Self, CatalogError> {
        if !path.exists() {
            return Err(CatalogError::NotFound(path.display().to_string()));
        }
        let json = std::fs::read_to_string(path).map_err(|source| CatalogError::Io {
            path: path.display().to_string(),
            source,
        })?;
        let catalog = Self::from_json_str(&json)?;
        tracing::info!(path = %path.display(), buckets = catalog.len(), "loaded style catalog");
        Ok(catalog)
    }

    /// Load the first candidate that parses. Falls back to an empty catalog
    /// when none do.
    ///
    /// A candidate that exists but fails to read or parse is skipped, not
    /// treated as final: a broken data-dir catalog still lets a later
    /// candidate load.
    pub fn load_first(candidates: &[PathBuf]) -> Self {
        for path in candidates {
            match Self::load(path) {
                Ok(catalog) => return catalog,
                Err(CatalogError::NotFound(_)) => {
                    tracing::debug!(path = %path.display(), "catalog candidate not present");
                }
                Err(e) => {
                    tracing::warn!(path = %path.display(), error = %e, "catalog candidate rejected");
                }
            }
        }
        tracing::warn!(
            candidates = ?candidates,
            "no style catalog loaded; every lookup will return the fallback entry"
        );
        Self::empty()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Number of bucket entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn buckets(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    /// Exact-match resolution. `None` on any miss.
    pub fn resolve(&self, bucket: &str, gender: &str) -> Option<&[String]> {
        let by_gender = self
            .entries
            .get(bucket)
            .or_else(|| short_name(bucket).and_then(|s| self.entries.get(s)))?;
        by_gender.get(gender).map(Vec::as_slice)
    }

    /// Styles for `(bucket, gender)`, or `[NO_STYLES_FOUND]` on a miss.
    pub fn lookup(&self, bucket: &str, gender: &str) -> Vec<String> {
        match self.resolve(bucket, gender) {
            Some(styles) => styles.to_vec(),
            None => {
                tracing::debug!(bucket, gender, "catalog miss");
                vec![NO_STYLES_FOUND.to_string()]
            }
        }
    }
}

/// `"Golden Beige (Medium)"` → `"Golden Beige"`.
fn short_name(bucket: &str) -> Option<&str> {
    bucket.split_once(" (").map(|(name, _)| name)
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"{
        "Golden Beige (Medium)": {
            "Male": ["Olive chinos", "Cream linen shirt"],
            "Female": ["Coral wrap dress"]
        },
        "Ebony": {
            "Female": ["Cobalt blazer", "White silk blouse"]
        }
    }"#;

    fn sample() -> StyleCatalog {
        StyleCatalog::from_json_str(SAMPLE).unwrap()
    }

    fn sentinel() -> Vec<String> {
        vec![NO_STYLES_FOUND.to_string()]
    }

    #[test]
    fn test_lookup_hit_returns_list_verbatim() {
        assert_eq!(
            sample().lookup("Golden Beige (Medium)", "Male"),
            vec!["Olive chinos", "Cream linen shirt"]
        );
    }

    #[test]
    fn test_lookup_short_name_key() {
        assert_eq!(
            sample().lookup("Ebony (Black)", "Female"),
            vec!["Cobalt blazer", "White silk blouse"]
        );
        assert_eq!(sample().lookup("Ebony", "Female").len(), 2);
    }

    #[test]
    fn test_lookup_missing_bucket() {
        assert_eq!(sample().lookup("Tan (Medium-Dark)", "Male"), sentinel());
    }

    #[test]
    fn test_lookup_missing_gender() {
        assert_eq!(sample().lookup("Ebony (Black)", "Male"), sentinel());
    }

    #[test]
    fn test_lookup_unknown_gender_falls_back() {
        assert_eq!(sample().lookup("Golden Beige (Medium)", "Unknown"), sentinel());
    }

    #[test]
    fn test_lookup_is_case_sensitive() {
        assert_eq!(sample().lookup("golden beige (medium)", "male"), sentinel());
    }

    #[test]
    fn test_empty_catalog_always_falls_back() {
        let catalog = StyleCatalog::empty();
        assert!(catalog.is_empty());
        assert_eq!(catalog.lookup("Golden Beige (Medium)", "Male"), sentinel());
        assert!(catalog.resolve("Golden Beige (Medium)", "Male").is_none());
    }

    #[test]
    fn test_from_json_rejects_wrong_shape() {
        let result = StyleCatalog::from_json_str(r#"{"Ebony": ["not", "nested"]}"#);
        assert!(matches!(result, Err(CatalogError::Parse(_))));
    }

    #[test]
    fn test_load_missing_file() {
        let result = StyleCatalog::load(Path::new("/nonexistent/clothing_styles.json"));
        assert!(matches!(result, Err(CatalogError::NotFound(_))));
    }

    #[test]
    fn test_load_first_skips_bad_candidates() {
        let dir = std::env::temp_dir().join(format!("drape-catalog-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        let broken = dir.join("broken.json");
        let good = dir.join("good.json");
        std::fs::write(&broken, "{ not json").unwrap();
        std::fs::write(&good, SAMPLE).unwrap();

        let catalog = StyleCatalog::load_first(&[
            dir.join("missing.json"),
            broken,
            good,
        ]);
        assert_eq!(catalog, sample());
        assert_eq!(catalog.buckets().collect::<Vec<_>>(), vec!["Ebony", "Golden Beige (Medium)"]);

        std::fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn test_load_first_none_is_empty() {
        let catalog = StyleCatalog::load_first(&[PathBuf::from("/nonexistent/a.json")]);
        assert!(catalog.is_empty());
    }
}
