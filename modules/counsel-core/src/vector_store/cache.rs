//! On-disk embedding cache: one `vectors_<key>.json` file per catalog batch.

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::error::{CacheError, CacheResult};
use crate::types::CatalogItem;

pub const CACHE_FILE_PREFIX: &str = "vectors_";
const CACHE_FILE_SUFFIX: &str = ".json";

/// Persisted `{model, items, embeddings}`. The lists are parallel; `model`
/// names the embedding model that produced the vectors.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct CacheEntry {
    #[serde(default)]
    pub model: Option<String>,
    pub items: Vec<CatalogItem>,
    pub embeddings: Vec<Vec<f32>>,
}

#[derive(Serialize)]
struct CacheEntryRef<'a> {
    model: &'a str,
    items: &'a [CatalogItem],
    embeddings: &'a [Vec<f32>],
}

impl CacheEntry {
    /// Reject entries whose lists differ in length or whose vectors are ragged.
    pub fn check(&self) -> CacheResult<()> {
        if self.items.len() != self.embeddings.len() {
            return Err(CacheError::Shape(format!(
                "{} items but {} embeddings",
                self.items.len(),
                self.embeddings.len()
            )));
        }
        if let Some(first) = self.embeddings.first() {
            if self.embeddings.iter().any(|e| e.len() != first.len()) {
                return Err(CacheError::Shape("embeddings have mixed dimensions".into()));
            }
        }
        Ok(())
    }
}

/// Summary of one cache file for `cache info`.
#[derive(Debug, Clone, Serialize)]
pub struct CacheFileInfo {
    pub path: PathBuf,
    pub size_bytes: u64,
    /// `None` when the file could not be parsed.
    pub items: Option<usize>,
    pub model: Option<String>,
}

/// Result of `cache validate`.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ValidationReport {
    pub valid: Vec<PathBuf>,
    pub invalid: Vec<(PathBuf, String)>,
}

impl ValidationReport {
    pub fn is_clean(&self) -> bool {
        self.invalid.is_empty()
    }
}

/// A directory holding cache files.
#[derive(Debug, Clone)]
pub struct CacheDir {
    root: PathBuf,
}

impl CacheDir {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn path_for(&self, key: &str) -> PathBuf {
        self.root
            .join(format!("{CACHE_FILE_PREFIX}{key}{CACHE_FILE_SUFFIX}"))
    }

    /// Read the entry for `key`. `Ok(None)` when no file exists. A file that
    /// is unreadable or malformed, that holds other than `expected_len` items,
    /// or whose vectors came from a model other than `model` is an error.
    pub fn load(
        &self,
        key: &str,
        expected_len: usize,
        model: &str,
    ) -> CacheResult<Option<CacheEntry>> {
        let path = self.path_for(key);
        if !path.exists() {
            return Ok(None);
        }
        let entry = read_entry(&path)?;
        if entry.model.as_deref() != Some(model) {
            return Err(CacheError::ModelMismatch {
                cached: entry.model.unwrap_or_else(|| "<unrecorded>".to_string()),
                expected: model.to_string(),
            });
        }
        if entry.items.len() != expected_len {
            return Err(CacheError::Shape(format!(
                "cached {} items, expected {}",
                entry.items.len(),
                expected_len
            )));
        }
        debug!(path = %path.display(), items = expected_len, "Loaded embedding cache");
        Ok(Some(entry))
    }

    /// Write the entry atomically (temp file then rename).
    pub fn store(
        &self,
        key: &str,
        model: &str,
        items: &[CatalogItem],
        embeddings: &[Vec<f32>],
    ) -> CacheResult<PathBuf> {
        fs::create_dir_all(&self.root)?;
        let path = self.path_for(key);
        let tmp = path.with_extension("json.tmp");
        let bytes = serde_json::to_vec_pretty(&CacheEntryRef {
            model,
            items,
            embeddings,
        })?;
        fs::write(&tmp, bytes)?;
        fs::rename(&tmp, &path)?;
        debug!(path = %path.display(), items = items.len(), "Saved embedding cache");
        Ok(path)
    }

    /// Every `vectors_*.json` file, sorted by name. A missing directory is empty.
    pub fn files(&self) -> CacheResult<Vec<PathBuf>> {
        if !self.root.exists() {
            return Ok(Vec::new());
        }
        let mut files: Vec<PathBuf> = fs::read_dir(&self.root)?
            .filter_map(|entry| entry.ok().map(|e| e.path()))
            .filter(|path| is_cache_file(path))
            .collect();
        files.sort();
        Ok(files)
    }

    pub fn info(&self) -> CacheResult<Vec<CacheFileInfo>> {
        self.files()?
            .into_iter()
            .map(|path| {
                let size_bytes = fs::metadata(&path)?.len();
                let entry = read_entry(&path).ok();
                Ok(CacheFileInfo {
                    path,
                    size_bytes,
                    items: entry.as_ref().map(|e| e.items.len()),
                    model: entry.and_then(|e| e.model),
                })
            })
            .collect()
    }

    /// Delete every cache file. Returns how many were removed.
    pub fn clear(&self) -> CacheResult<usize> {
        let files = self.files()?;
        for path in &files {
            fs::remove_file(path)?;
        }
        info!(removed = files.len(), dir = %self.root.display(), "Cleared embedding cache");
        Ok(files.len())
    }

    pub fn validate(&self) -> CacheResult<ValidationReport> {
        let mut report = ValidationReport::default();
        for path in self.files()? {
            match read_entry(&path) {
                Ok(_) => report.valid.push(path),
                Err(e) => report.invalid.push((path, e.to_string())),
            }
        }
        Ok(report)
    }
}

fn is_cache_file(path: &Path) -> bool {
    path.is_file()
        && path
            .file_name()
            .and_then(|n| n.to_str())
            .is_some_and(|n| n.starts_with(CACHE_FILE_PREFIX) && n.ends_with(CACHE_FILE_SUFFIX))
}

fn read_entry(path: &Path) -> CacheResult<CacheEntry> {
    let bytes = fs::read(path)?;
    let entry: CacheEntry = serde_json::from_slice(&bytes)?;
    entry.check()?;
    Ok(entry)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn item(name: &str) -> CatalogItem {
        json!({"program": name}).as_object().unwrap().clone()
    }

    #[test]
    fn store_then_load() {
        let dir = tempfile::tempdir().unwrap();
        let cache = CacheDir::new(dir.path().join("nested"));
        let items = vec![item("A"), item("B")];
        let embeddings = vec![vec![0.1, 0.2], vec![0.3, 0.4]];

        let path = cache.store("abc", "text-embedding-004", &items, &embeddings).unwrap();
        assert_eq!(path.file_name().unwrap(), "vectors_abc.json");

        let entry = cache.load("abc", 2, "text-embedding-004").unwrap().unwrap();
        assert_eq!(entry.model.as_deref(), Some("text-embedding-004"));
        assert_eq!(entry.items, items);
        assert_eq!(entry.embeddings, embeddings);
    }

    #[test]
    fn vectors_from_another_model_are_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let cache = CacheDir::new(dir.path());
        cache.store("k", "sha256-fallback", &[item("A")], &[vec![1.0]]).unwrap();

        assert!(matches!(
            cache.load("k", 1, "text-embedding-004"),
            Err(CacheError::ModelMismatch { .. })
        ));
    }

    #[test]
    fn entry_without_recorded_model_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let cache = CacheDir::new(dir.path());
        fs::write(
            cache.path_for("old"),
            r#"{"items": [{"program": "A"}], "embeddings": [[1.0]]}"#,
        )
        .unwrap();
        assert!(matches!(
            cache.load("old", 1, "sha256-fallback"),
            Err(CacheError::ModelMismatch { .. })
        ));
    }

    #[test]
    fn missing_file_is_none() {
        let dir = tempfile::tempdir().unwrap();
        assert!(CacheDir::new(dir.path()).load("nope", 1, "m").unwrap().is_none());
    }

    #[test]
    fn length_mismatch_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let cache = CacheDir::new(dir.path());
        fs::write(
            cache.path_for("bad"),
            r#"{"model": "m", "items": [{"program": "A"}], "embeddings": []}"#,
        )
        .unwrap();
        assert!(matches!(cache.load("bad", 1, "m"), Err(CacheError::Shape(_))));
    }

    #[test]
    fn item_count_differing_from_input_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let cache = CacheDir::new(dir.path());
        cache.store("k", "m", &[item("A")], &[vec![1.0]]).unwrap();
        assert!(cache.load("k", 3, "m").is_err());
    }

    #[test]
    fn info_validate_and_clear() {
        let dir = tempfile::tempdir().unwrap();
        let cache = CacheDir::new(dir.path());
        cache.store("good", "m", &[item("A")], &[vec![1.0]]).unwrap();
        fs::write(cache.path_for("broken"), "not json").unwrap();
        fs::write(dir.path().join("unrelated.txt"), "keep me").unwrap();

        let info = cache.info().unwrap();
        assert_eq!(info.len(), 2);
        let good = info.iter().find(|i| i.path.ends_with("vectors_good.json")).unwrap();
        assert_eq!(good.items, Some(1));
        assert_eq!(good.model.as_deref(), Some("m"));
        let broken = info.iter().find(|i| i.path.ends_with("vectors_broken.json")).unwrap();
        assert_eq!(broken.items, None);

        let report = cache.validate().unwrap();
        assert_eq!(report.valid.len(), 1);
        assert_eq!(report.invalid.len(), 1);
        assert!(!report.is_clean());

        assert_eq!(cache.clear().unwrap(), 2);
        assert!(cache.files().unwrap().is_empty());
        assert!(dir.path().join("unrelated.txt").exists());
    }

    #[test]
    fn missing_directory_lists_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let cache = CacheDir::new(dir.path().join("absent"));
        assert!(cache.files().unwrap().is_empty());
        assert_eq!(cache.clear().unwrap(), 0);
    }
}
