//! Program catalog loading.
//!
//! Two file shapes are accepted: a bare JSON list of items, or an object with
//! a `programs` list. Curated entries name their fields `program_name` and
//! `key_topics`; those are copied to `program` and `keywords` so the
//! similarity store reads every catalog the same way.

use std::path::Path;

use serde_json::Value;
use tracing::{info, warn};

use crate::error::CatalogError;
use crate::types::CatalogItem;

const BUILTIN_PROGRAMS: &str = include_str!("../data/programs.json");

/// Curated field name -> store field name.
const FIELD_ALIASES: &[(&str, &str)] = &[("program_name", "program"), ("key_topics", "keywords")];

/// Parse a catalog file. I/O, JSON and shape problems are errors.
pub fn load_program_catalog(path: &Path) -> Result<Vec<CatalogItem>, CatalogError> {
    let content = std::fs::read_to_string(path).map_err(|source| CatalogError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let value: Value = serde_json::from_str(&content).map_err(|source| CatalogError::Parse {
        path: path.to_path_buf(),
        source,
    })?;
    let items = items_from_value(value).ok_or_else(|| CatalogError::Shape {
        path: path.to_path_buf(),
    })?;
    info!(path = %path.display(), count = items.len(), "Loaded program catalog");
    Ok(items)
}

/// Catalog from `path` when given and present, else the built-in demo catalog.
pub fn load_or_builtin(path: Option<&Path>) -> Result<Vec<CatalogItem>, CatalogError> {
    match path {
        Some(path) if path.exists() => load_program_catalog(path),
        Some(path) => {
            warn!(path = %path.display(), "Program catalog not found, using built-in programs");
            Ok(builtin_programs())
        }
        None => Ok(builtin_programs()),
    }
}

/// The compiled-in demo catalog (twelve programs across local institutions).
pub fn builtin_programs() -> Vec<CatalogItem> {
    serde_json::from_str::<Value>(BUILTIN_PROGRAMS)
        .ok()
        .and_then(items_from_value)
        .unwrap_or_default()
}

fn items_from_value(value: Value) -> Option<Vec<CatalogItem>> {
    let list = match value {
        Value::Array(list) => list,
        Value::Object(mut obj) => match obj.remove("programs") {
            Some(Value::Array(list)) => list,
            _ => return None,
        },
        _ => return None,
    };

    list.into_iter()
        .map(|entry| match entry {
            Value::Object(item) => Some(normalize(item)),
            _ => None,
        })
        .collect()
}

fn normalize(mut item: CatalogItem) -> CatalogItem {
    for (from, to) in FIELD_ALIASES {
        if !item.contains_key(*to) {
            if let Some(value) = item.get(*from).cloned() {
                item.insert(to.to_string(), value);
            }
        }
    }
    item
}
