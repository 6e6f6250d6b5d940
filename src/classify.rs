//! Document shape classification.
//!
//! Historically the dataset tree mixed bare arrays, wrapped objects, index
//! files, and reference tables, and every script re-inspected the shape on
//! its own. This module is the single place that decision lives: one total
//! function producing a closed enumeration of document kinds.

use serde_json::Value;
use std::path::Path;

/// File base names holding brand/chain/manufacturer dictionaries.
const META_FILES: [&str; 3] = ["brands.json", "chains.json", "manufacturers.json"];

/// File base names holding aggregate rollups.
const SUMMARY_FILES: [&str; 1] = ["STATEWIDE_SUMMARY.json"];

/// File base names that are dataset directories.
const INDEX_FILES: [&str; 1] = ["index.json"];

/// The closed set of document shapes the pipeline recognizes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocKind {
    /// Opaque reference table; excluded from normalization and validation.
    Meta,
    /// Aggregate rollup; excluded from normalization and validation.
    Summary,
    /// Directory of dataset files for one state/trade scope.
    Index,
    /// A collection of branch records (bare array or wrapped object).
    BranchDataset,
    /// Anything else; skipped and reported.
    Unknown,
}

/// Classify a parsed document. Total over any JSON value; never panics.
pub fn classify(path: &Path, doc: &Value) -> DocKind {
    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_default();

    if META_FILES.contains(&file_name.as_str()) {
        return DocKind::Meta;
    }

    if SUMMARY_FILES.contains(&file_name.as_str()) {
        return DocKind::Summary;
    }

    let is_index_shaped = match doc {
        Value::Object(map) => {
            map.contains_key("metros")
                || map.get("type").and_then(Value::as_str) == Some("index")
        }
        _ => false,
    };
    if INDEX_FILES.contains(&file_name.as_str()) || is_index_shaped {
        return DocKind::Index;
    }

    match doc {
        Value::Array(_) => DocKind::BranchDataset,
        Value::Object(map) if map.contains_key("branches") => DocKind::BranchDataset,
        _ => DocKind::Unknown,
    }
}

/// Number of branch records a document holds, regardless of wrapper shape.
pub fn count_branches(doc: &Value) -> usize {
    match doc {
        Value::Array(items) => items.len(),
        Value::Object(map) => map
            .get("branches")
            .and_then(Value::as_array)
            .map(|b| b.len())
            .unwrap_or(0),
        _ => 0,
    }
}
