//! On-disk document store.
//!
//! Each file is the unit of atomicity: passes do a full scan, then a
//! synchronous load → transform → store cycle per file. The serialization
//! contract is exact — UTF-8, two-space indentation, unescaped non-ASCII,
//! trailing newline — because the same bytes are the round-trip test.

use anyhow::{bail, Context, Result};
use globset::{Glob, GlobSet, GlobSetBuilder};
use serde::Serialize;
use serde_json::Value;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

use crate::config::Config;

/// Result of one tree scan: the candidate files plus any walk errors
/// (unreadable directories and the like). A walk error never hides the
/// rest of the tree.
#[derive(Debug, Default)]
pub struct ScanOutcome {
    pub files: Vec<PathBuf>,
    pub errors: Vec<String>,
}

/// Scan the document tree for candidate JSON files, sorted by relative path
/// for deterministic processing order.
pub fn scan_tree(config: &Config) -> Result<ScanOutcome> {
    let root = &config.data.root;
    if !root.exists() {
        bail!("Data root does not exist: {}", root.display());
    }

    let include_set = build_globset(&config.data.include_globs)?;
    let exclude_set = build_globset(&config.data.exclude_globs)?;

    let mut files = Vec::new();
    let mut errors = Vec::new();
    for entry in WalkDir::new(root) {
        let entry = match entry {
            Ok(entry) => entry,
            Err(err) => {
                errors.push(format!("scan: {}", err));
                continue;
            }
        };
        if !entry.file_type().is_file() {
            continue;
        }

        let path = entry.path();
        let relative = path.strip_prefix(root).unwrap_or(path);
        let rel_str = relative.to_string_lossy().to_string();

        if exclude_set.is_match(&rel_str) {
            continue;
        }
        if !include_set.is_match(&rel_str) {
            continue;
        }

        files.push(relative.to_path_buf());
    }

    files.sort();
    Ok(ScanOutcome { files, errors })
}

/// Load and parse one document. Parse failures are per-file errors; the
/// caller keeps traversing the rest of the tree.
pub fn load(config: &Config, rel_path: &Path) -> Result<Value> {
    let full = config.data.root.join(rel_path);
    let content = std::fs::read_to_string(&full)
        .with_context(|| format!("Failed to read {}", full.display()))?;
    let doc: Value = serde_json::from_str(&content)
        .with_context(|| format!("Invalid JSON in {}", full.display()))?;
    Ok(doc)
}

/// Render a document in the canonical on-disk format.
pub fn to_canonical_json<T: Serialize>(doc: &T) -> Result<String> {
    let mut rendered = serde_json::to_string_pretty(doc)?;
    rendered.push('\n');
    Ok(rendered)
}

/// Write a document back in place, atomically (temp file, then rename).
///
/// Returns `false` without touching the file when the rendered bytes are
/// already identical, so no-op passes leave mtimes alone.
pub fn save<T: Serialize>(config: &Config, rel_path: &Path, doc: &T) -> Result<bool> {
    let rendered = to_canonical_json(doc)?;
    let full = config.data.root.join(rel_path);

    if let Ok(existing) = std::fs::read_to_string(&full) {
        if existing == rendered {
            return Ok(false);
        }
    }

    let tmp = full.with_extension("json.tmp");
    std::fs::write(&tmp, &rendered)
        .with_context(|| format!("Failed to write {}", tmp.display()))?;
    std::fs::rename(&tmp, &full)
        .with_context(|| format!("Failed to replace {}", full.display()))?;
    Ok(true)
}

fn build_globset(patterns: &[String]) -> Result<GlobSet> {
    let mut builder = GlobSetBuilder::new();
    for pattern in patterns {
        builder.add(Glob::new(pattern)?);
    }
    Ok(builder.build()?)
}
