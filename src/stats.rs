//! Read-only statistics over the document tree.

use anyhow::Result;
use serde_json::Value;

use crate::classify::{self, DocKind};
use crate::config::Config;
use crate::store;

/// Aggregate counters for one scan of the tree.
#[derive(Debug, Default)]
pub struct TreeStats {
    pub files_scanned: usize,
    pub datasets: usize,
    pub indexes: usize,
    pub meta_files: usize,
    pub summaries: usize,
    pub unknown: usize,
    pub branches: usize,
    pub verified_branches: usize,
    pub branches_with_coords: usize,
    pub branches_with_arrival: usize,
    pub branches_with_geo_precision: usize,
    pub branches_with_sources: usize,
    pub parse_errors: usize,
}

fn has_value(branch: &Value, group: &str, field: &str) -> bool {
    branch
        .get(group)
        .and_then(|g| g.get(field))
        .map(|v| !v.is_null())
        .unwrap_or(false)
}

fn tally_branch(stats: &mut TreeStats, branch: &Value) {
    stats.branches += 1;
    if branch
        .get("verification")
        .and_then(|v| v.get("addressVerified"))
        .and_then(Value::as_bool)
        .unwrap_or(false)
    {
        stats.verified_branches += 1;
    }
    if has_value(branch, "geo", "lat") && has_value(branch, "geo", "lon") {
        stats.branches_with_coords += 1;
    }
    if has_value(branch, "geo", "arrivalLat") && has_value(branch, "geo", "arrivalLon") {
        stats.branches_with_arrival += 1;
    }
    if has_value(branch, "geo", "geoPrecision") {
        stats.branches_with_geo_precision += 1;
    }
    if branch
        .get("sources")
        .and_then(Value::as_array)
        .map(|s| !s.is_empty())
        .unwrap_or(false)
    {
        stats.branches_with_sources += 1;
    }
}

/// Scan the tree and collect counters without modifying anything.
pub fn collect(config: &Config) -> Result<TreeStats> {
    let scan = store::scan_tree(config)?;
    let mut stats = TreeStats::default();
    for error in &scan.errors {
        eprintln!("error: {}", error);
        stats.parse_errors += 1;
    }

    for rel_path in &scan.files {
        stats.files_scanned += 1;
        let doc = match store::load(config, rel_path) {
            Ok(doc) => doc,
            Err(_) => {
                stats.parse_errors += 1;
                continue;
            }
        };

        match classify::classify(rel_path, &doc) {
            DocKind::Meta => stats.meta_files += 1,
            DocKind::Summary => stats.summaries += 1,
            DocKind::Index => stats.indexes += 1,
            DocKind::Unknown => stats.unknown += 1,
            DocKind::BranchDataset => {
                stats.datasets += 1;
                let branches: &[Value] = match &doc {
                    Value::Array(items) => items,
                    Value::Object(map) => map
                        .get("branches")
                        .and_then(Value::as_array)
                        .map(|b| b.as_slice())
                        .unwrap_or(&[]),
                    _ => &[],
                };
                for branch in branches {
                    tally_branch(&mut stats, branch);
                }
            }
        }
    }

    Ok(stats)
}

fn percent(part: usize, whole: usize) -> f64 {
    if whole == 0 {
        0.0
    } else {
        part as f64 * 100.0 / whole as f64
    }
}

/// Collect and print the tree report.
pub fn run_stats(config: &Config) -> Result<bool> {
    let stats = collect(config)?;

    println!("Document tree: {}", config.data.root.display());
    println!("  files scanned:    {}", stats.files_scanned);
    println!("  branch datasets:  {}", stats.datasets);
    println!("  index files:      {}", stats.indexes);
    println!("  meta files:       {}", stats.meta_files);
    println!("  summaries:        {}", stats.summaries);
    if stats.unknown > 0 {
        println!("  unknown shapes:   {}", stats.unknown);
    }
    if stats.parse_errors > 0 {
        println!("  parse errors:     {}", stats.parse_errors);
    }
    println!();
    println!("Branches: {}", stats.branches);
    println!(
        "  address verified: {} ({:.1}%)",
        stats.verified_branches,
        percent(stats.verified_branches, stats.branches)
    );
    println!(
        "  with coordinates: {} ({:.1}%)",
        stats.branches_with_coords,
        percent(stats.branches_with_coords, stats.branches)
    );
    println!(
        "  with arrival:     {} ({:.1}%)",
        stats.branches_with_arrival,
        percent(stats.branches_with_arrival, stats.branches)
    );
    println!(
        "  with precision:   {} ({:.1}%)",
        stats.branches_with_geo_precision,
        percent(stats.branches_with_geo_precision, stats.branches)
    );
    println!(
        "  with sources:     {} ({:.1}%)",
        stats.branches_with_sources,
        percent(stats.branches_with_sources, stats.branches)
    );

    Ok(stats.parse_errors == 0)
}
