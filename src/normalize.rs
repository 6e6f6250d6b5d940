//! Canonicalization of branch and dataset documents.
//!
//! The field normalizer is a pure function from any legacy or canonical
//! branch shape to the canonical [`Branch`]. Merge order for every field is
//! canonical nested value, then legacy flat value, then computed default —
//! a more specific existing value is never overwritten by a less specific
//! legacy one. Re-normalizing canonical input is a no-op (idempotence is
//! part of the contract and tested below).
//!
//! The dataset normalizer wraps that over a whole classified dataset and
//! synthesizes the envelope (version, area, scope, audit) from explicit
//! fields, legacy flat fields, path segments, or defaults, in that order.

use anyhow::{bail, Context, Result};
use chrono::NaiveDate;
use serde_json::{Map, Value};
use std::path::Path;

use crate::classify::{self, DocKind};
use crate::config::Config;
use crate::models::{
    Address, Area, Audit, Branch, Brands, Contact, Dataset, Geo, IndexDoc, Scope, Trade,
};
use crate::store;

/// Top-level branch keys the field normalizer consumes. Anything else is
/// carried through in `extra` untouched.
const CONSUMED_BRANCH_KEYS: [&str; 35] = [
    "id",
    "name",
    "chain",
    "operatingName",
    "trades",
    "trade",
    "primaryTrade",
    "address",
    "address1",
    "address2",
    "city",
    "state",
    "postalCode",
    "contact",
    "phone",
    "website",
    "hours",
    "geo",
    "lat",
    "lon",
    "arrivalLat",
    "arrivalLon",
    "arrivalType",
    "coordsStatus",
    "geoPrecision",
    "geoVerifiedDate",
    "geoSource",
    "brands",
    "brandsRep",
    "manufacturersPartsFor",
    "partsFor",
    "tags",
    "notes",
    "sources",
    "verification",
];

/// Envelope keys the dataset normalizer consumes.
const CONSUMED_WRAPPER_KEYS: [&str; 15] = [
    "version",
    "updated",
    "country",
    "state",
    "area",
    "scope",
    "audit",
    "branches",
    "metro",
    "region",
    "trade",
    "auditNotes",
    "auditStatus",
    "verificationMode",
    "notes",
];

/// `map[key]` with JSON null treated as absent.
fn get<'a>(map: &'a Map<String, Value>, key: &str) -> Option<&'a Value> {
    map.get(key).filter(|v| !v.is_null())
}

fn get_str(map: &Map<String, Value>, key: &str) -> Option<String> {
    get(map, key).and_then(Value::as_str).map(str::to_string)
}

fn get_f64(map: &Map<String, Value>, key: &str) -> Option<f64> {
    get(map, key).and_then(Value::as_f64)
}

fn empty_map() -> Map<String, Value> {
    Map::new()
}

/// Normalize one branch record of any historical shape.
pub fn normalize_branch(raw: &Value) -> Result<Branch> {
    let obj = match raw.as_object() {
        Some(obj) => obj,
        None => bail!("branch record is not an object"),
    };

    let nested_address = get(obj, "address").and_then(Value::as_object);
    let nested_contact = get(obj, "contact").and_then(Value::as_object);
    let nested_geo = get(obj, "geo").and_then(Value::as_object);
    let nested_brands = get(obj, "brands").and_then(Value::as_object);

    // A bare-string address is line1 verbatim; city/state/postalCode come
    // from sibling flat fields.
    let address = match get(obj, "address") {
        Some(Value::String(line1)) => Address {
            line1: line1.clone(),
            line2: None,
            city: get_str(obj, "city").unwrap_or_default(),
            state: get_str(obj, "state").unwrap_or_default(),
            postal_code: get_str(obj, "postalCode").unwrap_or_default(),
        },
        _ => {
            let nested = nested_address.cloned().unwrap_or_else(empty_map);
            Address {
                line1: get_str(&nested, "line1")
                    .or_else(|| get_str(obj, "address1"))
                    .unwrap_or_default(),
                line2: get_str(&nested, "line2").or_else(|| get_str(obj, "address2")),
                city: get_str(&nested, "city")
                    .or_else(|| get_str(obj, "city"))
                    .unwrap_or_default(),
                state: get_str(&nested, "state")
                    .or_else(|| get_str(obj, "state"))
                    .unwrap_or_default(),
                postal_code: get_str(&nested, "postalCode")
                    .or_else(|| get_str(obj, "postalCode"))
                    .unwrap_or_default(),
            }
        }
    };

    let nested = nested_contact.cloned().unwrap_or_else(empty_map);
    let contact = Contact {
        phone: get(&nested, "phone").or_else(|| get(obj, "phone")).cloned(),
        website: get(&nested, "website")
            .or_else(|| get(obj, "website"))
            .cloned(),
        hours: get(&nested, "hours").or_else(|| get(obj, "hours")).cloned(),
    };

    let nested = nested_geo.cloned().unwrap_or_else(empty_map);
    let geo = Geo {
        lat: get_f64(&nested, "lat").or_else(|| get_f64(obj, "lat")),
        lon: get_f64(&nested, "lon").or_else(|| get_f64(obj, "lon")),
        arrival_lat: get_f64(&nested, "arrivalLat").or_else(|| get_f64(obj, "arrivalLat")),
        arrival_lon: get_f64(&nested, "arrivalLon").or_else(|| get_f64(obj, "arrivalLon")),
        arrival_type: get_str(&nested, "arrivalType").or_else(|| get_str(obj, "arrivalType")),
        coords_status: get_str(&nested, "coordsStatus").or_else(|| get_str(obj, "coordsStatus")),
        geo_precision: get_str(&nested, "geoPrecision").or_else(|| get_str(obj, "geoPrecision")),
        geo_verified_date: get_str(&nested, "geoVerifiedDate")
            .or_else(|| get_str(obj, "geoVerifiedDate")),
        geo_source: get_str(&nested, "geoSource").or_else(|| get_str(obj, "geoSource")),
    };

    let nested = nested_brands.cloned().unwrap_or_else(empty_map);
    let brands = Brands {
        brands_rep: get(&nested, "brandsRep")
            .or_else(|| get(obj, "brandsRep"))
            .and_then(Value::as_array)
            .cloned()
            .unwrap_or_default(),
        manufacturers_parts_for: get(&nested, "manufacturersPartsFor")
            .or_else(|| get(obj, "manufacturersPartsFor"))
            .or_else(|| get(obj, "partsFor"))
            .and_then(Value::as_array)
            .cloned()
            .unwrap_or_default(),
    };

    // A single-string trade is wrapped, never split on delimiters.
    let trades = match get(obj, "trades").or_else(|| get(obj, "trade")) {
        Some(Value::String(tag)) => vec![tag.clone()],
        Some(Value::Array(tags)) => tags
            .iter()
            .map(|t| match t.as_str() {
                Some(s) => s.to_string(),
                None => t.to_string(),
            })
            .collect(),
        _ => Vec::new(),
    };

    let mut extra = Map::new();
    for (key, value) in obj {
        if !CONSUMED_BRANCH_KEYS.contains(&key.as_str()) {
            extra.insert(key.clone(), value.clone());
        }
    }
    // Unrecognized keys inside the nested groups are hoisted to `extra`
    // rather than silently dropped.
    hoist_unconsumed(&mut extra, nested_address, &["line1", "line2", "city", "state", "postalCode"]);
    hoist_unconsumed(&mut extra, nested_contact, &["phone", "website", "hours"]);
    hoist_unconsumed(
        &mut extra,
        nested_geo,
        &[
            "lat",
            "lon",
            "arrivalLat",
            "arrivalLon",
            "arrivalType",
            "coordsStatus",
            "geoPrecision",
            "geoVerifiedDate",
            "geoSource",
        ],
    );
    hoist_unconsumed(&mut extra, nested_brands, &["brandsRep", "manufacturersPartsFor"]);

    Ok(Branch {
        id: get_str(obj, "id").unwrap_or_default(),
        name: get_str(obj, "name").unwrap_or_default(),
        chain: get_str(obj, "chain"),
        operating_name: get_str(obj, "operatingName"),
        trades,
        // Carried over only if present; the normalizer never invents or
        // removes a primary trade.
        primary_trade: get_str(obj, "primaryTrade"),
        address,
        contact,
        geo,
        brands,
        tags: get(obj, "tags")
            .and_then(Value::as_array)
            .cloned()
            .unwrap_or_default(),
        notes: get_str(obj, "notes").unwrap_or_default(),
        sources: get(obj, "sources")
            .and_then(Value::as_array)
            .cloned()
            .unwrap_or_default(),
        verification: get(obj, "verification")
            .and_then(Value::as_object)
            .cloned()
            .unwrap_or_default(),
        extra,
    })
}

fn hoist_unconsumed(
    extra: &mut Map<String, Value>,
    group: Option<&Map<String, Value>>,
    consumed: &[&str],
) {
    if let Some(group) = group {
        for (key, value) in group {
            if !consumed.contains(&key.as_str()) && !extra.contains_key(key) {
                extra.insert(key.clone(), value.clone());
            }
        }
    }
}

/// Infer `scope.trade` from explicit scope, a trade path segment, a legacy
/// flat field, or the `multi` default.
fn infer_trade(wrapper: &Map<String, Value>, parts: &[String]) -> String {
    if let Some(trade) = get(wrapper, "scope")
        .and_then(Value::as_object)
        .and_then(|s| get_str(s, "trade"))
    {
        return trade;
    }
    if parts.len() >= 3 {
        if let Ok(trade) = parts[2].parse::<Trade>() {
            return trade.as_str().to_string();
        }
    }
    get_str(wrapper, "trade").unwrap_or_else(|| "multi".to_string())
}

fn infer_state(wrapper: &Map<String, Value>, parts: &[String]) -> String {
    get_str(wrapper, "state").unwrap_or_else(|| {
        if parts.len() >= 2 {
            parts[1].to_uppercase()
        } else {
            "US".to_string()
        }
    })
}

fn path_parts(rel_path: &Path) -> Vec<String> {
    rel_path
        .iter()
        .map(|part| part.to_string_lossy().to_string())
        .collect()
}

fn file_stem(rel_path: &Path) -> String {
    rel_path
        .file_stem()
        .map(|stem| stem.to_string_lossy().to_string())
        .unwrap_or_default()
}

/// Normalize one classified branch dataset.
///
/// The branch list is processed in original order and must come out the
/// same length it went in; the caller enforces that invariant before any
/// write happens.
pub fn normalize_dataset(doc: &Value, rel_path: &Path, today: NaiveDate) -> Result<Dataset> {
    let (wrapper, raw_branches): (Map<String, Value>, &Vec<Value>) = match doc {
        Value::Array(items) => (Map::new(), items),
        Value::Object(map) => {
            let branches = match map.get("branches") {
                Some(Value::Array(items)) => items,
                Some(other) => bail!(
                    "'branches' must be an array, found {}",
                    json_type_name(other)
                ),
                None => bail!("dataset object has no 'branches' field"),
            };
            (map.clone(), branches)
        }
        other => bail!("dataset is neither array nor object: {}", json_type_name(other)),
    };

    let parts = path_parts(rel_path);
    let explicit_area = get(&wrapper, "area").and_then(Value::as_object);
    let audit_data = get(&wrapper, "audit")
        .and_then(Value::as_object)
        .cloned()
        .unwrap_or_default();

    let area_kind = explicit_area
        .and_then(|a| get_str(a, "kind"))
        .unwrap_or_else(|| {
            if wrapper.contains_key("metro") {
                "metro".to_string()
            } else {
                "region".to_string()
            }
        });
    let area_id = explicit_area
        .and_then(|a| get_str(a, "id"))
        .unwrap_or_else(|| file_stem(rel_path));
    let area_name = explicit_area
        .and_then(|a| get_str(a, "name"))
        .or_else(|| get_str(&wrapper, "metro"))
        .or_else(|| get_str(&wrapper, "region"))
        .unwrap_or_else(|| "Unknown Area".to_string());

    let audit_notes = get(&audit_data, "notes")
        .or_else(|| get(&wrapper, "auditNotes"))
        .or_else(|| get(&wrapper, "notes"))
        .and_then(Value::as_array)
        .cloned()
        .unwrap_or_default();
    let audit_status = get_str(&audit_data, "status")
        .or_else(|| get_str(&wrapper, "auditStatus"))
        .unwrap_or_else(|| "in_progress".to_string());
    let verification_mode = get(&audit_data, "verificationMode")
        .or_else(|| get(&wrapper, "verificationMode"))
        .cloned();

    let mut branches = Vec::with_capacity(raw_branches.len());
    for (index, raw) in raw_branches.iter().enumerate() {
        let branch = normalize_branch(raw)
            .with_context(|| format!("branch at index {}", index))?;
        branches.push(branch);
    }

    let mut extra = Map::new();
    for (key, value) in &wrapper {
        if !CONSUMED_WRAPPER_KEYS.contains(&key.as_str()) {
            extra.insert(key.clone(), value.clone());
        }
    }

    Ok(Dataset {
        version: get_str(&wrapper, "version").unwrap_or_else(|| "1.0.0".to_string()),
        updated: get_str(&wrapper, "updated")
            .unwrap_or_else(|| today.format("%Y-%m-%d").to_string()),
        country: get_str(&wrapper, "country").unwrap_or_else(|| "US".to_string()),
        state: infer_state(&wrapper, &parts),
        area: Area {
            kind: area_kind,
            id: area_id,
            name: area_name,
        },
        scope: Scope {
            trade: infer_trade(&wrapper, &parts),
        },
        audit: Audit {
            status: audit_status,
            notes: audit_notes,
            verification_mode,
        },
        branches,
        extra,
    })
}

/// Normalize an index document.
pub fn normalize_index(doc: &Value, rel_path: &Path, today: NaiveDate) -> Result<IndexDoc> {
    let wrapper = match doc.as_object() {
        Some(map) => map.clone(),
        None => bail!("index document is not an object"),
    };

    let parts = path_parts(rel_path);
    let entries = get(&wrapper, "metros")
        .or_else(|| get(&wrapper, "entries"))
        .and_then(Value::as_array)
        .cloned()
        .unwrap_or_default();

    let mut extra = Map::new();
    for (key, value) in &wrapper {
        if !["type", "state", "updated", "scope", "trade", "entries", "metros"]
            .contains(&key.as_str())
        {
            extra.insert(key.clone(), value.clone());
        }
    }

    Ok(IndexDoc {
        doc_type: "index".to_string(),
        state: infer_state(&wrapper, &parts),
        updated: get_str(&wrapper, "updated")
            .unwrap_or_else(|| today.format("%Y-%m-%d").to_string()),
        scope: Scope {
            trade: infer_trade(&wrapper, &parts),
        },
        entries,
        extra,
    })
}

fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

/// Counters for one normalization run.
#[derive(Debug, Default)]
pub struct NormalizeStats {
    pub total_files: usize,
    pub branch_datasets: usize,
    pub index_files: usize,
    pub meta_files: usize,
    pub summary_files: usize,
    pub skipped_files: usize,
    pub files_written: usize,
    pub branches_before: usize,
    pub branches_after: usize,
}

/// Run the normalize pass over the whole tree.
///
/// Every file is attempted regardless of earlier failures; per-file errors
/// are collected and the run is clean only if none occurred. A branch-count
/// mismatch aborts the write for that file — persisting a lossy result is
/// the one failure this pass must never produce.
pub fn run_normalize(config: &Config, dry_run: bool, today: NaiveDate) -> Result<bool> {
    let scan = store::scan_tree(config)?;
    let mut stats = NormalizeStats::default();
    let mut errors: Vec<String> = scan.errors;

    stats.total_files = scan.files.len();

    for rel_path in &scan.files {
        let rel = rel_path.display();
        let doc = match store::load(config, rel_path) {
            Ok(doc) => doc,
            Err(err) => {
                errors.push(format!("{}: {:#}", rel, err));
                continue;
            }
        };

        match classify::classify(rel_path, &doc) {
            DocKind::Meta => stats.meta_files += 1,
            DocKind::Summary => stats.summary_files += 1,
            DocKind::Unknown => stats.skipped_files += 1,
            DocKind::Index => {
                stats.index_files += 1;
                match normalize_index(&doc, rel_path, today) {
                    Ok(index) => {
                        if !dry_run {
                            match store::save(config, rel_path, &index) {
                                Ok(true) => {
                                    stats.files_written += 1;
                                    println!("  wrote index: {}", rel);
                                }
                                Ok(false) => {}
                                Err(err) => errors.push(format!("{}: {:#}", rel, err)),
                            }
                        }
                    }
                    Err(err) => errors.push(format!("{}: {:#}", rel, err)),
                }
            }
            DocKind::BranchDataset => {
                stats.branch_datasets += 1;
                let before = classify::count_branches(&doc);
                stats.branches_before += before;

                let dataset = match normalize_dataset(&doc, rel_path, today) {
                    Ok(dataset) => dataset,
                    Err(err) => {
                        errors.push(format!("{}: {:#}", rel, err));
                        continue;
                    }
                };

                let after = dataset.branches.len();
                stats.branches_after += after;
                if before != after {
                    errors.push(format!(
                        "{}: INVARIANT branch count mismatch {} -> {}, write aborted",
                        rel, before, after
                    ));
                    continue;
                }

                if !dry_run {
                    match store::save(config, rel_path, &dataset) {
                        Ok(true) => {
                            stats.files_written += 1;
                            println!("  wrote dataset: {} ({} branches)", rel, after);
                        }
                        Ok(false) => {}
                        Err(err) => errors.push(format!("{}: {:#}", rel, err)),
                    }
                }
            }
        }
    }

    if dry_run {
        println!("normalize (dry-run)");
    } else {
        println!("normalize");
    }
    println!("  files scanned: {}", stats.total_files);
    println!(
        "  datasets: {} ({} branches)",
        stats.branch_datasets, stats.branches_after
    );
    println!("  indexes: {}", stats.index_files);
    println!(
        "  meta: {}, summary: {}, unknown: {}",
        stats.meta_files, stats.summary_files, stats.skipped_files
    );
    if !dry_run {
        println!("  files written: {}", stats.files_written);
    }
    if stats.branches_before == stats.branches_after {
        println!(
            "  branch count verified: {} before, {} after",
            stats.branches_before, stats.branches_after
        );
    }

    for error in &errors {
        eprintln!("error: {}", error);
    }
    if errors.is_empty() {
        println!("ok");
    } else {
        eprintln!("{} file(s) failed", errors.len());
    }

    Ok(errors.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 8, 1).unwrap()
    }

    #[test]
    fn test_legacy_flat_branch() {
        // Flat legacy record with address1/city/state/postalCode and
        // top-level lat/lon.
        let raw = json!({
            "address1": "123 Main St",
            "city": "Denver",
            "state": "CO",
            "postalCode": "80202",
            "lat": 39.7,
            "lon": -104.9
        });
        let branch = normalize_branch(&raw).unwrap();

        assert_eq!(branch.address.line1, "123 Main St");
        assert_eq!(branch.address.line2, None);
        assert_eq!(branch.address.city, "Denver");
        assert_eq!(branch.address.state, "CO");
        assert_eq!(branch.address.postal_code, "80202");
        assert_eq!(branch.geo.lat, Some(39.7));
        assert_eq!(branch.geo.lon, Some(-104.9));
        assert_eq!(branch.geo.arrival_lat, None);
        assert_eq!(branch.geo.coords_status, None);
        assert_eq!(branch.geo.geo_precision, None);
    }

    #[test]
    fn test_string_address_is_line1_verbatim() {
        let raw = json!({
            "address": "456 Elm St, Unit B",
            "city": "Boulder",
            "state": "CO",
            "postalCode": "80301"
        });
        let branch = normalize_branch(&raw).unwrap();
        assert_eq!(branch.address.line1, "456 Elm St, Unit B");
        assert_eq!(branch.address.city, "Boulder");
    }

    #[test]
    fn test_single_string_trade_wrapped_not_split() {
        let raw = json!({"trade": "hvac, plumbing"});
        let branch = normalize_branch(&raw).unwrap();
        assert_eq!(branch.trades, vec!["hvac, plumbing"]);

        let raw = json!({"trades": "hvac"});
        let branch = normalize_branch(&raw).unwrap();
        assert_eq!(branch.trades, vec!["hvac"]);
    }

    #[test]
    fn test_canonical_nested_wins_over_legacy_flat() {
        let raw = json!({
            "address": {"line1": "Canonical Way 1", "city": "Denver", "state": "CO", "postalCode": "80202"},
            "address1": "Legacy St 9",
            "city": "Pueblo",
            "geo": {"lat": 40.0, "lon": -105.0},
            "lat": 1.0,
            "lon": 2.0
        });
        let branch = normalize_branch(&raw).unwrap();
        assert_eq!(branch.address.line1, "Canonical Way 1");
        assert_eq!(branch.address.city, "Denver");
        assert_eq!(branch.geo.lat, Some(40.0));
        assert_eq!(branch.geo.lon, Some(-105.0));
    }

    #[test]
    fn test_primary_trade_never_invented() {
        let raw = json!({"trades": ["hvac", "plumbing"]});
        let branch = normalize_branch(&raw).unwrap();
        assert_eq!(branch.primary_trade, None);

        let raw = json!({"trades": ["hvac"], "primaryTrade": "hvac"});
        let branch = normalize_branch(&raw).unwrap();
        assert_eq!(branch.primary_trade.as_deref(), Some("hvac"));
    }

    #[test]
    fn test_unknown_keys_preserved_in_extra() {
        let raw = json!({
            "name": "A",
            "legacyScore": 7,
            "geo": {"lat": 39.0, "lon": -104.0, "altitude": 1600}
        });
        let branch = normalize_branch(&raw).unwrap();
        assert_eq!(branch.extra.get("legacyScore"), Some(&json!(7)));
        assert_eq!(branch.extra.get("altitude"), Some(&json!(1600)));
    }

    #[test]
    fn test_branch_idempotent() {
        let raw = json!({
            "id": "x1",
            "name": "Example",
            "address1": "1 Main",
            "city": "Denver",
            "state": "CO",
            "postalCode": "80202",
            "trades": ["hvac", "plumbing"],
            "primaryTrade": "hvac",
            "phone": "303-555-0100",
            "lat": 39.7,
            "lon": -104.9,
            "verification": {"addressVerified": true}
        });
        let once = normalize_branch(&raw).unwrap();
        let canonical = serde_json::to_value(&once).unwrap();
        let twice = normalize_branch(&canonical).unwrap();
        assert_eq!(once, twice);
    }

    #[test]
    fn test_bare_array_dataset_with_path_inference() {
        let doc = json!([{"name": "A", "trades": ["hvac"]}]);
        let dataset =
            normalize_dataset(&doc, Path::new("us/co/hvac/denver-metro.json"), today()).unwrap();

        assert_eq!(dataset.state, "CO");
        assert_eq!(dataset.scope.trade, "hvac");
        assert_eq!(dataset.area.kind, "region");
        assert_eq!(dataset.area.id, "denver-metro");
        assert_eq!(dataset.version, "1.0.0");
        assert_eq!(dataset.updated, "2026-08-01");
        assert_eq!(dataset.branches.len(), 1);
    }

    #[test]
    fn test_metro_key_sets_area_kind_and_name() {
        let doc = json!({
            "metro": "Denver Metro",
            "branches": [{"name": "A"}]
        });
        let dataset = normalize_dataset(&doc, Path::new("us/co/denver-metro.json"), today()).unwrap();
        assert_eq!(dataset.area.kind, "metro");
        assert_eq!(dataset.area.name, "Denver Metro");
        assert_eq!(dataset.scope.trade, "multi");
    }

    #[test]
    fn test_dataset_preserves_branch_count_and_order() {
        let doc = json!({
            "branches": [
                {"name": "B", "id": "2"},
                {"name": "A", "id": "1"},
                {"name": "C", "id": "3"}
            ]
        });
        let dataset = normalize_dataset(&doc, Path::new("us/co/x.json"), today()).unwrap();
        let ids: Vec<&str> = dataset.branches.iter().map(|b| b.id.as_str()).collect();
        assert_eq!(ids, vec!["2", "1", "3"]);
    }

    #[test]
    fn test_dataset_idempotent_field_for_field() {
        let doc = json!({
            "metro": "Denver Metro",
            "state": "CO",
            "auditStatus": "complete",
            "branches": [
                {"name": "A", "address1": "1 Main", "city": "Denver",
                 "state": "CO", "postalCode": "80202", "trades": "hvac"}
            ]
        });
        let once = normalize_dataset(&doc, Path::new("us/co/denver-metro.json"), today()).unwrap();
        let canonical = serde_json::to_value(&once).unwrap();
        let twice =
            normalize_dataset(&canonical, Path::new("us/co/denver-metro.json"), today()).unwrap();
        assert_eq!(once, twice);
    }

    #[test]
    fn test_dataset_round_trip_bytes_stable() {
        let doc = json!({
            "branches": [
                {"name": "Café Supply", "address1": "1 Main", "city": "Denver",
                 "state": "CO", "postalCode": "80202", "lat": 39.7, "lon": -104.9}
            ]
        });
        let rel = Path::new("us/co/denver-metro.json");
        let once = normalize_dataset(&doc, rel, today()).unwrap();
        let bytes1 = crate::store::to_canonical_json(&once).unwrap();

        let reparsed: Value = serde_json::from_str(&bytes1).unwrap();
        let twice = normalize_dataset(&reparsed, rel, today()).unwrap();
        let bytes2 = crate::store::to_canonical_json(&twice).unwrap();
        assert_eq!(bytes1, bytes2);
    }

    #[test]
    fn test_branches_wrong_container_is_structural_error() {
        let doc = json!({"branches": "not-an-array"});
        let err = normalize_dataset(&doc, Path::new("us/co/x.json"), today()).unwrap_err();
        assert!(err.to_string().contains("must be an array"));
    }

    #[test]
    fn test_normalize_index_from_metros() {
        let doc = json!({"metros": [{"id": "denver-metro", "name": "Denver Metro", "file": "denver-metro.json"}]});
        let index = normalize_index(&doc, Path::new("us/co/index.json"), today()).unwrap();
        assert_eq!(index.doc_type, "index");
        assert_eq!(index.state, "CO");
        assert_eq!(index.entries.len(), 1);
    }
}
