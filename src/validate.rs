//! Read-only schema validation.
//!
//! Certifies every branch against three independent rule categories:
//! trade-primary consistency, geolocation-precision completeness, and
//! address-verification completeness. All three run on every branch with no
//! short-circuit. The validator never mutates a document — violations are
//! fixed by a corrective enrichment pass or a manual edit, never here.

use anyhow::Result;
use chrono::{Datelike, NaiveDate};
use serde_json::{Map, Value};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use crate::classify::{self, DocKind};
use crate::config::Config;
use crate::models::{ArrivalType, GeoPrecision};
use crate::store;

/// Arrival coordinates further than this from the display coordinates
/// (~1 km in degrees) are suspicious enough to flag.
const ARRIVAL_DIVERGENCE_DEGREES: f64 = 0.01;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    Error,
    Warning,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum RuleCategory {
    PrimaryTrade,
    GeoPrecision,
    AddressVerification,
    /// Unparsable document or wrong container type — fatal for the file.
    Structure,
}

impl RuleCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            RuleCategory::PrimaryTrade => "PRIMARY_TRADE",
            RuleCategory::GeoPrecision => "GEO_PRECISION",
            RuleCategory::AddressVerification => "ADDRESS_VERIFICATION",
            RuleCategory::Structure => "STRUCTURE",
        }
    }
}

/// One validation result line.
#[derive(Debug, Clone)]
pub struct Finding {
    pub file: String,
    pub branch_id: String,
    pub branch_name: String,
    pub category: RuleCategory,
    pub severity: Severity,
    pub message: String,
}

impl fmt::Display for Finding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[{}] {} ({}): {}",
            self.file, self.branch_name, self.branch_id, self.message
        )
    }
}

#[derive(Debug, Default)]
pub struct ValidationStats {
    pub total_files: usize,
    pub total_branches: usize,
    pub multi_trade_branches: usize,
    pub single_trade_branches: usize,
    pub branches_with_geo_metadata: usize,
    pub branches_with_address_verification: usize,
}

/// Accumulates findings and aggregate statistics over a validation run.
pub struct Validator<'a> {
    config: &'a Config,
    today: NaiveDate,
    pub findings: Vec<Finding>,
    pub stats: ValidationStats,
}

impl<'a> Validator<'a> {
    pub fn new(config: &'a Config, today: NaiveDate) -> Self {
        Self {
            config,
            today,
            findings: Vec::new(),
            stats: ValidationStats::default(),
        }
    }

    pub fn errors(&self) -> impl Iterator<Item = &Finding> {
        self.findings
            .iter()
            .filter(|f| f.severity == Severity::Error)
    }

    pub fn warnings(&self) -> impl Iterator<Item = &Finding> {
        self.findings
            .iter()
            .filter(|f| f.severity == Severity::Warning)
    }

    pub fn is_clean(&self) -> bool {
        self.errors().next().is_none()
    }

    fn push(
        &mut self,
        severity: Severity,
        category: RuleCategory,
        file: &str,
        branch: &Map<String, Value>,
        message: String,
    ) {
        self.findings.push(Finding {
            file: file.to_string(),
            branch_id: str_or(branch, "id", "unknown"),
            branch_name: str_or(branch, "name", "unknown"),
            category,
            severity,
            message,
        });
    }

    pub fn structural_error(&mut self, file: &str, message: String) {
        self.findings.push(Finding {
            file: file.to_string(),
            branch_id: String::new(),
            branch_name: String::new(),
            category: RuleCategory::Structure,
            severity: Severity::Error,
            message,
        });
    }

    /// Validate one branch against all three rule categories.
    pub fn validate_branch(&mut self, file: &str, branch: &Value) {
        let branch = match branch.as_object() {
            Some(obj) => obj,
            None => {
                self.structural_error(file, "branch record is not an object".to_string());
                return;
            }
        };
        self.stats.total_branches += 1;

        self.check_primary_trade(file, branch);
        self.check_geo_precision(file, branch);
        self.check_address_verification(file, branch);
    }

    fn check_primary_trade(&mut self, file: &str, branch: &Map<String, Value>) {
        let trades: Vec<String> = branch
            .get("trades")
            .and_then(Value::as_array)
            .map(|t| {
                t.iter()
                    .filter_map(Value::as_str)
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default();
        let primary = branch
            .get("primaryTrade")
            .and_then(Value::as_str)
            .filter(|s| !s.is_empty());

        if trades.len() > 1 {
            self.stats.multi_trade_branches += 1;
            match primary {
                None => self.push(
                    Severity::Error,
                    RuleCategory::PrimaryTrade,
                    file,
                    branch,
                    format!(
                        "Multi-trade branch missing primaryTrade field. Trades: {:?}",
                        trades
                    ),
                ),
                Some(primary) if !trades.iter().any(|t| t == primary) => self.push(
                    Severity::Error,
                    RuleCategory::PrimaryTrade,
                    file,
                    branch,
                    format!("primaryTrade '{}' not in trades array {:?}", primary, trades),
                ),
                Some(_) => {}
            }
        } else if trades.len() == 1 {
            self.stats.single_trade_branches += 1;
            if let Some(primary) = primary {
                self.push(
                    Severity::Warning,
                    RuleCategory::PrimaryTrade,
                    file,
                    branch,
                    format!(
                        "Single-trade branch should not have primaryTrade field (found: '{}')",
                        primary
                    ),
                );
            }
        } else {
            self.push(
                Severity::Warning,
                RuleCategory::PrimaryTrade,
                file,
                branch,
                "Branch has no trade tags".to_string(),
            );
        }
    }

    fn check_geo_precision(&mut self, file: &str, branch: &Map<String, Value>) {
        let geo = branch
            .get("geo")
            .and_then(Value::as_object)
            .cloned()
            .unwrap_or_default();

        for field in ["geoPrecision", "geoVerifiedDate", "geoSource"] {
            if !geo.contains_key(field) {
                self.push(
                    Severity::Error,
                    RuleCategory::GeoPrecision,
                    file,
                    branch,
                    format!("Missing required geo.{} field", field),
                );
            }
        }

        if let Some(precision) = geo.get("geoPrecision") {
            match precision.as_str().and_then(|s| s.parse::<GeoPrecision>().ok()) {
                Some(_) => self.stats.branches_with_geo_metadata += 1,
                None => {
                    let allowed: Vec<&str> =
                        GeoPrecision::ALL.iter().map(|p| p.as_str()).collect();
                    self.push(
                        Severity::Error,
                        RuleCategory::GeoPrecision,
                        file,
                        branch,
                        format!(
                            "Invalid geoPrecision {}. Must be one of: {:?}",
                            precision, allowed
                        ),
                    );
                }
            }
        }

        if let Some(date) = geo.get("geoVerifiedDate") {
            self.check_date_field(file, branch, RuleCategory::GeoPrecision, "geoVerifiedDate", date);
        }

        if let Some(source) = geo.get("geoSource") {
            let long_enough = source
                .as_str()
                .map(|s| s.chars().count() >= 3)
                .unwrap_or(false);
            if !long_enough {
                self.push(
                    Severity::Error,
                    RuleCategory::GeoPrecision,
                    file,
                    branch,
                    "geoSource must be a non-empty string (minimum 3 characters)".to_string(),
                );
            }
        }

        // Bounding-box check is a heuristic, never an error.
        let bounds = &self.config.bounds;
        if let (Some(lat), Some(lon)) = (
            geo.get("lat").and_then(Value::as_f64),
            geo.get("lon").and_then(Value::as_f64),
        ) {
            if lat < bounds.lat_min || lat > bounds.lat_max {
                self.push(
                    Severity::Warning,
                    RuleCategory::GeoPrecision,
                    file,
                    branch,
                    format!(
                        "Latitude {} may be outside expected bounds ({} to {})",
                        lat, bounds.lat_min, bounds.lat_max
                    ),
                );
            }
            if lon < bounds.lon_min || lon > bounds.lon_max {
                self.push(
                    Severity::Warning,
                    RuleCategory::GeoPrecision,
                    file,
                    branch,
                    format!(
                        "Longitude {} may be outside expected bounds ({} to {})",
                        lon, bounds.lon_min, bounds.lon_max
                    ),
                );
            }
        }

        // The arrival block is optional, but a present value must honor its
        // contract.
        if let Some(arrival_type) = geo.get("arrivalType").filter(|v| !v.is_null()) {
            let valid = arrival_type
                .as_str()
                .map(|s| s.parse::<ArrivalType>().is_ok())
                .unwrap_or(false);
            if !valid {
                let allowed: Vec<&str> = ArrivalType::ALL.iter().map(|t| t.as_str()).collect();
                self.push(
                    Severity::Error,
                    RuleCategory::GeoPrecision,
                    file,
                    branch,
                    format!(
                        "Invalid arrivalType {}. Must be one of: {:?}",
                        arrival_type, allowed
                    ),
                );
            }
        }

        if let (Some(arrival_lat), Some(arrival_lon)) = (
            geo.get("arrivalLat").and_then(Value::as_f64),
            geo.get("arrivalLon").and_then(Value::as_f64),
        ) {
            if arrival_lat < bounds.lat_min || arrival_lat > bounds.lat_max {
                self.push(
                    Severity::Warning,
                    RuleCategory::GeoPrecision,
                    file,
                    branch,
                    format!(
                        "arrivalLat {} may be outside expected bounds ({} to {})",
                        arrival_lat, bounds.lat_min, bounds.lat_max
                    ),
                );
            }
            if arrival_lon < bounds.lon_min || arrival_lon > bounds.lon_max {
                self.push(
                    Severity::Warning,
                    RuleCategory::GeoPrecision,
                    file,
                    branch,
                    format!(
                        "arrivalLon {} may be outside expected bounds ({} to {})",
                        arrival_lon, bounds.lon_min, bounds.lon_max
                    ),
                );
            }
            if let (Some(lat), Some(lon)) = (
                geo.get("lat").and_then(Value::as_f64),
                geo.get("lon").and_then(Value::as_f64),
            ) {
                let distance =
                    ((lat - arrival_lat).powi(2) + (lon - arrival_lon).powi(2)).sqrt();
                if distance > ARRIVAL_DIVERGENCE_DEGREES {
                    self.push(
                        Severity::Warning,
                        RuleCategory::GeoPrecision,
                        file,
                        branch,
                        format!(
                            "Arrival coordinates are {:.6}° from display coordinates - verify this is intentional",
                            distance
                        ),
                    );
                }
            }
        }
    }

    fn check_address_verification(&mut self, file: &str, branch: &Map<String, Value>) {
        let verification = branch
            .get("verification")
            .and_then(Value::as_object)
            .cloned()
            .unwrap_or_default();

        // Address existence is safety-critical for routing, so this rule set
        // holds a stricter bar than the geolocation one.
        for field in [
            "addressVerified",
            "addressSource",
            "addressVerifiedDate",
            "storefront_confirmed",
            "sources",
            "coords_verified",
            "geocoding_method",
        ] {
            if !verification.contains_key(field) {
                self.push(
                    Severity::Error,
                    RuleCategory::AddressVerification,
                    file,
                    branch,
                    format!("Missing required verification.{} field", field),
                );
            }
        }

        if let Some(verified) = verification.get("addressVerified") {
            if verified == &Value::Bool(true) {
                self.stats.branches_with_address_verification += 1;
            } else {
                self.push(
                    Severity::Error,
                    RuleCategory::AddressVerification,
                    file,
                    branch,
                    "addressVerified must be true for production-ready branches".to_string(),
                );
            }
        }

        if let Some(sources) = verification.get("sources") {
            let non_empty = sources.as_array().map(|s| !s.is_empty()).unwrap_or(false);
            if !non_empty {
                self.push(
                    Severity::Error,
                    RuleCategory::AddressVerification,
                    file,
                    branch,
                    "verification.sources must be a non-empty array".to_string(),
                );
            }
        }

        if let Some(source) = verification.get("addressSource") {
            match source.as_str() {
                Some(source) => {
                    let lowered = source.to_lowercase();
                    let authoritative = self
                        .config
                        .validation
                        .authoritative_keywords
                        .iter()
                        .any(|k| lowered.contains(k.as_str()));
                    if !authoritative {
                        self.push(
                            Severity::Warning,
                            RuleCategory::AddressVerification,
                            file,
                            branch,
                            format!("addressSource may not be authoritative: '{}'", source),
                        );
                    }
                }
                None => self.push(
                    Severity::Error,
                    RuleCategory::AddressVerification,
                    file,
                    branch,
                    "addressSource must be a string".to_string(),
                ),
            }
        }

        for field in ["addressVerifiedDate", "storefront_confirmed", "coords_verified"] {
            if let Some(date) = verification.get(field) {
                self.check_date_field(file, branch, RuleCategory::AddressVerification, field, date);
            }
        }

        if let Some(sources) = branch.get("sources").and_then(Value::as_array) {
            let mut seen = BTreeSet::new();
            for source in sources.iter().filter_map(Value::as_str) {
                if !seen.insert(source) {
                    self.push(
                        Severity::Warning,
                        RuleCategory::AddressVerification,
                        file,
                        branch,
                        format!("Duplicate entry in sources: '{}'", source),
                    );
                }
            }
        }

        let address = branch
            .get("address")
            .and_then(Value::as_object)
            .cloned()
            .unwrap_or_default();
        for field in ["line1", "city", "state", "postalCode"] {
            let present = address
                .get(field)
                .and_then(Value::as_str)
                .map(|s| !s.is_empty())
                .unwrap_or(false);
            if !present {
                self.push(
                    Severity::Error,
                    RuleCategory::AddressVerification,
                    file,
                    branch,
                    format!("Missing required address.{} field", field),
                );
            }
        }
    }

    fn check_date_field(
        &mut self,
        file: &str,
        branch: &Map<String, Value>,
        category: RuleCategory,
        field: &str,
        value: &Value,
    ) {
        if value.is_null() {
            self.push(
                Severity::Error,
                category,
                file,
                branch,
                format!("{} cannot be null", field),
            );
            return;
        }

        let parsed = value
            .as_str()
            .and_then(|s| NaiveDate::parse_from_str(s, "%Y-%m-%d").ok());
        let date = match parsed {
            Some(date) => date,
            None => {
                self.push(
                    Severity::Error,
                    category,
                    file,
                    branch,
                    format!("Invalid {} {}. Must be YYYY-MM-DD format", field, value),
                );
                return;
            }
        };

        if date > self.today {
            self.push(
                Severity::Error,
                category,
                file,
                branch,
                format!("{} '{}' is in the future", field, date),
            );
        }

        match category {
            RuleCategory::GeoPrecision => {
                if date.year() < self.config.validation.epoch_year {
                    self.push(
                        Severity::Warning,
                        category,
                        file,
                        branch,
                        format!(
                            "{} '{}' is older than {}",
                            field, date, self.config.validation.epoch_year
                        ),
                    );
                }
            }
            _ => {
                if (self.today - date).num_days() > self.config.validation.stale_after_days {
                    self.push(
                        Severity::Warning,
                        category,
                        file,
                        branch,
                        format!("{} '{}' is older than 2 years - may need re-verification", field, date),
                    );
                }
            }
        }
    }
}

fn str_or(map: &Map<String, Value>, key: &str, fallback: &str) -> String {
    map.get(key)
        .and_then(Value::as_str)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .unwrap_or_else(|| fallback.to_string())
}

fn branches_of(doc: &Value) -> &[Value] {
    match doc {
        Value::Array(items) => items,
        Value::Object(map) => map
            .get("branches")
            .and_then(Value::as_array)
            .map(|b| b.as_slice())
            .unwrap_or(&[]),
        _ => &[],
    }
}

/// Run the validation pass over the whole tree and print the report.
pub fn run_validate(config: &Config, today: NaiveDate) -> Result<bool> {
    let scan = store::scan_tree(config)?;
    let mut validator = Validator::new(config, today);
    for error in &scan.errors {
        validator.structural_error("scan", error.clone());
    }

    for rel_path in &scan.files {
        let rel = rel_path.display().to_string();
        let doc = match store::load(config, rel_path) {
            Ok(doc) => doc,
            Err(err) => {
                validator.structural_error(&rel, format!("{:#}", err));
                continue;
            }
        };

        match classify::classify(rel_path, &doc) {
            DocKind::BranchDataset => {
                validator.stats.total_files += 1;
                for branch in branches_of(&doc) {
                    validator.validate_branch(&rel, branch);
                }
            }
            // Reference tables, rollups, and indexes are out of scope.
            DocKind::Meta | DocKind::Summary | DocKind::Index | DocKind::Unknown => {}
        }
    }

    print_report(&validator);
    Ok(validator.is_clean())
}

fn print_report(validator: &Validator<'_>) {
    let stats = &validator.stats;
    println!("validate");
    println!("  files validated:     {}", stats.total_files);
    println!("  total branches:      {}", stats.total_branches);
    println!("  multi-trade:         {}", stats.multi_trade_branches);
    println!("  single-trade:        {}", stats.single_trade_branches);
    println!("  with geo metadata:   {}", stats.branches_with_geo_metadata);
    println!(
        "  with addr verified:  {}",
        stats.branches_with_address_verification
    );

    let error_count = validator.errors().count();
    let warning_count = validator.warnings().count();

    if error_count > 0 {
        let mut by_category: BTreeMap<RuleCategory, Vec<&Finding>> = BTreeMap::new();
        for finding in validator.errors() {
            by_category.entry(finding.category).or_default().push(finding);
        }

        println!();
        println!("errors ({}):", error_count);
        for (category, findings) in &by_category {
            println!("  {} ({}):", category.as_str(), findings.len());
            for finding in findings.iter().take(10) {
                println!("    {}", finding);
            }
            if findings.len() > 10 {
                println!("    ... and {} more", findings.len() - 10);
            }
        }
    }

    if warning_count > 0 {
        println!();
        println!("warnings ({}):", warning_count);
        for finding in validator.warnings().take(20) {
            println!("  [{}] {}", finding.category.as_str(), finding);
        }
        if warning_count > 20 {
            println!("  ... and {} more", warning_count - 20);
        }
    }

    println!();
    if error_count == 0 {
        println!("ok - all branches comply with the enforced schemas");
    } else {
        println!("validation failed with {} error(s)", error_count);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 8, 1).unwrap()
    }

    fn validate_one(branch: Value) -> (Vec<Finding>, Vec<Finding>) {
        let config = Config::minimal("data");
        let mut validator = Validator::new(&config, today());
        validator.validate_branch("us/co/test.json", &branch);
        let errors = validator.errors().cloned().collect();
        let warnings = validator.warnings().cloned().collect();
        (errors, warnings)
    }

    fn compliant_branch() -> Value {
        json!({
            "id": "x1",
            "name": "Example Supply",
            "trades": ["hvac"],
            "address": {
                "line1": "1 Main St", "line2": null, "city": "Denver",
                "state": "CO", "postalCode": "80202"
            },
            "geo": {
                "lat": 39.7, "lon": -104.9,
                "geoPrecision": "storefront",
                "geoVerifiedDate": "2025-06-15",
                "geoSource": "Maps pin"
            },
            "verification": {
                "addressVerified": true,
                "addressSource": "Official Store Locator",
                "addressVerifiedDate": "2025-06-15",
                "storefront_confirmed": "2025-06-15",
                "sources": ["https://example.com/locations"],
                "coords_verified": "2025-06-15",
                "geocoding_method": "Maps pin verified"
            }
        })
    }

    #[test]
    fn test_compliant_branch_is_clean() {
        let (errors, warnings) = validate_one(compliant_branch());
        assert!(errors.is_empty(), "unexpected errors: {:?}", errors);
        assert!(warnings.is_empty(), "unexpected warnings: {:?}", warnings);
    }

    #[test]
    fn test_multi_trade_without_primary_is_one_error() {
        let mut branch = compliant_branch();
        branch["trades"] = json!(["hvac", "plumbing"]);
        let (errors, _) = validate_one(branch);
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].category, RuleCategory::PrimaryTrade);
        assert_eq!(errors[0].severity, Severity::Error);
    }

    #[test]
    fn test_primary_not_member_of_trades() {
        let mut branch = compliant_branch();
        branch["trades"] = json!(["hvac", "plumbing"]);
        branch["primaryTrade"] = json!("electrical");
        let (errors, _) = validate_one(branch);
        assert_eq!(errors.len(), 1);
        assert!(errors[0].message.contains("not in trades"));
    }

    #[test]
    fn test_single_trade_with_primary_is_warning_not_error() {
        let mut branch = compliant_branch();
        branch["primaryTrade"] = json!("hvac");
        let (errors, warnings) = validate_one(branch);
        assert!(errors.is_empty());
        assert_eq!(warnings.len(), 1);
        assert_eq!(warnings[0].category, RuleCategory::PrimaryTrade);
    }

    #[test]
    fn test_geo_precision_enum_closure() {
        let mut branch = compliant_branch();
        branch["geo"]["geoPrecision"] = json!("rooftop");
        let (errors, _) = validate_one(branch);
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].category, RuleCategory::GeoPrecision);
        assert!(errors[0].message.contains("rooftop"));
    }

    #[test]
    fn test_missing_geo_fields_error_each() {
        let mut branch = compliant_branch();
        branch["geo"] = json!({"lat": 39.7, "lon": -104.9});
        let (errors, _) = validate_one(branch);
        let geo_errors: Vec<_> = errors
            .iter()
            .filter(|f| f.category == RuleCategory::GeoPrecision)
            .collect();
        assert_eq!(geo_errors.len(), 3);
    }

    #[test]
    fn test_future_date_is_error() {
        let mut branch = compliant_branch();
        branch["geo"]["geoVerifiedDate"] = json!("2027-01-01");
        let (errors, _) = validate_one(branch);
        assert_eq!(errors.len(), 1);
        assert!(errors[0].message.contains("in the future"));
    }

    #[test]
    fn test_pre_epoch_date_is_warning() {
        let mut branch = compliant_branch();
        branch["geo"]["geoVerifiedDate"] = json!("2018-01-01");
        let (errors, warnings) = validate_one(branch);
        assert!(errors.is_empty());
        assert!(warnings.iter().any(|w| w.message.contains("older than 2020")));
    }

    #[test]
    fn test_invalid_arrival_type_is_error() {
        let mut branch = compliant_branch();
        branch["geo"]["arrivalType"] = json!("rooftop");
        let (errors, _) = validate_one(branch);
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].category, RuleCategory::GeoPrecision);
        assert!(errors[0].message.contains("rooftop"));
    }

    #[test]
    fn test_null_arrival_fields_stay_clean() {
        let mut branch = compliant_branch();
        branch["geo"]["arrivalLat"] = json!(null);
        branch["geo"]["arrivalLon"] = json!(null);
        branch["geo"]["arrivalType"] = json!(null);
        let (errors, warnings) = validate_one(branch);
        assert!(errors.is_empty(), "unexpected errors: {:?}", errors);
        assert!(warnings.is_empty(), "unexpected warnings: {:?}", warnings);
    }

    #[test]
    fn test_arrival_far_from_display_is_warning() {
        let mut branch = compliant_branch();
        branch["geo"]["arrivalLat"] = json!(39.8);
        branch["geo"]["arrivalLon"] = json!(-104.9);
        branch["geo"]["arrivalType"] = json!("storefront");
        let (errors, warnings) = validate_one(branch);
        assert!(errors.is_empty());
        assert!(warnings
            .iter()
            .any(|w| w.message.contains("from display coordinates")));
    }

    #[test]
    fn test_arrival_out_of_bounds_is_warning() {
        let mut branch = compliant_branch();
        branch["geo"]["arrivalLat"] = json!(51.5);
        branch["geo"]["arrivalLon"] = json!(-104.9);
        branch["geo"]["arrivalType"] = json!("storefront");
        let (errors, warnings) = validate_one(branch);
        assert!(errors.is_empty());
        assert!(warnings
            .iter()
            .any(|w| w.message.contains("arrivalLat 51.5 may be outside")));
    }

    #[test]
    fn test_geo_source_length_counts_characters() {
        // Two characters, six bytes: still too short.
        let mut branch = compliant_branch();
        branch["geo"]["geoSource"] = json!("日本");
        let (errors, _) = validate_one(branch);
        assert_eq!(errors.len(), 1);
        assert!(errors[0].message.contains("minimum 3 characters"));

        let mut branch = compliant_branch();
        branch["geo"]["geoSource"] = json!("日本語");
        let (errors, _) = validate_one(branch);
        assert!(errors.is_empty());
    }

    #[test]
    fn test_duplicate_top_level_sources_warn() {
        let mut branch = compliant_branch();
        branch["sources"] = json!(["https://a.com/locations", "https://a.com/locations"]);
        let (errors, warnings) = validate_one(branch);
        assert!(errors.is_empty());
        assert_eq!(
            warnings
                .iter()
                .filter(|w| w.message.contains("Duplicate entry in sources"))
                .count(),
            1
        );
    }

    #[test]
    fn test_unverified_address_is_one_error() {
        let mut branch = compliant_branch();
        branch["verification"]["addressVerified"] = json!(false);
        let (errors, _) = validate_one(branch);
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].category, RuleCategory::AddressVerification);
        assert!(errors[0].message.contains("must be true"));
    }

    #[test]
    fn test_missing_verification_fields_error_each() {
        let mut branch = compliant_branch();
        branch["verification"] = json!({});
        let (errors, _) = validate_one(branch);
        let verification_errors: Vec<_> = errors
            .iter()
            .filter(|f| f.category == RuleCategory::AddressVerification)
            .collect();
        assert_eq!(verification_errors.len(), 7);
    }

    #[test]
    fn test_empty_sources_is_error() {
        let mut branch = compliant_branch();
        branch["verification"]["sources"] = json!([]);
        let (errors, _) = validate_one(branch);
        assert_eq!(errors.len(), 1);
        assert!(errors[0].message.contains("non-empty array"));
    }

    #[test]
    fn test_non_authoritative_source_is_warning() {
        let mut branch = compliant_branch();
        branch["verification"]["addressSource"] = json!("Some directory listing");
        let (errors, warnings) = validate_one(branch);
        assert!(errors.is_empty());
        assert!(warnings
            .iter()
            .any(|w| w.message.contains("may not be authoritative")));
    }

    #[test]
    fn test_stale_verification_is_warning() {
        let mut branch = compliant_branch();
        branch["verification"]["addressVerifiedDate"] = json!("2023-01-01");
        let (errors, warnings) = validate_one(branch);
        assert!(errors.is_empty());
        assert!(warnings
            .iter()
            .any(|w| w.message.contains("may need re-verification")));
    }

    #[test]
    fn test_out_of_bounds_coords_warn_not_error() {
        let mut branch = compliant_branch();
        branch["geo"]["lat"] = json!(51.5);
        branch["geo"]["lon"] = json!(-0.1);
        let (errors, warnings) = validate_one(branch);
        assert!(errors.is_empty());
        assert_eq!(
            warnings
                .iter()
                .filter(|w| w.message.contains("outside expected bounds"))
                .count(),
            2
        );
    }

    #[test]
    fn test_all_categories_evaluated_no_short_circuit() {
        let branch = json!({
            "id": "b", "name": "B",
            "trades": ["hvac", "plumbing"],
            "address": {},
            "geo": {},
            "verification": {}
        });
        let (errors, _) = validate_one(branch);
        let categories: Vec<RuleCategory> = errors.iter().map(|f| f.category).collect();
        assert!(categories.contains(&RuleCategory::PrimaryTrade));
        assert!(categories.contains(&RuleCategory::GeoPrecision));
        assert!(categories.contains(&RuleCategory::AddressVerification));
    }
}
