use anyhow::{Context, Result};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// Top-level configuration loaded from TOML.
///
/// Lookup tables that used to live as ad hoc globals (chain locator URLs,
/// authoritative-source keywords, geographic bounds) are plain config data
/// here, loaded once and passed explicitly into the passes that need them.
#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub data: DataConfig,
    #[serde(default)]
    pub bounds: BoundsConfig,
    #[serde(default)]
    pub validation: ValidationConfig,
    #[serde(default)]
    pub chains: ChainsConfig,
    #[serde(default)]
    pub manufacturers: ManufacturersConfig,
    #[serde(default)]
    pub refinements: Vec<ArrivalRefinement>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DataConfig {
    /// Root of the document tree (country → state → trade → area file).
    pub root: PathBuf,
    #[serde(default = "default_include_globs")]
    pub include_globs: Vec<String>,
    #[serde(default = "default_exclude_globs")]
    pub exclude_globs: Vec<String>,
}

fn default_include_globs() -> Vec<String> {
    vec!["**/*.json".to_string()]
}

fn default_exclude_globs() -> Vec<String> {
    vec!["**/_meta/**".to_string(), "**/_*.json".to_string()]
}

/// Geographic bounding box used as a coordinate sanity check.
/// Out-of-box coordinates are warnings, not errors — the box is a heuristic.
#[derive(Debug, Deserialize, Clone)]
pub struct BoundsConfig {
    #[serde(default = "default_lat_min")]
    pub lat_min: f64,
    #[serde(default = "default_lat_max")]
    pub lat_max: f64,
    #[serde(default = "default_lon_min")]
    pub lon_min: f64,
    #[serde(default = "default_lon_max")]
    pub lon_max: f64,
}

impl Default for BoundsConfig {
    fn default() -> Self {
        Self {
            lat_min: default_lat_min(),
            lat_max: default_lat_max(),
            lon_min: default_lon_min(),
            lon_max: default_lon_max(),
        }
    }
}

fn default_lat_min() -> f64 {
    36.5
}
fn default_lat_max() -> f64 {
    41.5
}
fn default_lon_min() -> f64 {
    -109.5
}
fn default_lon_max() -> f64 {
    -101.5
}

#[derive(Debug, Deserialize, Clone)]
pub struct ValidationConfig {
    /// Verification dates older than this calendar year warn as implausible.
    #[serde(default = "default_epoch_year")]
    pub epoch_year: i32,
    /// Verification dates older than this many days warn as stale.
    #[serde(default = "default_stale_after_days")]
    pub stale_after_days: i64,
    /// Substrings that mark an `addressSource` as authoritative.
    #[serde(default = "default_authoritative_keywords")]
    pub authoritative_keywords: Vec<String>,
    /// Directory-style domains that never count as a company's own site.
    #[serde(default = "default_non_authoritative_domains")]
    pub non_authoritative_domains: Vec<String>,
}

impl Default for ValidationConfig {
    fn default() -> Self {
        Self {
            epoch_year: default_epoch_year(),
            stale_after_days: default_stale_after_days(),
            authoritative_keywords: default_authoritative_keywords(),
            non_authoritative_domains: default_non_authoritative_domains(),
        }
    }
}

fn default_epoch_year() -> i32 {
    2020
}
fn default_stale_after_days() -> i64 {
    730
}
fn default_authoritative_keywords() -> Vec<String> {
    [
        "google business",
        "official",
        "company website",
        "store locator",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect()
}
fn default_non_authoritative_domains() -> Vec<String> {
    [
        "yellowpages",
        "mapquest",
        "manta",
        "alignable",
        "chamberofcommerce",
        "youtube",
        "finduslocal",
        "allpages",
        "thebluebook",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect()
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct ChainsConfig {
    /// Chain name → official store locator URL (or a note that direct
    /// contact is required).
    #[serde(default)]
    pub locators: BTreeMap<String, String>,
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct ManufacturersConfig {
    /// Compound manufacturer name → simplified canonical name, applied to
    /// the brand lists by `brd enrich standardize-brands`.
    #[serde(default)]
    pub synonyms: BTreeMap<String, String>,
}

/// One operator-supplied arrival coordinate override.
///
/// These are applied by `brd enrich arrival-refine` only when the branch's
/// current coordinates still match `old_lat`/`old_lon` within tolerance —
/// there is no automatic geometry here, just recorded manual verification.
#[derive(Debug, Deserialize, Clone)]
pub struct ArrivalRefinement {
    /// Dataset file path relative to the data root.
    pub file: String,
    pub branch_name: String,
    pub address_line1: String,
    pub old_lat: f64,
    pub old_lon: f64,
    pub new_lat: f64,
    pub new_lon: f64,
    pub geo_precision: String,
    pub geo_source: String,
    pub reason: String,
}

impl Config {
    /// Minimal configuration for tests and commands that can run without a
    /// config file on disk.
    pub fn minimal(root: impl Into<PathBuf>) -> Self {
        Self {
            data: DataConfig {
                root: root.into(),
                include_globs: default_include_globs(),
                exclude_globs: default_exclude_globs(),
            },
            bounds: BoundsConfig::default(),
            validation: ValidationConfig::default(),
            chains: ChainsConfig::default(),
            manufacturers: ManufacturersConfig::default(),
            refinements: Vec::new(),
        }
    }
}

pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    let config: Config = toml::from_str(&content).with_context(|| "Failed to parse config file")?;

    if config.data.root.as_os_str().is_empty() {
        anyhow::bail!("data.root must not be empty");
    }

    if config.bounds.lat_min >= config.bounds.lat_max {
        anyhow::bail!("bounds.lat_min must be < bounds.lat_max");
    }
    if config.bounds.lon_min >= config.bounds.lon_max {
        anyhow::bail!("bounds.lon_min must be < bounds.lon_max");
    }

    if config.validation.stale_after_days < 1 {
        anyhow::bail!("validation.stale_after_days must be >= 1");
    }

    for refinement in &config.refinements {
        if refinement.branch_name.is_empty() || refinement.file.is_empty() {
            anyhow::bail!("refinements entries need a file and a branch_name");
        }
        if refinement.geo_precision.parse::<crate::models::GeoPrecision>().is_err() {
            anyhow::bail!(
                "Unknown geo_precision '{}' in refinement for '{}'",
                refinement.geo_precision,
                refinement.branch_name
            );
        }
    }

    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_minimal_defaults() {
        let cfg = Config::minimal("data");
        assert_eq!(cfg.validation.epoch_year, 2020);
        assert_eq!(cfg.validation.stale_after_days, 730);
        assert!(cfg.bounds.lat_min < cfg.bounds.lat_max);
        assert!(cfg.chains.locators.is_empty());
    }

    #[test]
    fn test_parse_with_chain_locators() {
        let toml_src = r#"
            [data]
            root = "branch-directory-data"

            [chains.locators]
            "Baker Distributing" = "https://www.bakerdist.com/locations"

            [manufacturers.synonyms]
            "Mitsubishi Electric" = "Mitsubishi"
            "Lithonia Lighting" = "Lithonia"

            [[refinements]]
            file = "us/co/denver-metro.json"
            branch_name = "Example Supply"
            address_line1 = "1 Main St"
            old_lat = 39.58202
            old_lon = -104.84064
            new_lat = 39.58383
            new_lon = -104.83758
            geo_precision = "storefront"
            geo_source = "Maps pin"
            reason = "Moved off the parkway centerline"
        "#;
        let cfg: Config = toml::from_str(toml_src).unwrap();
        assert_eq!(
            cfg.chains.locators.get("Baker Distributing").unwrap(),
            "https://www.bakerdist.com/locations"
        );
        assert_eq!(cfg.refinements.len(), 1);
        assert_eq!(
            cfg.manufacturers.synonyms.get("Mitsubishi Electric").unwrap(),
            "Mitsubishi"
        );
    }
}
