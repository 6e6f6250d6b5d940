//! Canonical record shapes for branch directory documents.
//!
//! These types define the one shape every branch/dataset/index document is
//! migrated to. Struct declaration order is the canonical on-disk key order,
//! so serializing with `serde_json` yields deterministic diffs.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;
use std::str::FromStr;

/// Trade tags a branch can carry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Trade {
    Hvac,
    Plumbing,
    Electrical,
    Filter,
}

impl Trade {
    pub const ALL: [Trade; 4] = [
        Trade::Hvac,
        Trade::Plumbing,
        Trade::Electrical,
        Trade::Filter,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Trade::Hvac => "hvac",
            Trade::Plumbing => "plumbing",
            Trade::Electrical => "electrical",
            Trade::Filter => "filter",
        }
    }
}

impl FromStr for Trade {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "hvac" => Ok(Trade::Hvac),
            "plumbing" => Ok(Trade::Plumbing),
            "electrical" => Ok(Trade::Electrical),
            "filter" => Ok(Trade::Filter),
            _ => Err(()),
        }
    }
}

impl fmt::Display for Trade {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How exactly a coordinate locates a building.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GeoPrecision {
    Storefront,
    Entrance,
    Warehouse,
    Centroid,
}

impl GeoPrecision {
    pub const ALL: [GeoPrecision; 4] = [
        GeoPrecision::Storefront,
        GeoPrecision::Entrance,
        GeoPrecision::Warehouse,
        GeoPrecision::Centroid,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            GeoPrecision::Storefront => "storefront",
            GeoPrecision::Entrance => "entrance",
            GeoPrecision::Warehouse => "warehouse",
            GeoPrecision::Centroid => "centroid",
        }
    }

    /// Arrival type a migrated branch gets for this precision level.
    /// Entrance/centroid coordinates are likely road-snapped, so they map
    /// to `will_call` and get flagged for review.
    pub fn arrival_type(&self) -> ArrivalType {
        match self {
            GeoPrecision::Storefront => ArrivalType::Storefront,
            GeoPrecision::Warehouse => ArrivalType::Warehouse,
            GeoPrecision::Entrance | GeoPrecision::Centroid => ArrivalType::WillCall,
        }
    }
}

impl FromStr for GeoPrecision {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "storefront" => Ok(GeoPrecision::Storefront),
            "entrance" => Ok(GeoPrecision::Entrance),
            "warehouse" => Ok(GeoPrecision::Warehouse),
            "centroid" => Ok(GeoPrecision::Centroid),
            _ => Err(()),
        }
    }
}

/// Kind of navigation arrival point.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArrivalType {
    WillCall,
    Storefront,
    Warehouse,
}

impl ArrivalType {
    pub const ALL: [ArrivalType; 3] = [
        ArrivalType::WillCall,
        ArrivalType::Storefront,
        ArrivalType::Warehouse,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ArrivalType::WillCall => "will_call",
            ArrivalType::Storefront => "storefront",
            ArrivalType::Warehouse => "warehouse",
        }
    }
}

impl FromStr for ArrivalType {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "will_call" => Ok(ArrivalType::WillCall),
            "storefront" => Ok(ArrivalType::Storefront),
            "warehouse" => Ok(ArrivalType::Warehouse),
            _ => Err(()),
        }
    }
}

/// One physical branch location.
///
/// Field values stay as loosely-typed strings/maps on purpose: the
/// normalizer must be total over historically-inconsistent input and must
/// never drop information, so enum closure and required-field contracts are
/// enforced by the validator, not by deserialization.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Branch {
    pub id: String,
    pub name: String,
    pub chain: Option<String>,
    #[serde(rename = "operatingName", skip_serializing_if = "Option::is_none")]
    pub operating_name: Option<String>,
    pub trades: Vec<String>,
    #[serde(rename = "primaryTrade", skip_serializing_if = "Option::is_none")]
    pub primary_trade: Option<String>,
    pub address: Address,
    pub contact: Contact,
    pub geo: Geo,
    pub brands: Brands,
    pub tags: Vec<Value>,
    pub notes: String,
    pub sources: Vec<Value>,
    pub verification: Map<String, Value>,
    /// Legacy keys the normalizer did not consume. Kept so a rewrite is
    /// never information-narrowing relative to the shape it replaces.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Address {
    pub line1: String,
    pub line2: Option<String>,
    pub city: String,
    pub state: String,
    #[serde(rename = "postalCode")]
    pub postal_code: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Contact {
    pub phone: Option<Value>,
    pub website: Option<Value>,
    pub hours: Option<Value>,
}

/// Display coordinates plus the optional precision/provenance and
/// navigation-arrival blocks. Arrival coordinates default to the display
/// coordinates at migration time but have an independent lifecycle.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Geo {
    pub lat: Option<f64>,
    pub lon: Option<f64>,
    #[serde(rename = "arrivalLat")]
    pub arrival_lat: Option<f64>,
    #[serde(rename = "arrivalLon")]
    pub arrival_lon: Option<f64>,
    #[serde(rename = "arrivalType")]
    pub arrival_type: Option<String>,
    #[serde(rename = "coordsStatus")]
    pub coords_status: Option<String>,
    #[serde(rename = "geoPrecision")]
    pub geo_precision: Option<String>,
    #[serde(rename = "geoVerifiedDate")]
    pub geo_verified_date: Option<String>,
    #[serde(rename = "geoSource")]
    pub geo_source: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Brands {
    #[serde(rename = "brandsRep")]
    pub brands_rep: Vec<Value>,
    #[serde(rename = "manufacturersPartsFor")]
    pub manufacturers_parts_for: Vec<Value>,
}

/// One area/trade-scoped dataset document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Dataset {
    pub version: String,
    pub updated: String,
    pub country: String,
    pub state: String,
    pub area: Area,
    pub scope: Scope,
    pub audit: Audit,
    pub branches: Vec<Branch>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Area {
    /// `metro`, `region`, `statewide`, or `custom`.
    pub kind: String,
    pub id: String,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Scope {
    /// A trade tag, or `multi` for mixed-trade datasets.
    pub trade: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Audit {
    pub status: String,
    pub notes: Vec<Value>,
    #[serde(rename = "verificationMode")]
    pub verification_mode: Option<Value>,
}

/// Directory of dataset files for one state/trade scope.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexDoc {
    #[serde(rename = "type")]
    pub doc_type: String,
    pub state: String,
    pub updated: String,
    pub scope: Scope,
    pub entries: Vec<Value>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_trade_round_trip() {
        for trade in Trade::ALL {
            assert_eq!(trade.as_str().parse::<Trade>().unwrap(), trade);
        }
        assert!("roofing".parse::<Trade>().is_err());
    }

    #[test]
    fn test_arrival_type_round_trip() {
        for arrival in ArrivalType::ALL {
            assert_eq!(arrival.as_str().parse::<ArrivalType>().unwrap(), arrival);
        }
        assert!("rooftop".parse::<ArrivalType>().is_err());
    }

    #[test]
    fn test_precision_arrival_mapping() {
        assert_eq!(
            GeoPrecision::Storefront.arrival_type().as_str(),
            "storefront"
        );
        assert_eq!(GeoPrecision::Warehouse.arrival_type().as_str(), "warehouse");
        assert_eq!(GeoPrecision::Entrance.arrival_type().as_str(), "will_call");
        assert_eq!(GeoPrecision::Centroid.arrival_type().as_str(), "will_call");
    }

    #[test]
    fn test_branch_key_order_and_optionals() {
        let branch = Branch {
            id: "b1".to_string(),
            name: "Example Supply".to_string(),
            chain: None,
            operating_name: None,
            trades: vec!["hvac".to_string()],
            primary_trade: None,
            address: Address {
                line1: "1 Main St".to_string(),
                line2: None,
                city: "Denver".to_string(),
                state: "CO".to_string(),
                postal_code: "80202".to_string(),
            },
            contact: Contact::default(),
            geo: Geo::default(),
            brands: Brands::default(),
            tags: vec![],
            notes: String::new(),
            sources: vec![],
            verification: Map::new(),
            extra: Map::new(),
        };

        let json = serde_json::to_string(&branch).unwrap();
        // Absent-if-missing fields stay out; nullable fields serialize as null.
        assert!(!json.contains("operatingName"));
        assert!(!json.contains("primaryTrade"));
        assert!(json.contains("\"chain\":null"));
        assert!(json.contains("\"line2\":null"));
        // id leads, verification trails (before any extras).
        assert!(json.starts_with("{\"id\""));
        assert!(json.find("\"trades\"").unwrap() < json.find("\"address\"").unwrap());
    }
}
