//! Scorecard domain types.
//!
//! A scorecard is an ordered set of weighted characteristics, each binned
//! into attributes with good/bad population counts. WOE, IV and points are
//! derived from those counts by `creditflow-core`; they are never stored.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

// ---------------------------------------------------------------------------
// Scorecard
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Scorecard {
    pub id: Uuid,
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub base_score: f64,
    /// Points to double the odds.
    pub pdo: f64,
    pub base_odds: f64,
    pub status: ScorecardStatus,
    /// Ordered by `Characteristic::order`.
    #[serde(default)]
    pub characteristics: Vec<Characteristic>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

pub const DEFAULT_BASE_SCORE: f64 = 600.0;
pub const DEFAULT_PDO: f64 = 20.0;
pub const DEFAULT_BASE_ODDS: f64 = 50.0;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScorecardStatus {
    #[default]
    Active,
    Inactive,
}

impl fmt::Display for ScorecardStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ScorecardStatus::Active => write!(f, "active"),
            ScorecardStatus::Inactive => write!(f, "inactive"),
        }
    }
}

impl FromStr for ScorecardStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "active" => Ok(ScorecardStatus::Active),
            "inactive" => Ok(ScorecardStatus::Inactive),
            other => Err(format!("invalid scorecard status: '{other}'")),
        }
    }
}

/// A scored variable (e.g. "income").
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Characteristic {
    pub id: Uuid,
    pub scorecard_id: Uuid,
    pub name: String,
    #[serde(default)]
    pub description: String,
    /// Percentage scaling of this characteristic's points. Non-negative.
    pub weight: f64,
    /// Display and evaluation order within the scorecard.
    #[serde(default)]
    pub order: i64,
    #[serde(default)]
    pub attributes: Vec<Attribute>,
}

// ---------------------------------------------------------------------------
// Attributes (bins)
// ---------------------------------------------------------------------------

/// One bin of a characteristic.
///
/// On the wire a bin is either `min_value`/`max_value` or `category`; a
/// payload carrying both (or neither) is rejected.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawAttribute", into = "RawAttribute")]
pub struct Attribute {
    pub id: Uuid,
    pub characteristic_id: Uuid,
    pub label: String,
    pub bin: AttributeBin,
    pub counts: BinCounts,
}

/// Matching rule for an attribute.
#[derive(Debug, Clone, PartialEq)]
pub enum AttributeBin {
    /// Half-open numeric interval `[min, max)`.
    Range { min: f64, max: f64 },
    /// Exact category label.
    Category(String),
}

/// Population counts used for WOE. `total_good`/`total_bad` are the
/// reference population totals used as denominators.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BinCounts {
    #[serde(default)]
    pub good_count: u64,
    #[serde(default)]
    pub bad_count: u64,
    #[serde(default = "default_total")]
    pub total_good: u64,
    #[serde(default = "default_total")]
    pub total_bad: u64,
}

fn default_total() -> u64 {
    1
}

impl Default for BinCounts {
    fn default() -> Self {
        Self {
            good_count: 0,
            bad_count: 0,
            total_good: default_total(),
            total_bad: default_total(),
        }
    }
}

/// Bin fields as they appear in payloads.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BinSpec {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_value: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_value: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
}

impl BinSpec {
    /// Resolve into exactly one of range or category.
    pub fn into_bin(self) -> Result<AttributeBin, String> {
        match (self.min_value, self.max_value, self.category) {
            (None, None, Some(category)) => Ok(AttributeBin::Category(category)),
            (Some(min), Some(max), None) => {
                if !(min.is_finite() && max.is_finite()) {
                    return Err("range bounds must be finite".to_string());
                }
                if min >= max {
                    return Err(format!("min_value {min} must be below max_value {max}"));
                }
                Ok(AttributeBin::Range { min, max })
            }
            (_, _, Some(_)) => Err("attribute cannot have both a range and a category".to_string()),
            _ => Err(
                "attribute needs either both min_value and max_value or a category".to_string(),
            ),
        }
    }
}

impl From<AttributeBin> for BinSpec {
    fn from(bin: AttributeBin) -> Self {
        match bin {
            AttributeBin::Range { min, max } => BinSpec {
                min_value: Some(min),
                max_value: Some(max),
                category: None,
            },
            AttributeBin::Category(c) => BinSpec {
                min_value: None,
                max_value: None,
                category: Some(c),
            },
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct RawAttribute {
    id: Uuid,
    characteristic_id: Uuid,
    #[serde(default)]
    label: String,
    #[serde(flatten)]
    bin: BinSpec,
    #[serde(flatten)]
    counts: BinCounts,
}

impl TryFrom<RawAttribute> for Attribute {
    type Error = String;

    fn try_from(raw: RawAttribute) -> Result<Self, Self::Error> {
        Ok(Attribute {
            id: raw.id,
            characteristic_id: raw.characteristic_id,
            label: raw.label,
            bin: raw.bin.into_bin()?,
            counts: raw.counts,
        })
    }
}

impl From<Attribute> for RawAttribute {
    fn from(attr: Attribute) -> Self {
        RawAttribute {
            id: attr.id,
            characteristic_id: attr.characteristic_id,
            label: attr.label,
            bin: attr.bin.into(),
            counts: attr.counts,
        }
    }
}

// ---------------------------------------------------------------------------
// Requests
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateScorecardRequest {
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_score: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pdo: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_odds: Option<f64>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UpdateScorecardRequest {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_score: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pdo: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_odds: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<ScorecardStatus>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateCharacteristicRequest {
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default = "default_weight")]
    pub weight: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub order: Option<i64>,
}

fn default_weight() -> f64 {
    100.0
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateAttributeRequest {
    #[serde(default, alias = "attribute")]
    pub label: String,
    #[serde(flatten)]
    pub bin: BinSpec,
    #[serde(flatten)]
    pub counts: BinCounts,
}

// ---------------------------------------------------------------------------
// Scoring output
// ---------------------------------------------------------------------------

/// Result of scoring one input against a scorecard. Values are unrounded.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoreResult {
    pub scorecard_id: Uuid,
    pub total_score: f64,
    /// Probability of the applicant being bad, in [0, 1].
    pub probability: f64,
    /// Credit grade 1 (best) .. 10 (worst).
    pub grade: u8,
    pub offset: f64,
    pub factor: f64,
    pub breakdown: Vec<CharacteristicScore>,
    /// Information value per characteristic name.
    #[serde(default)]
    pub information_value: BTreeMap<String, f64>,
}

/// Contribution of one characteristic to a score.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CharacteristicScore {
    pub characteristic: String,
    pub observed_value: serde_json::Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub matched_attribute: Option<String>,
    pub woe: f64,
    pub points: f64,
    pub matched: bool,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub warnings: Vec<String>,
}

/// Derived statistics for one attribute, for display.
#[derive(Debug, Clone, Serialize)]
pub struct AttributeMetrics {
    #[serde(flatten)]
    pub attribute: Attribute,
    pub woe: f64,
    pub iv: f64,
    pub points: f64,
    /// True when a zero count forced WOE to 0.
    pub zero_count: bool,
}

/// A characteristic with its attributes' derived statistics.
#[derive(Debug, Clone, Serialize)]
pub struct CharacteristicMetrics {
    pub id: Uuid,
    pub name: String,
    pub weight: f64,
    pub order: i64,
    pub information_value: f64,
    pub attributes: Vec<AttributeMetrics>,
}

/// A labelled observation for automatic binning.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct Sample {
    pub value: f64,
    pub is_good: bool,
}

/// A bin proposed by the binning helpers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BinProposal {
    pub label: String,
    pub min_value: f64,
    pub max_value: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub counts: Option<BinCounts>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub woe: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub iv: Option<f64>,
}
