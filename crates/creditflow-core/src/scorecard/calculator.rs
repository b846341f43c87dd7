//! Score computation: match each characteristic's observed value to an
//! attribute, sum weighted WOE points on top of the scorecard offset.
//!
//! Missing or unmatched inputs never fail scoring. They contribute zero
//! points and carry a warning in the breakdown.

use std::collections::{BTreeMap, HashMap};

use creditflow_types::error::ScorecardError;
use creditflow_types::scorecard::{
    Attribute, AttributeBin, AttributeMetrics, Characteristic, CharacteristicMetrics,
    CharacteristicScore, Scorecard, ScoreResult,
};
use serde_json::{Map, Value};

use super::woe::{Scaling, credit_grade, information_value, weight_of_evidence};

/// Score `input` against `scorecard`, reading each characteristic from the
/// input field of the same name.
pub fn score(scorecard: &Scorecard, input: &Map<String, Value>) -> Result<ScoreResult, ScorecardError> {
    score_with_mapping(scorecard, input, &HashMap::new())
}

/// Score `input`, reading characteristic `c` from `input[mapping[c]]` when a
/// mapping entry exists and from `input[c]` otherwise.
pub fn score_with_mapping(
    scorecard: &Scorecard,
    input: &Map<String, Value>,
    mapping: &HashMap<String, String>,
) -> Result<ScoreResult, ScorecardError> {
    let scaling = Scaling::new(scorecard.base_score, scorecard.pdo, scorecard.base_odds)?;

    let mut breakdown = Vec::with_capacity(scorecard.characteristics.len());
    let mut iv = BTreeMap::new();
    let mut total = scaling.offset;

    for characteristic in ordered(&scorecard.characteristics) {
        let field = mapping
            .get(&characteristic.name)
            .map(String::as_str)
            .unwrap_or(characteristic.name.as_str());
        let entry = score_characteristic(&scaling, characteristic, field, input.get(field));
        total += entry.points;
        breakdown.push(entry);
        iv.insert(
            characteristic.name.clone(),
            characteristic
                .attributes
                .iter()
                .map(|a| information_value(&a.counts))
                .sum(),
        );
    }

    Ok(ScoreResult {
        scorecard_id: scorecard.id,
        total_score: total,
        probability: scaling.probability_of_bad(total),
        grade: credit_grade(total),
        offset: scaling.offset,
        factor: scaling.factor,
        breakdown,
        information_value: iv,
    })
}

fn score_characteristic(
    scaling: &Scaling,
    characteristic: &Characteristic,
    field: &str,
    observed: Option<&Value>,
) -> CharacteristicScore {
    let observed = match observed {
        Some(v) if !v.is_null() => v,
        _ => {
            return CharacteristicScore {
                characteristic: characteristic.name.clone(),
                observed_value: Value::Null,
                matched_attribute: None,
                woe: 0.0,
                points: 0.0,
                matched: false,
                warnings: vec![format!("missing input field '{field}'")],
            };
        }
    };

    let Some(attribute) = characteristic
        .attributes
        .iter()
        .find(|a| matches_attribute(a, observed))
    else {
        return CharacteristicScore {
            characteristic: characteristic.name.clone(),
            observed_value: observed.clone(),
            matched_attribute: None,
            woe: 0.0,
            points: 0.0,
            matched: false,
            warnings: vec![format!("no attribute matched value {observed}")],
        };
    };

    let woe = weight_of_evidence(&attribute.counts);
    let mut warnings = Vec::new();
    if woe.zero_count {
        warnings.push(format!(
            "attribute '{}' has a zero count; WOE set to 0",
            attribute.label
        ));
    }

    CharacteristicScore {
        characteristic: characteristic.name.clone(),
        observed_value: observed.clone(),
        matched_attribute: Some(attribute.label.clone()),
        woe: woe.value,
        points: scaling.points(woe.value, characteristic.weight),
        matched: true,
        warnings,
    }
}

/// Whether an observed value falls into an attribute's bin.
///
/// Ranges are half-open `[min, max)` and accept numbers or numeric strings.
/// Categories compare the value's string form (`3` matches `"3"`).
pub fn matches_attribute(attribute: &Attribute, value: &Value) -> bool {
    match &attribute.bin {
        AttributeBin::Range { min, max } => {
            numeric(value).is_some_and(|v| *min <= v && v < *max)
        }
        AttributeBin::Category(category) => {
            category_form(value).is_some_and(|v| v == *category)
        }
    }
}

fn numeric(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok().filter(|f| f.is_finite()),
        _ => None,
    }
}

fn category_form(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

fn ordered(characteristics: &[Characteristic]) -> Vec<&Characteristic> {
    let mut refs: Vec<&Characteristic> = characteristics.iter().collect();
    refs.sort_by_key(|c| c.order);
    refs
}

/// Derived WOE/IV/points for every attribute, for display.
pub fn describe(scorecard: &Scorecard) -> Result<Vec<CharacteristicMetrics>, ScorecardError> {
    let scaling = Scaling::new(scorecard.base_score, scorecard.pdo, scorecard.base_odds)?;

    Ok(ordered(&scorecard.characteristics)
        .into_iter()
        .map(|c| {
            let attributes: Vec<AttributeMetrics> = c
                .attributes
                .iter()
                .map(|a| {
                    let woe = weight_of_evidence(&a.counts);
                    AttributeMetrics {
                        attribute: a.clone(),
                        woe: woe.value,
                        iv: information_value(&a.counts),
                        points: scaling.points(woe.value, c.weight),
                        zero_count: woe.zero_count,
                    }
                })
                .collect();
            CharacteristicMetrics {
                id: c.id,
                name: c.name.clone(),
                weight: c.weight,
                order: c.order,
                information_value: attributes.iter().map(|a| a.iv).sum(),
                attributes,
            }
        })
        .collect())
}
