//! Severity classification from heterogeneous upstream attributes.
//!
//! Upstream layers name the severity field differently and express it either
//! as label text ("Moderate Impacts") or as a small integer code (1..=5).
//! Unknown or missing attributes classify as [`SeverityCategory::None`].

use serde_json::{Map, Value};

use hazard_common::SeverityCategory;

/// Attribute names checked for a severity value, in order of preference.
/// Matching is case-insensitive.
pub const CATEGORY_KEYS: &[&str] = &[
    "impact",
    "impact_level",
    "category",
    "label",
    "wssi",
    "severity",
    "name",
    "gridcode",
    "dn",
    "value",
];

/// Classify a feature from its properties.
pub fn classify(properties: &Map<String, Value>) -> SeverityCategory {
    for wanted in CATEGORY_KEYS {
        let value = properties
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(wanted))
            .map(|(_, value)| value);

        if let Some(category) = value.and_then(classify_value) {
            return category;
        }
    }
    SeverityCategory::None
}

/// Classify one attribute value; `None` when it carries no category.
pub fn classify_value(value: &Value) -> Option<SeverityCategory> {
    match value {
        Value::Number(n) => n
            .as_i64()
            .or_else(|| n.as_f64().filter(|f| f.fract() == 0.0).map(|f| f as i64))
            .and_then(from_code),
        Value::String(s) => {
            let trimmed = s.trim();
            match trimmed.parse::<i64>() {
                Ok(code) => from_code(code),
                Err(_) => from_label(trimmed),
            }
        }
        _ => None,
    }
}

/// Integer codes 1..=5, lowest to highest severity.
pub fn from_code(code: i64) -> Option<SeverityCategory> {
    match code {
        1..=5 => Some(SeverityCategory::from_priority(code as u8)),
        _ => None,
    }
}

/// Match label text by keyword, most severe first.
pub fn from_label(label: &str) -> Option<SeverityCategory> {
    let label = label.to_ascii_lowercase();
    if label.contains("extreme") {
        Some(SeverityCategory::Extreme)
    } else if label.contains("major") || label.contains("high") {
        Some(SeverityCategory::Major)
    } else if label.contains("moderate") {
        Some(SeverityCategory::Moderate)
    } else if label.contains("minor") {
        Some(SeverityCategory::Minor)
    } else if label.contains("limited") || label.contains("elevated") || label.contains("marginal")
    {
        Some(SeverityCategory::Elevated)
    } else {
        None
    }
}
