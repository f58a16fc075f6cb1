//! Tolerant parsing of model output into typed stage schemas.
//!
//! Language models return JSON whose shape only loosely follows the prompt.
//! Parsing here never fails: missing fields take their defaults, fields of
//! the wrong type are dropped in favour of the default, and anything that is
//! not an object becomes `T::default()`.

use serde::{de::DeserializeOwned, Serialize};
use serde_json::Value;
use tracing::debug;

/// The outcome of a tolerant parse.
#[derive(Debug, Clone, PartialEq)]
pub struct Parsed<T> {
    /// The parsed value.
    pub value: T,
    /// Top-level fields whose incoming value was rejected.
    pub rejected_fields: Vec<String>,
    /// True if the input could not be used at all.
    pub defaulted: bool,
}

impl<T> Parsed<T> {
    /// Returns true if the input deserialized without any repair.
    #[must_use]
    pub fn is_exact(&self) -> bool {
        !self.defaulted && self.rejected_fields.is_empty()
    }
}

/// Parses `value` into `T`, filling defaults instead of failing.
#[must_use]
pub fn tolerant_parse<T>(value: Value) -> T
where
    T: Serialize + DeserializeOwned + Default,
{
    parse_with_report(value).value
}

/// Parses `value` into `T` and reports which fields had to be repaired.
#[must_use]
pub fn parse_with_report<T>(value: Value) -> Parsed<T>
where
    T: Serialize + DeserializeOwned + Default,
{
    if let Ok(exact) = serde_json::from_value::<T>(value.clone()) {
        return Parsed {
            value: exact,
            rejected_fields: Vec::new(),
            defaulted: false,
        };
    }

    let Value::Object(incoming) = value else {
        debug!(kind = json_kind(&value), "Non-object model output, using schema defaults");
        return defaulted();
    };

    let Ok(Value::Object(mut merged)) = serde_json::to_value(T::default()) else {
        return defaulted();
    };

    let mut rejected_fields = Vec::new();
    for (key, field) in incoming {
        let mut candidate = merged.clone();
        candidate.insert(key.clone(), field.clone());
        if serde_json::from_value::<T>(Value::Object(candidate)).is_ok() {
            merged.insert(key, field);
        } else {
            rejected_fields.push(key);
        }
    }

    if !rejected_fields.is_empty() {
        debug!(fields = ?rejected_fields, "Dropped model output fields that did not match the schema");
    }

    match serde_json::from_value::<T>(Value::Object(merged)) {
        Ok(value) => Parsed {
            value,
            rejected_fields,
            defaulted: false,
        },
        Err(_) => defaulted(),
    }
}

/// Parses into `T` and re-serializes, producing a normalized JSON object.
#[must_use]
pub fn normalize<T>(value: Value) -> Value
where
    T: Serialize + DeserializeOwned + Default,
{
    let parsed: T = tolerant_parse(value);
    serde_json::to_value(parsed).unwrap_or(Value::Null)
}

fn defaulted<T: Default>() -> Parsed<T> {
    Parsed {
        value: T::default(),
        rejected_fields: Vec::new(),
        defaulted: true,
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde::Deserialize;

    #[derive(Debug, Default, PartialEq, Serialize, Deserialize)]
    struct Skills {
        skills: Vec<String>,
        years: u32,
        #[serde(default)]
        notes: Option<String>,
    }

    #[test]
    fn test_exact_parse() {
        let parsed: Parsed<Skills> =
            parse_with_report(serde_json::json!({"skills": ["rust"], "years": 3}));
        assert!(parsed.is_exact());
        assert_eq!(parsed.value.skills, vec!["rust".to_string()]);
    }

    #[test]
    fn test_missing_fields_default() {
        let parsed: Parsed<Skills> = parse_with_report(serde_json::json!({"years": 2}));
        assert_eq!(
            parsed.value,
            Skills {
                skills: Vec::new(),
                years: 2,
                notes: None
            }
        );
        assert!(parsed.rejected_fields.is_empty());
        assert!(!parsed.defaulted);
    }

    #[test]
    fn test_wrong_types_are_rejected() {
        let parsed: Parsed<Skills> = parse_with_report(serde_json::json!({
            "skills": "rust, go",
            "years": 4,
            "unknown": true
        }));
        assert_eq!(parsed.value.years, 4);
        assert!(parsed.value.skills.is_empty());
        assert_eq!(parsed.rejected_fields, vec!["skills".to_string()]);
    }

    #[test]
    fn test_non_object_defaults() {
        let parsed: Parsed<Skills> = parse_with_report(serde_json::json!(["not", "an", "object"]));
        assert!(parsed.defaulted);
        assert_eq!(parsed.value, Skills::default());
    }

    #[test]
    fn test_normalize_fills_every_field() {
        let normalized = normalize::<Skills>(serde_json::json!({"skills": ["sql"]}));
        assert_eq!(
            normalized,
            serde_json::json!({"skills": ["sql"], "years": 0, "notes": null})
        );
    }
}
