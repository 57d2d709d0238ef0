//! Canonical flag data model shared by the sync and evaluation paths.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// How a flag's `value` field must be interpreted. Absent means the value
/// is treated as opaque/generic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FlagType {
    String,
    Number,
    Json,
    Percent,
    Rules,
}

impl FlagType {
    pub fn parse(name: &str) -> Option<Self> {
        match name {
            "string" => Some(Self::String),
            "number" => Some(Self::Number),
            "json" => Some(Self::Json),
            "percent" => Some(Self::Percent),
            "rules" => Some(Self::Rules),
            _ => None,
        }
    }
}

/// The canonical unit of configuration, materialized into Edge Config as a
/// denormalized copy of the Notion row. Read-only at evaluation time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FlagRecord {
    /// Universal kill-switch: when false the flag evaluates to disabled
    /// regardless of `value`/`type`.
    pub enabled: bool,
    /// Serialized even when null, so a stored record always round-trips
    /// with an explicit `value` field.
    #[serde(default)]
    pub value: Value,
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<FlagType>,
}

impl FlagRecord {
    pub fn new(enabled: bool, value: Value, kind: Option<FlagType>) -> Self {
        Self { enabled, value, kind }
    }

    /// Rebuild a record from a legacy bare scalar stored before records
    /// were introduced. A stored object with an `enabled` field is parsed
    /// as a record; anything else becomes `{enabled: truthy(v), value: v,
    /// type: inferred}`.
    pub fn from_stored(stored: &Value) -> Self {
        if let Value::Object(map) = stored {
            if map.contains_key("enabled") {
                if let Ok(record) = serde_json::from_value::<FlagRecord>(stored.clone()) {
                    return record;
                }
            }
        }
        Self {
            enabled: js_truthy(stored),
            value: stored.clone(),
            kind: infer_type(stored),
        }
    }

    /// Classify the record's value into the tagged union used by the
    /// typed accessors.
    pub fn classify(&self) -> FlagValue {
        match self.kind {
            Some(FlagType::Percent) => match self.value.as_f64() {
                Some(n) => FlagValue::Percent(clamp_percent(n)),
                None => FlagValue::Absent,
            },
            Some(FlagType::Rules) => FlagValue::Rules(RuleSet::normalize(&self.value)),
            Some(FlagType::Json) => match coerce_json(&self.value) {
                Some(v) => FlagValue::Json(v),
                None => FlagValue::Absent,
            },
            Some(FlagType::Number) => match coerce_number(&self.value) {
                Some(n) => FlagValue::Number(n),
                None => FlagValue::Absent,
            },
            Some(FlagType::String) => match coerce_string(&self.value) {
                Some(s) => FlagValue::String(s),
                None => FlagValue::Absent,
            },
            None => match &self.value {
                Value::Null => FlagValue::Absent,
                Value::Bool(b) => FlagValue::Bool(*b),
                Value::Number(n) => match n.as_f64() {
                    Some(f) => FlagValue::Number(f),
                    None => FlagValue::Absent,
                },
                Value::String(s) => FlagValue::String(s.clone()),
                v => FlagValue::Json(v.clone()),
            },
        }
    }
}

/// Tagged view of a flag's value after applying its type tag.
#[derive(Debug, Clone, PartialEq)]
pub enum FlagValue {
    Absent,
    Bool(bool),
    Number(f64),
    String(String),
    Json(Value),
    Percent(i64),
    Rules(RuleSet),
}

/// An ordered rule document: first satisfied `if` wins, `else` is an
/// unconditional terminal match, an exhausted list is "no match".
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RuleSet {
    #[serde(default)]
    pub rules: Vec<Rule>,
}

impl RuleSet {
    /// Normalize an arbitrary stored value into a rule set. Malformed or
    /// non-conforming shapes degrade to the empty rule list rather than
    /// erroring; a corrupt rule set must read as "no match".
    pub fn normalize(value: &Value) -> Self {
        serde_json::from_value(value.clone()).unwrap_or_default()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Rule {
    /// Mapping from predicate name to a predicate-specific argument.
    #[serde(rename = "if", default, skip_serializing_if = "Option::is_none")]
    pub when: Option<serde_json::Map<String, Value>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub then: Option<Value>,
    #[serde(rename = "else", default, skip_serializing_if = "Option::is_none")]
    pub otherwise: Option<Value>,
}

/// Request context the rule predicates match against.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EvalContext {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub country: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub query: Option<HashMap<String, String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cookies: Option<HashMap<String, String>>,
}

impl EvalContext {
    pub fn new() -> Self {
        Self::default()
    }
}

/// Clamp a rollout percentage to `[0, 100]`, flooring fractions.
pub fn clamp_percent(n: f64) -> i64 {
    (n.floor() as i64).clamp(0, 100)
}

/// JavaScript-style truthiness, used when synthesizing a record from a
/// legacy bare value: false, 0, NaN, "" and null are falsy.
pub fn js_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().map(|f| f != 0.0 && !f.is_nan()).unwrap_or(true),
        Value::String(s) => !s.is_empty(),
        Value::Array(_) | Value::Object(_) => true,
    }
}

/// Infer a type tag from a bare value. Booleans and nulls stay untagged.
pub fn infer_type(value: &Value) -> Option<FlagType> {
    match value {
        Value::Number(_) => Some(FlagType::Number),
        Value::String(_) => Some(FlagType::String),
        Value::Array(_) | Value::Object(_) => Some(FlagType::Json),
        Value::Bool(_) | Value::Null => None,
    }
}

// ── Permissive coercions for the typed accessors ────────────

pub fn coerce_bool(value: &Value) -> Option<bool> {
    match value {
        Value::Bool(b) => Some(*b),
        Value::String(s) if s == "true" => Some(true),
        Value::String(s) if s == "false" => Some(false),
        _ => None,
    }
}

pub fn coerce_number(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok().filter(|f| f.is_finite()),
        _ => None,
    }
}

pub fn coerce_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        _ => None,
    }
}

pub fn coerce_json(value: &Value) -> Option<Value> {
    match value {
        Value::Object(_) | Value::Array(_) => Some(value.clone()),
        Value::String(s) => serde_json::from_str(s).ok(),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_record_serializes_null_value_and_omits_absent_type() {
        let record = FlagRecord::new(true, Value::Null, None);
        let out = serde_json::to_value(&record).unwrap();
        assert_eq!(out, json!({"enabled": true, "value": null}));
    }

    #[test]
    fn test_record_roundtrip_with_type() {
        let record = FlagRecord::new(true, json!(25), Some(FlagType::Percent));
        let out = serde_json::to_value(&record).unwrap();
        assert_eq!(out, json!({"enabled": true, "value": 25, "type": "percent"}));
        let back: FlagRecord = serde_json::from_value(out).unwrap();
        assert_eq!(back, record);
    }

    #[test]
    fn test_from_stored_record_object() {
        let stored = json!({"enabled": false, "value": "x", "type": "string"});
        let record = FlagRecord::from_stored(&stored);
        assert!(!record.enabled);
        assert_eq!(record.kind, Some(FlagType::String));
    }

    #[test]
    fn test_from_stored_legacy_scalars() {
        let record = FlagRecord::from_stored(&json!(true));
        assert!(record.enabled);
        assert_eq!(record.kind, None);

        let record = FlagRecord::from_stored(&json!("hello"));
        assert!(record.enabled);
        assert_eq!(record.kind, Some(FlagType::String));

        let record = FlagRecord::from_stored(&json!(0));
        assert!(!record.enabled);
        assert_eq!(record.kind, Some(FlagType::Number));

        let record = FlagRecord::from_stored(&json!(""));
        assert!(!record.enabled);
    }

    #[test]
    fn test_normalize_malformed_ruleset_is_empty() {
        assert_eq!(RuleSet::normalize(&json!("garbage")).rules.len(), 0);
        assert_eq!(RuleSet::normalize(&json!({"rules": "nope"})).rules.len(), 0);
        assert_eq!(RuleSet::normalize(&json!(null)).rules.len(), 0);
        assert_eq!(RuleSet::normalize(&json!({})).rules.len(), 0);
    }

    #[test]
    fn test_normalize_wellformed_ruleset() {
        let rs = RuleSet::normalize(&json!({
            "rules": [
                {"if": {"country": "PL"}, "then": true},
                {"else": false}
            ]
        }));
        assert_eq!(rs.rules.len(), 2);
        assert!(rs.rules[0].when.is_some());
        assert_eq!(rs.rules[1].otherwise, Some(json!(false)));
    }

    #[test]
    fn test_coercions() {
        assert_eq!(coerce_bool(&json!("true")), Some(true));
        assert_eq!(coerce_bool(&json!("false")), Some(false));
        assert_eq!(coerce_bool(&json!("yes")), None);
        assert_eq!(coerce_number(&json!("42")), Some(42.0));
        assert_eq!(coerce_number(&json!(1.5)), Some(1.5));
        assert_eq!(coerce_number(&json!("abc")), None);
        assert_eq!(coerce_string(&json!(42)), None);
        assert_eq!(coerce_json(&json!(r#"{"a":1}"#)), Some(json!({"a":1})));
        assert_eq!(coerce_json(&json!("not json")), None);
    }

    #[test]
    fn test_classify_percent_clamps() {
        let record = FlagRecord::new(true, json!(250), Some(FlagType::Percent));
        assert_eq!(record.classify(), FlagValue::Percent(100));
        let record = FlagRecord::new(true, json!(-3), Some(FlagType::Percent));
        assert_eq!(record.classify(), FlagValue::Percent(0));
        let record = FlagRecord::new(true, json!(25.9), Some(FlagType::Percent));
        assert_eq!(record.classify(), FlagValue::Percent(25));
    }
}
