//! Top-level flag decision: kill-switch, percentage rollout, rule sets.

use crate::hash::bucket_percent;
use crate::rules::{rule_set, PredicateMap};
use crate::types::{clamp_percent, js_truthy, EvalContext, FlagRecord, FlagType};

/// Turn a stored flag plus a request context into a boolean decision.
///
/// Absent or disabled flags are always `false`: the kill-switch
/// overrides everything else. An enabled flag with no special type (or a
/// type missing the data it needs, e.g. `percent` without a unit id) is
/// `true`: enabled with no further gating is the default decision.
pub fn evaluate_flag(
    key: &str,
    flag: Option<&FlagRecord>,
    context: &EvalContext,
    unit_id: Option<&str>,
    predicates: Option<&PredicateMap>,
) -> bool {
    let Some(flag) = flag else {
        return false;
    };
    if !flag.enabled {
        return false;
    }

    if flag.kind == Some(FlagType::Percent) {
        if let (Some(percent), Some(unit)) = (flag.value.as_f64(), unit_id) {
            return rollout_percent(key, percent, unit);
        }
    }

    // Truthiness, not just non-null: a falsy rules value (0, "", false)
    // skips rule evaluation entirely and falls through to enabled.
    if flag.kind == Some(FlagType::Rules) && js_truthy(&flag.value) {
        return rule_set(key, &flag.value, context, predicates);
    }

    true
}

/// Stable percentage rollout: a unit is in the cohort when its bucket for
/// this key falls below the clamped percentage.
///
/// Because a unit's bucket never changes, raising the percentage only
/// ever adds units to the cohort.
pub fn rollout_percent(key: &str, percent: f64, unit_id: &str) -> bool {
    let p = clamp_percent(percent);
    if p <= 0 {
        return false;
    }
    if p >= 100 {
        return true;
    }
    (bucket_percent(key, unit_id) as i64) < p
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{json, Value};

    fn flag(enabled: bool, value: Value, kind: Option<FlagType>) -> FlagRecord {
        FlagRecord::new(enabled, value, kind)
    }

    #[test]
    fn test_absent_flag_is_false() {
        assert!(!evaluate_flag("k", None, &EvalContext::new(), None, None));
    }

    #[test]
    fn test_kill_switch_overrides_everything() {
        for record in [
            flag(false, json!(100), Some(FlagType::Percent)),
            flag(false, json!({"rules": [{"else": true}]}), Some(FlagType::Rules)),
            flag(false, json!("x"), None),
        ] {
            assert!(!evaluate_flag("k", Some(&record), &EvalContext::new(), Some("u"), None));
        }
    }

    #[test]
    fn test_enabled_without_type_is_true() {
        let record = flag(true, json!("x"), None);
        assert!(evaluate_flag("k", Some(&record), &EvalContext::new(), None, None));
        let record = flag(true, Value::Null, None);
        assert!(evaluate_flag("k", Some(&record), &EvalContext::new(), None, None));
    }

    #[test]
    fn test_percent_without_unit_id_is_true() {
        let record = flag(true, json!(25), Some(FlagType::Percent));
        assert!(evaluate_flag("k", Some(&record), &EvalContext::new(), None, None));
    }

    #[test]
    fn test_rollout_extremes() {
        for unit in ["a", "b", "user-42"] {
            assert!(!rollout_percent("k", 0.0, unit));
            assert!(!rollout_percent("k", -10.0, unit));
            assert!(rollout_percent("k", 100.0, unit));
            assert!(rollout_percent("k", 250.0, unit));
        }
    }

    #[test]
    fn test_rollout_monotonic() {
        // Once a unit is in the cohort at p1, it stays in for every p2 > p1.
        for i in 0..50 {
            let unit = format!("user-{}", i);
            let mut included = false;
            for p in 0..=100 {
                let now = rollout_percent("mono", p as f64, &unit);
                assert!(!included || now, "unit {} dropped out at {}", unit, p);
                included = now;
            }
            assert!(included);
        }
    }

    #[test]
    fn test_percent_evaluation_deterministic() {
        let record = flag(true, json!(25), Some(FlagType::Percent));
        let first = evaluate_flag("r", Some(&record), &EvalContext::new(), Some("user-42"), None);
        for _ in 0..20 {
            assert_eq!(
                evaluate_flag("r", Some(&record), &EvalContext::new(), Some("user-42"), None),
                first
            );
        }
    }

    #[test]
    fn test_rules_delegation() {
        let record = flag(true, json!({"rules": [{"else": true}]}), Some(FlagType::Rules));
        assert!(evaluate_flag("k", Some(&record), &EvalContext::new(), None, None));
        let record = flag(true, json!({"rules": []}), Some(FlagType::Rules));
        assert!(!evaluate_flag("k", Some(&record), &EvalContext::new(), None, None));
    }

    #[test]
    fn test_rules_with_null_value_defaults_true() {
        let record = flag(true, Value::Null, Some(FlagType::Rules));
        assert!(evaluate_flag("k", Some(&record), &EvalContext::new(), None, None));
    }

    #[test]
    fn test_rules_with_falsy_value_defaults_true() {
        for value in [json!(0), json!(""), json!(false)] {
            let record = flag(true, value, Some(FlagType::Rules));
            assert!(evaluate_flag("k", Some(&record), &EvalContext::new(), None, None));
        }
    }
}
