//! Rule-set evaluation against a request context.
//!
//! Predicates are injected as a registry so deployments can replace the
//! permissive defaults with strict matching without touching the engine.

use std::collections::HashMap;
use std::sync::Arc;

use serde_json::Value;

use crate::types::{js_truthy, EvalContext, RuleSet};

/// Result of asking one predicate about one clause entry.
///
/// Only `Match` counts toward a rule's `if` clause; `NoMatch` and
/// `Abstain` both make the rule fall through to the next one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PredicateOutcome {
    Match,
    NoMatch,
    Abstain,
}

/// A predicate: (clause key, clause argument, request context) → outcome.
pub type Predicate = Arc<dyn Fn(&str, &Value, &EvalContext) -> PredicateOutcome + Send + Sync>;

pub type PredicateMap = HashMap<String, Predicate>;

/// The default registry.
///
/// `percent` always abstains here; percentage rollout is handled by the
/// flag evaluator, not as a generic predicate. The remaining defaults only
/// check that the corresponding context field is present; they do not
/// compare against the clause argument. Deployments that need strict
/// equality/prefix matching are expected to inject their own registry.
pub fn default_predicates() -> PredicateMap {
    let mut map: PredicateMap = HashMap::new();
    map.insert("percent".into(), Arc::new(|_, _, _| PredicateOutcome::Abstain));
    map.insert(
        "country".into(),
        Arc::new(|_, _, ctx: &EvalContext| presence(ctx.country.is_some())),
    );
    map.insert(
        "pathPrefix".into(),
        Arc::new(|_, _, ctx: &EvalContext| presence(ctx.path.is_some())),
    );
    map.insert(
        "queryParamEquals".into(),
        Arc::new(|_, _, ctx: &EvalContext| presence(ctx.query.is_some())),
    );
    map.insert(
        "cookieEquals".into(),
        Arc::new(|_, _, ctx: &EvalContext| presence(ctx.cookies.is_some())),
    );
    map
}

fn presence(present: bool) -> PredicateOutcome {
    if present {
        PredicateOutcome::Match
    } else {
        PredicateOutcome::Abstain
    }
}

/// Evaluate a stored rule-set value against a context.
///
/// The value is normalized first; malformed documents degrade to "no
/// match". Rules run strictly in order: the first rule whose `if` clause
/// fully matches returns its `then` (coerced to boolean), a reached
/// `else` is terminal, and an exhausted list is `false`.
pub fn rule_set(
    _key: &str,
    value: &Value,
    context: &EvalContext,
    predicates: Option<&PredicateMap>,
) -> bool {
    let rules = RuleSet::normalize(value);
    let defaults;
    let preds = match predicates {
        Some(p) => p,
        None => {
            defaults = default_predicates();
            &defaults
        }
    };

    for rule in &rules.rules {
        if let Some(clause) = &rule.when {
            if clause_matches(clause, context, preds) {
                return rule.then.as_ref().map(js_truthy).unwrap_or(false);
            }
        }
        if let Some(fallback) = &rule.otherwise {
            return js_truthy(fallback);
        }
    }
    false
}

/// Every clause entry must resolve to `Match`. A clause with zero entries
/// is vacuously true. An unknown predicate name is a non-match for the
/// rule, not an error.
fn clause_matches(
    clause: &serde_json::Map<String, Value>,
    context: &EvalContext,
    preds: &PredicateMap,
) -> bool {
    for (name, arg) in clause {
        let Some(predicate) = preds.get(name) else {
            return false;
        };
        if predicate(name, arg, context) != PredicateOutcome::Match {
            return false;
        }
    }
    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn ctx_with_country(country: &str) -> EvalContext {
        EvalContext {
            country: Some(country.to_string()),
            ..EvalContext::default()
        }
    }

    #[test]
    fn test_terminal_else_true() {
        let value = json!({"rules": [{"else": true}]});
        assert!(rule_set("k", &value, &EvalContext::new(), None));
    }

    #[test]
    fn test_empty_rules_is_false() {
        let value = json!({"rules": []});
        assert!(!rule_set("k", &value, &EvalContext::new(), None));
    }

    #[test]
    fn test_malformed_value_is_false() {
        assert!(!rule_set("k", &json!("garbage"), &EvalContext::new(), None));
        assert!(!rule_set("k", &json!(42), &EvalContext::new(), None));
    }

    #[test]
    fn test_first_match_wins() {
        let value = json!({"rules": [
            {"if": {"country": "PL"}, "then": true},
            {"else": false}
        ]});
        assert!(rule_set("k", &value, &ctx_with_country("PL"), None));
        // Default country predicate only checks presence, so any country matches.
        assert!(rule_set("k", &value, &ctx_with_country("NL"), None));
        // No country in context -> falls through to else.
        assert!(!rule_set("k", &value, &EvalContext::new(), None));
    }

    #[test]
    fn test_empty_if_clause_is_vacuously_true() {
        let value = json!({"rules": [{"if": {}, "then": true}, {"else": false}]});
        assert!(rule_set("k", &value, &EvalContext::new(), None));
    }

    #[test]
    fn test_unknown_predicate_falls_through() {
        let value = json!({"rules": [
            {"if": {"noSuchPredicate": 1}, "then": true},
            {"else": false}
        ]});
        assert!(!rule_set("k", &value, &EvalContext::new(), None));
    }

    #[test]
    fn test_percent_predicate_abstains() {
        let value = json!({"rules": [
            {"if": {"percent": 50}, "then": true},
            {"else": false}
        ]});
        assert!(!rule_set("k", &value, &EvalContext::new(), None));
    }

    #[test]
    fn test_custom_predicates_override_defaults() {
        let mut preds: PredicateMap = HashMap::new();
        preds.insert(
            "country".into(),
            Arc::new(|_, arg: &Value, ctx: &EvalContext| {
                match (&ctx.country, arg.as_str()) {
                    (Some(c), Some(want)) if c == want => PredicateOutcome::Match,
                    _ => PredicateOutcome::NoMatch,
                }
            }),
        );
        let value = json!({"rules": [
            {"if": {"country": "PL"}, "then": true},
            {"else": false}
        ]});
        assert!(rule_set("k", &value, &ctx_with_country("PL"), Some(&preds)));
        assert!(!rule_set("k", &value, &ctx_with_country("NL"), Some(&preds)));
    }

    #[test]
    fn test_then_coerced_to_boolean() {
        let value = json!({"rules": [{"if": {}, "then": "nonempty"}]});
        assert!(rule_set("k", &value, &EvalContext::new(), None));
        let value = json!({"rules": [{"if": {}, "then": 0}]});
        assert!(!rule_set("k", &value, &EvalContext::new(), None));
    }

    #[test]
    fn test_exhausted_without_else_is_false() {
        let value = json!({"rules": [{"if": {"country": "PL"}, "then": true}]});
        assert!(!rule_set("k", &value, &EvalContext::new(), None));
    }
}
