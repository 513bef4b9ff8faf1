//! Neutral News Protocol scoring.
//!
//! Four component scores (language, source, framing, context), each in
//! `[0, 3]`, are combined into a single bias intent score with fixed
//! weights. The Predictability Index maps that score onto `[0, 1]`.

use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::Value;

pub const LANGUAGE_WEIGHT: f64 = 0.30;
pub const SOURCE_WEIGHT: f64 = 0.25;
pub const FRAMING_WEIGHT: f64 = 0.25;
pub const CONTEXT_WEIGHT: f64 = 0.20;

pub const MAX_COMPONENT_SCORE: f64 = 3.0;

/// Fallback for a component the model did not score.
pub const DEFAULT_COMPONENT_SCORE: f64 = 1.5;
/// Fallback for a missing model-reported PI.
pub const DEFAULT_PI_SCORE: f64 = 0.5;

static LEADING_FLOAT_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[+-]?(?:Infinity|(?:\d+\.?\d*|\.\d+)(?:[eE][+-]?\d+)?)").unwrap()
});

/// The four bias components, each expected in `[0, 3]`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BiasComponents {
    pub language: f64,
    pub source: f64,
    pub framing: f64,
    pub context: f64,
}

/// Components plus the derived intent score and PI, as stored in the ledger.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BiasScores {
    pub bias_language_score: f64,
    pub bias_source_score: f64,
    pub bias_framing_score: f64,
    pub bias_context_score: f64,
    pub bias_intent_score: f64,
    pub pi_score: f64,
}

impl BiasScores {
    /// Recompute the intent score from the components and pair it with `pi`.
    pub fn new(components: BiasComponents, pi: f64) -> Self {
        Self {
            bias_language_score: components.language,
            bias_source_score: components.source,
            bias_framing_score: components.framing,
            bias_context_score: components.context,
            bias_intent_score: compute_bias_intent_score(components),
            pi_score: pi,
        }
    }

    /// Intent recomputed from the components, PI derived from intent.
    pub fn derived(components: BiasComponents) -> Self {
        let intent = compute_bias_intent_score(components);
        Self {
            bias_language_score: components.language,
            bias_source_score: components.source,
            bias_framing_score: components.framing,
            bias_context_score: components.context,
            bias_intent_score: intent,
            pi_score: predictability_index(intent),
        }
    }
}

pub fn round3(value: f64) -> f64 {
    (value * 1000.0).round() / 1000.0
}

/// Weighted sum of the four components, clamped to `[0, 3]` and rounded to
/// three decimals.
pub fn compute_bias_intent_score(c: BiasComponents) -> f64 {
    let raw = LANGUAGE_WEIGHT * c.language
        + SOURCE_WEIGHT * c.source
        + FRAMING_WEIGHT * c.framing
        + CONTEXT_WEIGHT * c.context;
    round3(raw.clamp(0.0, MAX_COMPONENT_SCORE))
}

/// `1 - bias / 3`, clamped to `[0, 1]` and rounded to three decimals.
pub fn predictability_index(bias_intent: f64) -> f64 {
    round3((1.0 - bias_intent / MAX_COMPONENT_SCORE).clamp(0.0, 1.0))
}

/// Lenient numeric coercion for model output.
///
/// Numbers are taken as-is; strings are read up to the first non-numeric
/// character (`"2.5 (moderate)"` is `2.5`). Anything else yields `fallback`.
/// The result is clamped to `[min, max]`.
pub fn safe_number(value: &Value, fallback: f64, min: f64, max: f64) -> f64 {
    let parsed = match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => parse_leading_float(s),
        _ => None,
    };
    match parsed {
        Some(n) if !n.is_nan() => n.clamp(min, max),
        _ => fallback,
    }
}

/// Component coercion used by the refresh pipeline: non-finite or
/// unparsable values become 0 rather than a midpoint fallback.
pub fn sanitize_component_score(value: &Value) -> f64 {
    let n = match value {
        Value::Number(n) => n.as_f64().unwrap_or(f64::NAN),
        Value::String(s) if s.trim().is_empty() => 0.0,
        Value::String(s) => s.trim().parse::<f64>().unwrap_or(f64::NAN),
        Value::Bool(b) => f64::from(u8::from(*b)),
        Value::Null => 0.0,
        _ => f64::NAN,
    };
    if !n.is_finite() {
        return 0.0;
    }
    round3(n.clamp(0.0, MAX_COMPONENT_SCORE))
}

fn parse_leading_float(s: &str) -> Option<f64> {
    let m = LEADING_FLOAT_RE.find(s.trim_start())?;
    let text = m.as_str();
    match text.trim_start_matches(['+', '-']) {
        "Infinity" if text.starts_with('-') => Some(f64::NEG_INFINITY),
        "Infinity" => Some(f64::INFINITY),
        _ => text.parse::<f64>().ok(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn components(language: f64, source: f64, framing: f64, context: f64) -> BiasComponents {
        BiasComponents {
            language,
            source,
            framing,
            context,
        }
    }

    #[test]
    fn weights_sum_to_one() {
        let sum = LANGUAGE_WEIGHT + SOURCE_WEIGHT + FRAMING_WEIGHT + CONTEXT_WEIGHT;
        assert!((sum - 1.0).abs() < 1e-12);
    }

    #[test]
    fn all_ones_scores_one() {
        assert_eq!(compute_bias_intent_score(components(1.0, 1.0, 1.0, 1.0)), 1.0);
    }

    #[test]
    fn intent_matches_weighted_sum_over_grid() {
        let steps = [0.0, 0.25, 0.7, 1.5, 2.2, 3.0];
        for &l in &steps {
            for &s in &steps {
                for &f in &steps {
                    for &c in &steps {
                        let expected = round3(0.30 * l + 0.25 * s + 0.25 * f + 0.20 * c);
                        let got = compute_bias_intent_score(components(l, s, f, c));
                        assert_eq!(got, expected, "inputs {l} {s} {f} {c}");
                        assert!((0.0..=3.0).contains(&got));
                    }
                }
            }
        }
    }

    #[test]
    fn intent_clamps_out_of_range_inputs() {
        assert_eq!(compute_bias_intent_score(components(9.0, 9.0, 9.0, 9.0)), 3.0);
        assert_eq!(compute_bias_intent_score(components(-4.0, 0.0, 0.0, 0.0)), 0.0);
    }

    #[test]
    fn intent_rounds_to_three_decimals() {
        // 0.30 * 1.2345 = 0.37035
        assert_eq!(compute_bias_intent_score(components(1.2345, 0.0, 0.0, 0.0)), 0.37);
    }

    #[test]
    fn predictability_endpoints() {
        assert_eq!(predictability_index(0.0), 1.0);
        assert_eq!(predictability_index(3.0), 0.0);
        assert_eq!(predictability_index(1.5), 0.5);
    }

    #[test]
    fn predictability_strictly_decreasing() {
        let mut prev = f64::INFINITY;
        for i in 0..=30 {
            let pi = predictability_index(i as f64 / 10.0);
            assert!(pi < prev, "pi not decreasing at bias {}", i as f64 / 10.0);
            prev = pi;
        }
    }

    #[test]
    fn safe_number_fallback_for_non_numeric() {
        assert_eq!(safe_number(&json!("abc"), 1.5, 0.0, 3.0), 1.5);
        assert_eq!(safe_number(&json!(null), 1.5, 0.0, 3.0), 1.5);
        assert_eq!(safe_number(&json!(true), 1.5, 0.0, 3.0), 1.5);
        assert_eq!(safe_number(&json!({"x": 1}), 0.5, 0.0, 1.0), 0.5);
    }

    #[test]
    fn safe_number_parses_leading_numeric_prefix() {
        assert_eq!(safe_number(&json!("2.5 (moderate)"), 1.5, 0.0, 3.0), 2.5);
        assert_eq!(safe_number(&json!("  .75"), 1.5, 0.0, 3.0), 0.75);
        assert_eq!(safe_number(&json!("1e0"), 1.5, 0.0, 3.0), 1.0);
        assert_eq!(safe_number(&json!("-Infinity"), 1.5, 0.0, 3.0), 0.0);
    }

    #[test]
    fn safe_number_clamps() {
        assert_eq!(safe_number(&json!(7), 1.5, 0.0, 3.0), 3.0);
        assert_eq!(safe_number(&json!(-2.0), 1.5, 0.0, 3.0), 0.0);
        assert_eq!(safe_number(&json!("1.8"), 0.5, 0.0, 1.0), 1.0);
    }

    #[test]
    fn safe_number_is_idempotent() {
        let inputs = [
            json!("abc"),
            json!(2.25),
            json!(-1),
            json!(42),
            json!("1.75xyz"),
            json!(null),
            json!([1, 2]),
        ];
        for v in inputs {
            let once = safe_number(&v, 1.5, 0.0, 3.0);
            let twice = safe_number(&json!(once), 1.5, 0.0, 3.0);
            assert_eq!(once, twice, "not idempotent for {v}");
        }
    }

    #[test]
    fn sanitize_component_score_variants() {
        assert_eq!(sanitize_component_score(&json!(1.23456)), 1.235);
        assert_eq!(sanitize_component_score(&json!("2")), 2.0);
        assert_eq!(sanitize_component_score(&json!("")), 0.0);
        assert_eq!(sanitize_component_score(&json!("two")), 0.0);
        assert_eq!(sanitize_component_score(&json!(null)), 0.0);
        assert_eq!(sanitize_component_score(&json!(5)), 3.0);
        assert_eq!(sanitize_component_score(&json!(-1)), 0.0);
        assert_eq!(sanitize_component_score(&json!(true)), 1.0);
    }

    #[test]
    fn derived_scores_link_intent_and_pi() {
        let scores = BiasScores::derived(components(3.0, 3.0, 3.0, 3.0));
        assert_eq!(scores.bias_intent_score, 3.0);
        assert_eq!(scores.pi_score, 0.0);

        let scores = BiasScores::new(components(1.0, 1.0, 1.0, 1.0), 0.8);
        assert_eq!(scores.bias_intent_score, 1.0);
        assert_eq!(scores.pi_score, 0.8);
    }
}
