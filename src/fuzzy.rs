//! Fuzzy severity classification
//!
//! This module fuses three normalized signals into a severity label:
//! - Detector confidence `C` (0-1)
//! - Object count `N` (>= 0)
//! - Recent event rate `R` (0-1)
//!
//! Each signal is mapped onto trapezoidal fuzzy sets, combined with Zadeh
//! operators (AND = min, OR = max), and defuzzified with a weighted centroid.

use crate::config::{AlertThresholds, CentroidConfig, EngineConfig, MembershipConfig};
use crate::error::EngineError;
use crate::types::Severity;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Trapezoidal membership function with breakpoints `a <= b <= c <= d`
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(from = "[f64; 4]", into = "[f64; 4]")]
pub struct Trapezoid {
    pub a: f64,
    pub b: f64,
    pub c: f64,
    pub d: f64,
}

impl From<[f64; 4]> for Trapezoid {
    fn from([a, b, c, d]: [f64; 4]) -> Self {
        Self { a, b, c, d }
    }
}

impl From<Trapezoid> for [f64; 4] {
    fn from(t: Trapezoid) -> Self {
        [t.a, t.b, t.c, t.d]
    }
}

impl fmt::Display for Trapezoid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}, {}, {}, {}]", self.a, self.b, self.c, self.d)
    }
}

impl Trapezoid {
    pub const fn new(a: f64, b: f64, c: f64, d: f64) -> Self {
        Self { a, b, c, d }
    }

    /// Breakpoints are finite and ordered
    pub fn is_well_formed(&self) -> bool {
        [self.a, self.b, self.c, self.d].iter().all(|v| v.is_finite())
            && self.a <= self.b
            && self.b <= self.c
            && self.c <= self.d
    }

    /// Degree of membership of `x`
    pub fn membership(&self, x: f64) -> f64 {
        trapmf(x, self.a, self.b, self.c, self.d)
    }
}

/// Trapezoidal membership degree of `x`.
///
/// The plateau `[b, c]` is checked first, so a shoulder set (`a == b` or
/// `c == d`) includes its closed end: `trapmf(1.0, 0.6, 0.75, 1.0, 1.0) == 1.0`.
/// A zero-width ramp yields 0. NaN yields 0.
///
/// The `span > 0.0` guards are unreachable through this function: with
/// `a == b` any `x < b` already satisfies `x <= a`, and with `c == d` any
/// `x > c` satisfies `x >= d`. They stay so the division never sees zero.
pub fn trapmf(x: f64, a: f64, b: f64, c: f64, d: f64) -> f64 {
    if b <= x && x <= c {
        return 1.0;
    }
    if x.is_nan() || x <= a || x >= d {
        return 0.0;
    }
    if x < b {
        let span = b - a;
        return if span > 0.0 { (x - a) / span } else { 0.0 };
    }
    let span = d - c;
    if span > 0.0 {
        (d - x) / span
    } else {
        0.0
    }
}

/// Membership degrees of one input triple
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Memberships {
    pub conf_high: f64,
    pub conf_med: f64,
    pub low_conf: f64,
    pub many: f64,
    pub freq_high: f64,
    pub freq_mid: f64,
    pub low_freq: f64,
}

/// Aggregated rule strengths
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RuleStrengths {
    pub risk_low: f64,
    pub risk_med: f64,
    pub risk_high: f64,
}

/// Result of classifying one event
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Classification {
    pub severity: Severity,
    pub score: f64,
    pub rules: RuleStrengths,
}

/// Stateless fuzzy classifier over a fixed configuration
#[derive(Debug, Clone)]
pub struct FuzzyClassifier {
    memberships: MembershipConfig,
    centroid: CentroidConfig,
    thresholds: AlertThresholds,
}

impl Default for FuzzyClassifier {
    fn default() -> Self {
        let config = EngineConfig::default();
        Self {
            memberships: config.memberships,
            centroid: config.centroid,
            thresholds: config.thresholds,
        }
    }
}

impl FuzzyClassifier {
    /// Build a classifier from a validated configuration
    pub fn new(config: &EngineConfig) -> Result<Self, EngineError> {
        config.validate()?;
        Ok(Self {
            memberships: config.memberships.clone(),
            centroid: config.centroid.clone(),
            thresholds: config.thresholds.clone(),
        })
    }

    /// Evaluate every fuzzy set for `(C, N, R)`
    pub fn memberships(&self, confidence: f64, count: f64, rate: f64) -> Memberships {
        let c = sanitize_unit(confidence);
        let r = sanitize_unit(rate);
        let n = if count.is_nan() { 0.0 } else { count.max(0.0) };
        let many_input = (n / self.memberships.many_divisor).min(1.0);

        let m = &self.memberships;
        Memberships {
            conf_high: m.conf_high.membership(c),
            conf_med: m.conf_med.membership(c),
            low_conf: m.low_conf.membership(c),
            many: m.many.membership(many_input),
            freq_high: m.freq_high.membership(r),
            freq_mid: m.freq_mid.membership(r),
            low_freq: m.low_freq.membership(r),
        }
    }

    /// Classify one event from its confidence, object count and event rate
    pub fn classify(&self, confidence: f64, count: u32, rate: f64) -> Classification {
        let m = self.memberships(confidence, f64::from(count), rate);
        let rules = aggregate(&m);
        let score = self.defuzzify(&rules);
        Classification {
            severity: self.label(score),
            score,
            rules,
        }
    }

    /// Weighted-centroid defuzzification
    pub fn defuzzify(&self, rules: &RuleStrengths) -> f64 {
        let w = &self.centroid;
        let numerator = rules.risk_low * w.low + rules.risk_med * w.med + rules.risk_high * w.high;
        let denominator = rules.risk_low + rules.risk_med + rules.risk_high + w.epsilon;
        numerator / denominator
    }

    /// Map a score onto a label (lower bounds are inclusive)
    pub fn label(&self, score: f64) -> Severity {
        severity_for_score(score, &self.thresholds)
    }
}

/// Map a score onto a label given explicit thresholds
pub fn severity_for_score(score: f64, thresholds: &AlertThresholds) -> Severity {
    if score >= thresholds.high {
        Severity::High
    } else if score >= thresholds.med {
        Severity::Med
    } else {
        Severity::Low
    }
}

fn aggregate(m: &Memberships) -> RuleStrengths {
    RuleStrengths {
        risk_high: m.conf_high.min(m.freq_high).max(m.many),
        risk_med: m.conf_med.min(m.freq_high).max(m.conf_high.min(m.freq_mid)),
        risk_low: m.low_conf.max(m.low_freq),
    }
}

fn sanitize_unit(x: f64) -> f64 {
    if x.is_nan() {
        0.0
    } else {
        x.clamp(0.0, 1.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const EPS: f64 = 1e-6;

    fn classifier() -> FuzzyClassifier {
        FuzzyClassifier::new(&EngineConfig::default()).unwrap()
    }

    #[test]
    fn test_trapmf_shape() {
        let t = Trapezoid::new(0.2, 0.4, 0.6, 0.8);
        assert_eq!(t.membership(0.1), 0.0);
        assert_eq!(t.membership(0.2), 0.0);
        assert!((t.membership(0.3) - 0.5).abs() < EPS);
        assert_eq!(t.membership(0.4), 1.0);
        assert_eq!(t.membership(0.5), 1.0);
        assert_eq!(t.membership(0.6), 1.0);
        assert!((t.membership(0.7) - 0.5).abs() < EPS);
        assert_eq!(t.membership(0.8), 0.0);
        assert_eq!(t.membership(0.9), 0.0);
    }

    #[test]
    fn test_trapmf_shoulders_include_closed_end() {
        assert_eq!(trapmf(1.0, 0.60, 0.75, 1.00, 1.00), 1.0);
        assert_eq!(trapmf(0.0, 0.00, 0.00, 0.35, 0.55), 1.0);
        assert_eq!(trapmf(1.2, 0.60, 0.75, 1.00, 1.00), 0.0);
    }

    #[test]
    fn test_trapmf_left_shoulder_falls_on_right_ramp() {
        assert!((trapmf(0.6, 0.5, 0.5, 0.5, 0.7) - 0.5).abs() < EPS);
        assert_eq!(trapmf(0.5, 0.5, 0.5, 0.5, 0.5), 1.0);
        assert_eq!(trapmf(0.4, 0.5, 0.5, 0.5, 0.5), 0.0);
        assert_eq!(trapmf(f64::NAN, 0.0, 0.1, 0.2, 0.3), 0.0);
    }

    #[test]
    fn test_trapmf_zero_width_ramps_are_zero() {
        // Both ramps have zero width: a == b and c == d
        let (a, b, c, d) = (0.5, 0.5, 0.6, 0.6);
        assert_eq!(trapmf(0.5, a, b, c, d), 1.0);
        assert_eq!(trapmf(0.6, a, b, c, d), 1.0);
        assert_eq!(trapmf(0.5 - 1e-9, a, b, c, d), 0.0);
        assert_eq!(trapmf(0.6 + 1e-9, a, b, c, d), 0.0);
        assert!(trapmf(0.55, a, b, c, d).is_finite());
    }

    #[test]
    fn test_default_memberships() {
        let m = classifier().memberships(0.8, 1.0, 1.0);
        assert_eq!(m.conf_high, 1.0);
        assert!((m.conf_med - (0.9 - 0.8) / 0.15).abs() < EPS);
        assert_eq!(m.low_conf, 0.0);
        assert_eq!(m.many, 0.0);
        assert_eq!(m.freq_high, 1.0);
        assert_eq!(m.freq_mid, 0.0);
        assert_eq!(m.low_freq, 0.0);
    }

    #[test]
    fn test_many_saturates_at_divisor() {
        let c = classifier();
        assert_eq!(c.memberships(0.5, 1.0, 0.5).many, 0.0);
        assert_eq!(c.memberships(0.5, 2.0, 0.5).many, 1.0);
        assert_eq!(c.memberships(0.5, 3.0, 0.5).many, 1.0);
        assert_eq!(c.memberships(0.5, 40.0, 0.5).many, 1.0);
    }

    #[test]
    fn test_confident_and_frequent_is_high() {
        let result = classifier().classify(0.8, 1, 1.0);
        // high = 1, med = 2/3, low = 0 -> (0.4 + 0.9) / (5/3) = 0.78
        assert!((result.score - 0.78).abs() < EPS);
        assert_eq!(result.severity, Severity::High);
        assert_eq!(result.rules.risk_high, 1.0);
    }

    #[test]
    fn test_many_objects_alone_is_high() {
        let result = classifier().classify(0.58, 3, 0.35);
        assert_eq!(result.rules.risk_high, 1.0);
        assert_eq!(result.rules.risk_med, 0.0);
        assert_eq!(result.rules.risk_low, 0.0);
        assert_eq!(result.severity, Severity::High);
    }

    #[test]
    fn test_all_zero_memberships_resolve_low() {
        // Mid confidence at mid rate is covered by no rule
        let result = classifier().classify(0.58, 1, 0.35);
        assert_eq!(result.rules.risk_high, 0.0);
        assert_eq!(result.rules.risk_med, 0.0);
        assert_eq!(result.rules.risk_low, 0.0);
        assert_eq!(result.score, 0.0);
        assert_eq!(result.severity, Severity::Low);
    }

    #[test]
    fn test_moderate_rate_is_med() {
        let result = classifier().classify(0.8, 1, 0.5);
        // high = 0.5, med = 1, low = 0 -> (0.6 + 0.45) / 1.5 = 0.7
        assert!((result.score - 0.7).abs() < EPS);
        assert_eq!(result.severity, Severity::Med);
    }

    #[test]
    fn test_isolated_mid_confidence_is_low() {
        let result = classifier().classify(0.5, 1, 0.1);
        assert!((result.score - 0.2).abs() < EPS);
        assert!(result.score < 0.75);
        assert_eq!(result.severity, Severity::Low);
    }

    #[test]
    fn test_confidence_monotonicity() {
        let c = classifier();
        let high = c.classify(0.9, 1, 0.9).score;
        let low = c.classify(0.3, 1, 0.9).score;
        assert!(high >= low);
        assert!((high - 0.9).abs() < EPS);
        assert!((low - 0.2).abs() < EPS);
    }

    #[test]
    fn test_label_thresholds_are_inclusive() {
        let c = classifier();
        assert_eq!(c.label(0.75), Severity::High);
        assert_eq!(c.label(0.7499), Severity::Med);
        assert_eq!(c.label(0.45), Severity::Med);
        assert_eq!(c.label(0.44999), Severity::Low);
        assert_eq!(c.label(0.0), Severity::Low);
    }

    #[test]
    fn test_out_of_range_inputs_are_clamped() {
        let c = classifier();
        assert_eq!(c.classify(1.7, 1, 4.0), c.classify(1.0, 1, 1.0));
        assert_eq!(c.classify(-0.3, 1, -1.0), c.classify(0.0, 1, 0.0));
        let nan = c.classify(f64::NAN, 1, f64::NAN);
        assert!(nan.score.is_finite());
    }

    #[test]
    fn test_custom_divisor() {
        let mut config = EngineConfig::default();
        config.memberships.many_divisor = 10.0;
        let c = FuzzyClassifier::new(&config).unwrap();
        assert_eq!(c.memberships(0.5, 3.0, 0.5).many, 0.0);
        assert_eq!(c.memberships(0.5, 6.0, 0.5).many, 1.0);
    }

    #[test]
    fn test_trapezoid_serializes_as_array() {
        let t = Trapezoid::new(0.2, 0.35, 0.6, 0.8);
        assert_eq!(serde_json::to_string(&t).unwrap(), "[0.2,0.35,0.6,0.8]");
        let back: Trapezoid = serde_json::from_str("[0.0,0.0,0.15,0.3]").unwrap();
        assert_eq!(back, Trapezoid::new(0.0, 0.0, 0.15, 0.3));
    }
}
