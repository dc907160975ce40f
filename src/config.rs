//! Engine configuration
//!
//! Every tunable constant of the engine lives in [`EngineConfig`], which is
//! passed to the tracker and classifier at construction. Configuration can be
//! layered from defaults, a TOML file, and `STRAYGUARD_`-prefixed environment
//! variables (nested keys separated by `__`, e.g. `STRAYGUARD_WINDOW__WINDOW_SEC=60`).

use crate::error::EngineError;
use crate::fuzzy::Trapezoid;
use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Default trailing window length in seconds
pub const DEFAULT_WINDOW_SEC: f64 = 30.0;

/// Longest accepted trailing window in seconds (about 31.7 years)
pub const MAX_WINDOW_SEC: f64 = 1e9;

/// Default number of in-window events that counts as fully saturated
pub const DEFAULT_SATURATION_COUNT: u32 = 10;

/// Default score at or above which an event is HIGH
pub const DEFAULT_HIGH_THRESHOLD: f64 = 0.75;

/// Default score at or above which an event is MED
pub const DEFAULT_MED_THRESHOLD: f64 = 0.45;

/// Environment prefix for configuration overrides
pub const ENV_PREFIX: &str = "STRAYGUARD_";

/// Rolling window parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WindowConfig {
    /// Trailing window length `W` (seconds)
    pub window_sec: f64,
    /// Event count `M` within the window that maps to rate 1.0
    pub saturation_count: u32,
}

impl Default for WindowConfig {
    fn default() -> Self {
        Self {
            window_sec: DEFAULT_WINDOW_SEC,
            saturation_count: DEFAULT_SATURATION_COUNT,
        }
    }
}

/// Label thresholds applied to the defuzzified score
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AlertThresholds {
    pub high: f64,
    pub med: f64,
}

impl Default for AlertThresholds {
    fn default() -> Self {
        Self {
            high: DEFAULT_HIGH_THRESHOLD,
            med: DEFAULT_MED_THRESHOLD,
        }
    }
}

/// Trapezoid breakpoints for every fuzzy set
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MembershipConfig {
    pub conf_high: Trapezoid,
    pub conf_med: Trapezoid,
    pub many: Trapezoid,
    pub freq_high: Trapezoid,
    pub freq_mid: Trapezoid,
    pub low_conf: Trapezoid,
    pub low_freq: Trapezoid,
    /// Object count that maps to a fully saturated "many" input
    pub many_divisor: f64,
}

impl Default for MembershipConfig {
    fn default() -> Self {
        Self {
            conf_high: Trapezoid::new(0.60, 0.75, 1.00, 1.00),
            conf_med: Trapezoid::new(0.40, 0.55, 0.75, 0.90),
            many: Trapezoid::new(0.40, 0.60, 1.00, 1.00),
            freq_high: Trapezoid::new(0.40, 0.60, 1.00, 1.00),
            freq_mid: Trapezoid::new(0.20, 0.35, 0.60, 0.80),
            low_conf: Trapezoid::new(0.00, 0.00, 0.35, 0.55),
            low_freq: Trapezoid::new(0.00, 0.00, 0.15, 0.30),
            many_divisor: 3.0,
        }
    }
}

impl MembershipConfig {
    fn named(&self) -> [(&'static str, &Trapezoid); 7] {
        [
            ("conf_high", &self.conf_high),
            ("conf_med", &self.conf_med),
            ("many", &self.many),
            ("freq_high", &self.freq_high),
            ("freq_mid", &self.freq_mid),
            ("low_conf", &self.low_conf),
            ("low_freq", &self.low_freq),
        ]
    }
}

/// Representative scores used by the weighted-centroid defuzzifier
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CentroidConfig {
    pub low: f64,
    pub med: f64,
    pub high: f64,
    /// Added to the denominator so all-zero memberships resolve to 0
    pub epsilon: f64,
}

impl Default for CentroidConfig {
    fn default() -> Self {
        Self {
            low: 0.2,
            med: 0.6,
            high: 0.9,
            epsilon: 1e-9,
        }
    }
}

/// Complete engine configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub window: WindowConfig,
    pub thresholds: AlertThresholds,
    pub memberships: MembershipConfig,
    pub centroid: CentroidConfig,
}

impl EngineConfig {
    /// Layer defaults, an optional TOML file, and environment overrides.
    pub fn load(path: Option<&Path>) -> Result<Self, EngineError> {
        let mut figment = Figment::from(Serialized::defaults(EngineConfig::default()));
        if let Some(path) = path {
            if !path.exists() {
                return Err(EngineError::InvalidConfig(format!(
                    "config file not found: {}",
                    path.display()
                )));
            }
            figment = figment.merge(Toml::file(path));
        }
        figment = figment.merge(Env::prefixed(ENV_PREFIX).split("__"));
        Self::extract(figment)
    }

    /// Parse a TOML document on top of the defaults (no environment layer).
    pub fn from_toml_str(toml: &str) -> Result<Self, EngineError> {
        let figment =
            Figment::from(Serialized::defaults(EngineConfig::default())).merge(Toml::string(toml));
        Self::extract(figment)
    }

    fn extract(figment: Figment) -> Result<Self, EngineError> {
        let config: EngineConfig = figment
            .extract()
            .map_err(|e| EngineError::InvalidConfig(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Reject constants the engine cannot run with.
    pub fn validate(&self) -> Result<(), EngineError> {
        let window = &self.window;
        if !window.window_sec.is_finite()
            || window.window_sec <= 0.0
            || window.window_sec > MAX_WINDOW_SEC
        {
            return Err(EngineError::InvalidConfig(format!(
                "window.window_sec must be in (0, {MAX_WINDOW_SEC}], got {}",
                window.window_sec
            )));
        }
        if window.saturation_count == 0 {
            return Err(EngineError::InvalidConfig(
                "window.saturation_count must be at least 1".to_string(),
            ));
        }

        let thresholds = &self.thresholds;
        if !(thresholds.med.is_finite() && thresholds.high.is_finite()) {
            return Err(EngineError::InvalidConfig(
                "thresholds must be finite".to_string(),
            ));
        }
        if thresholds.med > thresholds.high {
            return Err(EngineError::InvalidConfig(format!(
                "thresholds.med ({}) must not exceed thresholds.high ({})",
                thresholds.med, thresholds.high
            )));
        }

        for (name, trapezoid) in self.memberships.named() {
            if !trapezoid.is_well_formed() {
                return Err(EngineError::InvalidConfig(format!(
                    "memberships.{name} breakpoints must satisfy a <= b <= c <= d, got {trapezoid}"
                )));
            }
        }
        let divisor = self.memberships.many_divisor;
        if !divisor.is_finite() || divisor <= 0.0 {
            return Err(EngineError::InvalidConfig(format!(
                "memberships.many_divisor must be a positive number, got {divisor}"
            )));
        }

        let centroid = &self.centroid;
        if !centroid.epsilon.is_finite() || centroid.epsilon <= 0.0 {
            return Err(EngineError::InvalidConfig(format!(
                "centroid.epsilon must be a positive number, got {}",
                centroid.epsilon
            )));
        }
        if ![centroid.low, centroid.med, centroid.high]
            .iter()
            .all(|v| v.is_finite())
        {
            return Err(EngineError::InvalidConfig(
                "centroid scores must be finite".to_string(),
            ));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_defaults_are_valid() {
        let config = EngineConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.window.window_sec, 30.0);
        assert_eq!(config.window.saturation_count, 10);
        assert_eq!(config.thresholds.high, 0.75);
        assert_eq!(config.thresholds.med, 0.45);
        assert_eq!(config.memberships.many_divisor, 3.0);
    }

    #[test]
    fn test_partial_toml_overrides_defaults() {
        let config = EngineConfig::from_toml_str(
            r#"
            [window]
            window_sec = 60.0

            [memberships]
            freq_high = [0.5, 0.7, 1.0, 1.0]
            "#,
        )
        .unwrap();

        assert_eq!(config.window.window_sec, 60.0);
        assert_eq!(config.window.saturation_count, 10);
        assert_eq!(config.memberships.freq_high, Trapezoid::new(0.5, 0.7, 1.0, 1.0));
        assert_eq!(config.memberships.conf_high, Trapezoid::new(0.6, 0.75, 1.0, 1.0));
    }

    #[test]
    fn test_empty_toml_is_default() {
        let config = EngineConfig::from_toml_str("").unwrap();
        assert_eq!(config, EngineConfig::default());
    }

    #[test]
    fn test_rejects_zero_saturation() {
        let result = EngineConfig::from_toml_str("[window]\nsaturation_count = 0\n");
        assert!(matches!(result, Err(EngineError::InvalidConfig(_))));
    }

    #[test]
    fn test_rejects_non_positive_window() {
        let mut config = EngineConfig::default();
        config.window.window_sec = 0.0;
        assert!(config.validate().is_err());
        config.window.window_sec = f64::NAN;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_rejects_window_beyond_max() {
        let mut config = EngineConfig::default();
        config.window.window_sec = 1e13;
        assert!(config.validate().is_err());
        config.window.window_sec = MAX_WINDOW_SEC;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_rejects_inverted_thresholds() {
        let mut config = EngineConfig::default();
        config.thresholds.med = 0.8;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_rejects_unordered_trapezoid() {
        let mut config = EngineConfig::default();
        config.memberships.freq_mid = Trapezoid::new(0.5, 0.3, 0.6, 0.8);
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("freq_mid"));
    }

    #[test]
    fn test_rejects_bad_many_divisor() {
        let mut config = EngineConfig::default();
        config.memberships.many_divisor = 0.0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_load_missing_file_is_error() {
        let result = EngineConfig::load(Some(Path::new("/nonexistent/strayguard.toml")));
        assert!(matches!(result, Err(EngineError::InvalidConfig(_))));
    }
}
