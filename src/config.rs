//! Agent configuration
//!
//! Every tunable constant of the pipeline lives here so that policy choices
//! (severity normalization, mitigation coverage bar, history minimums) can be
//! changed per deployment without touching the algorithms.

use crate::error::CollisionError;
use crate::Result;
use serde::{Deserialize, Serialize};
use std::env;
use std::str::FromStr;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AgentConfig {
    #[serde(default)]
    pub backend: BackendConfig,
    #[serde(default)]
    pub history: HistoryConfig,
    #[serde(default)]
    pub model: ModelConfig,
    #[serde(default)]
    pub policy: PolicyConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackendConfig {
    pub base_url: String,
    pub timeout_secs: u64,
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8000".to_string(),
            timeout_secs: 30,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HistoryConfig {
    /// Minimum number of distinct days with payments
    pub min_days: usize,
    /// Proceed below `min_days`, flagging the forecast as partial
    pub allow_partial: bool,
    /// Default look-back when no explicit window is requested
    pub window_days: i64,
}

impl Default for HistoryConfig {
    fn default() -> Self {
        Self {
            min_days: 90,
            allow_partial: false,
            window_days: 365,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelConfig {
    pub n_estimators: usize,
    pub max_depth: usize,
    pub seed: u64,
    /// Leading share of the history used for training; the rest validates
    pub train_fraction: f64,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            n_estimators: 200,
            max_depth: 15,
            seed: 42,
            train_fraction: 0.8,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PolicyConfig {
    /// Deficit at which the magnitude sub-score saturates at 100
    pub magnitude_normalizer: f64,
    /// Share of the deficit the weighted levers must cover
    pub mitigation_coverage_threshold: f64,
    /// Used when the organization summary has no `minimum_balance_required`
    pub default_minimum_balance: f64,
}

impl Default for PolicyConfig {
    fn default() -> Self {
        Self {
            magnitude_normalizer: 1_000_000_000.0,
            mitigation_coverage_threshold: 0.7,
            default_minimum_balance: 500_000.0,
        }
    }
}

impl AgentConfig {
    /// Build a config from the process environment, falling back to defaults.
    ///
    /// Callers that want `.env` support should run `dotenv::dotenv()` first.
    pub fn from_env() -> Result<Self> {
        let mut config = Self::default();

        if let Ok(base_url) =
            env::var("API_BASE_URL").or_else(|_| env::var("FINANCIAL_API_BASE_URL"))
        {
            config.backend.base_url = base_url.trim_end_matches('/').to_string();
        }
        if let Some(timeout) = parse_var("BACKEND_TIMEOUT_SECS")? {
            config.backend.timeout_secs = timeout;
        }

        if let Some(min_days) = parse_var("MIN_HISTORICAL_DAYS")? {
            config.history.min_days = min_days;
        }
        if let Ok(flag) = env::var("ALLOW_PARTIAL_HISTORY") {
            config.history.allow_partial = is_truthy(&flag);
        }

        if let Some(seed) = parse_var("FORECAST_SEED")? {
            config.model.seed = seed;
        }

        if let Some(normalizer) = parse_var("SEVERITY_MAGNITUDE_NORMALIZER")? {
            config.policy.magnitude_normalizer = normalizer;
        }
        if let Some(threshold) = parse_var("MITIGATION_COVERAGE_THRESHOLD")? {
            config.policy.mitigation_coverage_threshold = threshold;
        }

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.model.n_estimators == 0 {
            return Err(CollisionError::Config(
                "model.n_estimators must be at least 1".to_string(),
            ));
        }
        if !(0.0..=1.0).contains(&self.model.train_fraction) {
            return Err(CollisionError::Config(format!(
                "model.train_fraction must be within [0, 1], got {}",
                self.model.train_fraction
            )));
        }
        if self.policy.magnitude_normalizer <= 0.0 {
            return Err(CollisionError::Config(
                "policy.magnitude_normalizer must be positive".to_string(),
            ));
        }
        Ok(())
    }
}

fn is_truthy(value: &str) -> bool {
    matches!(
        value.trim().to_lowercase().as_str(),
        "1" | "true" | "yes" | "y"
    )
}

fn parse_var<T: FromStr>(name: &str) -> Result<Option<T>> {
    match env::var(name) {
        Ok(raw) => raw
            .trim()
            .parse::<T>()
            .map(Some)
            .map_err(|_| CollisionError::Config(format!("{} has invalid value '{}'", name, raw))),
        Err(_) => Ok(None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_match_policy() {
        let config = AgentConfig::default();
        assert_eq!(config.history.min_days, 90);
        assert_eq!(config.model.n_estimators, 200);
        assert_eq!(config.model.max_depth, 15);
        assert_eq!(config.policy.mitigation_coverage_threshold, 0.7);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_truthy_values() {
        for value in ["1", "true", "YES", " y "] {
            assert!(is_truthy(value), "{} should be truthy", value);
        }
        assert!(!is_truthy("false"));
        assert!(!is_truthy("0"));
    }

    #[test]
    fn test_validate_rejects_zero_estimators() {
        let mut config = AgentConfig::default();
        config.model.n_estimators = 0;
        assert!(matches!(config.validate(), Err(CollisionError::Config(_))));
    }
}
