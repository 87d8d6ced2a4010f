//! Orchestrator configuration.
//!
//! Configuration can be built in code, parsed from JSON, or read from
//! `DEALFLOW_*` environment variables. Every loader validates before
//! returning.

use crate::errors::ConfigError;
use crate::scoring::{InvestorPreferences, ScoreWeights};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Environment variable holding the simulated per-stage latency in ms.
pub const ENV_STAGE_LATENCY_MS: &str = "DEALFLOW_STAGE_LATENCY_MS";
/// Environment variable holding the per-stage timeout in ms (`none` disables it).
pub const ENV_STAGE_TIMEOUT_MS: &str = "DEALFLOW_STAGE_TIMEOUT_MS";
/// Environment variable holding the duplicate submission policy.
pub const ENV_DUPLICATE_POLICY: &str = "DEALFLOW_DUPLICATE_POLICY";
/// Environment variable holding the founder-market fit weight.
pub const ENV_FOUNDER_WEIGHT: &str = "DEALFLOW_FOUNDER_WEIGHT";
/// Environment variable holding the market opportunity weight.
pub const ENV_MARKET_WEIGHT: &str = "DEALFLOW_MARKET_WEIGHT";
/// Environment variable holding the business model weight.
pub const ENV_BUSINESS_MODEL_WEIGHT: &str = "DEALFLOW_BUSINESS_MODEL_WEIGHT";
/// Environment variable holding the traction weight.
pub const ENV_TRACTION_WEIGHT: &str = "DEALFLOW_TRACTION_WEIGHT";

/// What `submit` does when the entity already has an active run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DuplicatePolicy {
    /// Refuse the new submission with a `DuplicateRunError`.
    #[default]
    Reject,
    /// Cancel the active run and start over. The cancelled run's status
    /// writes and outcome are discarded.
    Supersede,
}

impl std::str::FromStr for DuplicatePolicy {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "reject" => Ok(Self::Reject),
            "supersede" => Ok(Self::Supersede),
            other => Err(ConfigError::invalid(
                ENV_DUPLICATE_POLICY,
                format!("expected 'reject' or 'supersede', got '{other}'"),
            )),
        }
    }
}

const fn default_stage_latency_ms() -> u64 {
    1000
}

#[allow(clippy::unnecessary_wraps)]
const fn default_stage_timeout_ms() -> Option<u64> {
    Some(30_000)
}

/// Configuration of an [`Orchestrator`](crate::orchestrator::Orchestrator).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrchestratorConfig {
    /// Simulated processing delay of each built-in stage.
    #[serde(default = "default_stage_latency_ms")]
    pub stage_latency_ms: u64,
    /// Maximum duration of one stage. `None` disables the bound.
    #[serde(default = "default_stage_timeout_ms")]
    pub stage_timeout_ms: Option<u64>,
    /// Behavior on a second submission for an entity with an active run.
    #[serde(default)]
    pub duplicate_policy: DuplicatePolicy,
    /// Scoring weights, used verbatim.
    #[serde(default)]
    pub weights: ScoreWeights,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            stage_latency_ms: default_stage_latency_ms(),
            stage_timeout_ms: default_stage_timeout_ms(),
            duplicate_policy: DuplicatePolicy::default(),
            weights: ScoreWeights::default(),
        }
    }
}

impl OrchestratorConfig {
    /// Creates the default configuration.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Default configuration without simulated latency.
    #[must_use]
    pub fn immediate() -> Self {
        Self::default().with_stage_latency_ms(0)
    }

    /// Sets the simulated per-stage latency.
    #[must_use]
    pub const fn with_stage_latency_ms(mut self, ms: u64) -> Self {
        self.stage_latency_ms = ms;
        self
    }

    /// Sets the per-stage timeout.
    #[must_use]
    pub const fn with_stage_timeout_ms(mut self, ms: Option<u64>) -> Self {
        self.stage_timeout_ms = ms;
        self
    }

    /// Sets the duplicate submission policy.
    #[must_use]
    pub const fn with_duplicate_policy(mut self, policy: DuplicatePolicy) -> Self {
        self.duplicate_policy = policy;
        self
    }

    /// Sets the scoring weights.
    #[must_use]
    pub const fn with_weights(mut self, weights: ScoreWeights) -> Self {
        self.weights = weights;
        self
    }

    /// Uses an investor's weights for scoring.
    #[must_use]
    pub const fn with_preferences(self, preferences: &InvestorPreferences) -> Self {
        self.with_weights(preferences.weights)
    }

    /// Returns the simulated per-stage latency.
    #[must_use]
    pub const fn stage_latency(&self) -> Duration {
        Duration::from_millis(self.stage_latency_ms)
    }

    /// Returns the per-stage timeout.
    #[must_use]
    pub fn stage_timeout(&self) -> Option<Duration> {
        self.stage_timeout_ms.map(Duration::from_millis)
    }

    /// Validates the configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the timeout is zero or the weights are unusable.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.stage_timeout_ms == Some(0) {
            return Err(ConfigError::invalid(
                "stage_timeout_ms",
                "must be positive; use null to disable the timeout",
            ));
        }
        self.weights.validate()?;
        Ok(())
    }

    /// Parses and validates a JSON configuration. Missing keys take defaults.
    ///
    /// # Errors
    ///
    /// Returns an error if the JSON is malformed or the result is invalid.
    pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Reads and validates configuration from `DEALFLOW_*` environment
    /// variables. Unset variables take defaults.
    ///
    /// # Errors
    ///
    /// Returns an error if a variable cannot be parsed or the result is invalid.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Like [`from_env`](Self::from_env), reading values through `lookup`.
    ///
    /// # Errors
    ///
    /// Returns an error if a value cannot be parsed or the result is invalid.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let read = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());
        let mut config = Self::default();

        if let Some(raw) = read(ENV_STAGE_LATENCY_MS) {
            config.stage_latency_ms = parse_number(ENV_STAGE_LATENCY_MS, &raw)?;
        }

        if let Some(raw) = read(ENV_STAGE_TIMEOUT_MS) {
            config.stage_timeout_ms = if raw.eq_ignore_ascii_case("none") || raw.eq_ignore_ascii_case("off") {
                None
            } else {
                Some(parse_number(ENV_STAGE_TIMEOUT_MS, &raw)?)
            };
        }

        if let Some(raw) = read(ENV_DUPLICATE_POLICY) {
            config.duplicate_policy = raw.parse()?;
        }

        let weights = &mut config.weights;
        for (key, slot) in [
            (ENV_FOUNDER_WEIGHT, &mut weights.founder_market_fit),
            (ENV_MARKET_WEIGHT, &mut weights.market_opportunity),
            (ENV_BUSINESS_MODEL_WEIGHT, &mut weights.business_model),
            (ENV_TRACTION_WEIGHT, &mut weights.traction),
        ] {
            if let Some(raw) = read(key) {
                *slot = parse_number(key, &raw)?;
            }
        }

        config.validate()?;
        Ok(config)
    }
}

fn parse_number<T>(key: &str, raw: &str) -> Result<T, ConfigError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    raw.parse()
        .map_err(|e| ConfigError::invalid(key, format!("cannot parse '{raw}': {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        move |key: &str| map.get(key).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = OrchestratorConfig::default();
        assert_eq!(config.stage_latency(), Duration::from_secs(1));
        assert_eq!(config.stage_timeout(), Some(Duration::from_secs(30)));
        assert_eq!(config.duplicate_policy, DuplicatePolicy::Reject);
        assert_eq!(config.weights, ScoreWeights::default());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_from_json_partial() {
        let config = OrchestratorConfig::from_json_str(
            r#"{"stage_latency_ms": 5, "duplicate_policy": "supersede"}"#,
        )
        .unwrap();

        assert_eq!(config.stage_latency_ms, 5);
        assert_eq!(config.duplicate_policy, DuplicatePolicy::Supersede);
        assert_eq!(config.stage_timeout_ms, Some(30_000));
    }

    #[test]
    fn test_from_json_custom_weights() {
        let config = OrchestratorConfig::from_json_str(
            r#"{"weights": {"founder_weight": 0.4, "market_weight": 0.2,
                "business_model_weight": 0.2, "traction_weight": 0.2}}"#,
        )
        .unwrap();
        assert_eq!(config.weights, ScoreWeights::new(0.4, 0.2, 0.2, 0.2));
    }

    #[test]
    fn test_from_json_rejects_bad_weights() {
        let err = OrchestratorConfig::from_json_str(
            r#"{"weights": {"founder_weight": 0.9, "market_weight": 0.2,
                "business_model_weight": 0.2, "traction_weight": 0.2}}"#,
        )
        .unwrap_err();
        assert!(matches!(err, ConfigError::Weights(_)));
    }

    #[test]
    fn test_from_json_malformed() {
        let err = OrchestratorConfig::from_json_str("{not json").unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[test]
    fn test_zero_timeout_rejected() {
        let config = OrchestratorConfig::default().with_stage_timeout_ms(Some(0));
        assert!(matches!(config.validate(), Err(ConfigError::Invalid { .. })));
    }

    #[test]
    fn test_from_lookup() {
        let config = OrchestratorConfig::from_lookup(lookup(&[
            (ENV_STAGE_LATENCY_MS, "0"),
            (ENV_STAGE_TIMEOUT_MS, "none"),
            (ENV_DUPLICATE_POLICY, "Supersede"),
            (ENV_FOUNDER_WEIGHT, "0.25"),
            (ENV_TRACTION_WEIGHT, "0.25"),
        ]))
        .unwrap();

        assert_eq!(config.stage_latency_ms, 0);
        assert_eq!(config.stage_timeout_ms, None);
        assert_eq!(config.duplicate_policy, DuplicatePolicy::Supersede);
        assert_eq!(config.weights, ScoreWeights::new(0.25, 0.25, 0.25, 0.25));
    }

    #[test]
    fn test_from_lookup_empty_uses_defaults() {
        let config = OrchestratorConfig::from_lookup(|_| None).unwrap();
        assert_eq!(config, OrchestratorConfig::default());
    }

    #[test]
    fn test_from_lookup_bad_values() {
        let err = OrchestratorConfig::from_lookup(lookup(&[(ENV_STAGE_LATENCY_MS, "soon")])).unwrap_err();
        assert!(err.to_string().contains(ENV_STAGE_LATENCY_MS));

        let err = OrchestratorConfig::from_lookup(lookup(&[(ENV_DUPLICATE_POLICY, "queue")])).unwrap_err();
        assert!(err.to_string().contains("queue"));
    }

    #[test]
    fn test_preferences_feed_weights() {
        let prefs = InvestorPreferences::with_weights(ScoreWeights::new(0.1, 0.2, 0.3, 0.4));
        let config = OrchestratorConfig::immediate().with_preferences(&prefs);
        assert_eq!(config.weights, prefs.weights);
    }
}
