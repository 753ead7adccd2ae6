use serde::Deserialize;
use std::path::Path;
use std::time::Duration;

/// TOML-backed tuning knobs for verification and retry behavior.
///
/// Every field has a default, so an empty file (or no file at all) yields a
/// working configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct VerifyConfig {
    /// TTL for a verified-healthy target. Long, because a target that just
    /// served bytes is expected to keep doing so.
    #[serde(default = "default_positive_ttl")]
    pub positive_ttl_secs: u64,
    /// TTL for a failed target. Short, so transient outages self-heal
    /// without repeated probing during the outage window.
    #[serde(default = "default_negative_ttl")]
    pub negative_ttl_secs: u64,
    #[serde(default = "default_max_attempts")]
    pub max_open_attempts: u32,
    /// Upper bound on how long a single server-requested stall is honored.
    #[serde(default = "default_max_stall")]
    pub max_stall_secs: u32,
    #[serde(default = "default_sweep_period")]
    pub sweep_period_secs: u64,
}

impl VerifyConfig {
    pub fn load(path: &Path) -> Result<Self, Box<dyn std::error::Error>> {
        let contents = std::fs::read_to_string(path)?;
        let config: VerifyConfig = toml::from_str(&contents)?;
        Ok(config)
    }

    pub fn sweep_period(&self) -> Duration {
        Duration::from_secs(self.sweep_period_secs)
    }
}

impl Default for VerifyConfig {
    fn default() -> Self {
        Self {
            positive_ttl_secs: default_positive_ttl(),
            negative_ttl_secs: default_negative_ttl(),
            max_open_attempts: default_max_attempts(),
            max_stall_secs: default_max_stall(),
            sweep_period_secs: default_sweep_period(),
        }
    }
}

/// Resolved runtime policy handed to the retry controller.
#[derive(Clone, Copy, Debug)]
pub struct RetryPolicy {
    pub positive_ttl: Duration,
    pub negative_ttl: Duration,
    pub max_open_attempts: u32,
    pub max_stall: Duration,
}

impl RetryPolicy {
    pub fn from_config(config: &VerifyConfig) -> Self {
        Self {
            positive_ttl: Duration::from_secs(config.positive_ttl_secs),
            negative_ttl: Duration::from_secs(config.negative_ttl_secs),
            max_open_attempts: config.max_open_attempts.max(1),
            max_stall: Duration::from_secs(u64::from(config.max_stall_secs)),
        }
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from_config(&VerifyConfig::default())
    }
}

fn default_positive_ttl() -> u64 {
    120
}
fn default_negative_ttl() -> u64 {
    15
}
fn default_max_attempts() -> u32 {
    3
}
fn default_max_stall() -> u32 {
    60
}
fn default_sweep_period() -> u64 {
    5
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_toml_yields_defaults() {
        let config: VerifyConfig = toml::from_str("").unwrap();
        assert_eq!(config.positive_ttl_secs, 120);
        assert_eq!(config.negative_ttl_secs, 15);
        assert_eq!(config.max_open_attempts, 3);
        assert_eq!(config.max_stall_secs, 60);
        assert_eq!(config.sweep_period_secs, 5);
    }

    #[test]
    fn partial_toml_overrides() {
        let config: VerifyConfig =
            toml::from_str("negative_ttl_secs = 2\nmax_open_attempts = 5").unwrap();
        assert_eq!(config.negative_ttl_secs, 2);
        assert_eq!(config.max_open_attempts, 5);
        assert_eq!(config.positive_ttl_secs, 120);
    }

    #[test]
    fn policy_resolution() {
        let policy = RetryPolicy::from_config(&VerifyConfig::default());
        assert_eq!(policy.positive_ttl, Duration::from_secs(120));
        assert_eq!(policy.negative_ttl, Duration::from_secs(15));
        assert_eq!(policy.max_open_attempts, 3);
    }

    #[test]
    fn zero_attempts_is_clamped_to_one() {
        let config = VerifyConfig {
            max_open_attempts: 0,
            ..VerifyConfig::default()
        };
        assert_eq!(RetryPolicy::from_config(&config).max_open_attempts, 1);
    }
}
