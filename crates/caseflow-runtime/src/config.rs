//! Runtime configuration.
//!
//! Durations are authored as human-readable strings ("15s", "2m") and parsed
//! with humantime, so deployment config reads the way operators write it.

use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::resilience::BreakerConfig;

mod duration_str {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&humantime::format_duration(*duration).to_string())
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let text = String::deserialize(deserializer)?;
        humantime::parse_duration(&text).map_err(serde::de::Error::custom)
    }
}

/// Configuration for the discipline-guidance cache service.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GuidanceConfig {
    /// Freshness window for cached guidance, in days.
    pub ttl_days: u32,

    /// Timeout applied to each upstream call (retrieval, generation).
    #[serde(with = "duration_str")]
    pub upstream_timeout: Duration,

    /// Additional attempts after a failed upstream call (0 = no retry).
    pub retry_attempts: usize,

    /// Circuit breaker settings for the upstream collaborators.
    #[serde(default)]
    pub breaker: BreakerConfig,
}

impl Default for GuidanceConfig {
    fn default() -> Self {
        Self {
            ttl_days: 30,
            upstream_timeout: Duration::from_secs(15),
            retry_attempts: 2,
            breaker: BreakerConfig::default(),
        }
    }
}

/// Top-level runtime configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RuntimeConfig {
    #[serde(default)]
    pub guidance: GuidanceConfig,
}
