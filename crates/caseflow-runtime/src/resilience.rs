//! Circuit breaker for the upstream collaborators.
//!
//! When retrieval or generation calls fail repeatedly, the circuit for that
//! upstream opens and guidance population fails fast with
//! `UpstreamUnavailable` instead of hammering a dead collaborator. Each
//! upstream has its own circuit so the retriever can recover independently
//! of the generator.

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::{Duration, Instant};

/// The two upstream collaborators guidance population depends on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum UpstreamKind {
    Retrieval,
    Generation,
}

impl UpstreamKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            UpstreamKind::Retrieval => "retrieval",
            UpstreamKind::Generation => "generation",
        }
    }
}

/// Circuit breaker configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BreakerConfig {
    /// Failures before opening the circuit
    pub failure_threshold: u32,

    /// Time before attempting recovery (in seconds)
    #[serde(with = "duration_secs")]
    pub recovery_timeout: Duration,

    /// Successes needed to close the circuit again
    pub success_threshold: u32,
}

mod duration_secs {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_u64(duration.as_secs())
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let secs = u64::deserialize(deserializer)?;
        Ok(Duration::from_secs(secs))
    }
}

impl Default for BreakerConfig {
    fn default() -> Self {
        Self {
            failure_threshold: 3,
            recovery_timeout: Duration::from_secs(30),
            success_threshold: 2,
        }
    }
}

/// State of one circuit.
#[derive(Debug, Clone)]
enum CircuitState {
    /// Normal operation
    Closed { failures: u32 },

    /// Circuit is open, calls fail fast
    Open { opened_at: Instant },

    /// Testing if the circuit can close
    HalfOpen { successes: u32 },
}

/// Per-upstream circuit breaker.
pub struct UpstreamBreaker {
    states: RwLock<HashMap<UpstreamKind, CircuitState>>,
    config: BreakerConfig,
}

impl UpstreamBreaker {
    pub fn new(config: BreakerConfig) -> Self {
        Self {
            states: RwLock::new(HashMap::new()),
            config,
        }
    }

    /// Whether calls to this upstream should fail fast right now.
    pub fn is_open(&self, upstream: UpstreamKind) -> bool {
        let states = self.states.read();
        match states.get(&upstream) {
            Some(CircuitState::Open { opened_at }) => {
                if opened_at.elapsed() >= self.config.recovery_timeout {
                    // Recovery window elapsed; allow a probe call through.
                    drop(states);
                    self.states
                        .write()
                        .insert(upstream, CircuitState::HalfOpen { successes: 0 });
                    false
                } else {
                    true
                }
            }
            _ => false,
        }
    }

    /// Record a successful call.
    pub fn record_success(&self, upstream: UpstreamKind) {
        let mut states = self.states.write();
        let state = states
            .entry(upstream)
            .or_insert(CircuitState::Closed { failures: 0 });

        match state {
            CircuitState::Closed { failures } => {
                *failures = 0;
            }
            CircuitState::HalfOpen { successes } => {
                *successes += 1;
                if *successes >= self.config.success_threshold {
                    *state = CircuitState::Closed { failures: 0 };
                    tracing::info!(upstream = upstream.as_str(), "circuit closed");
                }
            }
            CircuitState::Open { .. } => {
                // Success while open happens when a call outlived the
                // transition; treat it as a probe result.
                *state = CircuitState::HalfOpen { successes: 1 };
            }
        }
    }

    /// Record a failed call.
    pub fn record_failure(&self, upstream: UpstreamKind) {
        let mut states = self.states.write();
        let state = states
            .entry(upstream)
            .or_insert(CircuitState::Closed { failures: 0 });

        match state {
            CircuitState::Closed { failures } => {
                *failures += 1;
                if *failures >= self.config.failure_threshold {
                    *state = CircuitState::Open {
                        opened_at: Instant::now(),
                    };
                    tracing::warn!(upstream = upstream.as_str(), "circuit opened");
                }
            }
            CircuitState::HalfOpen { .. } => {
                // Probe failed; reopen.
                *state = CircuitState::Open {
                    opened_at: Instant::now(),
                };
                tracing::warn!(upstream = upstream.as_str(), "circuit reopened");
            }
            CircuitState::Open { .. } => {}
        }
    }
}
