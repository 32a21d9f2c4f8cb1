//! Configuration for the netdiag engine

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Tunable defaults shared by the engine components
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Freshness window for DNS cache entries, in seconds. Distinct from
    /// the TTL carried by the records themselves.
    pub dns_cache_window_secs: u64,

    /// Per-attempt resolver timeout in milliseconds
    pub dns_lookup_timeout_ms: u64,

    /// Overall bound on one DNS query in milliseconds
    pub dns_overall_timeout_ms: u64,

    /// Default HTTP request timeout in seconds (connect + read)
    pub http_timeout_secs: f64,

    /// Grace period added to the ping wait bound, in seconds
    pub ping_grace_secs: u64,

    /// Identifying User-Agent sent when the caller supplies none
    pub user_agent: String,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            dns_cache_window_secs: 300, // 5 minute cache window
            dns_lookup_timeout_ms: 5_000,
            dns_overall_timeout_ms: 10_000,
            http_timeout_secs: 30.0,
            ping_grace_secs: 5,
            user_agent: format!("netdiag/{}", env!("CARGO_PKG_VERSION")),
        }
    }
}

impl EngineConfig {
    /// Set the DNS cache window
    pub fn with_dns_cache_window(mut self, secs: u64) -> Self {
        self.dns_cache_window_secs = secs;
        self
    }

    /// Set the default HTTP timeout
    pub fn with_http_timeout(mut self, secs: f64) -> Self {
        self.http_timeout_secs = secs;
        self
    }

    /// Set the identifying User-Agent
    pub fn with_user_agent(mut self, agent: impl Into<String>) -> Self {
        self.user_agent = agent.into();
        self
    }

    /// Validate the configuration
    pub fn validate(&self) -> crate::Result<()> {
        if self.dns_lookup_timeout_ms == 0 || self.dns_overall_timeout_ms == 0 {
            return Err(crate::DiagError::ConfigError(
                "DNS timeouts must be non-zero".to_string(),
            ));
        }
        if self.dns_overall_timeout_ms < self.dns_lookup_timeout_ms {
            return Err(crate::DiagError::ConfigError(
                "overall DNS timeout must be at least the per-attempt timeout".to_string(),
            ));
        }
        if duration_from_secs(self.http_timeout_secs).is_err() {
            return Err(crate::DiagError::ConfigError(
                "HTTP timeout must be a positive number of seconds".to_string(),
            ));
        }
        Ok(())
    }

    /// DNS cache window as a Duration
    pub fn dns_cache_window(&self) -> Duration {
        Duration::from_secs(self.dns_cache_window_secs)
    }

    /// Per-attempt resolver timeout as a Duration
    pub fn dns_lookup_timeout(&self) -> Duration {
        Duration::from_millis(self.dns_lookup_timeout_ms)
    }

    /// Overall DNS query bound as a Duration
    pub fn dns_overall_timeout(&self) -> Duration {
        Duration::from_millis(self.dns_overall_timeout_ms)
    }
}

/// Convert caller-supplied seconds into a Duration. Rejects non-positive,
/// non-finite, and oversized values instead of panicking on conversion.
pub(crate) fn duration_from_secs(secs: f64) -> crate::Result<Duration> {
    match Duration::try_from_secs_f64(secs) {
        Ok(duration) if secs > 0.0 => Ok(duration),
        _ => Err(crate::DiagError::InvalidParameter(format!(
            "timeout must be a positive number of seconds, got {secs}"
        ))),
    }
}
