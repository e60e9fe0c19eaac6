//! Admission control configuration.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Per-client token bucket settings.
///
/// `rps` and `burst` are process-wide: every client gets a bucket of the
/// same shape.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LimiterConfig {
    /// When false every request is admitted and no client state is kept.
    #[serde(default = "default_enabled")]
    pub enabled: bool,

    /// Sustained refill rate, in tokens per second.
    #[serde(default = "default_rps")]
    pub rps: f64,

    /// Bucket capacity.
    #[serde(default = "default_burst")]
    pub burst: u32,

    /// How often idle clients are swept out of memory.
    #[serde(default = "default_sweep_interval", with = "super::duration")]
    pub sweep_interval: Duration,
}

impl LimiterConfig {
    /// Clients not seen for longer than this are evicted by the sweeper.
    pub fn stale_after(&self) -> Duration {
        self.sweep_interval * 3
    }
}

impl Default for LimiterConfig {
    fn default() -> Self {
        Self {
            enabled: default_enabled(),
            rps: default_rps(),
            burst: default_burst(),
            sweep_interval: default_sweep_interval(),
        }
    }
}

fn default_enabled() -> bool {
    true
}

fn default_rps() -> f64 {
    2.0
}

fn default_burst() -> u32 {
    4
}

fn default_sweep_interval() -> Duration {
    Duration::from_secs(60)
}
