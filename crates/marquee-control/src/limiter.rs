//! Per-client token bucket admission control.
//!
//! One bucket per client IP, all buckets the same shape (`burst` capacity,
//! `rps` continuous refill). A single mutex covers the whole map; it is only
//! ever held for a lookup and a few arithmetic operations, never across an
//! `.await`.

use crate::error::LimiterError;
use marquee_core::config::LimiterConfig;
use std::collections::HashMap;
use std::net::{IpAddr, SocketAddr};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::{Duration, Instant};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

#[derive(Debug)]
struct ClientState {
    tokens: f64,
    last_refill: Instant,
    last_seen: Instant,
}

#[derive(Debug)]
pub struct RateLimiter {
    enabled: bool,
    rps: f64,
    burst: f64,
    sweep_interval: Duration,
    stale_after: Duration,
    clients: Mutex<HashMap<IpAddr, ClientState>>,
}

/// Parse `ip:port` (as seen on a socket) or a bare IP.
pub fn parse_client_key(key: &str) -> Result<IpAddr, LimiterError> {
    if let Ok(addr) = key.parse::<SocketAddr>() {
        return Ok(addr.ip());
    }
    key.parse::<IpAddr>()
        .map_err(|_| LimiterError::MalformedAddress(key.to_string()))
}

impl RateLimiter {
    pub fn new(config: &LimiterConfig) -> Self {
        Self {
            enabled: config.enabled,
            rps: config.rps,
            burst: f64::from(config.burst),
            sweep_interval: config.sweep_interval,
            stale_after: config.stale_after(),
            clients: Mutex::new(HashMap::new()),
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn sweep_interval(&self) -> Duration {
        self.sweep_interval
    }

    /// Take one token for `client_key` if one is available. Never blocks.
    pub fn admit(&self, client_key: &str) -> Result<bool, LimiterError> {
        self.admit_at(client_key, Instant::now())
    }

    pub fn admit_at(&self, client_key: &str, now: Instant) -> Result<bool, LimiterError> {
        if !self.enabled {
            return Ok(true);
        }
        let ip = parse_client_key(client_key)?;
        self.admit_ip_at(ip, now)
    }

    fn admit_ip_at(&self, ip: IpAddr, now: Instant) -> Result<bool, LimiterError> {
        let mut clients = self.lock()?;
        let burst = self.burst;
        let state = clients.entry(ip).or_insert_with(|| ClientState {
            tokens: burst,
            last_refill: now,
            last_seen: now,
        });

        let elapsed = now.saturating_duration_since(state.last_refill);
        state.tokens = (state.tokens + elapsed.as_secs_f64() * self.rps).min(self.burst);
        state.last_refill = state.last_refill.max(now);
        state.last_seen = state.last_seen.max(now);

        if state.tokens >= 1.0 {
            state.tokens -= 1.0;
            Ok(true)
        } else {
            Ok(false)
        }
    }

    /// Drop every client not seen within the staleness threshold.
    /// Returns how many were evicted.
    pub fn sweep(&self) -> Result<usize, LimiterError> {
        self.sweep_at(Instant::now())
    }

    pub fn sweep_at(&self, now: Instant) -> Result<usize, LimiterError> {
        let mut clients = self.lock()?;
        let before = clients.len();
        let stale_after = self.stale_after;
        clients.retain(|_, state| now.saturating_duration_since(state.last_seen) <= stale_after);
        Ok(before - clients.len())
    }

    /// Number of clients currently holding a bucket.
    pub fn tracked_clients(&self) -> usize {
        self.lock().map(|clients| clients.len()).unwrap_or(0)
    }

    fn lock(&self) -> Result<MutexGuard<'_, HashMap<IpAddr, ClientState>>, LimiterError> {
        self.clients.lock().map_err(|_| LimiterError::Poisoned)
    }
}

/// Run [`RateLimiter::sweep`] every sweep interval for the life of the task.
///
/// Does nothing useful when the limiter is disabled, so callers may skip it.
pub fn spawn_sweeper(limiter: Arc<RateLimiter>) -> JoinHandle<()> {
    let period = limiter.sweep_interval();
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        // The first tick completes immediately.
        ticker.tick().await;
        loop {
            ticker.tick().await;
            match limiter.sweep() {
                Ok(evicted) => {
                    tracing::debug!(
                        evicted,
                        remaining = limiter.tracked_clients(),
                        "limiter sweep"
                    );
                }
                Err(e) => {
                    tracing::error!(error = %e, "limiter sweep failed");
                }
            }
        }
    })
}
