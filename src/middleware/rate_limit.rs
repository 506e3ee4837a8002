//! Rate limiting middleware
//!
//! Sliding-window counters keyed by client IP: one window for new
//! connections (with an extra global cap) and one for commands.

use std::collections::{BTreeMap, HashMap, VecDeque};
use std::net::IpAddr;
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

use log::{info, warn};
use tokio::time::Instant;

use crate::config::RateLimitConfig;

/// Live rate limiter parameters
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RateLimitSettings {
    pub enabled: bool,
    pub connection_window: Duration,
    pub request_window: Duration,
    pub max_connections_per_ip: usize,
    pub max_connections_per_window: usize,
    pub max_requests_per_ip: usize,
}

impl From<&RateLimitConfig> for RateLimitSettings {
    fn from(config: &RateLimitConfig) -> Self {
        Self {
            enabled: config.enabled,
            connection_window: Duration::from_secs(config.connection_window_secs),
            request_window: Duration::from_secs(config.request_window_secs),
            max_connections_per_ip: config.max_connections_per_ip,
            max_connections_per_window: config.max_connections_per_window,
            max_requests_per_ip: config.max_requests_per_ip,
        }
    }
}

type Timestamps = HashMap<IpAddr, VecDeque<Instant>>;

struct LimiterState {
    settings: RateLimitSettings,
    connections: Timestamps,
    requests: Timestamps,
}

/// Sliding-window rate limiter shared by the acceptor and every session.
///
/// All checks run synchronously under one short-lived lock.
pub struct RateLimiter {
    state: Mutex<LimiterState>,
}

impl RateLimiter {
    pub fn new(settings: RateLimitSettings) -> Self {
        Self {
            state: Mutex::new(LimiterState {
                settings,
                connections: HashMap::new(),
                requests: HashMap::new(),
            }),
        }
    }

    fn lock(&self) -> MutexGuard<'_, LimiterState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn is_enabled(&self) -> bool {
        self.lock().settings.enabled
    }

    pub fn allow_connection(&self, ip: IpAddr) -> bool {
        self.allow_connection_at(ip, Instant::now())
    }

    /// Admission check for a new connection from `ip` at `now`.
    pub fn allow_connection_at(&self, ip: IpAddr, now: Instant) -> bool {
        let mut guard = self.lock();
        let state = &mut *guard;
        if !state.settings.enabled {
            return true;
        }

        purge(&mut state.connections, now, state.settings.connection_window);

        let from_ip = state.connections.get(&ip).map_or(0, VecDeque::len);
        if from_ip >= state.settings.max_connections_per_ip {
            warn!("Rate limit exceeded for IP {}: max connections per IP reached", ip);
            return false;
        }

        let total: usize = state.connections.values().map(VecDeque::len).sum();
        if total >= state.settings.max_connections_per_window {
            warn!("Global connection rate limit exceeded ({} in window)", total);
            return false;
        }

        state.connections.entry(ip).or_default().push_back(now);
        true
    }

    pub fn allow_request(&self, ip: IpAddr) -> bool {
        self.allow_request_at(ip, Instant::now())
    }

    /// Per-command check for `ip` at `now`; there is no global request cap.
    pub fn allow_request_at(&self, ip: IpAddr, now: Instant) -> bool {
        let mut guard = self.lock();
        let state = &mut *guard;
        if !state.settings.enabled {
            return true;
        }

        purge(&mut state.requests, now, state.settings.request_window);

        let from_ip = state.requests.entry(ip).or_default();
        if from_ip.len() >= state.settings.max_requests_per_ip {
            warn!("Rate limit exceeded for IP {}: max requests per window reached", ip);
            if from_ip.is_empty() {
                state.requests.remove(&ip);
            }
            return false;
        }

        from_ip.push_back(now);
        true
    }

    pub fn settings(&self) -> RateLimitSettings {
        self.lock().settings.clone()
    }

    /// Replaces the live parameters. Disabling also drops all bookkeeping.
    pub fn set_settings(&self, settings: RateLimitSettings) {
        let mut state = self.lock();
        if !settings.enabled {
            state.connections.clear();
            state.requests.clear();
        }
        info!("Rate limiter settings updated: {:?}", settings);
        state.settings = settings;
    }

    /// Connection timestamps currently tracked per IP
    pub fn connection_stats(&self) -> BTreeMap<IpAddr, usize> {
        counts(&self.lock().connections)
    }

    /// Request timestamps currently tracked per IP
    pub fn request_stats(&self) -> BTreeMap<IpAddr, usize> {
        counts(&self.lock().requests)
    }

    pub fn reset(&self) {
        let mut state = self.lock();
        state.connections.clear();
        state.requests.clear();
        info!("Rate limiter statistics reset");
    }
}

/// Drops timestamps older than `now - window` and then empty entries.
fn purge(records: &mut Timestamps, now: Instant, window: Duration) {
    let Some(cutoff) = now.checked_sub(window) else {
        return;
    };
    records.retain(|_, timestamps| {
        while timestamps.front().is_some_and(|&t| t < cutoff) {
            timestamps.pop_front();
        }
        !timestamps.is_empty()
    });
}

fn counts(records: &Timestamps) -> BTreeMap<IpAddr, usize> {
    records.iter().map(|(ip, t)| (*ip, t.len())).collect()
}
