//! Administrative surface
//!
//! `ServerHandle` is a cheap clone that exposes live inspection and
//! runtime tuning of a running server.

use std::net::IpAddr;
use std::sync::Arc;
use std::time::Duration;

use log::info;

use crate::client::{RegistryStatistics, SessionInfo, SessionRegistry};
use crate::config::SharedRuntimeConfig;
use crate::middleware::rate_limit::{RateLimitSettings, RateLimiter};
use crate::server::shutdown::Shutdown;
use crate::server::stats::{ServerStatistics, StatsSnapshot};

#[derive(Clone)]
pub struct ServerHandle {
    registry: Arc<SessionRegistry>,
    rate_limiter: Arc<RateLimiter>,
    stats: Arc<ServerStatistics>,
    runtime: SharedRuntimeConfig,
    shutdown: Shutdown,
}

impl ServerHandle {
    pub(crate) fn new(
        registry: Arc<SessionRegistry>,
        rate_limiter: Arc<RateLimiter>,
        stats: Arc<ServerStatistics>,
        runtime: SharedRuntimeConfig,
        shutdown: Shutdown,
    ) -> Self {
        Self {
            registry,
            rate_limiter,
            stats,
            runtime,
            shutdown,
        }
    }

    pub async fn session_count(&self) -> usize {
        self.registry.len().await
    }

    pub async fn registry_statistics(&self) -> RegistryStatistics {
        self.registry.statistics().await
    }

    pub async fn sessions(&self) -> Vec<SessionInfo> {
        self.registry.sessions().await
    }

    pub fn statistics(&self) -> StatsSnapshot {
        self.stats.snapshot()
    }

    pub async fn disconnect_by_address(&self, ip: IpAddr) -> usize {
        self.registry.disconnect_by_address(ip).await
    }

    pub async fn disconnect_by_user(&self, username: &str) -> usize {
        self.registry.disconnect_by_user(username).await
    }

    /// New limit applies to future admissions; live sessions are kept.
    pub async fn set_max_clients(&self, max_clients: usize) {
        self.runtime.write().await.max_clients = max_clients;
        info!("Max clients set to {}", max_clients);
    }

    /// `Duration::ZERO` disables the absolute session timeout.
    pub async fn set_session_timeout(&self, limit: Duration) {
        self.runtime.write().await.session_timeout_secs = limit.as_secs();
        info!("Session timeout set to {}s", limit.as_secs());
    }

    /// `Duration::ZERO` disables the idle timeout.
    pub async fn set_idle_timeout(&self, limit: Duration) {
        self.runtime.write().await.idle_timeout_secs = limit.as_secs();
        info!("Idle timeout set to {}s", limit.as_secs());
    }

    pub fn rate_limits(&self) -> RateLimitSettings {
        self.rate_limiter.settings()
    }

    pub fn set_rate_limits(&self, settings: RateLimitSettings) {
        self.rate_limiter.set_settings(settings);
    }

    /// Forgets all recorded connection and request timestamps.
    pub fn reset_rate_limiter(&self) {
        self.rate_limiter.reset();
    }

    pub fn shutdown(&self) {
        self.shutdown.trigger();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::test_support::shared_runtime;
    use crate::config::RateLimitConfig;

    fn handle() -> ServerHandle {
        let runtime = shared_runtime(10, 3600, 600);
        ServerHandle::new(
            Arc::new(SessionRegistry::new(Arc::clone(&runtime))),
            Arc::new(RateLimiter::new(RateLimitSettings::from(&RateLimitConfig::default()))),
            Arc::new(ServerStatistics::new()),
            runtime,
            Shutdown::new(),
        )
    }

    #[tokio::test]
    async fn test_runtime_updates_are_visible() {
        let handle = handle();
        handle.set_max_clients(3).await;
        handle.set_idle_timeout(Duration::ZERO).await;
        handle.set_session_timeout(Duration::from_secs(90)).await;

        let runtime = handle.runtime.read().await;
        assert_eq!(runtime.max_clients, 3);
        assert_eq!(runtime.idle_timeout(), None);
        assert_eq!(runtime.session_timeout(), Some(Duration::from_secs(90)));
        drop(runtime);
        assert_eq!(handle.registry.capacity().await, 3);
    }

    #[tokio::test]
    async fn test_rate_limit_controls() {
        let handle = handle();
        let ip: IpAddr = "10.0.0.9".parse().unwrap();
        let mut settings = handle.rate_limits();
        settings.max_connections_per_ip = 1;
        handle.set_rate_limits(settings);

        assert!(handle.rate_limiter.allow_connection(ip));
        assert!(!handle.rate_limiter.allow_connection(ip));
        handle.reset_rate_limiter();
        assert!(handle.rate_limiter.allow_connection(ip));
    }

    #[test]
    fn test_shutdown_is_shared() {
        let handle = handle();
        let observer = handle.shutdown.subscribe();
        handle.clone().shutdown();
        assert!(*observer.borrow());
    }
}
