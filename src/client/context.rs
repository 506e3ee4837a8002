//! Shared, read-mostly dependencies of every session task.

use std::sync::Arc;

use crate::auth::Authenticator;
use crate::config::StartupConfig;
use crate::middleware::rate_limit::RateLimiter;
use crate::server::stats::ServerStatistics;

pub struct SessionContext {
    pub authenticator: Arc<dyn Authenticator>,
    pub rate_limiter: Arc<RateLimiter>,
    pub stats: Arc<ServerStatistics>,
    pub max_command_length: usize,
    /// 0 = unlimited
    pub max_login_attempts: u32,
}

impl SessionContext {
    pub fn new(
        startup: &StartupConfig,
        authenticator: Arc<dyn Authenticator>,
        rate_limiter: Arc<RateLimiter>,
        stats: Arc<ServerStatistics>,
    ) -> Self {
        Self {
            authenticator,
            rate_limiter,
            stats,
            max_command_length: startup.max_command_length,
            max_login_attempts: startup.max_login_attempts,
        }
    }
}
