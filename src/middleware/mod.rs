//! Server middleware
//!
//! Provides logging and rate limiting middleware.

pub mod logging;
pub mod rate_limit;

pub use rate_limit::{RateLimitSettings, RateLimiter};
