//! Server core functionality
//!
//! This module contains the acceptor, the administrative handle, shutdown
//! coordination and process-wide statistics.

pub mod admin;
pub mod core;
pub mod shutdown;
pub mod stats;

pub use admin::ServerHandle;
pub use self::core::Server;
pub use shutdown::Shutdown;
pub use stats::{ServerStatistics, StatsSnapshot};
