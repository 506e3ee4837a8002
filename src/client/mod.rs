//! Client management system
//!
//! Handles client connections, state management, and session lifecycle.

pub mod context;
pub mod handler;
pub mod registry;
pub mod session;
pub mod state;

pub use context::SessionContext;
pub use handler::handle_client;
pub use registry::{RegistryStatistics, SessionRegistry};
pub use session::{Session, SessionId, SessionInfo};
pub use state::{Client, SessionState};
