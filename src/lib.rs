//! RAX FTP Server
//!
//! FTP control-channel server: per-connection session state machine, a
//! concurrent session registry, sliding-window rate limiting and an
//! acceptor with admission control.

pub mod auth;
pub mod client;
pub mod config;
pub mod error;
pub mod middleware;
pub mod navigate;
pub mod protocol;
pub mod server;
pub mod vhost;

pub use server::{Server, ServerHandle, Shutdown};
