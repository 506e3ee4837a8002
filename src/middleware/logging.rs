//! Logging middleware
//!
//! Provides request logging functionality.

use std::net::SocketAddr;

use log::{debug, info};

use crate::protocol::Command;

/// Log a client connection
pub fn log_connection(client_addr: SocketAddr, hostname: &str) {
    info!("Client connected: {} (virtual host {})", client_addr, hostname);
}

/// Log a client disconnection
pub fn log_disconnection(client_addr: SocketAddr, commands_executed: u64) {
    info!(
        "Client disconnected: {} after {} commands",
        client_addr, commands_executed
    );
}

/// Log a client command. Passwords are redacted by `Command`'s `Display`.
pub fn log_command(client_addr: SocketAddr, command: &Command) {
    debug!("Client {} executed: {}", client_addr, command);
}
