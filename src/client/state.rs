//! Module `state`
//!
//! Defines the `Client` struct: the protocol state of one FTP session,
//! including authentication progress, working directory, transfer
//! preferences and per-session counters.

use std::net::SocketAddr;
use tokio::time::Instant;

use crate::navigate::ROOT_PATH;

/// Authentication/navigation state of a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Connected,
    AwaitingPassword,
    Authenticated,
    Closed,
}

/// Representation type selected with TYPE.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransferType {
    Ascii,
    Binary,
}

/// Transmission mode selected with MODE. Only stream mode is supported.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransferMode {
    Stream,
}

/// Represents the state of a connected FTP client.
#[derive(Debug)]
pub struct Client {
    client_addr: SocketAddr,
    state: SessionState,
    pending_username: Option<String>,
    username: Option<String>,
    current_virtual_path: String,
    transfer_type: TransferType,
    transfer_mode: TransferMode,

    bytes_sent: u64,
    bytes_received: u64,
    commands_executed: u64,
    successful_logins: u64,
    failed_logins: u64,

    created_at: Instant,
    started_at: Instant,
    last_activity: Instant,
}

impl Client {
    pub fn new(client_addr: SocketAddr) -> Self {
        let now = Instant::now();
        Self {
            client_addr,
            state: SessionState::Connected,
            pending_username: None,
            username: None,
            current_virtual_path: ROOT_PATH.to_string(),
            transfer_type: TransferType::Ascii,
            transfer_mode: TransferMode::Stream,
            bytes_sent: 0,
            bytes_received: 0,
            commands_executed: 0,
            successful_logins: 0,
            failed_logins: 0,
            created_at: now,
            started_at: now,
            last_activity: now,
        }
    }

    // --------------------
    // State transitions
    // --------------------

    /// USER: buffers the name and waits for PASS. Any previous login is dropped.
    pub fn begin_login(&mut self, username: String) {
        self.pending_username = Some(username);
        self.username = None;
        self.current_virtual_path = ROOT_PATH.to_string();
        self.state = SessionState::AwaitingPassword;
    }

    /// PASS accepted.
    pub fn complete_login(&mut self) {
        self.username = self.pending_username.clone();
        self.successful_logins += 1;
        self.state = SessionState::Authenticated;
    }

    /// PASS rejected. The buffered name is kept for audit and retries.
    pub fn fail_login(&mut self) {
        self.failed_logins += 1;
        self.state = SessionState::Connected;
    }

    /// Terminal transition; nothing is processed afterwards.
    pub fn close(&mut self) {
        self.state = SessionState::Closed;
    }

    // --------------------
    // Getter methods
    // --------------------

    pub fn client_addr(&self) -> SocketAddr {
        self.client_addr
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Returns whether the client has successfully logged in.
    pub fn is_logged_in(&self) -> bool {
        self.state == SessionState::Authenticated
    }

    pub fn is_closed(&self) -> bool {
        self.state == SessionState::Closed
    }

    /// Name supplied by the last USER command, if any.
    pub fn pending_username(&self) -> Option<&str> {
        self.pending_username.as_deref()
    }

    /// Authenticated username, `None` until a login completes.
    pub fn username(&self) -> Option<&str> {
        self.username.as_deref()
    }

    /// Returns the current virtual path of the client.
    pub fn current_virtual_path(&self) -> &str {
        &self.current_virtual_path
    }

    pub fn transfer_type(&self) -> TransferType {
        self.transfer_type
    }

    pub fn transfer_mode(&self) -> TransferMode {
        self.transfer_mode
    }

    pub fn bytes_sent(&self) -> u64 {
        self.bytes_sent
    }

    pub fn bytes_received(&self) -> u64 {
        self.bytes_received
    }

    pub fn commands_executed(&self) -> u64 {
        self.commands_executed
    }

    pub fn successful_logins(&self) -> u64 {
        self.successful_logins
    }

    pub fn failed_logins(&self) -> u64 {
        self.failed_logins
    }

    pub fn created_at(&self) -> Instant {
        self.created_at
    }

    /// Time the session was admitted into the registry.
    pub fn started_at(&self) -> Instant {
        self.started_at
    }

    pub fn last_activity(&self) -> Instant {
        self.last_activity
    }

    // --------------------
    // Setter methods
    // --------------------

    pub fn set_current_virtual_path(&mut self, path: String) {
        self.current_virtual_path = path;
    }

    pub fn set_transfer_type(&mut self, transfer_type: TransferType) {
        self.transfer_type = transfer_type;
    }

    pub fn set_transfer_mode(&mut self, mode: TransferMode) {
        self.transfer_mode = mode;
    }

    pub fn mark_started(&mut self, at: Instant) {
        self.started_at = at;
    }

    // --------------------
    // Counters
    // --------------------

    /// Called once per dispatched command, whatever its outcome.
    pub fn record_command(&mut self, at: Instant) {
        self.commands_executed += 1;
        self.last_activity = at;
    }

    pub fn record_sent(&mut self, bytes: u64) {
        self.bytes_sent += bytes;
    }

    pub fn record_received(&mut self, bytes: u64) {
        self.bytes_received += bytes;
    }
}
