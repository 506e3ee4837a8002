//! Error types
//!
//! Defines domain-specific error types for each module of the FTP server.

use std::fmt;
use std::io;

/// Authentication module errors
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthError {
    InvalidPassword(String),
    UserNotFound(String),
    MalformedInput(String),
}

impl fmt::Display for AuthError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AuthError::InvalidPassword(u) => write!(f, "Invalid password for user: {}", u),
            AuthError::UserNotFound(u) => write!(f, "User not found: {}", u),
            AuthError::MalformedInput(s) => write!(f, "Malformed input: {}", s),
        }
    }
}

impl std::error::Error for AuthError {}

/// Navigate module errors
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NavigateError {
    InvalidPath(String),
}

impl fmt::Display for NavigateError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NavigateError::InvalidPath(p) => write!(f, "Invalid path: {}", p),
        }
    }
}

impl std::error::Error for NavigateError {}

/// Session registry errors
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionError {
    CapacityReached(usize),
    AlreadyRegistered(u64),
}

impl fmt::Display for SessionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SessionError::CapacityReached(max) => {
                write!(f, "Session limit reached ({} sessions)", max)
            }
            SessionError::AlreadyRegistered(id) => write!(f, "Session {} already registered", id),
        }
    }
}

impl std::error::Error for SessionError {}

/// Errors that stop the server from starting or running
#[derive(Debug)]
pub enum ServerError {
    Config(config::ConfigError),
    Bind(String, io::Error),
    InvalidAddress(String),
    Io(io::Error),
}

impl fmt::Display for ServerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ServerError::Config(e) => write!(f, "Configuration error: {}", e),
            ServerError::Bind(addr, e) => write!(f, "Failed to bind to {}: {}", addr, e),
            ServerError::InvalidAddress(addr) => write!(f, "Invalid bind address: {}", addr),
            ServerError::Io(e) => write!(f, "I/O error: {}", e),
        }
    }
}

impl std::error::Error for ServerError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ServerError::Config(e) => Some(e),
            ServerError::Bind(_, e) | ServerError::Io(e) => Some(e),
            ServerError::InvalidAddress(_) => None,
        }
    }
}

impl From<config::ConfigError> for ServerError {
    fn from(error: config::ConfigError) -> Self {
        ServerError::Config(error)
    }
}

impl From<io::Error> for ServerError {
    fn from(error: io::Error) -> Self {
        ServerError::Io(error)
    }
}
