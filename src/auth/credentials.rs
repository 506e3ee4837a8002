//! Credential storage
//!
//! In-memory user store built from the configured user entries.

use std::collections::HashMap;

use crate::config::UserEntry;

/// Name accepted for anonymous logins when enabled
pub const ANONYMOUS_USER: &str = "anonymous";

/// Immutable username → password map shared by all sessions.
///
/// With anonymous login enabled, `anonymous` is accepted with any password,
/// including an empty or malformed one; the password is never inspected.
#[derive(Debug, Clone)]
pub struct UserStore {
    credentials: HashMap<String, String>,
    allow_anonymous: bool,
    max_input_length: usize,
}

impl UserStore {
    pub fn new(users: &[UserEntry], allow_anonymous: bool, max_input_length: usize) -> Self {
        let credentials = users
            .iter()
            .map(|entry| (entry.username.clone(), entry.password.clone()))
            .collect();

        Self {
            credentials,
            allow_anonymous,
            max_input_length,
        }
    }

    /// Store used when the configuration lists no users
    pub fn with_default_users(allow_anonymous: bool, max_input_length: usize) -> Self {
        let defaults = [("alice", "alice123"), ("bob", "bob123"), ("admin", "admin123")]
            .into_iter()
            .map(|(username, password)| UserEntry {
                username: username.to_string(),
                password: password.to_string(),
            })
            .collect::<Vec<_>>();
        Self::new(&defaults, allow_anonymous, max_input_length)
    }

    pub(crate) fn password_for(&self, username: &str) -> Option<&str> {
        self.credentials.get(username).map(String::as_str)
    }

    pub fn allow_anonymous(&self) -> bool {
        self.allow_anonymous
    }

    pub fn max_input_length(&self) -> usize {
        self.max_input_length
    }

    pub fn len(&self) -> usize {
        self.credentials.len()
    }

    pub fn is_empty(&self) -> bool {
        self.credentials.is_empty()
    }
}
