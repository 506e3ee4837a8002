//! Authentication validator
//!
//! Defines the `Authenticator` seam consumed by sessions and implements it
//! for the in-memory `UserStore`.

use log::{info, warn};

use super::credentials::{ANONYMOUS_USER, UserStore};
use crate::error::AuthError;

/// Accept/deny decision for a username/password pair.
///
/// Implementations are shared read-only across every session.
pub trait Authenticator: Send + Sync {
    fn authenticate(&self, username: &str, password: &str) -> Result<(), AuthError>;
}

/// Performs basic input sanitation to check for malicious or malformed usernames/passwords.
fn is_valid_input(input: &str, max_length: usize) -> bool {
    !input.trim().is_empty() && input.len() <= max_length && !input.contains(['\r', '\n', '\0'])
}

impl Authenticator for UserStore {
    fn authenticate(&self, username: &str, password: &str) -> Result<(), AuthError> {
        if !is_valid_input(username, self.max_input_length()) {
            return Err(AuthError::MalformedInput("Invalid username format".into()));
        }

        if username == ANONYMOUS_USER && self.allow_anonymous() {
            info!("Anonymous login accepted");
            return Ok(());
        }

        if !is_valid_input(password, self.max_input_length()) {
            return Err(AuthError::MalformedInput("Invalid password format".into()));
        }

        match self.password_for(username) {
            Some(stored) if stored == password => Ok(()),
            Some(_) => {
                warn!("Authentication failed: invalid password for user {}", username);
                Err(AuthError::InvalidPassword(username.to_string()))
            }
            None => {
                warn!("Authentication failed: user not found: {}", username);
                Err(AuthError::UserNotFound(username.to_string()))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::UserEntry;

    fn store(allow_anonymous: bool) -> UserStore {
        let users = vec![UserEntry {
            username: "admin".into(),
            password: "admin".into(),
        }];
        UserStore::new(&users, allow_anonymous, 64)
    }

    #[test]
    fn test_valid_credentials() {
        assert!(store(false).authenticate("admin", "admin").is_ok());
    }

    #[test]
    fn test_wrong_password_and_unknown_user() {
        let store = store(false);
        assert_eq!(
            store.authenticate("admin", "nope"),
            Err(AuthError::InvalidPassword("admin".into()))
        );
        assert_eq!(
            store.authenticate("mallory", "admin"),
            Err(AuthError::UserNotFound("mallory".into()))
        );
    }

    #[test]
    fn test_anonymous_only_when_enabled() {
        assert!(store(true).authenticate("anonymous", "guest@example.com").is_ok());
        assert!(store(false).authenticate("anonymous", "guest@example.com").is_err());
    }

    #[test]
    fn test_anonymous_password_is_not_checked() {
        let store = store(true);
        assert!(store.authenticate("anonymous", "").is_ok());
        assert!(store.authenticate("anonymous", "bad\r\npass").is_ok());
        assert!(store.authenticate("anonymous", &"x".repeat(500)).is_ok());
    }

    #[test]
    fn test_rejects_control_characters_and_long_input() {
        let store = store(false);
        assert!(matches!(
            store.authenticate("ad\0min", "admin"),
            Err(AuthError::MalformedInput(_))
        ));
        let long = "x".repeat(65);
        assert!(matches!(
            store.authenticate("admin", &long),
            Err(AuthError::MalformedInput(_))
        ));
    }

    #[test]
    fn test_default_users() {
        let store = UserStore::with_default_users(false, 64);
        assert_eq!(store.len(), 3);
        assert!(store.authenticate("alice", "alice123").is_ok());
    }
}
