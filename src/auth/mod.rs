//! Authentication system
//!
//! Handles credential storage and validation behind the `Authenticator` trait.

pub mod credentials;
pub mod validator;

pub use credentials::{ANONYMOUS_USER, UserStore};
pub use validator::Authenticator;
