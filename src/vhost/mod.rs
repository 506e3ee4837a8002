//! Virtual hosts
//!
//! Maps the address a connection arrived on to a document root and welcome
//! banner. Sessions consume the resolved host only when they are created.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;

use log::debug;

use crate::config::{StartupConfig, VirtualHostEntry};

/// Policy object handed to a new session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VirtualHost {
    pub hostname: String,
    pub document_root: PathBuf,
    pub welcome_message: String,
}

/// Resolves a hostname to its virtual host, falling back to a default.
pub trait VirtualHostResolver: Send + Sync {
    fn resolve(&self, hostname: &str) -> Arc<VirtualHost>;
}

/// Immutable hostname → virtual host table built from configuration
pub struct VirtualHostTable {
    hosts: HashMap<String, Arc<VirtualHost>>,
    default: Arc<VirtualHost>,
}

impl VirtualHostTable {
    /// Builds the table; disabled entries are skipped.
    pub fn new(startup: &StartupConfig, entries: &[VirtualHostEntry]) -> Self {
        let default = Arc::new(VirtualHost {
            hostname: startup.server_name.clone(),
            document_root: startup.server_root_path(),
            welcome_message: startup.welcome_message.clone(),
        });

        let hosts = entries
            .iter()
            .filter(|entry| entry.enabled)
            .map(|entry| {
                let host = VirtualHost {
                    hostname: entry.hostname.clone(),
                    document_root: PathBuf::from(&entry.document_root),
                    welcome_message: entry
                        .welcome_message
                        .clone()
                        .unwrap_or_else(|| format!("Welcome to {}", entry.hostname)),
                };
                (entry.hostname.to_ascii_lowercase(), Arc::new(host))
            })
            .collect();

        Self { hosts, default }
    }

    pub fn default_host(&self) -> Arc<VirtualHost> {
        Arc::clone(&self.default)
    }

    pub fn len(&self) -> usize {
        self.hosts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.hosts.is_empty()
    }
}

impl VirtualHostResolver for VirtualHostTable {
    fn resolve(&self, hostname: &str) -> Arc<VirtualHost> {
        match self.hosts.get(&hostname.to_ascii_lowercase()) {
            Some(host) => Arc::clone(host),
            None => {
                debug!("No virtual host for {}, using default", hostname);
                self.default_host()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(hostname: &str, enabled: bool) -> VirtualHostEntry {
        VirtualHostEntry {
            hostname: hostname.into(),
            document_root: format!("/srv/{}", hostname),
            welcome_message: None,
            enabled,
        }
    }

    #[test]
    fn test_resolve_known_host() {
        let table = VirtualHostTable::new(
            &StartupConfig::default(),
            &[entry("FTP.Example.com", true)],
        );
        let host = table.resolve("ftp.example.com");
        assert_eq!(host.document_root, PathBuf::from("/srv/FTP.Example.com"));
        assert_eq!(host.welcome_message, "Welcome to FTP.Example.com");
    }

    #[test]
    fn test_unknown_and_disabled_hosts_fall_back_to_default() {
        let table = VirtualHostTable::new(
            &StartupConfig::default(),
            &[entry("10.0.0.1", false)],
        );
        assert!(table.is_empty());
        let host = table.resolve("10.0.0.1");
        assert_eq!(host.welcome_message, "Welcome to RAX FTP Server");
        assert_eq!(*host, *table.resolve("unknown"));
    }
}
