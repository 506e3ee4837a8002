//! Client session management
//!
//! `Session` is the shared handle for one connection. The registry and the
//! session's own task both hold it; the transport itself stays with the task,
//! which releases it when the close signal fires or the peer goes away.

use std::net::{IpAddr, SocketAddr};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use log::debug;
use tokio::sync::watch;
use tokio::time::Instant;

use crate::client::state::{Client, SessionState};
use crate::vhost::VirtualHost;

/// Process-unique session identifier
pub type SessionId = u64;

static NEXT_SESSION_ID: AtomicU64 = AtomicU64::new(1);

/// Why the sweep removed a session
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExpiryReason {
    Inactive,
    SessionTimeout,
    IdleTimeout,
}

/// Read-only copy of a session's bookkeeping.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionInfo {
    pub id: SessionId,
    pub client_addr: SocketAddr,
    pub username: Option<String>,
    pub state: SessionState,
    pub virtual_host: String,
    pub started_at: Instant,
    pub last_activity: Instant,
    pub bytes_sent: u64,
    pub bytes_received: u64,
    pub commands_executed: u64,
}

pub struct Session {
    id: SessionId,
    client_addr: SocketAddr,
    virtual_host: Arc<VirtualHost>,
    active: AtomicBool,
    close_tx: watch::Sender<bool>,
    client: Mutex<Client>,
}

impl Session {
    pub fn new(client_addr: SocketAddr, virtual_host: Arc<VirtualHost>) -> Self {
        let (close_tx, _) = watch::channel(false);
        Self {
            id: NEXT_SESSION_ID.fetch_add(1, Ordering::Relaxed),
            client_addr,
            virtual_host,
            active: AtomicBool::new(true),
            close_tx,
            client: Mutex::new(Client::new(client_addr)),
        }
    }

    pub fn id(&self) -> SessionId {
        self.id
    }

    pub fn client_addr(&self) -> SocketAddr {
        self.client_addr
    }

    pub fn ip(&self) -> IpAddr {
        self.client_addr.ip()
    }

    pub fn virtual_host(&self) -> &VirtualHost {
        &self.virtual_host
    }

    /// Locks the protocol state. Never hold the guard across an `.await`.
    pub fn client(&self) -> MutexGuard<'_, Client> {
        self.client.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn is_active(&self) -> bool {
        self.active.load(Ordering::Acquire)
    }

    pub fn state(&self) -> SessionState {
        self.client().state()
    }

    pub fn username(&self) -> Option<String> {
        self.client().username().map(str::to_string)
    }

    /// Clears the lifecycle flag and signals the session task to release
    /// the transport. Returns `false` if the session was already closed.
    pub fn disconnect(&self) -> bool {
        if !self.active.swap(false, Ordering::AcqRel) {
            return false;
        }
        self.client().close();
        self.close_tx.send_replace(true);
        debug!("Session {} ({}) disconnected", self.id, self.client_addr);
        true
    }

    /// Receiver that flips to `true` once `disconnect` has been called.
    pub fn close_signal(&self) -> watch::Receiver<bool> {
        self.close_tx.subscribe()
    }

    /// Checks the lifecycle flag and both timeouts; `None` means keep.
    pub fn expiry(
        &self,
        now: Instant,
        session_timeout: Option<Duration>,
        idle_timeout: Option<Duration>,
    ) -> Option<ExpiryReason> {
        if !self.is_active() {
            return Some(ExpiryReason::Inactive);
        }

        let client = self.client();
        if client.is_closed() {
            return Some(ExpiryReason::Inactive);
        }
        if session_timeout.is_some_and(|limit| now.duration_since(client.started_at()) > limit) {
            return Some(ExpiryReason::SessionTimeout);
        }
        if idle_timeout.is_some_and(|limit| now.duration_since(client.last_activity()) > limit) {
            return Some(ExpiryReason::IdleTimeout);
        }
        None
    }

    pub fn info(&self) -> SessionInfo {
        let client = self.client();
        SessionInfo {
            id: self.id,
            client_addr: self.client_addr,
            username: client.username().map(str::to_string),
            state: client.state(),
            virtual_host: self.virtual_host.hostname.clone(),
            started_at: client.started_at(),
            last_activity: client.last_activity(),
            bytes_sent: client.bytes_sent(),
            bytes_received: client.bytes_received(),
            commands_executed: client.commands_executed(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::test_support::test_host;

    #[test]
    fn test_ids_are_unique() {
        let addr = "127.0.0.1:1".parse().unwrap();
        let a = Session::new(addr, test_host());
        let b = Session::new(addr, test_host());
        assert_ne!(a.id(), b.id());
    }

    #[test]
    fn test_disconnect_is_idempotent() {
        let session = Session::new("127.0.0.1:1".parse().unwrap(), test_host());
        let signal = session.close_signal();
        assert!(!*signal.borrow());

        assert!(session.disconnect());
        assert!(!session.disconnect());
        assert!(!session.is_active());
        assert_eq!(session.state(), SessionState::Closed);
        assert!(*signal.borrow());
    }

    #[tokio::test(start_paused = true)]
    async fn test_expiry_reasons() {
        let session = Session::new("127.0.0.1:1".parse().unwrap(), test_host());
        let hour = Some(Duration::from_secs(3600));
        let minute = Some(Duration::from_secs(60));

        assert_eq!(session.expiry(Instant::now(), hour, minute), None);

        tokio::time::advance(Duration::from_secs(61)).await;
        assert_eq!(
            session.expiry(Instant::now(), hour, minute),
            Some(ExpiryReason::IdleTimeout)
        );
        assert_eq!(session.expiry(Instant::now(), hour, None), None);

        session.client().record_command(Instant::now());
        assert_eq!(session.expiry(Instant::now(), hour, minute), None);

        tokio::time::advance(Duration::from_secs(3600)).await;
        assert_eq!(
            session.expiry(Instant::now(), hour, None),
            Some(ExpiryReason::SessionTimeout)
        );

        session.disconnect();
        assert_eq!(
            session.expiry(Instant::now(), None, None),
            Some(ExpiryReason::Inactive)
        );
    }
}
