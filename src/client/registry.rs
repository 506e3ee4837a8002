//! Session registry
//!
//! Tracks live sessions for admission counting, timeout sweeps and
//! administrative bulk operations. Every operation holds the registry lock
//! for its full duration; read-outs are copies.

use std::collections::{BTreeMap, HashMap};
use std::net::IpAddr;
use std::sync::Arc;

use log::{debug, info, warn};
use tokio::sync::Mutex;
use tokio::time::Instant;

use crate::auth::ANONYMOUS_USER;
use crate::client::session::{Session, SessionId, SessionInfo};
use crate::config::SharedRuntimeConfig;
use crate::error::SessionError;

/// Snapshot of registry occupancy
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RegistryStatistics {
    pub current: usize,
    /// Sessions per login name; sessions without one count as `anonymous`
    pub per_user: BTreeMap<String, usize>,
    pub per_address: BTreeMap<IpAddr, usize>,
}

pub struct SessionRegistry {
    sessions: Mutex<HashMap<SessionId, Arc<Session>>>,
    runtime: SharedRuntimeConfig,
}

impl SessionRegistry {
    pub fn new(runtime: SharedRuntimeConfig) -> Self {
        Self {
            sessions: Mutex::new(HashMap::new()),
            runtime,
        }
    }

    /// Current `max_clients` from the runtime configuration
    pub async fn capacity(&self) -> usize {
        self.runtime.read().await.max_clients
    }

    /// Registers a session and stamps its start time.
    pub async fn add(&self, session: Arc<Session>) -> Result<(), SessionError> {
        let max_clients = self.capacity().await;
        let mut sessions = self.sessions.lock().await;

        if sessions.len() >= max_clients {
            return Err(SessionError::CapacityReached(max_clients));
        }
        if sessions.contains_key(&session.id()) {
            return Err(SessionError::AlreadyRegistered(session.id()));
        }

        session.client().mark_started(Instant::now());
        debug!(
            "Registered session {} from {} ({} active)",
            session.id(),
            session.client_addr(),
            sessions.len() + 1
        );
        sessions.insert(session.id(), session);
        Ok(())
    }

    /// Removes a session; returns whether it was present.
    pub async fn remove(&self, id: SessionId) -> bool {
        self.sessions.lock().await.remove(&id).is_some()
    }

    /// Removes and disconnects every inactive or expired session in one pass.
    pub async fn sweep(&self) -> usize {
        let (session_timeout, idle_timeout) = {
            let runtime = self.runtime.read().await;
            (runtime.session_timeout(), runtime.idle_timeout())
        };
        let now = Instant::now();

        let mut sessions = self.sessions.lock().await;
        let before = sessions.len();
        sessions.retain(|id, session| match session.expiry(now, session_timeout, idle_timeout) {
            Some(reason) => {
                info!(
                    "Sweeping session {} from {}: {:?}",
                    id,
                    session.client_addr(),
                    reason
                );
                session.disconnect();
                false
            }
            None => true,
        });
        before - sessions.len()
    }

    pub async fn disconnect_by_address(&self, ip: IpAddr) -> usize {
        let count = self.disconnect_matching(|session| session.ip() == ip).await;
        if count > 0 {
            info!("Disconnected {} session(s) from {}", count, ip);
        }
        count
    }

    pub async fn disconnect_by_user(&self, username: &str) -> usize {
        let count = self
            .disconnect_matching(|session| session.username().as_deref() == Some(username))
            .await;
        if count > 0 {
            info!("Disconnected {} session(s) for user {}", count, username);
        } else {
            warn!("No sessions found for user {}", username);
        }
        count
    }

    pub async fn disconnect_all(&self) -> usize {
        self.disconnect_matching(|_| true).await
    }

    async fn disconnect_matching<F>(&self, predicate: F) -> usize
    where
        F: Fn(&Session) -> bool,
    {
        let mut sessions = self.sessions.lock().await;
        let before = sessions.len();
        sessions.retain(|_, session| {
            if predicate(session) {
                session.disconnect();
                false
            } else {
                true
            }
        });
        before - sessions.len()
    }

    /// Drops every entry without signalling the sessions.
    pub async fn clear(&self) {
        self.sessions.lock().await.clear();
    }

    pub async fn statistics(&self) -> RegistryStatistics {
        let sessions = self.sessions.lock().await;
        let mut stats = RegistryStatistics {
            current: sessions.len(),
            ..RegistryStatistics::default()
        };
        for session in sessions.values() {
            let user = session
                .username()
                .unwrap_or_else(|| ANONYMOUS_USER.to_string());
            *stats.per_user.entry(user).or_default() += 1;
            *stats.per_address.entry(session.ip()).or_default() += 1;
        }
        stats
    }

    pub async fn sessions(&self) -> Vec<SessionInfo> {
        let sessions = self.sessions.lock().await;
        let mut infos: Vec<SessionInfo> = sessions.values().map(|s| s.info()).collect();
        infos.sort_by_key(|info| info.id);
        infos
    }

    pub async fn len(&self) -> usize {
        self.sessions.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.sessions.lock().await.is_empty()
    }
}
