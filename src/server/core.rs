//! Acceptor loop
//!
//! Owns the listening socket, applies admission control to every accepted
//! connection and spawns one task per admitted session, plus a periodic
//! sweeper that expires idle and overlong sessions.

use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;
use std::time::Duration;

use log::{error, info, warn};
use tokio::io::AsyncWriteExt;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::watch;
use tokio::task::JoinSet;
use tokio::time::{MissedTickBehavior, interval, sleep, timeout};

use crate::auth::Authenticator;
use crate::client::{Session, SessionContext, SessionRegistry, handle_client};
use crate::config::{ServerConfig, SharedRuntimeConfig, StartupConfig};
use crate::error::ServerError;
use crate::middleware::logging::log_connection;
use crate::middleware::rate_limit::{RateLimitSettings, RateLimiter};
use crate::protocol::responses::{self, format_response};
use crate::server::admin::ServerHandle;
use crate::server::shutdown::Shutdown;
use crate::server::stats::ServerStatistics;
use crate::vhost::VirtualHostResolver;

/// Pause after a failed `accept` before trying again
const ACCEPT_BACKOFF: Duration = Duration::from_millis(100);
/// Upper bound for writing the refusal line to a denied connection
const REFUSAL_TIMEOUT: Duration = Duration::from_secs(1);

pub struct Server {
    listener: TcpListener,
    startup: StartupConfig,
    runtime: SharedRuntimeConfig,
    registry: Arc<SessionRegistry>,
    rate_limiter: Arc<RateLimiter>,
    stats: Arc<ServerStatistics>,
    context: Arc<SessionContext>,
    vhosts: Arc<dyn VirtualHostResolver>,
    shutdown: Shutdown,
}

impl Server {
    /// Validates the configuration and binds the control socket.
    pub async fn bind(
        config: ServerConfig,
        authenticator: Arc<dyn Authenticator>,
        vhosts: Arc<dyn VirtualHostResolver>,
        shutdown: &Shutdown,
    ) -> Result<Self, ServerError> {
        config.validate()?;
        let ip: IpAddr = config
            .server
            .bind_address
            .parse()
            .map_err(|_| ServerError::InvalidAddress(config.server.bind_address.clone()))?;
        let socket = SocketAddr::new(ip, config.server.control_port);
        let listener = TcpListener::bind(socket)
            .await
            .map_err(|e| ServerError::Bind(socket.to_string(), e))?;

        Self::with_listener(listener, config, authenticator, vhosts, shutdown)
    }

    /// Serves on an already bound listener. The configured control port is
    /// replaced by the listener's.
    pub fn with_listener(
        listener: TcpListener,
        mut config: ServerConfig,
        authenticator: Arc<dyn Authenticator>,
        vhosts: Arc<dyn VirtualHostResolver>,
        shutdown: &Shutdown,
    ) -> Result<Self, ServerError> {
        let local = listener.local_addr()?;
        config.server.control_port = local.port();
        config.validate()?;
        info!("Server bound to {}", local);

        let rate_limiter = Arc::new(RateLimiter::new(RateLimitSettings::from(&config.rate_limit)));
        let (startup, runtime) = config.split();

        let stats = Arc::new(ServerStatistics::new());
        let context = Arc::new(SessionContext::new(
            &startup,
            authenticator,
            Arc::clone(&rate_limiter),
            Arc::clone(&stats),
        ));

        Ok(Self {
            listener,
            registry: Arc::new(SessionRegistry::new(Arc::clone(&runtime))),
            startup,
            runtime,
            rate_limiter,
            stats,
            context,
            vhosts,
            shutdown: shutdown.clone(),
        })
    }

    pub fn local_addr(&self) -> std::io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    /// Administrative handle that stays valid while the server runs.
    pub fn handle(&self) -> ServerHandle {
        ServerHandle::new(
            Arc::clone(&self.registry),
            Arc::clone(&self.rate_limiter),
            Arc::clone(&self.stats),
            Arc::clone(&self.runtime),
            self.shutdown.clone(),
        )
    }

    /// Accepts connections until shutdown, then closes every session and
    /// waits for all tasks to finish.
    pub async fn run(self) -> Result<(), ServerError> {
        let mut shutdown = self.shutdown.subscribe();
        info!(
            "Starting RAX FTP server on {} (max {} clients)",
            self.local_addr()?,
            self.registry.capacity().await
        );

        let sweeper = tokio::spawn(sweep_sessions(
            Arc::clone(&self.registry),
            self.startup.sweep_interval(),
            self.shutdown.subscribe(),
        ));
        let mut sessions = JoinSet::new();

        loop {
            if *shutdown.borrow() {
                break;
            }

            tokio::select! {
                biased;
                changed = shutdown.changed() => {
                    if changed.is_err() {
                        break;
                    }
                }
                accepted = self.listener.accept() => match accepted {
                    Ok((stream, addr)) => self.admit(stream, addr, &mut sessions).await,
                    Err(e) => {
                        error!("Error accepting connection: {}", e);
                        self.stats.error();
                        sleep(ACCEPT_BACKOFF).await;
                    }
                },
                Some(joined) = sessions.join_next(), if !sessions.is_empty() => {
                    if let Err(e) = joined {
                        error!("Session task failed: {}", e);
                        self.stats.error();
                    }
                }
            }
        }

        info!("Stopping server, closing {} sessions", self.registry.len().await);
        self.registry.disconnect_all().await;
        while let Some(joined) = sessions.join_next().await {
            if let Err(e) = joined {
                error!("Session task failed during shutdown: {}", e);
            }
        }
        if let Err(e) = sweeper.await {
            error!("Sweeper task failed: {}", e);
        }
        self.registry.clear().await;
        drop(self.listener);

        info!("Server stopped");
        Ok(())
    }

    /// Admission control for one accepted connection.
    async fn admit(&self, stream: TcpStream, addr: SocketAddr, sessions: &mut JoinSet<()>) {
        if !self.rate_limiter.allow_connection(addr.ip()) {
            warn!("Connection from {} refused by rate limiter", addr);
            self.refuse(stream, "Too many connections from your address, try again later");
            return;
        }

        let capacity = self.registry.capacity().await;
        if self.registry.len().await >= capacity {
            warn!("Rejected connection from {}: max clients ({}) reached", addr, capacity);
            self.refuse(stream, "Too many users, try again later");
            return;
        }

        let hostname = match stream.local_addr() {
            Ok(local) => local.ip().to_string(),
            Err(_) => self.startup.bind_address.clone(),
        };
        let session = Arc::new(Session::new(addr, self.vhosts.resolve(&hostname)));
        if let Err(e) = self.registry.add(Arc::clone(&session)).await {
            warn!("Rejected connection from {}: {}", addr, e);
            self.refuse(stream, "Too many users, try again later");
            return;
        }

        self.stats.connection_opened();
        log_connection(addr, &session.virtual_host().hostname);
        sessions.spawn(handle_client(
            stream,
            session,
            Arc::clone(&self.context),
            Arc::clone(&self.registry),
            self.shutdown.subscribe(),
        ));
    }

    /// Best-effort `421` and close, off the accept path.
    fn refuse(&self, mut stream: TcpStream, message: &str) {
        self.stats.connection_rejected();
        let line = format_response(responses::SERVICE_UNAVAILABLE, message);
        tokio::spawn(async move {
            let _ = timeout(REFUSAL_TIMEOUT, async {
                stream.write_all(line.as_bytes()).await?;
                stream.shutdown().await
            })
            .await;
        });
    }
}

/// Periodically removes inactive and expired sessions until shutdown.
async fn sweep_sessions(
    registry: Arc<SessionRegistry>,
    period: Duration,
    mut shutdown: watch::Receiver<bool>,
) {
    let mut ticker = interval(period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    // The first tick completes immediately.
    ticker.tick().await;

    loop {
        if *shutdown.borrow() {
            break;
        }
        tokio::select! {
            biased;
            changed = shutdown.changed() => {
                if changed.is_err() {
                    break;
                }
            }
            _ = ticker.tick() => {
                let removed = registry.sweep().await;
                if removed > 0 {
                    info!("Sweep removed {} session(s)", removed);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::UserStore;
    use crate::client::test_support::{shared_runtime, test_host};
    use crate::vhost::VirtualHostTable;

    #[tokio::test]
    async fn test_construction_leaves_server_root_untouched() {
        let root = std::env::temp_dir().join(format!("rax-ftpd-root-{}", std::process::id()));
        let mut config = ServerConfig::default();
        config.server.server_root = root.to_string_lossy().into_owned();
        let vhosts = VirtualHostTable::new(&config.server, &config.virtual_hosts);
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();

        let server = Server::with_listener(
            listener,
            config,
            Arc::new(UserStore::with_default_users(false, 64)),
            Arc::new(vhosts),
            &Shutdown::new(),
        )
        .unwrap();
        assert_ne!(server.local_addr().unwrap().port(), 0);
        assert!(!root.exists());
    }

    #[tokio::test(start_paused = true)]
    async fn test_sweeper_expires_sessions_and_stops_on_shutdown() {
        let registry = Arc::new(SessionRegistry::new(shared_runtime(10, 0, 30)));
        let session = Arc::new(Session::new("10.0.0.1:1".parse().unwrap(), test_host()));
        registry.add(Arc::clone(&session)).await.unwrap();

        let shutdown = Shutdown::new();
        let sweeper = tokio::spawn(sweep_sessions(
            Arc::clone(&registry),
            Duration::from_secs(10),
            shutdown.subscribe(),
        ));

        tokio::time::sleep(Duration::from_secs(25)).await;
        assert!(session.is_active());

        tokio::time::sleep(Duration::from_secs(20)).await;
        assert!(!session.is_active());
        assert!(registry.is_empty().await);

        shutdown.trigger();
        sweeper.await.unwrap();
    }
}
