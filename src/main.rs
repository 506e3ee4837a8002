//! RAX FTP Server - Entry Point
//!
//! Loads configuration, binds the control socket and serves until Ctrl-C.

use std::process::ExitCode;
use std::sync::Arc;

use log::{error, info};

use rax_ftpd::auth::{Authenticator, UserStore};
use rax_ftpd::config::ServerConfig;
use rax_ftpd::error::ServerError;
use rax_ftpd::vhost::{VirtualHostResolver, VirtualHostTable};
use rax_ftpd::{Server, Shutdown};

#[tokio::main]
async fn main() -> ExitCode {
    // Initialize the logger (env_logger picks up RUST_LOG environment variable)
    env_logger::init();

    info!("Launching FTP server...");

    match run().await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{}", e);
            ExitCode::FAILURE
        }
    }
}

async fn run() -> Result<(), ServerError> {
    let config = match std::env::args().nth(1) {
        Some(path) => ServerConfig::load_from(&path, true)?,
        None => ServerConfig::load()?,
    };

    let startup = &config.server;
    let users = if config.users.is_empty() {
        info!("No users configured, using built-in accounts");
        UserStore::with_default_users(startup.allow_anonymous, startup.max_username_length)
    } else {
        UserStore::new(
            &config.users,
            startup.allow_anonymous,
            startup.max_username_length,
        )
    };
    let vhosts = VirtualHostTable::new(startup, &config.virtual_hosts);
    info!(
        "Loaded {} user(s) and {} virtual host(s)",
        users.len(),
        vhosts.len()
    );

    let authenticator: Arc<dyn Authenticator> = Arc::new(users);
    let resolver: Arc<dyn VirtualHostResolver> = Arc::new(vhosts);

    let shutdown = Shutdown::new();
    let server = Server::bind(config, authenticator, resolver, &shutdown).await?;
    let handle = server.handle();

    let signal = shutdown.clone();
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                info!("Received Ctrl-C");
                signal.trigger();
            }
            Err(e) => error!("Failed to listen for Ctrl-C: {}", e),
        }
    });

    server.run().await?;
    info!("{}", handle.statistics());
    Ok(())
}
