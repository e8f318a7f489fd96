//! Ad-hoc matchmaking hub server.

use std::time::Duration;

use adhoc_server::config::{optional_path, Config};
use adhoc_server::server::Server;
use anyhow::Result;
use clap::Parser;
use tokio::sync::watch;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[clap(name = "adhoc-server")]
#[clap(about = "Matchmaking hub for PSP ad-hoc play over the internet")]
struct Cli {
    /// Interface to bind to
    #[clap(short, long)]
    bind: Option<String>,

    /// TCP port to listen on
    #[clap(short, long)]
    port: Option<u16>,

    /// Maximum concurrent users
    #[clap(short, long)]
    max_users: Option<usize>,

    /// Idle timeout in seconds
    #[clap(short, long)]
    timeout: Option<u64>,

    /// Product directory file (empty for in-memory)
    #[clap(long)]
    product_db: Option<String>,

    /// Status XML output path (empty to disable)
    #[clap(short, long)]
    status: Option<String>,
}

impl Cli {
    fn apply(self, config: &mut Config) {
        if let Some(bind) = self.bind {
            config.bind_addr = bind;
        }
        if let Some(port) = self.port {
            config.port = port;
        }
        if let Some(max_users) = self.max_users {
            config.max_users = max_users;
        }
        if let Some(secs) = self.timeout {
            config.user_timeout = Duration::from_secs(secs);
        }
        if let Some(db) = self.product_db {
            config.product_db = optional_path(&db);
        }
        if let Some(status) = self.status {
            config.status_path = optional_path(&status);
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("adhoc_server=info,adhoc_core=info")),
        )
        .init();

    let mut config = Config::from_env()?;
    cli.apply(&mut config);
    config.validate()?;

    info!(
        "starting adhoc-server on {} (max_users = {}, timeout = {:?}, status = {})",
        config.socket_addr_string(),
        config.max_users,
        config.user_timeout,
        config
            .status_path
            .as_ref()
            .map(|p| p.display().to_string())
            .unwrap_or_else(|| "off".to_string()),
    );

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let server = Server::bind(config).await?;

    tokio::spawn(async move {
        wait_for_signal().await;
        info!("shutdown requested");
        let _ = shutdown_tx.send(true);
        // Keep the sender alive until the process exits.
        std::future::pending::<()>().await;
    });

    server.run(shutdown_rx).await
}

#[cfg(unix)]
async fn wait_for_signal() {
    use tokio::signal::unix::{signal, SignalKind};

    let mut term = match signal(SignalKind::terminate()) {
        Ok(term) => term,
        Err(e) => {
            warn!("SIGTERM handler unavailable: {}", e);
            if tokio::signal::ctrl_c().await.is_err() {
                std::future::pending::<()>().await;
            }
            return;
        }
    };
    tokio::select! {
        _ = tokio::signal::ctrl_c() => {}
        _ = term.recv() => {}
    }
}

#[cfg(not(unix))]
async fn wait_for_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!("Ctrl-C handler unavailable: {}", e);
        std::future::pending::<()>().await;
    }
}
