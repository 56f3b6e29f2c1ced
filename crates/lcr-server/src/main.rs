use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::{info, warn};

use lcr_core::{RouteStore, RoutingService, SignalingDispatcher};
use lcr_server::logging::{log_welcome, setup_logging, LoggingConfig};
use lcr_server::{admin, MySqlRouteStore, ServerConfig, UdpTransport};

#[derive(Parser, Debug)]
#[command(name = "lcr-server")]
#[command(about = "SIP least-cost-routing redirect server", long_about = None)]
#[command(version)]
struct Cli {
    /// Configuration file
    #[arg(short, long, env = "LCR_CONFIG")]
    config: PathBuf,

    /// Overrides `[logging] level`
    #[arg(short, long, env = "LCR_LOG_LEVEL")]
    log_level: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = ServerConfig::load(&cli.config)?;

    let logging = LoggingConfig::from_file_config(&config.logging, cli.log_level.as_deref())?;
    let app_name = logging.app_name.clone();
    let _log_guard = setup_logging(logging)?;
    log_welcome(&app_name, lcr_core::VERSION);

    let store = MySqlRouteStore::connect(&config.database)
        .await
        .context("connecting to the route database")?;
    match store.server_version().await {
        Ok(version) => info!("Database server version {}", version),
        Err(e) => warn!("Could not read database server version: {}", e),
    }
    let store = Arc::new(store);

    let service = Arc::new(RoutingService::new(
        config.routing.clone(),
        Arc::clone(&store) as Arc<dyn RouteStore>,
    )?);

    let listen = config.sip.socket_addr()?;
    let transport = UdpTransport::bind(listen)
        .await
        .with_context(|| format!("binding SIP listener on {}", listen))?;
    info!("Listening on {} and port {}", config.sip.address, config.sip.port);
    info!("Configured for platform: {}", config.routing.platform);

    let dispatcher = Arc::new(SignalingDispatcher::new(Arc::clone(&service), transport.connector()));
    let receive_loop = transport.spawn_receive_loop(Arc::clone(&dispatcher));

    let admin = if config.admin.enabled {
        Some(admin::serve(config.admin.socket_addr()?, Arc::clone(&service)).await?)
    } else {
        None
    };

    tokio::select! {
        _ = tokio::signal::ctrl_c() => info!("Shutdown requested"),
        _ = receive_loop => warn!("Receive loop exited"),
    }

    transport.close();
    dispatcher.close();
    if let Some(admin) = admin {
        admin.abort();
    }
    store.close().await;
    info!("lcr-server stopped");
    Ok(())
}
