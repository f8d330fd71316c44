use std::{path::PathBuf, sync::Arc};

use anyhow::Context;
use clap::Parser;
use sqlx::postgres::PgPoolOptions;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use trellis_core::{
    ChangeNotifier, IngestionPipeline, Inventory, MemoryInventory,
    PostgresInventory,
    adapters::{nmap::NmapScanner, snmp::Snmp2Poller},
};
use trellis_server::{
    AppState, create_app,
    infra::{
        config::Config,
        websocket::{HubListener, SubscriberHub},
    },
};

#[derive(Parser, Debug)]
#[command(name = "trellis-server")]
#[command(about = "Network inventory server with live topology view")]
struct Cli {
    /// Path to a TOML config file
    #[arg(long, env = "TRELLIS_CONFIG")]
    config: Option<PathBuf>,

    /// Server port (overrides config)
    #[arg(short, long, env = "TRELLIS_PORT")]
    port: Option<u16>,

    /// Server host (overrides config)
    #[arg(long, env = "TRELLIS_HOST")]
    host: Option<String>,

    /// Use the in-memory store even when a database URL is configured
    #[arg(long, default_value_t = false)]
    memory: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,tower_http=warn".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let mut config = Config::load(cli.config.as_deref())
        .context("failed to load configuration")?;
    if let Some(port) = cli.port {
        config.server.port = port;
    }
    if let Some(host) = cli.host {
        config.server.host = host;
    }

    let inventory: Arc<dyn Inventory> = match &config.database.url {
        Some(url) if !cli.memory => {
            let pool = PgPoolOptions::new()
                .max_connections(10)
                .connect(url)
                .await
                .context("failed to connect to PostgreSQL")?;
            PostgresInventory::migrate(&pool)
                .await
                .context("database migration failed")?;
            info!("inventory store: postgres");
            Arc::new(PostgresInventory::new(pool))
        }
        _ => {
            warn!(
                "no database configured - inventory is in-memory and will \
                 not survive a restart"
            );
            Arc::new(MemoryInventory::new())
        }
    };

    let hub = Arc::new(SubscriberHub::new());
    let scanner = NmapScanner::new(config.scan.nmap_path.clone());
    let poller = Snmp2Poller::new(config.snmp.port, config.snmp_timeout());
    let pipeline = Arc::new(IngestionPipeline::new(
        Arc::clone(&inventory),
        Arc::new(scanner),
        Arc::new(poller),
        ChangeNotifier::new(Arc::new(HubListener(Arc::clone(&hub)))),
        config.adapter_timeout(),
    ));

    info!(
        scan.nmap_path = %config.scan.nmap_path,
        snmp.port = config.snmp.port,
        ws.keepalive_secs = config.ws.keepalive_secs,
        "discovery configuration in effect"
    );

    let addr = config.bind_addr();
    let state = AppState {
        inventory,
        pipeline,
        hub,
        config: Arc::new(config),
    };
    let app = create_app(state);

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;
    info!("starting trellis server on {addr}");
    axum::serve(listener, app).await?;

    Ok(())
}
