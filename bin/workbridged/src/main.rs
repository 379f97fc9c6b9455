//! `workbridged` — the WorkBridge server binary.
//!
//! Usage:
//!   workbridged -c <config-name-or-path> [--listen <addr>]
//!
//! The config name resolves to `/etc/workbridge/<name>.toml`.
//! If a path with `/` or `.` is given, it's used directly.

mod auth_middleware;
mod config;
mod routes;

use std::sync::Arc;

use clap::Parser;
use tracing::{info, warn};

use workbridge_account::AccountModule;
use workbridge_account::token::TokenConfig;
use workbridge_core::Module;
use workbridge_reward::RewardModule;
use workbridge_store::{EntityStore, SqliteStore};
use workbridge_task::TaskModule;

use config::ServerConfig;

/// WorkBridge server.
#[derive(Parser, Debug)]
#[command(name = "workbridged", about = "WorkBridge server")]
struct Cli {
    /// Config name or path to config file.
    #[arg(short = 'c', long = "config", required = true)]
    config: String,

    /// Listen address (overrides the configured one).
    #[arg(long = "listen")]
    listen: Option<String>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging.
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    let cli = Cli::parse();

    // Load server configuration.
    let config_path = ServerConfig::resolve_path(&cli.config);
    info!("Loading configuration from {}", config_path.display());
    let server_config = ServerConfig::load(&config_path)?;
    server_config.verify()?;

    let listen = cli.listen.unwrap_or_else(|| server_config.listen.clone());

    // Initialize storage.
    let data_dir = std::path::PathBuf::from(&server_config.storage.data_dir);
    std::fs::create_dir_all(&data_dir)?;

    let db: Arc<dyn EntityStore> = Arc::new(
        SqliteStore::open(&server_config.db_path())
            .map_err(|e| anyhow::anyhow!("failed to open store: {}", e))?,
    );

    // verify() already required a secret outside dev mode.
    let token_config = if server_config.jwt.secret.is_empty() {
        warn!("dev mode: using the built-in development JWT secret");
        TokenConfig {
            ttl_secs: server_config.jwt.expire_secs,
            ..TokenConfig::default()
        }
    } else {
        TokenConfig {
            secret: server_config.jwt.secret.clone(),
            ttl_secs: server_config.jwt.expire_secs,
        }
    };

    // Initialize modules. Reward settles against account's balances;
    // task drives both.
    let account_module = AccountModule::new(Arc::clone(&db), token_config)?;
    info!("Account module initialized");

    let reward_module =
        RewardModule::new(Arc::clone(&db), Arc::clone(account_module.store()))?;
    info!("Reward module initialized");

    let task_module = TaskModule::new(
        Arc::clone(&db),
        Arc::clone(account_module.store()),
        Arc::clone(reward_module.ledger()),
    )?;
    info!("Task module initialized");

    let tokens = Arc::clone(account_module.tokens());

    let module_routes = vec![
        (account_module.name(), account_module.routes()),
        (reward_module.name(), reward_module.routes()),
        (task_module.name(), task_module.routes()),
    ];

    // Build router.
    let app = routes::build_router(tokens, module_routes);

    // Start server.
    let listener = tokio::net::TcpListener::bind(&listen).await?;
    info!("WorkBridge server listening on {}", listen);
    axum::serve(listener, app).await?;

    Ok(())
}
