use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tokio::net::TcpListener;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use marketgate::config::{GateConfig, StoreMode};
use marketgate::identity::StaticIdentityResolver;
use marketgate::server::{build_router, GateState};
use marketgate_core_types::Principal;
use marketgate_privilege_center::{load_allowlist, InMemoryPrivilegeStore, PrivilegeRecord};
use marketgate_rate_guard::RateGuard;

#[derive(Parser)]
#[command(
    name = "marketgate",
    version,
    about = "Authorization and rate limiting gate for the marketplace backend"
)]
struct Cli {
    /// Log filter, e.g. "info" or "marketgate=debug"
    #[arg(long, default_value = "info")]
    log_level: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the gate server
    Serve {
        /// Path to a YAML configuration file
        #[arg(long)]
        config: Option<PathBuf>,
        /// Override the configured bind address
        #[arg(long)]
        bind: Option<String>,
    },
    /// Load and print the effective configuration
    CheckConfig {
        #[arg(long)]
        config: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(&cli.log_level);

    info!(
        "marketgate v{} (build {}, {})",
        env!("CARGO_PKG_VERSION"),
        env!("GIT_HASH"),
        env!("BUILD_DATE"),
    );

    match cli.command {
        Commands::Serve { config, bind } => serve(config, bind).await,
        Commands::CheckConfig { config } => {
            let config = GateConfig::load(config.as_deref())?;
            println!("{}", serde_yaml::to_string(&config)?);
            Ok(())
        }
    }
}

fn init_logging(level: &str) {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(level.to_string())),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();
}

async fn serve(config_path: Option<PathBuf>, bind: Option<String>) -> Result<()> {
    let mut config = GateConfig::load(config_path.as_deref())
        .context("failed to load configuration")?;
    if let Some(bind) = bind {
        config.bind_addr = bind;
    }

    let allowlist = Arc::new(
        load_allowlist(config.allowlist_path.as_deref())
            .context("failed to load legacy allowlist")?,
    );
    if !allowlist.is_empty() {
        warn!(
            entries = allowlist.len(),
            "legacy admin allowlist active; migrate entries into privilege records"
        );
    }

    let mut identity = StaticIdentityResolver::new();
    for entry in &config.identity_tokens {
        let principal = Principal {
            id: entry.principal_id.clone(),
            email: entry.email.clone(),
            authenticated: true,
            claims: entry.claims.clone(),
        };
        identity = identity.with_token(entry.token.clone(), principal);
    }

    // Demo backend: real deployments implement PrivilegeStore against their
    // managed database and inject it here.
    let store = Arc::new(InMemoryPrivilegeStore::new());
    for seed in &config.privilege_seeds {
        let record = if seed.is_active {
            PrivilegeRecord::active(&seed.principal_id, seed.role)
        } else {
            PrivilegeRecord::revoked(&seed.principal_id, seed.role)
        };
        store.insert(record).await;
    }

    let rate_guard = Arc::new(build_rate_guard(&config)?);
    let state = GateState::new(Arc::new(identity), store, allowlist, rate_guard, &config);
    state.mark_live();
    state.mark_ready();

    let router = build_router(state);
    let listener = TcpListener::bind(&config.bind_addr)
        .await
        .with_context(|| format!("failed to bind {}", config.bind_addr))?;
    info!(addr = %config.bind_addr, "marketgate listening");
    axum::serve(listener, router).await?;
    Ok(())
}

fn build_rate_guard(config: &GateConfig) -> Result<RateGuard> {
    match config.store_mode {
        StoreMode::Memory => Ok(RateGuard::memory()),
        StoreMode::Shared => {
            #[cfg(feature = "shared-http")]
            {
                let url = config
                    .shared_store_url
                    .clone()
                    .context("store_mode=shared requires shared_store_url")?;
                let token = config.shared_store_token.clone().unwrap_or_default();
                Ok(RateGuard::shared(Arc::new(
                    marketgate_rate_guard::HttpCounterStore::new(url, token),
                )))
            }
            #[cfg(not(feature = "shared-http"))]
            {
                anyhow::bail!("built without the shared-http feature; store_mode=shared is unavailable")
            }
        }
    }
}
