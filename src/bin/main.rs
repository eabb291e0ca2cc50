use anyhow::Result;
use clap::{Args, Parser, Subcommand};
use std::time::Duration;
use tokio::signal;
use tokio_util::sync::CancellationToken;
use tracing::info;
use tracing_subscriber::EnvFilter;
use wp_session_gate::{CookieMatch, StoreConfig, ValidatorConfig, create_app, create_validator};

#[derive(Parser)]
#[command(name = "wp-session-gate")]
#[command(about = "Session cookie check against mirrored WordPress login sessions")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the HTTP auth check server
    Serve {
        /// Bind address, e.g. 0.0.0.0:8081
        #[arg(long, env = "AUTH_BIND", default_value = "0.0.0.0:8081")]
        bind: String,
        #[command(flatten)]
        store: StoreArgs,
        #[command(flatten)]
        validator: ValidatorArgs,
    },
    /// Validate a single cookie header against the store and exit
    Check {
        /// Raw value of the Cookie header
        #[arg(long)]
        cookie: String,
        #[command(flatten)]
        store: StoreArgs,
        #[command(flatten)]
        validator: ValidatorArgs,
    },
}

/// Overrides for the `REDIS_*` environment variables.
#[derive(Args)]
struct StoreArgs {
    #[arg(long)]
    redis_host: Option<String>,
    #[arg(long)]
    redis_port: Option<u16>,
    #[arg(long)]
    redis_db: Option<i64>,
    #[arg(long)]
    redis_password: Option<String>,
}

impl StoreArgs {
    fn into_config(self) -> Result<StoreConfig> {
        let mut config = StoreConfig::from_env()?;
        if let Some(host) = self.redis_host {
            config.host = host;
        }
        if let Some(port) = self.redis_port {
            config.port = port;
        }
        if let Some(db) = self.redis_db {
            config.db = db;
        }
        if let Some(password) = self.redis_password {
            config.password = Some(password);
        }
        Ok(config)
    }
}

/// Overrides for the `AUTH_*` environment variables.
#[derive(Args)]
struct ValidatorArgs {
    /// Deadline for one scan-and-fetch sequence, in milliseconds
    #[arg(long)]
    timeout_ms: Option<u64>,
    /// COUNT hint for each SCAN step
    #[arg(long)]
    scan_count: Option<usize>,
    /// Compare the whole cookie pair or only its value
    #[arg(long, value_enum)]
    cookie_match: Option<CookieMatch>,
}

impl ValidatorArgs {
    fn into_config(self) -> Result<ValidatorConfig> {
        let mut config = ValidatorConfig::from_env()?;
        if let Some(ms) = self.timeout_ms {
            anyhow::ensure!(ms > 0, "--timeout-ms must be greater than zero");
            config.timeout = Duration::from_millis(ms);
        }
        if let Some(count) = self.scan_count {
            config.scan_count = Some(count);
        }
        if let Some(mode) = self.cookie_match {
            config.cookie_match = mode;
        }
        Ok(config)
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let rust_log = std::env::var("RUST_LOG").ok();
    tracing_subscriber::fmt()
        .with_env_filter(log_filter(rust_log.as_deref()))
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Serve {
            bind,
            store,
            validator,
        } => {
            let store_config = store.into_config()?;
            let validator_config = validator.into_config()?;
            info!(
                store = %store_config.address(),
                db = store_config.db,
                timeout_ms = validator_config.timeout.as_millis() as u64,
                cookie_match = %validator_config.cookie_match,
                "Starting session check server"
            );

            let validator = create_validator(&store_config, validator_config)?;
            let shutdown = CancellationToken::new();
            let app = create_app(validator, shutdown.clone());

            let listener = tokio::net::TcpListener::bind(&bind).await?;
            info!("Listening on http://{}", bind);

            axum::serve(listener, app)
                .with_graceful_shutdown(shutdown_signal(shutdown))
                .await?;
            info!("Server shutdown complete");
        }
        Commands::Check {
            cookie,
            store,
            validator,
        } => {
            let store_config = store.into_config()?;
            let validator = create_validator(&store_config, validator.into_config()?)?;

            let verdict = validator
                .validate_cookie_header(&cookie, CancellationToken::new())
                .await;

            println!("Store:   {}", store_config.address());
            println!("Status:  {}", verdict.status().as_u16());
            println!("Reason:  {}", verdict.reason());

            if !verdict.is_authorized() {
                std::process::exit(1);
            }
        }
    }

    Ok(())
}

const DEFAULT_LOG_DIRECTIVES: &str = "wp_session_gate=info,tower_http=info";

/// Log filter from `RUST_LOG`, falling back to the default directives when it
/// is unset or blank.
fn log_filter(rust_log: Option<&str>) -> EnvFilter {
    match rust_log.map(str::trim).filter(|s| !s.is_empty()) {
        Some(directives) => EnvFilter::new(directives),
        None => EnvFilter::new(DEFAULT_LOG_DIRECTIVES),
    }
}

/// Wait for Ctrl+C or SIGTERM, then cancel in-flight lookups.
async fn shutdown_signal(shutdown: CancellationToken) {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!("Failed to install Ctrl+C handler: {e}");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to install SIGTERM handler: {e}");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("Received Ctrl+C, shutting down"),
        _ = terminate => info!("Received SIGTERM, shutting down"),
    }

    shutdown.cancel();
}
