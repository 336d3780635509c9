//! Nexus Tasks — multi-tenant task tracker with real-time workspace events.
//!
//! A single-process server exposing the REST API and the per-workspace
//! WebSocket event stream. Task mutations committed through the API fan
//! out as live updates to every authenticated subscriber of the same
//! workspace.
//!
//! Usage:
//!   nexus-tasks                                  # Default port 8000
//!   nexus-tasks --port 9000                      # Custom port
//!   nexus-tasks --database-url "host=db ..."     # Custom PostgreSQL
//!   nexus-tasks --jwt-secret mysecret            # Custom token secret

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use chrono::Duration;
use clap::Parser;
use nexus_realtime::{ConnectionRegistry, EventBroadcaster};
use nexus_server::{app, AppState, Authenticator, WorkspaceAccess};
use nexus_store::Store;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "nexus-tasks", about = "Nexus Tasks API — multi-tenant task tracker")]
struct Cli {
    /// Port to listen on (0 for OS-assigned)
    #[arg(long, default_value = "8000")]
    port: u16,

    /// Hostname to bind to
    #[arg(long, default_value = "127.0.0.1")]
    hostname: String,

    /// PostgreSQL connection string (falls back to $DATABASE_URL)
    #[arg(long)]
    database_url: Option<String>,

    /// Secret used to sign access tokens (falls back to $NEXUS_JWT_SECRET,
    /// then to a persisted random secret)
    #[arg(long)]
    jwt_secret: Option<String>,

    /// Access token lifetime in minutes
    #[arg(long, default_value = "1440")]
    token_ttl_minutes: i64,

    /// Enable permissive CORS (development frontends)
    #[arg(long)]
    cors: bool,

    /// Enable verbose logging
    #[arg(long)]
    verbose: bool,

    /// Write logs to a file (defaults to ~/.nexus/logs/server.log if no path given)
    #[arg(long, default_missing_value = "DEFAULT", num_args = 0..=1)]
    log_file: Option<String>,
}

/// Resolve the token-signing secret: CLI flag, environment, or a random
/// secret persisted under `~/.nexus/` so tokens survive restarts.
fn resolve_jwt_secret(cli_secret: Option<String>) -> String {
    if let Some(secret) = cli_secret {
        return secret;
    }
    if let Ok(secret) = std::env::var("NEXUS_JWT_SECRET") {
        if !secret.is_empty() {
            return secret;
        }
    }

    let home = std::env::var("HOME").unwrap_or_else(|_| "/tmp".into());
    let secret_path = PathBuf::from(&home).join(".nexus/jwt-secret");

    // Reuse existing secret if valid
    if let Ok(existing) = std::fs::read_to_string(&secret_path) {
        let trimmed = existing.trim().to_string();
        if trimmed.len() >= 32 {
            return trimmed;
        }
    }

    // Generate new persistent secret
    use rand::Rng;
    let mut rng = rand::rng();
    let bytes: [u8; 32] = rng.random();
    let secret = hex::encode(bytes);

    let nexus_dir = PathBuf::from(&home).join(".nexus");
    let _ = std::fs::create_dir_all(&nexus_dir);
    let _ = std::fs::write(&secret_path, &secret);

    // Restrict file permissions (owner-only read/write)
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        let _ = std::fs::set_permissions(
            &secret_path,
            std::fs::Permissions::from_mode(0o600),
        );
    }

    secret
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Initialize tracing
    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("info")
    };

    if let Some(ref log_file_arg) = cli.log_file {
        let home = std::env::var("HOME").unwrap_or_else(|_| "/tmp".into());
        let log_path = if log_file_arg == "DEFAULT" {
            PathBuf::from(&home).join(".nexus/logs/server.log")
        } else {
            PathBuf::from(log_file_arg)
        };

        if let Some(parent) = log_path.parent() {
            let _ = std::fs::create_dir_all(parent);
        }

        let file = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&log_path)
            .with_context(|| format!("failed to open log file {}", log_path.display()))?;

        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(std::sync::Mutex::new(file))
            .with_ansi(false)
            .init();

        eprintln!("Logging to {}", log_path.display());
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .init();
    }

    let database_url = cli
        .database_url
        .or_else(|| std::env::var("DATABASE_URL").ok())
        .unwrap_or_else(|| "host=localhost user=nexus dbname=nexus".into());
    let jwt_secret = resolve_jwt_secret(cli.jwt_secret);

    println!();
    println!("╔══════════════════════════════════════════════════════════════╗");
    println!("║                      Nexus Tasks API                         ║");
    println!("╚══════════════════════════════════════════════════════════════╝");
    println!();
    println!("  Port:       {}", cli.port);
    println!("  Binding:    {}", cli.hostname);
    println!("  CORS:       {}", if cli.cors { "permissive" } else { "disabled" });
    println!();

    // Connect to PostgreSQL and make sure the schema exists
    let store = Store::connect(&database_url)
        .await
        .context("failed to connect to PostgreSQL")?;
    store.init_schema().await.context("failed to initialize schema")?;

    // One registry + broadcaster per process: the single broadcast domain
    // shared by the admission path and every mutation handler.
    let registry = Arc::new(ConnectionRegistry::new());
    let events = EventBroadcaster::new(Arc::clone(&registry));

    let auth = Arc::new(Authenticator::new(
        store.clone(),
        jwt_secret.as_bytes(),
        Duration::minutes(cli.token_ttl_minutes),
    ));
    let access = Arc::new(WorkspaceAccess::new(store.clone()));

    let state = AppState {
        store,
        auth,
        access,
        events,
    };
    let router = app(state, cli.cors);

    let addr: SocketAddr = format!("{}:{}", cli.hostname, cli.port)
        .parse()
        .context("invalid bind address")?;
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;
    info!("Nexus Tasks API listening on http://{}", listener.local_addr()?);

    axum::serve(listener, router).await.context("server error")?;
    Ok(())
}
