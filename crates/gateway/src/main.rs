use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use axum::http::{HeaderValue, Method};
use clap::{Parser, Subcommand};
use sha2::{Digest, Sha256};
use tower_http::cors::{AllowOrigin, CorsLayer};
use tracing_subscriber::EnvFilter;

use al_bus::{ActiveRunSet, EventBus};
use al_domain::config::{Config, ConfigSeverity};
use al_gateway::api;
use al_gateway::api::flags::FlagStore;
use al_gateway::runtime::billing::BillingGuard;
use al_gateway::runtime::controller;
use al_gateway::runtime::stop::StopMap;
use al_gateway::state::AppState;
use al_providers::ProviderRegistry;
use al_store::Store;
use al_tools::ThreadLockMap;

#[derive(Parser)]
#[command(name = "agentloop", about = "Multi-tenant agent execution runtime")]
struct Cli {
    /// Path to the TOML config file.
    #[arg(long, global = true, default_value = "agentloop.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Run the gateway server (default).
    Serve,
    /// Configuration helpers.
    Config {
        #[command(subcommand)]
        command: ConfigCommand,
    },
    /// Print the version.
    Version,
}

#[derive(Subcommand)]
enum ConfigCommand {
    /// Validate the config file and report issues.
    Validate,
    /// Print the effective configuration.
    Show,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let config = load_config(&cli.config)?;

    match cli.command {
        None | Some(Command::Serve) => {
            init_tracing();
            run_server(Arc::new(config)).await
        }
        Some(Command::Config { command }) => match command {
            ConfigCommand::Validate => {
                let issues = config.validate();
                for issue in &issues {
                    eprintln!("{issue}");
                }
                if issues.iter().any(|i| i.severity == ConfigSeverity::Error) {
                    std::process::exit(1);
                }
                println!("config ok");
                Ok(())
            }
            ConfigCommand::Show => {
                println!("{}", toml::to_string_pretty(&config)?);
                Ok(())
            }
        },
        Some(Command::Version) => {
            println!("agentloop {}", env!("CARGO_PKG_VERSION"));
            Ok(())
        }
    }
}

fn load_config(path: &PathBuf) -> anyhow::Result<Config> {
    if path.exists() {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("reading {}", path.display()))?;
        toml::from_str(&raw).with_context(|| format!("parsing {}", path.display()))
    } else {
        Ok(Config::default())
    }
}

/// Structured JSON tracing for the server.
fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info,al_gateway=debug")),
        )
        .json()
        .init();
}

async fn run_server(config: Arc<Config>) -> anyhow::Result<()> {
    tracing::info!("agentloop starting");

    // ── Config validation ────────────────────────────────────────────
    let issues = config.validate();
    for issue in &issues {
        match issue.severity {
            ConfigSeverity::Warning => tracing::warn!("config: {issue}"),
            ConfigSeverity::Error => tracing::error!("config: {issue}"),
        }
    }
    if issues.iter().any(|i| i.severity == ConfigSeverity::Error) {
        anyhow::bail!(
            "config validation failed with {} error(s)",
            issues
                .iter()
                .filter(|i| i.severity == ConfigSeverity::Error)
                .count()
        );
    }

    let instance_id = uuid::Uuid::new_v4().to_string();

    // ── Stores ───────────────────────────────────────────────────────
    let store = Store::open(&config.server.state_path).context("opening stores")?;
    tracing::info!(path = %config.server.state_path.display(), "stores ready");

    // ── Event bus + active-run set ───────────────────────────────────
    let bus = Arc::new(EventBus::new(config.bus.clone()));
    let active_runs = Arc::new(ActiveRunSet::new(std::time::Duration::from_secs(
        config.run.active_ttl_seconds(),
    )));
    tracing::info!("event bus ready");

    // ── LLM providers ────────────────────────────────────────────────
    let llm = Arc::new(
        ProviderRegistry::from_config(&config.llm).context("initializing LLM providers")?,
    );
    if llm.is_empty() {
        tracing::warn!("no LLM providers configured — runs will fail at start");
    } else {
        tracing::info!(providers = llm.len(), "LLM provider registry ready");
    }

    // ── Tools ────────────────────────────────────────────────────────
    let tools = Arc::new(
        al_tools::builtin_registry(&config.search).context("registering tools")?,
    );
    tracing::info!(tools = tools.len(), "tool registry ready");

    // ── Runtime services ─────────────────────────────────────────────
    let stops = Arc::new(StopMap::new());
    let tasklist_locks = Arc::new(ThreadLockMap::new());
    let billing = Arc::new(BillingGuard::new(config.billing.clone()));
    let flags = Arc::new(
        FlagStore::open(&config.server.state_path).context("opening flag store")?,
    );

    // ── API token (read once, hashed) ────────────────────────────────
    let api_token_hash = match std::env::var(&config.server.api_token_env) {
        Ok(token) if !token.is_empty() => {
            tracing::info!(env_var = %config.server.api_token_env, "API bearer-token auth enabled");
            Some(Sha256::digest(token.as_bytes()).to_vec())
        }
        _ => {
            tracing::warn!(
                env_var = %config.server.api_token_env,
                "API bearer-token auth DISABLED — set the env var to enable"
            );
            None
        }
    };

    let state = AppState {
        config: config.clone(),
        store,
        bus,
        llm,
        tools,
        stops,
        active_runs,
        tasklist_locks,
        billing,
        flags,
        instance_id: instance_id.clone(),
        api_token_hash,
    };

    // ── Background sweepers ──────────────────────────────────────────
    controller::spawn_reaper(state.clone());
    controller::spawn_bus_sweeper(state.clone());
    tracing::info!("reaper + bus sweeper started");

    // ── Router ───────────────────────────────────────────────────────
    let cors_layer = build_cors_layer(&config.server.cors);
    let max_concurrent = std::env::var("AL_MAX_CONCURRENT_REQUESTS")
        .ok()
        .and_then(|v| v.parse::<usize>().ok())
        .unwrap_or(256);

    let app = api::router(state.clone())
        .layer(cors_layer)
        .layer(tower::limit::ConcurrencyLimitLayer::new(max_concurrent))
        .with_state(state.clone());

    // ── Bind ─────────────────────────────────────────────────────────
    let addr = format!("{}:{}", config.server.host, config.server.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("binding to {addr}"))?;

    tracing::info!(addr = %addr, instance_id = %instance_id, "agentloop listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal(state))
        .await
        .context("axum server error")?;

    Ok(())
}

/// On ctrl-c, signal every active worker to stop before the server
/// exits; workers persist `stopped` and subscribers see a terminal
/// event.
async fn shutdown_signal(state: AppState) {
    let _ = tokio::signal::ctrl_c().await;
    tracing::info!("shutdown requested; stopping active runs");
    controller::shutdown(&state);
    tokio::time::sleep(std::time::Duration::from_millis(500)).await;
}

/// Build a [`CorsLayer`] from the configured allowed origins.
///
/// Origins may end with `:*` to match any port on that host; a literal
/// `"*"` allows all origins (not recommended for production).
fn build_cors_layer(cors: &al_domain::config::CorsConfig) -> CorsLayer {
    use axum::http::header;

    if cors.allowed_origins.len() == 1 && cors.allowed_origins[0] == "*" {
        tracing::warn!("CORS configured with wildcard \"*\" — all origins allowed");
        return CorsLayer::new()
            .allow_origin(tower_http::cors::Any)
            .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE])
            .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION]);
    }

    let mut exact: Vec<HeaderValue> = Vec::new();
    let mut wildcard_prefixes: Vec<String> = Vec::new();

    for origin in &cors.allowed_origins {
        if origin.ends_with(":*") {
            wildcard_prefixes.push(origin.trim_end_matches('*').to_owned());
        } else if let Ok(hv) = origin.parse::<HeaderValue>() {
            exact.push(hv);
        } else {
            tracing::warn!(origin = %origin, "invalid CORS origin, skipping");
        }
    }

    let allow_origin = if wildcard_prefixes.is_empty() {
        AllowOrigin::list(exact)
    } else {
        AllowOrigin::predicate(move |origin, _| {
            let origin_str = origin.to_str().unwrap_or("");
            if exact.iter().any(|e| e.as_bytes() == origin.as_bytes()) {
                return true;
            }
            // Validate the remainder is digits only to prevent
            // prefix-based bypass (e.g. "http://localhost:3000.evil.com").
            wildcard_prefixes.iter().any(|prefix| {
                origin_str
                    .strip_prefix(prefix.as_str())
                    .map(|port| !port.is_empty() && port.chars().all(|c| c.is_ascii_digit()))
                    .unwrap_or(false)
            })
        })
    };

    CorsLayer::new()
        .allow_origin(allow_origin)
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE])
        .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION])
        .allow_credentials(true)
}
