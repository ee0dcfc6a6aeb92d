use clap::Parser;
use deepinfra_proxy::config::config_search_paths;
use deepinfra_proxy::{build_router, AppState, ProxyConfig};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(
    name = "deepinfra-proxy",
    about = "Browser-session reverse proxy for the DeepInfra chat completions API",
    version
)]
struct Cli {
    /// Path to config file (TOML)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Address to bind (overrides config)
    #[arg(long)]
    host: Option<String>,

    /// Port to listen on (overrides config)
    #[arg(short, long)]
    port: Option<u16>,

    /// Upstream chat completions URL (overrides config)
    #[arg(long)]
    upstream_url: Option<String>,

    /// Print config search paths and exit
    #[arg(long)]
    show_config_paths: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "deepinfra_proxy=info,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    if cli.show_config_paths {
        println!("Config search paths:");
        for (i, path) in config_search_paths().iter().enumerate() {
            println!("  {}. {}", i + 1, path.display());
        }
        return Ok(());
    }

    let mut config = ProxyConfig::find_and_load(cli.config.as_deref())?;

    if let Some(host) = cli.host {
        config.host = host;
    }
    if let Some(port) = cli.port {
        config.port = port;
    }
    if let Some(url) = cli.upstream_url {
        config.upstream.url = url;
    }
    config.validate()?;

    let state = Arc::new(AppState::from_config(config.clone())?);

    info!("deepinfra-proxy v{}", env!("CARGO_PKG_VERSION"));
    info!("  Upstream:   {}", state.upstream.url());
    info!("  Default:    {}", config.defaults.model);
    info!("  Aliases:    {}", state.aliases.len());
    info!(
        "  Timeouts:   connect={}s read={}s request={}s",
        config.upstream.connect_timeout_secs,
        config.upstream.read_timeout_secs,
        config.upstream.request_timeout_secs
    );

    let app = build_router(state);
    let bind_addr = format!("{}:{}", config.host, config.port);
    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;

    info!("Listening on http://{}", bind_addr);
    info!("  POST /api                  stream pass-through");
    info!("  GET  /api/chat?model&prompt assembled JSON");
    info!("  GET  /chat/<alias>?prompt   alias single-shot");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::warn!(error = %e, "Cannot listen for Ctrl-C, running until killed");
        std::future::pending::<()>().await;
    }
    info!("Shutting down");
}
