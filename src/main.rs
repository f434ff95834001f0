use std::net::SocketAddr;
use std::sync::Arc;

use clap::Parser;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use vaultview::{cli, config, resolver, vault, web, AppState};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG")
                .unwrap_or_else(|_| "vaultview=debug,tower_http=debug".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let args = cli::Cli::parse();

    // Configuration is validated up front; a bad environment kills the
    // process here instead of surfacing on the first page request.
    let cfg = config::load()?;

    match args.command {
        Some(cli::Commands::Serve { port }) => run_server(cfg, port).await,
        Some(cli::Commands::Check { show_values }) => handle_check(cfg, show_values).await,
        None => {
            let port = std::env::var("VAULTVIEW_PORT")
                .ok()
                .and_then(|p| p.parse().ok())
                .unwrap_or(8080);
            run_server(cfg, port).await
        }
    }
}

async fn run_server(cfg: config::Config, port: u16) -> anyhow::Result<()> {
    tracing::info!(
        "deployment mode: {}, vault: {}",
        cfg.deployment_mode(),
        cfg.vault.addr
    );

    let state = AppState::new(cfg);
    let app = web::router(state);

    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!("vaultview listening on {}", addr);
    axum::serve(listener, app).await?;

    Ok(())
}

/// Runs a single resolution pass against the configured vault and prints
/// the outcome. Values are masked unless --show-values is passed.
async fn handle_check(cfg: config::Config, show_values: bool) -> anyhow::Result<()> {
    if show_values {
        tracing::warn!("printing plaintext secret values to stdout");
    }

    println!("vault:  {}", cfg.vault.addr);
    println!("mode:   {}", cfg.deployment_mode());

    match vault::health(&cfg.vault).await {
        Ok(true) => println!("health: ok"),
        Ok(false) => println!("health: vault reachable but not ready"),
        Err(e) => println!("health: unreachable ({})", e),
    }

    let cfg = Arc::new(cfg);
    let resolver = resolver::SecretResolver::new(cfg.clone());
    let secrets = resolver.resolve(&cfg.secret_names).await?;

    for secret in secrets.iter() {
        if show_values {
            println!("{} = {}", secret.name, secret.value.expose());
        } else {
            println!("{} = ********", secret.name);
        }
    }
    println!("{} secrets resolved", secrets.len());

    Ok(())
}
