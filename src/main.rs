//! Futures PNL Feed - Main Entry Point

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use futures_pnl_feed::config::Config;
use futures_pnl_feed::exchange::MexcClient;
use futures_pnl_feed::portfolio::PortfolioService;
use futures_pnl_feed::server::{create_router, AppState};
use std::sync::Arc;
use tracing::{info, Level};
use tracing_subscriber::fmt::format::FmtSpan;
use tracing_subscriber::EnvFilter;

/// Futures PNL Feed CLI
#[derive(Parser)]
#[command(name = "futures-pnl-feed")]
#[command(version, about = "Equity and PNL feed for MEXC futures accounts")]
struct Cli {
    /// Emit logs as JSON lines
    #[arg(long, global = true)]
    json_logs: bool,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Serve the portfolio snapshot over HTTP (default)
    Serve {
        /// Address to bind (overrides config)
        #[arg(long)]
        host: Option<String>,

        /// Port to bind (overrides config)
        #[arg(short, long)]
        port: Option<u16>,
    },

    /// Fetch one snapshot and print it to stdout
    Snapshot {
        /// Print on a single line instead of pretty JSON
        #[arg(long)]
        compact: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    init_logging(cli.json_logs)?;

    let config = Config::load()?;
    config.validate()?;

    let client = MexcClient::new(&config.exchange)?;
    let service = Arc::new(PortfolioService::new(
        Arc::new(client),
        config.portfolio.clone(),
    ));

    match cli.command {
        Some(Commands::Snapshot { compact }) => print_snapshot(&service, compact).await,
        Some(Commands::Serve { host, port }) => {
            let host = host.unwrap_or_else(|| config.server.host.clone());
            let port = port.unwrap_or(config.server.port);
            serve(service, &host, port).await
        }
        None => serve(service, &config.server.host, config.server.port).await,
    }
}

/// Initialize stdout and rolling-file logging.
fn init_logging(json: bool) -> Result<()> {
    use tracing_subscriber::fmt::writer::MakeWriterExt;

    std::fs::create_dir_all("logs")?;

    let file_appender = tracing_appender::rolling::daily("logs", "pnl-feed.log");
    let (file_writer, _guard) = tracing_appender::non_blocking(file_appender);

    // Leak the guard to keep it alive for the program duration
    Box::leak(Box::new(_guard));

    let filter = EnvFilter::from_default_env()
        .add_directive("futures_pnl_feed=debug".parse()?)
        .add_directive(Level::INFO.into());

    // Snapshot output goes to stdout, so logs go to stderr
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr.and(file_writer))
        .with_target(true)
        .with_file(true)
        .with_line_number(true)
        .with_span_events(FmtSpan::CLOSE);

    if json {
        builder.json().init();
    } else {
        builder.with_ansi(true).init();
    }

    Ok(())
}

async fn print_snapshot(service: &PortfolioService, compact: bool) -> Result<()> {
    let snapshot = service.snapshot().await?;
    let rendered = if compact {
        serde_json::to_string(&snapshot)
    } else {
        serde_json::to_string_pretty(&snapshot)
    }
    .context("Failed to serialize snapshot")?;

    println!("{}", rendered);
    Ok(())
}

async fn serve(service: Arc<PortfolioService>, host: &str, port: u16) -> Result<()> {
    let app = create_router(AppState { service });
    let addr = format!("{}:{}", host, port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;

    info!("Serving portfolio snapshot on http://{}/api/portfolio", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("HTTP server failed")
}

async fn shutdown_signal() {
    if tokio::signal::ctrl_c().await.is_ok() {
        info!("Shutdown signal received");
    }
}
