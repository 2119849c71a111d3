use axum::Router;
use clap::{Parser, Subcommand};
use tokio::net::TcpListener;
use tracing::Level;
use tracing_subscriber::FmtSubscriber;

use lob_engine::engine::EngineConfig;
use lob_engine::instrument::{Asset, Symbol};
use lob_engine::utils::shutdown_token;
use lob_engine::{feeder, market_maker, state::AppState};

#[derive(Parser)]
#[command(name = "lob-engine")]
#[command(version, about = "A price-time-priority limit order book engine")]
struct Cli {
    /// Forces CSV debug diagnostics on, overriding `DEBUG_MODE`.
    #[arg(long, global = true)]
    debug: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Runs the HTTP/WS server on its own.
    Server { port: u16 },
    /// Runs the server plus a market maker and noisy order-flow simulator.
    Simulate { port: u16, secs: u64 },
    /// Runs the server plus a tick-CSV strategy feeder.
    Feed {
        port: u16,
        ticks_path: std::path::PathBuf,
        #[arg(long)]
        signal_log: Option<std::path::PathBuf>,
        #[arg(long)]
        executed_log: Option<std::path::PathBuf>,
    },
}

/// Resolves the debug-diagnostics toggle: an explicit CLI flag wins,
/// otherwise fall back to the `DEBUG_MODE` env var.
fn debug_enabled(flag: bool) -> bool {
    flag || std::env::var("DEBUG_MODE").is_ok_and(|v| v == "1" || v.eq_ignore_ascii_case("true"))
}

async fn wait_for_server(api_base: &str) -> anyhow::Result<()> {
    let client = reqwest::Client::new();
    loop {
        match client.get(format!("{}/book", api_base)).send().await {
            Ok(resp) if resp.status().is_success() => break,
            _ => tokio::time::sleep(std::time::Duration::from_millis(25)).await,
        }
    }
    Ok(())
}

async fn seed_book(api_base: &str) -> anyhow::Result<()> {
    let client = reqwest::Client::new();
    for (side, price) in &[("Buy", "48.00"), ("Sell", "52.00")] {
        client
            .post(format!("{}/orders", api_base))
            .json(&serde_json::json!({
                "side": side,
                "order_type": "Limit",
                "price": price,
                "quantity": 10,
            }))
            .send()
            .await?
            .error_for_status()?;
        tracing::info!(side, price, "seeded resting order");
    }
    Ok(())
}

async fn get_app_listener(port: u16, state: AppState) -> anyhow::Result<(TcpListener, Router)> {
    let app = lob_engine::api::router(state);
    let ep = format!("0.0.0.0:{port}");
    let listener = tokio::net::TcpListener::bind(ep).await?;
    Ok((listener, app))
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let subscriber = FmtSubscriber::builder().with_max_level(Level::INFO).finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let cli = Cli::parse();
    let base = "http://127.0.0.1".to_string();

    let symbol = Symbol::crypto_usd(Asset::BTC);
    let engine_config = EngineConfig {
        debug: debug_enabled(cli.debug),
        ..EngineConfig::default()
    };
    if engine_config.debug {
        tracing::info!("debug diagnostics enabled (CSV trade/snapshot logs)");
    }
    let state = AppState::new(symbol, engine_config);
    let token = shutdown_token();

    match cli.command {
        Commands::Server { port } => {
            let server_token = token.clone();
            let (listener, app) = get_app_listener(port, state).await?;
            tracing::info!(port, "HTTP/WS server listening");
            axum::serve(listener, app)
                .with_graceful_shutdown(server_token.cancelled_owned())
                .await?;
        }
        Commands::Simulate { port, secs } => {
            let server_token = token.clone();
            let mm_token = token.clone();
            let sim_token = token.clone();

            let mut handlers = tokio::task::JoinSet::new();
            let (listener, app) = get_app_listener(port, state).await?;
            handlers.spawn(async move {
                tracing::info!(port, "HTTP/WS server listening");
                axum::serve(listener, app)
                    .with_graceful_shutdown(server_token.cancelled_owned())
                    .await
                    .unwrap();
            });

            let ep = format!("{}:{}", base, port);
            wait_for_server(&ep).await?;
            seed_book(&ep).await?;

            let mmb = base.clone();
            handlers.spawn(async move {
                if let Err(e) = market_maker::run_market_maker(&mmb, mm_token).await {
                    tracing::error!(error = ?e, "market maker exited");
                }
            });

            handlers.spawn(async move {
                if let Err(e) = feeder::run_simulation(
                    feeder::SimConfig {
                        api_base: ep.clone(),
                        run_secs: if secs == 0 { None } else { Some(secs) },
                        attack_rate_hz: 5.0,
                        noise_sigma: 0.25,
                        mean_qty: 3.0,
                    },
                    sim_token,
                )
                .await
                {
                    tracing::error!(error = ?e, "simulation exited");
                }
            });

            handlers.join_all().await;
        }
        Commands::Feed { port, ticks_path, signal_log, executed_log } => {
            // Fail fast (non-zero exit, before the server even binds) if the
            // tick file can't be opened, rather than surfacing it later as a
            // swallowed error from the spawned feeder task.
            csv::Reader::from_path(&ticks_path)
                .map_err(|e| anyhow::anyhow!("cannot open tick file {}: {e}", ticks_path.display()))?;

            let server_token = token.clone();
            let feed_token = token.clone();

            let mut handlers = tokio::task::JoinSet::new();
            let (listener, app) = get_app_listener(port, state).await?;
            handlers.spawn(async move {
                tracing::info!(port, "HTTP/WS server listening");
                axum::serve(listener, app)
                    .with_graceful_shutdown(server_token.cancelled_owned())
                    .await
                    .unwrap();
            });

            let ep = format!("{}:{}", base, port);
            wait_for_server(&ep).await?;

            handlers.spawn(async move {
                if let Err(e) = feeder::run_feeder(
                    feeder::FeederConfig {
                        api_base: ep,
                        ticks_path,
                        signal_log_path: signal_log,
                        executed_log_path: executed_log,
                        order_quantity: 1,
                        short_window: 5,
                        long_window: 20,
                    },
                    feed_token,
                )
                .await
                {
                    tracing::error!(error = ?e, "feeder exited");
                }
            });

            handlers.join_all().await;
        }
    }
    Ok(())
}
