//! Multiplier Trader Binary
//!
//! Connects to Deriv and either places the configured number of multiplier
//! orders or checks the API token.
//!
//! # Usage
//!
//! ```bash
//! cargo run --bin multiplier-trader
//! ```
//!
//! # Environment Variables
//!
//! ## Required
//! - `DERIV_TOKEN`: API token
//! - `TRADER_STAKE`: Stake per order (e.g. 10.50)
//!
//! ## Optional
//! - `TRADER_MODE`: run | check (default: run)
//! - `DERIV_ENDPOINT`: WebSocket endpoint (default: <wss://ws.derivws.com/websockets/v3>)
//! - `DERIV_APP_ID`: Application id (default: 62002)
//! - `TRADER_SYMBOL`: Instrument (default: BOOM500)
//! - `TRADER_DIRECTION`: up | down (default: up)
//! - `TRADER_MULTIPLIER`: Contract multiplier (default: 400)
//! - `TRADER_DURATION_UNIT`: s | m | h | d | t (default: s)
//! - `TRADER_CURRENCY`: Account currency (default: USD)
//! - `TRADER_LANDING_COMPANY`: Landing company (default: svg)
//! - `TRADER_PRODUCT_TYPE`: Product type (default: basic)
//! - `TRADER_BUY_COUNT`: Buy attempts per run (default: 1)
//! - `TRADER_PACING_DELAY_MS`: Delay between attempts (default: 1000)
//! - `TRADER_REPLY_TIMEOUT_SECS`: Reply timeout (default: 30)
//! - `TRADER_HEARTBEAT_INTERVAL_SECS`: Ping interval (default: 30)
//! - `TRADER_HEARTBEAT_TIMEOUT_SECS`: Silence before closing (default: 60)
//! - `TRADER_CONNECT_ATTEMPTS`: Connection attempts (default: 3)
//! - `TRADER_METRICS_PORT`: Prometheus port, 0 disables (default: 0)
//! - `OTEL_ENABLED`: Export spans over OTLP (default: false)
//! - `RUST_LOG`: Log level (default: info)

use std::sync::Arc;

use multiplier_trader::application::ports::TransportPort;
use multiplier_trader::infrastructure::telemetry;
use multiplier_trader::{
    ConsoleSink, OrderSequencer, RunMode, StopHandle, TraderConfig, WsTransport, init_metrics,
};
use tokio::signal;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    rustls::crypto::ring::default_provider()
        .install_default()
        .map_err(|_| "failed to install rustls crypto provider")?;

    load_dotenv();

    let _telemetry_guard = telemetry::init()?;

    tracing::info!("Starting Multiplier Trader");

    let config = TraderConfig::from_env()?;
    log_config(&config);

    if let Some(addr) = init_metrics(config.metrics_port)? {
        tracing::info!(addr = %addr, "Metrics exporter listening");
    }

    let transport = Arc::new(WsTransport::connect(config.transport_config()).await?);
    let mut sequencer = OrderSequencer::new(
        Arc::clone(&transport),
        Arc::new(ConsoleSink),
        config.sequencer_config(),
    );

    let stop_handle = sequencer.stop_handle();
    let shutdown = tokio::spawn(await_shutdown(stop_handle));

    let outcome: Result<(), Box<dyn std::error::Error>> = match config.mode {
        RunMode::Check => match sequencer.check_credential(config.credential.clone()).await {
            Ok(account) => {
                tracing::info!(
                    login_id = account.login_id.as_deref().unwrap_or("unknown"),
                    currency = account.currency.as_deref().unwrap_or("unknown"),
                    "Credential valid"
                );
                Ok(())
            }
            Err(e) => Err(e.into()),
        },
        RunMode::Run => {
            let report = sequencer
                .start(
                    config.credential.clone(),
                    config.plan.clone(),
                    config.run.buy_count,
                )
                .await?;
            if report.is_completed() {
                Ok(())
            } else {
                Err(format!(
                    "run aborted after {} of {} buy attempts: {}",
                    report.completed_buy_count,
                    report.target_buy_count,
                    report.abort_reason.as_deref().unwrap_or("unknown")
                )
                .into())
            }
        }
    };

    shutdown.abort();
    transport.close().await;

    tracing::info!("Multiplier Trader stopped");
    outcome
}

/// Load .env file from current or ancestor directories.
fn load_dotenv() {
    if dotenvy::dotenv().is_ok() {
        return;
    }

    if let Ok(cwd) = std::env::current_dir() {
        for dir in cwd.ancestors().skip(1) {
            let env_path = dir.join(".env");
            if env_path.exists() {
                let _ = dotenvy::from_path(&env_path);
                return;
            }
        }
    }
}

/// Log the parsed configuration.
fn log_config(config: &TraderConfig) {
    tracing::info!(
        mode = config.mode.as_str(),
        endpoint = %config.endpoint.url,
        app_id = config.endpoint.app_id,
        symbol = config.plan.symbol(),
        stake = %config.plan.stake(),
        multiplier = config.plan.multiplier(),
        buy_count = config.run.buy_count,
        "Configuration loaded"
    );
    tracing::debug!(
        pacing_delay_ms = config.run.pacing_delay.as_millis(),
        reply_timeout_secs = config.run.reply_timeout.as_secs(),
        heartbeat_interval_secs = config.connection.heartbeat_interval.as_secs(),
        connect_attempts = config.connection.connect_attempts,
        "Connection tuning"
    );
}

/// Wait for SIGINT or SIGTERM, then stop the current run.
async fn await_shutdown(stop_handle: StopHandle) {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            tracing::info!("Received Ctrl+C, stopping run");
        }
        () = terminate => {
            tracing::info!("Received SIGTERM, stopping run");
        }
    }

    stop_handle.stop();
}
