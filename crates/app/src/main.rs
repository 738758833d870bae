mod api_error;
mod config;
mod cookies;
mod middleware;
mod routes;

use std::time::Duration;

use anyhow::Context;
use clap::Parser;
use services::{AppServices, Clock};
use tracing::{error, info};

use config::{Cli, normalize_sqlite_url, prepare_sqlite_file};
use cookies::CookiePolicy;
use routes::{AppState, create_router};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("claimdesk=info".parse()?)
                .add_directive("services=info".parse()?),
        )
        .init();

    let cli = Cli::parse();
    let db_url = normalize_sqlite_url(&cli.db_url);
    info!(db = %db_url, "starting claimdesk");

    // Open + migrate SQLite at startup so handlers never see a missing schema.
    prepare_sqlite_file(&db_url)?;
    let settings = cli.service_settings()?;
    let services = AppServices::new_sqlite(&db_url, Clock::default_clock(), settings)
        .await
        .context("initialising services")?;

    let state = AppState {
        services: services.clone(),
        cookies: CookiePolicy {
            secure: cli.secure_cookies,
            max_age_secs: cli.session_ttl_secs,
        },
    };
    let app = create_router(state);
    let sweeper = tokio::spawn(sweep_sessions(
        services.clone(),
        Duration::from_secs(cli.session_sweep_secs),
    ));

    let listener = tokio::net::TcpListener::bind(cli.bind)
        .await
        .with_context(|| format!("binding {}", cli.bind))?;
    info!("listening on http://{}", cli.bind);
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    sweeper.abort();
    info!("draining progress writes");
    services.progress().flush_all().await;
    Ok(())
}

/// Periodically drop expired sessions and release their progress trackers.
async fn sweep_sessions(services: AppServices, period: Duration) {
    let mut ticker = tokio::time::interval(period);
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
    // The first tick fires immediately.
    ticker.tick().await;
    loop {
        ticker.tick().await;
        services.sweep_sessions().await;
    }
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        error!(error = %err, "failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    info!("shutdown requested");
}
