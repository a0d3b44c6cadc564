use anyhow::Context;
use fleetnav_core::Database;
use fleetnav_service::channel::ticker;
use fleetnav_service::{build_router, AppState, Config};
use tracing_subscriber::{fmt, EnvFilter};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Structured logging
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    fmt().with_env_filter(filter).json().init();

    let cfg = Config::from_env()?;
    let addr = cfg.addr()?;
    let db = Database::open(&cfg.db_path, &cfg.db_open)
        .with_context(|| format!("opening database {}", cfg.db_path.display()))?;
    let state = AppState::new(cfg, db);

    if let Some(period) = state.config.tick_interval {
        ticker::spawn_ticker(state.channel.clone(), period, state.config.tick_target.clone());
    }

    let app = build_router(state.clone());
    tracing::info!(
        core_version = %fleetnav_core::version(),
        addr = %addr,
        db = %state.config.db_path.display(),
        vicinity_m = state.config.vicinity_m,
        "starting fleetnav-service"
    );
    let listener = tokio::net::TcpListener::bind(addr).await.context("bind failed")?;
    axum::serve(listener, app).await.context("server error")?;
    Ok(())
}
