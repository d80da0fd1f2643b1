use anyhow::Result;
use matriz::{
    cache::SheetCache,
    config::Config,
    http::{routes, AppState},
    mirror::MatrixMirror,
    sheets::GoogleSheetsClient,
};
use reqwest::Client;
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::{fmt, EnvFilter};

#[tokio::main]
async fn main() -> Result<()> {
    // ─── 1) config + logging ─────────────────────────────────────────
    let cfg = Config::load()?;
    let env = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("{},matriz=info", cfg.log_level)));
    fmt::Subscriber::builder().with_env_filter(env).init();
    info!(?cfg, "startup");

    // ─── 2) upstream + cache ─────────────────────────────────────────
    let client = GoogleSheetsClient::new(Client::new(), &cfg)?;
    let cache = SheetCache::with_system_clock(Arc::new(client), cfg.cache_ttl());

    let mirror = if cfg.use_mirror {
        let mirror = MatrixMirror::open(&cfg.mirror_path)?;
        info!(path = %cfg.mirror_path.display(), "matriz-dados served from mirror");
        Some(mirror)
    } else {
        None
    };

    let state = Arc::new(AppState {
        cache,
        mirror,
        matrix_tab: cfg.matrix_tab.clone(),
    });

    // ─── 3) serve ────────────────────────────────────────────────────
    info!("Server starting on port {}", cfg.port);
    info!("Health check: http://localhost:{}/api/health/", cfg.port);
    warp::serve(routes(state)).run(([0, 0, 0, 0], cfg.port)).await;

    Ok(())
}
