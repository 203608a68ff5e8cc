use std::sync::Arc;

use anyhow::Context;
use diesel_migrations::{embed_migrations, EmbeddedMigrations, MigrationHarness};
use tracing::info;
use tracing_subscriber::EnvFilter;

use aris::auth::jwt::JwtService;
use aris::config::AppConfig;
use aris::db;
use aris::render::{BasicRenderer, HttpRenderer, MarkupRenderer};
use aris::routes::create_router;
use aris::services::copilot::provider_from_config;
use aris::services::email::{LogMailer, Mailer, ResendMailer};
use aris::state::AppState;

pub const MIGRATIONS: EmbeddedMigrations = embed_migrations!("migrations");

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config = AppConfig::from_env()?;
    info!(
        database_url = %config.redacted_database_url(),
        "starting aris backend"
    );

    let pool = db::init_pool(&config.database_url, config.database_max_pool_size)?;
    {
        let mut conn = pool.get().context("database connection for migrations")?;
        conn.run_pending_migrations(MIGRATIONS)
            .map_err(|err| anyhow::anyhow!("running migrations: {err}"))?;
    }

    let jwt = JwtService::from_config(&config)?;

    let renderer: Arc<dyn MarkupRenderer> = match config.rsm_renderer_endpoint.as_deref() {
        Some(endpoint) => {
            info!(endpoint, "using HTTP markup renderer");
            Arc::new(HttpRenderer::new(endpoint))
        }
        None => {
            info!("no renderer endpoint configured, using built-in renderer");
            Arc::new(BasicRenderer)
        }
    };

    let mailer: Arc<dyn Mailer> = match config.resend_api_key.as_deref() {
        Some(api_key) => Arc::new(ResendMailer::new(api_key, config.email_from.clone())),
        None => {
            info!("no RESEND_API_KEY configured, logging outbound email instead");
            Arc::new(LogMailer)
        }
    };

    let copilot = provider_from_config(&config)?;
    info!(provider = copilot.name(), "copilot provider configured");

    let addr = format!("{}:{}", config.server_host, config.server_port);
    let state = AppState::new(pool, config, jwt, renderer, mailer, copilot);

    {
        let mut conn = state
            .pool
            .get()
            .context("database connection for file mirror sync")?;
        let loaded = state.files.sync_from_database(&mut conn).await?;
        info!(loaded, "file mirror primed from database");
    }

    let app = create_router(state);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("binding {addr}"))?;
    info!(%addr, "listening");
    axum::serve(listener, app).await?;
    Ok(())
}
