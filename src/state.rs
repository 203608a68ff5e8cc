use std::sync::Arc;

use diesel::{
    pg::PgConnection,
    r2d2::{ConnectionManager, PooledConnection},
};

use crate::{
    auth::jwt::JwtService,
    config::AppConfig,
    db::PgPool,
    error::{AppError, AppResult},
    render::MarkupRenderer,
    services::{copilot::ChatProvider, email::Mailer, file_store::FileStore},
};

type PgPooledConnection = PooledConnection<ConnectionManager<PgConnection>>;

#[derive(Clone)]
pub struct AppState {
    pub pool: PgPool,
    pub config: Arc<AppConfig>,
    pub jwt: JwtService,
    pub renderer: Arc<dyn MarkupRenderer>,
    pub mailer: Arc<dyn Mailer>,
    pub copilot: Arc<dyn ChatProvider>,
    pub files: Arc<FileStore>,
}

impl AppState {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        pool: PgPool,
        config: AppConfig,
        jwt: JwtService,
        renderer: Arc<dyn MarkupRenderer>,
        mailer: Arc<dyn Mailer>,
        copilot: Arc<dyn ChatProvider>,
    ) -> Self {
        Self {
            pool,
            config: Arc::new(config),
            jwt,
            renderer,
            mailer,
            copilot,
            files: Arc::new(FileStore::new()),
        }
    }

    pub fn db(&self) -> AppResult<PgPooledConnection> {
        self.pool
            .get()
            .map_err(|err| AppError::internal(format!("database pool error: {err}")))
    }
}
