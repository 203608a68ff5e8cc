use std::time::Duration;

use diesel::pg::PgConnection;
use diesel::r2d2::{ConnectionManager, Pool};
use tracing::debug;

pub type PgPool = Pool<ConnectionManager<PgConnection>>;

pub const DEFAULT_MAX_POOL_SIZE: u32 = 5;
const CONNECTION_TIMEOUT_SECS: u64 = 10;

pub fn init_pool(database_url: &str, max_size: u32) -> anyhow::Result<PgPool> {
    let manager = ConnectionManager::<PgConnection>::new(database_url);
    let pool_size = max_size.max(1);
    debug!(pool_size, "initializing database pool");
    let pool = Pool::builder()
        .max_size(pool_size)
        .connection_timeout(Duration::from_secs(CONNECTION_TIMEOUT_SECS))
        .build(manager)?;
    Ok(pool)
}
