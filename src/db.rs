use diesel::r2d2::{ConnectionManager, Pool, PoolError, PooledConnection};
use diesel::PgConnection;
use diesel_migrations::{embed_migrations, EmbeddedMigrations, MigrationHarness};
use std::sync::Arc;

pub const MIGRATIONS: EmbeddedMigrations = embed_migrations!("migrations");

pub type PgPool = Pool<ConnectionManager<PgConnection>>;
pub type PgPooledConnection = PooledConnection<ConnectionManager<PgConnection>>;
pub type DbPool = Arc<PgPool>;

#[derive(Debug)]
pub enum DbError {
    PoolError(PoolError),
    DieselError(diesel::result::Error),
    MigrationError(String),
}

impl From<PoolError> for DbError {
    fn from(err: PoolError) -> Self {
        DbError::PoolError(err)
    }
}

impl From<diesel::result::Error> for DbError {
    fn from(err: diesel::result::Error) -> Self {
        DbError::DieselError(err)
    }
}

impl std::fmt::Display for DbError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DbError::PoolError(e) => write!(f, "Pool error: {}", e),
            DbError::DieselError(e) => write!(f, "Database error: {}", e),
            DbError::MigrationError(e) => write!(f, "Migration error: {}", e),
        }
    }
}

impl std::error::Error for DbError {}

pub fn create_pool(database_url: &str) -> Result<PgPool, PoolError> {
    let manager = ConnectionManager::<PgConnection>::new(database_url);
    Pool::builder().build(manager)
}

pub fn run_migrations(pool: &PgPool) -> Result<usize, DbError> {
    let conn: &mut PgPooledConnection = &mut pool.get()?;

    let applied = conn
        .run_pending_migrations(MIGRATIONS)
        .map_err(|e| DbError::MigrationError(e.to_string()))?;

    Ok(applied.len())
}
