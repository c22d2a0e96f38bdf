use diesel_async::async_connection_wrapper::AsyncConnectionWrapper;
use diesel_async::pooled_connection::deadpool::Pool;
use diesel_async::{
    pooled_connection::AsyncDieselConnectionManager, AsyncPgConnection,
};
use diesel_migrations::{
    embed_migrations, EmbeddedMigrations, MigrationHarness,
};
use serde::Deserialize;

use crate::error::{internal_error, DocshareError};

pub const MIGRATIONS: EmbeddedMigrations = embed_migrations!("migrations");

pub type DbConnection =
    deadpool::managed::Object<AsyncDieselConnectionManager<AsyncPgConnection>>;

pub type DbConnectionPool = deadpool::managed::Pool<
    AsyncDieselConnectionManager<diesel_async::AsyncPgConnection>,
>;

fn default_db_port() -> i32 {
    5432
}

fn default_max_connections() -> usize {
    16
}

#[derive(Deserialize, Debug, Clone)]
#[serde(rename_all = "camelCase")]
pub struct DbConfig {
    pub host: String,
    #[serde(default = "default_db_port")]
    pub port: i32,
    pub user: String,
    pub password: String,
    pub database: String,
    #[serde(default = "default_max_connections")]
    pub max_connections: usize,
}

pub fn create_pool(config: &DbConfig) -> Result<DbConnectionPool, DocshareError> {
    let config_string = format!(
        "host={} port={} user={} password={} dbname={}",
        config.host, config.port, config.user, config.password, config.database,
    );
    let manager =
        AsyncDieselConnectionManager::<diesel_async::AsyncPgConnection>::new(
            config_string,
        );
    Pool::builder(manager)
        .max_size(config.max_connections)
        .build()
        .map_err(internal_error)
}

pub async fn run_migrations(pool: &DbConnectionPool) -> Result<(), DocshareError> {
    let conn = pool.get().await.map_err(internal_error)?;
    let conn = deadpool::managed::Object::take(conn);
    let mut wrapper: AsyncConnectionWrapper<AsyncPgConnection> =
        AsyncConnectionWrapper::from(conn);
    let applied = tokio::task::spawn_blocking(move || {
        wrapper
            .run_pending_migrations(MIGRATIONS)
            .map(|versions| versions.len())
            .map_err(|err| DocshareError::internal(&err.to_string()))
    })
    .await
    .map_err(internal_error)??;
    log::info!("db: applied {} pending migrations", applied);
    Ok(())
}
