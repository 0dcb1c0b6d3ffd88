use std::time::Duration;

use sea_orm::{ConnectOptions, Database, DatabaseConnection, DbErr};
use tracing::debug;

/// Connect to Postgres and sync the `user`, `storage` and `file` tables.
pub async fn init_db(db_url: &str) -> Result<DatabaseConnection, DbErr> {
    let mut opt = ConnectOptions::new(db_url.to_owned());

    // Writers hold a storage row lock while bytes move on disk, so waiting
    // for a connection is allowed to take longer than opening one.
    opt.max_connections(32)
        .min_connections(2)
        .connect_timeout(Duration::from_secs(8))
        .acquire_timeout(Duration::from_secs(30))
        .idle_timeout(Duration::from_secs(300))
        .sqlx_logging(true);

    let db = Database::connect(opt).await?;
    db.get_schema_registry("stash_server::entity::*")
        .sync(&db)
        .await?;
    debug!("Database schema in sync");

    Ok(db)
}
