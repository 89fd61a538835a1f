//! Schema migrations embedded from `clinica_core/migrations/`.

use sqlx::PgPool;
use sqlx::migrate::{MigrateError, Migrator};
use tracing::info;

/// Schema for users and patients, with soft-delete aware unique indexes.
pub static MIGRATOR: Migrator = sqlx::migrate!("./migrations");

/// Apply pending migrations.
pub async fn migrate(pool: &PgPool) -> Result<(), MigrateError> {
    info!(available = MIGRATOR.iter().count(), "applying schema migrations");
    MIGRATOR.run(pool).await
}
