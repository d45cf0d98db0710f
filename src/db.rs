use sqlx::sqlite::{SqlitePool, SqlitePoolOptions};
use std::fs;
use std::path::Path;
use thiserror::Error;

pub type DbPool = SqlitePool;

#[derive(Debug, Error)]
pub enum DbError {
  #[error("Failed to create data directory: {0}")]
  Io(#[from] std::io::Error),

  #[error("Database error: {0}")]
  Sqlx(#[from] sqlx::Error),

  #[error("Migration error: {0}")]
  Migrate(#[from] sqlx::migrate::MigrateError),
}

/// Initialize the database connection pool at the given file path and run
/// migrations. Parent directories are created if missing.
pub async fn initialize_db(db_path: &Path) -> Result<DbPool, DbError> {
  if let Some(parent) = db_path.parent() {
    fs::create_dir_all(parent)?;
  }

  let db_url = format!("sqlite://{}?mode=rwc", db_path.display());
  tracing::info!(path = %db_path.display(), "Initializing database");

  let pool = SqlitePoolOptions::new()
    .max_connections(5)
    .connect(&db_url)
    .await?;

  sqlx::migrate!("./migrations").run(&pool).await?;

  tracing::info!("Database initialized successfully");
  Ok(pool)
}
