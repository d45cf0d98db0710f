//! Test utilities and helpers for integration and unit testing
//!
//! This module provides common test infrastructure including:
//! - Database setup/teardown
//! - Local store fixtures
//! - Mock data factories

use crate::local::LocalStore;
use crate::meals::MealEntry;
use chrono::{DateTime, Local, TimeZone, Utc};
use sqlx::SqlitePool;

/// ---------------------------------------------------------------------------
/// Database Test Utilities
/// ---------------------------------------------------------------------------

/// Create an in-memory SQLite database for testing
/// Runs all migrations and returns a ready-to-use pool
///
/// Uses max_connections(1) to prevent multiple pool connections from creating
/// isolated in-memory databases, which would cause intermittent test failures
pub async fn setup_test_db() -> SqlitePool {
  let pool = sqlx::sqlite::SqlitePoolOptions::new()
    .max_connections(1)
    .connect("sqlite::memory:")
    .await
    .expect("Failed to create in-memory database");

  sqlx::migrate!("./migrations")
    .run(&pool)
    .await
    .expect("Failed to run migrations");

  pool
}

/// Close a test database pool
pub async fn teardown_test_db(pool: SqlitePool) {
  pool.close().await;
}

/// ---------------------------------------------------------------------------
/// Local Store Fixtures
/// ---------------------------------------------------------------------------

/// Create a local store backed by a temp directory. Keep the returned
/// TempDir alive for the duration of the test.
pub fn temp_local_store() -> (tempfile::TempDir, LocalStore) {
  let dir = tempfile::tempdir().expect("Failed to create temp dir");
  let store = LocalStore::open(dir.path().join("local.json")).expect("Failed to open local store");
  (dir, store)
}

/// ---------------------------------------------------------------------------
/// Mock Data Factories
/// ---------------------------------------------------------------------------

/// A wall-clock timestamp in the local timezone, converted to UTC the way
/// entries store it.
pub fn local_datetime(year: i32, month: u32, day: u32, hour: u32, minute: u32) -> DateTime<Utc> {
  Local
    .with_ymd_and_hms(year, month, day, hour, minute, 0)
    .single()
    .expect("Unambiguous local time")
    .with_timezone(&Utc)
}

/// Create a mock meal entry; macros are derived from the calories so each
/// entry is distinguishable.
pub fn mock_meal(description: &str, timestamp: DateTime<Utc>, calories: f64) -> MealEntry {
  MealEntry {
    id: format!("{}-{}", description, timestamp.timestamp_millis()),
    timestamp,
    description: description.to_string(),
    calories,
    protein: calories / 10.0,
    carbs: calories / 8.0,
    fat: calories / 20.0,
  }
}

/// ---------------------------------------------------------------------------
/// Tests for Test Utilities
/// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
  use super::*;

  #[tokio::test]
  async fn test_setup_db_creates_schema() {
    let pool = setup_test_db().await;

    let tables: Vec<(String,)> = sqlx::query_as(
      "SELECT name FROM sqlite_master WHERE type='table' AND name IN ('cycles', 'completions', 'meals', 'weights')"
    )
    .fetch_all(&pool)
    .await
    .expect("Failed to query tables");

    assert_eq!(tables.len(), 4, "Expected 4 tables, got {}", tables.len());

    teardown_test_db(pool).await;
  }

  #[test]
  fn test_temp_local_store_starts_empty() {
    let (_dir, store) = temp_local_store();
    assert!(store.get(crate::local::PROGRESS_KEY).is_none());
  }

  #[test]
  fn test_mock_meal_derives_macros() {
    let meal = mock_meal("eggs", local_datetime(2024, 6, 1, 8, 0), 300.0);
    assert_eq!(meal.protein, 30.0);
    assert_eq!(meal.carbs, 37.5);
    assert_eq!(meal.fat, 15.0);
  }
}
