//! Body weight tracking
//!
//! Owner-scoped weigh-in entries. The list view wants most-recent-first;
//! the trend chart wants the same data oldest-first.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::SqlitePool;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum WeightError {
  #[error("Database error: {0}")]
  Database(#[from] sqlx::Error),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct WeightEntry {
  pub id: String,
  pub weight: f64,
  pub recorded_at: DateTime<Utc>,
}

fn mint_weight_id() -> String {
  format!("weight-{}", crate::meals::monotonic_millis())
}

/// Record a weigh-in under a freshly minted id.
pub async fn add_weight(
  pool: &SqlitePool,
  owner: &str,
  weight: f64,
  recorded_at: DateTime<Utc>,
) -> Result<WeightEntry, WeightError> {
  let entry = WeightEntry {
    id: mint_weight_id(),
    weight,
    recorded_at,
  };

  sqlx::query("INSERT INTO weights (owner, id, weight, recorded_at) VALUES (?, ?, ?, ?)")
    .bind(owner)
    .bind(&entry.id)
    .bind(entry.weight)
    .bind(entry.recorded_at)
    .execute(pool)
    .await?;

  Ok(entry)
}

/// All weigh-ins for an owner, most recent first.
pub async fn list_weights(pool: &SqlitePool, owner: &str) -> Result<Vec<WeightEntry>, WeightError> {
  let entries = sqlx::query_as::<_, WeightEntry>(
    "SELECT id, weight, recorded_at FROM weights WHERE owner = ? ORDER BY recorded_at DESC",
  )
  .bind(owner)
  .fetch_all(pool)
  .await?;

  Ok(entries)
}

/// Correct a previously recorded weigh-in. Updating an id the owner never
/// had is a no-op.
pub async fn update_weight(
  pool: &SqlitePool,
  owner: &str,
  id: &str,
  weight: f64,
) -> Result<(), WeightError> {
  sqlx::query("UPDATE weights SET weight = ? WHERE owner = ? AND id = ?")
    .bind(weight)
    .bind(owner)
    .bind(id)
    .execute(pool)
    .await?;

  Ok(())
}

/// Idempotent delete: removing an id the owner never had is a no-op.
pub async fn delete_weight(pool: &SqlitePool, owner: &str, id: &str) -> Result<(), WeightError> {
  let result = sqlx::query("DELETE FROM weights WHERE owner = ? AND id = ?")
    .bind(owner)
    .bind(id)
    .execute(pool)
    .await?;

  if result.rows_affected() == 0 {
    tracing::debug!(id, "Delete of missing weight entry ignored");
  }
  Ok(())
}

/// (timestamp, weight) pairs oldest-first, ready for a trend chart.
pub async fn trend_series(
  pool: &SqlitePool,
  owner: &str,
) -> Result<Vec<(DateTime<Utc>, f64)>, WeightError> {
  let mut entries = list_weights(pool, owner).await?;
  entries.reverse();
  Ok(entries.into_iter().map(|e| (e.recorded_at, e.weight)).collect())
}

/// ---------------------------------------------------------------------------
/// Tests
/// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
  use super::*;
  use crate::test_utils::{setup_test_db, teardown_test_db};
  use chrono::Duration;

  const UID: &str = "user-1";

  #[tokio::test]
  async fn test_add_update_delete_roundtrip() {
    let pool = setup_test_db().await;

    let entry = add_weight(&pool, UID, 82.4, Utc::now()).await.expect("add");
    update_weight(&pool, UID, &entry.id, 82.1).await.expect("update");

    let entries = list_weights(&pool, UID).await.expect("list");
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].weight, 82.1);

    delete_weight(&pool, UID, &entry.id).await.expect("delete");
    // Deleting again is a no-op.
    delete_weight(&pool, UID, &entry.id).await.expect("second delete");
    assert!(list_weights(&pool, UID).await.expect("list").is_empty());

    teardown_test_db(pool).await;
  }

  #[tokio::test]
  async fn test_list_is_newest_first_and_trend_oldest_first() {
    let pool = setup_test_db().await;
    let now = Utc::now();

    add_weight(&pool, UID, 84.0, now - Duration::days(2)).await.expect("add");
    add_weight(&pool, UID, 83.2, now - Duration::days(1)).await.expect("add");
    add_weight(&pool, UID, 82.4, now).await.expect("add");

    let entries = list_weights(&pool, UID).await.expect("list");
    assert_eq!(entries[0].weight, 82.4);
    assert_eq!(entries[2].weight, 84.0);

    let series = trend_series(&pool, UID).await.expect("series");
    assert_eq!(series[0].1, 84.0);
    assert_eq!(series[2].1, 82.4);
    assert!(series[0].0 < series[1].0);

    teardown_test_db(pool).await;
  }

  #[tokio::test]
  async fn test_weights_are_owner_scoped() {
    let pool = setup_test_db().await;
    add_weight(&pool, UID, 82.4, Utc::now()).await.expect("add");

    assert!(list_weights(&pool, "someone-else").await.expect("list").is_empty());

    teardown_test_db(pool).await;
  }
}
