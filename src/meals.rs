//! Meal Log Aggregator
//!
//! Owner-scoped meal entries with a live full-snapshot subscription, plus
//! the pure aggregation used for display: day/year rollups and the 7-day
//! totals behind the trend chart.
//!
//! The aggregator never estimates nutrition itself; it stores and sums
//! whatever numbers the estimation service produced, rounding only the
//! displayed totals (sum raw first, round once) so rounding error never
//! compounds across entries.

use chrono::{DateTime, Datelike, Duration, Local, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sqlx::SqlitePool;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicI64, Ordering};
use thiserror::Error;
use tokio::sync::watch;

#[derive(Debug, Error)]
pub enum MealLogError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),
}

// ---------------------------------------------------------------------------
/// Meal Entries
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct MealEntry {
    pub id: String,
    pub timestamp: DateTime<Utc>,
    pub description: String,
    pub calories: f64,
    pub protein: f64,
    pub carbs: f64,
    pub fat: f64,
}

/// Input for an upsert. Without an id a new entry is created under a
/// freshly minted one; with an id the existing entry is replaced in full
/// (the id stays stable).
#[derive(Debug, Clone)]
pub struct MealDraft {
    pub id: Option<String>,
    pub timestamp: DateTime<Utc>,
    pub description: String,
    pub calories: f64,
    pub protein: f64,
    pub carbs: f64,
    pub fat: f64,
}

static LAST_MINTED: AtomicI64 = AtomicI64::new(0);

/// Epoch milliseconds, bumped past the previous value so two entries
/// minted in the same millisecond still get distinct ids.
pub(crate) fn monotonic_millis() -> i64 {
    let now = Utc::now().timestamp_millis();
    LAST_MINTED
        .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |last| {
            Some(now.max(last + 1))
        })
        .map(|last| now.max(last + 1))
        .unwrap_or(now)
}

/// Time-based id, matching the original epoch-millisecond keys.
pub fn mint_meal_id() -> String {
    monotonic_millis().to_string()
}

// ---------------------------------------------------------------------------
/// Database Operations
// ---------------------------------------------------------------------------

pub async fn save_meal(
    pool: &SqlitePool,
    owner: &str,
    entry: &MealEntry,
) -> Result<(), MealLogError> {
    sqlx::query(
        r#"
        INSERT INTO meals (owner, id, logged_at, description, calories, protein, carbs, fat)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?)
        ON CONFLICT (owner, id) DO UPDATE SET
            logged_at = excluded.logged_at,
            description = excluded.description,
            calories = excluded.calories,
            protein = excluded.protein,
            carbs = excluded.carbs,
            fat = excluded.fat
        "#,
    )
    .bind(owner)
    .bind(&entry.id)
    .bind(entry.timestamp)
    .bind(&entry.description)
    .bind(entry.calories)
    .bind(entry.protein)
    .bind(entry.carbs)
    .bind(entry.fat)
    .execute(pool)
    .await?;

    Ok(())
}

/// All meals for an owner, most recent first.
pub async fn get_meals(pool: &SqlitePool, owner: &str) -> Result<Vec<MealEntry>, MealLogError> {
    let entries = sqlx::query_as::<_, MealEntry>(
        r#"
        SELECT id, logged_at AS timestamp, description, calories, protein, carbs, fat
        FROM meals
        WHERE owner = ?
        ORDER BY logged_at DESC
        "#,
    )
    .bind(owner)
    .fetch_all(pool)
    .await?;

    Ok(entries)
}

/// Idempotent delete: removing an id the owner never had is a no-op.
pub async fn delete_meal(pool: &SqlitePool, owner: &str, id: &str) -> Result<(), MealLogError> {
    let result = sqlx::query("DELETE FROM meals WHERE owner = ? AND id = ?")
        .bind(owner)
        .bind(id)
        .execute(pool)
        .await?;

    if result.rows_affected() == 0 {
        tracing::debug!(id, "Delete of missing meal entry ignored");
    }
    Ok(())
}

// ---------------------------------------------------------------------------
/// Live Meal Log
// ---------------------------------------------------------------------------

/// Owner-scoped meal log whose subscription delivers a fresh, fully
/// ordered snapshot on every change. Consumers keep no cache beyond what
/// the subscription hands them.
#[derive(Debug)]
pub struct MealLog {
    pool: SqlitePool,
    owner: String,
    tx: watch::Sender<Vec<MealEntry>>,
}

impl MealLog {
    pub async fn open(pool: SqlitePool, owner: impl Into<String>) -> Result<Self, MealLogError> {
        let owner = owner.into();
        let snapshot = get_meals(&pool, &owner).await?;
        let (tx, _) = watch::channel(snapshot);
        Ok(Self { pool, owner, tx })
    }

    pub fn subscribe(&self) -> watch::Receiver<Vec<MealEntry>> {
        self.tx.subscribe()
    }

    /// Create or edit an entry, then broadcast the reordered snapshot.
    pub async fn upsert(&self, draft: MealDraft) -> Result<MealEntry, MealLogError> {
        let entry = MealEntry {
            id: draft.id.unwrap_or_else(mint_meal_id),
            timestamp: draft.timestamp,
            description: draft.description,
            calories: draft.calories,
            protein: draft.protein,
            carbs: draft.carbs,
            fat: draft.fat,
        };
        save_meal(&self.pool, &self.owner, &entry).await?;
        self.refresh().await?;
        Ok(entry)
    }

    pub async fn delete(&self, id: &str) -> Result<(), MealLogError> {
        delete_meal(&self.pool, &self.owner, id).await?;
        self.refresh().await
    }

    async fn refresh(&self) -> Result<(), MealLogError> {
        let snapshot = get_meals(&self.pool, &self.owner).await?;
        self.tx.send_replace(snapshot);
        Ok(())
    }
}

// ---------------------------------------------------------------------------
/// Aggregation (pure)
// ---------------------------------------------------------------------------

/// One calendar day's entries and macro totals. Derived, never persisted.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DailyTotal {
    pub date: NaiveDate,
    pub entries: Vec<MealEntry>,
    pub total_calories: f64,
    pub total_protein: f64,
    pub total_carbs: f64,
    pub total_fat: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct YearGroup {
    pub year: i32,
    pub days: Vec<DailyTotal>,
}

/// One slot of the 7-day trend window.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DayMacros {
    pub date: NaiveDate,
    pub calories: f64,
    pub protein: f64,
    pub carbs: f64,
    pub fat: f64,
    pub is_today: bool,
}

/// Round a displayed total to one decimal place.
fn round1(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}

/// Local wall-clock day of an entry. Days follow the user's calendar, not
/// UTC, so a 23:59 snack stays on the day it was eaten.
fn local_day(entry: &MealEntry) -> NaiveDate {
    entry.timestamp.with_timezone(&Local).date_naive()
}

fn daily_total(date: NaiveDate, mut entries: Vec<MealEntry>) -> DailyTotal {
    entries.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));

    // Sum raw values first; round the total once.
    let (mut calories, mut protein, mut carbs, mut fat) = (0.0, 0.0, 0.0, 0.0);
    for entry in &entries {
        calories += entry.calories;
        protein += entry.protein;
        carbs += entry.carbs;
        fat += entry.fat;
    }

    DailyTotal {
        date,
        entries,
        total_calories: round1(calories),
        total_protein: round1(protein),
        total_carbs: round1(carbs),
        total_fat: round1(fat),
    }
}

/// Group entries by local calendar year, then by day within the year.
/// Most-recent-first at every level: entries within a day, days within a
/// year, and years themselves.
pub fn group_by_day_and_year(entries: &[MealEntry]) -> Vec<YearGroup> {
    let mut by_day: BTreeMap<NaiveDate, Vec<MealEntry>> = BTreeMap::new();
    for entry in entries {
        by_day.entry(local_day(entry)).or_default().push(entry.clone());
    }

    let mut by_year: BTreeMap<i32, Vec<DailyTotal>> = BTreeMap::new();
    // Reverse iteration gives descending dates within each year.
    for (date, day_entries) in by_day.into_iter().rev() {
        by_year
            .entry(date.year())
            .or_default()
            .push(daily_total(date, day_entries));
    }

    by_year
        .into_iter()
        .rev()
        .map(|(year, days)| YearGroup { year, days })
        .collect()
}

/// Totals for the reference date and the 6 preceding days, oldest first.
/// Days with no entries contribute zeros, not absence.
pub fn weekly_totals(entries: &[MealEntry], reference: NaiveDate) -> Vec<DayMacros> {
    (0..7)
        .map(|i| {
            let date = reference - Duration::days(6 - i);
            let (mut calories, mut protein, mut carbs, mut fat) = (0.0, 0.0, 0.0, 0.0);
            for entry in entries.iter().filter(|e| local_day(e) == date) {
                calories += entry.calories;
                protein += entry.protein;
                carbs += entry.carbs;
                fat += entry.fat;
            }
            DayMacros {
                date,
                calories: round1(calories),
                protein: round1(protein),
                carbs: round1(carbs),
                fat: round1(fat),
                is_today: date == reference,
            }
        })
        .collect()
}

// ---------------------------------------------------------------------------
/// Tests
// ---------------------------------------------------------------------------
