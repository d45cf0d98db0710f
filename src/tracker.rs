//! Cycle Progression Tracker
//!
//! Tracks progress through the fixed 8-week program: which session is
//! "active" (next incomplete in program order), which is merely selected
//! for viewing, completion timestamps per session, and rollover to a new
//! cycle once all 32 sessions are done.
//!
//! Key principles:
//! - Active/selected are recomputed on load or explicit undo, never after
//!   every log (the view stays where the user left it)
//! - At most one completion record per (week, day, cycle)
//! - A single completion is undoable, within a one-hour window
//! - Persistence is best-effort single attempts; a failed write rolls the
//!   in-memory change back so local and remote never diverge

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{Row, SqlitePool};
use std::collections::BTreeMap;
use thiserror::Error;

use crate::local::{LocalStore, LocalStoreError, LAST_COMPLETED_KEY, MIGRATED_KEY, PROGRESS_KEY};
use crate::program::{Program, SessionKey, Weekday, WEEKS};

/// Completions older than this can no longer be undone.
const UNDO_WINDOW_MINUTES: i64 = 60;

// ---------------------------------------------------------------------------
/// Owner: authenticated user or anonymous local namespace
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Owner {
    /// Authenticated user; state lives in the database under this id.
    User(String),
    /// No authenticated user; state lives in the local fallback store.
    Anonymous,
}

impl Owner {
    pub fn user_id(&self) -> Option<&str> {
        match self {
            Self::User(id) => Some(id.as_str()),
            Self::Anonymous => None,
        }
    }
}

// ---------------------------------------------------------------------------
/// Error Handling
// ---------------------------------------------------------------------------

#[derive(Debug, Error)]
pub enum TrackerError {
    #[error("No active session to log")]
    NoActiveSession,

    #[error("Nothing to undo")]
    NothingToUndo,

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error(transparent)]
    Local(#[from] LocalStoreError),

    #[error("Serialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Invalid stored record: {0}")]
    InvalidRecord(String),
}

/// Result of an undo attempt that did not fail outright.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UndoOutcome {
    /// The completion was removed and active/selected moved to it.
    Undone,
    /// The completion was outside the undo window; nothing changed.
    Stale,
}

// ---------------------------------------------------------------------------
/// Persisted Records
// ---------------------------------------------------------------------------

/// One pass through the 32-session program. `completed_at == None` means
/// this is the current cycle.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CycleRecord {
    pub cycle_number: i64,
    pub started_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
}

/// Persisted fact that a session was finished, scoped to a cycle.
#[derive(Debug, Clone)]
pub struct CompletionRecord {
    pub key: SessionKey,
    pub workout_name: String,
    pub completed_at: DateTime<Utc>,
    pub cycle_number: i64,
}

fn parse_week(week: i64) -> Result<u8, TrackerError> {
    u8::try_from(week)
        .ok()
        .filter(|w| (1..=WEEKS).contains(w))
        .ok_or_else(|| TrackerError::InvalidRecord(format!("week {} out of range", week)))
}

// ---------------------------------------------------------------------------
/// Local Snapshots (anonymous state + undo pointer)
// ---------------------------------------------------------------------------

/// Anonymous program state: completion timestamps keyed by "Wk 1-Mon"
/// strings, plus the cycle number.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct ProgressSnapshot {
    cycle: i64,
    completed: BTreeMap<String, DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct LastLoggedSnapshot {
    week: u8,
    day: Weekday,
    date: DateTime<Utc>,
}

/// The single undoable action: the most recent completion.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LastLogged {
    pub key: SessionKey,
    pub at: DateTime<Utc>,
}

// ---------------------------------------------------------------------------
/// Database Operations
// ---------------------------------------------------------------------------

/// Load the cycle with the highest cycle number for this owner, if any.
pub async fn latest_cycle(
    pool: &SqlitePool,
    owner: &str,
) -> Result<Option<CycleRecord>, TrackerError> {
    let row = sqlx::query(
        r#"
        SELECT cycle_number, started_at, completed_at
        FROM cycles
        WHERE owner = ?
        ORDER BY cycle_number DESC
        LIMIT 1
        "#,
    )
    .bind(owner)
    .fetch_optional(pool)
    .await?;

    Ok(row.map(|row| CycleRecord {
        cycle_number: row.get("cycle_number"),
        started_at: row.get("started_at"),
        completed_at: row.get("completed_at"),
    }))
}

/// Create a cycle record if it does not already exist. Idempotent, so a
/// crash between closing the old cycle and opening the new one is safe to
/// retry.
pub async fn ensure_cycle(
    pool: &SqlitePool,
    owner: &str,
    cycle_number: i64,
    started_at: DateTime<Utc>,
) -> Result<(), TrackerError> {
    sqlx::query(
        r#"
        INSERT OR IGNORE INTO cycles (owner, cycle_number, started_at)
        VALUES (?, ?, ?)
        "#,
    )
    .bind(owner)
    .bind(cycle_number)
    .bind(started_at)
    .execute(pool)
    .await?;

    Ok(())
}

/// Mark a cycle completed, creating the record if it was never opened.
pub async fn close_cycle(
    pool: &SqlitePool,
    owner: &str,
    cycle_number: i64,
    completed_at: DateTime<Utc>,
) -> Result<(), TrackerError> {
    sqlx::query(
        r#"
        INSERT INTO cycles (owner, cycle_number, started_at, completed_at)
        VALUES (?, ?, ?, ?)
        ON CONFLICT (owner, cycle_number) DO UPDATE SET completed_at = excluded.completed_at
        "#,
    )
    .bind(owner)
    .bind(cycle_number)
    .bind(completed_at)
    .bind(completed_at)
    .execute(pool)
    .await?;

    Ok(())
}

/// Load all completion records for one cycle, validating week/day at the
/// store boundary (deserialize-or-fail, no duck typing).
pub async fn completions_for_cycle(
    pool: &SqlitePool,
    owner: &str,
    cycle_number: i64,
) -> Result<Vec<CompletionRecord>, TrackerError> {
    let rows = sqlx::query(
        r#"
        SELECT week, day, workout_name, completed_at
        FROM completions
        WHERE owner = ? AND cycle_number = ?
        "#,
    )
    .bind(owner)
    .bind(cycle_number)
    .fetch_all(pool)
    .await?;

    let mut records = Vec::with_capacity(rows.len());
    for row in rows {
        let week = parse_week(row.get("week"))?;
        let day_str: String = row.get("day");
        let day: Weekday = day_str.parse().map_err(TrackerError::InvalidRecord)?;

        records.push(CompletionRecord {
            key: SessionKey::new(week, day),
            workout_name: row.get("workout_name"),
            completed_at: row.get("completed_at"),
            cycle_number,
        });
    }

    Ok(records)
}

/// Write a completion record. Overwrites on conflict, so re-logging the
/// same (week, day, cycle) refreshes the timestamp rather than duplicating.
async fn insert_completion(
    pool: &SqlitePool,
    owner: &str,
    cycle_number: i64,
    key: SessionKey,
    workout_name: &str,
    completed_at: DateTime<Utc>,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"
        INSERT OR REPLACE INTO completions
            (owner, cycle_number, week, day, workout_name, completed_at)
        VALUES (?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(owner)
    .bind(cycle_number)
    .bind(key.week as i64)
    .bind(key.day.to_string())
    .bind(workout_name)
    .bind(completed_at)
    .execute(pool)
    .await?;

    Ok(())
}

async fn delete_completion(
    pool: &SqlitePool,
    owner: &str,
    cycle_number: i64,
    key: SessionKey,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"
        DELETE FROM completions
        WHERE owner = ? AND cycle_number = ? AND week = ? AND day = ?
        "#,
    )
    .bind(owner)
    .bind(cycle_number)
    .bind(key.week as i64)
    .bind(key.day.to_string())
    .execute(pool)
    .await?;

    Ok(())
}

// ---------------------------------------------------------------------------
/// Cycle Tracker
// ---------------------------------------------------------------------------

#[derive(Debug)]
pub struct CycleTracker {
    pub owner: Owner,
    pub cycle: i64,
    pub completed: BTreeMap<SessionKey, DateTime<Utc>>,
    /// Next incomplete session in program order, if any.
    pub active: Option<SessionKey>,
    /// The user's current view; independent of `active`.
    pub selected: Option<SessionKey>,
    /// The single undoable action, if any.
    pub last_logged: Option<LastLogged>,
}

impl CycleTracker {
    /// Hydrate tracker state for an owner.
    ///
    /// Authenticated: reads the latest cycle (opening a fresh one if the
    /// latest is already complete), migrates any leftover anonymous state
    /// into the database (best-effort, one-shot), then loads this cycle's
    /// completions. Anonymous: hydrates from the local snapshot.
    ///
    /// A cycle found full but still open means a rollover was interrupted
    /// mid-write; load completes it before computing active/selected.
    pub async fn load(
        pool: &SqlitePool,
        local: &mut LocalStore,
        program: &Program,
        owner: Owner,
    ) -> Result<Self, TrackerError> {
        let last_logged = read_last_logged(local);

        let mut tracker = match &owner {
            Owner::User(uid) => {
                let mut cycle = 1;
                if let Some(latest) = latest_cycle(pool, uid).await? {
                    cycle = latest.cycle_number;
                    if latest.completed_at.is_some() {
                        cycle += 1;
                        ensure_cycle(pool, uid, cycle, Utc::now()).await?;
                    }
                }

                // One-shot local-to-remote migration. Failures are logged
                // and left for the next load to retry.
                if let Err(err) = migrate_local_progress(pool, uid, local, program).await {
                    tracing::warn!(error = %err, "Local progress migration failed; keeping local data");
                }

                let mut completed = BTreeMap::new();
                for record in completions_for_cycle(pool, uid, cycle).await? {
                    completed.insert(record.key, record.completed_at);
                }

                Self {
                    owner,
                    cycle,
                    completed,
                    active: None,
                    selected: None,
                    last_logged,
                }
            }
            Owner::Anonymous => {
                let snapshot = match local.get(PROGRESS_KEY) {
                    Some(raw) => serde_json::from_str::<ProgressSnapshot>(raw)?,
                    None => ProgressSnapshot {
                        cycle: 1,
                        completed: BTreeMap::new(),
                    },
                };

                let mut completed = BTreeMap::new();
                for (key_str, at) in snapshot.completed {
                    let key: SessionKey =
                        key_str.parse().map_err(TrackerError::InvalidRecord)?;
                    completed.insert(key, at);
                }

                Self {
                    owner,
                    cycle: snapshot.cycle,
                    completed,
                    active: None,
                    selected: None,
                    last_logged,
                }
            }
        };

        // A crash between the final completion write and the cycle writes
        // leaves a full, still-open cycle behind. Finish the rollover now,
        // before any view is computed, so the tracker never wedges with no
        // active session.
        if tracker.next_incomplete().is_none() {
            let at = tracker
                .completed
                .values()
                .max()
                .copied()
                .unwrap_or_else(Utc::now);
            tracker.rollover(pool, local, at).await?;
        }

        tracker.active = tracker.next_incomplete();
        tracker.selected = tracker.active;
        Ok(tracker)
    }

    /// First incomplete session in program order.
    pub fn next_incomplete(&self) -> Option<SessionKey> {
        Program::order().find(|key| !self.completed.contains_key(key))
    }

    pub fn completed_at(&self, key: SessionKey) -> Option<DateTime<Utc>> {
        self.completed.get(&key).copied()
    }

    /// Pure view change; never touches persistence or the active pointer.
    pub fn select_session(&mut self, key: SessionKey) {
        self.selected = Some(key);
    }

    /// Whether the undo control should be offered: a completion exists and
    /// is still inside the undo window.
    pub fn undo_available(&self) -> bool {
        self.last_logged
            .as_ref()
            .is_some_and(|last| Utc::now() - last.at <= Duration::minutes(UNDO_WINDOW_MINUTES))
    }

    /// Mark the active session complete and persist the completion.
    ///
    /// On persistence failure the in-memory completion is rolled back and
    /// the undo record cleared. On success, if no incomplete session
    /// remains, the cycle rolls over; the selected view is left alone.
    pub async fn log_active_session(
        &mut self,
        pool: &SqlitePool,
        local: &mut LocalStore,
        program: &Program,
    ) -> Result<(), TrackerError> {
        let key = self.active.ok_or(TrackerError::NoActiveSession)?;
        let now = Utc::now();

        let prior = self.completed.insert(key, now);
        let prior_last = self.last_logged.replace(LastLogged { key, at: now });

        let persisted = match &self.owner {
            Owner::User(uid) => {
                let name = program
                    .session(key)
                    .map(|def| def.name.clone())
                    .unwrap_or_default();
                insert_completion(pool, uid, self.cycle, key, &name, now)
                    .await
                    .map_err(TrackerError::from)
            }
            Owner::Anonymous => self.write_snapshot(local),
        };

        if let Err(err) = persisted {
            // Roll back so local state matches the store.
            match prior {
                Some(at) => {
                    self.completed.insert(key, at);
                }
                None => {
                    self.completed.remove(&key);
                }
            }
            self.last_logged = prior_last;
            return Err(err);
        }

        write_last_logged(local, key, now);

        if self.next_incomplete().is_none() {
            self.rollover(pool, local, now).await?;
        }
        // Active/selected are deliberately not recomputed here; they move
        // on the next load or an explicit undo.

        Ok(())
    }

    /// Close the current cycle, open the next, and reset the program.
    /// The undo record is dropped: the finished cycle's completions are no
    /// longer reachable once the grid resets.
    ///
    /// Runs after the final log, and again from `load` when a full cycle
    /// was left open by an earlier crash; both writes are idempotent so a
    /// repeated attempt converges on the same state.
    async fn rollover(
        &mut self,
        pool: &SqlitePool,
        local: &mut LocalStore,
        now: DateTime<Utc>,
    ) -> Result<(), TrackerError> {
        let finished = self.cycle;

        if let Owner::User(uid) = &self.owner {
            close_cycle(pool, uid, finished, now).await?;
            ensure_cycle(pool, uid, finished + 1, now).await?;
        }

        self.cycle = finished + 1;
        self.completed.clear();
        self.last_logged = None;
        if let Err(err) = local.remove(LAST_COMPLETED_KEY) {
            tracing::warn!(error = %err, "Failed to clear undo pointer after rollover");
        }

        if self.owner == Owner::Anonymous {
            self.write_snapshot(local)?;
        }

        // Only the "next to do" pointer jumps; the view stays put.
        self.active = Some(Program::order().next().unwrap_or(SessionKey::new(1, Weekday::Mon)));
        tracing::info!(finished, next = self.cycle, "Cycle rolled over");

        Ok(())
    }

    /// Undo the most recent completion.
    ///
    /// Returns `Stale` (a silent no-op) if the completion is older than
    /// the undo window. Fails with `NothingToUndo` when there is no undo
    /// record at all. A store failure reverts the in-memory clear and
    /// keeps the record so the user may retry.
    pub async fn undo_last_log(
        &mut self,
        pool: &SqlitePool,
        local: &mut LocalStore,
    ) -> Result<UndoOutcome, TrackerError> {
        let last = self
            .last_logged
            .clone()
            .ok_or(TrackerError::NothingToUndo)?;

        if Utc::now() - last.at > Duration::minutes(UNDO_WINDOW_MINUTES) {
            return Ok(UndoOutcome::Stale);
        }

        let prior = self.completed.remove(&last.key);

        let persisted = match &self.owner {
            Owner::User(uid) => delete_completion(pool, uid, self.cycle, last.key)
                .await
                .map_err(TrackerError::from),
            Owner::Anonymous => self.write_snapshot(local),
        };

        if let Err(err) = persisted {
            if let Some(at) = prior {
                self.completed.insert(last.key, at);
            }
            return Err(err);
        }

        self.last_logged = None;
        if let Err(err) = local.remove(LAST_COMPLETED_KEY) {
            tracing::warn!(error = %err, "Failed to clear undo pointer");
        }

        self.active = Some(last.key);
        self.selected = Some(last.key);
        Ok(UndoOutcome::Undone)
    }

    /// Serialize anonymous state into the local store.
    fn write_snapshot(&self, local: &mut LocalStore) -> Result<(), TrackerError> {
        let snapshot = ProgressSnapshot {
            cycle: self.cycle,
            completed: self
                .completed
                .iter()
                .map(|(key, at)| (key.to_string(), *at))
                .collect(),
        };
        local.set(PROGRESS_KEY, &serde_json::to_string(&snapshot)?)?;
        Ok(())
    }
}

// ---------------------------------------------------------------------------
/// Undo Pointer Persistence
// ---------------------------------------------------------------------------

/// Read the last-completed pointer; a corrupt pointer is dropped.
fn read_last_logged(local: &mut LocalStore) -> Option<LastLogged> {
    let raw = local.get(LAST_COMPLETED_KEY)?.to_string();
    match serde_json::from_str::<LastLoggedSnapshot>(&raw) {
        Ok(snap) => Some(LastLogged {
            key: SessionKey::new(snap.week, snap.day),
            at: snap.date,
        }),
        Err(err) => {
            tracing::warn!(error = %err, "Dropping corrupt undo pointer");
            let _ = local.remove(LAST_COMPLETED_KEY);
            None
        }
    }
}

/// Best-effort: a failed pointer write only shortens what undo survives.
fn write_last_logged(local: &mut LocalStore, key: SessionKey, at: DateTime<Utc>) {
    let snap = LastLoggedSnapshot {
        week: key.week,
        day: key.day,
        date: at,
    };
    let result = serde_json::to_string(&snap)
        .map_err(LocalStoreError::from)
        .and_then(|raw| local.set(LAST_COMPLETED_KEY, &raw));
    if let Err(err) = result {
        tracing::warn!(error = %err, "Failed to persist undo pointer");
    }
}

// ---------------------------------------------------------------------------
/// Local-to-Remote Migration
// ---------------------------------------------------------------------------

/// Migrate anonymous completions into the database, once.
///
/// Keyed by an explicit "migrated" marker rather than blob presence, so an
/// interrupted write-back cannot trigger a second migration. Failures
/// leave the local data in place for the next attempt (at-least-once).
async fn migrate_local_progress(
    pool: &SqlitePool,
    owner: &str,
    local: &mut LocalStore,
    program: &Program,
) -> Result<(), TrackerError> {
    if local.get(MIGRATED_KEY).is_some() {
        return Ok(());
    }
    let raw = match local.get(PROGRESS_KEY) {
        Some(raw) => raw.to_string(),
        None => return Ok(()),
    };

    let snapshot: ProgressSnapshot = serde_json::from_str(&raw)?;
    let mut migrated = 0usize;

    for (key_str, at) in &snapshot.completed {
        let key: SessionKey = key_str
            .parse()
            .map_err(TrackerError::InvalidRecord)?;
        let name = program
            .session(key)
            .map(|def| def.name.clone())
            .unwrap_or_default();
        insert_completion(pool, owner, snapshot.cycle, key, &name, *at).await?;
        migrated += 1;
    }

    local.set(MIGRATED_KEY, "true")?;
    local.remove(PROGRESS_KEY)?;
    tracing::info!(migrated, cycle = snapshot.cycle, "Migrated local progress to remote store");

    Ok(())
}

// ---------------------------------------------------------------------------
/// Tests
// ---------------------------------------------------------------------------
