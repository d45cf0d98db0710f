pub mod capture;
pub mod db;
pub mod local;
pub mod meals;
pub mod nutrition;
pub mod program;
pub mod tracker;
pub mod transcribe;
pub mod weights;

#[cfg(test)]
mod test_utils;

pub use capture::{CapturePhase, CaptureState, EntrySlots};
pub use db::{initialize_db, DbPool};
pub use local::LocalStore;
pub use meals::{group_by_day_and_year, weekly_totals, MealDraft, MealEntry, MealLog};
pub use nutrition::{NutritionClient, NutritionEstimate, PhotoEstimate};
pub use program::{Program, SessionKey, Weekday};
pub use tracker::{CycleTracker, Owner, UndoOutcome};
pub use transcribe::{SpeechToText, Transcript, WhisperApiClient};
