//! Static workout program definition
//!
//! The program is a fixed 8-week grid with four training days per week
//! (Mon, Tue, Thu, Fri). Each cell names a muscle-group session and its
//! exercise list. The content is immutable; completion state lives in
//! the cycle tracker, not here.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

pub const WEEKS: u8 = 8;
pub const SESSIONS_PER_CYCLE: usize = 32;

// ---------------------------------------------------------------------------
/// Training days
// ---------------------------------------------------------------------------

/// The four training days of a program week, in program order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Weekday {
    Mon,
    Tue,
    Thu,
    Fri,
}

impl Weekday {
    pub const ALL: [Weekday; 4] = [Weekday::Mon, Weekday::Tue, Weekday::Thu, Weekday::Fri];
}

impl fmt::Display for Weekday {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Mon => write!(f, "Mon"),
            Self::Tue => write!(f, "Tue"),
            Self::Thu => write!(f, "Thu"),
            Self::Fri => write!(f, "Fri"),
        }
    }
}

impl FromStr for Weekday {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Mon" => Ok(Self::Mon),
            "Tue" => Ok(Self::Tue),
            "Thu" => Ok(Self::Thu),
            "Fri" => Ok(Self::Fri),
            _ => Err(format!("Unknown program day: {}", s)),
        }
    }
}

// ---------------------------------------------------------------------------
/// Session keys
// ---------------------------------------------------------------------------

/// Identifies one workout slot: week 1..=8 plus a training day.
///
/// Ordering is week-major then day order, which is the tie-break used by
/// "find next incomplete".
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct SessionKey {
    pub week: u8,
    pub day: Weekday,
}

impl SessionKey {
    pub fn new(week: u8, day: Weekday) -> Self {
        Self { week, day }
    }

    /// Document id used for persisted completion records: "Wk 3-Tue-2".
    pub fn doc_id(&self, cycle: i64) -> String {
        format!("Wk {}-{}-{}", self.week, self.day, cycle)
    }
}

/// Rendered as the local-storage key format: "Wk 3-Tue".
impl fmt::Display for SessionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Wk {}-{}", self.week, self.day)
    }
}

impl FromStr for SessionKey {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let rest = s
            .strip_prefix("Wk ")
            .ok_or_else(|| format!("Bad session key: {}", s))?;
        let (week_str, day_str) = rest
            .split_once('-')
            .ok_or_else(|| format!("Bad session key: {}", s))?;
        let week: u8 = week_str
            .parse()
            .map_err(|_| format!("Bad week in session key: {}", s))?;
        if !(1..=WEEKS).contains(&week) {
            return Err(format!("Week out of range in session key: {}", s));
        }
        Ok(Self {
            week,
            day: day_str.parse()?,
        })
    }
}

// ---------------------------------------------------------------------------
/// Program content
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Exercise {
    pub name: String,
    pub sets: u32,
    /// Target reps per set; 0 means "to failure".
    pub target_reps: u32,
}

/// One workout slot's content: muscle-group label plus exercise list.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionDef {
    pub name: String,
    pub exercises: Vec<Exercise>,
}

/// The full 8-week program, loaded once at startup and passed by reference.
#[derive(Debug, Clone)]
pub struct Program {
    sessions: BTreeMap<SessionKey, SessionDef>,
}

/// Muscle-group label per (week, day) cell.
const SCHEDULE: [[&str; 4]; 8] = [
    ["Chest", "Arms A", "Legs", "Back"],
    ["Shoulders", "Chest", "Arms B", "Legs"],
    ["Back", "Shoulders", "Chest", "Arms C"],
    ["Legs", "Back", "Shoulders", "Chest"],
    ["Arms D", "Legs", "Shoulders", "Back"],
    ["Chest", "Arms E", "Legs", "Arms A2"],
    ["Shoulders", "Arms B2", "Back", "Arms C2"],
    ["Chest", "Arms D2", "Legs", "Arms E2"],
];

impl Program {
    /// Build the standard fixed program.
    pub fn standard() -> Self {
        let mut sessions = BTreeMap::new();
        for (week_idx, row) in SCHEDULE.iter().enumerate() {
            for (day_idx, label) in row.iter().enumerate() {
                let key = SessionKey::new(week_idx as u8 + 1, Weekday::ALL[day_idx]);
                sessions.insert(
                    key,
                    SessionDef {
                        name: (*label).to_string(),
                        exercises: exercises_for(label),
                    },
                );
            }
        }
        Self { sessions }
    }

    pub fn session(&self, key: SessionKey) -> Option<&SessionDef> {
        self.sessions.get(&key)
    }

    /// All 32 session keys in program order (week-major, fixed day order).
    pub fn order() -> impl Iterator<Item = SessionKey> {
        (1..=WEEKS).flat_map(|week| Weekday::ALL.into_iter().map(move |day| SessionKey::new(week, day)))
    }
}

fn ex(name: &str, sets: u32, target_reps: u32) -> Exercise {
    Exercise {
        name: name.to_string(),
        sets,
        target_reps,
    }
}

/// Exercise list for a muscle-group label. Unknown labels get an empty list.
fn exercises_for(label: &str) -> Vec<Exercise> {
    match label {
        "Chest" => vec![
            ex("Bench Press", 3, 10),
            ex("Reverse-Grip Bench Press", 3, 10),
            ex("Dumbell Flys", 3, 10),
        ],
        "Back" => vec![
            ex("Bent-Over Barbell Row", 3, 10),
            ex("Reverse Grip Pulldown", 3, 10),
            ex("Straight-Arm Pulldown", 3, 10),
            ex("Seated Cable Row", 3, 10),
        ],
        "Legs" => vec![
            ex("Squat", 3, 10),
            ex("Standing Calf Raise", 3, 20),
            ex("Deadlift", 3, 10),
            ex("Shrugs", 3, 10),
        ],
        "Shoulders" => vec![
            ex("Barbell Shoulder Press", 3, 10),
            ex("Dumbbell Front Raise", 3, 10),
            ex("Dumbbell Lateral Raise", 3, 10),
            ex("Dumbbell Bent Over Lateral Raise", 3, 10),
        ],
        "Arms A" => vec![
            ex("Close-Grip Bench Press (Rest Pause)", 3, 5),
            ex("Barbell Curls (Rest Pause)", 3, 5),
            ex("Seated Dumbbell Overheard Extension", 3, 8),
            ex("Preacher Curls", 3, 8),
            ex("Tricep Pressdown", 3, 8),
            ex("Hammer Curls", 3, 8),
        ],
        "Arms B" => vec![
            ex("Lying Tricep Extension", 3, 20),
            ex("Dumbbell Curl", 3, 20),
            ex("Seated Dumbbell Overheard Extension", 3, 20),
            ex("Dumbbell Preacher Curl", 3, 20),
            ex("Tricep Pressdown", 3, 20),
            ex("Dumbbell Hammer Curl", 3, 20),
        ],
        "Arms C" => vec![
            ex("Tricep dips", 3, 0),
            ex("Preacher Curls", 3, 25),
            ex("Tricep Pressdown", 3, 25),
            ex("High Cable Curls", 3, 25),
            ex("Overhead Cable Tricep Extension", 3, 25),
            ex("Behind-the-Back Cable Curls", 3, 25),
        ],
        "Arms D" => vec![
            ex("Overhead Tricep Extensions", 3, 10),
            ex("Standing Cable Concentration Curls", 3, 10),
            ex("Tricep Pressdowns", 3, 10),
            ex("Preacher Curls", 3, 10),
            ex("Diamond Pushups", 3, 10),
            ex("Hammer Curls", 3, 10),
        ],
        "Arms E" => vec![
            ex("Close-Grip Bench Press (Rest Pause)", 4, 5),
            ex("Barbell Curls (Rest Pause)", 4, 5),
            ex("Tricep Pushdowns", 4, 5),
            ex("Dumbbell Curls", 4, 5),
        ],
        "Arms A2" => vec![
            ex("Close-Grip Bench Press (Rest Pause)", 3, 20),
            ex("Barbell Curls (Rest Pause)", 3, 20),
            ex("Seated Dumbbell Overheard Extension", 3, 20),
            ex("Preacher Curls", 3, 20),
            ex("Tricep Pressdown", 3, 20),
            ex("Hammer Curls", 3, 20),
        ],
        "Arms B2" => vec![
            ex("Lying Tricep Extension", 3, 30),
            ex("Dumbbell Curl", 3, 30),
            ex("Seated Dumbbell Overheard Extension", 3, 30),
            ex("Dumbbell Preacher Curl", 3, 30),
            ex("Tricep Pressdown", 3, 30),
            ex("Dumbbell Hammer Curl", 3, 30),
        ],
        "Arms C2" => vec![
            ex("Tricep dips", 3, 15),
            ex("Preacher Curls", 3, 15),
            ex("Tricep Pressdown", 3, 15),
            ex("High Cable Curls", 3, 15),
            ex("Overhead Cable Tricep Extension", 3, 15),
            ex("Behind-the-Back Cable Curls", 3, 15),
        ],
        "Arms D2" => vec![
            ex("Overhead Tricep Extensions", 3, 25),
            ex("Standing Cable Concentration Curls", 3, 25),
            ex("Tricep Pressdowns", 3, 25),
            ex("Preacher Curls", 3, 25),
            ex("Diamond Pushups", 3, 25),
            ex("Hammer Curls", 3, 25),
        ],
        "Arms E2" => vec![
            ex("Close-Grip Bench Press (Rest Pause)", 4, 10),
            ex("Barbell Curls (Rest Pause)", 4, 10),
            ex("Tricep Pushdowns", 4, 10),
            ex("Dumbbell Curls", 4, 10),
        ],
        _ => vec![],
    }
}

// ---------------------------------------------------------------------------
/// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_program_order_covers_all_sessions() {
        let order: Vec<SessionKey> = Program::order().collect();
        assert_eq!(order.len(), SESSIONS_PER_CYCLE);
        assert_eq!(order[0], SessionKey::new(1, Weekday::Mon));
        assert_eq!(order[1], SessionKey::new(1, Weekday::Tue));
        assert_eq!(order[31], SessionKey::new(8, Weekday::Fri));
    }

    #[test]
    fn test_program_order_is_sorted() {
        let order: Vec<SessionKey> = Program::order().collect();
        let mut sorted = order.clone();
        sorted.sort();
        assert_eq!(order, sorted);
    }

    #[test]
    fn test_every_cell_has_content() {
        let program = Program::standard();
        for key in Program::order() {
            let def = program.session(key).expect("missing session");
            assert!(!def.name.is_empty());
            assert!(!def.exercises.is_empty(), "no exercises for {}", key);
        }
    }

    #[test]
    fn test_week_one_monday_is_chest() {
        let program = Program::standard();
        let def = program.session(SessionKey::new(1, Weekday::Mon)).unwrap();
        assert_eq!(def.name, "Chest");
        assert_eq!(def.exercises.len(), 3);
        assert_eq!(def.exercises[0].name, "Bench Press");
    }

    #[test]
    fn test_tricep_dips_target_zero_means_failure() {
        let program = Program::standard();
        let def = program.session(SessionKey::new(3, Weekday::Fri)).unwrap();
        assert_eq!(def.name, "Arms C");
        let dips = def.exercises.iter().find(|e| e.name == "Tricep dips").unwrap();
        assert_eq!(dips.target_reps, 0);
    }

    #[test]
    fn test_doc_id_format() {
        let key = SessionKey::new(3, Weekday::Tue);
        assert_eq!(key.doc_id(2), "Wk 3-Tue-2");
        assert_eq!(key.to_string(), "Wk 3-Tue");
    }

    #[test]
    fn test_session_key_parse_roundtrip() {
        let key: SessionKey = "Wk 5-Thu".parse().unwrap();
        assert_eq!(key, SessionKey::new(5, Weekday::Thu));
        assert!("Wk 9-Mon".parse::<SessionKey>().is_err());
        assert!("Wk 2-Wed".parse::<SessionKey>().is_err());
        assert!("garbage".parse::<SessionKey>().is_err());
    }
}
