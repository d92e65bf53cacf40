//! Centralized structural constants for Corespace game logic.
//!
//! Gameplay tuning (probabilities, quotas, rewards) lives in [`crate::tuning`]
//! so it can be adjusted from data. The values here describe the shape of the
//! simulation itself and only change through reviewed code edits.

// Grid dimensions ----------------------------------------------------------
pub(crate) const DAY_GRID_COLS: usize = 8;
pub(crate) const DAY_GRID_ROWS: usize = 6;
pub(crate) const WEEK_GRID_COLS: usize = 12;
pub(crate) const WEEK_GRID_ROWS: usize = 10;

// User stat bounds ---------------------------------------------------------
pub(crate) const STAT_MIN: i32 = 0;
pub(crate) const STAT_MAX: i32 = 100;
pub(crate) const STARTING_ENERGY: i32 = 100;
pub(crate) const STARTING_FOCUS: i32 = 100;

// Activity history ---------------------------------------------------------
pub(crate) const ACTIVITY_HISTORY_DAYS: usize = 30;
pub(crate) const ACTIVITY_WEEK_DAYS: i64 = 7;
pub(crate) const STREAK_LOOKBACK_DAYS: i64 = 365;

// Instance identity --------------------------------------------------------
pub(crate) const INSTANCE_ID_PREFIX: &str = "inst-";
pub(crate) const INSTANCE_ID_MAX_ATTEMPTS: usize = 16;

// RNG stream domain tags ---------------------------------------------------
pub(crate) const RNG_TAG_SPAWN: &[u8] = b"parasite-spawn";
pub(crate) const RNG_TAG_IDS: &[u8] = b"instance-ids";
/// Largest persisted draw count replayed on restore; beyond it the stream is reseeded.
pub const MAX_RESTORE_DRAWS: u64 = 1 << 20;

// Notice message keys ------------------------------------------------------
pub(crate) const MSG_PARASITE_FATIGUE: &str = "parasite.fatigue";
pub(crate) const MSG_PARASITE_DISTRACTION: &str = "parasite.distraction";
pub(crate) const MSG_PARASITE_PROCRASTINATION: &str = "parasite.procrastination";

// Built-in parasite catalog ids ---------------------------------------------
pub(crate) const PARASITE_FATIGUE: &str = "para-fatigue";
pub(crate) const PARASITE_DISTRACTION: &str = "para-distraction";
pub(crate) const PARASITE_PROCRASTINATION: &str = "para-procrastination";
