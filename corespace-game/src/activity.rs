//! Daily activity history and streaks.
use chrono::{Days, NaiveDate};
use serde::{Deserialize, Serialize};

use crate::constants::{ACTIVITY_HISTORY_DAYS, ACTIVITY_WEEK_DAYS, STREAK_LOOKBACK_DAYS};

/// Activity counters for one local day.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DailyRecord {
    pub date: NaiveDate,
    #[serde(default)]
    pub tasks_completed: u32,
    #[serde(default)]
    pub fusions_done: u32,
    #[serde(default)]
    pub items_consumed: u32,
    #[serde(default)]
    pub xp_earned: u32,
}

impl DailyRecord {
    #[must_use]
    pub const fn empty(date: NaiveDate) -> Self {
        Self {
            date,
            tasks_completed: 0,
            fusions_done: 0,
            items_consumed: 0,
            xp_earned: 0,
        }
    }

    /// XP alone does not make a day active.
    #[must_use]
    pub const fn is_active(&self) -> bool {
        self.tasks_completed > 0 || self.fusions_done > 0 || self.items_consumed > 0
    }
}

/// Rolling per-day history, oldest first, at most 30 days long.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ActivityLog {
    history: Vec<DailyRecord>,
}

impl ActivityLog {
    #[must_use]
    pub fn history(&self) -> &[DailyRecord] {
        &self.history
    }

    #[must_use]
    pub fn record(&self, date: NaiveDate) -> Option<&DailyRecord> {
        self.history.iter().find(|record| record.date == date)
    }

    /// Record for `today`, inserted and trimmed to the retention window if new.
    ///
    /// `None` when the history is full and `today` predates all of it.
    fn today_mut(&mut self, today: NaiveDate) -> Option<&mut DailyRecord> {
        let mut idx = self.history.partition_point(|record| record.date < today);
        if self.history.get(idx).is_none_or(|record| record.date != today) {
            if idx == 0 && self.history.len() >= ACTIVITY_HISTORY_DAYS {
                log::debug!("ignoring activity for {today}: older than the retained history");
                return None;
            }
            self.history.insert(idx, DailyRecord::empty(today));
            if self.history.len() > ACTIVITY_HISTORY_DAYS {
                self.history.remove(0);
                idx -= 1;
            }
        }
        self.history.get_mut(idx)
    }

    pub fn track_task(&mut self, today: NaiveDate) {
        self.track_tasks(today, 1);
    }

    pub fn track_tasks(&mut self, today: NaiveDate, count: u32) {
        if let Some(record) = self.today_mut(today) {
            record.tasks_completed = record.tasks_completed.saturating_add(count);
        }
    }

    pub fn track_fusion(&mut self, today: NaiveDate) {
        if let Some(record) = self.today_mut(today) {
            record.fusions_done = record.fusions_done.saturating_add(1);
        }
    }

    pub fn track_consume(&mut self, today: NaiveDate) {
        if let Some(record) = self.today_mut(today) {
            record.items_consumed = record.items_consumed.saturating_add(1);
        }
    }

    pub fn track_xp(&mut self, today: NaiveDate, amount: u32) {
        if let Some(record) = self.today_mut(today) {
            record.xp_earned = record.xp_earned.saturating_add(amount);
        }
    }

    /// Consecutive active days ending today. An idle today does not break the streak.
    #[must_use]
    pub fn streak(&self, today: NaiveDate) -> u32 {
        let mut streak = 0;
        for offset in 0..STREAK_LOOKBACK_DAYS {
            let Some(date) = days_before(today, offset) else {
                break;
            };
            if self.record(date).is_some_and(DailyRecord::is_active) {
                streak += 1;
            } else if offset > 0 {
                break;
            }
        }
        streak
    }

    /// The seven days ending today, oldest first, with gaps filled by empty records.
    #[must_use]
    pub fn week_history(&self, today: NaiveDate) -> Vec<DailyRecord> {
        (0..ACTIVITY_WEEK_DAYS)
            .rev()
            .filter_map(|offset| days_before(today, offset))
            .map(|date| {
                self.record(date)
                    .cloned()
                    .unwrap_or_else(|| DailyRecord::empty(date))
            })
            .collect()
    }

    /// Sort, dedupe and trim a history loaded from storage.
    pub fn normalize(&mut self) {
        self.history.sort_by_key(|record| record.date);
        self.history.dedup_by_key(|record| record.date);
        let excess = self.history.len().saturating_sub(ACTIVITY_HISTORY_DAYS);
        self.history.drain(..excess);
    }

    pub fn reset(&mut self) {
        self.history.clear();
    }
}

fn days_before(date: NaiveDate, offset: i64) -> Option<NaiveDate> {
    date.checked_sub_days(Days::new(offset.unsigned_abs()))
}
