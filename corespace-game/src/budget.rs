//! Per-day placement quotas.
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::catalog::ItemKind;
use crate::tuning::BudgetTuning;

/// Counters of placements made on one local day, keyed `kind:item_id`.
///
/// Every query first rolls the counters over when `today` differs from the
/// recorded date, so quotas reset at the local-day boundary.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DailyBudget {
    date: Option<NaiveDate>,
    spent: BTreeMap<String, u32>,
}

fn spend_key(kind: ItemKind, item_id: &str) -> String {
    format!("{kind}:{item_id}")
}

impl DailyBudget {
    #[must_use]
    pub fn new(today: NaiveDate) -> Self {
        Self {
            date: Some(today),
            spent: BTreeMap::new(),
        }
    }

    #[must_use]
    pub const fn date(&self) -> Option<NaiveDate> {
        self.date
    }

    /// Clear the counters when the day changed. Returns whether a rollover happened.
    pub fn rollover(&mut self, today: NaiveDate) -> bool {
        if self.date == Some(today) {
            return false;
        }
        self.date = Some(today);
        self.spent.clear();
        true
    }

    /// Whether another placement of `kind` fits in today's quota.
    pub fn can_spend(&mut self, kind: ItemKind, today: NaiveDate, limits: &BudgetTuning) -> bool {
        self.remaining(kind, today, limits)
            .is_none_or(|remaining| remaining > 0)
    }

    pub fn spend(&mut self, kind: ItemKind, item_id: &str, today: NaiveDate) {
        self.rollover(today);
        let counter = self.spent.entry(spend_key(kind, item_id)).or_insert(0);
        *counter = counter.saturating_add(1);
    }

    /// Placements left today, `None` when the kind is unlimited.
    pub fn remaining(
        &mut self,
        kind: ItemKind,
        today: NaiveDate,
        limits: &BudgetTuning,
    ) -> Option<u32> {
        self.rollover(today);
        limits
            .limit(kind)
            .map(|quota| quota.saturating_sub(self.spent_by_kind(kind)))
    }

    /// Total spent today across every item of `kind`.
    #[must_use]
    pub fn spent_by_kind(&self, kind: ItemKind) -> u32 {
        let prefix = format!("{kind}:");
        self.spent
            .iter()
            .filter(|(key, _)| key.starts_with(&prefix))
            .map(|(_, count)| *count)
            .fold(0, u32::saturating_add)
    }

    #[must_use]
    pub fn spent_for(&self, kind: ItemKind, item_id: &str) -> u32 {
        self.spent
            .get(&spend_key(kind, item_id))
            .copied()
            .unwrap_or(0)
    }

    pub fn reset(&mut self, today: NaiveDate) {
        *self = Self::new(today);
    }
}
