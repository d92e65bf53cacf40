//! Outcome notices for the presentation layer.
//!
//! The session queues one notice per observable outcome. Consumers drain the
//! queue whenever convenient; nothing in the core waits on them.

use std::collections::VecDeque;

use crate::day_cycle::Settlement;
use crate::error::ActionError;
use crate::grid::InstanceId;
use crate::user::LevelChange;

/// How a notice should be presented.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tone {
    Success,
    Info,
    Warning,
    Error,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Notice {
    Placed {
        instance_id: InstanceId,
        item_id: String,
        x: i32,
        y: i32,
    },
    PlacementRejected {
        item_id: String,
        reason: ActionError,
    },
    Moved {
        instance_id: InstanceId,
        x: i32,
        y: i32,
    },
    Removed {
        instance_id: InstanceId,
        item_id: String,
    },
    Consumed {
        instance_id: InstanceId,
        item_id: String,
    },
    Fused {
        instance_id: InstanceId,
        output_id: String,
        xp: u32,
    },
    LevelUp(LevelChange),
    ParasiteSpawned {
        instance_id: InstanceId,
        parasite_id: String,
        message_key: &'static str,
    },
    DayStarted {
        day: u32,
    },
    DayResolved {
        day: u32,
        settlement: Settlement,
    },
}

impl Notice {
    /// Stable key for localization and sound cues.
    #[must_use]
    pub const fn key(&self) -> &'static str {
        match self {
            Self::Placed { .. } => "inventory.placed",
            Self::PlacementRejected { .. } => "inventory.rejected",
            Self::Moved { .. } => "inventory.moved",
            Self::Removed { .. } => "inventory.removed",
            Self::Consumed { .. } => "inventory.consumed",
            Self::Fused { .. } => "inventory.fused",
            Self::LevelUp(_) => "user.level_up",
            Self::ParasiteSpawned { message_key, .. } => *message_key,
            Self::DayStarted { .. } => "day.started",
            Self::DayResolved { .. } => "day.resolved",
        }
    }

    #[must_use]
    pub const fn tone(&self) -> Tone {
        match self {
            Self::Placed { .. } | Self::Fused { .. } | Self::LevelUp(_) | Self::Consumed { .. } => {
                Tone::Success
            }
            Self::PlacementRejected { .. } | Self::ParasiteSpawned { .. } => Tone::Error,
            Self::Moved { .. } | Self::Removed { .. } | Self::DayStarted { .. } => Tone::Info,
            Self::DayResolved { settlement, .. } => {
                if settlement.penalty > 0 {
                    Tone::Warning
                } else {
                    Tone::Success
                }
            }
        }
    }
}

/// FIFO of pending notices.
#[derive(Debug, Clone, Default)]
pub struct NoticeQueue {
    pending: VecDeque<Notice>,
}

impl NoticeQueue {
    pub fn push(&mut self, notice: Notice) {
        self.pending.push_back(notice);
    }

    /// Take every pending notice, oldest first.
    pub fn drain(&mut self) -> Vec<Notice> {
        self.pending.drain(..).collect()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.pending.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    pub fn clear(&mut self) {
        self.pending.clear();
    }
}
