//! Recoverable gameplay failures.
use thiserror::Error;

use crate::catalog::ItemKind;
use crate::day_cycle::DayPhase;
use crate::grid::{FitError, InstanceId};

/// Why an inventory or day-cycle action was refused.
///
/// Every variant is an expected outcome: the state the action targeted is
/// unchanged when one of these is returned.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ActionError {
    #[error("footprint leaves the grid")]
    OutOfBounds,
    #[error("footprint overlaps another item")]
    Overlap,
    #[error("not enough energy (requires {required}, have {available})")]
    InsufficientEnergy { required: i32, available: i32 },
    #[error("daily {kind} budget exhausted")]
    BudgetExhausted { kind: ItemKind },
    #[error("no placed instance {0}")]
    UnknownInstance(InstanceId),
    #[error("no catalog item {0}")]
    UnknownItem(String),
    #[error("no fusion recipe for {a} + {b}")]
    NoRecipe { a: String, b: String },
    #[error("an instance cannot fuse with itself")]
    SameInstance,
    #[error("no room to place fusion output {output}")]
    NoRoomForOutput { output: String },
    #[error("{kind} items cannot be consumed")]
    NotConsumable { kind: ItemKind },
    #[error("action not allowed during the {0} phase")]
    WrongPhase(DayPhase),
}

impl From<FitError> for ActionError {
    fn from(value: FitError) -> Self {
        match value {
            FitError::OutOfBounds => Self::OutOfBounds,
            FitError::Overlap => Self::Overlap,
        }
    }
}
