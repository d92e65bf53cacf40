//! Proximity multipliers granted by buffs to tasks.
use crate::catalog::ItemKind;
use crate::inventory::PlacedItem;
use crate::tuning::AuraTuning;

/// Whether any footprint cell of `a` is within one cell (diagonals included) of `b`.
#[must_use]
pub fn are_adjacent(a: &PlacedItem, b: &PlacedItem) -> bool {
    let cells_a = a.footprint();
    let cells_b = b.footprint();
    cells_a
        .iter()
        .any(|ca| cells_b.iter().any(|cb| ca.chebyshev(*cb) <= 1))
}

/// XP multiplier for `target` from every adjacent buff, stacking additively.
///
/// Non-task targets always get 1.0. The target itself is never counted.
#[must_use]
pub fn aura_multiplier(target: &PlacedItem, all: &[PlacedItem], tuning: &AuraTuning) -> f64 {
    if target.item.kind != ItemKind::Task {
        return 1.0;
    }
    all.iter()
        .filter(|other| other.item.kind == ItemKind::Buff)
        .filter(|buff| buff.instance_id != target.instance_id)
        .filter(|buff| are_adjacent(target, buff))
        .fold(1.0, |multiplier, buff| {
            multiplier + tuning.bonus(buff.item.rarity)
        })
}
